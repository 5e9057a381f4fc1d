//! Document query model
//!
//! Queries are built from field comparisons joined with AND/OR, an optional
//! sort on one field, and an optional row limit. Field names are dotted paths
//! into the document (`timestamp.date`). A query can be rendered as a
//! parameterized SQL query for SQL-speaking stores, or evaluated directly
//! against JSON documents.
//!
//! ```text
//! DocumentQuery::new()
//!     .filter(Predicate::eq("streamId", "user-42"))
//!     .filter(Predicate::ge("sequenceNr", 3))
//!     .order_by("sequenceNr", SortOrder::Ascending)
//!     .limit(10)
//!
//! SELECT TOP 10 * FROM c
//! WHERE c.streamId = @p0 AND c.sequenceNr >= @p1
//! ORDER BY c.sequenceNr ASC
//! ```

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};

/// Comparison operator of a field predicate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Eq,
    Lt,
    Le,
    Gt,
    Ge,
}

impl Comparison {
    fn sql(self) -> &'static str {
        match self {
            Comparison::Eq => "=",
            Comparison::Lt => "<",
            Comparison::Le => "<=",
            Comparison::Gt => ">",
            Comparison::Ge => ">=",
        }
    }

    fn holds(self, ordering: Ordering) -> bool {
        match self {
            Comparison::Eq => ordering == Ordering::Equal,
            Comparison::Lt => ordering == Ordering::Less,
            Comparison::Le => ordering != Ordering::Greater,
            Comparison::Gt => ordering == Ordering::Greater,
            Comparison::Ge => ordering != Ordering::Less,
        }
    }
}

/// Boolean condition over a document
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Compare {
        field: String,
        op: Comparison,
        value: Value,
    },
    And(Vec<Predicate>),
    Or(Vec<Predicate>),
}

impl Predicate {
    pub fn compare(field: impl Into<String>, op: Comparison, value: impl Into<Value>) -> Self {
        Predicate::Compare {
            field: field.into(),
            op,
            value: value.into(),
        }
    }

    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(field, Comparison::Eq, value)
    }

    pub fn lt(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(field, Comparison::Lt, value)
    }

    pub fn le(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(field, Comparison::Le, value)
    }

    pub fn ge(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(field, Comparison::Ge, value)
    }

    pub fn and(self, other: Predicate) -> Self {
        match self {
            Predicate::And(mut parts) => {
                parts.push(other);
                Predicate::And(parts)
            }
            first => Predicate::And(vec![first, other]),
        }
    }

    pub fn or(self, other: Predicate) -> Self {
        match self {
            Predicate::Or(mut parts) => {
                parts.push(other);
                Predicate::Or(parts)
            }
            first => Predicate::Or(vec![first, other]),
        }
    }

    /// Evaluate against a document
    ///
    /// A comparison with a missing field or values of different JSON types
    /// is false. Empty AND is true, empty OR is false.
    pub fn matches(&self, document: &Value) -> bool {
        match self {
            Predicate::Compare { field, op, value } => lookup(document, field)
                .and_then(|actual| compare_values(actual, value))
                .is_some_and(|ordering| op.holds(ordering)),
            Predicate::And(parts) => parts.iter().all(|p| p.matches(document)),
            Predicate::Or(parts) => parts.iter().any(|p| p.matches(document)),
        }
    }

    fn render(&self, parameters: &mut Vec<SqlParameter>) -> String {
        match self {
            Predicate::Compare { field, op, value } => {
                let name = format!("@p{}", parameters.len());
                parameters.push(SqlParameter {
                    name: name.clone(),
                    value: value.clone(),
                });
                format!("c.{} {} {}", field, op.sql(), name)
            }
            Predicate::And(parts) => render_group(parts, " AND ", "true", parameters),
            Predicate::Or(parts) => render_group(parts, " OR ", "false", parameters),
        }
    }
}

fn render_group(
    parts: &[Predicate],
    separator: &str,
    empty: &str,
    parameters: &mut Vec<SqlParameter>,
) -> String {
    if parts.is_empty() {
        return empty.to_string();
    }
    let rendered: Vec<String> = parts.iter().map(|p| p.render(parameters)).collect();
    format!("({})", rendered.join(separator))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Ascending,
    Descending,
}

/// Filter, sort and limit over one partition
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DocumentQuery {
    /// Conjunction of predicates
    pub filter: Vec<Predicate>,
    pub order_by: Option<(String, SortOrder)>,
    pub limit: Option<usize>,
}

impl DocumentQuery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a predicate that must hold
    pub fn filter(mut self, predicate: Predicate) -> Self {
        self.filter.push(predicate);
        self
    }

    pub fn order_by(mut self, field: impl Into<String>, order: SortOrder) -> Self {
        self.order_by = Some((field.into(), order));
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn matches(&self, document: &Value) -> bool {
        self.filter.iter().all(|p| p.matches(document))
    }

    /// Filter, sort and limit a set of documents
    pub fn apply<I>(&self, documents: I) -> Vec<Value>
    where
        I: IntoIterator<Item = Value>,
    {
        let mut selected: Vec<Value> = documents.into_iter().filter(|d| self.matches(d)).collect();

        if let Some((field, order)) = &self.order_by {
            selected.sort_by(|a, b| {
                let ordering = match (lookup(a, field), lookup(b, field)) {
                    (Some(x), Some(y)) => compare_values(x, y).unwrap_or(Ordering::Equal),
                    (None, Some(_)) => Ordering::Less,
                    (Some(_), None) => Ordering::Greater,
                    (None, None) => Ordering::Equal,
                };
                match order {
                    SortOrder::Ascending => ordering,
                    SortOrder::Descending => ordering.reverse(),
                }
            });
        }

        if let Some(limit) = self.limit {
            selected.truncate(limit);
        }
        selected
    }

    /// Render as a parameterized SQL query
    pub fn to_sql(&self) -> SqlQuerySpec {
        let mut parameters = Vec::new();
        let mut query = String::from("SELECT ");

        if let Some(limit) = self.limit {
            query.push_str(&format!("TOP {} ", limit));
        }
        query.push_str("* FROM c");

        if !self.filter.is_empty() {
            let clauses: Vec<String> = self
                .filter
                .iter()
                .map(|p| p.render(&mut parameters))
                .collect();
            query.push_str(" WHERE ");
            query.push_str(&clauses.join(" AND "));
        }

        if let Some((field, order)) = &self.order_by {
            let direction = match order {
                SortOrder::Ascending => "ASC",
                SortOrder::Descending => "DESC",
            };
            query.push_str(&format!(" ORDER BY c.{} {}", field, direction));
        }

        SqlQuerySpec { query, parameters }
    }
}

/// SQL text with named parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SqlQuerySpec {
    pub query: String,
    pub parameters: Vec<SqlParameter>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SqlParameter {
    pub name: String,
    pub value: Value,
}

/// Resolve a dotted path inside a document
pub fn lookup<'a>(document: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.')
        .try_fold(document, |current, segment| current.get(segment))
}

fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => compare_numbers(x, y),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        (Value::Null, Value::Null) => Some(Ordering::Equal),
        _ => None,
    }
}

fn compare_numbers(x: &Number, y: &Number) -> Option<Ordering> {
    if let (Some(a), Some(b)) = (x.as_u64(), y.as_u64()) {
        return Some(a.cmp(&b));
    }
    if let (Some(a), Some(b)) = (x.as_i64(), y.as_i64()) {
        return Some(a.cmp(&b));
    }
    x.as_f64()?.partial_cmp(&y.as_f64()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn create_test_docs() -> Vec<Value> {
        (1..=5u64)
            .map(|n| {
                json!({
                    "id": format!("jrnl-s-{}", n),
                    "streamId": "s",
                    "sequenceNr": n,
                    "documentType": "jrnl",
                    "timestamp": {"date": 20240100 + n, "ticks": 10 * n}
                })
            })
            .collect()
    }

    #[test]
    fn test_predicate_matches() {
        let doc = &create_test_docs()[2];
        assert!(Predicate::eq("streamId", "s").matches(doc));
        assert!(Predicate::le("sequenceNr", 3).matches(doc));
        assert!(!Predicate::lt("sequenceNr", 3).matches(doc));
        assert!(Predicate::eq("timestamp.date", 20240103).matches(doc));
        assert!(!Predicate::eq("missing", 1).matches(doc));
        assert!(!Predicate::eq("sequenceNr", "3").matches(doc));
    }

    #[test]
    fn test_and_or() {
        let doc = &create_test_docs()[0];
        let p = Predicate::lt("sequenceNr", 0).or(Predicate::eq("streamId", "s"));
        assert!(p.matches(doc));
        let p = Predicate::eq("streamId", "s").and(Predicate::ge("sequenceNr", 2));
        assert!(!p.matches(doc));
        assert!(Predicate::And(Vec::new()).matches(doc));
        assert!(!Predicate::Or(Vec::new()).matches(doc));
    }

    #[test]
    fn test_apply_sorts_and_limits() {
        let query = DocumentQuery::new()
            .filter(Predicate::ge("sequenceNr", 2))
            .order_by("sequenceNr", SortOrder::Descending)
            .limit(2);

        let seqs: Vec<u64> = query
            .apply(create_test_docs())
            .iter()
            .map(|d| d["sequenceNr"].as_u64().unwrap())
            .collect();
        assert_eq!(seqs, vec![5, 4]);
    }

    #[test]
    fn test_large_unsigned_comparison() {
        let doc = json!({"sequenceNr": u64::MAX});
        assert!(Predicate::le("sequenceNr", u64::MAX).matches(&doc));
        assert!(Predicate::ge("sequenceNr", -1).matches(&doc));
    }

    #[test]
    fn test_to_sql() {
        let query = DocumentQuery::new()
            .filter(Predicate::eq("streamId", "s"))
            .filter(
                Predicate::lt("timestamp.date", 20240101).or(Predicate::eq("timestamp.date", 20240101)
                    .and(Predicate::le("timestamp.ticks", 5))),
            )
            .order_by("sequenceNr", SortOrder::Ascending)
            .limit(10);

        let sql = query.to_sql();
        assert_eq!(
            sql.query,
            "SELECT TOP 10 * FROM c WHERE c.streamId = @p0 AND (c.timestamp.date < @p1 OR \
             (c.timestamp.date = @p2 AND c.timestamp.ticks <= @p3)) ORDER BY c.sequenceNr ASC"
        );
        assert_eq!(sql.parameters.len(), 4);
        assert_eq!(sql.parameters[0].name, "@p0");
        assert_eq!(sql.parameters[0].value, json!("s"));
    }

    #[test]
    fn test_to_sql_without_filter() {
        assert_eq!(DocumentQuery::new().to_sql().query, "SELECT * FROM c");
    }
}
