//! Resource links
//!
//! Addresses of databases, collections and documents in the form
//! `dbs/{db}/colls/{coll}/docs/{id}`. Every segment is percent-encoded so ids
//! containing reserved URL characters still produce a single path segment.

use urlencoding::encode;

/// `dbs/{database}`
pub fn database_link(database: &str) -> String {
    format!("dbs/{}", encode(database))
}

/// `dbs/{database}/colls/{collection}`
pub fn collection_link(database: &str, collection: &str) -> String {
    format!("{}/colls/{}", database_link(database), encode(collection))
}

/// `dbs/{database}/colls/{collection}/docs/{id}`
pub fn document_link(database: &str, collection: &str, id: &str) -> String {
    format!(
        "{}/docs/{}",
        collection_link(database, collection),
        encode(id)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_links() {
        assert_eq!(database_link("Actors"), "dbs/Actors");
        assert_eq!(
            collection_link("Actors", "persistence"),
            "dbs/Actors/colls/persistence"
        );
        assert_eq!(
            document_link("Actors", "persistence", "jrnl-user-42-1"),
            "dbs/Actors/colls/persistence/docs/jrnl-user-42-1"
        );
    }

    #[test]
    fn test_links_encode_segments() {
        assert_eq!(
            document_link("my db", "c", "a b%"),
            "dbs/my%20db/colls/c/docs/a%20b%25"
        );
    }
}
