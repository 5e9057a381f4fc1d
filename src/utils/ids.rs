//! Stream identifier normalization
//!
//! Stream identifiers are used verbatim as partition keys and as components
//! of document ids, which end up in resource URLs. The characters below are
//! reserved in those positions and are replaced with `-`.

/// Characters that cannot appear in a document id or partition key
const RESERVED: [char; 4] = ['/', '?', '\\', '#'];

/// Replacement for every reserved character
const REPLACEMENT: char = '-';

/// Normalize a raw stream identifier into a storage-safe key
///
/// The mapping is one-way: `"a/b"` and `"a#b"` both become `"a-b"`.
/// Hosts must not rely on two such identifiers staying distinct.
pub fn normalize(raw: &str) -> String {
    raw.chars()
        .map(|c| if RESERVED.contains(&c) { REPLACEMENT } else { c })
        .collect()
}

/// Check whether an identifier is already in normalized form
pub fn is_normalized(id: &str) -> bool {
    !id.chars().any(|c| RESERVED.contains(&c))
}
