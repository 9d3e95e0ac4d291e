use std::{
    collections::hash_map::DefaultHasher,
    hash::{Hash, Hasher},
};

/// A stable identifier derived from a source file path.
///
/// Chunk ids are formed as `"{hex}:{chunk_index}"` so the id of every chunk
/// of a file is a deterministic function of (source path, chunk index) and
/// survives re-ingestion unchanged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceId {
    /// 64-bit hash of the source path.
    pub numeric: u64,
    /// The full 16-char hex form used as the id prefix.
    pub hex: String,
}

impl SourceId {
    /// Generate a stable id from a source file path.
    pub fn new(source: &str) -> Self {
        let mut hasher = DefaultHasher::new();
        source.hash(&mut hasher);
        let numeric = hasher.finish();
        Self {
            numeric,
            hex: format!("{numeric:016x}"),
        }
    }

    /// The storage id for one chunk of this source.
    pub fn chunk_id(&self, chunk_index: usize) -> String {
        format!("{}:{chunk_index}", self.hex)
    }
}

impl std::fmt::Display for SourceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", &self.hex[..6])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deterministic() {
        let a = SourceId::new("/docs/paper.pdf");
        let b = SourceId::new("/docs/paper.pdf");
        assert_eq!(a, b);
        assert_eq!(a.chunk_id(3), b.chunk_id(3));
    }

    #[test]
    fn different_paths_differ() {
        let a = SourceId::new("/docs/paper.pdf");
        let b = SourceId::new("/docs/other.pdf");
        assert_ne!(a.numeric, b.numeric);
    }

    #[test]
    fn similar_paths_get_distinct_ids() {
        // A path that contains another path as a prefix must still hash to
        // an unrelated id.
        let a = SourceId::new("/a/b.txt");
        let b = SourceId::new("/a/b.txt.bak");
        assert_ne!(a.hex, b.hex);
        assert!(!b.chunk_id(0).contains(&a.hex));
    }

    #[test]
    fn chunk_ids_unique_per_index() {
        let id = SourceId::new("/docs/paper.pdf");
        assert_ne!(id.chunk_id(0), id.chunk_id(1));
        assert!(id.chunk_id(7).ends_with(":7"));
    }

    #[test]
    fn display_is_short_hash() {
        let id = SourceId::new("/docs/paper.pdf");
        let s = id.to_string();
        assert!(s.starts_with('#'));
        assert_eq!(s.len(), 7);
    }
}
