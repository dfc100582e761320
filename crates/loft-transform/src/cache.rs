//! Content-addressed transform cache.
//!
//! Keyed by `(virtual path, output format)`. A hit is valid iff the stored
//! source hash equals the hash of the current source bytes — the cache is
//! never invalidated by watcher events, it self-invalidates on content
//! change. Entries are evicted only by overwrite.

use crate::backend::ModuleFormat;
use parking_lot::RwLock;
use rustc_hash::FxHashMap;

struct CacheEntry {
    source_hash: blake3::Hash,
    output: String,
}

/// Transform output cache shared by all consumers of one transformer.
#[derive(Default)]
pub struct TransformCache {
    entries: RwLock<FxHashMap<(String, ModuleFormat), CacheEntry>>,
}

impl TransformCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached output for `(path, format)` if the stored hash
    /// matches `source_hash`.
    pub fn lookup(
        &self,
        path: &str,
        format: ModuleFormat,
        source_hash: &blake3::Hash,
    ) -> Option<String> {
        let entries = self.entries.read();
        let entry = entries.get(&(path.to_string(), format))?;
        if entry.source_hash == *source_hash {
            Some(entry.output.clone())
        } else {
            None
        }
    }

    /// Store the output for `(path, format)`, overwriting any prior entry.
    pub fn store(&self, path: &str, format: ModuleFormat, source_hash: blake3::Hash, output: &str) {
        self.entries.write().insert(
            (path.to_string(), format),
            CacheEntry {
                source_hash,
                output: output.to_string(),
            },
        );
    }

    /// Number of cached entries.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hit_requires_matching_hash() {
        let cache = TransformCache::new();
        let h1 = blake3::hash(b"const a = 1;");
        cache.store("/a.js", ModuleFormat::Esm, h1, "out-1");

        assert_eq!(
            cache.lookup("/a.js", ModuleFormat::Esm, &h1),
            Some("out-1".to_string())
        );

        let h2 = blake3::hash(b"const a = 2;");
        assert_eq!(cache.lookup("/a.js", ModuleFormat::Esm, &h2), None);
    }

    #[test]
    fn formats_are_separate_keys() {
        let cache = TransformCache::new();
        let h = blake3::hash(b"x");
        cache.store("/a.js", ModuleFormat::Esm, h, "esm-out");

        assert_eq!(cache.lookup("/a.js", ModuleFormat::Cjs, &h), None);

        cache.store("/a.js", ModuleFormat::Cjs, h, "cjs-out");
        assert_eq!(
            cache.lookup("/a.js", ModuleFormat::Cjs, &h),
            Some("cjs-out".to_string())
        );
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn overwrite_replaces_entry() {
        let cache = TransformCache::new();
        let h1 = blake3::hash(b"v1");
        let h2 = blake3::hash(b"v2");

        cache.store("/a.js", ModuleFormat::Esm, h1, "out-1");
        cache.store("/a.js", ModuleFormat::Esm, h2, "out-2");

        assert_eq!(cache.lookup("/a.js", ModuleFormat::Esm, &h1), None);
        assert_eq!(
            cache.lookup("/a.js", ModuleFormat::Esm, &h2),
            Some("out-2".to_string())
        );
        assert_eq!(cache.len(), 1);
    }
}
