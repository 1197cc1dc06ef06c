//! Cached header text for macro scanning and source excerpts

use capi_core::Extent;
use std::collections::HashMap;
use std::fs;
use tracing::warn;

/// Lazily read file contents, keyed by path
#[derive(Debug, Default)]
pub struct SourceCache {
    files: HashMap<String, Option<Vec<u8>>>,
}

impl SourceCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn bytes(&mut self, path: &str) -> Option<&[u8]> {
        self.files
            .entry(path.to_string())
            .or_insert_with(|| match fs::read(path) {
                Ok(bytes) => Some(bytes),
                Err(e) => {
                    warn!("Cannot read {}: {}", path, e);
                    None
                }
            })
            .as_deref()
    }

    /// Whole file as text, invalid UTF-8 replaced
    pub fn text(&mut self, path: &str) -> Option<String> {
        self.bytes(path)
            .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
    }

    /// Verbatim text covered by `extent`
    pub fn excerpt(&mut self, extent: &Extent) -> Option<String> {
        let bytes = self.bytes(&extent.file)?;
        let slice = bytes.get(extent.start as usize..extent.end as usize)?;
        Some(String::from_utf8_lossy(slice).into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_excerpt() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("point.h");
        fs::write(&path, "typedef struct Point { int x, y; } Point;\n").unwrap();
        let file = path.display().to_string();

        let mut cache = SourceCache::new();
        assert_eq!(
            cache.excerpt(&Extent::new(&file, 8, 34)).as_deref(),
            Some("struct Point { int x, y; }")
        );
        assert!(cache.excerpt(&Extent::new(&file, 8, 400)).is_none());
        assert!(cache.text(&file).unwrap().starts_with("typedef"));
    }

    #[test]
    fn test_missing_file() {
        let mut cache = SourceCache::new();
        assert!(cache.text("/nonexistent/capi/header.h").is_none());
    }
}
