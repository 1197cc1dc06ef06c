//! JSON snapshot loading
//!
//! A snapshot is a [`TranslationUnit`] serialized with serde_json. It stands
//! in for a real AST wherever libclang is not wanted, most notably in tests.

use std::fs;
use std::path::Path;

use crate::ast::TranslationUnit;
use crate::{AstLoader, FrontendError};

/// [`AstLoader`] for serde_json snapshots
#[derive(Debug, Default, Clone, Copy)]
pub struct SnapshotLoader;

impl SnapshotLoader {
    pub fn new() -> Self {
        Self
    }

    /// Write `unit` to `path` as a snapshot
    pub fn write(unit: &TranslationUnit, path: &Path) -> Result<(), FrontendError> {
        let json = serde_json::to_string(unit)?;
        fs::write(path, json)?;
        Ok(())
    }
}

impl AstLoader for SnapshotLoader {
    fn load(&self, path: &Path) -> Result<TranslationUnit, FrontendError> {
        let text = fs::read_to_string(path)?;
        let unit: TranslationUnit = serde_json::from_str(&text)?;
        unit.validate().map_err(FrontendError::AstLoad)?;
        Ok(unit)
    }

    fn name(&self) -> &str {
        "snapshot"
    }
}
