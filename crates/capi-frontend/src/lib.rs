//! capi-extract Frontend
//!
//! Everything the extractor needs from clang, behind two traits:
//!
//! - [`Compiler`] - runs one compilation (header to AST, header to PCH,
//!   synthetic probe source to AST)
//! - [`AstLoader`] - reads a compiled AST back as an owned [`TranslationUnit`]
//!
//! ## Modules
//!
//! - `ast` - Owned cursor/type arena
//! - `compiler` - `clang` subprocess integration and compile options
//! - `libclang` - AST loading through libclang
//! - `snapshot` - AST loading from JSON snapshots

pub mod ast;
pub mod compiler;
pub mod libclang;
pub mod snapshot;

pub use ast::{Cursor, CursorId, CursorKind, TranslationUnit, TypeData, TypeId, TypeKind};
pub use compiler::{
    ClangCompiler, CompileInput, CompileJob, CompileMode, Compiler, CompilerOptions,
    MacroDefinition,
};
pub use libclang::LibClangLoader;
pub use snapshot::SnapshotLoader;

use std::path::Path;
use thiserror::Error;

/// Errors raised by the frontend
#[derive(Debug, Error)]
pub enum FrontendError {
    #[error("Clang not found. Please install clang or pass its path.")]
    ClangNotFound,

    /// `diagnostics` is clang's stderr, unmodified
    #[error("Compilation failed")]
    CompilationFailed { diagnostics: String },

    #[error("Compilation timed out after {seconds}s")]
    Timeout { seconds: u64 },

    #[error("libclang error: {0}")]
    LibClang(String),

    #[error("Failed to load AST: {0}")]
    AstLoad(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid snapshot: {0}")]
    Snapshot(#[from] serde_json::Error),
}

impl From<FrontendError> for capi_core::Error {
    fn from(err: FrontendError) -> Self {
        match err {
            FrontendError::Io(e) => capi_core::Error::Io(e),
            other => capi_core::Error::Frontend(other.to_string()),
        }
    }
}

/// Reads a compiled AST artifact
pub trait AstLoader: Send + Sync {
    fn load(&self, path: &Path) -> Result<TranslationUnit, FrontendError>;

    /// Get loader name
    fn name(&self) -> &str;
}
