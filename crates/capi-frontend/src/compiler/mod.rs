//! Clang compiler integration
//!
//! A [`CompileJob`] describes one clang invocation; a [`Compiler`] runs it.
//! The extractor only ever asks for three kinds of jobs: the header to an
//! AST, the header to a precompiled header, and a probe source read from
//! stdin to an AST against that precompiled header.

pub mod clang;
pub mod options;

pub use clang::ClangCompiler;
pub use options::{CompilerOptions, MacroDefinition};

use crate::FrontendError;
use std::path::Path;

/// What a compilation produces
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompileMode {
    /// `-emit-ast`
    Ast,
    /// `-Xclang -emit-pch`
    PrecompiledHeader,
}

/// Input of a compilation
#[derive(Debug, Clone, Copy)]
pub enum CompileInput<'a> {
    File(&'a Path),
    /// Source text fed through stdin
    Source(&'a str),
}

/// One clang invocation
#[derive(Debug, Clone)]
pub struct CompileJob<'a> {
    /// `-x` language, e.g. `c` or `c++-header`
    pub language: &'a str,
    pub mode: CompileMode,
    pub include_pch: Option<&'a Path>,
    pub args: &'a [String],
    pub output: &'a Path,
    pub input: CompileInput<'a>,
}

impl<'a> CompileJob<'a> {
    /// Command line arguments, without the compiler itself
    pub fn to_args(&self) -> Vec<String> {
        let mut args = vec!["-x".to_string(), self.language.to_string()];

        match self.mode {
            CompileMode::Ast => args.push("-emit-ast".to_string()),
            CompileMode::PrecompiledHeader => {
                args.push("-Xclang".to_string());
                args.push("-emit-pch".to_string());
            }
        }

        if let Some(pch) = self.include_pch {
            args.push("-include-pch".to_string());
            args.push(pch.display().to_string());
        }

        args.extend(self.args.iter().cloned());

        args.push("-o".to_string());
        args.push(self.output.display().to_string());

        match self.input {
            CompileInput::File(path) => args.push(path.display().to_string()),
            CompileInput::Source(_) => args.push("-".to_string()),
        }

        args
    }

    /// Source text to write to stdin, if any
    pub fn stdin(&self) -> Option<&'a str> {
        match self.input {
            CompileInput::Source(src) => Some(src),
            CompileInput::File(_) => None,
        }
    }
}

/// Compiler trait for different backends
pub trait Compiler: Send + Sync {
    /// Run `job`, writing its artifact to `job.output`.
    ///
    /// Returns the compiler's diagnostics on success. A failed compilation
    /// is [`FrontendError::CompilationFailed`] carrying them instead.
    fn compile(&self, job: &CompileJob<'_>) -> Result<String, FrontendError>;

    /// Get compiler name
    fn name(&self) -> &str;

    /// Check if compiler is available
    fn is_available(&self) -> bool;
}
