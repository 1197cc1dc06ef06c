//! Macro constant probing
//!
//! Object-like macros never reach the AST. Candidates are scanned from the
//! raw text of visited headers, then each one is compiled into a tiny probe
//! translation unit:
//!
//! ```c
//! #include "/abs/path/header.h"
//! const __auto_type __capi_probe_value = NAME;
//! ```
//!
//! A probe that compiles names a constant; its variable's type and evaluated
//! initializer become the constant's type and value. A probe that fails is
//! not a constant and is dropped.

use capi_core::{Constant, Dialect, Error, Result};
use capi_frontend::{AstLoader, CompileInput, CompileJob, CompileMode, Compiler, CursorKind};
use once_cell::sync::Lazy;
use rayon::prelude::*;
use regex::Regex;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::filter::PatternFilter;
use crate::normalize::Normalizer;
use crate::session::Session;

/// Name of the variable declared by every probe
pub const PROBE_VARIABLE: &str = "__capi_probe_value";

/// `#define NAME <whitespace>` at the start of a line; function-like macros
/// have `(` right after the name and never match
static DEFINE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^#[ \t]*define[ \t]+([a-zA-Z_][a-zA-Z0-9_]*)[ \t]+").unwrap());

/// Object-like macro names defined in `text`, in order, without duplicates
pub fn scan_defines(text: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    DEFINE_RE
        .captures_iter(text)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .filter(|name| seen.insert(name.clone()))
        .collect()
}

/// Candidate names across every scanned file
#[derive(Debug, Default)]
pub struct MacroCandidates {
    names: Vec<String>,
    known: HashSet<String>,
    files: HashSet<String>,
}

impl MacroCandidates {
    pub fn is_scanned(&self, file: &str) -> bool {
        self.files.contains(file)
    }

    pub fn mark_scanned(&mut self, file: &str) {
        self.files.insert(file.to_string());
    }

    /// Record the candidates of `file` once
    pub fn scan(&mut self, file: &str, text: &str) {
        if !self.files.insert(file.to_string()) {
            return;
        }
        for name in scan_defines(text) {
            if self.known.insert(name.clone()) {
                self.names.push(name);
            }
        }
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// Synthetic source that binds `name` to an inferred-type constant
pub fn probe_source(header: &Path, dialect: Dialect, name: &str) -> String {
    format!(
        "#include \"{}\"\nconst {} {} = {};\n",
        header.display(),
        dialect.inferred_type_keyword(),
        PROBE_VARIABLE,
        name
    )
}

/// Probes macro candidates against a precompiled header
pub struct MacroProber<'a> {
    pub compiler: &'a dyn Compiler,
    pub loader: &'a dyn AstLoader,
    /// Absolute header path
    pub header: &'a Path,
    pub dialect: Dialect,
    pub args: &'a [String],
    /// Concurrent probe compilations (0 = one per CPU)
    pub jobs: usize,
    pub definitions: &'a PatternFilter,
    pub include_source: bool,
}

impl<'a> MacroProber<'a> {
    pub fn run(&self, session: &mut Session, scratch: &Path) -> Result<()> {
        let candidates: Vec<String> = session
            .macros
            .names()
            .iter()
            .filter(|name| self.definitions.admits(name))
            .cloned()
            .collect();
        if candidates.is_empty() {
            return Ok(());
        }

        let pch = scratch.join("header.pch");
        let job = CompileJob {
            language: self.dialect.header_language(),
            mode: CompileMode::PrecompiledHeader,
            include_pch: None,
            args: self.args,
            output: &pch,
            input: CompileInput::File(self.header),
        };
        if let Err(e) = self.compiler.compile(&job) {
            warn!(
                "Failed to precompile {}, skipping macro probing: {}",
                self.header.display(),
                e
            );
            return Ok(());
        }

        info!("Probing {} macro candidates", candidates.len());
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.jobs)
            .build()
            .map_err(|e| Error::Other(format!("Failed to start probe pool: {}", e)))?;

        let artifacts: Vec<Option<PathBuf>> = pool.install(|| {
            candidates
                .par_iter()
                .enumerate()
                .map(|(i, name)| self.compile_probe(i, name, &pch, scratch))
                .collect()
        });

        let mut found = 0;
        for (name, artifact) in candidates.iter().zip(artifacts) {
            let artifact = match artifact {
                Some(path) => path,
                None => continue,
            };
            if let Some(constant) = self.harvest(name, &artifact, session) {
                session.constants.push(constant);
                found += 1;
            }
        }
        info!("Found {} macro constants", found);

        Ok(())
    }

    fn compile_probe(&self, index: usize, name: &str, pch: &Path, scratch: &Path) -> Option<PathBuf> {
        let source = probe_source(self.header, self.dialect, name);
        let output = scratch.join(format!("probe-{}.ast", index));
        let job = CompileJob {
            language: self.dialect.source_language(),
            mode: CompileMode::Ast,
            include_pch: Some(pch),
            args: self.args,
            output: &output,
            input: CompileInput::Source(&source),
        };

        match self.compiler.compile(&job) {
            Ok(_) => Some(output),
            Err(e) => {
                debug!("`{}` is not a constant: {}", name, e);
                None
            }
        }
    }

    /// Read a compiled probe back into a constant
    fn harvest(&self, name: &str, artifact: &Path, session: &mut Session) -> Option<Constant> {
        let unit = match self.loader.load(artifact) {
            Ok(unit) => unit,
            Err(e) => {
                debug!("Cannot load probe for `{}`: {}", name, e);
                return None;
            }
        };

        let probe = unit
            .root_children()
            .filter(|(_, c)| c.kind == CursorKind::VarDecl && c.name == PROBE_VARIABLE)
            .last()
            .map(|(_, c)| c);
        let (cursor, ty) = match probe.and_then(|c| c.ty.map(|ty| (c, ty))) {
            Some(found) => found,
            None => {
                debug!("Probe for `{}` declares no value", name);
                return None;
            }
        };

        let normalized = Normalizer::new(
            &unit,
            &mut session.registry,
            &mut session.sources,
            self.include_source,
        )
        .normalize(ty);
        let ty = match normalized {
            Ok(ty) => ty,
            Err(e) => {
                debug!("Dropping `{}`, its type did not normalize: {}", name, e);
                return None;
            }
        };

        Some(Constant {
            name: name.to_string(),
            ty,
            value: cursor.evaluated.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_scan_object_like_macros() {
        let text = "#ifndef RAYLIB_H\n\
                    #define RAYLIB_H\n\
                    #define MAX_LEN 128\n\
                    #define SQUARE(x) ((x)*(x))\n\
                    #  define GREETING \"hi\"\n\
                    \t#define INDENTED 1\n\
                    #define MAX_LEN 256\n\
                    #define\tTABBED\t2\n";
        assert_eq!(scan_defines(text), vec!["MAX_LEN", "GREETING", "TABBED"]);
    }

    #[test]
    fn test_candidates_scan_each_file_once() {
        let mut candidates = MacroCandidates::default();
        candidates.scan("a.h", "#define A 1\n#define B 2\n");
        candidates.scan("a.h", "#define C 3\n");
        candidates.scan("b.h", "#define B 2\n#define D 4\n");

        assert_eq!(candidates.names(), &["A", "B", "D"]);
        assert!(candidates.is_scanned("b.h"));
    }

    #[test]
    fn test_probe_source() {
        let source = probe_source(Path::new("/src/lib.h"), Dialect::Cxx, "VERSION");
        assert_eq!(
            source,
            "#include \"/src/lib.h\"\nconst auto __capi_probe_value = VERSION;\n"
        );
        assert!(probe_source(Path::new("lib.h"), Dialect::C, "X").contains("__auto_type"));
    }
}
