//! capi-extract Engine
//!
//! Turns one compiled header into a flat, deduplicated declaration list:
//! - Pattern filtering of source paths and symbol names
//! - Type normalization with a cycle-safe identity registry
//! - Declaration collection over the top-level cursors
//! - Macro constant probing through synthetic translation units
//! - Serialization into output records

pub mod collect;
pub mod filter;
pub mod macros;
pub mod normalize;
pub mod registry;
pub mod serialize;
pub mod session;
pub mod source;

pub use collect::{CollectOptions, Collector};
pub use filter::PatternFilter;
pub use macros::{scan_defines, MacroProber};
pub use normalize::Normalizer;
pub use registry::TypeRegistry;
pub use serialize::{serialize, SerializeOptions};
pub use session::Session;

use capi_core::{
    Declaration, DeclaredKind, Error, ExtractConfig, Function, Record, Result, TypeBody,
    TypeDecl, TypeNode,
};
use capi_frontend::{AstLoader, CompileInput, CompileJob, CompileMode, Compiler, CompilerOptions};
use capi_frontend::FrontendError;
use tracing::info;

/// Result of extracting one header
#[derive(Debug, Default)]
pub struct Extraction {
    /// Types first, then variables, functions and enum constants, then
    /// macro constants
    pub declarations: Vec<Declaration>,
    /// Compiler output of the header compilation (warnings)
    pub diagnostics: String,
}

impl Extraction {
    pub fn records(&self, opts: &SerializeOptions) -> Vec<Record> {
        serialize(&self.declarations, opts)
    }

    pub fn types(&self) -> impl Iterator<Item = &TypeDecl> {
        self.declarations.iter().filter_map(|d| match d {
            Declaration::Type(t) => Some(t),
            _ => None,
        })
    }

    pub fn functions(&self) -> impl Iterator<Item = &Function> {
        self.declarations.iter().filter_map(|d| match d {
            Declaration::Function(f) => Some(f),
            _ => None,
        })
    }

    /// First declaration called `name`
    pub fn find(&self, name: &str) -> Option<&Declaration> {
        self.declarations.iter().find(|d| d.name() == name)
    }

    /// Aliased type of the typedef `name`
    pub fn typedef_target(&self, name: &str) -> Option<&TypeNode> {
        self.types()
            .filter(|t| t.kind == DeclaredKind::Typedef && t.name == name)
            .find_map(|t| match &t.body {
                TypeBody::Typedef { aliased } => Some(aliased),
                _ => None,
            })
    }
}

/// Extracts declarations from one header
pub struct Extractor<'a> {
    config: ExtractConfig,
    compiler: &'a dyn Compiler,
    loader: &'a dyn AstLoader,
    headers: PatternFilter,
    definitions: PatternFilter,
    args: Vec<String>,
}

impl<'a> Extractor<'a> {
    /// Compile filters and compiler options. Bad patterns fail here.
    pub fn new(
        config: ExtractConfig,
        compiler: &'a dyn Compiler,
        loader: &'a dyn AstLoader,
    ) -> Result<Self> {
        let headers = PatternFilter::new(&config.filters.include_headers, &[] as &[String])?;
        let definitions = PatternFilter::new(
            &config.filters.include_definitions,
            &config.filters.exclude_definitions,
        )?;
        let args = CompilerOptions::from_config(&config.compiler)?.to_args();

        Ok(Self {
            config,
            compiler,
            loader,
            headers,
            definitions,
            args,
        })
    }

    pub fn config(&self) -> &ExtractConfig {
        &self.config
    }

    /// Run the whole pipeline
    pub fn run(&self) -> Result<Extraction> {
        let header = &self.config.header;
        let scratch = tempfile::Builder::new().prefix("capi-extract").tempdir()?;
        let ast = scratch.path().join("header.ast");

        info!(
            "Compiling {} with {} as {}",
            header.display(),
            self.compiler.name(),
            self.config.dialect
        );
        let job = CompileJob {
            language: self.config.dialect.source_language(),
            mode: CompileMode::Ast,
            include_pch: None,
            args: &self.args,
            output: &ast,
            input: CompileInput::File(header),
        };
        let diagnostics = match self.compiler.compile(&job) {
            Ok(diagnostics) => diagnostics,
            Err(FrontendError::CompilationFailed { diagnostics }) => {
                return Err(Error::Compilation {
                    header: header.display().to_string(),
                    diagnostics,
                })
            }
            Err(e) => return Err(e.into()),
        };

        let unit = self.loader.load(&ast)?;
        let mut session = Session::new();
        let options = CollectOptions {
            scan_macros: self.config.macros.enabled,
            include_source: self.config.output.include_source,
        };
        Collector::new(&unit, &self.headers, &self.definitions, options).collect(&mut session)?;

        if self.config.macros.enabled {
            let absolute = header.canonicalize().unwrap_or_else(|_| header.clone());
            let prober = MacroProber {
                compiler: self.compiler,
                loader: self.loader,
                header: &absolute,
                dialect: self.config.dialect,
                args: &self.args,
                jobs: self.config.macros.jobs,
                definitions: &self.definitions,
                include_source: self.config.output.include_source,
            };
            prober.run(&mut session, scratch.path())?;
        }

        let declarations = session.finish(&self.definitions);
        let extraction = Extraction {
            declarations,
            diagnostics,
        };
        info!(
            "Extracted {} declarations ({} types, {} functions) from {}",
            extraction.declarations.len(),
            extraction.types().count(),
            extraction.functions().count(),
            header.display()
        );

        Ok(extraction)
    }
}
