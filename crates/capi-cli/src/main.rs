//! capi-extract CLI
//!
//! Extracts declarations from C/C++/Objective-C headers into JSON.

use anyhow::{bail, Context, Result};
use capi_core::{Dialect, ExtractConfig};
use capi_engine::{Extractor, SerializeOptions};
use capi_frontend::{ClangCompiler, LibClangLoader};
use clap::{ArgAction, Parser};
use serde_json::ser::{CompactFormatter, PrettyFormatter, Serializer};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "capi-extract")]
#[command(author, version, about = "Serialize C header declarations to JSON", long_about = None)]
struct Cli {
    /// Header file(s) to process
    #[arg(value_name = "HEADERS", required = true)]
    headers: Vec<PathBuf>,

    /// Path to `clang`
    #[arg(short, long, value_name = "PATH")]
    clang: Option<PathBuf>,

    /// Path to the libclang library or its directory
    #[arg(short = 'L', long = "lib", value_name = "PATH")]
    lib: Option<PathBuf>,

    /// Arguments passed through to clang
    #[arg(short = 'a', long, value_name = "ARGS", num_args = 1.., allow_hyphen_values = true)]
    xargs: Vec<String>,

    /// Only process declarations from headers matching any of these regexes
    #[arg(short, long, value_name = "FILTER", num_args = 1..)]
    include_headers: Vec<String>,

    /// Include definitions matching these regexes, overriding exclusions
    #[arg(short = 'd', long, value_name = "FILTER", num_args = 1..)]
    include_definitions: Vec<String>,

    /// Exclude definitions matching these regexes
    #[arg(short = 'D', long, value_name = "FILTER", num_args = 1..)]
    exclude_definitions: Vec<String>,

    /// Include directory
    #[arg(short = 'I', value_name = "DIR")]
    include_dirs: Vec<PathBuf>,

    /// Macro definition, NAME or NAME=VALUE
    #[arg(long = "define", value_name = "MACRO")]
    defines: Vec<String>,

    /// File or directory to write JSON to (default: stdout)
    #[arg(short, long, value_name = "PATH")]
    output: Option<PathBuf>,

    /// Overwrite an existing output file
    #[arg(short, long)]
    writeover: bool,

    /// Skip probing object-like macros for constants
    #[arg(short, long)]
    skip_defines: bool,

    /// Output type objects instead of type spellings
    #[arg(short, long)]
    type_objects: bool,

    /// Output minified JSON
    #[arg(short, long)]
    minified: bool,

    /// Header language (c, c++, objective-c)
    #[arg(short = 'x', long, value_name = "LANG")]
    language: Option<Dialect>,

    /// Include verbatim declaration source
    #[arg(long)]
    source: bool,

    /// Include type sizes in bytes
    #[arg(long)]
    size: bool,

    /// Concurrent macro probes (default: one per CPU)
    #[arg(short, long, value_name = "N")]
    jobs: Option<usize>,

    /// Per-compilation timeout in seconds
    #[arg(long, value_name = "SECS")]
    timeout: Option<u64>,

    /// YAML configuration file; flags override its values
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Increase verbosity (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,

    /// Extra clang arguments
    #[arg(last = true, value_name = "CLANG_ARGS")]
    clang_args: Vec<String>,
}

impl Cli {
    /// Configuration for `header`: the config file, then flags on top
    fn config_for(&self, base: &ExtractConfig, header: &Path) -> ExtractConfig {
        let mut config = base.clone();
        config.header = header.to_path_buf();

        if let Some(language) = self.language {
            config.dialect = language;
        }

        let compiler = &mut config.compiler;
        if let Some(clang) = &self.clang {
            compiler.path = Some(clang.clone());
        }
        compiler.args.extend(self.xargs.iter().map(|a| a.trim().to_string()));
        compiler.args.extend(self.clang_args.iter().cloned());
        compiler.defines.extend(self.defines.iter().cloned());
        compiler.include_dirs.extend(self.include_dirs.iter().cloned());
        if let Some(timeout) = self.timeout {
            compiler.timeout_secs = timeout;
        }

        let filters = &mut config.filters;
        filters.include_headers.extend(self.include_headers.iter().cloned());
        filters
            .include_definitions
            .extend(self.include_definitions.iter().cloned());
        filters
            .exclude_definitions
            .extend(self.exclude_definitions.iter().cloned());

        if self.skip_defines {
            config.macros.enabled = false;
        }
        if let Some(jobs) = self.jobs {
            config.macros.jobs = jobs;
        }

        config.output.type_objects |= self.type_objects;
        config.output.include_source |= self.source;
        config.output.include_size |= self.size;

        config
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if let Some(capi_core::Error::Compilation { diagnostics, .. }) = e.downcast_ref() {
                eprint!("{}", diagnostics);
            }
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: &Cli) -> Result<()> {
    let base = match &cli.config {
        Some(path) => load_config(path)?,
        None => ExtractConfig::default(),
    };

    if let Some(lib) = &cli.lib {
        std::env::set_var("LIBCLANG_PATH", lib);
    }
    let loader = LibClangLoader::new();
    if !loader.is_available() {
        bail!("libclang could not be loaded; pass its location with -L/--lib");
    }

    for header in &cli.headers {
        if !header.is_file() {
            warn!("Path \"{}\" doesn't exist, skipping", header.display());
            continue;
        }

        let config = cli.config_for(&base, header);
        let compiler = match &config.compiler.path {
            Some(path) => ClangCompiler::with_path(path.clone()),
            None => ClangCompiler::new()?,
        }
        .with_timeout(config.compiler.timeout_secs);

        let opts = SerializeOptions::from(&config.output);
        let extractor = Extractor::new(config, &compiler, &loader)
            .with_context(|| format!("Invalid configuration for {}", header.display()))?;
        let extraction = extractor
            .run()
            .with_context(|| format!("Failed to extract {}", header.display()))?;
        if !extraction.diagnostics.is_empty() {
            info!("clang: {}", extraction.diagnostics.trim_end());
        }

        let json = render(&extraction.records(&opts), cli.minified)?;
        match &cli.output {
            Some(output) => {
                let path = output_path(output, header);
                if path.is_file() && !cli.writeover {
                    bail!(
                        "File already exists at `{}`, use -w/--writeover to overwrite file",
                        path.display()
                    );
                }
                fs::write(&path, json)
                    .with_context(|| format!("Failed to write {}", path.display()))?;
                info!("Output written to: {}", path.display());
            }
            None => print!("{}", json),
        }
    }

    Ok(())
}

fn load_config(path: &Path) -> Result<ExtractConfig> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config {}", path.display()))?;
    serde_yaml::from_str(&text).with_context(|| format!("Invalid config {}", path.display()))
}

/// JSON document with 4-space indentation, or compact
fn render<T: serde::Serialize>(value: &T, minified: bool) -> Result<String> {
    let mut buf = Vec::new();
    if minified {
        value.serialize(&mut Serializer::with_formatter(&mut buf, CompactFormatter))?;
    } else {
        let formatter = PrettyFormatter::with_indent(b"    ");
        value.serialize(&mut Serializer::with_formatter(&mut buf, formatter))?;
    }
    Ok(String::from_utf8(buf)?)
}

/// A directory output becomes `<dir>/<header stem>.json`
fn output_path(output: &Path, header: &Path) -> PathBuf {
    if output.is_dir() {
        let stem = header
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "output".to_string());
        output.join(format!("{}.json", stem))
    } else {
        output.to_path_buf()
    }
}
