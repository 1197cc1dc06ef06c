//! Configuration types

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::Error;

/// Extraction configuration for one header
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractConfig {
    /// Header to extract declarations from
    pub header: PathBuf,

    /// Language the header is compiled as
    pub dialect: Dialect,

    /// Compiler invocation
    pub compiler: CompilerConfig,

    /// Path and symbol filters
    pub filters: FilterConfig,

    /// Macro constant probing
    pub macros: MacroConfig,

    /// Record output
    pub output: OutputConfig,
}

impl ExtractConfig {
    /// Create a configuration with defaults for `header`
    pub fn for_header(header: impl Into<PathBuf>) -> Self {
        Self {
            header: header.into(),
            ..Self::default()
        }
    }
}

/// Source language of the header
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Dialect {
    #[default]
    #[serde(rename = "c", alias = "C")]
    C,
    #[serde(rename = "c++", alias = "cplusplus", alias = "cxx")]
    Cxx,
    #[serde(rename = "objective-c", alias = "objc")]
    ObjectiveC,
}

impl Dialect {
    /// `-x` language for a source translation unit
    pub fn source_language(&self) -> &'static str {
        match self {
            Dialect::C => "c",
            Dialect::Cxx => "c++",
            Dialect::ObjectiveC => "objective-c",
        }
    }

    /// `-x` language for precompiling a header
    pub fn header_language(&self) -> &'static str {
        match self {
            Dialect::C => "c-header",
            Dialect::Cxx => "c++-header",
            Dialect::ObjectiveC => "objective-c-header",
        }
    }

    /// Keyword declaring a variable whose type is inferred from its initializer
    pub fn inferred_type_keyword(&self) -> &'static str {
        match self {
            Dialect::Cxx => "auto",
            Dialect::C | Dialect::ObjectiveC => "__auto_type",
        }
    }
}

impl std::str::FromStr for Dialect {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "c" => Ok(Dialect::C),
            "c++" | "cplusplus" | "cxx" | "cpp" => Ok(Dialect::Cxx),
            "objective-c" | "objc" => Ok(Dialect::ObjectiveC),
            _ => Err(Error::Config(format!("Unknown language `{}`", s))),
        }
    }
}

impl std::fmt::Display for Dialect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.source_language())
    }
}

/// Compiler configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CompilerConfig {
    /// Path to the `clang` executable (auto-detected when unset)
    pub path: Option<PathBuf>,

    /// Extra arguments passed through to every compilation
    pub args: Vec<String>,

    /// Macro definitions, `NAME` or `NAME=VALUE`
    pub defines: Vec<String>,

    /// Include directories (-I)
    pub include_dirs: Vec<PathBuf>,

    /// Per-invocation timeout in seconds (0 disables the timeout)
    pub timeout_secs: u64,
}

/// Regex filters. Patterns are unanchored searches.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Only process declarations located in files matching any of these
    pub include_headers: Vec<String>,

    /// Admit definitions matching any of these, overriding an exclusion
    pub include_definitions: Vec<String>,

    /// Reject definitions matching any of these
    pub exclude_definitions: Vec<String>,
}

/// Macro probing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MacroConfig {
    /// Probe object-like macros for constant values
    pub enabled: bool,

    /// Number of concurrent probe compilations (0 = one per CPU)
    pub jobs: usize,
}

impl Default for MacroConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            jobs: 0,
        }
    }
}

/// Record output configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Emit type references as objects instead of spelling strings
    pub type_objects: bool,

    /// Include verbatim declaration source
    pub include_source: bool,

    /// Include `size` in bytes
    pub include_size: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dialect_aliases() {
        assert_eq!("c".parse::<Dialect>().unwrap(), Dialect::C);
        assert_eq!("cplusplus".parse::<Dialect>().unwrap(), Dialect::Cxx);
        assert_eq!("C++".parse::<Dialect>().unwrap(), Dialect::Cxx);
        assert_eq!("objc".parse::<Dialect>().unwrap(), Dialect::ObjectiveC);
        assert!("fortran".parse::<Dialect>().is_err());
    }

    #[test]
    fn test_dialect_languages() {
        assert_eq!(Dialect::C.header_language(), "c-header");
        assert_eq!(Dialect::Cxx.source_language(), "c++");
        assert_eq!(Dialect::ObjectiveC.header_language(), "objective-c-header");
        assert_eq!(Dialect::C.inferred_type_keyword(), "__auto_type");
        assert_eq!(Dialect::Cxx.inferred_type_keyword(), "auto");
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: ExtractConfig =
            serde_json::from_str(r#"{"header": "raylib.h", "dialect": "c++"}"#).unwrap();
        assert_eq!(config.header, PathBuf::from("raylib.h"));
        assert_eq!(config.dialect, Dialect::Cxx);
        assert!(config.macros.enabled);
        assert!(!config.output.type_objects);
        assert!(config.filters.exclude_definitions.is_empty());
    }
}
