//! Compile options shared by every invocation

use capi_core::config::CompilerConfig;
use std::path::PathBuf;

/// A macro definition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MacroDefinition {
    pub name: String,
    pub value: Option<String>,
}

impl MacroDefinition {
    /// Create a macro that is simply defined
    pub fn defined(name: &str) -> Self {
        Self {
            name: name.to_string(),
            value: None,
        }
    }

    /// Create a macro with a specific value
    pub fn with_value(name: &str, value: &str) -> Self {
        Self {
            name: name.to_string(),
            value: Some(value.to_string()),
        }
    }

    /// Convert to clang -D argument
    pub fn to_clang_arg(&self) -> String {
        match &self.value {
            Some(v) => format!("-D{}={}", self.name, v),
            None => format!("-D{}", self.name),
        }
    }
}

impl std::str::FromStr for MacroDefinition {
    type Err = capi_core::Error;

    /// Parse `NAME` or `NAME=VALUE`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (name, value) = match s.split_once('=') {
            Some((name, value)) => (name.trim(), Some(value)),
            None => (s.trim(), None),
        };

        let valid = name
            .chars()
            .next()
            .map(|c| c.is_ascii_alphabetic() || c == '_')
            .unwrap_or(false)
            && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
        if !valid {
            return Err(capi_core::Error::Config(format!(
                "Invalid macro definition `{}`",
                s
            )));
        }

        Ok(match value {
            Some(v) => Self::with_value(name, v),
            None => Self::defined(name),
        })
    }
}

/// Arguments passed to every compilation of one header
#[derive(Debug, Clone, Default)]
pub struct CompilerOptions {
    /// Macro definitions (-D flags)
    pub defines: Vec<MacroDefinition>,
    /// Include paths (-I flags)
    pub includes: Vec<PathBuf>,
    /// Additional clang arguments
    pub extra_args: Vec<String>,
}

impl CompilerOptions {
    /// Build options from configuration
    pub fn from_config(config: &CompilerConfig) -> capi_core::Result<Self> {
        let defines = config
            .defines
            .iter()
            .map(|d| d.parse())
            .collect::<capi_core::Result<Vec<MacroDefinition>>>()?;

        Ok(Self {
            defines,
            includes: config.include_dirs.clone(),
            extra_args: config.args.clone(),
        })
    }

    /// Render into clang command line arguments
    pub fn to_args(&self) -> Vec<String> {
        let mut args = Vec::new();

        for macro_def in &self.defines {
            args.push(macro_def.to_clang_arg());
        }

        for include in &self.includes {
            args.push(format!("-I{}", include.display()));
        }

        args.extend(self.extra_args.iter().cloned());
        args
    }
}
