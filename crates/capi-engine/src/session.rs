//! State of one extraction run

use capi_core::{Constant, Declaration};

use crate::filter::PatternFilter;
use crate::macros::MacroCandidates;
use crate::registry::TypeRegistry;
use crate::source::SourceCache;

/// Everything discovered while extracting one header
///
/// The registry outlives individual translation units, so types first seen
/// while probing macros join the ones found in the header itself.
#[derive(Debug, Default)]
pub struct Session {
    pub registry: TypeRegistry,
    pub sources: SourceCache,
    /// Variables, functions and enum constants, in traversal order
    pub declarations: Vec<Declaration>,
    /// Macro constants, in `#define` order
    pub constants: Vec<Constant>,
    pub macros: MacroCandidates,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// Assemble the final declaration list: admitted types first, then the
    /// traversal declarations, then macro constants.
    pub fn finish(self, definitions: &PatternFilter) -> Vec<Declaration> {
        let mut result: Vec<Declaration> = self
            .registry
            .iter()
            .filter(|decl| definitions.admits(&decl.name))
            .cloned()
            .map(Declaration::Type)
            .collect();

        result.extend(self.declarations);
        result.extend(self.constants.into_iter().map(Declaration::Constant));
        result
    }
}
