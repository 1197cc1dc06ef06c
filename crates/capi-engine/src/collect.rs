//! Declaration collection over the top-level cursors of a translation unit

use capi_core::{Argument, Constant, Declaration, Function, Result, TypeBody, Variable};
use capi_frontend::{Cursor, CursorKind, TranslationUnit};
use std::path::Path;
use tracing::{debug, trace};

use crate::filter::PatternFilter;
use crate::normalize::{is_positional_name, Normalizer};
use crate::session::Session;

/// Collection settings
#[derive(Debug, Clone, Copy)]
pub struct CollectOptions {
    /// Scan visited files for `#define` candidates
    pub scan_macros: bool,
    /// Attach verbatim source excerpts
    pub include_source: bool,
}

/// Walks the root cursors of one translation unit into a [`Session`]
pub struct Collector<'a> {
    tu: &'a TranslationUnit,
    headers: &'a PatternFilter,
    definitions: &'a PatternFilter,
    options: CollectOptions,
}

impl<'a> Collector<'a> {
    pub fn new(
        tu: &'a TranslationUnit,
        headers: &'a PatternFilter,
        definitions: &'a PatternFilter,
        options: CollectOptions,
    ) -> Self {
        Self {
            tu,
            headers,
            definitions,
            options,
        }
    }

    pub fn collect(&self, session: &mut Session) -> Result<()> {
        for (_, cursor) in self.tu.root_children() {
            self.visit(cursor, session)?;
        }
        debug!(
            "Collected {} declarations, {} types registered",
            session.declarations.len(),
            session.registry.len()
        );
        Ok(())
    }

    fn visit(&self, cursor: &Cursor, session: &mut Session) -> Result<()> {
        let file = match cursor.file() {
            Some(file) => file,
            None => {
                trace!("Skipping `{}`: no source location", cursor.name);
                return Ok(());
            }
        };

        let shown = display_path(file);
        if !self.headers.admits(&shown) {
            trace!("Skipping `{}` from {}", cursor.name, shown);
            return Ok(());
        }

        if self.options.scan_macros && !session.macros.is_scanned(&shown) {
            match session.sources.text(file) {
                Some(text) => session.macros.scan(&shown, &text),
                None => session.macros.mark_scanned(&shown),
            }
        }

        if cursor.kind == CursorKind::EnumDecl && is_anonymous_enum(cursor) {
            return self.anonymous_enum(cursor, session);
        }

        if !self.definitions.admits(&cursor.name) {
            trace!("Filtered out `{}`", cursor.name);
            return Ok(());
        }

        match cursor.kind {
            CursorKind::VarDecl => {
                let ty = match cursor.ty {
                    Some(ty) => ty,
                    None => return Ok(()),
                };
                let ty = self.normalizer(session).normalize(ty)?;
                let source = self.source(cursor, session);
                session.declarations.push(Declaration::Variable(Variable {
                    name: cursor.name.clone(),
                    ty,
                    source,
                }));
            }
            CursorKind::TypedefDecl
            | CursorKind::StructDecl
            | CursorKind::UnionDecl
            | CursorKind::ClassDecl
            | CursorKind::EnumDecl => {
                // Registered as a side effect; emitted from the registry
                if let Some(ty) = cursor.ty {
                    self.normalizer(session).normalize(ty)?;
                }
            }
            CursorKind::FunctionDecl => {
                let function = self.function(cursor, session)?;
                session.declarations.push(Declaration::Function(function));
            }
            _ => {}
        }

        Ok(())
    }

    /// Emit each admitted enumerator of an anonymous enum as a constant
    fn anonymous_enum(&self, cursor: &Cursor, session: &mut Session) -> Result<()> {
        let ty = match cursor.ty {
            Some(ty) => ty,
            None => return Ok(()),
        };
        let node = self.normalizer(session).normalize(ty)?;
        let decl = node
            .declaration()
            .and_then(|d| session.registry.get(d.id))
            .cloned();

        if let Some(decl) = decl {
            if let TypeBody::Enum { underlying, values } = decl.body {
                for value in values {
                    if !self.definitions.admits(&value.name) {
                        continue;
                    }
                    let mut ty = underlying.clone();
                    ty.size = ty.size.or(decl.size);
                    session.declarations.push(Declaration::Constant(Constant {
                        name: value.name,
                        ty,
                        value: Some(value.value),
                    }));
                }
            }
        }

        Ok(())
    }

    fn function(&self, cursor: &Cursor, session: &mut Session) -> Result<Function> {
        let tu = self.tu;
        let mut normalizer = self.normalizer(session);

        let return_type = match cursor.result_type {
            Some(ty) => Some(normalizer.normalize(ty)?),
            None => None,
        };

        let mut arguments = Vec::with_capacity(cursor.arguments.len());
        for &arg in &cursor.arguments {
            let param = tu.cursor(arg);
            if let Some(ty) = param.ty {
                arguments.push(Argument {
                    name: Some(param.name.clone()),
                    ty: normalizer.normalize(ty)?,
                });
            }
        }

        let signature = match cursor.ty {
            Some(ty) => Some(normalizer.normalize(ty)?),
            None => None,
        };
        let variadic = signature.as_ref().map(|s| s.is_variadic()).unwrap_or(false);

        let return_type = match (return_type, signature) {
            (Some(ty), _) => ty,
            (None, Some(sig)) => match sig.function_signature() {
                Some(sig) => (*sig.return_type).clone(),
                None => {
                    return Err(capi_core::Error::Frontend(format!(
                        "function `{}` has no result type",
                        cursor.name
                    )))
                }
            },
            (None, None) => {
                return Err(capi_core::Error::Frontend(format!(
                    "function `{}` has no type",
                    cursor.name
                )))
            }
        };

        let source = self.source(cursor, session);
        Ok(Function {
            name: cursor.name.clone(),
            return_type,
            arguments,
            variadic,
            source,
        })
    }

    fn normalizer<'s>(&self, session: &'s mut Session) -> Normalizer<'s>
    where
        'a: 's,
    {
        Normalizer::new(
            self.tu,
            &mut session.registry,
            &mut session.sources,
            self.options.include_source,
        )
    }

    fn source(&self, cursor: &Cursor, session: &mut Session) -> Option<String> {
        if !self.options.include_source {
            return None;
        }
        cursor
            .extent
            .as_ref()
            .and_then(|extent| session.sources.excerpt(extent))
    }
}

fn is_anonymous_enum(cursor: &Cursor) -> bool {
    cursor.anonymous || is_positional_name(&cursor.name)
}

/// Path as matched by header filters: relative to the working directory
/// when the file lies below it.
pub fn display_path(file: &str) -> String {
    let path = Path::new(file);
    std::env::current_dir()
        .ok()
        .and_then(|cwd| path.strip_prefix(&cwd).ok().map(|p| p.display().to_string()))
        .unwrap_or_else(|| file.to_string())
}
