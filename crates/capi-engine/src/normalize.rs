//! Type normalization
//!
//! Converts frontend types into [`TypeNode`]s. Declared types (records,
//! enums, typedefs) are resolved once through the [`TypeRegistry`]; every
//! later use becomes a [`DeclRef`].

use capi_core::spelling::{base_name, strip_tag_keyword};
use capi_core::{
    Argument, ConstValue, DeclId, DeclRef, DeclaredKind, Dimension, EnumValue, Error, Field,
    FunctionSignature, Indirection, Qualifiers, Result, Shape, TypeBody, TypeNode,
};
use capi_frontend::{Cursor, CursorId, CursorKind, TranslationUnit, TypeData, TypeId, TypeKind};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, trace};

use crate::registry::{Reservation, TypeRegistry};
use crate::source::SourceCache;

/// Fixed-width typedef names reported as plain integers
const BUILTIN_INTS: &[&str] = &["int8_t", "int16_t", "int32_t", "int64_t", "intptr_t", "ssize_t"];
const BUILTIN_UINTS: &[&str] = &[
    "uint8_t",
    "uint16_t",
    "uint32_t",
    "uint64_t",
    "uintptr_t",
    "size_t",
];

/// C library types reported by spelling only, never registered
const BUILTIN_DEFINITIONS: &[&str] = &[
    "fenv_t",
    "fexcept_t",
    "femode_t",
    "struct lconv",
    "va_list",
    "struct atomic_flag",
    "FILE",
    "fpos_t",
    "jmp_buf",
    "thrd_t",
    "mtx_t",
    "cnd_t",
    "struct tm",
    "time_t",
    "struct timespec",
];

/// Directory prefixes and non-identifier characters of positional names
static ANONYMOUS_SUB_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(.*/|\W)").unwrap());

/// Sugar chains deeper than this are treated as malformed
const MAX_SUGAR_DEPTH: usize = 64;

/// Whether a tag spelling is a frontend-synthesized positional name
pub fn is_positional_name(name: &str) -> bool {
    name.contains("(anonymous") || name.contains("(unnamed")
}

/// Synthesize an identifier from a positional spelling such as
/// `(anonymous at include/shapes.h:12:5)`
pub fn synthesize_name(positional: &str) -> String {
    ANONYMOUS_SUB_RE.replace_all(positional, "_").into_owned()
}

/// Registry key for a declaration cursor
pub fn identity_key(cursor: &Cursor) -> String {
    if !cursor.usr.is_empty() {
        return cursor.usr.clone();
    }
    match &cursor.location {
        Some(loc) => format!("{:?}@{}:{}", cursor.kind, loc.file, loc.offset),
        None => format!("{:?}@{}", cursor.kind, cursor.name),
    }
}

/// Normalizes the types of one translation unit into a shared registry
pub struct Normalizer<'a> {
    tu: &'a TranslationUnit,
    registry: &'a mut TypeRegistry,
    sources: &'a mut SourceCache,
    include_source: bool,
}

impl<'a> Normalizer<'a> {
    pub fn new(
        tu: &'a TranslationUnit,
        registry: &'a mut TypeRegistry,
        sources: &'a mut SourceCache,
        include_source: bool,
    ) -> Self {
        Self {
            tu,
            registry,
            sources,
            include_source,
        }
    }

    /// Canonical form of the type `id`
    pub fn normalize(&mut self, id: TypeId) -> Result<TypeNode> {
        let tu = self.tu;
        let outer = tu.ty(id);
        let (inner_id, qualifiers) = self.strip_sugar(id)?;
        let inner = tu.ty(inner_id);
        let size = outer.size.or(inner.size);
        let spelling = outer.spelling.clone();

        let shape = match &inner.kind {
            TypeKind::Void => Shape::Void,
            TypeKind::Bool => Shape::Bool,
            TypeKind::CharS
            | TypeKind::CharU
            | TypeKind::SChar
            | TypeKind::UChar
            | TypeKind::WChar
            | TypeKind::Char16
            | TypeKind::Char32 => Shape::Char,
            TypeKind::Short
            | TypeKind::Int
            | TypeKind::Long
            | TypeKind::LongLong
            | TypeKind::Int128 => Shape::Int,
            TypeKind::UShort
            | TypeKind::UInt
            | TypeKind::ULong
            | TypeKind::ULongLong
            | TypeKind::UInt128 => Shape::UInt,
            TypeKind::Float
            | TypeKind::Double
            | TypeKind::LongDouble
            | TypeKind::Float128
            | TypeKind::Half
            | TypeKind::Float16 => Shape::Float,
            TypeKind::ConstantArray
            | TypeKind::IncompleteArray
            | TypeKind::VariableArray
            | TypeKind::Vector => {
                return self.indirection(inner_id, spelling, qualifiers, size);
            }
            kind if kind.is_pointer_like() => {
                return self.indirection(inner_id, spelling, qualifiers, size);
            }
            TypeKind::FunctionProto | TypeKind::FunctionNoProto => {
                return self.function(inner, spelling, qualifiers, size);
            }
            TypeKind::Typedef | TypeKind::Record if is_builtin_definition(inner) => {
                trace!("`{}` is a builtin C library type", inner.spelling);
                Shape::Opaque
            }
            TypeKind::Typedef => match builtin_integer(inner) {
                Some(shape) => shape,
                None => return self.declared(inner, spelling, qualifiers, size),
            },
            TypeKind::Record | TypeKind::Enum => {
                return self.declared(inner, spelling, qualifiers, size);
            }
            TypeKind::Invalid => {
                return Err(Error::UnrecognizedType {
                    kind: format!("{:?}", inner.kind),
                    spelling: inner.spelling.clone(),
                });
            }
            other => {
                debug!("No structure for {:?} `{}`, keeping its spelling", other, inner.spelling);
                Shape::Opaque
            }
        };

        Ok(TypeNode {
            base: base_name(&spelling),
            spelling,
            size,
            qualifiers,
            shape,
        })
    }

    /// Follow elaborated/auto/unexposed wrappers, collecting their qualifiers
    fn strip_sugar(&self, id: TypeId) -> Result<(TypeId, Qualifiers)> {
        let mut current = id;
        let mut qualifiers = qualifiers_of(self.tu.ty(id));

        for _ in 0..MAX_SUGAR_DEPTH {
            let data = self.tu.ty(current);
            match (data.kind.is_sugar(), data.named) {
                (true, Some(named)) => {
                    current = named;
                    qualifiers = qualifiers | qualifiers_of(self.tu.ty(named));
                }
                _ => return Ok((current, qualifiers)),
            }
        }

        let data = self.tu.ty(current);
        Err(Error::UnrecognizedType {
            kind: format!("{:?}", data.kind),
            spelling: data.spelling.clone(),
        })
    }

    fn indirection(
        &mut self,
        id: TypeId,
        spelling: String,
        qualifiers: Qualifiers,
        size: Option<u64>,
    ) -> Result<TypeNode> {
        let tu = self.tu;
        let top = tu.ty(id).kind.clone();

        let mut dimensions = Vec::new();
        let mut current = id;
        loop {
            let (stripped, _) = self.strip_sugar(current)?;
            let data = tu.ty(stripped);
            let next = match data.kind {
                ref kind if kind.is_pointer_like() => {
                    dimensions.push(Dimension::Indirection);
                    data.pointee
                }
                TypeKind::ConstantArray | TypeKind::Vector => {
                    dimensions.push(Dimension::Count(data.element_count.unwrap_or(0)));
                    data.element
                }
                TypeKind::IncompleteArray | TypeKind::VariableArray => {
                    dimensions.push(Dimension::Indirection);
                    data.element
                }
                _ => break,
            };
            current = next.ok_or_else(|| Error::UnrecognizedType {
                kind: format!("{:?}", data.kind),
                spelling: data.spelling.clone(),
            })?;
        }

        let raw_element = tu.ty(current);
        let element = self.normalize(current)?;
        trace!("Flattened `{}` into {:?} over `{}`", spelling, dimensions, element.spelling);

        // Positional spellings of anonymous elements are replaced by their synthesized ones
        let spelling = if !raw_element.spelling.is_empty() && raw_element.spelling != element.spelling {
            spelling.replace(&raw_element.spelling, &element.spelling)
        } else {
            spelling
        };

        let indirection = Indirection {
            dimensions,
            element: Box::new(element),
        };
        let base = indirection.element.base.clone();
        let shape = match top {
            ref kind if kind.is_pointer_like() => Shape::Pointer(indirection),
            TypeKind::Vector => Shape::Vector(indirection),
            _ => Shape::Array(indirection),
        };

        Ok(TypeNode {
            spelling,
            base,
            size,
            qualifiers,
            shape,
        })
    }

    fn function(
        &mut self,
        data: &TypeData,
        spelling: String,
        qualifiers: Qualifiers,
        size: Option<u64>,
    ) -> Result<TypeNode> {
        let result = data.result.ok_or_else(|| {
            Error::Frontend(format!("function type `{}` has no result type", data.spelling))
        })?;
        let return_type = self.normalize(result)?;

        let mut arguments = Vec::with_capacity(data.arguments.len());
        for &arg in &data.arguments {
            arguments.push(Argument {
                name: None,
                ty: self.normalize(arg)?,
            });
        }

        Ok(TypeNode {
            base: spelling.clone(),
            spelling,
            size,
            qualifiers,
            shape: Shape::Function(FunctionSignature {
                return_type: Box::new(return_type),
                arguments,
                variadic: data.kind == TypeKind::FunctionProto && data.variadic,
            }),
        })
    }

    fn declared(
        &mut self,
        data: &TypeData,
        spelling: String,
        qualifiers: Qualifiers,
        size: Option<u64>,
    ) -> Result<TypeNode> {
        let tu = self.tu;
        let decl_cursor = data.declaration.ok_or_else(|| Error::MissingDeclaration {
            spelling: data.spelling.clone(),
        })?;
        let cursor = tu.cursor(decl_cursor);

        let kind = match (&data.kind, cursor.kind) {
            (TypeKind::Enum, _) => DeclaredKind::Enum,
            (TypeKind::Typedef, _) => DeclaredKind::Typedef,
            (_, CursorKind::UnionDecl) => DeclaredKind::Union,
            _ => DeclaredKind::Struct,
        };

        let key = identity_key(cursor);
        let id = match self.registry.lookup(&key) {
            Some(id) => id,
            None => self.declare(key, kind, data, decl_cursor)?,
        };

        let decl = self.registry.get(id).ok_or_else(|| Error::MissingDeclaration {
            spelling: data.spelling.clone(),
        })?;

        let (spelling, base) = if decl.anonymous {
            (
                format!("{}{}", qualifiers.prefix(), decl.spelling),
                decl.spelling.clone(),
            )
        } else {
            let base = base_name(&spelling);
            (spelling, base)
        };

        Ok(TypeNode {
            spelling,
            base,
            size: size.or(decl.size),
            qualifiers,
            shape: Shape::Declared(DeclRef {
                id,
                kind,
                name: decl.name.clone(),
                anonymous: decl.anonymous,
            }),
        })
    }

    /// Register a new declaration, then resolve its members
    fn declare(
        &mut self,
        key: String,
        kind: DeclaredKind,
        data: &TypeData,
        decl_cursor: CursorId,
    ) -> Result<DeclId> {
        let tu = self.tu;
        let cursor = tu.cursor(decl_cursor);
        let (name, spelling, anonymous) = naming(kind, data, cursor);

        let source = if self.include_source {
            cursor.extent.as_ref().and_then(|e| self.sources.excerpt(e))
        } else {
            None
        };

        let id = self.registry.reserve(
            key,
            Reservation {
                kind,
                name,
                spelling,
                anonymous,
                size: data.size,
                source,
            },
        );

        let body = match kind {
            DeclaredKind::Struct | DeclaredKind::Union => TypeBody::Record {
                fields: self.fields(cursor)?,
            },
            DeclaredKind::Enum => {
                let underlying = cursor.underlying_type.ok_or_else(|| {
                    Error::Frontend(format!("enum `{}` has no underlying type", data.spelling))
                })?;
                TypeBody::Enum {
                    underlying: self.normalize(underlying)?,
                    values: enum_values(tu, cursor),
                }
            }
            DeclaredKind::Typedef => {
                let aliased = cursor.underlying_type.ok_or_else(|| {
                    Error::Frontend(format!("typedef `{}` has no underlying type", data.spelling))
                })?;
                TypeBody::Typedef {
                    aliased: self.normalize(aliased)?,
                }
            }
        };

        self.registry.complete(id, body);
        Ok(id)
    }

    fn fields(&mut self, record: &Cursor) -> Result<Vec<Field>> {
        let tu = self.tu;
        let mut fields = Vec::with_capacity(record.children.len());

        for &child in &record.children {
            let field = tu.cursor(child);
            if field.kind != CursorKind::FieldDecl {
                continue;
            }
            match field.ty {
                Some(ty) => fields.push(Field {
                    name: field.name.clone(),
                    ty: self.normalize(ty)?,
                }),
                None => trace!("Field `{}` has no type, skipping", field.name),
            }
        }

        Ok(fields)
    }
}

fn qualifiers_of(data: &TypeData) -> Qualifiers {
    Qualifiers {
        is_const: data.is_const,
        is_volatile: data.is_volatile,
        is_restrict: data.is_restrict,
    }
}

fn builtin_integer(data: &TypeData) -> Option<Shape> {
    let name = base_name(&data.spelling);
    if BUILTIN_INTS.contains(&name.as_str()) {
        Some(Shape::Int)
    } else if BUILTIN_UINTS.contains(&name.as_str()) {
        Some(Shape::UInt)
    } else {
        None
    }
}

fn is_builtin_definition(data: &TypeData) -> bool {
    let name = base_name(&data.spelling);
    if BUILTIN_DEFINITIONS.contains(&name.as_str()) {
        return true;
    }
    data.kind == TypeKind::Record && {
        let tagged = format!("struct {}", strip_tag_keyword(&name));
        BUILTIN_DEFINITIONS.contains(&tagged.as_str())
    }
}

/// Name, unqualified spelling and anonymity of a declaration
fn naming(kind: DeclaredKind, data: &TypeData, cursor: &Cursor) -> (String, String, bool) {
    let spelling = base_name(&data.spelling);

    if kind == DeclaredKind::Typedef {
        let name = if cursor.name.is_empty() {
            spelling.clone()
        } else {
            cursor.name.clone()
        };
        return (name, spelling, false);
    }

    let tagless = strip_tag_keyword(&spelling);
    let anonymous = cursor.anonymous || tagless.is_empty() || is_positional_name(tagless);
    if !anonymous {
        return (tagless.to_string(), spelling.clone(), false);
    }

    let positional = match (&cursor.location, tagless.is_empty()) {
        (Some(loc), true) => loc.to_string(),
        _ => tagless.to_string(),
    };
    let name = synthesize_name(&positional);
    let spelling = match kind.keyword() {
        Some(keyword) => format!("{} {}", keyword, name),
        None => name.clone(),
    };
    (name, spelling, true)
}

fn enum_values(tu: &TranslationUnit, decl: &Cursor) -> Vec<EnumValue> {
    decl.children
        .iter()
        .map(|&id| tu.cursor(id))
        .filter(|c| c.kind == CursorKind::EnumConstantDecl)
        .map(|c| EnumValue {
            name: c.name.clone(),
            value: c.enum_value.clone().unwrap_or(ConstValue::Signed(0)),
        })
        .collect()
}
