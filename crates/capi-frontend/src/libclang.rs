//! libclang AST loading
//!
//! Reads an `-emit-ast` artifact with libclang (loaded at runtime) and lowers
//! its top-level entities into an owned [`TranslationUnit`].

use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

use ::clang::{Clang, Entity, EntityKind, EvaluationResult, Index, Type, TypeKind as ClangKind};
use capi_core::{ConstValue, Extent, Location};
use tracing::{debug, trace};

use crate::ast::{Cursor, CursorId, CursorKind, TranslationUnit, TypeData, TypeId, TypeKind};
use crate::{AstLoader, FrontendError};

/// libclang-backed [`AstLoader`]
///
/// libclang is loaded per call and only one instance may be alive at a
/// time, so loads are serialized.
#[derive(Default)]
pub struct LibClangLoader {
    lock: Mutex<()>,
}

impl LibClangLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check that libclang can be loaded
    pub fn is_available(&self) -> bool {
        match self.lock.lock() {
            Ok(_guard) => Clang::new().is_ok(),
            Err(_) => false,
        }
    }
}

impl AstLoader for LibClangLoader {
    fn load(&self, path: &Path) -> Result<TranslationUnit, FrontendError> {
        let _guard = self
            .lock
            .lock()
            .map_err(|_| FrontendError::LibClang("loader lock poisoned".to_string()))?;

        let clang = Clang::new().map_err(FrontendError::LibClang)?;
        let index = Index::new(&clang, false, false);
        let tu = ::clang::TranslationUnit::from_ast(&index, path)
            .map_err(|_| FrontendError::AstLoad(format!("cannot read {}", path.display())))?;

        let mut lowering = Lowering::default();
        for entity in tu.get_entity().get_children() {
            let id = lowering.entity(entity);
            lowering.unit.push_root(id);
        }
        debug!("Loaded {} with libclang", path.display());

        Ok(lowering.unit)
    }

    fn name(&self) -> &str {
        "libclang"
    }
}

/// Entity-memoized lowering into the owned arena
#[derive(Default)]
struct Lowering<'tu> {
    unit: TranslationUnit,
    entities: HashMap<Entity<'tu>, CursorId>,
}

impl<'tu> Lowering<'tu> {
    fn entity(&mut self, entity: Entity<'tu>) -> CursorId {
        if let Some(&id) = self.entities.get(&entity) {
            return id;
        }

        let kind = cursor_kind(entity.get_kind());
        let mut cursor = Cursor::new(kind, entity.get_name().unwrap_or_default());
        cursor.usr = identity(&entity);
        cursor.location = location(&entity);
        cursor.extent = extent(&entity);
        cursor.anonymous = is_tag(kind) && entity.is_anonymous();

        // Registered before any member is visited so self-references resolve here
        let id = self.unit.add_cursor(cursor);
        self.entities.insert(entity, id);

        if kind == CursorKind::Other {
            return id;
        }

        let ty = entity.get_type();
        let ty_id = ty.map(|t| self.ty(t));
        self.unit.cursor_mut(id).ty = ty_id;

        match kind {
            CursorKind::FunctionDecl => {
                let result = entity.get_result_type().map(|t| self.ty(t));
                let arguments: Vec<CursorId> = entity
                    .get_arguments()
                    .unwrap_or_default()
                    .into_iter()
                    .map(|arg| self.entity(arg))
                    .collect();
                let cursor = self.unit.cursor_mut(id);
                cursor.result_type = result;
                cursor.arguments = arguments;
            }
            CursorKind::TypedefDecl => {
                let underlying = entity.get_typedef_underlying_type().map(|t| self.ty(t));
                self.unit.cursor_mut(id).underlying_type = underlying;
            }
            CursorKind::EnumDecl => {
                let underlying = entity.get_enum_underlying_type();
                let unsigned = underlying.map(|t| is_unsigned(&t)).unwrap_or(false);
                let underlying_id = underlying.map(|t| self.ty(t));
                let mut children = Vec::new();
                for constant in entity.get_children() {
                    if constant.get_kind() != EntityKind::EnumConstantDecl {
                        continue;
                    }
                    let child = self.entity(constant);
                    self.unit.cursor_mut(child).enum_value =
                        constant.get_enum_constant_value().map(|(signed, raw)| {
                            if unsigned {
                                ConstValue::Unsigned(raw)
                            } else {
                                ConstValue::Signed(signed)
                            }
                        });
                    children.push(child);
                }
                let cursor = self.unit.cursor_mut(id);
                cursor.underlying_type = underlying_id;
                cursor.children = children;
            }
            CursorKind::StructDecl | CursorKind::UnionDecl | CursorKind::ClassDecl => {
                let fields = entity
                    .get_children()
                    .into_iter()
                    .filter(|child| child.get_kind() == EntityKind::FieldDecl)
                    .map(|child| self.entity(child))
                    .collect();
                self.unit.cursor_mut(id).children = fields;
            }
            CursorKind::VarDecl => {
                if ty.map(|t| t.is_const_qualified()).unwrap_or(false) {
                    let value = entity.evaluate().and_then(evaluated);
                    self.unit.cursor_mut(id).evaluated = value;
                }
            }
            _ => {}
        }

        id
    }

    fn ty(&mut self, ty: Type<'tu>) -> TypeId {
        let kind = ty.get_kind();
        let mut data = TypeData::new(type_kind(kind), ty.get_display_name());
        data.size = ty.get_sizeof().ok().map(|s| s as u64);
        data.is_const = ty.is_const_qualified();
        data.is_volatile = ty.is_volatile_qualified();
        data.is_restrict = ty.is_restrict_qualified();

        match kind {
            ClangKind::Pointer
            | ClangKind::LValueReference
            | ClangKind::RValueReference
            | ClangKind::BlockPointer
            | ClangKind::ObjCObjectPointer => {
                data.pointee = ty.get_pointee_type().map(|t| self.ty(t));
            }
            ClangKind::ConstantArray
            | ClangKind::IncompleteArray
            | ClangKind::VariableArray
            | ClangKind::Vector => {
                data.element = ty.get_element_type().map(|t| self.ty(t));
                data.element_count = ty.get_size().map(|n| n as u64);
            }
            ClangKind::Elaborated => {
                data.named = ty.get_elaborated_type().map(|t| self.ty(t));
            }
            ClangKind::FunctionPrototype | ClangKind::FunctionNoPrototype => {
                data.result = ty.get_result_type().map(|t| self.ty(t));
                data.arguments = ty
                    .get_argument_types()
                    .unwrap_or_default()
                    .into_iter()
                    .map(|t| self.ty(t))
                    .collect();
                data.variadic = ty.is_variadic();
            }
            ClangKind::Record | ClangKind::Enum | ClangKind::Typedef => {
                data.declaration = ty
                    .get_declaration()
                    .map(|decl| decl.get_definition().unwrap_or(decl))
                    .map(|decl| self.entity(decl));
            }
            _ => {
                if matches!(data.kind, TypeKind::Unexposed | TypeKind::Auto | TypeKind::Unsupported(_)) {
                    let canonical = ty.get_canonical_type();
                    if canonical.get_kind() != kind {
                        trace!("Lowering {:?} `{}` through its canonical type", kind, data.spelling);
                        if let TypeKind::Unsupported(_) = data.kind {
                            data.kind = TypeKind::Unexposed;
                        }
                        data.named = Some(self.ty(canonical));
                    }
                }
            }
        }

        self.unit.add_type(data)
    }
}

fn cursor_kind(kind: EntityKind) -> CursorKind {
    match kind {
        EntityKind::VarDecl => CursorKind::VarDecl,
        EntityKind::FunctionDecl => CursorKind::FunctionDecl,
        EntityKind::ParmDecl => CursorKind::ParmDecl,
        EntityKind::TypedefDecl => CursorKind::TypedefDecl,
        EntityKind::StructDecl => CursorKind::StructDecl,
        EntityKind::UnionDecl => CursorKind::UnionDecl,
        EntityKind::ClassDecl => CursorKind::ClassDecl,
        EntityKind::EnumDecl => CursorKind::EnumDecl,
        EntityKind::EnumConstantDecl => CursorKind::EnumConstantDecl,
        EntityKind::FieldDecl => CursorKind::FieldDecl,
        _ => CursorKind::Other,
    }
}

fn type_kind(kind: ClangKind) -> TypeKind {
    match kind {
        ClangKind::Unexposed => TypeKind::Unexposed,
        ClangKind::Void => TypeKind::Void,
        ClangKind::Bool => TypeKind::Bool,
        ClangKind::CharS => TypeKind::CharS,
        ClangKind::CharU => TypeKind::CharU,
        ClangKind::SChar => TypeKind::SChar,
        ClangKind::UChar => TypeKind::UChar,
        ClangKind::WChar => TypeKind::WChar,
        ClangKind::Char16 => TypeKind::Char16,
        ClangKind::Char32 => TypeKind::Char32,
        ClangKind::Short => TypeKind::Short,
        ClangKind::UShort => TypeKind::UShort,
        ClangKind::Int => TypeKind::Int,
        ClangKind::UInt => TypeKind::UInt,
        ClangKind::Long => TypeKind::Long,
        ClangKind::ULong => TypeKind::ULong,
        ClangKind::LongLong => TypeKind::LongLong,
        ClangKind::ULongLong => TypeKind::ULongLong,
        ClangKind::Int128 => TypeKind::Int128,
        ClangKind::UInt128 => TypeKind::UInt128,
        ClangKind::Float => TypeKind::Float,
        ClangKind::Double => TypeKind::Double,
        ClangKind::LongDouble => TypeKind::LongDouble,
        ClangKind::Float128 => TypeKind::Float128,
        ClangKind::Half => TypeKind::Half,
        ClangKind::Float16 => TypeKind::Float16,
        ClangKind::Pointer => TypeKind::Pointer,
        ClangKind::LValueReference => TypeKind::LValueReference,
        ClangKind::RValueReference => TypeKind::RValueReference,
        ClangKind::BlockPointer => TypeKind::BlockPointer,
        ClangKind::ObjCObjectPointer => TypeKind::ObjCObjectPointer,
        ClangKind::Record => TypeKind::Record,
        ClangKind::Enum => TypeKind::Enum,
        ClangKind::Typedef => TypeKind::Typedef,
        ClangKind::FunctionPrototype => TypeKind::FunctionProto,
        ClangKind::FunctionNoPrototype => TypeKind::FunctionNoProto,
        ClangKind::ConstantArray => TypeKind::ConstantArray,
        ClangKind::IncompleteArray => TypeKind::IncompleteArray,
        ClangKind::VariableArray => TypeKind::VariableArray,
        ClangKind::Vector => TypeKind::Vector,
        ClangKind::Elaborated => TypeKind::Elaborated,
        ClangKind::Auto => TypeKind::Auto,
        other => TypeKind::Unsupported(format!("{:?}", other)),
    }
}

fn is_tag(kind: CursorKind) -> bool {
    matches!(
        kind,
        CursorKind::StructDecl | CursorKind::UnionDecl | CursorKind::ClassDecl | CursorKind::EnumDecl
    )
}

fn is_unsigned(ty: &Type<'_>) -> bool {
    matches!(
        ty.get_canonical_type().get_kind(),
        ClangKind::Bool
            | ClangKind::CharU
            | ClangKind::UChar
            | ClangKind::UShort
            | ClangKind::UInt
            | ClangKind::ULong
            | ClangKind::ULongLong
            | ClangKind::UInt128
    )
}

fn identity(entity: &Entity<'_>) -> String {
    if let Some(usr) = entity.get_usr() {
        if !usr.0.is_empty() {
            return usr.0;
        }
    }
    let (file, offset) = location(entity)
        .map(|loc| (loc.file, loc.offset))
        .unwrap_or_default();
    format!("{:?}@{}:{}", entity.get_kind(), file, offset)
}

fn location(entity: &Entity<'_>) -> Option<Location> {
    let loc = entity.get_location()?.get_file_location();
    let file = loc.file?;
    Some(Location::new(
        file.get_path().display().to_string(),
        loc.line,
        loc.column,
        loc.offset,
    ))
}

fn extent(entity: &Entity<'_>) -> Option<Extent> {
    let range = entity.get_range()?;
    let start = range.get_start().get_file_location();
    let end = range.get_end().get_file_location();
    let file = start.file?;
    Some(Extent::new(
        file.get_path().display().to_string(),
        start.offset,
        end.offset,
    ))
}

fn evaluated(result: EvaluationResult) -> Option<ConstValue> {
    match result {
        EvaluationResult::SignedInteger(v) => Some(ConstValue::Signed(v)),
        EvaluationResult::UnsignedInteger(v) => Some(ConstValue::Unsigned(v)),
        EvaluationResult::Float(v) => Some(ConstValue::Float(v)),
        EvaluationResult::String(s) => Some(ConstValue::String(s.to_string_lossy().into_owned())),
        _ => None,
    }
}
