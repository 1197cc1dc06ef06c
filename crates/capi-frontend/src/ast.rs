//! Owned translation unit model
//!
//! A [`TranslationUnit`] is an arena of cursors and types lowered from the
//! frontend. Cursors and types refer to each other by index, which keeps
//! recursive records finite and lets a unit be written to and read back
//! from JSON.

use capi_core::{ConstValue, Extent, Location};
use serde::{Deserialize, Serialize};

/// Index of a cursor inside its translation unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CursorId(pub u32);

/// Index of a type inside its translation unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TypeId(pub u32);

/// Cursor kinds the extractor distinguishes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CursorKind {
    VarDecl,
    FunctionDecl,
    ParmDecl,
    TypedefDecl,
    StructDecl,
    UnionDecl,
    ClassDecl,
    EnumDecl,
    EnumConstantDecl,
    FieldDecl,
    #[default]
    Other,
}

/// Raw type kinds, following libclang's taxonomy
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TypeKind {
    #[default]
    Invalid,
    Unexposed,
    Void,
    Bool,
    CharS,
    CharU,
    SChar,
    UChar,
    WChar,
    Char16,
    Char32,
    Short,
    UShort,
    Int,
    UInt,
    Long,
    ULong,
    LongLong,
    ULongLong,
    Int128,
    UInt128,
    Float,
    Double,
    LongDouble,
    Float128,
    Half,
    Float16,
    Pointer,
    LValueReference,
    RValueReference,
    BlockPointer,
    ObjCObjectPointer,
    Record,
    Enum,
    Typedef,
    FunctionProto,
    FunctionNoProto,
    ConstantArray,
    IncompleteArray,
    VariableArray,
    Vector,
    Elaborated,
    Auto,
    /// A kind the lowering has no mapping for
    Unsupported(String),
}

impl TypeKind {
    pub fn is_function(&self) -> bool {
        matches!(self, TypeKind::FunctionProto | TypeKind::FunctionNoProto)
    }

    /// Kinds whose single layer is reached through `pointee`
    pub fn is_pointer_like(&self) -> bool {
        matches!(
            self,
            TypeKind::Pointer
                | TypeKind::LValueReference
                | TypeKind::RValueReference
                | TypeKind::BlockPointer
                | TypeKind::ObjCObjectPointer
        )
    }

    /// Kinds that only wrap another type
    pub fn is_sugar(&self) -> bool {
        matches!(self, TypeKind::Elaborated | TypeKind::Auto | TypeKind::Unexposed)
    }
}

/// A declaration cursor
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Cursor {
    pub kind: CursorKind,
    pub name: String,
    /// Identity key of the declared entity
    pub usr: String,
    pub location: Option<Location>,
    pub extent: Option<Extent>,
    pub ty: Option<TypeId>,
    pub anonymous: bool,
    /// Fields of a record, enumerators of an enum
    pub children: Vec<CursorId>,
    /// Parameters of a function
    pub arguments: Vec<CursorId>,
    pub result_type: Option<TypeId>,
    /// Aliased type of a typedef, integer type of an enum
    pub underlying_type: Option<TypeId>,
    pub enum_value: Option<ConstValue>,
    /// Value of a constant initializer, when the frontend could evaluate it
    pub evaluated: Option<ConstValue>,
}

impl Cursor {
    pub fn new(kind: CursorKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
            ..Self::default()
        }
    }

    /// File the cursor was declared in
    pub fn file(&self) -> Option<&str> {
        self.location.as_ref().map(|loc| loc.file.as_str())
    }
}

/// A type as reported by the frontend
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TypeData {
    pub kind: TypeKind,
    pub spelling: String,
    pub size: Option<u64>,
    pub is_const: bool,
    pub is_volatile: bool,
    pub is_restrict: bool,
    pub pointee: Option<TypeId>,
    pub element: Option<TypeId>,
    pub element_count: Option<u64>,
    /// Target of elaborated, auto and unexposed types
    pub named: Option<TypeId>,
    pub result: Option<TypeId>,
    pub arguments: Vec<TypeId>,
    pub variadic: bool,
    /// Declaration of record, enum and typedef types
    pub declaration: Option<CursorId>,
}

impl TypeData {
    pub fn new(kind: TypeKind, spelling: impl Into<String>) -> Self {
        Self {
            kind,
            spelling: spelling.into(),
            ..Self::default()
        }
    }
}

/// One parsed translation unit
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TranslationUnit {
    cursors: Vec<Cursor>,
    types: Vec<TypeData>,
    root: Vec<CursorId>,
}

impl TranslationUnit {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_cursor(&mut self, cursor: Cursor) -> CursorId {
        let id = CursorId(self.cursors.len() as u32);
        self.cursors.push(cursor);
        id
    }

    pub fn add_type(&mut self, ty: TypeData) -> TypeId {
        let id = TypeId(self.types.len() as u32);
        self.types.push(ty);
        id
    }

    pub fn cursor_mut(&mut self, id: CursorId) -> &mut Cursor {
        &mut self.cursors[id.0 as usize]
    }

    pub fn type_mut(&mut self, id: TypeId) -> &mut TypeData {
        &mut self.types[id.0 as usize]
    }

    /// Append a top-level cursor
    pub fn push_root(&mut self, id: CursorId) {
        self.root.push(id);
    }

    pub fn cursor(&self, id: CursorId) -> &Cursor {
        &self.cursors[id.0 as usize]
    }

    pub fn ty(&self, id: TypeId) -> &TypeData {
        &self.types[id.0 as usize]
    }

    /// Direct children of the translation unit, in source order
    pub fn root_children(&self) -> impl Iterator<Item = (CursorId, &Cursor)> + '_ {
        self.root.iter().map(move |&id| (id, self.cursor(id)))
    }

    /// Check that every index points into the arena
    pub fn validate(&self) -> Result<(), String> {
        let cursor_ok = |id: &CursorId| (id.0 as usize) < self.cursors.len();
        let type_ok = |id: &TypeId| (id.0 as usize) < self.types.len();

        if let Some(id) = self.root.iter().find(|id| !cursor_ok(id)) {
            return Err(format!("root cursor {} out of range", id.0));
        }
        for (i, c) in self.cursors.iter().enumerate() {
            let mut types = c.ty.iter().chain(&c.result_type).chain(&c.underlying_type);
            let mut cursors = c.children.iter().chain(&c.arguments);
            if types.any(|t| !type_ok(t)) || cursors.any(|c| !cursor_ok(c)) {
                return Err(format!("cursor {} has a dangling reference", i));
            }
        }
        for (i, t) in self.types.iter().enumerate() {
            let mut types = t
                .pointee
                .iter()
                .chain(&t.element)
                .chain(&t.named)
                .chain(&t.result)
                .chain(&t.arguments);
            if types.any(|t| !type_ok(t)) || t.declaration.iter().any(|c| !cursor_ok(c)) {
                return Err(format!("type {} has a dangling reference", i));
            }
        }
        Ok(())
    }
}
