//! Normalized type graph and declarations
//!
//! A [`TypeNode`] is the canonical form of one use of a type. Structs,
//! unions, enums and typedefs are stored once as [`TypeDecl`]s and every use
//! site refers to them through a [`DeclRef`], so recursive types form a graph
//! rather than an infinite tree.

use serde::{Deserialize, Serialize};

/// Index of a type declaration inside one extraction run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DeclId(pub u32);

/// The fixed kind taxonomy of normalized types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TypeClass {
    Void,
    Bool,
    Char,
    Int,
    UInt,
    Float,
    Pointer,
    Array,
    Vector,
    Function,
    Struct,
    Union,
    Enum,
    Typedef,
    /// Frontend types with no structural counterpart, and the builtin C library types
    Opaque,
}

impl TypeClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            TypeClass::Void => "void",
            TypeClass::Bool => "bool",
            TypeClass::Char => "char",
            TypeClass::Int => "int",
            TypeClass::UInt => "uint",
            TypeClass::Float => "float",
            TypeClass::Pointer => "pointer",
            TypeClass::Array => "array",
            TypeClass::Vector => "vector",
            TypeClass::Function => "function",
            TypeClass::Struct => "struct",
            TypeClass::Union => "union",
            TypeClass::Enum => "enum",
            TypeClass::Typedef => "typedef",
            TypeClass::Opaque => "opaque",
        }
    }
}

impl std::fmt::Display for TypeClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kinds of declared (registered) types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeclaredKind {
    Struct,
    Union,
    Enum,
    Typedef,
}

impl DeclaredKind {
    pub fn class(&self) -> TypeClass {
        match self {
            DeclaredKind::Struct => TypeClass::Struct,
            DeclaredKind::Union => TypeClass::Union,
            DeclaredKind::Enum => TypeClass::Enum,
            DeclaredKind::Typedef => TypeClass::Typedef,
        }
    }

    /// Tag keyword used in C spellings, if any
    pub fn keyword(&self) -> Option<&'static str> {
        match self {
            DeclaredKind::Struct => Some("struct"),
            DeclaredKind::Union => Some("union"),
            DeclaredKind::Enum => Some("enum"),
            DeclaredKind::Typedef => None,
        }
    }

    pub fn is_record(&self) -> bool {
        matches!(self, DeclaredKind::Struct | DeclaredKind::Union)
    }
}

/// cv-qualifiers carried by one type node
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Qualifiers {
    pub is_const: bool,
    pub is_volatile: bool,
    pub is_restrict: bool,
}

impl Qualifiers {
    pub fn is_empty(&self) -> bool {
        !(self.is_const || self.is_volatile || self.is_restrict)
    }

    /// Qualifiers as they prefix a spelling, e.g. `"const volatile "`
    pub fn prefix(&self) -> String {
        let mut prefix = String::new();
        if self.is_const {
            prefix.push_str("const ");
        }
        if self.is_volatile {
            prefix.push_str("volatile ");
        }
        if self.is_restrict {
            prefix.push_str("restrict ");
        }
        prefix
    }
}

impl std::ops::BitOr for Qualifiers {
    type Output = Qualifiers;

    fn bitor(self, rhs: Qualifiers) -> Qualifiers {
        Qualifiers {
            is_const: self.is_const || rhs.is_const,
            is_volatile: self.is_volatile || rhs.is_volatile,
            is_restrict: self.is_restrict || rhs.is_restrict,
        }
    }
}

/// One pointer or array layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dimension {
    /// Constant array or vector extent
    Count(u64),
    /// Pointer or array of unknown extent
    Indirection,
}

impl Serialize for Dimension {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Dimension::Count(n) => serializer.serialize_u64(*n),
            Dimension::Indirection => serializer.serialize_str("*"),
        }
    }
}

impl<'de> Deserialize<'de> for Dimension {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Count(u64),
            Marker(String),
        }

        match Repr::deserialize(deserializer)? {
            Repr::Count(n) => Ok(Dimension::Count(n)),
            Repr::Marker(m) if m == "*" => Ok(Dimension::Indirection),
            Repr::Marker(m) => Err(serde::de::Error::custom(format!(
                "invalid dimension `{}`",
                m
            ))),
        }
    }
}

/// A constant value, as evaluated by the frontend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConstValue {
    Signed(i64),
    Unsigned(u64),
    Float(f64),
    String(String),
}

/// Canonical form of one use of a type
#[derive(Debug, Clone, PartialEq)]
pub struct TypeNode {
    /// Spelling as written in source
    pub spelling: String,
    /// Unqualified leaf identifier, the cross-reference key
    pub base: String,
    /// Size in bytes, when the frontend could compute it
    pub size: Option<u64>,
    pub qualifiers: Qualifiers,
    pub shape: Shape,
}

/// Kind-specific part of a [`TypeNode`]
#[derive(Debug, Clone, PartialEq)]
pub enum Shape {
    Void,
    Bool,
    Char,
    Int,
    UInt,
    Float,
    Pointer(Indirection),
    Array(Indirection),
    Vector(Indirection),
    Function(FunctionSignature),
    /// Reference to a registered struct, union, enum or typedef
    Declared(DeclRef),
    /// Known only by spelling
    Opaque,
}

/// Flattened pointer/array layers over a single element type
#[derive(Debug, Clone, PartialEq)]
pub struct Indirection {
    /// Outermost layer first
    pub dimensions: Vec<Dimension>,
    /// The type left after stripping every layer
    pub element: Box<TypeNode>,
}

/// Return and argument types of a function type
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionSignature {
    pub return_type: Box<TypeNode>,
    pub arguments: Vec<Argument>,
    pub variadic: bool,
}

/// Function argument; unnamed inside bare function types
#[derive(Debug, Clone, PartialEq)]
pub struct Argument {
    pub name: Option<String>,
    pub ty: TypeNode,
}

/// Use-site reference to a [`TypeDecl`]
#[derive(Debug, Clone, PartialEq)]
pub struct DeclRef {
    pub id: DeclId,
    pub kind: DeclaredKind,
    pub name: String,
    pub anonymous: bool,
}

impl TypeNode {
    /// Kind of this node in the fixed taxonomy
    pub fn class(&self) -> TypeClass {
        match &self.shape {
            Shape::Void => TypeClass::Void,
            Shape::Bool => TypeClass::Bool,
            Shape::Char => TypeClass::Char,
            Shape::Int => TypeClass::Int,
            Shape::UInt => TypeClass::UInt,
            Shape::Float => TypeClass::Float,
            Shape::Pointer(_) => TypeClass::Pointer,
            Shape::Array(_) => TypeClass::Array,
            Shape::Vector(_) => TypeClass::Vector,
            Shape::Function(_) => TypeClass::Function,
            Shape::Declared(decl) => decl.kind.class(),
            Shape::Opaque => TypeClass::Opaque,
        }
    }

    pub fn indirection(&self) -> Option<&Indirection> {
        match &self.shape {
            Shape::Pointer(ind) | Shape::Array(ind) | Shape::Vector(ind) => Some(ind),
            _ => None,
        }
    }

    /// Layers of pointer/array indirection, outermost first
    pub fn dimensions(&self) -> &[Dimension] {
        self.indirection()
            .map(|ind| ind.dimensions.as_slice())
            .unwrap_or(&[])
    }

    /// Element type of pointers, arrays and vectors
    pub fn element_type(&self) -> Option<&TypeNode> {
        self.indirection().map(|ind| ind.element.as_ref())
    }

    /// Signature of a function type, or of the function a pointer points to
    pub fn function_signature(&self) -> Option<&FunctionSignature> {
        match &self.shape {
            Shape::Function(sig) => Some(sig),
            Shape::Pointer(ind) => match &ind.element.shape {
                Shape::Function(sig) => Some(sig),
                _ => None,
            },
            _ => None,
        }
    }

    pub fn declaration(&self) -> Option<&DeclRef> {
        match &self.shape {
            Shape::Declared(decl) => Some(decl),
            _ => None,
        }
    }

    pub fn is_integral(&self) -> bool {
        matches!(self.shape, Shape::Int | Shape::UInt)
    }

    pub fn is_unsigned(&self) -> bool {
        matches!(self.shape, Shape::UInt)
    }

    pub fn is_floating_point(&self) -> bool {
        matches!(self.shape, Shape::Float)
    }

    pub fn is_pointer(&self) -> bool {
        matches!(self.shape, Shape::Pointer(_))
    }

    pub fn is_array(&self) -> bool {
        matches!(self.shape, Shape::Array(_))
    }

    /// `char *` with a single level of indirection
    pub fn is_string(&self) -> bool {
        match &self.shape {
            Shape::Pointer(ind) => {
                ind.dimensions.len() == 1 && matches!(ind.element.shape, Shape::Char)
            }
            _ => false,
        }
    }

    /// Qualifiers of the innermost pointee or element, or of the node itself
    /// when it has no indirection. `const int *` reports const here while
    /// its own `qualifiers` do not.
    pub fn element_qualifiers(&self) -> Qualifiers {
        match self.element_type() {
            Some(element) => element.qualifiers,
            None => self.qualifiers,
        }
    }

    pub fn is_function_pointer(&self) -> bool {
        self.is_pointer() && self.function_signature().is_some()
    }

    pub fn is_variadic(&self) -> bool {
        matches!(&self.shape, Shape::Function(sig) if sig.variadic)
    }

    pub fn is_anonymous(&self) -> bool {
        self.declaration().map(|d| d.anonymous).unwrap_or(false)
    }
}

/// Named struct/union field
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub name: String,
    pub ty: TypeNode,
}

/// Enumerator
#[derive(Debug, Clone, PartialEq)]
pub struct EnumValue {
    pub name: String,
    pub value: ConstValue,
}

/// A registered struct, union, enum or typedef, emitted exactly once
#[derive(Debug, Clone, PartialEq)]
pub struct TypeDecl {
    pub id: DeclId,
    pub kind: DeclaredKind,
    /// User-given or synthesized name
    pub name: String,
    /// Unqualified spelling, `struct <name>` for anonymous records
    pub spelling: String,
    pub anonymous: bool,
    pub size: Option<u64>,
    pub source: Option<String>,
    pub body: TypeBody,
}

/// Structural body of a [`TypeDecl`]
#[derive(Debug, Clone, PartialEq)]
pub enum TypeBody {
    /// Registered, members still being resolved
    Pending,
    Record { fields: Vec<Field> },
    Enum {
        underlying: TypeNode,
        values: Vec<EnumValue>,
    },
    Typedef { aliased: TypeNode },
}

impl TypeDecl {
    /// A record with no visible fields
    pub fn is_opaque(&self) -> bool {
        match &self.body {
            TypeBody::Record { fields } => fields.is_empty(),
            _ => false,
        }
    }

    pub fn fields(&self) -> &[Field] {
        match &self.body {
            TypeBody::Record { fields } => fields,
            _ => &[],
        }
    }
}

/// Global variable
#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    pub name: String,
    pub ty: TypeNode,
    pub source: Option<String>,
}

/// Function declaration
#[derive(Debug, Clone, PartialEq)]
pub struct Function {
    pub name: String,
    pub return_type: TypeNode,
    pub arguments: Vec<Argument>,
    pub variadic: bool,
    pub source: Option<String>,
}

/// Constant from an object-like macro or an anonymous enum
#[derive(Debug, Clone, PartialEq)]
pub struct Constant {
    pub name: String,
    pub ty: TypeNode,
    pub value: Option<ConstValue>,
}

/// One extracted declaration
#[derive(Debug, Clone, PartialEq)]
pub enum Declaration {
    Type(TypeDecl),
    Variable(Variable),
    Function(Function),
    Constant(Constant),
}

impl Declaration {
    pub fn name(&self) -> &str {
        match self {
            Declaration::Type(t) => &t.name,
            Declaration::Variable(v) => &v.name,
            Declaration::Function(f) => &f.name,
            Declaration::Constant(c) => &c.name,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scalar(spelling: &str, shape: Shape) -> TypeNode {
        TypeNode {
            spelling: spelling.to_string(),
            base: spelling.to_string(),
            size: None,
            qualifiers: Qualifiers::default(),
            shape,
        }
    }

    fn pointer_to(element: TypeNode, dims: Vec<Dimension>) -> TypeNode {
        TypeNode {
            spelling: format!("{} *", element.spelling),
            base: element.base.clone(),
            size: Some(8),
            qualifiers: Qualifiers::default(),
            shape: Shape::Pointer(Indirection {
                dimensions: dims,
                element: Box::new(element),
            }),
        }
    }

    #[test]
    fn test_string_detection() {
        let s = pointer_to(scalar("char", Shape::Char), vec![Dimension::Indirection]);
        assert!(s.is_string());

        let argv = pointer_to(
            scalar("char", Shape::Char),
            vec![Dimension::Indirection, Dimension::Indirection],
        );
        assert!(!argv.is_string());
        assert_eq!(argv.dimensions().len(), 2);
    }

    #[test]
    fn test_element_qualifiers() {
        let mut element = scalar("const int", Shape::Int);
        element.qualifiers.is_const = true;
        let ptr = pointer_to(element, vec![Dimension::Indirection]);
        assert!(!ptr.qualifiers.is_const);
        assert!(ptr.element_qualifiers().is_const);

        let mut plain = scalar("volatile int", Shape::Int);
        plain.qualifiers.is_volatile = true;
        assert_eq!(plain.element_qualifiers(), plain.qualifiers);
    }

    #[test]
    fn test_function_pointer_signature() {
        let func = scalar(
            "int (int)",
            Shape::Function(FunctionSignature {
                return_type: Box::new(scalar("int", Shape::Int)),
                arguments: vec![Argument {
                    name: None,
                    ty: scalar("int", Shape::Int),
                }],
                variadic: false,
            }),
        );
        let ptr = pointer_to(func, vec![Dimension::Indirection]);

        assert!(ptr.is_function_pointer());
        assert_eq!(ptr.function_signature().unwrap().arguments.len(), 1);
        assert_eq!(ptr.class(), TypeClass::Pointer);
    }

    #[test]
    fn test_dimension_serde() {
        let dims = vec![Dimension::Count(3), Dimension::Indirection];
        let json = serde_json::to_string(&dims).unwrap();
        assert_eq!(json, r#"[3,"*"]"#);
        let back: Vec<Dimension> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, dims);
        assert!(serde_json::from_str::<Dimension>(r#""&""#).is_err());
    }

    #[test]
    fn test_qualifier_prefix() {
        let q = Qualifiers {
            is_const: true,
            is_volatile: true,
            is_restrict: false,
        };
        assert_eq!(q.prefix(), "const volatile ");
        assert!(Qualifiers::default().is_empty());
    }
}
