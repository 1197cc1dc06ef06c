//! Output record schema
//!
//! Records are the only contract downstream generators rely on. Field names
//! and the `kind` tags must stay stable for the same inputs.

use serde::{Deserialize, Serialize};

use crate::types::{ConstValue, Dimension, TypeClass};

fn is_false(b: &bool) -> bool {
    !*b
}

/// One entry of the output document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Record {
    Var {
        name: String,
        #[serde(rename = "type")]
        ty: TypeRecord,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        source: Option<String>,
    },
    Function {
        name: String,
        return_type: TypeRecord,
        arguments: Vec<ArgumentRecord>,
        #[serde(default, skip_serializing_if = "is_false")]
        variadic: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        source: Option<String>,
    },
    Const {
        name: String,
        #[serde(rename = "type")]
        ty: TypeRecord,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        value: Option<ConstValue>,
    },
    Struct(AggregateRecord),
    Union(AggregateRecord),
    Enum(EnumRecord),
    Typedef(TypedefRecord),
}

impl Record {
    pub fn name(&self) -> &str {
        match self {
            Record::Var { name, .. }
            | Record::Function { name, .. }
            | Record::Const { name, .. } => name,
            Record::Struct(r) | Record::Union(r) => &r.name,
            Record::Enum(r) => &r.name,
            Record::Typedef(r) => &r.name,
        }
    }

    /// The `kind` tag this record serializes with
    pub fn kind(&self) -> &'static str {
        match self {
            Record::Var { .. } => "var",
            Record::Function { .. } => "function",
            Record::Const { .. } => "const",
            Record::Struct(_) => "struct",
            Record::Union(_) => "union",
            Record::Enum(_) => "enum",
            Record::Typedef(_) => "typedef",
        }
    }
}

/// Body of a `struct` or `union` record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateRecord {
    pub name: String,
    pub spelling: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub anonymous: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub opaque: bool,
    pub fields: Vec<FieldRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnumRecord {
    pub name: String,
    pub spelling: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub anonymous: bool,
    pub underlying_type: TypeRecord,
    pub values: Vec<EnumeratorRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypedefRecord {
    pub name: String,
    pub spelling: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    pub aliased_type: TypeRecord,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldRecord {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: TypeRecord,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnumeratorRecord {
    pub name: String,
    pub value: ConstValue,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArgumentRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub ty: TypeRecord,
}

/// A type reference inside a record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TypeRecord {
    /// Plain spelling, e.g. `"const char *"`
    Spelling(String),
    Object(Box<TypeObject>),
}

impl TypeRecord {
    pub fn spelling(&self) -> &str {
        match self {
            TypeRecord::Spelling(s) => s,
            TypeRecord::Object(obj) => &obj.spelling,
        }
    }

    pub fn as_object(&self) -> Option<&TypeObject> {
        match self {
            TypeRecord::Object(obj) => Some(obj),
            TypeRecord::Spelling(_) => None,
        }
    }
}

/// Structural type reference. Declared types only carry their name, never
/// their fields or enumerators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeObject {
    pub kind: TypeClass,
    pub spelling: String,
    pub base: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(rename = "const", default, skip_serializing_if = "is_false")]
    pub is_const: bool,
    #[serde(rename = "volatile", default, skip_serializing_if = "is_false")]
    pub is_volatile: bool,
    #[serde(rename = "restrict", default, skip_serializing_if = "is_false")]
    pub is_restrict: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub anonymous: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dimensions: Option<Vec<Dimension>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub element_type: Option<TypeRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_signature: Option<SignatureRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub return_type: Option<TypeRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arguments: Option<Vec<ArgumentRecord>>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub variadic: bool,
}

impl TypeObject {
    /// A bare object with only the always-present keys filled
    pub fn new(kind: TypeClass, spelling: impl Into<String>, base: impl Into<String>) -> Self {
        Self {
            kind,
            spelling: spelling.into(),
            base: base.into(),
            size: None,
            is_const: false,
            is_volatile: false,
            is_restrict: false,
            name: None,
            anonymous: false,
            dimensions: None,
            element_type: None,
            function_signature: None,
            return_type: None,
            arguments: None,
            variadic: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignatureRecord {
    pub return_type: TypeRecord,
    pub arguments: Vec<ArgumentRecord>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub variadic: bool,
}
