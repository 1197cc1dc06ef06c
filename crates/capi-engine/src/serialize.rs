//! Rendering of declarations into output records

use capi_core::config::OutputConfig;
use capi_core::record::{
    AggregateRecord, ArgumentRecord, EnumRecord, EnumeratorRecord, FieldRecord, Record,
    SignatureRecord, TypeObject, TypedefRecord,
};
use capi_core::{
    Argument, Declaration, DeclaredKind, FunctionSignature, Shape, TypeBody, TypeDecl, TypeNode,
    TypeRecord,
};

/// What the records carry
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SerializeOptions {
    /// Structural type objects instead of spelling strings
    pub type_objects: bool,
    pub include_size: bool,
    pub include_source: bool,
}

impl From<&OutputConfig> for SerializeOptions {
    fn from(config: &OutputConfig) -> Self {
        Self {
            type_objects: config.type_objects,
            include_size: config.include_size,
            include_source: config.include_source,
        }
    }
}

/// Render `declarations` in order. Types whose members never resolved are
/// left out.
pub fn serialize(declarations: &[Declaration], opts: &SerializeOptions) -> Vec<Record> {
    declarations
        .iter()
        .filter_map(|decl| declaration_record(decl, opts))
        .collect()
}

fn declaration_record(decl: &Declaration, opts: &SerializeOptions) -> Option<Record> {
    let source = |source: &Option<String>| {
        if opts.include_source {
            source.clone()
        } else {
            None
        }
    };

    let record = match decl {
        Declaration::Type(decl) => return type_decl_record(decl, opts),
        Declaration::Variable(var) => Record::Var {
            name: var.name.clone(),
            ty: type_record(&var.ty, opts),
            source: source(&var.source),
        },
        Declaration::Function(function) => Record::Function {
            name: function.name.clone(),
            return_type: type_record(&function.return_type, opts),
            arguments: arguments(&function.arguments, opts),
            variadic: function.variadic,
            source: source(&function.source),
        },
        Declaration::Constant(constant) => Record::Const {
            name: constant.name.clone(),
            ty: type_record(&constant.ty, opts),
            value: constant.value.clone(),
        },
    };
    Some(record)
}

fn type_decl_record(decl: &TypeDecl, opts: &SerializeOptions) -> Option<Record> {
    let size = decl.size.filter(|_| opts.include_size);
    let source = decl.source.clone().filter(|_| opts.include_source);

    let record = match (&decl.body, decl.kind) {
        (TypeBody::Pending, _) => return None,
        (TypeBody::Record { fields }, kind) => {
            let aggregate = AggregateRecord {
                name: decl.name.clone(),
                spelling: decl.spelling.clone(),
                size,
                anonymous: decl.anonymous,
                opaque: fields.is_empty(),
                fields: fields
                    .iter()
                    .map(|field| FieldRecord {
                        name: field.name.clone(),
                        ty: type_record(&field.ty, opts),
                    })
                    .collect(),
                source,
            };
            match kind {
                DeclaredKind::Union => Record::Union(aggregate),
                _ => Record::Struct(aggregate),
            }
        }
        (TypeBody::Enum { underlying, values }, _) => Record::Enum(EnumRecord {
            name: decl.name.clone(),
            spelling: decl.spelling.clone(),
            size,
            anonymous: decl.anonymous,
            underlying_type: type_record(underlying, opts),
            values: values
                .iter()
                .map(|v| EnumeratorRecord {
                    name: v.name.clone(),
                    value: v.value.clone(),
                })
                .collect(),
            source,
        }),
        (TypeBody::Typedef { aliased }, _) => Record::Typedef(TypedefRecord {
            name: decl.name.clone(),
            spelling: decl.spelling.clone(),
            size,
            aliased_type: type_record(aliased, opts),
            source,
        }),
    };
    Some(record)
}

fn arguments(arguments: &[Argument], opts: &SerializeOptions) -> Vec<ArgumentRecord> {
    arguments
        .iter()
        .map(|arg| ArgumentRecord {
            name: arg.name.clone(),
            ty: type_record(&arg.ty, opts),
        })
        .collect()
}

fn signature(sig: &FunctionSignature, opts: &SerializeOptions) -> SignatureRecord {
    SignatureRecord {
        return_type: type_record(&sig.return_type, opts),
        arguments: arguments(&sig.arguments, opts),
        variadic: sig.variadic,
    }
}

/// Reference to a type. Declared types never repeat their body here.
pub fn type_record(node: &TypeNode, opts: &SerializeOptions) -> TypeRecord {
    if !opts.type_objects {
        return TypeRecord::Spelling(node.spelling.clone());
    }

    let mut object = TypeObject::new(node.class(), node.spelling.clone(), node.base.clone());
    if opts.include_size {
        object.size = node.size;
    }
    object.is_const = node.qualifiers.is_const;
    object.is_volatile = node.qualifiers.is_volatile;
    object.is_restrict = node.qualifiers.is_restrict;

    match &node.shape {
        Shape::Pointer(ind) | Shape::Array(ind) | Shape::Vector(ind) => {
            object.dimensions = Some(ind.dimensions.clone());
            object.element_type = Some(type_record(&ind.element, opts));
            if let Shape::Function(sig) = &ind.element.shape {
                if node.is_pointer() {
                    object.function_signature = Some(signature(sig, opts));
                }
            }
        }
        Shape::Function(sig) => {
            object.return_type = Some(type_record(&sig.return_type, opts));
            object.arguments = Some(arguments(&sig.arguments, opts));
            object.variadic = sig.variadic;
        }
        Shape::Declared(decl) => {
            object.name = Some(decl.name.clone());
            object.anonymous = decl.anonymous;
        }
        _ => {}
    }

    TypeRecord::Object(Box::new(object))
}

#[cfg(test)]
mod tests {
    use super::*;
    use capi_core::{
        ConstValue, Constant, DeclId, DeclRef, Dimension, Field, Indirection, Qualifiers,
        Variable,
    };
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn leaf(spelling: &str, shape: Shape) -> TypeNode {
        TypeNode {
            spelling: spelling.to_string(),
            base: spelling.to_string(),
            size: Some(4),
            qualifiers: Qualifiers::default(),
            shape,
        }
    }

    fn point_ref() -> TypeNode {
        TypeNode {
            spelling: "struct Point".to_string(),
            base: "struct Point".to_string(),
            size: Some(8),
            qualifiers: Qualifiers::default(),
            shape: Shape::Declared(DeclRef {
                id: DeclId(0),
                kind: DeclaredKind::Struct,
                name: "Point".to_string(),
                anonymous: false,
            }),
        }
    }

    fn point_decl() -> Declaration {
        Declaration::Type(TypeDecl {
            id: DeclId(0),
            kind: DeclaredKind::Struct,
            name: "Point".to_string(),
            spelling: "struct Point".to_string(),
            anonymous: false,
            size: Some(8),
            source: Some("struct Point { int x, y; }".to_string()),
            body: TypeBody::Record {
                fields: vec![
                    Field {
                        name: "x".to_string(),
                        ty: leaf("int", Shape::Int),
                    },
                    Field {
                        name: "y".to_string(),
                        ty: leaf("int", Shape::Int),
                    },
                ],
            },
        })
    }

    #[test]
    fn test_spelling_records() {
        let decls = vec![
            point_decl(),
            Declaration::Variable(Variable {
                name: "origin".to_string(),
                ty: point_ref(),
                source: Some("struct Point origin".to_string()),
            }),
        ];
        let records = serialize(&decls, &SerializeOptions::default());

        assert_eq!(
            serde_json::to_value(&records).unwrap(),
            json!([
                {
                    "kind": "struct",
                    "name": "Point",
                    "spelling": "struct Point",
                    "fields": [
                        {"name": "x", "type": "int"},
                        {"name": "y", "type": "int"}
                    ]
                },
                {"kind": "var", "name": "origin", "type": "struct Point"}
            ])
        );
    }

    #[test]
    fn test_declared_reference_omits_body() {
        let opts = SerializeOptions {
            type_objects: true,
            include_size: true,
            include_source: false,
        };
        let value = serde_json::to_value(type_record(&point_ref(), &opts)).unwrap();
        assert_eq!(
            value,
            json!({
                "kind": "struct",
                "spelling": "struct Point",
                "base": "struct Point",
                "size": 8,
                "name": "Point"
            })
        );
    }

    #[test]
    fn test_function_pointer_object() {
        let callback = TypeNode {
            spelling: "void (*)(int)".to_string(),
            base: "void (*)(int)".to_string(),
            size: Some(8),
            qualifiers: Qualifiers::default(),
            shape: Shape::Pointer(Indirection {
                dimensions: vec![Dimension::Indirection],
                element: Box::new(TypeNode {
                    spelling: "void (int)".to_string(),
                    base: "void (int)".to_string(),
                    size: None,
                    qualifiers: Qualifiers::default(),
                    shape: Shape::Function(FunctionSignature {
                        return_type: Box::new(leaf("void", Shape::Void)),
                        arguments: vec![Argument {
                            name: None,
                            ty: leaf("int", Shape::Int),
                        }],
                        variadic: false,
                    }),
                }),
            }),
        };

        let opts = SerializeOptions {
            type_objects: true,
            ..SerializeOptions::default()
        };
        let record = type_record(&callback, &opts);
        let object = record.as_object().unwrap();
        assert_eq!(object.dimensions, Some(vec![Dimension::Indirection]));
        let sig = object.function_signature.as_ref().unwrap();
        assert_eq!(sig.return_type.spelling(), "void");
        assert_eq!(sig.arguments.len(), 1);
        assert!(object.size.is_none());
    }

    #[test]
    fn test_source_and_size_are_opt_in() {
        let decls = vec![point_decl()];
        let bare = serialize(&decls, &SerializeOptions::default());
        match &bare[0] {
            Record::Struct(r) => {
                assert!(r.source.is_none());
                assert!(r.size.is_none());
            }
            other => panic!("unexpected record {:?}", other),
        }

        let full = serialize(
            &decls,
            &SerializeOptions {
                include_size: true,
                include_source: true,
                ..SerializeOptions::default()
            },
        );
        match &full[0] {
            Record::Struct(r) => {
                assert_eq!(r.size, Some(8));
                assert_eq!(r.source.as_deref(), Some("struct Point { int x, y; }"));
            }
            other => panic!("unexpected record {:?}", other),
        }
    }

    #[test]
    fn test_pending_types_are_skipped() {
        let decls = vec![
            Declaration::Type(TypeDecl {
                id: DeclId(3),
                kind: DeclaredKind::Enum,
                name: "Mode".to_string(),
                spelling: "enum Mode".to_string(),
                anonymous: false,
                size: None,
                source: None,
                body: TypeBody::Pending,
            }),
            Declaration::Constant(Constant {
                name: "MAX_LEN".to_string(),
                ty: leaf("int", Shape::Int),
                value: Some(ConstValue::Signed(128)),
            }),
        ];
        let records = serialize(&decls, &SerializeOptions::default());
        assert_eq!(records.len(), 1);
        assert_eq!(
            serde_json::to_value(&records[0]).unwrap(),
            json!({"kind": "const", "name": "MAX_LEN", "type": "int", "value": 128})
        );
    }
}
