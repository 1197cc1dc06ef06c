//! End-to-end extraction against a scripted compiler
//!
//! The compiler writes JSON snapshots instead of clang ASTs, and the
//! snapshot loader reads them back, so the whole pipeline runs without clang.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use capi_core::{ConstValue, Error, ExtractConfig, Location, Record};
use capi_engine::{Extractor, SerializeOptions};
use capi_frontend::{
    CompileInput, CompileJob, CompileMode, Compiler, Cursor, CursorKind, FrontendError,
    SnapshotLoader, TranslationUnit, TypeData, TypeKind,
};
use pretty_assertions::assert_eq;
use regex::Regex;

/// Header text scanned for macro candidates
const RAYLIB_H: &str = r#"#ifndef RAYLIB_H
#define RAYLIB_H

#define MAX_LEN 128
#define GREETING "hi"
#define SQUARE(x) ((x)*(x))
#define BEGIN_BLOCK do {

struct Vector2 { float x; float y; };
float Vector2Length(struct Vector2 v);

#endif
"#;

/// One recorded compilation
#[derive(Debug, Clone)]
struct Invocation {
    language: String,
    mode: CompileMode,
    with_pch: bool,
    source: Option<String>,
}

struct ScriptedCompiler {
    header: TranslationUnit,
    probes: HashMap<String, TranslationUnit>,
    header_error: Option<String>,
    log: Mutex<Vec<Invocation>>,
}

impl ScriptedCompiler {
    fn new(header: TranslationUnit) -> Self {
        Self {
            header,
            probes: HashMap::new(),
            header_error: None,
            log: Mutex::new(Vec::new()),
        }
    }

    fn invocations(&self) -> Vec<Invocation> {
        self.log.lock().unwrap().clone()
    }
}

impl Compiler for ScriptedCompiler {
    fn compile(&self, job: &CompileJob<'_>) -> Result<String, FrontendError> {
        self.log.lock().unwrap().push(Invocation {
            language: job.language.to_string(),
            mode: job.mode,
            with_pch: job.include_pch.is_some(),
            source: job.stdin().map(str::to_string),
        });

        if job.mode == CompileMode::PrecompiledHeader {
            fs::write(job.output, b"")?;
            return Ok(String::new());
        }

        match job.input {
            CompileInput::File(_) => match &self.header_error {
                Some(diagnostics) => Err(FrontendError::CompilationFailed {
                    diagnostics: diagnostics.clone(),
                }),
                None => {
                    SnapshotLoader::write(&self.header, job.output)?;
                    Ok("raylib.h:9:1: warning: declaration shadows a local\n".to_string())
                }
            },
            CompileInput::Source(source) => {
                let name = Regex::new(r"= (\w+);")
                    .unwrap()
                    .captures(source)
                    .map(|caps| caps[1].to_string())
                    .unwrap_or_default();
                match self.probes.get(&name) {
                    Some(unit) => {
                        SnapshotLoader::write(unit, job.output)?;
                        Ok(String::new())
                    }
                    None => Err(FrontendError::CompilationFailed {
                        diagnostics: format!("<stdin>:2:35: error: expected expression near {}", name),
                    }),
                }
            }
        }
    }

    fn name(&self) -> &str {
        "scripted"
    }

    fn is_available(&self) -> bool {
        true
    }
}

/// Snapshot of `RAYLIB_H` as lowered from clang
fn header_unit(file: &str) -> TranslationUnit {
    let mut tu = TranslationUnit::new();
    let float = tu.add_type(TypeData {
        size: Some(4),
        ..TypeData::new(TypeKind::Float, "float")
    });

    let mut vector = Cursor::new(CursorKind::StructDecl, "Vector2");
    vector.usr = "c:@S@Vector2".to_string();
    vector.location = Some(Location::new(file, 9, 8, 130));
    let vector = tu.add_cursor(vector);
    let record = tu.add_type(TypeData {
        size: Some(8),
        declaration: Some(vector),
        ..TypeData::new(TypeKind::Record, "struct Vector2")
    });
    for name in ["x", "y"] {
        let mut field = Cursor::new(CursorKind::FieldDecl, name);
        field.ty = Some(float);
        let field = tu.add_cursor(field);
        tu.cursor_mut(vector).children.push(field);
    }
    tu.cursor_mut(vector).ty = Some(record);
    tu.push_root(vector);

    let elaborated = tu.add_type(TypeData {
        named: Some(record),
        ..TypeData::new(TypeKind::Elaborated, "struct Vector2")
    });
    let proto = tu.add_type(TypeData {
        result: Some(float),
        arguments: vec![elaborated],
        ..TypeData::new(TypeKind::FunctionProto, "float (struct Vector2)")
    });
    let mut param = Cursor::new(CursorKind::ParmDecl, "v");
    param.ty = Some(elaborated);
    let param = tu.add_cursor(param);
    let mut function = Cursor::new(CursorKind::FunctionDecl, "Vector2Length");
    function.usr = "c:@F@Vector2Length".to_string();
    function.location = Some(Location::new(file, 10, 7, 168));
    function.ty = Some(proto);
    function.result_type = Some(float);
    function.arguments = vec![param];
    let function = tu.add_cursor(function);
    tu.push_root(function);

    tu
}

/// Probe unit declaring `__capi_probe_value` with the given type
fn probe_unit(ty: Vec<TypeData>, value: ConstValue) -> TranslationUnit {
    let mut tu = TranslationUnit::new();
    let mut last = None;
    for data in ty {
        last = Some(tu.add_type(data));
    }
    let mut var = Cursor::new(CursorKind::VarDecl, "__capi_probe_value");
    var.ty = last;
    var.location = Some(Location::new("<stdin>", 2, 13, 40));
    var.evaluated = Some(value);
    let var = tu.add_cursor(var);
    tu.push_root(var);
    tu
}

struct Fixture {
    _dir: tempfile::TempDir,
    header: PathBuf,
    compiler: ScriptedCompiler,
}

fn fixture() -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let header = dir.path().join("raylib.h");
    fs::write(&header, RAYLIB_H).unwrap();
    let file = header.display().to_string();

    let mut compiler = ScriptedCompiler::new(header_unit(&file));
    compiler.probes.insert(
        "MAX_LEN".to_string(),
        probe_unit(
            vec![TypeData {
                size: Some(4),
                is_const: true,
                ..TypeData::new(TypeKind::Int, "const int")
            }],
            ConstValue::Signed(128),
        ),
    );
    compiler.probes.insert(
        "GREETING".to_string(),
        probe_unit(
            vec![
                TypeData::new(TypeKind::CharS, "char"),
                TypeData {
                    size: Some(8),
                    is_const: true,
                    pointee: Some(capi_frontend::TypeId(0)),
                    ..TypeData::new(TypeKind::Pointer, "char *const")
                },
            ],
            ConstValue::String("hi".to_string()),
        ),
    );

    Fixture {
        _dir: dir,
        header,
        compiler,
    }
}

fn config(header: &Path) -> ExtractConfig {
    let mut config = ExtractConfig::for_header(header);
    config.macros.jobs = 2;
    config
}

fn kinds(records: &[Record]) -> Vec<(&'static str, String)> {
    records
        .iter()
        .map(|r| (r.kind(), r.name().to_string()))
        .collect()
}

#[test]
fn test_extracts_declarations_and_macro_constants() {
    let fx = fixture();
    let extractor = Extractor::new(config(&fx.header), &fx.compiler, &SnapshotLoader).unwrap();
    let extraction = extractor.run().unwrap();

    let records = extraction.records(&SerializeOptions::default());
    assert_eq!(
        kinds(&records),
        vec![
            ("struct", "Vector2".to_string()),
            ("function", "Vector2Length".to_string()),
            ("const", "MAX_LEN".to_string()),
            ("const", "GREETING".to_string()),
        ]
    );

    let json = serde_json::to_value(&records).unwrap();
    assert_eq!(
        json[2],
        serde_json::json!({"kind": "const", "name": "MAX_LEN", "type": "const int", "value": 128})
    );
    assert_eq!(json[3]["value"], "hi");
    assert_eq!(json[1]["arguments"][0]["type"], "struct Vector2");
    assert!(extraction.diagnostics.contains("warning"));
}

#[test]
fn test_string_macro_is_pointer_to_char() {
    let fx = fixture();
    let extractor = Extractor::new(config(&fx.header), &fx.compiler, &SnapshotLoader).unwrap();
    let extraction = extractor.run().unwrap();

    match extraction.find("GREETING") {
        Some(capi_core::Declaration::Constant(constant)) => {
            assert!(constant.ty.is_string());
            assert!(constant.ty.qualifiers.is_const);
        }
        other => panic!("GREETING is not a constant: {:?}", other),
    }
    assert!(extraction.find("SQUARE").is_none());
    assert!(extraction.find("BEGIN_BLOCK").is_none());
}

#[test]
fn test_probe_compilations() {
    let fx = fixture();
    let extractor = Extractor::new(config(&fx.header), &fx.compiler, &SnapshotLoader).unwrap();
    extractor.run().unwrap();

    let log = fx.compiler.invocations();
    assert_eq!(log[0].mode, CompileMode::Ast);
    assert_eq!(log[0].language, "c");
    assert_eq!(log[1].mode, CompileMode::PrecompiledHeader);
    assert_eq!(log[1].language, "c-header");

    let probes: Vec<_> = log.iter().filter(|i| i.source.is_some()).collect();
    // MAX_LEN, GREETING and BEGIN_BLOCK; RAYLIB_H has no value and SQUARE
    // takes parameters
    assert_eq!(probes.len(), 3);
    let absolute = fx.header.canonicalize().unwrap();
    for probe in probes {
        assert!(probe.with_pch);
        let source = probe.source.as_deref().unwrap();
        assert!(source.starts_with(&format!("#include \"{}\"\n", absolute.display())));
        assert!(source.contains("const __auto_type __capi_probe_value = "));
    }
}

#[test]
fn test_output_is_deterministic() {
    let fx = fixture();
    let opts = SerializeOptions {
        type_objects: true,
        include_size: true,
        include_source: false,
    };

    let render = || {
        let extractor = Extractor::new(config(&fx.header), &fx.compiler, &SnapshotLoader).unwrap();
        let records = extractor.run().unwrap().records(&opts);
        serde_json::to_string_pretty(&records).unwrap()
    };
    assert_eq!(render(), render());
}

#[test]
fn test_header_compile_failure_is_fatal() {
    let mut fx = fixture();
    let diagnostics = "raylib.h:9:22: error: unknown type name 'flaot'\n1 error generated.\n";
    fx.compiler.header_error = Some(diagnostics.to_string());

    let extractor = Extractor::new(config(&fx.header), &fx.compiler, &SnapshotLoader).unwrap();
    match extractor.run() {
        Err(Error::Compilation {
            diagnostics: reported,
            ..
        }) => assert_eq!(reported, diagnostics),
        other => panic!("expected a compilation error, got {:?}", other),
    }
}

#[test]
fn test_skip_macro_probing() {
    let fx = fixture();
    let mut config = config(&fx.header);
    config.macros.enabled = false;

    let extractor = Extractor::new(config, &fx.compiler, &SnapshotLoader).unwrap();
    let records = extractor.run().unwrap().records(&SerializeOptions::default());
    assert!(records.iter().all(|r| r.kind() != "const"));
    assert_eq!(fx.compiler.invocations().len(), 1);
}

#[test]
fn test_definition_filter_applies_to_macros() {
    let fx = fixture();
    let mut config = config(&fx.header);
    config.filters.exclude_definitions = vec!["^MAX_".to_string()];

    let extractor = Extractor::new(config, &fx.compiler, &SnapshotLoader).unwrap();
    let extraction = extractor.run().unwrap();
    assert!(extraction.find("MAX_LEN").is_none());
    assert!(extraction.find("GREETING").is_some());

    let probed = fx
        .compiler
        .invocations()
        .iter()
        .filter(|i| i.source.is_some())
        .count();
    assert_eq!(probed, 2);
}

#[test]
fn test_malformed_pattern_fails_construction() {
    let fx = fixture();
    let mut config = config(&fx.header);
    config.filters.include_definitions = vec!["(unclosed".to_string()];

    let err = Extractor::new(config, &fx.compiler, &SnapshotLoader).err();
    assert!(matches!(err, Some(Error::InvalidPattern { .. })));
}

#[test]
fn test_macro_with_invalid_type_is_dropped() {
    let mut fx = fixture();
    fx.compiler.probes.insert(
        "BEGIN_BLOCK".to_string(),
        probe_unit(
            vec![TypeData::new(TypeKind::Invalid, "")],
            ConstValue::Signed(0),
        ),
    );

    let extractor = Extractor::new(config(&fx.header), &fx.compiler, &SnapshotLoader).unwrap();
    let extraction = extractor.run().unwrap();
    assert!(extraction.find("BEGIN_BLOCK").is_none());
    assert!(extraction.find("MAX_LEN").is_some());
    assert!(extraction.find("GREETING").is_some());
}
