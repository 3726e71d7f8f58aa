//! End-to-end tests: source text in, textual module out.

use std::fs;
use std::process::Command;

use pcc_llvm::{CompileError, Compiler};

const TRIPLE: &str = "x86_64-unknown-linux-gnu";

const AVERAGE: &str = "\
INT SUBROUTINE total(INT a, INT b)
RETURN a + b
ENDSUBROUTINE
DOUBLE marks[3]
FOR i = 0 TO 2
INPUT marks[i]
NEXT i
sum = 0.0
FOR i = 0 TO 2
sum = sum + marks[i]
NEXT i
name = \"avg\"
label = name + \": \"
OUTPUT label
OUTPUT sum / 3
IF sum > 100 THEN
OUTPUT \"high\"
ELSE
OUTPUT \"low\"
ENDIF
OUTPUT total(1, 2)";

fn compiler() -> Compiler {
    let _ = env_logger::builder().is_test(true).try_init();
    Compiler::new().with_target(TRIPLE)
}

#[test]
fn test_module_header() {
    let module = compiler()
        .with_module_name("prog.ll")
        .compile_named("OUTPUT 1", "prog.pc")
        .unwrap();
    let text = module.to_string();

    assert!(text.starts_with("; ModuleID = 'prog.ll'\n"));
    assert!(text.contains("source_filename = \"prog.pc\""));
    assert!(text.contains("target triple = \"x86_64-unknown-linux-gnu\""));
    assert!(text.contains("declare i32 @printf(i8*, ...)"));
    assert!(text.contains("declare i8* @realloc(i8*, i64)"));
    assert!(text.contains("@fmt_int = private unnamed_addr constant [3 x i8] c\"%d\\00\""));
    assert!(text.contains("@fmt_newline = private unnamed_addr constant [2 x i8] c\"\\0A\\00\""));
    assert!(text.contains("define i32 @main() {\nentry:\n"));
    assert!(text.trim_end().ends_with("ret i32 0\n}"));
}

#[test]
fn test_full_program_compiles() {
    let module = compiler().compile_source(AVERAGE).unwrap();
    let names: Vec<_> = module.functions.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(names, vec!["total", "main"]);

    let text = module.to_string();
    assert!(text.contains("define i32 @total(i32 %a.arg, i32 %b.arg) {"));
    assert!(text.contains("call i32 @total(i32 1, i32 2)"));
    assert!(text.contains("@scanf("));
    assert!(text.contains("fdiv double"));
}

#[test]
fn test_output_is_deterministic() {
    let first = compiler().compile_source(AVERAGE).unwrap().to_string();
    let second = compiler().compile_source(AVERAGE).unwrap().to_string();
    assert_eq!(first, second);
}

#[test]
fn test_compilations_are_independent() {
    let compiler = compiler();
    compiler.compile_source("x = 1").unwrap();
    // `x` from the previous compilation must not leak into this one.
    let err = compiler.compile_source("OUTPUT x").unwrap_err();
    assert!(matches!(
        err,
        CompileError::Frontend(pcc::CompileError::UndefinedVariable { ref name, line: 1 }) if name == "x"
    ));
}

#[test]
fn test_frontend_errors_pass_through() {
    let err = compiler().compile_source("x = \"a\" - 1").unwrap_err();
    assert!(matches!(
        err,
        CompileError::Frontend(pcc::CompileError::TypeMismatch { .. })
    ));

    let err = compiler().compile_source("IF 1 THEN\nOUTPUT 1").unwrap_err();
    assert!(matches!(
        err,
        CompileError::Frontend(pcc::CompileError::Syntax { .. })
    ));
}

#[test]
fn test_index_errors_stay_in_frontend() {
    let err = compiler().compile_source("INT a[3]\nOUTPUT a[zz]").unwrap_err();
    assert!(matches!(
        err,
        CompileError::Frontend(pcc::CompileError::UndefinedVariable { ref name, line: 2 }) if name == "zz"
    ));

    let err = compiler().compile_source("INT a[3]\nOUTPUT a[\"x\"]").unwrap_err();
    assert!(matches!(
        err,
        CompileError::Frontend(pcc::CompileError::TypeMismatch { line: 2, .. })
    ));
}

#[test]
fn test_compile_file_preprocesses() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("indented.pc");
    fs::write(&path, "x = 1\n\n    IF x == 1 THEN\n        OUTPUT x\n\n    ENDIF\n").unwrap();

    let module = compiler().compile_file(&path).unwrap();
    assert_eq!(module.source_filename, path.display().to_string());
    assert!(module.function("main").unwrap().block("if.then").is_some());
}

#[test]
fn test_compile_file_missing() {
    let dir = tempfile::tempdir().unwrap();
    let err = compiler()
        .compile_file(&dir.path().join("absent.pc"))
        .unwrap_err();
    assert!(matches!(err, CompileError::Io { .. }));
    assert!(err.to_string().starts_with("cannot read "));
}

#[test]
fn test_cli_writes_output() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("code.pc");
    let output = dir.path().join("out.ll");
    fs::write(&source, AVERAGE).unwrap();

    let status = Command::new(env!("CARGO_BIN_EXE_pcc"))
        .arg("--filename")
        .arg(&source)
        .arg("--output")
        .arg(&output)
        .arg("--target")
        .arg(TRIPLE)
        .status()
        .unwrap();

    assert!(status.success());
    let text = fs::read_to_string(&output).unwrap();
    assert!(text.contains("define i32 @main()"));
    assert!(text.contains(&format!("; ModuleID = '{}'", output.display())));
}

#[test]
fn test_cli_error_leaves_no_output() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("broken.pc");
    let output = dir.path().join("out.ll");
    fs::write(&source, "x = 1\nOUTPUT y\n").unwrap();

    let result = Command::new(env!("CARGO_BIN_EXE_pcc"))
        .arg("--filename")
        .arg(&source)
        .arg("--output")
        .arg(&output)
        .output()
        .unwrap();

    assert_eq!(result.status.code(), Some(1));
    assert!(!output.exists());
    let stderr = String::from_utf8_lossy(&result.stderr);
    assert!(stderr.contains("OUTPUT y"));
}

#[test]
fn test_cli_emit_ir() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("code.pc");
    fs::write(&source, "OUTPUT \"hello\"").unwrap();

    let result = Command::new(env!("CARGO_BIN_EXE_pcc"))
        .arg("--filename")
        .arg(&source)
        .arg("--output")
        .arg(dir.path().join("unused.ll"))
        .arg("--emit-ir")
        .output()
        .unwrap();

    assert!(result.status.success());
    let stdout = String::from_utf8_lossy(&result.stdout);
    assert!(stdout.contains("c\"hello\\00\""));
    assert!(!dir.path().join("unused.ll").exists());
}
