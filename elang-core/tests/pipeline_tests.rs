//! 加载与语义检查的端到端测试

mod common;
use common::{compile, compile_files, load, load_files};
use elang_core::{check_program, SemanticError};

#[test]
fn test_missing_entry_point() {
    let err = compile("int f() { return 1; }").unwrap_err();
    assert!(err.starts_with("Program has no entry point"), "{err}");
}

#[test]
fn test_undeclared_variable() {
    let err = compile("int main() { return y; }").unwrap_err();
    assert_eq!(err, "Variable 'y' is not declared in any scope visible from 'main'");
}

#[test]
fn test_use_before_declaration() {
    let program = load("int main() { x = 1; int x; return 0; }").unwrap();
    assert_eq!(
        check_program(&program),
        Err(SemanticError::UseBeforeDeclaration {
            function: "main".into(),
            name: "x".into(),
        })
    );
}

#[test]
fn test_inner_block_variable_is_not_visible_outside() {
    let err = compile("int main() { if (1 > 0) { int t; t = 1; } return t; }").unwrap_err();
    assert!(err.contains("'t'"), "{err}");
}

#[test]
fn test_method_can_use_members_and_globals() {
    let source = "int limit = 3;\nclass Box {\n  int v;\n  int capped() {\n    if (v > limit) { return limit; }\n    return v;\n  }\n}\nint main() { Box b = new Box(); return b.capped(); }";
    assert!(compile(source).is_ok());
}

#[test]
fn test_include_cycle_reports_chain() {
    let err = compile_files(&[
        ("main.elang", "include { \"a.elang\" };\nint main() { return 0; }"),
        ("a.elang", "include { \"b.elang\" };"),
        ("b.elang", "include { \"a.elang\" };"),
    ])
    .unwrap_err();
    assert!(err.contains("Circular dependency detected"), "{err}");
    assert!(err.contains("a.elang → b.elang → a.elang"), "{err}");
}

#[test]
fn test_included_module_is_checked() {
    let err = compile_files(&[
        ("main.elang", "include { \"util.elang\" };\nint main() { return 0; }"),
        ("util.elang", "int broken() { return missing; }"),
    ])
    .unwrap_err();
    assert_eq!(err, "Variable 'missing' is not declared in any scope visible from 'broken'");
}

#[test]
fn test_unknown_export() {
    let err = compile_files(&[
        ("main.elang", "include { \"util.elang\" };\nint main() { return 0; }"),
        ("util.elang", "int one() { return 1; }\nexport { one, two };"),
    ])
    .unwrap_err();
    assert!(err.contains("exports 'two'"), "{err}");
}

#[test]
fn test_exported_class_is_usable() {
    let program = load_files(&[
        (
            "main.elang",
            "include { \"shapes.elang\" };\nint main() { Square s = new Square(); return s.side; }",
        ),
        ("shapes.elang", "class Square { int side; }\nexport { Square };"),
    ])
    .unwrap();
    assert!(check_program(&program).is_ok());
    assert!(program.includes["shapes"].class("Square").is_some());
}
