//! 语义检查
//!
//! 检查项按固定顺序执行，每一项先检查完所有函数再进入下一项，
//! 因此同一程序总是报告同一个（最先的）错误。
//! 被 include 的模块除入口检查外做同样的检查。

mod error;

pub use error::SemanticError;

use crate::compiler::parser::{Function, Program, ScopeId, Stmt, StmtKind};
use std::collections::{BTreeSet, HashSet};

type Check = fn(&Program) -> Result<(), SemanticError>;

/// 入口模块的检查表
const CHECKLIST: &[(&str, Check)] = &[
    ("entry point", check_entry_point),
    ("argument shadowing", check_argument_shadowing),
    ("duplicate arguments", check_duplicate_arguments),
    ("duplicate variables", check_duplicate_variables),
    ("use before declaration", check_use_before_declaration),
    ("exports", check_exports),
];

/// 检查整个程序（含所有被 include 的模块）
pub fn check_program(program: &Program) -> Result<(), SemanticError> {
    run_checklist(program, CHECKLIST)?;

    let mut visited = HashSet::new();
    let mut pending: Vec<&Program> = program.includes.values().map(|m| m.as_ref()).collect();
    while let Some(module) = pending.pop() {
        if !visited.insert(module.name.clone()) {
            continue;
        }
        run_checklist(module, &CHECKLIST[1..])?;
        pending.extend(module.includes.values().map(|m| m.as_ref()));
    }
    Ok(())
}

fn run_checklist(program: &Program, checks: &[(&str, Check)]) -> Result<(), SemanticError> {
    for (name, check) in checks {
        check(program)?;
        tracing::trace!(target: "elang::semantic", module = %program.name, check = *name, "passed");
    }
    tracing::debug!(target: "elang::semantic", module = %program.name, "semantic checks passed");
    Ok(())
}

fn check_entry_point(program: &Program) -> Result<(), SemanticError> {
    if program.has_entry_point() {
        Ok(())
    } else {
        Err(SemanticError::MissingEntryPoint)
    }
}

/// 函数体（含子块）中声明的变量不能与参数同名
fn check_argument_shadowing(program: &Program) -> Result<(), SemanticError> {
    for function in program.all_functions() {
        for scope in program.arena.subtree(function.scope) {
            for variable in program.arena.get(scope).variables() {
                if function.argument(&variable.name).is_some() {
                    return Err(SemanticError::ArgumentShadowing {
                        function: function.name.clone(),
                        name: variable.name.clone(),
                    });
                }
            }
        }
    }
    Ok(())
}

fn check_duplicate_arguments(program: &Program) -> Result<(), SemanticError> {
    for function in program.all_functions() {
        let mut seen = HashSet::new();
        for argument in &function.arguments {
            if !seen.insert(argument.name.as_str()) {
                return Err(SemanticError::DuplicateArgument {
                    function: function.name.clone(),
                    name: argument.name.clone(),
                });
            }
        }
    }
    Ok(())
}

/// 同一函数的所有作用域中变量名唯一
fn check_duplicate_variables(program: &Program) -> Result<(), SemanticError> {
    for function in program.all_functions() {
        let mut seen = HashSet::new();
        for scope in program.arena.subtree(function.scope) {
            for variable in program.arena.get(scope).variables() {
                if !seen.insert(variable.name.as_str()) {
                    return Err(SemanticError::DuplicateVariable {
                        function: function.name.clone(),
                        name: variable.name.clone(),
                    });
                }
            }
        }
    }
    Ok(())
}

fn check_use_before_declaration(program: &Program) -> Result<(), SemanticError> {
    let globals = UseChecker {
        program,
        owner: "init_globals",
        arguments: HashSet::new(),
    };
    globals.check_block(&program.statements, program.scope, &mut Vec::new())?;

    for class in program.all_classes() {
        let members = UseChecker {
            program,
            owner: &class.name,
            arguments: HashSet::new(),
        };
        for stmt in &class.member_initialization {
            members.check_names(stmt.mentions(), class.scope, usize::MAX, &[])?;
        }
    }

    for function in program.all_functions() {
        UseChecker::for_function(program, function).check_block(
            &function.body,
            function.scope,
            &mut Vec::new(),
        )?;
    }
    Ok(())
}

fn check_exports(program: &Program) -> Result<(), SemanticError> {
    for name in &program.exports {
        if program.resolve_export(name).is_none() {
            return Err(SemanticError::UnknownExport {
                module: program.name.clone(),
                name: name.clone(),
            });
        }
    }
    Ok(())
}

/// 声明先于使用的检查
///
/// 名字依次在参数、当前作用域（下标不超过当前语句）、外层作用域中查找。
/// 外层作用域若属于同一函数，只有在包含当前块的那条语句之前声明的变量可见；
/// 类成员与全局变量总是可见。
struct UseChecker<'p> {
    program: &'p Program,
    owner: &'p str,
    arguments: HashSet<&'p str>,
}

impl<'p> UseChecker<'p> {
    fn for_function(program: &'p Program, function: &'p Function) -> Self {
        Self {
            program,
            owner: &function.name,
            arguments: function.arguments.iter().map(|a| a.name.as_str()).collect(),
        }
    }

    /// `limits` 记录外层同函数作用域及其当前语句下标
    fn check_block(
        &self,
        body: &[Stmt],
        scope: ScopeId,
        limits: &mut Vec<(ScopeId, usize)>,
    ) -> Result<(), SemanticError> {
        for (index, stmt) in body.iter().enumerate() {
            if matches!(**stmt, StmtKind::VarDecl(_)) {
                continue;
            }
            self.check_names(stmt.mentions(), scope, index, limits)?;
            if let StmtKind::If(conditional) | StmtKind::While(conditional) = &**stmt {
                limits.push((scope, index));
                let result = self.check_block(&conditional.body, conditional.scope, limits);
                limits.pop();
                result?;
            }
        }
        Ok(())
    }

    fn check_names(
        &self,
        names: BTreeSet<String>,
        scope: ScopeId,
        index: usize,
        limits: &[(ScopeId, usize)],
    ) -> Result<(), SemanticError> {
        for name in names {
            if self.arguments.contains(name.as_str()) {
                continue;
            }
            match self.program.arena.lookup(scope, &name) {
                Some(entry) if entry.scope == scope => {
                    if entry.declaration_index > index {
                        return Err(self.use_before_declaration(name));
                    }
                }
                Some(entry) => {
                    let limit = limits.iter().find(|(s, _)| *s == entry.scope);
                    if let Some((_, limit)) = limit {
                        if entry.declaration_index > *limit {
                            return Err(self.use_before_declaration(name));
                        }
                    }
                }
                None if self.program.imported_global(&name).is_some() => {}
                None => {
                    return Err(SemanticError::UndeclaredVariable {
                        function: self.owner.to_string(),
                        name,
                    })
                }
            }
        }
        Ok(())
    }

    fn use_before_declaration(&self, name: String) -> SemanticError {
        SemanticError::UseBeforeDeclaration {
            function: self.owner.to_string(),
            name,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::lowering::lower_program;
    use crate::compiler::module::NoIncludes;
    use crate::compiler::parser::Parser;

    fn check(source: &str) -> Result<(), SemanticError> {
        let mut includes = NoIncludes;
        let mut program = Parser::new("main", source, &mut includes).parse().unwrap();
        lower_program(&mut program);
        check_program(&program)
    }

    #[test]
    fn test_valid_program() {
        let source = "int g = 2;\nint add(int a, int b) { int c = a + b; return c + g; }\nint main() { int x = add(1, 2); if (x > 1) { int y = x; x = y; } return x; }";
        assert_eq!(check(source), Ok(()));
    }

    #[test]
    fn test_missing_main() {
        assert_eq!(check("int f() { return 1; }"), Err(SemanticError::MissingEntryPoint));
    }

    #[test]
    fn test_argument_shadowing() {
        let err = check("int f(int a) { if (a > 0) { int a = 1; } return a; }\nint main() { return 0; }").unwrap_err();
        assert_eq!(
            err,
            SemanticError::ArgumentShadowing {
                function: "f".into(),
                name: "a".into()
            }
        );
    }

    #[test]
    fn test_duplicate_argument() {
        let err = check("int f(int a, int a) { return a; }\nint main() { return 0; }").unwrap_err();
        assert!(matches!(err, SemanticError::DuplicateArgument { .. }));
    }

    #[test]
    fn test_duplicate_variable_across_scopes() {
        let err = check("int main() { int x = 1; while (x > 0) { int x = 2; } return 0; }").unwrap_err();
        assert_eq!(
            err,
            SemanticError::DuplicateVariable {
                function: "main".into(),
                name: "x".into()
            }
        );
    }

    #[test]
    fn test_use_before_declaration() {
        let err = check("int main() { x = 1; int x; return x; }").unwrap_err();
        assert!(matches!(err, SemanticError::UseBeforeDeclaration { .. }));
    }

    #[test]
    fn test_outer_variable_declared_after_block() {
        let err = check("int main() { if (1) { y = 2; } int y; return 0; }").unwrap_err();
        assert!(matches!(err, SemanticError::UseBeforeDeclaration { .. }));
    }

    #[test]
    fn test_undeclared_variable() {
        let err = check("int main() { return missing; }").unwrap_err();
        assert_eq!(
            err,
            SemanticError::UndeclaredVariable {
                function: "main".into(),
                name: "missing".into()
            }
        );
    }

    #[test]
    fn test_members_and_globals_are_always_visible() {
        let source = "class C { int get() { return v + g; } int v; }\nint main() { return 0; }\nint g;";
        assert_eq!(check(source), Ok(()));
    }

    #[test]
    fn test_checks_run_in_order() {
        // 同时存在重复参数与未声明变量时先报告重复参数
        let err = check("int f(int a, int a) { return zzz; }\nint main() { return 0; }").unwrap_err();
        assert!(matches!(err, SemanticError::DuplicateArgument { .. }));
    }

    #[test]
    fn test_unknown_export() {
        let err = check("export { nothing };\nint main() { return 0; }").unwrap_err();
        assert!(matches!(err, SemanticError::UnknownExport { .. }));
    }
}
