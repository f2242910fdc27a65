//! 解析后的一次性改写
//!
//! - 为每个方法追加隐式参数 `this`
//! - 把引用数组、类实例或指针的 `Variable` 改写为 `PointerVariable`
//!
//! 每个模块只执行一次，之后语法树不再被修改。

use super::parser::{
    BinaryOp, ElangClass, Expr, ExprKind, Function, New, Program, ScopeArena, ScopeId, Stmt, StmtKind,
    Variable, VariableDeclaration,
};
use super::types::Type;
use std::collections::BTreeMap;
use std::rc::Rc;

/// 名字 → 类型的查找环境
struct TypeScope<'a> {
    arena: &'a ScopeArena,
    arguments: &'a [VariableDeclaration],
    includes: &'a BTreeMap<String, Rc<Program>>,
}

impl TypeScope<'_> {
    /// 查找顺序：参数、作用域链（含成员与全局）、被 include 模块导出的全局
    fn type_of(&self, scope: ScopeId, name: &str) -> Option<&Type> {
        if let Some(argument) = self.arguments.iter().find(|a| a.name == name) {
            return Some(&argument.ty);
        }
        if let Some(entry) = self.arena.lookup(scope, name) {
            return Some(&entry.ty);
        }
        self.includes
            .values()
            .find_map(|module| module.exported_global(name))
            .map(|global| &global.ty)
    }

    fn is_pointer(&self, scope: ScopeId, name: &str) -> bool {
        self.type_of(scope, name).is_some_and(Type::is_pointer_like)
    }
}

pub fn lower_program(program: &mut Program) {
    if program.lowered {
        return;
    }

    let Program {
        arena,
        scope,
        statements,
        functions,
        classes,
        includes,
        ..
    } = program;

    for class in classes.iter_mut() {
        append_this(class);
    }

    let globals = TypeScope {
        arena,
        arguments: &[],
        includes,
    };
    lower_block(statements, *scope, &globals);

    for function in functions.iter_mut() {
        lower_function(function, arena, includes);
    }
    for class in classes.iter_mut() {
        lower_class(class, arena, includes);
    }

    program.lowered = true;
    tracing::debug!(target: "elang::parser", module = %program.name, "lowered module");
}

fn append_this(class: &mut ElangClass) {
    let this = VariableDeclaration::new("this", Type::Class(class.name.clone()));
    for method in class.functions.iter_mut() {
        method.arguments.push(this.clone());
    }
    for inner in class.classes.iter_mut() {
        append_this(inner);
    }
}

fn lower_class(class: &mut ElangClass, arena: &ScopeArena, includes: &BTreeMap<String, Rc<Program>>) {
    let members = TypeScope {
        arena,
        arguments: &[],
        includes,
    };
    lower_block(&mut class.member_initialization, class.scope, &members);
    for method in class.functions.iter_mut() {
        lower_function(method, arena, includes);
    }
    for inner in class.classes.iter_mut() {
        lower_class(inner, arena, includes);
    }
}

fn lower_function(function: &mut Function, arena: &ScopeArena, includes: &BTreeMap<String, Rc<Program>>) {
    let Function {
        arguments,
        body,
        scope,
        ..
    } = function;
    let env = TypeScope {
        arena,
        arguments,
        includes,
    };
    lower_block(body, *scope, &env);
}

/// 改写一个作用域的语句；子块按其自身作用域递归
fn lower_block(body: &mut [Stmt], scope: ScopeId, env: &TypeScope<'_>) {
    for stmt in body.iter_mut() {
        match &mut **stmt {
            StmtKind::Expr(expr) | StmtKind::Return(Some(expr)) => rewrite(expr, scope, env),
            StmtKind::If(conditional) | StmtKind::While(conditional) => {
                rewrite(&mut conditional.condition, scope, env);
                lower_block(&mut conditional.body, conditional.scope, env);
            }
            StmtKind::Return(None) | StmtKind::VarDecl(_) | StmtKind::ArrayInit(_) => {}
        }
    }
}

fn rewrite(expr: &mut Expr, scope: ScopeId, env: &TypeScope<'_>) {
    match &mut **expr {
        ExprKind::Variable(variable) => {
            if env.is_pointer(scope, &variable.name) {
                let name = std::mem::take(&mut variable.name);
                **expr = ExprKind::PointerVariable(Variable { name });
            }
        }
        ExprKind::PointerVariable(_) | ExprKind::Decimal(_) | ExprKind::Char(_) => {}
        ExprKind::Call(call) => {
            for argument in call.arguments.iter_mut() {
                rewrite(argument, scope, env);
            }
        }
        ExprKind::Binary(binary) if binary.op == BinaryOp::Dot => {
            rewrite(&mut binary.left, scope, env);
            // 成员名不是变量，只改写方法实参
            if let ExprKind::Call(call) = &mut *binary.right {
                for argument in call.arguments.iter_mut() {
                    rewrite(argument, scope, env);
                }
            }
        }
        ExprKind::Binary(binary) => {
            rewrite(&mut binary.left, scope, env);
            rewrite(&mut binary.right, scope, env);
        }
        ExprKind::New(New::Object(call)) => {
            for argument in call.arguments.iter_mut() {
                rewrite(argument, scope, env);
            }
        }
        ExprKind::New(New::Array { count, .. }) => rewrite(count, scope, env),
    }
}
