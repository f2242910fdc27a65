use super::expr::Expr;
use super::scope::ScopeId;
use crate::compiler::types::Type;
use std::collections::BTreeSet;

// 语句类型别名
pub type Stmt = Box<StmtKind>;

/// 语句节点
#[derive(Debug, Clone, PartialEq)]
pub enum StmtKind {
    // 表达式语句，结果被丢弃
    Expr(Expr),
    // return 语句
    Return(Option<Expr>),
    // 变量声明，本身不产生代码，只参与布局
    VarDecl(VariableDeclaration),
    // if 语句，自带子作用域
    If(Conditional),
    // while 语句，自带子作用域
    While(Conditional),
    // 栈上数组的头部初始化
    ArrayInit(ArrayInitializer),
}

/// 变量/参数/成员声明
#[derive(Debug, Clone, PartialEq)]
pub struct VariableDeclaration {
    pub name: String,
    pub ty: Type,
}

/// if / while 共用的结构
#[derive(Debug, Clone, PartialEq)]
pub struct Conditional {
    pub condition: Expr,
    pub scope: ScopeId,
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ArrayInitializer {
    pub name: String,
}

impl VariableDeclaration {
    pub fn new(name: impl Into<String>, ty: Type) -> Self {
        Self {
            name: name.into(),
            ty,
        }
    }
}

impl StmtKind {
    /// 语句本身（不含子块）引用到的变量名
    pub fn mentions(&self) -> BTreeSet<String> {
        match self {
            StmtKind::Expr(expr) | StmtKind::Return(Some(expr)) => expr.mentions(),
            StmtKind::If(c) | StmtKind::While(c) => c.condition.mentions(),
            StmtKind::ArrayInit(init) => BTreeSet::from([init.name.clone()]),
            StmtKind::Return(None) | StmtKind::VarDecl(_) => BTreeSet::new(),
        }
    }

    pub fn declaration(&self) -> Option<&VariableDeclaration> {
        match self {
            StmtKind::VarDecl(decl) => Some(decl),
            _ => None,
        }
    }

    pub fn is_return(&self) -> bool {
        matches!(self, StmtKind::Return(_))
    }

    /// 用于报错的语句种类名
    pub fn describe(&self) -> &'static str {
        match self {
            StmtKind::Expr(_) => "Expression statement",
            StmtKind::Return(_) => "Return statement",
            StmtKind::VarDecl(_) => "Variable declaration",
            StmtKind::If(_) => "If statement",
            StmtKind::While(_) => "While statement",
            StmtKind::ArrayInit(_) => "Array initializer",
        }
    }
}
