//! 顶层结构：函数、类与整个模块

use super::scope::{ScopeArena, ScopeId};
use super::stmt::{Stmt, VariableDeclaration};
use crate::compiler::types::Type;
use std::collections::BTreeMap;
use std::rc::Rc;

/// 函数定义
#[derive(Debug, Clone, PartialEq)]
pub struct Function {
    pub name: String,
    /// 源码中的函数头，供注释输出
    pub signature: String,
    /// `None` 表示 void
    pub return_type: Option<Type>,
    pub scope: ScopeId,
    pub body: Vec<Stmt>,
    pub arguments: Vec<VariableDeclaration>,
    pub line: usize,
}

/// 类定义
#[derive(Debug, Clone, PartialEq)]
pub struct ElangClass {
    /// 限定名，嵌套类形如 `Outer.Inner`
    pub name: String,
    pub scope: ScopeId,
    pub functions: Vec<Function>,
    pub member_variables: Vec<VariableDeclaration>,
    /// 成员数组头部初始化与成员赋值，在 `init_<Class>` 中执行
    pub member_initialization: Vec<Stmt>,
    pub classes: Vec<ElangClass>,
}

/// 一个模块（一个源文件）的完整语法树
#[derive(Debug, Clone)]
pub struct Program {
    pub name: String,
    pub arena: ScopeArena,
    pub scope: ScopeId,
    /// 全局声明与初始化，按源码顺序
    pub statements: Vec<Stmt>,
    pub functions: Vec<Function>,
    pub classes: Vec<ElangClass>,
    pub exports: Vec<String>,
    /// 模块名 → 被 include 的模块
    pub includes: BTreeMap<String, Rc<Program>>,
    pub(crate) lowered: bool,
}

/// 导出名解析的结果
#[derive(Debug, Clone, Copy)]
pub enum Export<'p> {
    Function(&'p Function),
    Class(&'p ElangClass),
    Global(&'p VariableDeclaration),
}

impl Function {
    pub fn argument(&self, name: &str) -> Option<&VariableDeclaration> {
        self.arguments.iter().find(|a| a.name == name)
    }

    /// 最后一条顶层语句是否为 return
    pub fn ends_with_return(&self) -> bool {
        self.body.last().is_some_and(|s| s.is_return())
    }
}

impl ElangClass {
    pub fn constructor(&self) -> Option<&Function> {
        self.method("constructor")
    }

    pub fn method(&self, name: &str) -> Option<&Function> {
        self.functions.iter().find(|f| f.name == name)
    }

    pub fn member(&self, name: &str) -> Option<&VariableDeclaration> {
        self.member_variables.iter().find(|m| m.name == name)
    }

    /// 汇编标签中使用的名字
    pub fn label(&self) -> String {
        self.name.replace('.', "_")
    }

    /// 本类及所有嵌套类，先序
    pub fn flatten<'c>(&'c self, out: &mut Vec<&'c ElangClass>) {
        out.push(self);
        for inner in &self.classes {
            inner.flatten(out);
        }
    }
}

impl Program {
    pub fn globals(&self) -> impl Iterator<Item = &VariableDeclaration> {
        self.statements.iter().filter_map(|s| s.declaration())
    }

    pub fn global(&self, name: &str) -> Option<&VariableDeclaration> {
        self.globals().find(|g| g.name == name)
    }

    /// 需要在 `init_globals` 中执行的语句
    pub fn initialization(&self) -> impl Iterator<Item = &Stmt> {
        self.statements.iter().filter(|s| s.declaration().is_none())
    }

    pub fn function(&self, name: &str) -> Option<&Function> {
        self.functions.iter().find(|f| f.name == name)
    }

    /// 全部类（含嵌套类），先序
    pub fn all_classes(&self) -> Vec<&ElangClass> {
        let mut out = Vec::new();
        for class in &self.classes {
            class.flatten(&mut out);
        }
        out
    }

    /// 按限定名查找类
    pub fn class(&self, name: &str) -> Option<&ElangClass> {
        self.all_classes().into_iter().find(|c| c.name == name)
    }

    /// 顶层函数与全部方法
    pub fn all_functions(&self) -> Vec<&Function> {
        let mut out: Vec<&Function> = self.functions.iter().collect();
        for class in self.all_classes() {
            out.extend(class.functions.iter());
        }
        out
    }

    pub fn has_entry_point(&self) -> bool {
        self.function("main").is_some()
    }

    /// 将导出名解析为函数、类或全局变量
    pub fn resolve_export(&self, name: &str) -> Option<Export<'_>> {
        if let Some(function) = self.function(name) {
            return Some(Export::Function(function));
        }
        if let Some(class) = self.classes.iter().find(|c| c.name == name) {
            return Some(Export::Class(class));
        }
        self.global(name).map(Export::Global)
    }

    /// 本模块导出的全局变量
    pub fn exported_global(&self, name: &str) -> Option<&VariableDeclaration> {
        if !self.exports.iter().any(|e| e == name) {
            return None;
        }
        self.global(name)
    }

    /// 在直接 include 的模块中查找导出的全局变量
    pub fn imported_global(&self, name: &str) -> Option<(&Program, &VariableDeclaration)> {
        self.includes
            .values()
            .find_map(|module| module.exported_global(name).map(|g| (module.as_ref(), g)))
    }
}
