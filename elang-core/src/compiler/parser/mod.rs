pub mod error;
pub mod expr;
pub mod parser;
pub mod program;
pub mod scope;
mod shunting_yard;
pub mod stmt;
pub mod symbols;
mod utils;

// 重新导出常用类型
pub use error::{ErrorLocation, ParseResult, ParserError, ParserErrorKind};
pub use expr::{Binary, BinaryOp, Expr, ExprKind, FunctionCall, New, Variable};
pub use parser::Parser;
pub use program::{ElangClass, Export, Function, Program};
pub use scope::{ScopeArena, ScopeId, VariableEntry};
pub use stmt::{ArrayInitializer, Conditional, Stmt, StmtKind, VariableDeclaration};
pub use symbols::SymbolTable;
