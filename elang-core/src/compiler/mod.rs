//! 编译前端：词法规则、解析、多文件加载、降级与语义检查

pub mod lexer;
pub mod lowering;
pub mod module;
pub mod parser;
pub mod semantic;
pub mod types;
