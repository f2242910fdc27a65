//! IA32 (NASM) 代码生成
//!
//! 输入是经过降级与语义检查的 [`Program`]，输出是一份完整的汇编文本。

mod asm;
mod class;
mod context;
mod error;
mod expr;
pub mod layout;
mod program;
mod stmt;

pub use asm::{Asm, Labels};
pub use class::generate_class;
pub use context::{
    Bundle, ClassInfo, ClassRegistry, ModuleContext, Place, Session, INDEX_FAULT_LABEL,
};
pub use error::CodegenError;
pub use expr::{generate_expr, static_type};
pub use layout::{ClassLayout, FrameLayout, ModuleLayout, Slot};
pub use program::{generate, layouts, ProgramCompiler};
pub use stmt::{generate_function, generate_stmt};

use crate::compiler::module::SourceStore;
use crate::compiler::parser::Program;
use elang_config::CompilerConfig;
use std::path::Path;

/// 生成汇编并写入 `destination`
pub fn compile<S: SourceStore + ?Sized>(
    program: &Program,
    destination: &Path,
    config: &CompilerConfig,
    store: &S,
) -> Result<(), CodegenError> {
    let text = generate(program, config)?;
    store
        .write(destination, &text)
        .map_err(|e| CodegenError::Write {
            path: destination.to_path_buf(),
            message: e.to_string(),
        })?;
    tracing::debug!(
        target: "elang::codegen",
        destination = %destination.display(),
        bytes = text.len(),
        "wrote assembly"
    );
    Ok(())
}
