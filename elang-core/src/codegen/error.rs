//! 代码生成错误

use crate::compiler::types::LayoutError;
use elang_config::ConfigError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CodegenError {
    #[error("Unknown variable '{0}'")]
    UnknownVariable(String),
    #[error("Unknown function '{0}'")]
    UnknownFunction(String),
    #[error("Unknown class '{0}'")]
    UnknownClass(String),
    #[error("Class '{class}' has no member '{member}'")]
    UnknownMember { class: String, member: String },
    #[error("Class '{class}' has no method '{method}'")]
    UnknownMethod { class: String, method: String },
    #[error("'{0}' is not an object")]
    NotAnObject(String),
    #[error("'{0}' cannot be indexed")]
    NotIndexable(String),
    #[error("Invalid assignment target '{0}'")]
    InvalidAssignment(String),
    #[error("Constructor of '{0}' can only be called through 'new'")]
    BareConstructor(String),
    #[error("Symbol '{0}' is defined more than once")]
    DuplicateSymbol(String),
    #[error("Program has no entry point: function 'main' is not defined")]
    MissingEntryPoint,
    #[error(transparent)]
    Layout(#[from] LayoutError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("Failed to write '{}': {}", .path.display(), .message)]
    Write { path: PathBuf, message: String },
}
