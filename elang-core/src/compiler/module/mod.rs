//! 多文件模块加载
//!
//! `include { "path" };` 中的路径相对于包含它的文件解析。
//! 每个文件只解析一次，结果以 `Rc<Program>` 共享；
//! 正在解析的文件构成一个栈，用于发现循环 include。

mod loader;
mod store;

pub use loader::ModuleLoader;
pub use store::{normalize, DiskStore, MemoryStore, SourceStore, StoreError, StoreResult};

use crate::compiler::parser::{ParserError, Program};
use std::path::PathBuf;
use std::rc::Rc;
use thiserror::Error;

/// 模块解析错误
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ResolveError {
    /// 模块未找到
    #[error("Module '{}' not found", .path.display())]
    NotFound { path: PathBuf },
    /// 文件读取错误
    #[error("Failed to read '{}': {}", .path.display(), .message)]
    Read { path: PathBuf, message: String },
    /// 解析错误
    #[error("Failed to parse '{}': {}", .path.display(), .error)]
    Parse {
        path: PathBuf,
        error: Box<ParserError>,
    },
    /// 循环依赖
    #[error("Circular dependency detected: {}", .chain.join(" → "))]
    CircularDependency { chain: Vec<String> },
    /// 两个不同文件得到了相同的模块名
    #[error("Module name '{}' is used by both '{}' and '{}'", .name, .first.display(), .second.display())]
    DuplicateModule {
        name: String,
        first: PathBuf,
        second: PathBuf,
    },
    #[error("Include depth exceeds the limit of {limit}")]
    TooDeep { limit: usize },
}

impl ResolveError {
    /// 最内层的语法错误（如果有）
    pub fn parser_error(&self) -> Option<&ParserError> {
        match self {
            ResolveError::Parse { error, .. } => Some(error.innermost()),
            _ => None,
        }
    }
}

/// 解析器遇到 include 时的回调
pub trait IncludeResolver {
    fn resolve_include(&mut self, path: &str) -> Result<Rc<Program>, ResolveError>;
}

/// 不允许 include 的解析环境（单文件编译与测试）
#[derive(Debug, Clone, Copy, Default)]
pub struct NoIncludes;

impl IncludeResolver for NoIncludes {
    fn resolve_include(&mut self, path: &str) -> Result<Rc<Program>, ResolveError> {
        Err(ResolveError::NotFound {
            path: PathBuf::from(path),
        })
    }
}
