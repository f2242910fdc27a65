//! API 错误类型
//!
//! 提供统一的错误类型和结构化错误报告。

use elang_config::Phase;
use elang_core::compiler::parser::{ErrorLocation, ParserErrorKind};
use elang_core::{CodegenError, ParserError, ResolveError, SemanticError};
use serde::Serialize;
use std::path::Path;
use thiserror::Error;

/// Elang 错误类型
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ElangError {
    /// 读取或解析某个模块失败（含被 include 的模块）
    #[error("{0}")]
    Module(#[from] ResolveError),

    /// 单个源码串的语法错误
    #[error("{0}")]
    Parser(#[from] ParserError),

    /// 语义检查失败
    #[error("Semantic error: {0}")]
    Semantic(#[from] SemanticError),

    /// 代码生成失败
    #[error("Codegen error: {0}")]
    Codegen(#[from] CodegenError),
}

/// include 链最深处出错的文件
fn source_file(error: &ResolveError) -> Option<&Path> {
    match error {
        ResolveError::Parse { path, error } => match &error.kind {
            ParserErrorKind::Include(inner) if matches!(**inner, ResolveError::Parse { .. }) => {
                source_file(inner)
            }
            _ => Some(path),
        },
        ResolveError::NotFound { path } | ResolveError::Read { path, .. } => Some(path),
        _ => None,
    }
}

/// `Foo { .. }` / `Foo(..)` 的变体名
fn variant_name(debug: String) -> String {
    debug
        .split(|c: char| c == '(' || c == ' ' || c == '{')
        .next()
        .unwrap_or_default()
        .to_string()
}

impl ElangError {
    /// 最内层的语法错误（如果有）
    pub fn parser_error(&self) -> Option<&ParserError> {
        match self {
            ElangError::Parser(e) => Some(e.innermost()),
            ElangError::Module(e) => e.parser_error(),
            _ => None,
        }
    }

    /// 获取错误行号（如果有）
    pub fn line(&self) -> Option<usize> {
        self.parser_error().and_then(ParserError::line)
    }

    /// 获取错误列号（如果有）
    pub fn column(&self) -> Option<usize> {
        self.parser_error().and_then(ParserError::column)
    }

    /// 出错的源文件（如果能确定）
    pub fn file(&self) -> Option<&Path> {
        match self {
            ElangError::Module(e) => source_file(e),
            _ => None,
        }
    }

    /// 获取错误阶段
    pub fn phase(&self) -> Phase {
        match self {
            ElangError::Module(_) | ElangError::Parser(_) => Phase::Parser,
            ElangError::Semantic(_) => Phase::Semantic,
            ElangError::Codegen(CodegenError::Layout(_)) => Phase::Layout,
            ElangError::Codegen(_) => Phase::Codegen,
        }
    }

    fn error_kind(&self) -> String {
        match self {
            ElangError::Module(e) => match self.parser_error() {
                Some(inner) => variant_name(format!("{:?}", inner.kind)),
                None => variant_name(format!("{:?}", e)),
            },
            ElangError::Parser(_) => self
                .parser_error()
                .map(|inner| variant_name(format!("{:?}", inner.kind)))
                .unwrap_or_default(),
            ElangError::Semantic(e) => variant_name(format!("{:?}", e)),
            ElangError::Codegen(e) => variant_name(format!("{:?}", e)),
        }
    }

    /// 转换为结构化错误报告
    ///
    /// 适用于编辑器集成等需要结构化数据的场景。
    /// CLI 可以直接打印，上层应用可以序列化为 JSON。
    pub fn to_report(&self) -> ErrorReport {
        let (message, location_type) = match self.parser_error() {
            Some(inner) => (
                inner.kind.to_string(),
                Some(match inner.location {
                    ErrorLocation::At(_) => "at",
                    ErrorLocation::After(_) => "after",
                    ErrorLocation::Eof => "eof",
                    ErrorLocation::Unknown => "unknown",
                }),
            ),
            None => match self {
                ElangError::Semantic(e) => (e.to_string(), None),
                ElangError::Codegen(e) => (e.to_string(), None),
                _ => (self.to_string(), None),
            },
        };
        ErrorReport {
            phase: self.phase().as_str(),
            file: self.file().map(|p| p.display().to_string()),
            line: self.line(),
            column: self.column(),
            error_kind: self.error_kind(),
            message,
            location_type,
        }
    }
}

/// 结构化错误报告
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorReport {
    /// 错误阶段: parser, semantic, layout, codegen
    pub phase: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    /// 错误行号（1-based，如果有）
    pub line: Option<usize>,
    /// 错误列号（1-based，如果有）
    pub column: Option<usize>,
    /// 错误类型（可用于程序化处理）
    pub error_kind: String,
    /// 人类可读的错误消息
    pub message: String,
    #[serde(skip)]
    pub location_type: Option<&'static str>,
}

impl std::fmt::Display for ErrorReport {
    /// 默认的 CLI 友好格式
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(file) = &self.file {
            write!(f, "{}: ", file)?;
        }
        match (self.line, self.column) {
            (Some(line), Some(col)) => {
                write!(f, "[{}:{}] {} error: {}", line, col, self.phase, self.message)
            }
            _ => write!(f, "{} error: {}", self.phase, self.message),
        }
    }
}

impl ErrorReport {
    /// 转换为 JSON 格式（工具集成使用）
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }

    /// 简洁格式（适合终端）
    pub fn to_short(&self) -> String {
        format!("{}: {}", self.phase, self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_parser_error_line_column() {
        let err = ElangError::Parser(ParserError::at(ParserErrorKind::MissingRightParen, 3, 7));
        assert_eq!(err.line(), Some(3));
        assert_eq!(err.column(), Some(7));
        assert_eq!(err.phase(), Phase::Parser);

        let report = err.to_report();
        assert_eq!(report.error_kind, "MissingRightParen");
        assert_eq!(report.location_type, Some("at"));
        assert_eq!(report.to_string(), "[3:7] parser error: Missing right parenthesis ')'");
    }

    #[test]
    fn test_nested_include_error_points_at_inner_file() {
        let inner = ResolveError::Parse {
            path: PathBuf::from("lib/util.elang"),
            error: Box::new(ParserError::at(ParserErrorKind::MissingSemicolon, 4, 2)),
        };
        let outer = ResolveError::Parse {
            path: PathBuf::from("main.elang"),
            error: Box::new(ParserError::at(ParserErrorKind::Include(Box::new(inner)), 1, 1)),
        };
        let err = ElangError::from(outer);
        assert_eq!(err.line(), Some(4));
        assert_eq!(err.file(), Some(Path::new("lib/util.elang")));
        assert_eq!(
            err.to_report().to_string(),
            "lib/util.elang: [4:2] parser error: Missing ';' after statement"
        );
    }

    #[test]
    fn test_missing_include_is_reported_in_the_including_file() {
        let missing = ResolveError::NotFound {
            path: PathBuf::from("nope.elang"),
        };
        let outer = ResolveError::Parse {
            path: PathBuf::from("main.elang"),
            error: Box::new(ParserError::at(ParserErrorKind::Include(Box::new(missing)), 2, 1)),
        };
        let err = ElangError::from(outer);
        assert_eq!(err.file(), Some(Path::new("main.elang")));
        assert_eq!(err.line(), Some(2));
        assert_eq!(err.to_report().error_kind, "Include");
    }

    #[test]
    fn test_semantic_error_report() {
        let err = ElangError::from(SemanticError::UndeclaredVariable {
            function: "main".into(),
            name: "y".into(),
        });
        assert_eq!(err.line(), None);
        assert_eq!(err.phase(), Phase::Semantic);
        let report = err.to_report();
        assert_eq!(report.error_kind, "UndeclaredVariable");
        assert_eq!(
            report.to_string(),
            "semantic error: Variable 'y' is not declared in any scope visible from 'main'"
        );
        assert_eq!(report.to_short(), "semantic: Variable 'y' is not declared in any scope visible from 'main'");
    }

    #[test]
    fn test_layout_error_phase() {
        let err = ElangError::from(CodegenError::Layout(
            elang_core::LayoutError::UnknownType("Shape".into()),
        ));
        assert_eq!(err.phase(), Phase::Layout);
        assert_eq!(err.to_report().error_kind, "Layout");
    }

    #[test]
    fn test_error_report_to_json() {
        let err = ElangError::from(CodegenError::UnknownFunction("f".into()));
        let json: serde_json::Value = serde_json::from_str(&err.to_report().to_json()).unwrap();
        assert_eq!(json["phase"], "codegen");
        assert_eq!(json["line"], serde_json::Value::Null);
        assert_eq!(json["error_kind"], "UnknownFunction");
        assert_eq!(json["message"], "Unknown function 'f'");
        assert!(json.get("file").is_none());
    }

    #[test]
    fn test_variant_name() {
        assert_eq!(variant_name("MissingEntryPoint".into()), "MissingEntryPoint");
        assert_eq!(variant_name("UnknownClass(\"A\")".into()), "UnknownClass");
        assert_eq!(variant_name("NotFound { path: \"a\" }".into()), "NotFound");
    }
}
