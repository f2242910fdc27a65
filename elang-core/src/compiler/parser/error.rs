use crate::compiler::module::ResolveError;
use crate::compiler::types::LayoutError;
use crate::kit::lexer::types::Coordinate;

/// 语法错误，包含位置信息
#[derive(Debug, Clone, PartialEq)]
pub struct ParserError {
    /// 错误类型
    pub kind: ParserErrorKind,
    /// 错误发生的位置
    pub location: ErrorLocation,
}

/// 错误位置信息
#[derive(Debug, Clone, PartialEq)]
pub enum ErrorLocation {
    /// 特定位置
    At(Coordinate),
    /// 在某个结构之后
    After(Coordinate),
    /// 文件末尾
    Eof,
    /// 未知位置
    Unknown,
}

/// 语法错误类型
#[derive(Debug, Clone, PartialEq)]
pub enum ParserErrorKind {
    /// 没有任何规则能匹配当前输入
    UnmatchedToken(String),
    /// 意外的token
    UnexpectedToken {
        found: String,
        expected: Vec<String>,
    },
    /// 无效的数字格式
    InvalidNumberFormat(String),
    /// 无效的字符常量
    InvalidCharConstant(String),
    /// 缺少左括号
    MissingLeftParen,
    /// 缺少右括号
    MissingRightParen,
    /// 缺少右方括号
    MissingRightBracket,
    /// 缺少右花括号
    MissingRightCurly,
    /// 缺少语句结束符
    MissingSemicolon,
    /// 表达式缺少操作数或多出操作数
    MalformedExpression(String),
    /// 函数/类/if/while 头部格式错误
    MalformedHeader(String),
    /// 参数声明格式错误
    MalformedArgument(String),
    /// 同一作用域内重复声明变量
    DuplicateDeclaration(String),
    /// 同一作用域内重复声明函数
    DuplicateFunction(String),
    /// 类名重复注册
    DuplicateClass(String),
    /// 结构出现在不允许的位置（例如函数体内声明类）
    InvalidPlacement {
        construct: String,
        context: &'static str,
    },
    /// 数组维度、未知类型等布局错误
    Layout(LayoutError),
    /// include 的模块加载失败
    Include(Box<ResolveError>),
    /// 自定义错误消息
    Custom(String),
}

impl ParserError {
    /// 在指定位置创建错误
    pub fn at(kind: ParserErrorKind, line: usize, column: usize) -> Self {
        Self {
            kind,
            location: ErrorLocation::At(Coordinate { line, column }),
        }
    }

    /// 在当前位置创建错误
    pub fn here(kind: ParserErrorKind, coordinate: Coordinate) -> Self {
        Self {
            kind,
            location: ErrorLocation::At(coordinate),
        }
    }

    /// 在文件末尾创建错误
    pub fn at_eof(kind: ParserErrorKind) -> Self {
        Self {
            kind,
            location: ErrorLocation::Eof,
        }
    }

    /// include 链中最内层的错误
    pub fn innermost(&self) -> &ParserError {
        match &self.kind {
            ParserErrorKind::Include(inner) => match inner.as_ref() {
                ResolveError::Parse { error, .. } => error.innermost(),
                _ => self,
            },
            _ => self,
        }
    }

    /// 获取行号（如果可用）
    pub fn line(&self) -> Option<usize> {
        match &self.location {
            ErrorLocation::At(coord) | ErrorLocation::After(coord) => Some(coord.line),
            ErrorLocation::Eof | ErrorLocation::Unknown => None,
        }
    }

    /// 获取列号（如果可用）
    pub fn column(&self) -> Option<usize> {
        match &self.location {
            ErrorLocation::At(coord) | ErrorLocation::After(coord) => Some(coord.column),
            ErrorLocation::Eof | ErrorLocation::Unknown => None,
        }
    }
}

impl std::fmt::Display for ParserErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParserErrorKind::UnmatchedToken(text) => write!(f, "Unmatched token near '{text}'"),
            ParserErrorKind::UnexpectedToken { found, expected } => {
                if expected.is_empty() {
                    write!(f, "Unexpected token '{found}'")
                } else {
                    write!(
                        f,
                        "Unexpected token '{}', expected: {}",
                        found,
                        expected.join(", ")
                    )
                }
            }
            ParserErrorKind::InvalidNumberFormat(s) => write!(f, "Invalid number format: '{s}'"),
            ParserErrorKind::InvalidCharConstant(s) => {
                write!(f, "Invalid character constant: {s}")
            }
            ParserErrorKind::MissingLeftParen => f.write_str("Missing left parenthesis '('"),
            ParserErrorKind::MissingRightParen => f.write_str("Missing right parenthesis ')'"),
            ParserErrorKind::MissingRightBracket => f.write_str("Missing right bracket ']'"),
            ParserErrorKind::MissingRightCurly => f.write_str("Missing right curly brace '}'"),
            ParserErrorKind::MissingSemicolon => f.write_str("Missing ';' after statement"),
            ParserErrorKind::MalformedExpression(s) => write!(f, "Malformed expression: {s}"),
            ParserErrorKind::MalformedHeader(s) => write!(f, "Malformed header: {s}"),
            ParserErrorKind::MalformedArgument(s) => write!(f, "Malformed argument '{s}'"),
            ParserErrorKind::DuplicateDeclaration(name) => {
                write!(f, "Variable '{name}' is declared twice in the same scope")
            }
            ParserErrorKind::DuplicateFunction(name) => {
                write!(f, "Function '{name}' is declared twice in the same scope")
            }
            ParserErrorKind::DuplicateClass(name) => {
                write!(f, "Class '{name}' is declared more than once")
            }
            ParserErrorKind::InvalidPlacement { construct, context } => {
                write!(f, "{construct} is not allowed in {context}")
            }
            ParserErrorKind::Layout(e) => write!(f, "{e}"),
            ParserErrorKind::Include(e) => write!(f, "include failed: {e}"),
            ParserErrorKind::Custom(msg) => f.write_str(msg),
        }
    }
}

impl std::fmt::Display for ParserError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // 位置前缀
        let location_prefix = match &self.location {
            ErrorLocation::At(coord) => format!("{}:{}", coord.line, coord.column),
            ErrorLocation::After(coord) => format!("{}:{}(after)", coord.line, coord.column),
            ErrorLocation::Eof => "EOF".to_string(),
            ErrorLocation::Unknown => "?:?".to_string(),
        };
        write!(f, "[{location_prefix}] {}", self.kind)
    }
}

impl std::error::Error for ParserError {}

impl From<LayoutError> for ParserErrorKind {
    fn from(e: LayoutError) -> Self {
        ParserErrorKind::Layout(e)
    }
}

/// 解析结果类型
pub type ParseResult<T> = Result<T, ParserError>;

/// 辅助函数：创建意外token错误
pub fn unexpected_token(
    found: impl Into<String>,
    expected: Vec<impl Into<String>>,
) -> ParserErrorKind {
    ParserErrorKind::UnexpectedToken {
        found: found.into(),
        expected: expected.into_iter().map(Into::into).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_at_location() {
        let err = ParserError::at(ParserErrorKind::MissingRightParen, 10, 5);
        assert_eq!(err.line(), Some(10));
        assert_eq!(err.column(), Some(5));
        assert!(matches!(err.kind, ParserErrorKind::MissingRightParen));
    }

    #[test]
    fn test_error_at_eof() {
        let err = ParserError::at_eof(ParserErrorKind::MissingSemicolon);
        assert_eq!(err.line(), None);
        assert!(format!("{err}").contains("EOF"));
    }

    #[test]
    fn test_error_display_with_location() {
        let err = ParserError::at(unexpected_token(";", vec!["identifier"]), 5, 10);
        let display = format!("{err}");
        assert!(display.starts_with("[5:10]"));
        assert!(display.contains("Unexpected token ';', expected: identifier"));
    }

    #[test]
    fn test_layout_error_message() {
        let err = ParserError::at(LayoutError::NonConstantDimension.into(), 2, 9);
        assert!(format!("{err}").contains("Array stack declarations must have constant size"));
    }

    #[test]
    fn test_curly_brace_message() {
        let kind = ParserErrorKind::MissingRightCurly;
        assert_eq!(kind.to_string(), "Missing right curly brace '}'");
    }
}
