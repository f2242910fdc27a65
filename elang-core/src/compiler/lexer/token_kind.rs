//! Elang Token 类型定义

/// 规则表中每条规则对应的种类
///
/// `ClassType` / `Constructor` 携带类在符号表中的编号，
/// 由解析器在发现新类时动态注册。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    // 作用域关键字（整块解析）
    FunctionHeader,
    ClassHeader,
    If,
    While,
    Include,
    Export,

    // 语句关键字
    Return,
    PrimitiveType,
    ClassType(usize),
    Constructor(usize),

    // 运算符
    Assign,
    Equal,
    Greater,
    Plus,
    Minus,
    Asterisk,
    Slash,
    And,
    Or,
    Dot,
    New,
    LeftParen,
    RightParen,
    LeftBracket,

    // 普通 token
    Decimal,
    Char,
    Call,
    Identifier,
}

impl TokenKind {
    /// 是否开启一个新的作用域块
    pub fn opens_scope(&self) -> bool {
        matches!(
            self,
            TokenKind::FunctionHeader | TokenKind::ClassHeader | TokenKind::If | TokenKind::While
        )
    }

    /// 是否声明一个变量类型
    pub fn is_type(&self) -> bool {
        matches!(self, TokenKind::PrimitiveType | TokenKind::ClassType(_))
    }
}

impl std::fmt::Display for TokenKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            TokenKind::FunctionHeader => "function declaration",
            TokenKind::ClassHeader => "class declaration",
            TokenKind::If => "if",
            TokenKind::While => "while",
            TokenKind::Include => "include",
            TokenKind::Export => "export",
            TokenKind::Return => "return",
            TokenKind::PrimitiveType | TokenKind::ClassType(_) => "type name",
            TokenKind::Constructor(_) => "constructor call",
            TokenKind::Assign => "=",
            TokenKind::Equal => "==",
            TokenKind::Greater => ">",
            TokenKind::Plus => "+",
            TokenKind::Minus => "-",
            TokenKind::Asterisk => "*",
            TokenKind::Slash => "/",
            TokenKind::And => "and",
            TokenKind::Or => "or",
            TokenKind::Dot => ".",
            TokenKind::New => "new",
            TokenKind::LeftParen => "(",
            TokenKind::RightParen => ")",
            TokenKind::LeftBracket => "[",
            TokenKind::Decimal => "decimal constant",
            TokenKind::Char => "character constant",
            TokenKind::Call => "function call",
            TokenKind::Identifier => "identifier",
        };
        f.write_str(text)
    }
}
