//! 规则表构建器
//!
//! 静态规则在这里一次性注册；类名相关的规则由 [`class_rules`] 按需生成。

use super::token_kind::TokenKind;
use crate::kit::lexer::{Priority, Rule, RuleTable};

/// 类型名之后的分隔：`T name` 或 `T* name` / `T *name`
const TYPE_SUFFIX: &str = r"(?:\s*(\*)\s*|\s+)";

fn rule(kind: TokenKind, priority: Priority, pattern: &str) -> Rule<TokenKind> {
    Rule::new(kind, priority, pattern).expect("built-in lexer rule must compile")
}

/// 创建包含全部静态规则的规则表
pub fn build_rule_table() -> RuleTable<TokenKind> {
    use Priority::*;
    use TokenKind::*;

    let mut table = RuleTable::new();

    // 关键字
    table.push(rule(
        FunctionHeader,
        Keyword,
        &format!(
            r"([A-Za-z_][\w.]*){}([A-Za-z_]\w*)\s*\(([^(){{}};]*)\)\s*\{{",
            TYPE_SUFFIX
        ),
    ));
    table.push(rule(ClassHeader, Keyword, r"class\s+([A-Za-z_]\w*)\s*\{"));
    table.push(rule(If, Keyword, r"if\s*\("));
    table.push(rule(While, Keyword, r"while\s*\("));
    table.push(rule(Include, Keyword, r"include\s*\{"));
    table.push(rule(Export, Keyword, r"export\s*\{"));
    table.push(rule(Return, Keyword, r"return\b"));
    table.push(rule(
        PrimitiveType,
        Keyword,
        &format!(r"(int|char){}", TYPE_SUFFIX),
    ));

    // 运算符
    table.push(rule(Equal, Operator, r"=="));
    table.push(rule(Assign, Operator, r"="));
    table.push(rule(Greater, Operator, r">"));
    table.push(rule(Plus, Operator, r"\+"));
    table.push(rule(Minus, Operator, r"-"));
    table.push(rule(Asterisk, Operator, r"\*"));
    table.push(rule(Slash, Operator, r"/"));
    table.push(rule(And, Operator, r"and\b|&&"));
    table.push(rule(Or, Operator, r"or\b|\|\|"));
    table.push(rule(Dot, Operator, r"\."));
    table.push(rule(New, Operator, r"new\b"));
    table.push(rule(LeftParen, Operator, r"\("));
    table.push(rule(RightParen, Operator, r"\)"));
    table.push(rule(LeftBracket, Operator, r"\["));

    // 普通 token
    table.push(rule(Decimal, Token, r"\d+"));
    table.push(rule(Char, Token, r"'(\\.|[^'\\])'"));
    table.push(rule(Call, Token, r"([A-Za-z_]\w*)\s*\("));
    table.push(rule(Identifier, Token, r"[A-Za-z_]\w*"));

    table
}

/// 为一个类名生成类型声明规则与构造调用规则
pub fn class_rules(
    name: &str,
    id: usize,
) -> Result<[Rule<TokenKind>; 2], regex::Error> {
    let escaped = regex::escape(name);
    Ok([
        Rule::new(
            TokenKind::ClassType(id),
            Priority::Keyword,
            &format!(r"({}){}", escaped, TYPE_SUFFIX),
        )?,
        Rule::new(
            TokenKind::Constructor(id),
            Priority::Keyword,
            &format!(r"({})\s*\(", escaped),
        )?,
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kind_of(text: &str) -> Option<TokenKind> {
        build_rule_table().get_maximal_match(text).map(|m| m.kind)
    }

    #[test]
    fn test_function_header_beats_type_keyword() {
        let table = build_rule_table();
        let m = table.get_maximal_match("int add(int a, int b) {").unwrap();
        assert_eq!(m.kind, TokenKind::FunctionHeader);
        assert_eq!(m.group(1), Some("int"));
        assert_eq!(m.group(3), Some("add"));
        assert_eq!(m.group(4), Some("int a, int b"));
    }

    #[test]
    fn test_declaration_is_type_keyword() {
        assert_eq!(kind_of("int x = 3;"), Some(TokenKind::PrimitiveType));
        assert_eq!(kind_of("char* p;"), Some(TokenKind::PrimitiveType));
    }

    #[test]
    fn test_identifiers_with_keyword_prefix() {
        assert_eq!(kind_of("integer = 1;"), Some(TokenKind::Identifier));
        assert_eq!(kind_of("returned;"), Some(TokenKind::Identifier));
        assert_eq!(kind_of("order > 1"), Some(TokenKind::Identifier));
        assert_eq!(kind_of("newton"), Some(TokenKind::Identifier));
    }

    #[test]
    fn test_scope_keywords() {
        assert_eq!(kind_of("if (x > 1) {"), Some(TokenKind::If));
        assert_eq!(kind_of("while(x) {"), Some(TokenKind::While));
        assert_eq!(kind_of("class Point {"), Some(TokenKind::ClassHeader));
        assert_eq!(kind_of("include { \"a.elang\" };"), Some(TokenKind::Include));
        assert_eq!(kind_of("export { main };"), Some(TokenKind::Export));
    }

    #[test]
    fn test_operators() {
        assert_eq!(kind_of("== 2"), Some(TokenKind::Equal));
        assert_eq!(kind_of("= 2"), Some(TokenKind::Assign));
        assert_eq!(kind_of("and y"), Some(TokenKind::And));
        assert_eq!(kind_of("|| y"), Some(TokenKind::Or));
        assert_eq!(kind_of("new Point()"), Some(TokenKind::New));
    }

    #[test]
    fn test_tokens() {
        assert_eq!(kind_of("42;"), Some(TokenKind::Decimal));
        assert_eq!(kind_of("'a'"), Some(TokenKind::Char));
        assert_eq!(kind_of("'\\n'"), Some(TokenKind::Char));
        assert_eq!(kind_of("f (1, 2)"), Some(TokenKind::Call));
    }

    #[test]
    fn test_class_rules() {
        let mut table = build_rule_table();
        for rule in class_rules("Outer.Inner", 0).unwrap() {
            table.push(rule);
        }
        let m = table.get_maximal_match("Outer.Inner value;").unwrap();
        assert_eq!(m.kind, TokenKind::ClassType(0));
        let m = table.get_maximal_match("Outer.Inner(1)").unwrap();
        assert_eq!(m.kind, TokenKind::Constructor(0));
    }
}
