//! 解析期符号表：规则表 + 已登记的类

use super::error::ParserErrorKind;
use crate::compiler::lexer::{build_rule_table, class_rules, TokenKind};
use crate::kit::lexer::{MaximalMatch, RuleTable};

/// 一个可见的类名
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassSymbol {
    /// 源码中书写的名字
    pub alias: String,
    /// 限定名
    pub qualified: String,
    /// 嵌套类的短名在外层类体结束后隐藏，编号仍然有效
    pub hidden: bool,
}

/// 规则表与类表
///
/// 每登记一个类名就追加两条关键字级规则，
/// 之后出现的该类名即可被识别为类型或构造调用。
#[derive(Debug, Clone)]
pub struct SymbolTable {
    rules: RuleTable<TokenKind>,
    classes: Vec<ClassSymbol>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self {
            rules: build_rule_table(),
            classes: Vec::new(),
        }
    }

    pub fn get_maximal_match<'t>(&self, text: &'t str) -> Option<MaximalMatch<'t, TokenKind>> {
        self.rules.get_maximal_match(text)
    }

    /// 登记类名，返回其编号
    pub fn register_class(
        &mut self,
        alias: &str,
        qualified: &str,
    ) -> Result<usize, ParserErrorKind> {
        if self.visible().any(|c| c.alias == alias) {
            return Err(ParserErrorKind::DuplicateClass(alias.to_string()));
        }
        let id = self.classes.len();
        let rules = class_rules(alias, id)
            .map_err(|e| ParserErrorKind::Custom(format!("invalid class name '{alias}': {e}")))?;
        for rule in rules {
            self.rules.push(rule);
        }
        self.classes.push(ClassSymbol {
            alias: alias.to_string(),
            qualified: qualified.to_string(),
            hidden: false,
        });
        tracing::trace!(target: "elang::lexer", alias, qualified, id, "registered class rules");
        Ok(id)
    }

    /// 外层类 `outer` 的类体结束：其直接嵌套类的短名不再可见
    ///
    /// 只移除短名规则，限定名（`List.Node`）继续可用。
    pub fn close_class(&mut self, outer: &str) {
        let prefix = format!("{outer}.");
        let mut closed = Vec::new();
        for (id, class) in self.classes.iter_mut().enumerate() {
            if !class.hidden && class.qualified.strip_prefix(&prefix) == Some(class.alias.as_str()) {
                class.hidden = true;
                closed.push(id);
            }
        }
        if closed.is_empty() {
            return;
        }
        self.rules.retain(|rule| match rule.kind {
            TokenKind::ClassType(id) | TokenKind::Constructor(id) => !closed.contains(&id),
            _ => true,
        });
        tracing::trace!(target: "elang::lexer", outer, hidden = closed.len(), "closed class scope");
    }

    pub fn class(&self, id: usize) -> Option<&ClassSymbol> {
        self.classes.get(id)
    }

    /// 按书写名查找类的限定名
    pub fn qualified_name(&self, alias: &str) -> Option<&str> {
        self.visible()
            .find(|c| c.alias == alias)
            .map(|c| c.qualified.as_str())
    }

    fn visible(&self) -> impl Iterator<Item = &ClassSymbol> {
        self.classes.iter().filter(|c| !c.hidden)
    }
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}
