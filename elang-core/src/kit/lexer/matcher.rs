//! 优先级规则表与最长匹配

use regex::{Captures, Regex};

/// 规则优先级
///
/// 关键字与运算符规则会完全遮蔽普通 token 规则：
/// 只有当两者都无法匹配时才会尝试普通 token。
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Priority {
    Keyword,
    Operator,
    Token,
}

/// 单条匹配规则：锚定正则 → 规则种类
#[derive(Debug, Clone)]
pub struct Rule<K> {
    pub kind: K,
    pub priority: Priority,
    pattern: Regex,
}

impl<K: Copy> Rule<K> {
    /// 创建规则，`pattern` 会被自动锚定到输入开头
    pub fn new(kind: K, priority: Priority, pattern: &str) -> Result<Self, regex::Error> {
        let pattern = Regex::new(&format!(r"\A(?:{})", pattern))?;
        Ok(Self {
            kind,
            priority,
            pattern,
        })
    }

    /// 在输入开头尝试匹配
    pub fn captures<'t>(&self, text: &'t str) -> Option<Captures<'t>> {
        self.pattern.captures(text)
    }
}

/// 一次最长匹配的结果
#[derive(Debug)]
pub struct MaximalMatch<'t, K> {
    pub kind: K,
    pub priority: Priority,
    pub captures: Captures<'t>,
}

impl<'t, K> MaximalMatch<'t, K> {
    /// 匹配到的字节长度
    pub fn len(&self) -> usize {
        self.captures.get(0).map_or(0, |m| m.end())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 第 `idx` 个捕获组的文本
    pub fn group(&self, idx: usize) -> Option<&'t str> {
        self.captures.get(idx).map(|m| m.as_str())
    }

    /// 整个匹配的文本
    pub fn text(&self) -> &'t str {
        self.group(0).unwrap_or("")
    }
}

/// 可增长的规则表
#[derive(Debug, Clone)]
pub struct RuleTable<K> {
    rules: Vec<Rule<K>>,
}

impl<K> Default for RuleTable<K> {
    fn default() -> Self {
        Self { rules: Vec::new() }
    }
}

impl<K: Copy> RuleTable<K> {
    pub fn new() -> Self {
        Self { rules: Vec::new() }
    }

    pub fn push(&mut self, rule: Rule<K>) {
        self.rules.push(rule);
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// 只保留 `keep` 返回 true 的规则，剩余规则的先后次序不变
    pub fn retain(&mut self, keep: impl FnMut(&Rule<K>) -> bool) {
        self.rules.retain(keep);
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// 返回当前位置上最长的匹配
    ///
    /// 先在关键字与运算符规则中取最长者；都不匹配时才退回普通 token。
    /// 长度相同时先注册的规则胜出。空匹配视为不匹配。
    pub fn get_maximal_match<'t>(&self, text: &'t str) -> Option<MaximalMatch<'t, K>> {
        self.best_of(text, |p| p != Priority::Token)
            .or_else(|| self.best_of(text, |p| p == Priority::Token))
    }

    fn best_of<'t>(
        &self,
        text: &'t str,
        accept: impl Fn(Priority) -> bool,
    ) -> Option<MaximalMatch<'t, K>> {
        let mut best: Option<MaximalMatch<'t, K>> = None;
        for rule in self.rules.iter().filter(|r| accept(r.priority)) {
            let Some(captures) = rule.captures(text) else {
                continue;
            };
            let candidate = MaximalMatch {
                kind: rule.kind,
                priority: rule.priority,
                captures,
            };
            if candidate.is_empty() {
                continue;
            }
            if best.as_ref().map_or(true, |b| candidate.len() > b.len()) {
                best = Some(candidate);
            }
        }
        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Kind {
        Int,
        Assign,
        Equal,
        Ident,
    }

    fn table() -> RuleTable<Kind> {
        let mut table = RuleTable::new();
        table.push(Rule::new(Kind::Int, Priority::Keyword, r"int\s+").unwrap());
        table.push(Rule::new(Kind::Assign, Priority::Operator, r"=").unwrap());
        table.push(Rule::new(Kind::Equal, Priority::Operator, r"==").unwrap());
        table.push(Rule::new(Kind::Ident, Priority::Token, r"[A-Za-z_]\w*").unwrap());
        table
    }

    #[test]
    fn test_longest_operator_wins() {
        let m = table().get_maximal_match("== b").unwrap();
        assert_eq!(m.kind, Kind::Equal);
        assert_eq!(m.len(), 2);
    }

    #[test]
    fn test_keyword_shadows_identifier() {
        // 关键字命中后普通 token 不再参与比较
        let m = table().get_maximal_match("int   value").unwrap();
        assert_eq!(m.kind, Kind::Int);
        assert_eq!(m.text(), "int   ");
    }

    #[test]
    fn test_identifier_when_no_keyword_matches() {
        let m = table().get_maximal_match("integer = 1").unwrap();
        assert_eq!(m.kind, Kind::Ident);
        assert_eq!(m.text(), "integer");
    }

    #[test]
    fn test_rules_are_anchored() {
        assert!(table().get_maximal_match("  = x").is_none());
        assert!(table().get_maximal_match("?").is_none());
    }

    #[test]
    fn test_dynamic_rule_registration() {
        let mut table = table();
        table.push(Rule::new(Kind::Int, Priority::Keyword, r"Point\s+").unwrap());
        let m = table.get_maximal_match("Point p").unwrap();
        assert_eq!(m.kind, Kind::Int);
        assert_eq!(table.len(), 5);
    }

    #[test]
    fn test_retain_drops_rules() {
        let mut table = table();
        table.retain(|rule| rule.kind != Kind::Int);
        assert_eq!(table.len(), 3);
        let m = table.get_maximal_match("int value").unwrap();
        assert_eq!(m.kind, Kind::Ident);
        assert_eq!(m.text(), "int");
    }
}
