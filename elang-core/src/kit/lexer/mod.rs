//! 规则表驱动的词法匹配器
//!
//! 与传统的"先切 token 再解析"不同，这里的匹配器直接在剩余源码上工作：
//! - 每条规则是一个锚定在当前位置的正则表达式
//! - 规则分为三个优先级：关键字 > 运算符 > 普通 token
//! - `get_maximal_match` 返回当前位置上最长的匹配
//!
//! 解析器可以在解析过程中向规则表追加新规则（例如新发现的类名）。

pub mod matcher;
pub mod types;

pub use matcher::{MaximalMatch, Priority, Rule, RuleTable};
pub use types::{Coordinate, SourceMap};
