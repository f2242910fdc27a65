pub mod builder;
pub mod token_kind;

pub use builder::{build_rule_table, class_rules};
pub use token_kind::TokenKind;
