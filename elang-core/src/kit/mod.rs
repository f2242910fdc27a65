//! 与语言无关的基础设施
//!
//! 目前只包含基于规则表的词法匹配器与源码位置工具。

pub mod lexer;
