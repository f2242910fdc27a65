//! API 类型定义
//!
//! 编译的输入输出类型。

use elang_core::ModuleLayout;

/// 编译输出
#[derive(Debug, Clone)]
pub struct CompileOutput {
    /// 完整的 NASM 汇编文本
    pub assembly: String,
    /// 入口模块名
    pub module: String,
    /// 直接 include 的模块名
    pub includes: Vec<String>,
    /// 开启 `dump_layout` 时的栈帧与对象布局
    pub layouts: Option<Vec<ModuleLayout>>,
}
