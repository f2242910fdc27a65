//! 测试辅助工具
//!
//! 在内存中的源码上跑完整流程：加载 → 语义检查 → 代码生成

#![allow(dead_code)]

use elang_core::{
    check_program, generate, CompilerConfig, LimitConfig, MemoryStore, ModuleLoader, Program,
};
use std::path::Path;

/// 入口文件名
pub const ROOT: &str = "main.elang";

/// 加载多文件程序，第一个文件是入口
pub fn load_files(files: &[(&str, &str)]) -> Result<Program, String> {
    let store = MemoryStore::with_files(files.iter().map(|(path, source)| (*path, *source)));
    let mut loader = ModuleLoader::new(store, LimitConfig::default());
    loader
        .load_root(Path::new(files[0].0))
        .map_err(|e| e.to_string())
}

pub fn load(source: &str) -> Result<Program, String> {
    load_files(&[(ROOT, source)])
}

/// 完整编译多文件程序
pub fn compile_files_with(files: &[(&str, &str)], config: &CompilerConfig) -> Result<String, String> {
    let program = load_files(files)?;
    check_program(&program).map_err(|e| e.to_string())?;
    generate(&program, config).map_err(|e| e.to_string())
}

pub fn compile_files(files: &[(&str, &str)]) -> Result<String, String> {
    compile_files_with(files, &CompilerConfig::default())
}

pub fn compile(source: &str) -> Result<String, String> {
    compile_files(&[(ROOT, source)])
}

/// 编译并在失败时打印错误
pub fn asm(source: &str) -> String {
    match compile(source) {
        Ok(text) => text,
        Err(e) => panic!("compilation failed: {e}\n--- source ---\n{source}"),
    }
}

/// 取出某个标签下的代码，直到下一个非本地标签
pub fn routine(asm: &str, label: &str) -> String {
    let header = format!("{label}:");
    let mut lines = asm.lines().skip_while(|line| *line != header);
    assert!(lines.next().is_some(), "label {label} not found in:\n{asm}");
    lines
        .take_while(|line| line.starts_with(' ') || line.starts_with(".L") || line.is_empty())
        .map(|line| format!("{line}\n"))
        .collect()
}
