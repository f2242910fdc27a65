//! Elang API - Compilation orchestration layer
//!
//! Provides a unified compilation interface, including:
//! - Pipeline orchestration (load → check → generate)
//! - Configuration abstraction (RunConfig)
//! - Unified error handling (ElangError)
//!
//! For CLI convenience, this crate provides a global configuration singleton.
//! For library use, prefer the explicit `compile_to_string(source, &config)` API.

use std::path::Path;

use elang_core::{DiskStore, ModuleLoader, NoIncludes, Program};

// Re-export config
pub mod config;
pub use config::{config as get_config, init as init_config, is_initialized, RunConfig};

// Re-export config types from elang_config
pub use elang_config::{
    CompilerConfig, LimitConfig, Phase, ProjectConfig, SizeConfig, ToolchainConfig,
};

// Re-export error and types
pub mod error;
pub mod types;
pub use error::{ElangError, ErrorReport};
pub use types::CompileOutput;

// Re-export core types
pub use elang_config;
pub use elang_core::{ModuleLayout, Type};

/// 解析单个源码串（不允许 include），并完成降级
pub fn parse_source(module: &str, source: &str) -> Result<Program, ElangError> {
    use elang_core::compiler::parser::Parser;

    let mut includes = NoIncludes;
    let mut program = Parser::new(module, source, &mut includes).parse()?;
    elang_core::lower_program(&mut program);
    Ok(program)
}

/// 从磁盘加载入口文件及其 include 的全部模块
pub fn parse_file(path: &Path, config: &RunConfig) -> Result<Program, ElangError> {
    let mut loader = ModuleLoader::new(DiskStore::new(), config.limits.clone());
    let program = loader.load_root(path)?;
    tracing::debug!(
        target: "elang::api",
        path = %path.display(),
        modules = loader.cached() + 1,
        "loaded program"
    );
    Ok(program)
}

/// 语义检查
pub fn check(program: &Program) -> Result<(), ElangError> {
    elang_core::check_program(program)?;
    Ok(())
}

/// 对已加载的程序做语义检查并生成汇编
pub fn compile_program(program: &Program, config: &RunConfig) -> Result<CompileOutput, ElangError> {
    tracing::info!(target: "elang::api", module = %program.name, "Starting compilation");

    check(program)?;
    let assembly = elang_core::generate(program, &config.compiler)?;
    let layouts = if config.dump_layout {
        Some(elang_core::layouts(program, &config.compiler)?)
    } else {
        None
    };

    tracing::info!(
        target: "elang::api",
        module = %program.name,
        bytes = assembly.len(),
        "Compilation completed"
    );
    Ok(CompileOutput {
        assembly,
        module: program.name.clone(),
        includes: program.includes.keys().cloned().collect(),
        layouts,
    })
}

/// Compile a single source string with explicit configuration
///
/// This is the recommended API for library users.
pub fn compile_to_string(source: &str, config: &RunConfig) -> Result<CompileOutput, ElangError> {
    let program = parse_source("main", source)?;
    compile_program(&program, config)
}

/// Compile a file and everything it includes
pub fn compile_file(path: &Path, config: &RunConfig) -> Result<CompileOutput, ElangError> {
    let program = parse_file(path, config)?;
    compile_program(&program, config)
}

/// 检查已加载的程序并把汇编写入 `destination`
///
/// 出错时不会写出任何文件。
pub fn compile(program: &Program, destination: &Path, config: &RunConfig) -> Result<(), ElangError> {
    check(program)?;
    elang_core::compile(program, destination, &config.compiler, &DiskStore::new())?;
    tracing::info!(
        target: "elang::api",
        destination = %destination.display(),
        "Wrote assembly"
    );
    Ok(())
}

/// 加载 `source` 并编译到 `destination`，返回加载后的程序
pub fn compile_to(source: &Path, destination: &Path, config: &RunConfig) -> Result<Program, ElangError> {
    let program = parse_file(source, config)?;
    compile(&program, destination, config)?;
    Ok(program)
}

/// 各模块的栈帧与对象布局
pub fn layout_report(program: &Program, config: &RunConfig) -> Result<Vec<ModuleLayout>, ElangError> {
    Ok(elang_core::layouts(program, &config.compiler)?)
}
