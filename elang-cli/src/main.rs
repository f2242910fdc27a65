//! Elang CLI - Command line interface
//!
//! `elang <source> <destination>`：编译到汇编，再交给 nasm 与 gcc 生成 32 位可执行文件。

use clap::Parser;
use std::path::{Path, PathBuf};
use std::process;

mod config;
mod logging;
mod platform;
mod toolchain;

use crate::config::{read_project, LogConfig};
use crate::logging::LogFormat;
use crate::platform::print_error_with_source;
use crate::toolchain::{build_executable, Temporaries};
use elang_api::{get_config, init_config, ProjectConfig, RunConfig};

#[derive(Parser)]
#[command(
    name = "elang",
    about = "Elang compiler - C-like source to IA32 executables",
    version = "0.1.0"
)]
struct Cli {
    /// Entry source file
    #[arg(value_name = "SOURCE")]
    source: PathBuf,

    /// Output executable (or assembly file with -S)
    #[arg(value_name = "DESTINATION")]
    destination: PathBuf,

    /// Stop after writing the assembly to DESTINATION
    #[arg(short = 'S')]
    assembly_only: bool,

    /// Keep the intermediate .asm and .o files
    #[arg(long)]
    keep_temps: bool,

    /// Annotate the generated assembly with comments
    #[arg(long)]
    verbose_asm: bool,

    /// Print frame and class layouts as JSON
    #[arg(long)]
    dump_layout: bool,

    /// JSON project file with compiler, limit and toolchain settings
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log level, optionally per phase: `info` or `warn,parser=debug`
    #[arg(long, value_name = "LEVEL", default_value = "warn")]
    log_level: String,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Compact)]
    log_format: LogFormat,
}

fn main() {
    let cli = Cli::parse();

    let log_config = match LogConfig::parse(&cli.log_level) {
        Ok(cfg) => cfg,
        Err(e) => exit_with(&format!("Error: {e}")),
    };
    logging::init(&log_config, cli.log_format);

    let project = match &cli.config {
        Some(path) => read_project(path).unwrap_or_else(|e| exit_with(&format!("Error: {e}"))),
        None => ProjectConfig::default(),
    };
    init_config(build_run_config(project, &cli));

    if !cli.source.exists() {
        exit_with(&format!("Error: Cannot read source file '{}'", cli.source.display()));
    }

    if cli.assembly_only {
        compile_assembly(&cli);
    } else {
        compile_executable(&cli);
    }
}

fn build_run_config(project: ProjectConfig, cli: &Cli) -> RunConfig {
    let mut config = RunConfig::from_project(project);
    config.compiler.verbose |= cli.verbose_asm;
    config.dump_layout = cli.dump_layout;
    config
}

fn exit_with(message: &str) -> ! {
    eprintln!("{message}");
    process::exit(1);
}

/// 编译到 `assembly`，失败时打印错误并退出
fn write_assembly(cli: &Cli, assembly: &Path) {
    let config = get_config();
    match elang_api::compile_to(&cli.source, assembly, config) {
        Ok(program) => {
            if config.dump_layout {
                match elang_api::layout_report(&program, config) {
                    Ok(layouts) => dump_layout(&layouts),
                    Err(e) => {
                        print_error_with_source(&e, &cli.source);
                        process::exit(1);
                    }
                }
            }
        }
        Err(e) => {
            print_error_with_source(&e, &cli.source);
            process::exit(1);
        }
    }
}

fn dump_layout(layouts: &[elang_api::ModuleLayout]) {
    match serde_json::to_string_pretty(layouts) {
        Ok(json) => println!("{json}"),
        Err(e) => tracing::warn!(target: "elang::cli", error = %e, "failed to serialize layouts"),
    }
}

fn compile_assembly(cli: &Cli) {
    write_assembly(cli, &cli.destination);
}

fn compile_executable(cli: &Cli) {
    let temps = Temporaries::beside(&cli.source, cli.keep_temps);
    write_assembly(cli, &temps.assembly);

    if let Err(e) = build_executable(&get_config().toolchain, &temps, &cli.destination) {
        // 退出前清理临时文件
        drop(temps);
        exit_with(&format!("❌ {e}"));
    }
    tracing::info!(target: "elang::cli", executable = %cli.destination.display(), "Build finished");
}
