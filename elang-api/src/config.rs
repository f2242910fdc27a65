//! API 层配置
//!
//! 包含编译配置 RunConfig 和全局单例（供 CLI 使用）

use elang_config::{CompilerConfig, LimitConfig, ProjectConfig, ToolchainConfig};
use once_cell::sync::OnceCell;

/// Compilation configuration
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunConfig {
    /// Code generation options
    pub compiler: CompilerConfig,
    /// Include depth limit
    pub limits: LimitConfig,
    /// Assembler and linker used by the CLI
    pub toolchain: ToolchainConfig,
    /// Print frame and class layouts after compilation
    pub dump_layout: bool,
}

impl RunConfig {
    /// 由项目文件构建
    pub fn from_project(project: ProjectConfig) -> Self {
        Self {
            compiler: project.compiler,
            limits: project.limits,
            toolchain: project.toolchain,
            dump_layout: false,
        }
    }
}

// Global config singleton for CLI convenience
static GLOBAL_CONFIG: OnceCell<RunConfig> = OnceCell::new();

/// Initialize global configuration
///
/// Returns `false` if the configuration was already initialized.
pub fn init(config: RunConfig) -> bool {
    GLOBAL_CONFIG.set(config).is_ok()
}

/// Get global config reference, falling back to the defaults
pub fn config() -> &'static RunConfig {
    GLOBAL_CONFIG.get_or_init(RunConfig::default)
}

/// Check if config is initialized
pub fn is_initialized() -> bool {
    GLOBAL_CONFIG.get().is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_run_config() {
        let cfg = RunConfig::default();
        assert!(!cfg.compiler.verbose);
        assert!(!cfg.dump_layout);
        assert_eq!(cfg.limits.max_include_depth, 64);
        assert_eq!(cfg.toolchain.assembler, "nasm");
    }

    #[test]
    fn test_from_project() {
        let project: ProjectConfig =
            serde_json::from_str(r#"{ "compiler": { "index_fault_status": 9 } }"#).unwrap();
        let cfg = RunConfig::from_project(project);
        assert_eq!(cfg.compiler.index_fault_status, 9);
        assert_eq!(cfg.toolchain.linker, "gcc");
    }

    #[test]
    fn test_global_config_is_always_available() {
        // 全局状态在测试间共享：无论是否已初始化都能取到配置
        let _ = init(RunConfig::default());
        assert!(is_initialized());
        assert!(!init(RunConfig::default()));
        assert_eq!(config().limits.max_include_depth, 64);
    }
}
