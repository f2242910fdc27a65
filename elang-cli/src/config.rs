//! CLI 配置
//!
//! 包含 CLI 特有的配置：项目文件读取和分阶段日志级别

use elang_config::{Phase, ProjectConfig};
use std::path::Path;
use tracing::Level;

/// CLI 日志配置
#[derive(Debug, Clone)]
pub struct LogConfig {
    pub global: Level,
    /// 按阶段覆盖全局级别
    pub phases: Vec<(Phase, Level)>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            global: Level::WARN,
            phases: Vec::new(),
        }
    }
}

impl LogConfig {
    /// Get log level for a specific target
    pub fn level_for(&self, target: &str) -> Level {
        self.phases
            .iter()
            .find(|(phase, _)| phase.target() == target)
            .map(|(_, level)| *level)
            .unwrap_or(self.global)
    }

    /// 解析 `--log-level`：`debug` 或 `warn,parser=trace,codegen=debug`
    pub fn parse(directives: &str) -> Result<Self, String> {
        let mut config = Self::default();
        for part in directives.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            match part.split_once('=') {
                Some((phase, level)) => {
                    let phase = Phase::ALL
                        .into_iter()
                        .find(|p| p.as_str() == phase.trim())
                        .ok_or_else(|| format!("unknown phase '{}'", phase.trim()))?;
                    config.phases.push((phase, parse_level(level)?));
                }
                None => config.global = parse_level(part)?,
            }
        }
        Ok(config)
    }
}

fn parse_level(s: &str) -> Result<Level, String> {
    match s.trim().to_lowercase().as_str() {
        "silent" | "error" => Ok(Level::ERROR),
        "warn" => Ok(Level::WARN),
        "info" => Ok(Level::INFO),
        "debug" => Ok(Level::DEBUG),
        "trace" => Ok(Level::TRACE),
        other => Err(format!("unknown log level '{other}'")),
    }
}

/// 读取 JSON 项目文件，缺省字段取默认值
pub fn read_project(path: &Path) -> Result<ProjectConfig, String> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| format!("Cannot read '{}': {}", path.display(), e))?;
    let project: ProjectConfig = serde_json::from_str(&content)
        .map_err(|e| format!("Failed to parse '{}': {}", path.display(), e))?;
    project
        .validate()
        .map_err(|e| format!("Invalid '{}': {}", path.display(), e))?;
    Ok(project)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_project_with_narrow_char_is_rejected() {
        let path = std::env::temp_dir().join(format!("elang-cli-sizes-{}.json", std::process::id()));
        std::fs::write(&path, r#"{ "compiler": { "sizes": { "char": 1 } } }"#).unwrap();
        let result = read_project(&path);
        std::fs::remove_file(&path).unwrap();
        let message = result.unwrap_err();
        assert!(message.starts_with("Invalid '"));
        assert!(message.contains("Unsupported size 1 for 'char'"));
    }

    #[test]
    fn test_global_level() {
        let cfg = LogConfig::parse("debug").unwrap();
        assert_eq!(cfg.global, Level::DEBUG);
        assert_eq!(cfg.level_for("elang::codegen"), Level::DEBUG);
    }

    #[test]
    fn test_phase_override() {
        let cfg = LogConfig::parse("warn, parser=trace").unwrap();
        assert_eq!(cfg.level_for("elang::parser"), Level::TRACE);
        assert_eq!(cfg.level_for("elang::semantic"), Level::WARN);
        assert_eq!(cfg.level_for("elang::api"), Level::WARN);
    }

    #[test]
    fn test_invalid_specs() {
        assert!(LogConfig::parse("loud").is_err());
        assert!(LogConfig::parse("vm=debug").is_err());
    }
}
