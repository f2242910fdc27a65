//! Elang Config - Pure configuration data structures
//!
//! This crate contains only data structures and their validation, no global state.
//! It serves as the shared configuration vocabulary across all Elang crates.
//! Every type deserializes from a (possibly partial) JSON project file.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The only builtin size the IA32 backend emits instructions for
pub const SUPPORTED_SIZE: u32 = 4;

/// A configuration value the compiler cannot honor
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("Unsupported size {value} for '{field}': the IA32 backend only emits 4-byte slots")]
    UnsupportedSize { field: &'static str, value: u32 },
}

/// Configuration for code generation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompilerConfig {
    /// Annotate the generated assembly with `;` comments
    pub verbose: bool,
    /// Exit status of the emitted array bounds fault routine
    pub index_fault_status: u8,
    /// Byte sizes of the builtin types
    pub sizes: SizeConfig,
}

/// Byte sizes of the builtin types
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SizeConfig {
    pub int: u32,
    /// `char` values are widened to a full stack slot
    pub char: u32,
    /// Machine word: handles, pointers, array header fields
    pub word: u32,
}

/// Configuration for resource limits
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitConfig {
    /// Maximum nesting depth of `include` chains
    pub max_include_depth: usize,
}

/// External assembler/linker invocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolchainConfig {
    pub assembler: String,
    /// Object format passed to the assembler (`-f`)
    pub assembler_format: String,
    pub linker: String,
    pub linker_flags: Vec<String>,
}

/// Project file layout (`elang.json`)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectConfig {
    pub compiler: CompilerConfig,
    pub limits: LimitConfig,
    pub toolchain: ToolchainConfig,
}

/// Compilation phase enum for phase-specific configuration
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Lexer,
    Parser,
    Semantic,
    Layout,
    Codegen,
}

impl Phase {
    /// All phases in pipeline order
    pub const ALL: [Phase; 5] = [
        Phase::Lexer,
        Phase::Parser,
        Phase::Semantic,
        Phase::Layout,
        Phase::Codegen,
    ];

    /// Get the string name of the phase
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Lexer => "lexer",
            Phase::Parser => "parser",
            Phase::Semantic => "semantic",
            Phase::Layout => "layout",
            Phase::Codegen => "codegen",
        }
    }

    /// Get the log target name for this phase
    pub fn target(&self) -> String {
        format!("elang::{}", self.as_str())
    }
}

impl SizeConfig {
    /// Reject sizes the code generator would silently miscompile
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [("int", self.int), ("char", self.char), ("word", self.word)] {
            if value != SUPPORTED_SIZE {
                return Err(ConfigError::UnsupportedSize { field, value });
            }
        }
        Ok(())
    }
}

impl CompilerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.sizes.validate()
    }
}

impl ProjectConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.compiler.validate()
    }
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            verbose: false,
            index_fault_status: 134,
            sizes: SizeConfig::default(),
        }
    }
}

impl Default for SizeConfig {
    fn default() -> Self {
        Self {
            int: 4,
            char: 4,
            word: 4,
        }
    }
}

impl Default for LimitConfig {
    fn default() -> Self {
        Self {
            max_include_depth: 64,
        }
    }
}

impl Default for ToolchainConfig {
    fn default() -> Self {
        Self {
            assembler: "nasm".to_string(),
            assembler_format: "elf".to_string(),
            linker: "gcc".to_string(),
            linker_flags: vec!["-m32".to_string()],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_compiler_config() {
        let cfg = CompilerConfig::default();
        assert!(!cfg.verbose);
        assert_eq!(cfg.index_fault_status, 134);
        assert_eq!(cfg.sizes.word, 4);
    }

    #[test]
    fn test_default_limit_config() {
        let cfg = LimitConfig::default();
        assert_eq!(cfg.max_include_depth, 64);
    }

    #[test]
    fn test_default_toolchain() {
        let cfg = ToolchainConfig::default();
        assert_eq!(cfg.assembler, "nasm");
        assert_eq!(cfg.linker_flags, vec!["-m32".to_string()]);
    }

    #[test]
    fn test_phase_as_str() {
        assert_eq!(Phase::Lexer.as_str(), "lexer");
        assert_eq!(Phase::Codegen.target(), "elang::codegen");
        assert_eq!(Phase::ALL.len(), 5);
    }

    #[test]
    fn test_default_sizes_are_valid() {
        assert_eq!(ProjectConfig::default().validate(), Ok(()));
    }

    #[test]
    fn test_narrow_char_is_rejected() {
        let json = r#"{ "compiler": { "sizes": { "char": 1 } } }"#;
        let cfg: ProjectConfig = serde_json::from_str(json).unwrap();
        let err = cfg.validate().unwrap_err();
        assert_eq!(err, ConfigError::UnsupportedSize { field: "char", value: 1 });
        assert!(err.to_string().contains("'char'"));

        let wide = SizeConfig { word: 8, ..SizeConfig::default() };
        assert_eq!(
            wide.validate(),
            Err(ConfigError::UnsupportedSize { field: "word", value: 8 })
        );
    }

    #[test]
    fn test_partial_project_file() {
        let json = r#"{ "compiler": { "verbose": true }, "toolchain": { "linker": "clang" } }"#;
        let cfg: ProjectConfig = serde_json::from_str(json).unwrap();
        assert!(cfg.compiler.verbose);
        assert_eq!(cfg.compiler.index_fault_status, 134);
        assert_eq!(cfg.toolchain.linker, "clang");
        assert_eq!(cfg.toolchain.assembler, "nasm");
        assert_eq!(cfg.limits, LimitConfig::default());
    }
}
