//! Elang Core - Core compiler (pure logic, IO only through `SourceStore`)
//!
//! Contains the rule-table matcher, parser, module loader, lowering,
//! semantic checks, layout and IA32 code generation.
//!
//! Configuration is passed explicitly via parameters, not via global state.

pub mod codegen;
pub mod compiler;
pub mod kit;

// Re-export common types
pub use codegen::{compile, generate, layouts, CodegenError, ModuleLayout};
pub use compiler::lowering::lower_program;
pub use compiler::module::{
    DiskStore, IncludeResolver, MemoryStore, ModuleLoader, NoIncludes, ResolveError, SourceStore,
};
pub use compiler::parser::{ParserError, ParserErrorKind, Program};
pub use compiler::semantic::{check_program, SemanticError};
pub use compiler::types::{LayoutError, SizeTable, Type};

// Re-export config types from elang-config
pub use elang_config::{CompilerConfig, ConfigError, LimitConfig, Phase, SizeConfig};
