use thiserror::Error;

/// 语义错误
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SemanticError {
    #[error("Program has no entry point: function 'main' is not defined")]
    MissingEntryPoint,
    #[error("Argument '{name}' of '{function}' is shadowed by a variable declaration")]
    ArgumentShadowing { function: String, name: String },
    #[error("Argument '{name}' is declared more than once in '{function}'")]
    DuplicateArgument { function: String, name: String },
    #[error("Variable '{name}' is declared more than once in '{function}'")]
    DuplicateVariable { function: String, name: String },
    #[error("Variable '{name}' is used before its declaration in '{function}'")]
    UseBeforeDeclaration { function: String, name: String },
    #[error("Variable '{name}' is not declared in any scope visible from '{function}'")]
    UndeclaredVariable { function: String, name: String },
    #[error("Module '{module}' exports '{name}', which is not a function, class or global")]
    UnknownExport { module: String, name: String },
}
