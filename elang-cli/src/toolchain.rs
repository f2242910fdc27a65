//! 外部汇编器与链接器
//!
//! `nasm -f elf x.asm -o x.o`，然后 `gcc -m32 x.o -o dest`。

use elang_config::ToolchainConfig;
use std::path::{Path, PathBuf};
use std::process::Command;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ToolchainError {
    #[error("Failed to run '{program}': {message}")]
    Spawn { program: String, message: String },
    #[error("'{program}' exited with {status}\n{stderr}")]
    Failed {
        program: String,
        status: String,
        stderr: String,
    },
}

/// 编译过程中的临时文件，默认在结束时删除
#[derive(Debug)]
pub struct Temporaries {
    pub assembly: PathBuf,
    pub object: PathBuf,
    keep: bool,
}

impl Temporaries {
    /// 与源文件同目录：`source.asm`、`source.o`
    pub fn beside(source: &Path, keep: bool) -> Self {
        let with_suffix = |suffix: &str| {
            let mut name = source.as_os_str().to_os_string();
            name.push(suffix);
            PathBuf::from(name)
        };
        Self {
            assembly: with_suffix(".asm"),
            object: with_suffix(".o"),
            keep,
        }
    }
}

impl Drop for Temporaries {
    fn drop(&mut self) {
        if self.keep {
            return;
        }
        for path in [&self.assembly, &self.object] {
            if path.exists() {
                if let Err(e) = std::fs::remove_file(path) {
                    tracing::warn!(target: "elang::cli", path = %path.display(), error = %e, "failed to remove temporary file");
                }
            }
        }
    }
}

fn run(program: &str, args: &[String]) -> Result<(), ToolchainError> {
    tracing::info!(target: "elang::cli", program, args = ?args, "running");
    let output = Command::new(program)
        .args(args)
        .output()
        .map_err(|e| ToolchainError::Spawn {
            program: program.to_string(),
            message: e.to_string(),
        })?;
    if output.status.success() {
        Ok(())
    } else {
        Err(ToolchainError::Failed {
            program: program.to_string(),
            status: output.status.to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

fn path_arg(path: &Path) -> String {
    path.display().to_string()
}

pub fn assembler_args(config: &ToolchainConfig, assembly: &Path, object: &Path) -> Vec<String> {
    vec![
        "-f".to_string(),
        config.assembler_format.clone(),
        path_arg(assembly),
        "-o".to_string(),
        path_arg(object),
    ]
}

pub fn linker_args(config: &ToolchainConfig, object: &Path, executable: &Path) -> Vec<String> {
    let mut args = config.linker_flags.clone();
    args.extend([path_arg(object), "-o".to_string(), path_arg(executable)]);
    args
}

/// 汇编并链接出可执行文件
pub fn build_executable(
    config: &ToolchainConfig,
    temps: &Temporaries,
    executable: &Path,
) -> Result<(), ToolchainError> {
    run(&config.assembler, &assembler_args(config, &temps.assembly, &temps.object))?;
    run(&config.linker, &linker_args(config, &temps.object, executable))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_temporaries_are_named_after_source() {
        let temps = Temporaries::beside(Path::new("src/prog.elang"), true);
        assert_eq!(temps.assembly, PathBuf::from("src/prog.elang.asm"));
        assert_eq!(temps.object, PathBuf::from("src/prog.elang.o"));
    }

    #[test]
    fn test_default_command_lines() {
        let config = ToolchainConfig::default();
        assert_eq!(
            assembler_args(&config, Path::new("a.asm"), Path::new("a.o")),
            vec!["-f", "elf", "a.asm", "-o", "a.o"]
        );
        assert_eq!(
            linker_args(&config, Path::new("a.o"), Path::new("a.out")),
            vec!["-m32", "a.o", "-o", "a.out"]
        );
    }

    #[test]
    fn test_temporaries_removed_on_drop() {
        let dir = std::env::temp_dir().join(format!("elang-cli-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let temps = Temporaries::beside(&dir.join("t.elang"), false);
        std::fs::write(&temps.assembly, "x").unwrap();
        let assembly = temps.assembly.clone();
        drop(temps);
        assert!(!assembly.exists());
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_missing_program_is_a_spawn_error() {
        let err = run("elang-no-such-assembler", &[]).unwrap_err();
        assert!(matches!(err, ToolchainError::Spawn { .. }));
    }
}
