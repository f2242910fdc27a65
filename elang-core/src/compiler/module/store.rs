//! 源文件存储抽象
//!
//! 编译器只通过 [`SourceStore`] 读写文件，测试中可以换成内存实现。

use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, RwLock};
use thiserror::Error;

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("Path not found: {}", .path.display())]
    NotFound { path: PathBuf },
    #[error("IO error on '{}': {}", .path.display(), .message)]
    Io { path: PathBuf, message: String },
    #[error("Lock poisoned")]
    Poisoned,
}

/// 文件读写接口
pub trait SourceStore {
    fn read_to_string(&self, path: &Path) -> StoreResult<String>;

    fn write(&self, path: &Path, content: &str) -> StoreResult<()>;

    fn exists(&self, path: &Path) -> bool;

    /// 规范化路径，作为模块缓存的键
    fn canonicalize(&self, path: &Path) -> StoreResult<PathBuf>;
}

/// 词法上消去 `.` 与 `..`
pub fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                let popped = matches!(out.components().next_back(), Some(Component::Normal(_)))
                    && out.pop();
                if !popped {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// 磁盘文件系统
#[derive(Debug, Clone, Copy, Default)]
pub struct DiskStore;

impl DiskStore {
    pub fn new() -> Self {
        Self
    }
}

fn io_error(path: &Path, err: std::io::Error) -> StoreError {
    if err.kind() == std::io::ErrorKind::NotFound {
        StoreError::NotFound {
            path: path.to_path_buf(),
        }
    } else {
        StoreError::Io {
            path: path.to_path_buf(),
            message: err.to_string(),
        }
    }
}

impl SourceStore for DiskStore {
    fn read_to_string(&self, path: &Path) -> StoreResult<String> {
        std::fs::read_to_string(path).map_err(|e| io_error(path, e))
    }

    fn write(&self, path: &Path, content: &str) -> StoreResult<()> {
        std::fs::write(path, content).map_err(|e| io_error(path, e))
    }

    fn exists(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn canonicalize(&self, path: &Path) -> StoreResult<PathBuf> {
        std::fs::canonicalize(path).map_err(|e| io_error(path, e))
    }
}

/// 内存文件系统，克隆后共享同一份数据
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    files: Arc<RwLock<BTreeMap<PathBuf, String>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 预置若干文件
    pub fn with_files<I, P, C>(files: I) -> Self
    where
        I: IntoIterator<Item = (P, C)>,
        P: AsRef<Path>,
        C: Into<String>,
    {
        let store = Self::new();
        if let Ok(mut map) = store.files.write() {
            for (path, content) in files {
                map.insert(normalize(path.as_ref()), content.into());
            }
        }
        store
    }

    /// 已写入的全部路径
    pub fn paths(&self) -> Vec<PathBuf> {
        self.files
            .read()
            .map(|files| files.keys().cloned().collect())
            .unwrap_or_default()
    }
}

impl SourceStore for MemoryStore {
    fn read_to_string(&self, path: &Path) -> StoreResult<String> {
        let key = normalize(path);
        let files = self.files.read().map_err(|_| StoreError::Poisoned)?;
        files
            .get(&key)
            .cloned()
            .ok_or(StoreError::NotFound { path: key })
    }

    fn write(&self, path: &Path, content: &str) -> StoreResult<()> {
        let mut files = self.files.write().map_err(|_| StoreError::Poisoned)?;
        files.insert(normalize(path), content.to_string());
        Ok(())
    }

    fn exists(&self, path: &Path) -> bool {
        self.files
            .read()
            .map(|files| files.contains_key(&normalize(path)))
            .unwrap_or(false)
    }

    fn canonicalize(&self, path: &Path) -> StoreResult<PathBuf> {
        let key = normalize(path);
        if self.exists(&key) {
            Ok(key)
        } else {
            Err(StoreError::NotFound { path: key })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize() {
        assert_eq!(normalize(Path::new("src/./lib/../main.elang")), PathBuf::from("src/main.elang"));
        assert_eq!(normalize(Path::new("../a.elang")), PathBuf::from("../a.elang"));
        assert_eq!(normalize(Path::new("/root/x/../y.elang")), PathBuf::from("/root/y.elang"));
    }

    #[test]
    fn test_memory_store_roundtrip() {
        let store = MemoryStore::with_files([("dir/a.elang", "int x;")]);
        assert!(store.exists(Path::new("dir/./a.elang")));
        assert_eq!(store.read_to_string(Path::new("dir/a.elang")).unwrap(), "int x;");
        assert_eq!(
            store.canonicalize(Path::new("dir/b/../a.elang")).unwrap(),
            PathBuf::from("dir/a.elang")
        );
    }

    #[test]
    fn test_memory_store_clone_shares_data() {
        let store = MemoryStore::new();
        let view = store.clone();
        store.write(Path::new("out.s"), "global main").unwrap();
        assert_eq!(view.read_to_string(Path::new("out.s")).unwrap(), "global main");
        assert_eq!(view.paths(), vec![PathBuf::from("out.s")]);
    }

    #[test]
    fn test_missing_file() {
        let store = MemoryStore::new();
        assert!(matches!(
            store.read_to_string(Path::new("nope.elang")),
            Err(StoreError::NotFound { .. })
        ));
    }
}
