use super::store::SourceStore;
use super::{IncludeResolver, ResolveError};
use crate::compiler::lowering::lower_program;
use crate::compiler::parser::{Parser, Program};
use elang_config::LimitConfig;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;

/// 模块加载器
///
/// 按规范化路径缓存已解析的模块；模块名取文件名（不含扩展名），
/// 不同文件得到相同模块名时报错，因为模块名会出现在汇编标签中。
pub struct ModuleLoader<S: SourceStore> {
    store: S,
    limits: LimitConfig,
    /// 模块缓存：规范化路径 → 模块
    cache: HashMap<PathBuf, Rc<Program>>,
    /// 模块名 → 路径
    names: HashMap<String, PathBuf>,
    /// 当前解析栈（用于检测循环依赖）
    resolving_stack: Vec<PathBuf>,
}

/// 绑定了当前文件目录的 include 解析器
struct IncludeContext<'l, S: SourceStore> {
    loader: &'l mut ModuleLoader<S>,
    base_dir: PathBuf,
}

impl<S: SourceStore> IncludeResolver for IncludeContext<'_, S> {
    fn resolve_include(&mut self, path: &str) -> Result<Rc<Program>, ResolveError> {
        let target = self.base_dir.join(path);
        self.loader.load(&target)
    }
}

/// 文件名 → 可用于标签的模块名
pub(crate) fn module_name(path: &Path) -> String {
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("main");
    stem.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect()
}

impl<S: SourceStore> ModuleLoader<S> {
    pub fn new(store: S, limits: LimitConfig) -> Self {
        Self {
            store,
            limits,
            cache: HashMap::new(),
            names: HashMap::new(),
            resolving_stack: Vec::new(),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// 已加载（被 include）的模块数
    pub fn cached(&self) -> usize {
        self.cache.len()
    }

    /// 加载入口文件，返回独占的语法树
    pub fn load_root(&mut self, path: &Path) -> Result<Program, ResolveError> {
        let canonical = self.canonicalize(path)?;
        self.parse_file(&canonical)
    }

    /// 加载被 include 的文件，结果会被缓存
    pub fn load(&mut self, path: &Path) -> Result<Rc<Program>, ResolveError> {
        let canonical = self.canonicalize(path)?;

        // 检查缓存
        if let Some(program) = self.cache.get(&canonical) {
            tracing::trace!(target: "elang::module", path = %canonical.display(), "module cache hit");
            return Ok(Rc::clone(program));
        }

        let program = Rc::new(self.parse_file(&canonical)?);
        self.cache.insert(canonical, Rc::clone(&program));
        Ok(program)
    }

    fn canonicalize(&self, path: &Path) -> Result<PathBuf, ResolveError> {
        self.store
            .canonicalize(path)
            .map_err(|_| ResolveError::NotFound {
                path: path.to_path_buf(),
            })
    }

    fn parse_file(&mut self, canonical: &Path) -> Result<Program, ResolveError> {
        // 检测循环依赖
        if self.resolving_stack.iter().any(|p| p == canonical) {
            let mut chain: Vec<String> = self
                .resolving_stack
                .iter()
                .map(|p| p.display().to_string())
                .collect();
            chain.push(canonical.display().to_string());
            return Err(ResolveError::CircularDependency { chain });
        }
        if self.resolving_stack.len() >= self.limits.max_include_depth {
            return Err(ResolveError::TooDeep {
                limit: self.limits.max_include_depth,
            });
        }

        let source = self
            .store
            .read_to_string(canonical)
            .map_err(|e| ResolveError::Read {
                path: canonical.to_path_buf(),
                message: e.to_string(),
            })?;

        let name = module_name(canonical);
        if let Some(first) = self.names.get(&name) {
            if first != canonical {
                return Err(ResolveError::DuplicateModule {
                    name,
                    first: first.clone(),
                    second: canonical.to_path_buf(),
                });
            }
        }
        self.names.insert(name.clone(), canonical.to_path_buf());

        tracing::debug!(target: "elang::module", module = %name, path = %canonical.display(), "loading module");

        // 推入解析栈
        self.resolving_stack.push(canonical.to_path_buf());
        let base_dir = canonical.parent().map(Path::to_path_buf).unwrap_or_default();
        let result = {
            let mut context = IncludeContext {
                loader: self,
                base_dir,
            };
            Parser::new(&name, &source, &mut context).parse()
        };
        // 弹出解析栈
        self.resolving_stack.pop();

        let mut program = result.map_err(|error| ResolveError::Parse {
            path: canonical.to_path_buf(),
            error: Box::new(error),
        })?;
        lower_program(&mut program);
        Ok(program)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::module::MemoryStore;

    fn loader(files: &[(&str, &str)]) -> ModuleLoader<MemoryStore> {
        let store = MemoryStore::with_files(files.iter().map(|(p, c)| (*p, *c)));
        ModuleLoader::new(store, LimitConfig::default())
    }

    #[test]
    fn test_include_is_parsed_once() {
        let mut loader = loader(&[
            ("app/main.elang", "include { \"lib/a.elang\", \"lib/b.elang\" };\nint main() { return 0; }"),
            ("app/lib/a.elang", "include { \"c.elang\" };"),
            ("app/lib/b.elang", "include { \"c.elang\" };"),
            ("app/lib/c.elang", "int shared() { return 1; }\nexport { shared };"),
        ]);
        let program = loader.load_root(Path::new("app/main.elang")).unwrap();
        assert_eq!(program.name, "main");
        assert_eq!(program.includes.len(), 2);
        let a = &program.includes["a"];
        let b = &program.includes["b"];
        assert!(Rc::ptr_eq(&a.includes["c"], &b.includes["c"]));
        assert_eq!(loader.cached(), 3);
    }

    #[test]
    fn test_circular_include() {
        let mut loader = loader(&[
            ("main.elang", "include { \"a.elang\" };\nint main() { return 0; }"),
            ("a.elang", "include { \"b.elang\" };"),
            ("b.elang", "include { \"a.elang\" };"),
        ]);
        let err = loader.load_root(Path::new("main.elang")).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("Circular dependency detected"), "{message}");
        assert!(message.contains("a.elang → b.elang → a.elang"), "{message}");
    }

    #[test]
    fn test_missing_include() {
        let mut loader = loader(&[("main.elang", "include { \"nope.elang\" };")]);
        let err = loader.load_root(Path::new("main.elang")).unwrap_err();
        let inner = err.parser_error().unwrap();
        assert!(inner.to_string().contains("not found"));
    }

    #[test]
    fn test_duplicate_module_name() {
        let mut loader = loader(&[
            ("main.elang", "include { \"x/util.elang\", \"y/util.elang\" };"),
            ("x/util.elang", ""),
            ("y/util.elang", ""),
        ]);
        let err = loader.load_root(Path::new("main.elang")).unwrap_err();
        assert!(err.to_string().contains("Module name 'util'"));
    }

    #[test]
    fn test_module_name_is_sanitized() {
        assert_eq!(module_name(Path::new("src/my-lib.v2.elang")), "my_lib_v2");
    }
}
