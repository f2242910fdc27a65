//! 作用域树
//!
//! 所有作用域放在一个 arena 里，用 [`ScopeId`] 互相引用：
//! 子作用域保存父作用域的编号，查找时沿父链向上。

use crate::compiler::types::Type;

/// 作用域编号
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScopeId(usize);

/// 作用域内登记的变量
#[derive(Debug, Clone, PartialEq)]
pub struct VariableEntry {
    pub name: String,
    pub ty: Type,
    /// 声明语句在所属语句列表中的下标
    pub declaration_index: usize,
    pub scope: ScopeId,
}

#[derive(Debug, Clone)]
pub struct Scope {
    pub name: String,
    pub parent: Option<ScopeId>,
    pub children: Vec<ScopeId>,
    variables: Vec<VariableEntry>,
    functions: Vec<String>,
}

/// 同一作用域内的重名
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateName(pub String);

#[derive(Debug, Clone, Default)]
pub struct ScopeArena {
    scopes: Vec<Scope>,
}

impl Scope {
    pub fn variables(&self) -> &[VariableEntry] {
        &self.variables
    }

    pub fn variable(&self, name: &str) -> Option<&VariableEntry> {
        self.variables.iter().find(|v| v.name == name)
    }
}

impl ScopeArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_root(&mut self, name: impl Into<String>) -> ScopeId {
        self.push(name.into(), None)
    }

    pub fn add_child(&mut self, parent: ScopeId, name: impl Into<String>) -> ScopeId {
        let id = self.push(name.into(), Some(parent));
        self.scopes[parent.0].children.push(id);
        id
    }

    fn push(&mut self, name: String, parent: Option<ScopeId>) -> ScopeId {
        let id = ScopeId(self.scopes.len());
        self.scopes.push(Scope {
            name,
            parent,
            children: Vec::new(),
            variables: Vec::new(),
            functions: Vec::new(),
        });
        id
    }

    pub fn get(&self, id: ScopeId) -> &Scope {
        &self.scopes[id.0]
    }

    pub fn len(&self) -> usize {
        self.scopes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scopes.is_empty()
    }

    pub fn parent(&self, id: ScopeId) -> Option<ScopeId> {
        self.get(id).parent
    }

    pub fn define_variable(
        &mut self,
        scope: ScopeId,
        name: &str,
        ty: Type,
        declaration_index: usize,
    ) -> Result<(), DuplicateName> {
        let data = &mut self.scopes[scope.0];
        if data.variable(name).is_some() {
            return Err(DuplicateName(name.to_string()));
        }
        data.variables.push(VariableEntry {
            name: name.to_string(),
            ty,
            declaration_index,
            scope,
        });
        Ok(())
    }

    pub fn define_function(&mut self, scope: ScopeId, name: &str) -> Result<(), DuplicateName> {
        let data = &mut self.scopes[scope.0];
        if data.functions.iter().any(|f| f == name) {
            return Err(DuplicateName(name.to_string()));
        }
        data.functions.push(name.to_string());
        Ok(())
    }

    /// 从 `from` 开始沿父链查找变量，返回最近的一处
    pub fn lookup(&self, from: ScopeId, name: &str) -> Option<&VariableEntry> {
        let mut current = Some(from);
        while let Some(id) = current {
            let scope = self.get(id);
            if let Some(entry) = scope.variable(name) {
                return Some(entry);
            }
            current = scope.parent;
        }
        None
    }

    /// 以 `root` 为根的子树，先序排列（含 `root` 本身）
    pub fn subtree(&self, root: ScopeId) -> Vec<ScopeId> {
        let mut order = Vec::new();
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            order.push(id);
            stack.extend(self.get(id).children.iter().rev().copied());
        }
        order
    }

    /// `ancestor` 是否为 `scope` 的严格祖先
    pub fn is_ancestor(&self, ancestor: ScopeId, scope: ScopeId) -> bool {
        let mut current = self.parent(scope);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.parent(id);
        }
        false
    }
}
