//! 代码生成期上下文：类表、模块符号与当前函数环境

use super::asm::{frame_operand, Asm, Labels};
use super::error::CodegenError;
use super::layout::{ClassLayout, FrameLayout, Slot};
use crate::compiler::parser::{ElangClass, Function, Program, ScopeId};
use crate::compiler::types::{SizeTable, Type};
use elang_config::CompilerConfig;
use std::collections::HashMap;

/// 数组越界时跳转的共享例程
pub const INDEX_FAULT_LABEL: &str = "elang_index_fault";

/// 类在代码生成期的信息
#[derive(Debug)]
pub struct ClassInfo<'a> {
    pub class: &'a ElangClass,
    pub label: String,
    pub layout: ClassLayout,
}

impl ClassInfo<'_> {
    pub fn method_label(&self, method: &str) -> String {
        format!("{}_{}", self.label, method)
    }

    /// 方法调用统一经过的跳板
    pub fn trampoline(&self, method: &str) -> String {
        format!("vt_{}_{}", self.label, method)
    }

    /// 成员初始化例程；没有需要初始化的成员时为 `None`
    pub fn initializer(&self) -> Option<String> {
        if self.class.member_initialization.is_empty() {
            None
        } else {
            Some(format!("init_{}", self.label))
        }
    }

    pub fn method(&self, name: &str) -> Result<&Function, CodegenError> {
        self.class.method(name).ok_or_else(|| CodegenError::UnknownMethod {
            class: self.class.name.clone(),
            method: name.to_string(),
        })
    }
}

/// 所有模块的类，按限定名索引
#[derive(Debug, Default)]
pub struct ClassRegistry<'a> {
    classes: HashMap<String, ClassInfo<'a>>,
}

impl<'a> ClassRegistry<'a> {
    pub fn build(modules: &[&'a Program], sizes: &SizeTable) -> Result<Self, CodegenError> {
        let mut classes = HashMap::new();
        for module in modules {
            for class in module.all_classes() {
                let info = ClassInfo {
                    class,
                    label: class.label(),
                    layout: ClassLayout::new(class, sizes)?,
                };
                if classes.insert(class.name.clone(), info).is_some() {
                    return Err(CodegenError::DuplicateSymbol(class.name.clone()));
                }
            }
        }
        Ok(Self { classes })
    }

    pub fn get(&self, name: &str) -> Result<&ClassInfo<'a>, CodegenError> {
        self.classes
            .get(name)
            .ok_or_else(|| CodegenError::UnknownClass(name.to_string()))
    }
}

/// 整次编译共享的状态
pub struct Session<'a> {
    pub config: &'a CompilerConfig,
    pub sizes: SizeTable,
    pub labels: Labels,
    pub classes: ClassRegistry<'a>,
}

#[derive(Debug, Clone)]
pub struct FunctionSymbol {
    pub label: String,
    pub return_type: Option<Type>,
}

#[derive(Debug, Clone)]
pub struct GlobalSymbol {
    pub label: String,
    pub ty: Type,
}

/// 模块前缀：入口模块为空，被 include 的模块用模块名
pub fn function_label(module: Option<&str>, name: &str) -> String {
    match module {
        None if name == "main" => "main".to_string(),
        None => format!("fn_{}", name),
        Some(module) => format!("fn_{}__{}", module, name),
    }
}

pub fn global_label(module: Option<&str>, name: &str) -> String {
    match module {
        None => format!("g_{}", name),
        Some(module) => format!("g_{}__{}", module, name),
    }
}

pub fn init_globals_label(module: Option<&str>) -> String {
    match module {
        None => "init_globals".to_string(),
        Some(module) => format!("init_globals_{}", module),
    }
}

/// 一个模块内可见的函数与全局变量
pub struct ModuleContext<'a> {
    pub session: &'a Session<'a>,
    pub program: &'a Program,
    pub prefix: Option<&'a str>,
    pub functions: HashMap<String, FunctionSymbol>,
    pub globals: HashMap<String, GlobalSymbol>,
}

impl<'a> ModuleContext<'a> {
    pub fn new(session: &'a Session<'a>, program: &'a Program, is_root: bool) -> Self {
        let prefix = if is_root { None } else { Some(program.name.as_str()) };

        let mut functions = HashMap::new();
        let mut globals = HashMap::new();
        for function in &program.functions {
            functions.insert(
                function.name.clone(),
                FunctionSymbol {
                    label: function_label(prefix, &function.name),
                    return_type: function.return_type.clone(),
                },
            );
        }
        for global in program.globals() {
            globals.insert(
                global.name.clone(),
                GlobalSymbol {
                    label: global_label(prefix, &global.name),
                    ty: global.ty.clone(),
                },
            );
        }

        // 被 include 模块的导出，本模块同名定义优先
        for module in program.includes.values() {
            let module_prefix = Some(module.name.as_str());
            for name in &module.exports {
                if let Some(function) = module.function(name) {
                    functions.entry(name.clone()).or_insert_with(|| FunctionSymbol {
                        label: function_label(module_prefix, name),
                        return_type: function.return_type.clone(),
                    });
                } else if let Some(global) = module.global(name) {
                    globals.entry(name.clone()).or_insert_with(|| GlobalSymbol {
                        label: global_label(module_prefix, name),
                        ty: global.ty.clone(),
                    });
                }
            }
        }

        Self {
            session,
            program,
            prefix,
            functions,
            globals,
        }
    }

    pub fn sizes(&self) -> &SizeTable {
        &self.session.sizes
    }

    pub fn init_label(&self) -> String {
        init_globals_label(self.prefix)
    }

    pub fn function_label(&self, name: &str) -> String {
        function_label(self.prefix, name)
    }
}

/// 变量的存储位置
#[derive(Debug, Clone)]
pub enum Place {
    /// 栈帧内，`inline` 表示栈上数组本体
    Frame { offset: i32, ty: Type, inline: bool },
    /// 通过 `this` 访问的成员
    Member { offset: i32, ty: Type },
    /// 数据段中的全局变量
    Global { label: String, ty: Type },
}

impl Place {
    pub fn ty(&self) -> &Type {
        match self {
            Place::Frame { ty, .. } | Place::Member { ty, .. } | Place::Global { ty, .. } => ty,
        }
    }

    /// 存储本身就是数组本体（而不是句柄）
    pub fn is_inline(&self) -> bool {
        match self {
            Place::Frame { inline, .. } => *inline,
            Place::Member { ty, .. } | Place::Global { ty, .. } => ty.is_inline(),
        }
    }
}

/// 生成一个函数体时的环境
#[derive(Clone, Copy)]
pub struct Bundle<'a> {
    pub module: &'a ModuleContext<'a>,
    pub frame: &'a FrameLayout,
    /// 当前语句所在的作用域
    pub scope: ScopeId,
    pub class: Option<&'a ClassInfo<'a>>,
}

impl<'a> Bundle<'a> {
    pub fn verbose(&self) -> bool {
        self.module.session.config.verbose
    }

    pub fn sizes(&self) -> &SizeTable {
        self.module.sizes()
    }

    pub fn labels(&self) -> &Labels {
        &self.module.session.labels
    }

    pub fn classes(&self) -> &ClassRegistry<'a> {
        &self.module.session.classes
    }

    /// 进入子作用域
    pub fn with_scope(&self, scope: ScopeId) -> Self {
        Self { scope, ..*self }
    }

    /// 局部变量只在声明它的作用域及其子作用域中可见
    fn is_visible(&self, slot: &Slot) -> bool {
        match slot.scope {
            None => true,
            Some(declared) => {
                declared == self.scope || self.module.program.arena.is_ancestor(declared, self.scope)
            }
        }
    }

    /// 查找顺序：栈帧、当前类成员、全局
    pub fn resolve(&self, name: &str) -> Result<Place, CodegenError> {
        if let Some(slot) = self.frame.slot(name).filter(|slot| self.is_visible(slot)) {
            return Ok(Place::Frame {
                offset: slot.offset,
                ty: slot.ty.clone(),
                inline: !slot.argument && slot.ty.is_inline(),
            });
        }
        if let Some(member) = self.class.and_then(|c| c.layout.member(name)) {
            return Ok(Place::Member {
                offset: member.offset,
                ty: member.ty.clone(),
            });
        }
        if let Some(global) = self.module.globals.get(name) {
            return Ok(Place::Global {
                label: global.label.clone(),
                ty: global.ty.clone(),
            });
        }
        Err(CodegenError::UnknownVariable(name.to_string()))
    }

    /// `this` 句柄所在的栈帧地址
    pub fn this_operand(&self) -> Result<String, CodegenError> {
        self.frame
            .slot("this")
            .map(|slot| frame_operand(slot.offset))
            .ok_or_else(|| CodegenError::UnknownVariable("this".to_string()))
    }

    /// 把位置的地址放入 eax
    pub fn emit_address(&self, place: &Place, asm: &mut Asm) -> Result<(), CodegenError> {
        match place {
            Place::Frame { offset, .. } => asm.ins(format!("lea eax, {}", frame_operand(*offset))),
            Place::Member { offset, .. } => {
                asm.ins(format!("mov eax, {}", self.this_operand()?));
                if *offset != 0 {
                    asm.ins(format!("add eax, {}", offset));
                }
            }
            Place::Global { label, .. } => asm.ins(format!("mov eax, {}", label)),
        }
        Ok(())
    }
}
