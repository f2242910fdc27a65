//! 整个程序的汇编输出
//!
//! 输出结构：
//! ```text
//! global main / extern malloc
//! section .data   每个全局变量一块清零存储
//! section .text   越界故障例程，然后按依赖顺序输出每个模块
//! ```
//! 被 include 的模块先于包含它的模块输出，入口模块最后。

use super::asm::{Asm, Labels};
use super::class::generate_class;
use super::context::{Bundle, ClassRegistry, ModuleContext, Session, INDEX_FAULT_LABEL};
use super::error::CodegenError;
use super::layout::{FrameLayout, ModuleLayout};
use super::stmt::{emit_prologue, emit_stmt, generate_function};
use crate::compiler::parser::Program;
use crate::compiler::types::SizeTable;
use elang_config::CompilerConfig;
use std::collections::HashSet;

/// 程序代码生成器
pub struct ProgramCompiler<'c> {
    config: &'c CompilerConfig,
}

impl<'c> ProgramCompiler<'c> {
    pub fn new(config: &'c CompilerConfig) -> Self {
        Self { config }
    }

    pub fn generate(&self, program: &Program) -> Result<String, CodegenError> {
        if !program.has_entry_point() {
            return Err(CodegenError::MissingEntryPoint);
        }

        let modules = dependency_order(program);
        let sizes = size_table(&modules, self.config)?;
        let classes = ClassRegistry::build(&modules, &sizes)?;
        let session = Session {
            config: self.config,
            sizes,
            labels: Labels::new(),
            classes,
        };

        let root = modules.len() - 1;
        let contexts: Vec<ModuleContext<'_>> = modules
            .iter()
            .enumerate()
            .map(|(i, module)| ModuleContext::new(&session, module, i == root))
            .collect();

        let mut asm = Asm::new();
        asm.line("global main");
        asm.line("extern malloc");
        asm.line("");
        asm.line("section .data");
        for context in &contexts {
            emit_globals(context, &mut asm)?;
        }
        asm.line("");
        asm.line("section .text");
        self.emit_index_fault(&mut asm);

        // 入口函数在序言后依次调用各模块的全局初始化例程
        let initializers: Vec<String> = contexts
            .iter()
            .filter(|c| has_initialization(c.program))
            .map(|c| c.init_label())
            .collect();

        for (i, context) in contexts.iter().enumerate() {
            asm.append(&generate_module(context, i == root, &initializers)?);
        }

        tracing::debug!(
            target: "elang::codegen",
            modules = contexts.len(),
            labels = session.labels.issued(),
            "generated program"
        );
        Ok(asm.finish())
    }

    fn emit_index_fault(&self, asm: &mut Asm) {
        asm.label(INDEX_FAULT_LABEL);
        asm.ins("mov eax, 1");
        asm.ins(format!("mov ebx, {}", self.config.index_fault_status));
        asm.ins("int 0x80");
    }
}

/// 被 include 的模块在前（按名字去重），入口模块最后
fn dependency_order(root: &Program) -> Vec<&Program> {
    fn visit<'p>(program: &'p Program, seen: &mut HashSet<&'p str>, out: &mut Vec<&'p Program>) {
        for included in program.includes.values() {
            if seen.insert(included.name.as_str()) {
                visit(included, seen, out);
            }
        }
        out.push(program);
    }

    let mut seen = HashSet::new();
    let mut out = Vec::new();
    visit(root, &mut seen, &mut out);
    out
}

/// 内置类型加上所有模块中的类
fn size_table(modules: &[&Program], config: &CompilerConfig) -> Result<SizeTable, CodegenError> {
    config.validate()?;
    let mut sizes = SizeTable::new(&config.sizes);
    for module in modules {
        for class in module.all_classes() {
            sizes.register_class(&class.name);
        }
    }
    Ok(sizes)
}

fn has_initialization(program: &Program) -> bool {
    program.initialization().next().is_some()
}

fn emit_globals(context: &ModuleContext<'_>, asm: &mut Asm) -> Result<(), CodegenError> {
    for global in context.program.globals() {
        let Some(symbol) = context.globals.get(&global.name) else {
            continue;
        };
        let size = global.ty.checked_stack_size(context.sizes())?;
        asm.line(format!("{}: times {} db 0", symbol.label, size));
    }
    Ok(())
}

fn generate_module(
    context: &ModuleContext<'_>,
    is_root: bool,
    initializers: &[String],
) -> Result<String, CodegenError> {
    let program = context.program;
    let mut asm = Asm::new();
    if context.session.config.verbose {
        asm.comment(format!("module {}", program.name));
    }

    if has_initialization(program) {
        let frame = FrameLayout::default();
        let bundle = Bundle {
            module: context,
            frame: &frame,
            scope: program.scope,
            class: None,
        };
        asm.label(context.init_label());
        emit_prologue(&frame, &mut asm);
        for stmt in program.initialization() {
            emit_stmt(&bundle, stmt, &mut asm)?;
        }
        asm.ins("leave");
        asm.ins("ret");
    }

    for function in &program.functions {
        let label = context.function_label(&function.name);
        let preamble: &[String] = if is_root && function.name == "main" {
            initializers
        } else {
            &[]
        };
        asm.append(&generate_function(context, function, &label, None, preamble)?);
    }

    for class in program.all_classes() {
        let info = context.session.classes.get(&class.name)?;
        asm.append(&generate_class(context, info)?);
    }
    Ok(asm.finish())
}

/// 生成程序的完整汇编文本
pub fn generate(program: &Program, config: &CompilerConfig) -> Result<String, CodegenError> {
    ProgramCompiler::new(config).generate(program)
}

/// 每个模块的栈帧与对象布局，顺序与汇编输出一致
pub fn layouts(program: &Program, config: &CompilerConfig) -> Result<Vec<ModuleLayout>, CodegenError> {
    let modules = dependency_order(program);
    let sizes = size_table(&modules, config)?;
    let mut out = Vec::with_capacity(modules.len());
    for module in modules {
        out.push(ModuleLayout::new(module, &sizes)?);
    }
    Ok(out)
}
