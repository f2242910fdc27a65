//! 类的代码生成：方法、跳板与成员初始化例程

use super::asm::Asm;
use super::context::{Bundle, ClassInfo, ModuleContext};
use super::error::CodegenError;
use super::layout::FrameLayout;
use super::stmt::{emit_block, emit_prologue, generate_function};

/// 生成一个类（不含嵌套类，嵌套类在类表中单独出现）
pub fn generate_class(module: &ModuleContext<'_>, info: &ClassInfo<'_>) -> Result<String, CodegenError> {
    let mut asm = Asm::new();
    if module.session.config.verbose {
        asm.comment(format!("class {}", info.class.name));
    }

    for method in &info.class.functions {
        let label = info.method_label(&method.name);
        asm.append(&generate_function(module, method, &label, Some(info), &[])?);
    }

    // 所有方法调用都经过 vt_ 跳板
    for method in &info.class.functions {
        asm.label(info.trampoline(&method.name));
        asm.ins(format!("jmp {}", info.method_label(&method.name)));
    }

    if let Some(label) = info.initializer() {
        let frame = FrameLayout::for_initializer(info.class, module.sizes());
        let bundle = Bundle {
            module,
            frame: &frame,
            scope: info.class.scope,
            class: Some(info),
        };
        asm.label(&label);
        emit_prologue(&frame, &mut asm);
        emit_block(&bundle, &info.class.member_initialization, &mut asm)?;
        asm.ins("leave");
        asm.ins("ret");
    }

    tracing::debug!(
        target: "elang::codegen",
        class = %info.class.name,
        methods = info.class.functions.len(),
        heap_size = info.layout.heap_size,
        "generated class"
    );
    Ok(asm.finish())
}
