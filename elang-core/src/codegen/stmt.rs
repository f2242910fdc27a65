//! 语句与函数体代码生成

use super::asm::Asm;
use super::context::{Bundle, ClassInfo, ModuleContext};
use super::error::CodegenError;
use super::expr::emit_expr;
use super::layout::FrameLayout;
use crate::compiler::parser::{Conditional, Function, Stmt, StmtKind};
use crate::compiler::types::Type;

/// 生成一条语句的汇编
pub fn generate_stmt(b: &Bundle<'_>, stmt: &StmtKind) -> Result<String, CodegenError> {
    let mut asm = Asm::new();
    emit_stmt(b, stmt, &mut asm)?;
    Ok(asm.finish())
}

pub(crate) fn emit_block(b: &Bundle<'_>, body: &[Stmt], asm: &mut Asm) -> Result<(), CodegenError> {
    for stmt in body {
        emit_stmt(b, stmt, asm)?;
    }
    Ok(())
}

pub(crate) fn emit_stmt(b: &Bundle<'_>, stmt: &StmtKind, asm: &mut Asm) -> Result<(), CodegenError> {
    match stmt {
        StmtKind::Expr(expr) => {
            emit_expr(b, expr, asm)?;
            asm.ins(format!("add esp, {}", b.sizes().word()));
        }
        StmtKind::Return(value) => {
            if let Some(value) = value {
                emit_expr(b, value, asm)?;
                asm.ins("pop eax");
            }
            asm.ins("leave");
            asm.ins("ret");
        }
        StmtKind::VarDecl(declaration) => {
            if b.verbose() {
                asm.comment(format!("declare {}: {}", declaration.name, declaration.ty));
            }
        }
        StmtKind::If(conditional) => {
            let end = b.labels().fresh("endif");
            emit_condition(b, conditional, &end, asm)?;
            emit_block(&b.with_scope(conditional.scope), &conditional.body, asm)?;
            asm.label(&end);
        }
        StmtKind::While(conditional) => {
            let start = b.labels().fresh("while");
            let end = b.labels().fresh("endwhile");
            asm.label(&start);
            emit_condition(b, conditional, &end, asm)?;
            emit_block(&b.with_scope(conditional.scope), &conditional.body, asm)?;
            asm.ins(format!("jmp {}", start));
            asm.label(&end);
        }
        StmtKind::ArrayInit(init) => {
            let place = b.resolve(&init.name)?;
            let Type::Array(array) = place.ty() else {
                return Ok(());
            };
            if b.verbose() {
                asm.comment(format!("initialize {}: {}", init.name, place.ty()));
            }
            let word = b.sizes().word();
            b.emit_address(&place, asm)?;
            for layer in array.metadata(b.sizes()) {
                for offset in &layer.offsets {
                    asm.ins(format!("mov dword [eax+{}], {}", offset, layer.count));
                    asm.ins(format!("mov dword [eax+{}], {}", offset + word, layer.cell_size));
                }
            }
        }
    }
    Ok(())
}

/// 条件为假（0）时跳到 `end`
fn emit_condition(
    b: &Bundle<'_>,
    conditional: &Conditional,
    end: &str,
    asm: &mut Asm,
) -> Result<(), CodegenError> {
    emit_expr(b, &conditional.condition, asm)?;
    asm.ins("pop eax");
    asm.ins("cmp eax, 0");
    asm.ins(format!("je {}", end));
    Ok(())
}

/// 函数序言：保存 ebp 并为局部变量留出空间
pub(crate) fn emit_prologue(frame: &FrameLayout, asm: &mut Asm) {
    asm.ins("push ebp");
    asm.ins("mov ebp, esp");
    if frame.stack_size > 0 {
        asm.ins(format!("sub esp, {}", frame.stack_size));
    }
}

/// 生成完整的函数
///
/// `preamble` 是序言之后立即调用的例程（入口函数用它初始化全局变量）。
/// 最后一条顶层语句不是 return 时补上 `leave; ret`。
pub fn generate_function(
    module: &ModuleContext<'_>,
    function: &Function,
    label: &str,
    class: Option<&ClassInfo<'_>>,
    preamble: &[String],
) -> Result<String, CodegenError> {
    let frame = FrameLayout::for_function(function, &module.program.arena, module.sizes())?;
    let bundle = Bundle {
        module,
        frame: &frame,
        scope: function.scope,
        class,
    };

    let mut asm = Asm::new();
    asm.label(label);
    if bundle.verbose() {
        asm.comment(&function.signature);
    }
    emit_prologue(&frame, &mut asm);
    for routine in preamble {
        asm.ins(format!("call {}", routine));
    }
    emit_block(&bundle, &function.body, &mut asm)?;
    if !function.ends_with_return() {
        asm.ins("leave");
        asm.ins("ret");
    }

    tracing::debug!(
        target: "elang::codegen",
        function = %function.name,
        label,
        stack_size = frame.stack_size,
        "generated function"
    );
    Ok(asm.finish())
}
