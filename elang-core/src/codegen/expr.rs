//! 表达式代码生成
//!
//! 每个表达式在栈上留下恰好一个字：值，或者数组/对象的地址。
//! 二元运算先算右操作数再算左操作数，弹出时左值在 eax、右值在 ecx。
//! 只使用 eax、ecx、edx 三个调用者保存寄存器。

use super::asm::Asm;
use super::context::{Bundle, ClassInfo, INDEX_FAULT_LABEL};
use super::error::CodegenError;
use crate::compiler::parser::{Binary, BinaryOp, ExprKind, Function, FunctionCall, New};
use crate::compiler::types::{ArrayType, Layer, Primitive, Type};

/// 生成一个表达式的汇编
pub fn generate_expr(b: &Bundle<'_>, expr: &ExprKind) -> Result<String, CodegenError> {
    let mut asm = Asm::new();
    emit_expr(b, expr, &mut asm)?;
    Ok(asm.finish())
}

/// 调用目标
enum CallTarget<'a> {
    Function { label: String },
    /// 当前类的方法，隐式传入 `this`
    Method { class: &'a ClassInfo<'a> },
}

fn resolve_call<'a>(b: &Bundle<'a>, call: &FunctionCall) -> Result<CallTarget<'a>, CodegenError> {
    if let Some(class) = &call.constructor_of {
        return Err(CodegenError::BareConstructor(class.clone()));
    }
    if let Some(class) = b.class {
        if class.class.method(&call.name).is_some() {
            return Ok(CallTarget::Method { class });
        }
    }
    b.module
        .functions
        .get(&call.name)
        .map(|symbol| CallTarget::Function {
            label: symbol.label.clone(),
        })
        .ok_or_else(|| CodegenError::UnknownFunction(call.name.clone()))
}

fn return_type(function: &Function) -> Type {
    function.return_type.clone().unwrap_or_else(Type::int)
}

/// 表达式的静态类型，用于成员访问与下标
pub fn static_type(b: &Bundle<'_>, expr: &ExprKind) -> Result<Type, CodegenError> {
    match expr {
        ExprKind::Variable(v) | ExprKind::PointerVariable(v) => Ok(b.resolve(&v.name)?.ty().clone()),
        ExprKind::Decimal(_) => Ok(Type::int()),
        ExprKind::Char(_) => Ok(Type::Primitive(Primitive::Char)),
        ExprKind::Call(call) => match resolve_call(b, call)? {
            CallTarget::Method { class } => Ok(return_type(class.method(&call.name)?)),
            CallTarget::Function { .. } => Ok(b
                .module
                .functions
                .get(&call.name)
                .and_then(|symbol| symbol.return_type.clone())
                .unwrap_or_else(Type::int)),
        },
        ExprKind::Binary(binary) => match binary.op {
            BinaryOp::ArrayIndexer => static_type(b, &binary.left)?
                .element_type()
                .ok_or_else(|| CodegenError::NotIndexable(binary.left.to_string())),
            BinaryOp::Dot => {
                let class = class_of(b, &binary.left)?;
                match &*binary.right {
                    ExprKind::Call(call) => Ok(return_type(class.method(&call.name)?)),
                    member => member_type(class, member),
                }
            }
            BinaryOp::Assign => static_type(b, &binary.left),
            _ => Ok(Type::int()),
        },
        ExprKind::New(New::Object(call)) => Ok(Type::Class(
            call.constructor_of.clone().unwrap_or_else(|| call.name.clone()),
        )),
        ExprKind::New(New::Array { element, .. }) => Ok(Type::Array(ArrayType::new(
            element.clone(),
            vec![Layer::Heap],
        )?)),
    }
}

fn class_of<'a>(b: &Bundle<'a>, expr: &ExprKind) -> Result<&'a ClassInfo<'a>, CodegenError> {
    let ty = static_type(b, expr)?;
    let name = ty
        .class_name()
        .ok_or_else(|| CodegenError::NotAnObject(expr.to_string()))?;
    b.module.session.classes.get(name)
}

fn member_type(class: &ClassInfo<'_>, member: &ExprKind) -> Result<Type, CodegenError> {
    let name = member.name().unwrap_or_default();
    class
        .layout
        .member(name)
        .map(|slot| slot.ty.clone())
        .ok_or_else(|| CodegenError::UnknownMember {
            class: class.class.name.clone(),
            member: name.to_string(),
        })
}

pub(crate) fn emit_expr(b: &Bundle<'_>, expr: &ExprKind, asm: &mut Asm) -> Result<(), CodegenError> {
    if b.verbose() {
        asm.comment(format!("{}: {}", expr.kind_name(), expr));
    }
    match expr {
        // 栈上数组取地址，其余读取值（数组句柄、对象句柄同样是值）
        ExprKind::Variable(v) | ExprKind::PointerVariable(v) => {
            let place = b.resolve(&v.name)?;
            b.emit_address(&place, asm)?;
            if !place.is_inline() {
                asm.ins("mov eax, [eax]");
            }
            asm.ins("push eax");
        }
        ExprKind::Decimal(value) => asm.ins(format!("push dword {}", value)),
        ExprKind::Char(c) => asm.ins(format!("push dword {}", *c as u32)),
        ExprKind::Call(call) => emit_call(b, call, asm)?,
        ExprKind::Binary(binary) => match binary.op {
            BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div => {
                emit_arithmetic(b, binary, asm)?
            }
            BinaryOp::Equal | BinaryOp::Greater => emit_comparison(b, binary, asm)?,
            BinaryOp::And | BinaryOp::Or => emit_logical(b, binary, asm)?,
            BinaryOp::Assign => emit_assign(b, binary, asm)?,
            BinaryOp::ArrayIndexer => {
                let element = emit_element_address(b, binary, asm)?;
                load_unless_inline(&element, asm);
            }
            BinaryOp::Dot => emit_dot(b, binary, asm)?,
        },
        ExprKind::New(New::Object(call)) => emit_new_object(b, call, asm)?,
        ExprKind::New(New::Array { element, count }) => emit_new_array(b, element, count, asm)?,
    }
    Ok(())
}

/// 栈顶是地址；非内联的值需要再读一次
fn load_unless_inline(ty: &Type, asm: &mut Asm) {
    if !ty.is_inline() {
        asm.ins("pop eax");
        asm.ins("mov eax, [eax]");
        asm.ins("push eax");
    }
}

fn emit_arithmetic(b: &Bundle<'_>, binary: &Binary, asm: &mut Asm) -> Result<(), CodegenError> {
    emit_expr(b, &binary.right, asm)?;
    emit_expr(b, &binary.left, asm)?;
    asm.ins("pop eax");
    asm.ins("pop ecx");
    match binary.op {
        BinaryOp::Add => asm.ins("add eax, ecx"),
        BinaryOp::Sub => asm.ins("sub eax, ecx"),
        BinaryOp::Mul => asm.ins("imul eax, ecx"),
        _ => {
            asm.ins("cdq");
            asm.ins("idiv ecx");
        }
    }
    asm.ins("push eax");
    Ok(())
}

fn emit_comparison(b: &Bundle<'_>, binary: &Binary, asm: &mut Asm) -> Result<(), CodegenError> {
    let skip = b.labels().fresh("cmp");
    emit_expr(b, &binary.right, asm)?;
    emit_expr(b, &binary.left, asm)?;
    asm.ins("pop eax");
    asm.ins("pop ecx");
    asm.ins("xor edx, edx");
    asm.ins("cmp eax, ecx");
    let jump = if binary.op == BinaryOp::Equal { "jne" } else { "jle" };
    asm.ins(format!("{} {}", jump, skip));
    asm.ins("mov edx, 1");
    asm.label(&skip);
    asm.ins("push edx");
    Ok(())
}

/// 短路求值：左操作数已决定结果时不再计算右操作数
fn emit_logical(b: &Bundle<'_>, binary: &Binary, asm: &mut Asm) -> Result<(), CodegenError> {
    let is_and = binary.op == BinaryOp::And;
    let decided = b.labels().fresh(if is_and { "false" } else { "true" });
    let end = b.labels().fresh("logic_end");
    let jump = if is_and { "je" } else { "jne" };

    for operand in [&binary.left, &binary.right] {
        emit_expr(b, operand, asm)?;
        asm.ins("pop eax");
        asm.ins("cmp eax, 0");
        asm.ins(format!("{} {}", jump, decided));
    }
    asm.ins(format!("push dword {}", if is_and { 1 } else { 0 }));
    asm.ins(format!("jmp {}", end));
    asm.label(&decided);
    asm.ins(format!("push dword {}", if is_and { 0 } else { 1 }));
    asm.label(&end);
    Ok(())
}

fn emit_assign(b: &Bundle<'_>, binary: &Binary, asm: &mut Asm) -> Result<(), CodegenError> {
    emit_expr(b, &binary.right, asm)?;
    emit_address(b, &binary.left, asm)?;
    asm.ins("pop edx");
    asm.ins("pop eax");
    asm.ins("mov [edx], eax");
    asm.ins("push eax");
    Ok(())
}

/// 压入可赋值位置的地址
fn emit_address(b: &Bundle<'_>, expr: &ExprKind, asm: &mut Asm) -> Result<(), CodegenError> {
    let invalid = || CodegenError::InvalidAssignment(expr.to_string());
    match expr {
        ExprKind::Variable(v) | ExprKind::PointerVariable(v) => {
            let place = b.resolve(&v.name)?;
            if place.is_inline() {
                return Err(invalid());
            }
            b.emit_address(&place, asm)?;
            asm.ins("push eax");
        }
        ExprKind::Binary(binary) if binary.op == BinaryOp::ArrayIndexer => {
            if emit_element_address(b, binary, asm)?.is_inline() {
                return Err(invalid());
            }
        }
        ExprKind::Binary(binary)
            if binary.op == BinaryOp::Dot && !matches!(*binary.right, ExprKind::Call(_)) =>
        {
            if emit_member_address(b, binary, asm)?.is_inline() {
                return Err(invalid());
            }
        }
        _ => return Err(invalid()),
    }
    Ok(())
}

/// 压入 `left[right]` 的元素地址，返回元素类型
///
/// 数组对象布局：`[count][cell_size][cell 0][cell 1]...`，
/// 下标按无符号数与 count 比较，越界跳转到故障例程。
fn emit_element_address(b: &Bundle<'_>, binary: &Binary, asm: &mut Asm) -> Result<Type, CodegenError> {
    let element = static_type(b, &binary.left)?
        .element_type()
        .ok_or_else(|| CodegenError::NotIndexable(binary.left.to_string()))?;
    let word = b.sizes().word();
    let header = b.sizes().header();

    emit_expr(b, &binary.right, asm)?;
    emit_expr(b, &binary.left, asm)?;
    asm.ins("pop eax");
    asm.ins("pop ecx");
    asm.ins("cmp ecx, [eax]");
    asm.ins(format!("jae {}", INDEX_FAULT_LABEL));
    asm.ins(format!("imul ecx, [eax+{}]", word));
    asm.ins(format!("lea eax, [eax+ecx+{}]", header));
    asm.ins("push eax");
    Ok(element)
}

/// 压入 `object.member` 的地址，返回成员类型
fn emit_member_address(b: &Bundle<'_>, binary: &Binary, asm: &mut Asm) -> Result<Type, CodegenError> {
    let class = class_of(b, &binary.left)?;
    let name = binary.right.name().unwrap_or_default();
    let member = class
        .layout
        .member(name)
        .ok_or_else(|| CodegenError::UnknownMember {
            class: class.class.name.clone(),
            member: name.to_string(),
        })?;

    emit_expr(b, &binary.left, asm)?;
    if member.offset != 0 {
        asm.ins(format!("add dword [esp], {}", member.offset));
    }
    Ok(member.ty.clone())
}

fn emit_dot(b: &Bundle<'_>, binary: &Binary, asm: &mut Asm) -> Result<(), CodegenError> {
    let ExprKind::Call(call) = &*binary.right else {
        let member = emit_member_address(b, binary, asm)?;
        load_unless_inline(&member, asm);
        return Ok(());
    };

    let class = class_of(b, &binary.left)?;
    class.method(&call.name)?;
    // 对象地址作为最后一个实参 this 最先压栈
    emit_expr(b, &binary.left, asm)?;
    emit_arguments(b, &call.arguments, asm)?;
    emit_invoke(b, &class.trampoline(&call.name), call.arguments.len() + 1, asm);
    Ok(())
}

/// 逆序压入实参
fn emit_arguments(b: &Bundle<'_>, arguments: &[Box<ExprKind>], asm: &mut Asm) -> Result<(), CodegenError> {
    for argument in arguments.iter().rev() {
        emit_expr(b, argument, asm)?;
    }
    Ok(())
}

/// 压入实参个数、调用并清理栈，返回值压栈
fn emit_invoke(b: &Bundle<'_>, label: &str, count: usize, asm: &mut Asm) {
    emit_invoke_discard(b, label, count, asm);
    asm.ins("push eax");
}

fn emit_call(b: &Bundle<'_>, call: &FunctionCall, asm: &mut Asm) -> Result<(), CodegenError> {
    match resolve_call(b, call)? {
        CallTarget::Function { label } => {
            emit_arguments(b, &call.arguments, asm)?;
            emit_invoke(b, &label, call.arguments.len(), asm);
        }
        CallTarget::Method { class } => {
            asm.ins(format!("push dword {}", b.this_operand()?));
            emit_arguments(b, &call.arguments, asm)?;
            emit_invoke(b, &class.trampoline(&call.name), call.arguments.len() + 1, asm);
        }
    }
    Ok(())
}

/// 调用 malloc，调用点按 16 字节对齐；结果在 eax
fn emit_malloc(size: &str, asm: &mut Asm) {
    asm.ins("mov ecx, esp");
    asm.ins("and esp, -16");
    asm.ins("sub esp, 8");
    asm.ins("push ecx");
    asm.ins(format!("push {}", size));
    asm.ins("call malloc");
    asm.ins("mov esp, [esp+4]");
}

fn emit_new_object(b: &Bundle<'_>, call: &FunctionCall, asm: &mut Asm) -> Result<(), CodegenError> {
    let name = call.constructor_of.as_deref().unwrap_or(&call.name);
    let class = b.classes().get(name)?;
    let constructor = class.class.constructor();
    if constructor.is_none() && !call.arguments.is_empty() {
        return Err(CodegenError::UnknownMethod {
            class: class.class.name.clone(),
            method: "constructor".to_string(),
        });
    }

    let size = class.layout.allocation_size(b.sizes());
    emit_malloc(&format!("dword {}", size), asm);
    asm.ins("push eax");

    if let Some(initializer) = class.initializer() {
        asm.ins("push dword [esp]");
        emit_invoke_discard(b, &initializer, 1, asm);
    }
    if constructor.is_some() {
        asm.ins("push dword [esp]");
        emit_arguments(b, &call.arguments, asm)?;
        emit_invoke_discard(b, &class.trampoline("constructor"), call.arguments.len() + 1, asm);
    }
    Ok(())
}

/// 与 [`emit_invoke`] 相同，但丢弃返回值
fn emit_invoke_discard(b: &Bundle<'_>, label: &str, count: usize, asm: &mut Asm) {
    asm.ins(format!("push dword {}", count));
    asm.ins(format!("call {}", label));
    asm.ins(format!("add esp, {}", b.sizes().word() * (count as i32 + 1)));
}

fn emit_new_array(
    b: &Bundle<'_>,
    element: &Type,
    count: &ExprKind,
    asm: &mut Asm,
) -> Result<(), CodegenError> {
    let cell = element.stack_size(b.sizes());
    emit_expr(b, count, asm)?;
    asm.ins("mov eax, [esp]");
    asm.ins(format!("imul eax, eax, {}", cell));
    asm.ins(format!("add eax, {}", b.sizes().header()));
    emit_malloc("eax", asm);
    asm.ins("pop ecx");
    asm.ins("mov [eax], ecx");
    asm.ins(format!("mov dword [eax+{}], {}", b.sizes().word(), cell));
    asm.ins("push eax");
    Ok(())
}
