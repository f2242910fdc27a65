//! 栈帧与对象布局
//!
//! 调用约定：调用者按逆序压入实参，再压入实参个数，然后 `call`。
//! 因此在被调函数中 `[ebp+4]` 是返回地址，`[ebp+8]` 是实参个数，
//! 第一个实参位于 `[ebp+12]`。局部变量按作用域先序依次向下分配。

use crate::compiler::parser::{ElangClass, Function, Program, ScopeArena, ScopeId};
use crate::compiler::types::{LayoutError, SizeTable, Type};
use serde::{Serialize, Serializer};

fn display_type<S: Serializer>(ty: &Type, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(ty)
}

/// 一个有名字的存储位置
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Slot {
    pub name: String,
    /// 相对 ebp（栈帧）或对象起始（成员）的偏移
    pub offset: i32,
    pub size: i32,
    #[serde(rename = "type", serialize_with = "display_type")]
    pub ty: Type,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub argument: bool,
    /// 局部变量的声明作用域；参数、成员与全局变量为 `None`
    #[serde(skip)]
    pub scope: Option<ScopeId>,
}

/// 函数栈帧
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FrameLayout {
    pub slots: Vec<Slot>,
    /// 局部变量区的总字节数（`sub esp, N`）
    pub stack_size: i32,
}

/// 类实例的堆布局
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassLayout {
    pub name: String,
    pub members: Vec<Slot>,
    pub heap_size: i32,
}

/// 第一个实参的偏移：返回地址、旧 ebp、实参个数各占一个字
pub fn first_argument_offset(sizes: &SizeTable) -> i32 {
    3 * sizes.word()
}

impl FrameLayout {
    pub fn for_function(
        function: &Function,
        arena: &ScopeArena,
        sizes: &SizeTable,
    ) -> Result<Self, LayoutError> {
        let mut slots = Vec::new();

        let mut offset = first_argument_offset(sizes);
        for argument in &function.arguments {
            let size = argument.ty.argument_size(sizes);
            slots.push(Slot {
                name: argument.name.clone(),
                offset,
                size,
                ty: argument.ty.clone(),
                argument: true,
                scope: None,
            });
            offset += size;
        }

        let mut local: i32 = 0;
        for scope in arena.subtree(function.scope) {
            for variable in arena.get(scope).variables() {
                let size = variable.ty.checked_stack_size(sizes)?;
                local = local.checked_sub(size).ok_or_else(|| {
                    LayoutError::TooLarge(format!("Stack frame of '{}'", function.name))
                })?;
                slots.push(Slot {
                    name: variable.name.clone(),
                    offset: local,
                    size,
                    ty: variable.ty.clone(),
                    argument: false,
                    scope: Some(scope),
                });
            }
        }

        let layout = Self {
            slots,
            stack_size: -local,
        };
        tracing::debug!(
            target: "elang::layout",
            function = %function.name,
            stack_size = layout.stack_size,
            slots = layout.slots.len(),
            "frame layout"
        );
        Ok(layout)
    }

    /// 只有 `this` 一个实参的栈帧（成员初始化例程）
    pub fn for_initializer(class: &ElangClass, sizes: &SizeTable) -> Self {
        Self {
            slots: vec![Slot {
                name: "this".to_string(),
                offset: first_argument_offset(sizes),
                size: sizes.word(),
                ty: Type::Class(class.name.clone()),
                argument: true,
                scope: None,
            }],
            stack_size: 0,
        }
    }

    pub fn slot(&self, name: &str) -> Option<&Slot> {
        self.slots.iter().find(|s| s.name == name)
    }
}

impl ClassLayout {
    pub fn new(class: &ElangClass, sizes: &SizeTable) -> Result<Self, LayoutError> {
        let mut offset: i32 = 0;
        let mut members = Vec::with_capacity(class.member_variables.len());
        for member in &class.member_variables {
            let size = member.ty.checked_stack_size(sizes)?;
            members.push(Slot {
                name: member.name.clone(),
                offset,
                size,
                ty: member.ty.clone(),
                argument: false,
                scope: None,
            });
            offset = offset
                .checked_add(size)
                .ok_or_else(|| LayoutError::TooLarge(format!("Class '{}'", class.name)))?;
        }
        tracing::debug!(target: "elang::layout", class = %class.name, heap_size = offset, "class layout");
        Ok(Self {
            name: class.name.clone(),
            members,
            heap_size: offset,
        })
    }

    pub fn member(&self, name: &str) -> Option<&Slot> {
        self.members.iter().find(|m| m.name == name)
    }

    /// 分配时使用的字节数，至少一个字
    pub fn allocation_size(&self, sizes: &SizeTable) -> i32 {
        self.heap_size.max(sizes.word())
    }
}

/// `--dump-layout` 输出中的一个函数
#[derive(Debug, Clone, Serialize)]
pub struct FunctionLayout {
    pub name: String,
    pub frame: FrameLayout,
}

/// 一个模块的全部布局
#[derive(Debug, Clone, Serialize)]
pub struct ModuleLayout {
    pub module: String,
    pub globals: Vec<Slot>,
    pub functions: Vec<FunctionLayout>,
    pub classes: Vec<ClassLayout>,
}

impl ModuleLayout {
    pub fn new(program: &Program, sizes: &SizeTable) -> Result<Self, LayoutError> {
        let globals = program
            .globals()
            .map(|global| {
                Ok(Slot {
                    name: global.name.clone(),
                    offset: 0,
                    size: global.ty.checked_stack_size(sizes)?,
                    ty: global.ty.clone(),
                    argument: false,
                    scope: None,
                })
            })
            .collect::<Result<Vec<_>, LayoutError>>()?;

        let mut functions = Vec::new();
        for f in &program.functions {
            functions.push(FunctionLayout {
                name: f.name.clone(),
                frame: FrameLayout::for_function(f, &program.arena, sizes)?,
            });
        }
        let classes = program.all_classes();
        for class in &classes {
            for method in &class.functions {
                functions.push(FunctionLayout {
                    name: format!("{}.{}", class.name, method.name),
                    frame: FrameLayout::for_function(method, &program.arena, sizes)?,
                });
            }
        }

        Ok(Self {
            module: program.name.clone(),
            globals,
            functions,
            classes: classes
                .iter()
                .map(|c| ClassLayout::new(c, sizes))
                .collect::<Result<_, _>>()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::lowering::lower_program;
    use crate::compiler::module::NoIncludes;
    use crate::compiler::parser::Parser;

    fn program(source: &str) -> Program {
        let mut includes = NoIncludes;
        let mut program = Parser::new("main", source, &mut includes).parse().unwrap();
        lower_program(&mut program);
        program
    }

    #[test]
    fn test_arguments_and_locals() {
        let program = program(
            "int f(int a, int v[], char c) { int x; if (a > 0) { int y[2]; } int z; return x; }",
        );
        let sizes = SizeTable::default();
        let frame =
            FrameLayout::for_function(program.function("f").unwrap(), &program.arena, &sizes).unwrap();

        let offsets: Vec<(&str, i32)> = frame.slots.iter().map(|s| (s.name.as_str(), s.offset)).collect();
        // 先序：函数作用域的 x、z，再是 if 块中的 y
        assert_eq!(
            offsets,
            vec![("a", 12), ("v", 16), ("c", 20), ("x", -4), ("z", -8), ("y", -24)]
        );
        assert_eq!(frame.slot("y").unwrap().size, 16);
        assert_eq!(frame.stack_size, 24);
    }

    #[test]
    fn test_method_has_this_argument() {
        let program = program("class P { int x; int get() { return x; } }");
        let sizes = SizeTable::default();
        let class = program.class("P").unwrap();
        let frame =
            FrameLayout::for_function(class.method("get").unwrap(), &program.arena, &sizes).unwrap();
        assert_eq!(frame.slot("this").unwrap().offset, 12);
        assert_eq!(frame.stack_size, 0);
    }

    #[test]
    fn test_class_layout() {
        let program = program("class P { int x; int a[3]; P next; }");
        let sizes = SizeTable::default();
        let layout = ClassLayout::new(program.class("P").unwrap(), &sizes).unwrap();
        let offsets: Vec<i32> = layout.members.iter().map(|m| m.offset).collect();
        assert_eq!(offsets, vec![0, 4, 24]);
        assert_eq!(layout.heap_size, 28);

        let empty = program_layout("class E { }");
        assert_eq!(empty.classes[0].heap_size, 0);
        let class = ClassLayout::new(&program_class("class E { }"), &sizes).unwrap();
        assert_eq!(class.allocation_size(&sizes), 4);
    }

    fn program_layout(source: &str) -> ModuleLayout {
        ModuleLayout::new(&program(source), &SizeTable::default()).unwrap()
    }

    fn program_class(source: &str) -> ElangClass {
        program(source).classes[0].clone()
    }

    #[test]
    fn test_frame_larger_than_address_space_is_rejected() {
        let program = program("int f() { int a[300000000]; int b[300000000]; return 0; }");
        let sizes = SizeTable::default();
        let err = FrameLayout::for_function(program.function("f").unwrap(), &program.arena, &sizes)
            .unwrap_err();
        assert_eq!(err, LayoutError::TooLarge("Stack frame of 'f'".into()));

        let err = ModuleLayout::new(&program, &sizes).unwrap_err();
        assert!(matches!(err, LayoutError::TooLarge(_)));
    }

    #[test]
    fn test_oversized_member_is_rejected() {
        let program = program("class Big { int a[2000000000]; }");
        let err = ClassLayout::new(program.class("Big").unwrap(), &SizeTable::default()).unwrap_err();
        assert_eq!(err, LayoutError::TooLarge("Type 'int[2000000000]'".into()));
    }

    #[test]
    fn test_layout_serializes_types_as_text() {
        let layout = program_layout("int g[4];\nint main() { char* p; return 0; }");
        let json = serde_json::to_value(&layout).unwrap();
        assert_eq!(json["globals"][0]["type"], "int[4]");
        assert_eq!(json["globals"][0]["size"], 24);
        assert_eq!(json["functions"][0]["frame"]["slots"][0]["type"], "char*");
    }
}
