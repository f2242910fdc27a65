//! 类型系统
//!
//! 基本类型、指针、数组与类。所有类型都能在给定尺寸表下计算字节大小，
//! 数组还能给出每一层头部 `{count, cell_size}` 的写入位置。

use elang_config::SizeConfig;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

/// 布局/类型错误
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LayoutError {
    #[error("Array stack declarations must have constant size")]
    NonConstantDimension,
    #[error("Array dimension must be positive, found {0}")]
    EmptyDimension(i64),
    #[error("Array dimension '{0}' is out of range")]
    DimensionOutOfRange(String),
    #[error("{0} exceeds the 32-bit size limit")]
    TooLarge(String),
    #[error("Heap dimensions `[]` must be the outermost dimensions")]
    HeapAfterStack,
    #[error("Unknown type '{0}'")]
    UnknownType(String),
}

/// 基本类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Primitive {
    Int,
    Char,
}

impl Primitive {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "int" => Some(Primitive::Int),
            "char" => Some(Primitive::Char),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Primitive::Int => "int",
            Primitive::Char => "char",
        }
    }
}

/// 数组的一层（一个维度）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Layer {
    /// 定长，随变量一起放在栈上
    Stack(u32),
    /// 变长，运行时由堆地址给出
    Heap,
}

/// 数组类型
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArrayType {
    pub underlying: Box<Type>,
    /// 从外到内排列
    pub layers: Vec<Layer>,
}

/// 变量类型
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Type {
    Primitive(Primitive),
    Array(ArrayType),
    /// 类实例的句柄（堆地址），保存限定名
    Class(String),
    Pointer(Box<Type>),
}

/// 数组某一层的头部信息
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LayerMetadata {
    /// 元素个数
    pub count: u32,
    /// 每个 cell 的字节数
    pub cell_size: i32,
    /// 该层所有头部相对数组起始地址的偏移
    pub offsets: Vec<i32>,
}

/// 类型名 → 字节数
#[derive(Debug, Clone)]
pub struct SizeTable {
    sizes: HashMap<String, i32>,
    word: i32,
}

impl SizeTable {
    pub fn new(config: &SizeConfig) -> Self {
        let mut sizes = HashMap::new();
        sizes.insert("int".to_string(), config.int as i32);
        sizes.insert("char".to_string(), config.char as i32);
        Self {
            sizes,
            word: config.word as i32,
        }
    }

    /// 机器字长
    pub fn word(&self) -> i32 {
        self.word
    }

    /// 两个字的数组头部
    pub fn header(&self) -> i32 {
        2 * self.word
    }

    pub fn get(&self, name: &str) -> Option<i32> {
        self.sizes.get(name).copied()
    }

    pub fn primitive(&self, primitive: Primitive) -> i32 {
        self.get(primitive.name()).unwrap_or(self.word)
    }

    /// 类在栈上永远只占一个字（句柄）
    pub fn register_class(&mut self, name: &str) {
        self.sizes.insert(name.to_string(), self.word);
    }
}

impl Default for SizeTable {
    fn default() -> Self {
        Self::new(&SizeConfig::default())
    }
}

impl Type {
    pub fn int() -> Self {
        Type::Primitive(Primitive::Int)
    }

    /// 数组、类与指针都按地址处理
    pub fn is_pointer_like(&self) -> bool {
        matches!(self, Type::Array(_) | Type::Class(_) | Type::Pointer(_))
    }

    /// 存储直接内联在所在位置（栈帧、对象、数据段）中的数组
    pub fn is_inline(&self) -> bool {
        matches!(self, Type::Array(array) if !array.is_heap_resident())
    }

    /// 作为局部变量、成员或全局变量时占用的字节数
    pub fn stack_size(&self, sizes: &SizeTable) -> i32 {
        match self {
            Type::Primitive(p) => sizes.primitive(*p),
            Type::Class(_) | Type::Pointer(_) => sizes.word(),
            Type::Array(array) if array.is_heap_resident() => sizes.word(),
            Type::Array(array) => array.size(sizes),
        }
    }

    /// 同 [`Type::stack_size`]，但超出 32 位范围时报错
    ///
    /// 堆驻留数组本身只占一个字，其栈层单元也要能用 32 位表示。
    pub fn checked_stack_size(&self, sizes: &SizeTable) -> Result<i32, LayoutError> {
        match self {
            Type::Array(array) => {
                let size = array.checked_size(sizes)?;
                Ok(if array.is_heap_resident() { sizes.word() } else { size })
            }
            _ => Ok(self.stack_size(sizes)),
        }
    }

    /// 作为函数参数时占用的字节数：指针类参数只传地址
    pub fn argument_size(&self, sizes: &SizeTable) -> i32 {
        if self.is_pointer_like() {
            sizes.word()
        } else {
            self.stack_size(sizes)
        }
    }

    /// 可以做成员访问的类名（类本身或指向类的指针）
    pub fn class_name(&self) -> Option<&str> {
        match self {
            Type::Class(name) => Some(name),
            Type::Pointer(inner) => inner.class_name(),
            _ => None,
        }
    }

    /// 下标访问后的类型
    pub fn element_type(&self) -> Option<Type> {
        match self {
            Type::Array(array) => Some(array.element_type()),
            Type::Pointer(inner) => Some((**inner).clone()),
            _ => None,
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Primitive(p) => f.write_str(p.name()),
            Type::Class(name) => f.write_str(name),
            Type::Pointer(inner) => write!(f, "{}*", inner),
            Type::Array(array) => {
                write!(f, "{}", array.underlying)?;
                for layer in &array.layers {
                    match layer {
                        Layer::Stack(count) => write!(f, "[{}]", count)?,
                        Layer::Heap => f.write_str("[]")?,
                    }
                }
                Ok(())
            }
        }
    }
}

impl ArrayType {
    /// 创建数组类型，堆层只能出现在最外侧
    pub fn new(underlying: Type, layers: Vec<Layer>) -> Result<Self, LayoutError> {
        let first_stack = layers.iter().position(|l| matches!(l, Layer::Stack(_)));
        if let Some(first_stack) = first_stack {
            if layers[first_stack..].contains(&Layer::Heap) {
                return Err(LayoutError::HeapAfterStack);
            }
        }
        Ok(Self {
            underlying: Box::new(underlying),
            layers,
        })
    }

    pub fn is_heap_resident(&self) -> bool {
        matches!(self.layers.first(), Some(Layer::Heap))
    }

    /// 栈层的元素个数（从外到内）
    fn stack_counts(&self) -> Vec<u32> {
        self.layers
            .iter()
            .filter_map(|layer| match layer {
                Layer::Stack(count) => Some(*count),
                Layer::Heap => None,
            })
            .collect()
    }

    pub fn element_size(&self, sizes: &SizeTable) -> i32 {
        self.underlying.stack_size(sizes)
    }

    /// 栈层部分的总字节数（含每层头部）
    ///
    /// 最内层为 `count × element + header`，外层逐层为 `header + count × inner`；
    /// 堆层不参与静态计算。超出范围时饱和为 `i32::MAX`，布局阶段先用
    /// [`ArrayType::checked_size`] 拒绝这类数组。
    pub fn size(&self, sizes: &SizeTable) -> i32 {
        self.checked_size(sizes).unwrap_or(i32::MAX)
    }

    pub fn checked_size(&self, sizes: &SizeTable) -> Result<i32, LayoutError> {
        let too_large = || LayoutError::TooLarge(format!("Type '{}'", Type::Array(self.clone())));
        self.stack_counts()
            .iter()
            .rev()
            .try_fold(self.element_size(sizes), |inner, count| {
                i32::try_from(*count)
                    .ok()
                    .and_then(|count| count.checked_mul(inner))
                    .and_then(|cells| cells.checked_add(sizes.header()))
            })
            .ok_or_else(too_large)
    }

    /// 最外层 cell 的步长
    pub fn cell_size(&self, sizes: &SizeTable) -> i32 {
        self.element_type().stack_size(sizes)
    }

    /// 去掉最外层后的类型
    pub fn element_type(&self) -> Type {
        if self.layers.len() > 1 {
            Type::Array(ArrayType {
                underlying: self.underlying.clone(),
                layers: self.layers[1..].to_vec(),
            })
        } else {
            (*self.underlying).clone()
        }
    }

    /// 每一层头部的静态写入位置
    ///
    /// 堆驻留数组返回空表：它们的头部在分配时由运行时代码写入。
    /// 只对已通过 [`ArrayType::checked_size`] 的数组调用。
    pub fn metadata(&self, sizes: &SizeTable) -> Vec<LayerMetadata> {
        if self.is_heap_resident() {
            return Vec::new();
        }
        let counts = self.stack_counts();

        let mut cell = self.element_size(sizes);
        let mut layers: Vec<LayerMetadata> = Vec::with_capacity(counts.len());
        for count in counts.iter().rev() {
            layers.push(LayerMetadata {
                count: *count,
                cell_size: cell,
                offsets: Vec::new(),
            });
            cell = sizes
                .header()
                .saturating_add((*count as i32).saturating_mul(cell));
        }
        layers.reverse();

        let header = sizes.header();
        let mut offsets: Vec<i32> = vec![0];
        for layer in layers.iter_mut() {
            let (count, stride) = (layer.count as i32, layer.cell_size);
            let next: Vec<i32> = offsets
                .iter()
                .flat_map(|base| {
                    (0..count).map(move |cell| base.saturating_add(header + cell.saturating_mul(stride)))
                })
                .collect();
            layer.offsets = std::mem::replace(&mut offsets, next);
        }
        layers
    }
}
