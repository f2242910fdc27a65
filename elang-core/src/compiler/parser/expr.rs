use crate::compiler::types::Type;
use std::collections::BTreeSet;
use std::fmt;

// 表达式类型别名
pub type Expr = Box<ExprKind>;

/// 表达式树节点
#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    // 按值读取的变量
    Variable(Variable),
    // 数组/类/指针变量：读取的是地址而不是值
    PointerVariable(Variable),
    // 整数常量
    Decimal(i32),
    // 字符常量，值为其码点
    Char(char),
    // 函数、方法或构造函数调用
    Call(FunctionCall),
    // 二元运算（含下标与成员访问）
    Binary(Binary),
    // new 表达式
    New(New),
}

// 变量引用
#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    pub name: String,
}

// 调用表达式，参数列表由递归解析得到
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionCall {
    pub name: String,
    pub arguments: Vec<Expr>,
    // 构造函数调用时为类的限定名
    pub constructor_of: Option<String>,
}

// 二元运算
#[derive(Debug, Clone, PartialEq)]
pub struct Binary {
    pub op: BinaryOp,
    pub left: Expr,
    pub right: Expr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Assign,
    Equal,
    Greater,
    And,
    Or,
    ArrayIndexer,
    Dot,
}

// new 的两种形式
#[derive(Debug, Clone, PartialEq)]
pub enum New {
    // new Point(1, 2)
    Object(FunctionCall),
    // new int[n]
    Array { element: Type, count: Expr },
}

impl BinaryOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Assign => "=",
            BinaryOp::Equal => "==",
            BinaryOp::Greater => ">",
            BinaryOp::And => "and",
            BinaryOp::Or => "or",
            BinaryOp::ArrayIndexer => "[]",
            BinaryOp::Dot => ".",
        }
    }

    /// 常量折叠时允许出现的运算
    pub fn is_arithmetic(&self) -> bool {
        matches!(
            self,
            BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div
        )
    }
}

impl ExprKind {
    pub fn variable(name: impl Into<String>) -> Expr {
        Box::new(ExprKind::Variable(Variable { name: name.into() }))
    }

    pub fn decimal(value: i32) -> Expr {
        Box::new(ExprKind::Decimal(value))
    }

    pub fn binary(op: BinaryOp, left: Expr, right: Expr) -> Expr {
        Box::new(ExprKind::Binary(Binary { op, left, right }))
    }

    /// 变量名（仅对变量节点有效）
    pub fn name(&self) -> Option<&str> {
        match self {
            ExprKind::Variable(v) | ExprKind::PointerVariable(v) => Some(&v.name),
            _ => None,
        }
    }

    /// 节点种类名，用于带注释的汇编输出
    pub fn kind_name(&self) -> &'static str {
        match self {
            ExprKind::Variable(_) => "Variable",
            ExprKind::PointerVariable(_) => "PointerVariable",
            ExprKind::Decimal(_) => "DecimalConstantValue",
            ExprKind::Char(_) => "StringConstantValue",
            ExprKind::Call(_) => "FunctionCall",
            ExprKind::Binary(b) => match b.op {
                BinaryOp::Add => "Add",
                BinaryOp::Sub => "Sub",
                BinaryOp::Mul => "Mul",
                BinaryOp::Div => "Div",
                BinaryOp::Assign => "Assign",
                BinaryOp::Equal => "Equal",
                BinaryOp::Greater => "Greater",
                BinaryOp::And => "And",
                BinaryOp::Or => "Or",
                BinaryOp::ArrayIndexer => "ArrayIndexer",
                BinaryOp::Dot => "Dot",
            },
            ExprKind::New(_) => "New",
        }
    }

    /// 表达式中引用到的变量名
    ///
    /// 成员访问只计入左侧；右侧的成员名不是变量，
    /// 但方法调用的实参仍然计入。
    pub fn mentions(&self) -> BTreeSet<String> {
        let mut names = BTreeSet::new();
        self.collect_mentions(&mut names);
        names
    }

    fn collect_mentions(&self, names: &mut BTreeSet<String>) {
        match self {
            ExprKind::Variable(v) | ExprKind::PointerVariable(v) => {
                names.insert(v.name.clone());
            }
            ExprKind::Decimal(_) | ExprKind::Char(_) => {}
            ExprKind::Call(call) => call.collect_mentions(names),
            ExprKind::Binary(b) if b.op == BinaryOp::Dot => {
                b.left.collect_mentions(names);
                if let ExprKind::Call(call) = &*b.right {
                    call.collect_mentions(names);
                }
            }
            ExprKind::Binary(b) => {
                b.left.collect_mentions(names);
                b.right.collect_mentions(names);
            }
            ExprKind::New(New::Object(call)) => call.collect_mentions(names),
            ExprKind::New(New::Array { count, .. }) => count.collect_mentions(names),
        }
    }

    /// 字面量以及只由字面量构成的四则运算
    pub fn is_constant(&self) -> bool {
        match self {
            ExprKind::Decimal(_) | ExprKind::Char(_) => true,
            ExprKind::Binary(b) if b.op.is_arithmetic() => {
                b.left.is_constant() && b.right.is_constant()
            }
            _ => false,
        }
    }

    /// 对常量表达式求值；溢出或除零返回 `None`
    pub fn evaluate(&self) -> Option<i64> {
        match self {
            ExprKind::Decimal(value) => Some(*value as i64),
            ExprKind::Char(c) => Some(*c as i64),
            ExprKind::Binary(b) if b.op.is_arithmetic() => {
                let left = b.left.evaluate()?;
                let right = b.right.evaluate()?;
                match b.op {
                    BinaryOp::Add => left.checked_add(right),
                    BinaryOp::Sub => left.checked_sub(right),
                    BinaryOp::Mul => left.checked_mul(right),
                    _ => left.checked_div(right),
                }
            }
            _ => None,
        }
    }
}

impl FunctionCall {
    fn collect_mentions(&self, names: &mut BTreeSet<String>) {
        for argument in &self.arguments {
            argument.collect_mentions(names);
        }
    }
}

impl fmt::Display for ExprKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExprKind::Variable(v) => f.write_str(&v.name),
            ExprKind::PointerVariable(v) => write!(f, "&{}", v.name),
            ExprKind::Decimal(value) => write!(f, "{}", value),
            ExprKind::Char(c) => write!(f, "{:?}", c),
            ExprKind::Call(call) => write!(f, "{}", call),
            ExprKind::Binary(b) => match b.op {
                BinaryOp::ArrayIndexer => write!(f, "{}[{}]", b.left, b.right),
                BinaryOp::Dot => write!(f, "{}.{}", b.left, b.right),
                op => write!(f, "({} {} {})", b.left, op.symbol(), b.right),
            },
            ExprKind::New(New::Object(call)) => write!(f, "new {}", call),
            ExprKind::New(New::Array { element, count }) => {
                write!(f, "new {}[{}]", element, count)
            }
        }
    }
}

impl fmt::Display for FunctionCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.name)?;
        for (idx, argument) in self.arguments.iter().enumerate() {
            if idx > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}", argument)?;
        }
        f.write_str(")")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constant_folding() {
        let expr = ExprKind::binary(
            BinaryOp::Add,
            ExprKind::decimal(2),
            ExprKind::binary(BinaryOp::Mul, ExprKind::decimal(3), ExprKind::decimal(4)),
        );
        assert!(expr.is_constant());
        assert_eq!(expr.evaluate(), Some(14));
        assert_eq!(expr.to_string(), "(2 + (3 * 4))");
    }

    #[test]
    fn test_division_by_zero_is_not_evaluated() {
        let expr = ExprKind::binary(BinaryOp::Div, ExprKind::decimal(1), ExprKind::decimal(0));
        assert!(expr.is_constant());
        assert_eq!(expr.evaluate(), None);
    }

    #[test]
    fn test_variables_are_not_constant() {
        let expr = ExprKind::binary(BinaryOp::Add, ExprKind::variable("n"), ExprKind::decimal(1));
        assert!(!expr.is_constant());
    }

    #[test]
    fn test_dot_mentions_only_left_side() {
        let call = FunctionCall {
            name: "move".into(),
            arguments: vec![ExprKind::variable("dx")],
            constructor_of: None,
        };
        let expr = ExprKind::binary(
            BinaryOp::Dot,
            ExprKind::variable("p"),
            Box::new(ExprKind::Call(call)),
        );
        let mentions: Vec<_> = expr.mentions().into_iter().collect();
        assert_eq!(mentions, vec!["dx".to_string(), "p".to_string()]);

        let member = ExprKind::binary(BinaryOp::Dot, ExprKind::variable("p"), ExprKind::variable("x"));
        assert_eq!(member.mentions().len(), 1);
    }
}
