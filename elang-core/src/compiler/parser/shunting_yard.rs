//! 调度场算法：把扁平的条目序列组装成表达式树

use super::error::ParserErrorKind;
use super::expr::{BinaryOp, Expr, ExprKind, FunctionCall, New};
use super::utils::{get_associativity, get_precedence, Operator};

/// 解析器在一段表达式文本里收集到的条目
#[derive(Debug, Clone)]
pub enum Shallow {
    Operand(Expr),
    /// 调用整体作为一个单元入栈
    Call(FunctionCall),
    Binary(BinaryOp),
    New,
    /// `[e]`：下标运算符紧跟操作数 `e`
    Index(Expr),
    LeftParen,
    RightParen,
}

impl Shallow {
    /// 此条目之后是否应当出现操作数
    pub fn expects_operand_after(&self) -> bool {
        matches!(self, Shallow::Binary(_) | Shallow::New | Shallow::LeftParen)
    }
}

enum Pending {
    Operator(Operator),
    Binary(BinaryOp),
    Call(FunctionCall),
    LeftParen,
}

enum Output {
    Operand(Expr),
    Binary(BinaryOp),
    New,
}

fn pending_operator(entry: &Pending) -> Option<Operator> {
    match entry {
        Pending::Operator(op) => Some(*op),
        Pending::Binary(op) => Some(Operator::Binary(*op)),
        Pending::Call(_) => Some(Operator::Call),
        Pending::LeftParen => None,
    }
}

fn emit(entry: Pending, output: &mut Vec<Output>) {
    match entry {
        Pending::Binary(op) => output.push(Output::Binary(op)),
        Pending::Call(call) => output.push(Output::Operand(Box::new(ExprKind::Call(call)))),
        Pending::Operator(_) => output.push(Output::New),
        Pending::LeftParen => {}
    }
}

/// 弹出优先级不低于 `op` 的运算符（右结合时要求严格更高）
fn pop_while(stack: &mut Vec<Pending>, output: &mut Vec<Output>, op: Operator) {
    let precedence = get_precedence(op);
    let left_assoc = get_associativity(op);
    while let Some(top) = stack.last() {
        let Some(top_op) = pending_operator(top) else {
            break;
        };
        let top_precedence = get_precedence(top_op);
        let should_pop = if left_assoc {
            top_precedence >= precedence
        } else {
            top_precedence > precedence
        };
        if !should_pop {
            break;
        }
        if let Some(entry) = stack.pop() {
            emit(entry, output);
        }
    }
}

/// 把条目序列转换为后缀序列，再从尾部递归重建成树
pub fn build_expression(items: Vec<Shallow>) -> Result<Expr, ParserErrorKind> {
    if items.is_empty() {
        return Err(ParserErrorKind::MalformedExpression(
            "empty expression".to_string(),
        ));
    }

    let mut output: Vec<Output> = Vec::new();
    let mut stack: Vec<Pending> = Vec::new();

    for item in items {
        match item {
            Shallow::Operand(expr) => output.push(Output::Operand(expr)),
            Shallow::Call(call) => stack.push(Pending::Call(call)),
            // 前缀运算符，入栈时不弹出
            Shallow::New => stack.push(Pending::Operator(Operator::New)),
            Shallow::Binary(op) => {
                pop_while(&mut stack, &mut output, Operator::Binary(op));
                stack.push(Pending::Binary(op));
            }
            Shallow::Index(index) => {
                pop_while(
                    &mut stack,
                    &mut output,
                    Operator::Binary(BinaryOp::ArrayIndexer),
                );
                stack.push(Pending::Binary(BinaryOp::ArrayIndexer));
                output.push(Output::Operand(index));
            }
            Shallow::LeftParen => stack.push(Pending::LeftParen),
            Shallow::RightParen => loop {
                match stack.pop() {
                    Some(Pending::LeftParen) => break,
                    Some(entry) => emit(entry, &mut output),
                    None => return Err(ParserErrorKind::MissingLeftParen),
                }
            },
        }
    }

    while let Some(entry) = stack.pop() {
        if matches!(entry, Pending::LeftParen) {
            return Err(ParserErrorKind::MissingRightParen);
        }
        emit(entry, &mut output);
    }

    let expr = rebuild(&mut output)?;
    if !output.is_empty() {
        return Err(ParserErrorKind::MalformedExpression(
            "unexpected operand".to_string(),
        ));
    }
    Ok(expr)
}

fn rebuild(output: &mut Vec<Output>) -> Result<Expr, ParserErrorKind> {
    match output.pop() {
        Some(Output::Operand(expr)) => Ok(expr),
        Some(Output::Binary(op)) => {
            let right = rebuild(output)?;
            let left = rebuild(output)?;
            if op == BinaryOp::Dot
                && !matches!(&*right, ExprKind::Variable(_) | ExprKind::Call(_))
            {
                return Err(ParserErrorKind::MalformedExpression(
                    "expected a member name after '.'".to_string(),
                ));
            }
            Ok(ExprKind::binary(op, left, right))
        }
        Some(Output::New) => {
            let operand = rebuild(output)?;
            match *operand {
                ExprKind::Call(call) if call.constructor_of.is_some() => {
                    Ok(Box::new(ExprKind::New(New::Object(call))))
                }
                other => Err(ParserErrorKind::MalformedExpression(format!(
                    "'new' expects a constructor call, found '{}'",
                    other
                ))),
            }
        }
        None => Err(ParserErrorKind::MalformedExpression(
            "missing operand".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn num(value: i32) -> Shallow {
        Shallow::Operand(ExprKind::decimal(value))
    }

    fn var(name: &str) -> Shallow {
        Shallow::Operand(ExprKind::variable(name))
    }

    #[test]
    fn test_precedence() {
        let items = vec![
            num(2),
            Shallow::Binary(BinaryOp::Add),
            num(3),
            Shallow::Binary(BinaryOp::Mul),
            num(4),
        ];
        assert_eq!(build_expression(items).unwrap().to_string(), "(2 + (3 * 4))");
    }

    #[test]
    fn test_left_associativity() {
        let items = vec![
            num(8),
            Shallow::Binary(BinaryOp::Sub),
            num(3),
            Shallow::Binary(BinaryOp::Sub),
            num(2),
        ];
        assert_eq!(build_expression(items).unwrap().to_string(), "((8 - 3) - 2)");
    }

    #[test]
    fn test_assignment_is_right_associative() {
        let items = vec![
            var("a"),
            Shallow::Binary(BinaryOp::Assign),
            var("b"),
            Shallow::Binary(BinaryOp::Assign),
            num(1),
        ];
        assert_eq!(build_expression(items).unwrap().to_string(), "(a = (b = 1))");
    }

    #[test]
    fn test_parentheses() {
        let items = vec![
            Shallow::LeftParen,
            num(2),
            Shallow::Binary(BinaryOp::Add),
            num(3),
            Shallow::RightParen,
            Shallow::Binary(BinaryOp::Mul),
            num(4),
        ];
        assert_eq!(build_expression(items).unwrap().to_string(), "((2 + 3) * 4)");
    }

    #[test]
    fn test_unbalanced_parentheses() {
        let missing_right = vec![Shallow::LeftParen, num(1)];
        assert_eq!(
            build_expression(missing_right).unwrap_err(),
            ParserErrorKind::MissingRightParen
        );
        let missing_left = vec![num(1), Shallow::RightParen];
        assert_eq!(
            build_expression(missing_left).unwrap_err(),
            ParserErrorKind::MissingLeftParen
        );
    }

    #[test]
    fn test_index_binds_tighter_than_arithmetic() {
        let items = vec![
            var("a"),
            Shallow::Index(ExprKind::decimal(1)),
            Shallow::Binary(BinaryOp::Add),
            num(2),
        ];
        assert_eq!(build_expression(items).unwrap().to_string(), "(a[1] + 2)");
    }

    #[test]
    fn test_call_is_an_operand() {
        let call = FunctionCall {
            name: "f".into(),
            arguments: vec![ExprKind::decimal(1)],
            constructor_of: None,
        };
        let items = vec![
            var("x"),
            Shallow::Binary(BinaryOp::Mul),
            Shallow::Call(call),
            Shallow::Binary(BinaryOp::Add),
            num(2),
        ];
        assert_eq!(build_expression(items).unwrap().to_string(), "((x * f(1)) + 2)");
    }

    #[test]
    fn test_missing_operand() {
        let items = vec![num(1), Shallow::Binary(BinaryOp::Add)];
        assert!(matches!(
            build_expression(items),
            Err(ParserErrorKind::MalformedExpression(_))
        ));
        let items = vec![num(1), num(2)];
        assert!(matches!(
            build_expression(items),
            Err(ParserErrorKind::MalformedExpression(_))
        ));
    }
}
