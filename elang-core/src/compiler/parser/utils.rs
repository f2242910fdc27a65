use super::expr::BinaryOp;

/// 运算符栈上的条目
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Binary(BinaryOp),
    New,
    Call,
}

pub fn get_precedence(op: Operator) -> i32 {
    match op {
        Operator::Binary(BinaryOp::Assign) => 50,
        Operator::Binary(BinaryOp::Or) => 60,
        Operator::Binary(BinaryOp::And) => 80,
        Operator::Binary(BinaryOp::Equal | BinaryOp::Greater) => 100,
        Operator::Binary(BinaryOp::Add | BinaryOp::Sub) => 200,
        Operator::Binary(BinaryOp::Mul | BinaryOp::Div) => 300,
        Operator::Binary(BinaryOp::Dot | BinaryOp::ArrayIndexer) | Operator::Call => 400,
        Operator::New => 450,
    }
}

/// 获取运算符结合性
///
/// Returns: `true` 表示左结合，`false` 表示右结合
pub fn get_associativity(op: Operator) -> bool {
    match op {
        // 右结合：赋值运算符
        Operator::Binary(BinaryOp::Assign) => false,
        // 其他都是左结合
        _ => true,
    }
}

/// 跳过空白，返回第一个非空白字节的位置（不超过 `end`）
pub fn skip_whitespace(source: &str, mut pos: usize, end: usize) -> usize {
    let bytes = source.as_bytes();
    while pos < end && bytes[pos].is_ascii_whitespace() {
        pos += 1;
    }
    pos
}

/// 跳过 `pos` 处开始的字符常量，返回其后的位置
fn skip_char_literal(bytes: &[u8], pos: usize, end: usize) -> usize {
    let mut cursor = pos + 1;
    while cursor < end {
        match bytes[cursor] {
            b'\\' => cursor += 2,
            b'\'' => return cursor + 1,
            _ => cursor += 1,
        }
    }
    end
}

/// 找到与 `open_at` 处开括号配对的闭括号
///
/// 只按深度计数，字符常量中的括号会被跳过。
pub fn find_closing(source: &str, open_at: usize, end: usize) -> Option<usize> {
    let bytes = source.as_bytes();
    let open = *bytes.get(open_at)?;
    let close = match open {
        b'(' => b')',
        b'[' => b']',
        b'{' => b'}',
        _ => return None,
    };
    let mut depth = 0usize;
    let mut pos = open_at;
    while pos < end {
        let byte = bytes[pos];
        if byte == b'\'' {
            pos = skip_char_literal(bytes, pos, end);
            continue;
        }
        if byte == open {
            depth += 1;
        } else if byte == close {
            depth -= 1;
            if depth == 0 {
                return Some(pos);
            }
        }
        pos += 1;
    }
    None
}

/// 找到语句结尾的 `;`
///
/// 括号内的分号不算；在顶层遇到 `{` 或 `}` 说明语句没有正常结束。
pub fn find_statement_end(source: &str, start: usize, end: usize) -> Option<usize> {
    let bytes = source.as_bytes();
    let mut depth = 0i32;
    let mut pos = start;
    while pos < end {
        match bytes[pos] {
            b'\'' => {
                pos = skip_char_literal(bytes, pos, end);
                continue;
            }
            b'(' | b'[' => depth += 1,
            b')' | b']' => depth -= 1,
            b';' if depth <= 0 => return Some(pos),
            b'{' | b'}' if depth <= 0 => return None,
            _ => {}
        }
        pos += 1;
    }
    None
}

/// 按顶层逗号切分 `[start, end)`，返回每一段的范围
pub fn split_top_level(source: &str, start: usize, end: usize) -> Vec<(usize, usize)> {
    let bytes = source.as_bytes();
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut part_start = start;
    let mut pos = start;
    while pos < end {
        match bytes[pos] {
            b'\'' => {
                pos = skip_char_literal(bytes, pos, end);
                continue;
            }
            b'(' | b'[' | b'{' => depth += 1,
            b')' | b']' | b'}' => depth -= 1,
            b',' if depth == 0 => {
                parts.push((part_start, pos));
                part_start = pos + 1;
            }
            _ => {}
        }
        pos += 1;
    }
    parts.push((part_start, end));
    parts
}

/// 将 `//` 注释替换为等长空白，字节偏移保持不变
pub fn strip_comments(source: &str) -> String {
    let mut out = String::with_capacity(source.len());
    let mut chars = source.chars().peekable();
    let mut in_comment = false;
    let mut in_char = false;
    while let Some(c) = chars.next() {
        if in_comment {
            if c == '\n' {
                in_comment = false;
                out.push(c);
            } else {
                out.extend(std::iter::repeat(' ').take(c.len_utf8()));
            }
            continue;
        }
        match c {
            '\'' => in_char = !in_char,
            '\\' if in_char => {
                out.push(c);
                if let Some(escaped) = chars.next() {
                    out.push(escaped);
                }
                continue;
            }
            '/' if !in_char && chars.peek() == Some(&'/') => {
                in_comment = true;
                out.push(' ');
                continue;
            }
            '\n' => in_char = false,
            _ => {}
        }
        out.push(c);
    }
    out
}
