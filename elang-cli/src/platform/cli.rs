//! CLI 格式化输出
//!
//! 提供命令行友好的错误显示和源码上下文打印。

use elang_api::ElangError;
use std::path::Path;

/// 打印错误并显示源代码上下文
///
/// 出错位置在被 include 的文件中时，从该文件读取上下文。
pub fn print_error_with_source(e: &ElangError, entry: &Path) {
    let report = e.to_report();
    eprintln!("❌ {}", report);

    if let (Some(error_line), Some(col)) = (report.line, report.column) {
        let file = e.file().unwrap_or(entry);
        if let Ok(source) = std::fs::read_to_string(file) {
            eprint!("{}", source_context(&source, error_line, col));
        }
    }
}

/// 错误行前后各显示的行数
const CONTEXT_LINES: usize = 3;

/// 渲染错误行附近的源码，并在出错列下方画 `^`
pub fn source_context(source: &str, error_line: usize, error_col: usize) -> String {
    let lines: Vec<&str> = source.lines().collect();
    if error_line == 0 || error_line > lines.len() {
        return String::new();
    }

    let first = error_line.saturating_sub(CONTEXT_LINES).max(1);
    let last = (error_line + CONTEXT_LINES).min(lines.len());
    let width = last.to_string().len();
    let rule = format!("{}|--\n", "-".repeat(width + 1));

    let mut out = rule.clone();
    for number in first..=last {
        out.push_str(&format!("{:>width$} | {}\n", number, lines[number - 1]));
        if number == error_line {
            out.push_str(&format!("{:width$} | {}^\n", "", " ".repeat(error_col.saturating_sub(1))));
        }
    }
    out.push_str(&rule);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_marker_under_column() {
        let source = "int main() {\n  int x = 1\n}";
        let text = source_context(source, 2, 12);
        assert_eq!(
            text,
            "--|--\n1 | int main() {\n2 |   int x = 1\n  |            ^\n3 | }\n--|--\n"
        );
    }

    #[test]
    fn test_line_out_of_range() {
        assert_eq!(source_context("int x;", 4, 1), "");
        assert_eq!(source_context("int x;", 0, 1), "");
    }
}
