//! 汇编文本构建

use std::cell::Cell;
use std::fmt::Write as _;

/// 一段汇编文本
#[derive(Debug, Default)]
pub struct Asm {
    text: String,
}

impl Asm {
    pub fn new() -> Self {
        Self::default()
    }

    /// 一条指令
    pub fn ins(&mut self, instruction: impl AsRef<str>) {
        let _ = writeln!(self.text, "    {}", instruction.as_ref());
    }

    pub fn label(&mut self, name: impl AsRef<str>) {
        let _ = writeln!(self.text, "{}:", name.as_ref());
    }

    pub fn comment(&mut self, text: impl AsRef<str>) {
        let _ = writeln!(self.text, "    ; {}", text.as_ref());
    }

    /// 原样追加一行（段声明、数据定义）
    pub fn line(&mut self, line: impl AsRef<str>) {
        let _ = writeln!(self.text, "{}", line.as_ref());
    }

    /// 追加子生成器的输出
    pub fn append(&mut self, code: &str) {
        self.text.push_str(code);
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    pub fn finish(self) -> String {
        self.text
    }
}

/// 本地标签计数器，一次编译内唯一
#[derive(Debug, Default)]
pub struct Labels {
    next: Cell<usize>,
}

impl Labels {
    pub fn new() -> Self {
        Self::default()
    }

    /// 形如 `.L3_else` 的新标签
    pub fn fresh(&self, purpose: &str) -> String {
        let id = self.next.get();
        self.next.set(id + 1);
        format!(".L{}_{}", id, purpose)
    }

    /// 已分配的标签数
    pub fn issued(&self) -> usize {
        self.next.get()
    }
}

/// `[ebp+12]` / `[ebp-8]` 形式的栈帧地址
pub fn frame_operand(offset: i32) -> String {
    if offset >= 0 {
        format!("[ebp+{}]", offset)
    } else {
        format!("[ebp-{}]", -offset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_asm_lines() {
        let mut asm = Asm::new();
        asm.label("main");
        asm.ins("push ebp");
        asm.comment("body");
        assert_eq!(asm.finish(), "main:\n    push ebp\n    ; body\n");
    }

    #[test]
    fn test_labels_are_unique() {
        let labels = Labels::new();
        assert_eq!(labels.fresh("else"), ".L0_else");
        assert_eq!(labels.fresh("end"), ".L1_end");
    }

    #[test]
    fn test_frame_operand() {
        assert_eq!(frame_operand(12), "[ebp+12]");
        assert_eq!(frame_operand(-8), "[ebp-8]");
    }
}
