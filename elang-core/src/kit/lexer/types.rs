//! 通用位置类型

/// 源代码坐标
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Coordinate {
    pub line: usize,
    pub column: usize,
}

impl Default for Coordinate {
    fn default() -> Self {
        Self { line: 1, column: 1 }
    }
}

impl std::fmt::Display for Coordinate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// 字节偏移 → 行列号的映射表
///
/// 解析器只记录字节偏移，报错时再换算成坐标。
#[derive(Debug, Clone)]
pub struct SourceMap {
    /// 每一行起始处的字节偏移
    line_starts: Vec<usize>,
    len: usize,
}

impl SourceMap {
    pub fn new(text: &str) -> Self {
        let mut line_starts = vec![0];
        for (idx, byte) in text.bytes().enumerate() {
            if byte == b'\n' {
                line_starts.push(idx + 1);
            }
        }
        Self {
            line_starts,
            len: text.len(),
        }
    }

    /// 将字节偏移换算为 1-based 坐标
    pub fn coordinate(&self, offset: usize) -> Coordinate {
        let offset = offset.min(self.len);
        let line = match self.line_starts.binary_search(&offset) {
            Ok(exact) => exact,
            Err(next) => next - 1,
        };
        Coordinate {
            line: line + 1,
            column: offset - self.line_starts[line] + 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coordinate_default_is_origin() {
        assert_eq!(Coordinate::default(), Coordinate { line: 1, column: 1 });
    }

    #[test]
    fn test_source_map_coordinates() {
        let map = SourceMap::new("int a;\nint b;\n\nreturn");
        assert_eq!(map.coordinate(0), Coordinate { line: 1, column: 1 });
        assert_eq!(map.coordinate(4), Coordinate { line: 1, column: 5 });
        assert_eq!(map.coordinate(7), Coordinate { line: 2, column: 1 });
        assert_eq!(map.coordinate(15), Coordinate { line: 4, column: 1 });
    }

    #[test]
    fn test_source_map_clamps_past_end() {
        let map = SourceMap::new("ab");
        assert_eq!(map.coordinate(99), Coordinate { line: 1, column: 3 });
    }
}
