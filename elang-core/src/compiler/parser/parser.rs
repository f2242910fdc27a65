//! 作用域感知的块解析器
//!
//! 解析按块进行：在当前位置取规则表的最长匹配，
//! 作用域关键字（函数、类、if、while、include、export）整块消费，
//! 其余内容按 `;` 切分为语句。表达式通过调度场算法组装。

use super::error::{unexpected_token, ParseResult, ParserError, ParserErrorKind};
use super::expr::{BinaryOp, Expr, ExprKind, FunctionCall, New};
use super::program::{ElangClass, Function, Program};
use super::scope::{ScopeArena, ScopeId};
use super::shunting_yard::{build_expression, Shallow};
use super::stmt::{ArrayInitializer, Conditional, Stmt, StmtKind, VariableDeclaration};
use super::symbols::SymbolTable;
use super::utils::{
    find_closing, find_statement_end, skip_whitespace, split_top_level, strip_comments,
};
use crate::compiler::lexer::TokenKind;
use crate::compiler::module::IncludeResolver;
use crate::compiler::types::{ArrayType, Layer, LayoutError, Primitive, Type};
use crate::kit::lexer::SourceMap;
use regex::Regex;
use std::collections::BTreeMap;
use std::rc::Rc;

/// 一次匹配的结果，捕获组以绝对字节偏移保存
#[derive(Debug, Clone)]
struct Matched {
    kind: TokenKind,
    start: usize,
    end: usize,
    groups: Vec<Option<(usize, usize)>>,
}

/// 块中解析出的条目
enum Node {
    Stmt(Stmt),
    Function(Function),
    Class(ElangClass),
    Include(Vec<(String, Rc<Program>)>),
    Export(Vec<String>),
}

impl Node {
    fn describe(&self) -> String {
        match self {
            Node::Stmt(stmt) => stmt.describe().to_string(),
            Node::Function(f) => format!("Function declaration '{}'", f.name),
            Node::Class(c) => format!("Class declaration '{}'", c.name),
            Node::Include(_) => "Include".to_string(),
            Node::Export(_) => "Export".to_string(),
        }
    }
}

/// 解析器内部使用的辅助正则
struct Patterns {
    argument: Regex,
    dimension: Regex,
    name: Regex,
    new_array: Regex,
    string: Regex,
    identifier: Regex,
}

impl Patterns {
    fn new() -> Self {
        let compile = |pattern: &str| Regex::new(pattern).expect("built-in parser pattern must compile");
        Self {
            argument: compile(
                r"\A\s*([A-Za-z_][\w.]*)(?:\s*(\*)\s*|\s+)([A-Za-z_]\w*)\s*((?:\[\s*\d*\s*\]\s*)*)\z",
            ),
            dimension: compile(r"\[\s*(\d*)\s*\]"),
            name: compile(r"\A\s*([A-Za-z_]\w*)"),
            new_array: compile(r"\A\s*([A-Za-z_][\w.]*)\s*\["),
            string: compile(r#"\A\s*"([^"]*)"\s*\z"#),
            identifier: compile(r"\A\s*([A-Za-z_]\w*)\s*\z"),
        }
    }
}

/// 模块解析器
pub struct Parser<'r> {
    module: String,
    source: String,
    map: SourceMap,
    symbols: SymbolTable,
    arena: ScopeArena,
    patterns: Patterns,
    /// 正在解析的外层类名
    class_path: Vec<String>,
    includes: &'r mut dyn IncludeResolver,
}

impl<'r> Parser<'r> {
    pub fn new(module: &str, source: &str, includes: &'r mut dyn IncludeResolver) -> Self {
        let source = strip_comments(source);
        let map = SourceMap::new(&source);
        Self {
            module: module.to_string(),
            source,
            map,
            symbols: SymbolTable::new(),
            arena: ScopeArena::new(),
            patterns: Patterns::new(),
            class_path: Vec::new(),
            includes,
        }
    }

    /// 解析整个模块
    pub fn parse(mut self) -> ParseResult<Program> {
        let root = self.arena.add_root(self.module.clone());
        let nodes = self.parse_block(0, self.source.len(), root)?;

        let mut statements = Vec::new();
        let mut functions: Vec<Function> = Vec::new();
        let mut classes = Vec::new();
        let mut exports = Vec::new();
        let mut includes = BTreeMap::new();

        for (pos, node) in nodes {
            match node {
                Node::Stmt(stmt) => match &*stmt {
                    StmtKind::VarDecl(_) | StmtKind::ArrayInit(_) | StmtKind::Expr(_) => {
                        statements.push((pos, stmt))
                    }
                    other => {
                        return Err(self.placement_error(pos, other.describe(), "the global scope"))
                    }
                },
                Node::Function(f) => {
                    self.arena
                        .define_function(root, &f.name)
                        .map_err(|d| self.error(pos, ParserErrorKind::DuplicateFunction(d.0)))?;
                    functions.push(f);
                }
                Node::Class(class) => classes.push(class),
                Node::Include(modules) => includes.extend(modules),
                Node::Export(names) => exports.extend(names),
            }
        }
        let statements = self.register_variables(root, statements)?;

        tracing::debug!(
            target: "elang::parser",
            module = %self.module,
            functions = functions.len(),
            classes = classes.len(),
            globals = statements.len(),
            "parsed module"
        );

        Ok(Program {
            name: self.module,
            arena: self.arena,
            scope: root,
            statements,
            functions,
            classes,
            exports,
            includes,
            lowered: false,
        })
    }

    // ==================== 辅助 ====================

    fn error(&self, pos: usize, kind: ParserErrorKind) -> ParserError {
        ParserError::here(kind, self.map.coordinate(pos))
    }

    fn placement_error(&self, pos: usize, construct: impl Into<String>, context: &'static str) -> ParserError {
        self.error(
            pos,
            ParserErrorKind::InvalidPlacement {
                construct: construct.into(),
                context,
            },
        )
    }

    /// 报错用的片段：到第一个空白为止
    fn snippet(&self, pos: usize, end: usize) -> String {
        self.source[pos..end]
            .split_whitespace()
            .next()
            .unwrap_or("")
            .chars()
            .take(24)
            .collect()
    }

    fn match_at(&self, pos: usize, end: usize) -> Option<Matched> {
        let m = self.symbols.get_maximal_match(&self.source[pos..end])?;
        let groups = (0..m.captures.len())
            .map(|idx| m.captures.get(idx).map(|g| (pos + g.start(), pos + g.end())))
            .collect();
        Some(Matched {
            kind: m.kind,
            start: pos,
            end: pos + m.len(),
            groups,
        })
    }

    fn group(&self, m: &Matched, idx: usize) -> Option<&str> {
        m.groups
            .get(idx)
            .copied()
            .flatten()
            .map(|(start, end)| &self.source[start..end])
    }

    fn byte_at(&self, pos: usize) -> Option<u8> {
        self.source.as_bytes().get(pos).copied()
    }

    fn closing(&self, open_at: usize, end: usize, missing: ParserErrorKind) -> ParseResult<usize> {
        find_closing(&self.source, open_at, end).ok_or_else(|| self.error(open_at, missing))
    }

    fn register_variables(&mut self, scope: ScopeId, stmts: Vec<(usize, Stmt)>) -> ParseResult<Vec<Stmt>> {
        let mut body = Vec::with_capacity(stmts.len());
        for (index, (pos, stmt)) in stmts.into_iter().enumerate() {
            if let StmtKind::VarDecl(decl) = &*stmt {
                if let Err(dup) = self.arena.define_variable(scope, &decl.name, decl.ty.clone(), index) {
                    return Err(self.error(pos, ParserErrorKind::DuplicateDeclaration(dup.0)));
                }
            }
            body.push(stmt);
        }
        Ok(body)
    }

    fn expect_statements(&self, nodes: Vec<(usize, Node)>, context: &'static str) -> ParseResult<Vec<(usize, Stmt)>> {
        nodes
            .into_iter()
            .map(|(pos, node)| match node {
                Node::Stmt(stmt) => Ok((pos, stmt)),
                other => Err(self.placement_error(pos, other.describe(), context)),
            })
            .collect()
    }

    /// 类型名 → 类型；`layers` 非空时构成数组
    fn resolve_type(&self, name: &str, pointer: bool, layers: Vec<Layer>) -> Result<Type, LayoutError> {
        let base = if let Some(primitive) = Primitive::from_name(name) {
            Type::Primitive(primitive)
        } else if let Some(qualified) = self.symbols.qualified_name(name) {
            Type::Class(qualified.to_string())
        } else {
            return Err(LayoutError::UnknownType(name.to_string()));
        };
        let base = if pointer { Type::Pointer(Box::new(base)) } else { base };
        if layers.is_empty() {
            Ok(base)
        } else {
            Ok(Type::Array(ArrayType::new(base, layers)?))
        }
    }

    // ==================== 块 ====================

    fn parse_block(&mut self, start: usize, end: usize, scope: ScopeId) -> ParseResult<Vec<(usize, Node)>> {
        let mut nodes = Vec::new();
        let mut pos = start;
        loop {
            pos = skip_whitespace(&self.source, pos, end);
            if pos >= end {
                break;
            }
            if self.byte_at(pos) == Some(b';') {
                pos += 1;
                continue;
            }
            let m = self.match_at(pos, end).ok_or_else(|| {
                self.error(pos, ParserErrorKind::UnmatchedToken(self.snippet(pos, end)))
            })?;
            let (node, next) = match m.kind {
                TokenKind::FunctionHeader => {
                    let (function, next) = self.parse_function(&m, end, scope)?;
                    (Node::Function(function), next)
                }
                TokenKind::ClassHeader => {
                    let (class, next) = self.parse_class(&m, end, scope)?;
                    (Node::Class(class), next)
                }
                TokenKind::If | TokenKind::While => {
                    let (stmt, next) = self.parse_conditional(&m, end, scope)?;
                    (Node::Stmt(stmt), next)
                }
                TokenKind::Include => {
                    let (modules, next) = self.parse_include(&m, end)?;
                    (Node::Include(modules), next)
                }
                TokenKind::Export => {
                    let (names, next) = self.parse_export(&m, end)?;
                    (Node::Export(names), next)
                }
                _ => {
                    let (stmts, next) = self.parse_statement(pos, end)?;
                    nodes.extend(stmts.into_iter().map(|stmt| (pos, Node::Stmt(stmt))));
                    pos = next;
                    continue;
                }
            };
            nodes.push((pos, node));
            pos = next;
        }
        Ok(nodes)
    }

    fn parse_function(&mut self, m: &Matched, end: usize, scope: ScopeId) -> ParseResult<(Function, usize)> {
        let type_name = self.group(m, 1).unwrap_or_default().to_string();
        let pointer = self.group(m, 2).is_some();
        let name = self.group(m, 3).unwrap_or_default().to_string();
        let arguments_range = m.groups.get(4).copied().flatten();

        let open = m.end - 1;
        let close = self.closing(open, end, ParserErrorKind::MissingRightCurly)?;

        let return_type = if type_name == "void" && !pointer {
            None
        } else {
            let ty = self
                .resolve_type(&type_name, pointer, Vec::new())
                .map_err(|e| self.error(m.start, e.into()))?;
            Some(ty)
        };
        let arguments = match arguments_range {
            Some((start, stop)) => self.parse_parameters(start, stop)?,
            None => Vec::new(),
        };

        let function_scope = self.arena.add_child(scope, name.clone());
        let nodes = self.parse_block(open + 1, close, function_scope)?;
        let stmts = self.expect_statements(nodes, "a function body")?;
        let body = self.register_variables(function_scope, stmts)?;

        tracing::debug!(
            target: "elang::parser",
            function = %name,
            arguments = arguments.len(),
            statements = body.len(),
            "parsed function"
        );

        let function = Function {
            name,
            signature: self.source[m.start..open].trim().to_string(),
            return_type,
            scope: function_scope,
            body,
            arguments,
            line: self.map.coordinate(m.start).line,
        };
        Ok((function, close + 1))
    }

    /// 形参列表
    fn parse_parameters(&self, start: usize, end: usize) -> ParseResult<Vec<VariableDeclaration>> {
        if self.source[start..end].trim().is_empty() {
            return Ok(Vec::new());
        }
        let mut arguments = Vec::new();
        for (part_start, part_end) in split_top_level(&self.source, start, end) {
            let text = &self.source[part_start..part_end];
            let caps = self.patterns.argument.captures(text).ok_or_else(|| {
                self.error(part_start, ParserErrorKind::MalformedArgument(text.trim().to_string()))
            })?;
            let mut layers = Vec::new();
            let dims = caps.get(4).map_or("", |d| d.as_str());
            for dim in self.patterns.dimension.captures_iter(dims) {
                let digits = &dim[1];
                if digits.is_empty() {
                    layers.push(Layer::Heap);
                    continue;
                }
                let count: u32 = digits.parse().map_err(|_| {
                    self.error(part_start, ParserErrorKind::InvalidNumberFormat(digits.to_string()))
                })?;
                if count == 0 {
                    return Err(self.error(part_start, LayoutError::EmptyDimension(0).into()));
                }
                layers.push(Layer::Stack(count));
            }
            let ty = self
                .resolve_type(&caps[1], caps.get(2).is_some(), layers)
                .map_err(|e| self.error(part_start, e.into()))?;
            arguments.push(VariableDeclaration::new(&caps[3], ty));
        }
        Ok(arguments)
    }

    fn parse_class(&mut self, m: &Matched, end: usize, scope: ScopeId) -> ParseResult<(ElangClass, usize)> {
        let name = self.group(m, 1).unwrap_or_default().to_string();
        let open = m.end - 1;
        let close = self.closing(open, end, ParserErrorKind::MissingRightCurly)?;

        let qualified = if self.class_path.is_empty() {
            name.clone()
        } else {
            format!("{}.{}", self.class_path.join("."), name)
        };
        self.symbols
            .register_class(&name, &qualified)
            .map_err(|kind| self.error(m.start, kind))?;
        if qualified != name {
            self.symbols
                .register_class(&qualified, &qualified)
                .map_err(|kind| self.error(m.start, kind))?;
        }

        let class_scope = self.arena.add_child(scope, qualified.clone());
        self.class_path.push(name);
        let nodes = self.parse_block(open + 1, close, class_scope);
        self.class_path.pop();
        self.symbols.close_class(&qualified);
        let nodes = nodes?;

        let mut functions: Vec<Function> = Vec::new();
        let mut member_variables = Vec::new();
        let mut member_initialization = Vec::new();
        let mut classes = Vec::new();

        for (index, (pos, node)) in nodes.into_iter().enumerate() {
            match node {
                Node::Stmt(stmt) => match *stmt {
                    StmtKind::VarDecl(decl) => {
                        if let Err(dup) =
                            self.arena.define_variable(class_scope, &decl.name, decl.ty.clone(), index)
                        {
                            return Err(self.error(pos, ParserErrorKind::DuplicateDeclaration(dup.0)));
                        }
                        member_variables.push(decl);
                    }
                    kind @ (StmtKind::ArrayInit(_) | StmtKind::Expr(_)) => {
                        member_initialization.push(Box::new(kind));
                    }
                    other => return Err(self.placement_error(pos, other.describe(), "a class body")),
                },
                Node::Function(function) => {
                    self.arena
                        .define_function(class_scope, &function.name)
                        .map_err(|d| self.error(pos, ParserErrorKind::DuplicateFunction(d.0)))?;
                    functions.push(function);
                }
                Node::Class(class) => classes.push(class),
                other => return Err(self.placement_error(pos, other.describe(), "a class body")),
            }
        }

        tracing::debug!(
            target: "elang::parser",
            class = %qualified,
            members = member_variables.len(),
            methods = functions.len(),
            "parsed class"
        );

        let class = ElangClass {
            name: qualified,
            scope: class_scope,
            functions,
            member_variables,
            member_initialization,
            classes,
        };
        Ok((class, close + 1))
    }

    fn parse_conditional(&mut self, m: &Matched, end: usize, scope: ScopeId) -> ParseResult<(Stmt, usize)> {
        let keyword = if m.kind == TokenKind::If { "if" } else { "while" };
        let open = m.end - 1;
        let close_paren = self.closing(open, end, ParserErrorKind::MissingRightParen)?;
        let condition = self.parse_expression(open + 1, close_paren)?;

        let brace = skip_whitespace(&self.source, close_paren + 1, end);
        if self.byte_at(brace) != Some(b'{') || brace >= end {
            return Err(self.error(
                brace.min(end),
                ParserErrorKind::MalformedHeader(format!("expected '{{' after {keyword} condition")),
            ));
        }
        let close = self.closing(brace, end, ParserErrorKind::MissingRightCurly)?;

        let child = self.arena.add_child(scope, keyword);
        let nodes = self.parse_block(brace + 1, close, child)?;
        let stmts = self.expect_statements(nodes, "a block body")?;
        let body = self.register_variables(child, stmts)?;

        let conditional = Conditional {
            condition,
            scope: child,
            body,
        };
        let stmt = if m.kind == TokenKind::If {
            StmtKind::If(conditional)
        } else {
            StmtKind::While(conditional)
        };
        Ok((Box::new(stmt), close + 1))
    }

    /// `include { "a.elang", "b.elang" };`
    fn parse_include(&mut self, m: &Matched, end: usize) -> ParseResult<(Vec<(String, Rc<Program>)>, usize)> {
        let open = m.end - 1;
        let close = self.closing(open, end, ParserErrorKind::MissingRightCurly)?;
        let semi = skip_whitespace(&self.source, close + 1, end);
        if self.byte_at(semi) != Some(b';') || semi >= end {
            return Err(self.error(close, ParserErrorKind::MissingSemicolon));
        }

        let mut paths = Vec::new();
        for (start, stop) in split_top_level(&self.source, open + 1, close) {
            let text = &self.source[start..stop];
            if text.trim().is_empty() {
                continue;
            }
            let caps = self.patterns.string.captures(text).ok_or_else(|| {
                self.error(start, unexpected_token(text.trim(), vec!["string literal"]))
            })?;
            paths.push(caps[1].to_string());
        }

        let mut modules = Vec::new();
        for path in paths {
            let program = self
                .includes
                .resolve_include(&path)
                .map_err(|e| self.error(m.start, ParserErrorKind::Include(Box::new(e))))?;
            for export in &program.exports {
                let Some(class) = program.classes.iter().find(|c| &c.name == export) else {
                    continue;
                };
                let mut visible = Vec::new();
                class.flatten(&mut visible);
                for class in visible {
                    self.symbols
                        .register_class(&class.name, &class.name)
                        .map_err(|kind| self.error(m.start, kind))?;
                }
            }
            tracing::debug!(target: "elang::parser", module = %program.name, %path, "included module");
            modules.push((program.name.clone(), program));
        }
        Ok((modules, semi + 1))
    }

    /// `export { main, Point };`
    fn parse_export(&self, m: &Matched, end: usize) -> ParseResult<(Vec<String>, usize)> {
        let open = m.end - 1;
        let close = self.closing(open, end, ParserErrorKind::MissingRightCurly)?;
        let semi = skip_whitespace(&self.source, close + 1, end);
        if self.byte_at(semi) != Some(b';') || semi >= end {
            return Err(self.error(close, ParserErrorKind::MissingSemicolon));
        }
        let mut names = Vec::new();
        for (start, stop) in split_top_level(&self.source, open + 1, close) {
            let text = &self.source[start..stop];
            if text.trim().is_empty() {
                continue;
            }
            let caps = self.patterns.identifier.captures(text).ok_or_else(|| {
                self.error(start, unexpected_token(text.trim(), vec!["identifier"]))
            })?;
            names.push(caps[1].to_string());
        }
        Ok((names, semi + 1))
    }

    // ==================== 语句 ====================

    fn parse_statement(&self, pos: usize, end: usize) -> ParseResult<(Vec<Stmt>, usize)> {
        let semi = find_statement_end(&self.source, pos, end)
            .ok_or_else(|| self.error(pos, ParserErrorKind::MissingSemicolon))?;
        let stmts = match self.match_at(pos, semi) {
            Some(m) if m.kind == TokenKind::Return => {
                if self.source[m.end..semi].trim().is_empty() {
                    vec![Box::new(StmtKind::Return(None))]
                } else {
                    let value = self.parse_expression(m.end, semi)?;
                    vec![Box::new(StmtKind::Return(Some(value)))]
                }
            }
            Some(m) if m.kind.is_type() => self.parse_declaration(&m, semi)?,
            _ => vec![Box::new(StmtKind::Expr(self.parse_expression(pos, semi)?))],
        };
        Ok((stmts, semi + 1))
    }

    /// `T name[dims] = value;` 展开为 声明、数组头初始化、赋值
    fn parse_declaration(&self, m: &Matched, semi: usize) -> ParseResult<Vec<Stmt>> {
        let type_name = self.group(m, 1).unwrap_or_default();
        let pointer = self.group(m, 2).is_some();

        let caps = self.patterns.name.captures(&self.source[m.end..semi]).ok_or_else(|| {
            self.error(m.end, unexpected_token(self.snippet(m.end, semi), vec!["identifier"]))
        })?;
        let name = caps[1].to_string();
        let mut cursor = m.end + caps.get(0).map_or(0, |c| c.end());

        let mut layers = Vec::new();
        loop {
            cursor = skip_whitespace(&self.source, cursor, semi);
            if cursor >= semi || self.byte_at(cursor) != Some(b'[') {
                break;
            }
            let close = self.closing(cursor, semi, ParserErrorKind::MissingRightBracket)?;
            if self.source[cursor + 1..close].trim().is_empty() {
                layers.push(Layer::Heap);
            } else {
                let dimension = self.parse_expression(cursor + 1, close)?;
                let layer = constant_dimension(&dimension).map_err(|e| self.error(cursor, e.into()))?;
                layers.push(layer);
            }
            cursor = close + 1;
        }

        let ty = self
            .resolve_type(type_name, pointer, layers)
            .map_err(|e| self.error(m.start, e.into()))?;
        let inline = ty.is_inline();
        let mut stmts = vec![Box::new(StmtKind::VarDecl(VariableDeclaration::new(&name, ty)))];
        if inline {
            stmts.push(Box::new(StmtKind::ArrayInit(ArrayInitializer { name: name.clone() })));
        }

        if cursor < semi {
            let is_assign = self.byte_at(cursor) == Some(b'=') && self.byte_at(cursor + 1) != Some(b'=');
            if !is_assign {
                return Err(self.error(
                    cursor,
                    unexpected_token(self.snippet(cursor, semi), vec!["=", ";"]),
                ));
            }
            let value = self.parse_expression(cursor + 1, semi)?;
            let assign = ExprKind::binary(BinaryOp::Assign, ExprKind::variable(name), value);
            stmts.push(Box::new(StmtKind::Expr(assign)));
        }
        Ok(stmts)
    }

    // ==================== 表达式 ====================

    fn parse_expression(&self, start: usize, end: usize) -> ParseResult<Expr> {
        let items = self.collect_items(start, end)?;
        build_expression(items).map_err(|kind| self.error(skip_whitespace(&self.source, start, end), kind))
    }

    /// 把表达式文本切成调度场条目
    fn collect_items(&self, start: usize, end: usize) -> ParseResult<Vec<Shallow>> {
        let mut items: Vec<Shallow> = Vec::new();
        let mut pos = start;
        loop {
            pos = skip_whitespace(&self.source, pos, end);
            if pos >= end {
                break;
            }
            let expect_operand = items.last().map_or(true, Shallow::expects_operand_after);
            let m = self.match_at(pos, end).ok_or_else(|| {
                self.error(pos, ParserErrorKind::UnmatchedToken(self.snippet(pos, end)))
            })?;
            let text = &self.source[m.start..m.end];
            let mut next = m.end;

            let item = match m.kind {
                TokenKind::Decimal => Shallow::Operand(ExprKind::decimal(self.decimal(pos, text, false)?)),
                TokenKind::Char => Shallow::Operand(Box::new(ExprKind::Char(self.char_constant(pos, text)?))),
                TokenKind::Identifier => Shallow::Operand(ExprKind::variable(text)),
                TokenKind::Call | TokenKind::Constructor(_) => {
                    let (call, close) = self.parse_call(&m, end)?;
                    next = close + 1;
                    Shallow::Call(call)
                }
                // 操作数位置上的 `-` 与紧随的数字构成负数常量
                TokenKind::Minus if expect_operand => {
                    let digits_at = skip_whitespace(&self.source, m.end, end);
                    match self.match_at(digits_at, end) {
                        Some(d) if d.kind == TokenKind::Decimal => {
                            next = d.end;
                            let value = self.decimal(pos, &self.source[d.start..d.end], true)?;
                            Shallow::Operand(ExprKind::decimal(value))
                        }
                        _ => {
                            return Err(self.error(
                                digits_at.min(end),
                                unexpected_token(self.snippet(digits_at.min(end), end), vec!["number"]),
                            ))
                        }
                    }
                }
                TokenKind::Plus => Shallow::Binary(BinaryOp::Add),
                TokenKind::Minus => Shallow::Binary(BinaryOp::Sub),
                TokenKind::Asterisk => Shallow::Binary(BinaryOp::Mul),
                TokenKind::Slash => Shallow::Binary(BinaryOp::Div),
                TokenKind::Assign => Shallow::Binary(BinaryOp::Assign),
                TokenKind::Equal => Shallow::Binary(BinaryOp::Equal),
                TokenKind::Greater => Shallow::Binary(BinaryOp::Greater),
                TokenKind::And => Shallow::Binary(BinaryOp::And),
                TokenKind::Or => Shallow::Binary(BinaryOp::Or),
                TokenKind::Dot => Shallow::Binary(BinaryOp::Dot),
                TokenKind::New => match self.parse_new_array(m.end, end)? {
                    Some((array, close)) => {
                        next = close + 1;
                        Shallow::Operand(array)
                    }
                    None => Shallow::New,
                },
                TokenKind::LeftParen => Shallow::LeftParen,
                TokenKind::RightParen => Shallow::RightParen,
                TokenKind::LeftBracket => {
                    let close = self.closing(pos, end, ParserErrorKind::MissingRightBracket)?;
                    let index = self.parse_expression(pos + 1, close)?;
                    next = close + 1;
                    Shallow::Index(index)
                }
                other => {
                    let expected: Vec<String> = Vec::new();
                    return Err(self.error(
                        pos,
                        unexpected_token(format!("{} '{}'", other, text.trim()), expected),
                    ));
                }
            };
            items.push(item);
            pos = next;
        }
        Ok(items)
    }

    fn parse_call(&self, m: &Matched, end: usize) -> ParseResult<(FunctionCall, usize)> {
        let name = self.group(m, 1).unwrap_or_default().to_string();
        let open = m.end - 1;
        let close = self.closing(open, end, ParserErrorKind::MissingRightParen)?;
        let arguments = if self.source[open + 1..close].trim().is_empty() {
            Vec::new()
        } else {
            split_top_level(&self.source, open + 1, close)
                .into_iter()
                .map(|(start, stop)| self.parse_expression(start, stop))
                .collect::<ParseResult<Vec<_>>>()?
        };
        let constructor_of = match m.kind {
            TokenKind::Constructor(id) => self.symbols.class(id).map(|c| c.qualified.clone()),
            _ => None,
        };
        Ok((
            FunctionCall {
                name,
                arguments,
                constructor_of,
            },
            close,
        ))
    }

    /// `new T[count]`；`T` 不是已知类型时返回 `None`，交给构造调用处理
    fn parse_new_array(&self, after_new: usize, end: usize) -> ParseResult<Option<(Expr, usize)>> {
        let Some(caps) = self.patterns.new_array.captures(&self.source[after_new..end]) else {
            return Ok(None);
        };
        let Ok(element) = self.resolve_type(&caps[1], false, Vec::new()) else {
            return Ok(None);
        };
        let open = after_new + caps.get(0).map_or(0, |c| c.end()) - 1;
        let close = self.closing(open, end, ParserErrorKind::MissingRightBracket)?;
        let count = self.parse_expression(open + 1, close)?;
        Ok(Some((Box::new(ExprKind::New(New::Array { element, count })), close)))
    }

    fn decimal(&self, pos: usize, digits: &str, negative: bool) -> ParseResult<i32> {
        let invalid = || {
            let text = if negative { format!("-{digits}") } else { digits.to_string() };
            self.error(pos, ParserErrorKind::InvalidNumberFormat(text))
        };
        let value: i64 = digits.parse().map_err(|_| invalid())?;
        let value = if negative { -value } else { value };
        i32::try_from(value).map_err(|_| invalid())
    }

    fn char_constant(&self, pos: usize, text: &str) -> ParseResult<char> {
        let inner = &text[1..text.len() - 1];
        let value = match inner {
            "\\n" => Some('\n'),
            "\\t" => Some('\t'),
            "\\r" => Some('\r'),
            "\\0" => Some('\0'),
            "\\\\" => Some('\\'),
            "\\'" => Some('\''),
            "\\\"" => Some('"'),
            plain if !plain.starts_with('\\') && plain.chars().count() == 1 => plain.chars().next(),
            _ => None,
        };
        value.ok_or_else(|| self.error(pos, ParserErrorKind::InvalidCharConstant(text.to_string())))
    }
}

/// 栈数组维度必须是正的常量
fn constant_dimension(expr: &ExprKind) -> Result<Layer, LayoutError> {
    if !expr.is_constant() {
        return Err(LayoutError::NonConstantDimension);
    }
    let out_of_range = || LayoutError::DimensionOutOfRange(expr.to_string());
    let value = expr.evaluate().ok_or_else(out_of_range)?;
    if value <= 0 {
        return Err(LayoutError::EmptyDimension(value));
    }
    i32::try_from(value)
        .map(|count| Layer::Stack(count as u32))
        .map_err(|_| out_of_range())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::module::NoIncludes;

    fn parse(source: &str) -> ParseResult<Program> {
        let mut includes = NoIncludes;
        Parser::new("main", source, &mut includes).parse()
    }

    fn body_of<'p>(program: &'p Program, name: &str) -> &'p [Stmt] {
        &program.function(name).unwrap().body
    }

    #[test]
    fn test_function_and_return() {
        let program = parse("int main() { return 2 + 3 * 4; }").unwrap();
        let main = program.function("main").unwrap();
        assert_eq!(main.return_type, Some(Type::int()));
        assert_eq!(main.signature, "int main()");
        match &*main.body[0] {
            StmtKind::Return(Some(expr)) => assert_eq!(expr.to_string(), "(2 + (3 * 4))"),
            other => panic!("unexpected statement {other:?}"),
        }
    }

    #[test]
    fn test_declaration_expands() {
        let program = parse("int main() { int a[3] = 0; int x = 1; }").unwrap();
        let body = body_of(&program, "main");
        assert_eq!(body.len(), 5);
        assert!(matches!(&*body[0], StmtKind::VarDecl(d) if d.name == "a"));
        assert!(matches!(&*body[1], StmtKind::ArrayInit(a) if a.name == "a"));
        assert!(matches!(&*body[2], StmtKind::Expr(_)));
        assert!(matches!(&*body[3], StmtKind::VarDecl(d) if d.name == "x"));

        let scope = program.function("main").unwrap().scope;
        let x = program.arena.lookup(scope, "x").unwrap();
        assert_eq!(x.declaration_index, 3);
    }

    #[test]
    fn test_heap_array_has_no_initializer() {
        let program = parse("int main() { int a[]; }").unwrap();
        assert_eq!(body_of(&program, "main").len(), 1);
    }

    #[test]
    fn test_constant_dimension_expression() {
        let program = parse("int main() { int a[2 * 3]; }").unwrap();
        match &*body_of(&program, "main")[0] {
            StmtKind::VarDecl(decl) => assert_eq!(decl.ty.to_string(), "int[6]"),
            other => panic!("unexpected statement {other:?}"),
        }
    }

    #[test]
    fn test_non_constant_dimension() {
        let err = parse("int main() { int n = 3; int a[n]; }").unwrap_err();
        assert_eq!(err.kind, ParserErrorKind::Layout(LayoutError::NonConstantDimension));
        assert_eq!(err.line(), Some(1));
    }

    #[test]
    fn test_dimension_out_of_range() {
        let err = parse("int main() { int a[65536 * 65536]; }").unwrap_err();
        match err.kind {
            ParserErrorKind::Layout(LayoutError::DimensionOutOfRange(text)) => {
                assert!(text.contains("65536"))
            }
            other => panic!("unexpected error {other:?}"),
        }

        let err = parse("int main() { int a[1 - 2]; }").unwrap_err();
        assert_eq!(err.kind, ParserErrorKind::Layout(LayoutError::EmptyDimension(-1)));
    }

    #[test]
    fn test_if_and_while_scopes() {
        let source = "int main() {\n  int i = 0;\n  while (i > 0) {\n    int j = i;\n  }\n  if (i == 0) { return 1; }\n  return 0;\n}";
        let program = parse(source).unwrap();
        let main = program.function("main").unwrap();
        let children = &program.arena.get(main.scope).children;
        assert_eq!(children.len(), 2);
        assert_eq!(program.arena.get(children[0]).name, "while");
        assert!(program.arena.get(children[0]).variable("j").is_some());
        assert!(matches!(&*main.body[2], StmtKind::While(_)));
        assert!(matches!(&*main.body[3], StmtKind::If(_)));
    }

    #[test]
    fn test_missing_semicolon() {
        let err = parse("int main() {\n  int x = 1\n}").unwrap_err();
        assert_eq!(err.kind, ParserErrorKind::MissingSemicolon);
        assert_eq!(err.line(), Some(2));
    }

    #[test]
    fn test_missing_curly() {
        let err = parse("int main() { return 0;").unwrap_err();
        assert_eq!(err.kind, ParserErrorKind::MissingRightCurly);
    }

    #[test]
    fn test_duplicate_in_same_scope() {
        let err = parse("int main() {\n  int x;\n  int x;\n}").unwrap_err();
        assert_eq!(err.kind, ParserErrorKind::DuplicateDeclaration("x".into()));
        assert_eq!(err.line(), Some(3));
    }

    #[test]
    fn test_class_members_and_constructor() {
        let source = "class Point {\n  int x;\n  int y;\n  void constructor(int a, int b) { x = a; y = b; }\n  int sum() { return x + y; }\n}\nint main() { Point p = new Point(1, 2); return p.sum(); }";
        let program = parse(source).unwrap();
        let point = program.class("Point").unwrap();
        assert_eq!(point.member_variables.len(), 2);
        assert!(point.constructor().is_some());
        assert_eq!(point.constructor().unwrap().return_type, None);

        let body = body_of(&program, "main");
        match &*body[1] {
            StmtKind::Expr(expr) => assert_eq!(expr.to_string(), "(p = new Point(1, 2))"),
            other => panic!("unexpected statement {other:?}"),
        }
        match &*body[2] {
            StmtKind::Return(Some(expr)) => assert_eq!(expr.to_string(), "p.sum()"),
            other => panic!("unexpected statement {other:?}"),
        }
    }

    #[test]
    fn test_nested_class_is_qualified() {
        let source = "class List { class Node { int value; } Node head; }\nint main() { List.Node n; return 0; }";
        let program = parse(source).unwrap();
        let list = program.class("List").unwrap();
        assert_eq!(list.classes[0].name, "List.Node");
        assert_eq!(list.classes[0].label(), "List_Node");
        assert_eq!(list.member("head").unwrap().ty, Type::Class("List.Node".into()));
        assert!(program.class("List.Node").is_some());
    }

    #[test]
    fn test_nested_aliases_are_scoped_to_outer_class() {
        let source = "class List { class Node { int value; } Node head; }\n\
                      class Tree { class Node { int key; } Node root; }\n\
                      int main() { List.Node a; Tree.Node b; return 0; }";
        let program = parse(source).unwrap();
        let tree = program.class("Tree").unwrap();
        assert_eq!(tree.member("root").unwrap().ty, Type::Class("Tree.Node".into()));
        assert_eq!(program.class("List").unwrap().member("head").unwrap().ty, Type::Class("List.Node".into()));

        let err = parse("class List { class Node { int value; } }\nint main() { Node n; return 0; }");
        assert!(err.is_err());
        let err = parse("class List { class Node { int a; } class Node { int b; } }").unwrap_err();
        assert_eq!(err.kind, ParserErrorKind::DuplicateClass("Node".into()));
    }

    #[test]
    fn test_unknown_type() {
        let err = parse("int main() { Shape s; }").unwrap_err();
        assert!(matches!(err.kind, ParserErrorKind::UnmatchedToken(_) | ParserErrorKind::MalformedExpression(_)));
        let err = parse("int f(Shape s) { return 0; }").unwrap_err();
        assert_eq!(err.kind, ParserErrorKind::Layout(LayoutError::UnknownType("Shape".into())));
    }

    #[test]
    fn test_arguments() {
        let program = parse("int f(int a, char* p, int v[], int m[2][3]) { return a; }").unwrap();
        let f = program.function("f").unwrap();
        let types: Vec<String> = f.arguments.iter().map(|a| a.ty.to_string()).collect();
        assert_eq!(types, vec!["int", "char*", "int[]", "int[2][3]"]);
    }

    #[test]
    fn test_new_array_and_index() {
        let program = parse("int main() { int v[] = new int[4]; v[1] = 'a'; return v[1]; }").unwrap();
        let body = body_of(&program, "main");
        match &*body[1] {
            StmtKind::Expr(expr) => assert_eq!(expr.to_string(), "(v = new int[4])"),
            other => panic!("unexpected statement {other:?}"),
        }
        match &*body[2] {
            StmtKind::Expr(expr) => assert_eq!(expr.to_string(), "(v[1] = 'a')"),
            other => panic!("unexpected statement {other:?}"),
        }
    }

    #[test]
    fn test_negative_literal_and_comments() {
        let program = parse("int main() {\n  // 注释\n  return -3 - -2; // trailing\n}").unwrap();
        match &*body_of(&program, "main")[0] {
            StmtKind::Return(Some(expr)) => assert_eq!(expr.to_string(), "(-3 - -2)"),
            other => panic!("unexpected statement {other:?}"),
        }
    }

    #[test]
    fn test_logical_operators() {
        let program = parse("int main() { return 1 > 0 and 2 == 2 || 0; }").unwrap();
        match &*body_of(&program, "main")[0] {
            StmtKind::Return(Some(expr)) => {
                assert_eq!(expr.to_string(), "(((1 > 0) and (2 == 2)) or 0)")
            }
            other => panic!("unexpected statement {other:?}"),
        }
    }

    #[test]
    fn test_invalid_placement() {
        let err = parse("int main() { int f() { return 1; } }").unwrap_err();
        assert!(matches!(err.kind, ParserErrorKind::InvalidPlacement { .. }));
        let err = parse("return 1;").unwrap_err();
        assert!(matches!(err.kind, ParserErrorKind::InvalidPlacement { .. }));
    }

    #[test]
    fn test_exports() {
        let program = parse("export { main, Point };\nclass Point { int x; }\nint main() { return 0; }").unwrap();
        assert_eq!(program.exports, vec!["main".to_string(), "Point".to_string()]);
    }

    #[test]
    fn test_char_constants() {
        let program = parse("int main() { char c = '\\n'; return c; }").unwrap();
        match &*body_of(&program, "main")[1] {
            StmtKind::Expr(expr) => assert_eq!(expr.to_string(), "(c = '\\n')"),
            other => panic!("unexpected statement {other:?}"),
        }
        let err = parse("int main() { char c = '\\q'; }").unwrap_err();
        assert!(matches!(err.kind, ParserErrorKind::InvalidCharConstant(_)));
    }
}
