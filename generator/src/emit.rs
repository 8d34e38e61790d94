//! PHP source printer. Parentheses come from the tree; the printer never
//! adds its own except around call arguments and conditions.

use crate::tree::{File, FuncDecl, Node, Op, Payload, RootNode};
use crate::types::{ClassType, Literal};

/// How a statement is laid out relative to its surroundings.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct EmitFlags {
    pub semicolon: bool,
    pub newline: bool,
}

impl EmitFlags {
    pub const STMT: EmitFlags = EmitFlags {
        semicolon: true,
        newline: true,
    };
    pub const BLOCK: EmitFlags = EmitFlags {
        semicolon: false,
        newline: true,
    };
    /// A block body glued to its `if`/`while`/`else` header.
    const BODY: EmitFlags = EmitFlags {
        semicolon: false,
        newline: false,
    };

    pub fn of(op: Op) -> EmitFlags {
        match op {
            Op::Block | Op::If | Op::IfElse | Op::While | Op::Switch => EmitFlags::BLOCK,
            _ => EmitFlags::STMT,
        }
    }
}

pub struct Emitter {
    indent: usize,
    output: String,
}

impl Emitter {
    pub fn new() -> Self {
        Self {
            indent: 0,
            output: String::new(),
        }
    }

    pub fn finish(mut self) -> String {
        self.output.push('\n');
        self.output
    }

    fn emit_inline(&mut self, s: &str) {
        self.output.push_str(s);
    }

    fn emit_line(&mut self, s: &str) {
        self.output.push('\n');
        for _ in 0..self.indent {
            self.output.push_str("  ");
        }
        self.output.push_str(s);
    }

    fn blank_line(&mut self) {
        self.output.push('\n');
    }

    fn enter_block(&mut self) {
        self.indent += 1
    }

    fn exit_block(&mut self) {
        self.indent -= 1
    }

    pub fn stmt(&mut self, n: &Node, flags: EmitFlags) {
        if flags.newline {
            self.emit_line("");
        }
        match n.op {
            Op::Block => {
                self.emit_inline("{");
                self.enter_block();
                for s in &n.args {
                    self.stmt(s, EmitFlags::of(s.op));
                }
                self.exit_block();
                self.emit_line("}");
            }
            Op::If => {
                self.emit_inline("if (");
                self.expr(&n.args[0]);
                self.emit_inline(") ");
                self.stmt(&n.args[1], EmitFlags::BODY);
            }
            Op::IfElse => {
                self.emit_inline("if (");
                self.expr(&n.args[0]);
                self.emit_inline(") ");
                self.stmt(&n.args[1], EmitFlags::BODY);
                self.emit_inline(" else ");
                self.stmt(&n.args[2], EmitFlags::BODY);
            }
            Op::While => {
                self.emit_inline("while (");
                self.expr(&n.args[0]);
                self.emit_inline(") ");
                self.stmt(&n.args[1], EmitFlags::BODY);
            }
            Op::DoWhile => {
                self.emit_inline("do ");
                self.stmt(&n.args[0], EmitFlags::BODY);
                self.emit_inline(" while (");
                self.expr(&n.args[1]);
                self.emit_inline(")");
            }
            Op::Switch => {
                self.emit_inline("switch (");
                self.expr(&n.args[0]);
                self.emit_inline(") {");
                self.enter_block();
                for case in &n.args[1..] {
                    self.case(case);
                }
                self.exit_block();
                self.emit_line("}");
            }
            Op::Return => {
                self.emit_inline("return ");
                self.expr(&n.args[0]);
            }
            Op::ReturnVoid => self.emit_inline("return"),
            Op::Break => self.emit_inline("break"),
            Op::Continue => self.emit_inline("continue"),
            Op::Echo => {
                self.emit_inline("echo ");
                self.list(&n.args);
            }
            Op::Case | Op::Default => panic!("{:?} outside of a switch", n.op),
            _ => self.expr(n),
        }
        if flags.semicolon {
            self.emit_inline(";");
        }
    }

    fn case(&mut self, n: &Node) {
        let body = match n.op {
            Op::Case => {
                self.emit_line("case ");
                self.expr(&n.args[0]);
                self.emit_inline(":");
                &n.args[1..]
            }
            Op::Default => {
                self.emit_line("default:");
                &n.args[..]
            }
            op => panic!("{op:?} inside a switch"),
        };
        self.enter_block();
        for s in body {
            self.stmt(s, EmitFlags::of(s.op));
        }
        self.exit_block();
    }

    fn list(&mut self, nodes: &[Node]) {
        for (i, n) in nodes.iter().enumerate() {
            if i > 0 {
                self.emit_inline(", ");
            }
            self.expr(n);
        }
    }

    pub fn expr(&mut self, n: &Node) {
        match n.op {
            Op::Parens => {
                self.emit_inline("(");
                self.expr(&n.args[0]);
                self.emit_inline(")");
            }
            Op::Null => self.emit_inline("null"),
            Op::BoolLit | Op::IntLit | Op::FloatLit | Op::StringLit => {
                let Some(lit) = n.literal() else {
                    panic!("literal node without a value: {n:?}");
                };
                self.emit_inline(&literal(lit));
            }
            Op::InterpolatedString => {
                self.emit_inline("\"");
                for part in &n.args {
                    match (part.op, part.literal()) {
                        (Op::Var, _) => {
                            self.emit_inline("{");
                            self.expr(part);
                            self.emit_inline("}");
                        }
                        (_, Some(Literal::String(s))) => escape_into(&mut self.output, s),
                        _ => panic!("bad interpolated part: {part:?}"),
                    }
                }
                self.emit_inline("\"");
            }
            Op::ArrayLit => {
                self.emit_inline("[");
                self.list(&n.args);
                self.emit_inline("]");
            }
            Op::TupleLit => {
                self.emit_inline("tuple(");
                self.list(&n.args);
                self.emit_inline(")");
            }
            Op::Var => {
                self.emit_inline("$");
                self.emit_inline(ident(n));
            }
            Op::Name => self.emit_inline(ident(n)),
            Op::New => {
                self.emit_inline("new ");
                self.emit_inline(ident(n));
                self.emit_inline("()");
            }
            Op::Prop => {
                self.expr(&n.args[0]);
                self.emit_inline("->");
                self.emit_inline(ident(n));
            }
            Op::MethodCall => {
                self.expr(&n.args[0]);
                self.emit_inline("->");
                self.emit_inline(ident(n));
                self.emit_inline("(");
                self.list(&n.args[1..]);
                self.emit_inline(")");
            }
            Op::Call => {
                self.expr(&n.args[0]);
                self.emit_inline("(");
                self.list(&n.args[1..]);
                self.emit_inline(")");
            }
            Op::Index => {
                self.expr(&n.args[0]);
                self.emit_inline("[");
                self.expr(&n.args[1]);
                self.emit_inline("]");
            }
            Op::Cast => {
                let Some(keyword) = n.ty.as_ref().and_then(|t| t.cast_keyword()) else {
                    panic!("cast to a type without a keyword: {:?}", n.ty);
                };
                self.emit_inline("(");
                self.emit_inline(keyword);
                self.emit_inline(")");
                self.expr(&n.args[0]);
            }
            Op::Ternary => {
                self.expr(&n.args[0]);
                self.emit_inline(" ? ");
                self.expr(&n.args[1]);
                self.emit_inline(" : ");
                self.expr(&n.args[2]);
            }
            Op::Assign => {
                self.expr(&n.args[0]);
                self.emit_inline(" = ");
                self.expr(&n.args[1]);
            }
            Op::AssignModify => {
                let Some(Payload::Op(op)) = &n.value else {
                    panic!("compound assignment without an operator: {n:?}");
                };
                self.expr(&n.args[0]);
                self.emit_inline(" ");
                self.emit_inline(token(*op));
                self.emit_inline("= ");
                self.expr(&n.args[1]);
            }
            Op::PostInc | Op::PostDec => {
                self.expr(&n.args[0]);
                self.emit_inline(token(n.op));
            }
            Op::Not | Op::Negation | Op::UnaryPlus | Op::BitNot | Op::PreInc | Op::PreDec => {
                let sign = token(n.op);
                self.emit_inline(sign);
                let start = self.output.len();
                self.expr(&n.args[0]);
                // `- -1` must not print as a decrement.
                if matches!(sign, "-" | "+") && self.output[start..].starts_with(['-', '+']) {
                    self.output.insert(start, ' ');
                }
            }
            op if op.is_binary() => {
                self.expr(&n.args[0]);
                self.emit_inline(" ");
                self.emit_inline(token(op));
                self.emit_inline(" ");
                self.expr(&n.args[1]);
            }
            op => panic!("{op:?} is not an expression"),
        }
    }

    fn doc_comment(&mut self, f: &FuncDecl) {
        if f.tags.is_empty() {
            return;
        }
        self.emit_line("/**");
        for tag in &f.tags {
            self.emit_line(&format!(" * {} {}", tag.name, tag.value));
        }
        self.emit_line(" */");
    }

    fn func_decl(&mut self, f: &FuncDecl, method: bool) {
        self.doc_comment(f);
        self.emit_line(if method { "public function " } else { "function " });
        self.emit_inline(&f.ty.name);
        self.emit_inline("(");
        for (i, p) in f.ty.params.iter().enumerate() {
            if i > 0 {
                self.emit_inline(", ");
            }
            self.emit_inline("$");
            self.emit_inline(&p.name);
            if let Some(default) = &p.default {
                self.emit_inline(" = ");
                self.expr(default);
            }
        }
        self.emit_inline(") {");
        self.enter_block();
        for s in &f.body {
            self.stmt(s, EmitFlags::of(s.op));
        }
        self.exit_block();
        self.emit_line("}");
    }

    fn class_decl(&mut self, ty: &ClassType, methods: &[FuncDecl]) {
        self.emit_line(&format!("class {} {{", ty.name));
        self.enter_block();
        for field in &ty.fields {
            self.emit_line(&format!("/** @var {} */", field.ty));
            self.emit_line(&format!("{} ${}", field.visibility.as_str(), field.name));
            if let Some(init) = &field.init {
                self.emit_inline(" = ");
                self.expr(init);
            }
            self.emit_inline(";");
        }
        for method in methods {
            self.blank_line();
            self.func_decl(method, true);
        }
        self.exit_block();
        self.emit_line("}");
    }
}

impl Default for Emitter {
    fn default() -> Self {
        Self::new()
    }
}

pub trait Emit {
    fn emit(&self, e: &mut Emitter);
}

impl Emit for Node {
    fn emit(&self, e: &mut Emitter) {
        if self.op.is_stmt() {
            e.stmt(self, EmitFlags::of(self.op));
        } else {
            e.expr(self);
        }
    }
}

impl Emit for RootNode {
    fn emit(&self, e: &mut Emitter) {
        match self {
            RootNode::Require { path } => {
                e.emit_line(&format!("require_once __DIR__ . '/{path}';"));
            }
            RootNode::Stmt(n) => e.stmt(n, EmitFlags::of(n.op)),
            RootNode::FuncDecl(f) => e.func_decl(f, false),
            RootNode::ClassDecl { ty, methods } => e.class_decl(ty, methods),
        }
    }
}

impl Emit for File {
    fn emit(&self, e: &mut Emitter) {
        e.emit_inline("<?php");
        let mut prev_require = false;
        for node in &self.nodes {
            let require = matches!(node, RootNode::Require { .. });
            if !(require && prev_require) {
                e.blank_line();
            }
            prev_require = require;
            node.emit(e);
        }
    }
}

/// Render `file` as PHP source.
pub fn print_file(file: &File) -> String {
    let mut e = Emitter::new();
    file.emit(&mut e);
    e.finish()
}

fn ident(n: &Node) -> &str {
    match n.ident() {
        Some(s) => s,
        None => panic!("{:?} node without a name", n.op),
    }
}

fn token(op: Op) -> &'static str {
    match op.token() {
        Some(t) => t,
        None => panic!("{op:?} has no token"),
    }
}

pub fn literal(lit: &Literal) -> String {
    match lit {
        Literal::Bool(v) => v.to_string(),
        Literal::Int(v) => v.to_string(),
        Literal::Float(v) => format_float(*v),
        Literal::String(s) => quote_string(s),
    }
}

pub fn format_float(v: f64) -> String {
    let special = match v {
        v if v.is_nan() => "NAN",
        f64::INFINITY => "INF",
        f64::NEG_INFINITY => "-INF",
        v if v == 0.0 && v.is_sign_negative() => "-0.0",
        v if v == 0.0 => "0.0",
        v => return format!("{v:?}"),
    };
    special.to_string()
}

/// A double-quoted PHP literal holding exactly `bytes`.
pub fn quote_string(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() + 2);
    out.push('"');
    escape_into(&mut out, bytes);
    out.push('"');
    out
}

fn escape_into(out: &mut String, bytes: &[u8]) {
    for chunk in bytes.utf8_chunks() {
        for c in chunk.valid().chars() {
            match c {
                '\n' => out.push_str("\\n"),
                '\r' => out.push_str("\\r"),
                '\t' => out.push_str("\\t"),
                '\x0b' => out.push_str("\\v"),
                '\x1b' => out.push_str("\\e"),
                '\x0c' => out.push_str("\\f"),
                '"' => out.push_str("\\\""),
                '\\' => out.push_str("\\\\"),
                '$' => out.push_str("\\$"),
                c if c.is_ascii_control() => out.push_str(&format!("\\x{:02x}", c as u32)),
                c => out.push(c),
            }
        }
        for b in chunk.invalid() {
            out.push_str(&format!("\\x{b:02x}"));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Field, FuncType, Param, Type, Visibility};

    /// Decode a double-quoted PHP literal the way the PHP lexer does for
    /// the escapes the printer produces.
    fn unquote(s: &str) -> Vec<u8> {
        let inner = s.strip_prefix('"').and_then(|s| s.strip_suffix('"')).unwrap();
        let mut out = Vec::new();
        let mut chars = inner.chars();
        while let Some(c) = chars.next() {
            if c != '\\' {
                let mut buf = [0; 4];
                out.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
                continue;
            }
            match chars.next().unwrap() {
                'n' => out.push(b'\n'),
                'r' => out.push(b'\r'),
                't' => out.push(b'\t'),
                'v' => out.push(0x0b),
                'e' => out.push(0x1b),
                'f' => out.push(0x0c),
                '"' => out.push(b'"'),
                '\\' => out.push(b'\\'),
                '$' => out.push(b'$'),
                'x' => {
                    let hex: String = chars.by_ref().take(2).collect();
                    out.push(u8::from_str_radix(&hex, 16).unwrap());
                }
                other => panic!("unexpected escape \\{other}"),
            }
        }
        out
    }

    fn render(n: &Node) -> String {
        let mut e = Emitter::new();
        n.emit(&mut e);
        e.output
    }

    #[test]
    fn test_escape_every_byte() {
        for b in 0..=255u8 {
            let quoted = quote_string(&[b]);
            assert_eq!(unquote(&quoted), vec![b], "byte {b:#04x} printed as {quoted}");
            assert!(quoted[1..quoted.len() - 1].chars().all(|c| !c.is_control()));
        }
        let all: Vec<u8> = (0..=255u8).collect();
        assert_eq!(unquote(&quote_string(&all)), all);
    }

    #[test]
    fn test_escape_keeps_utf8() {
        assert_eq!(quote_string("привет".as_bytes()), "\"привет\"");
        assert_eq!(quote_string(b"a$b"), "\"a\\$b\"");
        assert_eq!(quote_string(b"\xe2\x82"), "\"\\xe2\\x82\"");
    }

    #[test]
    fn test_float_literals() {
        assert_eq!(format_float(0.0), "0.0");
        assert_eq!(format_float(-0.0), "-0.0");
        assert_eq!(format_float(f64::NAN), "NAN");
        assert_eq!(format_float(f64::INFINITY), "INF");
        assert_eq!(format_float(f64::NEG_INFINITY), "-INF");
        assert_eq!(format_float(1.5), "1.5");
        assert_eq!(format_float(100.0), "100.0");
        assert_eq!(format_float(5e-324), "5e-324");
    }

    #[test]
    fn test_expressions() {
        let x = Node::var("v0", Type::INT);
        let sum = Node::binary(Op::Add, x.clone(), Node::parens(Node::int_lit(-1)));
        assert_eq!(render(&sum), "$v0 + (-1)");
        assert_eq!(render(&Node::cast(Type::INT, Node::parens(sum))), "(int)($v0 + (-1))");
        assert_eq!(
            render(&Node::unary(Op::Negation, Node::int_lit(-1))),
            "- -1"
        );
        let call = Node::call("fuzz_dump", vec![Node::name("__LINE__"), x.clone()]);
        assert_eq!(render(&call), "fuzz_dump(__LINE__, $v0)");
        let m = Node::method_call(Node::parens(Node::new_object("C1")), "m0", vec![x]);
        assert_eq!(render(&m), "(new C1())->m0($v0)");
        let s = Node::new(
            Op::InterpolatedString,
            vec![Node::string_lit("a\n"), Node::var("v1", Type::STRING)],
        );
        assert_eq!(render(&s), "\"a\\n{$v1}\"");
        let compound = Node::assign_modify(Op::Concat, Node::var("s", Type::STRING), Node::string_lit("x"));
        assert_eq!(render(&compound), "$s .= \"x\"");
    }

    #[test]
    fn test_statement_layout() {
        let c = Node::var("_c0", Type::INT);
        let cond = Node::binary(Op::Less, Node::unary(Op::PostInc, c), Node::int_lit(3));
        let body = Node::block(vec![Node::new(Op::Break, Vec::new())]);
        let lp = Node::new(Op::DoWhile, vec![body, cond]);
        assert_eq!(render(&lp), "\ndo {\n  break;\n} while ($_c0++ < 3);");

        let sw = Node::new(
            Op::Switch,
            vec![
                Node::var("v0", Type::INT),
                Node::new(Op::Case, vec![Node::int_lit(1), Node::new(Op::Break, Vec::new())]),
                Node::new(Op::Default, Vec::new()),
            ],
        );
        assert_eq!(
            render(&sw),
            "\nswitch ($v0) {\n  case 1:\n    break;\n  default:\n}"
        );
    }

    #[test]
    fn test_file() {
        let mut param = Param::new("p0", Type::INT);
        param.default = Some(Node::int_lit(5));
        let func = FuncType::new("lib0_f0", vec![param], Type::INT);
        let decl = FuncDecl {
            tags: vec![
                crate::tree::DocTag::new("@param", "int $p0"),
                crate::tree::DocTag::new("@return", "int"),
            ],
            ty: func,
            body: vec![Node::ret(Node::var("p0", Type::INT))],
        };
        let class = ClassType::new(
            "C0".to_string(),
            vec![Field {
                name: "f0".to_string(),
                ty: Type::nullable(Type::STRING),
                init: Some(Node::null()),
                visibility: Visibility::Private,
            }],
            Vec::new(),
        );
        let mut file = File::new("lib0.php");
        file.nodes.push(RootNode::Require {
            path: "fuzzlib.php".to_string(),
        });
        file.nodes.push(RootNode::ClassDecl {
            ty: class,
            methods: Vec::new(),
        });
        file.nodes.push(RootNode::FuncDecl(decl));

        let expected = "<?php\n\n\
            require_once __DIR__ . '/fuzzlib.php';\n\n\
            class C0 {\n  /** @var ?string */\n  private $f0 = null;\n}\n\n\
            /**\n * @param int $p0\n * @return int\n */\n\
            function lib0_f0($p0 = 5) {\n  return $p0;\n}\n";
        assert_eq!(print_file(&file), expected);
    }
}
