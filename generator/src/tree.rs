use crate::types::{ClassType, FuncType, Literal, Type};

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Op {
    // Statements.
    Break,
    Continue,
    If,
    IfElse,
    While,
    DoWhile,
    Block,
    Return,
    ReturnVoid,
    Echo,
    Switch,
    Case,
    Default,

    // Expressions.
    Parens,
    Assign,
    /// Compound assignment; the binary operator is the node payload.
    AssignModify,
    Null,
    BoolLit,
    IntLit,
    FloatLit,
    StringLit,
    InterpolatedString,
    ArrayLit,
    TupleLit,
    Var,
    Name,
    New,
    Prop,
    MethodCall,
    Index,
    Call,
    Cast,
    Ternary,
    NullCoalesce,

    Not,
    Negation,
    UnaryPlus,
    BitNot,
    PreInc,
    PreDec,
    PostInc,
    PostDec,

    Concat,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Exp,
    And,
    AndWord,
    Or,
    OrWord,
    XorWord,
    BitAnd,
    BitOr,
    BitXor,
    ShiftLeft,
    ShiftRight,

    Equal2,
    Equal3,
    NotEqual2,
    NotEqual3,
    Less,
    LessOrEqual,
    Greater,
    GreaterOrEqual,
    Spaceship,
}

impl Op {
    pub fn is_stmt(self) -> bool {
        matches!(
            self,
            Op::Break
                | Op::Continue
                | Op::If
                | Op::IfElse
                | Op::While
                | Op::DoWhile
                | Op::Block
                | Op::Return
                | Op::ReturnVoid
                | Op::Echo
                | Op::Switch
                | Op::Case
                | Op::Default
        )
    }

    /// Source token for unary and binary operators.
    pub fn token(self) -> Option<&'static str> {
        let s = match self {
            Op::Not => "!",
            Op::Negation => "-",
            Op::UnaryPlus => "+",
            Op::BitNot => "~",
            Op::PreInc | Op::PostInc => "++",
            Op::PreDec | Op::PostDec => "--",
            Op::Concat => ".",
            Op::Add => "+",
            Op::Sub => "-",
            Op::Mul => "*",
            Op::Div => "/",
            Op::Mod => "%",
            Op::Exp => "**",
            Op::And => "&&",
            Op::AndWord => "and",
            Op::Or => "||",
            Op::OrWord => "or",
            Op::XorWord => "xor",
            Op::BitAnd => "&",
            Op::BitOr => "|",
            Op::BitXor => "^",
            Op::ShiftLeft => "<<",
            Op::ShiftRight => ">>",
            Op::Equal2 => "==",
            Op::Equal3 => "===",
            Op::NotEqual2 => "!=",
            Op::NotEqual3 => "!==",
            Op::Less => "<",
            Op::LessOrEqual => "<=",
            Op::Greater => ">",
            Op::GreaterOrEqual => ">=",
            Op::Spaceship => "<=>",
            Op::NullCoalesce => "??",
            Op::Assign => "=",
            _ => return None,
        };
        Some(s)
    }

    pub fn is_binary(self) -> bool {
        matches!(
            self,
            Op::Concat
                | Op::Add
                | Op::Sub
                | Op::Mul
                | Op::Div
                | Op::Mod
                | Op::Exp
                | Op::And
                | Op::AndWord
                | Op::Or
                | Op::OrWord
                | Op::XorWord
                | Op::BitAnd
                | Op::BitOr
                | Op::BitXor
                | Op::ShiftLeft
                | Op::ShiftRight
                | Op::Equal2
                | Op::Equal3
                | Op::NotEqual2
                | Op::NotEqual3
                | Op::Less
                | Op::LessOrEqual
                | Op::Greater
                | Op::GreaterOrEqual
                | Op::Spaceship
                | Op::NullCoalesce
        )
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Payload {
    Lit(Literal),
    Ident(String),
    Op(Op),
}

#[derive(Clone, Debug, PartialEq)]
pub struct Node {
    pub op: Op,
    pub args: Vec<Node>,
    pub value: Option<Payload>,
    pub ty: Option<Type>,
}

impl Node {
    pub fn new(op: Op, args: Vec<Node>) -> Self {
        Self {
            op,
            args,
            value: None,
            ty: None,
        }
    }

    pub fn with_type(mut self, ty: Type) -> Self {
        self.ty = Some(ty);
        self
    }

    pub fn lit(lit: Literal) -> Self {
        let op = match lit {
            Literal::Bool(_) => Op::BoolLit,
            Literal::Int(_) => Op::IntLit,
            Literal::Float(_) => Op::FloatLit,
            Literal::String(_) => Op::StringLit,
        };
        let ty = Type::Scalar(lit.kind());
        Self {
            op,
            args: Vec::new(),
            value: Some(Payload::Lit(lit)),
            ty: Some(ty),
        }
    }

    pub fn bool_lit(v: bool) -> Self {
        Self::lit(Literal::Bool(v))
    }

    pub fn int_lit(v: i64) -> Self {
        Self::lit(Literal::Int(v))
    }

    pub fn float_lit(v: f64) -> Self {
        Self::lit(Literal::Float(v))
    }

    pub fn string_lit(v: impl Into<Vec<u8>>) -> Self {
        Self::lit(Literal::String(v.into()))
    }

    pub fn null() -> Self {
        Self::new(Op::Null, Vec::new())
    }

    pub fn var(name: impl Into<String>, ty: Type) -> Self {
        Self {
            op: Op::Var,
            args: Vec::new(),
            value: Some(Payload::Ident(name.into())),
            ty: Some(ty),
        }
    }

    pub fn name(name: impl Into<String>) -> Self {
        Self {
            op: Op::Name,
            args: Vec::new(),
            value: Some(Payload::Ident(name.into())),
            ty: None,
        }
    }

    pub fn parens(x: Node) -> Self {
        let ty = x.ty.clone();
        Self {
            ty,
            ..Self::new(Op::Parens, vec![x])
        }
    }

    pub fn unary(op: Op, x: Node) -> Self {
        Self::new(op, vec![x])
    }

    pub fn binary(op: Op, x: Node, y: Node) -> Self {
        Self::new(op, vec![x, y])
    }

    pub fn assign(lhs: Node, rhs: Node) -> Self {
        Self::new(Op::Assign, vec![lhs, rhs])
    }

    pub fn assign_modify(op: Op, lhs: Node, rhs: Node) -> Self {
        Self {
            value: Some(Payload::Op(op)),
            ..Self::new(Op::AssignModify, vec![lhs, rhs])
        }
    }

    pub fn cast(ty: Type, x: Node) -> Self {
        Self::new(Op::Cast, vec![x]).with_type(ty)
    }

    /// `args[0]` is the callee (a `Name`), the rest are arguments.
    pub fn call(name: impl Into<String>, args: Vec<Node>) -> Self {
        let mut all = Vec::with_capacity(args.len() + 1);
        all.push(Node::name(name));
        all.extend(args);
        Self::new(Op::Call, all)
    }

    pub fn method_call(receiver: Node, method: impl Into<String>, args: Vec<Node>) -> Self {
        let mut all = Vec::with_capacity(args.len() + 1);
        all.push(receiver);
        all.extend(args);
        Self {
            value: Some(Payload::Ident(method.into())),
            ..Self::new(Op::MethodCall, all)
        }
    }

    pub fn prop(receiver: Node, field: impl Into<String>) -> Self {
        Self {
            value: Some(Payload::Ident(field.into())),
            ..Self::new(Op::Prop, vec![receiver])
        }
    }

    pub fn new_object(class: impl Into<String>) -> Self {
        Self {
            value: Some(Payload::Ident(class.into())),
            ..Self::new(Op::New, Vec::new())
        }
    }

    pub fn index(x: Node, key: Node) -> Self {
        Self::new(Op::Index, vec![x, key])
    }

    pub fn ternary(cond: Node, x: Node, y: Node) -> Self {
        Self::new(Op::Ternary, vec![cond, x, y])
    }

    pub fn block(stmts: Vec<Node>) -> Self {
        Self::new(Op::Block, stmts)
    }

    pub fn if_stmt(cond: Node, body: Node) -> Self {
        Self::new(Op::If, vec![cond, body])
    }

    pub fn if_else(cond: Node, then: Node, otherwise: Node) -> Self {
        Self::new(Op::IfElse, vec![cond, then, otherwise])
    }

    pub fn ret(x: Node) -> Self {
        Self::new(Op::Return, vec![x])
    }

    pub fn ident(&self) -> Option<&str> {
        match &self.value {
            Some(Payload::Ident(s)) => Some(s),
            _ => None,
        }
    }

    pub fn literal(&self) -> Option<&Literal> {
        match &self.value {
            Some(Payload::Lit(lit)) => Some(lit),
            _ => None,
        }
    }

    /// The constant value of a literal node, looking through parentheses,
    /// casts of literals and unary minus/plus on numeric literals.
    pub fn extract_value(&self) -> Option<Literal> {
        match self.op {
            Op::BoolLit | Op::IntLit | Op::FloatLit | Op::StringLit => self.literal().cloned(),
            Op::Parens => self.args[0].extract_value(),
            Op::UnaryPlus => match self.args[0].extract_value()? {
                lit @ (Literal::Int(_) | Literal::Float(_)) => Some(lit),
                _ => None,
            },
            Op::Negation => match self.args[0].extract_value()? {
                Literal::Int(v) => v.checked_neg().map(Literal::Int),
                Literal::Float(v) => Some(Literal::Float(-v)),
                _ => None,
            },
            _ => None,
        }
    }

    /// Pre-order walk over the subtree.
    pub fn walk(&self, visit: &mut dyn FnMut(&Node)) {
        visit(self);
        for arg in &self.args {
            arg.walk(visit);
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct DocTag {
    pub name: String,
    pub value: String,
}

impl DocTag {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct FuncDecl {
    pub ty: FuncType,
    pub tags: Vec<DocTag>,
    pub body: Vec<Node>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum RootNode {
    Require { path: String },
    Stmt(Node),
    FuncDecl(FuncDecl),
    ClassDecl { ty: ClassType, methods: Vec<FuncDecl> },
}

#[derive(Clone, Debug, PartialEq)]
pub struct File {
    pub name: String,
    pub nodes: Vec<RootNode>,
}

impl File {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            nodes: Vec::new(),
        }
    }

    /// Every function body in the file, including methods.
    pub fn bodies(&self) -> impl Iterator<Item = &FuncDecl> {
        self.nodes.iter().flat_map(|n| match n {
            RootNode::FuncDecl(f) => std::slice::from_ref(f).iter(),
            RootNode::ClassDecl { methods, .. } => methods.iter(),
            _ => (&[] as &[FuncDecl]).iter(),
        })
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct RuntimeFile {
    pub name: &'static str,
    pub contents: &'static str,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Program {
    pub runtime_files: Vec<RuntimeFile>,
    pub files: Vec<File>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_value() {
        assert_eq!(Node::int_lit(5).extract_value(), Some(Literal::Int(5)));
        let neg = Node::unary(Op::Negation, Node::parens(Node::int_lit(5)));
        assert_eq!(neg.extract_value(), Some(Literal::Int(-5)));
        let min = Node::unary(Op::Negation, Node::int_lit(i64::MIN));
        assert_eq!(min.extract_value(), None);
        assert_eq!(Node::var("x", Type::INT).extract_value(), None);
        let neg_str = Node::unary(Op::Negation, Node::string_lit("a"));
        assert_eq!(neg_str.extract_value(), None);
    }

    #[test]
    fn test_call_layout() {
        let call = Node::call("strlen", vec![Node::string_lit("abc")]);
        assert_eq!(call.args.len(), 2);
        assert_eq!(call.args[0].ident(), Some("strlen"));
    }
}
