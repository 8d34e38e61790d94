use rand::Rng;

use crate::generator::Generator;
use crate::tree::{Node, Op};
use crate::types::{ClassRef, FuncId, Literal, ScalarKind, Type, Visibility};

/// Result category of a weighted expression list.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Category {
    Cond,
    Bool,
    Int,
    Float,
    String,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum ExprKind {
    Compare(Op),
    Spaceship,
    Logical(Op),
    Not,
    Var(ScalarKind),
    Lit(ScalarKind),
    Call(ScalarKind),
    Field(ScalarKind),
    TupleElem(ScalarKind),
    NullCoalesce(ScalarKind),
    Ternary(ScalarKind),
    Cast(ScalarKind),
    IntArith(Op),
    IntBits(Op),
    Shift(Op),
    IntUnary(Op),
    IntExp,
    SafeDiv(ScalarKind),
    SafeMod,
    FloatArith(Op),
    Concat,
    Interpolated,
    StringIndex,
}

#[derive(Copy, Clone, Debug)]
struct Choice {
    freq: u16,
    kind: ExprKind,
    fallback: Option<ExprKind>,
}

const fn choice(freq: u16, kind: ExprKind) -> Choice {
    Choice {
        freq,
        kind,
        fallback: None,
    }
}

const fn choice_or(freq: u16, kind: ExprKind, fallback: ExprKind) -> Choice {
    Choice {
        freq,
        kind,
        fallback: Some(fallback),
    }
}

/// Weighted options expanded into an index multiset, so a draw is a
/// single uniform sample.
pub struct ChoiceList {
    index_map: Vec<u16>,
    options: Vec<Choice>,
    fallback: ScalarKind,
}

impl ChoiceList {
    fn new(fallback: ScalarKind, options: Vec<Choice>) -> Self {
        let mut index_map = Vec::with_capacity(options.len() * 4);
        for (i, o) in options.iter().enumerate() {
            index_map.extend(std::iter::repeat(i as u16).take(o.freq as usize));
        }
        assert!(!index_map.is_empty(), "empty choice list");
        Self {
            index_map,
            options,
            fallback,
        }
    }

    fn draw<R: Rng>(&self, rng: &mut R) -> Choice {
        let slot = rng.random_range(0..self.index_map.len());
        self.options[self.index_map[slot] as usize]
    }
}

pub struct ChoiceTables {
    cond: ChoiceList,
    boolean: ChoiceList,
    int: ChoiceList,
    float: ChoiceList,
    string: ChoiceList,
}

impl ChoiceTables {
    pub fn new() -> Self {
        use ExprKind::*;
        use ScalarKind as K;

        let cond = ChoiceList::new(
            K::Bool,
            vec![
                choice(3, Compare(Op::Equal2)),
                choice(3, Compare(Op::Equal3)),
                choice(1, Compare(Op::NotEqual2)),
                choice(2, Compare(Op::Less)),
                choice(1, Compare(Op::GreaterOrEqual)),
                choice(4, Logical(Op::And)),
                choice(4, Logical(Op::Or)),
                choice(4, Not),
                choice_or(5, Var(K::Bool), Lit(K::Bool)),
                choice(6, Call(K::Bool)),
                choice(1, Field(K::Bool)),
                choice(1, Lit(K::Bool)),
            ],
        );

        let boolean = ChoiceList::new(
            K::Bool,
            vec![
                choice(1, Compare(Op::Equal2)),
                choice(1, Compare(Op::Equal3)),
                choice(1, Compare(Op::NotEqual3)),
                choice(1, Compare(Op::Greater)),
                choice(1, Compare(Op::LessOrEqual)),
                choice(3, Logical(Op::And)),
                choice(3, Logical(Op::Or)),
                choice(1, Logical(Op::AndWord)),
                choice(1, Logical(Op::OrWord)),
                choice(1, Logical(Op::XorWord)),
                choice(4, Not),
                choice_or(6, Var(K::Bool), Lit(K::Bool)),
                choice(3, Lit(K::Bool)),
                choice(4, Call(K::Bool)),
                choice(1, Field(K::Bool)),
                choice(1, TupleElem(K::Bool)),
                choice(1, NullCoalesce(K::Bool)),
                choice(1, Cast(K::Bool)),
            ],
        );

        let int = ChoiceList::new(
            K::Int,
            vec![
                choice(1, Ternary(K::Int)),
                choice(2, IntArith(Op::Add)),
                choice(2, IntArith(Op::Sub)),
                choice(1, IntArith(Op::Mul)),
                choice(1, IntBits(Op::BitAnd)),
                choice(1, IntBits(Op::BitOr)),
                choice(1, IntBits(Op::BitXor)),
                choice(1, Shift(Op::ShiftLeft)),
                choice(1, Shift(Op::ShiftRight)),
                choice(1, IntExp),
                choice(1, SafeDiv(K::Int)),
                choice(1, SafeMod),
                choice(2, IntUnary(Op::Negation)),
                choice(1, IntUnary(Op::BitNot)),
                choice(1, IntUnary(Op::UnaryPlus)),
                choice(1, Spaceship),
                choice(2, Cast(K::Int)),
                choice(7, Call(K::Int)),
                choice(4, Lit(K::Int)),
                choice_or(6, Var(K::Int), Lit(K::Int)),
                choice(2, Field(K::Int)),
                choice(1, TupleElem(K::Int)),
                choice(1, NullCoalesce(K::Int)),
            ],
        );

        let float = ChoiceList::new(
            K::Float,
            vec![
                choice(1, Ternary(K::Float)),
                choice(2, FloatArith(Op::Add)),
                choice(2, FloatArith(Op::Sub)),
                choice(1, FloatArith(Op::Mul)),
                choice(1, SafeDiv(K::Float)),
                choice(1, Cast(K::Float)),
                choice(5, Call(K::Float)),
                choice_or(6, Var(K::Float), Lit(K::Float)),
                choice(5, Lit(K::Float)),
                choice(2, Field(K::Float)),
                choice(1, TupleElem(K::Float)),
                choice(1, NullCoalesce(K::Float)),
            ],
        );

        let string = ChoiceList::new(
            K::String,
            vec![
                choice(1, Ternary(K::String)),
                choice(2, Cast(K::String)),
                choice(5, Call(K::String)),
                choice(4, Concat),
                choice(5, Lit(K::String)),
                choice(5, Interpolated),
                choice_or(6, Var(K::String), Lit(K::String)),
                choice_or(2, StringIndex, Interpolated),
                choice(2, Field(K::String)),
                choice(1, TupleElem(K::String)),
                choice(1, NullCoalesce(K::String)),
            ],
        );

        Self {
            cond,
            boolean,
            int,
            float,
            string,
        }
    }

    fn list(&self, category: Category) -> &ChoiceList {
        match category {
            Category::Cond => &self.cond,
            Category::Bool => &self.boolean,
            Category::Int => &self.int,
            Category::Float => &self.float,
            Category::String => &self.string,
        }
    }
}

impl Default for ChoiceTables {
    fn default() -> Self {
        Self::new()
    }
}

fn category_of(kind: ScalarKind) -> Category {
    match kind {
        ScalarKind::Bool => Category::Bool,
        ScalarKind::Int => Category::Int,
        ScalarKind::Float => Category::Float,
        ScalarKind::String => Category::String,
        ScalarKind::Void | ScalarKind::Mixed => panic!("no expression category for {}", kind.as_str()),
    }
}

/// `**` binds tighter than casts and unary minus, so only primaries are
/// left bare.
fn exp_operand(n: Node) -> Node {
    let bare = match n.op {
        Op::Var | Op::Parens | Op::Call | Op::MethodCall | Op::Prop | Op::Index => true,
        Op::IntLit => matches!(n.literal(), Some(Literal::Int(v)) if *v >= 0),
        _ => false,
    };
    if bare {
        n
    } else {
        Node::parens(n)
    }
}

impl<R: Rng> Generator<R> {
    pub fn cond_value(&mut self) -> Node {
        self.choose_expr(Category::Cond)
    }

    pub fn bool_value(&mut self) -> Node {
        self.choose_expr(Category::Bool)
    }

    pub fn int_value(&mut self) -> Node {
        self.choose_expr(Category::Int)
    }

    pub fn float_value(&mut self) -> Node {
        self.choose_expr(Category::Float)
    }

    pub fn string_value(&mut self) -> Node {
        self.choose_expr(Category::String)
    }

    pub(crate) fn choose_expr(&mut self, category: Category) -> Node {
        let fallback = self.choices.list(category).fallback;
        if self.expr_depth > self.config.max_expr_depth {
            return self.literal_of(fallback);
        }
        let choice = self.choices.list(category).draw(&mut self.rng);

        self.expr_depth += 1;
        let n = match self.generate_kind(choice.kind) {
            Some(n) => n,
            None => match choice.fallback.and_then(|k| self.generate_kind(k)) {
                Some(n) => n,
                None => self.literal_of(fallback),
            },
        };
        self.expr_depth -= 1;

        if self.chance(self.config.p_paren) {
            Node::parens(n)
        } else {
            n
        }
    }

    fn generate_kind(&mut self, kind: ExprKind) -> Option<Node> {
        match kind {
            ExprKind::Compare(op) => Some(self.compare(op)),
            ExprKind::Spaceship => {
                let ty = self.pick_scalar_type();
                let x = self.generate_value_of_type(&ty);
                let y = self.generate_value_of_type(&ty);
                Some(self.binary(Op::Spaceship, x, y))
            }
            ExprKind::Logical(op) => {
                let x = self.bool_value();
                let y = self.bool_value();
                let n = self.binary(op, x, y);
                // Word operators bind looser than `=`.
                Some(match op {
                    Op::AndWord | Op::OrWord | Op::XorWord => Node::parens(n),
                    _ => n,
                })
            }
            ExprKind::Not => {
                let x = self.cond_value();
                Some(Node::unary(Op::Not, self.maybe_add_parens(x)))
            }
            ExprKind::Var(kind) => self.scalar_var(kind),
            ExprKind::Lit(kind) => Some(self.literal_of(kind)),
            ExprKind::Call(kind) => self.call_of_type(&Type::Scalar(kind)),
            ExprKind::Field(kind) => self.field_of_type(&Type::Scalar(kind)),
            ExprKind::TupleElem(kind) => self.tuple_elem(kind),
            ExprKind::NullCoalesce(kind) => self.null_coalesce(kind),
            ExprKind::Ternary(kind) => Some(self.ternary(kind)),
            ExprKind::Cast(kind) => {
                let x = self.mixed_value(false);
                Some(Node::cast(Type::Scalar(kind), self.maybe_add_parens(x)))
            }
            ExprKind::IntArith(op) => {
                let x = self.int_value();
                let y = self.int_value();
                let n = self.binary(op, x, y);
                Some(Node::cast(Type::INT, Node::parens(n)))
            }
            ExprKind::IntBits(op) => {
                let x = self.int_value();
                let y = self.int_value();
                Some(self.binary(op, x, y))
            }
            ExprKind::Shift(op) => {
                // Negative shift counts throw.
                let x = self.int_value();
                let y = self.int_value();
                let count = Node::binary(Op::BitAnd, self.maybe_add_parens(y), Node::int_lit(63));
                Some(Node::binary(op, self.maybe_add_parens(x), Node::parens(count)))
            }
            ExprKind::IntUnary(op) => {
                let x = self.int_value();
                Some(Node::unary(op, self.maybe_add_parens(x)))
            }
            ExprKind::IntExp => {
                let x = self.int_value();
                let y = self.int_value();
                let n = Node::binary(Op::Exp, exp_operand(x), exp_operand(y));
                Some(Node::cast(Type::INT, Node::parens(n)))
            }
            ExprKind::SafeDiv(kind) => {
                let ty = Type::Scalar(kind);
                let x = self.generate_value_of_type(&ty);
                let y = self.generate_value_of_type(&ty);
                Some(Node::cast(ty, Node::call("fuzz_safe_div", vec![x, y])))
            }
            ExprKind::SafeMod => {
                let x = self.int_value();
                let y = self.int_value();
                Some(Node::cast(Type::INT, Node::call("fuzz_safe_mod", vec![x, y])))
            }
            ExprKind::FloatArith(op) => {
                let x = self.float_value();
                let y = self.float_value();
                Some(self.binary(op, x, y))
            }
            ExprKind::Concat => {
                let x = self.string_value();
                let y = self.string_value();
                Some(self.binary(Op::Concat, x, y))
            }
            ExprKind::Interpolated => Some(self.interpolated_string()),
            ExprKind::StringIndex => self.string_index(),
        }
    }

    fn binary(&self, op: Op, x: Node, y: Node) -> Node {
        Node::binary(op, self.maybe_add_parens(x), self.maybe_add_parens(y))
    }

    /// Equality on floats goes through an epsilon helper.
    fn compare(&mut self, op: Op) -> Node {
        let ty = self.pick_scalar_type();
        let x = self.generate_value_of_type(&ty);
        let y = self.generate_value_of_type(&ty);
        if ty == Type::FLOAT {
            match op {
                Op::Equal2 | Op::Equal3 => return Node::call("fuzz_float_eq", vec![x, y]),
                Op::NotEqual2 | Op::NotEqual3 => {
                    return Node::unary(Op::Not, Node::call("fuzz_float_eq", vec![x, y]));
                }
                _ => {}
            }
        }
        self.binary(op, x, y)
    }

    fn ternary(&mut self, kind: ScalarKind) -> Node {
        let cond = self.cond_value();
        let ty = Type::Scalar(kind);
        let mut x = self.generate_value_of_type(&ty);
        let mut y = self.generate_value_of_type(&ty);
        if self.chance(0.5) {
            x = Node::parens(x);
        }
        if self.chance(0.5) {
            y = Node::parens(y);
        }
        let cond = self.maybe_add_parens(cond);
        Node::parens(Node::ternary(cond, x, y))
    }

    pub(crate) fn literal_of(&mut self, kind: ScalarKind) -> Node {
        match kind {
            ScalarKind::Bool => Node::bool_lit(self.values.bool_value(&mut self.rng)),
            ScalarKind::Int => Node::int_lit(self.values.int_value(&mut self.rng)),
            ScalarKind::Float => Node::float_lit(self.values.float_value(&mut self.rng)),
            ScalarKind::String => Node::string_lit(self.values.string_value(&mut self.rng)),
            ScalarKind::Mixed => {
                let kind = self.pick_scalar_type().scalar_kind().unwrap_or(ScalarKind::Int);
                self.literal_of(kind)
            }
            ScalarKind::Void => panic!("no literal of type void"),
        }
    }

    /// A visible variable holding values of `kind`: the scalar itself or an
    /// enum over it.
    fn scalar_var(&mut self, kind: ScalarKind) -> Option<Node> {
        let v = self.scope.find_var(|v| match &v.ty {
            Type::Scalar(k) => *k == kind,
            Type::Enum(e) => e.value_kind == kind,
            _ => false,
        })?;
        Some(Node::var(v.name.clone(), v.ty.clone()))
    }

    pub(crate) fn var_of_type(&self, ty: &Type) -> Option<Node> {
        let v = self.scope.find_var_of_type(ty)?;
        Some(Node::var(v.name.clone(), v.ty.clone()))
    }

    pub(crate) fn mixed_value(&mut self, permit_array: bool) -> Node {
        let max_roll = if permit_array && self.expr_depth < self.config.max_expr_depth {
            4
        } else {
            3
        };
        match self.rng.random_range(0..=max_roll) {
            0 => self.bool_value(),
            1 => self.int_value(),
            2 => self.float_value(),
            3 => self.string_value(),
            _ => {
                let elem = self.pick_scalar_type();
                self.array_value(&elem)
            }
        }
    }

    fn array_value(&mut self, elem: &Type) -> Node {
        self.expr_depth += 1;
        let max_elems = if self.expr_depth >= self.config.max_expr_depth {
            2
        } else {
            4
        };
        let n = self.range(1, max_elems);
        let elems = (0..n).map(|_| self.generate_value_of_type(elem)).collect();
        self.expr_depth -= 1;
        Node::new(Op::ArrayLit, elems).with_type(Type::array_of(elem.clone()))
    }

    /// An expression whose static type is exactly `ty`.
    pub fn generate_value_of_type(&mut self, ty: &Type) -> Node {
        match ty {
            Type::Scalar(kind) => match kind {
                ScalarKind::Mixed => self.mixed_value(true),
                ScalarKind::Void => panic!("unexpected void value"),
                _ => self.choose_expr(category_of(*kind)),
            },
            Type::Enum(e) => {
                if self.chance(0.6) {
                    if let Some(v) = self.var_of_type(ty) {
                        return v;
                    }
                }
                Node::lit(e.values[self.rng.random_range(0..e.values.len())].clone())
            }
            Type::Array(elem) => {
                if self.chance(0.4) {
                    if let Some(v) = self.var_of_type(ty) {
                        return v;
                    }
                }
                self.array_value(elem)
            }
            Type::Tuple(elems) => {
                if self.chance(0.5) {
                    if let Some(v) = self.var_of_type(ty) {
                        return v;
                    }
                }
                self.expr_depth += 1;
                let args = elems.iter().map(|e| self.generate_value_of_type(e)).collect();
                self.expr_depth -= 1;
                Node::new(Op::TupleLit, args).with_type(ty.clone())
            }
            Type::Class(class) => {
                if self.chance(0.5) {
                    if let Some(v) = self.var_of_type(ty) {
                        return v;
                    }
                }
                Node::new_object(class.name.clone()).with_type(ty.clone())
            }
            Type::Nullable(inner) => {
                let roll = self.rng.random_range(0..10);
                if roll < 3 {
                    return Node::null().with_type(ty.clone());
                }
                if roll < 6 {
                    if let Some(v) = self.var_of_type(ty) {
                        return v;
                    }
                }
                self.generate_value_of_type(inner)
            }
            Type::Union(x, y) => {
                if self.chance(0.4) {
                    if let Some(v) = self.var_of_type(ty) {
                        return v;
                    }
                }
                if self.chance(0.5) {
                    self.generate_value_of_type(x)
                } else {
                    self.generate_value_of_type(y)
                }
            }
            Type::Func(_) => panic!("unexpected {ty} value"),
        }
    }

    /// A literal of type `ty`, usable where the language wants a constant
    /// expression.
    pub fn generate_const_value_of_type(&mut self, ty: &Type) -> Node {
        match ty {
            Type::Scalar(kind) => self.literal_of(*kind),
            Type::Enum(e) => Node::lit(e.values[self.rng.random_range(0..e.values.len())].clone()),
            Type::Array(elem) => {
                let n = self.range(0, 3);
                let elems = (0..n).map(|_| self.generate_const_value_of_type(elem)).collect();
                Node::new(Op::ArrayLit, elems).with_type(ty.clone())
            }
            Type::Nullable(inner) => {
                if self.chance(0.3) {
                    Node::null().with_type(ty.clone())
                } else {
                    self.generate_const_value_of_type(inner)
                }
            }
            Type::Union(x, y) => {
                if self.chance(0.5) {
                    self.generate_const_value_of_type(x)
                } else {
                    self.generate_const_value_of_type(y)
                }
            }
            Type::Tuple(_) | Type::Class(_) | Type::Func(_) => {
                panic!("no constant value of type {ty}")
            }
        }
    }

    /// Receiver for a member of `class`: `$this`, a variable, or a fresh object.
    fn receiver(&mut self, class: &ClassRef) -> Node {
        let ty = Type::Class(class.clone());
        if self.current_class.as_ref() == Some(class) {
            return Node::var("this", ty);
        }
        if self.chance(0.7) {
            if let Some(v) = self.var_of_type(&ty) {
                return v;
            }
        }
        Node::parens(Node::new_object(class.name.clone()).with_type(ty))
    }

    /// A call to a registered function or method returning exactly `ty`.
    pub(crate) fn call_of_type(&mut self, ty: &Type) -> Option<Node> {
        let funcs = self.symtab.find_funcs_of_type(ty);
        if funcs.is_empty() {
            return None;
        }
        let id = funcs[self.rng.random_range(0..funcs.len())];
        Some(self.call(id))
    }

    pub(crate) fn call(&mut self, id: FuncId) -> Node {
        let func = self.symtab.func(id).clone();

        self.expr_depth += 1;
        let n_args = self.range(func.min_args, func.params.len());
        let mut args = Vec::with_capacity(n_args);
        for param in &func.params[..n_args] {
            let arg = self.generate_value_of_type(&param.ty);
            if param.must_cast {
                args.push(Node::cast(param.ty.clone(), self.maybe_add_parens(arg)));
            } else {
                args.push(arg);
            }
        }
        self.expr_depth -= 1;

        let n = match &func.class {
            Some(class) => {
                let receiver = self.receiver(class);
                Node::method_call(receiver, func.name.clone(), args)
            }
            None => Node::call(func.name.clone(), args),
        };
        n.with_type(func.result)
    }

    fn field_accessible(&self, class: &ClassRef, visibility: Visibility) -> bool {
        visibility == Visibility::Public || self.current_class.as_ref() == Some(class)
    }

    /// A readable field of type `ty` on some object.
    pub(crate) fn field_of_type(&mut self, ty: &Type) -> Option<Node> {
        let candidates: Vec<_> = self
            .symtab
            .find_fields_of_type(ty)
            .iter()
            .copied()
            .filter(|r| {
                let class = self.symtab.class_ref(r.class);
                self.field_accessible(&class, self.symtab.field(*r).visibility)
            })
            .collect();
        if candidates.is_empty() {
            return None;
        }
        let r = candidates[self.rng.random_range(0..candidates.len())];
        let class = self.symtab.class_ref(r.class);
        let name = self.symtab.field(r).name.clone();
        let receiver = self.receiver(&class);
        Some(Node::prop(receiver, name).with_type(ty.clone()))
    }

    fn tuple_elem(&mut self, kind: ScalarKind) -> Option<Node> {
        let want = Type::Scalar(kind);
        let v = self.scope.find_var(|v| match &v.ty {
            Type::Tuple(elems) => elems.contains(&want),
            _ => false,
        })?;
        let var = Node::var(v.name.clone(), v.ty.clone());
        let Type::Tuple(elems) = &v.ty else {
            unreachable!()
        };
        let slots: Vec<usize> = elems
            .iter()
            .enumerate()
            .filter(|(_, e)| **e == want)
            .map(|(i, _)| i)
            .collect();
        let slot = slots[self.rng.random_range(0..slots.len())];
        Some(Node::index(var, Node::int_lit(slot as i64)).with_type(want))
    }

    fn null_coalesce(&mut self, kind: ScalarKind) -> Option<Node> {
        let v = self.var_of_type(&Type::nullable(Type::Scalar(kind)))?;
        let rhs = self.generate_value_of_type(&Type::Scalar(kind));
        let n = Node::binary(Op::NullCoalesce, v, self.maybe_add_parens(rhs));
        Some(Node::parens(n).with_type(Type::Scalar(kind)))
    }

    fn interpolated_string(&mut self) -> Node {
        let n_parts = self.range(3, 8);
        let mut parts = Vec::with_capacity(n_parts);
        for _ in 0..n_parts {
            let var = if self.chance(0.5) {
                let kind = self.pick_scalar_type().scalar_kind().unwrap_or(ScalarKind::String);
                self.scope
                    .find_var_of_type(&Type::Scalar(kind))
                    .map(|v| Node::var(v.name.clone(), v.ty.clone()))
            } else {
                None
            };
            let part = match var {
                Some(v) => v,
                None => Node::string_lit(self.values.string_value(&mut self.rng)),
            };
            parts.push(part);
        }
        Node::new(Op::InterpolatedString, parts).with_type(Type::STRING)
    }

    fn string_index(&mut self) -> Option<Node> {
        let s = self.var_of_type(&Type::STRING)?;
        let key = if self.rng.random_range(0..=10) > 2 {
            self.int_value()
        } else {
            Node::int_lit(-1)
        };
        Some(Node::index(s, key).with_type(Type::STRING))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::tests::test_generator;
    use crate::tree::Payload;
    use crate::types::TypeTag;
    use rand::SeedableRng;
    use std::collections::HashSet;

    fn is_int_array_value(n: &Node) -> bool {
        match n.op {
            Op::ArrayLit => true,
            Op::Var => n.ty.as_ref().is_some_and(|t| t.identical(&Type::array_of(Type::INT))),
            _ => false,
        }
    }

    #[test]
    fn test_choice_list_expansion() {
        let list = ChoiceList::new(
            ScalarKind::Int,
            vec![choice(2, ExprKind::Lit(ScalarKind::Int)), choice(3, ExprKind::Concat)],
        );
        assert_eq!(list.index_map, vec![0, 0, 1, 1, 1]);
    }

    #[test]
    fn test_int_array_value() {
        let mut g = test_generator(11);
        g.scope.enter();
        g.scope.push_var("arr", Type::array_of(Type::INT));
        g.scope.push_var("s", Type::STRING);
        let mut saw_var = false;
        for _ in 0..200 {
            let n = g.generate_value_of_type(&Type::array_of(Type::INT));
            assert!(is_int_array_value(&n), "{n:?}");
            saw_var |= n.op == Op::Var;
        }
        assert!(saw_var);
        g.scope.leave();
    }

    #[test]
    fn test_depth_limit_falls_back_to_literal() {
        let mut g = test_generator(5);
        g.config.p_paren = 0.0;
        g.expr_depth = g.config.max_expr_depth + 1;
        for _ in 0..50 {
            assert_eq!(g.int_value().op, Op::IntLit);
            assert_eq!(g.cond_value().op, Op::BoolLit);
            assert_eq!(g.string_value().op, Op::StringLit);
        }
    }

    #[test]
    fn test_value_generation_restores_depth() {
        let mut g = test_generator(8);
        g.scope.enter();
        for _ in 0..100 {
            let ty = g.pick_type();
            g.generate_value_of_type(&ty);
            assert_eq!(g.expr_depth, 0);
        }
        g.scope.leave();
    }

    /// Whether `n` can stand where a value of type `ty` is expected.
    fn fits(n: &Node, ty: &Type) -> bool {
        let mut n = n;
        while n.op == Op::Parens && n.ty.is_none() {
            n = &n.args[0];
        }
        let exact_var = n.op == Op::Var && n.ty.as_ref().is_some_and(|t| t.identical(ty));
        match ty {
            Type::Scalar(ScalarKind::Mixed) => true,
            Type::Scalar(kind) => n.ty.as_ref().map_or(true, |t| match t {
                Type::Enum(e) => e.value_kind == *kind,
                _ => t.identical(ty),
            }),
            Type::Enum(e) => {
                exact_var
                    || n
                        .extract_value()
                        .is_some_and(|lit| e.values.iter().any(|v| v.same(&lit)))
            }
            Type::Array(elem) => {
                exact_var
                    || (n.op == Op::ArrayLit
                        && n.ty.as_ref().is_some_and(|t| t.identical(ty))
                        && n.args.iter().all(|x| fits(x, elem)))
            }
            Type::Tuple(elems) => {
                exact_var
                    || (n.op == Op::TupleLit
                        && n.ty.as_ref().is_some_and(|t| t.identical(ty))
                        && n.args.len() == elems.len()
                        && n.args.iter().zip(elems).all(|(x, t)| fits(x, t)))
            }
            Type::Class(_) => {
                exact_var || (n.op == Op::New && n.ty.as_ref().is_some_and(|t| t.identical(ty)))
            }
            Type::Nullable(inner) => exact_var || n.op == Op::Null || fits(n, inner),
            Type::Union(x, y) => exact_var || fits(n, x) || fits(n, y),
            Type::Func(_) => false,
        }
    }

    fn generator_with_classes(seed: u64) -> Generator<rand::rngs::StdRng> {
        use crate::types::ClassType;

        let mut g = Generator::new(
            rand::rngs::StdRng::seed_from_u64(seed),
            crate::config::GeneratorConfig::default(),
        );
        for name in ["C0", "C1"] {
            g.symtab.declare_class(name);
            g.symtab.define_class(ClassType::new(name.to_string(), vec![], vec![]));
        }
        g.register_builtins();
        g.symtab.sort();
        g
    }

    #[test]
    fn test_values_fit_their_type() {
        let mut g = generator_with_classes(42);
        g.scope.enter();
        for i in 0..40 {
            let ty = g.pick_type();
            g.scope.push_var(format!("v{i}"), ty);
        }

        let mut seen = HashSet::new();
        for _ in 0..600 {
            let ty = g.pick_type();
            seen.insert(ty.tag());
            let n = g.generate_value_of_type(&ty);
            assert!(fits(&n, &ty), "{ty}: {n:?}");
            if ty.is_const_initializable() {
                let c = g.generate_const_value_of_type(&ty);
                assert!(fits(&c, &ty), "const {ty}: {c:?}");
                c.walk(&mut |x| assert_ne!(x.op, Op::Var, "const {ty}: {c:?}"));
            }
        }
        for tag in [
            TypeTag::Scalar,
            TypeTag::Enum,
            TypeTag::Array,
            TypeTag::Tuple,
            TypeTag::Class,
            TypeTag::Nullable,
            TypeTag::Union,
        ] {
            assert!(seen.contains(&tag), "{tag:?} never picked");
        }
        g.scope.leave();
    }

    #[test]
    fn test_const_values_are_literals() {
        let mut g = test_generator(21);
        let types = [
            Type::INT,
            Type::array_of(Type::STRING),
            Type::nullable(Type::FLOAT),
            Type::union(Type::INT, Type::BOOL),
        ];
        for ty in &types {
            for _ in 0..20 {
                let n = g.generate_const_value_of_type(ty);
                let mut ok = true;
                n.walk(&mut |x| {
                    ok &= matches!(
                        x.op,
                        Op::IntLit | Op::FloatLit | Op::StringLit | Op::BoolLit | Op::Null | Op::ArrayLit
                    );
                });
                assert!(ok, "{ty}: {n:?}");
            }
        }
    }

    #[test]
    #[should_panic(expected = "no constant value of type tuple(int)")]
    fn test_const_tuple_panics() {
        let mut g = test_generator(0);
        g.generate_const_value_of_type(&Type::Tuple(vec![Type::INT]));
    }

    #[test]
    fn test_float_equality_uses_helper() {
        let mut g = test_generator(2);
        for _ in 0..200 {
            let n = g.compare(Op::Equal3);
            if n.op == Op::Call {
                assert_eq!(n.args[0].value, Some(Payload::Ident("fuzz_float_eq".to_string())));
            } else {
                assert_eq!(n.op, Op::Equal3);
            }
        }
    }

    #[test]
    fn test_private_field_hidden_outside_class() {
        use crate::types::{ClassType, Field};

        let mut g = Generator::new(
            rand::rngs::StdRng::seed_from_u64(4),
            crate::config::GeneratorConfig::default(),
        );
        let c0 = g.symtab.declare_class("C0");
        let field = Field {
            name: "secret".to_string(),
            ty: Type::INT,
            init: Some(Node::int_lit(1)),
            visibility: Visibility::Private,
        };
        g.symtab.define_class(ClassType::new("C0".to_string(), vec![field], vec![]));
        g.symtab.sort();

        assert!(g.field_of_type(&Type::INT).is_none());
        g.current_class = Some(c0);
        let n = g.field_of_type(&Type::INT).unwrap();
        assert_eq!(n.op, Op::Prop);
        assert_eq!(n.args[0].ident(), Some("this"));
    }
}
