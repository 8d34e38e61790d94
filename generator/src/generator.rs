use rand::Rng;

use crate::config::GeneratorConfig;
use crate::expr::ChoiceTables;
use crate::scope::Scope;
use crate::symbol::SymbolTable;
use crate::tree::{Node, Op};
use crate::types::{ClassRef, EnumType, Literal, ScalarKind, Type};
use crate::value::{generate_unique_values, pick, ValueGenerator};

const SCALAR_KINDS: [ScalarKind; 4] = [
    ScalarKind::Bool,
    ScalarKind::Int,
    ScalarKind::Float,
    ScalarKind::String,
];

/// Innermost construct a `break` or `continue` would leave.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum JumpTarget {
    Loop,
    Switch,
}

/// Program synthesis state. Expression, statement and program generation
/// are split over `expr`, `stmt` and `program` as impl blocks on this type.
pub struct Generator<R: Rng> {
    pub(crate) rng: R,
    pub(crate) config: GeneratorConfig,
    pub(crate) values: ValueGenerator,
    pub(crate) scope: Scope,
    pub(crate) symtab: SymbolTable,
    pub(crate) choices: ChoiceTables,

    pub(crate) expr_depth: usize,
    pub(crate) stmt_depth: usize,
    pub(crate) jump_targets: Vec<JumpTarget>,

    /// Per-function counters for fresh names.
    pub(crate) var_seq: usize,
    pub(crate) loop_seq: usize,

    /// Class whose method body is being generated.
    pub(crate) current_class: Option<ClassRef>,
    /// Result type of the function being generated.
    pub(crate) current_result: Type,
}

impl<R: Rng> Generator<R> {
    pub fn new(rng: R, config: GeneratorConfig) -> Self {
        Self {
            rng,
            config,
            values: ValueGenerator::new(config.p_interesting_value),
            scope: Scope::new(),
            symtab: SymbolTable::new(),
            choices: ChoiceTables::new(),
            expr_depth: 0,
            stmt_depth: 0,
            jump_targets: Vec::new(),
            var_seq: 0,
            loop_seq: 0,
            current_class: None,
            current_result: Type::VOID,
        }
    }

    pub(crate) fn chance(&mut self, p: f64) -> bool {
        self.rng.random_bool(p)
    }

    pub(crate) fn range(&mut self, min: usize, max: usize) -> usize {
        self.rng.random_range(min..=max)
    }

    pub(crate) fn fresh_var_name(&mut self) -> String {
        let name = format!("v{}", self.var_seq);
        self.var_seq += 1;
        name
    }

    pub(crate) fn fresh_loop_counter(&mut self) -> String {
        let name = format!("_c{}", self.loop_seq);
        self.loop_seq += 1;
        name
    }

    /// Reset per-function state before generating a body.
    pub(crate) fn begin_function(&mut self, class: Option<ClassRef>, result: Type) {
        assert_eq!(self.scope.depth(), 0, "function started inside another scope");
        self.var_seq = 0;
        self.loop_seq = 0;
        self.stmt_depth = 0;
        self.jump_targets.clear();
        self.current_class = class;
        self.current_result = result;
    }

    pub fn pick_scalar_type(&mut self) -> Type {
        Type::Scalar(pick(&mut self.rng, &SCALAR_KINDS))
    }

    /// An enum over int, float or string values; `None` on the bool roll.
    fn pick_enum_type(&mut self) -> Option<Type> {
        match self.pick_scalar_type() {
            Type::Scalar(ScalarKind::Bool) => None,
            Type::Scalar(kind) => Some(self.gen_enum_type(kind)),
            _ => None,
        }
    }

    /// An enum over `value_kind` with three distinct values.
    pub(crate) fn gen_enum_type(&mut self, value_kind: ScalarKind) -> Type {
        let values = match value_kind {
            ScalarKind::Int => {
                generate_unique_values(3, || Literal::Int(self.values.int_value(&mut self.rng)))
            }
            // Multiples of 1/8 are exact, so values never collide after printing.
            ScalarKind::Float => generate_unique_values(3, || {
                Literal::Float(self.rng.random_range(-8000..8000) as f64 / 8.0)
            }),
            ScalarKind::String => {
                generate_unique_values(3, || Literal::String(self.values.string_value(&mut self.rng)))
            }
            _ => panic!("no enum over {}", value_kind.as_str()),
        };
        Type::Enum(EnumType { value_kind, values })
    }

    /// A type for a variable or parameter.
    pub fn pick_type(&mut self) -> Type {
        self.pick_type_at(0)
    }

    fn pick_type_at(&mut self, depth: usize) -> Type {
        if depth >= 3 {
            return self.pick_scalar_type();
        }
        match self.rng.random_range(0..10 + depth * 3) {
            0 => Type::array_of(self.pick_type_at(depth + 1)),
            1 => match self.pick_enum_type() {
                Some(ty) => ty,
                None => self.pick_type_at(depth + 1),
            },
            2 => Type::nullable(self.pick_scalar_type()),
            3 if depth == 0 => {
                let n = self.range(2, 3);
                Type::Tuple((0..n).map(|_| self.pick_scalar_type()).collect())
            }
            4 => match self.symtab.pick_random_class(&mut self.rng) {
                Some(class) => Type::Class(class),
                None => self.pick_scalar_type(),
            },
            5 if depth == 0 => {
                let x = self.pick_scalar_type();
                let mut y = self.pick_scalar_type();
                while y.identical(&x) {
                    y = self.pick_scalar_type();
                }
                Type::union(x, y)
            }
            _ => self.pick_scalar_type(),
        }
    }

    /// A type whose values can be written as constants: scalars and arrays
    /// of scalars. Used for results, fields and defaulted params.
    pub fn pick_const_type(&mut self) -> Type {
        let elem = self.pick_scalar_type();
        if self.chance(0.25) {
            Type::array_of(elem)
        } else {
            elem
        }
    }

    /// Wrap `n` in parentheses unless it is a primary expression.
    pub(crate) fn maybe_add_parens(&self, n: Node) -> Node {
        if is_simple_node(&n) {
            n
        } else {
            Node::parens(n)
        }
    }
}

/// Whether `n` can be used as an operand without parentheses.
pub fn is_simple_node(n: &Node) -> bool {
    match n.op {
        Op::Var
        | Op::Name
        | Op::Parens
        | Op::StringLit
        | Op::BoolLit
        | Op::Null
        | Op::Call
        | Op::MethodCall
        | Op::Cast
        | Op::ArrayLit
        | Op::TupleLit
        | Op::Prop
        | Op::Index
        | Op::InterpolatedString => true,
        Op::IntLit => matches!(n.literal(), Some(Literal::Int(v)) if *v >= 0),
        Op::FloatLit => matches!(n.literal(), Some(Literal::Float(v)) if *v >= 0.0 && !v.is_sign_negative()),
        _ => false,
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    pub(crate) fn test_generator(seed: u64) -> Generator<StdRng> {
        let mut g = Generator::new(StdRng::seed_from_u64(seed), GeneratorConfig::default());
        g.register_builtins();
        g.symtab.sort();
        g
    }

    #[test]
    fn test_simple_nodes() {
        assert!(is_simple_node(&Node::int_lit(1)));
        assert!(!is_simple_node(&Node::int_lit(-1)));
        assert!(!is_simple_node(&Node::float_lit(-0.0)));
        assert!(!is_simple_node(&Node::float_lit(f64::NAN)));
        assert!(is_simple_node(&Node::var("x", Type::INT)));
        assert!(!is_simple_node(&Node::binary(Op::Add, Node::int_lit(1), Node::int_lit(2))));
    }

    #[test]
    fn test_pick_type_without_classes() {
        let mut g = test_generator(3);
        for _ in 0..500 {
            let ty = g.pick_type();
            let mut stack = vec![&ty];
            while let Some(t) = stack.pop() {
                match t {
                    Type::Class(_) | Type::Func(_) => panic!("unexpected {t}"),
                    Type::Scalar(kind) => assert!(SCALAR_KINDS.contains(kind)),
                    Type::Array(e) | Type::Nullable(e) => stack.push(e),
                    Type::Union(x, y) => {
                        stack.push(x);
                        stack.push(y);
                    }
                    Type::Tuple(elems) => stack.extend(elems.iter()),
                    Type::Enum(e) => assert_ne!(e.value_kind, ScalarKind::Bool),
                }
            }
        }
    }

    #[test]
    fn test_enum_values_distinct() {
        let mut g = test_generator(8);
        for kind in [ScalarKind::Int, ScalarKind::Float, ScalarKind::String] {
            for _ in 0..50 {
                let Type::Enum(e) = g.gen_enum_type(kind) else {
                    unreachable!()
                };
                assert_eq!(e.values.len(), 3);
                assert!(e.values.iter().all(|v| v.kind() == kind));
                assert!(!e.values[0].same(&e.values[1]));
                assert!(!e.values[0].same(&e.values[2]));
                assert!(!e.values[1].same(&e.values[2]));
            }
        }
    }

    #[test]
    fn test_fresh_names_restart_per_function() {
        let mut g = test_generator(0);
        g.begin_function(None, Type::VOID);
        assert_eq!(g.fresh_var_name(), "v0");
        assert_eq!(g.fresh_var_name(), "v1");
        assert_eq!(g.fresh_loop_counter(), "_c0");
        g.begin_function(None, Type::INT);
        assert_eq!(g.fresh_var_name(), "v0");
    }
}
