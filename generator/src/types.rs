use std::cmp::Ordering;
use std::fmt;

use la_arena::Idx;

use crate::tree::Node;

pub type ClassId = Idx<ClassType>;
pub type FuncId = Idx<FuncType>;

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ScalarKind {
    Void,
    Bool,
    Int,
    Float,
    String,
    Mixed,
}

impl ScalarKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ScalarKind::Void => "void",
            ScalarKind::Bool => "bool",
            ScalarKind::Int => "int",
            ScalarKind::Float => "float",
            ScalarKind::String => "string",
            ScalarKind::Mixed => "mixed",
        }
    }
}

/// Variant discriminant, the first key of the type order.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TypeTag {
    Scalar,
    Class,
    Union,
    Nullable,
    Array,
    Tuple,
    Func,
    Enum,
}

/// A constant scalar value. Strings are raw bytes: generated programs are
/// allowed to carry bytes that are not valid UTF-8.
#[derive(Clone, Debug, PartialEq)]
pub enum Literal {
    Bool(bool),
    Int(i64),
    Float(f64),
    String(Vec<u8>),
}

impl Literal {
    pub fn kind(&self) -> ScalarKind {
        match self {
            Literal::Bool(_) => ScalarKind::Bool,
            Literal::Int(_) => ScalarKind::Int,
            Literal::Float(_) => ScalarKind::Float,
            Literal::String(_) => ScalarKind::String,
        }
    }

    /// Bitwise equality; NaN equals itself, 0.0 and -0.0 differ.
    pub fn same(&self, other: &Literal) -> bool {
        match (self, other) {
            (Literal::Float(x), Literal::Float(y)) => x.to_bits() == y.to_bits(),
            _ => self == other,
        }
    }

    fn cmp_order(&self, other: &Literal) -> Ordering {
        match (self, other) {
            (Literal::Bool(x), Literal::Bool(y)) => x.cmp(y),
            (Literal::Int(x), Literal::Int(y)) => x.cmp(y),
            (Literal::Float(x), Literal::Float(y)) => x.total_cmp(y),
            (Literal::String(x), Literal::String(y)) => x.cmp(y),
            _ => self.kind().cmp(&other.kind()),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ClassRef {
    pub id: ClassId,
    pub name: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct FuncRef {
    pub id: FuncId,
    pub name: String,
}

/// A closed set of values of one scalar kind. Renders as its value kind.
#[derive(Clone, Debug, PartialEq)]
pub struct EnumType {
    pub value_kind: ScalarKind,
    pub values: Vec<Literal>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Type {
    Scalar(ScalarKind),
    Class(ClassRef),
    Union(Box<Type>, Box<Type>),
    Nullable(Box<Type>),
    Array(Box<Type>),
    Tuple(Vec<Type>),
    Func(FuncRef),
    Enum(EnumType),
}

impl Type {
    pub const VOID: Type = Type::Scalar(ScalarKind::Void);
    pub const BOOL: Type = Type::Scalar(ScalarKind::Bool);
    pub const INT: Type = Type::Scalar(ScalarKind::Int);
    pub const FLOAT: Type = Type::Scalar(ScalarKind::Float);
    pub const STRING: Type = Type::Scalar(ScalarKind::String);
    pub const MIXED: Type = Type::Scalar(ScalarKind::Mixed);

    pub fn array_of(elem: Type) -> Type {
        Type::Array(Box::new(elem))
    }

    pub fn nullable(inner: Type) -> Type {
        Type::Nullable(Box::new(inner))
    }

    pub fn union(x: Type, y: Type) -> Type {
        Type::Union(Box::new(x), Box::new(y))
    }

    pub fn tag(&self) -> TypeTag {
        match self {
            Type::Scalar(_) => TypeTag::Scalar,
            Type::Class(_) => TypeTag::Class,
            Type::Union(..) => TypeTag::Union,
            Type::Nullable(_) => TypeTag::Nullable,
            Type::Array(_) => TypeTag::Array,
            Type::Tuple(_) => TypeTag::Tuple,
            Type::Func(_) => TypeTag::Func,
            Type::Enum(_) => TypeTag::Enum,
        }
    }

    pub fn scalar_kind(&self) -> Option<ScalarKind> {
        match self {
            Type::Scalar(kind) => Some(*kind),
            _ => None,
        }
    }

    pub fn is_void(&self) -> bool {
        matches!(self, Type::Scalar(ScalarKind::Void))
    }

    /// The keyword used in `(T)$x` casts, if the type has one.
    pub fn cast_keyword(&self) -> Option<&'static str> {
        match self {
            Type::Scalar(ScalarKind::Bool) => Some("bool"),
            Type::Scalar(ScalarKind::Int) => Some("int"),
            Type::Scalar(ScalarKind::Float) => Some("float"),
            Type::Scalar(ScalarKind::String) => Some("string"),
            Type::Array(_) => Some("array"),
            Type::Enum(e) => Type::Scalar(e.value_kind).cast_keyword(),
            _ => None,
        }
    }

    /// Whether a value of this type can be written as a constant expression
    /// (field initializers, parameter defaults, case labels).
    pub fn is_const_initializable(&self) -> bool {
        match self {
            Type::Scalar(kind) => !matches!(kind, ScalarKind::Void),
            Type::Enum(_) => true,
            Type::Array(elem) | Type::Nullable(elem) => elem.is_const_initializable(),
            Type::Union(x, y) => x.is_const_initializable() && y.is_const_initializable(),
            Type::Class(_) | Type::Tuple(_) | Type::Func(_) => false,
        }
    }

    /// Whether `fuzz_dump` prints this type the same way on both engines.
    pub fn can_dump(&self) -> bool {
        match self {
            Type::Scalar(kind) => !matches!(kind, ScalarKind::Void),
            Type::Enum(_) => true,
            Type::Array(elem) | Type::Nullable(elem) => elem.can_dump(),
            _ => false,
        }
    }

    pub fn less(&self, other: &Type) -> bool {
        type_cmp(self, other) == Ordering::Less
    }

    pub fn identical(&self, other: &Type) -> bool {
        types_identical(self, other)
    }
}

/// Total order over types: tag first, then structure.
pub fn type_cmp(t1: &Type, t2: &Type) -> Ordering {
    let by_tag = t1.tag().cmp(&t2.tag());
    if by_tag != Ordering::Equal {
        return by_tag;
    }

    match (t1, t2) {
        (Type::Scalar(k1), Type::Scalar(k2)) => k1.cmp(k2),
        (Type::Class(c1), Type::Class(c2)) => c1.name.cmp(&c2.name),
        (Type::Func(f1), Type::Func(f2)) => f1.name.cmp(&f2.name),
        (Type::Union(x1, y1), Type::Union(x2, y2)) => {
            type_cmp(x1, x2).then_with(|| type_cmp(y1, y2))
        }
        (Type::Nullable(x1), Type::Nullable(x2)) => type_cmp(x1, x2),
        (Type::Array(e1), Type::Array(e2)) => type_cmp(e1, e2),
        (Type::Tuple(e1), Type::Tuple(e2)) => e1.len().cmp(&e2.len()).then_with(|| {
            e1.iter()
                .zip(e2.iter())
                .map(|(x, y)| type_cmp(x, y))
                .find(|o| *o != Ordering::Equal)
                .unwrap_or(Ordering::Equal)
        }),
        (Type::Enum(e1), Type::Enum(e2)) => e1
            .values
            .len()
            .cmp(&e2.values.len())
            .then_with(|| e1.value_kind.cmp(&e2.value_kind))
            .then_with(|| {
                e1.values
                    .iter()
                    .zip(e2.values.iter())
                    .map(|(x, y)| x.cmp_order(y))
                    .find(|o| *o != Ordering::Equal)
                    .unwrap_or(Ordering::Equal)
            }),
        _ => unreachable!("equal tags with different variants: {t1} vs {t2}"),
    }
}

/// Strict structural equality. No widening: `int` is not `mixed`.
pub fn types_identical(t1: &Type, t2: &Type) -> bool {
    match (t1, t2) {
        (Type::Scalar(k1), Type::Scalar(k2)) => k1 == k2,
        (Type::Class(c1), Type::Class(c2)) => c1.name == c2.name,
        (Type::Func(f1), Type::Func(f2)) => f1.name == f2.name,
        (Type::Union(x1, y1), Type::Union(x2, y2)) => {
            types_identical(x1, x2) && types_identical(y1, y2)
        }
        (Type::Nullable(x1), Type::Nullable(x2)) => types_identical(x1, x2),
        (Type::Array(e1), Type::Array(e2)) => types_identical(e1, e2),
        (Type::Tuple(e1), Type::Tuple(e2)) => {
            e1.len() == e2.len() && e1.iter().zip(e2.iter()).all(|(x, y)| types_identical(x, y))
        }
        (Type::Enum(e1), Type::Enum(e2)) => {
            e1.value_kind == e2.value_kind
                && e1.values.len() == e2.values.len()
                && e1.values.iter().zip(e2.values.iter()).all(|(x, y)| x.same(y))
        }
        _ => false,
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Scalar(kind) => f.write_str(kind.as_str()),
            Type::Class(c) => f.write_str(&c.name),
            Type::Union(x, y) => write!(f, "{x}|{y}"),
            Type::Nullable(x) => match x.as_ref() {
                Type::Scalar(_) | Type::Class(_) | Type::Enum(_) => write!(f, "?{x}"),
                _ => write!(f, "{x}|null"),
            },
            Type::Array(elem) => match elem.as_ref() {
                Type::Union(..) | Type::Nullable(_) => write!(f, "({elem})[]"),
                _ => write!(f, "{elem}[]"),
            },
            Type::Tuple(elems) => {
                f.write_str("tuple(")?;
                for (i, e) in elems.iter().enumerate() {
                    if i != 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{e}")?;
                }
                f.write_str(")")
            }
            Type::Func(_) => f.write_str("callable"),
            Type::Enum(e) => f.write_str(e.value_kind.as_str()),
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Visibility {
    Public,
    Private,
}

impl Visibility {
    pub fn as_str(self) -> &'static str {
        match self {
            Visibility::Public => "public",
            Visibility::Private => "private",
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Field {
    pub name: String,
    pub ty: Type,
    /// Constant initializer. `None` means the constructor assigns the field.
    pub init: Option<Node>,
    pub visibility: Visibility,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ClassType {
    pub name: String,
    pub fields: Vec<Field>,
    pub methods: Vec<FuncType>,
    pub defined: bool,
}

impl ClassType {
    pub fn new(name: String, fields: Vec<Field>, methods: Vec<FuncType>) -> Self {
        Self {
            name,
            fields,
            methods,
            defined: false,
        }
    }

    /// A declared-but-undefined placeholder.
    pub fn placeholder(name: String) -> Self {
        Self::new(name, Vec::new(), Vec::new())
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Param {
    pub name: String,
    pub ty: Type,
    pub default: Option<Node>,
    /// Arguments must be cast to `ty` explicitly (strictly typed builtins).
    pub must_cast: bool,
}

impl Param {
    pub fn new(name: impl Into<String>, ty: Type) -> Self {
        Self {
            name: name.into(),
            ty,
            default: None,
            must_cast: false,
        }
    }

    pub fn has_default(&self) -> bool {
        self.default.is_some()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct FuncType {
    pub name: String,
    pub params: Vec<Param>,
    pub min_args: usize,
    pub result: Type,
    pub class: Option<ClassRef>,
}

impl FuncType {
    pub fn new(name: impl Into<String>, params: Vec<Param>, result: Type) -> Self {
        let min_args = params
            .iter()
            .rposition(|p| !p.has_default())
            .map_or(0, |i| i + 1);
        Self {
            name: name.into(),
            params,
            min_args,
            result,
            class: None,
        }
    }

    pub fn method(name: impl Into<String>, params: Vec<Param>, result: Type, class: ClassRef) -> Self {
        Self {
            class: Some(class),
            ..Self::new(name, params, result)
        }
    }

    /// Name used by the runtime recursion guard.
    pub fn qualified_name(&self) -> String {
        match &self.class {
            Some(c) => format!("{}::{}", c.name, self.name),
            None => self.name.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use la_arena::Arena;

    fn class_ref(arena: &mut Arena<ClassType>, name: &str) -> Type {
        let id = arena.alloc(ClassType::placeholder(name.to_string()));
        Type::Class(ClassRef {
            id,
            name: name.to_string(),
        })
    }

    #[test]
    fn test_render() {
        assert_eq!(Type::INT.to_string(), "int");
        assert_eq!(Type::array_of(Type::STRING).to_string(), "string[]");
        assert_eq!(Type::nullable(Type::INT).to_string(), "?int");
        assert_eq!(Type::nullable(Type::array_of(Type::INT)).to_string(), "int[]|null");
        assert_eq!(Type::union(Type::INT, Type::STRING).to_string(), "int|string");
        assert_eq!(
            Type::array_of(Type::union(Type::INT, Type::STRING)).to_string(),
            "(int|string)[]"
        );
        assert_eq!(Type::Tuple(vec![Type::INT, Type::BOOL]).to_string(), "tuple(int, bool)");
        let e = Type::Enum(EnumType {
            value_kind: ScalarKind::String,
            values: vec![Literal::String(b"a".to_vec())],
        });
        assert_eq!(e.to_string(), "string");
        assert_eq!(e.cast_keyword(), Some("string"));
    }

    #[test]
    fn test_order_by_tag_then_structure() {
        let mut arena = Arena::new();
        let a = class_ref(&mut arena, "A");
        let b = class_ref(&mut arena, "B");

        assert!(Type::BOOL.less(&Type::INT));
        assert!(!Type::INT.less(&Type::BOOL));
        assert!(Type::STRING.less(&a));
        assert!(a.less(&b));
        assert!(a.less(&Type::array_of(Type::BOOL)));
        assert!(Type::array_of(Type::BOOL).less(&Type::array_of(Type::INT)));
        assert!(Type::Tuple(vec![Type::STRING]).less(&Type::Tuple(vec![Type::BOOL, Type::BOOL])));
        assert!(Type::Tuple(vec![Type::BOOL, Type::INT]).less(&Type::Tuple(vec![Type::BOOL, Type::FLOAT])));
        assert!(!Type::Tuple(vec![Type::INT, Type::BOOL]).less(&Type::Tuple(vec![Type::BOOL, Type::INT])));
    }

    #[test]
    fn test_order_is_total_on_sample() {
        let mut arena = Arena::new();
        let sample = vec![
            Type::VOID,
            Type::INT,
            Type::MIXED,
            class_ref(&mut arena, "C0"),
            Type::array_of(Type::INT),
            Type::array_of(Type::array_of(Type::INT)),
            Type::nullable(Type::STRING),
            Type::union(Type::INT, Type::FLOAT),
            Type::Tuple(vec![Type::INT, Type::STRING]),
            Type::Enum(EnumType {
                value_kind: ScalarKind::Int,
                values: vec![Literal::Int(1), Literal::Int(2)],
            }),
        ];
        for x in &sample {
            for y in &sample {
                let forward = type_cmp(x, y);
                assert_eq!(forward, type_cmp(y, x).reverse());
                assert_eq!(forward == Ordering::Equal, x.identical(y), "{x} vs {y}");
            }
        }
    }

    #[test]
    fn test_identical_is_strict() {
        assert!(Type::array_of(Type::INT).identical(&Type::array_of(Type::INT)));
        assert!(!Type::array_of(Type::INT).identical(&Type::array_of(Type::FLOAT)));
        assert!(!Type::INT.identical(&Type::MIXED));
        let nan_enum = |v: f64| {
            Type::Enum(EnumType {
                value_kind: ScalarKind::Float,
                values: vec![Literal::Float(v)],
            })
        };
        assert!(nan_enum(f64::NAN).identical(&nan_enum(f64::NAN)));
        assert!(!nan_enum(0.0).identical(&nan_enum(-0.0)));
    }

    #[test]
    fn test_min_args_counts_trailing_defaults() {
        let mut with_default = Param::new("b", Type::INT);
        with_default.default = Some(Node::int_lit(1));
        let f = FuncType::new("f", vec![Param::new("a", Type::INT), with_default], Type::INT);
        assert_eq!(f.min_args, 1);
        let g = FuncType::new("g", vec![], Type::VOID);
        assert_eq!(g.min_args, 0);
    }
}
