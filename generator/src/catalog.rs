//! Signatures of built-in functions that generated code may call. Only
//! functions that behave the same on both engines for every argument the
//! generator can produce are listed.

use crate::tree::Node;
use crate::types::{FuncType, Param, Type};

#[derive(Copy, Clone)]
enum Ty {
    Bool,
    Int,
    Float,
    String,
    IntArray,
    StringArray,
}

impl Ty {
    fn to_type(self) -> Type {
        match self {
            Ty::Bool => Type::BOOL,
            Ty::Int => Type::INT,
            Ty::Float => Type::FLOAT,
            Ty::String => Type::STRING,
            Ty::IntArray => Type::array_of(Type::INT),
            Ty::StringArray => Type::array_of(Type::STRING),
        }
    }
}

#[derive(Copy, Clone)]
enum Init {
    Int(i64),
    String(&'static [u8]),
}

struct BuiltinParam {
    name: &'static str,
    ty: Ty,
    default: Option<Init>,
    strict: bool,
}

struct Builtin {
    name: &'static str,
    params: &'static [BuiltinParam],
    result: Ty,
}

const fn p(name: &'static str, ty: Ty) -> BuiltinParam {
    BuiltinParam {
        name,
        ty,
        default: None,
        strict: false,
    }
}

const fn strict(name: &'static str, ty: Ty) -> BuiltinParam {
    BuiltinParam {
        name,
        ty,
        default: None,
        strict: true,
    }
}

const fn opt(name: &'static str, ty: Ty, init: Init) -> BuiltinParam {
    BuiltinParam {
        name,
        ty,
        default: Some(init),
        strict: false,
    }
}

const TRIM_CHARS: Init = Init::String(b" \n\r\t\x0b\x00");

const BUILTINS: &[Builtin] = &[
    Builtin {
        name: "strlen",
        params: &[p("string", Ty::String)],
        result: Ty::Int,
    },
    Builtin {
        name: "ltrim",
        params: &[p("string", Ty::String), opt("characters", Ty::String, TRIM_CHARS)],
        result: Ty::String,
    },
    Builtin {
        name: "rtrim",
        params: &[p("string", Ty::String), opt("characters", Ty::String, TRIM_CHARS)],
        result: Ty::String,
    },
    Builtin {
        name: "trim",
        params: &[p("string", Ty::String), opt("characters", Ty::String, TRIM_CHARS)],
        result: Ty::String,
    },
    Builtin {
        name: "strtoupper",
        params: &[p("string", Ty::String)],
        result: Ty::String,
    },
    Builtin {
        name: "strtolower",
        params: &[p("string", Ty::String)],
        result: Ty::String,
    },
    Builtin {
        name: "ucfirst",
        params: &[p("string", Ty::String)],
        result: Ty::String,
    },
    Builtin {
        name: "lcfirst",
        params: &[p("string", Ty::String)],
        result: Ty::String,
    },
    Builtin {
        name: "strrev",
        params: &[p("string", Ty::String)],
        result: Ty::String,
    },
    Builtin {
        name: "substr",
        params: &[
            p("string", Ty::String),
            strict("offset", Ty::Int),
            opt("length", Ty::Int, Init::Int(1)),
        ],
        result: Ty::String,
    },
    Builtin {
        name: "md5",
        params: &[p("string", Ty::String)],
        result: Ty::String,
    },
    Builtin {
        name: "bin2hex",
        params: &[p("string", Ty::String)],
        result: Ty::String,
    },
    Builtin {
        name: "ord",
        params: &[p("character", Ty::String)],
        result: Ty::Int,
    },
    Builtin {
        name: "chr",
        params: &[strict("codepoint", Ty::Int)],
        result: Ty::String,
    },
    Builtin {
        name: "max",
        params: &[p("value", Ty::Int), p("values", Ty::Int)],
        result: Ty::Int,
    },
    Builtin {
        name: "min",
        params: &[p("value", Ty::Int), p("values", Ty::Int)],
        result: Ty::Int,
    },
    Builtin {
        name: "floor",
        params: &[strict("num", Ty::Float)],
        result: Ty::Float,
    },
    Builtin {
        name: "ceil",
        params: &[strict("num", Ty::Float)],
        result: Ty::Float,
    },
    Builtin {
        name: "round",
        params: &[strict("num", Ty::Float)],
        result: Ty::Float,
    },
    Builtin {
        name: "sqrt",
        params: &[strict("num", Ty::Float)],
        result: Ty::Float,
    },
    Builtin {
        name: "intval",
        params: &[p("value", Ty::String)],
        result: Ty::Int,
    },
    Builtin {
        name: "floatval",
        params: &[p("value", Ty::String)],
        result: Ty::Float,
    },
    Builtin {
        name: "strval",
        params: &[p("value", Ty::Int)],
        result: Ty::String,
    },
    Builtin {
        name: "boolval",
        params: &[p("value", Ty::Int)],
        result: Ty::Bool,
    },
    Builtin {
        name: "is_numeric",
        params: &[p("value", Ty::String)],
        result: Ty::Bool,
    },
    Builtin {
        name: "count",
        params: &[p("value", Ty::IntArray)],
        result: Ty::Int,
    },
    Builtin {
        name: "array_reverse",
        params: &[p("array", Ty::IntArray)],
        result: Ty::IntArray,
    },
    Builtin {
        name: "implode",
        params: &[p("separator", Ty::String), p("array", Ty::StringArray)],
        result: Ty::String,
    },
];

/// The built-in catalog as function types, in a fixed order.
pub fn builtin_funcs() -> Vec<FuncType> {
    BUILTINS
        .iter()
        .map(|b| {
            let params = b
                .params
                .iter()
                .map(|bp| Param {
                    name: bp.name.to_string(),
                    ty: bp.ty.to_type(),
                    default: bp.default.map(|init| match init {
                        Init::Int(v) => Node::int_lit(v),
                        Init::String(s) => Node::string_lit(s),
                    }),
                    must_cast: bp.strict,
                })
                .collect();
            FuncType::new(b.name, params, b.result.to_type())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_min_args() {
        let funcs = builtin_funcs();
        let find = |name: &str| funcs.iter().find(|f| f.name == name).unwrap();
        assert_eq!(find("strlen").min_args, 1);
        assert_eq!(find("ltrim").min_args, 1);
        assert_eq!(find("substr").min_args, 2);
        assert_eq!(find("substr").params.len(), 3);
        assert!(find("chr").params[0].must_cast);
    }

    #[test]
    fn test_unique_names() {
        let funcs = builtin_funcs();
        for (i, f) in funcs.iter().enumerate() {
            assert!(funcs[i + 1..].iter().all(|g| g.name != f.name), "{} listed twice", f.name);
        }
    }
}
