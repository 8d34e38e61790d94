use std::collections::HashMap;

use la_arena::Arena;
use rand::Rng;
use tracing::debug;

use crate::types::{ClassId, ClassRef, ClassType, Field, FuncId, FuncType, ScalarKind, Type};

/// A field of some class, by position.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct FieldRef {
    pub index: usize,
    pub class: ClassId,
}

/// Functions and classes known to the generator, bucketed by result and
/// field type.
///
/// Lifecycle: declare classes, define them, add functions, then `sort`.
/// Nothing may be added after `sort`, and array lookups need it.
#[derive(Default)]
pub struct SymbolTable {
    classes: Arena<ClassType>,
    class_names: HashMap<String, ClassId>,
    class_order: Vec<ClassId>,

    funcs: Arena<FuncType>,
    func_names: HashMap<String, FuncId>,

    sorted: bool,

    bool_fields: Vec<FieldRef>,
    int_fields: Vec<FieldRef>,
    float_fields: Vec<FieldRef>,
    string_fields: Vec<FieldRef>,
    array_fields: Vec<FieldRef>,

    void_funcs: Vec<FuncId>,
    bool_funcs: Vec<FuncId>,
    int_funcs: Vec<FuncId>,
    float_funcs: Vec<FuncId>,
    string_funcs: Vec<FuncId>,
    array_funcs: Vec<FuncId>,
}

fn array_elem(ty: &Type) -> &Type {
    match ty {
        Type::Array(elem) => elem,
        _ => panic!("{ty} is not an array type"),
    }
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    fn check_mutable(&self) {
        if self.sorted {
            panic!("adding to a sorted symtab");
        }
    }

    pub fn is_sorted(&self) -> bool {
        self.sorted
    }

    /// Reserve a class name. The class stays a placeholder until defined.
    pub fn declare_class(&mut self, name: &str) -> ClassRef {
        self.check_mutable();
        if self.class_names.contains_key(name) {
            panic!("class {name} declared twice");
        }
        let id = self.classes.alloc(ClassType::placeholder(name.to_string()));
        self.class_names.insert(name.to_string(), id);
        self.class_order.push(id);
        ClassRef {
            id,
            name: name.to_string(),
        }
    }

    /// Fill a declared placeholder and index its fields.
    pub fn define_class(&mut self, class: ClassType) -> ClassId {
        self.check_mutable();
        let Some(&id) = self.class_names.get(&class.name) else {
            panic!("defining undeclared class {}", class.name);
        };
        if self.classes[id].defined {
            panic!("class {} defined twice", class.name);
        }

        for (index, field) in class.fields.iter().enumerate() {
            let r = FieldRef { index, class: id };
            match &field.ty {
                Type::Scalar(ScalarKind::Bool) => self.bool_fields.push(r),
                Type::Scalar(ScalarKind::Int) => self.int_fields.push(r),
                Type::Scalar(ScalarKind::Float) => self.float_fields.push(r),
                Type::Scalar(ScalarKind::String) => self.string_fields.push(r),
                Type::Array(_) => self.array_fields.push(r),
                _ => {}
            }
        }

        self.classes[id] = ClassType {
            defined: true,
            ..class
        };
        id
    }

    /// Register a function or method.
    pub fn add_func(&mut self, func: FuncType) -> FuncId {
        self.check_mutable();
        let key = func.qualified_name();
        if self.func_names.contains_key(&key) {
            panic!("function {key} added twice");
        }

        let bucket = match &func.result {
            Type::Scalar(ScalarKind::Void) => Some(&mut self.void_funcs),
            Type::Scalar(ScalarKind::Bool) => Some(&mut self.bool_funcs),
            Type::Scalar(ScalarKind::Int) => Some(&mut self.int_funcs),
            Type::Scalar(ScalarKind::Float) => Some(&mut self.float_funcs),
            Type::Scalar(ScalarKind::String) => Some(&mut self.string_funcs),
            Type::Array(_) => Some(&mut self.array_funcs),
            _ => None,
        };
        let id = self.funcs.alloc(func);
        if let Some(bucket) = bucket {
            bucket.push(id);
        }
        self.func_names.insert(key, id);
        id
    }

    /// Freeze the table and order the array buckets by element type.
    pub fn sort(&mut self) {
        if self.sorted {
            panic!("double symtab sorting");
        }
        self.sorted = true;

        let funcs = &self.funcs;
        self.array_funcs
            .sort_by(|a, b| crate::types::type_cmp(array_elem(&funcs[*a].result), array_elem(&funcs[*b].result)));

        let classes = &self.classes;
        let field_elem = |r: &FieldRef| array_elem(&classes[r.class].fields[r.index].ty);
        self.array_fields
            .sort_by(|a, b| crate::types::type_cmp(field_elem(a), field_elem(b)));

        debug!(
            classes = self.class_order.len(),
            funcs = self.funcs.len(),
            "symbol table frozen"
        );
    }

    pub fn class(&self, id: ClassId) -> &ClassType {
        &self.classes[id]
    }

    pub fn class_ref(&self, id: ClassId) -> ClassRef {
        ClassRef {
            id,
            name: self.classes[id].name.clone(),
        }
    }

    pub fn class_by_name(&self, name: &str) -> Option<ClassId> {
        self.class_names.get(name).copied()
    }

    /// Classes in declaration order.
    pub fn classes(&self) -> impl Iterator<Item = (ClassId, &ClassType)> + '_ {
        self.class_order.iter().map(|id| (*id, &self.classes[*id]))
    }

    pub fn func(&self, id: FuncId) -> &FuncType {
        &self.funcs[id]
    }

    pub fn func_by_name(&self, name: &str) -> Option<FuncId> {
        self.func_names.get(name).copied()
    }

    pub fn field(&self, r: FieldRef) -> &Field {
        &self.classes[r.class].fields[r.index]
    }

    pub fn pick_random_class<R: Rng>(&self, rng: &mut R) -> Option<ClassRef> {
        if self.class_order.is_empty() {
            return None;
        }
        let id = self.class_order[rng.random_range(0..self.class_order.len())];
        Some(self.class_ref(id))
    }

    pub fn void_funcs(&self) -> &[FuncId] {
        &self.void_funcs
    }

    /// Functions whose result is exactly `ty`. Only scalar and array results
    /// are indexed.
    pub fn find_funcs_of_type(&self, ty: &Type) -> &[FuncId] {
        match ty {
            Type::Scalar(ScalarKind::Void) => &self.void_funcs,
            Type::Scalar(ScalarKind::Bool) => &self.bool_funcs,
            Type::Scalar(ScalarKind::Int) => &self.int_funcs,
            Type::Scalar(ScalarKind::Float) => &self.float_funcs,
            Type::Scalar(ScalarKind::String) => &self.string_funcs,
            Type::Array(elem) => {
                if !self.sorted {
                    panic!("array lookup in an unsorted symtab");
                }
                let elem_of = |id: &FuncId| array_elem(&self.funcs[*id].result);
                let lo = self.array_funcs.partition_point(|id| elem_of(id).less(elem));
                let hi = self.array_funcs.partition_point(|id| !elem.less(elem_of(id)));
                &self.array_funcs[lo..hi]
            }
            _ => &[],
        }
    }

    /// Fields whose type is exactly `ty`, across all classes.
    pub fn find_fields_of_type(&self, ty: &Type) -> &[FieldRef] {
        match ty {
            Type::Scalar(ScalarKind::Bool) => &self.bool_fields,
            Type::Scalar(ScalarKind::Int) => &self.int_fields,
            Type::Scalar(ScalarKind::Float) => &self.float_fields,
            Type::Scalar(ScalarKind::String) => &self.string_fields,
            Type::Array(elem) => {
                if !self.sorted {
                    panic!("array lookup in an unsorted symtab");
                }
                let elem_of = |r: &FieldRef| array_elem(&self.field(*r).ty);
                let lo = self.array_fields.partition_point(|r| elem_of(r).less(elem));
                let hi = self.array_fields.partition_point(|r| !elem.less(elem_of(r)));
                &self.array_fields[lo..hi]
            }
            _ => &[],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Param, Visibility};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn field(name: &str, ty: Type) -> Field {
        Field {
            name: name.to_string(),
            ty,
            init: None,
            visibility: Visibility::Public,
        }
    }

    #[test]
    fn test_declare_define() {
        let mut symtab = SymbolTable::new();
        let c0 = symtab.declare_class("C0");
        assert!(!symtab.class(c0.id).defined);

        let fields = vec![
            field("f0", Type::INT),
            field("f1", Type::array_of(Type::STRING)),
            field("f2", Type::nullable(Type::INT)),
        ];
        let id = symtab.define_class(ClassType::new("C0".to_string(), fields, vec![]));
        assert_eq!(id, c0.id);
        assert!(symtab.class(id).defined);

        symtab.sort();
        let ints = symtab.find_fields_of_type(&Type::INT);
        assert_eq!(ints, &[FieldRef { index: 0, class: id }]);
        let arrays = symtab.find_fields_of_type(&Type::array_of(Type::STRING));
        assert_eq!(symtab.field(arrays[0]).name, "f1");
        assert!(symtab.find_fields_of_type(&Type::array_of(Type::INT)).is_empty());
        assert!(symtab.find_fields_of_type(&Type::nullable(Type::INT)).is_empty());
    }

    #[test]
    fn test_array_funcs_range() {
        let mut symtab = SymbolTable::new();
        let results = [
            Type::array_of(Type::STRING),
            Type::array_of(Type::INT),
            Type::array_of(Type::array_of(Type::INT)),
            Type::array_of(Type::INT),
            Type::INT,
        ];
        for (i, result) in results.into_iter().enumerate() {
            symtab.add_func(FuncType::new(format!("f{i}"), vec![], result));
        }
        symtab.sort();

        let names = |ty: &Type| -> Vec<String> {
            symtab
                .find_funcs_of_type(ty)
                .iter()
                .map(|id| symtab.func(*id).name.clone())
                .collect()
        };
        assert_eq!(names(&Type::array_of(Type::INT)), ["f1", "f3"]);
        assert_eq!(names(&Type::array_of(Type::STRING)), ["f0"]);
        assert_eq!(names(&Type::array_of(Type::array_of(Type::INT))), ["f2"]);
        assert!(names(&Type::array_of(Type::BOOL)).is_empty());
        assert_eq!(names(&Type::INT), ["f4"]);
    }

    #[test]
    fn test_pick_random_class() {
        let mut rng = StdRng::seed_from_u64(0);
        let mut symtab = SymbolTable::new();
        assert!(symtab.pick_random_class(&mut rng).is_none());
        symtab.declare_class("C0");
        assert_eq!(symtab.pick_random_class(&mut rng).unwrap().name, "C0");
    }

    #[test]
    #[should_panic(expected = "double symtab sorting")]
    fn test_double_sort() {
        let mut symtab = SymbolTable::new();
        symtab.sort();
        symtab.sort();
    }

    #[test]
    #[should_panic(expected = "adding to a sorted symtab")]
    fn test_add_after_sort() {
        let mut symtab = SymbolTable::new();
        symtab.sort();
        symtab.add_func(FuncType::new("f", vec![Param::new("x", Type::INT)], Type::INT));
    }

    #[test]
    #[should_panic(expected = "adding to a sorted symtab")]
    fn test_define_after_sort() {
        let mut symtab = SymbolTable::new();
        symtab.declare_class("C0");
        symtab.sort();
        symtab.define_class(ClassType::placeholder("C0".to_string()));
    }

    #[test]
    #[should_panic(expected = "defining undeclared class C9")]
    fn test_define_undeclared() {
        let mut symtab = SymbolTable::new();
        symtab.define_class(ClassType::placeholder("C9".to_string()));
    }

    #[test]
    #[should_panic(expected = "class C0 declared twice")]
    fn test_declare_twice() {
        let mut symtab = SymbolTable::new();
        symtab.declare_class("C0");
        symtab.declare_class("C0");
    }

    #[test]
    #[should_panic(expected = "class C0 defined twice")]
    fn test_define_twice() {
        let mut symtab = SymbolTable::new();
        symtab.declare_class("C0");
        symtab.define_class(ClassType::placeholder("C0".to_string()));
        symtab.define_class(ClassType::placeholder("C0".to_string()));
    }
}
