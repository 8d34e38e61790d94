use rand::Rng;
use tracing::{debug, trace};

use crate::catalog::builtin_funcs;
use crate::generator::Generator;
use crate::runtime::{runtime_files, FUZZLIB_NAME};
use crate::tree::{DocTag, File, FuncDecl, Node, Op, Program, RootNode};
use crate::types::{ClassRef, ClassType, Field, FuncType, Param, Type, Visibility};

/// Signatures fixed before any body is generated.
struct Signatures {
    classes: Vec<ClassRef>,
    lib_funcs: Vec<Vec<FuncType>>,
}

fn doc_tags(func: &FuncType) -> Vec<DocTag> {
    let mut tags: Vec<DocTag> = func
        .params
        .iter()
        .map(|p| DocTag::new("@param", format!("{} ${}", p.ty, p.name)))
        .collect();
    tags.push(DocTag::new("@return", func.result.to_string()));
    tags
}

impl<R: Rng> Generator<R> {
    pub(crate) fn register_builtins(&mut self) {
        for func in builtin_funcs() {
            self.symtab.add_func(func);
        }
    }

    /// Assemble a whole program: library files first, then `main.php`.
    pub fn create_program(mut self) -> Program {
        self.register_builtins();
        let sigs = self.declare_symbols();
        self.symtab.sort();

        let n_lib_files = sigs.lib_funcs.len();
        let mut files: Vec<File> = (0..n_lib_files).map(|i| File::new(format!("lib{i}.php"))).collect();
        let mut main = File::new("main.php");

        for (i, class) in sigs.classes.iter().enumerate() {
            let decl = self.gen_class_decl(class);
            match files.get_mut(i % n_lib_files.max(1)) {
                Some(file) if n_lib_files > 0 => file.nodes.push(decl),
                _ => main.nodes.push(decl),
            }
        }
        for (file, funcs) in files.iter_mut().zip(sigs.lib_funcs) {
            for func in funcs {
                let decl = self.gen_func_decl(func, true);
                file.nodes.push(RootNode::FuncDecl(decl));
            }
        }

        main.nodes.push(RootNode::Require {
            path: FUZZLIB_NAME.to_string(),
        });
        for file in &files {
            main.nodes.push(RootNode::Require {
                path: file.name.clone(),
            });
        }
        self.gen_main_funcs(&mut main);
        files.push(main);

        debug!(
            files = files.len(),
            classes = sigs.classes.len(),
            "assembled program"
        );
        Program {
            runtime_files: runtime_files(),
            files,
        }
    }

    /// Declare every class, define them, register library functions and
    /// methods. Class-typed fields only name earlier classes, so
    /// constructors cannot recurse.
    fn declare_symbols(&mut self) -> Signatures {
        let classes: Vec<ClassRef> = (0..self.config.n_classes)
            .map(|i| self.symtab.declare_class(&format!("C{i}")))
            .collect();

        let mut methods = Vec::new();
        for (i, class) in classes.iter().enumerate() {
            let n_fields = self.range(self.config.min_fields, self.config.max_fields);
            // Only earlier classes, so a constructor never builds its own class.
            let fields = (0..n_fields)
                .map(|k| self.gen_field(format!("f{k}"), &classes[..i]))
                .collect();

            let n_methods = self.range(self.config.min_methods, self.config.max_methods);
            let class_methods: Vec<FuncType> = (0..n_methods)
                .map(|k| {
                    let params = self.gen_params();
                    let result = self.pick_result_type();
                    FuncType::method(format!("m{k}"), params, result, class.clone())
                })
                .collect();
            methods.extend(class_methods.iter().cloned());
            self.symtab
                .define_class(ClassType::new(class.name.clone(), fields, class_methods));
        }

        let mut lib_funcs = Vec::with_capacity(self.config.n_lib_files);
        for i in 0..self.config.n_lib_files {
            let n = self.range(self.config.min_lib_funcs, self.config.max_lib_funcs);
            let funcs: Vec<FuncType> = (0..n)
                .map(|k| {
                    let params = self.gen_params();
                    let result = self.pick_result_type();
                    FuncType::new(format!("lib{i}_f{k}"), params, result)
                })
                .collect();
            for func in &funcs {
                self.symtab.add_func(func.clone());
            }
            lib_funcs.push(funcs);
        }
        for method in methods {
            self.symtab.add_func(method);
        }

        Signatures { classes, lib_funcs }
    }

    fn gen_field(&mut self, name: String, earlier: &[ClassRef]) -> Field {
        let visibility = if self.chance(self.config.p_private_field) {
            Visibility::Private
        } else {
            Visibility::Public
        };
        if !earlier.is_empty() && self.chance(0.2) {
            let class = earlier[self.rng.random_range(0..earlier.len())].clone();
            return Field {
                name,
                ty: Type::Class(class),
                init: None,
                visibility,
            };
        }
        let ty = if self.chance(0.1) {
            Type::nullable(self.pick_scalar_type())
        } else {
            self.pick_const_type()
        };
        let init = Some(self.generate_const_value_of_type(&ty));
        Field {
            name,
            ty,
            init,
            visibility,
        }
    }

    fn pick_result_type(&mut self) -> Type {
        if self.chance(0.2) {
            Type::VOID
        } else {
            self.pick_const_type()
        }
    }

    /// Parameters named `p0..pN`; defaults only on a trailing run.
    fn gen_params(&mut self) -> Vec<Param> {
        let n = self.range(self.config.min_params, self.config.max_params);
        let mut n_defaults = 0;
        while n_defaults < n && self.chance(self.config.p_param_default) {
            n_defaults += 1;
        }

        let mut params = Vec::with_capacity(n);
        for i in 0..n {
            if i < n - n_defaults {
                params.push(Param::new(format!("p{i}"), self.pick_type()));
            } else {
                let ty = self.pick_const_type();
                let mut param = Param::new(format!("p{i}"), ty.clone());
                param.default = Some(self.generate_const_value_of_type(&ty));
                params.push(param);
            }
        }
        params
    }

    fn gen_func_decl(&mut self, func: FuncType, guarded: bool) -> FuncDecl {
        trace!(func = %func.qualified_name(), "generating body");
        self.begin_function(func.class.clone(), func.result.clone());
        self.scope.enter();
        for param in &func.params {
            self.scope.push_var(param.name.clone(), param.ty.clone());
        }

        let mut body = Vec::new();
        if guarded {
            // Each body runs once; later calls, recursive ones included,
            // return a constant.
            let early = if func.result.is_void() {
                Node::new(Op::ReturnVoid, Vec::new())
            } else {
                Node::ret(self.generate_const_value_of_type(&func.result))
            };
            let visited = Node::call("fuzz_visited", vec![Node::string_lit(func.qualified_name())]);
            body.push(Node::if_stmt(visited, Node::block(vec![early])));
        }
        self.gen_body(&mut body);
        self.scope.leave();

        FuncDecl {
            tags: doc_tags(&func),
            ty: func,
            body,
        }
    }

    fn gen_class_decl(&mut self, class: &ClassRef) -> RootNode {
        let ty = self.symtab.class(class.id).clone();
        let mut methods = Vec::with_capacity(ty.methods.len() + 1);

        let inits: Vec<Node> = ty
            .fields
            .iter()
            .filter_map(|f| match (&f.ty, &f.init) {
                (Type::Class(target), None) => {
                    let this = Node::var("this", Type::Class(class.clone()));
                    let value = Node::new_object(target.name.clone()).with_type(f.ty.clone());
                    Some(Node::assign(Node::prop(this, f.name.clone()), value))
                }
                _ => None,
            })
            .collect();
        if !inits.is_empty() {
            let ctor = FuncType::method("__construct", Vec::new(), Type::VOID, class.clone());
            methods.push(FuncDecl {
                ty: ctor,
                tags: Vec::new(),
                body: inits,
            });
        }

        for method in ty.methods.clone() {
            methods.push(self.gen_func_decl(method, true));
        }
        RootNode::ClassDecl { ty, methods }
    }

    /// Top-level `fnN` functions plus a `main` that calls each one and
    /// dumps what it returns.
    fn gen_main_funcs(&mut self, main: &mut File) {
        let n = self.range(self.config.min_main_funcs, self.config.max_main_funcs);
        let mut funcs = Vec::with_capacity(n);
        for i in 0..n {
            let params = self.gen_params();
            let result = self.pick_result_type();
            let func = FuncType::new(format!("fn{i}"), params, result);
            let decl = self.gen_func_decl(func.clone(), false);
            main.nodes.push(RootNode::FuncDecl(decl));
            funcs.push(func);
        }

        let main_ty = FuncType::new("main", Vec::new(), Type::VOID);
        self.begin_function(None, Type::VOID);
        self.scope.enter();
        let mut body = Vec::with_capacity(funcs.len());
        for func in &funcs {
            let n_args = self.range(func.min_args, func.params.len());
            let args = func.params[..n_args]
                .iter()
                .map(|p| self.generate_value_of_type(&p.ty))
                .collect();
            let call = Node::call(func.name.clone(), args).with_type(func.result.clone());
            if func.result.can_dump() {
                body.push(Node::call("fuzz_dump", vec![Node::name("__LINE__"), call]));
            } else {
                body.push(call);
            }
        }
        self.scope.leave();

        main.nodes.push(RootNode::FuncDecl(FuncDecl {
            tags: doc_tags(&main_ty),
            ty: main_ty,
            body,
        }));
        main.nodes.push(RootNode::Stmt(Node::call("main", Vec::new())));
    }
}
