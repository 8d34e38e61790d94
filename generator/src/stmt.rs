use rand::seq::IndexedRandom;
use rand::Rng;
use tracing::trace;

use crate::generator::{Generator, JumpTarget};
use crate::symbol::FieldRef;
use crate::tree::{Node, Op};
use crate::types::{Literal, ScalarKind, Type, Visibility};
use crate::value::pick;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum StmtKind {
    VarDecl,
    Block,
    If,
    Assign,
    Dump,
    Echo,
    VoidCall,
    Loop,
    Switch,
    Break,
    Continue,
    Return,
}

fn terminates(n: &Node) -> bool {
    matches!(n.op, Op::Break | Op::Continue | Op::Return | Op::ReturnVoid)
}

impl<R: Rng> Generator<R> {
    /// Declarations followed by statements, ending with a `return` of the
    /// current result type. The caller owns the function's scope frame.
    pub(crate) fn gen_body(&mut self, out: &mut Vec<Node>) {
        let n_decls = self.range(self.config.min_var_decls, self.config.max_var_decls);
        for _ in 0..n_decls {
            self.gen_var_decl(out);
        }

        let n_stmts = self.range(self.config.min_stmts, self.config.max_stmts);
        self.gen_stmts(n_stmts, out);
        trace!(decls = n_decls, stmts = out.len(), "generated body");

        let result = self.current_result.clone();
        if !result.is_void() {
            let value = self.generate_value_of_type(&result);
            out.push(Node::ret(value));
        }
    }

    /// Up to `n` statements; stops early after a jump.
    fn gen_stmts(&mut self, n: usize, out: &mut Vec<Node>) {
        for _ in 0..n {
            self.gen_stmt(out);
            if out.last().is_some_and(terminates) {
                break;
            }
        }
    }

    fn gen_stmt(&mut self, out: &mut Vec<Node>) {
        let room = self.config.max_stmt_depth.saturating_sub(self.stmt_depth);
        let weights = [
            (StmtKind::VarDecl, 4),
            (StmtKind::Block, room),
            (StmtKind::If, 3 * room),
            (StmtKind::Assign, 5),
            (StmtKind::Dump, 4),
            (StmtKind::Echo, 1),
            (StmtKind::VoidCall, 1),
            (StmtKind::Loop, 2 * room),
            (StmtKind::Switch, room),
            (StmtKind::Break, 1),
            (StmtKind::Continue, 1),
            (StmtKind::Return, usize::from(self.stmt_depth > 0)),
        ];
        let kind = weights
            .choose_weighted(&mut self.rng, |(_, w)| *w)
            .map_or(StmtKind::VarDecl, |(kind, _)| *kind);

        match kind {
            StmtKind::VarDecl => self.gen_var_decl(out),
            StmtKind::Block => {
                let block = self.gen_block();
                out.push(block);
            }
            StmtKind::If => self.gen_if(out),
            StmtKind::Assign => self.gen_assign(out),
            StmtKind::Dump => self.gen_dump(out),
            StmtKind::Echo => self.gen_echo(out),
            StmtKind::VoidCall => self.gen_void_call(out),
            StmtKind::Loop => self.gen_loop(out),
            StmtKind::Switch => self.gen_switch(out),
            StmtKind::Break => match self.jump_targets.last() {
                Some(_) => out.push(Node::new(Op::Break, Vec::new())),
                None => self.gen_jump_substitute(out),
            },
            StmtKind::Continue => match self.jump_targets.last() {
                Some(JumpTarget::Loop) => out.push(Node::new(Op::Continue, Vec::new())),
                _ => self.gen_jump_substitute(out),
            },
            StmtKind::Return => {
                let result = self.current_result.clone();
                if result.is_void() {
                    out.push(Node::new(Op::ReturnVoid, Vec::new()));
                } else {
                    let value = self.generate_value_of_type(&result);
                    out.push(Node::ret(value));
                }
            }
        }
    }

    fn gen_jump_substitute(&mut self, out: &mut Vec<Node>) {
        if self.stmt_depth < self.config.max_stmt_depth {
            self.gen_if(out);
        } else {
            self.gen_var_decl(out);
        }
    }

    pub(crate) fn gen_var_decl(&mut self, out: &mut Vec<Node>) {
        let ty = self.pick_type();
        self.gen_var_decl_of_type(ty, out);
    }

    /// `$vN = <value>;` The variable enters scope after its initializer.
    pub(crate) fn gen_var_decl_of_type(&mut self, ty: Type, out: &mut Vec<Node>) {
        let name = self.fresh_var_name();
        let mut rhs = None;
        if matches!(ty, Type::Array(_)) && self.chance(0.3) {
            rhs = self.call_of_type(&ty);
        }
        let mut rhs = match rhs {
            Some(call) => call,
            None => self.generate_value_of_type(&ty),
        };
        if ty.scalar_kind().is_some() && self.chance(self.config.p_decl_cast) {
            rhs = Node::cast(ty.clone(), self.maybe_add_parens(rhs));
        }
        out.push(Node::assign(Node::var(name.clone(), ty.clone()), rhs));
        self.scope.push_var(name, ty);
    }

    /// A nested `{ ... }` with its own scope frame.
    fn gen_block(&mut self) -> Node {
        self.scope.enter();
        self.stmt_depth += 1;
        let n = self.range(1, self.config.max_block_stmts.max(1));
        let mut stmts = Vec::with_capacity(n);
        self.gen_stmts(n, &mut stmts);
        self.stmt_depth -= 1;
        self.scope.leave();
        Node::block(stmts)
    }

    fn gen_if(&mut self, out: &mut Vec<Node>) {
        let cond = self.cond_value();
        let then = self.gen_block();
        if self.chance(self.config.p_else) {
            let otherwise = self.gen_block();
            out.push(Node::if_else(cond, then, otherwise));
        } else {
            out.push(Node::if_stmt(cond, then));
        }
    }

    /// A public field reachable through `$this` or a variable, or any field
    /// of the current class.
    fn field_lvalue(&mut self, ty: &Type) -> Option<Node> {
        let candidates: Vec<FieldRef> = self
            .symtab
            .find_fields_of_type(ty)
            .iter()
            .copied()
            .filter(|r| {
                let class = self.symtab.class_ref(r.class);
                if self.current_class.as_ref() == Some(&class) {
                    return true;
                }
                self.symtab.field(*r).visibility == Visibility::Public
                    && self.scope.find_var_of_type(&Type::Class(class)).is_some()
            })
            .collect();
        if candidates.is_empty() {
            return None;
        }
        let r = pick(&mut self.rng, &candidates);
        let class = self.symtab.class_ref(r.class);
        let name = self.symtab.field(r).name.clone();
        let class_ty = Type::Class(class.clone());
        let receiver = if self.current_class.as_ref() == Some(&class) {
            Node::var("this", class_ty)
        } else {
            self.var_of_type(&class_ty)?
        };
        Some(Node::prop(receiver, name).with_type(ty.clone()))
    }

    fn gen_assign(&mut self, out: &mut Vec<Node>) {
        let mut lhs = None;
        if self.chance(0.25) {
            let ty = self.pick_scalar_type();
            lhs = self.field_lvalue(&ty);
        }
        if lhs.is_none() {
            lhs = self.var_lvalue();
        }
        let Some(lhs) = lhs else {
            self.gen_var_decl(out);
            return;
        };

        let ty = lhs.ty.clone().unwrap_or(Type::MIXED);
        let modify_ops: &[Op] = match ty {
            Type::Scalar(ScalarKind::Int) => &[Op::BitAnd, Op::BitOr, Op::BitXor],
            Type::Scalar(ScalarKind::Float) => &[Op::Add, Op::Sub, Op::Mul],
            Type::Scalar(ScalarKind::String) => &[Op::Concat],
            _ => &[],
        };
        if !modify_ops.is_empty() && self.chance(0.4) {
            let rhs = self.generate_value_of_type(&ty);
            let op = pick(&mut self.rng, modify_ops);
            out.push(Node::assign_modify(op, lhs, rhs));
            return;
        }

        let mut rhs = self.generate_value_of_type(&ty);
        for _ in 0..3 {
            if !same_lvalue(&lhs, &rhs) {
                break;
            }
            rhs = self.generate_value_of_type(&ty);
        }
        if same_lvalue(&lhs, &rhs) {
            if !ty.is_const_initializable() {
                return;
            }
            rhs = self.generate_const_value_of_type(&ty);
        }
        out.push(Node::assign(lhs, rhs));
    }

    /// A variable to assign to. Locals of the innermost block are favored.
    fn var_lvalue(&mut self) -> Option<Node> {
        let n_local = self.scope.current_block_vars().len();
        let name = if n_local > 0 && self.chance(0.5) {
            let i = self.rng.random_range(0..n_local);
            self.scope.current_block_vars()[i].name.clone()
        } else {
            let n_visible = self.scope.visible_vars().len();
            if n_visible == 0 {
                return None;
            }
            let i = self.rng.random_range(0..n_visible);
            self.scope.visible_vars()[i].name.clone()
        };
        let v = self.scope.find_var_by_name(&name)?;
        Some(Node::var(v.name.clone(), v.ty.clone()))
    }

    /// `fuzz_dump(__LINE__, <value>);`
    fn gen_dump(&mut self, out: &mut Vec<Node>) {
        let mut value = None;
        if self.chance(0.5) {
            let dumpable: Vec<_> = self
                .scope
                .visible_vars()
                .into_iter()
                .filter(|v| v.ty.can_dump())
                .map(|v| Node::var(v.name.clone(), v.ty.clone()))
                .collect();
            if !dumpable.is_empty() {
                value = Some(dumpable[self.rng.random_range(0..dumpable.len())].clone());
            }
        }
        let value = match value {
            Some(v) => v,
            None => {
                let mut ty = self.pick_type();
                while !ty.can_dump() {
                    ty = self.pick_type();
                }
                self.generate_value_of_type(&ty)
            }
        };
        out.push(Node::call("fuzz_dump", vec![Node::name("__LINE__"), value]));
    }

    fn gen_echo(&mut self, out: &mut Vec<Node>) {
        let s = self.string_value();
        out.push(Node::new(Op::Echo, vec![s, Node::string_lit("\n")]));
    }

    fn gen_void_call(&mut self, out: &mut Vec<Node>) {
        match self.call_of_type(&Type::VOID) {
            Some(call) => out.push(call),
            None => self.gen_dump(out),
        }
    }

    /// A bounded `while` or `do-while`. The counter is not in scope, so the
    /// body cannot touch it.
    fn gen_loop(&mut self, out: &mut Vec<Node>) {
        let counter = self.fresh_loop_counter();
        let limit = self.range(1, self.config.max_loop_iterations) as i64;
        out.push(Node::assign(Node::var(counter.clone(), Type::INT), Node::int_lit(0)));

        self.jump_targets.push(JumpTarget::Loop);
        let body = self.gen_block();
        self.jump_targets.pop();

        let bump = Node::unary(Op::PostInc, Node::var(counter, Type::INT));
        if self.chance(0.5) {
            let cond = Node::binary(Op::Less, bump, Node::int_lit(limit));
            out.push(Node::new(Op::While, vec![cond, body]));
        } else {
            let cond = Node::binary(Op::Less, bump, Node::int_lit(limit - 1));
            out.push(Node::new(Op::DoWhile, vec![body, cond]));
        }
    }

    /// Int or string tags only; float case labels compare inexactly.
    fn switch_tag_type(&mut self) -> Type {
        match self.rng.random_range(0..4) {
            0 => Type::INT,
            1 => Type::STRING,
            2 => self.gen_enum_type(ScalarKind::Int),
            _ => self.gen_enum_type(ScalarKind::String),
        }
    }

    fn gen_case_body(&mut self) -> Vec<Node> {
        self.scope.enter();
        self.stmt_depth += 1;
        self.jump_targets.push(JumpTarget::Switch);
        let n = self.range(0, 2);
        let mut stmts = Vec::with_capacity(n + 1);
        self.gen_stmts(n, &mut stmts);
        if !stmts.last().is_some_and(terminates) && self.chance(self.config.p_case_break) {
            stmts.push(Node::new(Op::Break, Vec::new()));
        }
        self.jump_targets.pop();
        self.stmt_depth -= 1;
        self.scope.leave();
        stmts
    }

    fn gen_switch(&mut self, out: &mut Vec<Node>) {
        let tag_ty = self.switch_tag_type();
        let tag = self.generate_value_of_type(&tag_ty);

        let n_candidates = self.range(1, self.config.max_cases.max(1));
        let mut seen = Vec::with_capacity(n_candidates);
        let mut args = vec![tag];
        for _ in 0..n_candidates {
            let value = self.generate_const_value_of_type(&tag_ty);
            let Some(lit) = value.extract_value() else {
                panic!("case label is not a literal: {value:?}");
            };
            if seen.iter().any(|s: &Literal| s.same(&lit)) {
                continue;
            }
            seen.push(lit);
            let mut case = vec![value];
            case.extend(self.gen_case_body());
            args.push(Node::new(Op::Case, case));
        }
        if self.chance(self.config.p_default_case) {
            let body = self.gen_case_body();
            args.push(Node::new(Op::Default, body));
        }
        out.push(Node::new(Op::Switch, args));
    }
}

/// Whether `rhs` is `lhs` itself, possibly parenthesized.
fn same_lvalue(lhs: &Node, rhs: &Node) -> bool {
    let mut rhs = rhs;
    while rhs.op == Op::Parens {
        rhs = &rhs.args[0];
    }
    rhs.op == lhs.op && rhs.value == lhs.value && rhs.args == lhs.args
}
