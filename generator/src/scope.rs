use std::collections::HashSet;

use crate::types::Type;

#[derive(Clone, Debug, PartialEq)]
pub struct ScopeVar {
    pub name: String,
    pub ty: Type,
}

/// Block-scoped variables. Frames are counts over one flat list, so leaving
/// a frame is a truncate.
#[derive(Default)]
pub struct Scope {
    vars: Vec<ScopeVar>,
    depths: Vec<usize>,
}

impl Scope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enter(&mut self) {
        self.depths.push(0);
    }

    pub fn leave(&mut self) {
        let Some(n) = self.depths.pop() else {
            panic!("leaving a scope without a frame");
        };
        self.vars.truncate(self.vars.len() - n);
    }

    pub fn depth(&self) -> usize {
        self.depths.len()
    }

    pub fn push_var(&mut self, name: impl Into<String>, ty: Type) {
        let Some(n) = self.depths.last_mut() else {
            panic!("pushing a var without a frame");
        };
        *n += 1;
        self.vars.push(ScopeVar {
            name: name.into(),
            ty,
        });
    }

    /// Variables pushed into the innermost frame, oldest first.
    pub fn current_block_vars(&self) -> &[ScopeVar] {
        let n = self.depths.last().copied().unwrap_or(0);
        &self.vars[self.vars.len() - n..]
    }

    /// Newest visible variable matching `pred`. Shadowed bindings are skipped:
    /// once a name is seen, older entries with that name are not considered.
    pub fn find_var(&self, mut pred: impl FnMut(&ScopeVar) -> bool) -> Option<&ScopeVar> {
        let mut seen = HashSet::new();
        for v in self.vars.iter().rev() {
            if !seen.insert(v.name.as_str()) {
                continue;
            }
            if pred(v) {
                return Some(v);
            }
        }
        None
    }

    pub fn find_var_of_type(&self, ty: &Type) -> Option<&ScopeVar> {
        self.find_var(|v| v.ty.identical(ty))
    }

    pub fn find_var_by_name(&self, name: &str) -> Option<&ScopeVar> {
        self.find_var(|v| v.name == name)
    }

    /// All visible variables, newest first.
    pub fn visible_vars(&self) -> Vec<&ScopeVar> {
        let mut seen = HashSet::new();
        self.vars
            .iter()
            .rev()
            .filter(|v| seen.insert(v.name.as_str()))
            .collect()
    }
}
