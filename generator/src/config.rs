use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid config syntax: {0}")]
    Syntax(#[from] toml::de::Error),
    #[error("invalid range for {name}: min {min} > max {max}")]
    InvalidRange {
        name: &'static str,
        min: usize,
        max: usize,
    },
    #[error("{name} = {value} is not a probability")]
    Probability { name: &'static str, value: f64 },
    #[error("max_loop_iterations = {0} is outside 1..=10")]
    LoopBound(usize),
}

/// Knobs for program synthesis. All `min_*`/`max_*` pairs are inclusive.
#[derive(Debug, Copy, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GeneratorConfig {
    pub n_lib_files: usize,
    pub min_lib_funcs: usize,
    pub max_lib_funcs: usize,
    pub n_classes: usize,
    pub min_fields: usize,
    pub max_fields: usize,
    pub min_methods: usize,
    pub max_methods: usize,
    pub min_params: usize,
    pub max_params: usize,
    pub min_main_funcs: usize,
    pub max_main_funcs: usize,
    pub min_var_decls: usize,
    pub max_var_decls: usize,
    pub min_stmts: usize,
    pub max_stmts: usize,
    pub max_block_stmts: usize,
    pub max_stmt_depth: usize,
    pub max_expr_depth: usize,
    pub max_cases: usize,
    pub max_loop_iterations: usize,
    pub p_interesting_value: f64,
    pub p_paren: f64,
    pub p_decl_cast: f64,
    pub p_param_default: f64,
    pub p_else: f64,
    pub p_default_case: f64,
    pub p_case_break: f64,
    pub p_private_field: f64,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            n_lib_files: 2,
            min_lib_funcs: 2,
            max_lib_funcs: 4,
            n_classes: 3,
            min_fields: 1,
            max_fields: 4,
            min_methods: 0,
            max_methods: 3,
            min_params: 0,
            max_params: 4,
            min_main_funcs: 2,
            max_main_funcs: 4,
            min_var_decls: 1,
            max_var_decls: 4,
            min_stmts: 3,
            max_stmts: 8,
            max_block_stmts: 3,
            max_stmt_depth: 3,
            max_expr_depth: 5,
            max_cases: 5,
            max_loop_iterations: 10,
            p_interesting_value: 0.5,
            p_paren: 0.3,
            p_decl_cast: 0.3,
            p_param_default: 0.3,
            p_else: 0.5,
            p_default_case: 0.5,
            p_case_break: 0.8,
            p_private_field: 0.3,
        }
    }
}

impl GeneratorConfig {
    /// Parse a TOML document. Missing keys keep their defaults.
    pub fn from_toml(s: &str) -> Result<Self, ConfigError> {
        let config: GeneratorConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let ranges = [
            ("lib_funcs", self.min_lib_funcs, self.max_lib_funcs),
            ("fields", self.min_fields, self.max_fields),
            ("methods", self.min_methods, self.max_methods),
            ("params", self.min_params, self.max_params),
            ("main_funcs", self.min_main_funcs, self.max_main_funcs),
            ("var_decls", self.min_var_decls, self.max_var_decls),
            ("stmts", self.min_stmts, self.max_stmts),
        ];
        for (name, min, max) in ranges {
            if min > max {
                return Err(ConfigError::InvalidRange { name, min, max });
            }
        }

        let probabilities = [
            ("p_interesting_value", self.p_interesting_value),
            ("p_paren", self.p_paren),
            ("p_decl_cast", self.p_decl_cast),
            ("p_param_default", self.p_param_default),
            ("p_else", self.p_else),
            ("p_default_case", self.p_default_case),
            ("p_case_break", self.p_case_break),
            ("p_private_field", self.p_private_field),
        ];
        for (name, value) in probabilities {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::Probability { name, value });
            }
        }

        if !(1..=10).contains(&self.max_loop_iterations) {
            return Err(ConfigError::LoopBound(self.max_loop_iterations));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        GeneratorConfig::default().validate().unwrap();
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = GeneratorConfig::from_toml("n_classes = 7\np_paren = 0.0\n").unwrap();
        assert_eq!(config.n_classes, 7);
        assert_eq!(config.p_paren, 0.0);
        assert_eq!(config.max_expr_depth, GeneratorConfig::default().max_expr_depth);
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(matches!(
            GeneratorConfig::from_toml("min_stmts = 5\nmax_stmts = 2\n"),
            Err(ConfigError::InvalidRange { name: "stmts", .. })
        ));
        assert!(matches!(
            GeneratorConfig::from_toml("p_else = 1.5\n"),
            Err(ConfigError::Probability { name: "p_else", .. })
        ));
        assert!(matches!(
            GeneratorConfig::from_toml("max_loop_iterations = 11\n"),
            Err(ConfigError::LoopBound(11))
        ));
        assert!(matches!(
            GeneratorConfig::from_toml("n_classes = \"three\"\n"),
            Err(ConfigError::Syntax(_))
        ));
        assert!(matches!(
            GeneratorConfig::from_toml("no_such_knob = 1\n"),
            Err(ConfigError::Syntax(_))
        ));
    }
}
