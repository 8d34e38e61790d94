//! Random, well-typed PHP programs for differential testing of the PHP
//! interpreter against the KPHP compiler.

mod catalog;
mod config;
mod emit;
mod expr;
mod generator;
mod program;
mod runtime;
mod scope;
mod stmt;
mod symbol;
pub mod tree;
pub mod types;
mod value;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

pub use crate::config::{ConfigError, GeneratorConfig};
pub use crate::emit::{print_file, Emit, EmitFlags, Emitter};
pub use crate::generator::Generator;
pub use crate::symbol::SymbolTable;
pub use crate::tree::{File, Program, RuntimeFile};

/// Generate a program from a caller-owned rng.
pub fn create_program<R: Rng>(rng: R, config: &GeneratorConfig) -> Program {
    Generator::new(rng, *config).create_program()
}

/// Generate the program for `seed`. The same seed and config always give
/// the same program.
#[tracing::instrument(skip(config))]
pub fn generate(seed: u64, config: &GeneratorConfig) -> Program {
    create_program(StdRng::seed_from_u64(seed), config)
}

/// Every file of `program` as `(name, contents)`, runtime files first.
pub fn render(program: &Program) -> Vec<(String, String)> {
    let runtime = program
        .runtime_files
        .iter()
        .map(|f| (f.name.to_string(), f.contents.to_string()));
    let generated = program.files.iter().map(|f| (f.name.clone(), print_file(f)));
    runtime.chain(generated).collect()
}
