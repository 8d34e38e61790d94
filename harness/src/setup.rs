use anyhow::{Context, Result};
use phpsmith::{render, GeneratorConfig, Program};
use std::fs;
use std::path::Path;
use tracing_subscriber::EnvFilter;

/// Log to stderr, filtered by `PHPSMITH_LOG` (default `info`).
pub fn init_tracing() {
    let filter = EnvFilter::try_from_env("PHPSMITH_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// The config at `path`, or the defaults.
pub fn load_config(path: Option<&Path>) -> Result<GeneratorConfig> {
    let Some(path) = path else {
        return Ok(GeneratorConfig::default());
    };
    let text = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    GeneratorConfig::from_toml(&text).with_context(|| format!("parsing {}", path.display()))
}

/// Write the runtime and generated files of `program` into `dir`.
pub fn write_program(dir: &Path, program: &Program) -> Result<()> {
    fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    for (name, contents) in render(program) {
        let path = dir.join(&name);
        fs::write(&path, contents).with_context(|| format!("writing {}", path.display()))?;
    }
    Ok(())
}
