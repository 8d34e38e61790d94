use anyhow::{Context, Result};

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;
use subprocess::{ExitStatus, Popen, PopenConfig, Redirection};

/// Result of running a generated program on one engine.
#[derive(Debug, Clone, Default)]
pub struct RunResult {
    pub stdout: String,
    pub stderr: String,
    /// `true` if the program compiled. Always set for the interpreter.
    pub compilation: bool,
    /// `true` if the program finished before the timeout.
    pub termination: bool,
    /// Exit code, when the process exited normally.
    pub exit_code: Option<u32>,
}

impl RunResult {
    pub fn succeeded(&self) -> bool {
        self.compilation && self.termination && self.exit_code == Some(0)
    }
}

/// An engine that can execute `main.php` from a program directory.
pub trait Runner: Send + Sync {
    fn name(&self) -> &'static str;
    fn run(&self, dir: &Path, timeout: Duration) -> Result<RunResult>;
}

/// `php -f main.php`
pub struct Php {
    pub bin: PathBuf,
}

impl Runner for Php {
    fn name(&self) -> &'static str {
        "php"
    }

    fn run(&self, dir: &Path, timeout: Duration) -> Result<RunResult> {
        let argv = [self.bin.clone().into_os_string(), "-f".into(), "main.php".into()];
        spawn(&argv, dir, timeout)
    }
}

/// `kphp --mode cli -o BIN main.php`, then the compiled binary.
pub struct Kphp {
    pub bin: PathBuf,
    pub compile_timeout: Duration,
}

const KPHP_BINARY: &str = "kphp_out";

impl Runner for Kphp {
    fn name(&self) -> &'static str {
        "kphp"
    }

    fn run(&self, dir: &Path, timeout: Duration) -> Result<RunResult> {
        let argv = [
            self.bin.clone().into_os_string(),
            "--mode".into(),
            "cli".into(),
            "-o".into(),
            KPHP_BINARY.into(),
            "main.php".into(),
        ];
        let compiled = spawn(&argv, dir, self.compile_timeout)?;
        if !compiled.succeeded() {
            return Ok(RunResult {
                compilation: false,
                ..compiled
            });
        }
        spawn(&[dir.join(KPHP_BINARY).into_os_string()], dir, timeout)
    }
}

/// Run `argv` in `dir` for at most `timeout`, capturing both streams.
/// A process still running at the deadline is killed.
fn spawn(argv: &[OsString], dir: &Path, timeout: Duration) -> Result<RunResult> {
    let mut p = Popen::create(
        argv,
        PopenConfig {
            stdout: Redirection::Pipe,
            stderr: Redirection::Pipe,
            cwd: Some(dir.as_os_str().to_owned()),
            ..Default::default()
        },
    )
    .with_context(|| format!("spawning {:?}", argv[0]))?;

    let (streams, status) = match p.communicate_start(None).limit_time(timeout).read() {
        // Streams closed; the process may still be on its way out.
        Ok(streams) => (streams, p.wait_timeout(timeout).context("waiting for a process")?),
        // Timed out; keep whatever was printed so far.
        Err(err) => (err.capture, p.poll()),
    };
    let (stdout, stderr) = streams;

    let (termination, exit_code) = match status {
        Some(ExitStatus::Exited(code)) => (true, Some(code)),
        Some(_) => (true, None),
        None => {
            p.kill().context("killing a timed out process")?;
            p.wait().context("reaping a killed process")?;
            (false, None)
        }
    };

    let text = |bytes: Option<Vec<u8>>| String::from_utf8_lossy(&bytes.unwrap_or_default()).into_owned();
    Ok(RunResult {
        stdout: text(stdout),
        stderr: text(stderr),
        compilation: true,
        termination,
        exit_code,
    })
}
