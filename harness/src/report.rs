use anyhow::{Context, Result};
use similar::TextDiff;
use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use crate::run::RunResult;

/// Output fragments that mean a run hit an error the generator should
/// never provoke.
const EXCEPTION_PATTERNS: &[&str] = &["uncaught exception", "fatal error"];

/// How a round ended.
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    Match,
    /// Unified diff of php against kphp stdout.
    Diverged(String),
    /// Engine name and the offending line.
    Exception(&'static str, String),
    CompileError,
    Timeout,
}

impl Verdict {
    /// Whether the round's directory is kept for inspection.
    pub fn is_finding(&self) -> bool {
        !matches!(self, Verdict::Match | Verdict::Timeout)
    }

    pub fn label(&self) -> &'static str {
        match self {
            Verdict::Match => "match",
            Verdict::Diverged(_) => "diverged",
            Verdict::Exception(..) => "exception",
            Verdict::CompileError => "compile error",
            Verdict::Timeout => "timeout",
        }
    }
}

fn find_exception(r: &RunResult) -> Option<String> {
    r.stdout.lines().chain(r.stderr.lines()).find_map(|line| {
        let lower = line.to_lowercase();
        EXCEPTION_PATTERNS
            .iter()
            .any(|p| lower.contains(p))
            .then(|| line.to_string())
    })
}

/// One engine's run, labelled with the engine's name.
pub type Named<'a> = (&'static str, &'a RunResult);

/// Compare the reference engine's run against the compiled engine's.
pub fn judge((ref_name, reference): Named<'_>, (name, compiled): Named<'_>) -> Verdict {
    if !compiled.compilation {
        return Verdict::CompileError;
    }
    if !reference.termination || !compiled.termination {
        return Verdict::Timeout;
    }
    if let Some(line) = find_exception(reference) {
        return Verdict::Exception(ref_name, line);
    }
    if let Some(line) = find_exception(compiled) {
        return Verdict::Exception(name, line);
    }

    let diff = TextDiff::from_lines(&reference.stdout, &compiled.stdout);
    if diff.ratio() == 1.0 {
        Verdict::Match
    } else {
        Verdict::Diverged(diff.unified_diff().header(ref_name, name).to_string())
    }
}

/// Write `dir/log` describing a kept round.
pub fn write_log(dir: &Path, seed: u64, verdict: &Verdict, runs: [Named<'_>; 2]) -> Result<()> {
    let mut log = String::new();
    writeln!(log, "seed: {seed}")?;
    writeln!(log, "verdict: {}", verdict.label())?;
    match verdict {
        Verdict::Diverged(diff) => writeln!(log, "\n{diff}")?,
        Verdict::Exception(engine, line) => writeln!(log, "{engine}: {line}")?,
        _ => {}
    }
    for (name, r) in runs {
        writeln!(log, "\n== {name} (exit {:?}) ==", r.exit_code)?;
        writeln!(log, "-- stdout --\n{}", r.stdout)?;
        writeln!(log, "-- stderr --\n{}", r.stderr)?;
    }
    let path = dir.join("log");
    fs::write(&path, log).with_context(|| format!("writing {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ok(stdout: &str) -> RunResult {
        RunResult {
            stdout: stdout.to_string(),
            compilation: true,
            termination: true,
            exit_code: Some(0),
            ..RunResult::default()
        }
    }

    fn pair<'a>(php: &'a RunResult, kphp: &'a RunResult) -> Verdict {
        judge(("php", php), ("kphp", kphp))
    }

    #[test]
    fn test_judge() {
        assert_eq!(pair(&ok("a\nb\n"), &ok("a\nb\n")), Verdict::Match);
        let Verdict::Diverged(diff) = pair(&ok("a\nb\n"), &ok("a\nc\n")) else {
            panic!("expected a divergence");
        };
        assert!(diff.contains("-b"));
        assert!(diff.contains("+c"));

        let broken = RunResult {
            compilation: false,
            ..ok("")
        };
        assert_eq!(pair(&ok(""), &broken), Verdict::CompileError);

        let hung = RunResult {
            termination: false,
            ..ok("")
        };
        assert_eq!(pair(&hung, &ok("")), Verdict::Timeout);
    }

    #[test]
    fn test_exception_patterns() {
        let php = ok("line 3: int(1)\nPHP Fatal error:  Uncaught DivisionByZeroError\n");
        assert!(matches!(pair(&php, &ok("")), Verdict::Exception("php", _)));
    }

    #[test]
    fn test_engine_names_label_output() {
        let crashed = ok("Fatal error: oops\n");
        let verdict = judge(("php8.3", &ok("")), ("kphp-nightly", &crashed));
        assert_eq!(verdict, Verdict::Exception("kphp-nightly", "Fatal error: oops".to_string()));

        let Verdict::Diverged(diff) = judge(("php8.3", &ok("x\n")), ("kphp-nightly", &ok("y\n"))) else {
            panic!("expected a divergence");
        };
        assert!(diff.contains("--- php8.3"));
        assert!(diff.contains("+++ kphp-nightly"));
    }

    #[test]
    fn test_write_log() {
        let dir = tempfile::tempdir().unwrap();
        let (x, y) = (ok("x\n"), ok("y\n"));
        let verdict = pair(&x, &y);
        write_log(dir.path(), 7, &verdict, [("php", &x), ("kphp", &y)]).unwrap();
        let log = fs::read_to_string(dir.path().join("log")).unwrap();
        assert!(log.starts_with("seed: 7\nverdict: diverged\n"));
        assert!(log.contains("== kphp (exit Some(0)) =="));
    }
}
