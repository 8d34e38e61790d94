use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use phpsmith::GeneratorConfig;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{mpsc, Arc, Mutex};
use std::thread;
use std::time::Duration;
use tracing::{debug, error, info};

mod report;
mod run;
mod setup;

use crate::report::{judge, write_log, Verdict};
use crate::run::{Kphp, Php, Runner};
use crate::setup::{init_tracing, load_config, write_program};

#[derive(Parser, Debug)]
#[command(name = "phpsmith-fuzz")]
struct Args {
    /// Master seed; each round's seed is drawn from it in order
    #[arg(long)]
    seed: Option<u64>,
    /// Directory that receives one subdirectory per round
    #[arg(short, long, value_name = "DIR", default_value = "phpsmith-out")]
    out: PathBuf,
    /// Number of worker threads
    #[arg(long)]
    concurrency: Option<usize>,
    /// Number of rounds; runs until interrupted when absent
    #[arg(long)]
    rounds: Option<u64>,
    /// Seconds before a run is killed
    #[arg(long, default_value_t = 5)]
    timeout: u64,
    /// Seconds allowed for KPHP compilation
    #[arg(long, default_value_t = 300)]
    compile_timeout: u64,
    /// PHP interpreter
    #[arg(long, value_name = "BIN", default_value = "php")]
    php: PathBuf,
    /// KPHP compiler
    #[arg(long, value_name = "BIN", default_value = "kphp")]
    kphp: PathBuf,
    /// Path to .toml generator configuration
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,
}

/// One round of work.
struct Job {
    dir: PathBuf,
    seed: u64,
}

/// Round seeds drawn in order from a master seed. Ends after `rounds`
/// seeds, or once `stop` is raised.
struct Seeds {
    rng: StdRng,
    remaining: Option<u64>,
    stop: Arc<AtomicBool>,
}

impl Seeds {
    fn new(master_seed: u64, rounds: Option<u64>, stop: Arc<AtomicBool>) -> Self {
        Seeds {
            rng: StdRng::seed_from_u64(master_seed),
            remaining: rounds,
            stop,
        }
    }
}

impl Iterator for Seeds {
    type Item = u64;

    fn next(&mut self) -> Option<u64> {
        if self.stop.load(Ordering::SeqCst) || self.remaining == Some(0) {
            return None;
        }
        if let Some(n) = &mut self.remaining {
            *n -= 1;
        }
        Some(self.rng.random())
    }
}

#[derive(Default)]
struct Stats {
    rounds: AtomicUsize,
    findings: AtomicUsize,
    timeouts: AtomicUsize,
    failures: AtomicUsize,
}

struct Fuzzer {
    config: GeneratorConfig,
    php: Php,
    kphp: Kphp,
    timeout: Duration,
    stats: Stats,
}

impl Fuzzer {
    fn round(&self, job: &Job) -> Result<Verdict> {
        let program = phpsmith::generate(job.seed, &self.config);
        write_program(&job.dir, &program)?;

        let php = self.php.run(&job.dir, self.timeout)?;
        let kphp = self.kphp.run(&job.dir, self.timeout)?;
        let php = (self.php.name(), &php);
        let kphp = (self.kphp.name(), &kphp);
        let verdict = judge(php, kphp);
        debug!(seed = job.seed, verdict = verdict.label(), "round finished");

        if verdict.is_finding() {
            write_log(&job.dir, job.seed, &verdict, [php, kphp])?;
        } else {
            fs::remove_dir_all(&job.dir).with_context(|| format!("removing {}", job.dir.display()))?;
        }
        Ok(verdict)
    }

    fn worker(&self, jobs: &Mutex<mpsc::Receiver<Job>>) {
        loop {
            // Hold the lock only while taking a job.
            let job = match jobs.lock() {
                Ok(rx) => rx.recv(),
                Err(_) => return,
            };
            let Ok(job) = job else {
                return;
            };

            self.stats.rounds.fetch_add(1, Ordering::Relaxed);
            match self.round(&job) {
                Ok(Verdict::Timeout) => {
                    self.stats.timeouts.fetch_add(1, Ordering::Relaxed);
                }
                Ok(verdict) if verdict.is_finding() => {
                    self.stats.findings.fetch_add(1, Ordering::Relaxed);
                    println!(
                        "{} seed {} -> {}",
                        verdict.label().to_uppercase().red().bold(),
                        job.seed,
                        job.dir.display()
                    );
                }
                Ok(_) => {}
                Err(e) => {
                    self.stats.failures.fetch_add(1, Ordering::Relaxed);
                    error!(seed = job.seed, "round failed: {e:#}");
                }
            }
        }
    }
}

fn main() -> Result<()> {
    init_tracing();
    let args = Args::parse();

    let config = load_config(args.config.as_deref())?;
    fs::create_dir_all(&args.out).with_context(|| format!("creating {}", args.out.display()))?;

    let master_seed = args.seed.unwrap_or_else(rand::random);
    let concurrency = args
        .concurrency
        .or_else(|| thread::available_parallelism().ok().map(|n| n.get()))
        .unwrap_or(1)
        .max(1);
    info!(master_seed, concurrency, "fuzzing");

    let fuzzer = Fuzzer {
        config,
        php: Php { bin: args.php },
        kphp: Kphp {
            bin: args.kphp,
            compile_timeout: Duration::from_secs(args.compile_timeout),
        },
        timeout: Duration::from_secs(args.timeout),
        stats: Stats::default(),
    };

    // Ctrl-C stops handing out rounds; workers finish what they hold and the
    // summary still prints.
    let stop = Arc::new(AtomicBool::new(false));
    let handler_stop = Arc::clone(&stop);
    ctrlc::set_handler(move || handler_stop.store(true, Ordering::SeqCst))
        .context("installing the interrupt handler")?;

    let (tx, rx) = mpsc::sync_channel::<Job>(concurrency);
    let rx = Mutex::new(rx);
    thread::scope(|s| {
        for _ in 0..concurrency {
            s.spawn(|| fuzzer.worker(&rx));
        }

        // Seeds are drawn here, in order, so a master seed names the same
        // set of programs whatever the workers do.
        for seed in Seeds::new(master_seed, args.rounds, Arc::clone(&stop)) {
            let job = Job {
                dir: args.out.join(format!("{seed:016x}")),
                seed,
            };
            if tx.send(job).is_err() {
                break;
            }
        }
        drop(tx);
    });
    if stop.load(Ordering::SeqCst) {
        info!("interrupted");
    }

    let stats = &fuzzer.stats;
    let findings = stats.findings.load(Ordering::Relaxed);
    let summary = format!(
        "{} rounds, {} findings, {} timeouts, {} failed",
        stats.rounds.load(Ordering::Relaxed),
        findings,
        stats.timeouts.load(Ordering::Relaxed),
        stats.failures.load(Ordering::Relaxed),
    );
    if findings > 0 {
        println!("{}", summary.red());
    } else {
        println!("{}", summary.green());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seeds_follow_master_seed() {
        let stop = Arc::new(AtomicBool::new(false));
        let a: Vec<u64> = Seeds::new(11, Some(5), Arc::clone(&stop)).collect();
        let b: Vec<u64> = Seeds::new(11, None, Arc::clone(&stop)).take(8).collect();
        assert_eq!(a.len(), 5);
        assert_eq!(a[..], b[..5]);
        assert_ne!(a, Seeds::new(12, Some(5), stop).collect::<Vec<_>>());
    }

    #[test]
    fn test_seeds_end_when_stopped() {
        let stop = Arc::new(AtomicBool::new(false));
        let mut seeds = Seeds::new(3, None, Arc::clone(&stop));
        assert!(seeds.by_ref().take(4).count() == 4);
        stop.store(true, Ordering::SeqCst);
        assert_eq!(seeds.next(), None);
        assert_eq!(seeds.next(), None);
    }
}
