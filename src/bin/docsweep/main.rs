use anyhow::Result;
use clap::Parser;
use env_logger::{Builder, Env};
use log::error;
use std::io::Write;
use std::sync::Arc;

use docsweep::{FileConfig, SweepConfig, SweepReport, Sweeper};

mod cli;
mod util;

fn init_logger(level: &str) {
    // Уровень берём из RUST_LOG, иначе из --log-level.
    // Формат: [время поток УРОВЕНЬ] сообщение; воркеры называются DEL1..DELn.
    Builder::from_env(Env::default().default_filter_or(level))
        .format(|buf, record| {
            let ts = buf.timestamp_millis();
            let th = std::thread::current();
            writeln!(
                buf,
                "[{} {} {}] {}",
                ts,
                th.name().unwrap_or("main"),
                record.level(),
                record.args()
            )
        })
        .init();
}

fn main() {
    let args = cli::Cli::parse();

    let level = match util::parse_level(&args.log_level) {
        Ok(l) => l,
        Err(e) => {
            eprintln!("error: {:#}", e);
            std::process::exit(2);
        }
    };
    init_logger(&level.to_string().to_ascii_lowercase());

    if let Err(e) = run(args) {
        // Логируем ошибку и выходим с кодом 1.
        error!("{:#}", e);
        std::process::exit(1);
    }
}

fn run(args: cli::Cli) -> Result<()> {
    // env < file < CLI
    let mut cfg = SweepConfig::from_env();
    if let Some(ref p) = args.config {
        cfg = cfg.merge_file(&FileConfig::load(p)?);
    }
    if let Some(n) = args.threads_count {
        cfg = cfg.with_threads_count(n);
    }
    if let Some(n) = args.batch_size {
        cfg = cfg.with_batch_size(n);
    }
    if let Some(ms) = args.empty_timeout_ms {
        cfg = cfg.with_empty_queue_timeout_ms(ms);
    }
    if let Some(n) = args.max_attempts {
        cfg = cfg.with_max_attempts(n);
    }
    let cfg = cfg.build()?;

    let store = util::open_store(&args.store, &args.collection)?;
    let sweeper = Sweeper::new(Arc::clone(&store), cfg)?;
    let policy = sweeper.config().retry_policy();
    let outcome = sweeper.execute(&args.collection, &policy);

    print_report(&outcome.report, args.json)?;
    outcome.into_result().map(|_| ())
}

fn print_report(r: &SweepReport, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string(r)?);
        return Ok(());
    }
    println!("Collection '{}':", r.collection);
    println!("  threads          = {}", r.threads_count);
    println!("  batch_size       = {}", r.batch_size);
    println!("  producer_attempts= {}", r.producer_attempts);
    println!(
        "  batches          = {} produced, {} committed",
        r.batches_produced, r.batches_committed
    );
    println!("  refs             = {} produced, {} deleted", r.refs_produced, r.refs_deleted);
    if !r.is_clean() {
        println!("  failed_batches   = {}", r.failed_batches);
        println!("  lost_refs        = {}", r.lost_refs);
        println!("  failed_workers   = [{}]", r.failed_workers.join(", "));
    }
    println!("  elapsed          = {} ms ({:.1} refs/s)", r.elapsed_ms, r.refs_per_sec());
    Ok(())
}
