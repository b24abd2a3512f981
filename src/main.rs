use std::io::{self, BufRead, Write};
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};

use business_enricher::{
    check_keys, init_tracing, load_records, AppConfig, AppError, EnrichmentPipeline,
    KeyCheckReport, ProgressObserver, RunProgress, RunSummary,
};

mod cli;

use cli::{CheckKeysArgs, Command, RootArgs, RunArgs};

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();
    let args = RootArgs::parse();
    let outcome = match args.command {
        Command::Run(args) => run(args).await,
        Command::CheckKeys(args) => check(args).await,
    };
    match outcome {
        Ok(code) => code,
        Err(err) => {
            if let Some(app_err) = err.downcast_ref::<AppError>() {
                if app_err.is_config() {
                    eprintln!("configuration error: {app_err}");
                    return ExitCode::from(2);
                }
            }
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: RunArgs) -> Result<ExitCode> {
    let mut config = AppConfig::from_env();
    if let Some(every) = args.checkpoint_every {
        config.checkpoint_every = every;
    }
    if let Some(delay) = args.delay_ms {
        config.record_delay_ms = delay;
    }

    let mut records = load_records(&args.input)?;
    let pipeline = EnrichmentPipeline::new(&config, &args.output)?;

    if !args.skip_key_check {
        let report = check_keys(&config).await?;
        print_report(&report);
        if !report.all_ok() && !args.yes && !confirm("API key check failed. Continue anyway?")? {
            println!("Aborted.");
            return Ok(ExitCode::FAILURE);
        }
    }

    let limit = match args.limit {
        Some(limit) => Some(limit),
        None if args.yes => None,
        None => prompt_limit(records.len())?,
    };
    let planned = limit.map_or(records.len(), |limit| limit.min(records.len()));
    if !args.yes
        && !confirm(&format!(
            "Process {planned} of {} record(s) into {}?",
            records.len(),
            args.output.display()
        ))?
    {
        println!("Aborted.");
        return Ok(ExitCode::SUCCESS);
    }

    let cancel_flag = Arc::new(AtomicBool::new(false));
    let interrupt = cancel_flag.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_err() {
            return;
        }
        warn!("interrupt received; stopping after the current record (press Ctrl-C again to quit now)");
        interrupt.store(true, Ordering::SeqCst);
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("interrupted again; exiting without a final checkpoint");
            std::process::exit(130);
        }
    });

    let observer: ProgressObserver = Arc::new(|progress: RunProgress| {
        println!(
            "[{}/{}] {}: {}",
            progress.index,
            progress.total,
            progress.business_name,
            progress.status.as_str()
        );
    });

    let summary = pipeline
        .run(&mut records, limit, Some(observer), Some(cancel_flag))
        .await;
    print_summary(&summary, &pipeline);

    if summary.final_checkpoint_written {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}

async fn check(args: CheckKeysArgs) -> Result<ExitCode> {
    let config = AppConfig::from_env();
    let report = check_keys(&config).await?;
    if args.json {
        let body = serde_json::to_string_pretty(&report).context("failed to encode report")?;
        println!("{body}");
    } else {
        print_report(&report);
    }
    Ok(if report.all_ok() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn print_report(report: &KeyCheckReport) {
    for check in report.checks() {
        let mark = if check.ok { "ok" } else { "FAILED" };
        println!("{:<14} {:<6} {}", check.service, mark, check.detail);
    }
}

fn print_summary(summary: &RunSummary, pipeline: &EnrichmentPipeline) {
    info!(?summary, "run summary");
    println!();
    println!("Processed:        {}", summary.processed);
    println!("  Success:        {}", summary.succeeded);
    println!("  Partial:        {}", summary.partial);
    println!("  Failed:         {}", summary.failed);
    println!("Not processed:    {}", summary.not_processed);
    if summary.cancelled {
        println!("Run was interrupted before completion.");
    }
    if summary.checkpoint_failures > 0 {
        println!("Checkpoint failures: {}", summary.checkpoint_failures);
    }
    if summary.final_checkpoint_written {
        println!("Output written to {}", pipeline.output_path().display());
    } else {
        println!(
            "Final output could not be written to {}",
            pipeline.output_path().display()
        );
    }
}

fn confirm(question: &str) -> Result<bool> {
    let answer = read_answer(&format!("{question} [y/N] "))?;
    Ok(matches!(answer.to_ascii_lowercase().as_str(), "y" | "yes"))
}

/// Blank input means every record.
fn prompt_limit(total: usize) -> Result<Option<usize>> {
    loop {
        let answer = read_answer(&format!(
            "How many records should be processed? [all {total}] "
        ))?;
        if answer.is_empty() || answer.eq_ignore_ascii_case("all") {
            return Ok(None);
        }
        match answer.parse::<usize>() {
            Ok(limit) => return Ok(Some(limit)),
            Err(_) => println!("Please enter a whole number, or press enter for all records."),
        }
    }
}

fn read_answer(prompt: &str) -> Result<String> {
    let mut stdout = io::stdout();
    write!(stdout, "{prompt}")?;
    stdout.flush()?;
    let mut line = String::new();
    io::stdin()
        .lock()
        .read_line(&mut line)
        .context("failed to read from stdin")?;
    Ok(line.trim().to_string())
}
