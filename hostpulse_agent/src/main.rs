//! Entry point for the hostpulse agent. Streams snapshots to stdout as JSON lines.

mod logging;
mod settings;

use std::env;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use hostpulse::{MonitorConfig, MonitorEngine, RankBy, Snapshot};
use tokio::sync::mpsc;
use tracing::info;

#[derive(Debug, Default, PartialEq)]
struct ParsedArgs {
    interval_ms: Option<u64>,
    top_n: Option<usize>,
    rank_by: Option<RankBy>,
    count: Option<usize>,
    config: Option<PathBuf>,
    save: bool,
}

#[derive(Debug, PartialEq)]
enum ArgError {
    Help(String),
    Invalid(String),
}

fn usage(prog: &str) -> String {
    format!(
        "Usage: {prog} [--interval MS|-i MS] [--top N|-n N] [--rank-by memory|cpu] [--count N|-c N] [--config PATH] [--save]"
    )
}

fn parse_args<I: IntoIterator<Item = String>>(args: I) -> Result<ParsedArgs, ArgError> {
    let mut it = args.into_iter();
    let prog = it.next().unwrap_or_else(|| "hostpulse_agent".into());
    let mut parsed = ParsedArgs::default();

    while let Some(arg) = it.next() {
        // --flag=value is accepted for every flag taking a value
        let (flag, inline) = match arg.split_once('=') {
            Some((f, v)) if f.starts_with("--") => (f.to_string(), Some(v.to_string())),
            _ => (arg.clone(), None),
        };
        let mut value = |name: &str| {
            inline
                .clone()
                .or_else(|| it.next())
                .filter(|v| !v.is_empty())
                .ok_or_else(|| ArgError::Invalid(format!("{name} needs a value\n{}", usage(&prog))))
        };
        match flag.as_str() {
            "-h" | "--help" => return Err(ArgError::Help(usage(&prog))),
            "--interval" | "-i" => parsed.interval_ms = Some(number(&value("--interval")?, &prog)?),
            "--top" | "-n" => parsed.top_n = Some(number(&value("--top")?, &prog)?),
            "--count" | "-c" => {
                let n: usize = number(&value("--count")?, &prog)?;
                if n == 0 {
                    return Err(ArgError::Invalid(format!(
                        "--count must be at least 1\n{}",
                        usage(&prog)
                    )));
                }
                parsed.count = Some(n);
            }
            "--rank-by" => {
                let v = value("--rank-by")?;
                parsed.rank_by = Some(v.parse().map_err(|e| {
                    ArgError::Invalid(format!("{e}\n{}", usage(&prog)))
                })?);
            }
            "--config" => parsed.config = Some(PathBuf::from(value("--config")?)),
            "--save" => parsed.save = true,
            _ => {
                return Err(ArgError::Invalid(format!(
                    "Unexpected argument '{arg}'. {}",
                    usage(&prog)
                )))
            }
        }
    }
    Ok(parsed)
}

fn number<T: std::str::FromStr>(v: &str, prog: &str) -> Result<T, ArgError> {
    v.parse()
        .map_err(|_| ArgError::Invalid(format!("'{v}' is not a valid number\n{}", usage(prog))))
}

/// defaults < settings file < environment < flags
fn resolve_config(parsed: &ParsedArgs) -> MonitorConfig {
    resolve_config_with(parsed, |k| env::var(k).ok())
}

fn resolve_config_with(parsed: &ParsedArgs, var: impl Fn(&str) -> Option<String>) -> MonitorConfig {
    let mut config = settings::load_settings(parsed.config.as_deref()).with_vars(var);
    if let Some(ms) = parsed.interval_ms {
        config.interval_ms = ms;
    }
    if let Some(n) = parsed.top_n {
        config.top_n = n;
    }
    if let Some(r) = parsed.rank_by {
        config.rank_by = r;
    }
    config
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let parsed = match parse_args(env::args()) {
        Ok(v) => v,
        Err(ArgError::Help(msg)) => {
            eprintln!("{msg}");
            return Ok(());
        }
        Err(ArgError::Invalid(msg)) => {
            eprintln!("{msg}");
            std::process::exit(2);
        }
    };
    logging::init();

    let config = resolve_config(&parsed);
    if parsed.save {
        let path = settings::save_settings(parsed.config.as_deref(), &config)
            .context("saving settings")?;
        info!("settings saved to {}", path.display());
    }

    let engine = MonitorEngine::new(config);
    let (tx, mut rx) = mpsc::unbounded_channel::<Arc<Snapshot>>();
    engine.register(move |snap| {
        let _ = tx.send(snap);
    });
    engine.start(config.interval_ms).await;

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut printed = 0usize;
    let result = loop {
        tokio::select! {
            Some(snap) = rx.recv() => {
                if let Err(e) = emit(&snap) {
                    break Err(e);
                }
                printed += 1;
                if parsed.count.is_some_and(|c| printed >= c) {
                    break Ok(());
                }
            }
            _ = &mut ctrl_c => {
                info!("interrupted");
                break Ok(());
            }
        }
    };
    engine.stop().await;
    result
}

fn emit(snap: &Snapshot) -> anyhow::Result<()> {
    let line = serde_json::to_string(snap).context("encoding snapshot")?;
    let mut out = io::stdout().lock();
    writeln!(out, "{line}")
        .and_then(|_| out.flush())
        .context("writing snapshot")
}
