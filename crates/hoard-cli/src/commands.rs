use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{anyhow, bail, Context};
use colored::Colorize;
use hoard_merge::WorkerPool;
use hoard_tasks::{
    audit_once, merge_once, pack_once, remove_local_data, retrieve, upload_once, vacate,
    AuditOptions, Collector, Config, Downloader, HttpFeedSource, MetricsSink, RetrieveOptions,
    Session, TaskResult, TracingMetrics,
};
use hoard_types::Hour;

use crate::cli::*;

const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    let mut config = Config::load(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;
    config.retain_feeds(&cli.feeds)?;
    let runner = FeedRunner::new(&config, !cli.no_concurrency);

    match cli.command {
        Command::Collector => cmd_collector(&config),
        Command::Config => cmd_config(&config),
        Command::Download => {
            let source = HttpFeedSource::new(FETCH_TIMEOUT)?;
            runner.run("download", |session| {
                Ok(match Downloader::new(session, &source).download()? {
                    Some(dfile) => format!("saved {dfile}"),
                    None => "unchanged".to_string(),
                })
            })
        }
        Command::Pack => runner.run("pack", |session| {
            let afiles = pack_once(session, None)?;
            Ok(format!("{} archive(s) written", afiles.len()))
        }),
        Command::Merge => runner.run("merge", |session| {
            let afiles = merge_once(session)?;
            Ok(format!("{} hour(s) merged", afiles.len()))
        }),
        Command::Upload => runner.run("upload", |session| {
            let afiles = upload_once(session)?;
            Ok(format!("{} archive(s) uploaded", afiles.len()))
        }),
        Command::Vacate(args) => cmd_vacate(&runner, &config, args, cli.feeds.is_empty()),
        Command::Audit(args) => {
            let options = AuditOptions {
                start: args.start,
                end: args.end.unwrap_or_else(Hour::now),
                fix: args.fix,
                enforce_compression: args.enforce_compression,
            };
            runner.run("audit", |session| {
                let fixed = audit_once(session, options)?;
                Ok(match fixed {
                    0 => "no problems".to_string(),
                    n => format!("{n} problem(s) fixed"),
                })
            })
        }
        Command::Retrieve(args) => {
            let options = RetrieveOptions {
                keep_packed: args.keep_packed,
                flatten_feeds: args.flatten_feeds,
                flatten_hours: args.flatten_hours,
                ..RetrieveOptions::new(args.path, args.start, args.end.unwrap_or_else(Hour::now))
            };
            runner.run("retrieve", |session| {
                let summary = retrieve(session, &options)?;
                Ok(format!(
                    "{} archive(s), {} download(s)",
                    summary.archives, summary.downloads
                ))
            })
        }
    }
}

/// Runs one action for every configured feed and reports per-feed results.
struct FeedRunner<'a> {
    config: &'a Config,
    concurrent: bool,
    metrics: Arc<dyn MetricsSink>,
    pool: Arc<WorkerPool>,
}

impl<'a> FeedRunner<'a> {
    fn new(config: &'a Config, concurrent: bool) -> Self {
        Self {
            config,
            concurrent,
            metrics: Arc::new(TracingMetrics),
            pool: Arc::new(WorkerPool::with_available_parallelism()),
        }
    }

    fn run<F>(&self, action: &str, f: F) -> anyhow::Result<()>
    where
        F: Fn(&Session) -> TaskResult<String> + Sync,
    {
        if self.config.feeds.is_empty() {
            println!("{} no feeds configured", "!".yellow().bold());
            return Ok(());
        }
        let sessions = self
            .config
            .feeds
            .iter()
            .map(|feed| {
                Session::open(self.config, feed, Arc::clone(&self.metrics), Arc::clone(&self.pool))
            })
            .collect::<TaskResult<Vec<_>>>()?;

        let f = &f;
        let results: Vec<anyhow::Result<String>> = if self.concurrent {
            thread::scope(|scope| {
                let handles: Vec<_> = sessions
                    .iter()
                    .map(|session| scope.spawn(move || f(session)))
                    .collect();
                handles
                    .into_iter()
                    .map(|handle| match handle.join() {
                        Ok(result) => result.map_err(anyhow::Error::from),
                        Err(_) => Err(anyhow!("{action} panicked")),
                    })
                    .collect()
            })
        } else {
            sessions
                .iter()
                .map(|session| f(session).map_err(anyhow::Error::from))
                .collect()
        };

        let mut failed = 0;
        for (session, result) in sessions.iter().zip(results) {
            match result {
                Ok(message) => println!("{} {}: {}", "✓".green().bold(), session.id().bold(), message),
                Err(err) => {
                    failed += 1;
                    println!("{} {}: {}", "✗".red().bold(), session.id().bold(), err);
                }
            }
        }
        if failed > 0 {
            bail!("{action} failed for {failed} feed(s)");
        }
        Ok(())
    }
}

fn cmd_collector(config: &Config) -> anyhow::Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start signal handler runtime")?;
    let (shutdown_tx, shutdown_rx) = crossbeam::channel::bounded::<()>(0);
    thread::spawn(move || match runtime.block_on(tokio::signal::ctrl_c()) {
        Ok(()) => {
            tracing::info!("interrupt received; finishing current tasks");
            drop(shutdown_tx);
        }
        Err(err) => {
            tracing::error!(error = %err, "cannot listen for interrupts; run until killed");
            std::mem::forget(shutdown_tx);
        }
    });

    println!(
        "{} Collecting {} feed(s) into {}",
        "▶".green().bold(),
        config.feeds.len(),
        config.workspace_path.display().to_string().bold()
    );
    let source = HttpFeedSource::new(FETCH_TIMEOUT)?;
    let collector = Collector::new(config.clone(), Arc::new(source), Arc::new(TracingMetrics));
    collector.run(&shutdown_rx)?;
    println!("{} Collector stopped", "■".yellow().bold());
    Ok(())
}

fn cmd_vacate(
    runner: &FeedRunner<'_>,
    config: &Config,
    args: VacateArgs,
    all_feeds: bool,
) -> anyhow::Result<()> {
    runner.run("vacate", |session| {
        let afiles = vacate(session)?;
        Ok(format!("{} archive(s) uploaded", afiles.len()))
    })?;
    if args.remove_workspace {
        // With --feed, only the selected feeds' directories are removed.
        let removed = remove_local_data(config, all_feeds).with_context(|| {
            format!("failed to remove local data under {}", config.workspace_path.display())
        })?;
        for path in removed {
            println!("Removed {}", path.display().to_string().bold());
        }
    }
    Ok(())
}

fn cmd_config(config: &Config) -> anyhow::Result<()> {
    print!("{}", config.to_redacted_toml()?);
    Ok(())
}
