//! CLI binary for dotasks.

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use dotasks::notify::{ChannelSink, Notification};
use dotasks::scheduler::BuiltinJob;
use dotasks::{DoTasksConfig, Scheduler, TaskServices, Trigger, dotasks_dirs, tasks};
use dotasks_sites::SignInSite;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// dotasks: scheduled sign-ins, monitors and gallery crawls.
#[derive(Parser)]
#[command(name = "dotasks", version, about)]
struct Cli {
    /// Path to TOML configuration file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Subcommand to run.
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the scheduler until Ctrl+C.
    Run,

    /// Fire one trigger's jobs now and wait for them.
    Trigger {
        #[arg(value_enum)]
        trigger: TriggerArg,
    },

    /// Sign in to one site.
    Sign {
        #[arg(value_enum)]
        site: SiteArg,
    },

    /// Reply to the next unreplied forum thread.
    Reply,

    /// Crawl every gallery task once.
    Crawl,

    /// Run one monitor pass.
    Monitor {
        #[arg(value_enum)]
        target: MonitorArg,
    },

    /// Check the forum's unread notifications.
    Notices,

    /// Talk to the album download service.
    Downloads {
        #[arg(value_enum)]
        action: DownloadsArg,
    },

    /// Reset stored progress.
    Reset {
        #[arg(value_enum)]
        target: ResetArg,
    },

    /// Write a default config file.
    InitConfig {
        /// Overwrite an existing file.
        #[arg(long)]
        force: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum TriggerArg {
    Startup,
    Minute,
    ThreeMinutes,
    HalfHour,
}

impl From<TriggerArg> for Trigger {
    fn from(arg: TriggerArg) -> Self {
        match arg {
            TriggerArg::Startup => Trigger::Startup,
            TriggerArg::Minute => Trigger::Minute,
            TriggerArg::ThreeMinutes => Trigger::ThreeMinutes,
            TriggerArg::HalfHour => Trigger::HalfHour,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum SiteArg {
    Sht,
    Nodeseek,
    Hdtime,
}

impl From<SiteArg> for SignInSite {
    fn from(arg: SiteArg) -> Self {
        match arg {
            SiteArg::Sht => SignInSite::Sht,
            SiteArg::Nodeseek => SignInSite::Nodeseek,
            SiteArg::Hdtime => SignInSite::HdTime,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum MonitorArg {
    Anchors,
    Apps,
}

#[derive(Clone, Copy, ValueEnum)]
enum DownloadsArg {
    Retry,
    ClearFailed,
}

#[derive(Clone, Copy, ValueEnum)]
enum ResetArg {
    Gallery,
    Replied,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _log_guard = init_tracing();
    let cli = Cli::parse();
    let config_path = cli.config.unwrap_or_else(dotasks_dirs::config_file);

    let command = cli.command.unwrap_or(Command::Run);
    if let Command::InitConfig { force } = command {
        return init_config(&config_path, force);
    }

    let config = DoTasksConfig::load_or_default(&config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;
    let (sink, mut notifications) = ChannelSink::new();
    let services = TaskServices::from_config(config, Arc::new(sink))?;

    let printer = tokio::spawn(async move {
        while let Some(notification) = notifications.recv().await {
            print_notification(&notification);
        }
    });

    let result = dispatch(command, services).await;
    // Every sender is gone once the services are dropped.
    let _ = printer.await;
    result
}

async fn dispatch(command: Command, services: TaskServices) -> anyhow::Result<()> {
    match command {
        Command::Run => run_daemon(services).await,
        Command::Trigger { trigger } => fire_once(services, trigger.into()).await,
        Command::Sign { site } => {
            let site = SignInSite::from(site);
            match tasks::sign_in(&services, site).await {
                Ok(tasks::SignInOutcome::Signed(msg)) => println!("{} {msg}", site.tag()),
                Ok(tasks::SignInOutcome::Skipped) => println!("{} already signed in today", site.tag()),
                Err(failure) => anyhow::bail!("{} {failure}", site.tag()),
            }
            Ok(())
        }
        Command::Reply => {
            let thread_id = tasks::auto_reply(&services).await?;
            println!("replied to thread {thread_id}");
            Ok(())
        }
        Command::Crawl => {
            let summary = tasks::run_gallery(&services).await?;
            println!(
                "crawled {} tasks ({} failed, {} skipped): {} new albums, {} cursors moved",
                summary.crawled, summary.failed, summary.skipped, summary.albums, summary.cursors_moved
            );
            if let Some(export) = summary.export {
                println!("exported to {}", export.display());
            }
            Ok(())
        }
        Command::Monitor { target } => {
            let summary = match target {
                MonitorArg::Anchors => tasks::monitor_anchors(&services).await?,
                MonitorArg::Apps => tasks::monitor_apps(&services).await?,
            };
            println!(
                "checked {}, failed {}, active {}, notified {}",
                summary.checked, summary.failed, summary.active, summary.notified
            );
            Ok(())
        }
        Command::Notices => {
            let unread = tasks::check_notices(&services).await?;
            println!("{unread} unread notifications");
            Ok(())
        }
        Command::Downloads { action } => {
            let timeout = Duration::from_secs(services.config.http.timeout_seconds);
            let client = tasks::DownloadClient::from_config(&services.config.downloads, timeout)?
                .context("downloads.addr is not configured")?;
            match action {
                DownloadsArg::Retry => client.retry_failed().await?,
                DownloadsArg::ClearFailed => client.clear_failed().await?,
            }
            println!("ok");
            Ok(())
        }
        Command::Reset { target } => {
            match target {
                ResetArg::Gallery => {
                    let count = tasks::reset_gallery(&services.store)?;
                    println!("reset {count} gallery cursors");
                }
                ResetArg::Replied => {
                    let count = tasks::reset_replied(&services.store)?;
                    println!("forgot {count} replied threads");
                }
            }
            Ok(())
        }
        Command::InitConfig { .. } => Ok(()),
    }
}

async fn run_daemon(services: TaskServices) -> anyhow::Result<()> {
    println!("dotasks v{}", env!("CARGO_PKG_VERSION"));
    let (result_tx, mut results) = mpsc::unbounded_channel();
    let scheduler = Scheduler::new(services, result_tx).with_builtin_jobs();
    let cancel = scheduler.cancellation_token();

    let cancel_clone = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("received Ctrl+C, shutting down...");
            cancel_clone.cancel();
        }
    });

    let handle = scheduler.run();
    println!("\nScheduler running. Press Ctrl+C to stop.\n");

    loop {
        tokio::select! {
            record = results.recv() => match record {
                Some(record) => info!(
                    job = %record.task_id,
                    trigger = %record.trigger,
                    outcome = ?record.outcome,
                    "{}",
                    record.summary
                ),
                None => break,
            },
            () = cancel.cancelled() => break,
        }
    }

    handle.await.context("scheduler task failed")?;
    Ok(())
}

async fn fire_once(services: TaskServices, trigger: Trigger) -> anyhow::Result<()> {
    let expected = BuiltinJob::for_trigger(trigger).len();
    let (result_tx, mut results) = mpsc::unbounded_channel();
    let scheduler = Scheduler::new(services, result_tx).with_builtin_jobs();
    scheduler.fire(trigger);

    for _ in 0..expected {
        let Some(record) = results.recv().await else {
            break;
        };
        println!(
            "{:<18} {:?}: {}",
            record.task_id, record.outcome, record.summary
        );
    }
    Ok(())
}

fn init_config(path: &Path, force: bool) -> anyhow::Result<()> {
    if path.exists() && !force {
        anyhow::bail!("{} already exists (use --force to overwrite)", path.display());
    }
    DoTasksConfig::default().save_to_file(path)?;
    println!("wrote {}", path.display());
    Ok(())
}

fn print_notification(notification: &Notification) {
    println!("\n{}\n  {}", notification.title, notification.message);
    for action in &notification.actions {
        match &action.url {
            Some(url) => println!("  [{}] {url}", action.label),
            None => println!("  [{}]", action.label),
        }
    }
}

/// Console logging on stderr plus a daily log file under the data dir.
///
/// The file layer is skipped when the log directory cannot be created.
fn init_tracing() -> Option<WorkerGuard> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("dotasks=info,dotasks_sites=info"));
    let console = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    let log_dir = dotasks_dirs::logs_dir();
    let appender = std::fs::create_dir_all(&log_dir).ok().and_then(|()| {
        RollingFileAppender::builder()
            .rotation(Rotation::DAILY)
            .filename_prefix("dotasks")
            .filename_suffix("log")
            .max_log_files(14)
            .build(&log_dir)
            .ok()
    });

    match appender {
        Some(appender) => {
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::registry()
                .with(env_filter)
                .with(console)
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_writer(writer)
                        .with_ansi(false),
                )
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(console)
                .init();
            None
        }
    }
}
