mod cli;
mod context;
mod error;

use crate::cli::{Cli, Command};
use crate::context::{Context, parse_target};
use crate::error::{ErrorKind, Result};
use clap::Parser;
use exn::{OptionExt, ResultExt};
use std::io::Write;
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use trove_config::Config;
use trove_library::{ProgressObserver, ScanOutcome, ScanSession};
use trove_vfs::{Entry, File, Listing, Object, format};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cli.log_level())))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{err:?}");
            ExitCode::FAILURE
        },
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::load(cli.config.as_deref()).or_raise(|| ErrorKind::Config)?;
    let context = Context::build(config).await?;
    let result = match cli.command {
        Command::Ls { target } => list(&context, target.as_deref()).await,
        Command::Cat { target, output } => cat(&context, &target, output.as_deref()).await,
        Command::Scan { targets } => scan(&context, &targets).await,
        Command::Playlist => playlist(&context).await,
    };
    context.close().await;
    result
}

async fn list(context: &Context, target: Option<&str>) -> Result<()> {
    let entry = match target {
        None => Entry::Dir(context.vfs.clone()),
        Some(text) => {
            let id = parse_target(text)?;
            let entry = context
                .archives
                .resolve(&id)
                .await
                .or_raise(|| ErrorKind::Resolve(text.to_string()))?;
            // A file holding several tracks lists like a directory.
            let outer = entry.as_file().filter(|file| file.uri().fragment().is_none()).cloned();
            match outer {
                Some(file) => context
                    .archives
                    .browse(file)
                    .await
                    .or_raise(|| ErrorKind::Resolve(text.to_string()))?,
                None => entry,
            }
        },
    };
    let Some(dir) = entry.as_dir() else {
        let file = entry.as_file().ok_or_raise(|| ErrorKind::Resolve(entry.uri().to_string()))?;
        print_line(&format!("{}\t{}\t{}", file.name(), file.size(), file.description()))?;
        return Ok(());
    };
    let listing = Listing::of(dir.as_ref())
        .await
        .or_raise(|| ErrorKind::Resolve(dir.uri().to_string()))?;
    for entry in listing.entries {
        let line = match &entry {
            Entry::Dir(dir) => format!("{}/\t\t{}\t{}", dir.name(), dir.description(), dir.uri()),
            Entry::File(file) => format!("{}\t{}\t{}\t{}", file.name(), file.size(), file.description(), file.uri()),
            Entry::Object(object) => format!("{}\t\t{}\t{}", object.name(), object.description(), object.uri()),
        };
        print_line(&line)?;
    }
    Ok(())
}

async fn cat(context: &Context, target: &str, output: Option<&Path>) -> Result<()> {
    let id = parse_target(target)?;
    let entry = context
        .archives
        .resolve(&id)
        .await
        .or_raise(|| ErrorKind::Resolve(target.to_string()))?;
    let file = entry
        .as_file()
        .ok_or_raise(|| ErrorKind::Resolve(format!("{target} is a {}", entry.kind())))?;
    let content = file.content().await.or_raise(|| ErrorKind::Resolve(target.to_string()))?;
    match output {
        Some(path) => tokio::fs::write(path, &content).await.or_raise(|| ErrorKind::Io)?,
        None => {
            let mut stdout = tokio::io::stdout();
            stdout.write_all(&content).await.or_raise(|| ErrorKind::Io)?;
            stdout.flush().await.or_raise(|| ErrorKind::Io)?;
        },
    }
    Ok(())
}

async fn scan(context: &Context, targets: &[String]) -> Result<()> {
    let inputs = targets
        .iter()
        .map(|target| parse_target(target))
        .collect::<Result<Vec<_>>>()?;
    let observer: Arc<dyn ProgressObserver> = Arc::new(|persisted: usize| info!(persisted, "Scanning"));
    let session = ScanSession::new(context.archives.clone(), context.store.clone(), context.pipeline_options())
        .with_observer(observer);

    let cancel = session.cancel_token();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, stopping the scan");
            cancel.cancel();
        }
    });
    let report = session.run(&inputs).await;
    interrupt.abort();

    let report = report.or_raise(|| ErrorKind::Scan)?;
    for uri in &report.errors {
        warn!(%uri, "Skipped");
    }
    let verb = match report.outcome {
        ScanOutcome::Completed => "Added",
        ScanOutcome::Canceled => "Canceled after adding",
    };
    print_line(&format!("{verb} {} item(s), {} skipped", report.persisted, report.errors.len()))
}

async fn playlist(context: &Context) -> Result<()> {
    let items = context.store.enumerate().await.or_raise(|| ErrorKind::Playlist)?;
    for stored in items {
        let item = &stored.item;
        print_line(&format!(
            "{}\t{}\t{}\t{}\t{}",
            stored.id,
            format::duration(item.duration),
            item.title,
            item.author,
            item.location
        ))?;
    }
    Ok(())
}

/// `println!` without the panic on a closed pipe.
fn print_line(line: &str) -> Result<()> {
    let mut stdout = std::io::stdout().lock();
    writeln!(stdout, "{line}").or_raise(|| ErrorKind::Io)
}
