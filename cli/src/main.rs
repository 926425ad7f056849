//! Volaupload CLI - upload batches of files into one or more rooms.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{error::ErrorKind, CommandFactory, Parser};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use volaupload_lib::{
    filesize, sort_paths, upload_chain, NickPool, RateCounter, RoomTarget, SortMode,
    SpoolClient, UploadConfig, DEFAULT_BLOCK_SIZE, MAX_ATTEMPTS,
};

mod config;
mod files;

use config::Config;

#[derive(Parser, Debug)]
#[command(
    name = "volaupload",
    author,
    version,
    about = "Upload files into rooms of an ephemeral file host"
)]
struct Cli {
    /// Files to upload
    #[arg(value_name = "FILES")]
    files: Vec<PathBuf>,

    /// Room id or alias to upload into; repeat to upload into several rooms
    #[arg(short = 'r', long = "room", value_name = "ROOM")]
    rooms: Vec<String>,

    /// User name to upload as
    #[arg(short, long)]
    user: Option<String>,

    /// Account password to log in with
    #[arg(short, long)]
    passwd: Option<String>,

    /// Room password, matched to the --room given at the same position
    #[arg(long = "room-pass", value_name = "PASSWORD")]
    room_passes: Vec<String>,

    /// Attempts per file (1 to 10)
    #[arg(short, long, value_parser = clap::value_parser!(u32).range(1..=MAX_ATTEMPTS as i64))]
    attempts: Option<u32>,

    /// Skip the checksum comparison after each upload
    #[arg(long)]
    no_checksum: bool,

    /// Upload order: filename, path, size or none
    #[arg(short, long, value_name = "MODE")]
    sort: Option<SortMode>,

    /// Walk directories given as arguments
    #[arg(short = 'R', long)]
    recursive: bool,

    /// Text put in front of every file name
    #[arg(long)]
    prefix: Option<String>,

    /// Remove files once they reached the last room
    #[arg(long)]
    delete_after: bool,

    /// Read buffer size in bytes
    #[arg(long, value_name = "BYTES")]
    block_size: Option<usize>,

    /// Randomize image names and rotate nicknames
    #[arg(long)]
    spam: bool,

    /// File with one nickname per line, used with --spam
    #[arg(long, value_name = "FILE")]
    nicks: Option<PathBuf>,

    /// Spool directory rooms are delivered into
    #[arg(long, value_name = "DIR")]
    spool: Option<PathBuf>,

    /// Config file (defaults to ~/.vola.toml)
    #[arg(long, env = "VOLA_CONFIG", value_name = "FILE")]
    config: Option<PathBuf>,
}

/// Everything needed for one run, after flags and config are merged.
#[derive(Debug)]
struct Run {
    targets: Vec<RoomTarget>,
    files: Vec<PathBuf>,
    sort: SortMode,
    recursive: bool,
    spool: PathBuf,
    nicks: Option<PathBuf>,
    upload: UploadConfig,
}

impl Run {
    fn resolve(cli: Cli, config: &Config) -> std::result::Result<Self, String> {
        if cli.files.is_empty() {
            return Err("no files specified".into());
        }
        if cli.rooms.is_empty() {
            return Err("no room specified; use --room".into());
        }
        let vola = &config.vola;

        let user = cli
            .user
            .clone()
            .or_else(|| vola.user.clone())
            .filter(|user| !user.trim().is_empty())
            .ok_or("no user specified; use --user or set user in the config")?;
        // a user given on the command line does not get the configured password
        let passwd = match (&cli.passwd, &cli.user) {
            (Some(passwd), _) => Some(passwd.clone()),
            (None, Some(_)) => None,
            (None, None) => vola.passwd.clone(),
        };

        let attempts = cli.attempts.or(vola.attempts).unwrap_or(1);
        if !(1..=MAX_ATTEMPTS).contains(&attempts) {
            return Err(format!(
                "invalid attempts {attempts} (expected 1 to {MAX_ATTEMPTS})"
            ));
        }

        let sort = match (cli.sort, &vola.sort) {
            (Some(sort), _) => sort,
            (None, Some(sort)) => sort.parse()?,
            (None, None) => SortMode::default(),
        };

        let targets = cli
            .rooms
            .iter()
            .enumerate()
            .map(|(idx, room)| {
                let id = config.resolve_room(room);
                let password = cli
                    .room_passes
                    .get(idx)
                    .cloned()
                    .or_else(|| config.room_password(&id));
                RoomTarget::new(id).with_password(password)
            })
            .collect();

        let upload = UploadConfig {
            user,
            passwd,
            attempts,
            verify_checksum: !cli.no_checksum && vola.checksum.unwrap_or(true),
            delete_after: cli.delete_after || vola.delete_after.unwrap_or(false),
            block_size: cli
                .block_size
                .or(vola.block_size)
                .unwrap_or(DEFAULT_BLOCK_SIZE),
            prefix: cli.prefix.clone().or_else(|| vola.prefix.clone()),
            spam: cli.spam || vola.spam.unwrap_or(false),
            ..Default::default()
        };

        Ok(Run {
            targets,
            files: cli.files,
            sort,
            recursive: cli.recursive,
            spool: cli
                .spool
                .or_else(|| vola.spool.clone())
                .unwrap_or_else(config::default_spool),
            nicks: cli.nicks.or_else(|| vola.nicks.clone()),
            upload,
        })
    }
}

/// Prints a usage error the way clap does and exits with status 1.
fn usage_error(message: impl std::fmt::Display) -> ! {
    let _ = Cli::command()
        .error(ErrorKind::ValueValidation, message)
        .print();
    std::process::exit(1);
}

fn parse_args() -> Cli {
    match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            std::process::exit(if e.use_stderr() { 1 } else { 0 });
        }
    }
}

async fn shutdown_signal() -> Result<()> {
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut term =
            signal(SignalKind::terminate()).context("failed to install SIGTERM handler")?;
        let mut quit = signal(SignalKind::quit()).context("failed to install SIGQUIT handler")?;
        tokio::select! {
            _ = &mut ctrl_c => {},
            _ = term.recv() => {},
            _ = quit.recv() => {},
        }
        return Ok(());
    }

    #[cfg(not(unix))]
    {
        let _ = ctrl_c.await;
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = parse_args();
    let config_path = cli.config.clone().unwrap_or_else(config::config_path);
    let config = Config::load(&config_path)?;
    let mut run = Run::resolve(cli, &config).unwrap_or_else(|e| usage_error(e));

    let files = files::collect(&run.files, run.recursive)
        .unwrap_or_else(|e| usage_error(format!("{e:#}")));
    let files = sort_paths(files, run.sort).context("failed to sort files")?;
    if let Some(path) = &run.nicks {
        let pool = NickPool::load(path)
            .with_context(|| format!("failed to read nicks from {}", path.display()))?;
        if pool.is_empty() {
            warn!(path = %path.display(), "nick file is empty");
        } else {
            run.upload.nicks = Some(pool);
        }
    }

    let cancel = CancellationToken::new();
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        match shutdown_signal().await {
            Ok(()) => {
                warn!("Cancel requested");
                signal_cancel.cancel();
            }
            Err(e) => warn!("{e:#}"),
        }
    });

    let mut client = SpoolClient::new(&run.spool, run.upload.user.clone());
    let rate = RateCounter::new();
    info!(
        files = files.len(),
        rooms = run.targets.len(),
        spool = %run.spool.display(),
        "starting upload"
    );
    let outcome = upload_chain(
        &mut client,
        &run.targets,
        &files,
        &run.upload,
        &rate,
        &cancel,
    )
    .await;

    let mut failed = 0;
    for summary in &outcome.summaries {
        failed += summary.failed.len();
        info!(
            room = %summary.room,
            uploaded = summary.uploaded.len(),
            failed = summary.failed.len(),
            failed_attempts = summary.failed_attempts,
            "room done"
        );
    }
    info!(
        "{} in {:.1}s at {}/s",
        filesize(rate.total() as f64).trim(),
        rate.elapsed().as_secs_f64(),
        filesize(rate.rate()).trim()
    );
    outcome.into_result().context("upload failed")?;

    if cancel.is_cancelled() {
        std::process::exit(130);
    }
    if failed > 0 {
        anyhow::bail!("{failed} file(s) could not be uploaded");
    }
    Ok(())
}
