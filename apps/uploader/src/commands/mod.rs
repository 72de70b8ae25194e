//! Command-line surface and dispatch.

mod files;
mod host;
mod upload;

use std::path::PathBuf;
use std::sync::Arc;

use chunkferry_notify::{Level, SharedToasts};
use chunkferry_protocol::{RenameFile, StorageType};
use chunkferry_transport::{HttpTransport, StaticCredential};
use clap::{Args, Parser, Subcommand};
use tokio_util::sync::CancellationToken;

use crate::config::Config;

#[derive(Debug, Parser)]
#[command(name = "chunkferry", version, about = "Resumable chunked uploads and file library access")]
pub struct Cli {
    /// Config file to use instead of the platform default.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Overrides the configured backend URL.
    #[arg(long, global = true)]
    pub server: Option<String>,

    /// Overrides the configured storage type (local, minio, oss, obs).
    #[arg(long, global = true, value_parser = parse_storage)]
    pub storage: Option<StorageType>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Upload one or more files.
    Upload(UploadArgs),
    /// List stored files.
    Ls(LsArgs),
    /// Manage LAN sharing.
    #[command(subcommand)]
    Share(ShareCommand),
    /// Delete a stored file.
    Rm {
        file_identifier: String,
    },
    /// Print server notifications until interrupted.
    Watch,
    /// Work with files on the backend host itself.
    #[command(subcommand)]
    Host(HostCommand),
    /// Show or change the backend's access password.
    #[command(subcommand)]
    Password(PasswordCommand),
}

#[derive(Debug, Args)]
pub struct UploadArgs {
    #[arg(required = true)]
    pub paths: Vec<PathBuf>,

    /// Destination folder relative to the storage root.
    #[arg(long, default_value = "")]
    pub folder: String,

    /// Send each file in one request instead of a resumable session.
    #[arg(long)]
    pub direct: bool,

    /// File type tag for direct uploads.
    #[arg(long, requires = "direct")]
    pub file_type: Option<u32>,
}

#[derive(Debug, Args)]
pub struct LsArgs {
    #[arg(long, default_value_t = 1)]
    pub page: u32,

    #[arg(long, default_value_t = 10)]
    pub page_size: u32,

    /// Only files whose name contains this.
    #[arg(long)]
    pub name: Option<String>,
}

#[derive(Debug, Subcommand)]
pub enum ShareCommand {
    /// Add a file to the share.
    Add { file_identifier: String },
    /// Remove a file from the share.
    Remove { file_identifier: String },
    /// List shared files.
    List,
    /// Switch sharing on.
    Enable,
    /// Switch sharing off.
    Disable,
    /// Show whether sharing is on.
    Status,
    /// Show the address other devices browse shared files at.
    Address {
        #[arg(long, default_value_t = 5173)]
        port: u16,
    },
}

#[derive(Debug, Subcommand)]
pub enum HostCommand {
    /// List drive roots.
    Drives,
    /// Rebuild the search index over the given drives.
    Index {
        #[arg(required = true)]
        drives: Vec<String>,
    },
    /// Search indexed paths.
    Search { keyword: String },
    /// Print the directory tree under a path.
    Tree {
        path: String,
        /// Levels to descend; 0 for unlimited.
        #[arg(long, default_value_t = 1)]
        depth: u32,
        /// Folders only.
        #[arg(long, conflicts_with = "files_only")]
        folders_only: bool,
        /// Files only.
        #[arg(long)]
        files_only: bool,
    },
    /// Reveal a directory in the host's file manager.
    Open { dir: String },
    /// Encrypt a file with a password.
    Encrypt { path: String, password: String },
    /// Decrypt a file produced by `encrypt`.
    Decrypt { path: String, password: String },
    /// Rename files, all or none. Each pair is `ABSOLUTE_PATH=NEW_NAME`.
    Rename {
        #[arg(required = true, value_parser = parse_rename)]
        renames: Vec<RenameFile>,
    },
}

#[derive(Debug, Subcommand)]
pub enum PasswordCommand {
    /// Show the current password.
    Show,
    /// Set a new password.
    Set {
        password: String,
        /// Also store it in the config file.
        #[arg(long)]
        save: bool,
    },
}

fn parse_rename(value: &str) -> Result<RenameFile, String> {
    match value.rsplit_once('=') {
        Some((path, name)) if !path.is_empty() && !name.is_empty() => Ok(RenameFile {
            absolute_path: path.to_string(),
            new_name: name.to_string(),
        }),
        _ => Err(format!("expected ABSOLUTE_PATH=NEW_NAME, got `{value}`")),
    }
}

fn parse_storage(value: &str) -> Result<StorageType, String> {
    value
        .parse()
        .map_err(|_| format!("unknown storage type `{value}` (expected local, minio, oss or obs)"))
}

/// What every command works with.
pub(crate) struct Context {
    pub config: Config,
    /// Explicit `--config` path, if given.
    pub config_path: Option<PathBuf>,
    pub storage: StorageType,
    pub transport: HttpTransport,
    pub toasts: SharedToasts,
}

impl Context {
    fn new(cli: &Cli, mut config: Config) -> anyhow::Result<Self> {
        if let Some(server) = &cli.server {
            config.server_url = server.clone();
        }
        let storage = cli.storage.unwrap_or(config.storage_type);

        let toasts = SharedToasts::new();
        let credential = Some(config.password.clone()).filter(|p| !p.is_empty());
        let transport = HttpTransport::new(
            config.transport_config(),
            Arc::new(StaticCredential::new(credential)),
            Arc::new(toasts.clone()),
        )?;

        Ok(Self {
            config,
            config_path: cli.config.clone(),
            storage,
            transport,
            toasts,
        })
    }

    /// Prints queued notifications to stderr.
    fn flush_toasts(&self) {
        for toast in self.toasts.drain() {
            let tag = match toast.level {
                Level::Error => "error",
                Level::Warning => "warning",
                Level::Success => "ok",
                Level::Info => "info",
            };
            match toast.message {
                Some(message) => eprintln!("[{tag}] {}: {message}", toast.title),
                None => eprintln!("[{tag}] {}", toast.title),
            }
        }
    }
}

/// Cancels the returned token on Ctrl-C.
pub(crate) fn interrupt_token() -> CancellationToken {
    let cancel = CancellationToken::new();
    let token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received, cancelling");
            token.cancel();
        }
    });
    cancel
}

pub async fn run(cli: Cli, config: Config) -> anyhow::Result<()> {
    let ctx = Context::new(&cli, config)?;
    tracing::debug!(server = %ctx.config.server_url, storage = %ctx.storage, "client ready");

    let result = match cli.command {
        Command::Upload(args) => upload::run(&ctx, args, interrupt_token()).await,
        Command::Ls(args) => files::list(&ctx, args).await,
        Command::Share(action) => files::share(&ctx, action).await,
        Command::Rm { file_identifier } => files::delete(&ctx, &file_identifier).await,
        Command::Watch => files::watch(&ctx, interrupt_token()).await,
        Command::Host(action) => host::run(&ctx, action).await,
        Command::Password(action) => host::password(&ctx, action).await,
    };

    ctx.flush_toasts();
    result
}
