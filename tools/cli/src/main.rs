//! Filedrop CLI - Command line interface for the upload store.
//!
//! Saves, lists and deletes files in the local store, and maintains the
//! remote bucket and the rotated access key.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use filedrop_common::{Config, RemoteErrorKind};
use filedrop_handler::{FileHandler, IncomingFile};
use filedrop_remote::RemoteMirror;
use filedrop_storage::LocalFileStore;

#[derive(Parser)]
#[command(name = "filedrop")]
#[command(about = "Filedrop - Date-partitioned upload store with S3 mirroring")]
#[command(version)]
struct Cli {
    /// Configuration file (JSON). Defaults apply when omitted.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Save a file into today's directory and mirror it.
    Save {
        /// File to upload.
        file: PathBuf,

        /// Original file name to record (default: the file's name).
        #[arg(short, long)]
        name: Option<String>,
    },

    /// List every stored file.
    List,

    /// Print the on-disk location of a stored file.
    Locate {
        /// Relative path as printed by `list`.
        path: String,
    },

    /// Delete a stored file (subject to `delete_mode`).
    Delete {
        /// Relative path as printed by `list`.
        path: String,
    },

    /// Remote bucket maintenance.
    Bucket {
        #[command(subcommand)]
        action: BucketAction,
    },

    /// Access key maintenance.
    Keys {
        #[command(subcommand)]
        action: KeysAction,
    },

    /// Configuration.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum BucketAction {
    /// Create the bucket in the configured region.
    Ensure,
    /// List every object key.
    List,
    /// Delete every object.
    Clear,
}

#[derive(Subcommand)]
enum KeysAction {
    /// Replace every key of the identity with one new key.
    Rotate,
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration.
    Show,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Save { file, name } => cmd_save(&config, &file, name).await,

        Commands::List => cmd_list(&config).await,

        Commands::Locate { path } => cmd_locate(&config, &path).await,

        Commands::Delete { path } => cmd_delete(&config, &path).await,

        Commands::Bucket { action } => match action {
            BucketAction::Ensure => cmd_bucket_ensure(&config).await,
            BucketAction::List => cmd_bucket_list(&config).await,
            BucketAction::Clear => cmd_bucket_clear(&config).await,
        },

        Commands::Keys {
            action: KeysAction::Rotate,
        } => cmd_keys_rotate(&config).await,

        Commands::Config {
            action: ConfigAction::Show,
        } => cmd_config_show(&config),
    }
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    let config = match path {
        Some(path) => Config::load(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => Config::default(),
    };
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

fn open_store(config: &Config) -> Result<LocalFileStore> {
    LocalFileStore::new(config).context("Failed to prepare upload directories")
}

/// Connect to the bucket, bailing out when provisioning failed.
async fn connect_mirror(config: &Config) -> Result<RemoteMirror> {
    let mirror = RemoteMirror::connect_aws(config).await;
    if !mirror.is_available() {
        anyhow::bail!(
            "No storage session for {}; check the ambient AWS credentials",
            config.identity_name
        );
    }
    Ok(mirror)
}

/// Save one file.
async fn cmd_save(config: &Config, file: &Path, name: Option<String>) -> Result<()> {
    let name = match name {
        Some(name) => name,
        None => file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .context("Source path has no file name")?,
    };
    info!("Saving {} as {}", file.display(), name);

    let content = tokio::fs::read(file)
        .await
        .context("Failed to read source file")?;

    let handler = FileHandler::connect(config)
        .await
        .context("Failed to start file handler")?;

    let stored = handler
        .save(Some(IncomingFile::from_bytes(name, content)))
        .await
        .context("Failed to save file")?
        .context("Nothing was saved")?;

    println!("Saved: {} ({} bytes)", stored.path, stored.size);
    println!("  Local: {}", stored.local_path.display());
    match &stored.remote_key {
        Some(key) => println!("  Remote: s3://{}/{}", config.bucket_name, key),
        None => println!("  Remote: not mirrored"),
    }

    Ok(())
}

/// List stored files.
async fn cmd_list(config: &Config) -> Result<()> {
    let store = open_store(config)?;
    let files = store.list().await;

    if files.is_empty() {
        println!("No stored files.");
    } else {
        for file in files {
            println!("{}", file);
        }
    }

    Ok(())
}

async fn cmd_locate(config: &Config, path: &str) -> Result<()> {
    let store = open_store(config)?;
    let location = store
        .locate(path)
        .await
        .with_context(|| format!("Cannot locate {}", path))?;
    println!("{}", location.display());
    Ok(())
}

/// Delete a stored file.
async fn cmd_delete(config: &Config, path: &str) -> Result<()> {
    let store = open_store(config)?;
    let deleted = store
        .delete(Some(path))
        .await
        .with_context(|| format!("Failed to delete {}", path))?;

    if deleted {
        println!("Deleted: {} (mode: {:?})", path, store.delete_mode());
    } else {
        println!("Not found: {}", path);
    }

    Ok(())
}

async fn cmd_bucket_ensure(config: &Config) -> Result<()> {
    let mirror = connect_mirror(config).await?;

    match mirror.ensure_bucket().await {
        Ok(()) => println!("Bucket created: {} ({})", mirror.bucket(), config.region),
        Err(e) if e.remote_kind() == Some(RemoteErrorKind::AlreadyExists) => {
            println!("Bucket already exists: {}", mirror.bucket());
        }
        Err(e) => return Err(e).context("Failed to create bucket"),
    }

    Ok(())
}

async fn cmd_bucket_list(config: &Config) -> Result<()> {
    let mirror = connect_mirror(config).await?;
    let keys = mirror
        .list_objects()
        .await
        .context("Failed to list bucket")?;

    if keys.is_empty() {
        println!("Bucket {} is empty.", mirror.bucket());
    } else {
        println!("Contents of {}:", mirror.bucket());
        for key in keys {
            println!("  {}", key);
        }
    }

    Ok(())
}

async fn cmd_bucket_clear(config: &Config) -> Result<()> {
    let mirror = connect_mirror(config).await?;
    let deleted = mirror
        .clear_bucket()
        .await
        .context("Failed to clear bucket")?;

    println!("Deleted {} objects from {}", deleted, mirror.bucket());
    Ok(())
}

/// Rotate the identity's access key.
async fn cmd_keys_rotate(config: &Config) -> Result<()> {
    let provisioner = filedrop_remote::aws::provisioner(config).await;
    let credential = provisioner
        .rotate()
        .await
        .context("Failed to rotate access keys")?;

    println!("Rotated keys of {}", credential.identity);
    println!("  Active key: {}", credential.access_key_id);

    Ok(())
}

fn cmd_config_show(config: &Config) -> Result<()> {
    let json = config.to_json().context("Failed to serialize config")?;
    println!("{}", json);
    Ok(())
}
