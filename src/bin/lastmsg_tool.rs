use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use lastmsg::storage::{SinkDocument, read_document, write_document};
use lastmsg::{CacheConfig, Snapshot, UserId};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "lastmsg-tool")]
#[command(about = "Offline inspection and maintenance of a lastmsg sink file")]
struct Cli {
    /// Sink file holding the configuration and the location table
    #[arg(long, global = true, env = "LASTMSG_FILE", default_value = "lastmsg.json")]
    file: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create the sink with default configuration if it does not exist
    Init,
    /// Print configuration, metadata and every recorded location
    Show,
    /// Print the recorded location of one user
    Lookup { user: String },
    /// Remove one user from the table
    Forget { user: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Init => init(&cli.file).await,
        Command::Show => show(&cli.file).await,
        Command::Lookup { user } => lookup(&cli.file, &UserId::from(user)).await,
        Command::Forget { user } => forget(&cli.file, &UserId::from(user)).await,
    }
}

async fn load(path: &Path) -> Result<SinkDocument> {
    read_document(path)
        .await
        .with_context(|| format!("Failed to read sink '{}'", path.display()))?
        .ok_or_else(|| anyhow!("Sink '{}' does not exist; run `init` first", path.display()))
}

async fn init(path: &Path) -> Result<()> {
    if read_document(path).await?.is_some() {
        println!("Sink already exists: {}", path.display());
        return Ok(());
    }

    let document = SinkDocument::new(CacheConfig::default(), &Snapshot::default());
    write_document(path, &document)
        .await
        .with_context(|| format!("Failed to create sink '{}'", path.display()))?;

    info!(path = %path.display(), "created sink with default configuration");
    println!("Created sink: {}", path.display());
    Ok(())
}

async fn show(path: &Path) -> Result<()> {
    let document = load(path).await?;

    println!("Sink: {} (format version {})", path.display(), document.version);
    if let Some(metadata) = &document.metadata {
        println!(
            "Saved at: {} ({} entries)",
            metadata.saved_at.to_rfc3339(),
            metadata.entry_count
        );
    }

    println!("Config:");
    println!(
        "{}",
        serde_json::to_string_pretty(&document.config).context("Failed to render config")?
    );

    let mut entries: Vec<_> = document.locations.iter().collect();
    entries.sort_by(|a, b| a.0.cmp(b.0));
    println!("Locations ({}):", entries.len());
    for (user, location) in entries {
        println!("  {:<24} {}", user, location);
    }
    Ok(())
}

async fn lookup(path: &Path, user: &UserId) -> Result<()> {
    let document = load(path).await?;
    match document.locations.get(user) {
        Some(location) => println!(
            "{}: stream {} item {}",
            user, location.stream_id, location.item_id
        ),
        None => println!("{}: no message recorded", user),
    }
    Ok(())
}

async fn forget(path: &Path, user: &UserId) -> Result<()> {
    let document = load(path).await?;
    let mut snapshot = document.snapshot();

    if snapshot.locations.remove(user).is_none() {
        println!("{}: no message recorded", user);
        return Ok(());
    }

    let updated = SinkDocument::new(document.config, &snapshot);
    write_document(path, &updated)
        .await
        .with_context(|| format!("Failed to rewrite sink '{}'", path.display()))?;

    info!(user = %user, "removed user from sink");
    println!("{}: removed", user);
    Ok(())
}
