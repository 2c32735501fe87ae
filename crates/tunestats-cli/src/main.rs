//! tunestats - operator CLI.
//!
//! Provisions the encryption key, imports credentials from a completed
//! authorization, inspects or refreshes a user's cached statistics, and
//! queues or recommends tracks on their behalf.

use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use serde_json::json;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use tunestats_core::cache::age_display;
use tunestats_core::config::ENCRYPTION_KEY_ENV;
use tunestats_core::upstream::TokenGrant;
use tunestats_core::{
    CacheOrchestrator, Config, CryptoCodec, FileDocumentStore, KeyStore, LibraryActions, NoSession,
    ResourceKind, ResourceStore, SpotifyAccounts, SpotifyClient, TokenManager,
};

/// Log file written inside the data directory
const LOG_FILE: &str = "tunestats.log";

#[derive(Parser)]
#[command(name = "tunestats", version, about = "Cached listening statistics")]
struct Cli {
    /// Data directory (defaults to the config value, then the platform data dir)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Write client credentials (and --data-dir, if given) to the config file
    Configure {
        #[arg(long)]
        client_id: Option<String>,
        #[arg(long)]
        client_secret: Option<String>,
    },
    /// Generate a new encryption key
    Keygen {
        /// Store the key in the OS keychain instead of printing it
        #[arg(long)]
        keyring: bool,
    },
    /// Register a credential from a token endpoint JSON response
    ImportToken {
        user_id: String,
        /// Read the response from a file instead of stdin
        #[arg(long)]
        file: Option<PathBuf>,
    },
    /// Print one resource kind for a user, refreshing it if stale
    Show { user_id: String, kind: ResourceKind },
    /// Show credential expiry and cache age for a user
    Status { user_id: String },
    /// Add a track (share link or URI) to the user's playback queue
    Queue { user_id: String, track: String },
    /// Add a track to the user's "Recommended Tracks" playlist
    Recommend { user_id: String, track: String },
    /// Set the link shown on the user's profile
    SetProfileLink { user_id: String, link: String },
}

/// Initialize the tracing subscriber for logging.
///
/// Stderr follows RUST_LOG (default "warn"); the log file in the data
/// directory always records info and above.
fn init_tracing(log_dir: &Path) -> Result<WorkerGuard> {
    std::fs::create_dir_all(log_dir)
        .with_context(|| format!("Failed to create {}", log_dir.display()))?;
    let (file_writer, guard) =
        tracing_appender::non_blocking(tracing_appender::rolling::never(log_dir, LOG_FILE));

    let stderr_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr).with_filter(stderr_filter))
        .with(
            fmt::layer()
                .with_ansi(false)
                .with_writer(file_writer)
                .with_filter(EnvFilter::new("info")),
        )
        .init();

    Ok(guard)
}

/// Services wired against the file store.
struct Services {
    tokens: TokenManager,
    cache: CacheOrchestrator,
    library: LibraryActions,
    store: ResourceStore,
}

impl Services {
    fn open(config: &Config, data_dir: PathBuf) -> Result<Self> {
        let codec = config.codec().with_context(|| {
            format!(
                "Encryption key unavailable - run `tunestats keygen` and set {}",
                ENCRYPTION_KEY_ENV
            )
        })?;
        let (client_id, client_secret) = config.client_credentials()?;

        let store = ResourceStore::new(Arc::new(FileDocumentStore::new(data_dir)?));
        let upstream = Arc::new(SpotifyClient::new()?);
        let accounts = Arc::new(SpotifyAccounts::new(client_id, client_secret)?);

        Ok(Self {
            tokens: TokenManager::new(store.clone(), codec, accounts, upstream.clone()),
            cache: CacheOrchestrator::new(store.clone(), upstream.clone(), config.cache.clone()),
            library: LibraryActions::new(upstream),
            store,
        })
    }
}

fn configure(
    client_id: Option<String>,
    client_secret: Option<String>,
    data_dir: Option<PathBuf>,
) -> Result<()> {
    let path = Config::config_path()?;
    // File values only; environment overrides are not persisted
    let mut config = Config::load_from(&path)?;
    if client_id.is_some() {
        config.client_id = client_id;
    }
    if client_secret.is_some() {
        config.client_secret = client_secret;
    }
    if data_dir.is_some() {
        config.data_dir = data_dir;
    }
    config.save()?;
    println!("Configuration written to {}", path.display());
    Ok(())
}

fn keygen(keyring: bool) -> Result<()> {
    let key = CryptoCodec::generate_key();
    if keyring {
        KeyStore::store(&key)?;
        info!("Encryption key stored in keychain");
        println!("Encryption key stored in the OS keychain.");
    } else {
        println!("{}", key);
    }
    Ok(())
}

fn read_grant(file: Option<&Path>) -> Result<TokenGrant> {
    let raw = match file {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?,
        None => {
            let mut buf = String::new();
            io::stdin().read_to_string(&mut buf)?;
            buf
        }
    };
    serde_json::from_str(&raw).context("Input is not a token endpoint response")
}

async fn import_token(services: &Services, user_id: &str, file: Option<&Path>) -> Result<()> {
    let grant = read_grant(file)?;
    let credential = services.tokens.register(user_id, &grant).await?;
    println!("Registered credential for {} (expires {})", user_id, credential.expires_at);
    Ok(())
}

async fn show(services: &Services, user_id: &str, kind: ResourceKind) -> Result<()> {
    let credential = services.tokens.valid_credential(user_id, &mut NoSession).await?;
    let served = services
        .cache
        .get_or_refresh(user_id, kind, &credential.access_token)
        .await?;

    let output = json!({
        "user_id": user_id,
        "kind": kind,
        "origin": served.origin,
        "refreshed_at": served.refreshed_at,
        "payload": served.payload,
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    info!(stats = ?services.cache.stats().snapshot(), "Cache activity");
    Ok(())
}

async fn status(services: &Services, user_id: &str) -> Result<()> {
    let now = Utc::now();

    match services.tokens.load(user_id).await? {
        Some(credential) => println!(
            "credential        {:?}, expires {}",
            credential.state(now),
            credential.expires_at
        ),
        None => println!("credential        not registered"),
    }
    if let Some(link) = services.store.profile_url(user_id).await? {
        println!("profile link      {}", link);
    }

    for (kind, refreshed_at) in services.store.freshness(user_id).await? {
        let age = refreshed_at
            .map(|at| age_display(now - at))
            .unwrap_or_else(|| "never".to_string());
        let expired = refreshed_at
            .map(|at| now - at >= services.cache.policy().ttl(kind))
            .unwrap_or(true);
        println!(
            "{:<18}{:<12}{}",
            kind,
            age,
            if expired { "expired" } else { "fresh" }
        );
    }
    Ok(())
}

async fn queue(services: &Services, user_id: &str, track: &str) -> Result<()> {
    let credential = services.tokens.valid_credential(user_id, &mut NoSession).await?;
    let uri = services
        .library
        .queue_track(&credential.access_token, track)
        .await?;
    println!("Queued {} for {}", uri, user_id);
    Ok(())
}

async fn recommend(services: &Services, user_id: &str, track: &str) -> Result<()> {
    let credential = services.tokens.valid_credential(user_id, &mut NoSession).await?;
    services
        .library
        .add_to_recommended(&credential.access_token, track)
        .await?;
    println!("Added {} to {}'s recommendations", track, user_id);
    Ok(())
}

async fn set_profile_link(services: &Services, user_id: &str, link: &str) -> Result<()> {
    services.store.put_profile_url(user_id, link).await?;
    info!(user_id, "Profile link updated");
    println!("Profile link for {} set to {}", user_id, link);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let mut config = Config::load()?;
    if let Some(dir) = cli.data_dir.clone() {
        config.data_dir = Some(dir);
    }
    let data_dir = config.data_dir()?;

    let _guard = init_tracing(&data_dir)?;
    info!(data_dir = %data_dir.display(), "tunestats starting");

    match cli.command {
        Command::Configure {
            client_id,
            client_secret,
        } => configure(client_id, client_secret, cli.data_dir),
        Command::Keygen { keyring } => keygen(keyring),
        Command::ImportToken { user_id, file } => {
            let services = Services::open(&config, data_dir)?;
            import_token(&services, &user_id, file.as_deref()).await
        }
        Command::Show { user_id, kind } => {
            let services = Services::open(&config, data_dir)?;
            show(&services, &user_id, kind).await
        }
        Command::Status { user_id } => {
            let services = Services::open(&config, data_dir)?;
            status(&services, &user_id).await
        }
        Command::Queue { user_id, track } => {
            let services = Services::open(&config, data_dir)?;
            queue(&services, &user_id, &track).await
        }
        Command::Recommend { user_id, track } => {
            let services = Services::open(&config, data_dir)?;
            recommend(&services, &user_id, &track).await
        }
        Command::SetProfileLink { user_id, link } => {
            let services = Services::open(&config, data_dir)?;
            set_profile_link(&services, &user_id, &link).await
        }
    }
}
