//! Overseer CLI - Session and user directory administration.

use std::io::{self, BufRead, IsTerminal, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use overseer_auth::{SessionSnapshot, SessionStore};
use overseer_directory::{
    AlwaysConfirm, Confirm, DirectoryRow, DirectoryView, Level, MutationOutcome, NeverConfirm,
    SkipReason,
};
use overseer_identity::AdminPolicy;
use overseer_provider::{AdminApi, SessionProvider};
use overseer_provider_http::{FileSessionStorage, HttpProvider, ProviderConfig};
use overseer_provider_memory::{MemoryProvider, FIXTURE_PASSWORD};

// ============================================================================
// CLI Structure
// ============================================================================

#[derive(Parser)]
#[command(name = "overseer")]
#[command(about = "Overseer - Sessions and user directory of your identity provider")]
#[command(version)]
struct Cli {
    /// Identity provider URL
    #[arg(long, env = "OVERSEER_PROVIDER_URL")]
    provider_url: Option<String>,

    /// Identity provider API key (service key for user administration)
    #[arg(long, env = "OVERSEER_PROVIDER_KEY", hide_env_values = true)]
    provider_key: Option<String>,

    /// Designated administrator email
    #[arg(long, default_value = "owner@example.com", env = "OVERSEER_ADMIN_EMAIL")]
    admin_email: String,

    /// JWT secret used to verify stored access tokens
    #[arg(long, env = "OVERSEER_JWT_SECRET", hide_env_values = true)]
    jwt_secret: Option<String>,

    /// Session file
    #[arg(long, default_value = ".overseer/session.json", env = "OVERSEER_SESSION_FILE")]
    session_file: PathBuf,

    /// Request timeout in seconds
    #[arg(long, default_value = "30")]
    timeout: u64,

    /// Use the in-memory provider with fixture accounts
    #[arg(long, env = "OVERSEER_MOCK")]
    mock: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show provider and session status
    Status,
    /// Sign in with email and password
    SignIn {
        #[command(flatten)]
        credentials: Credentials,
    },
    /// Register a new account
    SignUp {
        #[command(flatten)]
        credentials: Credentials,
        /// Display name (defaults to the email local part)
        #[arg(long)]
        name: Option<String>,
    },
    /// End the current session
    SignOut,
    /// Print the signed-in principal as JSON
    Whoami,
    /// Follow session changes until Ctrl-C
    Watch,
    /// User directory administration (admin only)
    Users {
        /// Sign in first with these credentials
        #[command(flatten)]
        credentials: Credentials,
        #[command(subcommand)]
        command: UsersCommands,
    },
}

#[derive(Args)]
struct Credentials {
    /// Account email
    #[arg(long, env = "OVERSEER_EMAIL")]
    email: Option<String>,
    /// Account password (prompted if omitted)
    #[arg(long, env = "OVERSEER_PASSWORD", hide_env_values = true)]
    password: Option<String>,
}

#[derive(Subcommand)]
enum UsersCommands {
    /// List all users
    List,
    /// Ban a user
    Ban {
        /// User id
        id: String,
    },
    /// Lift a ban
    Unban {
        /// User id
        id: String,
    },
    /// Grant admin status
    Promote {
        /// User id
        id: String,
    },
    /// Revoke admin status
    Demote {
        /// User id
        id: String,
    },
    /// Delete a user
    Delete {
        /// User id
        id: String,
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },
}

// ============================================================================
// Provider Setup
// ============================================================================

struct Backend {
    session: Arc<dyn SessionProvider>,
    admin: Arc<dyn AdminApi>,
}

fn connect(cli: &Cli, policy: &AdminPolicy) -> Result<Backend> {
    let credentials = cli
        .provider_url
        .as_deref()
        .zip(cli.provider_key.as_deref())
        .filter(|(url, key)| !url.trim().is_empty() && !key.trim().is_empty());

    let (url, key) = match credentials {
        Some(credentials) if !cli.mock => credentials,
        _ => {
            if !cli.mock {
                warn!("Provider credentials missing, using in-memory provider");
            }
            info!(password = FIXTURE_PASSWORD, "Fixture accounts available");
            let provider = Arc::new(
                MemoryProvider::with_fixtures(policy).context("Failed to seed fixtures")?,
            );
            return Ok(Backend {
                session: provider.clone(),
                admin: provider,
            });
        },
    };

    let mut config = ProviderConfig::new(url, key);
    config.timeout = Duration::from_secs(cli.timeout);
    if let Some(secret) = &cli.jwt_secret {
        config = config.with_jwt_secret(secret);
    }

    let storage = Arc::new(FileSessionStorage::new(&cli.session_file));
    let provider =
        Arc::new(HttpProvider::new(config, storage).context("Failed to configure provider")?);

    Ok(Backend {
        session: provider.clone(),
        admin: provider,
    })
}

// ============================================================================
// Prompts
// ============================================================================

fn prompt(label: &str) -> Result<String> {
    print!("{label}: ");
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim().to_string())
}

impl Credentials {
    fn resolve(&self) -> Result<(String, String)> {
        let email = match &self.email {
            Some(email) => email.clone(),
            None => prompt("Email")?,
        };
        let password = match &self.password {
            Some(password) => password.clone(),
            None => prompt("Password")?,
        };
        Ok((email, password))
    }
}

/// Confirmation read from stdin.
struct StdinConfirm;

impl Confirm for StdinConfirm {
    fn confirm(&self, question: &str) -> bool {
        match prompt(&format!("{question} [y/N]")) {
            Ok(answer) => matches!(answer.to_lowercase().as_str(), "y" | "yes"),
            Err(_) => false,
        }
    }
}

// ============================================================================
// Command Handlers
// ============================================================================

fn print_snapshot(snapshot: &SessionSnapshot) {
    if snapshot.loading {
        println!("Session:  loading");
        return;
    }
    match snapshot.principal() {
        Some(principal) => {
            println!("Session:  signed in");
            println!("  User:   {} <{}>", principal.display_name(), principal.email);
            println!("  Role:   {}", if snapshot.is_admin { "Admin" } else { "User" });
        },
        None => println!("Session:  signed out"),
    }
}

async fn cmd_status(backend: &Backend, store: &SessionStore) -> Result<()> {
    store.initialize().await;
    let snapshot = store.snapshot();

    println!("Overseer status:");
    println!("  Provider:     {}", backend.session.name());
    println!("  Admin email:  {}", store.policy().admin_email());
    print_snapshot(&snapshot);

    if let Some(expires_at) = snapshot.session.as_ref().and_then(|s| s.expires_at) {
        println!("  Expires at:   {expires_at} (unix)");
    }

    Ok(())
}

async fn cmd_sign_in(store: &SessionStore, credentials: &Credentials) -> Result<()> {
    let (email, password) = credentials.resolve()?;
    let outcome = store
        .sign_in(&email, &password)
        .await
        .map_err(|e| anyhow::anyhow!("Sign-in failed: {}", e.message()))?;

    println!("{}", outcome.greeting);
    Ok(())
}

async fn cmd_sign_up(
    store: &SessionStore,
    credentials: &Credentials,
    name: Option<&str>,
) -> Result<()> {
    let (email, password) = credentials.resolve()?;
    let principal = store
        .sign_up(&email, &password, name)
        .await
        .map_err(|e| anyhow::anyhow!("Sign-up failed: {}", e.message()))?;

    println!("Registered {} ({})", principal.email, principal.id);
    Ok(())
}

async fn cmd_sign_out(store: &SessionStore) -> Result<()> {
    store
        .sign_out()
        .await
        .map_err(|e| anyhow::anyhow!("Sign-out failed: {}", e.message()))?;

    println!("Signed out.");
    Ok(())
}

async fn cmd_whoami(store: &SessionStore) -> Result<()> {
    store.initialize().await;
    let snapshot = store.snapshot();

    let Some(principal) = snapshot.principal() else {
        bail!("Not signed in");
    };
    println!("{}", serde_json::to_string_pretty(principal)?);
    Ok(())
}

async fn cmd_watch(store: &SessionStore) -> Result<()> {
    let mut changes = store.watch();
    store.start().await;
    let snapshot = changes.borrow_and_update().clone();
    print_snapshot(&snapshot);

    loop {
        tokio::select! {
            changed = changes.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = changes.borrow_and_update().clone();
                print_snapshot(&snapshot);
            },
            _ = tokio::signal::ctrl_c() => {
                info!("Stopping watch");
                break;
            },
        }
    }

    store.release();
    Ok(())
}

fn print_rows(rows: &[DirectoryRow]) {
    if rows.is_empty() {
        println!("No users found.");
        return;
    }

    let columns = DirectoryRow::columns(true);
    let cells: Vec<Vec<String>> = rows
        .iter()
        .map(|row| columns.iter().map(|c| row.cell(*c)).collect())
        .collect();

    let mut widths: Vec<usize> = columns.iter().map(|c| c.header().len()).collect();
    for line in &cells {
        for (width, cell) in widths.iter_mut().zip(line) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let header: Vec<String> = columns
        .iter()
        .zip(&widths)
        .map(|(c, w)| format!("{:<w$}", c.header(), w = *w))
        .collect();
    println!("{:<10}  {}", "ID", header.join("  "));

    for (row, line) in rows.iter().zip(&cells) {
        let padded: Vec<String> = line
            .iter()
            .zip(&widths)
            .map(|(cell, w)| format!("{:<w$}", cell, w = *w))
            .collect();
        println!("{:<10}  {}", row.id(), padded.join("  "));
    }
}

fn report(view: &DirectoryView, outcome: MutationOutcome) -> Result<()> {
    for notification in view.drain_notifications() {
        match notification.level {
            Level::Success => println!("{}", notification.message),
            Level::Error => eprintln!("{}", notification.message),
        }
    }

    match outcome {
        MutationOutcome::Applied => Ok(()),
        MutationOutcome::Skipped(SkipReason::Cancelled) => {
            println!("Cancelled.");
            Ok(())
        },
        MutationOutcome::Skipped(SkipReason::UnknownRow) => bail!("No such user"),
        MutationOutcome::Skipped(SkipReason::Busy) => bail!("Another change to this user is in progress"),
        MutationOutcome::Failed(message) => bail!("Provider error: {message}"),
    }
}

async fn cmd_users(
    backend: &Backend,
    store: &SessionStore,
    credentials: &Credentials,
    command: UsersCommands,
) -> Result<()> {
    store.start().await;
    if credentials.email.is_some() {
        let (email, password) = credentials.resolve()?;
        store
            .sign_in(&email, &password)
            .await
            .map_err(|e| anyhow::anyhow!("Sign-in failed: {}", e.message()))?;
    }

    let view = DirectoryView::open(
        backend.admin.clone(),
        store.policy().clone(),
        &store.snapshot(),
    )?;

    let rows = view.list_users().await;
    let load_errors: Vec<String> = view
        .drain_notifications()
        .into_iter()
        .filter(|n| n.is_error())
        .map(|n| n.message)
        .collect();
    if let Some(message) = load_errors.first() {
        bail!("{message}");
    }

    let outcome = match command {
        UsersCommands::List => {
            print_rows(&rows);
            return Ok(());
        },
        UsersCommands::Ban { id } => view.ban_user(&id, true).await,
        UsersCommands::Unban { id } => view.ban_user(&id, false).await,
        UsersCommands::Promote { id } => view.toggle_admin(&id, true).await,
        UsersCommands::Demote { id } => view.toggle_admin(&id, false).await,
        UsersCommands::Delete { id, yes } => {
            let confirm: &dyn Confirm = if yes {
                &AlwaysConfirm
            } else if io::stdin().is_terminal() {
                &StdinConfirm
            } else {
                &NeverConfirm
            };
            view.delete_user(&id, confirm).await
        },
    };

    report(&view, outcome)
}

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let policy = AdminPolicy::new(&cli.admin_email);
    let backend = connect(&cli, &policy)?;
    let store = SessionStore::new(backend.session.clone(), policy);

    match cli.command {
        Commands::Status => cmd_status(&backend, &store).await,
        Commands::SignIn { credentials } => cmd_sign_in(&store, &credentials).await,
        Commands::SignUp { credentials, name } => {
            cmd_sign_up(&store, &credentials, name.as_deref()).await
        },
        Commands::SignOut => cmd_sign_out(&store).await,
        Commands::Whoami => cmd_whoami(&store).await,
        Commands::Watch => cmd_watch(&store).await,
        Commands::Users {
            credentials,
            command,
        } => cmd_users(&backend, &store, &credentials, command).await,
    }
}
