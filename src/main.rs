//! HaloLight CLI
//!
//! Command-line front end for the HaloLight admin backend:
//! - Log in and out, register, reset passwords
//! - Inspect and switch accounts
//! - Send authenticated requests

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use halolight::account::RegisterRequest;
use halolight::{
    generate_default_config, ApiClient, ApiRequest, AuthMode, AuthService, Config, LoginRedirect,
    LoggingConfig, PersistedSession, SessionStore,
};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "halolight")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "HaloLight admin client")]
#[command(long_about = "Command-line client for the HaloLight admin backend.\nExpired sessions are refreshed automatically; set HALOLIGHT_MOCK=true to use the demo accounts.")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file (default: <config dir>/halolight/config.toml or ./halolight.toml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Backend base URL (overrides config)
    #[arg(long, global = true)]
    pub api_url: Option<String>,

    /// Use the built-in demo accounts instead of the backend
    #[arg(long, global = true)]
    pub mock: bool,

    /// Output format (table, json)
    #[arg(short, long, default_value = "table", global = true)]
    pub format: String,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Log in with email and password
    Login {
        email: String,
        #[arg(short, long)]
        password: String,
    },

    /// Create an account
    Register {
        #[arg(long)]
        email: String,
        #[arg(long)]
        name: String,
        #[arg(short, long)]
        password: String,
        /// Repeat the password
        #[arg(long)]
        confirm_password: String,
    },

    /// End the session
    Logout,

    /// Show the logged-in user
    Whoami,

    /// List switchable accounts
    Accounts,

    /// Make another account active (mock mode only)
    Switch {
        account_id: String,
    },

    /// Request a password reset email
    ForgotPassword {
        email: String,
    },

    /// Set a new password with a reset token
    ResetPassword {
        token: String,
        #[arg(short, long)]
        password: String,
    },

    /// Authenticated GET request
    Get {
        /// Path relative to the API URL (e.g. /users)
        path: String,
        /// Query parameters in key=value format
        #[arg(short, long)]
        query: Vec<String>,
    },

    /// Authenticated POST request
    Post {
        path: String,
        /// JSON body
        #[arg(short, long)]
        data: Option<String>,
    },

    /// Show session and client status
    Status,

    /// Generate default config file
    Config {
        /// Output path (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => Config::load_with_env(path)
            .with_context(|| format!("Failed to load config from {:?}", path))?,
        None => Config::load_default(),
    };
    if let Some(url) = &cli.api_url {
        config.api.url = url.clone();
    }
    if cli.mock {
        config.api.mode = AuthMode::Mock;
    }

    init_logging(&config.logging);

    if let Commands::Config { output } = &cli.command {
        return write_default_config(output.as_deref());
    }

    let redirect = Arc::new(LoginRedirect::new(config.session.login_path.clone()));
    let client = Arc::new(
        ApiClient::from_config(&config, redirect.clone()).context("Failed to create API client")?,
    );
    let service = Arc::new(AuthService::new(
        Arc::clone(&client),
        Duration::from_millis(config.session.mock_latency_ms),
    ));

    let state_path = PathBuf::from(&config.session.state_path);
    let mut session = SessionStore::new(service);
    session.restore(PersistedSession::load(&state_path).context("Failed to load session state")?);

    let result = run(&cli, &config, &client, &mut session).await;

    session
        .persisted()
        .save(&state_path)
        .context("Failed to save session state")?;

    if redirect.redirects() > 0 {
        eprintln!(
            "Session expired. Log in again with: halolight login <email> -p <password> ({})",
            redirect.login_path()
        );
    }

    result
}

fn init_logging(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("halolight={}", logging.level)));
    let registry = tracing_subscriber::registry().with(filter);

    if logging.format == "json" {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

async fn run(
    cli: &Cli,
    config: &Config,
    client: &ApiClient,
    session: &mut SessionStore,
) -> Result<()> {
    match &cli.command {
        Commands::Login { email, password } => {
            let account = session.login(email, password).await?;
            println!("Logged in as {} <{}>", account.user.name, account.user.email);
            println!("Role: {}", account.user.role.label);
        }

        Commands::Register {
            email,
            name,
            password,
            confirm_password,
        } => {
            let account = session
                .register(&RegisterRequest {
                    email: email.clone(),
                    name: name.clone(),
                    password: password.clone(),
                    confirm_password: confirm_password.clone(),
                })
                .await?;
            println!("Registered {} <{}>", account.user.name, account.user.email);
        }

        Commands::Logout => {
            session.logout().await;
            println!("Logged out");
        }

        Commands::Whoami => match session.refresh_current_user().await {
            Some(account) => {
                if cli.format == "json" {
                    println!("{}", serde_json::to_string_pretty(&account.user)?);
                } else {
                    println!("{} ({})", account.user.name, session.initials());
                    println!("  Email:  {}", account.user.email);
                    println!("  Role:   {}", account.user.role.label);
                    println!("  Status: {:?}", account.user.status);
                    if let Some(last) = &account.user.last_login_at {
                        println!("  Last login: {}", last);
                    }
                }
            }
            None => bail!("Not logged in"),
        },

        Commands::Accounts => {
            session.load_accounts().await;

            if cli.format == "json" {
                println!("{}", serde_json::to_string_pretty(session.accounts())?);
            } else if session.accounts().is_empty() {
                println!("No switchable accounts.");
                if client.mode() == AuthMode::Live {
                    println!("Multiple accounts are only available in mock mode (--mock).");
                }
            } else {
                println!("  {:<14} {:<30} {:<20} {}", "ID", "Email", "Role", "Name");
                println!("{}", "-".repeat(80));

                for account in session.accounts() {
                    let marker = if session.active_account_id() == Some(account.user.id.as_str()) {
                        "*"
                    } else {
                        " "
                    };
                    println!(
                        "{} {:<14} {:<30} {:<20} {}",
                        marker,
                        account.user.id,
                        account.user.email,
                        account.user.role.label,
                        account.user.name
                    );
                }
            }
        }

        Commands::Switch { account_id } => {
            if session.accounts().is_empty() {
                session.load_accounts().await;
            }
            session.switch_account(account_id)?;
            println!("Switched to {}", account_id);
        }

        Commands::ForgotPassword { email } => {
            session.service().forgot_password(email).await?;
            println!("If {} is registered, a reset link is on its way", email);
        }

        Commands::ResetPassword { token, password } => {
            session.service().reset_password(token, password).await?;
            println!("Password updated");
        }

        Commands::Get { path, query } => {
            let mut request = ApiRequest::get(path.as_str());
            for pair in query {
                match pair.split_once('=') {
                    Some((k, v)) => request = request.query(k, v),
                    None => bail!("Invalid query parameter {:?}, expected key=value", pair),
                }
            }

            let payload = client.send(request).await?;
            print_payload(&payload, &cli.format)?;
        }

        Commands::Post { path, data } => {
            let mut request = ApiRequest::post(path.as_str());
            if let Some(raw) = data {
                let body: Value = serde_json::from_str(raw).context("--data must be valid JSON")?;
                request = request.with_body(body);
            }

            let payload = client.send(request).await?;
            print_payload(&payload, &cli.format)?;
        }

        Commands::Status => {
            let stats = client.refresh_stats();

            println!("HaloLight v{}", env!("CARGO_PKG_VERSION"));
            println!();
            println!("API URL: {}", config.api.url);
            println!("Mode:    {}", client.mode());
            println!("Policy:  {:?}", client.policy());
            println!();
            println!(
                "Session: {}",
                if session.is_authenticated() {
                    "authenticated"
                } else {
                    "not logged in"
                }
            );
            if let Some(account) = session.user() {
                println!("  User: {} <{}>", account.user.name, account.user.email);
            }
            if let Some(error) = session.error() {
                println!("  Last error: {}", error);
            }
            println!();
            println!("Refresh:");
            println!("  Cycles:   {}", stats.cycles);
            println!("  Failures: {}", stats.failures);
        }

        Commands::Config { output } => write_default_config(output.as_deref())?,
    }

    Ok(())
}

fn print_payload(payload: &Value, format: &str) -> Result<()> {
    match format {
        "json" => println!("{}", serde_json::to_string(payload)?),
        _ => println!("{}", serde_json::to_string_pretty(payload)?),
    }
    Ok(())
}

fn write_default_config(output: Option<&Path>) -> Result<()> {
    let config = generate_default_config();

    match output {
        Some(path) => {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(path, &config)?;
            println!("Config written to {:?}", path);
        }
        None => {
            print!("{}", config);
        }
    }

    Ok(())
}
