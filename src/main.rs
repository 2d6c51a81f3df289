use std::fs;
use std::sync::Arc;

use chrono::Utc;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use waitlist::auth::normalize_owner_email;
use waitlist::cli::{
    AdminCommands, AuthCommands, ProjectCommands, init_store, run_auth_login, run_auth_logout,
    run_project_link, run_project_list, run_project_new, run_project_stats,
};
use waitlist::config::{ServerConfig, SignupLimits};
use waitlist::server::{AppState, create_router};
use waitlist::store::{SqliteStore, Store};
use waitlist::types::Owner;

#[derive(Parser)]
#[command(name = "waitlist")]
#[command(about = "A waitlist server with per-source signup attribution", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Administrative commands
    Admin {
        #[command(subcommand)]
        command: AdminCommands,
    },

    /// Sign in to a waitlist server
    Auth {
        #[command(subcommand)]
        command: AuthCommands,
    },

    /// Manage your projects
    Project {
        #[command(subcommand)]
        command: ProjectCommands,
    },

    /// Start the server
    Serve {
        /// Host to bind to
        #[arg(long, env = "WAITLIST_HOST", default_value = "127.0.0.1")]
        host: String,

        /// Port to bind to
        #[arg(long, short, env = "WAITLIST_PORT", default_value = "8080")]
        port: u16,

        /// Data directory for the database and waitlist.toml
        #[arg(long, env = "WAITLIST_DATA_DIR", default_value = "./data")]
        data_dir: String,

        /// Public base URL for external access (e.g., "https://join.example.com").
        /// Used for tracking and magic links. If not set, URLs are derived from request headers.
        #[arg(long, env = "WAITLIST_PUBLIC_BASE_URL")]
        public_base_url: Option<String>,

        /// Read the visitor IP from X-Forwarded-For (only behind a trusted proxy)
        #[arg(long, env = "WAITLIST_TRUST_FORWARDED_FOR")]
        trust_forwarded_for: bool,

        /// Where browsers without a session are redirected
        #[arg(long, env = "WAITLIST_LOGIN_URL", default_value = "/login")]
        login_url: String,
    },
}

fn run_init(
    data_dir: String,
    owner_email: Option<String>,
    non_interactive: bool,
) -> anyhow::Result<()> {
    let config = ServerConfig {
        data_dir: data_dir.into(),
        ..ServerConfig::default()
    };
    fs::create_dir_all(&config.data_dir)?;

    let db_path = config.db_path();
    let store = SqliteStore::new(&db_path)?;
    store.initialize()?;

    println!();
    println!("Database ready at {}", db_path.display());

    let email = match owner_email {
        Some(email) => Some(email),
        None if non_interactive || store.has_owner()? => None,
        None => prompt_owner_email()?,
    };

    if let Some(email) = email {
        create_owner(&store, &email)?;
    }

    println!();
    Ok(())
}

fn prompt_owner_email() -> anyhow::Result<Option<String>> {
    let create = inquire::Confirm::new("Would you like to create an owner account?")
        .with_default(false)
        .prompt()?;

    if !create {
        return Ok(None);
    }

    let email = inquire::Text::new("Owner email:")
        .with_validator(|input: &str| {
            if input.trim().is_empty() {
                Err("Email cannot be empty".into())
            } else if !input.contains('@') {
                Err("Email must contain '@'".into())
            } else {
                Ok(inquire::validator::Validation::Valid)
            }
        })
        .prompt()?;

    Ok(Some(email))
}

fn create_owner(store: &SqliteStore, email: &str) -> anyhow::Result<()> {
    let email = normalize_owner_email(email);

    if let Some(existing) = store.get_owner_by_email(&email)? {
        println!("Owner {} already exists (id {})", existing.email, existing.id);
        return Ok(());
    }

    let owner = Owner {
        id: Uuid::new_v4().to_string(),
        email,
        created_at: Utc::now(),
    };
    store.create_owner(&owner)?;

    println!("Created owner {} (id {})", owner.email, owner.id);
    println!("Sign in with: waitlist auth login --email {}", owner.email);

    Ok(())
}

async fn run_serve(mut config: ServerConfig) -> anyhow::Result<()> {
    if config.load_file_overrides()? {
        info!("Loaded overrides from {}", config.config_file_path().display());
    }
    config.validate()?;

    let store = init_store(&config.db_path())?.with_limits(config.signup_limits);
    store.initialize()?;

    let SignupLimits {
        max_attempts,
        window_secs,
    } = config.signup_limits;
    info!(max_attempts, window_secs, "Signup rate limit");
    if !config.trust_forwarded_for {
        info!("X-Forwarded-For is not trusted; signups will not be rate limited by IP");
    }

    let state = Arc::new(AppState::new(Arc::new(store), &config));
    let app = create_router(state);
    let addr = config.socket_addr()?;

    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("waitlist=info".parse()?))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Admin { command } => match command {
            AdminCommands::Init {
                data_dir,
                owner_email,
                non_interactive,
            } => run_init(data_dir, owner_email, non_interactive)?,
        },
        Commands::Auth { command } => match command {
            AuthCommands::Login {
                server,
                email,
                token,
                non_interactive,
            } => tokio::task::block_in_place(|| {
                run_auth_login(server, email, token, non_interactive)
            })?,
            AuthCommands::Logout => tokio::task::block_in_place(run_auth_logout)?,
        },
        Commands::Project { command } => tokio::task::block_in_place(|| match command {
            ProjectCommands::List { json } => run_project_list(json),
            ProjectCommands::New {
                name,
                slug,
                non_interactive,
            } => run_project_new(name, slug, non_interactive),
            ProjectCommands::Stats { project_id, json } => run_project_stats(project_id, json),
            ProjectCommands::Link { project_id, src } => run_project_link(project_id, src),
        })?,
        Commands::Serve {
            host,
            port,
            data_dir,
            public_base_url,
            trust_forwarded_for,
            login_url,
        } => {
            let config = ServerConfig {
                host,
                port,
                data_dir: data_dir.into(),
                public_base_url,
                trust_forwarded_for,
                login_url,
                ..ServerConfig::default()
            };
            run_serve(config).await?;
        }
    }

    Ok(())
}
