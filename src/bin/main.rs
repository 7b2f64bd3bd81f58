use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use mcp_sandbox_gateway::config::log_filter;
use mcp_sandbox_gateway::db::{MEMORY_URL, UserCreate};
use mcp_sandbox_gateway::{
    DatabaseConfig, GatewayConfig, SurrealUserStore, create_connection, ensure_schema,
    generate_api_key, start_gateway,
};

#[derive(Parser)]
#[command(name = "mcp-sandbox-gateway")]
#[command(about = "Authenticated SSE gateway for sandboxed MCP sessions")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the gateway HTTP server
    Serve {
        #[arg(long, env = "HOST", default_value = "0.0.0.0")]
        host: String,
        #[arg(short, long, env = "PORT", default_value = "8000")]
        port: u16,
        /// Require a valid api_key on protected endpoints
        #[arg(long, env = "REQUIRE_AUTH", default_value_t = true, action = clap::ArgAction::Set)]
        require_auth: bool,
        /// User id sessions run as when authentication is disabled
        #[arg(long, env = "DEFAULT_USER_ID", default_value = "root")]
        default_user_id: String,
        /// Directory served under /static/
        #[arg(long, env = "STATIC_DIR", default_value = "static")]
        static_dir: PathBuf,
        /// SurrealDB URL. `memory` keeps users only for the life of the process
        #[arg(long, env = "SURREALDB_URL", default_value = MEMORY_URL)]
        db_url: String,
    },
    /// Initialize the database
    Init {
        /// SurrealDB URL. `memory` keeps users only for the life of the process
        #[arg(long, env = "SURREALDB_URL", default_value = MEMORY_URL)]
        db_url: String,
    },
    /// Create a user and print its API key
    CreateUser {
        #[arg(long)]
        username: String,
        /// SurrealDB URL. `memory` keeps users only for the life of the process
        #[arg(long, env = "SURREALDB_URL", default_value = MEMORY_URL)]
        db_url: String,
    },
    /// List users
    ListUsers {
        /// SurrealDB URL. `memory` keeps users only for the life of the process
        #[arg(long, env = "SURREALDB_URL", default_value = MEMORY_URL)]
        db_url: String,
        /// Show only active users
        #[arg(long, default_value_t = false)]
        active_only: bool,
    },
    /// Deactivate a user so its API key stops working
    DeactivateUser {
        username: String,
        /// SurrealDB URL. `memory` keeps users only for the life of the process
        #[arg(long, env = "SURREALDB_URL", default_value = MEMORY_URL)]
        db_url: String,
    },
}

async fn open_store(db_url: String) -> Result<SurrealUserStore> {
    let db_config = DatabaseConfig::with_url(db_url);
    info!("Using database url: {}", db_config.url);
    if !db_config.is_persistent() {
        warn!(
            "Database url '{}' is in-process; users are lost when this process exits. \
             Set --db-url or SURREALDB_URL to a persistent store",
            db_config.url
        );
    }

    let db = create_connection(db_config).await?;
    ensure_schema(&db).await?;
    Ok(SurrealUserStore::new(db))
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(log_filter(std::env::var("RUST_LOG").ok().as_deref()))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve {
            host,
            port,
            require_auth,
            default_user_id,
            static_dir,
            db_url,
        } => {
            let config = GatewayConfig {
                bind: format!("{}:{}", host, port),
                require_auth,
                default_user_id,
                static_dir,
            };
            info!("Starting sandbox gateway on {}", config.bind);

            let store = open_store(db_url).await?;
            start_gateway(config, Arc::new(store)).await?;
        }
        Commands::Init { db_url } => {
            info!("Initializing database...");
            open_store(db_url).await?;
            info!("Database initialized successfully");
        }
        Commands::CreateUser { username, db_url } => {
            let store = open_store(db_url).await?;
            let api_key = generate_api_key();

            let user = store
                .create_user(&UserCreate {
                    username,
                    api_key: api_key.clone(),
                })
                .await?;

            println!("User created successfully!");
            println!();
            println!("  Username: {}", user.username);
            println!("  User ID:  {}", user.user_id);
            println!("  API Key:  {}", api_key);
            println!();
            println!("IMPORTANT: Save this key now. It is only shown once.");
            println!("Use with: /sse?api_key={}", api_key);
        }
        Commands::ListUsers {
            db_url,
            active_only,
        } => {
            let store = open_store(db_url).await?;
            let users = store.list_users(active_only).await?;

            if users.is_empty() {
                println!("No users found.");
                return Ok(());
            }

            println!(
                "{:<38} {:<20} {:<10} {:<25}",
                "USER ID", "USERNAME", "STATUS", "CREATED"
            );
            println!("{}", "-".repeat(93));

            for user in users {
                let status = if user.is_active { "Active" } else { "Inactive" };
                let created = user
                    .created_at
                    .map(|dt| dt.to_string())
                    .unwrap_or_else(|| "-".to_string());

                println!(
                    "{:<38} {:<20} {:<10} {:<25}",
                    user.user_id, user.username, status, created
                );
            }
        }
        Commands::DeactivateUser { username, db_url } => {
            let store = open_store(db_url).await?;

            if store.deactivate_user(&username).await? {
                println!("User '{}' has been deactivated.", username);
            } else {
                println!("No user found with username '{}'.", username);
            }
        }
    }

    Ok(())
}
