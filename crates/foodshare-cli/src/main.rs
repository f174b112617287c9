mod admin;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use foodshare_core::UserType;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "foodshare-cli")]
#[command(about = "Foodshare administration commands")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Apply pending database migrations
    Migrate,
    /// Upsert food categories from a YAML file
    SeedCategories {
        /// Categories file (defaults to the configured path)
        #[arg(long)]
        file: Option<PathBuf>,
    },
    /// Manage user accounts
    Users {
        #[command(subcommand)]
        command: UserCommands,
    },
    /// Manage API bearer tokens
    Tokens {
        #[command(subcommand)]
        command: TokenCommands,
    },
}

#[derive(Debug, Subcommand)]
enum UserCommands {
    /// Create a user account
    Create {
        #[arg(long)]
        email: String,
        #[arg(long)]
        username: String,
        /// donor, organization, or admin
        #[arg(long, default_value = "donor")]
        user_type: UserType,
        /// Grant staff access
        #[arg(long)]
        staff: bool,
    },
}

#[derive(Debug, Subcommand)]
enum TokenCommands {
    /// Issue a token for a user; the raw token is printed once
    Issue {
        #[arg(long)]
        email: String,
        /// Free-form note stored alongside the token
        #[arg(long)]
        label: Option<String>,
    },
    /// Revoke a token by id
    Revoke {
        #[arg(long)]
        id: i64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let Some(command) = cli.command else {
        println!("no command given; run with --help for usage");
        return Ok(());
    };

    dotenvy::dotenv().ok();
    let config = foodshare_core::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let pool_config = foodshare_db::PoolConfig::from_app_config(&config);
    let pool = foodshare_db::connect_pool(&config.database_url, pool_config).await?;

    match command {
        Commands::Migrate => admin::run_migrate(&pool).await?,
        Commands::SeedCategories { file } => {
            let path = file.unwrap_or_else(|| config.categories_path.clone());
            admin::run_seed_categories(&pool, &path).await?;
        }
        Commands::Users {
            command:
                UserCommands::Create {
                    email,
                    username,
                    user_type,
                    staff,
                },
        } => admin::run_create_user(&pool, &email, &username, user_type, staff).await?,
        Commands::Tokens {
            command: TokenCommands::Issue { email, label },
        } => {
            admin::run_issue_token(&pool, &config.token_hash_salt, &email, label.as_deref())
                .await?;
        }
        Commands::Tokens {
            command: TokenCommands::Revoke { id },
        } => admin::run_revoke_token(&pool, id).await?,
    }

    pool.close().await;
    Ok(())
}
