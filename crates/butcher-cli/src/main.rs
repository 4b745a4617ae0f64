mod admin;
mod quote;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::admin::AdminCommands;

#[derive(Debug, Parser)]
#[command(name = "butcher-cli")]
#[command(about = "Butcher shop operations: database setup, admin accounts, cart quotes")]
struct Cli {
    /// Postgres connection string
    #[arg(long, env = "DATABASE_URL", global = true, hide_env_values = true)]
    database_url: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Database maintenance
    Db {
        #[command(subcommand)]
        command: DbCommands,
    },
    /// Administrator accounts
    Admin {
        #[command(subcommand)]
        command: AdminCommands,
    },
    /// Price a JSON cart file against the current shop settings
    Quote {
        /// Path to the cart file
        file: PathBuf,
        /// Add the delivery fee even if the file does not ask for it
        #[arg(long)]
        delivery: bool,
    },
}

#[derive(Debug, Subcommand)]
enum DbCommands {
    /// Check that the database is reachable
    Ping,
    /// Apply pending migrations
    Migrate,
    /// Create the settings row and starter categories
    Seed,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let log_level = std::env::var("BUTCHER_LOG_LEVEL").unwrap_or_else(|_| "warn".to_owned());
    let env_filter =
        EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(log_level))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let cli = Cli::parse();
    let Some(command) = cli.command else {
        println!("butcher-cli ready; run with --help to list commands");
        return Ok(());
    };

    let database_url = cli.database_url.ok_or_else(|| {
        anyhow::anyhow!("DATABASE_URL is not set; pass --database-url or set it in .env")
    })?;
    let pool =
        butcher_db::connect_pool(&database_url, butcher_db::PoolConfig::default()).await?;

    match command {
        Commands::Db { command } => run_db(&pool, command).await,
        Commands::Admin {
            command:
                AdminCommands::Create {
                    email,
                    password,
                    mobile,
                    first_name,
                    last_name,
                    father_name,
                },
        } => {
            admin::run_admin_create(
                &pool,
                &admin::AdminInput {
                    email: &email,
                    password: &password,
                    mobile: &mobile,
                    first_name: &first_name,
                    last_name: &last_name,
                    father_name: father_name.as_deref().unwrap_or_default(),
                },
            )
            .await
        }
        Commands::Quote { file, delivery } => quote::run_quote(&pool, &file, delivery).await,
    }
}

async fn run_db(pool: &sqlx::PgPool, command: DbCommands) -> anyhow::Result<()> {
    match command {
        DbCommands::Ping => {
            butcher_db::health_check(pool).await?;
            println!("database ok");
        }
        DbCommands::Migrate => {
            let applied = butcher_db::run_migrations(pool).await?;
            println!("applied {applied} migration(s)");
        }
        DbCommands::Seed => {
            let created = butcher_db::seed_defaults(pool).await?;
            let categories = butcher_db::seed_default_categories(pool).await?;
            println!(
                "settings {}; inserted {categories} categor{}",
                if created { "created" } else { "already present" },
                if categories == 1 { "y" } else { "ies" }
            );
        }
    }
    Ok(())
}
