//! Loomshop CLI - Database migrations and account management.
//!
//! # Usage
//!
//! ```bash
//! # Run database migrations
//! loomshop migrate
//!
//! # Create the store owner account if it does not exist yet
//! loomshop seed --email owner@example.com --password 'change-me-now'
//!
//! # Create an admin account
//! loomshop admin create -e admin@example.com -n "Admin Name" -p 'secret-pass' -r admin
//! ```
//!
//! # Commands
//!
//! - `migrate` - Run database migrations
//! - `seed` - Create the initial super admin (idempotent)
//! - `admin create` - Create admin users

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "loomshop")]
#[command(author, version, about = "Loomshop CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Create the initial super admin unless that email already exists
    Seed {
        /// Owner email address
        #[arg(short, long, env = "SEED_ADMIN_EMAIL")]
        email: String,

        /// Owner password
        #[arg(short, long, env = "SEED_ADMIN_PASSWORD")]
        password: String,

        /// Owner display name
        #[arg(short, long, default_value = "Admin")]
        name: String,
    },
    /// Manage admin users
    Admin {
        #[command(subcommand)]
        action: AdminAction,
    },
}

#[derive(Subcommand)]
enum AdminAction {
    /// Create a new admin user
    Create {
        /// Admin email address
        #[arg(short, long)]
        email: String,

        /// Admin display name
        #[arg(short, long)]
        name: String,

        /// Admin password
        #[arg(short, long)]
        password: String,

        /// Admin role (`super_admin`, `admin`)
        #[arg(short, long, default_value = "admin")]
        role: String,
    },
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Migrate => commands::migrate::run().await?,
        Commands::Seed {
            email,
            password,
            name,
        } => commands::admin::seed(&email, &name, &password).await?,
        Commands::Admin { action } => match action {
            AdminAction::Create {
                email,
                name,
                password,
                role,
            } => {
                commands::admin::create_user(&email, &name, &password, &role).await?;
            }
        },
    }
    Ok(())
}
