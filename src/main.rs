use std::net::SocketAddr;

use anyhow::Context;
use blog_backend::{
    build_app,
    config::AppConfig,
    errors::RequestError,
    init_db, init_tracing,
    management::{create_user, seed_categories},
    run_app,
};
use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "blog_backend", about = "Blog REST backend")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP server (default)
    Serve {
        /// Overrides APP_HOST
        #[arg(long)]
        host: Option<String>,
        /// Overrides APP_PORT
        #[arg(long)]
        port: Option<u16>,
    },
    /// Create the default blog categories
    CreateCategories,
    /// Create a user account
    CreateUser {
        #[arg(long)]
        username: String,
        #[arg(long)]
        password: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    let mut config = AppConfig::from_env()?;

    match cli.command.unwrap_or(Command::Serve {
        host: None,
        port: None,
    }) {
        Command::Serve { host, port } => {
            if let Some(host) = host {
                config.host = host;
            }
            if let Some(port) = port {
                config.port = port;
            }
            let addr: SocketAddr = format!("{}:{}", config.host, config.port)
                .parse()
                .context("APP_HOST/APP_PORT do not form a socket address")?;
            let app = build_app(config).await?;
            tracing::info!(%addr, "server starting");
            run_app(app, addr).await?;
        }
        Command::CreateCategories => {
            let pool = init_db(&config).await?;
            let report = seed_categories(&pool).await?;
            println!(
                "Created {} new categories out of {} total",
                report.created,
                report.total()
            );
        }
        Command::CreateUser { username, password } => {
            let pool = init_db(&config).await?;
            match create_user(&pool, username, password).await {
                Ok(user) => println!("Created user \"{}\" (id {})", user.username, user.id),
                Err(RequestError::Validation(errors)) => {
                    anyhow::bail!("invalid user: {}", serde_json::to_string(&errors)?)
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
    Ok(())
}
