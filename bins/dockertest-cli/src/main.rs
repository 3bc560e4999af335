mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "dockertest-cli")]
#[command(about = "Launch disposable Docker fixtures for local testing", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start a MySQL fixture (or reuse TEST_MYSQL_HOST) until Ctrl+C
    Mysql {
        /// Print options and URL as JSON
        #[arg(long, default_value = "false")]
        json: bool,
    },

    /// Run a migration image against a fresh MySQL container
    Migrate {
        /// Migration image repository
        #[arg(short, long)]
        image: String,

        /// Migration image tag
        #[arg(short, long, default_value = "latest")]
        tag: String,

        /// Command override (defaults to `bundle exec rake db:migrate`)
        #[arg(last = true)]
        command: Vec<String>,
    },

    /// Run any image until Ctrl+C
    Run {
        /// Image repository
        #[arg(short, long)]
        image: String,

        /// Image tag
        #[arg(short, long, default_value = "latest")]
        tag: String,

        /// Port to expose, optionally `container:host`
        #[arg(short, long)]
        port: Vec<String>,

        /// Environment entry `KEY=VALUE`
        #[arg(short, long)]
        env: Vec<String>,

        /// Command override
        #[arg(last = true)]
        args: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .with_line_number(true)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Mysql { json } => {
            commands::hold_mysql(json).await?;
        }
        Commands::Migrate {
            image,
            tag,
            command,
        } => {
            commands::migrate(&image, &tag, command).await?;
        }
        Commands::Run {
            image,
            tag,
            port,
            env,
            args,
        } => {
            commands::run_container(&image, &tag, &port, env, args).await?;
        }
    }

    Ok(())
}
