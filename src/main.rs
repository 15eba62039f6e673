//! Natours server binary.
//!
//! # Usage
//!
//! ```bash
//! # Start the server (default command)
//! cargo run -- serve
//!
//! # Print the pipeline stage order for the configured environment
//! cargo run -- stages
//! APP_ENV=production cargo run -- stages
//! ```

use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::*;
use natours::config::{self, Config, Environment};
use natours::pipeline::{self, Placement};
use natours::routes::Collaborators;
use natours::server;
use tracing_subscriber::EnvFilter;

/// Natours HTTP front.
#[derive(Parser)]
#[command(name = "natours")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP server
    Serve,

    /// Show the request pipeline in order
    Stages,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let config = config::load_from_env()?;

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => {
            init_tracing(&config);
            config.print_summary();
            // Domain routers are mounted by the deployment; this binary serves
            // the pipeline, static assets and /health on its own.
            server::run(config, Collaborators::default()).await
        }
        Commands::Stages => {
            print_stages(config.pipeline.environment);
            Ok(())
        }
    }
}

fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    if config.log_format == "json" {
        builder.json().flatten_event(true).init();
    } else {
        builder.init();
    }
}

fn print_stages(environment: Environment) {
    println!(
        "{} {}",
        "Pipeline for".bold(),
        environment.as_str().cyan().bold()
    );
    println!();

    for (i, stage) in pipeline::stages(environment).into_iter().enumerate() {
        let name = match stage.placement() {
            Placement::Middleware => stage.name().green(),
            Placement::Dispatch | Placement::Fallback => stage.name().yellow(),
            Placement::Terminal => stage.name().red(),
        };
        println!("  {:>2}. {:<24} {}", i + 1, name, stage.description().dimmed());
    }
}
