mod commands;
mod errors;

use clap::Parser;
use colored::Colorize;
use harbor_agent::agent::LaunchAgent;
use tracing_subscriber::EnvFilter;

use crate::commands::Commands;
use crate::errors::Result;

/// Harbor - manages the gateway daemon's per-user launch agent
#[derive(Parser, Debug)]
#[command(name = "harbor")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("warn")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let agent = LaunchAgent::system();
    match cli.command {
        Commands::Enable { port } => {
            agent.enable(port).await?;
            println!("{} gateway launch agent enabled on port {}", "ok:".green(), port);
        }
        Commands::Disable => {
            agent.disable().await;
            println!("{} gateway launch agent disabled", "ok:".green());
        }
        Commands::Status => {
            if agent.is_loaded().await {
                println!("{}", "loaded".green());
            } else {
                println!("{}", "not loaded".red());
            }
            match agent.installed_config() {
                Some(installed) => {
                    let unknown = || "unknown".to_string();
                    println!("  port:     {}", installed.port.map(|p| p.to_string()).unwrap_or_else(unknown));
                    println!("  bind:     {}", installed.bind.map(|b| b.to_string()).unwrap_or_else(unknown));
                    println!("  token:    {}", if installed.token.is_some() { "set" } else { "unset" });
                    println!("  password: {}", if installed.password.is_some() { "set" } else { "unset" });
                }
                None => println!("  no descriptor installed"),
            }
        }
        Commands::Restart => {
            agent.kickstart().await;
            println!("{} restart signal sent", "ok:".green());
        }
    }
    Ok(())
}
