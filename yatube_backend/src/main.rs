use anyhow::Result;
use clap::{Parser, Subcommand};
use yatube_backend::cli;
use yatube_backend::config::YatubeConfig;
use yatube_backend::node::YatubeNode;
use yatube_backend::telemetry;
use yatube_backend::utils;

#[derive(Parser)]
#[command(author, version, about = "Yatube blogging site and admin console")]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the web server
    Serve,
    /// Start the interactive admin console for users, groups and posts
    Cli,
}

#[tokio::main]
async fn main() -> Result<()> {
    utils::print_banner();
    telemetry::init_tracing();

    let args = Args::parse();

    let config = YatubeConfig::from_env()?;
    let node = YatubeNode::start(config).await?;
    tracing::info!("bootstrap complete");

    match args.command.unwrap_or(Command::Serve) {
        Command::Serve => node.run_http_server().await,
        Command::Cli => {
            let snapshot = node.snapshot();
            cli::run_cli(snapshot.config, snapshot.database).await
        }
    }
}
