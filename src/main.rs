use anyhow::Result;
use clap::{Parser, Subcommand};

mod cache;
mod carve;
mod cipher;
mod error;
mod extractor;
mod keys;
mod types;
mod util;

use extractor::Extractor;

#[derive(Parser, Debug)]
#[command(name = "unembed", version, about = "Resolve playable video links from embedded player URLs", long_about = None)]
struct Cli {
    /// Print output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Print debug logs
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Decrypt and list the video sources behind an embed URL
    #[command(visible_alias = "get")]
    Sources { url: String },

    /// Show the key schedule currently derivable from the host's player script
    Schedule { url: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    util::set_debug(cli.debug);

    match cli.command {
        Commands::Sources { url } => {
            util::debug(format!("resolving sources for {}", url));
            let engine = Extractor::from_embed_url(&url)?;
            let list = engine.video_list(&url).await?;
            if cli.json {
                util::print_json(&list);
            } else {
                util::print_video_list_human(&list);
            }
            Ok(())
        }
        Commands::Schedule { url } => {
            util::debug(format!("deriving key schedule for {}", url));
            let engine = Extractor::from_embed_url(&url)?;
            let schedule = engine.key_schedule().await?;
            if cli.json {
                util::print_json(&schedule);
            } else {
                util::print_schedule_human(&schedule);
            }
            Ok(())
        }
    }
}
