use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand, ValueEnum};
use std::net::SocketAddr;
use std::path::PathBuf;

use feedmerge::codec::{decode_feed_list, encode_feed_list};
use feedmerge::config::Config;
use feedmerge::feed::build_client;
use feedmerge::merge::aggregate;
use feedmerge::output::OutputFormat;
use feedmerge::server;

#[derive(Parser, Debug)]
#[command(
    name = "feedmerge",
    version,
    about = "Merge RSS/Atom and JSON Feed sources into one feed"
)]
struct Args {
    /// Configuration file
    #[arg(long, value_name = "FILE", default_value = "feedmerge.toml", global = true)]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP service
    Serve {
        /// Listen address (overrides `bind` in the config file)
        #[arg(long, value_name = "ADDR")]
        bind: Option<SocketAddr>,
    },
    /// Merge feeds once and print the result
    Merge {
        #[arg(required = true, value_name = "URL")]
        urls: Vec<String>,

        #[arg(long, value_enum, default_value_t = Format::Rss)]
        format: Format,
    },
    /// Print the compact `feeds` encoding of a URL list
    Encode {
        #[arg(required = true, value_name = "URL")]
        urls: Vec<String>,
    },
    /// Print the URLs in a compact `feeds` payload, one per line
    Decode { payload: String },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Format {
    Rss,
    Json,
}

impl From<Format> for OutputFormat {
    fn from(format: Format) -> Self {
        match format {
            Format::Rss => OutputFormat::Rss,
            Format::Json => OutputFormat::JsonFeed,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    match args.command {
        Command::Serve { bind } => {
            let mut config = load_config(&args.config)?;
            if let Some(bind) = bind {
                config.bind = bind;
            }
            server::serve(config).await
        }
        Command::Merge { urls, format } => {
            let config = load_config(&args.config)?;
            let client = build_client(&config.user_agent, config.allow_private_hosts)
                .context("Failed to build HTTP client")?;
            let urls: Vec<String> = urls
                .into_iter()
                .map(|u| u.trim().to_owned())
                .filter(|u| !u.is_empty())
                .collect();

            let self_link = config.public_url.clone().unwrap_or_default();
            let merged = aggregate(&client, &urls, &self_link, &config.aggregate_options()).await;
            let body = OutputFormat::from(format)
                .render(&merged, Utc::now())
                .context("Failed to render merged feed")?;
            println!("{body}");
            Ok(())
        }
        Command::Encode { urls } => {
            println!("{}", encode_feed_list(&urls).context("Failed to encode feed list")?);
            Ok(())
        }
        Command::Decode { payload } => {
            let urls = decode_feed_list(&payload).context("Failed to decode feed list")?;
            for url in urls {
                println!("{url}");
            }
            Ok(())
        }
    }
}

fn load_config(path: &std::path::Path) -> Result<Config> {
    Config::load(path).with_context(|| format!("Failed to load config from {}", path.display()))
}
