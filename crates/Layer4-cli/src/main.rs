//! Wayfarer CLI - Main entry point

mod cli;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Wayfarer - cached, budgeted and retried calls to a text-generation service
#[derive(Parser, Debug)]
#[command(name = "wayfarer")]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Model to use
    #[arg(long, global = true)]
    model: Option<String>,

    /// API key (overrides env and config)
    #[arg(long, global = true)]
    api_key: Option<String>,

    /// Base URL of an OpenAI-compatible endpoint
    #[arg(long, global = true)]
    base_url: Option<String>,

    /// Directory holding the cache database and fallback files
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Ask a question and print the answer
    Ask {
        /// User prompt
        prompt: String,

        /// System prompt
        #[arg(short, long)]
        system: Option<String>,

        /// Request class the answer is cached under
        #[arg(short, long, default_value = wayfarer_invoker::CHAT_REQUEST_CLASS)]
        class: String,

        /// Cache lifetime in seconds (default from config)
        #[arg(long)]
        ttl: Option<u64>,

        /// Do not print progress notices
        #[arg(short, long)]
        quiet: bool,
    },
    /// Ask for a JSON document and print it pretty
    AskJson {
        /// User prompt
        prompt: String,

        /// System prompt
        #[arg(short, long)]
        system: Option<String>,

        /// Request class the parsed document is cached under
        #[arg(short, long, default_value = "structured")]
        class: String,

        /// Cache lifetime in seconds (default from config)
        #[arg(long)]
        ttl: Option<u64>,

        /// Do not print progress notices
        #[arg(short, long)]
        quiet: bool,
    },
    /// Print the cache key of a JSON request
    Fingerprint {
        /// Request class
        class: String,

        /// Request as JSON text
        request: String,
    },
    /// Delete expired cache entries
    Sweep,
    /// Show cache locations and entry counts
    Stats,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.debug { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    let overrides = cli::Overrides {
        model: args.model,
        api_key: args.api_key,
        base_url: args.base_url,
        data_dir: args.data_dir,
    };

    match args.command {
        Command::Ask {
            prompt,
            system,
            class,
            ttl,
            quiet,
        } => {
            let config = cli::load_config(&overrides);
            let request = cli::AskRequest {
                prompt,
                system,
                class,
                ttl,
                quiet,
            };
            cli::ask(&config, &request).await
        }
        Command::AskJson {
            prompt,
            system,
            class,
            ttl,
            quiet,
        } => {
            let config = cli::load_config(&overrides);
            let request = cli::AskRequest {
                prompt,
                system,
                class,
                ttl,
                quiet,
            };
            cli::ask_json(&config, &request).await
        }
        Command::Fingerprint { class, request } => cli::fingerprint(&class, &request),
        Command::Sweep => cli::sweep(&cli::load_config(&overrides)),
        Command::Stats => cli::stats(&cli::load_config(&overrides)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_parse_ask() {
        let args = Args::try_parse_from([
            "wayfarer",
            "--model",
            "gpt-4o-mini",
            "ask",
            "Three days in Kyoto",
            "--class",
            "itinerary",
            "--ttl",
            "60",
        ])
        .unwrap();

        assert_eq!(args.model.as_deref(), Some("gpt-4o-mini"));
        match args.command {
            Command::Ask {
                prompt, class, ttl, ..
            } => {
                assert_eq!(prompt, "Three days in Kyoto");
                assert_eq!(class, "itinerary");
                assert_eq!(ttl, Some(60));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_ask_defaults_to_chat_class() {
        let args = Args::try_parse_from(["wayfarer", "ask", "hello"]).unwrap();
        assert!(matches!(args.command, Command::Ask { ref class, .. } if class == "chat"));
    }
}
