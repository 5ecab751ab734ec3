//! CLI command definitions and parsing
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "ragdex",
    version,
    about = "Local document index with hybrid semantic and keyword retrieval",
    long_about = "Ragdex ingests a directory of documents into a vector index and a BM25 \
                  keyword index, then answers questions over them with conversation-aware \
                  hybrid retrieval and optional LLM query refinement."
)]
pub struct Cli {
    /// Global config file path (defaults to ~/.config/ragdex/config.toml)
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Ingest documents from the configured directory into the indexes
    Ingest {
        /// Directory to ingest (defaults to the configured documents directory)
        #[arg(short, long)]
        documents: Option<PathBuf>,

        /// Re-process every file even if its content is unchanged
        #[arg(long)]
        force: bool,
    },

    /// Retrieve the most relevant chunks for a question
    Query {
        /// Question text
        question: String,

        /// Maximum number of results to return
        #[arg(short, long)]
        limit: Option<usize>,

        /// Use the vector index only, skipping keyword fusion
        #[arg(long)]
        semantic: bool,

        /// Conversation history as a JSON array of {"role", "content"} turns
        #[arg(long, value_name = "JSON")]
        history: Option<String>,

        /// Show results in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Show index and manifest statistics
    Status,

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Initialize default configuration
    Init {
        /// Force overwrite existing config
        #[arg(short, long)]
        force: bool,
    },
}

impl Cli {
    /// Parse CLI arguments from command line
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_cli() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_query_flags_parse() {
        let cli = Cli::try_parse_from([
            "ragdex", "query", "what is hnsw", "--limit", "3", "--semantic", "--json",
        ])
        .unwrap();
        match cli.command {
            Commands::Query {
                question,
                limit,
                semantic,
                json,
                history,
            } => {
                assert_eq!(question, "what is hnsw");
                assert_eq!(limit, Some(3));
                assert!(semantic);
                assert!(json);
                assert!(history.is_none());
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }
}
