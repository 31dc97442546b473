//! CLI argument parsing.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::RetrievalOptions;

/// Question answering over a single reference book.
#[derive(Parser, Debug)]
#[command(name = "tome-rs", version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,

    /// Index snapshot path.
    #[arg(
        long,
        global = true,
        env = "TOME_SNAPSHOT",
        default_value = "vector-store.json"
    )]
    pub snapshot: PathBuf,

    /// Chat completion model.
    #[arg(
        long,
        global = true,
        env = "TOME_CHAT_MODEL",
        default_value = "gpt-4o-mini"
    )]
    pub chat_model: String,

    /// Embedding model.
    #[arg(
        long,
        global = true,
        env = "TOME_EMBEDDING_MODEL",
        default_value = "text-embedding-3-small"
    )]
    pub embedding_model: String,

    /// Custom OpenAI-compatible base URL (local inference servers).
    #[arg(long, global = true, env = "OPENAI_BASE_URL")]
    pub api_base: Option<String>,

    /// Use the deterministic hash embedder instead of the model endpoint.
    #[arg(long, global = true)]
    pub hash_embedder: bool,

    /// Seed for test-set sampling.
    #[arg(long, global = true, env = "TOME_EVAL_SEED", default_value_t = 42)]
    pub seed: u64,

    /// Disable HyDE expansion.
    #[arg(long = "no-hyde", global = true)]
    pub no_hyde: bool,

    /// Disable the step-back query branch.
    #[arg(long = "no-stepback", global = true)]
    pub no_stepback: bool,

    /// Disable feature-weighted reranking.
    #[arg(long = "no-rerank", global = true)]
    pub no_rerank: bool,

    /// Disable lexical fusion (vector-only search).
    #[arg(long = "no-hybrid-search", global = true)]
    pub no_hybrid_search: bool,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Ingest a document's extracted text and write the snapshot.
    Ingest {
        /// Path to the extracted document text.
        file: PathBuf,
    },

    /// Ask a single question against the ingested book.
    Ask {
        /// The question.
        prompt: String,
    },

    /// Serve the HTTP API.
    Serve {
        /// Listen address.
        #[arg(long, default_value = "127.0.0.1:8080")]
        addr: String,
    },

    /// Generate a synthetic test set from the indexed segments.
    GenTestset {
        /// Number of questions (-1 for one per segment).
        #[arg(long, default_value_t = 20)]
        num_questions: i64,
    },

    /// Run the evaluation harness.
    Eval {
        /// Number of questions (-1 for one per segment).
        #[arg(long, default_value_t = 20)]
        num_questions: i64,

        /// Reuse the persisted test set instead of generating a new one.
        #[arg(long)]
        batch_only: bool,
    },
}

impl Cli {
    /// Resolves the retrieval options from the ablation flags.
    #[must_use]
    pub fn retrieval_options(&self) -> RetrievalOptions {
        RetrievalOptions::new()
            .with_hyde(!self.no_hyde)
            .with_stepback(!self.no_stepback)
            .with_rerank(!self.no_rerank)
            .with_hybrid_search(!self.no_hybrid_search)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ask() {
        let cli = Cli::try_parse_from(["tome-rs", "ask", "what is item 3?"]).unwrap();
        match cli.command {
            Commands::Ask { prompt } => assert_eq!(prompt, "what is item 3?"),
            other => panic!("unexpected command: {other:?}"),
        }
        assert_eq!(cli.snapshot, PathBuf::from("vector-store.json"));
    }

    #[test]
    fn test_parse_ablation_flags() {
        let cli = Cli::try_parse_from([
            "tome-rs",
            "ask",
            "q",
            "--no-hyde",
            "--no-rerank",
            "--no-hybrid-search",
        ])
        .unwrap();
        let options = cli.retrieval_options();
        assert!(!options.hyde);
        assert!(options.stepback);
        assert!(!options.rerank);
        assert!(!options.hybrid_search);
    }

    #[test]
    fn test_parse_ingest() {
        let cli = Cli::try_parse_from(["tome-rs", "ingest", "book.txt"]).unwrap();
        assert!(matches!(cli.command, Commands::Ingest { .. }));
    }

    #[test]
    fn test_parse_eval_defaults() {
        let cli = Cli::try_parse_from(["tome-rs", "eval"]).unwrap();
        match cli.command {
            Commands::Eval {
                num_questions,
                batch_only,
            } => {
                assert_eq!(num_questions, 20);
                assert!(!batch_only);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_parse_serve_addr() {
        let cli = Cli::try_parse_from(["tome-rs", "serve", "--addr", "0.0.0.0:9000"]).unwrap();
        match cli.command {
            Commands::Serve { addr } => assert_eq!(addr, "0.0.0.0:9000"),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_verify_cli() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
