//! CLI command definitions and parsing
use crate::storage::DocumentType;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "inkpause",
    version,
    about = "Course-material index and retrieval for handwriting tutoring feedback",
    long_about = "inkpause maintains the local index of course documents that grounds tutoring \
                  feedback. Documents are chunked and embedded on-device; queries return the most \
                  relevant excerpts packed into a prompt-ready context block."
)]
pub struct Cli {
    /// Global config file path (defaults to ~/.config/inkpause/config.toml)
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
    /// Index a plain-text course document
    Index {
        /// File containing the extracted document text
        file: PathBuf,

        /// Document identifier
        #[arg(short, long)]
        document: String,

        /// Course the document belongs to
        #[arg(long)]
        course: String,

        /// Kind of document
        #[arg(short = 't', long = "type", default_value = "notes")]
        document_type: DocumentType,

        /// Re-index even if the text is unchanged
        #[arg(short, long)]
        force: bool,
    },

    /// Retrieve course context for a query
    Context {
        /// What the student is working on
        query: String,

        /// Course to search
        #[arg(long)]
        course: String,

        /// Token budget (defaults to retrieval.max_context_tokens)
        #[arg(short, long)]
        max_tokens: Option<usize>,

        /// Show results in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Remove a document from the index
    DeleteDocument {
        /// Document identifier
        document: String,
    },

    /// Remove every document of a course from the index
    DeleteCourse {
        /// Course identifier
        course: String,
    },

    /// Play feedback clips through the default output, one after another
    Play {
        /// Encoded audio files (mp3, wav, ...)
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Show index statistics
    Status {
        /// Show details for a single document
        #[arg(short, long)]
        document: Option<String>,
    },

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

    /// Validate configuration file
    Validate {
        /// Path to config file (defaults to standard location)
        #[arg(short, long)]
        file: Option<PathBuf>,
    },

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
    fn test_index_parses_document_type() {
        let cli = Cli::try_parse_from([
            "inkpause", "index", "notes.txt", "--document", "w3", "--course", "bio101", "--type", "exam",
        ])
        .unwrap();

        match cli.command {
            Commands::Index { document_type, force, .. } => {
                assert_eq!(document_type, DocumentType::Exam);
                assert!(!force);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_play_requires_a_file() {
        assert!(Cli::try_parse_from(["inkpause", "play"]).is_err());

        let cli = Cli::try_parse_from(["inkpause", "play", "hint1.mp3", "hint2.mp3"]).unwrap();
        match cli.command {
            Commands::Play { files } => assert_eq!(files.len(), 2),
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_unknown_document_type_rejected() {
        let result = Cli::try_parse_from([
            "inkpause", "index", "notes.txt", "-d", "w3", "--course", "bio101", "-t", "podcast",
        ]);
        assert!(result.is_err());
    }
}
