//! Command-line interface definitions.
//!
//! All options can be provided via command-line flags or environment
//! variables.

use clap::{Parser, Subcommand};

/// Command-line arguments for the event research pipeline.
///
/// # Examples
///
/// ```sh
/// # Seed an event, then research it
/// event_dossier add-event springfield-fire --query "Springfield factory fire 2023"
/// event_dossier research springfield-fire
///
/// # Check for new coverage since the last run
/// event_dossier update springfield-fire
///
/// # Expose the HTTP surface
/// event_dossier serve --port 8080
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Directory holding the JSON event store
    #[arg(short, long, default_value = "./data", env = "DATA_DIR")]
    pub data_dir: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the full research pipeline for one event
    Research {
        /// Event identifier in the store
        event_id: String,
    },

    /// Check for coverage newer than the event's watermark
    Update {
        /// Event identifier in the store
        event_id: String,
    },

    /// Seed an event record into the store
    AddEvent {
        /// Event identifier to create
        event_id: String,

        /// Natural-language query describing the event
        #[arg(short, long)]
        query: String,

        /// Human-readable event title (defaults to the query)
        #[arg(short, long)]
        title: Option<String>,
    },

    /// Serve the HTTP surface
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value_t = 8080, env = "PORT")]
        port: u16,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parsing_research() {
        let cli = Cli::parse_from(["event_dossier", "research", "ev1"]);
        assert_eq!(cli.data_dir, "./data");
        match cli.command {
            Command::Research { event_id } => assert_eq!(event_id, "ev1"),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_cli_parsing_add_event() {
        let cli = Cli::parse_from([
            "event_dossier",
            "-d",
            "/tmp/store",
            "add-event",
            "ev1",
            "--query",
            "factory fire",
        ]);
        assert_eq!(cli.data_dir, "/tmp/store");
        match cli.command {
            Command::AddEvent { event_id, query, title } => {
                assert_eq!(event_id, "ev1");
                assert_eq!(query, "factory fire");
                assert!(title.is_none());
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_cli_parsing_serve_port() {
        let cli = Cli::parse_from(["event_dossier", "serve", "--port", "9999"]);
        match cli.command {
            Command::Serve { port } => assert_eq!(port, 9999),
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
