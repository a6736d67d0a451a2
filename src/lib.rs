#![warn(clippy::all, clippy::pedantic)]
#![allow(
    clippy::assigning_clones,
    clippy::bool_to_int_with_if,
    clippy::case_sensitive_file_extension_comparisons,
    clippy::cast_possible_wrap,
    clippy::doc_markdown,
    clippy::field_reassign_with_default,
    clippy::float_cmp,
    clippy::implicit_clone,
    clippy::items_after_statements,
    clippy::map_unwrap_or,
    clippy::manual_let_else,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::new_without_default,
    clippy::needless_pass_by_value,
    clippy::needless_raw_string_hashes,
    clippy::redundant_closure_for_method_calls,
    clippy::return_self_not_must_use,
    clippy::similar_names,
    clippy::single_match_else,
    clippy::struct_field_names,
    clippy::too_many_lines,
    clippy::uninlined_format_args,
    clippy::unnecessary_cast,
    clippy::unnecessary_lazy_evaluations,
    clippy::unnecessary_literal_bound,
    clippy::unnecessary_map_or,
    clippy::unused_self,
    clippy::cast_precision_loss,
    clippy::unnecessary_wraps,
    dead_code
)]

use clap::Subcommand;
use serde::{Deserialize, Serialize};

pub mod config;
pub mod game;
pub mod gateway;
pub mod observability;
pub mod prompt;
pub mod providers;
pub mod sessions;

pub use config::Config;

/// Game session administration subcommands
#[derive(Subcommand, Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum SessionCommands {
    /// List stored game sessions, newest first
    List {
        /// Only show sessions that are still active
        #[arg(long)]
        active: bool,
        /// Only show games that reached the question limit
        #[arg(long)]
        completed: bool,
        /// Maximum number of sessions to display
        #[arg(long, default_value = "50")]
        limit: usize,
    },
    /// Show one session with its full question history
    Show {
        /// Session id (UUID)
        id: String,
    },
    /// Reset a session: clear its history and reopen it
    #[command(long_about = "\
Reset a game session.

Clears the question history, sets the question count back to zero and \
marks the game active again. The session id is preserved, so a player \
holding the session cookie continues with a fresh game.

Examples:
  guessmaster sessions reset 6f9619ff-8b86-d011-b42d-00c04fc964ff")]
    Reset {
        /// Session id (UUID)
        id: String,
    },
}
