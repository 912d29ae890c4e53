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

pub mod agents;
pub mod config;
pub mod gateway;
pub mod observability;
pub mod orchestrator;
pub mod queue;
pub mod routing;
pub mod tickets;

pub use config::Config;

/// Audit queue inspection subcommands
#[derive(Subcommand, Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum QueueCommands {
    /// Show how many entries are waiting on a channel
    Depth {
        /// Channel name (e.g. escalation_queue, technical_agent_queue)
        channel: String,
    },
    /// Remove and print the oldest entry on a channel
    #[command(long_about = "\
Remove and print the oldest entry on a channel.

Waits up to queue.pop_timeout_ms on the sqlite backend before \
reporting that the channel is empty.

Examples:
  ticketdesk queue pop escalation_queue
  ticketdesk queue pop manager_approval_queue")]
    Pop {
        /// Channel name
        channel: String,
    },
}
