//! Command handler layer.
//!
//! This module owns CLI-oriented orchestration and output wiring.
//!
//! ## Files
//! - `fixers.rs`: run/report/model/thin/fixers command trees.
//! - `items.rs`: workspace item command tree.
//!
//! ## Principles
//! - Parse/match CLI inputs here.
//! - Delegate business logic to `services/*`.
//! - Keep behavior and output schema stable.

pub mod fixers;
pub mod items;

pub use fixers::{
    handle_fixers_command, handle_model_commands, handle_report_commands, handle_run_command,
    handle_thin_commands,
};
pub use items::handle_item_commands;
