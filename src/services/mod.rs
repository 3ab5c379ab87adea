//! Service layer containing fixer logic and side-effect helpers.
//!
//! ## Service map
//! - `definition.rs`: definition parts plus the folder store and base64 part codec.
//! - `report_session.rs`: buffered, commit-once view over a report definition.
//! - `visual.rs`: helpers over a single `visual.json`.
//! - `report_fixers.rs`: pie, column, bar, page size and visual filter fixers.
//! - `model.rs`: `SemanticModel` trait and the `model.bim` implementation.
//! - `templates.rs`: calendar, measure table, last refresh and calc group payloads.
//! - `model_fixers.rs`: semantic model fixers.
//! - `thin.rs`: thin report definition dump and perspective switch.
//! - `runner.rs`: multi-fixer runs with phases and cancellation.
//! - `fabric.rs`: REST client, resolvers and the workspace definition store.
//! - `items.rs`: workspace item wrappers.
//! - `dispatch.rs`: target resolution and single fixer execution.
//! - `storage.rs`: config file and audit log.
//! - `output.rs`: JSON/text output helpers.
//!
//! ## Conventions
//! - Fixers take a session or model, never a path or a client.
//! - Writes happen only on commit; scan-only opens are read-only.
//! - Keep command handlers thin; delegate to services.

pub mod definition;
pub mod dispatch;
pub mod fabric;
pub mod items;
pub mod model;
pub mod model_fixers;
pub mod output;
pub mod report_fixers;
pub mod report_session;
pub mod runner;
pub mod storage;
pub mod templates;
pub mod thin;
pub mod visual;
