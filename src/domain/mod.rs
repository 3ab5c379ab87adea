//! Shared data model layer (structs/constants only).
//!
//! ## Purpose
//! - Keep report/output structs in one place.
//! - Avoid cyclic imports between fixers, stores and command handlers.
//! - Make JSON output schema changes explicit and reviewable.
//!
//! ## Files
//! - `models.rs`: fix/run reports, item rows, config structs.
//! - `constants.rs`: stable constants (API bases, PBIR suffixes, template sizes).
//! - `error.rs`: `FixError` and its machine codes.
//!
//! ## Rule of thumb
//! Domain types should be data-only: no filesystem/network side effects.
//!
//! ## Compatibility note
//! Changes in these structs can affect `--json` outputs and integration contracts.
//! Keep schema-impacting changes explicit and synchronized with `docs/contracts/*`.

pub mod constants;
pub mod error;
pub mod models;
