//! # Artist Reconciler
//!
//! Reconciles free-text artist names against a museum collection
//! registry and enriches the records that are missing there from two
//! external knowledge bases: the Getty vocabulary (controlled authority
//! file) and Wikidata (linked-data graph).
//!
//! ## Pipeline
//!
//! ```text
//! ┌──────────┐   ┌───────────────┐   ┌────────────────┐
//! │ CSV rows │──▶│ Candidates     │──▶│ Registry lookup │
//! │ name+date│   │ dedupe+timeline│   │ (session client)│
//! └──────────┘   └───────────────┘   └──────┬─────────┘
//!                                           │ absent
//!                              ┌────────────▼───────────┐
//!                              │ Getty ──▶ Wikidata      │
//!                              │ merge only empty fields │
//!                              └────────────┬───────────┘
//!                                           ▼
//!                         existing / resolved / unresolved CSVs
//! ```
//!
//! Candidates are processed one at a time; the only suspension points
//! are the network calls and the fixed cooldown before a single
//! rate-limit retry. A second rate limit for the same candidate aborts
//! the batch so the upstream service is not hammered.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration with compiled-in defaults |
//! | [`models`] | Candidate record and its closed field set |
//! | [`timeline`] | Free-text date expressions → sorted year tokens |
//! | [`session`] | Authenticated registry session client |
//! | [`authority`] | Person lookup in the local registry |
//! | [`source`] | External source trait and shared retry loop |
//! | [`source_getty`] | Getty vocabulary source |
//! | [`source_wikidata`] | Wikidata source |
//! | [`engine`] | Batch orchestration and classification |
//! | [`rows`] | Schema-mapped row I/O boundary |

pub mod authority;
pub mod config;
pub mod engine;
pub mod models;
pub mod rows;
pub mod session;
pub mod source;
pub mod source_getty;
pub mod source_wikidata;
pub mod timeline;
