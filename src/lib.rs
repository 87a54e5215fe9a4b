//! # File Tracker
//!
//! A resumable, deduplicating file-ingestion archive.
//!
//! File Tracker walks a source directory tree, fingerprints every file it
//! has not seen before, records its metadata in a SQLite catalog, and copies
//! it into a destination archive that mirrors the source layout. Content that
//! is already archived is refused (or, optionally, linked) so every distinct
//! piece of content is stored exactly once. An append-only event log keeps an
//! audit trail, and a node ceiling lets very large trees be ingested across
//! several runs.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────┐   ┌──────────────────────────┐   ┌──────────┐
//! │ Traversal │──▶│ Ingestor                 │──▶│ Catalog  │
//! │ (walkdir) │   │ classify, extract, hash, │   │ (SQLite) │
//! └───────────┘   │ copy, commit             │   └──────────┘
//!                 └────────────┬─────────────┘
//!                              ▼
//!                    ┌──────────────────┐
//!                    │ Event log (☺)    │
//!                    └──────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! ftrack init                   # create the catalog
//! ftrack run                    # ingest up to max_nodes, rerun to continue
//! ftrack stats                  # what's archived
//! ftrack show <hash-or-path>    # one content record and its imports
//! ftrack similar <phash>        # near-duplicate images
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`error`] | Typed pipeline errors |
//! | [`catalog`] | Transactional content and import store |
//! | [`fingerprint`] | Content and perceptual hashes |
//! | [`metadata`] | Extension whitelist and attribute extraction |
//! | [`traversal`] | Ordered, bounded tree walk |
//! | [`ingest`] | Per-file pipeline and run driver |
//! | [`event_log`] | Audit trail |
//! | [`stats`] | Catalog summary |
//! | [`lookup`] | Content and similarity queries |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |
//! | [`logging`] | Diagnostic output |

pub mod catalog;
pub mod config;
pub mod db;
pub mod error;
pub mod event_log;
pub mod fingerprint;
pub mod ingest;
pub mod logging;
pub mod lookup;
pub mod metadata;
pub mod migrate;
pub mod models;
pub mod stats;
pub mod traversal;
