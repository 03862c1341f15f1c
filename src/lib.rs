//! # Docstring-AI
//!
//! Walks a Python repository, asks an LLM to document each file, and writes
//! the result back in place or publishes it as pull requests.
//!
//! Three pieces keep repeated runs cheap and coherent:
//!
//! - a SHA-256 fingerprint cache, so unchanged files never reach the model;
//! - a knowledge store of per-file and per-class summaries that grows as the
//!   run proceeds;
//! - embedding-based retrieval of related summaries for each prompt.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────┐   ┌─────────┐   ┌───────────┐   ┌──────────┐   ┌───────────┐
//! │  Scan  │──▶│  Cache  │──▶│  Context  │──▶│ Generate │──▶│  Review   │
//! │ walkdir│   │ sha-256 │   │ embeddings│   │  OpenAI  │   │ (manual)  │
//! └────────┘   └─────────┘   └───────────┘   └──────────┘   └─────┬─────┘
//!                                                                 ▼
//!                                                 ┌──────────────────────────┐
//!                                                 │ Publish: write or PRs    │
//!                                                 │ git CLI + GitHub REST    │
//!                                                 └──────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration and CLI/env resolution |
//! | [`models`] | Core data types |
//! | [`scan`] | Repository walk and ordering policies |
//! | [`hasher`] | Content fingerprints |
//! | [`cache`] | Fingerprint cache |
//! | [`knowledge`] | Accumulated unit summaries |
//! | [`embedding`] | Embedding provider abstraction |
//! | [`context`] | Related-summary retrieval |
//! | [`generator`] | Prompting and strict response parsing |
//! | [`review`] | Unified diffs and yes/no review |
//! | [`publish`] | Direct write and pull request publishing |
//! | [`pipeline`] | Run orchestration |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |

pub mod cache;
pub mod completion;
pub mod config;
pub mod context;
pub mod db;
pub mod embedding;
pub mod error;
pub mod generator;
pub mod git;
pub mod github;
pub mod hasher;
pub mod knowledge;
pub mod logging;
pub mod migrate;
pub mod models;
pub mod openai;
pub mod pipeline;
pub mod progress;
pub mod prompt;
pub mod publish;
pub mod python;
pub mod report;
pub mod review;
pub mod scan;
pub mod state;
