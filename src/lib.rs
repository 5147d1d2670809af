//! # Tweet Harvester Library
//!
//! A long-running harvester for the Twitter v1.1 search API. It pages
//! backward through tweet id space for a fixed query, rotates between
//! multiple bearer credentials to maximize throughput under per-credential
//! rate limits, and persists everything durably so that an interrupted run
//! resumes exactly where it stopped.
//!
//! ## Features
//!
//! - **Credential Rotation**: always uses the credential with the most
//!   remaining quota; blocks until the earliest reset when all are exhausted
//! - **Gap-Based Recovery**: unfinished collection windows are checkpointed
//!   and re-driven before new data is collected
//! - **Concurrent Ingestion**: storage writes fan out to a bounded worker
//!   pool while pagination stays strictly sequential
//! - **Graceful Shutdown**: SIGINT/SIGTERM trigger a cooperative cancel that
//!   drains in-flight writes and persists the cursor before exit
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use tweet_harvester::api::client::TwitterSearchClient;
//! use tweet_harvester::auth::{default_auth_file, load_credentials};
//! use tweet_harvester::collector::Collector;
//! use tweet_harvester::shutdown::ShutdownCoordinator;
//! use tweet_harvester::storage::jsonl::JsonlStore;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let shutdown = ShutdownCoordinator::shared();
//! let credentials = load_credentials(&default_auth_file())?;
//! let api = Arc::new(TwitterSearchClient::new("rustlang", shutdown.clone()));
//! let store = Arc::new(JsonlStore::open("./harvest")?);
//!
//! let mut collector = Collector::new(api, store, credentials, shutdown)?;
//! collector.init_state(true).await?;
//! collector.run().await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - [`api`] - Search API client, quota tracking, and credential selection
//! - [`collector`] - The collection driver and the ingestion dispatcher
//! - [`state`] - Gap ranges and the persisted collection state
//! - [`storage`] - Storage contract plus JSONL and in-memory backends
//! - [`auth`] - Credential file handling and bearer-token exchange
//! - [`shutdown`] - Cooperative cancellation shared across modules
//! - [`cli`] - CLI command implementations
//!
//! ## Delivery Contract
//!
//! Storage delivery is at-least-once: a write may be repeated across process
//! restarts, and storage backends treat duplicate ids as no-ops. Pagination
//! moves strictly backward in id space, so the persisted cursor is always a
//! safe resume point.

#![warn(missing_docs)]
#![warn(clippy::all)]

/// Search API client, rate limiting, and credential selection
pub mod api;

/// Credential loading and bearer-token exchange
pub mod auth;

/// CLI command implementations
pub mod cli;

/// Collection driver and ingestion dispatcher
pub mod collector;

/// Tweet, user, and place payload types
pub mod model;

/// Graceful shutdown coordination shared across modules
pub mod shutdown;

/// Gap ranges and collection state
pub mod state;

/// Storage contract and backends
pub mod storage;

/// Tweet identifier. Snowflake-style: monotonically increasing and
/// correlated with creation time, which is what makes `min(id) - 1` a valid
/// backward pagination cursor.
pub type TweetId = u64;

pub use auth::Credential;
pub use collector::Collector;
pub use model::{Place, Tweet, User};
pub use state::{CollectionState, GapRange};
