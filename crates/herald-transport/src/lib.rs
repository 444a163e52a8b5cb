//! # Herald Transport
//!
//! Update sources and the upstream client for the Herald bot runtime.
//!
//! This crate implements the capabilities declared in `herald-core`:
//!
//! | Type | Capability | Feature |
//! |------|------------|---------|
//! | [`Poller`] | `UpdateSource` (pull) | always |
//! | [`FileCursorStore`] | `CursorStore` | always |
//! | `Webhook` | `UpdateSource` (push, axum) | `http-server` |
//! | `HttpBotApi` | `UpdateFetcher` + `WebhookRegistrar` (reqwest) | `http-client` |
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────┐
//! │  herald-runtime     │  (dispatch loop, lifecycle)
//! ├─────────────────────┤
//! │  herald-core        │  (capability traits)
//! ├─────────────────────┤
//! │  herald-transport   │  <- This crate (implementations)
//! ├─────────────────────┤
//! │  Network (HTTP)     │
//! └─────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use herald_core::{Context, InMemoryCursorStore, UpdateSource};
//! use herald_transport::{HttpBotApi, Poller, PollerOptions};
//!
//! let api = Arc::new(HttpBotApi::new("https://api.telegram.org", token)?);
//! let poller = Poller::new(api, Arc::new(InMemoryCursorStore::new(0)), PollerOptions::default());
//! let mut updates = poller.stream().unwrap();
//!
//! poller.start(&Context::background()).await?;
//! while let Some(update) = updates.recv().await {
//!     println!("update {}", update.update_id);
//! }
//! ```

pub mod file_cursor;
pub mod poller;

#[cfg(feature = "http-client")]
pub mod http_client;

#[cfg(feature = "http-server")]
pub mod webhook;

pub use file_cursor::FileCursorStore;
pub use poller::{Poller, PollerOptions};

#[cfg(feature = "http-client")]
pub use http_client::{DEFAULT_API_URL, HttpBotApi};

#[cfg(feature = "http-server")]
pub use webhook::{SECRET_TOKEN_HEADER, Webhook, WebhookOptions};
