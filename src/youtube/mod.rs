//! YouTube Data API interaction module
//!
//! This module provides the core functionality for talking to the YouTube
//! Data API v3: authentication, HTTP plumbing, and the typed client used by
//! the engine layer.
//!
//! # Module Structure
//!
//! - [`auth`] - Token provisioning via Application Default Credentials
//! - [`client`] - Typed API calls (channel lookup, listing, updates)
//! - [`http`] - HTTP utilities and error-body classification
//!
//! # Example
//!
//! ```ignore
//! use crate::youtube::client::YouTubeClient;
//!
//! async fn example() -> anyhow::Result<()> {
//!     let client = YouTubeClient::new().await?;
//!     let playlist = client.uploads_playlist_id().await?;
//!     let page = client.playlist_page(&playlist, None, 50).await?;
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod client;
pub mod http;
