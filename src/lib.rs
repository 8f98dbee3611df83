//! Graph Profile Portal
//!
//! A small web application that authenticates the caller, obtains a bearer
//! token for Microsoft Graph and renders the caller's directory profile.
//!
//! # Architecture
//!
//! Every request runs the same straight-line pipeline:
//!
//! 1. **Identity**: resolve the caller from the platform client principal
//!    header or from basic credentials.
//! 2. **Token**: walk the configured chain of token sources.
//! 3. **Graph**: one authenticated `GET` for the profile.
//! 4. **Presenter**: render identity and profile as HTML.
//!
//! # Modules
//!
//! - [`config`]: CLI, file and environment configuration
//! - [`identity`]: caller identity resolution
//! - [`token`]: token sources and the fallback chain
//! - [`graph`]: Graph profile client
//! - [`presenter`]: HTML pages
//! - [`server`]: router, handlers and startup

// Allow pedantic clippy warnings that don't add value for this codebase
#![allow(clippy::missing_fields_in_debug)]
#![allow(clippy::cargo_common_metadata)]
#![allow(clippy::multiple_crate_versions)]
#![allow(clippy::unused_async)]

pub mod config;
pub mod error;
pub mod graph;
pub mod identity;
pub mod presenter;
pub mod server;
pub mod token;

use std::sync::Arc;

use crate::config::AppConfig;
use crate::graph::GraphClient;
use crate::identity::CredentialTable;
use crate::token::TokenChain;

/// Application state shared across all handlers. Read-only after startup.
#[derive(Clone, Debug)]
pub struct AppState {
    /// Global Configuration
    pub config: Arc<AppConfig>,
    /// Credential table for basic authentication.
    pub credentials: Arc<CredentialTable>,
    /// Token sources, tried in order on every request.
    pub tokens: Arc<TokenChain>,
    /// Graph profile client.
    pub graph: Arc<GraphClient>,
}

impl AppState {
    /// Build the state from configuration, sharing one HTTP client.
    pub fn from_config(config: AppConfig) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()?;

        let tokens = token::build_chain(&config.token, &http)?;
        let graph = GraphClient::new(http, &config.graph.base_url)?;
        let credentials = CredentialTable::new(config.auth.users.clone());

        Ok(Self {
            config: Arc::new(config),
            credentials: Arc::new(credentials),
            tokens: Arc::new(tokens),
            graph: Arc::new(graph),
        })
    }
}
