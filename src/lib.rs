//! # readlater
//!
//! Backend slice of a read-it-later service: owner-scoped services for
//! rules, device tokens and library items, a service-to-service endpoint
//! that drops feed entries into subscribers' "following" folders, the
//! GraphQL client wrappers the frontends use, and screen view-models.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌───────────┐   ┌────────────┐   ┌──────────┐
//! │   CLI    │──▶│ resolvers │──▶│  services  │──▶│  SQLite  │
//! │ (main)   │   └───────────┘   │ auth_trx   │   └──────────┘
//! └──────────┘   ┌───────────┐   │            │
//!                │   HTTP    │──▶│            │
//!                │ following │   └────────────┘
//!                └───────────┘
//!
//! ┌──────────┐   ┌───────────┐
//! │ screens  │──▶│  client   │──▶ GraphQL API
//! └──────────┘   └───────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! readlater --env-file ./env.toml init
//! readlater --env-file ./env.toml rule create --user ada --name Newsletters --filter "from:news"
//! readlater --env-file ./env.toml serve
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | Environment configuration |
//! | [`context`] | Pool, config and analytics handles |
//! | [`repository`] | Owner-scoped transactions |
//! | [`rules`] | Rule service |
//! | [`device_tokens`] | Device token service |
//! | [`library_items`] | Library item service |
//! | [`following`] | Following ingestion endpoint |
//! | [`resolvers`] | GraphQL-boundary resolvers |
//! | [`server`] | HTTP server |
//! | [`client`] | GraphQL client wrappers |
//! | [`screens`] | Screen view-models |
//! | [`analytics`] | Event sink |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |

pub mod analytics;
pub mod client;
pub mod config;
pub mod context;
pub mod db;
pub mod device_tokens;
pub mod error;
pub mod following;
pub mod library_items;
pub mod migrate;
pub mod models;
pub mod repository;
pub mod resolvers;
pub mod rules;
pub mod screens;
pub mod server;
pub mod users;

#[cfg(test)]
mod test_support;
