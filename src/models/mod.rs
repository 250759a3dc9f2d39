//! Data models representing database entities and API types.
//!
//! This module contains all data structures that map to database tables,
//! plus the request/response bodies exchanged with API clients.

/// API key authentication model
pub mod api_key;
/// Gift entity and funding ledger types
pub mod gift;
/// Payment request/response and webhook types
pub mod payment;
