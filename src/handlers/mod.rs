//! HTTP request handlers (route handlers).
//!
//! Each handler is an async function that:
//! 1. Receives HTTP request data (JSON body, URL params, etc.)
//! 2. Delegates to a service for business logic
//! 3. Returns HTTP response (JSON, status code)

/// Gift registry endpoints
pub mod gifts;
/// Health check endpoint
pub mod health;
/// Payment creation, webhook, and status endpoints
pub mod payments;
