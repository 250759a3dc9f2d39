//! Business logic services.
//!
//! Services contain core business logic separated from HTTP handlers.
//! The reconciliation service is the only code that mutates gift ledgers;
//! the payment and webhook services are the two ingestion paths feeding it.

/// Wedding membership capability check
pub mod authorization_service;
/// Direct contribution path (synchronous payment creation)
pub mod payment_service;
/// Gift ledger reconciliation core
pub mod reconciliation_service;
/// Webhook ingestion path (asynchronous gateway notifications)
pub mod webhook_service;
