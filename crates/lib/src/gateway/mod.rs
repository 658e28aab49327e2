//! Gateway: the webhook HTTP server.
//!
//! Verifies inbound deliveries, classifies their events, and hands each one
//! to the bot as a detached task so the platform gets its `200` within the
//! delivery-confirmation window regardless of conversational outcomes.

mod server;

pub use server::run_gateway;
