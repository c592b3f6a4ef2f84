//! Application layer orchestrating the domain through the ports.
//!
//! [`donation::DonationService`] turns a donation request into a gateway
//! charge with its split, and [`retry_engine::IntegrationRetryEngine`]
//! delivers registrations to the partner API with retries.

pub mod donation;
pub mod retry_engine;
