//! Domain model: money, splits, payment payloads and the integration entities,
//! plus the ports the application layer depends on.

pub mod integration;
pub mod money;
pub mod payment;
pub mod ports;
pub mod retry;
pub mod split;
pub mod validation;
pub mod wallet;
