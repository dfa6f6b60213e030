// Gateway HTTP API
//
// One-shot request/response endpoints the device uses outside the
// realtime channel: pairing, token verification and gateway assignment.

pub mod client;
pub mod models;

pub use client::GatewayClient;
pub use models::{DeviceSelf, GatewayResponse, LcgAssignment, ShockerDescriptor};
