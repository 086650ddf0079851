// Gateway local API
//
// Hand-written client for the gateway's HTTP endpoints: the `/info` XML
// document, the legacy HTML production page, and the JSON endpoints of
// newer firmware. Legacy firmware guards a few pages with HTTP Digest.

pub mod client;
pub mod digest;
pub mod endpoint;
pub mod info;
pub mod models;

pub use client::{GatewayClient, discover_info};
pub use digest::DigestCredential;
pub use endpoint::{Endpoint, Scheme};
pub use info::{FirmwareVersion, GatewayInfo};
