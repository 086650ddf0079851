// envoy-api: Async Rust client for Enphase gateways (local API + Enlighten)

pub mod enlighten;
pub mod error;
pub mod gateway;
pub mod token;
pub mod transport;

pub use enlighten::{EnlightenClient, EnlightenEndpoints, EnlightenSession};
pub use error::Error;
pub use gateway::{DigestCredential, Endpoint, GatewayClient, GatewayInfo, Scheme};
pub use token::TokenClaims;
pub use transport::{TlsMode, TransportConfig};
