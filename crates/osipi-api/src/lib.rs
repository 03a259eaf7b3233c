// osipi-api: async HTTP session wrapper for the OSIsoft PI Web API

pub mod auth;
pub mod client;
pub mod error;
pub mod links;
pub mod transport;

pub use auth::{AuthStrategy, Credentials};
pub use client::{Params, PiClient};
pub use error::Error;
pub use links::{LINKS_KEY, Links, SELF_LINK, service_errors};
pub use transport::{TlsMode, TransportConfig};
