//! REST collaborators of the gateway client
//!
//! - [`RestClient::get_gateway_bot`]: endpoint resolution (url + recommended shards)
//! - [`RestClient::get_gateway`]: unauthenticated url lookup
//! - [`RestClient::send_message`]: post a message to a channel

pub mod client;
pub mod error;
pub mod resolver;

pub use client::{GatewayInfo, GatewayUrl, RestClient, DEFAULT_API_VERSION, DEFAULT_BASE_URL};
pub use error::{RestError, Result};
pub use resolver::{EndpointResolver, StaticEndpoint};
