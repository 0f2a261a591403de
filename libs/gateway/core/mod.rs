//! Connection runtime
//!
//! - `connection`: dial, HELLO handshake, receive loop, close
//! - `heartbeat`: liveness task with ack deadline
//! - `router` / `listeners`: opcode and event-name fan-out
//! - `identify`: READY rendezvous
//! - `builder`: type-state entry point

pub mod builder;
pub mod config;
pub mod connection;
pub mod connection_state;
pub mod heartbeat;
pub mod identify;
pub mod listeners;
pub mod router;
pub mod sequence;

/// Create a new connect builder
///
/// # Example
/// ```ignore
/// let connection = gateway::builder()
///     .url(info.url)
///     .bot_token(token)
///     .identify_timeout(Duration::from_secs(30))
///     .connect()
///     .await?;
///
/// connection.register_event_listener(gateway::events::MESSAGE_CREATE, |frame| {
///     let message: types::Message = frame.decode()?;
///     println!("{}: {}", message.author.tag(), message.content);
///     Ok(())
/// });
///
/// let user = connection.identify(None).await?;
/// ```
pub fn builder() -> builder::ConnectBuilder<builder::states::NoEndpoint, builder::states::NoCredentials> {
    builder::ConnectBuilder::new()
}
