//! Identify / READY rendezvous
//!
//! A guarded READY listener forwards the decoded payload through a oneshot
//! channel. The guard lives on the stack of [`GatewayConnection::identify`],
//! so the listener is removed on success, decode failure, timeout and close
//! alike.

use crate::core::connection::{ConnectionEvent, GatewayConnection, Session};
use crate::core::connection_state::ConnectionState;
use crate::protocol::{events, Frame, IdentifyPayload, Opcode, ReadyEvent, StatusUpdate};
use crate::traits::{GatewayError, Result};
use parking_lot::Mutex;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};
use types::User;

impl GatewayConnection {
    /// Authenticate the session and wait for READY
    ///
    /// Returns the bot user from READY. Fails with `IdentifyTimeout` when READY
    /// does not arrive within `GatewayConfig::identify_timeout`.
    pub async fn identify(&self, presence: Option<StatusUpdate>) -> Result<User> {
        let _serialized = self.identify_lock.lock().await;

        if let Some(session_id) = self.session_id() {
            return Err(GatewayError::AlreadyIdentified(session_id));
        }

        let payload = IdentifyPayload {
            token: self.credentials.token().to_string(),
            properties: self.config.properties.clone(),
            compress: Some(false),
            large_threshold: self.config.large_threshold,
            shard: self.config.shard,
            presence,
        };
        let frame = Frame::new(Opcode::IDENTIFY, &payload)?;

        let (tx, rx) = oneshot::channel::<Result<ReadyEvent>>();
        let tx = Mutex::new(Some(tx));
        let _ready_guard = self.router.register_event_listener_guarded(events::READY, move |frame| {
            // Single use; later READY frames find the slot empty
            if let Some(tx) = tx.lock().take() {
                let ready = frame
                    .decode::<ReadyEvent>()
                    .map_err(|e| GatewayError::IdentifyDecodeFailure(e.to_string()));
                let _ = tx.send(ready);
            }
            Ok(())
        });

        self.send(&frame).await?;
        debug!("Identify sent, waiting for READY");

        let timeout = self.config.identify_timeout;
        let ready = tokio::select! {
            biased;

            _ = self.shared.cancel.cancelled() => {
                return Err(GatewayError::ConnectionClosed(
                    "connection closed while waiting for READY".to_string(),
                ));
            }

            ready = tokio::time::timeout(timeout, rx) => match ready {
                Ok(Ok(ready)) => ready?,
                Ok(Err(_)) => {
                    return Err(GatewayError::ConnectionClosed(
                        "READY listener dropped".to_string(),
                    ));
                }
                Err(_) => {
                    warn!("READY not received within {:?}", timeout);
                    return Err(GatewayError::IdentifyTimeout(timeout));
                }
            },
        };

        if !ready.trace.is_empty() {
            debug!("READY trace: {:?}", ready.trace);
        }
        info!(
            "Identified as {} (session {}, {} guilds)",
            ready.user.tag(),
            ready.session_id,
            ready.guilds.len()
        );

        let user = ready.user.clone();
        *self.session.write() = Some(Session {
            session_id: ready.session_id.clone(),
            user: ready.user,
        });
        let _ = self
            .shared
            .state
            .compare_exchange(ConnectionState::Connected, ConnectionState::Identified);
        self.shared.emit(ConnectionEvent::Ready {
            session_id: ready.session_id,
        });

        Ok(user)
    }
}
