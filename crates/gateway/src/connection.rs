/// Why a frame could not be handed to a connection.
#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    #[error("connection {conn_id} is closed")]
    Closed { conn_id: String },
    #[error("delivery to {conn_id} failed: {reason}")]
    Failed { conn_id: String, reason: String },
}

/// The transport's "send to connection" capability.
///
/// `send` must not wait on the network: implementations queue the frame for
/// the connection's own writer so a slow peer never holds up the others.
pub trait Connection: Send + Sync {
    /// Opaque handle, unique for the lifetime of the process.
    fn conn_id(&self) -> &str;

    fn send(&self, frame: &str) -> Result<(), DeliveryError>;

    /// Ask the transport to close the connection. Best-effort.
    fn close(&self);
}
