use std::{
    fmt::Display,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use {
    chrono::{DateTime, Local, TimeZone},
    tracing::{debug, info, trace},
};

use crate::{connection::Connection, registry::Registry};

/// Label used for system notices. There is one room and it is not configurable.
pub const ROOM_NAME: &str = "大廳";

/// ANSI C `asctime` layout, e.g. `Mon Jan  2 15:04:05 2006`.
const ANSIC_FORMAT: &str = "%a %b %e %H:%M:%S %Y";

pub fn ansic_timestamp<Tz: TimeZone>(at: &DateTime<Tz>) -> String
where
    Tz::Offset: Display,
{
    at.format(ANSIC_FORMAT).to_string()
}

fn now() -> String {
    ansic_timestamp(&Local::now())
}

/// Outcome of one fan-out.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BroadcastReport {
    pub delivered: usize,
    pub failed: usize,
}

/// The single broadcast room.
///
/// The transport calls [`on_connect`](Self::on_connect),
/// [`on_message`](Self::on_message) and [`on_disconnect`](Self::on_disconnect)
/// for each socket; the room keeps the [`Registry`] current and fans every
/// notice out to all members.
#[derive(Default)]
pub struct Room {
    registry: Registry,
    closed: AtomicBool,
}

impl Room {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub async fn member_count(&self) -> usize {
        self.registry.len().await
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Register `conn` and announce it to everyone, itself included.
    pub async fn on_connect(&self, conn: Arc<dyn Connection>) -> u64 {
        let conn_id = conn.conn_id().to_string();
        let identity = self.registry.register(Arc::clone(&conn)).await;
        info!(conn_id = %conn_id, identity, "member joined");

        if self.is_closed() {
            // Raced with shutdown after the upgrade was accepted.
            conn.close();
            return identity;
        }
        self.broadcast(&format!("|{}| <{ROOM_NAME}> id {identity} join", now()))
            .await;
        identity
    }

    /// Relay a payload from `conn_id` to the room.
    ///
    /// Returns `None` when the sender is not a member (never joined or
    /// already left) and the payload was dropped.
    pub async fn on_message(&self, conn_id: &str, payload: &[u8]) -> Option<BroadcastReport> {
        let Some(identity) = self.registry.identity_of(conn_id).await else {
            trace!(conn_id, "dropping message from non-member");
            return None;
        };
        let text = String::from_utf8_lossy(payload);
        Some(
            self.broadcast(&format!("|{}| <{identity}> {text}", now()))
                .await,
        )
    }

    /// Announce the departure of `conn_id`, then forget it.
    ///
    /// Safe to call more than once; only the first call for a member
    /// produces a notice.
    pub async fn on_disconnect(
        &self,
        conn_id: &str,
        reason: Option<&str>,
    ) -> Option<BroadcastReport> {
        let Some(identity) = self.registry.identity_of(conn_id).await else {
            self.registry.unregister(conn_id).await;
            return None;
        };
        let report = self
            .broadcast(&format!("|{}| <{ROOM_NAME}> id {identity} bye!", now()))
            .await;
        self.registry.unregister(conn_id).await;
        info!(conn_id, identity, reason = reason.unwrap_or(""), "member left");
        Some(report)
    }

    /// Hand `text` to every current member.
    ///
    /// A failed send is counted and logged; it neither stops the fan-out nor
    /// evicts the member, which stays until its own close event.
    pub async fn broadcast(&self, text: &str) -> BroadcastReport {
        let mut report = BroadcastReport::default();
        if self.is_closed() {
            return report;
        }

        for member in self.registry.snapshot().await {
            match member.conn.send(text) {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    report.failed += 1;
                    debug!(
                        conn_id = member.conn_id(),
                        identity = member.identity,
                        error = %e,
                        "delivery failed"
                    );
                },
            }
        }
        trace!(
            delivered = report.delivered,
            failed = report.failed,
            "broadcast"
        );
        report
    }

    /// Stop relaying and close every live connection. Idempotent.
    pub async fn shutdown(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        let members = self.registry.snapshot().await;
        for member in &members {
            member.conn.close();
        }
        info!(closed = members.len(), "room shut down");
    }
}
