//! # Interception Gate
//!
//! The boolean decision point between reading a packet and forwarding it.
//! Collaborators (plugin frameworks, ban lists, chat filters) implement
//! [`Gate`]; the proxy consults it at most once per packet per direction.
//!
//! A gate names the packet types it wants decoded; everything else is
//! forwarded opaquely without payload-level parsing. Collaborator failures
//! are fail-open: a gate error is logged and the packet forwarded, so one
//! broken plugin cannot stall all traffic.

use futures::future::BoxFuture;
use tracing::warn;

use crate::core::packet::Packet;
use crate::error::Result;
use crate::protocol::types::PacketType;
use crate::service::session::Session;

/// External collaborator contract.
pub trait Gate: Send + Sync {
    /// Packet types whose payloads should be decoded before dispatch.
    /// Types outside this set are forwarded without structured decoding.
    fn interests(&self) -> &[PacketType] {
        &[]
    }

    /// Decide whether `packet` may be forwarded. Must return in bounded
    /// time; may suspend (e.g. to consult its own state).
    fn dispatch<'a>(
        &'a self,
        session: &'a Session,
        packet_type: PacketType,
        packet: &'a Packet,
    ) -> BoxFuture<'a, Result<bool>>;
}

/// Whether a gate wants `packet_type` decoded.
pub fn is_interested(gate: &dyn Gate, packet_type: PacketType) -> bool {
    gate.interests().contains(&packet_type)
}

/// Dispatch with the fail-open policy: collaborator errors are logged and
/// treated as allow.
pub async fn dispatch_fail_open(
    gate: &dyn Gate,
    session: &Session,
    packet_type: PacketType,
    packet: &Packet,
) -> bool {
    match gate.dispatch(session, packet_type, packet).await {
        Ok(allow) => allow,
        Err(err) => {
            warn!(
                session_id = session.id(),
                packet = packet_type.name(),
                error = %err,
                "gate failed; forwarding packet (fail-open)"
            );
            true
        }
    }
}

/// Gate that forwards everything and decodes nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct AllowAll;

impl Gate for AllowAll {
    fn dispatch<'a>(
        &'a self,
        _session: &'a Session,
        _packet_type: PacketType,
        _packet: &'a Packet,
    ) -> BoxFuture<'a, Result<bool>> {
        Box::pin(async { Ok(true) })
    }
}
