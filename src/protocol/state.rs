//! # Connection State Machine
//!
//! Ordered per-session connection states, advanced only forward and one
//! step at a time by observing specific packet types in either direction.
//! The terminal value persists until session teardown resets it to
//! `Disconnected`.

use crate::core::packet::Direction;
use crate::protocol::types::PacketType;

/// Session connection progress, in protocol order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ConnectionState {
    Disconnected,
    VersionSent,
    ClientConnectReceived,
    HandshakeChallengeSent,
    HandshakeResponseReceived,
    ConnectResponseSent,
    Connected,
    ConnectedWithHeartbeat,
}

impl ConnectionState {
    /// Advance by exactly one step if the observed packet is the trigger
    /// this state is waiting for; otherwise stay put.
    pub fn on_packet(self, direction: Direction, packet_type: PacketType) -> ConnectionState {
        use ConnectionState::*;
        use Direction::*;

        match (self, direction, packet_type) {
            (Disconnected, ToUpstream, PacketType::ProtocolRequest) => VersionSent,
            (VersionSent, ToUpstream, PacketType::ClientConnect) => ClientConnectReceived,
            (ClientConnectReceived, ToClient, PacketType::HandshakeChallenge) => {
                HandshakeChallengeSent
            }
            (HandshakeChallengeSent, ToUpstream, PacketType::HandshakeResponse) => {
                HandshakeResponseReceived
            }
            (
                HandshakeResponseReceived,
                ToClient,
                PacketType::ConnectSuccess | PacketType::ConnectFailure,
            ) => ConnectResponseSent,
            (ConnectResponseSent, ToClient, PacketType::WorldStart) => Connected,
            (Connected, _, PacketType::Heartbeat) => ConnectedWithHeartbeat,
            _ => self,
        }
    }

    pub fn is_connected(self) -> bool {
        matches!(
            self,
            ConnectionState::Connected | ConnectionState::ConnectedWithHeartbeat
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_connect_sequence() {
        use ConnectionState::*;
        use Direction::*;

        let steps = [
            (ToUpstream, PacketType::ProtocolRequest, VersionSent),
            (ToUpstream, PacketType::ClientConnect, ClientConnectReceived),
            (
                ToClient,
                PacketType::HandshakeChallenge,
                HandshakeChallengeSent,
            ),
            (
                ToUpstream,
                PacketType::HandshakeResponse,
                HandshakeResponseReceived,
            ),
            (ToClient, PacketType::ConnectSuccess, ConnectResponseSent),
            (ToClient, PacketType::WorldStart, Connected),
            (ToUpstream, PacketType::Heartbeat, ConnectedWithHeartbeat),
        ];

        let mut state = Disconnected;
        for (dir, ty, expected) in steps {
            state = state.on_packet(dir, ty);
            assert_eq!(state, expected);
        }
        assert!(state.is_connected());
    }

    #[test]
    fn out_of_order_trigger_does_not_advance() {
        let state = ConnectionState::Disconnected;
        // A world start before the handshake means nothing.
        assert_eq!(
            state.on_packet(Direction::ToClient, PacketType::WorldStart),
            ConnectionState::Disconnected
        );
    }

    #[test]
    fn wrong_direction_does_not_advance() {
        let state = ConnectionState::Disconnected;
        // Protocol request must come from the client side.
        assert_eq!(
            state.on_packet(Direction::ToClient, PacketType::ProtocolRequest),
            ConnectionState::Disconnected
        );
    }

    #[test]
    fn never_moves_backward() {
        let state = ConnectionState::Connected;
        let next = state.on_packet(Direction::ToUpstream, PacketType::ProtocolRequest);
        assert!(next >= state);
    }
}
