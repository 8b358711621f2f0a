//! # Proxy Session
//!
//! One connected client plus its lazily-established upstream connection and
//! the two directional forwarding loops serving them.
//!
//! Each loop reads one complete packet (envelope + payload), consults the
//! gate, and either replays the original raw bytes to the opposite
//! transport or drops the packet silently. Writes are flushed before the
//! next read, bounding in-flight data to one packet per direction.
//!
//! The upstream connect runs as its own task and hands the connected stream
//! halves to the loops through oneshot channels, so neither loop ever
//! busy-waits. Any error in either direction tears down the whole session;
//! teardown is idempotent.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::config::ProxyConfig;
use crate::core::packet::{Direction, Packet};
use crate::error::{ProtocolError, Result};
use crate::protocol::registry::{PacketRegistry, PayloadCache};
use crate::protocol::state::ConnectionState;
use crate::protocol::types::PacketType;
use crate::service::gate::{self, Gate};
use crate::transport::frame::{CompressionSwitch, FrameReader, FrameWriter};

/// Live sessions, shared with the server for registration and kill-all.
#[derive(Default)]
pub struct SessionSet {
    inner: Mutex<HashMap<u64, Arc<Session>>>,
}

impl SessionSet {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn insert(&self, session: Arc<Session>) {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(session.id, session);
    }

    fn remove(&self, id: u64) {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&id);
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Tear down every live session. Safe against sessions dying
    /// concurrently on their own error paths.
    pub fn kill_all(&self) {
        let sessions: Vec<Arc<Session>> = self
            .inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .values()
            .cloned()
            .collect();
        for session in sessions {
            session.die();
        }
    }
}

/// The four transport endpoints' compression switches, armed together on
/// the mid-session upgrade.
struct Endpoints {
    client_read: Arc<CompressionSwitch>,
    client_write: Arc<CompressionSwitch>,
    upstream_read: Arc<CompressionSwitch>,
    upstream_write: Arc<CompressionSwitch>,
}

/// One client connection and its paired upstream connection.
pub struct Session {
    id: u64,
    state: Mutex<ConnectionState>,
    alive: AtomicBool,
    cancel: CancellationToken,
    endpoints: Endpoints,
    sessions: Arc<SessionSet>,
}

impl Session {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    /// Advance the connection state machine on an observed packet.
    fn observe(&self, direction: Direction, packet_type: PacketType) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        let next = state.on_packet(direction, packet_type);
        if next != *state {
            debug!(
                session_id = self.id,
                from = ?*state,
                to = ?next,
                trigger = packet_type.name(),
                "connection state advanced"
            );
            *state = next;
        }
    }

    /// Arm all four transport endpoints for the compressed-stream upgrade.
    /// The client writer gets one skip credit: the triggering response was
    /// produced by the server under the old mode and is still owed to the
    /// client uncompressed. Switch arming is idempotent, so a repeated
    /// trigger is harmless.
    pub fn enable_compression(&self) {
        info!(session_id = self.id, "enabling zstd stream compression");
        self.endpoints.client_write.arm(1);
        self.endpoints.client_read.arm(0);
        self.endpoints.upstream_read.arm(0);
        self.endpoints.upstream_write.arm(0);
    }

    /// Idempotent teardown: cancels both forwarding loops, deregisters from
    /// the session set, and resets the state machine. The second and later
    /// calls are no-ops.
    pub fn die(&self) {
        if self.alive.swap(false, Ordering::AcqRel) {
            self.cancel.cancel();
            *self.state.lock().unwrap_or_else(|e| e.into_inner()) =
                ConnectionState::Disconnected;
            self.sessions.remove(self.id);
            info!(session_id = self.id, "session torn down");
        }
    }

    /// Accept a client, connect upstream in the background, and start both
    /// forwarding loops.
    #[instrument(skip_all, fields(session_id = id))]
    pub fn spawn(
        id: u64,
        client: TcpStream,
        config: &ProxyConfig,
        gate: Arc<dyn Gate>,
        registry: Arc<PacketRegistry>,
        cache: Arc<PayloadCache>,
        sessions: Arc<SessionSet>,
    ) -> Arc<Session> {
        let endpoints = Endpoints {
            client_read: CompressionSwitch::new(),
            client_write: CompressionSwitch::new(),
            upstream_read: CompressionSwitch::new(),
            upstream_write: CompressionSwitch::new(),
        };

        let session = Arc::new(Session {
            id,
            state: Mutex::new(ConnectionState::Disconnected),
            alive: AtomicBool::new(true),
            cancel: CancellationToken::new(),
            endpoints,
            sessions: Arc::clone(&sessions),
        });
        sessions.insert(Arc::clone(&session));

        let chunk = config.transport.read_chunk_bytes;
        let max_payload = config.transport.max_payload_size;
        let level = config.transport.compression_level;

        let (client_rx, client_tx) = client.into_split();
        let client_reader = FrameReader::with_limits(
            client_rx,
            Arc::clone(&session.endpoints.client_read),
            chunk,
            max_payload,
        );
        let client_writer = FrameWriter::with_level(
            client_tx,
            Arc::clone(&session.endpoints.client_write),
            level,
        );

        // Upstream halves arrive through oneshots once the outbound
        // connect finishes.
        let (up_read_tx, up_read_rx) = oneshot::channel();
        let (up_write_tx, up_write_rx) = oneshot::channel();

        {
            let session = Arc::clone(&session);
            let address = config.upstream.address.clone();
            let connect_timeout = config.upstream.connect_timeout;
            let read_switch = Arc::clone(&session.endpoints.upstream_read);
            let write_switch = Arc::clone(&session.endpoints.upstream_write);
            tokio::spawn(async move {
                let connect = tokio::time::timeout(connect_timeout, TcpStream::connect(&address));
                match connect.await {
                    Ok(Ok(stream)) => {
                        let (rx, tx) = stream.into_split();
                        let reader =
                            FrameReader::with_limits(rx, read_switch, chunk, max_payload);
                        let writer = FrameWriter::with_level(tx, write_switch, level);
                        // Receivers vanish if the session already died.
                        let _ = up_read_tx.send(reader);
                        let _ = up_write_tx.send(writer);
                    }
                    Ok(Err(err)) => {
                        warn!(session_id = session.id, %address, error = %err, "upstream connect failed");
                        session.die();
                    }
                    Err(_) => {
                        warn!(session_id = session.id, %address, "upstream connect timed out");
                        session.die();
                    }
                }
            });
        }

        // Client → upstream.
        {
            let session = Arc::clone(&session);
            let gate = Arc::clone(&gate);
            let registry = Arc::clone(&registry);
            let cache = Arc::clone(&cache);
            tokio::spawn(async move {
                let result = async {
                    let writer = session.await_endpoint(up_write_rx).await?;
                    forward_loop(
                        &session,
                        Direction::ToUpstream,
                        client_reader,
                        writer,
                        gate.as_ref(),
                        &registry,
                        &cache,
                    )
                    .await
                }
                .await;
                session.finish_loop(Direction::ToUpstream, result);
            });
        }

        // Upstream → client.
        {
            let session = Arc::clone(&session);
            let gate = Arc::clone(&gate);
            let registry = Arc::clone(&registry);
            let cache = Arc::clone(&cache);
            tokio::spawn(async move {
                let result = async {
                    let reader = session.await_endpoint(up_read_rx).await?;
                    forward_loop(
                        &session,
                        Direction::ToClient,
                        reader,
                        client_writer,
                        gate.as_ref(),
                        &registry,
                        &cache,
                    )
                    .await
                }
                .await;
                session.finish_loop(Direction::ToClient, result);
            });
        }

        session
    }

    /// Wait for the upstream connect task to deliver an endpoint, bailing
    /// out if the session is cancelled first.
    async fn await_endpoint<T>(&self, rx: oneshot::Receiver<T>) -> Result<T> {
        tokio::select! {
            _ = self.cancel.cancelled() => Err(ProtocolError::SessionClosed),
            endpoint = rx => endpoint.map_err(|_| ProtocolError::UpstreamUnavailable),
        }
    }

    /// A finished directional loop always takes the whole session with it.
    fn finish_loop(&self, direction: Direction, result: Result<()>) {
        match result {
            Ok(()) => {}
            Err(ProtocolError::ConnectionClosed) => {
                debug!(session_id = self.id, direction = direction.label(), "peer closed");
            }
            Err(ProtocolError::SessionClosed) => {}
            Err(err) => {
                warn!(
                    session_id = self.id,
                    direction = direction.label(),
                    error = %err,
                    "forwarding loop failed"
                );
            }
        }
        self.die();
    }
}

/// One direction's forwarding loop: read a full packet, gate it, replay the
/// raw bytes or drop. Packets are processed strictly in arrival order; the
/// write is flushed before the next read.
async fn forward_loop<R, W>(
    session: &Session,
    direction: Direction,
    mut reader: FrameReader<R>,
    mut writer: FrameWriter<W>,
    gate: &dyn Gate,
    registry: &PacketRegistry,
    cache: &PayloadCache,
) -> Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    loop {
        let mut packet = tokio::select! {
            _ = session.cancel.cancelled() => return Err(ProtocolError::SessionClosed),
            packet = reader.read_packet(direction) => packet?,
        };

        let packet_type = PacketType::from_id(packet.packet_type);
        if let Some(ty) = packet_type {
            session.observe(direction, ty);
        }

        // Payload-level decoding only where a collaborator cares; opaque
        // types forward without structured parsing.
        let allow = match packet_type {
            Some(ty) if gate::is_interested(gate, ty) => {
                match cache.lookup_or_parse(registry, packet.packet_type, &packet.payload) {
                    Ok((parsed, hash)) => {
                        packet.parsed = Some(parsed);
                        packet.content_hash = hash;
                    }
                    Err(err) => {
                        // Best-effort resume: the packet was fully read, so
                        // framing is intact and it can forward opaquely.
                        warn!(
                            session_id = session.id(),
                            packet = ty.name(),
                            error = %err,
                            "payload decode failed; forwarding undecoded"
                        );
                    }
                }
                gate::dispatch_fail_open(gate, session, ty, &packet).await
            }
            _ => true,
        };

        if allow {
            // Arm before the trigger itself goes out so the client-write
            // skip credit covers it.
            maybe_upgrade_compression(session, direction, &packet, registry);
            writer.write(&packet.raw).await?;
            writer.flush().await?;
        } else {
            debug!(
                session_id = session.id(),
                direction = direction.label(),
                packet_type = packet.packet_type,
                "packet vetoed by gate"
            );
        }
    }
}

/// The designated upgrade signal: a protocol response travelling to the
/// client whose info dict names the zstd stream variant. Arms all four
/// endpoints before the response itself is forwarded, so the client-write
/// skip credit covers it.
fn maybe_upgrade_compression(
    session: &Session,
    direction: Direction,
    packet: &Packet,
    registry: &PacketRegistry,
) {
    if direction != Direction::ToClient
        || packet.packet_type != PacketType::ProtocolResponse.id()
    {
        return;
    }
    let Ok(map) = registry.decode_payload(packet.packet_type, &packet.payload) else {
        return;
    };
    let compression = map
        .get("info")
        .and_then(|v| v.as_variant())
        .and_then(|info| info.get("compression"))
        .and_then(|v| v.as_text());
    if compression == Some("zstd") {
        session.enable_compression();
    }
}
