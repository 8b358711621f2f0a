//! # Packet Registry and Payload Cache
//!
//! [`PacketRegistry`] maps numeric packet-type ids to their field-descriptor
//! lists. It is built once at startup and passed by reference wherever the
//! codec layer needs it; there is no process-global state.
//!
//! [`PayloadCache`] memoizes parsed payloads at or above a size threshold,
//! keyed by a content hash of the raw bytes. A fixed-interval reaper
//! decrements every entry's usage counter and evicts entries that reach
//! zero. This is a decay law, not LRU: an entry used once and never again
//! survives exactly one reap cycle regardless of cache pressure.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::core::fields::{parse_fields, FieldMap, FieldSpec};
use crate::core::packet::content_hash;
use crate::core::wire::WireReader;
use crate::error::Result;
use crate::protocol::records::RECORDS;

/// Numeric-id → descriptor-list table.
pub struct PacketRegistry {
    decoders: HashMap<u8, &'static [FieldSpec]>,
}

impl PacketRegistry {
    /// Build the table from the static record vocabulary.
    pub fn new() -> Self {
        let mut decoders = HashMap::with_capacity(RECORDS.len());
        for (ty, specs) in RECORDS {
            decoders.insert(ty.id(), *specs);
        }
        Self { decoders }
    }

    pub fn specs(&self, packet_type: u8) -> Option<&'static [FieldSpec]> {
        self.decoders.get(&packet_type).copied()
    }

    /// Decode a payload into structured form. Types without a registered
    /// decoder produce an empty map; registered types propagate decode
    /// errors with field context.
    pub fn decode_payload(&self, packet_type: u8, payload: &[u8]) -> Result<FieldMap> {
        match self.specs(packet_type) {
            Some(specs) => {
                let mut r = WireReader::new(payload);
                parse_fields(specs, &mut r)
            }
            None => Ok(FieldMap::new()),
        }
    }
}

impl Default for PacketRegistry {
    fn default() -> Self {
        Self::new()
    }
}

struct CacheEntry {
    value: Arc<FieldMap>,
    uses: u32,
}

/// Decay-based cache of parsed payloads, shared across sessions.
///
/// The lock is only held across synchronous check-and-update sections,
/// never across an await point.
pub struct PayloadCache {
    entries: Mutex<HashMap<u64, CacheEntry>>,
    threshold_bytes: usize,
}

impl PayloadCache {
    pub fn new(threshold_bytes: usize) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            threshold_bytes,
        }
    }

    /// Parse a payload through the cache. Small payloads bypass the cache
    /// entirely; large ones are keyed by content hash, re-using the stored
    /// parse on a hit.
    ///
    /// Returns the parsed map and, for cacheable payloads, the hash used.
    pub fn lookup_or_parse(
        &self,
        registry: &PacketRegistry,
        packet_type: u8,
        payload: &[u8],
    ) -> Result<(Arc<FieldMap>, Option<u64>)> {
        if payload.len() < self.threshold_bytes {
            return Ok((Arc::new(registry.decode_payload(packet_type, payload)?), None));
        }

        let hash = content_hash(payload);

        // Fast path: existing entry. Lock scope covers check and counter
        // update together.
        {
            let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
            if let Some(entry) = entries.get_mut(&hash) {
                entry.uses = entry.uses.saturating_add(1);
                trace!(hash, uses = entry.uses, "payload cache hit");
                return Ok((Arc::clone(&entry.value), Some(hash)));
            }
        }

        // Parse outside the lock; insertion re-checks so a racing parse of
        // the same payload converges on one stored value.
        let parsed = Arc::new(registry.decode_payload(packet_type, payload)?);
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        let entry = entries.entry(hash).or_insert_with(|| CacheEntry {
            value: Arc::clone(&parsed),
            uses: 0,
        });
        entry.uses = entry.uses.saturating_add(1);
        Ok((Arc::clone(&entry.value), Some(hash)))
    }

    /// One reap pass: decrement every usage counter, evict entries at or
    /// below zero. Never fails; evicting an absent key is a no-op.
    pub fn reap(&self) {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        let before = entries.len();
        for entry in entries.values_mut() {
            entry.uses = entry.uses.saturating_sub(1);
        }
        entries.retain(|_, entry| entry.uses > 0);
        let evicted = before - entries.len();
        if evicted > 0 {
            debug!(evicted, remaining = entries.len(), "payload cache reaped");
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Spawn the global reaper task. Runs until the token is cancelled.
    pub fn spawn_reaper(
        self: &Arc<Self>,
        interval: Duration,
        shutdown: CancellationToken,
    ) -> JoinHandle<()> {
        let cache = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // The immediate first tick would reap entries created before
            // any session ran; skip it.
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = ticker.tick() => cache.reap(),
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::fields::FieldValue;
    use crate::core::packet::Packet;
    use crate::core::wire::{WireString, WireWriter};
    use crate::protocol::types::PacketType;

    fn chat_payload(message: &str) -> Vec<u8> {
        let mut w = WireWriter::new();
        w.write_string(&WireString::from(message));
        w.write_u8(0);
        w.into_bytes().to_vec()
    }

    #[test]
    fn unregistered_type_decodes_to_empty_map() {
        let registry = PacketRegistry::new();
        // TileUpdate has no decoder; arbitrary bytes must not fail.
        let map = registry
            .decode_payload(PacketType::TileUpdate.id(), &[0xde, 0xad, 0xbe, 0xef])
            .unwrap();
        assert!(map.is_empty());
    }

    #[test]
    fn registered_type_decodes_fields() {
        let registry = PacketRegistry::new();
        let map = registry
            .decode_payload(PacketType::ChatSent.id(), &chat_payload("hi"))
            .unwrap();
        assert_eq!(map.get("message").unwrap().as_text(), Some("hi"));
        assert_eq!(map.get("send_mode"), Some(&FieldValue::Uint(0)));
    }

    #[test]
    fn small_payloads_bypass_the_cache() {
        let registry = PacketRegistry::new();
        let cache = PayloadCache::new(1024);
        let (_, hash) = cache
            .lookup_or_parse(&registry, PacketType::ChatSent.id(), &chat_payload("hi"))
            .unwrap();
        assert!(hash.is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn large_payloads_share_one_parse() {
        let registry = PacketRegistry::new();
        let cache = PayloadCache::new(8);
        let payload = chat_payload("a longer chat message that clears the threshold");

        let (first, h1) = cache
            .lookup_or_parse(&registry, PacketType::ChatSent.id(), &payload)
            .unwrap();
        let (second, h2) = cache
            .lookup_or_parse(&registry, PacketType::ChatSent.id(), &payload)
            .unwrap();
        assert_eq!(h1, h2);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn reaper_decays_and_evicts() {
        let registry = PacketRegistry::new();
        let cache = PayloadCache::new(8);
        let payload = chat_payload("another message that clears the threshold");

        // Used twice: survives one reap pass, dies on the second.
        for _ in 0..2 {
            cache
                .lookup_or_parse(&registry, PacketType::ChatSent.id(), &payload)
                .unwrap();
        }
        cache.reap();
        assert_eq!(cache.len(), 1);
        cache.reap();
        assert!(cache.is_empty());

        // Reaping an empty cache is a no-op.
        cache.reap();
        assert!(cache.is_empty());
    }

    #[test]
    fn envelope_roundtrip_across_cache_threshold() {
        let registry = PacketRegistry::new();
        let cache = PayloadCache::new(64);

        for payload in [chat_payload("hi"), chat_payload(&"x".repeat(200))] {
            let pkt = Packet::build(PacketType::ChatSent.id(), &payload, false).unwrap();
            assert_eq!(pkt.packet_type, PacketType::ChatSent.id());
            assert_eq!(&pkt.payload[..], &payload[..]);

            let (map, _) = cache
                .lookup_or_parse(&registry, pkt.packet_type, &pkt.payload)
                .unwrap();
            assert!(map.get("message").is_some());
        }
    }
}
