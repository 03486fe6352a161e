//! MirrorService – frame intake, decode, enqueue/apply, cast expiry, stats.

use crate::decode::DecodeContext;
use crate::dispatch::{Dispatch, OpcodeTable};
use crate::error::{Diagnostic, MessageError};
use crate::events::GameEvent;
use crate::guid::Guid;
use crate::mutation::MutationBatch;
use crate::notifier::{EventNotifier, Notification};
use crate::store::{ApplyReport, EntityStore};
use crate::types::{ApplyMode, MirrorConfig, MirrorStats};
use log::{info, trace, warn};
use parking_lot::{Mutex, RwLock};
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

/// What happened to a single inbound frame.
#[derive(Debug, Clone, PartialEq)]
pub enum FrameOutcome {
    /// Decoded and applied immediately (inline mode).
    Applied(ApplyReport),
    /// Decoded and queued for the next tick (deferred mode).
    Queued,
    /// Decoding failed; the whole message was discarded.
    Failed(MessageError),
    /// No decoder is registered for the opcode.
    Unhandled(u16),
}

/// Result of a single [`MirrorService::tick`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TickReport {
    /// The tick counter that produced this report.
    pub tick: u64,
    /// Stuck casts for which an expiry was queued.
    pub casts_expiring: usize,
    /// Everything applied this tick, expiries included.
    pub applied: ApplyReport,
}

#[derive(Debug, Default)]
struct Counters {
    frames: AtomicU64,
    decoded: AtomicU64,
    decode_errors: AtomicU64,
    unknown_opcodes: AtomicU64,
    ticks: AtomicU64,
}

// ---------------------------------------------------------------------------
// Service
// ---------------------------------------------------------------------------

/// Owns the dispatch table, entity store and notifier for one connection.
///
/// All methods take `&self`; share it as `Arc<MirrorService>` between the
/// receive loop and the tick loop.
pub struct MirrorService {
    config: MirrorConfig,
    table: Arc<OpcodeTable>,
    store: Arc<EntityStore>,
    notifier: Arc<EventNotifier>,
    local_guid: RwLock<Guid>,
    seen_unknown: Mutex<HashSet<u16>>,
    counters: Counters,
}

impl MirrorService {
    pub fn new(config: MirrorConfig, table: Arc<OpcodeTable>, store: Arc<EntityStore>) -> Self {
        let notifier = store.notifier().clone();
        Self {
            config,
            table,
            store,
            notifier,
            local_guid: RwLock::new(Guid::EMPTY),
            seen_unknown: Mutex::new(HashSet::new()),
            counters: Counters::default(),
        }
    }

    /// A service with the default opcode table and a fresh store.
    pub fn with_config(config: MirrorConfig) -> Self {
        let notifier = Arc::new(EventNotifier::new(config.notification_buffer));
        let store = Arc::new(EntityStore::new(notifier));
        Self::new(config, Arc::new(OpcodeTable::with_defaults()), store)
    }

    pub fn config(&self) -> &MirrorConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<EntityStore> {
        &self.store
    }

    pub fn notifier(&self) -> &Arc<EventNotifier> {
        &self.notifier
    }

    pub fn table(&self) -> &Arc<OpcodeTable> {
        &self.table
    }

    // -----------------------------------------------------------------------
    // Local player
    // -----------------------------------------------------------------------

    pub fn local_player(&self) -> Guid {
        *self.local_guid.read()
    }

    pub fn set_local_player(&self, guid: Guid) {
        let mut current = self.local_guid.write();
        if *current != guid {
            info!("local player is {}", guid);
            *current = guid;
        }
    }

    pub fn decode_context(&self) -> DecodeContext {
        DecodeContext::new(self.local_player())
    }

    // -----------------------------------------------------------------------
    // Frame intake
    // -----------------------------------------------------------------------

    /// Decode one frame and hand its mutations to the store.
    ///
    /// Never fails: decode errors and unknown opcodes are counted, logged and
    /// published as diagnostics.
    pub fn handle_frame(&self, opcode: u16, payload: &[u8]) -> FrameOutcome {
        self.counters.frames.fetch_add(1, Ordering::Relaxed);
        trace!("frame {:#05x} ({} bytes)", opcode, payload.len());

        match self.table.decode(opcode, payload, &self.decode_context()) {
            Dispatch::Decoded(decoded) => {
                self.counters.decoded.fetch_add(1, Ordering::Relaxed);
                // Later frames in this same stream decode against the new
                // identity, so record it before anything is applied.
                if let Some(GameEvent::ObjectsUpdated(summary)) = &decoded.event {
                    if let Some(me) = summary.local_player {
                        self.set_local_player(me);
                    }
                }

                self.store.enqueue(MutationBatch::from(decoded));
                match self.config.apply_mode {
                    ApplyMode::Inline => FrameOutcome::Applied(self.store.apply_pending()),
                    ApplyMode::Deferred => FrameOutcome::Queued,
                }
            }
            Dispatch::Failed(err) => {
                self.counters.decode_errors.fetch_add(1, Ordering::Relaxed);
                warn!("discarding message: {}", err);
                self.notifier
                    .publish(&Notification::Diagnostic(Diagnostic::DecodeFailed(
                        err.clone(),
                    )));
                FrameOutcome::Failed(err)
            }
            Dispatch::Unhandled(opcode) => {
                self.counters.unknown_opcodes.fetch_add(1, Ordering::Relaxed);
                if self.seen_unknown.lock().insert(opcode) {
                    warn!("no decoder for opcode {:#05x}; ignoring", opcode);
                } else {
                    trace!("ignoring opcode {:#05x}", opcode);
                }
                self.notifier
                    .publish(&Notification::Diagnostic(Diagnostic::UnhandledOpcode {
                        opcode,
                        len: payload.len(),
                    }));
                FrameOutcome::Unhandled(opcode)
            }
        }
    }

    // -----------------------------------------------------------------------
    // Tick
    // -----------------------------------------------------------------------

    /// Queue expiries for stuck casts, then apply everything pending.
    pub fn tick(&self, now: Instant) -> TickReport {
        let tick = self.counters.ticks.fetch_add(1, Ordering::Relaxed) + 1;
        let casts_expiring = self.store.expire_stale_casts(
            now,
            self.config.cast_grace(),
            self.config.instant_cast_timeout(),
        );
        let applied = self.store.apply_pending();
        TickReport {
            tick,
            casts_expiring,
            applied,
        }
    }

    // -----------------------------------------------------------------------
    // Stats
    // -----------------------------------------------------------------------

    pub fn stats(&self) -> MirrorStats {
        let store = self.store.stats();
        MirrorStats {
            frames: self.counters.frames.load(Ordering::Relaxed),
            decoded: self.counters.decoded.load(Ordering::Relaxed),
            decode_errors: self.counters.decode_errors.load(Ordering::Relaxed),
            unknown_opcodes: self.counters.unknown_opcodes.load(Ordering::Relaxed),
            mutations_applied: store.mutations_applied,
            stale_mutations: store.stale_mutations,
            incompatible_mutations: store.incompatible_mutations,
            casts_expired: store.casts_expired,
            subscriber_panics: self.notifier.panic_count(),
            entities: store.entities,
        }
    }
}

impl std::fmt::Debug for MirrorService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MirrorService")
            .field("config", &self.config)
            .field("local_player", &self.local_player())
            .field("store", &self.store)
            .finish()
    }
}
