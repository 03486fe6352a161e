//! Entity store: the authoritative local mirror.
//!
//! ```text
//! producers ──enqueue──▶ UpdateQueue ──apply_pending──▶ StoreState ──▶ EventNotifier
//!                                         (one applier)     (RwLock)
//! ```
//!
//! Writers never touch the map directly.  They enqueue [`MutationBatch`]es;
//! a single applier at a time drains the queue in FIFO order and applies
//! each batch under one write lock.  Entities are handed out as
//! `Arc<Entity>` and updated copy-on-write, so a reader holding a snapshot
//! never sees a half-applied batch.
//!
//! Notifications for a batch are published after its write lock is
//! released, lifecycle first, then the batch's event.

use std::cell::Cell;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{debug, trace};
use parking_lot::{ReentrantMutex, RwLock};
use serde::{Deserialize, Serialize};

use crate::entity::{ActiveCast, Entity};
use crate::error::Diagnostic;
use crate::guid::Guid;
use crate::mutation::{
    FieldChange, MutationBatch, MutationOp, PendingMutation, SpellCooldown, WorldInfo,
};
use crate::notifier::{EventNotifier, Notification};
use crate::queue::UpdateQueue;

// ---------------------------------------------------------------------------
// Local profile
// ---------------------------------------------------------------------------

/// Session state of the local player that is not an update field.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LocalProfile {
    pub known_spells: Vec<u32>,
    pub cooldowns: Vec<SpellCooldown>,
    pub world: Option<WorldInfo>,
}

impl LocalProfile {
    pub fn knows(&self, spell_id: u32) -> bool {
        self.known_spells.contains(&spell_id)
    }

    fn apply(&mut self, change: &FieldChange) {
        match change {
            FieldChange::KnownSpells(spells) => self.known_spells = spells.clone(),
            FieldChange::LearnSpell(id) => {
                if !self.knows(*id) {
                    self.known_spells.push(*id);
                }
            }
            FieldChange::SpellCooldowns(cooldowns) => self.cooldowns = cooldowns.clone(),
            FieldChange::WorldEntry(info) => self.world = Some(*info),
            _ => {}
        }
    }
}

// ---------------------------------------------------------------------------
// Reports + counters
// ---------------------------------------------------------------------------

/// What one `apply_pending` call did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplyReport {
    pub batches: usize,
    pub applied: usize,
    pub created: usize,
    pub updated: usize,
    pub removed: usize,
    pub stale: usize,
    pub incompatible: usize,
    pub casts_expired: usize,
}

impl ApplyReport {
    fn merge(&mut self, other: ApplyReport) {
        self.batches += other.batches;
        self.applied += other.applied;
        self.created += other.created;
        self.updated += other.updated;
        self.removed += other.removed;
        self.stale += other.stale;
        self.incompatible += other.incompatible;
        self.casts_expired += other.casts_expired;
    }
}

/// Running totals since the store was created.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreStats {
    pub mutations_applied: u64,
    pub stale_mutations: u64,
    pub incompatible_mutations: u64,
    pub casts_expired: u64,
    pub entities: usize,
}

#[derive(Debug, Default)]
struct Counters {
    applied: AtomicU64,
    stale: AtomicU64,
    incompatible: AtomicU64,
    casts_expired: AtomicU64,
}

impl Counters {
    fn record(&self, report: &ApplyReport) {
        self.applied
            .fetch_add(report.applied as u64, Ordering::Relaxed);
        self.stale.fetch_add(report.stale as u64, Ordering::Relaxed);
        self.incompatible
            .fetch_add(report.incompatible as u64, Ordering::Relaxed);
        self.casts_expired
            .fetch_add(report.casts_expired as u64, Ordering::Relaxed);
    }
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct StoreState {
    entities: HashMap<Guid, Arc<Entity>>,
    profile: LocalProfile,
}

enum ChangeOutcome {
    Applied,
    CastExpired,
    Unchanged,
    Incompatible,
}

/// Clears the mid-apply flag on drop, including on unwind.
struct Applying<'a>(&'a Cell<bool>);

impl<'a> Applying<'a> {
    fn enter(flag: &'a Cell<bool>) -> Self {
        flag.set(true);
        Self(flag)
    }
}

impl Drop for Applying<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

pub struct EntityStore {
    state: RwLock<StoreState>,
    queue: UpdateQueue,
    /// Held for a whole drain; the flag marks the owning thread as mid-apply.
    applier: ReentrantMutex<Cell<bool>>,
    notifier: Arc<EventNotifier>,
    counters: Counters,
}

impl EntityStore {
    pub fn new(notifier: Arc<EventNotifier>) -> Self {
        Self {
            state: RwLock::new(StoreState::default()),
            queue: UpdateQueue::new(),
            applier: ReentrantMutex::new(Cell::new(false)),
            notifier,
            counters: Counters::default(),
        }
    }

    pub fn notifier(&self) -> &Arc<EventNotifier> {
        &self.notifier
    }

    // -----------------------------------------------------------------------
    // Writes
    // -----------------------------------------------------------------------

    /// Queue a batch.  Never takes the state lock.
    pub fn enqueue(&self, batch: MutationBatch) {
        self.queue.push(batch);
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Drain the queue and apply every batch in FIFO order.
    ///
    /// Only one applier runs at a time.  A call from another thread blocks
    /// until the running apply finishes, so the caller's own batches are
    /// visible when it returns.  A re-entrant call from a subscriber callback
    /// returns an empty report immediately; the outer applier keeps draining
    /// until the queue is empty, so the batch is still applied in order.
    pub fn apply_pending(&self) -> ApplyReport {
        let guard = self.applier.lock();
        if guard.get() {
            trace!("re-entrant apply; batches left to the running applier");
            return ApplyReport::default();
        }
        let _applying = Applying::enter(&guard);

        let mut total = ApplyReport::default();
        loop {
            let batches = self.queue.drain();
            if batches.is_empty() {
                break;
            }
            for batch in batches {
                let (report, notifications) = self.apply_batch(batch);
                self.counters.record(&report);
                total.merge(report);
                for n in &notifications {
                    self.notifier.publish(n);
                }
            }
        }
        total
    }

    fn apply_batch(&self, batch: MutationBatch) -> (ApplyReport, Vec<Notification>) {
        let now = Instant::now();
        let mut report = ApplyReport {
            batches: 1,
            ..ApplyReport::default()
        };
        let mut notifications = Vec::with_capacity(batch.mutations.len() + 1);

        {
            let mut state = self.state.write();
            for mutation in batch.mutations {
                Self::apply_mutation(&mut state, mutation, now, &mut report, &mut notifications);
            }
        }

        if let Some(event) = batch.event {
            notifications.push(Notification::Event(event));
        }
        (report, notifications)
    }

    fn apply_mutation(
        state: &mut StoreState,
        mutation: PendingMutation,
        now: Instant,
        report: &mut ApplyReport,
        notifications: &mut Vec<Notification>,
    ) {
        let target = mutation.target;
        match mutation.op {
            MutationOp::Create(entity) => {
                let entity = Arc::new(*entity);
                state.entities.insert(target, entity.clone());
                report.applied += 1;
                report.created += 1;
                notifications.push(Notification::Created(entity));
            }
            MutationOp::Remove => {
                if state.entities.remove(&target).is_some() {
                    report.applied += 1;
                    report.removed += 1;
                    notifications.push(Notification::Removed(target));
                }
            }
            MutationOp::Update(changes) => {
                let (profile_changes, entity_changes): (Vec<_>, Vec<_>) =
                    changes.into_iter().partition(FieldChange::is_profile);

                for change in &profile_changes {
                    state.profile.apply(change);
                }
                if !profile_changes.is_empty() {
                    report.applied += 1;
                }

                // World entry also moves the local entity when it is present.
                let world_moves: Vec<FieldChange> = profile_changes
                    .into_iter()
                    .filter(|c| matches!(c, FieldChange::WorldEntry(_)))
                    .collect();
                if entity_changes.is_empty() && world_moves.is_empty() {
                    return;
                }

                let Some(slot) = state.entities.get_mut(&target) else {
                    if !entity_changes.is_empty() {
                        report.stale += 1;
                        debug!(
                            "dropping {} change(s) for unknown entity {}",
                            entity_changes.len(),
                            target
                        );
                        notifications.push(Notification::Diagnostic(Diagnostic::StaleMutation {
                            target,
                        }));
                    }
                    return;
                };

                let entity = Arc::make_mut(slot);
                let mut changed = false;
                for change in entity_changes.iter().chain(world_moves.iter()) {
                    match Self::apply_change(entity, change, now) {
                        ChangeOutcome::Applied => changed = true,
                        ChangeOutcome::CastExpired => {
                            changed = true;
                            report.casts_expired += 1;
                        }
                        ChangeOutcome::Unchanged => {}
                        ChangeOutcome::Incompatible => {
                            report.incompatible += 1;
                            debug!("{} does not apply to {}", change.name(), target);
                            notifications.push(Notification::Diagnostic(
                                Diagnostic::IncompatibleMutation {
                                    target,
                                    change: change.name(),
                                },
                            ));
                        }
                    }
                }

                if changed {
                    report.applied += 1;
                    report.updated += 1;
                    notifications.push(Notification::Updated(slot.clone()));
                }
            }
        }
    }

    fn apply_change(entity: &mut Entity, change: &FieldChange, now: Instant) -> ChangeOutcome {
        match change {
            FieldChange::Value { index, value } => {
                entity.apply_value(*index, *value);
                ChangeOutcome::Applied
            }
            FieldChange::Movement(block) => {
                entity.apply_movement(block);
                ChangeOutcome::Applied
            }
            FieldChange::WorldEntry(info) => {
                entity.object.position = Some(info.position());
                ChangeOutcome::Applied
            }
            FieldChange::SetActiveCast {
                spell_id,
                cast_time_ms,
            } => match entity.unit_mut() {
                Some(unit) => {
                    unit.active_cast = Some(ActiveCast {
                        spell_id: *spell_id,
                        cast_time_ms: *cast_time_ms,
                        started_at: now,
                    });
                    ChangeOutcome::Applied
                }
                None => ChangeOutcome::Incompatible,
            },
            FieldChange::ClearActiveCast => match entity.unit_mut() {
                Some(unit) => {
                    if unit.active_cast.take().is_some() {
                        ChangeOutcome::Applied
                    } else {
                        ChangeOutcome::Unchanged
                    }
                }
                None => ChangeOutcome::Incompatible,
            },
            FieldChange::ExpireCast {
                spell_id,
                started_at,
            } => match entity.unit_mut() {
                Some(unit) => match unit.active_cast {
                    Some(cast) if cast.spell_id == *spell_id && cast.started_at == *started_at => {
                        unit.active_cast = None;
                        ChangeOutcome::CastExpired
                    }
                    _ => ChangeOutcome::Unchanged,
                },
                None => ChangeOutcome::Incompatible,
            },
            FieldChange::AutoAttacking(on) => match entity.unit_mut() {
                Some(unit) => {
                    unit.auto_attacking = *on;
                    ChangeOutcome::Applied
                }
                None => ChangeOutcome::Incompatible,
            },
            FieldChange::KnownSpells(_)
            | FieldChange::LearnSpell(_)
            | FieldChange::SpellCooldowns(_) => ChangeOutcome::Unchanged,
        }
    }

    // -----------------------------------------------------------------------
    // Cast expiry
    // -----------------------------------------------------------------------

    /// Casts that should have resolved by `now`.
    pub fn stuck_casts(
        &self,
        now: Instant,
        grace: Duration,
        instant_timeout: Duration,
    ) -> Vec<(Guid, ActiveCast)> {
        self.state
            .read()
            .entities
            .values()
            .filter_map(|e| {
                let cast = e.unit()?.active_cast?;
                (cast.deadline(grace, instant_timeout) <= now).then_some((e.guid, cast))
            })
            .collect()
    }

    /// Enqueue an `ExpireCast` for every stuck cast.  Returns how many were
    /// queued; each only clears if that exact cast is still active when it
    /// is applied.
    pub fn expire_stale_casts(
        &self,
        now: Instant,
        grace: Duration,
        instant_timeout: Duration,
    ) -> usize {
        let mutations: Vec<PendingMutation> = self
            .stuck_casts(now, grace, instant_timeout)
            .into_iter()
            .map(|(guid, cast)| {
                debug!("cast of spell {} by {} timed out", cast.spell_id, guid);
                PendingMutation::update_one(
                    guid,
                    FieldChange::ExpireCast {
                        spell_id: cast.spell_id,
                        started_at: cast.started_at,
                    },
                )
            })
            .collect();
        let count = mutations.len();
        self.enqueue(MutationBatch::new(mutations));
        count
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    pub fn get(&self, guid: Guid) -> Option<Arc<Entity>> {
        self.state.read().entities.get(&guid).cloned()
    }

    pub fn contains(&self, guid: Guid) -> bool {
        self.state.read().entities.contains_key(&guid)
    }

    /// Every entity, as of the last applied batch.
    pub fn snapshot(&self) -> Vec<Arc<Entity>> {
        self.state.read().entities.values().cloned().collect()
    }

    pub fn profile(&self) -> LocalProfile {
        self.state.read().profile.clone()
    }

    pub fn len(&self) -> usize {
        self.state.read().entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.read().entities.is_empty()
    }

    pub fn stats(&self) -> StoreStats {
        StoreStats {
            mutations_applied: self.counters.applied.load(Ordering::Relaxed),
            stale_mutations: self.counters.stale.load(Ordering::Relaxed),
            incompatible_mutations: self.counters.incompatible.load(Ordering::Relaxed),
            casts_expired: self.counters.casts_expired.load(Ordering::Relaxed),
            entities: self.len(),
        }
    }
}

impl std::fmt::Debug for EntityStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntityStore")
            .field("entities", &self.len())
            .field("pending", &self.pending())
            .finish()
    }
}
