//! Snapshot store - the committed output surface of the pipeline.
//!
//! Two named slots (selected scope, reference population) each hold the
//! last validated breakdown behind an `Arc`, so a commit swaps the whole
//! value in one step and readers never observe a half-written snapshot.
//! A monotonically increasing token per slot guards against a superseded
//! pipeline run committing late: only the most recently started request
//! for a slot may commit.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use serde::Serialize;

use crate::aggregate::ScopeBreakdown;
use crate::catalog::{FuelKind, Sector};

/// The two snapshot slots kept side by side for relative comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Scope {
    Selected,
    Reference,
}

impl Scope {
    fn index(self) -> usize {
        self as usize
    }
}

impl std::fmt::Display for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Scope::Selected => f.write_str("selected"),
            Scope::Reference => f.write_str("reference"),
        }
    }
}

/// A complete validated breakdown for one (location, year).
#[derive(Debug, Clone, Serialize)]
pub struct Snapshot {
    pub location: String,
    pub year: i32,
    pub sectors: ScopeBreakdown,
}

/// Staleness-guard token handed out when a pipeline run starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestToken(u64);

/// A commit arrived for a request that has since been superseded. The
/// store is left untouched; the newer request owns the slot.
#[derive(Debug)]
pub struct StaleCommit {
    pub scope: Scope,
    pub token: u64,
    pub latest: u64,
}

impl std::fmt::Display for StaleCommit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "stale commit for {} scope: request token {} superseded by {}",
            self.scope, self.token, self.latest
        )
    }
}

impl std::error::Error for StaleCommit {}

#[derive(Debug, Default)]
struct Slot {
    latest_token: AtomicU64,
    committed: RwLock<Option<Arc<Snapshot>>>,
}

/// Holds the committed snapshots for both scopes. The only state shared
/// across pipeline runs; everything else is threaded per request.
#[derive(Debug, Default)]
pub struct SnapshotStore {
    slots: [Slot; 2],
}

impl SnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a request against one slot. Any token handed out earlier for
    /// the same slot is invalidated.
    pub fn begin_request(&self, scope: Scope) -> RequestToken {
        let token = self.slots[scope.index()]
            .latest_token
            .fetch_add(1, Ordering::SeqCst)
            + 1;
        RequestToken(token)
    }

    /// Atomically replace one slot's snapshot. Called only after
    /// validation succeeds; rejects tokens that are no longer current.
    pub fn commit(
        &self,
        scope: Scope,
        snapshot: Snapshot,
        token: RequestToken,
    ) -> Result<(), StaleCommit> {
        let slot = &self.slots[scope.index()];
        // token check under the write lock, so concurrent commits for the
        // same slot serialize and the newest token always wins
        let mut committed = slot.committed.write().unwrap();
        let latest = slot.latest_token.load(Ordering::SeqCst);
        if token.0 != latest {
            return Err(StaleCommit {
                scope,
                token: token.0,
                latest,
            });
        }

        *committed = Some(Arc::new(snapshot));
        Ok(())
    }

    /// Copy one slot's committed snapshot into the other without
    /// re-deriving, for when the selected scope coincides with the
    /// reference population. Returns false if the source slot is empty or
    /// a newer request claimed the destination before the copy landed.
    pub fn duplicate(&self, from: Scope, to: Scope) -> bool {
        let source = self.slots[from.index()].committed.read().unwrap().clone();
        let snapshot = match source {
            Some(snapshot) => snapshot,
            None => return false,
        };

        // take a token like any other request, then guard the write the
        // same way commit does: an in-flight run for the destination is
        // superseded, but a request begun after this point wins
        let dest = &self.slots[to.index()];
        let token = dest.latest_token.fetch_add(1, Ordering::SeqCst) + 1;
        let mut committed = dest.committed.write().unwrap();
        if dest.latest_token.load(Ordering::SeqCst) != token {
            return false;
        }

        *committed = Some(snapshot);
        true
    }

    /// Current committed snapshot for one slot. Never a partial value.
    pub fn read(&self, scope: Scope) -> Option<Arc<Snapshot>> {
        self.slots[scope.index()].committed.read().unwrap().clone()
    }

    /// The read-only comparison view handed to the rendering layer, pairing
    /// the selected scope with the reference population so relative shares
    /// can be shown without re-derivation. None until both slots commit.
    pub fn comparison(&self) -> Option<ScopeComparison> {
        let selected = self.read(Scope::Selected)?;
        let reference = self.read(Scope::Reference)?;
        Some(ScopeComparison::build(&selected, &reference))
    }
}

/// Selected-scope and reference-population values for one quantity.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct ValuePair {
    pub selected: f64,
    pub reference: f64,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct TierComparison {
    pub energy_gwh: ValuePair,
    pub co2_mmt: ValuePair,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct PieceComparison {
    pub fuel: FuelKind,
    pub energy_gwh: ValuePair,
    pub co2_mmt: ValuePair,
}

#[derive(Debug, Clone, Serialize)]
pub struct SectorComparison {
    pub sector: Sector,
    pub electric: TierComparison,
    pub primary: TierComparison,
    pub total: TierComparison,
    /// Fuel pieces of primary, in presentation order.
    pub pieces: Vec<PieceComparison>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScopeComparison {
    pub location: String,
    pub reference_location: String,
    pub year: i32,
    pub sectors: Vec<SectorComparison>,
}

impl ScopeComparison {
    fn build(selected: &Snapshot, reference: &Snapshot) -> Self {
        let sectors = Sector::ALL
            .iter()
            .map(|&sector| {
                let sel = selected.sectors.sector(sector);
                let refr = reference.sectors.sector(sector);

                let tier = |s: crate::aggregate::SubsectorValues,
                            r: crate::aggregate::SubsectorValues| {
                    TierComparison {
                        energy_gwh: ValuePair {
                            selected: s.energy_gwh,
                            reference: r.energy_gwh,
                        },
                        co2_mmt: ValuePair {
                            selected: s.co2_mmt,
                            reference: r.co2_mmt,
                        },
                    }
                };

                let pieces = FuelKind::ALL
                    .iter()
                    .map(|&fuel| PieceComparison {
                        fuel,
                        energy_gwh: ValuePair {
                            selected: sel.piece(fuel).energy_gwh,
                            reference: refr.piece(fuel).energy_gwh,
                        },
                        co2_mmt: ValuePair {
                            selected: sel.piece(fuel).co2_mmt,
                            reference: refr.piece(fuel).co2_mmt,
                        },
                    })
                    .collect();

                SectorComparison {
                    sector,
                    electric: tier(sel.electric, refr.electric),
                    primary: tier(sel.primary, refr.primary),
                    total: tier(sel.total, refr.total),
                    pieces,
                }
            })
            .collect();

        ScopeComparison {
            location: selected.location.clone(),
            reference_location: reference.location.clone(),
            year: selected.year,
            sectors,
        }
    }
}
