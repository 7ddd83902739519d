//! Backend address pool with exclusive checkout.
//!
//! # Responsibilities
//! - Own the set of known backend addresses and their checkout state
//! - Merge freshly resolved address sets (`provision`)
//! - Hand out exclusive leases (`acquire`) and take them back on drop
//!
//! # Invariants
//! - Exactly one entry per known address
//! - A checked-out entry is never deleted by `provision`; it is marked stale
//!   and removed when its lease is released
//! - The mutex is never held across I/O

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use thiserror::Error;

use crate::load_balancer::{address::AddressRecord, round_robin::RoundRobin, Selector};

/// Checkout state of a pool entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryState {
    Available,
    CheckedOut,
}

/// A known backend address and its checkout state.
#[derive(Debug, Clone)]
pub struct PoolEntry {
    address: AddressRecord,
    state: EntryState,
    stale: bool,
}

impl PoolEntry {
    fn new(address: AddressRecord) -> Self {
        Self::with_state(address, EntryState::Available)
    }

    pub(crate) fn with_state(address: AddressRecord, state: EntryState) -> Self {
        Self {
            address,
            state,
            stale: false,
        }
    }

    pub fn address(&self) -> &AddressRecord {
        &self.address
    }

    pub fn state(&self) -> EntryState {
        self.state
    }

    /// True if the address has disappeared from discovery but is still leased.
    pub fn is_stale(&self) -> bool {
        self.stale
    }

    pub fn is_available(&self) -> bool {
        self.state == EntryState::Available
    }
}

/// No address was available at acquire time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("no available backend address ({known} known, all checked out)")]
pub struct PoolExhausted {
    /// Number of addresses known to the pool when the acquire failed.
    pub known: usize,
}

/// What a single `provision` call changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProvisionReport {
    /// New addresses added as available.
    pub added: usize,
    /// Available addresses removed because discovery no longer lists them.
    pub removed: usize,
    /// Checked-out addresses marked stale, removed on release.
    pub retired: usize,
    /// Stale addresses that discovery listed again.
    pub restored: usize,
}

impl ProvisionReport {
    /// True if the call left the pool untouched.
    pub fn is_unchanged(&self) -> bool {
        *self == Self::default()
    }
}

/// Point-in-time counts of pool entries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolSnapshot {
    pub total: usize,
    pub available: usize,
    pub checked_out: usize,
    pub stale: usize,
}

#[derive(Debug)]
struct PoolState {
    /// Entries in insertion order.
    entries: Vec<PoolEntry>,
    selector: Box<dyn Selector>,
}

impl PoolState {
    fn position(&self, address: &AddressRecord) -> Option<usize> {
        self.entries.iter().position(|e| &e.address == address)
    }

    fn remove(&mut self, index: usize) -> PoolEntry {
        let entry = self.entries.remove(index);
        self.selector.removed(index);
        entry
    }
}

/// Shared pool of backend addresses.
///
/// Cloning is cheap and yields another handle to the same pool.
#[derive(Debug, Clone)]
pub struct AddressPool {
    inner: Arc<Mutex<PoolState>>,
}

impl AddressPool {
    /// Create an empty pool using round-robin selection.
    pub fn new() -> Self {
        Self::with_selector(Box::new(RoundRobin::new()))
    }

    /// Create an empty pool with a custom selection policy.
    pub fn with_selector(selector: Box<dyn Selector>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(PoolState {
                entries: Vec::new(),
                selector,
            })),
        }
    }

    // A panic while holding the lock cannot leave entries half-updated, so
    // a poisoned mutex is still safe to use.
    fn lock(&self) -> MutexGuard<'_, PoolState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Merge a freshly resolved address set into the pool.
    ///
    /// New addresses are appended as available. Known addresses missing from
    /// `addresses` are removed if available, or marked stale if leased.
    pub fn provision<I>(&self, addresses: I) -> ProvisionReport
    where
        I: IntoIterator<Item = AddressRecord>,
    {
        let mut wanted = HashSet::new();
        let mut ordered = Vec::new();
        for address in addresses {
            if wanted.insert(address.clone()) {
                ordered.push(address);
            }
        }

        let mut report = ProvisionReport::default();
        let mut guard = self.lock();
        let state = &mut *guard;

        let mut index = 0;
        while index < state.entries.len() {
            let entry = &mut state.entries[index];
            if wanted.contains(&entry.address) {
                if entry.stale {
                    entry.stale = false;
                    report.restored += 1;
                }
                index += 1;
            } else if entry.state == EntryState::CheckedOut {
                if !entry.stale {
                    entry.stale = true;
                    report.retired += 1;
                }
                index += 1;
            } else {
                let removed = state.remove(index);
                tracing::debug!(address = %removed.address, "Backend address removed from pool");
                report.removed += 1;
            }
        }

        for address in ordered {
            if state.position(&address).is_none() {
                tracing::debug!(address = %address, "Backend address added to pool");
                state.entries.push(PoolEntry::new(address));
                report.added += 1;
            }
        }

        report
    }

    /// Check out one available address.
    ///
    /// The returned lease gives its holder exclusive use of the address until
    /// it is dropped.
    pub fn acquire(&self) -> Result<Lease, PoolExhausted> {
        let mut guard = self.lock();
        let state = &mut *guard;

        let index = state
            .selector
            .select(&state.entries)
            .ok_or(PoolExhausted {
                known: state.entries.len(),
            })?;

        let entry = &mut state.entries[index];
        entry.state = EntryState::CheckedOut;

        tracing::trace!(address = %entry.address, "Address leased");
        Ok(Lease {
            address: entry.address.clone(),
            pool: self.clone(),
        })
    }

    /// Return a lease to the pool. Equivalent to dropping it.
    pub fn release(&self, lease: Lease) {
        drop(lease);
    }

    fn check_in(&self, address: &AddressRecord) {
        let mut state = self.lock();
        let Some(index) = state.position(address) else {
            tracing::warn!(address = %address, "Released address is not in the pool");
            return;
        };

        if state.entries[index].stale {
            state.remove(index);
            tracing::debug!(address = %address, "Stale address removed on release");
        } else {
            state.entries[index].state = EntryState::Available;
            tracing::trace!(address = %address, "Address released");
        }
    }

    /// Current entry counts.
    pub fn snapshot(&self) -> PoolSnapshot {
        let state = self.lock();
        let mut snapshot = PoolSnapshot {
            total: state.entries.len(),
            ..PoolSnapshot::default()
        };
        for entry in &state.entries {
            match entry.state {
                EntryState::Available => snapshot.available += 1,
                EntryState::CheckedOut => snapshot.checked_out += 1,
            }
            if entry.stale {
                snapshot.stale += 1;
            }
        }
        snapshot
    }

    /// Copy of all entries in insertion order.
    pub fn entries(&self) -> Vec<PoolEntry> {
        self.lock().entries.clone()
    }

    /// All known addresses in insertion order.
    pub fn addresses(&self) -> Vec<AddressRecord> {
        self.lock().entries.iter().map(|e| e.address.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for AddressPool {
    fn default() -> Self {
        Self::new()
    }
}

/// Exclusive checkout of one backend address.
///
/// Not `Clone`: only the holder may use the address, and dropping the lease
/// releases it back to the pool exactly once.
#[derive(Debug)]
#[must_use = "dropping a lease releases the address immediately"]
pub struct Lease {
    address: AddressRecord,
    pool: AddressPool,
}

impl Lease {
    pub fn address(&self) -> &AddressRecord {
        &self.address
    }
}

impl Drop for Lease {
    fn drop(&mut self) {
        self.pool.check_in(&self.address);
    }
}
