//! Single-slot pending request tracking.
//!
//! The trader keeps at most one gateway query in flight. The slot remembers
//! which [`RequestId`] is outstanding so that late or foreign responses can
//! be told apart from the one being waited on, and optionally when the wait
//! should be abandoned.

use crate::gateway::{QueryKind, RequestId};
use chrono::{Duration, NaiveDateTime};

/// The outstanding query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingQuery {
    pub id: RequestId,
    pub kind: QueryKind,
    pub issued_at: NaiveDateTime,
    /// Time after which the query may be dropped. `None` waits forever.
    pub deadline: Option<NaiveDateTime>,
    /// A stalled query holds the slot until the process restarts.
    pub stalled: bool,
}

/// Single pending-request slot with id allocation.
#[derive(Debug, Default)]
pub struct PendingSlot {
    slot: Option<PendingQuery>,
    next_id: u64,
}

impl PendingSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if a query occupies the slot.
    pub fn is_busy(&self) -> bool {
        self.slot.is_some()
    }

    pub fn current(&self) -> Option<&PendingQuery> {
        self.slot.as_ref()
    }

    /// Occupy the slot with a new query and return its id.
    ///
    /// The caller checks [`is_busy`](Self::is_busy) first; a query already in
    /// the slot is replaced.
    pub fn begin(
        &mut self,
        kind: QueryKind,
        now: NaiveDateTime,
        timeout: Option<Duration>,
    ) -> RequestId {
        debug_assert!(self.slot.is_none(), "pending slot already occupied");

        self.next_id += 1;
        let id = RequestId(self.next_id);
        self.slot = Some(PendingQuery {
            id,
            kind,
            issued_at: now,
            deadline: timeout.and_then(|t| now.checked_add_signed(t)),
            stalled: false,
        });
        id
    }

    /// Free the slot if it holds `id`. Used when issuing the query failed.
    pub fn release(&mut self, id: RequestId) -> Option<PendingQuery> {
        if self.slot.as_ref().is_some_and(|q| q.id == id) {
            self.slot.take()
        } else {
            None
        }
    }

    /// Take the query matching a response id.
    ///
    /// Returns `None` if the slot is empty, holds another id, or is stalled.
    pub fn take_matching(&mut self, id: RequestId) -> Option<PendingQuery> {
        match &self.slot {
            Some(q) if q.id == id && !q.stalled => self.slot.take(),
            _ => None,
        }
    }

    /// Put a taken query back as stalled. It never expires.
    pub fn stall(&mut self, mut query: PendingQuery) {
        query.stalled = true;
        query.deadline = None;
        self.slot = Some(query);
    }

    /// Drop the query if its deadline has passed.
    pub fn expire(&mut self, now: NaiveDateTime) -> Option<PendingQuery> {
        let expired = self
            .slot
            .as_ref()
            .and_then(|q| q.deadline)
            .is_some_and(|deadline| now >= deadline);

        if expired {
            self.slot.take()
        } else {
            None
        }
    }
}
