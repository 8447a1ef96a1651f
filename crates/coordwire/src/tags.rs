//! Correlation tags for in-flight transactions.

use std::collections::HashMap;
use std::collections::hash_map::Entry;

use crate::txn::Transaction;

/// Pending transactions keyed by the tag their request was sent with.
///
/// Owned by the coordinator thread and never shared. Tags are recycled: a tag
/// becomes free again as soon as its transaction is taken out of the table.
#[derive(Debug, Default)]
pub(crate) struct TagTable {
    pending: HashMap<i32, Transaction>,
    cursor: i32,
}

impl TagTable {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Assigns a free tag to `txn`, stamps it into the request and records it.
    ///
    /// The search starts at the cursor and moves upward, wrapping to zero
    /// after `i32::MAX`, so it visits at most as many taken tags as there are
    /// pending transactions. Gives the transaction back if no tag is free.
    pub(crate) fn admit(
        &mut self,
        mut txn: Transaction,
    ) -> Result<(i32, &Transaction), Transaction> {
        let Some(tag) = self.next_free() else {
            return Err(txn);
        };
        txn.stamp(tag);
        match self.pending.entry(tag) {
            Entry::Vacant(slot) => Ok((tag, slot.insert(txn))),
            Entry::Occupied(_) => Err(txn),
        }
    }

    /// Removes and returns the transaction waiting on `tag`.
    pub(crate) fn take(&mut self, tag: i32) -> Option<Transaction> {
        self.pending.remove(&tag)
    }

    /// Removes every pending transaction.
    pub(crate) fn drain(&mut self) -> impl Iterator<Item = (i32, Transaction)> + '_ {
        self.pending.drain()
    }

    pub(crate) fn len(&self) -> usize {
        self.pending.len()
    }

    fn next_free(&mut self) -> Option<i32> {
        // One more probe than there are taken tags always reaches a free one,
        // unless every non-negative tag is taken.
        for _ in 0..=self.pending.len() {
            if !self.pending.contains_key(&self.cursor) {
                return Some(self.cursor);
            }
            self.cursor = self.cursor.checked_add(1).unwrap_or(0);
        }
        None
    }
}
