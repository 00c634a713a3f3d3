// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Subscript renumbering.
//!
//! Hands out dense, 1-based subscripts kind by kind in canonical order, so
//! every kind occupies one contiguous run of subscripts and one contiguous
//! body of records. Bounding-box kinds map to the null subscript. The
//! variable-length arrays continue the same sequence after the last fixed
//! record, drawn from the [`SubscriptAllocator`] handed back here.

use rustc_hash::FxHashMap;

use super::census::Census;
use crate::error::{Error, Result};
use crate::keys::NodeRef;
use crate::kind::{KindCounts, DISK_INDEX_LISTHEAD, DISK_INDEX_NULL, FIXED_KINDS, FIXED_KIND_COUNT};

/// Issues subscripts in sequence, up to a fixed last value.
#[derive(Debug)]
pub struct SubscriptAllocator {
    next: u32,
    last: u32,
}

impl SubscriptAllocator {
    /// An allocator issuing `1..=last`.
    pub fn new(last: u32) -> Self {
        Self { next: 1, last }
    }

    /// The next subscript, or an error once `last` has been issued.
    pub fn next_subscript(&mut self) -> Result<u32> {
        if self.next > self.last {
            return Err(Error::SubscriptOutOfRange {
                subscript: self.next,
                max: self.last,
            });
        }
        let s = self.next;
        self.next += 1;
        Ok(s)
    }

    /// The subscript the next call will return.
    pub fn peek(&self) -> u32 {
        self.next
    }

    /// Number of subscripts issued so far.
    pub fn issued(&self) -> u32 {
        self.next - 1
    }

    pub fn is_exhausted(&self) -> bool {
        self.next > self.last
    }
}

/// Final subscript table for one export.
#[derive(Debug)]
pub(crate) struct Renumbering {
    table: FxHashMap<NodeRef, u32>,
    /// Fixed-kind nodes in ascending subscript order.
    pub ordered: Vec<NodeRef>,
    /// Header counts (zero for the bounding-box kinds).
    pub counts: KindCounts,
    first: [u32; FIXED_KIND_COUNT],
    body_offset: [usize; FIXED_KIND_COUNT],
    pub max_fixed: u32,
    pub max_index: u32,
}

impl Renumbering {
    /// Assigns subscripts to every node of `census`. The returned allocator
    /// continues into the variable-array range.
    pub fn assign(census: &Census) -> Result<(Self, SubscriptAllocator)> {
        let mut buckets: Vec<Vec<NodeRef>> = vec![Vec::new(); FIXED_KIND_COUNT];
        for &node in &census.order {
            if let Some(bucket) = buckets.get_mut(node.kind().index()) {
                bucket.push(node);
            }
        }

        let fixed: u64 = FIXED_KINDS
            .iter()
            .filter(|k| !k.is_derived())
            .map(|k| buckets[k.index()].len() as u64)
            .sum();
        let total = fixed + u64::from(census.arrays);
        if total >= u64::from(DISK_INDEX_LISTHEAD) {
            return Err(Error::SubscriptOutOfRange {
                subscript: u32::MAX,
                max: DISK_INDEX_LISTHEAD - 1,
            });
        }

        let mut alloc = SubscriptAllocator::new(total as u32);
        let mut table = FxHashMap::default();
        let mut ordered = Vec::with_capacity(fixed as usize);
        let mut counts = KindCounts::default();
        let mut first = [0u32; FIXED_KIND_COUNT];
        let mut body_offset = [0usize; FIXED_KIND_COUNT];
        let mut offset = 0usize;

        for kind in FIXED_KINDS {
            let i = kind.index();
            first[i] = alloc.peek();
            body_offset[i] = offset;
            if kind.is_derived() {
                for &node in &buckets[i] {
                    table.insert(node, DISK_INDEX_NULL);
                }
                continue;
            }
            for &node in &buckets[i] {
                table.insert(node, alloc.next_subscript()?);
                ordered.push(node);
            }
            let n = buckets[i].len();
            counts.set(kind, n as u32);
            offset += n * kind.disk_size();
        }

        let max_fixed = alloc.issued();
        tracing::debug!(
            fixed = max_fixed,
            arrays = census.arrays,
            body_bytes = offset,
            "renumbered"
        );
        Ok((
            Self {
                table,
                ordered,
                counts,
                first,
                body_offset,
                max_fixed,
                max_index: total as u32,
            },
            alloc,
        ))
    }

    pub fn subscript(&self, node: NodeRef) -> Option<u32> {
        self.table.get(&node).copied()
    }

    /// Disk index for an optional pointer: 0 for `None`, the subscript
    /// otherwise. Nodes without a subscript are a consistency error.
    pub fn reindex(&self, node: Option<NodeRef>) -> Result<u32> {
        let Some(node) = node else {
            return Ok(DISK_INDEX_NULL);
        };
        let s = self.subscript(node).ok_or(Error::Unregistered(node))?;
        if s > self.max_index {
            return Err(Error::SubscriptOutOfRange {
                subscript: s,
                max: self.max_index,
            });
        }
        Ok(s)
    }

    /// Offset of `node`'s record from the start of the fixed bodies.
    pub fn record_offset(&self, node: NodeRef) -> Result<usize> {
        let kind = node.kind();
        let s = self.reindex(Some(node))?;
        let i = kind.index();
        let within = s
            .checked_sub(self.first[i])
            .filter(|&w| w < self.counts.get(kind))
            .ok_or(Error::Unregistered(node))?;
        Ok(self.body_offset[i] + within as usize * kind.disk_size())
    }
}
