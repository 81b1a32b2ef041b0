//! PositionsContainer — an ordered arena of positions.
//!
//! External handles are `PositionId`s; the container resolves ids to rows.
//! A separate list of open ids (in open order) keeps the bulk closers and
//! auto-stop sweeps O(open) instead of O(all).

use std::cmp::Ordering;
use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::domain::position::{ClosedLeg, Position, PositionError, PositionId};

/// Ordered collection of positions with id lookup and an open-position index.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PositionsContainer {
    positions: Vec<Position>,
    #[serde(skip)]
    by_id: HashMap<PositionId, usize>,
    open: Vec<PositionId>,
}

impl PositionsContainer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Number of enabled positions (those the sizing pass kept).
    pub fn enabled_count(&self) -> usize {
        self.positions.iter().filter(|p| p.is_enabled()).count()
    }

    pub fn open_count(&self) -> usize {
        self.open.len()
    }

    pub fn push(&mut self, position: Position) {
        let id = position.id();
        let open = position.is_open();
        self.by_id.insert(id, self.positions.len());
        self.positions.push(position);
        if open {
            self.open.push(id);
        }
    }

    pub fn get(&self, id: PositionId) -> Option<&Position> {
        self.by_id.get(&id).map(|&ix| &self.positions[ix])
    }

    pub fn get_mut(&mut self, id: PositionId) -> Option<&mut Position> {
        match self.by_id.get(&id) {
            Some(&ix) => Some(&mut self.positions[ix]),
            None => None,
        }
    }

    /// Close a position through the container so the open index stays
    /// consistent.
    pub fn close_position(&mut self, id: PositionId, leg: ClosedLeg) -> Result<(), PositionError> {
        let pos = self
            .get_mut(id)
            .ok_or(PositionError::AlreadyClosed(id))?;
        pos.close(leg)?;
        self.open.retain(|&open_id| open_id != id);
        Ok(())
    }

    /// All positions, in container order.
    pub fn iter(&self) -> impl Iterator<Item = &Position> {
        self.positions.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Position> {
        self.positions.iter_mut()
    }

    /// Open positions in the order they were opened.
    pub fn iter_open(&self) -> impl Iterator<Item = &Position> + '_ {
        self.open.iter().filter_map(|id| self.get(*id))
    }

    pub fn iter_closed(&self) -> impl Iterator<Item = &Position> + '_ {
        self.positions.iter().filter(|p| p.is_closed())
    }

    /// Ids of currently open positions, in open order.
    pub fn open_ids(&self) -> Vec<PositionId> {
        self.open.clone()
    }

    /// Move every position out of `other` into this container.
    pub fn append(&mut self, other: &mut PositionsContainer) {
        for pos in other.positions.drain(..) {
            let id = pos.id();
            let open = pos.is_open();
            self.by_id.insert(id, self.positions.len());
            self.positions.push(pos);
            if open {
                self.open.push(id);
            }
        }
        other.by_id.clear();
        other.open.clear();
    }

    pub fn reverse(&mut self) {
        self.positions.reverse();
        self.rebuild_id_map();
    }

    /// Stable sort by entry time.
    pub fn sort_by_entry_time(&mut self) {
        self.positions
            .sort_by(|a, b| a.entry_time().cmp(&b.entry_time()));
        self.rebuild_id_map();
    }

    /// Stable sort by close time; open positions sort last.
    pub fn sort_by_close_time(&mut self) {
        self.positions.sort_by(|a, b| match (a.close_time(), b.close_time()) {
            (Some(x), Some(y)) => x.cmp(&y),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        });
        self.rebuild_id_map();
    }

    /// Stable sort by realized gain; open positions sort last.
    pub fn sort_by_gain(&mut self) {
        self.positions.sort_by(|a, b| match (a.gain(), b.gain()) {
            (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        });
        self.rebuild_id_map();
    }

    /// Stable sort with a caller-supplied comparator.
    pub fn sort_by(&mut self, cmp: impl FnMut(&Position, &Position) -> Ordering) {
        self.positions.sort_by(cmp);
        self.rebuild_id_map();
    }

    fn rebuild_id_map(&mut self) {
        self.by_id.clear();
        for (ix, pos) in self.positions.iter().enumerate() {
            self.by_id.insert(pos.id(), ix);
        }
    }

    /// Restore the id map after deserialization.
    pub fn reindex(&mut self) {
        self.rebuild_id_map();
    }
}
