//! # Entry Cursor
//!
//! `EntryCursor` walks the entries of one `IndexData` in either direction
//! between two boundary entries. Positions are remembered by entry value
//! rather than by page slot, so a cursor stays meaningful while the tree
//! splits and shrinks underneath it:
//!
//! - a cursor *on* an entry moves to the nearest entry strictly after or
//!   before it, whether or not that entry still exists
//! - a cursor *between* entries (after a seek, or after its entry was
//!   deleted) moves forward onto the first entry at or after its position
//!
//! The leaf page of the last move is kept as a hint and reused as long as
//! the index's modification count has not changed.

use std::sync::Arc;

use eyre::Result;
use tracing::{trace, warn};

use super::data::{Found, IndexData};
use super::entry::{Entry, Position};

#[derive(Debug, Clone)]
pub struct EntryCursor {
    data: Arc<IndexData>,
    first: Position,
    last: Position,
    cur: Position,
    prev: Position,
    mod_count: u64,
    hint: Option<u32>,
}

impl EntryCursor {
    /// Cursor over the entries strictly between `start` and `end`, which are
    /// boundary entries (sentinels or partial keys), never real rows.
    pub fn new(data: Arc<IndexData>, start: Entry, end: Entry) -> Result<Self> {
        data.initialize()?;
        let first = Position::on(start);
        let last = Position::on(end);
        let mod_count = data.mod_count();
        Ok(Self {
            data,
            cur: first.clone(),
            prev: first.clone(),
            first,
            last,
            mod_count,
            hint: None,
        })
    }

    pub fn index_data(&self) -> &Arc<IndexData> {
        &self.data
    }

    pub fn first_entry(&self) -> &Entry {
        self.first.entry()
    }

    pub fn last_entry(&self) -> &Entry {
        self.last.entry()
    }

    pub fn current(&self) -> &Position {
        &self.cur
    }

    pub fn previous(&self) -> &Position {
        &self.prev
    }

    pub fn is_before_first(&self) -> bool {
        self.cur == self.first
    }

    pub fn is_after_last(&self) -> bool {
        self.cur == self.last
    }

    pub fn is_up_to_date(&self) -> bool {
        self.mod_count == self.data.mod_count()
    }

    pub fn before_first(&mut self) {
        self.reset(self.first.clone());
    }

    pub fn after_last(&mut self) {
        self.reset(self.last.clone());
    }

    fn reset(&mut self, pos: Position) {
        self.prev = pos.clone();
        self.cur = pos;
        self.hint = None;
        self.mod_count = self.data.mod_count();
    }

    /// Moves to the next entry and returns it. Past the end the cursor stays
    /// on the last boundary entry, which is not a real row.
    pub fn next_entry(&mut self) -> Result<&Entry> {
        let pos = if self.is_after_last() {
            self.last.clone()
        } else {
            let hint = self.sync_hint();
            let found = self.data.find_next(
                self.cur.entry(),
                self.cur.is_between(),
                hint,
            )?;
            match found {
                Some(f) if f.entry < *self.last.entry() => self.accept(f),
                _ => self.last.clone(),
            }
        };
        self.prev = std::mem::replace(&mut self.cur, pos);
        Ok(self.cur.entry())
    }

    /// Moves to the previous entry and returns it. Before the start the
    /// cursor stays on the first boundary entry.
    pub fn previous_entry(&mut self) -> Result<&Entry> {
        let pos = if self.is_before_first() {
            self.first.clone()
        } else {
            let hint = self.sync_hint();
            match self.data.find_prev(self.cur.entry(), hint)? {
                Some(f) if f.entry > *self.first.entry() => self.accept(f),
                _ => self.first.clone(),
            }
        };
        self.prev = std::mem::replace(&mut self.cur, pos);
        Ok(self.cur.entry())
    }

    fn accept(&mut self, found: Found) -> Position {
        self.hint = Some(found.page);
        Position::on(found.entry)
    }

    /// Page hint usable for the next lookup, dropping it if the tree changed
    /// since it was taken.
    fn sync_hint(&mut self) -> Option<u32> {
        let current = self.data.mod_count();
        if current != self.mod_count {
            trace!(
                index = self.data.name(),
                seen = self.mod_count,
                current,
                "index changed under cursor, resyncing"
            );
            self.mod_count = current;
            self.hint = None;
        }
        self.hint
    }

    /// Places the cursor just before the first entry not less than `entry`.
    pub fn before_entry(&mut self, entry: Entry) -> Result<()> {
        let pos = self.clamp(Position::before(entry));
        self.reset(pos);
        Ok(())
    }

    /// Places the cursor just after the last entry not greater than `entry`,
    /// so that `previous_entry` lands on it.
    pub fn after_entry(&mut self, entry: Entry) -> Result<()> {
        let pos = if entry >= *self.last.entry() {
            self.last.clone()
        } else {
            match self.data.find_next(&entry, false, None)? {
                Some(f) if f.entry < *self.last.entry() => Position::before(f.entry),
                _ => self.last.clone(),
            }
        };
        self.reset(pos);
        Ok(())
    }

    fn clamp(&self, pos: Position) -> Position {
        if pos.entry() <= self.first.entry() {
            self.first.clone()
        } else if pos.entry() >= self.last.entry() {
            self.last.clone()
        } else {
            pos
        }
    }

    /// Re-establishes a saved position. An entry that no longer exists is
    /// replaced by the gap it left, so the next move lands on its nearest
    /// surviving neighbor.
    pub fn restore_position(&mut self, cur: Position, prev: Position) -> Result<()> {
        let cur = self.update_position(cur)?;
        let prev = self.update_position(prev)?;
        self.cur = cur;
        self.prev = prev;
        self.hint = None;
        self.mod_count = self.data.mod_count();
        Ok(())
    }

    fn update_position(&self, pos: Position) -> Result<Position> {
        if pos == self.first || pos == self.last {
            return Ok(pos);
        }
        let pos = self.clamp(pos);
        if !pos.is_on_row() {
            return Ok(pos);
        }
        if self.data.contains(pos.entry())? {
            return Ok(pos);
        }
        warn!(
            index = self.data.name(),
            entry = %pos.entry(),
            "restored cursor entry no longer exists, moving to its neighbor"
        );
        Ok(Position::before(pos.entry().clone()))
    }
}
