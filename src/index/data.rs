//! # IndexData: the Page Tree Behind an Index
//!
//! `IndexData` owns the B-tree of one physical index. Several logical
//! indexes (a primary key and a foreign key over the same columns, say) can
//! share one `IndexData` through an `Arc`.
//!
//! ## State Machine
//!
//! ```text
//! Uninitialized ──initialize()──> Initializing ──ok──> Initialized(Tree)
//!       ^                              │
//!       └────────────── error ─────────┘
//! ```
//!
//! An index opens `Uninitialized`: its pages exist in the store but nothing
//! has been read. The first operation that needs the tree (a cursor move,
//! `entry_count`, a row change, or an explicit `initialize`) reads every page
//! reachable from the root into a page cache. Later calls are no-ops.
//!
//! ## Tree Shape
//!
//! ```text
//!                    root (node, page 7)
//!          ┌──────────────┴───────────────┐
//!   [max of 12 → 12]               [max of 13 → 13]
//!          │                              │
//!   leaf 12  <── prev/next ──>    leaf 13
//! ```
//!
//! - Node entries are the last entry of their child plus the child's page
//!   number, so a search follows the first node entry not less than the key.
//! - Pages on the same level are doubly linked through `prev_page` /
//!   `next_page`. Cursor traversal walks the leaf level through these links.
//! - The root page number never changes. When the root overflows its entries
//!   move into two new child pages and the root becomes a node.
//! - A page that overflows is split near its median into itself and a new
//!   right sibling; the parent gets an entry for the new page.
//! - A non-root page that becomes empty is unlinked from its siblings and
//!   parent. Pages are never merged, so leaves may shrink arbitrarily.
//!
//! ## Caching
//!
//! The page cache is write-through: every change re-encodes the touched
//! pages and writes them to the `PageStore` before the operation returns.
//! There is no rollback for a split interrupted by an I/O error.
//!
//! ## Concurrency
//!
//! The tree sits behind a `parking_lot::RwLock`. Cursors read under the read
//! lock and hold no lock between moves. Every structural change bumps
//! `mod_count`, which cursors compare to decide whether their cached page
//! hint is still usable.

use std::fmt;
use std::sync::Arc;

use bumpalo::collections::CollectIn;
use bumpalo::collections::Vec as BumpVec;
use bumpalo::Bump;
use eyre::{bail, eyre, Result, WrapErr};
use hashbrown::HashMap;
use parking_lot::RwLock;
use smallvec::SmallVec;
use tracing::debug;

use super::codec::{self, encode_row, has_null, is_null_row};
use super::definition::IndexDefinition;
use super::entry::{Entry, RowId};
use super::page::{common_prefix_len, format_error, used_bytes, IndexPage};
use crate::config::{JetFormat, CHILD_PAGE_SIZE, MAX_TREE_DEPTH};
use crate::error::IndexError;
use crate::storage::PageStore;
use crate::types::OwnedValue;

/// Ancestors of the current page: (node page, position of the child entry).
type PathStack = SmallVec<[(u32, usize); MAX_TREE_DEPTH]>;

enum IndexState {
    Uninitialized,
    Initializing,
    Initialized(Tree),
}

struct Tree {
    root_page: u32,
    pages: HashMap<u32, IndexPage>,
    entry_count: usize,
    mod_count: u64,
}

/// A real entry found by a traversal, with the leaf page holding it.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Found {
    pub entry: Entry,
    pub page: u32,
}

pub struct IndexData {
    name: String,
    definition: IndexDefinition,
    store: Arc<dyn PageStore>,
    format: JetFormat,
    root_page: u32,
    owner_page: u32,
    unsupported_reason: Option<String>,
    state: RwLock<IndexState>,
}

impl fmt::Debug for IndexData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IndexData")
            .field("name", &self.name)
            .field("root_page", &self.root_page)
            .field("owner_page", &self.owner_page)
            .field("unsupported_reason", &self.unsupported_reason)
            .finish_non_exhaustive()
    }
}

impl IndexData {
    /// Allocates a root page holding an empty leaf and returns the new index,
    /// already initialized.
    pub fn create(
        name: impl Into<String>,
        definition: IndexDefinition,
        store: Arc<dyn PageStore>,
        owner_page: u32,
    ) -> Result<Self> {
        let root_page = store.allocate_page()?;
        let data = Self::open(name, definition, store, root_page, owner_page)?;

        let mut tree = Tree {
            root_page,
            pages: HashMap::new(),
            entry_count: 0,
            mod_count: 0,
        };
        tree.pages
            .insert(root_page, IndexPage::new_leaf(root_page, owner_page));
        data.write_page(&tree, root_page)?;
        *data.state.write() = IndexState::Initialized(tree);

        debug!(index = %data.name, root = root_page, "created index");
        Ok(data)
    }

    /// Attaches to an index whose root page already exists. Nothing is read
    /// until the tree is first needed.
    pub fn open(
        name: impl Into<String>,
        definition: IndexDefinition,
        store: Arc<dyn PageStore>,
        root_page: u32,
        owner_page: u32,
    ) -> Result<Self> {
        let format = JetFormat::with_page_size(store.page_size())?;
        let unsupported_reason = codec::unsupported_reason(&definition);
        Ok(Self {
            name: name.into(),
            definition,
            store,
            format,
            root_page,
            owner_page,
            unsupported_reason,
            state: RwLock::new(IndexState::Uninitialized),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn definition(&self) -> &IndexDefinition {
        &self.definition
    }

    pub fn root_page(&self) -> u32 {
        self.root_page
    }

    pub fn owner_page(&self) -> u32 {
        self.owner_page
    }

    pub fn format(&self) -> JetFormat {
        self.format
    }

    /// Why indexed lookups on this index are refused, if they are.
    pub fn unsupported_reason(&self) -> Option<&str> {
        self.unsupported_reason.as_deref()
    }

    pub fn ensure_supported(&self) -> Result<()> {
        match &self.unsupported_reason {
            Some(reason) => Err(IndexError::Unsupported {
                index: self.name.clone(),
                reason: reason.clone(),
            }
            .into()),
            None => Ok(()),
        }
    }

    pub fn is_initialized(&self) -> bool {
        matches!(*self.state.read(), IndexState::Initialized(_))
    }

    pub fn initialize(&self) -> Result<()> {
        if self.is_initialized() {
            return Ok(());
        }

        let mut state = self.state.write();
        match *state {
            IndexState::Initialized(_) => return Ok(()),
            IndexState::Initializing => bail!("index '{}' is already initializing", self.name),
            IndexState::Uninitialized => {}
        }
        *state = IndexState::Initializing;

        match self.load_tree() {
            Ok(tree) => {
                debug!(
                    index = %self.name,
                    root = tree.root_page,
                    pages = tree.pages.len(),
                    entries = tree.entry_count,
                    "initialized index"
                );
                *state = IndexState::Initialized(tree);
                Ok(())
            }
            Err(e) => {
                *state = IndexState::Uninitialized;
                Err(e).wrap_err_with(|| format!("failed to initialize index '{}'", self.name))
            }
        }
    }

    fn load_tree(&self) -> Result<Tree> {
        let capacity = self.format.index_data_capacity();
        let mut buf = vec![0u8; self.format.page_size()];
        let mut tree = Tree {
            root_page: self.root_page,
            pages: HashMap::new(),
            entry_count: 0,
            mod_count: 0,
        };

        let mut pending = vec![self.root_page];
        while let Some(page_no) = pending.pop() {
            if tree.pages.contains_key(&page_no) {
                return Err(format_error(
                    page_no,
                    "page is referenced twice in the index tree".into(),
                ));
            }
            self.store.read_page(page_no, &mut buf)?;

            let page = if page_no == self.root_page && buf.iter().all(|&b| b == 0) {
                IndexPage::new_leaf(page_no, self.owner_page)
            } else {
                IndexPage::decode(page_no, &buf, capacity)?
            };

            if page.is_leaf() {
                tree.entry_count += page.len();
            } else {
                for entry in page.entries() {
                    let child = entry.child_page().ok_or_else(|| {
                        format_error(page_no, "node entry without child page".into())
                    })?;
                    pending.push(child);
                }
            }
            tree.pages.insert(page_no, page);
        }

        Ok(tree)
    }

    fn read_tree<R>(&self, f: impl FnOnce(&Tree) -> Result<R>) -> Result<R> {
        self.initialize()?;
        let state = self.state.read();
        match &*state {
            IndexState::Initialized(tree) => f(tree),
            _ => bail!("index '{}' is not initialized", self.name),
        }
    }

    fn write_tree<R>(&self, f: impl FnOnce(&mut Tree) -> Result<R>) -> Result<R> {
        self.initialize()?;
        let mut state = self.state.write();
        match &mut *state {
            IndexState::Initialized(tree) => f(tree),
            _ => bail!("index '{}' is not initialized", self.name),
        }
    }

    pub fn entry_count(&self) -> Result<usize> {
        self.read_tree(|tree| Ok(tree.entry_count))
    }

    /// Structural modification counter. Zero until the index is initialized.
    pub fn mod_count(&self) -> u64 {
        match &*self.state.read() {
            IndexState::Initialized(tree) => tree.mod_count,
            _ => 0,
        }
    }

    pub fn page_count(&self) -> Result<usize> {
        self.read_tree(|tree| Ok(tree.pages.len()))
    }

    /// Every real entry in index order.
    pub fn entries(&self) -> Result<Vec<Entry>> {
        self.read_tree(|tree| {
            let mut out = Vec::with_capacity(tree.entry_count);
            let (mut page_no, _) = tree.descend(&Entry::MIN)?;
            loop {
                let page = tree.page(page_no)?;
                out.extend(page.entries().iter().cloned());
                if page.next_page() == 0 {
                    break;
                }
                page_no = page.next_page();
            }
            Ok(out)
        })
    }

    pub fn contains(&self, entry: &Entry) -> Result<bool> {
        self.read_tree(|tree| tree.contains(entry))
    }

    /// First real entry after `after` (or equal to it when `inclusive`).
    /// `hint` is a leaf page the caller saw the entry on, tried first.
    pub(crate) fn find_next(
        &self,
        after: &Entry,
        inclusive: bool,
        hint: Option<u32>,
    ) -> Result<Option<Found>> {
        self.read_tree(|tree| tree.next_after(after, inclusive, hint))
    }

    /// Last real entry strictly before `before`.
    pub(crate) fn find_prev(&self, before: &Entry, hint: Option<u32>) -> Result<Option<Found>> {
        self.read_tree(|tree| tree.prev_before(before, hint))
    }

    /// Indexes a table row. Returns `false` when the row is skipped because
    /// every indexed column is null and the index ignores nulls.
    pub fn add_row(&self, row: &[OwnedValue], row_id: RowId) -> Result<bool> {
        self.ensure_supported()?;
        let null_row = is_null_row(&self.definition, row);
        if null_row && self.definition.ignores_nulls() {
            return Ok(false);
        }
        if self.definition.is_required() && has_null(&self.definition, row) {
            return Err(IndexError::ConstraintViolation {
                index: self.name.clone(),
                reason: "indexed columns may not be null".into(),
            }
            .into());
        }

        let entry = encode_row(&self.definition, row, row_id)?;
        self.check_entry_size(&entry)?;

        self.write_tree(|tree| {
            if self.definition.is_unique() && !null_row {
                let probe = Entry::new(entry.bytes().to_vec(), RowId::FIRST);
                if let Some(found) = tree.next_after(&probe, true, None)? {
                    if found.entry.bytes() == entry.bytes() {
                        return Err(IndexError::ConstraintViolation {
                            index: self.name.clone(),
                            reason: format!(
                                "new row {} duplicates the key of row {}",
                                row_id,
                                found.entry.row_id()
                            ),
                        }
                        .into());
                    }
                }
            }
            self.insert_entry(tree, entry)
        })
    }

    /// Removes a table row's entry. Returns whether an entry was removed.
    pub fn delete_row(&self, row: &[OwnedValue], row_id: RowId) -> Result<bool> {
        self.ensure_supported()?;
        if self.definition.ignores_nulls() && is_null_row(&self.definition, row) {
            return Ok(false);
        }
        let entry = encode_row(&self.definition, row, row_id)?;
        self.write_tree(|tree| self.remove_entry(tree, &entry))
    }

    /// Replaces the entry for `old_row` with one for `new_row`. If the new
    /// entry is rejected the old one is put back.
    pub fn update_row(
        &self,
        old_row: &[OwnedValue],
        old_id: RowId,
        new_row: &[OwnedValue],
        new_id: RowId,
    ) -> Result<()> {
        let removed = self.delete_row(old_row, old_id)?;
        if let Err(e) = self.add_row(new_row, new_id) {
            if removed {
                self.add_row(old_row, old_id)
                    .wrap_err("failed to restore old entry after rejected update")?;
            }
            return Err(e);
        }
        Ok(())
    }

    /// Inserts an already encoded entry. Returns `false` if it was present.
    pub fn add_entry(&self, entry: Entry) -> Result<bool> {
        self.ensure_supported()?;
        if !entry.is_valid() {
            bail!("cannot insert boundary entry {} into index '{}'", entry, self.name);
        }
        codec::check_row_id(entry.row_id())?;
        self.check_entry_size(&entry)?;
        self.write_tree(|tree| self.insert_entry(tree, entry))
    }

    pub fn delete_entry(&self, entry: &Entry) -> Result<bool> {
        self.ensure_supported()?;
        self.write_tree(|tree| self.remove_entry(tree, entry))
    }

    fn check_entry_size(&self, entry: &Entry) -> Result<()> {
        let size = entry.serialized_len() + CHILD_PAGE_SIZE;
        let max = self.format.max_entry_size();
        if size > max {
            let columns: Vec<&str> = self.definition.columns().iter().map(|c| c.name()).collect();
            return Err(IndexError::DataType {
                column: columns.join(", "),
                reason: format!("encoded index entry is {} bytes, maximum is {}", size, max),
            }
            .into());
        }
        Ok(())
    }

    fn insert_entry(&self, tree: &mut Tree, entry: Entry) -> Result<bool> {
        let (leaf_no, mut path) = tree.descend(&entry)?;
        let leaf = tree.page_mut(leaf_no)?;
        let idx = leaf.lower_bound(&entry);
        if leaf.entries().get(idx).is_some_and(|e| e.same_key(&entry)) {
            return Ok(false);
        }
        leaf.insert(idx, entry);
        tree.entry_count += 1;
        tree.mod_count += 1;

        self.commit_page(tree, &mut path, leaf_no)?;
        Ok(true)
    }

    fn remove_entry(&self, tree: &mut Tree, entry: &Entry) -> Result<bool> {
        let (leaf_no, mut path) = tree.descend(entry)?;
        let leaf = tree.page_mut(leaf_no)?;
        let idx = leaf.lower_bound(entry);
        if !leaf.entries().get(idx).is_some_and(|e| e.same_key(entry)) {
            return Ok(false);
        }
        leaf.remove(idx);
        tree.entry_count -= 1;
        tree.mod_count += 1;

        self.commit_page(tree, &mut path, leaf_no)?;
        Ok(true)
    }

    /// Writes a changed page, splitting or removing it first when it no
    /// longer fits or is empty, and brings its parent's entry up to date.
    fn commit_page(&self, tree: &mut Tree, path: &mut PathStack, page_no: u32) -> Result<()> {
        let capacity = self.format.index_data_capacity();
        let (empty, leaf, size) = {
            let page = tree.page(page_no)?;
            (page.is_empty(), page.is_leaf(), page.encoded_size())
        };

        if page_no == self.root_page {
            if empty && !leaf {
                tree.page_mut(page_no)?.set_leaf(true);
                debug!(index = %self.name, root = page_no, "root emptied, reverted to leaf");
            }
            if size > capacity {
                return self.split_root(tree);
            }
            return self.write_page(tree, page_no);
        }

        if empty {
            return self.remove_page(tree, path, page_no);
        }
        if size > capacity {
            return self.split_page(tree, path, page_no);
        }
        self.write_page(tree, page_no)?;
        self.update_parent(tree, path, page_no)
    }

    fn update_parent(&self, tree: &mut Tree, path: &mut PathStack, page_no: u32) -> Result<()> {
        let Some((parent_no, idx)) = path.pop() else {
            return Ok(());
        };
        let last = tree
            .page(page_no)?
            .last_entry()
            .cloned()
            .ok_or_else(|| format_error(page_no, "empty page has a parent entry".into()))?;

        let parent = tree.page_mut(parent_no)?;
        let current = parent
            .entries()
            .get(idx)
            .ok_or_else(|| format_error(parent_no, format!("no child entry at {}", idx)))?;
        if current.same_key(&last) {
            return Ok(());
        }
        parent.replace(idx, Entry::node(&last, page_no));
        self.commit_page(tree, path, parent_no)
    }

    fn split_page(&self, tree: &mut Tree, path: &mut PathStack, page_no: u32) -> Result<()> {
        let (parent_no, idx) = path
            .pop()
            .ok_or_else(|| eyre!("page {} of index '{}' has no parent", page_no, self.name))?;

        let mut left = tree.page_mut(page_no)?.take_entries();
        let mid = self.split_point(&left, page_no)?;
        let right = left.split_off(mid);
        let (left_len, right_len) = (left.len(), right.len());

        let new_no = self.store.allocate_page()?;
        let page = tree.page_mut(page_no)?;
        let old_next = page.next_page();
        let mut new_page = if page.is_leaf() {
            IndexPage::new_leaf(new_no, self.owner_page)
        } else {
            IndexPage::new_node(new_no, self.owner_page)
        };
        page.set_entries(left);
        page.set_next_page(new_no);
        new_page.set_prev_page(page_no);
        new_page.set_next_page(old_next);
        new_page.set_entries(right);

        let left_last = last_of(tree.page(page_no)?)?;
        let right_last = last_of(&new_page)?;
        tree.pages.insert(new_no, new_page);

        if old_next != 0 {
            tree.page_mut(old_next)?.set_prev_page(new_no);
            self.write_page(tree, old_next)?;
        }
        self.write_page(tree, page_no)?;
        self.write_page(tree, new_no)?;

        debug!(
            index = %self.name,
            page = page_no,
            new_page = new_no,
            left = left_len,
            right = right_len,
            "split index page"
        );

        let parent = tree.page_mut(parent_no)?;
        parent.replace(idx, Entry::node(&left_last, page_no));
        parent.insert(idx + 1, Entry::node(&right_last, new_no));
        self.commit_page(tree, path, parent_no)
    }

    fn split_root(&self, tree: &mut Tree) -> Result<()> {
        let root_no = self.root_page;
        let mut left = tree.page_mut(root_no)?.take_entries();
        let mid = self.split_point(&left, root_no)?;
        let right = left.split_off(mid);
        let leaf = tree.page(root_no)?.is_leaf();

        let left_no = self.store.allocate_page()?;
        let right_no = self.store.allocate_page()?;
        let new_child = |page_no| {
            if leaf {
                IndexPage::new_leaf(page_no, self.owner_page)
            } else {
                IndexPage::new_node(page_no, self.owner_page)
            }
        };

        let mut left_page = new_child(left_no);
        left_page.set_next_page(right_no);
        left_page.set_entries(left);
        let mut right_page = new_child(right_no);
        right_page.set_prev_page(left_no);
        right_page.set_entries(right);

        let root_entries = vec![
            Entry::node(&last_of(&left_page)?, left_no),
            Entry::node(&last_of(&right_page)?, right_no),
        ];
        debug!(
            index = %self.name,
            root = root_no,
            left = left_no,
            right = right_no,
            left_entries = left_page.len(),
            right_entries = right_page.len(),
            "grew index root"
        );

        tree.pages.insert(left_no, left_page);
        tree.pages.insert(right_no, right_page);
        let root = tree.page_mut(root_no)?;
        root.set_leaf(false);
        root.set_entries(root_entries);

        self.write_page(tree, left_no)?;
        self.write_page(tree, right_no)?;
        self.write_page(tree, root_no)
    }

    /// Position to split `entries` at so that both halves fit on a page,
    /// starting from the median.
    fn split_point(&self, entries: &[Entry], page_no: u32) -> Result<usize> {
        let capacity = self.format.index_data_capacity();
        let arena = Bump::new();
        let mut scratch = Vec::new();
        let serialized: BumpVec<&[u8]> = entries
            .iter()
            .map(|e| {
                scratch.clear();
                e.serialize_into(&mut scratch);
                &*arena.alloc_slice_copy(&scratch)
            })
            .collect_in(&arena);

        let fits = |part: &[&[u8]]| {
            let prefix = common_prefix_len(part.iter().copied());
            used_bytes(part.iter().map(|s| s.len()), prefix) <= capacity
        };

        let n = serialized.len();
        if n < 2 {
            bail!("index page {} overflows with a single entry", page_no);
        }
        let mut mid = n / 2;
        while mid > 1 && !fits(&serialized[..mid]) {
            mid -= 1;
        }
        while mid < n - 1 && !fits(&serialized[mid..]) {
            mid += 1;
        }
        if !fits(&serialized[..mid]) || !fits(&serialized[mid..]) {
            bail!(
                "index page {} cannot be split into two pages of {} bytes",
                page_no,
                capacity
            );
        }
        Ok(mid)
    }

    fn remove_page(&self, tree: &mut Tree, path: &mut PathStack, page_no: u32) -> Result<()> {
        let page = tree
            .pages
            .remove(&page_no)
            .ok_or_else(|| eyre!("page {} not in index '{}'", page_no, self.name))?;
        let (prev, next) = (page.prev_page(), page.next_page());

        if prev != 0 {
            tree.page_mut(prev)?.set_next_page(next);
            self.write_page(tree, prev)?;
        }
        if next != 0 {
            tree.page_mut(next)?.set_prev_page(prev);
            self.write_page(tree, next)?;
        }
        self.store
            .write_page(page_no, &vec![0u8; self.format.page_size()])?;

        debug!(index = %self.name, page = page_no, prev, next, "removed empty index page");

        let (parent_no, idx) = path
            .pop()
            .ok_or_else(|| eyre!("page {} of index '{}' has no parent", page_no, self.name))?;
        tree.page_mut(parent_no)?.remove(idx);
        self.commit_page(tree, path, parent_no)
    }

    fn write_page(&self, tree: &Tree, page_no: u32) -> Result<()> {
        let mut buf = vec![0u8; self.format.page_size()];
        tree.page(page_no)?
            .encode(&mut buf, self.format.index_data_capacity())?;
        self.store.write_page(page_no, &buf)
    }

    /// Checks the tree structure: entry order within and across pages, that
    /// node entries match their child's last entry, that sibling links chain
    /// each level in order, that all leaves sit on one level, and the entry
    /// count. `deep` also re-reads every page from the store and compares it
    /// to the cache.
    pub fn validate(&self, deep: bool) -> Result<()> {
        self.read_tree(|tree| {
            let mut levels: Vec<Vec<u32>> = Vec::new();
            let mut count = 0usize;
            self.validate_page(tree, tree.root_page, 0, None, &mut levels, &mut count)?;

            if count != tree.entry_count {
                bail!(
                    "index '{}' has {} leaf entries, expected {}",
                    self.name,
                    count,
                    tree.entry_count
                );
            }
            if count_pages(&levels) != tree.pages.len() {
                bail!(
                    "index '{}' caches {} pages but {} are reachable",
                    self.name,
                    tree.pages.len(),
                    count_pages(&levels)
                );
            }

            let depth = levels.len();
            for (level_no, level) in levels.iter().enumerate() {
                for (i, &page_no) in level.iter().enumerate() {
                    let page = tree.page(page_no)?;
                    let expected_prev = if i == 0 { 0 } else { level[i - 1] };
                    let expected_next = level.get(i + 1).copied().unwrap_or(0);
                    check(
                        page.prev_page() == expected_prev && page.next_page() == expected_next,
                        page_no,
                        || {
                            format!(
                                "sibling links {}<->{} should be {}<->{}",
                                page.prev_page(),
                                page.next_page(),
                                expected_prev,
                                expected_next
                            )
                        },
                    )?;
                    check(page.is_leaf() == (level_no + 1 == depth), page_no, || {
                        format!("leaf flag wrong for page on level {}", level_no)
                    })?;
                }
            }

            if deep {
                let mut prev: Option<&Entry> = None;
                for &page_no in levels.last().into_iter().flatten() {
                    for entry in tree.page(page_no)?.entries() {
                        if let Some(p) = prev {
                            check(p < entry, page_no, || {
                                format!("entry {} does not follow {}", entry, p)
                            })?;
                        }
                        prev = Some(entry);
                    }
                }

                let capacity = self.format.index_data_capacity();
                let mut buf = vec![0u8; self.format.page_size()];
                for (&page_no, cached) in &tree.pages {
                    self.store.read_page(page_no, &mut buf)?;
                    let stored = IndexPage::decode(page_no, &buf, capacity)?;
                    check(&stored == cached, page_no, || {
                        "stored page differs from cached page".to_string()
                    })?;
                }
            }

            Ok(())
        })
    }

    fn validate_page(
        &self,
        tree: &Tree,
        page_no: u32,
        depth: usize,
        expected_last: Option<&Entry>,
        levels: &mut Vec<Vec<u32>>,
        count: &mut usize,
    ) -> Result<()> {
        let page = tree.page(page_no)?;
        check(depth <= tree.pages.len(), page_no, || {
            "index tree contains a cycle".to_string()
        })?;
        if levels.len() <= depth {
            levels.push(Vec::new());
        }
        levels[depth].push(page_no);

        check(page_no == tree.root_page || !page.is_empty(), page_no, || {
            "non-root page is empty".to_string()
        })?;
        for pair in page.entries().windows(2) {
            check(pair[0] < pair[1], page_no, || {
                format!("entries out of order: {} then {}", pair[0], pair[1])
            })?;
        }
        if let Some(expected) = expected_last {
            let last = page.last_entry();
            check(last.is_some_and(|l| l.same_key(expected)), page_no, || {
                format!("parent entry {} does not match last entry", expected)
            })?;
        }

        if page.is_leaf() {
            check(page.entries().iter().all(Entry::is_valid), page_no, || {
                "leaf holds a boundary entry".to_string()
            })?;
            *count += page.len();
            return Ok(());
        }

        let tail = page.last_entry().and_then(Entry::child_page).unwrap_or(0);
        check(page.child_tail_page() == tail, page_no, || {
            format!("child tail {} should be {}", page.child_tail_page(), tail)
        })?;
        for entry in page.entries() {
            let child = entry
                .child_page()
                .ok_or_else(|| format_error(page_no, "node entry without child".into()))?;
            self.validate_page(tree, child, depth + 1, Some(entry), levels, count)?;
        }
        Ok(())
    }
}

impl Tree {
    fn page(&self, page_no: u32) -> Result<&IndexPage> {
        self.pages
            .get(&page_no)
            .ok_or_else(|| format_error(page_no, "page is not part of the index tree".into()))
    }

    fn page_mut(&mut self, page_no: u32) -> Result<&mut IndexPage> {
        self.pages
            .get_mut(&page_no)
            .ok_or_else(|| format_error(page_no, "page is not part of the index tree".into()))
    }

    /// Leaf page where `target` belongs, with the node path leading to it.
    fn descend(&self, target: &Entry) -> Result<(u32, PathStack)> {
        let mut path = PathStack::new();
        let mut page_no = self.root_page;
        loop {
            let page = self.page(page_no)?;
            if page.is_leaf() {
                return Ok((page_no, path));
            }
            if page.is_empty() {
                return Err(format_error(page_no, "node page has no entries".into()));
            }
            if path.len() > self.pages.len() {
                return Err(format_error(page_no, "index tree contains a cycle".into()));
            }
            let idx = page.lower_bound(target).min(page.len() - 1);
            let child = page.entries()[idx]
                .child_page()
                .ok_or_else(|| format_error(page_no, "node entry without child".into()))?;
            path.push((page_no, idx));
            page_no = child;
        }
    }

    /// Whether `target` lies within the entries of leaf `page_no`.
    fn covers(&self, page_no: u32, target: &Entry) -> bool {
        let Some(page) = self.pages.get(&page_no) else {
            return false;
        };
        match (page.entries().first(), page.last_entry()) {
            (Some(first), Some(last)) if page.is_leaf() => first <= target && target <= last,
            _ => false,
        }
    }

    fn start_page(&self, target: &Entry, hint: Option<u32>) -> Result<u32> {
        match hint {
            Some(h) if self.covers(h, target) => Ok(h),
            _ => Ok(self.descend(target)?.0),
        }
    }

    fn next_after(&self, target: &Entry, inclusive: bool, hint: Option<u32>) -> Result<Option<Found>> {
        let mut page = self.page(self.start_page(target, hint)?)?;
        let mut idx = if inclusive {
            page.lower_bound(target)
        } else {
            page.upper_bound(target)
        };
        loop {
            if let Some(entry) = page.entries().get(idx) {
                return Ok(Some(Found {
                    entry: entry.clone(),
                    page: page.page_number(),
                }));
            }
            if page.next_page() == 0 {
                return Ok(None);
            }
            page = self.page(page.next_page())?;
            idx = 0;
        }
    }

    fn prev_before(&self, target: &Entry, hint: Option<u32>) -> Result<Option<Found>> {
        let mut page = self.page(self.start_page(target, hint)?)?;
        let mut idx = page.lower_bound(target);
        loop {
            if idx > 0 {
                return Ok(Some(Found {
                    entry: page.entries()[idx - 1].clone(),
                    page: page.page_number(),
                }));
            }
            if page.prev_page() == 0 {
                return Ok(None);
            }
            page = self.page(page.prev_page())?;
            idx = page.len();
        }
    }

    fn contains(&self, entry: &Entry) -> Result<bool> {
        let (leaf_no, _) = self.descend(entry)?;
        let leaf = self.page(leaf_no)?;
        let idx = leaf.lower_bound(entry);
        Ok(leaf.entries().get(idx).is_some_and(|e| e.same_key(entry)))
    }
}

fn last_of(page: &IndexPage) -> Result<Entry> {
    page.last_entry()
        .cloned()
        .ok_or_else(|| format_error(page.page_number(), "split left an empty page".into()))
}

fn check(cond: bool, page: u32, reason: impl FnOnce() -> String) -> Result<()> {
    if cond {
        Ok(())
    } else {
        Err(format_error(page, reason()))
    }
}

fn count_pages(levels: &[Vec<u32>]) -> usize {
    levels.iter().map(Vec::len).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemPageStore;
    use crate::types::{ColumnDef, DataType};

    fn small_store() -> Arc<dyn PageStore> {
        Arc::new(MemPageStore::new(JetFormat::with_page_size(1024).unwrap()))
    }

    fn long_index(store: Arc<dyn PageStore>, unique: bool) -> IndexData {
        let def = IndexDefinition::builder()
            .column(ColumnDef::new("id", DataType::Long), 0, true)
            .unique(unique)
            .build()
            .unwrap();
        IndexData::create("ById", def, store, 1).unwrap()
    }

    fn row(v: i32) -> Vec<OwnedValue> {
        vec![OwnedValue::Long(v)]
    }

    #[test]
    fn inserts_stay_sorted_across_splits() {
        let index = long_index(small_store(), false);
        for i in 0..600 {
            let v = (i * 7919) % 600;
            assert!(index.add_row(&row(v), RowId::new(100 + v as u32, 0)).unwrap());
        }
        assert_eq!(index.entry_count().unwrap(), 600);
        assert!(index.page_count().unwrap() > 3);
        index.validate(true).unwrap();

        let entries = index.entries().unwrap();
        assert!(entries.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(entries[0].row_id(), RowId::new(100, 0));
    }

    #[test]
    fn deleting_everything_collapses_to_an_empty_root() {
        let index = long_index(small_store(), false);
        for v in 0..300 {
            index.add_row(&row(v), RowId::new(1, (v % 200) as u8)).unwrap();
        }
        for v in 0..300 {
            assert!(index.delete_row(&row(v), RowId::new(1, (v % 200) as u8)).unwrap());
        }
        assert_eq!(index.entry_count().unwrap(), 0);
        assert_eq!(index.page_count().unwrap(), 1);
        index.validate(true).unwrap();
        assert!(!index.delete_row(&row(1), RowId::new(1, 1)).unwrap());
    }

    #[test]
    fn unique_violation_is_reported() {
        let index = long_index(small_store(), true);
        index.add_row(&row(5), RowId::new(1, 0)).unwrap();
        let err = index.add_row(&row(5), RowId::new(1, 1)).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<IndexError>(),
            Some(IndexError::ConstraintViolation { .. })
        ));
        assert_eq!(index.entry_count().unwrap(), 1);
    }

    #[test]
    fn update_row_restores_old_entry_on_conflict() {
        let index = long_index(small_store(), true);
        index.add_row(&row(1), RowId::new(1, 0)).unwrap();
        index.add_row(&row(2), RowId::new(1, 1)).unwrap();

        assert!(index
            .update_row(&row(2), RowId::new(1, 1), &row(1), RowId::new(1, 1))
            .is_err());
        assert_eq!(index.entry_count().unwrap(), 2);
        assert!(index
            .contains(&encode_row(index.definition(), &row(2), RowId::new(1, 1)).unwrap())
            .unwrap());
    }

    #[test]
    fn reopen_reads_tree_lazily() {
        let store = small_store();
        let index = long_index(store.clone(), false);
        for v in 0..200 {
            index.add_row(&row(v), RowId::new(2, v as u8)).unwrap();
        }
        let root = index.root_page();
        let expected = index.entries().unwrap();

        let reopened =
            IndexData::open("ById", index.definition().clone(), store, root, 1).unwrap();
        assert!(!reopened.is_initialized());
        assert_eq!(reopened.mod_count(), 0);
        assert_eq!(reopened.entries().unwrap(), expected);
        assert!(reopened.is_initialized());
        reopened.validate(true).unwrap();
    }

    #[test]
    fn oversized_entry_is_a_data_type_error() {
        let def = IndexDefinition::builder()
            .column(ColumnDef::text("name", 255), 0, true)
            .build()
            .unwrap();
        let index = IndexData::create("ByName", def, small_store(), 1).unwrap();
        let long = "x".repeat(250);
        let err = index
            .add_row(&[OwnedValue::Text(long)], RowId::new(1, 0))
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<IndexError>(),
            Some(IndexError::DataType { .. })
        ));
    }

    #[test]
    fn wide_page_numbers_are_not_truncated() {
        let index = long_index(small_store(), false);
        let far = RowId::new(1 << 24, 0);
        assert!(index.add_row(&row(1), far).is_err());
        let entry = Entry::new(vec![0x7F, 0x80, 0, 0, 1], far);
        assert!(index.add_entry(entry).is_err());
        assert_eq!(index.entry_count().unwrap(), 0);
    }

    #[test]
    fn unsupported_index_rejects_writes() {
        let def = IndexDefinition::builder()
            .column(ColumnDef::new("blob", DataType::Ole), 0, true)
            .build()
            .unwrap();
        let index = IndexData::create("ByBlob", def, small_store(), 1).unwrap();
        assert!(index.unsupported_reason().is_some());
        let err = index
            .add_row(&[OwnedValue::Binary(vec![1])], RowId::new(1, 0))
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<IndexError>(),
            Some(IndexError::Unsupported { .. })
        ));
    }
}
