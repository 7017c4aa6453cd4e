use std::collections::HashMap;
use std::time::Instant;

use crate::ItemRecord;
use crate::debounce::DebounceScheduler;
use crate::rows::{RowMaterializer, RowState, ThumbState};
use crate::selection::{ClickKind, SelectionModel};
use crate::thumbs::{ThumbEvent, ThumbnailLoader};
use crate::viewport;

/// Debounce namespace: one slot per row plus one for scroll settling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DebounceKey {
    Row(usize),
    Scroll,
}

/// Deferred work produced by the scheduler and executed on the UI loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListCommand {
    LoadThumb(usize),
    ScrollSettled,
}

pub struct ListConfig {
    pub row_height: f32,
    pub buffer_rows: usize,
    pub thumb_size: (u32, u32),
    pub thumb_delay: std::time::Duration,
    /// `None` reconciles on every scroll event; `Some` defers the recompute
    /// until scrolling has been quiet for this long.
    pub settle_delay: Option<std::time::Duration>,
}

type FilterPredicate = Box<dyn Fn(&ItemRecord) -> bool>;

/// Orchestrator for the virtualized list.
///
/// Owns the full item sequence, the filtered view over it, the materialized
/// row window, selection, the debounce scheduler and the thumbnail
/// pipeline. All methods run on the UI loop; per-call cost is bounded by the
/// visible range, never by the total item count.
pub struct VirtualList {
    items: Vec<ItemRecord>,
    /// Indices into `items`, order-preserving subsequence.
    filtered: Vec<usize>,
    filter: Option<FilterPredicate>,

    /// Filtered index -> live row. Keys are exactly the current range.
    rows: HashMap<usize, RowState>,
    range: (usize, usize),

    scroll_offset: f32,
    viewport_height: f32,
    /// True while a scroll-settle window is open; the periodic re-poll
    /// stands down until it fires.
    settling: bool,

    pub selection: SelectionModel,
    scheduler: DebounceScheduler<DebounceKey, ListCommand>,
    loader: ThumbnailLoader,
    materializer: RowMaterializer,
    cfg: ListConfig,

    on_item_activated: Option<Box<dyn FnMut(usize)>>,
}

impl VirtualList {
    pub fn new(cfg: ListConfig, loader: ThumbnailLoader) -> Self {
        let materializer = RowMaterializer {
            thumb_size: cfg.thumb_size,
            thumb_delay: cfg.thumb_delay,
        };
        Self {
            items: Vec::new(),
            filtered: Vec::new(),
            filter: None,
            rows: HashMap::new(),
            range: (0, 0),
            scroll_offset: 0.0,
            viewport_height: 0.0,
            settling: false,
            selection: SelectionModel::new(),
            scheduler: DebounceScheduler::new(),
            loader,
            materializer,
            cfg,
            on_item_activated: None,
        }
    }

    pub fn set_on_item_activated(&mut self, f: Box<dyn FnMut(usize)>) {
        self.on_item_activated = Some(f);
    }

    // --- Sequence replacement -------------------------------------------

    /// Replace the item sequence wholesale. Filter and selection are reset,
    /// the viewport returns to the top, and the window is rebuilt
    /// synchronously.
    pub fn set_items(&mut self, items: Vec<ItemRecord>, now: Instant) {
        self.items = items;
        self.filter = None;
        self.filtered = (0..self.items.len()).collect();
        self.selection.clear();
        self.scroll_offset = 0.0;
        self.teardown_rows();
        self.range = (0, 0);
        self.reconcile(now);
    }

    /// Replace the sequence but keep the active filter and carry the
    /// selection over by display name where the same items survive.
    pub fn refresh_items(&mut self, items: Vec<ItemRecord>, now: Instant) {
        let selected_names: Vec<String> = self
            .selection
            .indices()
            .into_iter()
            .filter_map(|i| self.filtered.get(i))
            .filter_map(|&idx| self.items.get(idx))
            .map(|item| item.display_name.clone())
            .collect();

        self.items = items;
        self.apply_filter();
        self.teardown_rows();
        self.range = (0, 0);

        let restored: Vec<usize> = self
            .filtered
            .iter()
            .enumerate()
            .filter(|&(_, &idx)| selected_names.iter().any(|n| *n == self.items[idx].display_name))
            .map(|(fi, _)| fi)
            .collect();
        self.selection.restore(&restored, self.filtered.len());

        self.reconcile(now);
    }

    /// Install (or clear) the filter predicate and recompute the view.
    /// Selection does not survive a filter change.
    pub fn set_filter(&mut self, filter: Option<FilterPredicate>, now: Instant) {
        self.filter = filter;
        self.apply_filter();
        self.selection.clear();
        self.teardown_rows();
        self.range = (0, 0);
        self.reconcile(now);
    }

    fn apply_filter(&mut self) {
        self.filtered = match &self.filter {
            Some(pred) => self
                .items
                .iter()
                .enumerate()
                .filter(|(_, item)| pred(item))
                .map(|(i, _)| i)
                .collect(),
            None => (0..self.items.len()).collect(),
        };
    }

    // --- Viewport events --------------------------------------------------

    /// Scroll or resize notification from the host surface. With a settle
    /// window configured the expensive recompute is deferred until the
    /// window fires; otherwise it runs inline.
    pub fn on_scroll(&mut self, scroll_offset: f32, viewport_height: f32, now: Instant) {
        self.scroll_offset = scroll_offset.max(0.0);
        self.viewport_height = viewport_height;
        if !viewport::is_measurable(viewport_height) {
            return;
        }
        match self.cfg.settle_delay {
            Some(delay) => {
                self.settling = true;
                self.scheduler
                    .settle(DebounceKey::Scroll, delay, ListCommand::ScrollSettled, now);
            }
            None => self.reconcile(now),
        }
    }

    /// Periodic pump: fires due debounce actions, drains thumbnail
    /// completions, and re-polls the viewport. Cheap and idempotent when
    /// nothing changed, so the host can call it every 100-200ms.
    pub fn tick(&mut self, now: Instant) {
        for cmd in self.scheduler.fire_due(now) {
            match cmd {
                ListCommand::LoadThumb(index) => self.start_thumb_request(index),
                ListCommand::ScrollSettled => {
                    self.settling = false;
                    self.reconcile(now);
                }
            }
        }

        for event in self.loader.poll() {
            self.apply_thumb_event(event);
        }

        // Tolerate hosts with unreliable scroll/resize notifications; a
        // no-op when the desired range already matches.
        if !self.settling && viewport::is_measurable(self.viewport_height) {
            let desired = self.desired_range();
            if desired != self.range {
                self.reconcile(now);
            }
        }
    }

    // --- Thumbnails --------------------------------------------------------

    fn start_thumb_request(&mut self, index: usize) {
        let Some(row) = self.rows.get_mut(&index) else {
            // Row left the window between scheduling and firing; its token
            // should have been cancelled, but a stale fire must stay inert.
            return;
        };
        if !matches!(row.thumb, ThumbState::Queued) {
            return;
        }
        row.thumb_token = None;
        match row.path.clone() {
            // A file that vanished since the scan takes the failure
            // placeholder directly instead of a worker round-trip.
            Some(path) if path.exists() => {
                row.thumb = ThumbState::Pending;
                self.loader.request(path, self.cfg.thumb_size);
            }
            _ => row.thumb = ThumbState::Failed,
        }
    }

    fn apply_thumb_event(&mut self, event: ThumbEvent) {
        let key = event.key().clone();
        if key.1 != self.cfg.thumb_size {
            return;
        }
        // Validate the target: the completion is applied only to a row that
        // is still materialized, still pending, and still names this path.
        // Anything else is the expected outcome of cancellation, dropped.
        let target = self.rows.values_mut().find(|row| {
            matches!(row.thumb, ThumbState::Pending) && row.path.as_deref() == Some(key.0.as_path())
        });
        let Some(row) = target else { return };
        match event {
            ThumbEvent::Loaded(_, image) => row.thumb = ThumbState::Loaded(image),
            ThumbEvent::Failed(_) => row.thumb = ThumbState::Failed,
        }
    }

    // --- Reconciliation ----------------------------------------------------

    fn desired_range(&self) -> (usize, usize) {
        // An unmeasured surface yields no rows; the first real scroll or
        // resize notification (or the periodic tick) fills the window in.
        if !viewport::is_measurable(self.viewport_height) {
            return (0, 0);
        }
        viewport::compute_range(
            self.scroll_offset,
            self.viewport_height,
            self.cfg.row_height,
            self.cfg.buffer_rows,
            self.filtered.len(),
        )
    }

    /// Diff the materialized set against the desired range: destroy rows
    /// that left, create rows that entered. O(range), never O(items).
    fn reconcile(&mut self, now: Instant) {
        let desired = self.desired_range();

        let leaving: Vec<usize> = self
            .rows
            .keys()
            .copied()
            .filter(|&i| i < desired.0 || i >= desired.1)
            .collect();
        for i in leaving {
            if let Some(row) = self.rows.remove(&i) {
                self.materializer
                    .dematerialize(row, &mut self.scheduler, &mut self.loader);
            }
        }

        for i in desired.0..desired.1 {
            if i >= self.filtered.len() || self.rows.contains_key(&i) {
                continue;
            }
            let item = &self.items[self.filtered[i]];
            let row = self
                .materializer
                .materialize(i, item, &mut self.scheduler, now);
            self.rows.insert(i, row);
        }

        self.range = desired;

        if !self.invariant_holds() {
            debug_assert!(false, "materialized set diverged from viewport range");
            // Self-heal in production: rebuild the window from scratch
            // rather than letting the drift accumulate.
            eprintln!("picalog: materialized-row invariant violated, rebuilding window");
            self.teardown_rows();
            for i in desired.0..desired.1.min(self.filtered.len()) {
                let item = &self.items[self.filtered[i]];
                let row = self
                    .materializer
                    .materialize(i, item, &mut self.scheduler, now);
                self.rows.insert(i, row);
            }
        }
    }

    fn invariant_holds(&self) -> bool {
        let expected = self.range.0..self.range.1.min(self.filtered.len());
        self.rows.len() == expected.len() && expected.clone().all(|i| self.rows.contains_key(&i))
    }

    fn teardown_rows(&mut self) {
        let indices: Vec<usize> = self.rows.keys().copied().collect();
        for i in indices {
            if let Some(row) = self.rows.remove(&i) {
                self.materializer
                    .dematerialize(row, &mut self.scheduler, &mut self.loader);
            }
        }
    }

    // --- Input -------------------------------------------------------------

    /// Click dispatch, resolved by index at event time (the host hit-tests
    /// row rectangles; nothing here captures indices in closures).
    pub fn handle_click(&mut self, index: usize, kind: ClickKind) {
        self.selection.click(index, kind, self.filtered.len());
    }

    pub fn handle_double_click(&mut self, index: usize) {
        if index >= self.filtered.len() {
            return;
        }
        if let Some(f) = &mut self.on_item_activated {
            f(index);
        }
    }

    // --- Accessors -----------------------------------------------------------

    /// Selected items resolved through the current filtered sequence;
    /// indices that no longer fit are dropped, never a panic.
    pub fn get_selected_items(&self) -> Vec<ItemRecord> {
        self.selection
            .indices()
            .into_iter()
            .filter_map(|i| self.filtered.get(i))
            .filter_map(|&idx| self.items.get(idx).cloned())
            .collect()
    }

    pub fn item(&self, filtered_index: usize) -> Option<&ItemRecord> {
        self.filtered
            .get(filtered_index)
            .and_then(|&idx| self.items.get(idx))
    }

    pub fn filtered_len(&self) -> usize {
        self.filtered.len()
    }

    pub fn total_len(&self) -> usize {
        self.items.len()
    }

    pub fn total_height(&self) -> f32 {
        self.filtered.len() as f32 * self.cfg.row_height
    }

    pub fn row_height(&self) -> f32 {
        self.cfg.row_height
    }

    pub fn range(&self) -> (usize, usize) {
        self.range
    }

    pub fn rows(&self) -> impl Iterator<Item = &RowState> {
        self.rows.values()
    }

    pub fn row(&self, index: usize) -> Option<&RowState> {
        self.rows.get(&index)
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.scheduler.next_deadline()
    }

    #[cfg(test)]
    fn scheduler_len(&self) -> usize {
        self.scheduler.len()
    }
}
