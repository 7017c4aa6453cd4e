use eframe::egui;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::ItemRecord;
use crate::debounce::{DebounceScheduler, Token};
use crate::thumbs::{ThumbKey, ThumbnailLoader};
use crate::virtual_list::{DebounceKey, ListCommand};

/// Thumbnail lifecycle of one materialized row.
///
/// `Queued` means the debounce window is still open; `Pending` means the
/// decode request went out. A `Failed` row is never retried while it stays
/// materialized; scrolling it out and back in starts over from `Queued`.
pub enum ThumbState {
    Disabled,
    Queued,
    Pending,
    Loaded(Arc<egui::ColorImage>),
    Failed,
}

/// Retained state for one visible row. Rows are created and destroyed as the
/// viewport moves. Input events are not bound here: the GUI hit-tests row
/// rectangles and dispatches by index at event time, so there are no per-row
/// closures that could capture a stale index.
pub struct RowState {
    /// Position in the filtered sequence at materialization time. The
    /// orchestrator never moves a row to a different index; it destroys and
    /// recreates instead.
    pub index: usize,
    pub display_name: String,
    pub path: Option<PathBuf>,
    pub thumb: ThumbState,
    pub thumb_token: Option<Token>,
}

impl RowState {
    pub fn thumb_key(&self, size: (u32, u32)) -> Option<ThumbKey> {
        self.path.as_ref().map(|p| (p.clone(), size))
    }
}

/// Creates and destroys row state, including the debounced thumbnail
/// request tied to each row instance.
pub struct RowMaterializer {
    pub thumb_size: (u32, u32),
    pub thumb_delay: Duration,
}

impl RowMaterializer {
    pub fn materialize(
        &self,
        index: usize,
        item: &ItemRecord,
        scheduler: &mut DebounceScheduler<DebounceKey, ListCommand>,
        now: Instant,
    ) -> RowState {
        let mut row = RowState {
            index,
            display_name: item.display_name.clone(),
            path: item.resolved_path.clone(),
            thumb: ThumbState::Disabled,
            thumb_token: None,
        };

        if item.thumbnails_enabled && row.path.is_some() {
            // Delay the actual decode request so rows that immediately
            // scroll back out never hit the worker pool.
            let token = scheduler.schedule(
                DebounceKey::Row(index),
                self.thumb_delay,
                ListCommand::LoadThumb(index),
                now,
            );
            row.thumb = ThumbState::Queued;
            row.thumb_token = Some(token);
        }
        row
    }

    /// Tear a row down: cancel its pending debounce token and withdraw
    /// loader interest so an in-flight decode cannot target the dead row.
    /// This is the leak-prevention contract; every row removed from the
    /// materialized map must pass through here.
    pub fn dematerialize(
        &self,
        row: RowState,
        scheduler: &mut DebounceScheduler<DebounceKey, ListCommand>,
        loader: &mut ThumbnailLoader,
    ) {
        if let Some(token) = row.thumb_token {
            scheduler.cancel(token);
        }
        if matches!(row.thumb, ThumbState::Queued | ThumbState::Pending)
            && let Some(key) = row.thumb_key(self.thumb_size)
        {
            loader.release(&key);
        }
    }
}
