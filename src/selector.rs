//! Current-track state machine.
//!
//! `SelectorState` is the single owner of "which track is current" and "where
//! in the active queue we are". Every transition reads the state as it is right
//! now and leaves `queue[queue_position] == current` whenever the current track
//! is a member of the active queue. A current track missing from the active
//! queue is detached: it reports position 0, but the next step lands on the
//! head (or the tail, going backwards) instead of skipping past it.

use crate::model::SelectorMode;
use tracing::{debug, warn};

/// The two queues the selector can navigate. `favorites` is the catalog-order
/// favorites subsequence; `normal` is the searched/sorted queue.
#[derive(Debug, Clone, Copy)]
pub struct Queues<'a> {
    pub normal: &'a [usize],
    pub favorites: &'a [usize],
}

impl<'a> Queues<'a> {
    pub fn active(&self, mode: SelectorMode) -> &'a [usize] {
        match mode {
            SelectorMode::Normal => self.normal,
            SelectorMode::Favorites => self.favorites,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectorPhase {
    Idle,
    Normal,
    Favorites,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SelectorState {
    current: Option<usize>,
    queue_position: Option<usize>,
    mode: SelectorMode,
}

impl SelectorState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> SelectorPhase {
        match (self.current, self.mode) {
            (None, _) => SelectorPhase::Idle,
            (Some(_), SelectorMode::Normal) => SelectorPhase::Normal,
            (Some(_), SelectorMode::Favorites) => SelectorPhase::Favorites,
        }
    }

    pub fn current(&self) -> Option<usize> {
        self.current
    }

    pub fn queue_position(&self) -> usize {
        self.queue_position.unwrap_or(0)
    }

    /// A current track that is not a member of the active queue.
    pub fn is_detached(&self) -> bool {
        self.current.is_some() && self.queue_position.is_none()
    }

    pub fn mode(&self) -> SelectorMode {
        self.mode
    }

    /// Makes `catalog_index` current. Out-of-range indices are ignored.
    pub fn select_track(
        &mut self,
        catalog_len: usize,
        catalog_index: usize,
        mode: SelectorMode,
        queues: Queues<'_>,
    ) -> Option<usize> {
        if catalog_index >= catalog_len {
            debug!("select ignored: index {catalog_index} outside catalog of {catalog_len}");
            return None;
        }

        self.current = Some(catalog_index);
        self.mode = mode;
        self.queue_position = locate(queues.active(mode), catalog_index);
        Some(catalog_index)
    }

    /// Normal mode wraps around. Favorites mode advances without wrapping and
    /// falls back to the normal queue once the last favorite has been passed.
    pub fn next(&mut self, queues: Queues<'_>) -> Option<usize> {
        let active = queues.active(self.mode);
        if active.is_empty() {
            return None;
        }

        let Some(current) = self.current else {
            return self.land(active, 0);
        };
        let Some(position) = self.queue_position else {
            return self.land(active, 0);
        };

        match self.mode {
            SelectorMode::Normal => self.land(active, (position + 1) % active.len()),
            SelectorMode::Favorites => {
                if position + 1 < active.len() {
                    return self.land(active, position + 1);
                }
                debug!("end of favorites reached, resuming normal queue");
                self.mode = SelectorMode::Normal;
                if queues.normal.is_empty() {
                    self.queue_position = None;
                    return None;
                }
                self.queue_position = locate(queues.normal, current);
                self.next(queues)
            }
        }
    }

    /// Normal mode wraps around. Favorites mode clamps at the first favorite
    /// and stays in favorites mode.
    pub fn previous(&mut self, queues: Queues<'_>) -> Option<usize> {
        let active = queues.active(self.mode);
        if active.is_empty() {
            return None;
        }

        let len = active.len();
        let position = self.current.and(self.queue_position);
        let target = match (position, self.mode) {
            (None, SelectorMode::Normal) => len - 1,
            (None, SelectorMode::Favorites) => 0,
            (Some(position), SelectorMode::Normal) => (position.min(len - 1) + len - 1) % len,
            (Some(position), SelectorMode::Favorites) => position.min(len - 1).saturating_sub(1),
        };
        self.land(active, target)
    }

    /// Re-derives the queue position after the queues were rebuilt. A current
    /// track that no longer matches becomes detached.
    pub fn resync(&mut self, queues: Queues<'_>) {
        let active = queues.active(self.mode);
        self.queue_position = self
            .current
            .and_then(|current| active.iter().position(|idx| *idx == current));
    }

    /// Points the state at the current track's new catalog index after the
    /// catalog was reordered.
    pub fn relocate(&mut self, current: Option<usize>) {
        self.current = current;
        if current.is_none() {
            self.mode = SelectorMode::Normal;
            self.queue_position = None;
        }
    }

    pub fn is_consistent(&self, queues: Queues<'_>) -> bool {
        let Some(current) = self.current else {
            return true;
        };
        let active = queues.active(self.mode);
        if !active.contains(&current) {
            return true;
        }
        self.queue_position.and_then(|position| active.get(position)) == Some(&current)
    }

    fn land(&mut self, active: &[usize], position: usize) -> Option<usize> {
        let catalog_index = *active.get(position)?;
        self.queue_position = Some(position);
        self.current = Some(catalog_index);
        Some(catalog_index)
    }
}

fn locate(queue: &[usize], catalog_index: usize) -> Option<usize> {
    let position = queue.iter().position(|idx| *idx == catalog_index);
    if position.is_none() && !queue.is_empty() {
        warn!("corrected desync: track {catalog_index} is not in the active queue");
    }
    position
}
