use crate::catalog::Catalog;
use crate::config;
use crate::favorites::FavoritesStore;
use crate::model::{Preferences, SelectorMode, SortMode, Track, TrackKey};
use crate::queue::{self, QueueQuery, QueueRow, QueueView};
use crate::selector::{Queues, SelectorState};
use crate::storage::KeyValueStore;
use tracing::{debug, warn};

/// Session state for the widget: the catalog, favorites, the active query,
/// the derived queues and the selector. Every mutation goes through here so
/// the queues and the selector never drift apart.
pub struct WidgetCore {
    catalog: Catalog,
    favorites: FavoritesStore,
    query: QueueQuery,
    view: QueueView,
    normal_queue: Vec<usize>,
    favorites_queue: Vec<usize>,
    selector: SelectorState,
    store: Box<dyn KeyValueStore>,
    pub status: String,
    pub dirty: bool,
}

impl WidgetCore {
    pub fn new(mut catalog: Catalog, prefs: &Preferences, store: Box<dyn KeyValueStore>) -> Self {
        catalog.sort(prefs.sort_mode, prefs.sort_order);
        let mut core = Self {
            catalog,
            favorites: FavoritesStore::from_keys(prefs.favorites.iter().cloned()),
            query: QueueQuery {
                sort_mode: prefs.sort_mode,
                sort_order: prefs.sort_order,
                ..QueueQuery::default()
            },
            view: QueueView::default(),
            normal_queue: Vec::new(),
            favorites_queue: Vec::new(),
            selector: SelectorState::new(),
            store,
            status: String::from("Ready"),
            dirty: true,
        };
        core.rebuild_queues();
        core
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn favorites(&self) -> &FavoritesStore {
        &self.favorites
    }

    pub fn query(&self) -> &QueueQuery {
        &self.query
    }

    /// Rows currently shown in the playlist overlay.
    pub fn view(&self) -> &QueueView {
        &self.view
    }

    pub fn normal_queue(&self) -> &[usize] {
        &self.normal_queue
    }

    pub fn favorites_queue(&self) -> &[usize] {
        &self.favorites_queue
    }

    pub fn selector(&self) -> &SelectorState {
        &self.selector
    }

    pub fn current_index(&self) -> Option<usize> {
        self.selector.current()
    }

    pub fn current_track(&self) -> Option<&Track> {
        self.selector
            .current()
            .and_then(|idx| self.catalog.get(idx))
    }

    pub fn current_key(&self) -> Option<TrackKey> {
        self.current_track().map(Track::key)
    }

    pub fn active_queue(&self) -> &[usize] {
        self.queues().active(self.selector.mode())
    }

    /// Picks the first catalog track when nothing is current yet.
    pub fn select_initial(&mut self) -> Option<usize> {
        if self.selector.current().is_some() {
            return self.selector.current();
        }
        self.select_track(0)
    }

    /// Selects from whichever list is on screen: the favorites view selects in
    /// favorites mode, everything else in normal mode.
    pub fn select_track(&mut self, catalog_index: usize) -> Option<usize> {
        let mode = if self.query.favorites_only {
            SelectorMode::Favorites
        } else {
            SelectorMode::Normal
        };
        self.select_track_in(catalog_index, mode)
    }

    pub fn select_track_in(&mut self, catalog_index: usize, mode: SelectorMode) -> Option<usize> {
        let queues = Queues {
            normal: &self.normal_queue,
            favorites: &self.favorites_queue,
        };
        let selected = self
            .selector
            .select_track(self.catalog.len(), catalog_index, mode, queues);
        if selected.is_none() {
            self.set_status("Track not found");
        } else {
            self.dirty = true;
        }
        selected
    }

    pub fn select_by_key(&mut self, key: &TrackKey) -> Option<usize> {
        let idx = self.catalog.position_of(key)?;
        self.select_track(idx)
    }

    /// Activates a row of the overlay: tracks are selected, artist headers
    /// collapse or expand.
    pub fn activate_row(&mut self, row: usize) -> Option<usize> {
        match self.view.rows.get(row).cloned()? {
            QueueRow::Track(idx) => self.select_track(idx),
            QueueRow::ArtistHeader { artist, .. } => {
                self.toggle_collapsed(&artist);
                None
            }
        }
    }

    pub fn next(&mut self) -> Option<usize> {
        let queues = Queues {
            normal: &self.normal_queue,
            favorites: &self.favorites_queue,
        };
        let landed = self.selector.next(queues);
        self.dirty = true;
        landed
    }

    pub fn previous(&mut self) -> Option<usize> {
        let queues = Queues {
            normal: &self.normal_queue,
            favorites: &self.favorites_queue,
        };
        let landed = self.selector.previous(queues);
        self.dirty = true;
        landed
    }

    pub fn set_search(&mut self, text: &str) {
        if self.query.search == text {
            return;
        }
        self.query.search = text.to_string();
        self.rebuild_queues();
    }

    pub fn set_sort_mode(&mut self, mode: SortMode) {
        if self.query.sort_mode == mode {
            return;
        }
        self.query.sort_mode = mode;
        self.apply_sort();
        self.set_status(&format!("Sorted by {}", mode.as_str()));
    }

    pub fn toggle_sort_order(&mut self) {
        self.query.sort_order = self.query.sort_order.toggle();
        self.apply_sort();
        self.set_status(&format!("Order {}", self.query.sort_order.label()));
    }

    pub fn toggle_collapsed(&mut self, artist: &str) {
        let collapsed = self.query.toggle_collapsed(artist);
        debug!(artist, collapsed, "artist group toggled");
        self.rebuild_queues();
    }

    pub fn set_favorites_only(&mut self, enabled: bool) {
        if self.query.favorites_only == enabled {
            return;
        }
        self.query.favorites_only = enabled;
        self.rebuild_queues();
        self.set_status(if enabled {
            "Showing favorites"
        } else {
            "Showing playlist"
        });
    }

    /// Flips favorite membership and returns the new state.
    pub fn toggle_favorite(&mut self, catalog_index: usize) -> Option<bool> {
        let track = self.catalog.get(catalog_index)?;
        let now_favorite = self.favorites.toggle(track);
        if let Err(err) = self.favorites.persist(&mut *self.store) {
            warn!("failed to persist favorites: {err:#}");
        }
        self.rebuild_queues();
        self.set_status(if now_favorite {
            "Added to favorites"
        } else {
            "Removed from favorites"
        });
        Some(now_favorite)
    }

    pub fn toggle_current_favorite(&mut self) -> Option<bool> {
        let idx = self.selector.current()?;
        self.toggle_favorite(idx)
    }

    pub fn is_favorite(&self, catalog_index: usize) -> bool {
        self.catalog
            .get(catalog_index)
            .is_some_and(|track| self.favorites.is_favorite(track))
    }

    pub fn persist_volume(&mut self, volume: f32) {
        if let Err(err) = config::save_volume(&mut *self.store, volume) {
            warn!("failed to persist volume: {err:#}");
        }
    }

    pub fn store(&self) -> &dyn KeyValueStore {
        &*self.store
    }

    pub fn is_consistent(&self) -> bool {
        self.selector.is_consistent(self.queues())
    }

    fn queues(&self) -> Queues<'_> {
        Queues {
            normal: &self.normal_queue,
            favorites: &self.favorites_queue,
        }
    }

    fn apply_sort(&mut self) {
        let key = self.current_key();
        self.catalog.sort(self.query.sort_mode, self.query.sort_order);
        let relocated = key.as_ref().and_then(|key| self.catalog.position_of(key));
        self.selector.relocate(relocated);
        if let Err(err) =
            config::save_sort(&mut *self.store, self.query.sort_mode, self.query.sort_order)
        {
            warn!("failed to persist sort preferences: {err:#}");
        }
        self.rebuild_queues();
    }

    fn rebuild_queues(&mut self) {
        self.view = queue::build_queue(&self.catalog, &self.query, &self.favorites);
        self.favorites_queue = queue::favorites_queue(&self.catalog, &self.favorites);
        self.normal_queue = if self.query.favorites_only {
            let normal_query = QueueQuery {
                favorites_only: false,
                ..self.query.clone()
            };
            queue::build_queue(&self.catalog, &normal_query, &self.favorites).indices
        } else {
            self.view.indices.clone()
        };
        self.selector.resync(Queues {
            normal: &self.normal_queue,
            favorites: &self.favorites_queue,
        });
        self.dirty = true;
    }

    fn set_status(&mut self, message: &str) {
        self.status = message.to_string();
        self.dirty = true;
    }
}
