//! Derives the navigable queue from the catalog.
//!
//! A queue is an ordered list of catalog indices. It is rebuilt from scratch
//! whenever the search text, sort settings, collapsed artists or favorites
//! change, so it can never hold an index outside the catalog.

use crate::catalog::Catalog;
use crate::favorites::FavoritesStore;
use crate::model::{SortMode, SortOrder, Track};
use std::cmp::Ordering;
use std::collections::BTreeSet;
use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueueQuery {
    pub search: String,
    pub sort_mode: SortMode,
    pub sort_order: SortOrder,
    pub favorites_only: bool,
    pub collapsed_artists: BTreeSet<String>,
}

impl QueueQuery {
    pub fn toggle_collapsed(&mut self, artist: &str) -> bool {
        if self.collapsed_artists.remove(artist) {
            false
        } else {
            self.collapsed_artists.insert(artist.to_string());
            true
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueueRow {
    ArtistHeader {
        artist: String,
        collapsed: bool,
        track_count: usize,
    },
    Track(usize),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueueView {
    pub indices: Vec<usize>,
    pub rows: Vec<QueueRow>,
}

impl QueueView {
    fn flat(indices: Vec<usize>) -> Self {
        let rows = indices.iter().copied().map(QueueRow::Track).collect();
        Self { indices, rows }
    }

    pub fn position_of(&self, catalog_index: usize) -> Option<usize> {
        self.indices.iter().position(|idx| *idx == catalog_index)
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }
}

pub fn build_queue(catalog: &Catalog, query: &QueueQuery, favorites: &FavoritesStore) -> QueueView {
    if query.favorites_only {
        return QueueView::flat(favorites_queue(catalog, favorites));
    }

    let needle = query.search.to_lowercase();
    let matching: Vec<usize> = catalog
        .tracks()
        .iter()
        .enumerate()
        .filter(|(_, track)| matches_search(track, &needle))
        .map(|(idx, _)| idx)
        .collect();

    match query.sort_mode {
        SortMode::Title => {
            let mut indices = matching;
            let tracks = catalog.tracks();
            indices.sort_by(|a, b| {
                compare_tracks(&tracks[*a], &tracks[*b], SortMode::Title, query.sort_order)
            });
            QueueView::flat(indices)
        }
        SortMode::Artist => grouped_by_artist(catalog, matching, query),
    }
}

/// Catalog-order subsequence of favorited tracks. Independent of search and
/// sort settings.
pub fn favorites_queue(catalog: &Catalog, favorites: &FavoritesStore) -> Vec<usize> {
    catalog
        .tracks()
        .iter()
        .enumerate()
        .filter(|(_, track)| favorites.is_favorite(track))
        .map(|(idx, _)| idx)
        .collect()
}

/// `needle` must already be lowercased. An empty needle matches everything.
pub fn matches_search(track: &Track, needle: &str) -> bool {
    needle.is_empty()
        || track.title.to_lowercase().contains(needle)
        || track.artist.to_lowercase().contains(needle)
}

fn grouped_by_artist(catalog: &Catalog, matching: Vec<usize>, query: &QueueQuery) -> QueueView {
    let tracks = catalog.tracks();
    let mut buckets: Vec<(String, Vec<usize>)> = Vec::new();
    for idx in matching {
        let artist = &tracks[idx].artist;
        match buckets.iter_mut().find(|(name, _)| name == artist) {
            Some((_, members)) => members.push(idx),
            None => buckets.push((artist.clone(), vec![idx])),
        }
    }

    buckets.sort_by(|(a, _), (b, _)| apply_order(collate(a, b), query.sort_order));

    let mut view = QueueView::default();
    for (artist, mut members) in buckets {
        members.sort_by(|a, b| {
            apply_order(collate(&tracks[*a].title, &tracks[*b].title), query.sort_order)
        });
        let collapsed = query.collapsed_artists.contains(&artist);
        view.rows.push(QueueRow::ArtistHeader {
            artist,
            collapsed,
            track_count: members.len(),
        });
        if collapsed {
            continue;
        }
        for idx in members {
            view.indices.push(idx);
            view.rows.push(QueueRow::Track(idx));
        }
    }
    view
}

/// Full ordering used for both catalog sorting and queue ordering. The primary
/// key comes from `mode`, the other field breaks ties and the id settles
/// records sharing a key, so reversing `order` reverses the result exactly.
pub fn compare_tracks(a: &Track, b: &Track, mode: SortMode, order: SortOrder) -> Ordering {
    let ordering = match mode {
        SortMode::Title => collate(&a.title, &b.title).then_with(|| collate(&a.artist, &b.artist)),
        SortMode::Artist => collate(&a.artist, &b.artist).then_with(|| collate(&a.title, &b.title)),
    };
    apply_order(ordering.then_with(|| a.id.cmp(&b.id)), order)
}

fn apply_order(ordering: Ordering, order: SortOrder) -> Ordering {
    match order {
        SortOrder::Asc => ordering,
        SortOrder::Desc => ordering.reverse(),
    }
}

/// Locale-aware-ish comparison: accents and case are ignored first, then the
/// raw strings decide so the ordering stays total.
pub fn collate(a: &str, b: &str) -> Ordering {
    fold(a).cmp(&fold(b)).then_with(|| a.cmp(b))
}

fn fold(value: &str) -> String {
    value
        .nfkd()
        .filter(|ch| !is_combining_mark(*ch))
        .flat_map(char::to_lowercase)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn track(id: u64, title: &str, artist: &str) -> Track {
        Track {
            id,
            title: title.to_string(),
            artist: artist.to_string(),
            src: format!("{id}.mp3"),
            cover: format!("{id}.jpg"),
            album: None,
        }
    }

    fn sample_catalog() -> Catalog {
        Catalog::from_tracks(vec![
            track(1, "Song1", "Artist1"),
            track(2, "Song2", "Artist2"),
            track(3, "Song3", "Artist1"),
        ])
    }

    #[test]
    fn title_ascending_keeps_natural_order() {
        let catalog = sample_catalog();
        let view = build_queue(&catalog, &QueueQuery::default(), &FavoritesStore::new());
        assert_eq!(view.indices, vec![0, 1, 2]);
    }

    #[test]
    fn title_descending_reverses() {
        let catalog = sample_catalog();
        let query = QueueQuery {
            sort_order: SortOrder::Desc,
            ..QueueQuery::default()
        };
        let view = build_queue(&catalog, &query, &FavoritesStore::new());
        assert_eq!(view.indices, vec![2, 1, 0]);
    }

    #[test]
    fn search_is_case_insensitive_on_title_or_artist() {
        let catalog = sample_catalog();
        let query = QueueQuery {
            search: String::from("ARTIST1"),
            ..QueueQuery::default()
        };
        let view = build_queue(&catalog, &query, &FavoritesStore::new());
        assert_eq!(view.indices, vec![0, 2]);

        let query = QueueQuery {
            search: String::from("song2"),
            ..QueueQuery::default()
        };
        let view = build_queue(&catalog, &query, &FavoritesStore::new());
        assert_eq!(view.indices, vec![1]);
    }

    #[test]
    fn whitespace_search_is_a_literal_substring() {
        let mut catalog = sample_catalog();
        let query = QueueQuery {
            search: String::from(" "),
            ..QueueQuery::default()
        };
        assert!(build_queue(&catalog, &query, &FavoritesStore::new()).is_empty());

        catalog = Catalog::from_tracks(vec![
            track(1, "Song1", "Artist1"),
            track(2, "Slow Song", "Artist2"),
        ]);
        let view = build_queue(&catalog, &query, &FavoritesStore::new());
        assert_eq!(view.indices, vec![1]);
    }

    #[test]
    fn shared_key_records_order_by_id() {
        let a = track(1, "Song1", "Artist1");
        let b = track(2, "Song1", "Artist1");
        assert_eq!(compare_tracks(&a, &b, SortMode::Title, SortOrder::Asc), Ordering::Less);
        assert_eq!(compare_tracks(&a, &b, SortMode::Title, SortOrder::Desc), Ordering::Greater);
    }

    #[test]
    fn artist_mode_groups_under_headers() {
        let catalog = sample_catalog();
        let query = QueueQuery {
            sort_mode: SortMode::Artist,
            search: String::from("artist1"),
            ..QueueQuery::default()
        };
        let view = build_queue(&catalog, &query, &FavoritesStore::new());

        assert_eq!(view.indices, vec![0, 2]);
        assert_eq!(
            view.rows,
            vec![
                QueueRow::ArtistHeader {
                    artist: String::from("Artist1"),
                    collapsed: false,
                    track_count: 2,
                },
                QueueRow::Track(0),
                QueueRow::Track(2),
            ]
        );
    }

    #[test]
    fn collapsed_artist_keeps_header_but_drops_tracks() {
        let catalog = sample_catalog();
        let mut query = QueueQuery {
            sort_mode: SortMode::Artist,
            ..QueueQuery::default()
        };
        assert!(query.toggle_collapsed("Artist1"));
        let view = build_queue(&catalog, &query, &FavoritesStore::new());

        assert_eq!(view.indices, vec![1]);
        assert_eq!(view.rows.len(), 3);
        assert!(matches!(
            &view.rows[0],
            QueueRow::ArtistHeader { artist, collapsed: true, .. } if artist == "Artist1"
        ));
    }

    #[test]
    fn artist_buckets_follow_sort_order() {
        let catalog = sample_catalog();
        let query = QueueQuery {
            sort_mode: SortMode::Artist,
            sort_order: SortOrder::Desc,
            ..QueueQuery::default()
        };
        let view = build_queue(&catalog, &query, &FavoritesStore::new());
        assert_eq!(view.indices, vec![1, 2, 0]);
    }

    #[test]
    fn favorites_only_ignores_search_and_sort() {
        let catalog = sample_catalog();
        let mut favorites = FavoritesStore::new();
        favorites.toggle(&catalog.tracks()[2]);
        favorites.toggle(&catalog.tracks()[1]);
        let query = QueueQuery {
            favorites_only: true,
            search: String::from("nothing matches"),
            sort_order: SortOrder::Desc,
            ..QueueQuery::default()
        };
        let view = build_queue(&catalog, &query, &favorites);
        assert_eq!(view.indices, vec![1, 2]);
    }

    #[test]
    fn empty_catalog_gives_empty_queue() {
        let view = build_queue(
            &Catalog::default(),
            &QueueQuery::default(),
            &FavoritesStore::new(),
        );
        assert!(view.is_empty());
        assert!(view.rows.is_empty());
    }

    #[test]
    fn collation_ignores_case_and_accents() {
        assert_ne!(collate("émile", "Emile"), Ordering::Equal);
        assert_eq!(collate("émile", "Zed"), Ordering::Less);
        assert_eq!(collate("alpha", "Beta"), Ordering::Less);
        assert_eq!(collate("Beta", "alpha"), Ordering::Greater);
    }

    fn arb_tracks() -> impl Strategy<Value = Vec<Track>> {
        proptest::collection::vec(("[abéB]{0,3}", "[xyÉ]{0,2}"), 0..12).prop_map(|pairs| {
            pairs
                .into_iter()
                .enumerate()
                .map(|(n, (title, artist))| track(n as u64, &title, &artist))
                .collect()
        })
    }

    fn sort_mode(artist: bool) -> SortMode {
        if artist { SortMode::Artist } else { SortMode::Title }
    }

    proptest! {
        #[test]
        fn descending_catalog_is_ascending_reversed(tracks in arb_tracks(), artist in any::<bool>()) {
            let mode = sort_mode(artist);
            let mut asc = Catalog::from_tracks(tracks.clone());
            asc.sort(mode, SortOrder::Asc);
            let mut desc = Catalog::from_tracks(tracks);
            desc.sort(mode, SortOrder::Desc);

            let mut expected: Vec<u64> = asc.tracks().iter().map(|t| t.id).collect();
            expected.reverse();
            let actual: Vec<u64> = desc.tracks().iter().map(|t| t.id).collect();
            prop_assert_eq!(actual, expected);
        }

        #[test]
        fn title_queue_reverses_with_order(tracks in arb_tracks(), search in "[abx]?") {
            let catalog = Catalog::from_tracks(tracks);
            let asc = QueueQuery { search: search.clone(), ..QueueQuery::default() };
            let desc = QueueQuery { search, sort_order: SortOrder::Desc, ..QueueQuery::default() };

            let mut expected = build_queue(&catalog, &asc, &FavoritesStore::new()).indices;
            expected.reverse();
            let actual = build_queue(&catalog, &desc, &FavoritesStore::new()).indices;
            prop_assert_eq!(actual, expected);
        }

        #[test]
        fn queue_only_holds_matching_catalog_indices(tracks in arb_tracks(), search in "[abéx]?") {
            let catalog = Catalog::from_tracks(tracks);
            let query = QueueQuery { search: search.clone(), ..QueueQuery::default() };
            let view = build_queue(&catalog, &query, &FavoritesStore::new());
            let needle = search.to_lowercase();

            prop_assert!(view.indices.iter().all(|idx| *idx < catalog.len()));
            let expected = catalog.tracks().iter().filter(|t| matches_search(t, &needle)).count();
            prop_assert_eq!(view.indices.len(), expected);
        }
    }
}
