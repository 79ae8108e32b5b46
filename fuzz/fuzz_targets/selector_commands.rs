#![no_main]

use libfuzzer_sys::fuzz_target;
use tunewidget::catalog::Catalog;
use tunewidget::core::WidgetCore;
use tunewidget::model::{Preferences, SortMode, Track};
use tunewidget::storage::MemoryStore;

fuzz_target!(|data: &[u8]| {
    let len = data.first().map_or(0, |byte| usize::from(*byte % 12));
    let tracks = (0..len)
        .map(|idx| Track {
            id: idx as u64,
            title: format!("Song{}", (idx * 7) % 5),
            artist: format!("Artist{}", idx % 3),
            src: format!("track_{idx}.mp3"),
            cover: format!("track_{idx}.jpg"),
            album: None,
        })
        .collect();
    let mut core = WidgetCore::new(
        Catalog::from_tracks(tracks),
        &Preferences::default(),
        Box::new(MemoryStore::default()),
    );

    for byte in data.iter().skip(1) {
        let arg = usize::from(byte >> 4);
        match byte % 10 {
            0 => {
                core.next();
            }
            1 => {
                core.previous();
            }
            2 => {
                core.select_track(arg);
            }
            3 => {
                core.toggle_favorite(arg);
            }
            4 => core.set_favorites_only(!core.query().favorites_only),
            5 => core.toggle_sort_order(),
            6 => core.set_sort_mode(if arg % 2 == 0 {
                SortMode::Title
            } else {
                SortMode::Artist
            }),
            7 => core.set_search(&format!("{}", arg % 4)),
            8 => {
                core.activate_row(arg);
            }
            _ => core.set_search(""),
        }
        assert!(core.is_consistent());
        if let Some(current) = core.current_index() {
            assert!(current < core.catalog().len());
        }
    }
});
