use anyhow::{Result, bail};
use image::{Rgb, RgbImage};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::path::Path;
use std::rc::Rc;
use std::thread;
use std::time::{Duration, Instant};
use tempfile::tempdir;
use tunewidget::artwork::ArtworkWorker;
use tunewidget::audio::Transport;
use tunewidget::catalog::Catalog;
use tunewidget::core::WidgetCore;
use tunewidget::model::{Preferences, Track};
use tunewidget::player::{Player, PlayerOptions, TrackListener};
use tunewidget::session::{RemoteAction, SessionMetadata, SessionPublisher};
use tunewidget::storage::MemoryStore;

#[derive(Default)]
struct TransportLog {
    loads: Vec<String>,
    seeks: Vec<Duration>,
    plays: usize,
    reject_play: bool,
    ended: bool,
}

struct ScriptedTransport {
    log: Rc<RefCell<TransportLog>>,
    source: Option<String>,
    paused: bool,
    volume: f32,
}

impl Transport for ScriptedTransport {
    fn set_source(&mut self, locator: &str) -> Result<()> {
        self.log.borrow_mut().loads.push(locator.to_string());
        self.log.borrow_mut().ended = false;
        self.source = Some(locator.to_string());
        self.paused = true;
        Ok(())
    }

    fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }

    fn play(&mut self) -> Result<()> {
        let mut log = self.log.borrow_mut();
        log.plays += 1;
        if log.reject_play {
            bail!("NotAllowedError");
        }
        self.paused = false;
        Ok(())
    }

    fn pause(&mut self) {
        self.paused = true;
    }

    fn is_paused(&self) -> bool {
        self.paused
    }

    fn seek(&mut self, position: Duration) -> Result<()> {
        self.log.borrow_mut().seeks.push(position);
        Ok(())
    }

    fn current_time(&self) -> Option<Duration> {
        self.source.as_ref().map(|_| Duration::ZERO)
    }

    fn duration(&self) -> Option<Duration> {
        None
    }

    fn volume(&self) -> f32 {
        self.volume
    }

    fn set_volume(&mut self, volume: f32) {
        self.volume = volume;
    }

    fn is_ended(&self) -> bool {
        !self.paused && self.log.borrow().ended
    }
}

#[derive(Default)]
struct SessionLog {
    published: Vec<SessionMetadata>,
    binds: usize,
    pending: VecDeque<RemoteAction>,
    playing: Vec<bool>,
}

struct ScriptedSession(Rc<RefCell<SessionLog>>);

impl SessionPublisher for ScriptedSession {
    fn publish(&mut self, metadata: &SessionMetadata) -> Result<()> {
        self.0.borrow_mut().published.push(metadata.clone());
        Ok(())
    }

    fn bind_actions(&mut self, actions: &[RemoteAction]) {
        assert_eq!(actions.len(), 4);
        self.0.borrow_mut().binds += 1;
    }

    fn poll_action(&mut self) -> Option<RemoteAction> {
        self.0.borrow_mut().pending.pop_front()
    }

    fn set_playing(&mut self, playing: bool) {
        self.0.borrow_mut().playing.push(playing);
    }
}

struct ChangeLog(Rc<RefCell<Vec<String>>>);

impl TrackListener for ChangeLog {
    fn on_track_changed(&mut self, _catalog_index: usize, track: &Track) {
        self.0.borrow_mut().push(track.title.clone());
    }
}

struct Harness {
    player: Player,
    transport: Rc<RefCell<TransportLog>>,
    session: Rc<RefCell<SessionLog>>,
    changes: Rc<RefCell<Vec<String>>>,
}

fn track(id: u64, title: &str, artist: &str, cover: &str) -> Track {
    Track {
        id,
        title: title.to_string(),
        artist: artist.to_string(),
        src: format!("{id}.mp3"),
        cover: cover.to_string(),
        album: None,
    }
}

fn harness(tracks: Vec<Track>, gesture_gate: bool, artwork: Option<ArtworkWorker>) -> Harness {
    let transport = Rc::new(RefCell::new(TransportLog::default()));
    let session = Rc::new(RefCell::new(SessionLog::default()));
    let changes = Rc::new(RefCell::new(Vec::new()));
    let core = WidgetCore::new(
        Catalog::from_tracks(tracks),
        &Preferences::default(),
        Box::new(MemoryStore::default()),
    );
    let mut player = Player::new(
        core,
        Box::new(ScriptedTransport {
            log: Rc::clone(&transport),
            source: None,
            paused: true,
            volume: 1.0,
        }),
        Box::new(ScriptedSession(Rc::clone(&session))),
        artwork,
        PlayerOptions {
            gesture_gate,
            volume: 0.7,
        },
    );
    player.subscribe(Box::new(ChangeLog(Rc::clone(&changes))));
    Harness {
        player,
        transport,
        session,
        changes,
    }
}

fn sample(gesture_gate: bool) -> Harness {
    harness(
        vec![
            track(1, "Song1", "Artist1", "a.jpg"),
            track(2, "Song2", "Artist2", "b.png"),
            track(3, "Song3", "Artist1", "c.jpg"),
        ],
        gesture_gate,
        None,
    )
}

#[test]
fn every_track_change_loads_publishes_and_notifies() {
    let mut h = sample(false);
    h.player.select_track(1);
    h.player.next();
    h.player.previous();

    assert_eq!(h.transport.borrow().loads, vec!["2.mp3", "3.mp3", "2.mp3"]);
    assert_eq!(*h.changes.borrow(), vec!["Song2", "Song3", "Song2"]);
    let session = h.session.borrow();
    assert_eq!(session.published.len(), 3);
    assert_eq!(session.binds, 3);
    assert_eq!(session.published[1].title, "Song3");
    assert_eq!(session.published[1].album, "Music Widget");
    assert_eq!(session.published[0].artwork[0].mime, "image/png");
}

#[test]
fn reselecting_current_track_restarts_without_reload() {
    let mut h = sample(false);
    h.player.select_track(0);
    h.player.select_track(0);

    assert_eq!(h.transport.borrow().loads, vec!["1.mp3"]);
    assert_eq!(h.transport.borrow().seeks, vec![Duration::ZERO]);
    assert_eq!(h.changes.borrow().len(), 1);
    assert!(h.player.is_playing());
}

#[test]
fn rejected_play_is_swallowed_and_does_not_arm_gate() {
    let mut h = sample(true);
    h.transport.borrow_mut().reject_play = true;

    assert!(!h.player.play_local());
    assert_eq!(h.transport.borrow().plays, 1);
    assert!(!h.player.is_playing());
    assert!(!h.player.gate().has_interacted());
    assert!(!h.player.volume().is_enabled());

    h.session.borrow_mut().pending.push_back(RemoteAction::Next);
    h.player.tick();
    assert_eq!(h.player.core().current_index(), Some(0));

    h.transport.borrow_mut().reject_play = false;
    assert!(h.player.play_local());
    assert!(h.player.gate().has_interacted());

    h.session.borrow_mut().pending.push_back(RemoteAction::Next);
    h.player.tick();
    assert_eq!(h.player.core().current_index(), Some(1));
}

#[test]
fn remote_play_and_pause_bypass_the_gate() {
    let mut h = sample(true);
    h.player.load_initial();

    h.session.borrow_mut().pending.push_back(RemoteAction::Play);
    h.player.tick();
    assert!(h.player.is_playing());
    assert!(!h.player.gate().has_interacted());

    h.session.borrow_mut().pending.push_back(RemoteAction::Pause);
    h.session.borrow_mut().pending.push_back(RemoteAction::Previous);
    h.player.tick();
    assert!(!h.player.is_playing());
    assert_eq!(h.player.core().current_index(), Some(0));
}

#[test]
fn ended_advances_and_pauses_on_empty_queue() {
    let mut h = sample(false);
    h.player.select_track(2);
    h.transport.borrow_mut().ended = true;
    h.player.tick();
    assert_eq!(h.player.core().current_index(), Some(0));
    assert!(h.player.is_playing());

    let mut empty = harness(Vec::new(), false, None);
    empty.player.play_local();
    empty.player.tick();
    assert!(!empty.player.is_playing());
    assert!(empty.changes.borrow().is_empty());
}

#[test]
fn host_session_follows_play_and_pause() {
    let mut h = sample(false);
    h.player.load_initial();
    assert_eq!(h.session.borrow().playing.last(), Some(&false));

    h.player.select_track(1);
    assert_eq!(h.session.borrow().playing.last(), Some(&true));

    h.player.pause();
    assert_eq!(h.session.borrow().playing.last(), Some(&false));

    h.transport.borrow_mut().reject_play = true;
    h.player.play_local();
    assert_eq!(h.session.borrow().playing.last(), Some(&false));
}

#[test]
fn favorites_toggle_does_not_change_track() {
    let mut h = sample(false);
    h.player.select_track(1);
    h.player.core_mut().toggle_favorite(1);
    h.player.core_mut().set_favorites_only(true);
    h.player.core_mut().set_search("zzz");
    assert_eq!(h.player.core().current_index(), Some(1));
    assert_eq!(h.changes.borrow().len(), 1);
}

fn write_cover(path: &Path) {
    RgbImage::from_pixel(120, 60, Rgb([10, 200, 30]))
        .save(path)
        .expect("write cover");
}

fn pump_until(h: &mut Harness, published: usize) {
    let deadline = Instant::now() + Duration::from_secs(10);
    while h.session.borrow().published.len() < published {
        assert!(Instant::now() < deadline, "artwork never republished");
        h.player.tick();
        thread::sleep(Duration::from_millis(5));
    }
}

#[test]
fn cropped_artwork_republishes_only_for_current_track() {
    let dir = tempdir().expect("tempdir");
    let first = dir.path().join("first.png");
    let second = dir.path().join("second.png");
    write_cover(&first);
    write_cover(&second);
    let cache = dir.path().join("cache");

    let mut h = harness(
        vec![
            track(1, "Song1", "Artist1", first.to_str().expect("utf8")),
            track(2, "Song2", "Artist2", second.to_str().expect("utf8")),
        ],
        false,
        Some(ArtworkWorker::spawn(cache.clone())),
    );

    h.player.select_track(0);
    h.player.select_track(1);
    assert_eq!(h.session.borrow().published.len(), 2);

    pump_until(&mut h, 3);
    thread::sleep(Duration::from_millis(50));
    h.player.tick();

    let session = h.session.borrow();
    assert_eq!(session.published.len(), 3);
    let last = &session.published[2];
    assert_eq!(last.title, "Song2");
    let src = last.artwork_src().expect("artwork");
    assert!(Path::new(src).starts_with(&cache));
    assert_eq!(last.artwork[0].mime, "image/png");
}

#[test]
fn failed_artwork_keeps_original_locator() {
    let dir = tempdir().expect("tempdir");
    let mut h = harness(
        vec![track(1, "Song1", "Artist1", "missing-cover.jpg")],
        false,
        Some(ArtworkWorker::spawn(dir.path().to_path_buf())),
    );
    h.player.load_initial();

    thread::sleep(Duration::from_millis(100));
    for _ in 0..10 {
        h.player.tick();
        thread::sleep(Duration::from_millis(10));
    }

    let session = h.session.borrow();
    assert_eq!(session.published.len(), 1);
    assert_eq!(session.published[0].artwork_src(), Some("missing-cover.jpg"));
}
