//! Drives the transport and the media session from selector transitions.
//!
//! Every transition that lands on a different track loads its source,
//! republishes session metadata, rebinds remote handlers, queues an artwork
//! crop and notifies registered [`TrackListener`]s. Landing on the track that
//! is already loaded restarts it instead.

use crate::artwork::ArtworkWorker;
use crate::audio::Transport;
use crate::core::WidgetCore;
use crate::model::Track;
use crate::session::{InteractionGate, RemoteAction, SessionMetadata, SessionPublisher};
use crate::volume::VolumeControl;
use std::time::Duration;
use tracing::{debug, warn};

pub trait TrackListener {
    fn on_track_changed(&mut self, catalog_index: usize, track: &Track);
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlayerOptions {
    /// Hold back remote previous/next until a local play has succeeded.
    pub gesture_gate: bool,
    pub volume: f32,
}

pub struct Player {
    core: WidgetCore,
    transport: Box<dyn Transport>,
    session: Box<dyn SessionPublisher>,
    artwork: Option<ArtworkWorker>,
    gate: InteractionGate,
    volume: VolumeControl,
    listeners: Vec<Box<dyn TrackListener>>,
    published: Option<SessionMetadata>,
}

impl Player {
    pub fn new(
        core: WidgetCore,
        mut transport: Box<dyn Transport>,
        session: Box<dyn SessionPublisher>,
        artwork: Option<ArtworkWorker>,
        options: PlayerOptions,
    ) -> Self {
        let volume = VolumeControl::new(options.volume);
        transport.set_volume(volume.volume());
        Self {
            core,
            transport,
            session,
            artwork,
            gate: InteractionGate::new(options.gesture_gate),
            volume,
            listeners: Vec::new(),
            published: None,
        }
    }

    pub fn subscribe(&mut self, listener: Box<dyn TrackListener>) {
        self.listeners.push(listener);
    }

    pub fn core(&self) -> &WidgetCore {
        &self.core
    }

    /// For query and favorites changes. These never change the current track.
    pub fn core_mut(&mut self) -> &mut WidgetCore {
        &mut self.core
    }

    pub fn gate(&self) -> &InteractionGate {
        &self.gate
    }

    pub fn volume(&self) -> &VolumeControl {
        &self.volume
    }

    pub fn published(&self) -> Option<&SessionMetadata> {
        self.published.as_ref()
    }

    pub fn is_playing(&self) -> bool {
        self.transport.source().is_some() && !self.transport.is_paused()
    }

    pub fn position(&self) -> Option<Duration> {
        self.transport.current_time()
    }

    pub fn duration(&self) -> Option<Duration> {
        self.transport.duration()
    }

    /// Loads the first track without starting playback.
    pub fn load_initial(&mut self) {
        let previous = self.core.current_index();
        let landed = self.core.select_initial();
        self.land(previous, landed, false);
    }

    pub fn select_track(&mut self, catalog_index: usize) {
        let previous = self.core.current_index();
        let landed = self.core.select_track(catalog_index);
        self.land(previous, landed, true);
    }

    pub fn activate_row(&mut self, row: usize) {
        let previous = self.core.current_index();
        let landed = self.core.activate_row(row);
        self.land(previous, landed, true);
    }

    pub fn next(&mut self) {
        let previous = self.core.current_index();
        let landed = self.core.next();
        self.land(previous, landed, true);
    }

    pub fn previous(&mut self) {
        let previous = self.core.current_index();
        let landed = self.core.previous();
        self.land(previous, landed, true);
    }

    /// User-initiated play. Only a play that actually starts opens the
    /// interaction gate and unlocks volume.
    pub fn play_local(&mut self) -> bool {
        if self.transport.source().is_none() {
            self.load_initial();
        }
        let started = self.try_play();
        if started {
            self.gate.mark_interacted();
            self.volume.enable();
        }
        started
    }

    pub fn pause(&mut self) {
        self.transport.pause();
        self.session.set_playing(false);
        self.core.dirty = true;
    }

    pub fn toggle_play(&mut self) -> bool {
        if self.is_playing() {
            self.pause();
            false
        } else {
            self.play_local()
        }
    }

    /// No-op while the duration is unknown.
    pub fn seek_ratio(&mut self, ratio: f32) {
        let Some(duration) = self.transport.duration().filter(|d| !d.is_zero()) else {
            return;
        };
        let ratio = if ratio.is_finite() {
            ratio.clamp(0.0, 1.0)
        } else {
            0.0
        };
        if let Err(err) = self.transport.seek(duration.mul_f32(ratio)) {
            debug!("seek failed: {err:#}");
        }
        self.core.dirty = true;
    }

    pub fn handle_remote(&mut self, action: RemoteAction) {
        if !self.gate.allows(action) {
            debug!(?action, "remote action suppressed until first local play");
            return;
        }
        match action {
            RemoteAction::Previous => self.previous(),
            RemoteAction::Next => self.next(),
            RemoteAction::Play => {
                self.try_play();
            }
            RemoteAction::Pause => self.pause(),
        }
    }

    pub fn set_volume(&mut self, volume: f32) {
        let applied = self.volume.set(volume);
        self.apply_volume(applied);
    }

    pub fn step_volume(&mut self, delta: f32) {
        let applied = self.volume.step(delta);
        self.apply_volume(applied);
    }

    pub fn toggle_mute(&mut self) {
        let applied = self.volume.toggle_mute();
        self.apply_volume(applied);
    }

    /// Pumps transport end-of-track, finished artwork and remote actions.
    pub fn tick(&mut self) {
        if self.transport.is_ended() {
            let previous = self.core.current_index();
            let landed = self.core.next();
            if landed.is_some() {
                self.land(previous, landed, true);
            } else {
                self.pause();
            }
            self.core.dirty = true;
        }

        self.apply_artwork();

        while let Some(action) = self.session.poll_action() {
            self.handle_remote(action);
        }
    }

    fn land(&mut self, previous: Option<usize>, landed: Option<usize>, autoplay: bool) {
        let Some(idx) = landed else {
            return;
        };
        let Some(track) = self.core.catalog().get(idx).cloned() else {
            return;
        };

        if previous == Some(idx) && self.transport.source() == Some(track.src.as_str()) {
            if let Err(err) = self.transport.seek(Duration::ZERO) {
                debug!("restart seek failed: {err:#}");
            }
        } else {
            self.change_track(idx, &track);
        }

        if autoplay {
            self.try_play();
        }
        self.core.dirty = true;
    }

    fn change_track(&mut self, idx: usize, track: &Track) {
        if let Err(err) = self.transport.set_source(&track.src) {
            warn!("failed to load {}: {err:#}", track.src);
            self.core.status = format!("Cannot play {}", track.title);
        }
        self.session.set_playing(false);

        self.publish(SessionMetadata::for_track(track, &track.cover));
        if let Some(artwork) = self.artwork.as_mut() {
            artwork.request(track.key(), &track.cover);
        }

        for listener in &mut self.listeners {
            listener.on_track_changed(idx, track);
        }
    }

    fn publish(&mut self, metadata: SessionMetadata) {
        if let Err(err) = self.session.publish(&metadata) {
            warn!("failed to publish session metadata: {err:#}");
        }
        self.session.bind_actions(&RemoteAction::ALL);
        self.published = Some(metadata);
    }

    fn apply_artwork(&mut self) {
        let Some(result) = self.artwork.as_ref().and_then(ArtworkWorker::try_recv_current) else {
            return;
        };
        let Some(track) = self.core.current_track().cloned() else {
            return;
        };
        if !track.has_key(&result.key) {
            debug!(key = %result.key, "artwork for a track that is no longer current");
            return;
        }
        let unchanged = self
            .published
            .as_ref()
            .and_then(SessionMetadata::artwork_src)
            == Some(result.locator.as_str());
        if !unchanged {
            self.publish(SessionMetadata::for_track(&track, &result.locator));
        }
    }

    /// Fire-and-forget: a refused play is logged and leaves the player paused.
    fn try_play(&mut self) -> bool {
        match self.transport.play() {
            Ok(()) => {
                self.session.set_playing(true);
                self.core.dirty = true;
                true
            }
            Err(err) => {
                debug!("play rejected: {err:#}");
                self.core.dirty = true;
                false
            }
        }
    }

    fn apply_volume(&mut self, applied: Option<f32>) {
        let Some(volume) = applied else {
            self.core.status = String::from("Press play to enable volume");
            self.core.dirty = true;
            return;
        };
        self.transport.set_volume(volume);
        self.core.persist_volume(volume);
        self.core.dirty = true;
    }
}
