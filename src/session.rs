//! OS media-session boundary: now-playing metadata out, remote transport
//! actions in.

use crate::model::Track;
use anyhow::Result;
use std::path::Path;
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use tracing::{debug, info};

pub const DEFAULT_ALBUM: &str = "Music Widget";
pub const ARTWORK_SIZE: &str = "96x96";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RemoteAction {
    Previous,
    Next,
    Play,
    Pause,
}

impl RemoteAction {
    pub const ALL: [RemoteAction; 4] = [
        RemoteAction::Previous,
        RemoteAction::Next,
        RemoteAction::Play,
        RemoteAction::Pause,
    ];

    /// Navigation actions are the ones held back by the interaction gate.
    pub fn is_navigation(self) -> bool {
        matches!(self, RemoteAction::Previous | RemoteAction::Next)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionArtwork {
    pub src: String,
    pub sizes: String,
    pub mime: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionMetadata {
    pub title: String,
    pub artist: String,
    pub album: String,
    pub artwork: Vec<SessionArtwork>,
}

impl SessionMetadata {
    pub fn for_track(track: &Track, artwork_src: &str) -> Self {
        Self {
            title: track.title.clone(),
            artist: track.artist.clone(),
            album: track
                .album
                .clone()
                .unwrap_or_else(|| DEFAULT_ALBUM.to_string()),
            artwork: vec![SessionArtwork {
                src: artwork_src.to_string(),
                sizes: ARTWORK_SIZE.to_string(),
                mime: artwork_mime(artwork_src).to_string(),
            }],
        }
    }

    pub fn artwork_src(&self) -> Option<&str> {
        self.artwork.first().map(|artwork| artwork.src.as_str())
    }
}

pub fn artwork_mime(locator: &str) -> &'static str {
    let extension = Path::new(locator)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase);
    match extension.as_deref() {
        Some("png") => "image/png",
        Some("webp") => "image/webp",
        Some("gif") => "image/gif",
        _ => "image/jpeg",
    }
}

/// Host media session. Action handlers are rebound after every publish since
/// hosts may drop them when metadata changes.
pub trait SessionPublisher {
    fn publish(&mut self, metadata: &SessionMetadata) -> Result<()>;
    fn bind_actions(&mut self, actions: &[RemoteAction]);
    /// Next pending remote action for a bound handler, if any.
    fn poll_action(&mut self) -> Option<RemoteAction>;
    /// Host-side playing/paused indicator.
    fn set_playing(&mut self, _playing: bool) {}
}

/// Remote actions queued from any thread. Only actions with a bound handler
/// at poll time are delivered.
pub struct ActionInbox {
    tx: Sender<RemoteAction>,
    rx: Receiver<RemoteAction>,
    bound: Vec<RemoteAction>,
}

impl ActionInbox {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel();
        Self {
            tx,
            rx,
            bound: Vec::new(),
        }
    }

    pub fn sender(&self) -> Sender<RemoteAction> {
        self.tx.clone()
    }

    pub fn bind(&mut self, actions: &[RemoteAction]) {
        self.bound = actions.to_vec();
    }

    pub fn unbind_all(&mut self) {
        self.bound.clear();
    }

    pub fn poll(&mut self) -> Option<RemoteAction> {
        loop {
            match self.rx.try_recv() {
                Ok(action) if self.bound.contains(&action) => return Some(action),
                Ok(action) => debug!(?action, "remote action without handler dropped"),
                Err(TryRecvError::Empty | TryRecvError::Disconnected) => return None,
            }
        }
    }
}

impl Default for ActionInbox {
    fn default() -> Self {
        Self::new()
    }
}

/// Blocks remote navigation until a local play has actually started. A play
/// attempt that gets refused does not open the gate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InteractionGate {
    required: bool,
    interacted: bool,
}

impl InteractionGate {
    pub fn new(required: bool) -> Self {
        Self {
            required,
            interacted: false,
        }
    }

    pub fn mark_interacted(&mut self) {
        if !self.interacted {
            debug!("interaction gate opened");
        }
        self.interacted = true;
    }

    pub fn has_interacted(&self) -> bool {
        self.interacted
    }

    pub fn allows(&self, action: RemoteAction) -> bool {
        !self.required || self.interacted || !action.is_navigation()
    }
}

/// Fallback when no host session is reachable: metadata goes to the log and
/// remote actions arrive through [`LogSessionPublisher::remote`] senders.
pub struct LogSessionPublisher {
    inbox: ActionInbox,
    last: Option<SessionMetadata>,
}

impl LogSessionPublisher {
    pub fn new() -> Self {
        Self {
            inbox: ActionInbox::new(),
            last: None,
        }
    }

    pub fn remote(&self) -> Sender<RemoteAction> {
        self.inbox.sender()
    }

    pub fn last_published(&self) -> Option<&SessionMetadata> {
        self.last.as_ref()
    }
}

impl Default for LogSessionPublisher {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionPublisher for LogSessionPublisher {
    fn publish(&mut self, metadata: &SessionMetadata) -> Result<()> {
        info!(
            title = %metadata.title,
            artist = %metadata.artist,
            album = %metadata.album,
            artwork = metadata.artwork_src().unwrap_or(""),
            "now playing"
        );
        self.inbox.unbind_all();
        self.last = Some(metadata.clone());
        Ok(())
    }

    fn bind_actions(&mut self, actions: &[RemoteAction]) {
        self.inbox.bind(actions);
    }

    fn poll_action(&mut self) -> Option<RemoteAction> {
        self.inbox.poll()
    }
}
