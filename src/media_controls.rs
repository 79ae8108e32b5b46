//! Host media session through `souvlaki` (MPRIS, SMTC, Now Playing).

use crate::session::{ActionInbox, RemoteAction, SessionMetadata, SessionPublisher};
use anyhow::{Result, anyhow};
use souvlaki::{MediaControlEvent, MediaControls, MediaMetadata, MediaPlayback};
use std::path::{self, Path};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use tracing::{debug, info, warn};

const DISPLAY_NAME: &str = "Music Widget";
const DBUS_NAME: &str = "tunewidget";

pub struct SouvlakiSessionPublisher {
    controls: MediaControls,
    inbox: ActionInbox,
    playing: Arc<AtomicBool>,
}

impl SouvlakiSessionPublisher {
    #[cfg(not(target_os = "windows"))]
    pub fn new() -> Result<Self> {
        use souvlaki::PlatformConfig;

        let mut controls = MediaControls::new(PlatformConfig {
            display_name: DISPLAY_NAME,
            dbus_name: DBUS_NAME,
            hwnd: None,
        })
        .map_err(|err| anyhow!("failed to create media controls: {err}"))?;

        let inbox = ActionInbox::new();
        let playing = Arc::new(AtomicBool::new(false));
        let tx = inbox.sender();
        let state = Arc::clone(&playing);
        controls
            .attach(move |event| forward_event(&tx, event, state.load(Ordering::Relaxed)))
            .map_err(|err| anyhow!("failed to attach media controls handler: {err}"))?;

        info!("media controls attached as {DBUS_NAME}");
        Ok(Self {
            controls,
            inbox,
            playing,
        })
    }

    /// SMTC needs a window handle, which a terminal app does not own.
    #[cfg(target_os = "windows")]
    pub fn new() -> Result<Self> {
        anyhow::bail!("media controls need a window handle on Windows")
    }

    /// Sender for remote actions that arrive outside the host session, such
    /// as terminal media keys.
    pub fn remote(&self) -> Sender<RemoteAction> {
        self.inbox.sender()
    }

    fn push_playback(&mut self) -> Result<()> {
        let playback = if self.playing.load(Ordering::Relaxed) {
            MediaPlayback::Playing { progress: None }
        } else {
            MediaPlayback::Paused { progress: None }
        };
        self.controls
            .set_playback(playback)
            .map_err(|err| anyhow!("failed to publish playback state: {err}"))
    }
}

impl SessionPublisher for SouvlakiSessionPublisher {
    fn publish(&mut self, metadata: &SessionMetadata) -> Result<()> {
        self.inbox.unbind_all();
        let cover = metadata.artwork_src().map(cover_url);
        self.controls
            .set_metadata(MediaMetadata {
                title: Some(metadata.title.as_str()),
                artist: Some(metadata.artist.as_str()),
                album: Some(metadata.album.as_str()),
                cover_url: cover.as_deref(),
                duration: None,
            })
            .map_err(|err| anyhow!("failed to publish metadata: {err}"))?;
        debug!(
            title = %metadata.title,
            cover = cover.as_deref().unwrap_or(""),
            "session metadata sent"
        );
        self.push_playback()
    }

    fn bind_actions(&mut self, actions: &[RemoteAction]) {
        self.inbox.bind(actions);
    }

    fn poll_action(&mut self) -> Option<RemoteAction> {
        self.inbox.poll()
    }

    fn set_playing(&mut self, playing: bool) {
        if self.playing.swap(playing, Ordering::Relaxed) == playing {
            return;
        }
        if let Err(err) = self.push_playback() {
            warn!("{err:#}");
        }
    }
}

#[cfg_attr(target_os = "windows", allow(dead_code))]
fn forward_event(tx: &Sender<RemoteAction>, event: MediaControlEvent, playing: bool) {
    let Some(action) = map_control_event(&event, playing) else {
        debug!("unsupported media control event ignored");
        return;
    };
    if let Err(err) = tx.send(action) {
        warn!("media control event dropped: {err}");
    }
}

/// Toggle resolves against the playing flag the host was last told about.
pub fn map_control_event(event: &MediaControlEvent, playing: bool) -> Option<RemoteAction> {
    match event {
        MediaControlEvent::Play => Some(RemoteAction::Play),
        MediaControlEvent::Pause | MediaControlEvent::Stop => Some(RemoteAction::Pause),
        MediaControlEvent::Toggle if playing => Some(RemoteAction::Pause),
        MediaControlEvent::Toggle => Some(RemoteAction::Play),
        MediaControlEvent::Next => Some(RemoteAction::Next),
        MediaControlEvent::Previous => Some(RemoteAction::Previous),
        _ => None,
    }
}

/// Hosts expect URLs. Local paths become absolute `file://` URLs.
pub fn cover_url(locator: &str) -> String {
    if locator.contains("://") {
        return locator.to_string();
    }
    let path = Path::new(locator);
    let absolute = path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
    format!("file://{}", absolute.display())
}
