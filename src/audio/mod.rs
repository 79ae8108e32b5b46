use anyhow::{Context, Result, bail};
use rodio::Source;
use rodio::cpal::traits::{DeviceTrait, HostTrait};
use rodio::{Decoder, OutputStream, OutputStreamBuilder, Sink};
#[cfg(unix)]
use std::ffi::CString;
use std::fs::File;
use std::path::Path;
use std::time::Duration;
use std::time::Instant;

const MAX_VOLUME: f32 = 1.0;

/// Audio playback primitive. Loading a source never starts playback; `play`
/// may be refused and callers treat that as routine.
pub trait Transport {
    fn set_source(&mut self, locator: &str) -> Result<()>;
    fn source(&self) -> Option<&str>;
    fn play(&mut self) -> Result<()>;
    fn pause(&mut self);
    fn is_paused(&self) -> bool;
    fn seek(&mut self, position: Duration) -> Result<()>;
    fn current_time(&self) -> Option<Duration>;
    fn duration(&self) -> Option<Duration>;
    fn volume(&self) -> f32;
    fn set_volume(&mut self, volume: f32);
    fn is_ended(&self) -> bool;
}

pub struct RodioTransport {
    stream: OutputStream,
    sink: Sink,
    current: Option<String>,
    track_duration: Option<Duration>,
    volume: f32,
}

impl RodioTransport {
    pub fn new() -> Result<Self> {
        let stream = Self::open_output_stream()?;
        let sink = Sink::connect_new(stream.mixer());
        sink.pause();

        Ok(Self {
            stream,
            sink,
            current: None,
            track_duration: None,
            volume: 1.0,
        })
    }

    fn open_output_stream() -> Result<OutputStream> {
        let mut stream = with_silenced_stderr(|| {
            match OutputStreamBuilder::from_default_device()
                .context("failed to open default system output stream")
                .and_then(|builder| {
                    builder
                        .with_error_callback(|_| {})
                        .open_stream_or_fallback()
                        .context("failed to start default output stream")
                }) {
                Ok(stream) => Ok(stream),
                Err(default_err) => {
                    let host = rodio::cpal::default_host();
                    let mut candidates: Vec<_> = host
                        .output_devices()
                        .ok()
                        .into_iter()
                        .flatten()
                        .filter_map(|device| {
                            let name = device.name().ok()?.to_ascii_lowercase();
                            let rank = if name.contains("pulse") {
                                0_u8
                            } else if name.contains("pipewire") {
                                1_u8
                            } else if name.contains("default") {
                                2_u8
                            } else {
                                3_u8
                            };
                            Some((rank, name, device))
                        })
                        .collect();
                    candidates.sort_by(|a, b| (a.0, &a.1).cmp(&(b.0, &b.1)));

                    candidates
                        .into_iter()
                        .find_map(|(_, _, device)| {
                            OutputStreamBuilder::from_device(device)
                                .ok()?
                                .with_error_callback(|_| {})
                                .open_stream_or_fallback()
                                .ok()
                        })
                        .with_context(|| {
                            format!(
                                "unable to start any audio output stream after default failed: {default_err:#}"
                            )
                        })
                }
            }
        })?;
        stream.log_on_drop(false);
        Ok(stream)
    }
}

impl Transport for RodioTransport {
    fn set_source(&mut self, locator: &str) -> Result<()> {
        self.sink.stop();
        self.sink = Sink::connect_new(self.stream.mixer());
        self.sink.pause();
        self.sink.set_volume(self.volume);
        self.current = None;
        self.track_duration = None;

        if locator.contains("://") {
            bail!("remote source {locator} is not supported by local output");
        }
        let path = Path::new(locator);
        let file =
            File::open(path).with_context(|| format!("failed to open track {}", path.display()))?;
        let source = Decoder::try_from(file)
            .with_context(|| format!("failed to decode {}", path.display()))?;
        self.track_duration = source.total_duration();
        self.sink.append(source);
        self.current = Some(locator.to_string());
        Ok(())
    }

    fn source(&self) -> Option<&str> {
        self.current.as_deref()
    }

    fn play(&mut self) -> Result<()> {
        if self.current.is_none() {
            bail!("no source loaded");
        }
        self.sink.play();
        Ok(())
    }

    fn pause(&mut self) {
        self.sink.pause();
    }

    fn is_paused(&self) -> bool {
        self.sink.is_paused()
    }

    fn seek(&mut self, position: Duration) -> Result<()> {
        if self.current.is_none() {
            return Err(anyhow::anyhow!("no active track"));
        }

        self.sink
            .try_seek(position)
            .map_err(|err| anyhow::anyhow!("failed to seek current track: {err:?}"))?;
        Ok(())
    }

    fn current_time(&self) -> Option<Duration> {
        self.current.as_ref()?;
        Some(self.sink.get_pos())
    }

    fn duration(&self) -> Option<Duration> {
        self.track_duration
    }

    fn volume(&self) -> f32 {
        self.volume
    }

    fn set_volume(&mut self, volume: f32) {
        self.volume = volume.clamp(0.0, MAX_VOLUME);
        self.sink.set_volume(self.volume);
    }

    fn is_ended(&self) -> bool {
        self.current.is_some() && !self.sink.is_paused() && self.sink.empty()
    }
}

#[cfg(unix)]
fn with_silenced_stderr<T>(operation: impl FnOnce() -> T) -> T {
    let saved = unsafe { libc::dup(libc::STDERR_FILENO) };
    if saved < 0 {
        return operation();
    }

    let devnull = CString::new("/dev/null")
        .ok()
        .map(|path| unsafe { libc::open(path.as_ptr(), libc::O_WRONLY) })
        .unwrap_or(-1);

    if devnull >= 0 {
        unsafe {
            libc::dup2(devnull, libc::STDERR_FILENO);
            libc::close(devnull);
        }
    }

    let result = operation();

    unsafe {
        libc::dup2(saved, libc::STDERR_FILENO);
        libc::close(saved);
    }

    result
}

#[cfg(not(unix))]
fn with_silenced_stderr<T>(operation: impl FnOnce() -> T) -> T {
    operation()
}

/// Silent transport with a logical clock. Used when no output device is
/// available and in tests; can be told to refuse `play` the way an autoplay
/// policy would.
pub struct NullTransport {
    paused: bool,
    current: Option<String>,
    volume: f32,
    started_at: Option<Instant>,
    position_offset: Duration,
    track_duration: Option<Duration>,
    autoplay_blocked: bool,
}

impl NullTransport {
    pub fn new() -> Self {
        Self {
            paused: true,
            current: None,
            volume: 1.0,
            started_at: None,
            position_offset: Duration::ZERO,
            track_duration: None,
            autoplay_blocked: false,
        }
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.track_duration = Some(duration);
        self
    }

    pub fn set_autoplay_blocked(&mut self, blocked: bool) {
        self.autoplay_blocked = blocked;
    }

    fn estimate_duration(locator: &str) -> Option<Duration> {
        let file = File::open(locator).ok()?;
        let source = Decoder::try_from(file).ok()?;
        source
            .total_duration()
            .filter(|duration| !duration.is_zero())
    }

    fn current_position(&self) -> Duration {
        let mut position = self.position_offset;
        if !self.paused
            && self.current.is_some()
            && let Some(started_at) = self.started_at
        {
            position = position.saturating_add(started_at.elapsed());
        }
        if let Some(duration) = self.track_duration {
            return position.min(duration);
        }
        position
    }
}

impl Default for NullTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for NullTransport {
    fn set_source(&mut self, locator: &str) -> Result<()> {
        self.paused = true;
        self.current = Some(locator.to_string());
        self.started_at = None;
        self.position_offset = Duration::ZERO;
        if let Some(estimated) = Self::estimate_duration(locator) {
            self.track_duration = Some(estimated);
        }
        Ok(())
    }

    fn source(&self) -> Option<&str> {
        self.current.as_deref()
    }

    fn play(&mut self) -> Result<()> {
        if self.autoplay_blocked {
            bail!("playback requires a user gesture");
        }
        if self.current.is_none() {
            bail!("no source loaded");
        }
        if self.paused {
            self.started_at = Some(Instant::now());
            self.paused = false;
        }
        Ok(())
    }

    fn pause(&mut self) {
        self.position_offset = self.current_position();
        self.started_at = None;
        self.paused = true;
    }

    fn is_paused(&self) -> bool {
        self.paused
    }

    fn seek(&mut self, position: Duration) -> Result<()> {
        if self.current.is_none() {
            return Err(anyhow::anyhow!("no active track"));
        }

        self.position_offset = self
            .track_duration
            .map_or(position, |duration| position.min(duration));
        self.started_at = if self.paused {
            None
        } else {
            Some(Instant::now())
        };
        Ok(())
    }

    fn current_time(&self) -> Option<Duration> {
        self.current.as_ref()?;
        Some(self.current_position())
    }

    fn duration(&self) -> Option<Duration> {
        self.track_duration
    }

    fn volume(&self) -> f32 {
        self.volume
    }

    fn set_volume(&mut self, volume: f32) {
        self.volume = volume.clamp(0.0, MAX_VOLUME);
    }

    fn is_ended(&self) -> bool {
        let Some(duration) = self.track_duration else {
            return false;
        };
        self.current.is_some() && !self.paused && self.current_position() >= duration
    }
}
