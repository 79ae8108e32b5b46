//! Square artwork for the media session, produced off the UI thread.

use crate::model::TrackKey;
use anyhow::{Context, Result, bail};
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, ImageFormat};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;
use tracing::{debug, warn};

pub const ARTWORK_EDGE_PX: u32 = 96;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtworkJob {
    pub generation: u64,
    pub key: TrackKey,
    pub locator: String,
}

/// Outcome of a job. `locator` is the cropped file on success and the
/// original cover locator when cropping failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtworkResult {
    pub generation: u64,
    pub key: TrackKey,
    pub locator: String,
    pub cropped: bool,
}

pub fn cache_path(cache_dir: &Path, locator: &str) -> PathBuf {
    let digest = Sha256::digest(locator.as_bytes());
    let name: String = digest.iter().map(|b| format!("{b:02x}")).collect();
    cache_dir.join(format!("{name}.png"))
}

/// Center-crops `locator` to a square and writes a 96x96 PNG into the cache.
/// Returns the cached path, reusing an existing file.
pub fn square_crop(locator: &str, cache_dir: &Path) -> Result<PathBuf> {
    let target = cache_path(cache_dir, locator);
    if target.is_file() {
        return Ok(target);
    }
    if locator.contains("://") {
        bail!("remote artwork {locator} cannot be fetched");
    }

    let image = image::open(locator).with_context(|| format!("failed to decode {locator}"))?;
    let cropped = crop_to_square(&image)?;
    fs::create_dir_all(cache_dir)
        .with_context(|| format!("failed to create {}", cache_dir.display()))?;
    let temp = target.with_extension("png.tmp");
    cropped
        .save_with_format(&temp, ImageFormat::Png)
        .with_context(|| format!("failed to write {}", temp.display()))?;
    fs::rename(&temp, &target)
        .with_context(|| format!("failed to move artwork into {}", target.display()))?;
    Ok(target)
}

fn crop_to_square(image: &DynamicImage) -> Result<DynamicImage> {
    let (width, height) = image.dimensions();
    let side = width.min(height);
    if side == 0 {
        bail!("artwork has no pixels");
    }
    let x = (width - side) / 2;
    let y = (height - side) / 2;
    Ok(image
        .crop_imm(x, y, side, side)
        .resize_exact(ARTWORK_EDGE_PX, ARTWORK_EDGE_PX, FilterType::Lanczos3))
}

/// Background cropper. Every request bumps the generation; results from
/// older generations are discarded on receipt.
pub struct ArtworkWorker {
    job_tx: Sender<ArtworkJob>,
    result_rx: Receiver<ArtworkResult>,
    generation: u64,
}

impl ArtworkWorker {
    pub fn spawn(cache_dir: PathBuf) -> Self {
        let (job_tx, job_rx) = mpsc::channel::<ArtworkJob>();
        let (result_tx, result_rx) = mpsc::channel();

        thread::spawn(move || {
            while let Ok(job) = job_rx.recv() {
                let (locator, cropped) = match square_crop(&job.locator, &cache_dir) {
                    Ok(path) => (path.to_string_lossy().to_string(), true),
                    Err(err) => {
                        warn!("artwork crop failed, using original: {err:#}");
                        (job.locator.clone(), false)
                    }
                };
                let result = ArtworkResult {
                    generation: job.generation,
                    key: job.key,
                    locator,
                    cropped,
                };
                if result_tx.send(result).is_err() {
                    break;
                }
            }
        });

        Self {
            job_tx,
            result_rx,
            generation: 0,
        }
    }

    pub fn request(&mut self, key: TrackKey, locator: &str) -> u64 {
        self.generation += 1;
        let job = ArtworkJob {
            generation: self.generation,
            key,
            locator: locator.to_string(),
        };
        if self.job_tx.send(job).is_err() {
            warn!("artwork worker is gone");
        }
        self.generation
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Latest result for the most recent request, if it has arrived.
    pub fn try_recv_current(&self) -> Option<ArtworkResult> {
        let mut current = None;
        while let Ok(result) = self.result_rx.try_recv() {
            if result.generation == self.generation {
                current = Some(result);
            } else {
                debug!(
                    generation = result.generation,
                    latest = self.generation,
                    "stale artwork dropped"
                );
            }
        }
        current
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};
    use std::time::{Duration, Instant};
    use tempfile::tempdir;

    fn write_image(path: &Path, width: u32, height: u32) {
        let image = RgbImage::from_fn(width, height, |x, _| {
            if x < width / 2 {
                Rgb([255, 0, 0])
            } else {
                Rgb([0, 0, 255])
            }
        });
        image.save(path).expect("write test image");
    }

    fn wait_for(worker: &ArtworkWorker) -> ArtworkResult {
        let deadline = Instant::now() + Duration::from_secs(10);
        loop {
            if let Some(result) = worker.try_recv_current() {
                return result;
            }
            assert!(Instant::now() < deadline, "artwork worker timed out");
            thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn crops_wide_cover_to_square_png() {
        let dir = tempdir().expect("tempdir");
        let source = dir.path().join("wide.png");
        write_image(&source, 300, 120);
        let cache = dir.path().join("cache");

        let path = square_crop(source.to_str().expect("utf8"), &cache).expect("crop");
        assert_eq!(path, cache_path(&cache, source.to_str().expect("utf8")));
        let cropped = image::open(&path).expect("decode cropped");
        assert_eq!(cropped.dimensions(), (ARTWORK_EDGE_PX, ARTWORK_EDGE_PX));
    }

    #[test]
    fn cache_names_are_stable_hex() {
        let dir = Path::new("cache");
        let a = cache_path(dir, "covers/a.jpg");
        assert_eq!(a, cache_path(dir, "covers/a.jpg"));
        assert_ne!(a, cache_path(dir, "covers/b.jpg"));
        let stem = a.file_stem().and_then(|s| s.to_str()).expect("stem");
        assert_eq!(stem.len(), 64);
        assert!(stem.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn missing_cover_is_an_error() {
        let dir = tempdir().expect("tempdir");
        assert!(square_crop("does/not/exist.jpg", dir.path()).is_err());
        assert!(square_crop("https://cdn.example/a.jpg", dir.path()).is_err());
    }

    #[test]
    fn worker_falls_back_to_original_locator() {
        let dir = tempdir().expect("tempdir");
        let mut worker = ArtworkWorker::spawn(dir.path().to_path_buf());
        worker.request(TrackKey::new("Song1", "Artist1"), "missing.jpg");

        let result = wait_for(&worker);
        assert!(!result.cropped);
        assert_eq!(result.locator, "missing.jpg");
    }

    #[test]
    fn worker_drops_superseded_results() {
        let dir = tempdir().expect("tempdir");
        let first = dir.path().join("first.png");
        let second = dir.path().join("second.png");
        write_image(&first, 64, 64);
        write_image(&second, 80, 40);

        let mut worker = ArtworkWorker::spawn(dir.path().join("cache"));
        worker.request(TrackKey::new("Song1", "Artist1"), first.to_str().expect("utf8"));
        let latest = worker.request(TrackKey::new("Song2", "Artist2"), second.to_str().expect("utf8"));

        let result = wait_for(&worker);
        assert_eq!(result.generation, latest);
        assert_eq!(result.key, TrackKey::new("Song2", "Artist2"));
        assert!(result.cropped);
    }
}
