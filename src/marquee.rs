//! Scrolling text for titles that do not fit their column.

use std::time::Duration;
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

/// Extra travel past the end so the last glyph clears the edge.
const TRAIL: usize = 8;
const DEFAULT_SPEED: f32 = 40.0;
const DEFAULT_MIN_SECS: f32 = 6.0;
const SPEED_MIN_SECS: f32 = 4.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScrollDirection {
    /// Back and forth.
    #[default]
    Alternate,
    /// One way, restarting from the far end each cycle.
    LeftToRight,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Marquee {
    /// Fixed cycle length in seconds. Takes precedence over `speed`.
    pub duration_secs: Option<f32>,
    /// Cells per second.
    pub speed: Option<f32>,
    pub direction: ScrollDirection,
    pub reduced_motion: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScrollGeometry {
    pub distance: usize,
    pub duration: Duration,
    pub direction: ScrollDirection,
}

impl Marquee {
    /// `None` means the text fits (or motion is reduced) and stays still.
    /// Widths are terminal cells.
    pub fn geometry(&self, text_width: usize, mask_width: usize) -> Option<ScrollGeometry> {
        if self.reduced_motion || text_width <= mask_width + 1 {
            return None;
        }

        let distance = text_width - mask_width + TRAIL;
        let travel = distance as f32;
        let requested = match (positive(self.duration_secs), positive(self.speed)) {
            (Some(secs), _) => Some(secs),
            (None, Some(speed)) => Some((travel / speed).max(SPEED_MIN_SECS)),
            (None, None) => None,
        };
        let duration = requested
            .and_then(|secs| Duration::try_from_secs_f32(secs).ok())
            .unwrap_or_else(|| {
                Duration::try_from_secs_f32((travel / DEFAULT_SPEED).max(DEFAULT_MIN_SECS))
                    .unwrap_or(Duration::MAX)
            });

        Some(ScrollGeometry {
            distance,
            duration,
            direction: self.direction,
        })
    }

    /// Visible slice of `text` for a column `width` cells wide, `elapsed`
    /// into the animation.
    pub fn window(&self, text: &str, width: usize, elapsed: Duration) -> String {
        let Some(geometry) = self.geometry(text.width(), width) else {
            return clip(text, 0, width);
        };

        let mut visible = clip(text, geometry.offset(elapsed), width);
        let used = visible.width();
        visible.extend(std::iter::repeat_n(' ', width.saturating_sub(used)));
        visible
    }
}

impl ScrollGeometry {
    pub fn offset(&self, elapsed: Duration) -> usize {
        let cycle = self.duration.as_secs_f32();
        if cycle <= 0.0 {
            return 0;
        }
        let turns = elapsed.as_secs_f32() / cycle;
        let progress = turns.fract();
        let progress = match self.direction {
            ScrollDirection::Alternate if (turns as u64) % 2 == 1 => 1.0 - progress,
            ScrollDirection::Alternate => progress,
            ScrollDirection::LeftToRight => 1.0 - progress,
        };
        ((progress * self.distance as f32).round() as usize).min(self.distance)
    }
}

/// Cells `start..start + width` of `text`. A wide glyph cut by either edge is
/// replaced by blanks so the result never exceeds `width` cells.
fn clip(text: &str, start: usize, width: usize) -> String {
    let end = start.saturating_add(width);
    let mut out = String::new();
    let mut column = 0;
    for ch in text.chars() {
        if column >= end {
            break;
        }
        let next = column + ch.width().unwrap_or(0);
        if column >= start && next <= end {
            out.push(ch);
        } else if next > start {
            out.extend(std::iter::repeat_n(' ', next.min(end) - column.max(start)));
        }
        column = next;
    }
    out
}

fn positive(value: Option<f32>) -> Option<f32> {
    value.filter(|value| value.is_finite() && *value > 0.0)
}
