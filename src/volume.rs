use crate::model::default_volume;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VolumeLevel {
    Muted,
    Low,
    Medium,
    High,
}

impl VolumeLevel {
    pub fn from_volume(volume: f32) -> Self {
        if volume <= 0.0 {
            Self::Muted
        } else if volume < 0.3 {
            Self::Low
        } else if volume < 0.7 {
            Self::Medium
        } else {
            Self::High
        }
    }

    pub fn icon(self) -> &'static str {
        match self {
            Self::Muted => "🔇",
            Self::Low => "🔈",
            Self::Medium => "🔉",
            Self::High => "🔊",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Muted => "Unmute",
            Self::Low => "Low volume",
            Self::Medium => "Medium volume",
            Self::High => "High volume",
        }
    }
}

/// Output volume with mute-restore. Adjustments are locked until the first
/// local play has succeeded.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VolumeControl {
    volume: f32,
    previous: f32,
    enabled: bool,
}

impl VolumeControl {
    pub fn new(initial: f32) -> Self {
        let volume = sanitize(initial);
        Self {
            volume,
            previous: if volume > 0.0 { volume } else { default_volume() },
            enabled: false,
        }
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    pub fn level(&self) -> VolumeLevel {
        VolumeLevel::from_volume(self.volume)
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn enable(&mut self) {
        self.enabled = true;
    }

    /// Returns the applied volume, or `None` while adjustments are locked.
    pub fn set(&mut self, volume: f32) -> Option<f32> {
        if !self.enabled {
            return None;
        }
        self.volume = sanitize(volume);
        if self.volume > 0.0 {
            self.previous = self.volume;
        }
        Some(self.volume)
    }

    pub fn step(&mut self, delta: f32) -> Option<f32> {
        self.set(self.volume + delta)
    }

    pub fn toggle_mute(&mut self) -> Option<f32> {
        if self.volume > 0.0 {
            self.set(0.0)
        } else {
            self.set(self.previous)
        }
    }
}

impl Default for VolumeControl {
    fn default() -> Self {
        Self::new(default_volume())
    }
}

fn sanitize(volume: f32) -> f32 {
    if volume.is_finite() {
        volume.clamp(0.0, 1.0)
    } else {
        default_volume()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_thresholds() {
        assert_eq!(VolumeLevel::from_volume(0.0), VolumeLevel::Muted);
        assert_eq!(VolumeLevel::from_volume(0.29), VolumeLevel::Low);
        assert_eq!(VolumeLevel::from_volume(0.3), VolumeLevel::Medium);
        assert_eq!(VolumeLevel::from_volume(0.69), VolumeLevel::Medium);
        assert_eq!(VolumeLevel::from_volume(0.7), VolumeLevel::High);
    }

    #[test]
    fn locked_until_enabled() {
        let mut volume = VolumeControl::default();
        assert_eq!(volume.set(0.2), None);
        assert_eq!(volume.volume(), 0.7);

        volume.enable();
        assert_eq!(volume.set(0.2), Some(0.2));
    }

    #[test]
    fn unmute_restores_last_audible_volume() {
        let mut volume = VolumeControl::new(0.4);
        volume.enable();
        assert_eq!(volume.toggle_mute(), Some(0.0));
        assert_eq!(volume.level(), VolumeLevel::Muted);
        assert_eq!(volume.toggle_mute(), Some(0.4));
    }

    #[test]
    fn muted_start_unmutes_to_default() {
        let mut volume = VolumeControl::new(0.0);
        volume.enable();
        assert_eq!(volume.toggle_mute(), Some(0.7));
    }

    #[test]
    fn steps_clamp_to_range() {
        let mut volume = VolumeControl::new(0.95);
        volume.enable();
        assert_eq!(volume.step(0.1), Some(1.0));
        let mut volume = VolumeControl::new(0.05);
        volume.enable();
        assert_eq!(volume.step(-0.1), Some(0.0));
        assert_eq!(VolumeControl::new(f32::NAN).volume(), 0.7);
    }
}
