//! Display brightness following the ambient light level

use moving_median::MovingMedian;

/// Lowest brightness level, keeps the panel readable in the dark
pub const MIN_BRIGHTNESS: u8 = 10;
/// Highest brightness level
pub const MAX_BRIGHTNESS: u8 = 80;
/// Ambient light assumed at power-up, in millilux
pub const STARTING_MILLILUX: u32 = 25_000;
/// Samples in the smoothing window
const WINDOW: usize = 9;

/// Maps ambient millilux to a brightness level
#[must_use]
pub fn millilux_to_brightness(millilux: u32) -> u8 {
    let level = (millilux / 128).clamp(u32::from(MIN_BRIGHTNESS), u32::from(MAX_BRIGHTNESS));
    #[allow(clippy::cast_possible_truncation)]
    let level = level as u8;
    level
}

/// Smooths the ambient light and walks the brightness towards it one level at a time
pub struct Brightness {
    /// Recent ambient light samples in millilux
    ambient: MovingMedian<f32, WINDOW>,
    /// Level currently applied to the panel
    current: u8,
}

impl Default for Brightness {
    fn default() -> Self {
        Self::new()
    }
}

impl Brightness {
    /// Starts at the level for [`STARTING_MILLILUX`]
    #[must_use]
    pub fn new() -> Self {
        let mut ambient = MovingMedian::new();
        #[allow(clippy::cast_precision_loss)]
        ambient.add_value(STARTING_MILLILUX as f32);
        Self {
            ambient,
            current: millilux_to_brightness(STARTING_MILLILUX),
        }
    }

    /// Level currently applied
    #[must_use]
    pub const fn current(&self) -> u8 {
        self.current
    }

    /// Feeds a new ambient reading, returns the new level if it moved
    pub fn update(&mut self, millilux: u32) -> Option<u8> {
        #[allow(clippy::cast_precision_loss)]
        self.ambient.add_value(millilux as f32);

        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let smoothed = self.ambient.median() as u32;
        let target = millilux_to_brightness(smoothed);

        let previous = self.current;
        if target > self.current {
            self.current += 1;
        } else if target < self.current {
            self.current -= 1;
        }
        (self.current != previous).then_some(self.current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_is_clamped() {
        assert_eq!(millilux_to_brightness(0), MIN_BRIGHTNESS);
        assert_eq!(millilux_to_brightness(128 * 40), 40);
        assert_eq!(millilux_to_brightness(1_573_000), MAX_BRIGHTNESS);
    }

    #[test]
    fn steps_one_level_per_update() {
        let mut brightness = Brightness::new();
        assert_eq!(brightness.current(), millilux_to_brightness(STARTING_MILLILUX));

        let mut levels = vec![brightness.current()];
        for _ in 0..100 {
            if let Some(level) = brightness.update(0) {
                levels.push(level);
            }
        }
        assert!(levels.windows(2).all(|pair| pair[1] + 1 == pair[0]));
        assert_eq!(brightness.current(), MIN_BRIGHTNESS);
    }

    #[test]
    fn single_outlier_is_ignored() {
        let mut brightness = Brightness::new();
        for _ in 0..WINDOW {
            brightness.update(STARTING_MILLILUX);
        }
        let settled = brightness.current();
        assert_eq!(brightness.update(0), None);
        assert_eq!(brightness.current(), settled);
    }
}
