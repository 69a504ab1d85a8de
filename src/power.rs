//! Power profiles, sleep and the inactivity timer

use embassy_time::{Duration, Instant};

/// Inactivity after which a disconnected device goes to sleep
pub const INACTIVITY_SLEEP_TIME: Duration = Duration::from_secs(3 * 60);

/// Which rails and peripherals are powered
#[derive(Debug, Eq, PartialEq, Copy, Clone)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PowerProfile {
    /// Everything off but the wake sources
    Sleep,
    /// Display, buttons and Bluetooth module on, amplifier off
    Clock,
    /// Everything on
    Connected,
}

/// Power rail sequencing and low-power sleep
pub trait PowerControl {
    /// Switches the power profile; switching to the current profile does nothing
    fn set_state(&mut self, profile: PowerProfile);

    /// Enters low-power sleep and blocks until a wake interrupt fires
    ///
    /// Peripherals are brought back up before returning. Returns the wake-up instant.
    fn sleep(&mut self) -> Instant;

    /// Whether the inactivity timeout has passed
    fn time_to_sleep(&self, now: Instant) -> bool;

    /// Restarts the inactivity timeout
    fn reset_inactivity_timer(&mut self, now: Instant);

    /// Resets the whole device
    fn system_reset(&mut self);

    /// Stops the device after a fatal error, waiting for the user to power cycle
    fn halt(&mut self) -> !;
}

/// Deadline based inactivity timeout
#[derive(Debug, Clone, Copy)]
pub struct InactivityTimer {
    /// How long the device may stay idle
    timeout: Duration,
    /// When the last activity was seen
    last_activity: Instant,
}

impl Default for InactivityTimer {
    fn default() -> Self {
        Self::new(INACTIVITY_SLEEP_TIME)
    }
}

impl InactivityTimer {
    /// Creates a timer that considers the device active at boot
    #[must_use]
    pub const fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            last_activity: Instant::from_ticks(0),
        }
    }

    /// Records activity at `now`
    pub const fn reset(&mut self, now: Instant) {
        self.last_activity = now;
    }

    /// Whether strictly more than the timeout has passed since the last activity
    #[must_use]
    pub fn expired(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.last_activity) > self.timeout
    }
}
