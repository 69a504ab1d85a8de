//! Real-time clock and sensor collaborator

use crate::{
    error::Error,
    system_state::{EnvData, TimeData},
};

/// Clock, environment, ambient light and proximity sensors
///
/// Drivers for the individual chips live behind this trait. The time fields of the
/// real-time clock are the only state the device persists.
pub trait Sensors {
    /// Reads the current time, [`Error::Rtc`] on a bus failure
    fn time(&mut self) -> Result<TimeData, Error>;

    /// Writes the time; the clock recomputes the day of the week itself
    fn set_time(&mut self, time: &TimeData) -> Result<(), Error>;

    /// Reads temperature, humidity and pressure
    ///
    /// `seconds_active` is the time since the device last woke up. The sensor sits next
    /// to parts that warm up while awake and the reading is compensated for that.
    fn environment(&mut self, seconds_active: u32) -> Result<EnvData, Error>;

    /// Ambient light in millilux
    fn light_level(&mut self) -> Result<u32, Error>;

    /// Acknowledges the proximity interrupt latch
    fn clear_proximity_interrupt(&mut self) -> Result<(), Error>;
}
