//! Error type shared by the control core and its collaborators
//!
//! All variants carry fixed-size data only, nothing here allocates.

/// Errors reported by the collaborators and the state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// The Bluetooth module did not answer the status query
    ModuleStatusQuery,
    /// The Bluetooth module reported the limbo state
    ModuleInLimbo,
    /// The Bluetooth module reported a state code we have no mapping for
    UnknownModuleState(u8),
    /// Track metadata could not be fetched from the Bluetooth module
    Metadata,
    /// A Bluetooth action command was rejected, not fatal
    Command,
    /// The real-time clock could not be read or written
    Rtc,
    /// The temperature/humidity/pressure sensor could not be read
    EnvironmentSensor,
    /// The ambient light sensor could not be read
    LightSensor,
    /// The display panel did not take a frame, not fatal
    Display,
}

impl Error {
    /// Whether the error leaves the device without a way to continue
    #[must_use]
    pub const fn is_fatal(self) -> bool {
        !matches!(self, Self::Command | Self::Display)
    }

    /// The two lines shown on the error screen before halting
    #[must_use]
    pub const fn screen_text(self) -> (&'static str, &'static str) {
        match self {
            Self::ModuleStatusQuery => ("Bluetooth", "Status error"),
            Self::ModuleInLimbo => ("Bluetooth", "in limbo"),
            Self::UnknownModuleState(_) => ("Bluetooth", "Unknown state"),
            Self::Metadata => ("Bluetooth", "Metadata error"),
            Self::Command => ("Bluetooth", "Command failed"),
            Self::Rtc => ("Clock", "RTC failure"),
            Self::EnvironmentSensor => ("Sensor", "Sensor failure"),
            Self::LightSensor => ("Sensor", "ALS read fail"),
            Self::Display => ("Display", "Flush failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_command_and_display_errors_are_recoverable() {
        assert!(!Error::Command.is_fatal());
        assert!(!Error::Display.is_fatal());
        assert!(Error::ModuleInLimbo.is_fatal());
        assert!(Error::Metadata.is_fatal());
        assert!(Error::UnknownModuleState(7).is_fatal());
    }

    #[test]
    fn limbo_screen_names_the_module() {
        assert_eq!(Error::ModuleInLimbo.screen_text(), ("Bluetooth", "in limbo"));
    }
}
