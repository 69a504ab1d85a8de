//! State types shared between the state machine, the display and the collaborators

/// Last reported connection phase of the Bluetooth module
#[derive(Debug, Eq, PartialEq, Copy, Clone, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ModuleState {
    /// No source connected, the clock screen is shown
    #[default]
    Disconnected,
    /// Discoverable and waiting for a source to pair
    Pairing,
    /// A source is connected but not streaming
    Connected,
    /// A source is connected and streaming audio
    ConnectedStreaming,
}

impl ModuleState {
    /// Whether a source is connected, streaming or not
    #[must_use]
    pub const fn is_connected(self) -> bool {
        matches!(self, Self::Connected | Self::ConnectedStreaming)
    }
}

/// Local UI mode, independent of the module state
#[derive(Debug, Eq, PartialEq, Copy, Clone, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum UiState {
    /// Buttons follow the module state
    #[default]
    Normal,
    /// The settings menu is shown
    Menu,
    /// The clock is being adjusted
    SetClock,
    /// Pairing, waiting for a source to present a passkey
    PairingListening,
    /// Pairing, waiting for the user to confirm the passkey
    PairingGotCode,
}

/// Editable field of the clock, in cursor order
#[derive(Debug, Eq, PartialEq, Copy, Clone, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ClockField {
    /// Day of the month, 1..=31
    #[default]
    DayOfMonth,
    /// Month, 1..=12
    Month,
    /// Two-digit year, 0..=99
    Year,
    /// Hours, 0..=23
    Hours,
    /// Minutes, 0..=59
    Minutes,
}

impl ClockField {
    /// All fields in cursor order
    pub const ALL: [Self; 5] = [Self::DayOfMonth, Self::Month, Self::Year, Self::Hours, Self::Minutes];

    /// The field after this one, wrapping from minutes to day of month
    #[must_use]
    pub const fn next(self) -> Self {
        match self {
            Self::DayOfMonth => Self::Month,
            Self::Month => Self::Year,
            Self::Year => Self::Hours,
            Self::Hours => Self::Minutes,
            Self::Minutes => Self::DayOfMonth,
        }
    }

    /// The field before this one, wrapping from day of month to minutes
    #[must_use]
    pub const fn prev(self) -> Self {
        match self {
            Self::DayOfMonth => Self::Minutes,
            Self::Month => Self::DayOfMonth,
            Self::Year => Self::Month,
            Self::Hours => Self::Year,
            Self::Minutes => Self::Hours,
        }
    }

    /// Inclusive bounds of the field
    #[must_use]
    pub const fn bounds(self) -> (u8, u8) {
        match self {
            Self::DayOfMonth => (1, 31),
            Self::Month => (1, 12),
            Self::Year => (0, 99),
            Self::Hours => (0, 23),
            Self::Minutes => (0, 59),
        }
    }
}

/// Calendar time as kept by the real-time clock, binary coded
#[derive(Debug, Eq, PartialEq, Copy, Clone)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TimeData {
    /// Seconds, 0..=59
    pub seconds: u8,
    /// Minutes, 0..=59
    pub minutes: u8,
    /// Hours, 0..=23
    pub hours: u8,
    /// Day of the week, 0 = Sunday; recomputed by the clock on write
    pub day_of_week: u8,
    /// Day of the month, 1..=31
    pub day_of_month: u8,
    /// Month, 1..=12
    pub month: u8,
    /// Two-digit year, 0..=99
    pub year: u8,
}

impl Default for TimeData {
    /// 1 January 2020, midnight; what the device boots with
    fn default() -> Self {
        Self {
            seconds: 0,
            minutes: 0,
            hours: 0,
            day_of_week: 3,
            day_of_month: 1,
            month: 1,
            year: 20,
        }
    }
}

impl TimeData {
    /// Current value of a clock field
    #[must_use]
    pub const fn field(&self, field: ClockField) -> u8 {
        match field {
            ClockField::DayOfMonth => self.day_of_month,
            ClockField::Month => self.month,
            ClockField::Year => self.year,
            ClockField::Hours => self.hours,
            ClockField::Minutes => self.minutes,
        }
    }

    /// Mutable access to a clock field
    const fn field_mut(&mut self, field: ClockField) -> &mut u8 {
        match field {
            ClockField::DayOfMonth => &mut self.day_of_month,
            ClockField::Month => &mut self.month,
            ClockField::Year => &mut self.year,
            ClockField::Hours => &mut self.hours,
            ClockField::Minutes => &mut self.minutes,
        }
    }

    /// Increments a field, rolling over to its minimum after its maximum
    pub const fn increment(&mut self, field: ClockField) {
        let (min, max) = field.bounds();
        let value = self.field_mut(field);
        *value = if *value >= max { min } else { *value + 1 };
    }

    /// Decrements a field, rolling over to its maximum below its minimum
    pub const fn decrement(&mut self, field: ClockField) {
        let (min, max) = field.bounds();
        let value = self.field_mut(field);
        *value = if *value <= min { max } else { *value - 1 };
    }
}

/// One reading of the environment sensor
#[derive(Debug, Eq, PartialEq, Copy, Clone, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct EnvData {
    /// Temperature in hundredths of a degree Celsius
    pub temperature: i32,
    /// Relative humidity in thousandths of a percent
    pub humidity: u32,
    /// Pressure in pascal
    pub pressure: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cursor_wraps_in_both_directions() {
        assert_eq!(ClockField::Minutes.next(), ClockField::DayOfMonth);
        assert_eq!(ClockField::DayOfMonth.prev(), ClockField::Minutes);
        for field in ClockField::ALL {
            assert_eq!(field.next().prev(), field);
        }
    }

    #[test]
    fn year_at_99_increments_to_0() {
        let mut time = TimeData { year: 99, ..TimeData::default() };
        time.increment(ClockField::Year);
        assert_eq!(time.year, 0);
    }

    #[test]
    fn day_of_month_at_1_decrements_to_31() {
        let mut time = TimeData { day_of_month: 1, ..TimeData::default() };
        time.decrement(ClockField::DayOfMonth);
        assert_eq!(time.day_of_month, 31);
    }

    #[test]
    fn hours_at_23_increments_to_0() {
        let mut time = TimeData { hours: 23, ..TimeData::default() };
        time.increment(ClockField::Hours);
        assert_eq!(time.hours, 0);
    }

    #[test]
    fn editing_one_field_leaves_the_others_alone() {
        let mut time = TimeData::default();
        time.increment(ClockField::Minutes);
        time.decrement(ClockField::Month);
        assert_eq!(time.minutes, 1);
        assert_eq!(time.month, 12);
        assert_eq!(time.day_of_month, 1);
        assert_eq!(time.year, 20);
        assert_eq!(time.hours, 0);
    }

    #[test]
    fn every_field_stays_in_bounds_over_a_full_cycle() {
        for field in ClockField::ALL {
            let (min, max) = field.bounds();
            let mut time = TimeData::default();
            for _ in 0..=u32::from(max) + 2 {
                time.increment(field);
                assert!((min..=max).contains(&time.field(field)));
            }
            for _ in 0..=u32::from(max) + 2 {
                time.decrement(field);
                assert!((min..=max).contains(&time.field(field)));
            }
        }
    }
}
