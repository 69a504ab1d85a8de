//! Bluetooth module collaborator and decoding of its status word

use embassy_time::Duration;
use heapless::String;

use crate::{error::Error, system_state::ModuleState};

/// Maximum length of a metadata field we keep
pub const METADATA_FIELD_LEN: usize = 64;

/// Six-digit pairing passkey as presented by the source
pub type Passkey = String<6>;

/// Track metadata of the currently playing source
#[derive(Debug, Default, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Metadata {
    /// Artist, possibly empty
    pub artist: String<METADATA_FIELD_LEN>,
    /// Track title, possibly empty
    pub title: String<METADATA_FIELD_LEN>,
}

/// Actions and queries the state machine needs from the Bluetooth module
///
/// The serial command protocol lives behind this trait.
pub trait BtModule {
    /// Raise the source's volume
    fn vol_up(&mut self) -> Result<(), Error>;
    /// Lower the source's volume
    fn vol_down(&mut self) -> Result<(), Error>;
    /// Skip to the next track
    fn track_next(&mut self) -> Result<(), Error>;
    /// Skip to the previous track
    fn track_prev(&mut self) -> Result<(), Error>;
    /// Toggle play and pause
    fn play_pause(&mut self) -> Result<(), Error>;
    /// Become discoverable
    fn enter_pairing_mode(&mut self) -> Result<(), Error>;
    /// Stop being discoverable
    fn exit_pairing_mode(&mut self) -> Result<(), Error>;
    /// Confirm the passkey shown on the screen
    fn accept_pairing(&mut self) -> Result<(), Error>;
    /// Forget every stored pairing
    fn reset_pairings(&mut self) -> Result<(), Error>;
    /// Waits at most `timeout` for a pairing passkey from the source
    fn await_pairing_passkey(&mut self, timeout: Duration) -> Option<Passkey>;
    /// Fetches artist and title of the current track
    fn metadata(&mut self) -> Result<Metadata, Error>;
    /// Reads the status word, [`Error::ModuleStatusQuery`] if the module does not answer
    fn query_status(&mut self) -> Result<ModuleStatus, Error>;
}

/// Connection state codes reported in the low nibble of the status word
pub mod state_code {
    /// Not ready
    pub const LIMBO: u8 = 0;
    /// Connectable, not discoverable
    pub const CONNECTABLE: u8 = 1;
    /// Discoverable and connectable
    pub const DISCOVERABLE_CONNECTABLE: u8 = 2;
    /// A source is connected
    pub const CONNECTED: u8 = 3;
    /// A source is streaming audio
    pub const AUDIO_STREAMING: u8 = 13;
    /// Connected, battery low
    pub const LOW_BATTERY: u8 = 14;
}

/// Status word of the Bluetooth module
///
/// Low nibble: connection state. Bits 4 and 5: volume change events.
/// High byte: profile connections and notification events.
#[derive(Debug, Eq, PartialEq, Copy, Clone)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ModuleStatus(pub u16);

impl ModuleStatus {
    /// Audio volume level changed
    pub const AUDIO_VOL_CHANGE: u16 = 1 << 4;
    /// Microphone volume level changed
    pub const MIC_VOL_CHANGE: u16 = 1 << 5;
    /// iAP connection active
    pub const CON_IAP: u16 = 1 << 8;
    /// SPP connection active
    pub const CON_SPP: u16 = 1 << 9;
    /// A2DP connection active
    pub const CON_A2DP: u16 = 1 << 10;
    /// HFP/HSP connection active
    pub const CON_HFP_HSP: u16 = 1 << 11;
    /// Caller id notification
    pub const CALLER_ID: u16 = 1 << 12;
    /// The track changed
    pub const TRACK_CHANGE: u16 = 1 << 13;

    /// The connection state code in the low nibble
    #[must_use]
    pub const fn state_code(self) -> u8 {
        (self.0 & 0x0f) as u8
    }

    /// An all-zero status word means the module is not ready at all
    #[must_use]
    pub const fn is_limbo(self) -> bool {
        self.0 == 0
    }

    /// Whether the given flag bit is set
    #[must_use]
    pub const fn has(self, flag: u16) -> bool {
        self.0 & flag != 0
    }

    /// Whether the status reports a track change
    #[must_use]
    pub const fn track_changed(self) -> bool {
        self.has(Self::TRACK_CHANGE)
    }

    /// Translates the state code to our connectivity state
    ///
    /// # Errors
    ///
    /// [`Error::UnknownModuleState`] for call related and reserved codes.
    pub const fn module_state(self) -> Result<ModuleState, Error> {
        match self.state_code() {
            state_code::LIMBO | state_code::CONNECTABLE => Ok(ModuleState::Disconnected),
            state_code::DISCOVERABLE_CONNECTABLE => Ok(ModuleState::Pairing),
            state_code::CONNECTED | state_code::LOW_BATTERY => Ok(ModuleState::Connected),
            state_code::AUDIO_STREAMING => Ok(ModuleState::ConnectedStreaming),
            code => Err(Error::UnknownModuleState(code)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn low_nibble_selects_the_state() {
        assert_eq!(ModuleStatus(0x0401).module_state(), Ok(ModuleState::Disconnected));
        assert_eq!(ModuleStatus(0x0002).module_state(), Ok(ModuleState::Pairing));
        assert_eq!(ModuleStatus(0x0403).module_state(), Ok(ModuleState::Connected));
        assert_eq!(ModuleStatus(0x040e).module_state(), Ok(ModuleState::Connected));
        assert_eq!(ModuleStatus(0x240d).module_state(), Ok(ModuleState::ConnectedStreaming));
    }

    #[test]
    fn call_states_are_not_mapped() {
        assert_eq!(ModuleStatus(0x0805).module_state(), Err(Error::UnknownModuleState(5)));
    }

    #[test]
    fn only_an_all_zero_word_is_limbo() {
        assert!(ModuleStatus(0).is_limbo());
        assert!(!ModuleStatus(0x0400).is_limbo());
        assert_eq!(ModuleStatus(0x0400).module_state(), Ok(ModuleState::Disconnected));
    }

    #[test]
    fn track_change_flag_is_bit_13() {
        assert!(ModuleStatus(0x240d).track_changed());
        assert!(!ModuleStatus(0x040d).track_changed());
        assert!(ModuleStatus(0x240d).has(ModuleStatus::CON_A2DP));
    }
}
