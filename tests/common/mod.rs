//! Recording collaborators for driving the state machine on the host
#![allow(dead_code, clippy::unwrap_used, clippy::expect_used, missing_docs)]

use bt_receiver::{
    EnvData, ModuleState, PlayerStateMachine, SharedEventQueue, TimeData,
    bt_module::{BtModule, Metadata, ModuleStatus, Passkey},
    display::{Display, TextPos},
    error::Error,
    power::{InactivityTimer, PowerControl, PowerProfile},
    sensors::Sensors,
    system_state::ClockField,
};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_time::{Duration, Instant};
use embedded_hal::delay::DelayNs;
use heapless::String as HString;

/// One call into the display
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Drawn {
    Notify { new: ModuleState, old: ModuleState },
    ClockAndWeather(TimeData, EnvData),
    Meta(Metadata),
    Menu,
    ExitMenu,
    AdjustClock(TimeData, ClockField),
    Text(TextPos, String, String),
}

/// Display that records what it was asked to draw
#[derive(Debug)]
pub struct RecordingDisplay {
    pub drawn: Vec<Drawn>,
    pub updates: usize,
    pub millilux: Vec<u32>,
    /// Cleared by a disconnect from a connected state, tests set it when the animation "ends"
    pub disconnect_done: bool,
}

impl Default for RecordingDisplay {
    fn default() -> Self {
        Self {
            drawn: Vec::new(),
            updates: 0,
            millilux: Vec::new(),
            disconnect_done: true,
        }
    }
}

impl RecordingDisplay {
    pub fn count(&self, pred: impl Fn(&Drawn) -> bool) -> usize {
        self.drawn.iter().filter(|d| pred(d)).count()
    }

    pub fn clocks(&self) -> usize {
        self.count(|d| matches!(d, Drawn::ClockAndWeather(..)))
    }

    pub fn last(&self) -> Option<&Drawn> {
        self.drawn.last()
    }

    pub fn texts(&self) -> Vec<(TextPos, String, String)> {
        self.drawn
            .iter()
            .filter_map(|d| match d {
                Drawn::Text(pos, l1, l2) => Some((*pos, l1.clone(), l2.clone())),
                _ => None,
            })
            .collect()
    }
}

impl Display for RecordingDisplay {
    fn notify_new_module_state(&mut self, new: ModuleState, old: ModuleState, _now: Instant) {
        if new == ModuleState::Disconnected && old.is_connected() {
            self.disconnect_done = false;
        }
        self.drawn.push(Drawn::Notify { new, old });
    }

    fn update(&mut self, _now: Instant) -> bool {
        self.updates += 1;
        false
    }

    fn draw_clock_and_weather(&mut self, time: &TimeData, env: &EnvData) {
        self.drawn.push(Drawn::ClockAndWeather(*time, *env));
    }

    fn draw_meta_text(&mut self, metadata: &Metadata) {
        self.drawn.push(Drawn::Meta(metadata.clone()));
    }

    fn draw_menu(&mut self) {
        self.drawn.push(Drawn::Menu);
    }

    fn exit_menu(&mut self) {
        self.drawn.push(Drawn::ExitMenu);
    }

    fn draw_adjust_clock(&mut self, time: &TimeData, highlight: ClockField) {
        self.drawn.push(Drawn::AdjustClock(*time, highlight));
    }

    fn draw_text(&mut self, pos: TextPos, line1: &str, line2: &str) {
        self.drawn.push(Drawn::Text(pos, line1.to_owned(), line2.to_owned()));
    }

    fn disconnect_anim_is_done(&self) -> bool {
        self.disconnect_done
    }

    fn update_brightness(&mut self, millilux: u32) {
        self.millilux.push(millilux);
    }
}

/// Bluetooth module with scripted answers
#[derive(Debug)]
pub struct ScriptedBt {
    pub commands: Vec<&'static str>,
    pub status: Result<ModuleStatus, Error>,
    pub metadata: Result<Metadata, Error>,
    pub passkey: Option<Passkey>,
    pub command_result: Result<(), Error>,
    pub passkey_polls: usize,
}

impl Default for ScriptedBt {
    fn default() -> Self {
        Self {
            commands: Vec::new(),
            status: Ok(ModuleStatus(1)),
            metadata: Ok(metadata("Artist", "Title")),
            passkey: None,
            command_result: Ok(()),
            passkey_polls: 0,
        }
    }
}

impl ScriptedBt {
    fn command(&mut self, name: &'static str) -> Result<(), Error> {
        self.commands.push(name);
        self.command_result
    }
}

impl BtModule for ScriptedBt {
    fn vol_up(&mut self) -> Result<(), Error> {
        self.command("vol_up")
    }

    fn vol_down(&mut self) -> Result<(), Error> {
        self.command("vol_down")
    }

    fn track_next(&mut self) -> Result<(), Error> {
        self.command("track_next")
    }

    fn track_prev(&mut self) -> Result<(), Error> {
        self.command("track_prev")
    }

    fn play_pause(&mut self) -> Result<(), Error> {
        self.command("play_pause")
    }

    fn enter_pairing_mode(&mut self) -> Result<(), Error> {
        self.command("enter_pairing_mode")
    }

    fn exit_pairing_mode(&mut self) -> Result<(), Error> {
        self.command("exit_pairing_mode")
    }

    fn accept_pairing(&mut self) -> Result<(), Error> {
        self.command("accept_pairing")
    }

    fn reset_pairings(&mut self) -> Result<(), Error> {
        self.command("reset_pairings")
    }

    fn await_pairing_passkey(&mut self, _timeout: Duration) -> Option<Passkey> {
        self.passkey_polls += 1;
        self.passkey.take()
    }

    fn metadata(&mut self) -> Result<Metadata, Error> {
        self.metadata.clone()
    }

    fn query_status(&mut self) -> Result<ModuleStatus, Error> {
        self.status
    }
}

/// Power control with a real inactivity timer and recorded actions
#[derive(Debug, Default)]
pub struct RecordingPower {
    pub profiles: Vec<PowerProfile>,
    pub timer: InactivityTimer,
    pub inactivity_resets: usize,
    pub sleeps: usize,
    pub system_resets: usize,
    /// Returned by `sleep`
    pub wake_at: Option<Instant>,
}

impl PowerControl for RecordingPower {
    fn set_state(&mut self, profile: PowerProfile) {
        self.profiles.push(profile);
    }

    fn sleep(&mut self) -> Instant {
        self.sleeps += 1;
        self.wake_at.unwrap_or(Instant::from_ticks(0))
    }

    fn time_to_sleep(&self, now: Instant) -> bool {
        self.timer.expired(now)
    }

    fn reset_inactivity_timer(&mut self, now: Instant) {
        self.inactivity_resets += 1;
        self.timer.reset(now);
    }

    fn system_reset(&mut self) {
        self.system_resets += 1;
    }

    fn halt(&mut self) -> ! {
        panic!("device halted");
    }
}

/// Clock and sensors backed by plain fields
#[derive(Debug)]
pub struct FakeSensors {
    pub time: TimeData,
    pub env: EnvData,
    pub written: Vec<TimeData>,
    pub seconds_active: Vec<u32>,
    pub millilux: u32,
    pub proximity_clears: usize,
}

impl Default for FakeSensors {
    fn default() -> Self {
        Self {
            time: TimeData {
                seconds: 0,
                minutes: 59,
                hours: 23,
                day_of_week: 5,
                day_of_month: 16,
                month: 10,
                year: 99,
            },
            env: EnvData {
                temperature: 2150,
                humidity: 45_000,
                pressure: 101_300,
            },
            written: Vec::new(),
            seconds_active: Vec::new(),
            millilux: 1000,
            proximity_clears: 0,
        }
    }
}

impl Sensors for FakeSensors {
    fn time(&mut self) -> Result<TimeData, Error> {
        Ok(self.time)
    }

    fn set_time(&mut self, time: &TimeData) -> Result<(), Error> {
        self.written.push(*time);
        self.time = *time;
        Ok(())
    }

    fn environment(&mut self, seconds_active: u32) -> Result<EnvData, Error> {
        self.seconds_active.push(seconds_active);
        Ok(self.env)
    }

    fn light_level(&mut self) -> Result<u32, Error> {
        Ok(self.millilux)
    }

    fn clear_proximity_interrupt(&mut self) -> Result<(), Error> {
        self.proximity_clears += 1;
        Ok(())
    }
}

/// Delay that only adds up what it was asked to wait
#[derive(Debug, Default)]
pub struct CountingDelay {
    pub total_ns: u64,
}

impl DelayNs for CountingDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.total_ns += u64::from(ns);
    }
}

pub type Machine<'q> =
    PlayerStateMachine<'q, CriticalSectionRawMutex, ScriptedBt, RecordingDisplay, RecordingPower, FakeSensors, CountingDelay>;

/// State machine with default collaborators
pub fn machine(queue: &SharedEventQueue) -> Machine<'_> {
    PlayerStateMachine::new(
        queue,
        ScriptedBt::default(),
        RecordingDisplay::default(),
        RecordingPower::default(),
        FakeSensors::default(),
        CountingDelay::default(),
    )
}

/// State machine with a custom Bluetooth module
pub fn machine_with_bt(queue: &SharedEventQueue, bt: ScriptedBt) -> Machine<'_> {
    PlayerStateMachine::new(
        queue,
        bt,
        RecordingDisplay::default(),
        RecordingPower::default(),
        FakeSensors::default(),
        CountingDelay::default(),
    )
}

/// Milliseconds after boot
pub fn at(ms: u64) -> Instant {
    Instant::from_millis(ms)
}

pub fn metadata(artist: &str, title: &str) -> Metadata {
    let mut meta = Metadata::default();
    meta.artist.push_str(artist).unwrap();
    meta.title.push_str(title).unwrap();
    meta
}

pub fn passkey(code: &str) -> Passkey {
    let mut key = HString::new();
    key.push_str(code).unwrap();
    key
}
