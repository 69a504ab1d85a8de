//! The player state machine, the main loop of the device
//!
//! Consumes the event queue and drives the display, the Bluetooth module, the power
//! rails and the sensors. Two state variables decide what an event means: the
//! module's connectivity state and the local UI state.

use core::fmt::Write;

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_time::{Duration, Instant, Timer};
use embedded_hal::delay::DelayNs;
use heapless::String;

use crate::{
    bt_module::BtModule,
    display::{Display, TextPos},
    error::Error,
    event::{Event, EventKind, EventQueue},
    power::{PowerControl, PowerProfile},
    sensors::Sensors,
    system_state::{ClockField, ModuleState, UiState},
};

/// Pause between two main loop iterations
pub const LOOP_TICK: Duration = Duration::from_millis(5);
/// How long play has to be held to count as a long press
pub const LONG_PRESS: Duration = Duration::from_millis(2000);
/// How long one passkey poll may wait for the module
pub const PASSKEY_POLL_TIMEOUT: Duration = Duration::from_millis(50);
/// How long the "pairings cleared" confirmation stays up
pub const PAIRINGS_CLEARED_HOLD_MS: u32 = 1800;

/// Turns a rejected command into a warning, passes everything else on
fn recoverable(result: Result<(), Error>) -> Result<(), Error> {
    match result {
        Err(e) if !e.is_fatal() => {
            warn!("ignoring failed command: {}", e);
            Ok(())
        }
        other => other,
    }
}

/// Top level state machine of the receiver
///
/// Owns every collaborator and borrows the event queue, which interrupt handlers post
/// into concurrently.
pub struct PlayerStateMachine<'q, M, B, D, P, S, W>
where
    M: RawMutex,
{
    /// Shared with the interrupt handlers
    queue: &'q EventQueue<M>,
    /// Bluetooth module
    bt: B,
    /// Screen and animations
    display: D,
    /// Power rails and sleep
    power: P,
    /// Clock and sensors
    sensors: S,
    /// Blocking delay for confirmation screens
    delay: W,
    /// Last reported module state
    module_state: ModuleState,
    /// Local UI mode
    ui_state: UiState,
    /// When play was pressed, while it is held
    play_pressed_at: Option<Instant>,
    /// The clock screen waits for the disconnect animation
    redraw_after_disconnect: bool,
    /// Field under the cursor while adjusting the clock
    clock_field: ClockField,
    /// When the device last woke up
    last_wake: Instant,
}

impl<'q, M, B, D, P, S, W> PlayerStateMachine<'q, M, B, D, P, S, W>
where
    M: RawMutex,
    B: BtModule,
    D: Display,
    P: PowerControl,
    S: Sensors,
    W: DelayNs,
{
    /// Creates the state machine in the disconnected, normal state
    pub const fn new(queue: &'q EventQueue<M>, bt: B, display: D, power: P, sensors: S, delay: W) -> Self {
        Self {
            queue,
            bt,
            display,
            power,
            sensors,
            delay,
            module_state: ModuleState::Disconnected,
            ui_state: UiState::Normal,
            play_pressed_at: None,
            redraw_after_disconnect: false,
            clock_field: ClockField::DayOfMonth,
            last_wake: Instant::from_ticks(0),
        }
    }

    /// Last reported module state
    pub const fn module_state(&self) -> ModuleState {
        self.module_state
    }

    /// Current UI mode
    pub const fn ui_state(&self) -> UiState {
        self.ui_state
    }

    /// Field under the cursor while adjusting the clock
    pub const fn clock_field(&self) -> ClockField {
        self.clock_field
    }

    /// Whether the clock screen is held back until the disconnect animation is done
    pub const fn redraw_pending(&self) -> bool {
        self.redraw_after_disconnect
    }

    /// The Bluetooth module
    pub const fn bt(&self) -> &B {
        &self.bt
    }

    /// The display
    pub const fn display(&self) -> &D {
        &self.display
    }

    /// The display, e.g. to let an animation finish
    pub const fn display_mut(&mut self) -> &mut D {
        &mut self.display
    }

    /// The power control
    pub const fn power(&self) -> &P {
        &self.power
    }

    /// The sensors
    pub const fn sensors(&self) -> &S {
        &self.sensors
    }

    /// Runs the device, never returns
    ///
    /// A fatal error is shown on the screen, then the device halts.
    pub async fn run(&mut self) -> ! {
        self.start(Instant::now());
        loop {
            if let Err(e) = self.step(Instant::now()) {
                self.halt(e);
            }
            Timer::after(LOOP_TICK).await;
        }
    }

    /// Boot: considers the device active, starts the clock screen
    pub fn start(&mut self, now: Instant) {
        info!("player state machine starting");
        self.last_wake = now;
        self.power.reset_inactivity_timer(now);
        self.display
            .notify_new_module_state(ModuleState::Disconnected, ModuleState::Disconnected, now);
        self.queue.post_event(EventKind::ClockTick);
    }

    /// One main loop iteration at `now`, without the tick delay
    pub fn step(&mut self, now: Instant) -> Result<(), Error> {
        while self.queue.event_is_pending() {
            let event = self.queue.next_pending_event();
            self.process_event(event, now)?;
        }

        if self.redraw_after_disconnect && self.display.disconnect_anim_is_done() {
            debug!("disconnect animation done, back to the clock");
            self.redraw_after_disconnect = false;
            self.display
                .notify_new_module_state(ModuleState::Disconnected, ModuleState::Disconnected, now);
            self.queue.post_event(EventKind::ClockTick);
        }

        if self
            .play_pressed_at
            .is_some_and(|pressed| now.saturating_duration_since(pressed) > LONG_PRESS)
        {
            self.play_pressed_at = None;
            self.queue.post_event(EventKind::PlayLongPress);
        }

        if self.ui_state == UiState::PairingListening {
            self.listen_for_passkey();
        }

        self.display.update(now);
        let millilux = self.sensors.light_level()?;
        self.display.update_brightness(millilux);

        self.sleep_if_inactive(now);
        Ok(())
    }

    /// Shows the error and stops
    fn halt(&mut self, error: Error) -> ! {
        error!("fatal: {}", error);
        let (line1, line2) = error.screen_text();
        self.display.draw_text(TextPos::Fullscreen, line1, line2);
        self.power.halt()
    }

    /// Sleeps while disconnected and idle, then repaints the clock
    fn sleep_if_inactive(&mut self, now: Instant) {
        if self.module_state != ModuleState::Disconnected || !self.power.time_to_sleep(now) {
            return;
        }
        info!("inactive, going to sleep");
        if matches!(self.ui_state, UiState::Menu | UiState::SetClock) {
            self.display.exit_menu();
        }
        self.ui_state = UiState::Normal;
        self.last_wake = self.power.sleep();
        self.power.reset_inactivity_timer(self.last_wake);
        self.queue.post_event(EventKind::ClockTick);
    }

    /// Handles one event
    pub fn process_event(&mut self, event: Event, now: Instant) -> Result<(), Error> {
        debug!("event {} in {}/{}", event.kind, self.module_state, self.ui_state);
        if event.kind != EventKind::ClockTick {
            self.power.reset_inactivity_timer(now);
        }

        match event.kind {
            EventKind::ModuleSignal => self.handle_module_signal(),
            EventKind::ModuleStateChange => self.handle_module_state_change(event.payload, now),
            EventKind::TrackChange => {
                if self.module_state == ModuleState::ConnectedStreaming {
                    self.show_track()
                } else {
                    Ok(())
                }
            }
            // Only the latch needs clearing, the inactivity timer is already reset
            EventKind::ProximityTrigger => self.sensors.clear_proximity_interrupt(),
            EventKind::ClockTick => self.handle_clock_tick(now),
            EventKind::Play
            | EventKind::Next
            | EventKind::Prev
            | EventKind::VolUp
            | EventKind::VolDown
            | EventKind::PlayRelease
            | EventKind::PlayLongPress => self.handle_button(event.kind, now),
            EventKind::DoNothing => Ok(()),
        }
    }

    /// Reads the module's status and queues what it reports
    fn handle_module_signal(&mut self) -> Result<(), Error> {
        let status = self.bt.query_status()?;
        if status.is_limbo() {
            return Err(Error::ModuleInLimbo);
        }
        let state = status.module_state()?;
        debug!(
            "module status {:#x}: state code {}, track change {}",
            status.0,
            status.state_code(),
            status.track_changed()
        );
        self.queue.post_state_change(state);
        if status.track_changed() {
            self.queue.post_event(EventKind::TrackChange);
        }
        Ok(())
    }

    /// Applies a new module state; the same state twice does nothing
    pub fn handle_module_state_change(&mut self, new: ModuleState, now: Instant) -> Result<(), Error> {
        let old = self.module_state;
        if new == old {
            return Ok(());
        }
        info!("module state {} -> {}", old, new);

        match new {
            ModuleState::Disconnected => {
                self.power.set_state(PowerProfile::Clock);
                // The clock is drawn once the disconnect animation is over
                self.redraw_after_disconnect = true;
            }
            ModuleState::Connected | ModuleState::ConnectedStreaming => {
                self.power.set_state(PowerProfile::Connected);
                self.redraw_after_disconnect = false;
            }
            ModuleState::Pairing => self.redraw_after_disconnect = false,
        }

        if old == ModuleState::Pairing {
            self.ui_state = UiState::Normal;
        }
        // Menu and clock adjustment only exist while disconnected
        if new != ModuleState::Disconnected && matches!(self.ui_state, UiState::Menu | UiState::SetClock) {
            self.display.exit_menu();
            self.ui_state = UiState::Normal;
        }

        self.display.notify_new_module_state(new, old, now);
        self.module_state = new;

        match new {
            ModuleState::Pairing => {
                self.display.draw_text(TextPos::Pairing, "Pair your", "device now...");
                self.ui_state = UiState::PairingListening;
                Ok(())
            }
            ModuleState::ConnectedStreaming => self.show_track(),
            ModuleState::Disconnected | ModuleState::Connected => Ok(()),
        }
    }

    /// Fetches and shows artist and title
    fn show_track(&mut self) -> Result<(), Error> {
        let metadata = self.bt.metadata()?;
        self.display.draw_meta_text(&metadata);
        Ok(())
    }

    /// Repaints the clock screen while disconnected
    fn handle_clock_tick(&mut self, now: Instant) -> Result<(), Error> {
        if self.module_state != ModuleState::Disconnected {
            return Ok(());
        }
        let seconds_active = u32::try_from(now.saturating_duration_since(self.last_wake).as_secs()).unwrap_or(u32::MAX);
        let time = self.sensors.time()?;
        let env = self.sensors.environment(seconds_active)?;

        if !self.redraw_after_disconnect {
            self.display.draw_clock_and_weather(&time, &env);
        }
        Ok(())
    }

    /// Polls for a passkey and shows it
    fn listen_for_passkey(&mut self) {
        let Some(passkey) = self.bt.await_pairing_passkey(PASSKEY_POLL_TIMEOUT) else {
            return;
        };
        info!("got passkey {}", passkey.as_str());
        let mut code: String<12> = String::new();
        let _ = write!(code, "Code: {passkey}");
        self.display.draw_text(TextPos::Pairing, &code, "[vol+] accept");
        self.ui_state = UiState::PairingGotCode;
    }

    /// Tracks the play button, then hands the press to the current UI mode
    fn handle_button(&mut self, kind: EventKind, now: Instant) -> Result<(), Error> {
        match kind {
            EventKind::Play => self.play_pressed_at = Some(now),
            EventKind::PlayRelease => self.play_pressed_at = None,
            _ => {}
        }

        match self.ui_state {
            UiState::Normal => self.button_normal(kind),
            UiState::Menu => self.button_menu(kind, now),
            UiState::SetClock => self.button_set_clock(kind, now),
            UiState::PairingListening => self.button_pairing_listening(),
            UiState::PairingGotCode => self.button_pairing_got_code(kind),
        }
    }

    /// Media keys while connected, long press opens the menu while disconnected
    fn button_normal(&mut self, kind: EventKind) -> Result<(), Error> {
        match self.module_state {
            ModuleState::Disconnected => {
                if kind == EventKind::PlayLongPress {
                    self.display.draw_menu();
                    self.ui_state = UiState::Menu;
                }
                Ok(())
            }
            ModuleState::Pairing => Ok(()),
            ModuleState::Connected | ModuleState::ConnectedStreaming => {
                let result = match kind {
                    EventKind::VolUp => self.bt.vol_up(),
                    EventKind::VolDown => self.bt.vol_down(),
                    EventKind::Next => self.bt.track_next(),
                    EventKind::Prev => self.bt.track_prev(),
                    EventKind::Play => self.bt.play_pause(),
                    _ => Ok(()),
                };
                recoverable(result)
            }
        }
    }

    /// Leaves the menu and repaints the clock
    fn exit_menu(&mut self, now: Instant) -> Result<(), Error> {
        self.ui_state = UiState::Normal;
        self.display.exit_menu();
        self.handle_clock_tick(now)
    }

    /// The settings menu
    fn button_menu(&mut self, kind: EventKind, now: Instant) -> Result<(), Error> {
        match kind {
            EventKind::Prev => self.exit_menu(now),
            EventKind::Play => {
                recoverable(self.bt.enter_pairing_mode())?;
                self.exit_menu(now)
            }
            EventKind::Next => {
                self.ui_state = UiState::SetClock;
                self.clock_field = ClockField::DayOfMonth;
                let time = self.sensors.time()?;
                self.display.draw_adjust_clock(&time, self.clock_field);
                Ok(())
            }
            EventKind::VolUp => {
                recoverable(self.bt.reset_pairings())?;
                self.display.draw_text(TextPos::Fullscreen, "All prior", "pairings cleared");
                self.delay.delay_ms(PAIRINGS_CLEARED_HOLD_MS);
                self.exit_menu(now)
            }
            EventKind::VolDown => {
                info!("reboot requested from the menu");
                self.power.system_reset();
                Ok(())
            }
            _ => Ok(()),
        }
    }

    /// Clock adjustment, every edit goes to the clock right away
    fn button_set_clock(&mut self, kind: EventKind, now: Instant) -> Result<(), Error> {
        let mut time = self.sensors.time()?;
        match kind {
            EventKind::Prev => self.clock_field = self.clock_field.prev(),
            EventKind::Next => self.clock_field = self.clock_field.next(),
            EventKind::VolUp => time.increment(self.clock_field),
            EventKind::VolDown => time.decrement(self.clock_field),
            EventKind::Play => return self.exit_menu(now),
            _ => return Ok(()),
        }
        self.sensors.set_time(&time)?;
        // Read back for the day of the week
        let time = self.sensors.time()?;
        self.display.draw_adjust_clock(&time, self.clock_field);
        Ok(())
    }

    /// Any button cancels pairing
    fn button_pairing_listening(&mut self) -> Result<(), Error> {
        if self.module_state != ModuleState::Pairing {
            return Ok(());
        }
        self.ui_state = UiState::Normal;
        recoverable(self.bt.exit_pairing_mode())
    }

    /// Vol+ accepts the passkey, anything else cancels
    fn button_pairing_got_code(&mut self, kind: EventKind) -> Result<(), Error> {
        if self.module_state != ModuleState::Pairing {
            return Ok(());
        }
        self.ui_state = UiState::Normal;
        if kind == EventKind::VolUp {
            recoverable(self.bt.accept_pairing())
        } else {
            recoverable(self.bt.exit_pairing_mode())
        }
    }
}
