//! Interrupt lines to queued events
//!
//! Each physical line maps to exactly one event kind, except the play button whose
//! press and release are posted as separate kinds. Buttons are active high, the module
//! status, proximity and clock lines are open drain and active low.

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_time::Timer;
use embedded_hal::digital::InputPin;
use embedded_hal_async::digital::Wait;

use crate::event::{EventKind, EventQueue};

/// Pause after a pin error before listening again
const ERROR_BACKOFF_MS: u64 = 10;

/// What a line is wired to
#[derive(Debug, Eq, PartialEq, Copy, Clone)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Line {
    /// A button posting its kind when pressed
    Button(EventKind),
    /// The play button, posting press and release
    PlayButton,
    /// An active low signal posting its kind when asserted
    Signal(EventKind),
}

/// Turns the edges of one line into events
pub struct EdgeSource<P> {
    /// The interrupt capable pin
    pin: P,
    /// What the pin means
    line: Line,
}

impl<P> EdgeSource<P>
where
    P: Wait + InputPin,
{
    /// Listens on `pin` as `line`
    pub const fn new(pin: P, line: Line) -> Self {
        Self { pin, line }
    }

    /// What the line is wired to
    pub const fn line(&self) -> Line {
        self.line
    }

    /// Gives the pin back
    pub fn release(self) -> P {
        self.pin
    }

    /// Waits for the next edge that means something and returns its event
    pub async fn next_event(&mut self) -> Result<EventKind, P::Error> {
        match self.line {
            Line::Button(kind) => {
                self.pin.wait_for_rising_edge().await?;
                Ok(kind)
            }
            Line::PlayButton => {
                self.pin.wait_for_any_edge().await?;
                if self.pin.is_high()? {
                    Ok(EventKind::Play)
                } else {
                    Ok(EventKind::PlayRelease)
                }
            }
            Line::Signal(kind) => {
                self.pin.wait_for_falling_edge().await?;
                Ok(kind)
            }
        }
    }

    /// Posts every event of the line into `queue`, forever
    pub async fn run<M: RawMutex>(&mut self, queue: &EventQueue<M>) -> ! {
        loop {
            match self.next_event().await {
                Ok(kind) => queue.post_event(kind),
                Err(_) => {
                    warn!("input pin error on {}", self.line);
                    Timer::after_millis(ERROR_BACKOFF_MS).await;
                }
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use core::{future::poll_fn, task::Poll};
    use std::io::ErrorKind;

    use embassy_futures::{block_on, select::select};
    use embedded_hal_mock::eh1::{
        MockError,
        digital::{Edge, Mock as PinMock, State as PinState, Transaction as PinTransaction},
    };

    use super::*;

    #[test]
    fn button_posts_on_press() {
        let pin = PinMock::new(&[
            PinTransaction::wait_for_edge(Edge::Rising),
            PinTransaction::wait_for_edge(Edge::Rising),
        ]);
        let mut source = EdgeSource::new(pin, Line::Button(EventKind::VolUp));

        assert_eq!(block_on(source.next_event()).unwrap(), EventKind::VolUp);
        assert_eq!(block_on(source.next_event()).unwrap(), EventKind::VolUp);
        source.release().done();
    }

    #[test]
    fn play_button_posts_press_and_release() {
        let pin = PinMock::new(&[
            PinTransaction::wait_for_edge(Edge::Any),
            PinTransaction::get(PinState::High),
            PinTransaction::wait_for_edge(Edge::Any),
            PinTransaction::get(PinState::Low),
        ]);
        let mut source = EdgeSource::new(pin, Line::PlayButton);

        assert_eq!(block_on(source.next_event()).unwrap(), EventKind::Play);
        assert_eq!(block_on(source.next_event()).unwrap(), EventKind::PlayRelease);
        source.release().done();
    }

    #[test]
    fn module_signal_posts_when_pulled_low() {
        let pin = PinMock::new(&[PinTransaction::wait_for_edge(Edge::Falling)]);
        let mut source = EdgeSource::new(pin, Line::Signal(EventKind::ModuleSignal));

        let queue = crate::event::SharedEventQueue::new();
        let kind = block_on(source.next_event()).unwrap();
        queue.post_event(kind);

        assert_eq!(queue.next_pending_event().kind, EventKind::ModuleSignal);
        assert_eq!(source.line(), Line::Signal(EventKind::ModuleSignal));
        source.release().done();
    }

    #[test]
    fn run_posts_presses_and_survives_a_pin_error() {
        let pin = PinMock::new(&[
            PinTransaction::wait_for_edge(Edge::Rising),
            PinTransaction::wait_for_edge(Edge::Rising),
            PinTransaction::wait_for_edge(Edge::Rising).with_error(MockError::Io(ErrorKind::Other)),
        ]);
        let mut source = EdgeSource::new(pin, Line::Button(EventKind::VolUp));
        let queue = crate::event::SharedEventQueue::new();

        // Both presses are posted, then the error parks the loop in its backoff
        let posted = poll_fn(|_| if queue.len() >= 2 { Poll::Ready(()) } else { Poll::Pending });
        block_on(select(source.run(&queue), posted));

        assert_eq!(queue.next_pending_event().kind, EventKind::VolUp);
        assert_eq!(queue.next_pending_event().kind, EventKind::VolUp);
        assert!(queue.is_empty());
        source.release().done();
    }
}
