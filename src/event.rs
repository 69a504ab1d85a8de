//! Events and the queue bridging interrupt producers to the main loop
//!
//! Producers (edge handlers, interrupt contexts and the state machine itself) post
//! into a bounded FIFO. The single consumer drains it from the main loop. A full
//! queue drops the newest event.

use core::cell::RefCell;

use embassy_sync::blocking_mutex::{
    Mutex,
    raw::{CriticalSectionRawMutex, RawMutex},
};
use heapless::Deque;

use crate::system_state::ModuleState;

/// The capacity of the event queue
pub const EVENT_QUEUE_CAPACITY: usize = 5;

/// Event queue guarded by a global critical section, as used in firmware
pub type SharedEventQueue = EventQueue<CriticalSectionRawMutex>;

/// Kind of an event, one per interrupt source plus the synthesized ones
#[derive(Debug, Eq, PartialEq, Copy, Clone)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum EventKind {
    /// The Bluetooth module changed connectivity state, see [`Event::payload`]
    ModuleStateChange,
    /// The track playing on the source changed
    TrackChange,
    /// The real-time clock ticked
    ClockTick,
    /// The proximity sensor fired
    ProximityTrigger,
    /// The Bluetooth module raised its status line
    ModuleSignal,
    /// Play button pressed
    Play,
    /// Next button pressed
    Next,
    /// Previous button pressed
    Prev,
    /// Volume up button pressed
    VolUp,
    /// Volume down button pressed
    VolDown,
    /// Play button released
    PlayRelease,
    /// Play button held for longer than the long-press threshold
    PlayLongPress,
    /// Nothing to do, returned by an empty queue
    DoNothing,
}

impl EventKind {
    /// Whether the event stems from one of the five buttons or the play button's synthesized kinds
    #[must_use]
    pub const fn is_button(self) -> bool {
        matches!(
            self,
            Self::Play | Self::Next | Self::Prev | Self::VolUp | Self::VolDown | Self::PlayRelease | Self::PlayLongPress
        )
    }
}

/// A queued event
#[derive(Debug, Eq, PartialEq, Copy, Clone)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Event {
    /// What happened
    pub kind: EventKind,
    /// New module state, meaningful for [`EventKind::ModuleStateChange`] only
    pub payload: ModuleState,
}

impl Event {
    /// The sentinel handed out by an empty queue
    pub const NOTHING: Self = Self::new(EventKind::DoNothing);

    /// Creates an event without a meaningful payload
    #[must_use]
    pub const fn new(kind: EventKind) -> Self {
        Self {
            kind,
            payload: ModuleState::Disconnected,
        }
    }

    /// Creates a connectivity change event
    #[must_use]
    pub const fn module_state_change(state: ModuleState) -> Self {
        Self {
            kind: EventKind::ModuleStateChange,
            payload: state,
        }
    }
}

/// Bounded FIFO of events, safe to post into from interrupt context
///
/// Every access runs inside the critical section provided by `M`. In firmware that is
/// [`CriticalSectionRawMutex`], which masks interrupts for the duration of the access.
pub struct EventQueue<M: RawMutex> {
    /// The ring buffer, only touched with the lock held
    events: Mutex<M, RefCell<Deque<Event, EVENT_QUEUE_CAPACITY>>>,
}

impl<M: RawMutex> Default for EventQueue<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M: RawMutex> EventQueue<M> {
    /// Creates an empty queue, usable in a `static`
    #[must_use]
    pub const fn new() -> Self {
        Self {
            events: Mutex::new(RefCell::new(Deque::new())),
        }
    }

    /// Posts an event without payload
    pub fn post_event(&self, kind: EventKind) {
        self.post(Event::new(kind));
    }

    /// Posts a connectivity change carrying the new module state
    pub fn post_state_change(&self, state: ModuleState) {
        self.post(Event::module_state_change(state));
    }

    /// Appends an event, dropping it if the queue is full
    pub fn post(&self, event: Event) {
        let dropped = self.events.lock(|events| events.borrow_mut().push_back(event).is_err());
        if dropped {
            warn!("event queue full, dropped {}", event.kind);
        } else {
            trace!("posted {}", event.kind);
        }
    }

    /// Whether at least one event is waiting
    #[must_use]
    pub fn event_is_pending(&self) -> bool {
        self.len() > 0
    }

    /// Number of queued events
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.lock(|events| events.borrow().len())
    }

    /// Whether the queue holds no events
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Removes and returns the oldest event, or [`Event::NOTHING`] if there is none
    #[must_use]
    pub fn next_pending_event(&self) -> Event {
        self.events
            .lock(|events| events.borrow_mut().pop_front())
            .unwrap_or(Event::NOTHING)
    }
}

#[cfg(test)]
mod tests {
    use core::cell::Cell;
    use core::sync::atomic::{AtomicBool, Ordering};

    use super::*;

    std::thread_local! {
        /// Number of critical sections entered on this test thread
        static SECTIONS: Cell<usize> = const { Cell::new(0) };
    }

    /// Raw mutex that counts critical sections and rejects nesting
    struct CountingRawMutex {
        /// Set while a critical section is open
        taken: AtomicBool,
    }

    unsafe impl RawMutex for CountingRawMutex {
        const INIT: Self = Self {
            taken: AtomicBool::new(false),
        };

        fn lock<R>(&self, f: impl FnOnce() -> R) -> R {
            assert!(!self.taken.swap(true, Ordering::Acquire), "critical section re-entered");
            SECTIONS.with(|sections| sections.set(sections.get() + 1));
            let result = f();
            self.taken.store(false, Ordering::Release);
            result
        }
    }

    fn sections() -> usize {
        SECTIONS.with(Cell::get)
    }

    #[test]
    fn full_queue_drops_the_newest_event() {
        let queue = EventQueue::<CountingRawMutex>::new();
        for _ in 0..5 {
            queue.post_event(EventKind::VolUp);
        }
        queue.post_event(EventKind::Next);
        assert_eq!(queue.len(), EVENT_QUEUE_CAPACITY);

        for _ in 0..5 {
            assert_eq!(queue.next_pending_event().kind, EventKind::VolUp);
        }
        assert_eq!(queue.next_pending_event(), Event::NOTHING);
        assert!(!queue.event_is_pending());
    }

    #[test]
    fn retained_events_come_out_in_arrival_order() {
        let queue = EventQueue::<CountingRawMutex>::new();
        let kinds = [
            EventKind::Play,
            EventKind::ClockTick,
            EventKind::PlayRelease,
            EventKind::ModuleSignal,
        ];
        for kind in kinds {
            queue.post_event(kind);
        }
        assert_eq!(queue.next_pending_event().kind, EventKind::Play);

        queue.post_state_change(ModuleState::Pairing);
        queue.post_event(EventKind::TrackChange);

        let drained: Vec<Event> = core::iter::from_fn(|| {
            queue
                .event_is_pending()
                .then(|| queue.next_pending_event())
        })
        .collect();
        assert_eq!(
            drained,
            [
                Event::new(EventKind::ClockTick),
                Event::new(EventKind::PlayRelease),
                Event::new(EventKind::ModuleSignal),
                Event::module_state_change(ModuleState::Pairing),
                Event::new(EventKind::TrackChange),
            ]
        );
    }

    #[test]
    fn occupancy_never_exceeds_capacity() {
        let queue = EventQueue::<CountingRawMutex>::new();
        for round in 0..40_usize {
            if round % 3 == 0 {
                let _ = queue.next_pending_event();
            } else {
                queue.post_event(EventKind::ClockTick);
            }
            assert!(queue.len() <= EVENT_QUEUE_CAPACITY);
        }
    }

    #[test]
    fn every_access_takes_the_critical_section() {
        let queue = EventQueue::<CountingRawMutex>::new();
        let before = sections();
        queue.post_event(EventKind::Prev);
        let _ = queue.next_pending_event();
        let _ = queue.next_pending_event();
        assert_eq!(sections() - before, 3);
    }

    #[test]
    fn empty_queue_returns_the_sentinel_without_payload() {
        let queue = SharedEventQueue::new();
        let event = queue.next_pending_event();
        assert_eq!(event.kind, EventKind::DoNothing);
        assert_eq!(event.payload, ModuleState::Disconnected);
    }
}
