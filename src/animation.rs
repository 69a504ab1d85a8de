//! Frame-scheduled animations
//!
//! Up to two animations run at once, each in its own [`Slot`] with its own frame
//! counter and timer. Which animations run is decided by the module state alone, see
//! [`AnimationEngine::start`]. The engine is polled; a slot draws its next frame once
//! more than its requested delay has passed since its previous frame.

use embassy_time::{Duration, Instant};
use embedded_graphics::{pixelcolor::Gray4, prelude::*, primitives::Rectangle};

use crate::{
    canvas::{
        BLACK, CAT_X, CAT_X_CLOCK, CAT_Y, CAT_Y_CLOCK, CENTER_Y, Canvas, HEIGHT, LISTENING_CAT, MARGIN_LEFT, Sprite,
        WIDTH,
    },
    system_state::ModuleState,
};

/// Frames the clock-mode cat needs to slide fully in or out
#[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap, clippy::cast_sign_loss)]
pub const SLIDE_FRAMES: u8 = (HEIGHT as i32 - CAT_Y_CLOCK - 1) as u8;
/// Delay between two slide frames
const SLIDE_STEP_MS: u32 = 5;

/// How long the clock-mode cat stays visible, inclusive range in ms
#[cfg(not(feature = "short-clock-cycle"))]
pub const CAT_VISIBLE_MS: (u32, u32) = (10_000, 90_000);
/// How long the clock-mode cat stays hidden, inclusive range in ms
#[cfg(not(feature = "short-clock-cycle"))]
pub const CAT_HIDDEN_MS: (u32, u32) = (200_000, 900_000);
/// How long the clock-mode cat stays visible, inclusive range in ms
#[cfg(feature = "short-clock-cycle")]
pub const CAT_VISIBLE_MS: (u32, u32) = (5_000, 6_000);
/// How long the clock-mode cat stays hidden, inclusive range in ms
#[cfg(feature = "short-clock-cycle")]
pub const CAT_HIDDEN_MS: (u32, u32) = (5_000, 6_000);

/// Time between the two listening frames
const LISTENING_FRAME_MS: u32 = 800;
/// Time between two pairing ring frames
const PAIRING_FRAME_MS: u32 = 80;
/// Frames in one grow and shrink cycle of a pairing ring
pub const RING_FRAMES: u8 = 31;
/// Offset between the primary and the secondary pairing ring
pub const RING_OFFSET: u8 = 21;
/// Radius of a pairing ring at frame 0
const RING_START_RADIUS: u32 = 6;
/// Stroke of a pairing ring
const RING_THICKNESS: u32 = 2;
/// First disconnect frame with paws and scratch marks
const PAWS_FRAME: u8 = 15;
/// Disconnect frame that holds the final picture
const DISCONNECT_HOLD_FRAME: u8 = 70;
/// Disconnect frame that clears up and ends the animation
const DISCONNECT_LAST_FRAME: u8 = 71;
/// Shade of the scratch marks
const SCRATCH_SHADE: Gray4 = Gray4::new(0x8);

/// Source of randomness for the cat's moods
pub trait RandomSource {
    /// Next raw random number
    fn next_u32(&mut self) -> u32;

    /// Uniform-ish number in the inclusive range `min..=max`
    fn in_range(&mut self, min: u32, max: u32) -> u32 {
        let span = max.saturating_sub(min).saturating_add(1);
        min + self.next_u32() % span
    }
}

/// Small xorshift generator, plenty for picking moods
#[derive(Debug, Clone)]
pub struct XorShift32 {
    /// Never zero
    state: u32,
}

impl XorShift32 {
    /// Creates a generator; a zero seed is replaced as xorshift would get stuck at zero
    #[must_use]
    pub const fn new(seed: u32) -> Self {
        Self {
            state: if seed == 0 { 0x9e37_79b9 } else { seed },
        }
    }
}

impl RandomSource for XorShift32 {
    fn next_u32(&mut self) -> u32 {
        let mut x = self.state;
        x ^= x << 13;
        x ^= x >> 17;
        x ^= x << 5;
        self.state = x;
        x
    }
}

/// Expression of the idle cat
#[derive(Debug, Eq, PartialEq, Copy, Clone, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Mood {
    /// Looking straight ahead
    #[default]
    Straight,
    /// Eyes to the left
    LookLeft,
    /// Eyes to the right
    LookRight,
    /// Tongue out
    TongueOut,
    /// Eyes closed
    Blink,
}

/// State of the idle cat's face
#[derive(Debug, Eq, PartialEq, Copy, Clone, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FaceState {
    /// Expression drawn on the next frame
    pub mood: Mood,
}

/// State of the clock-mode cat that slides in and out of view
#[derive(Debug, Eq, PartialEq, Copy, Clone, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ClockState {
    /// The face on top of the sliding body
    pub face: FaceState,
    /// Milliseconds left before sliding back down, may go negative
    pub visible_countdown_ms: i32,
}

/// The closed set of animations
#[derive(Debug, Eq, PartialEq, Copy, Clone)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Animation {
    /// Cat swaying to the music
    Listening,
    /// Idle cat next to the Bluetooth logo
    Waiting(FaceState),
    /// Idle cat peeking up from the bottom of the clock screen
    Clock(ClockState),
    /// One-shot: the logo bursts and the cat slides off screen
    Disconnect,
    /// Two pulsing rings around the Bluetooth logo
    PairingRings,
}

/// Outcome of drawing one frame
struct Step {
    /// Delay until the next frame, in ms
    delay_ms: u32,
    /// False once a one-shot animation is over
    keep: bool,
}

impl Step {
    /// Keep running, next frame after `delay_ms`
    const fn next_in(delay_ms: u32) -> Self {
        Self { delay_ms, keep: true }
    }
}

impl Animation {
    /// Draws the frame `frame` and advances the animation's state
    fn step<C: Canvas, R: RandomSource>(&mut self, frame: &mut u8, canvas: &mut C, rng: &mut R) -> Step {
        match self {
            Self::Listening => Step::next_in(listening(canvas, frame)),
            Self::Waiting(face) => {
                canvas.draw_sprite(Sprite::BtConnected, Sprite::BtConnected.middle_left(MARGIN_LEFT, CENTER_Y));
                Step::next_in(draw_face(canvas, face, rng, Point::new(CAT_X, CAT_Y)))
            }
            Self::Clock(state) => Step::next_in(clock(canvas, state, frame, rng)),
            Self::Disconnect => disconnect(canvas, frame),
            Self::PairingRings => Step::next_in(pairing_rings(canvas, frame)),
        }
    }
}

/// One running animation with its timing
#[derive(Debug, Eq, PartialEq, Copy, Clone)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Slot {
    /// What is running, with its own state
    animation: Animation,
    /// Frame counter, each animation wraps it in its own way
    frame: u8,
    /// When the previous frame was drawn, `None` if none was yet
    last_frame: Option<Instant>,
    /// Requested delay after the previous frame
    delay: Duration,
}

impl Slot {
    /// A fresh slot, due immediately
    const fn new(animation: Animation) -> Self {
        Self {
            animation,
            frame: 0,
            last_frame: None,
            delay: Duration::from_ticks(0),
        }
    }

    /// The animation and its state
    #[must_use]
    pub const fn animation(&self) -> &Animation {
        &self.animation
    }

    /// Current frame counter
    #[must_use]
    pub const fn frame(&self) -> u8 {
        self.frame
    }

    /// Delay requested after the previous frame
    #[must_use]
    pub const fn delay(&self) -> Duration {
        self.delay
    }

    /// Whether more than the requested delay has passed since the previous frame
    fn is_due(&self, now: Instant) -> bool {
        self.last_frame
            .is_none_or(|last| now.saturating_duration_since(last) > self.delay)
    }
}

/// Runs up to two animations side by side
pub struct AnimationEngine<R> {
    /// Slot 1 and slot 2
    slots: [Option<Slot>; 2],
    /// Randomness for the moods and clock cycle
    rng: R,
}

impl<R: RandomSource> AnimationEngine<R> {
    /// An engine with nothing running
    pub const fn new(rng: R) -> Self {
        Self { slots: [None, None], rng }
    }

    /// Assigns and resets both slots for a module state change
    pub fn start(&mut self, new: ModuleState, old: ModuleState) {
        let (first, second) = match new {
            ModuleState::Connected => (Animation::Waiting(FaceState::default()), None),
            ModuleState::ConnectedStreaming => (Animation::Listening, None),
            ModuleState::Pairing => (Animation::Waiting(FaceState::default()), Some(Animation::PairingRings)),
            ModuleState::Disconnected if old.is_connected() => (Animation::Disconnect, None),
            ModuleState::Disconnected => (Animation::Clock(ClockState::default()), None),
        };
        debug!("animations for {} -> {}: {} / {}", old, new, first, second);
        self.slots = [Some(Slot::new(first)), second.map(Slot::new)];
    }

    /// Draws every slot whose delay has passed, returns whether anything was drawn
    pub fn update<C: Canvas>(&mut self, canvas: &mut C, now: Instant) -> bool {
        let Self { slots, rng } = self;
        let mut drew = false;
        for entry in slots.iter_mut() {
            let Some(slot) = entry else { continue };
            if !slot.is_due(now) {
                continue;
            }
            let step = slot.animation.step(&mut slot.frame, canvas, rng);
            slot.last_frame = Some(now);
            slot.delay = Duration::from_millis(u64::from(step.delay_ms));
            drew = true;
            if !step.keep {
                trace!("one-shot animation done");
                *entry = None;
            }
        }
        drew
    }

    /// Whether the disconnect one-shot is still playing
    #[must_use]
    pub const fn disconnect_active(&self) -> bool {
        matches!(
            self.slots[0],
            Some(Slot {
                animation: Animation::Disconnect,
                ..
            })
        )
    }

    /// The two slots, for inspection
    #[must_use]
    pub const fn slots(&self) -> &[Option<Slot>; 2] {
        &self.slots
    }
}

/// Sways the cat between its two listening poses
fn listening<C: Canvas>(canvas: &mut C, frame: &mut u8) -> u32 {
    canvas.draw_sprite(Sprite::BtConnected, Sprite::BtConnected.middle_left(MARGIN_LEFT, CENTER_Y));
    if *frame == 0 {
        canvas.draw_sprite(Sprite::CatRight, LISTENING_CAT);
        *frame = 1;
    } else {
        canvas.draw_sprite(Sprite::CatLeft, LISTENING_CAT);
        *frame = 0;
    }
    LISTENING_FRAME_MS
}

/// Draws the idle cat at `at` with its current mood and picks the next one
///
/// Returns how long the drawn mood is held.
fn draw_face<C: Canvas, R: RandomSource>(canvas: &mut C, face: &mut FaceState, rng: &mut R, at: Point) -> u32 {
    match face.mood {
        Mood::Straight => {
            canvas.draw_sprite(Sprite::CatWait, at);
            let hold = rng.in_range(2000, 5000);
            face.mood = match rng.in_range(0, 7) {
                0..=3 => Mood::Blink,
                4 => Mood::LookLeft,
                5 => Mood::LookRight,
                6 => Mood::TongueOut,
                _ => Mood::Straight,
            };
            hold
        }
        Mood::LookLeft | Mood::LookRight => {
            let (eyes, opposite) = if face.mood == Mood::LookLeft {
                (Sprite::CatEyesLeft, Mood::LookRight)
            } else {
                (Sprite::CatEyesRight, Mood::LookLeft)
            };
            canvas.draw_sprite(Sprite::CatWait, at);
            canvas.draw_sprite(eyes, at + Point::new(6, 19));
            face.mood = if rng.in_range(0, 4) == 0 { opposite } else { Mood::Straight };
            rng.in_range(400, 1500)
        }
        Mood::TongueOut => {
            canvas.draw_sprite(Sprite::CatTongueOut, at);
            face.mood = Mood::Straight;
            rng.in_range(600, 1000)
        }
        Mood::Blink => {
            canvas.draw_sprite(Sprite::CatWait, at);
            canvas.draw_sprite(Sprite::CatEyesClosed, at + Point::new(4, 19));
            face.mood = Mood::Straight;
            rng.in_range(150, 400)
        }
    }
}

/// Top edge of the clock-mode cat for a frame
///
/// Frames up to [`SLIDE_FRAMES`] slide up into the resting position, later frames slide down.
#[must_use]
pub const fn clock_cat_y(frame: u8) -> i32 {
    let frame = frame as i32;
    let slide = SLIDE_FRAMES as i32;
    if frame <= slide {
        CAT_Y_CLOCK + slide - frame
    } else {
        CAT_Y_CLOCK - slide + frame - 1
    }
}

/// The idle cat peeking up on the clock screen, then hiding again
fn clock<C: Canvas, R: RandomSource>(canvas: &mut C, state: &mut ClockState, frame: &mut u8, rng: &mut R) -> u32 {
    let y = clock_cat_y(*frame);
    let width = Sprite::CatWait.size().width;
    let mut delay_ms = draw_face(canvas, &mut state.face, rng, Point::new(CAT_X_CLOCK, y));

    if *frame == 0 {
        let (min, max) = CAT_VISIBLE_MS;
        state.visible_countdown_ms = i32::try_from(rng.in_range(min, max)).unwrap_or(i32::MAX);
    }
    if *frame == SLIDE_FRAMES && state.visible_countdown_ms <= 0 {
        *frame += 1;
    }
    if *frame != SLIDE_FRAMES {
        *frame += 1;
        delay_ms = SLIDE_STEP_MS;
        state.face.mood = if *frame == SLIDE_FRAMES {
            Mood::TongueOut
        } else {
            Mood::Straight
        };
    }
    if *frame == SLIDE_FRAMES * 2 + 3 {
        *frame = 0;
        let (min, max) = CAT_HIDDEN_MS;
        delay_ms = rng.in_range(min, max);
        canvas.hline(Point::new(CAT_X_CLOCK, y - 1), width, BLACK);
    }
    if *frame > SLIDE_FRAMES {
        canvas.hline(Point::new(CAT_X_CLOCK, y - 1), width, BLACK);
    }
    state.visible_countdown_ms = state
        .visible_countdown_ms
        .saturating_sub(i32::try_from(delay_ms).unwrap_or(i32::MAX));
    delay_ms
}

/// Clears the cat's half of the screen
fn clear_cat_area<C: Canvas>(canvas: &mut C) {
    #[allow(clippy::cast_sign_loss)]
    let left = (CAT_X - 6) as u32;
    canvas.fill_rect(
        Rectangle::new(Point::new(CAT_X - 6, 0), Size::new(WIDTH - left, HEIGHT)),
        BLACK,
    );
}

/// Clears the logo's corner of the screen
fn clear_logo_area<C: Canvas>(canvas: &mut C) {
    canvas.fill_rect(Rectangle::new(Point::zero(), Size::new(50, HEIGHT)), BLACK);
}

/// The logo bursts, the cat is shocked and slides away clawing at the screen
fn disconnect<C: Canvas>(canvas: &mut C, frame: &mut u8) -> Step {
    clear_cat_area(canvas);
    let shocked_at = Point::new(CAT_X, CAT_Y);
    let delay_ms = match *frame {
        0 => {
            canvas.draw_sprite(Sprite::CatShocked, shocked_at);
            clear_logo_area(canvas);
            canvas.draw_sprite(Sprite::BtExplode1, Point::new(2, 20));
            120
        }
        1 => {
            canvas.draw_sprite(Sprite::CatShocked, shocked_at);
            clear_logo_area(canvas);
            canvas.draw_sprite(Sprite::BtExplode2, Point::new(0, 16));
            120
        }
        2 => {
            clear_logo_area(canvas);
            canvas.draw_sprite(Sprite::CatShocked, shocked_at);
            1000
        }
        frame if frame < PAWS_FRAME => {
            // One row further down the screen per frame
            canvas.draw_sprite(Sprite::CatShocked, Point::new(CAT_X, CAT_Y + i32::from(frame) - 2));
            40
        }
        frame => {
            canvas.draw_sprite(Sprite::CatWithPaws, Point::new(CAT_X - 6, CAT_Y + i32::from(frame) - 14));
            let scratches = u32::from(frame - PAWS_FRAME);
            for paw in [0, 37] {
                for (dx, top) in [(-5, 16), (0, 12), (7, 12), (12, 17)] {
                    canvas.vline(Point::new(CAT_X + paw + dx, top), scratches, SCRATCH_SHADE);
                }
            }
            let accelerated = 200 - 25 * i32::from(frame - PAWS_FRAME);
            accelerated.max(40).unsigned_abs()
        }
    };

    *frame += 1;
    match *frame {
        DISCONNECT_HOLD_FRAME => Step::next_in(3000),
        DISCONNECT_LAST_FRAME => {
            clear_cat_area(canvas);
            *frame = 0;
            Step { delay_ms, keep: false }
        }
        _ => Step::next_in(delay_ms),
    }
}

/// Frame of the secondary ring for a primary ring frame, both in `0..RING_FRAMES`
#[must_use]
pub const fn secondary_ring_frame(primary: u8) -> u8 {
    if primary >= RING_OFFSET {
        primary - RING_OFFSET
    } else {
        primary + RING_FRAMES - RING_OFFSET
    }
}

/// Shade of a ring: brightening while it grows, fading while it shrinks
#[must_use]
pub const fn ring_shade(frame: u8) -> u8 {
    if frame >= 15 { 30 - frame } else { frame }
}

/// Draws one ring frame around `center` and advances `frame`
fn draw_ring<C: Canvas>(canvas: &mut C, center: Point, frame: &mut u8) {
    let radius = RING_START_RADIUS + u32::from(*frame);
    if *frame > 0 {
        canvas.ring(center, radius - 1, RING_THICKNESS, BLACK);
    }
    canvas.ring(center, radius, RING_THICKNESS, Gray4::new(ring_shade(*frame)));
    *frame += 1;
    if *frame == RING_FRAMES {
        *frame = 0;
    }
}

/// Two phase-locked rings pulsing around the Bluetooth logo
fn pairing_rings<C: Canvas>(canvas: &mut C, frame: &mut u8) -> u32 {
    #[allow(clippy::cast_possible_wrap)]
    let center = Point::new(MARGIN_LEFT + Sprite::BtConnected.size().width as i32 / 2, CENTER_Y);
    let mut secondary = secondary_ring_frame(*frame);
    draw_ring(canvas, center, &mut secondary);
    draw_ring(canvas, center, frame);
    canvas.draw_sprite(Sprite::BtConnected, Sprite::BtConnected.middle_center(center.x, center.y));
    PAIRING_FRAME_MS
}
