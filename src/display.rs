//! Display collaborator and its OLED implementation
//!
//! The state machine only talks to the [`Display`] trait. [`OledDisplay`] renders into
//! a 256x64 4-bit grayscale framebuffer, runs the animations in it and hands finished
//! frames to a [`Panel`].

use core::fmt::Write;

use embassy_time::Instant;
use embedded_graphics::{
    framebuffer::{Framebuffer, buffer_size},
    mono_font::{MonoTextStyle, MonoTextStyleBuilder, ascii::FONT_7X14},
    pixelcolor::{
        Gray4,
        raw::{BigEndian, RawU4},
    },
    prelude::*,
    primitives::Rectangle,
    text::{Alignment, Baseline, Text, TextStyle, TextStyleBuilder},
};
use heapless::String;

use crate::{
    animation::{AnimationEngine, RandomSource},
    bt_module::Metadata,
    brightness::Brightness,
    canvas::{
        BLACK, CAT_X, CAT_X_CLOCK, CENTER_Y, Canvas, FrameCanvas, HEIGHT, MARGIN_BOTTOM, MARGIN_LEFT, MARGIN_RIGHT,
        MARGIN_TOP, Sprite, SpriteSheet, TEXT_HEIGHT, WHITE, WIDTH,
    },
    error::Error,
    system_state::{ClockField, EnvData, ModuleState, TimeData},
};

/// Width of one character of the display font
const CHAR_WIDTH: i32 = 7;
/// Height of one character of the display font
const CHAR_HEIGHT: i32 = 14;
/// Gap between the Bluetooth logo and the now playing text
const LOGO_TO_TEXT: i32 = 8;
/// Gap between text and the cat
const CAT_TEXT_MARGIN: i32 = 5;
/// Right edge of text next to the cat
const END_TEXT_X: i32 = CAT_X - CAT_TEXT_MARGIN;
/// Vertical distance of the two text rows from the center
const TEXT_ROW_OFFSET: i32 = 14;
/// Top edge of the lower clock row
const LOWER_ROW_Y: i32 = HEIGHT as i32 - MARGIN_BOTTOM - TEXT_HEIGHT - 1;

/// Short day names, Sunday first
const DAY_NAMES: [&str; 7] = ["Sun", "Mon", "Tue", "Wed", "Thu", "Fri", "Sat"];
/// Short month names
const MONTH_NAMES: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

/// Where a two-line text goes
#[derive(Debug, Eq, PartialEq, Copy, Clone)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TextPos {
    /// Centered on an otherwise empty screen
    Fullscreen,
    /// Right of the Bluetooth logo, left of the cat
    NowPlaying,
    /// Right of the pairing rings, left of the cat
    Pairing,
}

impl TextPos {
    /// Anchor of both lines
    #[must_use]
    #[allow(clippy::cast_possible_wrap)]
    pub const fn x(self) -> i32 {
        match self {
            Self::Fullscreen => WIDTH as i32 / 2,
            Self::NowPlaying => MARGIN_LEFT + Sprite::BtConnected.size().width as i32 + LOGO_TO_TEXT,
            Self::Pairing => 50,
        }
    }

    /// Horizontal room for the text
    #[must_use]
    #[allow(clippy::cast_possible_wrap)]
    pub const fn available_width(self) -> i32 {
        match self {
            Self::Fullscreen => WIDTH as i32,
            Self::NowPlaying | Self::Pairing => END_TEXT_X - self.x(),
        }
    }
}

/// Everything the state machine draws
///
/// Called from the main loop only.
pub trait Display {
    /// Restarts the animations for a module state change
    fn notify_new_module_state(&mut self, new: ModuleState, old: ModuleState, now: Instant);
    /// Advances the animations, returns whether anything was drawn
    fn update(&mut self, now: Instant) -> bool;
    /// The clock screen: date, time and weather around the clock-mode cat
    fn draw_clock_and_weather(&mut self, time: &TimeData, env: &EnvData);
    /// Artist and title of the playing track
    fn draw_meta_text(&mut self, metadata: &Metadata);
    /// Shows the settings menu; animations and the clock are suppressed until [`Display::exit_menu`]
    fn draw_menu(&mut self);
    /// Leaves the menu with an empty screen
    fn exit_menu(&mut self);
    /// The clock adjustment screen with `highlight` marked
    fn draw_adjust_clock(&mut self, time: &TimeData, highlight: ClockField);
    /// Two lines of text at a fixed position
    fn draw_text(&mut self, pos: TextPos, line1: &str, line2: &str);
    /// Whether the disconnect animation is over (or never ran)
    fn disconnect_anim_is_done(&self) -> bool;
    /// Follows the ambient light with the panel brightness
    fn update_brightness(&mut self, millilux: u32);
}

/// The physical OLED panel
pub trait Panel {
    /// Copies a full frame, two pixels per byte, high nibble first
    fn flush(&mut self, frame: &[u8]) -> Result<(), Error>;
    /// Sets the panel brightness
    fn set_brightness(&mut self, level: u8);
}

/// Frame buffer matching the panel
pub type Frame = Framebuffer<
    Gray4,
    RawU4,
    BigEndian,
    { WIDTH as usize },
    { HEIGHT as usize },
    { buffer_size::<Gray4>(WIDTH as usize, HEIGHT as usize) },
>;

/// Text styles shared by all screens
struct Settings {
    /// Character style of all text
    text: MonoTextStyle<'static, Gray4>,
    /// Left aligned, top baseline
    top_left: TextStyle,
    /// Right aligned, top baseline
    top_right: TextStyle,
    /// Left aligned, vertically centered
    middle_left: TextStyle,
    /// Centered both ways
    middle_center: TextStyle,
}

impl Settings {
    /// Builds the styles
    fn new() -> Self {
        let aligned = |alignment, baseline| {
            TextStyleBuilder::new()
                .alignment(alignment)
                .baseline(baseline)
                .build()
        };
        Self {
            text: MonoTextStyleBuilder::new().font(&FONT_7X14).text_color(WHITE).build(),
            top_left: aligned(Alignment::Left, Baseline::Top),
            top_right: aligned(Alignment::Right, Baseline::Top),
            middle_left: aligned(Alignment::Left, Baseline::Middle),
            middle_center: aligned(Alignment::Center, Baseline::Middle),
        }
    }
}

/// [`Display`] on a 256x64 grayscale OLED
pub struct OledDisplay<P, S, R> {
    /// Where frames go
    panel: P,
    /// Bitmaps for sprites and icons
    sprites: S,
    /// The frame being composed
    frame: Frame,
    /// Up to two running animations
    animations: AnimationEngine<R>,
    /// Ambient light follower
    brightness: Brightness,
    /// Text styles
    settings: Settings,
    /// Animations and the clock screen stay off the screen while the menu is shown
    menu_mode: bool,
}

impl<P, S, R> OledDisplay<P, S, R>
where
    P: Panel,
    S: SpriteSheet,
    R: RandomSource,
{
    /// Takes over the panel and sets the starting brightness
    pub fn new(mut panel: P, sprites: S, rng: R) -> Self {
        let brightness = Brightness::new();
        panel.set_brightness(brightness.current());
        Self {
            panel,
            sprites,
            frame: Frame::new(),
            animations: AnimationEngine::new(rng),
            brightness,
            settings: Settings::new(),
            menu_mode: false,
        }
    }

    /// The composed frame
    pub const fn frame(&self) -> &Frame {
        &self.frame
    }

    /// The animations
    pub const fn animations(&self) -> &AnimationEngine<R> {
        &self.animations
    }

    /// Whether the menu is shown
    pub const fn in_menu(&self) -> bool {
        self.menu_mode
    }

    /// Sends the frame to the panel
    fn flush(&mut self) {
        if let Err(e) = self.panel.flush(self.frame.data()) {
            warn!("display flush failed (continuing): {}", e);
        }
    }

    /// Blanks the whole frame
    fn clear(&mut self) {
        self.frame.clear(BLACK).unwrap_or_default();
    }

    /// Blanks a rectangle of the frame
    fn clear_area(&mut self, top_left: Point, size: Size) {
        FrameCanvas::new(&mut self.frame, &self.sprites).fill_rect(Rectangle::new(top_left, size), BLACK);
    }

    /// Draws a line of text
    fn text(&mut self, text: &str, at: Point, style: TextStyle) {
        Text::with_text_style(text, at, self.settings.text, style)
            .draw(&mut self.frame)
            .map(drop)
            .unwrap_or_default();
    }

    /// Draws a sprite
    fn sprite(&mut self, sprite: Sprite, at: Point) {
        FrameCanvas::new(&mut self.frame, &self.sprites).draw_sprite(sprite, at);
    }

    /// Date on the upper row, time on the lower one
    fn draw_clock(&mut self, time: &TimeData, with_year: bool) {
        let date = date_text(time, with_year);
        self.text(&date, Point::new(MARGIN_LEFT, MARGIN_TOP), self.settings.top_left);
        let clock = time_text(time);
        self.text(&clock, Point::new(MARGIN_LEFT, LOWER_ROW_Y), self.settings.top_left);
    }

    /// Temperature and humidity on the upper row, pressure on the lower one
    #[allow(clippy::cast_possible_wrap)]
    fn draw_weather(&mut self, env: &EnvData) {
        let right = WIDTH as i32 - MARGIN_RIGHT;
        let (weather, degree_column) = weather_text(env);
        self.text(&weather, Point::new(right, MARGIN_TOP), self.settings.top_right);

        #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
        let text_start = right - weather.len() as i32 * CHAR_WIDTH;
        #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
        let degree_x = text_start + degree_column as i32 * CHAR_WIDTH + 4;
        FrameCanvas::new(&mut self.frame, &self.sprites).ring(Point::new(degree_x, MARGIN_TOP + 4), 2, 1, WHITE);

        let pressure = pressure_text(env);
        self.text(&pressure, Point::new(right, LOWER_ROW_Y), self.settings.top_right);
    }
}

impl<P, S, R> Display for OledDisplay<P, S, R>
where
    P: Panel,
    S: SpriteSheet,
    R: RandomSource,
{
    fn notify_new_module_state(&mut self, new: ModuleState, old: ModuleState, now: Instant) {
        if self.menu_mode {
            return;
        }
        self.clear();
        self.animations.start(new, old);
        if self.animations.update(&mut FrameCanvas::new(&mut self.frame, &self.sprites), now) {
            self.flush();
        }
    }

    fn update(&mut self, now: Instant) -> bool {
        if self.menu_mode {
            return false;
        }
        let drew = self.animations.update(&mut FrameCanvas::new(&mut self.frame, &self.sprites), now);
        if drew {
            self.flush();
        }
        drew
    }

    fn draw_clock_and_weather(&mut self, time: &TimeData, env: &EnvData) {
        if self.menu_mode {
            return;
        }
        // The cat's columns belong to the animation
        #[allow(clippy::cast_sign_loss)]
        let cat_start = CAT_X_CLOCK as u32;
        let cat_stop = cat_start + Sprite::CatWait.size().width;
        #[allow(clippy::cast_possible_wrap)]
        let right_of_cat = Point::new(cat_stop as i32, 0);
        self.clear_area(Point::zero(), Size::new(cat_start, HEIGHT));
        self.clear_area(right_of_cat, Size::new(WIDTH - cat_stop, HEIGHT));

        self.draw_clock(time, false);
        self.draw_weather(env);
        self.flush();
    }

    fn draw_meta_text(&mut self, metadata: &Metadata) {
        #[allow(clippy::cast_sign_loss)]
        let max_chars = (TextPos::NowPlaying.available_width() / CHAR_WIDTH) as usize;
        let artist: String<64> = trim_text(&metadata.artist, max_chars);
        let title: String<64> = trim_text(&metadata.title, max_chars);
        self.draw_text(TextPos::NowPlaying, &artist, &title);
    }

    fn draw_menu(&mut self) {
        self.menu_mode = true;
        self.clear();

        #[allow(clippy::cast_possible_wrap)]
        let label_offset = Sprite::ButtonPrev.size().width as i32 + 6;
        let entries = [
            (Sprite::ButtonPrev, Point::new(4, 5), "Back"),
            (Sprite::ButtonPlay, Point::new(84, 5), "Pair"),
            (Sprite::ButtonNext, Point::new(156, 5), "Set clock"),
            (Sprite::ButtonVolDown, Point::new(28, 38), "Reboot"),
            (Sprite::ButtonVolUp, Point::new(132, 38), "Clear pairs"),
        ];
        for (icon, at, label) in entries {
            self.sprite(icon, at);
            self.text(label, at + Point::new(label_offset, -1), self.settings.top_left);
        }
        self.flush();
    }

    fn exit_menu(&mut self) {
        self.clear();
        self.flush();
        self.menu_mode = false;
    }

    fn draw_adjust_clock(&mut self, time: &TimeData, highlight: ClockField) {
        self.clear();
        self.draw_clock(time, true);

        // Button hints: vol+/vol- stacked, prev/next either side
        #[allow(clippy::cast_possible_wrap)]
        let button = Sprite::ButtonPlay.size().height as i32;
        let (x, y) = (200, 5);
        self.sprite(Sprite::ButtonVolUp, Point::new(x, y));
        self.sprite(Sprite::ButtonVolDown, Point::new(x, y + button + 10));
        self.sprite(Sprite::ButtonPrev, Point::new(x - button - 4, y + (button + 10) / 2));
        self.sprite(Sprite::ButtonNext, Point::new(x + button + 4, y + (button + 10) / 2));

        let (start, len, top) = highlight_span(time, highlight);
        let mut canvas = FrameCanvas::new(&mut self.frame, &self.sprites);
        canvas.hline(Point::new(start, top - 2), len, WHITE);
        canvas.hline(Point::new(start, top + CHAR_HEIGHT + 1), len, WHITE);
        self.flush();
    }

    fn draw_text(&mut self, pos: TextPos, line1: &str, line2: &str) {
        let x = pos.x();
        let style = if pos == TextPos::Fullscreen {
            self.clear();
            self.settings.middle_center
        } else {
            #[allow(clippy::cast_sign_loss)]
            let width = pos.available_width() as u32;
            self.clear_area(Point::new(x, 0), Size::new(width, HEIGHT));
            self.settings.middle_left
        };
        debug!("draw text at {}: '{}' '{}'", pos, line1, line2);
        self.text(line1, Point::new(x, CENTER_Y - TEXT_ROW_OFFSET), style);
        self.text(line2, Point::new(x, CENTER_Y + TEXT_ROW_OFFSET), style);
        self.flush();
    }

    fn disconnect_anim_is_done(&self) -> bool {
        !self.animations.disconnect_active()
    }

    fn update_brightness(&mut self, millilux: u32) {
        if let Some(level) = self.brightness.update(millilux) {
            trace!("brightness {}", level);
            self.panel.set_brightness(level);
        }
    }
}

/// Shortens `text` to at most `max_chars` characters, ending in "..." if anything was cut
#[must_use]
pub fn trim_text<const N: usize>(text: &str, max_chars: usize) -> String<N> {
    let mut trimmed = String::new();
    let fits = text.chars().count() <= max_chars;
    let keep = if fits { max_chars } else { max_chars.saturating_sub(3) };
    for c in text.chars().take(keep) {
        if trimmed.push(c).is_err() {
            break;
        }
    }
    if !fits {
        let _ = trimmed.push_str("...");
    }
    trimmed
}

/// "16-Oct (Fri)", or "16-Oct-26 (Fri)" with the year
#[must_use]
pub fn date_text(time: &TimeData, with_year: bool) -> String<20> {
    let month = usize::from(time.month)
        .checked_sub(1)
        .and_then(|index| MONTH_NAMES.get(index))
        .unwrap_or(&"???");
    let day = DAY_NAMES.get(usize::from(time.day_of_week)).unwrap_or(&"???");
    let mut text = String::new();
    if with_year {
        let _ = write!(text, "{}-{}-{:02} ({})", time.day_of_month, month, time.year, day);
    } else {
        let _ = write!(text, "{}-{} ({})", time.day_of_month, month, day);
    }
    text
}

/// Hour on a 12-hour clock
const fn twelve_hour(hours: u8) -> u8 {
    match hours {
        0 => 12,
        13.. => hours - 12,
        _ => hours,
    }
}

/// "9:05 pm"
#[must_use]
pub fn time_text(time: &TimeData) -> String<12> {
    let mut text = String::new();
    let suffix = if time.hours < 12 { "am" } else { "pm" };
    let _ = write!(text, "{}:{:02} {}", twelve_hour(time.hours), time.minutes, suffix);
    text
}

/// "21.5  / 45%", and the column where the degree sign goes
#[must_use]
pub fn weather_text(env: &EnvData) -> (String<20>, usize) {
    let mut text = String::new();
    let sign = if env.temperature < 0 { "-" } else { "" };
    let centi = env.temperature.unsigned_abs();
    let _ = write!(text, "{}{}.{}", sign, centi / 100, centi % 100 / 10);
    let degree_column = text.len();
    let _ = write!(text, "  / {}%", env.humidity / 1000);
    (text, degree_column)
}

/// "1013 hPa"
#[must_use]
pub fn pressure_text(env: &EnvData) -> String<12> {
    let mut text = String::new();
    let _ = write!(text, "{} hPa", env.pressure / 100);
    text
}

/// Start x, length and top y of the marks around a clock field on the adjust screen
#[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap, clippy::cast_sign_loss)]
fn highlight_span(time: &TimeData, field: ClockField) -> (i32, u32, i32) {
    let digits = |value: u8| if value >= 10 { 2 } else { 1 };
    let day = digits(time.day_of_month);
    let hours = digits(twelve_hour(time.hours));
    let (column, chars, top) = match field {
        ClockField::DayOfMonth => (0, day, MARGIN_TOP),
        ClockField::Month => (day + 1, 3, MARGIN_TOP),
        ClockField::Year => (day + 5, 2, MARGIN_TOP),
        ClockField::Hours => (0, hours, LOWER_ROW_Y),
        ClockField::Minutes => (hours + 1, 2, LOWER_ROW_Y),
    };
    (MARGIN_LEFT + column * CHAR_WIDTH, (chars * CHAR_WIDTH) as u32, top)
}
