//! Drawing surface used by the animations, sprite table and screen geometry
//!
//! Animations only ever talk to a [`Canvas`]. [`FrameCanvas`] implements it on top of any
//! `embedded-graphics` draw target with 4-bit grayscale pixels.

use embedded_graphics::{
    image::{Image, ImageRaw},
    pixelcolor::Gray4,
    prelude::*,
    primitives::{Circle, Line, PrimitiveStyle, PrimitiveStyleBuilder, Rectangle, StrokeAlignment},
};

/// Panel width in pixels
pub const WIDTH: u32 = 256;
/// Panel height in pixels
pub const HEIGHT: u32 = 64;
/// Left margin
pub const MARGIN_LEFT: i32 = 2;
/// Right margin
pub const MARGIN_RIGHT: i32 = 4;
/// Top margin
pub const MARGIN_TOP: i32 = 4;
/// Bottom margin
pub const MARGIN_BOTTOM: i32 = 4;
/// Height of a text line
pub const TEXT_HEIGHT: i32 = 22;
/// Vertical center of the panel
pub const CENTER_Y: i32 = 32;
/// Left edge of the cat while connected or pairing
pub const CAT_X: i32 = 194;
/// Top edge of the cat while connected or pairing
pub const CAT_Y: i32 = 9;
/// Left edge of the cat on the clock screen
pub const CAT_X_CLOCK: i32 = 110;
/// Top edge of the cat when fully visible on the clock screen
pub const CAT_Y_CLOCK: i32 = 10;
/// Top left corner of the listening cat
pub const LISTENING_CAT: Point = Point::new(192, 1);

/// Black
pub const BLACK: Gray4 = Gray4::BLACK;
/// Full white
pub const WHITE: Gray4 = Gray4::WHITE;

/// Every bitmap the screens and animations draw
#[derive(Debug, Eq, PartialEq, Copy, Clone)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Sprite {
    /// Bluetooth logo shown while a source is connected
    BtConnected,
    /// First frame of the bursting Bluetooth logo
    BtExplode1,
    /// Second frame of the bursting Bluetooth logo
    BtExplode2,
    /// Listening cat, head tilted left
    CatLeft,
    /// Listening cat, head tilted right
    CatRight,
    /// Idle cat looking straight ahead
    CatWait,
    /// Eyes looking left, drawn over [`Sprite::CatWait`]
    CatEyesLeft,
    /// Eyes looking right, drawn over [`Sprite::CatWait`]
    CatEyesRight,
    /// Closed eyes, drawn over [`Sprite::CatWait`]
    CatEyesClosed,
    /// Idle cat with its tongue out
    CatTongueOut,
    /// Startled cat
    CatShocked,
    /// Cat clinging to the edge with its paws
    CatWithPaws,
    /// Play button icon
    ButtonPlay,
    /// Next button icon
    ButtonNext,
    /// Previous button icon
    ButtonPrev,
    /// Volume up button icon
    ButtonVolUp,
    /// Volume down button icon
    ButtonVolDown,
}

impl Sprite {
    /// Size of the bitmap; sprite sheets must provide images of exactly this size
    #[must_use]
    pub const fn size(self) -> Size {
        match self {
            Self::BtConnected => Size::new(36, 44),
            Self::BtExplode1 => Size::new(40, 30),
            Self::BtExplode2 => Size::new(48, 40),
            Self::CatLeft | Self::CatRight => Size::new(62, 62),
            Self::CatWait | Self::CatTongueOut | Self::CatShocked => Size::new(52, 54),
            Self::CatEyesLeft | Self::CatEyesRight => Size::new(40, 10),
            Self::CatEyesClosed => Size::new(44, 8),
            Self::CatWithPaws => Size::new(64, 54),
            Self::ButtonPlay | Self::ButtonNext | Self::ButtonPrev | Self::ButtonVolUp | Self::ButtonVolDown => {
                Size::new(20, 20)
            }
        }
    }

    /// Top left corner placing the sprite's left edge at `x` and its vertical center at `y`
    #[must_use]
    #[allow(clippy::cast_possible_wrap)]
    pub const fn middle_left(self, x: i32, y: i32) -> Point {
        Point::new(x, y - self.size().height as i32 / 2)
    }

    /// Top left corner placing the sprite's center at (`x`, `y`)
    #[must_use]
    #[allow(clippy::cast_possible_wrap)]
    pub const fn middle_center(self, x: i32, y: i32) -> Point {
        let size = self.size();
        Point::new(x - size.width as i32 / 2, y - size.height as i32 / 2)
    }
}

/// Source of the bitmap data for each [`Sprite`]
pub trait SpriteSheet {
    /// The 4-bit grayscale bitmap, sized as [`Sprite::size`]
    fn image(&self, sprite: Sprite) -> ImageRaw<'static, Gray4>;
}

/// Drawing operations the animations and screens are built from
pub trait Canvas {
    /// Draws a sprite with its top left corner at `top_left`
    fn draw_sprite(&mut self, sprite: Sprite, top_left: Point);
    /// Fills a rectangle
    fn fill_rect(&mut self, area: Rectangle, shade: Gray4);
    /// Horizontal line of `len` pixels starting at `start`, nothing for a zero length
    fn hline(&mut self, start: Point, len: u32, shade: Gray4);
    /// Vertical line of `len` pixels starting at `start` going down, nothing for a zero length
    fn vline(&mut self, start: Point, len: u32, shade: Gray4);
    /// Circle outline of the given radius and stroke thickness
    fn ring(&mut self, center: Point, radius: u32, thickness: u32, shade: Gray4);
}

/// [`Canvas`] over an `embedded-graphics` draw target
pub struct FrameCanvas<'a, D, S> {
    /// Where the pixels go
    target: &'a mut D,
    /// Where the bitmaps come from
    sprites: &'a S,
}

impl<'a, D, S> FrameCanvas<'a, D, S>
where
    D: DrawTarget<Color = Gray4>,
    S: SpriteSheet,
{
    /// Wraps a draw target
    pub const fn new(target: &'a mut D, sprites: &'a S) -> Self {
        Self { target, sprites }
    }
}

impl<D, S> Canvas for FrameCanvas<'_, D, S>
where
    D: DrawTarget<Color = Gray4>,
    S: SpriteSheet,
{
    fn draw_sprite(&mut self, sprite: Sprite, top_left: Point) {
        let raw = self.sprites.image(sprite);
        Image::new(&raw, top_left).draw(self.target).unwrap_or_default();
    }

    fn fill_rect(&mut self, area: Rectangle, shade: Gray4) {
        area.into_styled(PrimitiveStyle::with_fill(shade))
            .draw(self.target)
            .unwrap_or_default();
    }

    #[allow(clippy::cast_possible_wrap)]
    fn hline(&mut self, start: Point, len: u32, shade: Gray4) {
        if len == 0 {
            return;
        }
        Line::new(start, start + Point::new(len as i32 - 1, 0))
            .into_styled(PrimitiveStyle::with_stroke(shade, 1))
            .draw(self.target)
            .unwrap_or_default();
    }

    #[allow(clippy::cast_possible_wrap)]
    fn vline(&mut self, start: Point, len: u32, shade: Gray4) {
        if len == 0 {
            return;
        }
        Line::new(start, start + Point::new(0, len as i32 - 1))
            .into_styled(PrimitiveStyle::with_stroke(shade, 1))
            .draw(self.target)
            .unwrap_or_default();
    }

    fn ring(&mut self, center: Point, radius: u32, thickness: u32, shade: Gray4) {
        let style = PrimitiveStyleBuilder::new()
            .stroke_color(shade)
            .stroke_width(thickness)
            .stroke_alignment(StrokeAlignment::Center)
            .build();
        Circle::with_center(center, radius * 2 + 1)
            .into_styled(style)
            .draw(self.target)
            .unwrap_or_default();
    }
}
