use crate::error::{TrochiaError, TrochiaResult};

pub use kurbo::{Point, Vec2};

#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
pub struct FrameIndex(pub u64);

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Fps {
    pub num: u32,
    pub den: u32, // must be > 0
}

impl Fps {
    pub fn new(num: u32, den: u32) -> TrochiaResult<Self> {
        if den == 0 {
            return Err(TrochiaError::configuration("Fps den must be > 0"));
        }
        if num == 0 {
            return Err(TrochiaError::configuration("Fps num must be > 0"));
        }
        Ok(Self { num, den })
    }

    pub fn as_f64(self) -> f64 {
        f64::from(self.num) / f64::from(self.den)
    }

    pub fn frame_duration_secs(self) -> f64 {
        f64::from(self.den) / f64::from(self.num)
    }

    pub fn frames_to_secs(self, frames: u64) -> f64 {
        (frames as f64) * self.frame_duration_secs()
    }

    pub fn secs_to_frames_round(self, secs: f64) -> u64 {
        (secs * self.as_f64()).round().max(0.0) as u64
    }
}

/// Scene extents in abstract scene units, origin at the center, y up.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Canvas {
    pub width: u32,
    pub height: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Rgba8 {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba8 {
    pub const WHITE: Self = Self::rgb(255, 255, 255);
    pub const YELLOW: Self = Self::rgb(255, 214, 90);
    pub const BLUE: Self = Self::rgb(88, 140, 250);
    pub const GREEN: Self = Self::rgb(92, 200, 120);
    pub const RED: Self = Self::rgb(235, 90, 90);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }
}

/// Draw attributes shared by primitives and typeset expressions.
///
/// `reveal` is the fraction of the outline (or glyph run) drawn so far; it is
/// what "create" animations sweep. Hiding an object is `opacity` 0, never
/// removal.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Style {
    pub color: Rgba8,
    pub stroke_width: f64,
    pub opacity: f64, // 0..1
    pub dashed: bool,
    pub reveal: f64, // 0..1
}

impl Default for Style {
    fn default() -> Self {
        Self {
            color: Rgba8::WHITE,
            stroke_width: 2.0,
            opacity: 1.0,
            dashed: false,
            reveal: 1.0,
        }
    }
}

impl Style {
    pub fn stroke(color: Rgba8) -> Self {
        Self {
            color,
            ..Self::default()
        }
    }

    pub fn reveal(mut self, reveal: f64) -> Self {
        self.reveal = reveal.clamp(0.0, 1.0);
        self
    }

    pub fn opacity(mut self, opacity: f64) -> Self {
        self.opacity = opacity.clamp(0.0, 1.0);
        self
    }

    pub fn dashed(mut self) -> Self {
        self.dashed = true;
        self
    }

    pub fn width(mut self, w: f64) -> Self {
        self.stroke_width = w;
        self
    }
}
