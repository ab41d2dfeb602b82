use kurbo::{Point, Vec2};

use crate::error::{TrochiaError, TrochiaResult};

/// Drawable geometric primitives.
///
/// All shapes are plain data mutated in place by transform ops; only uniform
/// (similarity) transforms are supported so a circle stays a circle.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum Primitive {
    Circle(Circle),
    Arc(Arc),
    Segment(Segment),
    Dot(Dot),
}

#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Circle {
    pub center: Point,
    pub radius: f64,
    /// Accumulated self-rotation. Advanced by rolling motion or explicit
    /// rotate ops; offsets every angle-indexed query.
    pub rotation: f64,
}

impl Circle {
    pub fn new(center: Point, radius: f64) -> TrochiaResult<Self> {
        check_radius(radius)?;
        Ok(Self {
            center,
            radius,
            rotation: 0.0,
        })
    }

    pub fn point_at_angle(&self, angle: f64) -> Point {
        self.center + Vec2::from_angle(angle + self.rotation) * self.radius
    }

    /// Unit tangent in the counterclockwise direction of travel.
    pub fn tangent_at_angle(&self, angle: f64) -> Vec2 {
        let a = angle + self.rotation;
        Vec2::new(-a.sin(), a.cos())
    }
}

/// Circular arc with a signed, unclamped sweep. The sign carries the
/// direction of travel, so repeated extensions of one continuous motion may
/// exceed a full turn.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Arc {
    pub center: Point,
    pub radius: f64,
    pub start_angle: f64,
    pub sweep: f64,
}

impl Arc {
    pub fn new(center: Point, radius: f64, start_angle: f64, sweep: f64) -> TrochiaResult<Self> {
        check_radius(radius)?;
        if !start_angle.is_finite() || !sweep.is_finite() {
            return Err(TrochiaError::configuration("arc angles must be finite"));
        }
        Ok(Self {
            center,
            radius,
            start_angle,
            sweep,
        })
    }

    pub fn point_at(&self, t: f64) -> Point {
        self.center + Vec2::from_angle(self.start_angle + self.sweep * t) * self.radius
    }

    pub fn end_angle(&self) -> f64 {
        self.start_angle + self.sweep
    }
}

#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Segment {
    pub from: Point,
    pub to: Point,
}

impl Segment {
    pub fn new(from: Point, to: Point) -> Self {
        Self { from, to }
    }

    pub fn point_at(&self, t: f64) -> Point {
        self.from.lerp(self.to, t)
    }

    pub fn midpoint(&self) -> Point {
        self.from.midpoint(self.to)
    }

    pub fn length(&self) -> f64 {
        (self.to - self.from).hypot()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Dot {
    pub pos: Point,
    pub radius: f64,
}

impl Dot {
    pub fn new(pos: Point) -> Self {
        Self { pos, radius: 0.06 }
    }
}

impl Primitive {
    /// Representative point used as the move target of a primitive.
    pub fn anchor(&self) -> Point {
        match self {
            Self::Circle(c) => c.center,
            Self::Arc(a) => a.center,
            Self::Segment(s) => s.midpoint(),
            Self::Dot(d) => d.pos,
        }
    }

    pub fn translate(&mut self, delta: Vec2) {
        match self {
            Self::Circle(c) => c.center += delta,
            Self::Arc(a) => a.center += delta,
            Self::Segment(s) => {
                s.from += delta;
                s.to += delta;
            }
            Self::Dot(d) => d.pos += delta,
        }
    }

    pub fn rotate_about(&mut self, pivot: Point, angle: f64) {
        match self {
            Self::Circle(c) => {
                c.center = rotate_point(c.center, pivot, angle);
                c.rotation += angle;
            }
            Self::Arc(a) => {
                a.center = rotate_point(a.center, pivot, angle);
                a.start_angle += angle;
            }
            Self::Segment(s) => {
                s.from = rotate_point(s.from, pivot, angle);
                s.to = rotate_point(s.to, pivot, angle);
            }
            Self::Dot(d) => d.pos = rotate_point(d.pos, pivot, angle),
        }
    }

    /// Uniform scale toward `pivot`. The factor must be positive; beat
    /// validation enforces that before any op reaches this method.
    pub fn scale_about(&mut self, pivot: Point, factor: f64) {
        match self {
            Self::Circle(c) => {
                c.center = scale_point(c.center, pivot, factor);
                c.radius *= factor;
            }
            Self::Arc(a) => {
                a.center = scale_point(a.center, pivot, factor);
                a.radius *= factor;
            }
            Self::Segment(s) => {
                s.from = scale_point(s.from, pivot, factor);
                s.to = scale_point(s.to, pivot, factor);
            }
            Self::Dot(d) => {
                d.pos = scale_point(d.pos, pivot, factor);
                d.radius *= factor;
            }
        }
    }
}

fn check_radius(radius: f64) -> TrochiaResult<()> {
    if !radius.is_finite() || radius < 0.0 {
        return Err(TrochiaError::configuration(
            "radius must be finite and >= 0",
        ));
    }
    Ok(())
}

fn rotate_point(p: Point, pivot: Point, angle: f64) -> Point {
    let v = p - pivot;
    let (sin, cos) = angle.sin_cos();
    pivot + Vec2::new(v.x * cos - v.y * sin, v.x * sin + v.y * cos)
}

fn scale_point(p: Point, pivot: Point, factor: f64) -> Point {
    pivot + (p - pivot) * factor
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::{FRAC_PI_2, FRAC_PI_6, PI};

    fn close(a: Point, b: Point) {
        assert!((a - b).hypot() < 1e-12, "{a:?} != {b:?}");
    }

    #[test]
    fn negative_radius_is_rejected() {
        assert!(Circle::new(Point::ZERO, -1.0).is_err());
        assert!(Arc::new(Point::ZERO, -0.1, 0.0, 1.0).is_err());
        assert!(Circle::new(Point::ZERO, 0.0).is_ok());
    }

    #[test]
    fn circle_point_at_angle_accounts_for_rotation() {
        let mut c = Circle::new(Point::new(1.0, 0.0), 2.0).unwrap();
        close(c.point_at_angle(0.0), Point::new(3.0, 0.0));
        c.rotation = FRAC_PI_2;
        close(c.point_at_angle(0.0), Point::new(1.0, 2.0));
    }

    #[test]
    fn circle_tangent_is_perpendicular_to_radius() {
        let c = Circle::new(Point::ZERO, 3.0).unwrap();
        let radial = c.point_at_angle(FRAC_PI_6) - c.center;
        let tangent = c.tangent_at_angle(FRAC_PI_6);
        assert!(radial.dot(tangent).abs() < 1e-12);
        assert!((tangent.hypot() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn arc_sweep_is_signed_and_unclamped() {
        let a = Arc::new(Point::ZERO, 1.0, 0.0, -3.0 * PI).unwrap();
        assert_eq!(a.end_angle(), -3.0 * PI);
        close(a.point_at(0.0), Point::new(1.0, 0.0));
    }

    #[test]
    fn rotate_about_moves_position_and_spin() {
        let mut p = Primitive::Circle(Circle::new(Point::new(4.0, 0.0), 1.0).unwrap());
        p.rotate_about(Point::ZERO, FRAC_PI_2);
        close(p.anchor(), Point::new(0.0, 4.0));
        let Primitive::Circle(c) = &p else {
            unreachable!()
        };
        assert_eq!(c.rotation, FRAC_PI_2);
    }

    #[test]
    fn scale_about_preserves_relative_layout() {
        let mut s = Primitive::Segment(Segment::new(Point::new(2.0, 0.0), Point::new(4.0, 0.0)));
        s.scale_about(Point::ZERO, 0.5);
        let Primitive::Segment(seg) = &s else {
            unreachable!()
        };
        close(seg.from, Point::new(1.0, 0.0));
        close(seg.to, Point::new(2.0, 0.0));
        assert_eq!(seg.length(), 1.0);
    }
}
