//! Affine transforms and rectangles in PDF point space.
//!
//! Matrices follow the PDF convention: a point is a row vector and
//! `[a b c d e f]` maps `(x, y)` to `(a·x + c·y + e, b·x + d·y + f)`.
//! `m1.concat(m2)` applies `m1` first.

use crate::model::Rotation;

const EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Matrix {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
    pub e: f64,
    pub f: f64,
}

impl Matrix {
    pub const IDENTITY: Matrix = Matrix {
        a: 1.0,
        b: 0.0,
        c: 0.0,
        d: 1.0,
        e: 0.0,
        f: 0.0,
    };

    pub fn new(a: f64, b: f64, c: f64, d: f64, e: f64, f: f64) -> Self {
        Self { a, b, c, d, e, f }
    }

    pub fn scale(sx: f64, sy: f64) -> Self {
        Self::new(sx, 0.0, 0.0, sy, 0.0, 0.0)
    }

    pub fn translate(tx: f64, ty: f64) -> Self {
        Self::new(1.0, 0.0, 0.0, 1.0, tx, ty)
    }

    /// Exact quarter-turn rotation (no trigonometric rounding)
    pub fn rotate(rotation: Rotation) -> Self {
        match rotation {
            Rotation::None => Self::IDENTITY,
            Rotation::Cw90 => Self::new(0.0, 1.0, -1.0, 0.0, 0.0, 0.0),
            Rotation::Cw180 => Self::new(-1.0, 0.0, 0.0, -1.0, 0.0, 0.0),
            Rotation::Cw270 => Self::new(0.0, -1.0, 1.0, 0.0, 0.0, 0.0),
        }
    }

    /// Transform applying `self` first and then `next`.
    pub fn concat(self, next: Matrix) -> Matrix {
        Matrix {
            a: self.a * next.a + self.b * next.c,
            b: self.a * next.b + self.b * next.d,
            c: self.c * next.a + self.d * next.c,
            d: self.c * next.b + self.d * next.d,
            e: self.e * next.a + self.f * next.c + next.e,
            f: self.e * next.b + self.f * next.d + next.f,
        }
    }

    pub fn transform_point(&self, x: f64, y: f64) -> (f64, f64) {
        (
            self.a * x + self.c * y + self.e,
            self.b * x + self.d * y + self.f,
        )
    }

    /// Axis-aligned bounding box of the transformed rectangle
    pub fn transform_rect(&self, rect: &Rect) -> Rect {
        let corners = [
            self.transform_point(rect.x0, rect.y0),
            self.transform_point(rect.x1, rect.y0),
            self.transform_point(rect.x0, rect.y1),
            self.transform_point(rect.x1, rect.y1),
        ];
        let mut out = Rect::new(corners[0].0, corners[0].1, corners[0].0, corners[0].1);
        for (x, y) in &corners[1..] {
            out.x0 = out.x0.min(*x);
            out.y0 = out.y0.min(*y);
            out.x1 = out.x1.max(*x);
            out.y1 = out.y1.max(*y);
        }
        out
    }

    /// Uniform scale factor of a rotation-and-scale matrix
    pub fn scale_factor(&self) -> f64 {
        self.a.hypot(self.b)
    }

    /// Quarter turn this matrix rotates by, judged from the sign of its
    /// first row. Shears and non-right angles snap to the nearest quarter.
    pub fn rotation(&self) -> Rotation {
        if self.a.abs() >= self.b.abs() {
            if self.a >= 0.0 {
                Rotation::None
            } else {
                Rotation::Cw180
            }
        } else if self.b > 0.0 {
            Rotation::Cw90
        } else {
            Rotation::Cw270
        }
    }

    pub fn is_identity(&self) -> bool {
        (self.a - 1.0).abs() < EPSILON
            && self.b.abs() < EPSILON
            && self.c.abs() < EPSILON
            && (self.d - 1.0).abs() < EPSILON
            && self.e.abs() < EPSILON
            && self.f.abs() < EPSILON
    }

    pub fn is_finite(&self) -> bool {
        [self.a, self.b, self.c, self.d, self.e, self.f]
            .iter()
            .all(|v| v.is_finite())
    }
}

impl Default for Matrix {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Axis-aligned rectangle; `(x0, y0)` is the minimum corner.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub x0: f64,
    pub y0: f64,
    pub x1: f64,
    pub y1: f64,
}

impl Rect {
    pub fn new(x0: f64, y0: f64, x1: f64, y1: f64) -> Self {
        Self { x0, y0, x1, y1 }
    }

    pub fn from_size(width: f64, height: f64) -> Self {
        Self::new(0.0, 0.0, width, height)
    }

    pub fn from_origin(x0: f64, y0: f64, width: f64, height: f64) -> Self {
        Self::new(x0, y0, x0 + width, y0 + height)
    }

    /// Rectangle from two arbitrary corners (PDF boxes may be given reversed)
    pub fn normalized(x0: f64, y0: f64, x1: f64, y1: f64) -> Self {
        Self::new(x0.min(x1), y0.min(y1), x0.max(x1), y0.max(y1))
    }

    pub fn width(&self) -> f64 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> f64 {
        self.y1 - self.y0
    }

    pub fn is_empty(&self) -> bool {
        self.width() <= 0.0 || self.height() <= 0.0
    }

    pub fn contains(&self, other: &Rect) -> bool {
        other.x0 >= self.x0 - EPSILON
            && other.y0 >= self.y0 - EPSILON
            && other.x1 <= self.x1 + EPSILON
            && other.y1 <= self.y1 + EPSILON
    }
}
