//! Axis-aligned bounding boxes for 2D world-space geometry.

use nalgebra::Vector2;

/// 2D axis-aligned bounding box in world space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb2 {
    pub min: Vector2<f32>,
    pub max: Vector2<f32>,
}

impl Default for Aabb2 {
    fn default() -> Self {
        let origin = Vector2::new(0.0, 0.0);
        Self {
            min: origin,
            max: origin,
        }
    }
}

impl Aabb2 {
    /// Creates an AABB from two corners.
    ///
    /// The resulting box is normalized so that `min` is component-wise <= `max`.
    pub fn new(a: Vector2<f32>, b: Vector2<f32>) -> Self {
        let min = Vector2::new(a.x.min(b.x), a.y.min(b.y));
        let max = Vector2::new(a.x.max(b.x), a.y.max(b.y));
        Self { min, max }
    }

    /// Creates an AABB from a position and a size.
    pub fn from_rect(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self::new(Vector2::new(x, y), Vector2::new(x + width, y + height))
    }

    /// Smallest box enclosing every point, or `None` for an empty iterator.
    pub fn enclosing<I>(points: I) -> Option<Self>
    where
        I: IntoIterator<Item = Vector2<f32>>,
    {
        let mut points = points.into_iter();
        let first = points.next()?;
        let mut out = Self {
            min: first,
            max: first,
        };
        for p in points {
            out.min.x = out.min.x.min(p.x);
            out.min.y = out.min.y.min(p.y);
            out.max.x = out.max.x.max(p.x);
            out.max.y = out.max.y.max(p.y);
        }
        Some(out)
    }

    pub fn center(&self) -> Vector2<f32> {
        (self.min + self.max) * 0.5
    }

    pub fn size(&self) -> Vector2<f32> {
        self.max - self.min
    }

    pub fn is_finite(&self) -> bool {
        [self.min.x, self.min.y, self.max.x, self.max.y]
            .iter()
            .all(|v| v.is_finite())
    }

    pub fn contains_aabb(&self, other: &Self) -> bool {
        self.min.x <= other.min.x
            && self.min.y <= other.min.y
            && self.max.x >= other.max.x
            && self.max.y >= other.max.y
    }

    /// Touching edges count as an intersection.
    pub fn intersects(&self, other: &Self) -> bool {
        self.min.x <= other.max.x
            && self.max.x >= other.min.x
            && self.min.y <= other.max.y
            && self.max.y >= other.min.y
    }

    pub fn union(&self, other: &Self) -> Self {
        Self {
            min: Vector2::new(self.min.x.min(other.min.x), self.min.y.min(other.min.y)),
            max: Vector2::new(self.max.x.max(other.max.x), self.max.y.max(other.max.y)),
        }
    }

    /// Returns a box expanded by `amount` on all sides.
    pub fn expanded(&self, amount: f32) -> Self {
        let delta = Vector2::new(amount, amount);
        Self {
            min: self.min - delta,
            max: self.max + delta,
        }
    }

    /// Splits the box into its four quadrants: bit0 selects the x half, bit1 the y half.
    pub fn quadrants(&self) -> [Self; 4] {
        let c = self.center();
        let mut out = [*self; 4];
        for (i, quadrant) in out.iter_mut().enumerate() {
            let (x0, x1) = if i & 1 == 0 {
                (self.min.x, c.x)
            } else {
                (c.x, self.max.x)
            };
            let (y0, y1) = if i & 2 == 0 {
                (self.min.y, c.y)
            } else {
                (c.y, self.max.y)
            };
            *quadrant = Self::new(Vector2::new(x0, y0), Vector2::new(x1, y1));
        }
        out
    }
}
