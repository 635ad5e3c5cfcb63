//! Mask shapes.
//!
//! A `Shape` records filled polygons in surface coordinates. Transform calls follow the
//! scene-matrix convention: each `rotate`/`translate`/`scale` applies after the
//! transforms already set, so `rotate(a).translate(cx, cy).scale(z)` maps a point `p`
//! to `z * (c + R(a) * p)`.

use std::f32::consts::FRAC_PI_2;

const CORNER_SEGMENTS: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Affine {
    a: f32,
    b: f32,
    c: f32,
    d: f32,
    tx: f32,
    ty: f32,
}

impl Affine {
    pub const IDENTITY: Affine = Affine {
        a: 1.0,
        b: 0.0,
        c: 0.0,
        d: 1.0,
        tx: 0.0,
        ty: 0.0,
    };

    pub fn apply(&self, x: f32, y: f32) -> (f32, f32) {
        (
            self.a * x + self.c * y + self.tx,
            self.b * x + self.d * y + self.ty,
        )
    }

    /// `self` followed by `next`.
    fn then(self, next: Affine) -> Affine {
        Affine {
            a: next.a * self.a + next.c * self.b,
            b: next.b * self.a + next.d * self.b,
            c: next.a * self.c + next.c * self.d,
            d: next.b * self.c + next.d * self.d,
            tx: next.a * self.tx + next.c * self.ty + next.tx,
            ty: next.b * self.tx + next.d * self.ty + next.ty,
        }
    }

    fn rotation(radians: f32) -> Affine {
        let (sin, cos) = radians.sin_cos();
        Affine {
            a: cos,
            b: sin,
            c: -sin,
            d: cos,
            tx: 0.0,
            ty: 0.0,
        }
    }

    fn translation(x: f32, y: f32) -> Affine {
        Affine {
            tx: x,
            ty: y,
            ..Affine::IDENTITY
        }
    }

    fn scaling(sx: f32, sy: f32) -> Affine {
        Affine {
            a: sx,
            d: sy,
            ..Affine::IDENTITY
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Polygon {
    points: Vec<(f32, f32)>,
}

impl Polygon {
    pub fn points(&self) -> &[(f32, f32)] {
        &self.points
    }

    /// Even-odd rule.
    pub fn contains(&self, x: f32, y: f32) -> bool {
        let mut inside = false;
        let count = self.points.len();
        if count < 3 {
            return false;
        }
        let mut previous = count - 1;
        for current in 0..count {
            let (xi, yi) = self.points[current];
            let (xj, yj) = self.points[previous];
            if (yi > y) != (yj > y) && x < (xj - xi) * (y - yi) / (yj - yi) + xi {
                inside = !inside;
            }
            previous = current;
        }
        inside
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub min_x: f32,
    pub min_y: f32,
    pub max_x: f32,
    pub max_y: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Shape {
    transform: Affine,
    pending: Vec<Polygon>,
    filled: Vec<Polygon>,
}

impl Default for Shape {
    fn default() -> Self {
        Self {
            transform: Affine::IDENTITY,
            pending: Vec::new(),
            filled: Vec::new(),
        }
    }
}

impl Shape {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) -> &mut Self {
        *self = Self::default();
        self
    }

    pub fn rotate(&mut self, radians: f32) -> &mut Self {
        self.transform = self.transform.then(Affine::rotation(radians));
        self
    }

    pub fn translate(&mut self, x: f32, y: f32) -> &mut Self {
        self.transform = self.transform.then(Affine::translation(x, y));
        self
    }

    pub fn scale(&mut self, factor: f32) -> &mut Self {
        self.transform = self.transform.then(Affine::scaling(factor, factor));
        self
    }

    pub fn rect(&mut self, x: f32, y: f32, width: f32, height: f32) -> &mut Self {
        let corners = [
            (x, y),
            (x + width, y),
            (x + width, y + height),
            (x, y + height),
        ];
        self.push_path(&corners);
        self
    }

    pub fn round_rect(
        &mut self,
        x: f32,
        y: f32,
        width: f32,
        height: f32,
        radius: f32,
    ) -> &mut Self {
        let radius = radius.max(0.0).min(width.abs() / 2.0).min(height.abs() / 2.0);
        if radius <= f32::EPSILON {
            return self.rect(x, y, width, height);
        }
        // Corner centers clockwise from top-left, each paired with its starting angle.
        let corners = [
            (x + radius, y + radius, 2.0 * FRAC_PI_2),
            (x + width - radius, y + radius, 3.0 * FRAC_PI_2),
            (x + width - radius, y + height - radius, 0.0),
            (x + radius, y + height - radius, FRAC_PI_2),
        ];
        let mut points = Vec::with_capacity(corners.len() * (CORNER_SEGMENTS + 1));
        for (center_x, center_y, start) in corners {
            for step in 0..=CORNER_SEGMENTS {
                let angle = start + FRAC_PI_2 * step as f32 / CORNER_SEGMENTS as f32;
                points.push((
                    center_x + radius * angle.cos(),
                    center_y + radius * angle.sin(),
                ));
            }
        }
        self.push_path(&points);
        self
    }

    pub fn fill(&mut self) -> &mut Self {
        self.filled.append(&mut self.pending);
        self
    }

    fn push_path(&mut self, local_points: &[(f32, f32)]) {
        let points = local_points
            .iter()
            .map(|&(x, y)| self.transform.apply(x, y))
            .collect();
        self.pending.push(Polygon { points });
    }

    pub fn polygons(&self) -> &[Polygon] {
        &self.filled
    }

    pub fn is_empty(&self) -> bool {
        self.filled.is_empty()
    }

    pub fn contains(&self, x: f32, y: f32) -> bool {
        self.filled.iter().any(|polygon| polygon.contains(x, y))
    }

    pub fn bounds(&self) -> Option<Bounds> {
        let mut points = self.filled.iter().flat_map(|polygon| polygon.points.iter());
        let &(first_x, first_y) = points.next()?;
        let mut bounds = Bounds {
            min_x: first_x,
            min_y: first_y,
            max_x: first_x,
            max_y: first_y,
        };
        for &(x, y) in points {
            bounds.min_x = bounds.min_x.min(x);
            bounds.min_y = bounds.min_y.min(y);
            bounds.max_x = bounds.max_x.max(x);
            bounds.max_y = bounds.max_y.max(y);
        }
        Some(bounds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::FRAC_PI_4;

    fn assert_close(actual: f32, expected: f32) {
        assert!(
            (actual - expected).abs() < 1e-3,
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn centered_rect_is_translated_then_scaled() {
        let mut shape = Shape::new();
        shape
            .rotate(0.0)
            .translate(15.0, 10.0)
            .scale(2.0)
            .rect(-5.0, -4.0, 10.0, 8.0)
            .fill();

        let bounds = shape.bounds().expect("filled shape has bounds");
        assert_close(bounds.min_x, 20.0);
        assert_close(bounds.max_x, 40.0);
        assert_close(bounds.min_y, 12.0);
        assert_close(bounds.max_y, 28.0);
        assert!(shape.contains(30.0, 20.0));
        assert!(!shape.contains(19.0, 20.0));
    }

    #[test]
    fn rotation_turns_rect_around_its_own_center() {
        let mut shape = Shape::new();
        shape
            .rotate(FRAC_PI_4)
            .translate(50.0, 50.0)
            .scale(1.0)
            .rect(-10.0, -10.0, 20.0, 20.0)
            .fill();

        // A rotated square reaches farther along the axes than its half-width.
        assert!(shape.contains(50.0 + 13.0, 50.0));
        assert!(!shape.contains(50.0 + 9.0, 50.0 + 9.0));
        assert!(shape.contains(50.0, 50.0));
    }

    #[test]
    fn unfilled_path_does_not_cover() {
        let mut shape = Shape::new();
        shape.rect(0.0, 0.0, 10.0, 10.0);
        assert!(!shape.contains(5.0, 5.0));
        shape.fill();
        assert!(shape.contains(5.0, 5.0));
        shape.clear();
        assert!(shape.is_empty());
    }

    #[test]
    fn round_rect_cuts_corners() {
        let mut shape = Shape::new();
        shape.round_rect(0.0, 0.0, 100.0, 50.0, 20.0).fill();
        assert!(!shape.contains(1.0, 1.0));
        assert!(shape.contains(20.0, 1.0));
        assert!(shape.contains(50.0, 25.0));
        assert!(!shape.contains(99.0, 49.0));
    }

    #[test]
    fn oversized_radius_is_clamped() {
        let mut shape = Shape::new();
        shape.round_rect(0.0, 0.0, 10.0, 10.0, 500.0).fill();
        let bounds = shape.bounds().expect("filled shape has bounds");
        assert_close(bounds.max_x, 10.0);
        assert_close(bounds.max_y, 10.0);
    }
}
