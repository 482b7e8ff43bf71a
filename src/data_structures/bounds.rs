//! Axis-aligned bounding boxes.
//!
//! Every measurement the engine makes (wheel diameters, chassis centering,
//! backdrop re-derivation) goes through [`Aabb`]. A box is only meaningful in
//! the coordinate space its points were collected in, so callers transform
//! geometry first and then grow the box.

use cgmath::{EuclideanSpace, Matrix4, Point3, Transform, Vector3};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Aabb {
    pub min: Point3<f32>,
    pub max: Point3<f32>,
}

impl Aabb {
    /// A box containing nothing. Growing it by any point yields that point.
    pub fn empty() -> Self {
        Self {
            min: Point3::new(f32::INFINITY, f32::INFINITY, f32::INFINITY),
            max: Point3::new(f32::NEG_INFINITY, f32::NEG_INFINITY, f32::NEG_INFINITY),
        }
    }

    pub fn new(min: Point3<f32>, max: Point3<f32>) -> Self {
        Self { min, max }
    }

    pub fn from_points<I>(points: I) -> Self
    where
        I: IntoIterator<Item = Point3<f32>>,
    {
        points.into_iter().fold(Self::empty(), |mut bounds, point| {
            bounds.grow(point);
            bounds
        })
    }

    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y || self.min.z > self.max.z
    }

    pub fn grow(&mut self, point: Point3<f32>) {
        self.min.x = self.min.x.min(point.x);
        self.min.y = self.min.y.min(point.y);
        self.min.z = self.min.z.min(point.z);
        self.max.x = self.max.x.max(point.x);
        self.max.y = self.max.y.max(point.y);
        self.max.z = self.max.z.max(point.z);
    }

    pub fn union(&self, other: &Aabb) -> Aabb {
        if self.is_empty() {
            return *other;
        }
        if other.is_empty() {
            return *self;
        }
        let mut bounds = *self;
        bounds.grow(other.min);
        bounds.grow(other.max);
        bounds
    }

    pub fn center(&self) -> Point3<f32> {
        if self.is_empty() {
            return Point3::origin();
        }
        self.min.midpoint(self.max)
    }

    pub fn size(&self) -> Vector3<f32> {
        if self.is_empty() {
            return Vector3::new(0.0, 0.0, 0.0);
        }
        self.max - self.min
    }

    /// Largest edge length. Used as the "diameter" of wheels and tires.
    pub fn max_dimension(&self) -> f32 {
        let size = self.size();
        size.x.max(size.y).max(size.z)
    }

    pub fn min_dimension(&self) -> f32 {
        let size = self.size();
        size.x.min(size.y).min(size.z)
    }

    /// Box around the eight transformed corners.
    ///
    /// This over-estimates under rotations that are not multiples of 90°; use
    /// the scene graph's per-vertex measurement where precision matters.
    pub fn transformed(&self, matrix: &Matrix4<f32>) -> Aabb {
        if self.is_empty() {
            return *self;
        }
        let (min, max) = (self.min, self.max);
        Aabb::from_points(
            [
                Point3::new(min.x, min.y, min.z),
                Point3::new(min.x, min.y, max.z),
                Point3::new(min.x, max.y, min.z),
                Point3::new(min.x, max.y, max.z),
                Point3::new(max.x, min.y, min.z),
                Point3::new(max.x, min.y, max.z),
                Point3::new(max.x, max.y, min.z),
                Point3::new(max.x, max.y, max.z),
            ]
            .into_iter()
            .map(|corner| matrix.transform_point(corner)),
        )
    }
}

impl Default for Aabb {
    fn default() -> Self {
        Self::empty()
    }
}
