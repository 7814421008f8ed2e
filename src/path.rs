// src/path.rs - Closed polyline approximations of test shapes
use serde::{Deserialize, Serialize};
use std::f64::consts::TAU;

use crate::error::PathError;

pub const DEFAULT_POINTS: usize = 50;

/// A point in table coordinates (mm).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance_to(&self, other: &Point) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

/// Sample a circle counter-clockwise starting at angle zero.
///
/// Yields `points + 1` samples so the loop closes on its starting point.
pub fn circle_path(center: Point, radius: f64, points: usize) -> Result<Vec<Point>, PathError> {
    if points == 0 {
        return Err(PathError::NoPoints);
    }
    if !(radius.is_finite() && radius > 0.0) {
        return Err(PathError::InvalidRadius(radius));
    }

    let path = (0..=points)
        .map(|i| {
            let angle = TAU * i as f64 / points as f64;
            Point::new(
                center.x + radius * angle.cos(),
                center.y + radius * angle.sin(),
            )
        })
        .collect();
    Ok(path)
}
