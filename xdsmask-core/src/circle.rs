//! Three-point circle fit.

use crate::geometry::Point;
use crate::{Error, Result};

/// Relative tolerance on the circumcentre denominator.
const COLLINEAR_EPSILON: f64 = 1.0e-10;

/// A circle in detector pixel space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Circle {
    pub centre: Point,
    pub radius: f64,
}

impl Circle {
    /// Axis-aligned bounding box as `(x1, x2, y1, y2)`.
    #[must_use]
    pub fn bounding_box(&self) -> (f64, f64, f64, f64) {
        (
            self.centre.x - self.radius,
            self.centre.x + self.radius,
            self.centre.y - self.radius,
            self.centre.y + self.radius,
        )
    }
}

/// Fit the unique circle through three points (circumcircle).
///
/// # Errors
/// Returns [`Error::GeometryDegenerate`] when two points coincide or the
/// three points are collinear to within a tolerance scaled by their extent.
pub fn fit_circle(p1: Point, p2: Point, p3: Point) -> Result<Circle> {
    let (x1, y1) = (p1.x, p1.y);
    let (x2, y2) = (p2.x, p2.y);
    let (x3, y3) = (p3.x, p3.y);

    let span_x = x1.max(x2).max(x3) - x1.min(x2).min(x3);
    let span_y = y1.max(y2).max(y3) - y1.min(y2).min(y3);
    let extent_sq = span_x * span_x + span_y * span_y;

    let den = 2.0 * (x1 * (y2 - y3) + x2 * (y3 - y1) + x3 * (y1 - y2));
    if !den.is_finite() || extent_sq == 0.0 || den.abs() <= COLLINEAR_EPSILON * extent_sq {
        return Err(Error::GeometryDegenerate);
    }

    let s1 = x1 * x1 + y1 * y1;
    let s2 = x2 * x2 + y2 * y2;
    let s3 = x3 * x3 + y3 * y3;
    let cx = (s1 * (y2 - y3) + s2 * (y3 - y1) + s3 * (y1 - y2)) / den;
    let cy = (s1 * (x3 - x2) + s2 * (x1 - x3) + s3 * (x2 - x1)) / den;

    let centre = Point::new(cx, cy);
    Ok(Circle {
        centre,
        radius: centre.distance(p1),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_fit_circle_right_isoceles() {
        let circle = fit_circle(
            Point::new(100.0, 100.0),
            Point::new(200.0, 100.0),
            Point::new(150.0, 150.0),
        )
        .unwrap();
        assert_relative_eq!(circle.centre.x, 150.0, epsilon = 1e-9);
        assert_relative_eq!(circle.centre.y, 100.0, epsilon = 1e-9);
        assert_relative_eq!(circle.radius, 50.0, epsilon = 1e-9);
    }

    #[test]
    fn test_fit_circle_equidistant() {
        let points = [
            Point::new(1231.7, 88.2),
            Point::new(402.5, 1711.9),
            Point::new(2010.25, 1533.0),
        ];
        let circle = fit_circle(points[0], points[1], points[2]).unwrap();
        for p in points {
            assert_relative_eq!(circle.centre.distance(p), circle.radius, max_relative = 1e-6);
        }
    }

    #[test]
    fn test_fit_circle_collinear() {
        let result = fit_circle(
            Point::new(0.0, 0.0),
            Point::new(1.0, 1.0),
            Point::new(2.0, 2.0),
        );
        assert_eq!(result, Err(Error::GeometryDegenerate));
    }

    #[test]
    fn test_fit_circle_coincident() {
        let p = Point::new(10.0, 20.0);
        assert_eq!(
            fit_circle(p, p, Point::new(30.0, 5.0)),
            Err(Error::GeometryDegenerate)
        );
        assert_eq!(fit_circle(p, p, p), Err(Error::GeometryDegenerate));
    }

    #[test]
    fn test_bounding_box() {
        let circle = Circle {
            centre: Point::new(10.0, 20.0),
            radius: 5.0,
        };
        assert_eq!(circle.bounding_box(), (5.0, 15.0, 15.0, 25.0));
    }
}
