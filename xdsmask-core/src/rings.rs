//! Resolution and ice ring overlays.
//!
//! Rings are recomputed from the geometry on every call. On a swung
//! detector (non-zero 2θ) each ring is foreshortened horizontally into an
//! ellipse; rings that no longer reach the panel plane are skipped.

use std::f64::consts::{FRAC_PI_2, TAU};

use crate::geometry::{bragg_resolution, DetectorGeometry, Point};

/// Ice ring d-spacings in Ångström.
pub const ICE_RINGS_A: [f64; 21] = [
    3.890, 3.669, 3.441, 2.671, 2.249, 2.072, 1.948, 1.918, 1.883, 1.721, 1.524, 1.473, 1.444,
    1.372, 1.367, 1.299, 1.275, 1.261, 1.224, 1.171, 1.123,
];

/// What a ring marks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RingKind {
    /// Evenly spaced resolution limit.
    Resolution,
    /// Ice diffraction ring.
    Ice,
}

/// Ring outline in detector pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RingShape {
    Circle { centre: Point, radius: f64 },
    Ellipse { centre: Point, half_x: f64, half_y: f64 },
}

impl RingShape {
    /// Centre of the outline.
    #[must_use]
    pub fn centre(&self) -> Point {
        match self {
            RingShape::Circle { centre, .. } | RingShape::Ellipse { centre, .. } => *centre,
        }
    }

    /// Half-axes `(x, y)`.
    #[must_use]
    pub fn half_axes(&self) -> (f64, f64) {
        match self {
            RingShape::Circle { radius, .. } => (*radius, *radius),
            RingShape::Ellipse { half_x, half_y, .. } => (*half_x, *half_y),
        }
    }

    /// Closed polyline with `segments` vertices.
    #[must_use]
    pub fn outline(&self, segments: u32) -> Vec<Point> {
        let centre = self.centre();
        let (rx, ry) = self.half_axes();
        let segments = segments.max(3);
        (0..segments)
            .map(|i| {
                let t = TAU * f64::from(i) / f64::from(segments);
                Point::new(centre.x + rx * t.cos(), centre.y + ry * t.sin())
            })
            .collect()
    }

    /// Point where the resolution label is placed (top of the ring).
    #[must_use]
    pub fn label_anchor(&self) -> Point {
        let centre = self.centre();
        let (_, ry) = self.half_axes();
        Point::new(centre.x, centre.y - ry)
    }
}

/// One overlay ring with its d-spacing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolutionRing {
    pub kind: RingKind,
    pub shape: RingShape,
    pub resolution_a: f64,
}

/// `ring_count` evenly spaced resolution rings out to half the panel height.
pub fn compute_rings(
    geometry: &DetectorGeometry,
    ring_count: u32,
) -> impl Iterator<Item = ResolutionRing> + '_ {
    let step = if ring_count == 0 {
        0.0
    } else {
        0.5 * f64::from(geometry.pixel_count_y) / f64::from(ring_count)
    };
    (1..=ring_count).filter_map(move |i| {
        let radius = f64::from(i) * step;
        let angle = (radius * geometry.pixel_size_y_mm / geometry.distance_mm).atan();
        let shape = ring_shape(geometry, angle, radius)?;
        Some(ResolutionRing {
            kind: RingKind::Resolution,
            shape,
            resolution_a: bragg_resolution(geometry.wavelength_a, angle),
        })
    })
}

/// Rings for the fixed ice d-spacing table; spacings beyond reach are skipped.
pub fn compute_ice_rings(geometry: &DetectorGeometry) -> impl Iterator<Item = ResolutionRing> + '_ {
    ICE_RINGS_A.iter().filter_map(move |&d_spacing| {
        let sin_theta = geometry.wavelength_a / (2.0 * d_spacing);
        if sin_theta >= 1.0 {
            return None;
        }
        let angle = 2.0 * sin_theta.asin();
        if angle >= FRAC_PI_2 {
            return None;
        }
        let radius = geometry.distance_mm * angle.tan() / geometry.pixel_size_y_mm;
        let shape = ring_shape(geometry, angle, radius)?;
        Some(ResolutionRing {
            kind: RingKind::Ice,
            shape,
            resolution_a: d_spacing,
        })
    })
}

fn ring_shape(geometry: &DetectorGeometry, angle: f64, radius: f64) -> Option<RingShape> {
    let beam = geometry.displayed_beam_centre();
    if geometry.two_theta_deg == 0.0 {
        return Some(RingShape::Circle {
            centre: beam,
            radius,
        });
    }

    let swing = geometry.two_theta_deg.abs().to_radians();
    let positive_angle = angle + swing;
    if positive_angle >= FRAC_PI_2 {
        return None;
    }
    let negative_angle = angle - swing;
    let far = geometry.distance_mm * positive_angle.tan() / geometry.pixel_size_x_mm;
    let near = -geometry.distance_mm * negative_angle.tan() / geometry.pixel_size_x_mm;

    let sign = geometry.two_theta_deg.signum();
    let origin = beam.x - geometry.x_offset();
    let a = origin + sign * far;
    let b = origin + sign * near;
    Some(RingShape::Ellipse {
        centre: Point::new(0.5 * (a + b), beam.y),
        half_x: 0.5 * (a - b).abs(),
        half_y: radius,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn pilatus_like() -> DetectorGeometry {
        DetectorGeometry {
            distance_mm: 200.0,
            wavelength_a: 1.0,
            pixel_size_x_mm: 0.075,
            pixel_size_y_mm: 0.075,
            pixel_count_x: 2463,
            pixel_count_y: 2527,
            two_theta_deg: 0.0,
            beam_centre_px: Point::new(1231.5, 1263.5),
        }
    }

    #[test]
    fn test_first_ring_radius_and_resolution() {
        let geometry = pilatus_like();
        let rings: Vec<_> = compute_rings(&geometry, 5).collect();
        assert_eq!(rings.len(), 5);
        let RingShape::Circle { centre, radius } = rings[0].shape else {
            panic!("expected circle");
        };
        assert_eq!(centre, geometry.beam_centre_px);
        assert_relative_eq!(radius, 252.7, epsilon = 1e-9);
        let angle = (252.7_f64 * 0.075 / 200.0).atan();
        assert_relative_eq!(rings[0].resolution_a, 1.0 / (2.0 * (0.5 * angle).sin()));
        assert!(rings[0].resolution_a > 10.0 && rings[0].resolution_a < 11.0);
    }

    #[test]
    fn test_rings_idempotent() {
        let geometry = pilatus_like();
        let first: Vec<_> = compute_rings(&geometry, 7).collect();
        let second: Vec<_> = compute_rings(&geometry, 7).collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_resolution_decreases_outwards() {
        let geometry = pilatus_like();
        let rings: Vec<_> = compute_rings(&geometry, 12).collect();
        for pair in rings.windows(2) {
            assert!(pair[1].resolution_a < pair[0].resolution_a);
        }
    }

    #[test]
    fn test_zero_ring_count() {
        assert_eq!(compute_rings(&pilatus_like(), 0).count(), 0);
    }

    #[test]
    fn test_swung_rings_are_ellipses() {
        let geometry = DetectorGeometry {
            two_theta_deg: 15.0,
            ..pilatus_like()
        };
        let rings: Vec<_> = compute_rings(&geometry, 4).collect();
        assert!(!rings.is_empty());
        for (i, ring) in rings.iter().enumerate() {
            let RingShape::Ellipse {
                centre,
                half_x,
                half_y,
            } = ring.shape
            else {
                panic!("expected ellipse");
            };
            let radius = f64::from(u32::try_from(i + 1).unwrap()) * 0.5 * 2527.0 / 4.0;
            assert_relative_eq!(half_y, radius, epsilon = 1e-9);
            assert!(half_x > radius);
            assert_relative_eq!(centre.y, geometry.beam_centre_px.y);
        }
    }

    #[test]
    fn test_swing_direction_mirrors_ellipse() {
        let plus = DetectorGeometry {
            two_theta_deg: 10.0,
            ..pilatus_like()
        };
        let minus = DetectorGeometry {
            two_theta_deg: -10.0,
            ..pilatus_like()
        };
        let beam_x = plus.beam_centre_px.x;
        let a = compute_rings(&plus, 3).next().unwrap().shape;
        let b = compute_rings(&minus, 3).next().unwrap().shape;
        assert_relative_eq!(a.centre().x - beam_x, beam_x - b.centre().x, epsilon = 1e-6);
        assert_relative_eq!(a.half_axes().0, b.half_axes().0, epsilon = 1e-9);
    }

    #[test]
    fn test_ice_rings_table() {
        let geometry = pilatus_like();
        let rings: Vec<_> = compute_ice_rings(&geometry).collect();
        assert_eq!(rings.len(), ICE_RINGS_A.len());
        assert!(rings.iter().all(|r| r.kind == RingKind::Ice));
        assert_relative_eq!(rings[0].resolution_a, 3.890);
        let (r0, _) = rings[0].shape.half_axes();
        let (r1, _) = rings[1].shape.half_axes();
        assert!(r1 > r0);
    }

    #[test]
    fn test_ice_rings_beyond_reach_skipped() {
        let geometry = DetectorGeometry {
            wavelength_a: 3.0,
            ..pilatus_like()
        };
        // λ/2d >= 1 for every spacing below 1.5 Å.
        let count = compute_ice_rings(&geometry).count();
        assert!(count < ICE_RINGS_A.len());
        assert!(count > 0);
    }
}
