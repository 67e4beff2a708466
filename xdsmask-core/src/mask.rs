//! Untrusted mask regions and the registry that owns them.

use std::f64::consts::TAU;
use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::circle::{fit_circle, Circle};
use crate::geometry::Point;
use crate::token::{XdsParam, UNTRUSTED_ELLIPSE, UNTRUSTED_QUADRILATERAL, UNTRUSTED_RECTANGLE};
use crate::{Error, Result};

/// Shape drawn by the next completed click sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ShapeKind {
    #[default]
    Rectangle,
    Ellipse,
    /// Ellipse bounding a circle fitted through three clicks.
    Circle,
    Quadrilateral,
}

impl ShapeKind {
    pub const ALL: [ShapeKind; 4] = [
        ShapeKind::Rectangle,
        ShapeKind::Ellipse,
        ShapeKind::Circle,
        ShapeKind::Quadrilateral,
    ];

    /// Number of clicks that complete one shape.
    #[must_use]
    pub const fn clicks_required(self) -> usize {
        match self {
            ShapeKind::Rectangle | ShapeKind::Ellipse => 2,
            ShapeKind::Circle => 3,
            ShapeKind::Quadrilateral => 4,
        }
    }
}

impl fmt::Display for ShapeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShapeKind::Rectangle => write!(f, "Rectangle"),
            ShapeKind::Ellipse => write!(f, "Ellipse"),
            ShapeKind::Circle => write!(f, "Circle (3 points)"),
            ShapeKind::Quadrilateral => write!(f, "Quadrilateral"),
        }
    }
}

/// An untrusted region in detector pixel space.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum MaskRegion {
    Rectangle { x1: f64, x2: f64, y1: f64, y2: f64 },
    /// Ellipse given by its axis-aligned bounding box.
    Ellipse { x1: f64, x2: f64, y1: f64, y2: f64 },
    /// Vertices in click order.
    Quadrilateral { vertices: [Point; 4] },
}

impl MaskRegion {
    /// Rectangle spanned by two opposite corners.
    #[must_use]
    pub fn rectangle(a: Point, b: Point) -> Self {
        let (x1, x2, y1, y2) = ordered_box(a, b);
        MaskRegion::Rectangle { x1, x2, y1, y2 }
    }

    /// Ellipse inscribed in the box spanned by two opposite corners.
    #[must_use]
    pub fn ellipse(a: Point, b: Point) -> Self {
        let (x1, x2, y1, y2) = ordered_box(a, b);
        MaskRegion::Ellipse { x1, x2, y1, y2 }
    }

    /// Ellipse bounding a fitted circle.
    #[must_use]
    pub fn from_circle(circle: &Circle) -> Self {
        let (x1, x2, y1, y2) = circle.bounding_box();
        MaskRegion::Ellipse { x1, x2, y1, y2 }
    }

    /// Build the region for a completed click sequence of `kind`.
    ///
    /// # Errors
    /// Returns [`Error::GeometryDegenerate`] for a collinear circle and
    /// [`Error::InvalidToken`] if the click count does not match `kind`.
    pub fn from_clicks(kind: ShapeKind, clicks: &[Point]) -> Result<Self> {
        match (kind, clicks) {
            (ShapeKind::Rectangle, [a, b]) => Ok(Self::rectangle(*a, *b)),
            (ShapeKind::Ellipse, [a, b]) => Ok(Self::ellipse(*a, *b)),
            (ShapeKind::Circle, [a, b, c]) => Ok(Self::from_circle(&fit_circle(*a, *b, *c)?)),
            (ShapeKind::Quadrilateral, [a, b, c, d]) => Ok(MaskRegion::Quadrilateral {
                vertices: [*a, *b, *c, *d],
            }),
            _ => Err(Error::InvalidToken(format!(
                "{kind} needs {} clicks, got {}",
                kind.clicks_required(),
                clicks.len()
            ))),
        }
    }

    /// Axis-aligned bounds as `(min_x, max_x, min_y, max_y)`.
    #[must_use]
    pub fn bounds(&self) -> (f64, f64, f64, f64) {
        match self {
            MaskRegion::Rectangle { x1, x2, y1, y2 } | MaskRegion::Ellipse { x1, x2, y1, y2 } => {
                (x1.min(*x2), x1.max(*x2), y1.min(*y2), y1.max(*y2))
            }
            MaskRegion::Quadrilateral { vertices } => {
                let mut min_x = f64::INFINITY;
                let mut max_x = f64::NEG_INFINITY;
                let mut min_y = f64::INFINITY;
                let mut max_y = f64::NEG_INFINITY;
                for v in vertices {
                    min_x = min_x.min(v.x);
                    max_x = max_x.max(v.x);
                    min_y = min_y.min(v.y);
                    max_y = max_y.max(v.y);
                }
                (min_x, max_x, min_y, max_y)
            }
        }
    }

    /// Hit test used for deletion.
    ///
    /// Ellipses are tested against their bounding box, not the true outline.
    #[must_use]
    pub fn contains(&self, point: Point) -> bool {
        match self {
            MaskRegion::Rectangle { .. } | MaskRegion::Ellipse { .. } => {
                let (min_x, max_x, min_y, max_y) = self.bounds();
                point.x >= min_x && point.x <= max_x && point.y >= min_y && point.y <= max_y
            }
            MaskRegion::Quadrilateral { vertices } => {
                point_in_polygon(point, &emission_order(vertices))
            }
        }
    }

    /// Closed outline for display; quadrilaterals follow emission order.
    #[must_use]
    pub fn outline(&self) -> Vec<Point> {
        match self {
            MaskRegion::Rectangle { x1, x2, y1, y2 } => vec![
                Point::new(*x1, *y1),
                Point::new(*x2, *y1),
                Point::new(*x2, *y2),
                Point::new(*x1, *y2),
            ],
            MaskRegion::Ellipse { .. } => {
                const SEGMENTS: u32 = 72;
                let (min_x, max_x, min_y, max_y) = self.bounds();
                let cx = 0.5 * (min_x + max_x);
                let cy = 0.5 * (min_y + max_y);
                let rx = 0.5 * (max_x - min_x);
                let ry = 0.5 * (max_y - min_y);
                (0..SEGMENTS)
                    .map(|i| {
                        let t = TAU * f64::from(i) / f64::from(SEGMENTS);
                        Point::new(cx + rx * t.cos(), cy + ry * t.sin())
                    })
                    .collect()
            }
            MaskRegion::Quadrilateral { vertices } => emission_order(vertices).to_vec(),
        }
    }

    /// Token understood by the processing engine.
    #[must_use]
    pub fn to_param(&self) -> XdsParam {
        match self {
            MaskRegion::Rectangle { x1, x2, y1, y2 } => {
                XdsParam::pixels(UNTRUSTED_RECTANGLE, &[*x1, *x2, *y1, *y2])
            }
            MaskRegion::Ellipse { x1, x2, y1, y2 } => {
                XdsParam::pixels(UNTRUSTED_ELLIPSE, &[*x1, *x2, *y1, *y2])
            }
            MaskRegion::Quadrilateral { vertices } => {
                let coords: Vec<f64> = emission_order(vertices)
                    .iter()
                    .flat_map(|v| [v.x, v.y])
                    .collect();
                XdsParam::pixels(UNTRUSTED_QUADRILATERAL, &coords)
            }
        }
    }

    /// Parse a token produced by [`Self::to_param`].
    ///
    /// Quadrilateral vertices come back in canonical (sorted) order.
    ///
    /// # Errors
    /// Returns [`Error::InvalidToken`] for an unknown keyword or a wrong
    /// number of coordinates.
    pub fn from_param(param: &XdsParam) -> Result<Self> {
        let values = param.numbers()?;
        let expected = match param.key.as_str() {
            UNTRUSTED_RECTANGLE | UNTRUSTED_ELLIPSE => 4,
            UNTRUSTED_QUADRILATERAL => 8,
            other => {
                return Err(Error::InvalidToken(format!("not a mask keyword: {other}")));
            }
        };
        if values.len() != expected {
            return Err(Error::InvalidToken(format!(
                "{} expects {expected} values, got {}",
                param.key,
                values.len()
            )));
        }
        let region = match param.key.as_str() {
            UNTRUSTED_RECTANGLE => MaskRegion::Rectangle {
                x1: values[0],
                x2: values[1],
                y1: values[2],
                y2: values[3],
            },
            UNTRUSTED_ELLIPSE => MaskRegion::Ellipse {
                x1: values[0],
                x2: values[1],
                y1: values[2],
                y2: values[3],
            },
            _ => {
                let p = |i: usize| Point::new(values[2 * i], values[2 * i + 1]);
                // Emitted as sorted vertices 0, 1, 3, 2.
                MaskRegion::Quadrilateral {
                    vertices: [p(0), p(1), p(3), p(2)],
                }
            }
        };
        Ok(region)
    }
}

/// Sort quadrilateral vertices by ascending `x + y` (stable).
#[must_use]
pub fn canonical_quadrilateral(vertices: &[Point; 4]) -> [Point; 4] {
    let mut sorted = *vertices;
    sorted.sort_by(|a, b| (a.x + a.y).total_cmp(&(b.x + b.y)));
    sorted
}

/// Vertex sequence handed to the processing engine: sorted vertices 0, 1, 3, 2.
fn emission_order(vertices: &[Point; 4]) -> [Point; 4] {
    let s = canonical_quadrilateral(vertices);
    [s[0], s[1], s[3], s[2]]
}

fn ordered_box(a: Point, b: Point) -> (f64, f64, f64, f64) {
    (a.x.min(b.x), a.x.max(b.x), a.y.min(b.y), a.y.max(b.y))
}

fn point_in_polygon(point: Point, vertices: &[Point]) -> bool {
    let n = vertices.len();
    if n < 3 {
        return false;
    }
    let mut inside = false;
    let mut j = n - 1;
    for i in 0..n {
        let (xi, yi) = (vertices[i].x, vertices[i].y);
        let (xj, yj) = (vertices[j].x, vertices[j].y);
        let intersects = ((yi > point.y) != (yj > point.y))
            && (point.x < (xj - xi) * (point.y - yi) / (yj - yi + f64::EPSILON) + xi);
        if intersects {
            inside = !inside;
        }
        j = i;
    }
    inside
}

/// Where a mask came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum MaskOrigin {
    /// Handed into the session by the caller.
    Preexisting,
    /// Drawn during the current session.
    Session,
}

/// A registered mask.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Mask {
    pub id: usize,
    pub region: MaskRegion,
    pub origin: MaskOrigin,
}

/// Clicks collected towards the next shape.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ShapeDraft {
    kind: ShapeKind,
    clicks: Vec<Point>,
}

impl ShapeDraft {
    /// Empty draft for `kind`.
    #[must_use]
    pub fn new(kind: ShapeKind) -> Self {
        Self {
            kind,
            clicks: Vec::with_capacity(kind.clicks_required()),
        }
    }

    /// Shape being collected.
    #[must_use]
    pub fn kind(&self) -> ShapeKind {
        self.kind
    }

    /// Clicks collected so far.
    #[must_use]
    pub fn clicks(&self) -> &[Point] {
        &self.clicks
    }

    /// Whether no click has been collected yet.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.clicks.is_empty()
    }

    /// Add a click; on the final click the draft resets and yields the region.
    pub fn push(&mut self, point: Point) -> Option<Result<MaskRegion>> {
        self.clicks.push(point);
        if self.clicks.len() < self.kind.clicks_required() {
            return None;
        }
        let clicks = std::mem::take(&mut self.clicks);
        Some(MaskRegion::from_clicks(self.kind, &clicks))
    }

    /// Drop collected clicks.
    pub fn reset(&mut self) {
        self.clicks.clear();
    }
}

/// Ordered collection of untrusted regions for one annotation session.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MaskRegistry {
    masks: Vec<Mask>,
    #[cfg_attr(feature = "serde", serde(skip))]
    draft: ShapeDraft,
    next_id: usize,
}

impl Default for MaskRegistry {
    fn default() -> Self {
        Self {
            masks: Vec::new(),
            draft: ShapeDraft::default(),
            next_id: 1,
        }
    }
}

impl MaskRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry pre-populated with regions of the given origin.
    pub fn with_regions(regions: impl IntoIterator<Item = MaskRegion>, origin: MaskOrigin) -> Self {
        let mut registry = Self::new();
        for region in regions {
            registry.insert(region, origin);
        }
        registry
    }

    /// Append a region drawn in this session.
    pub fn add(&mut self, region: MaskRegion) -> usize {
        self.insert(region, MaskOrigin::Session)
    }

    /// Append a region with an explicit origin.
    pub fn insert(&mut self, region: MaskRegion, origin: MaskOrigin) -> usize {
        let id = self.next_id.max(1);
        self.next_id = id + 1;
        self.masks.push(Mask { id, region, origin });
        id
    }

    /// Delete the first mask (in insertion order) whose hit test matches.
    ///
    /// A miss is a no-op and returns `None`.
    pub fn delete_at(&mut self, point: Point) -> Option<Mask> {
        let index = self.masks.iter().position(|m| m.region.contains(point))?;
        Some(self.masks.remove(index))
    }

    /// Delete a mask by id.
    pub fn delete_id(&mut self, id: usize) -> bool {
        let before = self.masks.len();
        self.masks.retain(|m| m.id != id);
        self.masks.len() != before
    }

    /// Keep only masks of the given origin.
    pub fn retain_origin(&mut self, origin: MaskOrigin) {
        self.masks.retain(|m| m.origin == origin);
    }

    /// Remove every mask and any in-progress draft.
    pub fn clear(&mut self) {
        self.masks.clear();
        self.draft.reset();
        self.next_id = 1;
    }

    /// One token per region, in insertion order.
    #[must_use]
    pub fn serialize(&self) -> Vec<XdsParam> {
        self.masks.iter().map(|m| m.region.to_param()).collect()
    }

    /// Number of masks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.masks.len()
    }

    /// Whether there are no masks.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.masks.is_empty()
    }

    /// Iterate masks in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Mask> {
        self.masks.iter()
    }

    /// In-progress click sequence.
    #[must_use]
    pub fn draft(&self) -> &ShapeDraft {
        &self.draft
    }

    /// Select the shape for subsequent clicks, discarding any partial draft.
    pub fn set_shape_kind(&mut self, kind: ShapeKind) {
        self.draft = ShapeDraft::new(kind);
    }

    /// Discard the in-progress draft.
    pub fn cancel_draft(&mut self) {
        self.draft.reset();
    }

    /// Feed a drawing click.
    ///
    /// Returns the id of the committed mask when the click completes a shape.
    ///
    /// # Errors
    /// Returns [`Error::GeometryDegenerate`] when a circle cannot be fitted;
    /// the collected clicks are discarded and the registry is unchanged.
    pub fn click(&mut self, point: Point) -> Result<Option<usize>> {
        match self.draft.push(point) {
            None => Ok(None),
            Some(region) => Ok(Some(self.add(region?))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quad() -> [Point; 4] {
        [
            Point::new(10.0, 10.0),
            Point::new(100.0, 20.0),
            Point::new(110.0, 90.0),
            Point::new(5.0, 80.0),
        ]
    }

    #[test]
    fn test_rectangle_two_clicks() {
        let mut registry = MaskRegistry::new();
        assert_eq!(registry.click(Point::new(50.0, 80.0)).unwrap(), None);
        assert_eq!(registry.click(Point::new(10.0, 20.0)).unwrap(), Some(1));
        assert_eq!(registry.len(), 1);
        assert!(registry.draft().is_idle());
        let mask = registry.iter().next().unwrap();
        assert_eq!(
            mask.region,
            MaskRegion::Rectangle {
                x1: 10.0,
                x2: 50.0,
                y1: 20.0,
                y2: 80.0
            }
        );
        assert_eq!(mask.origin, MaskOrigin::Session);
    }

    #[test]
    fn test_same_kind_continues_after_commit() {
        let mut registry = MaskRegistry::new();
        registry.set_shape_kind(ShapeKind::Ellipse);
        for p in [(0.0, 0.0), (10.0, 10.0), (20.0, 20.0), (30.0, 40.0)] {
            registry.click(Point::new(p.0, p.1)).unwrap();
        }
        assert_eq!(registry.len(), 2);
        assert!(registry
            .iter()
            .all(|m| matches!(m.region, MaskRegion::Ellipse { .. })));
    }

    #[test]
    fn test_circle_clicks_make_bounding_ellipse() {
        let mut registry = MaskRegistry::new();
        registry.set_shape_kind(ShapeKind::Circle);
        registry.click(Point::new(100.0, 100.0)).unwrap();
        registry.click(Point::new(200.0, 100.0)).unwrap();
        registry.click(Point::new(150.0, 150.0)).unwrap();
        let mask = registry.iter().next().unwrap();
        let MaskRegion::Ellipse { x1, x2, y1, y2 } = mask.region else {
            panic!("expected ellipse");
        };
        assert!((x1 - 100.0).abs() < 1e-9);
        assert!((x2 - 200.0).abs() < 1e-9);
        assert!((y1 - 50.0).abs() < 1e-9);
        assert!((y2 - 150.0).abs() < 1e-9);
    }

    #[test]
    fn test_collinear_circle_leaves_registry_untouched() {
        let mut registry = MaskRegistry::new();
        registry.add(MaskRegion::rectangle(Point::new(0.0, 0.0), Point::new(5.0, 5.0)));
        let before = registry.clone();
        registry.set_shape_kind(ShapeKind::Circle);
        registry.click(Point::new(0.0, 0.0)).unwrap();
        registry.click(Point::new(1.0, 1.0)).unwrap();
        let result = registry.click(Point::new(2.0, 2.0));
        assert_eq!(result, Err(Error::GeometryDegenerate));
        assert_eq!(registry.serialize(), before.serialize());
        assert!(registry.draft().is_idle());
    }

    #[test]
    fn test_delete_at_removes_first_hit_only() {
        let mut registry = MaskRegistry::new();
        let a = registry.add(MaskRegion::rectangle(Point::new(0.0, 0.0), Point::new(50.0, 50.0)));
        let b = registry.add(MaskRegion::rectangle(Point::new(25.0, 25.0), Point::new(75.0, 75.0)));
        let c = registry.add(MaskRegion::ellipse(Point::new(200.0, 200.0), Point::new(300.0, 260.0)));

        let removed = registry.delete_at(Point::new(30.0, 30.0)).unwrap();
        assert_eq!(removed.id, a);
        let ids: Vec<usize> = registry.iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![b, c]);
    }

    #[test]
    fn test_ellipse_hit_uses_bounding_box() {
        let mut registry = MaskRegistry::new();
        registry.add(MaskRegion::ellipse(Point::new(0.0, 0.0), Point::new(100.0, 100.0)));
        // Corner of the box lies outside the true ellipse but still hits.
        assert!(registry.delete_at(Point::new(2.0, 2.0)).is_some());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_delete_miss_is_noop() {
        let mut registry = MaskRegistry::new();
        registry.add(MaskRegion::rectangle(Point::new(0.0, 0.0), Point::new(5.0, 5.0)));
        assert!(registry.delete_at(Point::new(500.0, 500.0)).is_none());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_quadrilateral_deleted_as_unit() {
        let mut registry = MaskRegistry::new();
        registry.add(MaskRegion::Quadrilateral { vertices: quad() });
        assert!(registry.delete_at(Point::new(1000.0, 1000.0)).is_none());
        assert!(registry.delete_at(Point::new(50.0, 50.0)).is_some());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_quadrilateral_emission_order() {
        let region = MaskRegion::Quadrilateral { vertices: quad() };
        // sums: 20, 120, 200, 85 -> sorted (10,10) (5,80) (100,20) (110,90)
        assert_eq!(
            region.to_param().value,
            "10 10 5 80 110 90 100 20"
        );
    }

    #[test]
    fn test_quadrilateral_canonical_under_rotation_and_reflection() {
        let base = quad();
        let expected = canonical_quadrilateral(&base);
        for shift in 0..4 {
            let mut rotated = base;
            rotated.rotate_left(shift);
            assert_eq!(canonical_quadrilateral(&rotated), expected);
            let mut reflected = rotated;
            reflected.reverse();
            assert_eq!(canonical_quadrilateral(&reflected), expected);
        }
    }

    #[test]
    fn test_param_round_trip() {
        let regions = [
            MaskRegion::Rectangle {
                x1: 10.0,
                x2: 400.0,
                y1: 1200.0,
                y2: 1300.0,
            },
            MaskRegion::Ellipse {
                x1: 1180.0,
                x2: 1290.0,
                y1: 1200.0,
                y2: 1310.0,
            },
        ];
        for region in regions {
            let token: XdsParam = region.to_param().to_string().parse().unwrap();
            assert_eq!(MaskRegion::from_param(&token).unwrap(), region);
        }
        let quad = MaskRegion::Quadrilateral { vertices: quad() };
        let parsed = MaskRegion::from_param(&quad.to_param()).unwrap();
        assert_eq!(parsed.to_param(), quad.to_param());
    }

    #[test]
    fn test_from_param_rejects_other_keys() {
        let beam = XdsParam::new("beam", "1 2");
        assert!(MaskRegion::from_param(&beam).is_err());
        let short = XdsParam::new(UNTRUSTED_RECTANGLE, "1 2 3");
        assert!(MaskRegion::from_param(&short).is_err());
    }

    #[test]
    fn test_changing_kind_discards_draft() {
        let mut registry = MaskRegistry::new();
        registry.click(Point::new(1.0, 1.0)).unwrap();
        assert!(!registry.draft().is_idle());
        registry.set_shape_kind(ShapeKind::Quadrilateral);
        assert!(registry.draft().is_idle());
        assert_eq!(registry.draft().kind(), ShapeKind::Quadrilateral);
    }
}
