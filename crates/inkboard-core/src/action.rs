//! Draw actions: the atomic, immutable units of the canvas history.

use kurbo::{Point, Rect};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ProtocolError;

/// Unique identifier for draw actions.
pub type ActionId = Uuid;

/// Serializable RGB stroke color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const BLACK: Rgb = Rgb::new(0, 0, 0);
    pub const WHITE: Rgb = Rgb::new(255, 255, 255);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

impl Default for Rgb {
    fn default() -> Self {
        Self::BLACK
    }
}

/// The kind of a draw action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionKind {
    #[default]
    Freehand,
    Line,
    Rect,
    Circle,
    Eraser,
}

impl ActionKind {
    /// Stroke kinds carry a point sequence; shape kinds carry two corners.
    pub fn is_stroke(self) -> bool {
        matches!(self, ActionKind::Freehand | ActionKind::Eraser)
    }
}

/// Two corner points of a line, rectangle or circle bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Corners {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
}

impl Corners {
    pub fn new(start: Point, end: Point) -> Self {
        Self {
            x1: start.x,
            y1: start.y,
            x2: end.x,
            y2: end.y,
        }
    }

    pub fn start(&self) -> Point {
        Point::new(self.x1, self.y1)
    }

    pub fn end(&self) -> Point {
        Point::new(self.x2, self.y2)
    }

    /// Normalized rectangle spanned by the two corners.
    pub fn rect(&self) -> Rect {
        Rect::from_points(self.start(), self.end())
    }
}

/// One visible drawing operation: a stroke or a shape.
///
/// Actions never change after construction; undo and redo move whole
/// actions in and out of the history keyed by [`DrawAction::id`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DrawAction {
    id: ActionId,
    action_type: ActionKind,
    #[serde(default)]
    points: Vec<Point>,
    #[serde(default)]
    corners: Option<Corners>,
    color: Rgb,
    stroke_width: f32,
}

impl DrawAction {
    fn shape(kind: ActionKind, start: Point, end: Point, color: Rgb, width: f32) -> Self {
        Self {
            id: Uuid::new_v4(),
            action_type: kind,
            points: Vec::new(),
            corners: Some(Corners::new(start, end)),
            color,
            stroke_width: width,
        }
    }

    fn stroke(kind: ActionKind, points: Vec<Point>, color: Rgb, width: f32) -> Self {
        Self {
            id: Uuid::new_v4(),
            action_type: kind,
            points,
            corners: None,
            color,
            stroke_width: width,
        }
    }

    pub fn line(start: Point, end: Point, color: Rgb, width: f32) -> Self {
        Self::shape(ActionKind::Line, start, end, color, width)
    }

    pub fn rect(start: Point, end: Point, color: Rgb, width: f32) -> Self {
        Self::shape(ActionKind::Rect, start, end, color, width)
    }

    /// A circle (ellipse) inscribed in the box spanned by the two corners.
    pub fn circle(start: Point, end: Point, color: Rgb, width: f32) -> Self {
        Self::shape(ActionKind::Circle, start, end, color, width)
    }

    pub fn freehand(points: Vec<Point>, color: Rgb, width: f32) -> Self {
        Self::stroke(ActionKind::Freehand, points, color, width)
    }

    /// Eraser strokes paint in the background color.
    pub fn eraser(points: Vec<Point>, width: f32) -> Self {
        Self::stroke(ActionKind::Eraser, points, Rgb::WHITE, width)
    }

    pub fn id(&self) -> ActionId {
        self.id
    }

    pub fn kind(&self) -> ActionKind {
        self.action_type
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }

    pub fn corners(&self) -> Option<Corners> {
        self.corners
    }

    pub fn color(&self) -> Rgb {
        self.color
    }

    pub fn stroke_width(&self) -> f32 {
        self.stroke_width
    }

    /// Axis-aligned bounding box of the geometry, not inflated by the stroke width.
    pub fn bounds(&self) -> Rect {
        if let Some(corners) = self.corners {
            return corners.rect();
        }
        let mut iter = self.points.iter();
        let Some(first) = iter.next() else {
            return Rect::ZERO;
        };
        iter.fold(Rect::from_points(*first, *first), |acc, p| acc.union_pt(*p))
    }

    /// Check that the geometry matches the kind.
    ///
    /// The constructors above do not enforce this, so both decoded actions
    /// and locally prepared draws go through it.
    pub fn validate(&self) -> Result<(), ProtocolError> {
        if !self.stroke_width.is_finite() || self.stroke_width < 0.0 {
            return Err(ProtocolError::InvalidAction {
                id: self.id,
                reason: format!("stroke width {} out of range", self.stroke_width),
            });
        }
        if self.action_type.is_stroke() {
            if self.points.is_empty() {
                return Err(ProtocolError::InvalidAction {
                    id: self.id,
                    reason: format!("{:?} needs at least one point", self.action_type),
                });
            }
        } else if self.corners.is_none() {
            return Err(ProtocolError::InvalidAction {
                id: self.id,
                reason: format!("{:?} needs two corners", self.action_type),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constructors_assign_unique_ids() {
        let a = DrawAction::line(Point::new(0.0, 0.0), Point::new(1.0, 1.0), Rgb::BLACK, 2.0);
        let b = DrawAction::line(Point::new(0.0, 0.0), Point::new(1.0, 1.0), Rgb::BLACK, 2.0);
        assert_ne!(a.id(), b.id());
        assert_ne!(a, b);
    }

    #[test]
    fn test_eraser_is_white() {
        let e = DrawAction::eraser(vec![Point::new(1.0, 1.0)], 8.0);
        assert_eq!(e.kind(), ActionKind::Eraser);
        assert_eq!(e.color(), Rgb::WHITE);
        assert!(e.corners().is_none());
    }

    #[test]
    fn test_bounds_normalizes_corners() {
        let r = DrawAction::rect(Point::new(10.0, 20.0), Point::new(0.0, 5.0), Rgb::BLACK, 1.0);
        assert_eq!(r.bounds(), Rect::new(0.0, 5.0, 10.0, 20.0));
    }

    #[test]
    fn test_bounds_of_stroke() {
        let f = DrawAction::freehand(
            vec![Point::new(3.0, 4.0), Point::new(-1.0, 9.0), Point::new(2.0, 0.0)],
            Rgb::new(200, 10, 10),
            2.0,
        );
        assert_eq!(f.bounds(), Rect::new(-1.0, 0.0, 3.0, 9.0));
    }

    #[test]
    fn test_validate_rejects_mismatched_geometry() {
        let empty = DrawAction::freehand(Vec::new(), Rgb::BLACK, 2.0);
        assert!(empty.validate().is_err());

        let json = format!(
            r#"{{"id":"{}","actionType":"LINE","points":[],"corners":null,"color":{{"r":0,"g":0,"b":0}},"strokeWidth":2.0}}"#,
            Uuid::new_v4()
        );
        let line: DrawAction = serde_json::from_str(&json).unwrap();
        assert!(line.validate().is_err());
    }

    #[test]
    fn test_wire_field_names() {
        let action = DrawAction::circle(Point::new(0.0, 0.0), Point::new(4.0, 4.0), Rgb::BLACK, 3.0);
        let json = serde_json::to_value(&action).unwrap();
        assert_eq!(json["actionType"], "CIRCLE");
        assert_eq!(json["strokeWidth"], 3.0);
        assert_eq!(json["corners"]["x2"], 4.0);
    }
}
