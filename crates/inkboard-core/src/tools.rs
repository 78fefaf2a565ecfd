//! Tool system: turns pointer gestures into draw actions.

use kurbo::Point;

use crate::action::{ActionKind, DrawAction, Rgb};

/// Eraser strokes are this many times wider than the selected stroke width.
pub const ERASER_WIDTH_FACTOR: f32 = 4.0;

/// Default stroke width for new tool managers.
pub const DEFAULT_STROKE_WIDTH: f32 = 2.0;

/// State of a tool interaction.
#[derive(Debug, Clone, Default)]
pub enum ToolState {
    /// Tool is idle, waiting for interaction.
    #[default]
    Idle,
    /// A gesture is in progress.
    Active {
        /// Starting point of the interaction.
        start: Point,
        /// Current point of the interaction.
        current: Point,
    },
}

/// Manages the current tool, colour and stroke width, and the gesture in progress.
#[derive(Debug, Clone)]
pub struct ToolManager {
    /// Currently selected tool.
    pub current_tool: ActionKind,
    /// Colour for new actions (ignored by the eraser).
    pub color: Rgb,
    /// Stroke width for new actions.
    pub stroke_width: f32,
    state: ToolState,
    /// Accumulated points for freehand and eraser strokes.
    stroke_points: Vec<Point>,
}

impl Default for ToolManager {
    fn default() -> Self {
        Self {
            current_tool: ActionKind::default(),
            color: Rgb::BLACK,
            stroke_width: DEFAULT_STROKE_WIDTH,
            state: ToolState::default(),
            stroke_points: Vec::new(),
        }
    }
}

impl ToolManager {
    /// Create a new tool manager.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the current tool, abandoning any gesture in progress.
    pub fn set_tool(&mut self, tool: ActionKind) {
        self.current_tool = tool;
        self.cancel();
    }

    /// Begin a tool interaction.
    pub fn begin(&mut self, point: Point) {
        self.stroke_points.clear();
        if self.current_tool.is_stroke() {
            self.stroke_points.push(point);
        }
        self.state = ToolState::Active {
            start: point,
            current: point,
        };
    }

    /// Update the current interaction (pointer dragged).
    pub fn update(&mut self, point: Point) {
        if let ToolState::Active { current, .. } = &mut self.state {
            *current = point;
            if self.current_tool.is_stroke() {
                self.stroke_points.push(point);
            }
        }
    }

    /// End the current interaction and return the finished action.
    pub fn end(&mut self, point: Point) -> Option<DrawAction> {
        let ToolState::Active { start, .. } = self.state else {
            return None;
        };
        if self.current_tool.is_stroke() {
            self.stroke_points.push(point);
        }
        let action = self.build(start, point);
        self.cancel();
        Some(action)
    }

    /// Cancel the current interaction.
    pub fn cancel(&mut self) {
        self.state = ToolState::Idle;
        self.stroke_points.clear();
    }

    /// Check if a tool interaction is active.
    pub fn is_active(&self) -> bool {
        matches!(self.state, ToolState::Active { .. })
    }

    /// Preview of the gesture in progress.
    ///
    /// The preview gets a fresh id every call and must never be appended to
    /// the canvas history; it is only for the renderer.
    pub fn preview(&self) -> Option<DrawAction> {
        match self.state {
            ToolState::Active { start, current } => Some(self.build(start, current)),
            ToolState::Idle => None,
        }
    }

    fn build(&self, start: Point, end: Point) -> DrawAction {
        match self.current_tool {
            ActionKind::Freehand => {
                DrawAction::freehand(self.stroke_points.clone(), self.color, self.stroke_width)
            }
            ActionKind::Eraser => DrawAction::eraser(
                self.stroke_points.clone(),
                self.stroke_width * ERASER_WIDTH_FACTOR,
            ),
            ActionKind::Line => DrawAction::line(start, end, self.color, self.stroke_width),
            ActionKind::Rect => DrawAction::rect(start, end, self.color, self.stroke_width),
            ActionKind::Circle => DrawAction::circle(start, end, self.color, self.stroke_width),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_selection() {
        let mut tm = ToolManager::new();
        assert_eq!(tm.current_tool, ActionKind::Freehand);

        tm.set_tool(ActionKind::Rect);
        assert_eq!(tm.current_tool, ActionKind::Rect);
    }

    #[test]
    fn test_shape_gesture() {
        let mut tm = ToolManager::new();
        tm.set_tool(ActionKind::Line);
        tm.color = Rgb::new(255, 0, 0);

        assert!(!tm.is_active());
        tm.begin(Point::new(0.0, 0.0));
        assert!(tm.is_active());
        tm.update(Point::new(5.0, 5.0));

        let action = tm.end(Point::new(10.0, 10.0)).expect("line");
        assert!(!tm.is_active());
        assert_eq!(action.kind(), ActionKind::Line);
        assert_eq!(action.color(), Rgb::new(255, 0, 0));
        let corners = action.corners().unwrap();
        assert_eq!(corners.start(), Point::new(0.0, 0.0));
        assert_eq!(corners.end(), Point::new(10.0, 10.0));
        assert!(action.validate().is_ok());
    }

    #[test]
    fn test_freehand_collects_points() {
        let mut tm = ToolManager::new();
        tm.begin(Point::new(0.0, 0.0));
        tm.update(Point::new(1.0, 1.0));
        tm.update(Point::new(2.0, 1.0));

        let preview = tm.preview().unwrap();
        assert_eq!(preview.points().len(), 3);

        let action = tm.end(Point::new(3.0, 0.0)).unwrap();
        assert_eq!(action.points().len(), 4);
        assert_eq!(action.points()[3], Point::new(3.0, 0.0));
    }

    #[test]
    fn test_eraser_width_and_color() {
        let mut tm = ToolManager::new();
        tm.set_tool(ActionKind::Eraser);
        tm.color = Rgb::new(1, 2, 3);
        tm.begin(Point::new(0.0, 0.0));
        let action = tm.end(Point::new(1.0, 0.0)).unwrap();
        assert_eq!(action.color(), Rgb::WHITE);
        assert_eq!(action.stroke_width(), DEFAULT_STROKE_WIDTH * ERASER_WIDTH_FACTOR);
    }

    #[test]
    fn test_end_without_begin() {
        let mut tm = ToolManager::new();
        assert!(tm.end(Point::new(1.0, 1.0)).is_none());
        assert!(tm.preview().is_none());
    }

    #[test]
    fn test_cancel_interaction() {
        let mut tm = ToolManager::new();
        tm.set_tool(ActionKind::Circle);
        tm.begin(Point::new(0.0, 0.0));
        tm.cancel();
        assert!(!tm.is_active());
        assert!(tm.end(Point::new(4.0, 4.0)).is_none());
    }
}
