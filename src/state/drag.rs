// Pointer tracking: turns raw pointer events into proposed window positions

use crate::geometry::{Point, Position};

/// Ephemeral state for one pointer-down..pointer-up sequence
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DragSession {
    pub start_mouse: Point,
    pub start_window: Position,
    pub moved: bool,
    /// Last proposed (unclamped) window origin
    pub last_proposed: Position,
}

/// Outcome of a pointer event
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DragEvent {
    /// No session, or the press landed on an interactive child
    Ignored,
    /// Session started, still classified as a click
    Pending,
    /// The gesture just crossed the threshold and became a drag
    Started(Position),
    /// Proposed window origin for an ongoing drag (not yet clamped)
    Moved(Position),
    /// Released without crossing the threshold
    Click,
    /// Released after dragging; carries the final proposed origin
    Released(Position),
}

#[derive(Debug)]
pub struct DragController {
    threshold: f64,
    session: Option<DragSession>,
}

impl DragController {
    pub fn new(threshold: f64) -> Self {
        Self {
            threshold,
            session: None,
        }
    }

    pub fn session(&self) -> Option<&DragSession> {
        self.session.as_ref()
    }

    /// True once the current gesture has crossed the threshold
    pub fn is_dragging(&self) -> bool {
        self.session.is_some_and(|s| s.moved)
    }

    pub fn pointer_down(&mut self, mouse: Point, window: Position, on_interactive: bool) -> DragEvent {
        if on_interactive {
            return DragEvent::Ignored;
        }

        self.session = Some(DragSession {
            start_mouse: mouse,
            start_window: window,
            moved: false,
            last_proposed: window,
        });
        DragEvent::Pending
    }

    pub fn pointer_move(&mut self, mouse: Point) -> DragEvent {
        let threshold = self.threshold;
        let Some(session) = self.session.as_mut() else {
            return DragEvent::Ignored;
        };

        let dx = mouse.x - session.start_mouse.x;
        let dy = mouse.y - session.start_mouse.y;

        if !session.moved {
            if dx.abs() <= threshold && dy.abs() <= threshold {
                return DragEvent::Pending;
            }
            session.moved = true;
            session.last_proposed = session.start_window.offset(dx, dy);
            return DragEvent::Started(session.last_proposed);
        }

        session.last_proposed = session.start_window.offset(dx, dy);
        DragEvent::Moved(session.last_proposed)
    }

    /// Ends the session. The release point is the last move.
    pub fn pointer_up(&mut self) -> DragEvent {
        match self.session.take() {
            None => DragEvent::Ignored,
            Some(session) if session.moved => DragEvent::Released(session.last_proposed),
            Some(_) => DragEvent::Click,
        }
    }

    pub fn cancel(&mut self) {
        self.session = None;
    }
}
