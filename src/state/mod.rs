use std::collections::VecDeque;
use std::time::Instant;

use serde::Deserialize;

use crate::config::WidgetConfig;
use crate::geometry::{self, GeometryCommand, Point, Position, ScreenMetrics, Size};
use self::animator::{Animation, TokenSource, TransitionToken};
use self::drag::{DragController, DragEvent};
use self::window::{WidgetSnapshot, WindowMode};

pub mod animator;
pub mod drag;
pub mod window;

/// Raw pointer input forwarded by the webview, in screen coordinates
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum PointerInput {
    Down {
        x: f64,
        y: f64,
        /// Press landed on a button/textarea rather than the window body
        #[serde(default)]
        interactive: bool,
    },
    Move {
        x: f64,
        y: f64,
        /// `PointerEvent.buttons`; zero means the release happened where we could not see it
        #[serde(default = "primary_button")]
        buttons: u16,
    },
    Up,
}

fn primary_button() -> u16 {
    1
}

/// Side effects requested by the state machine, executed in order by the UI runtime
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Effect {
    /// Fire-and-forget geometry (drag updates, animation frames, reflows)
    Geometry(GeometryCommand),
    /// Geometry for a discrete mode transition; may be acknowledged
    Transition(GeometryCommand),
    /// Persist the orb's new home
    CommitPosition(Position),
    /// Schedule a frame callback for this transition
    RequestFrame(TransitionToken),
    /// A press was released without dragging
    Click,
}

/// Work postponed until the current drag or animation ends
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Deferred {
    ToggleWidget,
    ToggleExpand,
    Reflow,
}

/// Logical window state of the UI context.
///
/// All geometry originates here: drag updates, mode transitions, reflows after
/// screen changes and animation frames. Only one of those sources is live at a
/// time; the rest are queued or cancelled.
pub struct WidgetStateMachine {
    config: WidgetConfig,
    screen: ScreenMetrics,
    mode: WindowMode,
    /// Current window origin as last sent to the host
    position: Position,
    /// Where the orb returns to when the widget closes
    orb_home: Position,
    /// Size preset to reopen the widget with
    last_expanded: bool,
    returning: bool,
    animation: Option<Animation>,
    active: Option<TransitionToken>,
    tokens: TokenSource,
    drag: DragController,
    deferred: VecDeque<Deferred>,
}

impl WidgetStateMachine {
    /// `saved` is the orb position persisted by a previous session, if any
    pub fn new(config: WidgetConfig, screen: ScreenMetrics, saved: Option<Position>) -> Self {
        let margin = config.margin;
        let orb_home = match saved {
            Some(p) => geometry::clamp(p, config.orb_size, margin, screen),
            None => geometry::bottom_right(config.orb_size, margin, screen),
        };

        let (mode, position) = if config.start_expanded {
            let size = config.widget_size_for(false);
            (
                WindowMode::Widget { expanded: false },
                geometry::centered(size, margin, screen),
            )
        } else {
            (WindowMode::Orb, orb_home)
        };

        Self {
            drag: DragController::new(config.drag_threshold),
            config,
            screen,
            mode,
            position,
            orb_home,
            last_expanded: false,
            returning: false,
            animation: None,
            active: None,
            tokens: TokenSource::default(),
            deferred: VecDeque::new(),
        }
    }

    pub fn mode(&self) -> WindowMode {
        self.mode
    }

    pub fn position(&self) -> Position {
        self.position
    }

    pub fn orb_home(&self) -> Position {
        self.orb_home
    }

    pub fn screen(&self) -> ScreenMetrics {
        self.screen
    }

    pub fn is_dragging(&self) -> bool {
        self.drag.is_dragging()
    }

    pub fn is_returning(&self) -> bool {
        self.returning
    }

    pub fn is_animating(&self) -> bool {
        self.active.is_some()
    }

    /// Size of the window in the current state
    pub fn size(&self) -> Size {
        match self.mode {
            // The orb shape is shown for the whole return trip
            _ if self.returning => self.config.orb_size,
            WindowMode::Orb => self.config.orb_size,
            WindowMode::Widget { expanded } => self.config.widget_size_for(expanded),
        }
    }

    pub fn snapshot(&self) -> WidgetSnapshot {
        WidgetSnapshot {
            mode: self.mode,
            dragging: self.is_dragging(),
            returning: self.returning,
            animating: self.is_animating(),
            position: self.position,
            size: self.size(),
        }
    }

    /// Bounds to apply when the window is first shown
    pub fn initial_geometry(&self) -> GeometryCommand {
        GeometryCommand::bounds(self.position, self.size(), false)
    }

    pub fn pointer(&mut self, input: PointerInput, now: Instant) -> Vec<Effect> {
        match input {
            PointerInput::Down { x, y, interactive } => {
                self.pointer_down(Point::new(x, y), interactive, now)
            }
            PointerInput::Move { buttons: 0, .. } => self.release_lost(now),
            PointerInput::Move { x, y, .. } => self.pointer_move(Point::new(x, y)),
            PointerInput::Up => self.pointer_up(now),
        }
    }

    pub fn pointer_down(&mut self, mouse: Point, interactive: bool, now: Instant) -> Vec<Effect> {
        // A new press means the previous release never arrived
        let mut effects = self.release_lost(now);
        if interactive {
            return effects;
        }

        if self.is_animating() {
            // Grabbing the window mid-transition stops it where it is
            self.cancel_animation();
            if self.returning {
                self.returning = false;
                self.mode = WindowMode::Orb;
            }
            effects.extend(self.drain_deferred(now));
        }

        self.drag.pointer_down(mouse, self.position, false);
        effects
    }

    pub fn pointer_move(&mut self, mouse: Point) -> Vec<Effect> {
        match self.drag.pointer_move(mouse) {
            DragEvent::Started(proposed) | DragEvent::Moved(proposed) => {
                let size = self.size();
                self.position = geometry::clamp(proposed, size, self.config.margin, self.screen);
                vec![Effect::Geometry(GeometryCommand::bounds(self.position, size, false))]
            }
            _ => Vec::new(),
        }
    }

    pub fn pointer_up(&mut self, now: Instant) -> Vec<Effect> {
        let mut effects = Vec::new();

        match self.drag.pointer_up() {
            DragEvent::Click => {
                effects.push(Effect::Click);
                if self.mode.is_orb() {
                    effects.extend(self.open_widget());
                }
            }
            DragEvent::Released(proposed) => {
                let size = self.size();
                self.position = geometry::clamp(proposed, size, self.config.margin, self.screen);

                // Only the orb's place survives a restart; the widget always opens centered
                if self.mode.is_orb() {
                    self.orb_home = self.position;
                    effects.push(Effect::CommitPosition(self.position));
                    if self.config.open_widget_on_drag_release {
                        effects.extend(self.open_widget());
                    }
                }
            }
            _ => return effects,
        }

        effects.extend(self.drain_deferred(now));
        effects
    }

    /// End a gesture whose pointer-up was lost: a drag is released where it
    /// last was, a pending click is dropped
    fn release_lost(&mut self, now: Instant) -> Vec<Effect> {
        if self.is_dragging() {
            log::debug!("[state] Pointer-up lost, finishing the drag");
            return self.pointer_up(now);
        }
        self.drag.cancel();
        Vec::new()
    }

    /// Geometry requested directly by the webview.
    ///
    /// The origin is adopted, clamped, as the current position (and the orb
    /// home in orb mode); the size always follows the mode. Refused with
    /// `None` while a drag or animation owns the window.
    pub fn request_geometry(&mut self, command: GeometryCommand) -> Option<Vec<Effect>> {
        if self.is_dragging() || self.is_animating() {
            log::debug!("[state] Refusing webview geometry while busy");
            return None;
        }
        if command.width.is_some() || command.height.is_some() {
            log::debug!("[state] Webview size ignored, size follows the mode");
        }
        self.drag.cancel();

        let size = self.size();
        let desired = Position::new(
            command.x.unwrap_or(self.position.x),
            command.y.unwrap_or(self.position.y),
        );
        self.position = geometry::clamp(desired, size, self.config.margin, self.screen);

        let mut effects = vec![Effect::Geometry(GeometryCommand::bounds(
            self.position,
            size,
            command.animate,
        ))];
        if self.mode.is_orb() {
            self.orb_home = self.position;
            effects.push(Effect::CommitPosition(self.position));
        }
        Some(effects)
    }

    /// External `toggle-widget`: orb opens to widget, widget returns to orb
    pub fn toggle_widget(&mut self, now: Instant) -> Vec<Effect> {
        if self.is_dragging() {
            self.defer(Deferred::ToggleWidget);
            return Vec::new();
        }
        // A press that has not become a drag yet loses its anchor
        self.drag.cancel();

        if self.returning {
            log::debug!("[state] Toggle during return, reopening widget");
            self.cancel_animation();
            self.returning = false;
            return self.open_widget();
        }

        match self.mode {
            WindowMode::Orb => self.open_widget(),
            WindowMode::Widget { .. } => self.start_return(now),
        }
    }

    /// External `toggle-expand`: swap widget size presets
    pub fn toggle_expand(&mut self) -> Vec<Effect> {
        if self.is_dragging() {
            self.defer(Deferred::ToggleExpand);
            return Vec::new();
        }

        match self.mode {
            WindowMode::Widget { expanded } if !self.returning => {
                self.drag.cancel();
                let expanded = !expanded;
                self.last_expanded = expanded;
                self.mode = WindowMode::Widget { expanded };
                let size = self.size();
                self.position = geometry::centered(size, self.config.margin, self.screen);
                vec![Effect::Transition(GeometryCommand::bounds(self.position, size, true))]
            }
            _ => {
                log::debug!("[state] toggle-expand ignored outside the widget");
                Vec::new()
            }
        }
    }

    /// Screen metrics changed; keep everything on-screen
    pub fn set_screen(&mut self, screen: ScreenMetrics) -> Vec<Effect> {
        if screen == self.screen {
            return Vec::new();
        }
        self.screen = screen;

        if self.is_dragging() || self.is_animating() {
            self.defer(Deferred::Reflow);
            return Vec::new();
        }
        self.reflow()
    }

    /// Frame callback for `token`. Stale tokens produce nothing.
    pub fn on_frame(&mut self, token: TransitionToken, now: Instant) -> Vec<Effect> {
        if self.active != Some(token) {
            return Vec::new();
        }
        let Some(frame) = self.animation.as_mut().and_then(|a| a.step(now)) else {
            return Vec::new();
        };

        self.position = frame.position;
        let mut effects = vec![Effect::Geometry(frame.command)];

        if !frame.done {
            effects.push(Effect::RequestFrame(token));
            return effects;
        }

        self.cancel_animation();
        if self.returning {
            self.returning = false;
            self.mode = WindowMode::Orb;
        }
        effects.extend(self.drain_deferred(now));
        effects
    }

    fn open_widget(&mut self) -> Vec<Effect> {
        let expanded = self.last_expanded;
        self.mode = WindowMode::Widget { expanded };
        let size = self.size();
        self.position = geometry::centered(size, self.config.margin, self.screen);
        vec![Effect::Transition(GeometryCommand::bounds(self.position, size, true))]
    }

    fn start_return(&mut self, now: Instant) -> Vec<Effect> {
        let widget_size = self.size();
        let orb = self.config.orb_size;

        // Shrink around the widget's center, then glide home
        let center = self
            .position
            .offset(widget_size.width / 2.0, widget_size.height / 2.0);
        let start = geometry::clamp(
            center.offset(-orb.width / 2.0, -orb.height / 2.0),
            orb,
            self.config.margin,
            self.screen,
        );

        self.returning = true;
        self.position = start;

        let token = self.tokens.issue();
        self.active = Some(token);
        self.animation = Some(Animation::new(
            token,
            start,
            self.orb_home,
            self.config.return_duration(),
            now,
        ));

        vec![
            Effect::Transition(GeometryCommand::bounds(start, orb, false)),
            Effect::RequestFrame(token),
        ]
    }

    fn reflow(&mut self) -> Vec<Effect> {
        let margin = self.config.margin;
        self.orb_home = geometry::clamp(self.orb_home, self.config.orb_size, margin, self.screen);

        let size = self.size();
        self.position = geometry::clamp(self.position, size, margin, self.screen);
        vec![Effect::Geometry(GeometryCommand::bounds(self.position, size, false))]
    }

    fn cancel_animation(&mut self) {
        self.active = None;
        self.animation = None;
    }

    fn defer(&mut self, work: Deferred) {
        if work == Deferred::Reflow && self.deferred.contains(&Deferred::Reflow) {
            return;
        }
        log::debug!("[state] Deferring {:?}", work);
        self.deferred.push_back(work);
    }

    /// Replay postponed work until something busies the state machine again
    fn drain_deferred(&mut self, now: Instant) -> Vec<Effect> {
        let mut effects = Vec::new();

        while !self.is_dragging() && !self.is_animating() {
            let Some(work) = self.deferred.pop_front() else {
                break;
            };
            effects.extend(match work {
                Deferred::ToggleWidget => self.toggle_widget(now),
                Deferred::ToggleExpand => self.toggle_expand(),
                Deferred::Reflow => self.reflow(),
            });
        }

        effects
    }
}
