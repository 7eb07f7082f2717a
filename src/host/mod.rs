// Host controller: the privileged side that owns the real window
// Applies validated bridge requests in FIFO order and acknowledges them

pub mod shortcuts;
pub mod tauri_window;

use thiserror::Error;
use tokio::sync::mpsc;

use crate::bridge::{BridgeError, Envelope, HostRequest};
use crate::geometry::{Bounds, GeometryCommand};

#[derive(Error, Debug)]
pub enum HostError {
    #[error("Window backend error: {0}")]
    Backend(String),
    #[error("Window already closed")]
    Closed,
}

/// The real on-screen window
pub trait WindowBackend: Send {
    /// Current bounds in logical pixels (outer origin, inner size)
    fn bounds(&self) -> Result<Bounds, HostError>;
    fn set_size(&mut self, width: u32, height: u32) -> Result<(), HostError>;
    fn set_position(&mut self, x: i32, y: i32) -> Result<(), HostError>;
    /// Called once the merged bounds are in place
    fn applied(&mut self, bounds: Bounds, animate: bool);
    fn close(&mut self) -> Result<(), HostError>;
}

pub struct HostController<W: WindowBackend> {
    window: W,
    closed: bool,
}

impl<W: WindowBackend> HostController<W> {
    pub fn new(window: W) -> Self {
        Self {
            window,
            closed: false,
        }
    }

    /// Apply only the provided fields, rounded to whole pixels
    pub fn apply(&mut self, command: GeometryCommand) -> Result<Bounds, BridgeError> {
        if self.closed {
            return Err(BridgeError::Rejected(HostError::Closed.to_string()));
        }

        let request = HostRequest::SetWindow(command);
        if let Err(e) = request.validate() {
            log::warn!("[host] Ignoring set-window: {}", e);
            return Err(e);
        }

        let current = self.window.bounds().map_err(reject)?;
        let next = command.apply_to(current);

        // Untouched axes are not re-applied, so a drag never resizes
        if (next.width, next.height) != (current.width, current.height) {
            self.window
                .set_size(next.width, next.height)
                .map_err(reject)?;
        }
        if (next.x, next.y) != (current.x, current.y) {
            self.window.set_position(next.x, next.y).map_err(reject)?;
        }
        self.window.applied(next, command.animate);
        Ok(next)
    }

    pub fn close(&mut self) -> Result<Bounds, BridgeError> {
        let last = self.window.bounds().map_err(reject)?;
        if !self.closed {
            log::info!("[host] Closing window");
            self.window.close().map_err(reject)?;
            self.closed = true;
        }
        Ok(last)
    }

    /// Execute one request and answer its acknowledgement slot, if any
    pub fn handle(&mut self, envelope: Envelope) {
        let Envelope { request, ack } = envelope;
        let result = match request {
            HostRequest::SetWindow(command) => self.apply(command),
            HostRequest::CloseWindow => self.close(),
        };

        match ack {
            // The caller may have given up waiting; nothing to do then
            Some(ack) => {
                let _ = ack.send(result);
            }
            None => {
                if let Err(e) = result {
                    log::debug!("[host] {} failed: {}", request.channel(), e);
                }
            }
        }
    }

    /// Serve the bridge inbox until it closes or the window is gone
    pub async fn run(mut self, mut inbox: mpsc::UnboundedReceiver<Envelope>) {
        log::info!("[host] Controller running");
        while let Some(envelope) = inbox.recv().await {
            self.handle(envelope);
            if self.closed {
                break;
            }
        }
        log::info!("[host] Controller stopped");
    }
}

fn reject(e: HostError) -> BridgeError {
    log::warn!("[host] {}", e);
    BridgeError::Rejected(e.to_string())
}


#[cfg(test)]
mod tests {
    use super::testing::FakeWindow;
    use super::*;
    use crate::bridge::GeometryBridge;
    use crate::geometry::{Position, Size};

    #[test]
    fn test_apply_rounds_and_merges() {
        let window = FakeWindow::default();
        let mut host = HostController::new(window.clone());

        let applied = host
            .apply(GeometryCommand {
                x: Some(100.4),
                y: Some(200.6),
                ..GeometryCommand::default()
            })
            .unwrap();

        assert_eq!(applied, Bounds::new(100, 201, 84, 84));
        assert_eq!(window.applied(), vec![(Bounds::new(100, 201, 84, 84), false)]);
    }

    #[test]
    fn test_position_updates_never_resize() {
        let window = FakeWindow::default();
        let mut host = HostController::new(window.clone());

        for x in [10.0, 20.0, 30.0] {
            host.apply(GeometryCommand::position(Position::new(x, 40.0), false))
                .unwrap();
        }
        // Full bounds with an unchanged size count as position-only too
        host.apply(GeometryCommand::bounds(
            Position::new(50.0, 40.0),
            Size::new(84.0, 84.0),
            false,
        ))
        .unwrap();
        assert_eq!(window.resizes(), 0);

        host.apply(GeometryCommand {
            width: Some(360.0),
            ..GeometryCommand::default()
        })
        .unwrap();
        assert_eq!(window.resizes(), 1);
        assert_eq!(window.bounds(), Bounds::new(50, 40, 360, 84));
    }

    #[test]
    fn test_invalid_geometry_leaves_bounds_unchanged() {
        let window = FakeWindow::default();
        let mut host = HostController::new(window.clone());

        let result = host.apply(GeometryCommand {
            width: Some(f64::NAN),
            x: Some(10.0),
            ..GeometryCommand::default()
        });

        assert!(matches!(result, Err(BridgeError::InvalidPayload { .. })));
        assert!(window.applied().is_empty());
        assert_eq!(window.bounds(), Bounds::new(0, 0, 84, 84));
    }

    #[test]
    fn test_backend_failure_is_reported_not_fatal() {
        let window = FakeWindow::default();
        window.state.lock().unwrap().fail_next = true;
        let mut host = HostController::new(window.clone());

        let cmd = GeometryCommand::position(Position::new(5.0, 5.0), false);
        assert!(matches!(host.apply(cmd), Err(BridgeError::Rejected(_))));
        assert_eq!(host.apply(cmd).unwrap(), Bounds::new(5, 5, 84, 84));
    }

    #[test]
    fn test_close_is_idempotent() {
        let window = FakeWindow::default();
        let mut host = HostController::new(window.clone());

        host.close().unwrap();
        host.close().unwrap();
        assert!(window.state.lock().unwrap().closed);
        assert!(host.apply(GeometryCommand::default()).is_err());
    }

    #[tokio::test]
    async fn test_run_applies_in_order_and_acks() {
        let window = FakeWindow::default();
        let host = HostController::new(window.clone());
        let (bridge, inbox) = GeometryBridge::channel();
        let task = tokio::spawn(host.run(inbox));

        for x in [10.0, 20.0, 30.0] {
            bridge.send(HostRequest::SetWindow(GeometryCommand::position(
                Position::new(x, 50.0),
                false,
            )));
        }

        let applied = bridge
            .invoke(HostRequest::SetWindow(GeometryCommand::bounds(
                Position::new(780.0, 440.0),
                Size::new(360.0, 200.0),
                true,
            )))
            .await
            .unwrap();
        assert_eq!(applied, Bounds::new(780, 440, 360, 200));

        let xs: Vec<i32> = window.applied().iter().map(|(b, _)| b.x).collect();
        assert_eq!(xs, vec![10, 20, 30, 780]);
        assert!(window.applied().last().unwrap().1);

        bridge.send(HostRequest::CloseWindow);
        task.await.unwrap();
        assert!(window.state.lock().unwrap().closed);
    }
}
