// Geometry bridge between the untrusted UI context and the host
// Only allow-listed channels cross, and every payload is validated first

use serde_json::{Map, Value};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

use crate::geometry::{Bounds, GeometryCommand};

pub const SET_WINDOW: &str = "set-window";
pub const CLOSE_WINDOW: &str = "close-window";
pub const TOGGLE_WIDGET: &str = "toggle-widget";
pub const TOGGLE_EXPAND: &str = "toggle-expand";

const SET_WINDOW_KEYS: [&str; 5] = ["width", "height", "x", "y", "animate"];

#[derive(Error, Debug, Clone, PartialEq)]
pub enum BridgeError {
    #[error("Invalid channel: {0}")]
    ChannelNotAllowed(String),
    #[error("Invalid payload for {channel}: {reason}")]
    InvalidPayload {
        channel: &'static str,
        reason: String,
    },
    #[error("Host controller is not running")]
    Disconnected,
    #[error("Host rejected request: {0}")]
    Rejected(String),
}

impl BridgeError {
    fn invalid(channel: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidPayload {
            channel,
            reason: reason.into(),
        }
    }
}

/// Request from the UI context to the host
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HostRequest {
    SetWindow(GeometryCommand),
    CloseWindow,
}

impl HostRequest {
    pub fn channel(&self) -> &'static str {
        match self {
            HostRequest::SetWindow(_) => SET_WINDOW,
            HostRequest::CloseWindow => CLOSE_WINDOW,
        }
    }

    /// Parse an untrusted `(channel, payload)` pair coming from the webview
    pub fn parse(channel: &str, payload: Option<Value>) -> Result<Self, BridgeError> {
        match channel {
            SET_WINDOW => {
                let payload = payload.unwrap_or(Value::Null);
                let Value::Object(fields) = payload else {
                    return Err(BridgeError::invalid(SET_WINDOW, "payload must be an object"));
                };
                let request = HostRequest::SetWindow(parse_set_window(&fields)?);
                request.validate()?;
                Ok(request)
            }
            CLOSE_WINDOW => match payload {
                None | Some(Value::Null) => Ok(HostRequest::CloseWindow),
                Some(_) => Err(BridgeError::invalid(CLOSE_WINDOW, "takes no payload")),
            },
            other => Err(BridgeError::ChannelNotAllowed(other.to_string())),
        }
    }

    /// Reject non-finite geometry before it reaches the host
    pub fn validate(&self) -> Result<(), BridgeError> {
        match self {
            HostRequest::SetWindow(cmd) => match cmd.first_non_finite() {
                Some(field) => Err(BridgeError::invalid(
                    SET_WINDOW,
                    format!("{} is not a finite number", field),
                )),
                None => Ok(()),
            },
            HostRequest::CloseWindow => Ok(()),
        }
    }
}

fn parse_set_window(fields: &Map<String, Value>) -> Result<GeometryCommand, BridgeError> {
    if let Some(unknown) = fields.keys().find(|k| !SET_WINDOW_KEYS.contains(&k.as_str())) {
        return Err(BridgeError::invalid(
            SET_WINDOW,
            format!("unknown field {}", unknown),
        ));
    }

    let number = |key: &str| -> Result<Option<f64>, BridgeError> {
        match fields.get(key) {
            None => Ok(None),
            Some(Value::Number(n)) => n
                .as_f64()
                .filter(|v| v.is_finite())
                .map(Some)
                .ok_or_else(|| BridgeError::invalid(SET_WINDOW, format!("{} is not a finite number", key))),
            Some(_) => Err(BridgeError::invalid(SET_WINDOW, format!("{} must be a number", key))),
        }
    };

    let animate = match fields.get("animate") {
        None => false,
        Some(Value::Bool(b)) => *b,
        Some(_) => return Err(BridgeError::invalid(SET_WINDOW, "animate must be a bool")),
    };

    Ok(GeometryCommand {
        width: number("width")?,
        height: number("height")?,
        x: number("x")?,
        y: number("y")?,
        animate,
    })
}

/// Notification from the host to the UI context
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostNotification {
    ToggleWidget,
    ToggleExpand,
}

impl HostNotification {
    pub fn channel(&self) -> &'static str {
        match self {
            HostNotification::ToggleWidget => TOGGLE_WIDGET,
            HostNotification::ToggleExpand => TOGGLE_EXPAND,
        }
    }

    pub fn from_channel(channel: &str) -> Result<Self, BridgeError> {
        match channel {
            TOGGLE_WIDGET => Ok(HostNotification::ToggleWidget),
            TOGGLE_EXPAND => Ok(HostNotification::ToggleExpand),
            other => Err(BridgeError::ChannelNotAllowed(other.to_string())),
        }
    }
}

pub type Ack = oneshot::Sender<Result<Bounds, BridgeError>>;

/// A request in flight, with an optional acknowledgement slot
#[derive(Debug)]
pub struct Envelope {
    pub request: HostRequest,
    pub ack: Option<Ack>,
}

/// UI-side handle to the host. Cloning shares the same FIFO channel.
#[derive(Debug, Clone)]
pub struct GeometryBridge {
    tx: mpsc::UnboundedSender<Envelope>,
}

impl GeometryBridge {
    /// Create a bridge and the host-side inbox it feeds
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Envelope>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Fire-and-forget. Invalid requests are logged and dropped.
    pub fn send(&self, request: HostRequest) {
        if let Err(e) = request.validate() {
            log::warn!("[bridge] Dropping {}: {}", request.channel(), e);
            return;
        }

        if self.tx.send(Envelope { request, ack: None }).is_err() {
            log::warn!("[bridge] Host gone, {} not delivered", request.channel());
        }
    }

    /// Send and wait until the host reports the bounds it applied
    pub async fn invoke(&self, request: HostRequest) -> Result<Bounds, BridgeError> {
        request.validate()?;

        let (ack, done) = oneshot::channel();
        self.tx
            .send(Envelope {
                request,
                ack: Some(ack),
            })
            .map_err(|_| BridgeError::Disconnected)?;

        done.await.map_err(|_| BridgeError::Disconnected)?
    }
}
