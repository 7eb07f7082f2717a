// UI runtime: the untrusted side that owns the widget state machine
// Feeds it pointer input, host notifications, webview geometry requests and
// screen changes, and carries out the effects it returns. Talks to the host
// only through the bridge.

pub mod presenter;

use serde_json::Value;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{sleep_until, Instant};

use crate::bridge::{Ack, BridgeError, GeometryBridge, HostNotification, HostRequest};
use crate::config::WidgetConfig;
use crate::geometry::{Bounds, GeometryCommand, Position, ScreenMetrics};
use crate::state::animator::TransitionToken;
use crate::state::window::WidgetSnapshot;
use crate::state::{Effect, PointerInput, WidgetStateMachine};
use crate::store::NoteStore;

pub use presenter::Presenter;

const BUSY: &str = "Window is being dragged or animated";

#[derive(Debug)]
pub enum UiInput {
    Pointer(PointerInput),
    Notification(HostNotification),
    Screen(ScreenMetrics),
    /// `set-window` from the webview, answered on `ack` when present
    Geometry {
        command: GeometryCommand,
        ack: Option<Ack>,
    },
}

/// Handle for feeding the runtime and reading its latest state
#[derive(Clone)]
pub struct UiHandle {
    tx: mpsc::UnboundedSender<UiInput>,
    bridge: GeometryBridge,
    state: watch::Receiver<WidgetSnapshot>,
}

impl UiHandle {
    pub fn send(&self, input: UiInput) {
        if let Err(e) = self.tx.send(input) {
            log::warn!("[ui] Runtime stopped, dropping {:?}", e.0);
        }
    }

    pub fn snapshot(&self) -> WidgetSnapshot {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<WidgetSnapshot> {
        self.state.clone()
    }

    /// Untrusted fire-and-forget request from the webview.
    /// Geometry goes through the state machine so it never loses track of the window.
    pub fn send_raw(&self, channel: &str, payload: Option<Value>) {
        match HostRequest::parse(channel, payload) {
            Ok(HostRequest::SetWindow(command)) => {
                self.send(UiInput::Geometry { command, ack: None })
            }
            Ok(request) => self.bridge.send(request),
            Err(e) => log::warn!("[ui] Rejected send: {}", e),
        }
    }

    /// Untrusted invoke from the webview; resolves with the bounds the host applied
    pub async fn invoke_raw(
        &self,
        channel: &str,
        payload: Option<Value>,
    ) -> Result<Bounds, BridgeError> {
        match HostRequest::parse(channel, payload)? {
            HostRequest::SetWindow(command) => {
                let (ack, done) = oneshot::channel();
                self.tx
                    .send(UiInput::Geometry {
                        command,
                        ack: Some(ack),
                    })
                    .map_err(|_| BridgeError::Disconnected)?;
                done.await.map_err(|_| BridgeError::Disconnected)?
            }
            request => self.bridge.invoke(request).await,
        }
    }
}

pub struct UiRuntime<P: Presenter> {
    machine: WidgetStateMachine,
    bridge: GeometryBridge,
    store: Arc<Mutex<NoteStore>>,
    presenter: P,
    acknowledge_transitions: bool,
    frame_interval: Duration,
    next_frame: Option<(TransitionToken, Instant)>,
    state: watch::Sender<WidgetSnapshot>,
}

fn now() -> std::time::Instant {
    Instant::now().into_std()
}

impl<P: Presenter> UiRuntime<P> {
    /// Build the runtime, the handle that feeds it, and its input queue
    pub fn new(
        machine: WidgetStateMachine,
        config: &WidgetConfig,
        bridge: GeometryBridge,
        store: Arc<Mutex<NoteStore>>,
        presenter: P,
    ) -> (Self, UiHandle, mpsc::UnboundedReceiver<UiInput>) {
        let (tx, inbox) = mpsc::unbounded_channel();
        let (state, state_rx) = watch::channel(machine.snapshot());

        let handle = UiHandle {
            tx,
            bridge: bridge.clone(),
            state: state_rx,
        };
        let runtime = Self {
            machine,
            bridge,
            store,
            presenter,
            acknowledge_transitions: config.acknowledge_transitions,
            frame_interval: config.frame_interval(),
            next_frame: None,
            state,
        };
        (runtime, handle, inbox)
    }

    /// Process input until every [`UiHandle`] is dropped
    pub async fn run(mut self, mut inbox: mpsc::UnboundedReceiver<UiInput>) {
        log::info!("[ui] Runtime running");
        self.bridge
            .send(HostRequest::SetWindow(self.machine.initial_geometry()));
        self.present();

        loop {
            let deadline = self.next_frame.map(|(_, at)| at);
            tokio::select! {
                input = inbox.recv() => match input {
                    Some(input) => self.dispatch(input).await,
                    None => break,
                },
                _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    self.frame().await;
                }
            }
        }
        log::info!("[ui] Runtime stopped");
    }

    async fn dispatch(&mut self, input: UiInput) {
        let effects = match input {
            UiInput::Pointer(pointer) => self.machine.pointer(pointer, now()),
            UiInput::Notification(HostNotification::ToggleWidget) => {
                self.machine.toggle_widget(now())
            }
            UiInput::Notification(HostNotification::ToggleExpand) => self.machine.toggle_expand(),
            UiInput::Screen(screen) => self.machine.set_screen(screen),
            UiInput::Geometry { command, ack } => return self.adopt(command, ack).await,
        };
        self.execute(effects).await;
    }

    async fn adopt(&mut self, command: GeometryCommand, ack: Option<Ack>) {
        let Some(effects) = self.machine.request_geometry(command) else {
            log::debug!("[ui] {}, ignoring set-window", BUSY);
            if let Some(ack) = ack {
                let _ = ack.send(Err(BridgeError::Rejected(BUSY.to_string())));
            }
            return;
        };

        let mut applied = None;
        for effect in effects {
            match effect {
                Effect::Geometry(cmd) if ack.is_some() => {
                    applied = Some(self.bridge.invoke(HostRequest::SetWindow(cmd)).await);
                }
                effect => self.apply(effect).await,
            }
        }
        self.present();

        if let (Some(ack), Some(result)) = (ack, applied) {
            let _ = ack.send(result);
        }
    }

    async fn frame(&mut self) {
        let Some((token, _)) = self.next_frame.take() else {
            return;
        };
        let effects = self.machine.on_frame(token, now());
        self.execute(effects).await;
    }

    async fn execute(&mut self, effects: Vec<Effect>) {
        if effects.is_empty() && !self.state_changed() {
            return;
        }

        for effect in effects {
            self.apply(effect).await;
        }
        self.present();
    }

    async fn apply(&mut self, effect: Effect) {
        match effect {
            Effect::Geometry(cmd) => self.bridge.send(HostRequest::SetWindow(cmd)),
            Effect::Transition(cmd) => self.transition(cmd).await,
            Effect::CommitPosition(position) => self.commit(position),
            Effect::RequestFrame(token) => {
                self.next_frame = Some((token, Instant::now() + self.frame_interval));
            }
            Effect::Click => log::debug!("[ui] Click"),
        }
    }

    async fn transition(&self, cmd: GeometryCommand) {
        if !self.acknowledge_transitions {
            self.bridge.send(HostRequest::SetWindow(cmd));
            return;
        }

        match self.bridge.invoke(HostRequest::SetWindow(cmd)).await {
            Ok(applied) => log::debug!("[ui] Host applied {:?}", applied),
            Err(e) => log::warn!("[ui] Transition not applied: {}", e),
        }
    }

    fn commit(&self, position: Position) {
        let result = match self.store.lock() {
            Ok(mut store) => store.save_position(position).map_err(|e| e.to_string()),
            Err(e) => Err(e.to_string()),
        };
        if let Err(e) = result {
            log::warn!("[ui] Failed to persist position: {}", e);
        }
    }

    fn state_changed(&self) -> bool {
        *self.state.borrow() != self.machine.snapshot()
    }

    fn present(&self) {
        let snapshot = self.machine.snapshot();
        self.state.send_replace(snapshot);
        self.presenter.present(&snapshot);
    }
}
