// Geometry bridge between the webview and the host window
pub mod bridge;

// Widget settings loaded from config.toml
pub mod config;

// Positions, sizes and the clamp/layout policy
pub mod geometry;

// Host controller: owns the real window and global shortcuts
pub mod host;

// Note submission to the ingestion endpoint
pub mod ingest;

// Widget state machine, drag controller and animator
pub mod state;

// Persisted position and draft note
pub mod store;

// Voice note capture and transcription
pub mod transcribe;

// UI runtime driving the state machine
pub mod ui;

use bridge::{GeometryBridge, HostRequest};
use config::WidgetConfig;
use geometry::{Bounds, ScreenMetrics};
use host::shortcuts::ShortcutBindings;
use host::tauri_window::{screen_metrics, TauriWindow};
use host::HostController;
use ingest::{IngestClient, NoteSubmitter, StatusBoard, SubmitStatus};
use serde_json::Value;
use state::window::WidgetSnapshot;
use state::{PointerInput, WidgetStateMachine};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use store::NoteStore;
use tauri::{AppHandle, Emitter, Manager, RunEvent, State, WindowEvent};
use tauri_plugin_global_shortcut::{GlobalShortcutExt, ShortcutState};
use transcribe::Transcriber;
use ui::{UiHandle, UiInput, UiRuntime};

const MAIN_WINDOW: &str = "main";
const SCREEN_POLL_INTERVAL: Duration = Duration::from_secs(2);
const FALLBACK_SCREEN: ScreenMetrics = ScreenMetrics {
    x: 0.0,
    y: 0.0,
    width: 1920.0,
    height: 1080.0,
};

// Everything the commands and the shortcut handler need, managed after setup
struct WidgetState {
    ui: UiHandle,
    bridge: GeometryBridge,
    store: Arc<Mutex<NoteStore>>,
    submitter: NoteSubmitter,
    transcriber: Transcriber,
    shortcuts: ShortcutBindings,
}

// ===== Widget Commands =====

#[tauri::command]
fn pointer_event(input: PointerInput, state: State<WidgetState>) {
    state.ui.send(UiInput::Pointer(input));
}

#[tauri::command]
fn get_widget_state(state: State<WidgetState>) -> WidgetSnapshot {
    state.ui.snapshot()
}

// ===== Bridge Commands =====
// Raw channel names and payloads from the webview; validated, and geometry is
// routed through the state machine before reaching the host

#[tauri::command]
fn bridge_send(channel: String, payload: Option<Value>, state: State<WidgetState>) {
    state.ui.send_raw(&channel, payload);
}

#[tauri::command]
async fn bridge_invoke(
    channel: String,
    payload: Option<Value>,
    state: State<'_, WidgetState>,
) -> Result<Bounds, String> {
    state
        .ui
        .invoke_raw(&channel, payload)
        .await
        .map_err(|e| e.to_string())
}

#[tauri::command]
async fn close_window(state: State<'_, WidgetState>) -> Result<(), String> {
    state
        .bridge
        .invoke(HostRequest::CloseWindow)
        .await
        .map(|_| ())
        .map_err(|e| e.to_string())
}

// ===== Note Commands =====

#[tauri::command]
fn load_note(state: State<WidgetState>) -> Result<String, String> {
    let store = state.store.lock().map_err(|e| e.to_string())?;
    Ok(store.note())
}

#[tauri::command]
fn save_note(note: String, state: State<WidgetState>) -> Result<(), String> {
    let mut store = state.store.lock().map_err(|e| e.to_string())?;
    store.save_note(&note).map_err(|e| e.to_string())
}

#[tauri::command]
async fn submit_note(content: String, state: State<'_, WidgetState>) -> Result<(), String> {
    state
        .submitter
        .submit(&content, &state.store)
        .await
        .map_err(|e| e.to_string())
}

#[tauri::command]
fn get_submit_status(state: State<WidgetState>) -> SubmitStatus {
    state.submitter.status().current()
}

// ===== Recording Commands =====

#[tauri::command]
async fn start_recording(state: State<'_, WidgetState>) -> Result<String, String> {
    state
        .transcriber
        .record_and_transcribe()
        .await
        .map_err(|e| e.to_string())
}

/// Register every configured shortcut, replacing whatever was registered before
fn register_shortcuts(app: &AppHandle, bindings: &ShortcutBindings) -> Result<usize, String> {
    // Avoid "already registered" errors on re-registration
    let _ = app.global_shortcut().unregister_all();

    let mut success_count = 0;
    let mut last_error = None;

    for shortcut in bindings.shortcuts() {
        match app.global_shortcut().register(shortcut.clone()) {
            Ok(_) => success_count += 1,
            Err(e) => {
                log::warn!("[host] Failed to register shortcut {:?}: {}", shortcut, e);
                last_error = Some(e);
            }
        }
    }

    match (success_count, last_error) {
        (0, Some(e)) => Err(format!("Failed to register any shortcuts: {}", e)),
        (count, _) => {
            log::info!("[host] Global shortcuts enabled ({} registered)", count);
            Ok(count)
        }
    }
}

/// Re-read the work area and let the state machine re-clamp if it changed
fn refresh_screen(app: &AppHandle) {
    let (Some(window), Some(widget)) = (
        app.get_webview_window(MAIN_WINDOW),
        app.try_state::<WidgetState>(),
    ) else {
        return;
    };

    if let Some(screen) = screen_metrics(&window) {
        widget.ui.send(UiInput::Screen(screen));
    }
}

fn open_store(app: &AppHandle) -> NoteStore {
    let dir = match app.path().app_data_dir() {
        Ok(dir) => dir,
        Err(e) => {
            log::warn!("[store] No app data dir ({}), keeping state in memory", e);
            return NoteStore::in_memory();
        }
    };

    match NoteStore::open(dir.join("state.json")) {
        Ok(store) => store,
        Err(e) => {
            log::warn!("[store] {}; keeping state in memory", e);
            NoteStore::in_memory()
        }
    }
}

#[cfg_attr(mobile, tauri::mobile_entry_point)]
pub fn run() {
    let app = tauri::Builder::default()
        .plugin(
            tauri_plugin_log::Builder::new()
                .targets([
                    tauri_plugin_log::Target::new(tauri_plugin_log::TargetKind::LogDir {
                        file_name: Some("pensieve".into()),
                    }),
                    #[cfg(debug_assertions)]
                    tauri_plugin_log::Target::new(tauri_plugin_log::TargetKind::Stdout),
                ])
                .level(log::LevelFilter::Info)
                .level_for("pensieve_lib", log::LevelFilter::Debug)
                .build(),
        )
        .plugin(tauri_plugin_opener::init())
        .plugin(
            tauri_plugin_global_shortcut::Builder::new()
                .with_handler(|app, shortcut, event| {
                    // Only process on key press, not release
                    if event.state != ShortcutState::Pressed {
                        return;
                    }
                    let Some(widget) = app.try_state::<WidgetState>() else {
                        return;
                    };
                    let Some(action) = widget.shortcuts.action_for(shortcut) else {
                        return;
                    };

                    log::debug!("[host] Shortcut {:?} -> {}", shortcut, action.channel());
                    if let Some(window) = app.get_webview_window(MAIN_WINDOW) {
                        let _ = window.show();
                    }
                    let _ = app.emit(action.channel(), ());
                    widget.ui.send(UiInput::Notification(action));
                })
                .build(),
        )
        .setup(|app| {
            let config = WidgetConfig::load();
            let window = app
                .get_webview_window(MAIN_WINDOW)
                .ok_or("main window is missing")?;

            let screen = screen_metrics(&window).unwrap_or_else(|| {
                log::warn!("[host] Falling back to {:?}", FALLBACK_SCREEN);
                FALLBACK_SCREEN
            });

            let store = open_store(app.handle());
            let saved = store.position();
            let store = Arc::new(Mutex::new(store));

            // Host side
            let (bridge, host_inbox) = GeometryBridge::channel();
            let host = HostController::new(TauriWindow::new(window.clone()));
            tauri::async_runtime::spawn(host.run(host_inbox));

            // UI side
            let machine = WidgetStateMachine::new(config.clone(), screen, saved);
            let (runtime, ui, ui_inbox) = UiRuntime::new(
                machine,
                &config,
                bridge.clone(),
                Arc::clone(&store),
                app.handle().clone(),
            );
            tauri::async_runtime::spawn(runtime.run(ui_inbox));

            // Forward submission status to the webview
            let status = StatusBoard::new(config.status_clear_delay());
            let mut status_rx = status.subscribe();
            let handle = app.handle().clone();
            tauri::async_runtime::spawn(async move {
                while status_rx.changed().await.is_ok() {
                    let status = status_rx.borrow_and_update().clone();
                    let _ = handle.emit("submit-status", status);
                }
            });
            let submitter = NoteSubmitter::new(IngestClient::new(config.ingest.clone())?, status);

            let work_dir = app
                .path()
                .app_cache_dir()
                .unwrap_or_else(|_| std::env::temp_dir().join("pensieve"));
            let transcriber = Transcriber::new(work_dir, config.recording.clone());

            // Resolution and dock changes raise no event on an unfocused window
            let handle = app.handle().clone();
            tauri::async_runtime::spawn(async move {
                let mut ticker = tokio::time::interval(SCREEN_POLL_INTERVAL);
                loop {
                    ticker.tick().await;
                    refresh_screen(&handle);
                }
            });

            let shortcuts = ShortcutBindings::from_config(&config.shortcuts);
            if let Err(e) = register_shortcuts(app.handle(), &shortcuts) {
                log::warn!("[host] {}", e);
            }

            app.manage(WidgetState {
                ui,
                bridge,
                store,
                submitter,
                transcriber,
                shortcuts,
            });

            window.show()?;
            log::info!(
                "[host] Pensieve ready on a {}x{} screen",
                screen.width,
                screen.height
            );
            Ok(())
        })
        .on_window_event(|window, event| match event {
            WindowEvent::ScaleFactorChanged { .. }
            | WindowEvent::Moved(_)
            | WindowEvent::Focused(true) => {
                refresh_screen(window.app_handle());
            }
            _ => {}
        })
        .invoke_handler(tauri::generate_handler![
            // Widget
            pointer_event,
            get_widget_state,
            // Bridge
            bridge_send,
            bridge_invoke,
            close_window,
            // Notes
            load_note,
            save_note,
            submit_note,
            get_submit_status,
            // Recording
            start_recording,
        ])
        .build(tauri::generate_context!())
        .expect("error while building tauri application");

    app.run(|app, event| {
        if let RunEvent::Exit = event {
            let _ = app.global_shortcut().unregister_all();
        }
    });
}
