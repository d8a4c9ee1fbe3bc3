use crate::background::PANEL_PORT;
use crate::badge::ChromeBadge;
use crate::board::NoteBoard;
use crate::chrome;
use crate::components::note_stack::NoteStack;
use crate::components::toolbar::Toolbar;
use crate::components::ui::{Alert, AlertDescription};
use crate::config::PanelConfig;
use crate::frames::web::{FrameSignal, FrameSignalSink, WebFrameHost};
use crate::messages::RuntimeMessage;
use crate::panel::PanelController;
use crate::state::{BrowserPanel, PanelContext, PanelHandle, PanelState};
use crate::storage::{ChromeSyncStorage, NoteRepository, StorageChange};
use crate::util::now_ms;
use leptos::prelude::*;
use leptos::task::spawn_local;
use std::cell::RefCell;
use std::rc::{Rc, Weak};
use wasm_bindgen::closure::Closure;
use wasm_bindgen::JsValue;

fn build_controller(config: &PanelConfig, storage: ChromeSyncStorage) -> PanelHandle {
    Rc::new_cyclic(|weak: &Weak<RefCell<BrowserPanel>>| {
        let weak = weak.clone();
        let sink: FrameSignalSink = Rc::new(move |signal: FrameSignal| {
            let Some(panel) = weak.upgrade() else {
                return;
            };
            let Ok(mut panel) = panel.try_borrow_mut() else {
                tracing::debug!(?signal, "panel busy; frame signal dropped");
                return;
            };
            match signal {
                FrameSignal::Resized(id) => panel.frame_resized(&id),
                FrameSignal::Settled(id) => panel.frame_settled(&id),
            }
        });

        let repo = NoteRepository::new(storage, config);
        let board = NoteBoard::load(repo, ChromeBadge, config);
        RefCell::new(PanelController::new(
            board,
            WebFrameHost::new(sink),
            config,
            now_ms,
        ))
    })
}

/// Listen for the background and content agents, then tell the background we are ready.
fn connect_runtime(state: &PanelState) {
    let s = state.clone();
    let on_message = Closure::<dyn FnMut(JsValue, JsValue)>::new(move |raw: JsValue, _sender: JsValue| {
        let Some(message) = chrome::from_js::<RuntimeMessage>(&raw) else {
            return;
        };
        s.command(|p| p.handle_message(message));
        s.settle_preview();
    });
    if let Err(e) = chrome::add_listener(&["chrome", "runtime", "onMessage"], on_message) {
        tracing::warn!(error = ?e, "runtime messaging unavailable");
        return;
    }

    // The background watches this port to learn when the panel closes.
    let options = js_sys::Object::new();
    let _ = js_sys::Reflect::set(&options, &"name".into(), &PANEL_PORT.into());
    if let Err(e) = chrome::call(&["chrome", "runtime", "connect"], &[options.into()]) {
        tracing::debug!(error = ?e, "could not open panel port");
    }

    match chrome::to_js(&RuntimeMessage::PanelReady)
        .and_then(|ready| chrome::call(&["chrome", "runtime", "sendMessage"], &[ready]))
    {
        Ok(pending) => chrome::on_rejection(&pending, |e| {
            tracing::debug!(error = ?e, "panelReady not delivered");
        }),
        Err(e) => tracing::debug!(error = ?e, "could not signal readiness"),
    }
}

/// Apply writes made by other extension pages (another window's panel).
fn watch_storage(state: &PanelState, storage: ChromeSyncStorage, notes_key: String) {
    let s = state.clone();
    let on_changed = Closure::<dyn FnMut(JsValue, JsValue)>::new(move |changes: JsValue, area: JsValue| {
        let area = area.as_string().unwrap_or_default();
        let Some(change) = StorageChange::from_chrome_event(&storage, &notes_key, &changes, &area)
        else {
            return;
        };
        if s.run(|p| p.external_change(change)) == Some(true) {
            s.settle_preview();
        }
    });
    if let Err(e) = chrome::add_listener(&["chrome", "storage", "onChanged"], on_changed) {
        tracing::warn!(error = ?e, "storage change events unavailable");
    }
}

/// Build the controller once the synced notes are in, then start listening.
async fn start(state: PanelState, config: PanelConfig) {
    let storage =
        ChromeSyncStorage::hydrate(&[config.notes_key.as_str(), config.frame_states_key.as_str()]).await;
    let handle = build_controller(&config, storage.clone());
    {
        let s = state.clone();
        let mut panel = handle.borrow_mut();
        s.sync(panel.notes().notes());
        panel.subscribe(move |notes| s.sync(notes));
    }
    state.attach(handle);

    watch_storage(&state, storage, config.notes_key.clone());
    connect_runtime(&state);
}

#[component]
pub fn App() -> impl IntoView {
    let config = PanelConfig::from_env();
    let state = PanelState::new();
    provide_context(PanelContext(state.clone()));

    spawn_local(start(state.clone(), config));

    let s = state.clone();
    on_cleanup(move || {
        if let Some(handle) = s.detach() {
            if let Ok(mut panel) = handle.try_borrow_mut() {
                panel.teardown();
            }
        }
    });

    let error = state.error;
    view! {
        <div class="flex min-h-screen flex-col gap-2 bg-background p-2 text-foreground">
            <Toolbar />
            <Show when=move || error.get().is_some() fallback=|| ().into_view()>
                {move || {
                    error.get().map(|e| view! {
                        <Alert class="border-destructive/30">
                            <AlertDescription class="text-destructive">{e}</AlertDescription>
                        </Alert>
                    })
                }}
            </Show>
            <NoteStack />
        </div>
    }
}
