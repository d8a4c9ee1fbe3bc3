//! Background service worker: turns keyboard shortcuts and context-menu
//! clicks into messages for the side panel, holding them until the panel
//! says it is listening.

use crate::chrome;
use crate::config::PanelConfig;
use crate::error::RelayError;
use crate::messages::{PanelCommand, RuntimeMessage};
use crate::relay::{FallbackCheck, FallbackOutcome, Relay, Transport};
use std::cell::RefCell;
use std::rc::{Rc, Weak};
use std::str::FromStr;
use wasm_bindgen::closure::Closure;
use wasm_bindgen::prelude::wasm_bindgen;
use wasm_bindgen::JsValue;

/// Name of the long-lived port the panel opens; its disconnect means the panel closed.
pub const PANEL_PORT: &str = "sticky-panel";

/// The message a command produces. `page_url` is the page the command was invoked on.
pub fn message_for(command: PanelCommand, page_url: Option<&str>) -> RuntimeMessage {
    match command {
        PanelCommand::AddNote => RuntimeMessage::AddNote { content: None },
        PanelCommand::AddUrlNote => RuntimeMessage::AddUrlNote { url: None },
        PanelCommand::AddPageNote => RuntimeMessage::AddUrlNote {
            url: page_url
                .map(str::trim)
                .filter(|u| u.starts_with("http://") || u.starts_with("https://"))
                .map(str::to_string),
        },
    }
}

pub fn menu_title(command: PanelCommand) -> &'static str {
    match command {
        PanelCommand::AddNote => "Add sticky note",
        PanelCommand::AddUrlNote => "Add web page note",
        PanelCommand::AddPageNote => "Pin this page as a note",
    }
}

pub struct Background<T> {
    relay: Relay<T>,
}

impl<T: Transport> Background<T> {
    pub fn new(transport: T) -> Self {
        Self {
            relay: Relay::new(transport),
        }
    }

    pub fn relay(&self) -> &Relay<T> {
        &self.relay
    }

    /// Queue (or send) the command's message. Run the returned check after the fallback delay.
    pub fn handle_command(&mut self, command: PanelCommand, page_url: Option<&str>) -> FallbackCheck {
        let message = message_for(command, page_url);
        tracing::info!(command = command.as_ref(), "panel command");
        self.relay.send_with_fallback(message)
    }

    /// Messages addressed to the background. Everything except readiness is for the panel.
    pub fn handle_message(&mut self, message: &RuntimeMessage) {
        match message {
            RuntimeMessage::PanelReady => {
                let delivered = self.relay.on_ready();
                tracing::debug!(delivered, "panel ready");
            }
            RuntimeMessage::AddNote { .. }
            | RuntimeMessage::AddUrlNote { .. }
            | RuntimeMessage::FrameReport { .. } => {}
        }
    }

    pub fn panel_closed(&mut self) {
        tracing::debug!("panel closed");
        self.relay.mark_not_ready();
    }

    pub fn run_fallback(&mut self, check: &FallbackCheck) -> FallbackOutcome {
        self.relay.run_fallback(check)
    }

    pub fn requeue(&mut self, message: RuntimeMessage) {
        self.relay.requeue(message);
    }
}

type RejectSink = Rc<dyn Fn(RuntimeMessage)>;

/// `chrome.runtime.sendMessage`. A synchronous throw is a rejected delivery;
/// a rejected promise is reported to `on_reject`.
pub struct ChromeRuntimeTransport {
    on_reject: RejectSink,
}

impl ChromeRuntimeTransport {
    pub fn new(on_reject: RejectSink) -> Self {
        Self { on_reject }
    }
}

impl Transport for ChromeRuntimeTransport {
    fn deliver(&mut self, message: &RuntimeMessage) -> Result<(), RelayError> {
        let payload = chrome::to_js(message).map_err(|e| RelayError::Rejected(format!("{e:?}")))?;
        let pending = chrome::call(&["chrome", "runtime", "sendMessage"], &[payload])
            .map_err(|e| RelayError::Rejected(format!("{e:?}")))?;

        let sink = self.on_reject.clone();
        let message = message.clone();
        chrome::on_rejection(&pending, move |e| {
            tracing::debug!(action = message.action(), error = ?e, "sendMessage rejected");
            sink(message);
        });
        Ok(())
    }
}

type Shared = Rc<RefCell<Background<ChromeRuntimeTransport>>>;
type WeakShared = Weak<RefCell<Background<ChromeRuntimeTransport>>>;

fn with_background(
    bg: &WeakShared,
    f: impl FnOnce(&mut Background<ChromeRuntimeTransport>),
) {
    let Some(bg) = bg.upgrade() else {
        return;
    };
    let Ok(mut bg) = bg.try_borrow_mut() else {
        tracing::warn!("background busy; event dropped");
        return;
    };
    f(&mut bg);
}

fn dispatch(bg: &Shared, command: PanelCommand, page_url: Option<String>, fallback_ms: u32) {
    let check = {
        let Ok(mut b) = bg.try_borrow_mut() else {
            tracing::warn!("background busy; command dropped");
            return;
        };
        b.handle_command(command, page_url.as_deref())
    };
    let weak = Rc::downgrade(bg);
    gloo_timers::callback::Timeout::new(fallback_ms, move || {
        with_background(&weak, |b| {
            let outcome = b.run_fallback(&check);
            tracing::debug!(?outcome, "relay fallback");
        });
    })
    .forget();
}

fn string_field(value: &JsValue, key: &str) -> Option<String> {
    js_sys::Reflect::get(value, &JsValue::from_str(key))
        .ok()
        .and_then(|v| v.as_string())
}

/// Opening the panel needs the user gesture the shortcut or click carries.
fn open_panel(tab: &JsValue) {
    let Some(window_id) = js_sys::Reflect::get(tab, &"windowId".into())
        .ok()
        .filter(|v| v.as_f64().is_some())
    else {
        return;
    };
    let options = js_sys::Object::new();
    let _ = js_sys::Reflect::set(&options, &"windowId".into(), &window_id);
    match chrome::call(&["chrome", "sidePanel", "open"], &[options.into()]) {
        Ok(pending) => chrome::on_rejection(&pending, |e| {
            tracing::debug!(error = ?e, "sidePanel.open rejected");
        }),
        Err(e) => tracing::debug!(error = ?e, "sidePanel.open unavailable"),
    }
}

fn register_menus() {
    use strum::IntoEnumIterator;

    for command in PanelCommand::iter() {
        let item = js_sys::Object::new();
        let _ = js_sys::Reflect::set(&item, &"id".into(), &command.as_ref().into());
        let _ = js_sys::Reflect::set(&item, &"title".into(), &menu_title(command).into());
        let contexts: js_sys::Array = ["page", "action"].iter().map(|c| JsValue::from_str(c)).collect();
        let _ = js_sys::Reflect::set(&item, &"contexts".into(), &contexts);
        if let Err(e) = chrome::call(&["chrome", "contextMenus", "create"], &[item.into()]) {
            tracing::warn!(error = ?e, id = command.as_ref(), "could not create menu item");
        }
    }
}

/// Worker events the loader buffers while the module is still loading.
#[derive(Clone, Copy, Debug, PartialEq, Eq, strum::AsRefStr, strum::EnumIter, strum::EnumString)]
#[strum(serialize_all = "kebab-case")]
pub enum WorkerEvent {
    Installed,
    Command,
    MenuClick,
    Message,
    Connect,
}

fn command_event(bg: &Shared, fallback_ms: u32, name: &JsValue, tab: &JsValue) {
    let Some(command) = name.as_string().and_then(|n| PanelCommand::from_str(&n).ok()) else {
        tracing::debug!(?name, "unknown command");
        return;
    };
    open_panel(tab);
    dispatch(bg, command, string_field(tab, "url"), fallback_ms);
}

fn menu_event(bg: &Shared, fallback_ms: u32, info: &JsValue, tab: &JsValue) {
    let Some(command) = string_field(info, "menuItemId").and_then(|n| PanelCommand::from_str(&n).ok())
    else {
        return;
    };
    open_panel(tab);
    let page_url = string_field(info, "pageUrl").or_else(|| string_field(tab, "url"));
    dispatch(bg, command, page_url, fallback_ms);
}

fn message_event(bg: &WeakShared, raw: &JsValue) {
    let Some(message) = chrome::from_js::<RuntimeMessage>(raw) else {
        return;
    };
    with_background(bg, |b| b.handle_message(&message));
}

fn connect_event(bg: &WeakShared, port: &JsValue) {
    if string_field(port, "name").as_deref() != Some(PANEL_PORT) {
        return;
    }
    let weak = bg.clone();
    let on_disconnect = Closure::<dyn FnMut(JsValue)>::new(move |_port: JsValue| {
        with_background(&weak, Background::panel_closed);
    });
    let attached = js_sys::Reflect::get(port, &"onDisconnect".into())
        .and_then(|ev| chrome::invoke(&ev, "addListener", &[on_disconnect.as_ref().clone()]));
    match attached {
        Ok(_) => on_disconnect.forget(),
        Err(e) => tracing::debug!(error = ?e, "could not watch panel port"),
    }
}

/// Handle one `[name, args]` pair recorded by the loader before startup.
fn replay(bg: &Shared, fallback_ms: u32, entry: &JsValue) {
    let entry = js_sys::Array::from(entry);
    let Some(event) = entry
        .get(0)
        .as_string()
        .and_then(|n| WorkerEvent::from_str(&n).ok())
    else {
        tracing::debug!(?entry, "unknown buffered event");
        return;
    };
    let args = js_sys::Array::from(&entry.get(1));
    tracing::debug!(event = event.as_ref(), "replaying buffered event");
    match event {
        WorkerEvent::Installed => register_menus(),
        WorkerEvent::Command => command_event(bg, fallback_ms, &args.get(0), &args.get(1)),
        WorkerEvent::MenuClick => menu_event(bg, fallback_ms, &args.get(0), &args.get(1)),
        WorkerEvent::Message => message_event(&Rc::downgrade(bg), &args.get(0)),
        WorkerEvent::Connect => connect_event(&Rc::downgrade(bg), &args.get(0)),
    }
}

/// Entry point for the background service worker. `early_events` holds the
/// events that arrived before the module finished loading, oldest first.
#[wasm_bindgen]
pub fn start_background(early_events: js_sys::Array) {
    let config = PanelConfig::from_env();
    let fallback_ms = config.relay_fallback_ms;

    let bg: Shared = Rc::new_cyclic(|weak: &WeakShared| {
        let weak = weak.clone();
        let on_reject: RejectSink = Rc::new(move |message: RuntimeMessage| {
            with_background(&weak, |b| b.requeue(message));
        });
        RefCell::new(Background::new(ChromeRuntimeTransport::new(on_reject)))
    });

    let on_installed = Closure::<dyn FnMut(JsValue)>::new(|_details: JsValue| register_menus());
    if let Err(e) = chrome::add_listener(&["chrome", "runtime", "onInstalled"], on_installed) {
        tracing::warn!(error = ?e, "onInstalled unavailable");
    }

    let shared = bg.clone();
    let on_command = Closure::<dyn FnMut(JsValue, JsValue)>::new(move |name: JsValue, tab: JsValue| {
        command_event(&shared, fallback_ms, &name, &tab);
    });
    if let Err(e) = chrome::add_listener(&["chrome", "commands", "onCommand"], on_command) {
        tracing::warn!(error = ?e, "commands unavailable");
    }

    let shared = bg.clone();
    let on_menu = Closure::<dyn FnMut(JsValue, JsValue)>::new(move |info: JsValue, tab: JsValue| {
        menu_event(&shared, fallback_ms, &info, &tab);
    });
    if let Err(e) = chrome::add_listener(&["chrome", "contextMenus", "onClicked"], on_menu) {
        tracing::warn!(error = ?e, "contextMenus unavailable");
    }

    let weak = Rc::downgrade(&bg);
    let on_message = Closure::<dyn FnMut(JsValue, JsValue)>::new(move |raw: JsValue, _sender: JsValue| {
        message_event(&weak, &raw);
    });
    if let Err(e) = chrome::add_listener(&["chrome", "runtime", "onMessage"], on_message) {
        tracing::warn!(error = ?e, "runtime.onMessage unavailable");
    }

    let weak = Rc::downgrade(&bg);
    let on_connect = Closure::<dyn FnMut(JsValue)>::new(move |port: JsValue| {
        connect_event(&weak, &port);
    });
    if let Err(e) = chrome::add_listener(&["chrome", "runtime", "onConnect"], on_connect) {
        tracing::warn!(error = ?e, "runtime.onConnect unavailable");
    }

    // Replayed commands no longer carry a user gesture, so the panel may not open.
    for entry in early_events.iter() {
        replay(&bg, fallback_ms, &entry);
    }

    tracing::info!(replayed = early_events.length(), "background started");
}
