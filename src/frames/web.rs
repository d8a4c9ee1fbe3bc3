//! Browser implementation of [`FrameHost`]: sandboxed `<iframe>`s, a
//! `ResizeObserver` per wrapper and gloo timeouts for the debounce.

use super::FrameHost;
use crate::error::FrameError;
use crate::messages::FrameCommand;
use crate::models::NoteId;
use gloo_timers::callback::Timeout;
use std::rc::Rc;
use wasm_bindgen::closure::Closure;
use wasm_bindgen::JsCast;

/// The content agent reads the note id back from `window.name`.
pub const FRAME_NAME_PREFIX: &str = "sticky-note:";

const FRAME_SANDBOX: &str = "allow-scripts allow-same-origin allow-forms allow-popups";

/// Callbacks raised by frame observers and timers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FrameSignal {
    Resized(NoteId),
    Settled(NoteId),
}

pub type FrameSignalSink = Rc<dyn Fn(FrameSignal)>;

/// Keeps the JS callback alive for as long as the observer is connected.
pub struct WebObserver {
    observer: web_sys::ResizeObserver,
    _callback: Closure<dyn FnMut(js_sys::Array, web_sys::ResizeObserver)>,
}

pub struct WebFrameHost {
    sink: FrameSignalSink,
}

impl WebFrameHost {
    pub fn new(sink: FrameSignalSink) -> Self {
        Self { sink }
    }
}

fn js_err(e: wasm_bindgen::JsValue) -> String {
    e.as_string().unwrap_or_else(|| format!("{e:?}"))
}

impl FrameHost for WebFrameHost {
    type Container = web_sys::HtmlElement;
    type Frame = web_sys::HtmlIFrameElement;
    type Observer = WebObserver;
    /// Dropping the handle clears the timeout.
    type Timer = Timeout;

    fn create_frame(
        &mut self,
        note_id: &NoteId,
        url: &str,
        container: &web_sys::HtmlElement,
        initial_height: Option<u32>,
    ) -> Result<web_sys::HtmlIFrameElement, FrameError> {
        let document = web_sys::window()
            .and_then(|w| w.document())
            .ok_or_else(|| FrameError::Create("no document".to_string()))?;

        let frame = document
            .create_element("iframe")
            .map_err(|e| FrameError::Create(js_err(e)))?
            .dyn_into::<web_sys::HtmlIFrameElement>()
            .map_err(|_| FrameError::Create("not an iframe".to_string()))?;

        frame.set_name(&format!("{FRAME_NAME_PREFIX}{note_id}"));
        frame
            .set_attribute("sandbox", FRAME_SANDBOX)
            .map_err(|e| FrameError::Create(js_err(e)))?;
        let _ = frame.set_attribute("referrerpolicy", "no-referrer");
        let style = frame.style();
        let _ = style.set_property("width", "100%");
        let _ = style.set_property("height", "100%");
        let _ = style.set_property("border", "0");

        if let Some(h) = initial_height {
            let _ = container.style().set_property("height", &format!("{h}px"));
        }

        frame.set_src(url);
        container
            .append_child(&frame)
            .map_err(|e| FrameError::Create(js_err(e)))?;
        Ok(frame)
    }

    fn navigate(&mut self, frame: &web_sys::HtmlIFrameElement, url: &str) -> Result<(), FrameError> {
        frame.set_src(url);
        Ok(())
    }

    fn remove_frame(&mut self, frame: web_sys::HtmlIFrameElement) {
        frame.remove();
    }

    fn observe(
        &mut self,
        note_id: &NoteId,
        container: &web_sys::HtmlElement,
    ) -> Result<WebObserver, FrameError> {
        let sink = self.sink.clone();
        let id = note_id.clone();
        let callback = Closure::<dyn FnMut(js_sys::Array, web_sys::ResizeObserver)>::new(
            move |_entries: js_sys::Array, _observer: web_sys::ResizeObserver| {
                sink(FrameSignal::Resized(id.clone()));
            },
        );
        let observer = web_sys::ResizeObserver::new(callback.as_ref().unchecked_ref())
            .map_err(|e| FrameError::Observe(js_err(e)))?;
        observer.observe(container);
        Ok(WebObserver {
            observer,
            _callback: callback,
        })
    }

    fn disconnect(&mut self, observer: WebObserver) {
        observer.observer.disconnect();
    }

    fn set_pointer_events(&mut self, frame: &web_sys::HtmlIFrameElement, enabled: bool) {
        let value = if enabled { "auto" } else { "none" };
        let _ = frame.style().set_property("pointer-events", value);
    }

    fn measure_height(&self, container: &web_sys::HtmlElement) -> Option<u32> {
        let h = container.offset_height();
        (h > 0).then_some(h as u32)
    }

    fn start_timer(&mut self, note_id: &NoteId, delay_ms: u32) -> Timeout {
        let sink = self.sink.clone();
        let id = note_id.clone();
        Timeout::new(delay_ms, move || sink(FrameSignal::Settled(id)))
    }

    fn cancel_timer(&mut self, timer: Timeout) {
        drop(timer);
    }

    fn post(
        &mut self,
        frame: &web_sys::HtmlIFrameElement,
        command: &FrameCommand,
    ) -> Result<(), FrameError> {
        let target = frame
            .content_window()
            .ok_or_else(|| FrameError::Post("frame has no window".to_string()))?;
        let json = serde_json::to_string(command).map_err(|e| FrameError::Post(e.to_string()))?;
        target
            .post_message(&json.into(), "*")
            .map_err(|e| FrameError::Post(js_err(e)))
    }
}
