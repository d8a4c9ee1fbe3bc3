//! Runs inside each embedded page and reports its navigation state back to
//! the panel; restores the scroll position when the panel asks.
//!
//! Scroll reports are throttled by timestamp (no timer); the latest position
//! held back by the throttle goes out with the next report opportunity, and
//! always on unload.

use crate::chrome;
use crate::config::PanelConfig;
use crate::frames::web::FRAME_NAME_PREFIX;
use crate::messages::{ContentReport, FrameCommand, RuntimeMessage};
use crate::models::NoteId;
use crate::util::now_ms;
use leptos::ev;
use leptos::prelude::window_event_listener;
use std::cell::RefCell;
use std::rc::Rc;
use wasm_bindgen::closure::Closure;
use wasm_bindgen::prelude::wasm_bindgen;
use wasm_bindgen::JsCast;

/// Note id of the frame this page runs in, read from `window.name`.
pub fn note_id_from_frame_name(name: &str) -> Option<NoteId> {
    name.strip_prefix(FRAME_NAME_PREFIX)
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(NoteId::from)
}

#[derive(Clone, Debug)]
pub struct ContentAgent {
    note_id: NoteId,
    throttle_ms: i64,
    title: String,
    url: String,
    last_scroll_report: Option<i64>,
    /// Position the throttle held back.
    pending_scroll: Option<(f64, f64)>,
}

impl ContentAgent {
    pub fn new(note_id: NoteId, throttle_ms: i64) -> Self {
        Self {
            note_id,
            throttle_ms,
            title: String::new(),
            url: String::new(),
            last_scroll_report: None,
            pending_scroll: None,
        }
    }

    pub fn note_id(&self) -> &NoteId {
        &self.note_id
    }

    pub fn page_loaded(&mut self, now: i64, title: &str, url: &str, scroll: (f64, f64)) -> ContentReport {
        self.title = title.to_string();
        self.url = url.to_string();
        self.pending_scroll = None;
        self.last_scroll_report = Some(now);
        ContentReport::PageLoad {
            note_id: self.note_id.clone(),
            timestamp: now,
            title: title.to_string(),
            url: url.to_string(),
            scroll_x: scroll.0,
            scroll_y: scroll.1,
        }
    }

    pub fn title_changed(&mut self, now: i64, title: &str) -> Option<ContentReport> {
        if self.title == title {
            return None;
        }
        self.title = title.to_string();
        Some(ContentReport::TitleChange {
            note_id: self.note_id.clone(),
            timestamp: now,
            title: title.to_string(),
        })
    }

    /// In-page navigation (history API or fragment). The new page starts at the top.
    pub fn url_changed(&mut self, now: i64, url: &str, title: &str) -> Option<ContentReport> {
        if self.url == url {
            return None;
        }
        self.url = url.to_string();
        self.title = title.to_string();
        self.pending_scroll = None;
        Some(ContentReport::UrlChange {
            note_id: self.note_id.clone(),
            timestamp: now,
            url: url.to_string(),
            title: title.to_string(),
        })
    }

    pub fn scrolled(&mut self, now: i64, x: f64, y: f64) -> Option<ContentReport> {
        let due = self
            .last_scroll_report
            .map_or(true, |last| now - last >= self.throttle_ms);
        if !due {
            self.pending_scroll = Some((x, y));
            return None;
        }
        self.pending_scroll = None;
        self.last_scroll_report = Some(now);
        Some(ContentReport::ScrollChange {
            note_id: self.note_id.clone(),
            timestamp: now,
            scroll_x: x,
            scroll_y: y,
        })
    }

    /// Report a position the throttle held back, if any.
    pub fn flush_scroll(&mut self, now: i64) -> Option<ContentReport> {
        let (x, y) = self.pending_scroll.take()?;
        self.last_scroll_report = Some(now);
        Some(ContentReport::ScrollChange {
            note_id: self.note_id.clone(),
            timestamp: now,
            scroll_x: x,
            scroll_y: y,
        })
    }

    pub fn page_unloading(&mut self, now: i64, url: &str, scroll: (f64, f64)) -> ContentReport {
        self.pending_scroll = None;
        ContentReport::PageUnload {
            note_id: self.note_id.clone(),
            timestamp: now,
            url: url.to_string(),
            scroll_x: scroll.0,
            scroll_y: scroll.1,
        }
    }

    /// Scroll target for a command from the panel.
    pub fn restore(&mut self, command: &FrameCommand) -> (f64, f64) {
        match command {
            FrameCommand::RestoreState { scroll_x, scroll_y } => {
                tracing::debug!(note = %self.note_id, scroll_y, "restoring scroll");
                (*scroll_x, *scroll_y)
            }
        }
    }
}

fn send(report: ContentReport) {
    let message = RuntimeMessage::FrameReport { report };
    let payload = match chrome::to_js(&message) {
        Ok(p) => p,
        Err(e) => {
            tracing::debug!(error = ?e, "could not encode frame report");
            return;
        }
    };
    match chrome::call(&["chrome", "runtime", "sendMessage"], &[payload]) {
        Ok(pending) => chrome::on_rejection(&pending, |e| {
            tracing::debug!(error = ?e, "frame report not delivered");
        }),
        Err(e) => tracing::debug!(error = ?e, "runtime unavailable"),
    }
}

fn scroll_of(win: &web_sys::Window) -> (f64, f64) {
    (win.scroll_x().unwrap_or(0.0), win.scroll_y().unwrap_or(0.0))
}

fn href(win: &web_sys::Window) -> String {
    win.location().href().unwrap_or_default()
}

fn title(win: &web_sys::Window) -> String {
    win.document().map(|d| d.title()).unwrap_or_default()
}

/// Entry point for the content script injected into embedded pages.
/// Does nothing in pages that are not hosted by a note.
#[wasm_bindgen]
pub fn start_content_agent() {
    let Some(win) = web_sys::window() else {
        return;
    };
    let Some(note_id) = win.name().ok().as_deref().and_then(note_id_from_frame_name) else {
        return;
    };
    let config = PanelConfig::from_env();
    let agent = Rc::new(RefCell::new(ContentAgent::new(note_id, config.scroll_throttle_ms)));

    let report = agent
        .borrow_mut()
        .page_loaded(now_ms(), &title(&win), &href(&win), scroll_of(&win));
    send(report);

    let (a, w) = (agent.clone(), win.clone());
    let _ = window_event_listener(ev::scroll, move |_ev: web_sys::Event| {
        let (x, y) = scroll_of(&w);
        if let Some(r) = a.borrow_mut().scrolled(now_ms(), x, y) {
            send(r);
        }
    });

    let a = agent.clone();
    let _ = window_event_listener(
        ev::Custom::<web_sys::Event>::new("scrollend"),
        move |_ev: web_sys::Event| {
            if let Some(r) = a.borrow_mut().flush_scroll(now_ms()) {
                send(r);
            }
        },
    );

    // Title edits and history-API navigations both show up as DOM mutations.
    let (a, w) = (agent.clone(), win.clone());
    let observe = Closure::<dyn FnMut(js_sys::Array, web_sys::MutationObserver)>::new(
        move |_records: js_sys::Array, _observer: web_sys::MutationObserver| {
            let now = now_ms();
            let mut agent = a.borrow_mut();
            let reports = [
                agent.url_changed(now, &href(&w), &title(&w)),
                agent.title_changed(now, &title(&w)),
                agent.flush_scroll(now),
            ];
            drop(agent);
            reports.into_iter().flatten().for_each(send);
        },
    );
    match (
        web_sys::MutationObserver::new(observe.as_ref().unchecked_ref()),
        win.document().and_then(|d| d.document_element()),
    ) {
        (Ok(observer), Some(root)) => {
            let init = web_sys::MutationObserverInit::new();
            init.set_child_list(true);
            init.set_subtree(true);
            init.set_character_data(true);
            if let Err(e) = observer.observe_with_options(&root, &init) {
                tracing::debug!(error = ?e, "could not observe document");
            }
            observe.forget();
        }
        _ => tracing::debug!("mutation observer unavailable"),
    }

    for nav_event in ["popstate", "hashchange"] {
        let (a, w) = (agent.clone(), win.clone());
        let _ = window_event_listener(
            ev::Custom::<web_sys::Event>::new(nav_event),
            move |_ev: web_sys::Event| {
                let r = a.borrow_mut().url_changed(now_ms(), &href(&w), &title(&w));
                if let Some(r) = r {
                    send(r);
                }
            },
        );
    }

    let (a, w) = (agent.clone(), win.clone());
    let _ = window_event_listener(ev::pagehide, move |_ev: web_sys::PageTransitionEvent| {
        let r = a
            .borrow_mut()
            .page_unloading(now_ms(), &href(&w), scroll_of(&w));
        send(r);
    });

    let (a, w) = (agent, win);
    let _ = window_event_listener(ev::message, move |ev: web_sys::MessageEvent| {
        // Only the hosting panel may drive this page.
        let from_parent = match (ev.source(), w.parent().ok().flatten()) {
            (Some(source), Some(parent)) => js_sys::Object::is(&source, &parent),
            _ => false,
        };
        if !from_parent {
            return;
        }
        let Some(command) = ev
            .data()
            .as_string()
            .and_then(|raw| serde_json::from_str::<FrameCommand>(&raw).ok())
        else {
            return;
        };
        let (x, y) = a.borrow_mut().restore(&command);
        w.scroll_to_with_x_and_y(x, y);
    });

    tracing::debug!("content agent started");
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn agent() -> ContentAgent {
        ContentAgent::new(NoteId::from("n1"), 250)
    }

    #[test]
    fn test_note_id_from_frame_name() {
        assert_eq!(
            note_id_from_frame_name("sticky-note:abc"),
            Some(NoteId::from("abc"))
        );
        assert_eq!(note_id_from_frame_name("sticky-note:"), None);
        assert_eq!(note_id_from_frame_name("some-other-frame"), None);
        assert_eq!(note_id_from_frame_name(""), None);
    }

    #[test]
    fn test_scroll_reports_are_throttled() {
        let mut a = agent();
        a.page_loaded(1_000, "T", "https://x/", (0.0, 0.0));

        assert_eq!(a.scrolled(1_100, 0.0, 10.0), None);
        assert_eq!(a.scrolled(1_200, 0.0, 20.0), None);
        assert!(matches!(
            a.scrolled(1_250, 0.0, 30.0),
            Some(ContentReport::ScrollChange { scroll_y, .. }) if scroll_y == 30.0
        ));
        assert_eq!(a.flush_scroll(1_260), None);
    }

    #[test]
    fn test_held_back_scroll_is_flushed() {
        let mut a = agent();
        a.page_loaded(1_000, "T", "https://x/", (0.0, 0.0));
        a.scrolled(1_010, 0.0, 400.0);
        assert_eq!(
            a.flush_scroll(1_020),
            Some(ContentReport::ScrollChange {
                note_id: NoteId::from("n1"),
                timestamp: 1_020,
                scroll_x: 0.0,
                scroll_y: 400.0,
            })
        );
        assert_eq!(a.flush_scroll(1_030), None);
    }

    #[test]
    fn test_title_and_url_report_only_on_change() {
        let mut a = agent();
        a.page_loaded(1, "Home", "https://x/", (0.0, 0.0));
        assert_eq!(a.title_changed(2, "Home"), None);
        assert!(a.title_changed(3, "Inbox (1)").is_some());

        assert_eq!(a.url_changed(4, "https://x/", "Inbox (1)"), None);
        assert_eq!(
            a.url_changed(5, "https://x/#b", "B"),
            Some(ContentReport::UrlChange {
                note_id: NoteId::from("n1"),
                timestamp: 5,
                url: "https://x/#b".to_string(),
                title: "B".to_string(),
            })
        );
        assert_eq!(a.title_changed(6, "B"), None);
    }

    #[test]
    fn test_unload_carries_final_position() {
        let mut a = agent();
        a.page_loaded(1, "T", "https://x/", (0.0, 0.0));
        a.scrolled(2, 0.0, 50.0);
        a.scrolled(3, 0.0, 75.0);
        let r = a.page_unloading(4, "https://x/", (0.0, 75.0));
        assert!(matches!(r, ContentReport::PageUnload { scroll_y, .. } if scroll_y == 75.0));
        assert_eq!(a.flush_scroll(5), None);
    }

    #[test]
    fn test_restore_returns_target() {
        let mut a = agent();
        assert_eq!(
            a.restore(&FrameCommand::RestoreState {
                scroll_x: 5.0,
                scroll_y: 640.0
            }),
            (5.0, 640.0)
        );
    }
}
