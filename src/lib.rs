//! Sticky notes for the browser side panel.
//!
//! One wasm module serves three extension contexts. The panel page calls
//! [`start_panel`], the background worker calls
//! [`background::start_background`] and pages embedded in a note call
//! [`content_agent::start_content_agent`].

mod app;
pub mod background;
pub mod badge;
pub mod board;
mod chrome;
mod components;
pub mod config;
pub mod content_agent;
pub mod drag;
pub mod error;
pub mod frames;
pub mod logging;
pub mod messages;
pub mod models;
pub mod ordering;
pub mod panel;
pub mod relay;
mod state;
pub mod storage;
mod util;

use crate::app::App;
use crate::config::PanelConfig;
use leptos::prelude::*;
use wasm_bindgen::prelude::wasm_bindgen;

/// Mount the panel UI. Called by the side panel page after the module loads.
#[wasm_bindgen]
pub fn start_panel() {
    mount_to_body(App);
}

// Only register the WASM start function for normal builds (not for tests),
// otherwise wasm-bindgen-test will end up with multiple entry symbols.
#[cfg_attr(all(target_arch = "wasm32", not(test)), wasm_bindgen(start))]
pub fn main() {
    console_error_panic_hook::set_once();
    logging::init(PanelConfig::from_env().log_level());
}
