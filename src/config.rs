use serde::{Deserialize, Serialize};

pub(crate) const DEFAULT_NOTES_KEY: &str = "stickyNotes";
pub(crate) const DEFAULT_FRAME_STATES_KEY: &str = "frameStates";

/// Runtime tunables for the panel, background and content agent.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct PanelConfig {
    /// Storage key holding the note collection.
    pub notes_key: String,
    /// Storage key holding per-note frame navigation state.
    pub frame_states_key: String,
    /// Quiescence window before a frame resize is measured and persisted.
    pub resize_debounce_ms: u32,
    /// Delay before the relay retries a queued message directly.
    pub relay_fallback_ms: u32,
    /// Rows whose midpoint is within this distance of the pointer are highlighted while dragging.
    pub drag_highlight_px: f64,
    /// Minimum spacing between scroll reports from an embedded page.
    pub scroll_throttle_ms: i64,
    pub badge_color: String,
    /// `tracing` level name (`error` .. `trace`).
    pub log_level: String,
}

impl Default for PanelConfig {
    fn default() -> Self {
        Self {
            notes_key: DEFAULT_NOTES_KEY.to_string(),
            frame_states_key: DEFAULT_FRAME_STATES_KEY.to_string(),
            resize_debounce_ms: 300,
            relay_fallback_ms: 500,
            drag_highlight_px: 100.0,
            scroll_throttle_ms: 250,
            badge_color: "#F59E0B".to_string(),
            log_level: "info".to_string(),
        }
    }
}

impl PanelConfig {
    /// Defaults, overridden by `window.ENV` when present.
    ///
    /// We accept both `window.ENV.LOG_LEVEL` and `window.ENV.log_level` spellings,
    /// same as the extension's other pages do.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();

        let Some(env) = web_sys::window()
            .and_then(|w| w.get("ENV"))
            .filter(|env| !env.is_undefined() && env.is_object())
        else {
            return cfg;
        };

        let lookup = |key: &str| -> Option<wasm_bindgen::JsValue> {
            [key.to_ascii_uppercase(), key.to_string()]
                .iter()
                .filter_map(|k| js_sys::Reflect::get(&env, &k.as_str().into()).ok())
                .find(|v| !v.is_undefined() && !v.is_null())
        };

        let mut overrides = serde_json::Map::new();
        for key in [
            "notes_key",
            "frame_states_key",
            "badge_color",
            "log_level",
        ] {
            if let Some(s) = lookup(key).and_then(|v| v.as_string()) {
                overrides.insert(key.to_string(), serde_json::Value::String(s));
            }
        }
        for key in [
            "resize_debounce_ms",
            "relay_fallback_ms",
            "drag_highlight_px",
            "scroll_throttle_ms",
        ] {
            if let Some(n) = lookup(key).and_then(|v| v.as_f64()) {
                // JS numbers are all f64; integral ones must reach serde as integers.
                let value = if n.fract() == 0.0 {
                    serde_json::json!(n as i64)
                } else {
                    serde_json::json!(n)
                };
                overrides.insert(key.to_string(), value);
            }
        }

        cfg.apply_overrides(serde_json::Value::Object(overrides));
        cfg
    }

    /// Merge a JSON object of overrides; unknown or ill-typed keys are ignored.
    pub fn apply_overrides(&mut self, overrides: serde_json::Value) {
        let serde_json::Value::Object(overrides) = overrides else {
            return;
        };
        let Ok(serde_json::Value::Object(mut merged)) = serde_json::to_value(&*self) else {
            return;
        };

        for (key, value) in overrides {
            let Some(slot) = merged.get_mut(&key) else {
                tracing::debug!(%key, "ignoring unknown config override");
                continue;
            };
            let previous = std::mem::replace(slot, value);
            if serde_json::from_value::<PanelConfig>(serde_json::Value::Object(merged.clone()))
                .is_err()
            {
                tracing::warn!(%key, "ignoring ill-typed config override");
                if let Some(slot) = merged.get_mut(&key) {
                    *slot = previous;
                }
            }
        }

        if let Ok(cfg) = serde_json::from_value(serde_json::Value::Object(merged)) {
            *self = cfg;
        }
    }

    pub fn log_level(&self) -> tracing::Level {
        self.log_level
            .trim()
            .parse()
            .unwrap_or(tracing::Level::INFO)
    }
}
