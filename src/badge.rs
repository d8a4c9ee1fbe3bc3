use crate::chrome;
use wasm_bindgen::JsValue;

/// Text and colour shown on the toolbar icon.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BadgeLabel {
    pub text: String,
    pub color: String,
}

impl BadgeLabel {
    /// Note count; hidden (empty text) when there are no notes.
    pub fn for_count(count: usize, color: &str) -> Self {
        let text = match count {
            0 => String::new(),
            1..=999 => count.to_string(),
            _ => "999+".to_string(),
        };
        Self {
            text,
            color: color.to_string(),
        }
    }
}

/// Where badge updates go.
pub trait BadgeSink {
    fn show(&mut self, label: &BadgeLabel);
}

/// `chrome.action` badge. Failures are logged and otherwise ignored.
#[derive(Clone, Copy, Debug, Default)]
pub struct ChromeBadge;

impl BadgeSink for ChromeBadge {
    fn show(&mut self, label: &BadgeLabel) {
        let text = js_sys::Object::new();
        let _ = js_sys::Reflect::set(&text, &"text".into(), &JsValue::from_str(&label.text));
        if let Err(e) = chrome::call(&["chrome", "action", "setBadgeText"], &[text.into()]) {
            tracing::warn!(error = ?e, "setBadgeText failed");
            return;
        }

        let color = js_sys::Object::new();
        let _ = js_sys::Reflect::set(&color, &"color".into(), &JsValue::from_str(&label.color));
        if let Err(e) = chrome::call(
            &["chrome", "action", "setBadgeBackgroundColor"],
            &[color.into()],
        ) {
            tracing::warn!(error = ?e, "setBadgeBackgroundColor failed");
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    #[derive(Default)]
    pub(crate) struct RecordingBadge {
        pub shown: Vec<BadgeLabel>,
    }

    impl BadgeSink for RecordingBadge {
        fn show(&mut self, label: &BadgeLabel) {
            self.shown.push(label.clone());
        }
    }
}
