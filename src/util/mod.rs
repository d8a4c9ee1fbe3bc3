/// Wall-clock milliseconds since the epoch (browser clock).
pub(crate) fn now_ms() -> i64 {
    js_sys::Date::now().round() as i64
}

/// Error message for display in the panel's alert area.
pub(crate) fn user_message(err: &crate::error::PanelError) -> String {
    match err {
        crate::error::PanelError::InvalidUrl(detail) => format!("Invalid URL: {detail}"),
        other => other.to_string(),
    }
}
