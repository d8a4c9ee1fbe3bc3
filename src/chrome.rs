//! Thin access to `chrome.*` extension APIs through `js_sys::Reflect`.
//!
//! Works from extension pages and from the background service worker (no
//! `window` required).

use wasm_bindgen::closure::Closure;
use wasm_bindgen::{JsCast, JsValue};

/// Resolve a dotted path from the global object, e.g. `["chrome", "runtime"]`.
pub(crate) fn lookup(path: &[&str]) -> Option<JsValue> {
    let mut cur: JsValue = js_sys::global().into();
    for seg in path {
        cur = js_sys::Reflect::get(&cur, &JsValue::from_str(seg)).ok()?;
        if cur.is_undefined() || cur.is_null() {
            return None;
        }
    }
    Some(cur)
}

/// Call `owner[method](...args)`.
pub(crate) fn invoke(owner: &JsValue, method: &str, args: &[JsValue]) -> Result<JsValue, JsValue> {
    let f = js_sys::Reflect::get(owner, &JsValue::from_str(method))?
        .dyn_into::<js_sys::Function>()
        .map_err(|_| JsValue::from_str(&format!("{method} is not a function")))?;
    let args: js_sys::Array = args.iter().collect();
    js_sys::Reflect::apply(&f, owner, &args)
}

/// Call a function by full path, e.g. `["chrome", "action", "setBadgeText"]`.
pub(crate) fn call(path: &[&str], args: &[JsValue]) -> Result<JsValue, JsValue> {
    let Some((method, owner_path)) = path.split_last() else {
        return Err(JsValue::from_str("empty API path"));
    };
    let owner = lookup(owner_path)
        .ok_or_else(|| JsValue::from_str(&format!("{} unavailable", owner_path.join("."))))?;
    invoke(&owner, method, args)
}

/// `chrome.<event_path>.addListener(callback)`; the callback lives for the page's lifetime.
pub(crate) fn add_listener<F>(event_path: &[&str], callback: Closure<F>) -> Result<(), JsValue>
where
    F: ?Sized + wasm_bindgen::closure::WasmClosure,
{
    let target = lookup(event_path)
        .ok_or_else(|| JsValue::from_str(&format!("{} unavailable", event_path.join("."))))?;
    invoke(&target, "addListener", &[callback.as_ref().clone()])?;
    callback.forget();
    Ok(())
}

/// Attach a rejection handler when `value` is a promise.
pub(crate) fn on_rejection(value: &JsValue, handler: impl FnOnce(JsValue) + 'static) {
    if !value.is_instance_of::<js_sys::Promise>() {
        return;
    }
    let cb = Closure::once_into_js(handler);
    if let Err(e) = invoke(value, "catch", &[cb]) {
        tracing::debug!(error = ?e, "could not attach rejection handler");
    }
}

/// Serialize through JSON so payloads cross the runtime boundary as plain objects.
pub(crate) fn to_js<T: serde::Serialize>(value: &T) -> Result<JsValue, JsValue> {
    let json = serde_json::to_string(value).map_err(|e| JsValue::from_str(&e.to_string()))?;
    js_sys::JSON::parse(&json)
}

pub(crate) fn from_js<T: serde::de::DeserializeOwned>(value: &JsValue) -> Option<T> {
    let json = js_sys::JSON::stringify(value).ok()?.as_string()?;
    serde_json::from_str(&json).ok()
}
