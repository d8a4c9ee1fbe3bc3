use leptos::html;
use leptos::prelude::*;
use tw_merge::tw_merge;

/// Single-line text field bound to a signal. Enter runs `on_submit`.
#[component]
pub fn Input(
    #[prop(into, optional)] class: String,
    #[prop(into, default = "text")] r#type: &'static str,
    #[prop(into, optional)] placeholder: String,
    #[prop(optional)] autofocus: bool,

    // Manual wiring rather than `bind:value`, which has changed across Leptos versions.
    #[prop(into)] bind_value: RwSignal<String>,

    #[prop(optional, into)] on_submit: Option<Callback<()>>,
    #[prop(optional)] node_ref: NodeRef<html::Input>,
) -> impl IntoView {
    let merged_class = tw_merge!(
        "placeholder:text-muted-foreground border-input flex h-8 w-full min-w-0 rounded-md border bg-background/70 px-2 py-1 text-sm shadow-xs outline-none transition-[color,box-shadow]",
        "focus-visible:border-ring focus-visible:ring-2 focus-visible:ring-ring/50",
        "aria-invalid:border-destructive aria-invalid:ring-destructive/20",
        class
    );

    let on_keydown = move |ev: web_sys::KeyboardEvent| {
        if ev.key() == "Enter" {
            ev.prevent_default();
            if let Some(cb) = on_submit {
                cb.run(());
            }
        }
    };

    view! {
        <input
            data-name="Input"
            type=r#type
            class=merged_class
            placeholder=placeholder
            autofocus=autofocus
            prop:value=move || bind_value.get()
            on:input=move |ev| bind_value.set(event_target_value(&ev))
            on:keydown=on_keydown
            node_ref=node_ref
        />
    }
}
