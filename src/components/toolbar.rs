use crate::components::ui::{Button, ButtonSize, ButtonVariant};
use crate::state::PanelContext;
use leptos::prelude::*;

#[component]
pub fn Toolbar() -> impl IntoView {
    let state = expect_context::<PanelContext>().0;
    let count = {
        let notes = state.notes;
        move || notes.with(|ns| ns.len())
    };

    let s1 = state.clone();
    let s2 = state;

    view! {
        <div class="flex items-center gap-2">
            <Button size=ButtonSize::Sm on:click=move |_| {
                s1.run(|p| p.add_note(None));
            }>
                "+ Note"
            </Button>
            <Button
                size=ButtonSize::Sm
                variant=ButtonVariant::Outline
                on:click=move |_| {
                    s2.command(|p| p.add_url_note(None));
                }
            >
                "+ Web page"
            </Button>
            <span class="ml-auto text-xs text-muted-foreground">
                {move || match count() {
                    0 => String::new(),
                    1 => "1 note".to_string(),
                    n => format!("{n} notes"),
                }}
            </span>
        </div>
    }
}
