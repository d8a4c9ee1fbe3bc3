use crate::components::note_card::NoteCard;
use crate::drag::RowBox;
use crate::models::NoteId;
use crate::state::{PanelContext, PanelState};
use leptos::prelude::*;

pub(crate) fn card_dom_id(id: &NoteId) -> String {
    format!("note-{id}")
}

/// Client-space boxes of every visible card except the one being dragged, top to bottom.
fn visible_rows(state: &PanelState, dragged: &NoteId) -> Vec<RowBox> {
    let doc = document();
    let mut rows: Vec<RowBox> = state.mount_order.with_untracked(|ids| {
        ids.iter()
            .filter(|id| *id != dragged)
            .filter_map(|id| {
                let rect = doc
                    .get_element_by_id(&card_dom_id(id))?
                    .get_bounding_client_rect();
                Some(RowBox {
                    id: id.clone(),
                    top: rect.top(),
                    height: rect.height(),
                })
            })
            .collect()
    });
    rows.sort_by(|a, b| a.top.total_cmp(&b.top));
    rows
}

/// The note list. Cards stay in mount order in the DOM; what the user sees is
/// driven by CSS `order`, so a drop never moves a card (or its frame).
#[component]
pub fn NoteStack() -> impl IntoView {
    let state = expect_context::<PanelContext>().0;
    let preview = state.drag_preview;

    let s = state.clone();
    let on_pointermove = move |ev: web_sys::PointerEvent| {
        let Some(dragged) = preview.with_untracked(|p| p.as_ref().map(|p| p.dragged.clone())) else {
            return;
        };
        ev.prevent_default();
        let rows = visible_rows(&s, &dragged);
        if let Some(next) = s.run(|p| p.drag_moved(ev.client_y() as f64, &rows)).flatten() {
            preview.set(Some(next));
        }
        s.settle_preview();
    };

    let s = state.clone();
    let on_pointerup = move |_ev: web_sys::PointerEvent| {
        if preview.with_untracked(Option::is_none) {
            return;
        }
        s.run(|p| p.drop_drag());
        preview.set(None);
    };

    let s = state.clone();
    let cancel = move || {
        if preview.with_untracked(Option::is_none) {
            return;
        }
        s.run(|p| p.cancel_drag());
        preview.set(None);
    };
    let cancel_on_leave = cancel.clone();

    let mount_order = state.mount_order;
    let notes = state.notes;

    view! {
        <div
            class="relative flex flex-col gap-2"
            class:select-none=move || preview.with(Option::is_some)
            on:pointermove=on_pointermove
            on:pointerup=on_pointerup
            on:pointerleave=move |_ev: web_sys::PointerEvent| cancel_on_leave()
            on:pointercancel=move |_ev: web_sys::PointerEvent| cancel()
        >
            <For
                each=move || mount_order.get()
                key=|id| id.clone()
                children=move |id| view! { <NoteCard id=id /> }
            />
            {move || {
                preview.get().map(|p| {
                    let style = format!(
                        "order: {}; height: {}px",
                        p.placeholder_order(),
                        p.placeholder_height
                    );
                    view! {
                        <div
                            class="rounded-lg border-2 border-dashed border-primary/40 bg-primary/5"
                            style=style
                        />
                    }
                })
            }}
            <Show when=move || notes.with(|ns| ns.is_empty()) fallback=|| ().into_view()>
                <p class="py-8 text-center text-sm text-muted-foreground">
                    "No notes yet. Add one above."
                </p>
            </Show>
        </div>
    }
}
