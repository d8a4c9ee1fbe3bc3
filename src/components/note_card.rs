use crate::components::note_stack::card_dom_id;
use crate::components::ui::{
    Button, ButtonSize, ButtonVariant, CardBody, CardToolbar, CardUrlBar, Input,
};
use crate::models::{DisplayMode, Note, NoteColor, NoteId};
use crate::state::PanelContext;
use leptos::html;
use leptos::prelude::*;
use strum::IntoEnumIterator;

/// What the card body shows. Only changes when the note switches mode, so the
/// frame wrapper survives edits to unrelated fields.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Body {
    Frame,
    UrlForm,
    Editor,
    Preview,
}

/// The address form is a card-local choice; a note still waiting for its
/// URL opens with it but stays an ordinary text note underneath.
fn body_for(note: &Note, url_form_open: bool) -> Body {
    match note.display_mode() {
        DisplayMode::Frame => Body::Frame,
        _ if url_form_open => Body::UrlForm,
        DisplayMode::Editor => Body::Editor,
        DisplayMode::Preview => Body::Preview,
    }
}

fn card_height(id: &NoteId) -> f64 {
    document()
        .get_element_by_id(&card_dom_id(id))
        .map(|el| el.get_bounding_client_rect().height())
        .unwrap_or(0.0)
}

#[component]
pub fn NoteCard(id: NoteId) -> impl IntoView {
    let state = expect_context::<PanelContext>().0;
    let notes = state.notes;
    let ranks = state.ranks;
    let preview = state.drag_preview;
    let dom_id = card_dom_id(&id);
    let id_sv = StoredValue::new(id);

    let note = Memo::new(move |_| {
        let id = id_sv.get_value();
        notes.with(|ns| ns.iter().find(|n| n.id == id).cloned())
    });
    let awaiting = note.with_untracked(|n| n.as_ref().is_some_and(Note::awaits_url));
    let url_form_open = RwSignal::new(awaiting);
    let body = Memo::new(move |_| {
        let open = url_form_open.get();
        note.with(|n| n.as_ref().map(|n| body_for(n, open)))
    });

    let style = move || {
        let id = id_sv.get_value();
        preview.with(|p| match p {
            Some(p) if p.dragged == id => {
                "position: absolute; left: 0; right: 0; visibility: hidden; pointer-events: none"
                    .to_string()
            }
            Some(p) => format!("order: {}", p.visual_order_of(&id).unwrap_or(0)),
            None => format!(
                "order: {}",
                ranks.with(|r| r.get(&id).copied().unwrap_or(0))
            ),
        })
    };
    let class = move || {
        let color = note.with(|n| n.as_ref().map(|n| n.color).unwrap_or_default());
        let highlighted =
            preview.with(|p| p.as_ref().is_some_and(|p| p.is_highlighted(&id_sv.get_value())));
        format!(
            "rounded-lg border shadow-sm transition-shadow {} {}",
            color.card_class(),
            if highlighted { "ring-2 ring-primary/40" } else { "" }
        )
    };

    let s = state.clone();
    let on_grip = move |ev: web_sys::PointerEvent| {
        ev.prevent_default();
        let id = id_sv.get_value();
        let height = card_height(&id);
        match s.run(|p| p.begin_drag(&id, height)) {
            Some(Ok(next)) => preview.set(Some(next)),
            Some(Err(e)) => tracing::debug!(note = %id, error = %e, "drag not started"),
            None => {}
        }
    };

    view! {
        <div id=dom_id class=class style=style>
            <CardToolbar>
                <button
                    class="cursor-grab touch-none select-none px-1 text-foreground/50 hover:text-foreground"
                    title="Drag to reorder"
                    on:pointerdown=on_grip
                >
                    "⠿"
                </button>
                <Palette id=id_sv note=note />
                <CardActions id=id_sv body=body url_form_open=url_form_open />
            </CardToolbar>
            {move || match body.get() {
                Some(Body::Frame) => view! { <FrameBody id=id_sv note=note /> }.into_any(),
                Some(Body::UrlForm) => {
                    view! { <UrlForm id=id_sv url_form_open=url_form_open /> }.into_any()
                }
                Some(Body::Editor) => view! { <EditorBody id=id_sv note=note /> }.into_any(),
                Some(Body::Preview) => view! { <PreviewBody id=id_sv note=note /> }.into_any(),
                None => ().into_any(),
            }}
        </div>
    }
}

#[component]
fn Palette(id: StoredValue<NoteId>, note: Memo<Option<Note>>) -> impl IntoView {
    let state = expect_context::<PanelContext>().0;
    let current = move || note.with(|n| n.as_ref().map(|n| n.color).unwrap_or_default());

    NoteColor::iter()
        .map(|color| {
            let s = state.clone();
            view! {
                <button
                    class=move || {
                        format!(
                            "size-3.5 rounded-full border {} {}",
                            color.swatch_class(),
                            if current() == color { "ring-2 ring-foreground/40" } else { "" },
                        )
                    }
                    title=format!("{color:?}")
                    on:click=move |_| {
                        s.run(|p| p.set_color(&id.get_value(), color));
                    }
                />
            }
        })
        .collect_view()
}

#[component]
fn CardActions(
    id: StoredValue<NoteId>,
    body: Memo<Option<Body>>,
    url_form_open: RwSignal<bool>,
) -> impl IntoView {
    let state = expect_context::<PanelContext>().0;
    let is_text = move || matches!(body.get(), Some(Body::Editor | Body::Preview));

    let (s_up, s_down, s_edit, s_del) = (state.clone(), state.clone(), state.clone(), state);

    view! {
        <div class="ml-auto flex items-center">
            <Button
                variant=ButtonVariant::Ghost
                size=ButtonSize::Icon
                attr:title="Move up"
                on:click=move |_| {
                    s_up.run(|p| p.move_up(&id.get_value()));
                }
            >
                "↑"
            </Button>
            <Button
                variant=ButtonVariant::Ghost
                size=ButtonSize::Icon
                attr:title="Move down"
                on:click=move |_| {
                    s_down.run(|p| p.move_down(&id.get_value()));
                }
            >
                "↓"
            </Button>
            <Show when=is_text fallback=|| ().into_view()>
                <Button
                    variant=ButtonVariant::Ghost
                    size=ButtonSize::Icon
                    attr:title="Embed a page"
                    on:click=move |_| url_form_open.set(true)
                >
                    "🔗"
                </Button>
            </Show>
            <Show when=is_text fallback=|| ().into_view()>
                {
                    let s = s_edit.clone();
                    view! {
                        <Button
                            variant=ButtonVariant::Ghost
                            size=ButtonSize::Sm
                            on:click=move |_| {
                                s.run(|p| p.toggle_edit(&id.get_value()));
                            }
                        >
                            {move || if body.get() == Some(Body::Editor) { "Done" } else { "Edit" }}
                        </Button>
                    }
                }
            </Show>
            <Button
                variant=ButtonVariant::Ghost
                size=ButtonSize::Icon
                class="hover:text-destructive"
                attr:title="Delete"
                on:click=move |_| {
                    s_del.run(|p| p.delete(&id.get_value()));
                }
            >
                "✕"
            </Button>
        </div>
    }
}

#[component]
fn FrameBody(id: StoredValue<NoteId>, note: Memo<Option<Note>>) -> impl IntoView {
    let state = expect_context::<PanelContext>().0;
    let wrapper: NodeRef<html::Div> = NodeRef::new();
    let url = Memo::new(move |_| {
        note.with(|n| n.as_ref().and_then(|n| n.frame_url().map(str::to_string)))
    });

    // Runs once the wrapper is in the DOM, and again when the URL changes.
    let s = state.clone();
    Effect::new(move |_| {
        let Some(el) = wrapper.get() else {
            return;
        };
        if url.get().is_none() {
            return;
        }
        let id = id.get_value();
        if let Some(Err(e)) = s.run(|p| p.mount_frame(&id, el.into())) {
            tracing::warn!(note = %id, error = %e, "frame not mounted");
        }
    });

    let s = state;
    view! {
        <CardUrlBar>
            <span class="min-w-0 flex-1 truncate" title=move || url.get().unwrap_or_default()>
                {move || url.get().unwrap_or_default()}
            </span>
            <Button
                variant=ButtonVariant::Ghost
                size=ButtonSize::Sm
                on:click=move |_| {
                    s.command(|p| p.set_url(&id.get_value(), ""));
                }
            >
                "Unlink"
            </Button>
        </CardUrlBar>
        <div
            node_ref=wrapper
            class="h-96 min-h-32 resize-y overflow-hidden rounded-b-lg border-t bg-white"
        />
    }
}

#[component]
fn UrlForm(id: StoredValue<NoteId>, url_form_open: RwSignal<bool>) -> impl IntoView {
    let state = expect_context::<PanelContext>().0;
    let value = RwSignal::new(String::new());

    let s = state.clone();
    let submit = Callback::new(move |_: ()| {
        let input = value.get_untracked();
        if s.command(|p| p.set_url(&id.get_value(), &input)).is_some() {
            url_form_open.set(false);
        }
    });
    // Also drops the empty URL of a note that was created waiting for one.
    let cancel = move |_| {
        url_form_open.set(false);
        state.command(|p| p.set_url(&id.get_value(), ""));
    };

    view! {
        <CardBody class="flex items-center gap-1">
            <Input bind_value=value placeholder="https://example.com" autofocus=true on_submit=submit />
            <Button size=ButtonSize::Sm on:click=move |_| submit.run(())>
                "Open"
            </Button>
            <Button
                variant=ButtonVariant::Ghost
                size=ButtonSize::Sm
                on:click=cancel
            >
                "Cancel"
            </Button>
        </CardBody>
    }
}

#[component]
fn EditorBody(id: StoredValue<NoteId>, note: Memo<Option<Note>>) -> impl IntoView {
    let state = expect_context::<PanelContext>().0;
    let content = move || note.with(|n| n.as_ref().map(|n| n.content.clone()).unwrap_or_default());

    view! {
        <CardBody>
            <textarea
                class="min-h-24 w-full resize-y rounded-md bg-transparent p-1 font-mono text-sm outline-none"
                placeholder="Write something"
                autofocus=true
                prop:value=content
                on:input=move |ev| {
                    let text = event_target_value(&ev);
                    state.run(|p| p.update_content(&id.get_value(), &text));
                }
            />
        </CardBody>
    }
}

#[component]
fn PreviewBody(id: StoredValue<NoteId>, note: Memo<Option<Note>>) -> impl IntoView {
    let state = expect_context::<PanelContext>().0;
    let content = move || note.with(|n| n.as_ref().map(|n| n.content.clone()).unwrap_or_default());

    view! {
        <CardBody
            class="cursor-text whitespace-pre-wrap break-words"
            on:dblclick=move |_| {
                state.run(|p| p.toggle_edit(&id.get_value()));
            }
        >
            {content}
        </CardBody>
    }
}
