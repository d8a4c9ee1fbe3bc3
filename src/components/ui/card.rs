use leptos::prelude::*;
use leptos_ui::clx;

mod components {
    use super::*;
    clx! {CardToolbar, div, "flex items-center gap-0.5 px-1.5 pt-1.5"}
    clx! {CardBody, div, "px-3 pb-3 pt-1 text-sm"}
    clx! {CardUrlBar, div, "flex items-center gap-1 px-3 pb-1 text-xs text-foreground/60"}
}

pub use components::*;
