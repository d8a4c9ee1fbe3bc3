use leptos::prelude::*;
use leptos_ui::variants;

variants! {
    Button {
        base: "inline-flex items-center justify-center gap-1.5 whitespace-nowrap rounded-md text-sm font-medium transition-colors disabled:pointer-events-none disabled:opacity-50 shrink-0 outline-none focus-visible:ring-2 focus-visible:ring-ring/50 hover:cursor-pointer select-none touch-manipulation",
        variants: {
            variant: {
                Default: "bg-primary text-primary-foreground shadow-xs hover:bg-primary/90",
                Outline: "border bg-background/60 shadow-xs hover:bg-accent hover:text-accent-foreground",
                Ghost: "text-foreground/70 hover:bg-black/5 hover:text-foreground",
                Destructive: "text-foreground/60 hover:bg-destructive/10 hover:text-destructive",
            },
            size: {
                Default: "h-8 px-3",
                Sm: "h-7 rounded-md px-2 text-xs",
                Icon: "size-7 text-xs",
            }
        },
        component: {
            element: button,
            support_href: true,
            support_aria_current: true
        }
    }
}
