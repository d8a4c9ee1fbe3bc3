pub mod note_card;
pub mod note_stack;
pub mod toolbar;
pub mod ui;
