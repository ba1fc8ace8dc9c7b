//! Prompt System - built-in templates and Handlebars rendering

mod render;
mod templates;

pub use render::PromptRenderer;
pub use templates::{SYSTEM_PROMPT, USER_TEMPLATE};
