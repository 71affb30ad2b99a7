use crate::domain::ports::OutputWriter;

use self::{json::JsonWriter, text::TextWriter};

pub mod json;
pub mod text;

/// Names accepted by [`writer_for`].
pub const FORMATS: &[&str] = &["json", "text"];

/// Register available writers - add new ones here without touching main.rs
pub fn all_writers() -> Vec<Box<dyn OutputWriter>> {
    vec![Box::new(JsonWriter), Box::new(TextWriter)]
}

pub fn writer_for(format: &str) -> Option<Box<dyn OutputWriter>> {
    all_writers().into_iter().find(|w| w.name() == format)
}
