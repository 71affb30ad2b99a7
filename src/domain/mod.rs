pub mod diff_entry;
pub mod errors;
pub mod path;
pub mod ports;
pub mod snapshot;
pub mod value_objects;
