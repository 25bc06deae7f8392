//! Model output extraction
//!
//! Turns raw, possibly malformed model text into a JSON object.

mod json_repair;

pub use json_repair::{JsonRepairer, extract_json_from_response, extract_json_with_repair_status};
