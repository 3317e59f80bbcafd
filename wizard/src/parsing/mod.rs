//! Reading recipes out of model replies.
//!
//! Models are asked for either labeled sections or JSON, and follow the request
//! only loosely, so both readers here are lenient about layout.
mod json;
mod recipe;
pub mod sections;

pub use json::{extract_json, extract_json_as, find_json_block, ExtractError};
pub use sections::{extract_section, SectionExtractor, DEFAULT_LABELS};
