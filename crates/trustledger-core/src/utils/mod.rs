pub mod entity_extractor;
pub mod error;
