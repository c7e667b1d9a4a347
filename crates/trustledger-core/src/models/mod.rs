pub mod nlp;
pub mod webhook;
