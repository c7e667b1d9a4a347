pub mod messages;
pub mod nlp_client;

pub use nlp_client::NlpClient;
