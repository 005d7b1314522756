pub mod chat;

pub use chat::{parse_completion, ChatClient, ChatTransport, TransportError};
