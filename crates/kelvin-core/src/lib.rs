pub mod ai;
pub mod animator;
pub mod config;
pub mod conversation;
pub mod export;
pub mod ingest;
pub mod markdown;
pub mod presentation;
pub mod session;
pub mod state;
pub mod storage;

// Re-export main types for convenience
pub use ai::{ChatClient, ChatTransport, TransportError};
pub use animator::{Reveal, RevealEvent, RevealTimer};
pub use config::{Config, Overrides, Settings};
pub use conversation::{ConversationStore, LoadOutcome};
pub use presentation::{Pattern, PatternRotator, PresentationEffects};
pub use session::{ChatSession, OutgoingRequest, SendOutcome, Ticket};
pub use state::{ChatMessage, ChatRole, Theme};
pub use storage::{FileStore, KeyValueStore, MemoryStore};
