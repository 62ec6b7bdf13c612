/// KuryeLink messaging core
///
/// Direct messaging between businesses and couriers: masked counterpart
/// identities, the conversation list, chat sessions with read tracking,
/// per-participant soft delete and live change notifications.

pub mod aggregator;
pub mod backend;
pub mod chat_session;
pub mod cli_app;
pub mod config;
pub mod conversation_store;
pub mod conversations;
pub mod error;
pub mod inbox;
pub mod local_backend;
pub mod masking;
pub mod message_store;
pub mod messenger_types;
pub mod models;
pub mod profile_store;
pub mod realtime;
pub mod soft_delete;
pub mod timeline;

pub use backend::{ChatBackend, HistoryQuery};
pub use chat_session::{ChatSession, SendOutcome};
pub use config::Config;
pub use error::{ChatError, Result};
pub use inbox::Inbox;
pub use local_backend::LocalBackend;
pub use messenger_types::{ChangeEvent, ConversationSummary, CounterpartIdentity};
pub use models::{BusinessProfile, Conversation, CourierProfile, Message, Role, UserSession};
