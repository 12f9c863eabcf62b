pub mod errors;
pub mod events;
pub mod id;
pub mod notifications;

pub use errors::{ClientError, ConfigError};
pub use events::{ConversationEvent, EventBus};
pub use id::{new_id, ConversationId, MessageId};
pub use notifications::{Notice, NoticeLevel, NoticeQueue};
