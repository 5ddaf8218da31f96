//! Chat messages: storage, live relay and history.

mod models;
mod relay;
mod repository;

pub use models::{
    GroupRef, Message, MessageKind, MessageRecord, NoticeOutcome, UserRef,
};
pub use relay::{MessageRelay, OLDER_PAGE_SIZE, RECENT_PAGE_SIZE};
pub use repository::MessageRepository;
