//! Groups, memberships and the private-conversation resolver.

mod models;
mod repository;
mod resolver;
mod service;

pub use models::{Group, GroupDetails, GroupKind, GroupListItem, GroupSummary};
pub use repository::GroupRepository;
pub use resolver::{MembershipResolver, PRIVATE_GROUP_NAME};
pub use service::GroupService;
