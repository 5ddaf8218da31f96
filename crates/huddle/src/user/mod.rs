//! User accounts, credentials and lookup.

mod models;
mod repository;
mod service;

pub use models::{
    ChangePasswordRequest, LoginOutcome, LoginRequest, RegisterRequest, RemoveAccountRequest,
    User, UserInfo, UserProfile,
};
pub use repository::UserRepository;
pub use service::UserService;
