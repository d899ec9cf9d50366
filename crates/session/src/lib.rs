//! Session state for the EduLift API client: credentials, the cached user
//! record, and the stores that persist them.

pub mod error;
pub mod store;
pub mod types;

pub use {
    error::{Error, Result},
    store::{
        ACCESS_TOKEN_KEY, FileSessionStore, MemorySessionStore, REFRESH_TOKEN_KEY, SessionStore,
        USER_KEY,
    },
    types::{Role, Session, User, serialize_secret},
};
