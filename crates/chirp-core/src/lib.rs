//! Chirp Core Types and Workflows
//!
//! This crate provides the fundamental pieces shared by every Chirp crate:
//! - Domain types (users, tweets, session keys)
//! - Store traits for users, tweets and sessions
//! - Field validation and password policy
//! - The account and tweet workflows
//! - Core error types

pub mod accounts;
pub mod context;
pub mod error;
pub mod memory;
pub mod password;
pub mod store;
pub mod tweets;
pub mod types;
pub mod validation;

pub use accounts::{AccountWorkflow, LoginForm, Profile, SessionStarted, SignupForm};
pub use context::{Destination, RequestContext};
pub use error::{Error, Result};
pub use store::{DeleteOutcome, SessionStore, TweetStore, UserStore};
pub use tweets::{TweetForm, TweetWorkflow};
pub use types::{NewUser, SessionKey, Tweet, TweetId, User, UserId};
pub use validation::ValidationErrors;
