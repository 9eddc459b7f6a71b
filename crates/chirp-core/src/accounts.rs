//! Account workflow: signup, login, logout and the profile page

use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, info};

use crate::context::{Destination, RequestContext};
use crate::password;
use crate::store::{SessionStore, TweetStore, UserStore};
use crate::types::{NewUser, SessionKey, Tweet, User};
use crate::validation::{
    self, EMAIL_MAX_LENGTH, NON_FIELD_ERRORS, USERNAME_MAX_LENGTH, ValidationErrors, messages,
};
use crate::{Error, Result};

/// Submitted signup form. Missing inputs deserialize as empty strings.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SignupForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password1: String,
    #[serde(default)]
    pub password2: String,
}

/// Submitted login form.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    /// Local path to return to after login
    #[serde(default)]
    pub next: Option<String>,
}

/// A successful signup or login.
#[derive(Debug, Clone)]
pub struct SessionStarted {
    pub user: User,
    pub session: SessionKey,
    pub redirect: Destination,
}

/// The current user and their own tweets.
#[derive(Debug, Clone)]
pub struct Profile {
    pub user: User,
    pub tweets: Vec<Tweet>,
}

#[derive(Clone)]
pub struct AccountWorkflow {
    users: Arc<dyn UserStore>,
    sessions: Arc<dyn SessionStore>,
    tweets: Arc<dyn TweetStore>,
}

impl AccountWorkflow {
    pub fn new(
        users: Arc<dyn UserStore>,
        sessions: Arc<dyn SessionStore>,
        tweets: Arc<dyn TweetStore>,
    ) -> Self {
        Self {
            users,
            sessions,
            tweets,
        }
    }

    /// Validate a signup form without touching the session.
    ///
    /// Returns the cleaned account data, or every field error found.
    pub async fn validate_signup(&self, form: &SignupForm) -> Result<NewUser> {
        let mut errors = ValidationErrors::new();

        let username = validation::required(&mut errors, "username", &form.username);
        let email = validation::required(&mut errors, "email", &form.email);
        let password1 = validation::required_untrimmed(&mut errors, "password1", &form.password1);
        let password2 = validation::required_untrimmed(&mut errors, "password2", &form.password2);

        let username = username.filter(|name| {
            if !validation::max_length(&mut errors, "username", name, USERNAME_MAX_LENGTH) {
                false
            } else if !validation::is_valid_username(name) {
                errors.add("username", messages::INVALID_USERNAME);
                false
            } else {
                true
            }
        });

        if let Some(name) = username
            && self.users.username_exists(name).await?
        {
            errors.add("username", messages::DUPLICATE_USERNAME);
        }

        if let Some(email) = email
            && validation::max_length(&mut errors, "email", email, EMAIL_MAX_LENGTH)
            && !validation::is_valid_email(email)
        {
            errors.add("email", messages::INVALID_EMAIL);
        }

        if let (Some(p1), Some(p2)) = (password1, password2) {
            if p1 != p2 {
                errors.add("password2", messages::PASSWORD_MISMATCH);
            } else {
                let name = username.unwrap_or(form.username.trim());
                for problem in password::strength_errors(p2, name) {
                    errors.add("password2", problem);
                }
            }
        }

        errors.into_result()?;

        Ok(NewUser {
            username: username.unwrap_or_default().to_string(),
            email: email.unwrap_or_default().to_string(),
            password: form.password1.clone(),
        })
    }

    /// Validate the form and create the account, without starting a session.
    pub async fn register(&self, form: &SignupForm) -> Result<User> {
        let new_user = self.validate_signup(form).await?;

        let user = match self.users.create_user(new_user).await {
            Ok(user) => user,
            // Lost a race with a concurrent signup for the same name
            Err(Error::DuplicateUsername(_)) => {
                return Err(Error::Validation(ValidationErrors::single(
                    "username",
                    messages::DUPLICATE_USERNAME,
                )));
            }
            Err(e) => return Err(e),
        };
        info!(user_id = %user.id, username = %user.username, "Account created");
        Ok(user)
    }

    /// Create an account and log the new user in.
    pub async fn signup(&self, ctx: &RequestContext, form: SignupForm) -> Result<SessionStarted> {
        let user = self.register(&form).await?;
        let session = self.rotate_session(ctx, &user).await?;
        Ok(SessionStarted {
            user,
            session,
            redirect: Destination::TweetList,
        })
    }

    /// Check credentials and start a session.
    pub async fn login(&self, ctx: &RequestContext, form: LoginForm) -> Result<SessionStarted> {
        let mut errors = ValidationErrors::new();
        let username = validation::required(&mut errors, "username", &form.username);
        let password = validation::required_untrimmed(&mut errors, "password", &form.password);
        let (Some(username), Some(password)) = (username, password) else {
            return Err(Error::Validation(errors));
        };

        let Some(user) = self.users.authenticate(username, password).await? else {
            debug!(username = %username, "Login rejected");
            return Err(Error::Authentication);
        };
        info!(user_id = %user.id, "User logged in");

        let session = self.rotate_session(ctx, &user).await?;
        Ok(SessionStarted {
            user,
            session,
            redirect: Destination::from_next(form.next.as_deref()),
        })
    }

    /// End the caller's session, if any.
    pub async fn logout(&self, ctx: &RequestContext) -> Result<Destination> {
        if let Some(key) = ctx.session() {
            self.sessions.end_session(key).await?;
            if let Some(user) = ctx.user() {
                info!(user_id = %user.id, "User logged out");
            }
        }
        Ok(Destination::Login)
    }

    pub async fn profile(&self, ctx: &RequestContext) -> Result<Profile> {
        let user = ctx.require_user()?.clone();
        let tweets = self.tweets.list_tweets_by_owner(user.id).await?;
        Ok(Profile { user, tweets })
    }

    // A fresh key on every login keeps one active session per browser.
    async fn rotate_session(&self, ctx: &RequestContext, user: &User) -> Result<SessionKey> {
        if let Some(old) = ctx.session() {
            self.sessions.end_session(old).await?;
        }
        self.sessions.start_session(user.id).await
    }
}

/// Message shown for rejected credentials, keyed under `__all__`.
pub fn authentication_errors() -> ValidationErrors {
    ValidationErrors::single(NON_FIELD_ERRORS, messages::INVALID_LOGIN)
}
