//! Login credentials shared by every worker
//!
//! Credentials are obtained once, before any worker starts, and are
//! read-only afterwards. The password is wiped from memory on drop and
//! never printed.

use crate::error::ConfigError;
use dialoguer::{Input, Password};
use std::fmt;
use zeroize::Zeroizing;

/// Environment variable consulted for the password
pub const PASSWORD_ENV: &str = "NETINV_PASSWORD";

/// Username and password pair
#[derive(Clone)]
pub struct Credentials {
    username: String,
    password: Zeroizing<String>,
}

impl Credentials {
    /// Create credentials from known values
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: Zeroizing::new(password.into()),
        }
    }

    /// Obtain credentials, prompting for anything not already supplied
    ///
    /// The password is taken from [`PASSWORD_ENV`] when set, otherwise read
    /// from the terminal without echo.
    pub fn acquire(username: Option<String>) -> Result<Self, ConfigError> {
        let username = match username {
            Some(u) => u,
            None => Input::<String>::new()
                .with_prompt("Username")
                .interact_text()
                .map_err(|e| ConfigError::Credentials(e.to_string()))?,
        };

        let password = match std::env::var(PASSWORD_ENV) {
            Ok(p) if !p.is_empty() => p,
            _ => Password::new()
                .with_prompt("Password")
                .allow_empty_password(false)
                .interact()
                .map_err(|e| ConfigError::Credentials(e.to_string()))?,
        };

        Ok(Self::new(username, password))
    }

    /// Login username
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Login password
    pub fn password(&self) -> &str {
        &self.password
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_redacts_password() {
        let creds = Credentials::new("admin", "hunter2");
        let shown = format!("{:?}", creds);
        assert!(shown.contains("admin"));
        assert!(!shown.contains("hunter2"));
        assert_eq!(creds.password(), "hunter2");
    }
}
