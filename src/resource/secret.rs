//! Secret values
//!
//! A [`Secret`] holds a sensitive value (webhook HMAC key, agent pool token)
//! and renders as [`MASK`] everywhere: `Debug`, `Display` and `Serialize`.
//! The plain value is only reachable through [`Secret::expose`].

use serde::{Serialize, Serializer};
use std::fmt;

/// Placeholder rendered in place of any secret value
pub const MASK: &str = "[secret]";

#[derive(Clone, PartialEq, Eq)]
pub struct Secret<T>(T);

impl<T> Secret<T> {
    pub fn new(value: T) -> Self {
        Self(value)
    }

    /// Borrow the plain value. Callers must not log or persist it.
    pub fn expose(&self) -> &T {
        &self.0
    }

    pub fn into_inner(self) -> T {
        self.0
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Secret<U> {
        Secret(f(self.0))
    }
}

impl<T> fmt::Debug for Secret<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(MASK)
    }
}

impl<T> fmt::Display for Secret<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(MASK)
    }
}

impl<T> Serialize for Secret<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(MASK)
    }
}

impl From<String> for Secret<String> {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for Secret<String> {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secret_is_masked_in_every_rendering() {
        let secret = Secret::from("hunter2");
        assert_eq!(format!("{}", secret), MASK);
        assert_eq!(format!("{:?}", secret), MASK);
        assert_eq!(format!("{:#?}", secret), MASK);
        assert_eq!(serde_json::to_string(&secret).unwrap(), "\"[secret]\"");
        assert_eq!(secret.expose(), "hunter2");
    }

    #[test]
    fn test_secret_masked_inside_containers() {
        let wrapped = Some(Secret::from("hunter2"));
        assert!(!format!("{:?}", wrapped).contains("hunter2"));
    }
}
