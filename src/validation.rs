//! Field-level rules for account writes.
//!
//! Format rules (lengths, username characters, email syntax) are declared on
//! [`UserPayload`] with `validator`; presence, blankness and the password
//! policy are checked here so that every field reports its own messages.

pub mod password;

use std::{collections::BTreeMap, fmt};

use model::entities::user;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::{Validate, ValidationErrors};

use password::{AccountAttributes, PasswordPolicy};

pub const USERNAME_MAX_LENGTH: usize = 150;
pub const NAME_MAX_LENGTH: usize = 150;
pub const EMAIL_MAX_LENGTH: usize = 254;

pub const REQUIRED: &str = "This field is required.";
pub const BLANK: &str = "This field may not be blank.";
pub const USERNAME_TAKEN: &str = "A user with that username already exists.";

static USERNAME_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[\w.@+-]+$").expect("username pattern is a valid regex"));

/// Writable account fields as they arrive on the wire.
///
/// Every field is optional here; which ones are required depends on the
/// [`Mode`] the payload is validated under.
#[derive(Clone, Default, Deserialize, Serialize, Validate, ToSchema)]
pub struct UserPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(
        length(max = 150, message = "Ensure this field has no more than 150 characters."),
        regex(
            path = *USERNAME_PATTERN,
            message = "Enter a valid username. This value may contain only letters, numbers, and @/./+/-/_ characters."
        )
    )]
    pub username: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(length(max = 150, message = "Ensure this field has no more than 150 characters."))]
    pub first_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(length(max = 150, message = "Ensure this field has no more than 150 characters."))]
    pub last_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(
        email(message = "Enter a valid email address."),
        length(max = 254, message = "Ensure this field has no more than 254 characters.")
    )]
    pub email: Option<String>,

    /// Write-only; never echoed back.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(format = Password)]
    pub password: Option<String>,
}

impl fmt::Debug for UserPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserPayload")
            .field("username", &self.username)
            .field("first_name", &self.first_name)
            .field("last_name", &self.last_name)
            .field("email", &self.email)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl UserPayload {
    /// Copy with surrounding whitespace stripped from the text fields.
    /// The password is kept verbatim.
    pub fn trimmed(&self) -> Self {
        let trim = |value: &Option<String>| value.as_deref().map(|v| v.trim().to_string());
        Self {
            username: trim(&self.username),
            first_name: trim(&self.first_name),
            last_name: trim(&self.last_name),
            email: trim(&self.email),
            password: self.password.clone(),
        }
    }
}

/// Which write a payload is validated for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Create,
    /// Full update (PUT).
    Replace,
    /// Partial update (PATCH).
    Partial,
}

impl Mode {
    fn requires_identity(self) -> bool {
        !matches!(self, Mode::Partial)
    }
}

/// Per-field validation messages, serialized as `{"field": ["message", ...]}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<String, Vec<String>>);

impl FieldErrors {
    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0
            .entry(field.to_string())
            .or_default()
            .push(message.into());
    }

    pub fn single(field: &str, message: impl Into<String>) -> Self {
        let mut errors = Self::default();
        errors.add(field, message);
        errors
    }

    pub fn has(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.0.get(field).map(Vec::as_slice)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Merge format errors, skipping fields that already failed a presence check.
    fn absorb(&mut self, errors: &ValidationErrors) {
        for (field, field_errors) in errors.field_errors() {
            let field = field.to_string();
            if self.has(&field) {
                continue;
            }
            for error in field_errors.iter() {
                let message = error
                    .message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| error.code.to_string());
                self.add(&field, message);
            }
        }
    }
}

/// Cleaned, validated field values ready to be persisted.
#[derive(Clone, Default)]
pub struct UserChanges {
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

impl fmt::Debug for UserChanges {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserChanges")
            .field("username", &self.username)
            .field("first_name", &self.first_name)
            .field("last_name", &self.last_name)
            .field("email", &self.email)
            .field("password_changed", &self.password.is_some())
            .finish()
    }
}

/// The full set of account rules applied to every write.
#[derive(Debug, Default)]
pub struct ValidationPolicy {
    password: PasswordPolicy,
}

impl ValidationPolicy {
    pub fn new(password: PasswordPolicy) -> Self {
        Self { password }
    }

    pub fn password(&self) -> &PasswordPolicy {
        &self.password
    }

    /// Check `payload` for the given write.
    ///
    /// `existing` is the stored record for updates; its values stand in for
    /// fields the payload leaves out when comparing the password against the
    /// account's own attributes.
    pub fn validate(
        &self,
        payload: &UserPayload,
        mode: Mode,
        existing: Option<&user::Model>,
    ) -> Result<UserChanges, FieldErrors> {
        let payload = &payload.trimmed();
        let mut errors = FieldErrors::default();
        let required = mode.requires_identity();

        check_present(&mut errors, "username", payload.username.as_deref(), required);
        check_present(&mut errors, "email", payload.email.as_deref(), required);
        check_present(&mut errors, "password", payload.password.as_deref(), required);

        if let Err(format_errors) = payload.validate() {
            errors.absorb(&format_errors);
        }

        if let Some(password) = payload.password.as_deref() {
            if !errors.has("password") {
                let attributes = AccountAttributes {
                    username: payload
                        .username
                        .as_deref()
                        .or(existing.map(|u| u.username.as_str())),
                    first_name: payload
                        .first_name
                        .as_deref()
                        .or(existing.map(|u| u.first_name.as_str())),
                    last_name: payload
                        .last_name
                        .as_deref()
                        .or(existing.map(|u| u.last_name.as_str())),
                    email: payload
                        .email
                        .as_deref()
                        .or(existing.map(|u| u.email.as_str())),
                };
                for message in self.password.validate(password, &attributes) {
                    errors.add("password", message);
                }
            }
        }

        if !errors.is_empty() {
            return Err(errors);
        }

        Ok(UserChanges {
            username: payload.username.clone(),
            first_name: payload.first_name.clone(),
            last_name: payload.last_name.clone(),
            email: payload.email.clone(),
            password: payload.password.clone(),
        })
    }
}

fn check_present(errors: &mut FieldErrors, field: &str, value: Option<&str>, required: bool) {
    match value {
        None if required => errors.add(field, REQUIRED),
        Some(value) if value.trim().is_empty() => errors.add(field, BLANK),
        _ => {}
    }
}
