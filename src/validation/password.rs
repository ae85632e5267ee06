//! Password strength policy.
//!
//! A policy is an ordered list of [`PasswordValidator`]s. Every validator runs
//! and contributes its own message, so a caller sees all the reasons a
//! password was refused at once.

use std::{
    collections::{HashMap, HashSet},
    fmt, fs,
    path::{Path, PathBuf},
};

use thiserror::Error;
use tracing::{debug, info};

use crate::config::PasswordSettings;

const BUILTIN_COMMON_PASSWORDS: &str = include_str!("common_passwords.txt");

#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("failed to read common password list {path}: {source}")]
    CommonPasswords {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("max_similarity must be at least 0.1, got {0}")]
    InvalidSimilarity(f64),
}

/// Identifying fields of the account a password is being set for.
#[derive(Debug, Clone, Copy, Default)]
pub struct AccountAttributes<'a> {
    pub username: Option<&'a str>,
    pub first_name: Option<&'a str>,
    pub last_name: Option<&'a str>,
    pub email: Option<&'a str>,
}

impl<'a> AccountAttributes<'a> {
    fn named(&self) -> [(&'static str, Option<&'a str>); 4] {
        [
            ("username", self.username),
            ("first name", self.first_name),
            ("last name", self.last_name),
            ("email address", self.email),
        ]
    }
}

pub trait PasswordValidator: fmt::Debug + Send + Sync {
    /// Returns the refusal message when `password` breaks the rule.
    fn validate(&self, password: &str, account: &AccountAttributes<'_>) -> Result<(), String>;
}

#[derive(Debug, Clone, Copy)]
pub struct MinimumLength {
    pub min_length: usize,
}

impl PasswordValidator for MinimumLength {
    fn validate(&self, password: &str, _account: &AccountAttributes<'_>) -> Result<(), String> {
        if password.chars().count() < self.min_length {
            return Err(format!(
                "This password is too short. It must contain at least {} characters.",
                self.min_length
            ));
        }
        Ok(())
    }
}

/// Rejects passwords found in a denylist, compared case-insensitively.
pub struct CommonPassword {
    passwords: HashSet<String>,
}

impl CommonPassword {
    pub fn builtin() -> Self {
        Self::from_list(BUILTIN_COMMON_PASSWORDS)
    }

    pub fn from_file(path: &Path) -> Result<Self, PolicyError> {
        let text = fs::read_to_string(path).map_err(|source| PolicyError::CommonPasswords {
            path: path.to_path_buf(),
            source,
        })?;
        let validator = Self::from_list(&text);
        info!(
            "Loaded {} common passwords from {}",
            validator.passwords.len(),
            path.display()
        );
        Ok(validator)
    }

    /// One password per line; blank lines and `#` comments are ignored.
    pub fn from_list(text: &str) -> Self {
        let passwords = text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .map(str::to_lowercase)
            .collect();
        Self { passwords }
    }

    pub fn len(&self) -> usize {
        self.passwords.len()
    }
}

impl fmt::Debug for CommonPassword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommonPassword")
            .field("entries", &self.passwords.len())
            .finish()
    }
}

impl PasswordValidator for CommonPassword {
    fn validate(&self, password: &str, _account: &AccountAttributes<'_>) -> Result<(), String> {
        if self.passwords.contains(password.trim().to_lowercase().as_str()) {
            return Err("This password is too common.".to_string());
        }
        Ok(())
    }
}

/// Rejects passwords made only of ASCII digits. Other Unicode numerics
/// such as `½` or `Ⅷ` do not count as digits here.
#[derive(Debug, Clone, Copy)]
pub struct NumericPassword;

impl PasswordValidator for NumericPassword {
    fn validate(&self, password: &str, _account: &AccountAttributes<'_>) -> Result<(), String> {
        if !password.is_empty() && password.chars().all(|c| c.is_ascii_digit()) {
            return Err("This password is entirely numeric.".to_string());
        }
        Ok(())
    }
}

/// Rejects passwords that resemble the account's own identifying fields.
#[derive(Debug, Clone, Copy)]
pub struct AttributeSimilarity {
    pub max_similarity: f64,
}

impl AttributeSimilarity {
    pub fn new(max_similarity: f64) -> Result<Self, PolicyError> {
        if max_similarity < 0.1 {
            return Err(PolicyError::InvalidSimilarity(max_similarity));
        }
        Ok(Self { max_similarity })
    }

    /// A short attribute part cannot meaningfully resemble a much longer password.
    fn exceeds_length_ratio(&self, password_len: usize, part_len: usize) -> bool {
        let length_bound = self.max_similarity / 2.0 * password_len as f64;
        password_len >= 10 * part_len && (part_len as f64) < length_bound
    }
}

impl PasswordValidator for AttributeSimilarity {
    fn validate(&self, password: &str, account: &AccountAttributes<'_>) -> Result<(), String> {
        let password = password.to_lowercase();
        let password_len = password.chars().count();

        for (verbose_name, value) in account.named() {
            let Some(value) = value.filter(|v| !v.is_empty()) else {
                continue;
            };
            let value = value.to_lowercase();
            let parts = value
                .split(|c: char| !(c.is_alphanumeric() || c == '_'))
                .chain(std::iter::once(value.as_str()));

            for part in parts {
                let part_len = part.chars().count();
                if self.exceeds_length_ratio(password_len, part_len) {
                    continue;
                }
                if similarity(&password, part) >= self.max_similarity {
                    return Err(format!("The password is too similar to the {}.", verbose_name));
                }
            }
        }
        Ok(())
    }
}

/// Upper bound on how alike two strings are, ignoring character order:
/// `2 * shared / (len(a) + len(b))` where `shared` counts common characters
/// with multiplicity.
pub fn similarity(a: &str, b: &str) -> f64 {
    let total = a.chars().count() + b.chars().count();
    if total == 0 {
        return 1.0;
    }

    let mut available: HashMap<char, usize> = HashMap::new();
    for c in b.chars() {
        *available.entry(c).or_default() += 1;
    }

    let mut shared = 0usize;
    for c in a.chars() {
        if let Some(count) = available.get_mut(&c) {
            if *count > 0 {
                *count -= 1;
                shared += 1;
            }
        }
    }

    2.0 * shared as f64 / total as f64
}

#[derive(Debug)]
pub struct PasswordPolicy {
    validators: Vec<Box<dyn PasswordValidator>>,
}

impl PasswordPolicy {
    pub fn new(validators: Vec<Box<dyn PasswordValidator>>) -> Self {
        Self { validators }
    }

    pub fn from_settings(settings: &PasswordSettings) -> Result<Self, PolicyError> {
        let common = match &settings.common_passwords_path {
            Some(path) => CommonPassword::from_file(path)?,
            None => CommonPassword::builtin(),
        };
        debug!(
            "Password policy: min_length={}, max_similarity={}, common passwords={}",
            settings.min_length,
            settings.max_similarity,
            common.len()
        );

        Ok(Self::new(vec![
            Box::new(AttributeSimilarity::new(settings.max_similarity)?),
            Box::new(MinimumLength {
                min_length: settings.min_length,
            }),
            Box::new(common),
            Box::new(NumericPassword),
        ]))
    }

    /// Every refusal message, empty when the password is acceptable.
    pub fn validate(&self, password: &str, account: &AccountAttributes<'_>) -> Vec<String> {
        self.validators
            .iter()
            .filter_map(|validator| validator.validate(password, account).err())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.validators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.validators.is_empty()
    }
}

impl Default for PasswordPolicy {
    fn default() -> Self {
        Self::new(vec![
            Box::new(AttributeSimilarity { max_similarity: 0.7 }),
            Box::new(MinimumLength { min_length: 8 }),
            Box::new(CommonPassword::builtin()),
            Box::new(NumericPassword),
        ])
    }
}
