// src/auth/validators.rs

use super::models::CredentialsPayload;
use crate::common::{ValidationResult, Validator};

const USERNAME_MIN_LENGTH: usize = 3;
const USERNAME_MAX_LENGTH: usize = 64;
const PASSWORD_MIN_LENGTH: usize = 8;
// bcrypt ignores input past 72 bytes; reject instead of silently truncating
const PASSWORD_MAX_LENGTH: usize = 72;

impl Validator<CredentialsPayload> for CredentialsPayload {
    fn validate(&self, data: &CredentialsPayload) -> ValidationResult {
        let mut result = ValidationResult::new();

        if data.username.len() < USERNAME_MIN_LENGTH {
            result.add_error("username", "must be at least 3 characters");
        }
        if data.username.len() > USERNAME_MAX_LENGTH {
            result.add_error("username", "must be at most 64 characters");
        }
        if !data
            .username
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'))
        {
            result.add_error(
                "username",
                "may only contain letters, digits, dots, hyphens and underscores",
            );
        }

        if data.password.len() < PASSWORD_MIN_LENGTH {
            result.add_error("password", "must be at least 8 characters");
        }
        if data.password.len() > PASSWORD_MAX_LENGTH {
            result.add_error("password", "must be at most 72 characters");
        }

        result
    }
}
