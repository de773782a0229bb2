// Helper functions for safe logging

/// Masks usernames for safe logging
/// Shows only the first character so log lines stay correlatable
/// without spelling out the full account name
///
/// # Example
/// ```
/// let masked = safe_username_log("gardener42");
/// // Returns: "g***"
/// ```
pub fn safe_username_log(username: &str) -> String {
    match username.chars().next() {
        Some(first) => format!("{}***", first),
        None => "***".to_string(),
    }
}

/// Masks tokens for safe logging
/// Shows only first and last 4 characters
///
/// # Example
/// ```
/// let masked = safe_token_log("eyJhbGciOiJIUzI1NiIsInR5cCI6IkpXVCJ9");
/// // Returns: "eyJh...kpXVCJ9"
/// ```
pub fn safe_token_log(token: &str) -> String {
    if token.len() > 8 {
        format!("{}...{}", &token[..4], &token[token.len() - 4..])
    } else {
        "***".to_string()
    }
}
