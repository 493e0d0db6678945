/// Maximum message content length (bytes).
pub const MAX_MESSAGE_LENGTH: usize = 4000;

/// Maximum company (channel) name length.
pub const MAX_COMPANY_LENGTH: usize = 64;

/// Maximum username length.
pub const MAX_USERNAME_LENGTH: usize = 32;

/// Validate a company name. Must be non-blank and at most 64 bytes.
pub fn validate_company(company: &str) -> Result<(), String> {
    if company.trim().is_empty() {
        return Err("Company cannot be empty".into());
    }
    if company.len() > MAX_COMPANY_LENGTH {
        return Err(format!(
            "Company too long (max {} characters)",
            MAX_COMPANY_LENGTH
        ));
    }
    Ok(())
}

/// Validate a username. Must be non-blank and at most 32 bytes.
/// Usernames are not authenticated; any printable text is accepted.
pub fn validate_username(username: &str) -> Result<(), String> {
    if username.trim().is_empty() {
        return Err("Username cannot be empty".into());
    }
    if username.len() > MAX_USERNAME_LENGTH {
        return Err(format!(
            "Username too long (max {} characters)",
            MAX_USERNAME_LENGTH
        ));
    }
    if username.chars().any(char::is_control) {
        return Err("Username cannot contain control characters".into());
    }
    Ok(())
}

/// Validate message content. Must be non-empty and under the length limit.
pub fn validate_message(content: &str) -> Result<(), String> {
    if content.trim().is_empty() {
        return Err("Message cannot be empty".into());
    }
    if content.len() > MAX_MESSAGE_LENGTH {
        return Err(format!(
            "Message too long (max {} characters)",
            MAX_MESSAGE_LENGTH
        ));
    }
    Ok(())
}
