use regex::Regex;

use crate::core::config::SecurityConfig;
use crate::core::errors::WalletError;

/// Validates a web-page origin: scheme://host[:port], no path, no whitespace.
/// The origin string is the authorization key, so anything that isn't a clean
/// origin is refused before it reaches the grant table.
pub fn validate_origin(origin: &str) -> Result<(), WalletError> {
    let origin_regex = Regex::new(r"^(https?|chrome-extension|moz-extension)://[^/\s?#]+$")
        .expect("Hardcoded regex should always compile");
    if !origin_regex.is_match(origin) {
        return Err(WalletError::ValidationError(format!("Invalid origin: {}", origin)));
    }
    Ok(())
}

/// Validates a password against the configured policy: minimum length plus
/// upper, lower, digit and special character classes.
pub fn validate_password(config: &SecurityConfig, password: &str) -> Result<(), WalletError> {
    if password.len() < config.min_password_length {
        return Err(WalletError::ValidationError(format!(
            "Password must be at least {} characters",
            config.min_password_length
        )));
    }
    if !password.chars().any(|c| c.is_ascii_uppercase()) {
        return Err(WalletError::ValidationError(
            "Password must contain an uppercase letter".to_string(),
        ));
    }
    if !password.chars().any(|c| c.is_ascii_lowercase()) {
        return Err(WalletError::ValidationError(
            "Password must contain a lowercase letter".to_string(),
        ));
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        return Err(WalletError::ValidationError("Password must contain a digit".to_string()));
    }
    if password.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(WalletError::ValidationError(
            "Password must contain a special character".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_origins() {
        assert!(validate_origin("https://dapp.example").is_ok());
        assert!(validate_origin("https://dapp.example:8443").is_ok());
        assert!(validate_origin("http://localhost:3000").is_ok());
        assert!(validate_origin("chrome-extension://abcdefgh").is_ok());
    }

    #[test]
    fn test_invalid_origins() {
        assert!(validate_origin("https://dapp.example/path").is_err());
        assert!(validate_origin("dapp.example").is_err());
        assert!(validate_origin("javascript://alert(1)").is_err());
        assert!(validate_origin("https://dapp.example?q=1").is_err());
        assert!(validate_origin("").is_err());
    }

    #[test]
    fn test_password_policy() {
        let config = SecurityConfig::default();
        assert!(validate_password(&config, "Str0ng!Pass").is_ok());
        assert!(validate_password(&config, "short").is_err());
        assert!(validate_password(&config, "alllowercase1!").is_err());
        assert!(validate_password(&config, "ALLUPPERCASE1!").is_err());
        assert!(validate_password(&config, "NoDigitsHere!").is_err());
        assert!(validate_password(&config, "NoSpecials123").is_err());
    }
}
