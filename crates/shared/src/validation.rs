//! Email address validation and log masking.

lazy_static::lazy_static! {
    // RFC 5322, simplified.
    static ref EMAIL_REGEX: regex::Regex =
        regex::Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").unwrap();
}

/// Why an email address was rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EmailValidationError {
    #[error("Email address is empty")]
    Empty,

    #[error("Invalid email format: {0}")]
    BadFormat(String),

    #[error("Invalid email: contains consecutive dots")]
    ConsecutiveDots,

    #[error("Invalid email: starts or ends with dot")]
    LeadingOrTrailingDot,
}

/// Validate an email address before it is accepted for delivery.
pub fn validate_email(email: &str) -> Result<(), EmailValidationError> {
    let trimmed = email.trim().to_lowercase();

    if trimmed.is_empty() {
        return Err(EmailValidationError::Empty);
    }

    if trimmed.contains("..") {
        return Err(EmailValidationError::ConsecutiveDots);
    }

    let local = trimmed.split('@').next().unwrap_or("");
    if local.starts_with('.') || local.ends_with('.') {
        return Err(EmailValidationError::LeadingOrTrailingDot);
    }

    if !EMAIL_REGEX.is_match(&trimmed) {
        return Err(EmailValidationError::BadFormat(email.to_string()));
    }

    Ok(())
}

/// Mask an email address for logging: first 3 characters plus the domain.
pub fn mask_email(email: &str) -> String {
    if email.len() < 5 {
        return "***".to_string();
    }
    match email.find('@') {
        Some(at) if at >= 3 => format!("{}***{}", &email[..3], &email[at..]),
        Some(at) => format!("***{}", &email[at..]),
        None => "***".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_addresses() {
        assert!(validate_email("student@university.edu").is_ok());
        assert!(validate_email("first.last+tag@dept.university.edu").is_ok());
        assert!(validate_email("  padded@university.edu  ").is_ok());
    }

    #[test]
    fn test_empty_address() {
        assert_eq!(validate_email(""), Err(EmailValidationError::Empty));
        assert_eq!(validate_email("   "), Err(EmailValidationError::Empty));
    }

    #[test]
    fn test_bad_format() {
        assert!(matches!(
            validate_email("not-an-email"),
            Err(EmailValidationError::BadFormat(_))
        ));
        assert!(matches!(
            validate_email("missing@tld"),
            Err(EmailValidationError::BadFormat(_))
        ));
    }

    #[test]
    fn test_consecutive_dots() {
        assert_eq!(
            validate_email("a..b@university.edu"),
            Err(EmailValidationError::ConsecutiveDots)
        );
    }

    #[test]
    fn test_leading_dot() {
        assert_eq!(
            validate_email(".abc@university.edu"),
            Err(EmailValidationError::LeadingOrTrailingDot)
        );
    }

    #[test]
    fn test_mask_email() {
        assert_eq!(mask_email("supervisor@university.edu"), "sup***@university.edu");
        assert_eq!(mask_email("ab@x.io"), "***@x.io");
        assert_eq!(mask_email("x"), "***");
    }
}
