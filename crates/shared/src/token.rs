//! Opaque token generation for approval and promotion links.

/// Length of generated tokens in characters.
pub const TOKEN_LENGTH: usize = 40;

/// Generate a random URL-safe token.
///
/// Tokens are embedded in email links and authorize a single state
/// transition, so they avoid characters that break URLs or get mangled by
/// mail clients.
pub fn generate_token() -> String {
    use rand::Rng;
    let mut rng = rand::thread_rng();
    let chars: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

    (0..TOKEN_LENGTH)
        .map(|_| {
            let idx = rng.gen_range(0..chars.len());
            chars[idx] as char
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_length() {
        assert_eq!(generate_token().len(), TOKEN_LENGTH);
    }

    #[test]
    fn test_token_is_url_safe() {
        let token = generate_token();
        assert!(token.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn test_tokens_are_unique() {
        let tokens: Vec<String> = (0..100).map(|_| generate_token()).collect();
        let unique: std::collections::HashSet<_> = tokens.iter().collect();
        assert_eq!(unique.len(), 100);
    }
}
