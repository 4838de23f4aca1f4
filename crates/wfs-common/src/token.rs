//! Result set token grammar.

/// Length of a result set token (a UUID without separators).
pub const TOKEN_LEN: usize = 32;

/// Check that a token is 32 lowercase hex characters.
///
/// Tokens double as blob names, so anything else is rejected before it
/// reaches storage.
pub fn is_valid_token(token: &str) -> bool {
    token.len() == TOKEN_LEN
        && token
            .bytes()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
}
