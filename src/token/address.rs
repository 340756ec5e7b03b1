//! Address validation and canonicalization.

use super::TokenError;

/// Hex digits in a canonical EVM address (20 bytes).
pub const ADDRESS_HEX_WIDTH: usize = 40;

/// Canonicalize an address string to `0x` + exactly 40 lowercase hex digits.
///
/// Accepts mixed case, an optional `0x`/`0X` prefix, and short forms, which
/// are left-padded with zeros. Fails on non-hex characters and on inputs
/// wider than the address field. Idempotent: feeding the output back in
/// yields the same string.
pub fn normalize_address(input: &str) -> Result<String, TokenError> {
    let trimmed = input.trim();
    let digits = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);

    if digits.is_empty()
        || digits.len() > ADDRESS_HEX_WIDTH
        || !digits.bytes().all(|b| b.is_ascii_hexdigit())
    {
        return Err(TokenError::InvalidAddress(input.to_string()));
    }

    Ok(format!(
        "0x{:0>width$}",
        digits.to_ascii_lowercase(),
        width = ADDRESS_HEX_WIDTH
    ))
}

/// Whether an input looks like an address rather than a symbol.
///
/// Only checks the prefix; `normalize_address` does the real validation.
pub fn is_address_like(input: &str) -> bool {
    let trimmed = input.trim();
    trimmed.starts_with("0x") || trimmed.starts_with("0X")
}
