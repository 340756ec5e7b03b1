//! Utility functions shared by tool and HTTP handlers.

use crate::mcp::protocol::{error_codes, Response};
use serde::de::DeserializeOwned;
use serde_json::{from_value, Value};

/// Helper function to extract a required argument from a JSON object
pub fn get_required_arg<T: DeserializeOwned>(
    args: &Value,
    key: &str,
    req_id: &Value,
) -> Result<T, Response> {
    from_value(args.get(key).cloned().unwrap_or(Value::Null)).map_err(|_| {
        Response::error(
            req_id.clone(),
            error_codes::INVALID_PARAMS,
            format!("Missing or invalid required argument: '{}'", key),
        )
    })
}

/// Render a raw-unit decimal amount as a human display string,
/// e.g. `("1500000", 6)` -> `"1.5"`.
pub fn format_units(raw: &str, decimals: u8) -> String {
    let digits = raw.trim_start_matches('0');
    let places = decimals as usize;
    if places == 0 {
        return if digits.is_empty() {
            "0".to_string()
        } else {
            digits.to_string()
        };
    }

    // Pad so at least one integer digit remains left of the point.
    let padded = format!("{:0>width$}", digits, width = places + 1);
    let split = padded.len() - places;
    let (int_part, frac_part) = padded.split_at(split);
    let frac = frac_part.trim_end_matches('0');
    if frac.is_empty() {
        int_part.to_string()
    } else {
        format!("{}.{}", int_part, frac)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_fractional_amounts() {
        assert_eq!(format_units("1500000", 6), "1.5");
        assert_eq!(format_units("1500000000000000000", 18), "1.5");
    }

    #[test]
    fn formats_whole_amounts() {
        assert_eq!(format_units("2000000", 6), "2");
        assert_eq!(format_units("42", 0), "42");
    }

    #[test]
    fn formats_sub_unit_amounts() {
        assert_eq!(format_units("1", 6), "0.000001");
        assert_eq!(format_units("0", 18), "0");
    }
}
