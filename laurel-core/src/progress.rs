//! Progress value comparison
//!
//! Requirement progress values arrive as strings whose numeric type is not
//! declared anywhere. Each value is classified by the first parse that
//! consumes it completely (unsigned, then signed, then floating point) and
//! two values are compared according to their inferred types.

use tracing::{error, warn};

/// Numeric interpretation inferred for a progress value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProgressValueType {
    UnsignedInteger,
    SignedInteger,
    FloatingPoint,
    NonNumeric,
}

/// Classify a progress value by the first representation that fully parses.
pub fn classify(value: &str) -> ProgressValueType {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return ProgressValueType::NonNumeric;
    }
    if trimmed.parse::<u64>().is_ok() {
        return ProgressValueType::UnsignedInteger;
    }
    if trimmed.parse::<i64>().is_ok() {
        return ProgressValueType::SignedInteger;
    }
    match trimmed.parse::<f64>() {
        Ok(f) if f.is_finite() => ProgressValueType::FloatingPoint,
        _ => ProgressValueType::NonNumeric,
    }
}

/// Best-effort cast of a classified value to `u64`.
///
/// Negative values clamp to zero, floats truncate toward zero and saturate.
pub fn force_to_unsigned(value: &str, kind: ProgressValueType) -> u64 {
    let trimmed = value.trim();
    match kind {
        ProgressValueType::UnsignedInteger => trimmed.parse::<u64>().unwrap_or(0),
        ProgressValueType::SignedInteger => trimmed
            .parse::<i64>()
            .map(|v| u64::try_from(v).unwrap_or(0))
            .unwrap_or(0),
        // `as` saturates and maps NaN to 0
        ProgressValueType::FloatingPoint => trimmed.parse::<f64>().map(|v| v as u64).unwrap_or(0),
        ProgressValueType::NonNumeric => 0,
    }
}

/// Decide whether `new_value` supersedes `cached_value`.
///
/// Returns true iff the new value is strictly greater, with two exceptions:
/// two non-numeric values always update (the newer value is trusted), and a
/// numeric/non-numeric pair never updates. Values of different numeric types
/// are both forced to unsigned before comparing.
pub fn should_update_progress(new_value: &str, cached_value: &str) -> bool {
    let new_kind = classify(new_value);
    let cached_kind = classify(cached_value);

    match (new_kind, cached_kind) {
        (ProgressValueType::NonNumeric, ProgressValueType::NonNumeric) => {
            warn!(
                new_value = new_value,
                cached_value = cached_value,
                "Non-numeric progress values have no ordering, accepting update"
            );
            true
        }
        (ProgressValueType::NonNumeric, _) | (_, ProgressValueType::NonNumeric) => {
            error!(
                new_value = new_value,
                cached_value = cached_value,
                "Cannot compare numeric and non-numeric progress values"
            );
            false
        }
        (a, b) if a != b => {
            warn!(
                new_value = new_value,
                new_kind = ?a,
                cached_value = cached_value,
                cached_kind = ?b,
                "Progress value types differ, forcing unsigned comparison"
            );
            force_to_unsigned(new_value, a) > force_to_unsigned(cached_value, b)
        }
        (ProgressValueType::UnsignedInteger, _) => {
            parse_or(new_value, 0u64) > parse_or(cached_value, 0u64)
        }
        (ProgressValueType::SignedInteger, _) => {
            parse_or(new_value, 0i64) > parse_or(cached_value, 0i64)
        }
        (ProgressValueType::FloatingPoint, _) => {
            parse_or(new_value, 0f64) > parse_or(cached_value, 0f64)
        }
    }
}

fn parse_or<T: std::str::FromStr>(value: &str, fallback: T) -> T {
    value.trim().parse().unwrap_or(fallback)
}

/// Lenient unsigned read of a progress value.
///
/// Skips leading whitespace and an optional `+`, then consumes leading
/// decimal digits. Anything else reads as 0; overflow saturates.
pub fn parse_progress_lenient(value: &str) -> u32 {
    let rest = value.trim_start();
    let rest = rest.strip_prefix('+').unwrap_or(rest);
    let mut result: u32 = 0;
    for digit in rest.chars().map_while(|c| c.to_digit(10)) {
        result = result.saturating_mul(10).saturating_add(digit);
    }
    result
}


#[cfg(test)]
mod prop_tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn prop_unsigned_matches_integer_order(a in any::<u64>(), b in any::<u64>()) {
            prop_assert_eq!(should_update_progress(&a.to_string(), &b.to_string()), a > b);
        }

        #[test]
        fn prop_signed_matches_integer_order(a in i64::MIN..0i64, b in i64::MIN..0i64) {
            prop_assert_eq!(should_update_progress(&a.to_string(), &b.to_string()), a > b);
        }

        #[test]
        fn prop_numeric_never_supersedes_itself(a in any::<i64>()) {
            let s = a.to_string();
            prop_assert!(!should_update_progress(&s, &s));
        }

        #[test]
        fn prop_numeric_is_asymmetric(a in any::<u32>(), b in any::<u32>()) {
            let (sa, sb) = (a.to_string(), b.to_string());
            prop_assert!(!(should_update_progress(&sa, &sb) && should_update_progress(&sb, &sa)));
        }

        #[test]
        fn prop_lenient_parse_matches_u32(a in any::<u32>()) {
            prop_assert_eq!(parse_progress_lenient(&a.to_string()), a);
        }

        #[test]
        fn prop_mixed_with_text_never_updates(n in any::<u32>(), word in "[a-z]{1,8}") {
            prop_assume!(classify(&word) == ProgressValueType::NonNumeric);
            prop_assert!(!should_update_progress(&n.to_string(), &word));
            prop_assert!(!should_update_progress(&word, &n.to_string()));
        }
    }
}
