//! Identifiers and the decimal id counter.

use core::str::FromStr;

use num_bigint::BigUint;
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};

/// Identifier of a user (and of any subject a group or session refers to).
///
/// Ids are opaque decimal strings issued by the identity store. Callers may
/// compare them for equality but must not rely on numeric ordering.
/// The empty id marks a user that has not been persisted yet.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl core::fmt::Display for UserId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UserId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for UserId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl AsRef<str> for UserId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl FromStr for UserId {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(CoreError::invalid_id("UserId: empty"));
        }
        Ok(Self(s.to_string()))
    }
}

const STEP: u32 = 1;

/// Compute the successor of a stored decimal counter.
///
/// `None` means the counter has never been written and yields `"1"`.
/// Values are arbitrary precision, so the counter cannot overflow.
pub fn next_decimal(current: Option<&str>) -> CoreResult<String> {
    let n = match current {
        None => BigUint::default(),
        Some(s) => parse_decimal(s)?,
    };
    Ok((n + STEP).to_str_radix(10))
}

fn parse_decimal(s: &str) -> CoreResult<BigUint> {
    // BigUint's parser also accepts '+' and '_' separators; counters are plain digits.
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return Err(CoreError::invalid_counter(s));
    }
    BigUint::parse_bytes(s.as_bytes(), 10).ok_or_else(|| CoreError::invalid_counter(s))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn fresh_counter_starts_at_one() {
        assert_eq!(next_decimal(None).unwrap(), "1");
    }

    #[test]
    fn counter_grows_past_u64() {
        let max = u64::MAX.to_string();
        assert_eq!(next_decimal(Some(&max)).unwrap(), "18446744073709551616");
    }

    #[test]
    fn rejects_non_decimal_counter() {
        for bad in ["", "abc", "-1", "+4", "1_000", " 7"] {
            assert!(matches!(
                next_decimal(Some(bad)),
                Err(CoreError::InvalidCounter(_))
            ));
        }
    }

    #[test]
    fn user_id_parse_rejects_empty() {
        assert!("".parse::<UserId>().is_err());
        assert_eq!("42".parse::<UserId>().unwrap().as_str(), "42");
    }

    proptest! {
        #[test]
        fn successor_matches_native_arithmetic(n in any::<u64>()) {
            let next = next_decimal(Some(&n.to_string())).unwrap();
            prop_assert_eq!(next, (n as u128 + 1).to_string());
        }
    }
}
