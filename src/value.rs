//! Untyped numeric values as they arrive from the remote API.
//!
//! ONTAP reports counters as integers, floats or decimal strings depending on
//! the transport and the field. [`ApiValue`] captures that at the boundary so
//! the rest of the pipeline only ever sees `f64`.

use std::fmt::{self, Display, Formatter};

use compact_str::CompactString;
use serde::de::{self, Deserialize, Deserializer, MapAccess, SeqAccess, Visitor};

use crate::error::{ValueError, ValueResult};

// ----------------------------------------------------------------------------
// API Value
// ----------------------------------------------------------------------------

/// A numeric-or-string field returned by the remote API.
#[derive(Debug, Clone, PartialEq)]
pub enum ApiValue {
    /// Integer value
    Int(i64),
    /// Floating-point value
    Float(f64),
    /// Decimal integer carried as text
    Text(CompactString),
    /// Anything else; the payload names the shape that was found
    Other(CompactString),
}

impl ApiValue {
    /// Marker for a field the remote response did not carry at all.
    pub fn absent() -> Self {
        ApiValue::Other(CompactString::new_inline("absent"))
    }

    /// Normalize into an `f64`.
    ///
    /// Strings must hold a base-10 integer; anything else is malformed.
    pub fn to_f64(&self) -> ValueResult<f64> {
        match self {
            ApiValue::Float(v) => Ok(*v),
            ApiValue::Int(v) => Ok(*v as f64),
            ApiValue::Text(s) => s.parse::<i64>().map(|v| v as f64).map_err(|e| {
                ValueError::MalformedValue {
                    raw: s.to_string(),
                    message: e.to_string(),
                }
            }),
            ApiValue::Other(found) => Err(ValueError::UnsupportedValueType {
                found: found.to_string(),
            }),
        }
    }

    /// Normalize a 0-100 percentage into a 0-1 ratio.
    pub fn to_ratio(&self) -> ValueResult<f64> {
        self.to_f64().map(percent_to_ratio)
    }
}

/// Convert a percentage (0-100) into a fraction (0-1).
#[inline]
pub fn percent_to_ratio(percent: f64) -> f64 {
    percent / 100.0
}

impl Display for ApiValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            ApiValue::Int(v) => write!(f, "{}", v),
            ApiValue::Float(v) => write!(f, "{}", v),
            ApiValue::Text(s) => write!(f, "\"{}\"", s),
            ApiValue::Other(found) => write!(f, "<{}>", found),
        }
    }
}

impl Default for ApiValue {
    fn default() -> Self {
        ApiValue::absent()
    }
}

impl From<i64> for ApiValue {
    fn from(v: i64) -> Self {
        ApiValue::Int(v)
    }
}

impl From<f64> for ApiValue {
    fn from(v: f64) -> Self {
        ApiValue::Float(v)
    }
}

impl From<&str> for ApiValue {
    fn from(s: &str) -> Self {
        ApiValue::Text(CompactString::from(s))
    }
}

impl From<String> for ApiValue {
    fn from(s: String) -> Self {
        ApiValue::Text(CompactString::from(s))
    }
}

impl From<Option<String>> for ApiValue {
    fn from(s: Option<String>) -> Self {
        s.map(ApiValue::from).unwrap_or_else(ApiValue::absent)
    }
}

// ----------------------------------------------------------------------------
// Deserialization
// ----------------------------------------------------------------------------

struct ApiValueVisitor;

impl<'de> Visitor<'de> for ApiValueVisitor {
    type Value = ApiValue;

    fn expecting(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str("a number or a string")
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> Result<ApiValue, E> {
        Ok(ApiValue::Other(CompactString::from(format!("bool({})", v))))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<ApiValue, E> {
        Ok(ApiValue::Int(v))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<ApiValue, E> {
        Ok(match i64::try_from(v) {
            Ok(v) => ApiValue::Int(v),
            Err(_) => ApiValue::Float(v as f64),
        })
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<ApiValue, E> {
        Ok(ApiValue::Float(v))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<ApiValue, E> {
        Ok(ApiValue::from(v))
    }

    fn visit_unit<E: de::Error>(self) -> Result<ApiValue, E> {
        Ok(ApiValue::Other(CompactString::new_inline("null")))
    }

    fn visit_none<E: de::Error>(self) -> Result<ApiValue, E> {
        self.visit_unit()
    }

    fn visit_some<D: Deserializer<'de>>(self, deserializer: D) -> Result<ApiValue, D::Error> {
        deserializer.deserialize_any(ApiValueVisitor)
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<ApiValue, A::Error> {
        while seq.next_element::<de::IgnoredAny>()?.is_some() {}
        Ok(ApiValue::Other(CompactString::new_inline("sequence")))
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<ApiValue, A::Error> {
        while map.next_entry::<de::IgnoredAny, de::IgnoredAny>()?.is_some() {}
        Ok(ApiValue::Other(CompactString::new_inline("map")))
    }
}

impl<'de> Deserialize<'de> for ApiValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(ApiValueVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;
    use rstest::rstest;

    #[rstest]
    #[case::float(ApiValue::Float(12.5), 12.5)]
    #[case::int(ApiValue::Int(4096), 4096.0)]
    #[case::negative_int(ApiValue::Int(-1), -1.0)]
    #[case::text(ApiValue::from("1000"), 1000.0)]
    #[case::signed_text(ApiValue::from("-20"), -20.0)]
    #[case::zero_text(ApiValue::from("0"), 0.0)]
    fn test_normalizes_numeric_values(#[case] value: ApiValue, #[case] expected: f64) {
        assert_eq!(value.to_f64(), Ok(expected));
    }

    #[rstest]
    #[case::unlimited("-")]
    #[case::decimal("12.5")]
    #[case::empty("")]
    #[case::padded(" 10")]
    #[case::word("unlimited")]
    fn test_rejects_malformed_strings(#[case] raw: &str) {
        let err = ApiValue::from(raw).to_f64().unwrap_err();
        assert!(matches!(err, ValueError::MalformedValue { .. }), "{:?}", err);
    }

    #[test]
    fn test_rejects_other_shapes() {
        for value in [ApiValue::absent(), ApiValue::Other("map".into())] {
            assert!(matches!(
                value.to_f64(),
                Err(ValueError::UnsupportedValueType { .. })
            ));
        }
    }

    #[test]
    fn test_ratio_conversion() {
        assert_eq!(ApiValue::from("0").to_ratio(), Ok(0.0));
        assert_eq!(ApiValue::from("100").to_ratio(), Ok(1.0));
        assert_eq!(ApiValue::from("55").to_ratio(), Ok(0.55));
        assert!(ApiValue::from("n/a").to_ratio().is_err());
    }

    #[test]
    fn test_deserialize_from_json() {
        let values: Vec<ApiValue> =
            serde_json::from_str(r#"[1, 2.5, "3", null, true, {"a": 1}, [1]]"#).unwrap();

        assert_eq!(values[0], ApiValue::Int(1));
        assert_eq!(values[1], ApiValue::Float(2.5));
        assert_eq!(values[2], ApiValue::from("3"));
        assert_eq!(values[3], ApiValue::Other("null".into()));
        assert_eq!(values[4], ApiValue::Other("bool(true)".into()));
        assert_eq!(values[5], ApiValue::Other("map".into()));
        assert_eq!(values[6], ApiValue::Other("sequence".into()));

        let normalized: Vec<bool> = values.iter().map(|v| v.to_f64().is_ok()).collect();
        assert_eq!(normalized, vec![true, true, true, false, false, false, false]);
    }

    #[test]
    fn test_huge_unsigned_becomes_float() {
        let value: ApiValue = serde_json::from_str("18446744073709551615").unwrap();
        assert!(matches!(value, ApiValue::Float(_)));
    }

    proptest! {
        #[test]
        fn prop_integer_strings_normalize_exactly(n in -(1i64 << 53)..(1i64 << 53)) {
            prop_assert_eq!(ApiValue::from(n.to_string()).to_f64(), Ok(n as f64));
            prop_assert_eq!(ApiValue::Int(n).to_f64(), Ok(n as f64));
        }

        #[test]
        fn prop_floats_pass_through(x in proptest::num::f64::NORMAL) {
            prop_assert_eq!(ApiValue::Float(x).to_f64(), Ok(x));
        }

        #[test]
        fn prop_ratio_is_percent_over_hundred(p in 0i64..=100) {
            prop_assert_eq!(ApiValue::Int(p).to_ratio(), Ok(p as f64 / 100.0));
        }

        #[test]
        fn prop_non_numeric_strings_fail(s in "[a-zA-Z_ ]{1,12}") {
            prop_assert!(ApiValue::from(s).to_f64().is_err());
        }
    }
}
