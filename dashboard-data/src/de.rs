//! Lenient `serde` helpers for the tabular JSON returned by the dashboard API.
//!
//! The server serialises numeric columns inconsistently (numbers, decimal strings or `null`
//! depending on the column type), so typed rows deserialize through these helpers.

use serde::{Deserialize, Deserializer, de::DeserializeOwned};
use serde_json::Value;
use tracing::debug;

/// Interpret a JSON value as a finite `f64`, accepting numbers and decimal strings.
pub fn value_as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(number) => number.as_f64(),
        Value::String(raw) => raw.trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|value| value.is_finite())
}

/// Deserialize a number or decimal string as an `f64`.
pub fn de_f64<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    value_as_f64(&value)
        .ok_or_else(|| serde::de::Error::custom(format!("expected numeric value, got {value}")))
}

/// Deserialize a nullable number or decimal string as an optional `f64`.
///
/// Empty or unparsable strings become `None` rather than an error.
pub fn de_opt_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<Value> = Option::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(value_as_f64))
}

/// Deserialize a nullable quantity, treating `null` or unparsable input as zero.
pub fn de_f64_or_zero<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    de_opt_f64(deserializer).map(|value| value.unwrap_or(0.0))
}

/// Deserialize an identifier that may be encoded either as a string or as a number.
pub fn de_string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(raw) => Ok(raw),
        Value::Number(number) => Ok(number.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number identifier, got {other}"
        ))),
    }
}

/// Deserialize a sequence of rows, skipping (and logging) any element that does not match `T`
/// instead of failing the whole response.
pub fn de_skip_invalid<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let values: Option<Vec<Value>> = Option::deserialize(deserializer)?;
    Ok(values
        .unwrap_or_default()
        .into_iter()
        .filter_map(|value| match serde_json::from_value::<T>(value) {
            Ok(row) => Some(row),
            Err(error) => {
                debug!(%error, "skipping malformed row");
                None
            }
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Deserialize)]
    struct Sample {
        #[serde(deserialize_with = "de_f64")]
        required: f64,
        #[serde(default, deserialize_with = "de_opt_f64")]
        optional: Option<f64>,
        #[serde(default, deserialize_with = "de_f64_or_zero")]
        quantity: f64,
        #[serde(deserialize_with = "de_string_or_number")]
        code: String,
    }

    #[test]
    fn test_value_as_f64() {
        struct TestCase {
            input: Value,
            expected: Option<f64>,
        }

        let tests = vec![
            TestCase {
                // TC0: JSON number
                input: json!(4.5),
                expected: Some(4.5),
            },
            TestCase {
                // TC1: decimal string with whitespace
                input: json!(" 0.20 "),
                expected: Some(0.2),
            },
            TestCase {
                // TC2: null
                input: Value::Null,
                expected: None,
            },
            TestCase {
                // TC3: unparsable string
                input: json!("n/a"),
                expected: None,
            },
            TestCase {
                // TC4: non-finite string
                input: json!("NaN"),
                expected: None,
            },
            TestCase {
                // TC5: boolean
                input: json!(true),
                expected: None,
            },
        ];

        for (index, test) in tests.into_iter().enumerate() {
            let actual = value_as_f64(&test.input);
            assert_eq!(actual, test.expected, "TC{} failed", index);
        }
    }

    #[test]
    fn test_lenient_fields() {
        let sample: Sample = serde_json::from_value(json!({
            "required": "12.5",
            "optional": null,
            "quantity": null,
            "code": 700
        }))
        .unwrap();

        assert_eq!(sample.required, 12.5);
        assert_eq!(sample.optional, None);
        assert_eq!(sample.quantity, 0.0);
        assert_eq!(sample.code, "700");
    }

    #[test]
    fn test_required_field_rejects_null() {
        let result = serde_json::from_value::<Sample>(json!({
            "required": null,
            "code": "00700"
        }));
        assert!(result.is_err());
    }

    #[test]
    fn test_skip_invalid_rows() {
        #[derive(Debug, Deserialize)]
        struct Wrapper {
            #[serde(default, deserialize_with = "de_skip_invalid")]
            rows: Vec<Sample>,
        }

        let wrapper: Wrapper = serde_json::from_value(json!({
            "rows": [
                {"required": 1.0, "code": "A"},
                {"required": "bad", "code": "B"},
                {"required": 3, "code": "C"}
            ]
        }))
        .unwrap();

        let codes: Vec<_> = wrapper.rows.iter().map(|row| row.code.as_str()).collect();
        assert_eq!(codes, vec!["A", "C"]);
    }
}
