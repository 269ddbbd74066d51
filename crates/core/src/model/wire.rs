//! Field codecs for records read back from the tree database.
//!
//! Stored records are written without validation, so any field may hold a
//! value of the wrong shape. Decoders here never fail: a value that cannot be
//! read as the target type becomes the type's default.

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serializer};
use serde_json::Value;

/// Decode `T`, or `T::default()` if the stored value has another shape.
pub(crate) fn or_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).unwrap_or_default())
}

/// Keyed children of a node. Entries of the wrong shape load as defaults so
/// they are still counted; a non-object node has no entries.
pub(crate) fn entries<'de, D, T>(deserializer: D) -> Result<BTreeMap<String, T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let Value::Object(map) = Value::deserialize(deserializer)? else {
        return Ok(BTreeMap::new());
    };
    Ok(map
        .into_iter()
        .map(|(key, value)| (key, serde_json::from_value(value).unwrap_or_default()))
        .collect())
}

/// Strings pass through; numbers keep their printed form.
pub(crate) fn text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => s,
        Value::Number(n) => n.to_string(),
        _ => String::new(),
    })
}

/// Like [`text`], keeping absence distinct from an empty string.
pub(crate) fn opt_text<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<String>, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

/// Finite numbers or numeric strings; anything else reads as 0.
pub(crate) fn real<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    Ok(number(&Value::deserialize(deserializer)?).unwrap_or(0.0))
}

/// Like [`real`], truncated and clamped into `u32`.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub(crate) fn count<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u32, D::Error> {
    // Float to int casts saturate, so negatives land on 0.
    Ok(number(&Value::deserialize(deserializer)?).map_or(0, |n| n as u32))
}

fn number(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    n.is_finite().then_some(n)
}

/// Whole numbers are written without a fractional part (`100`, not `100.0`).
#[allow(clippy::trivially_copy_pass_by_ref, clippy::cast_possible_truncation)]
pub(crate) fn compact<S: Serializer>(n: &f64, serializer: S) -> Result<S::Ok, S::Error> {
    const MAX_EXACT: f64 = 9_007_199_254_740_992.0;
    if n.fract() == 0.0 && n.abs() <= MAX_EXACT {
        return serializer.serialize_i64(*n as i64);
    }
    serializer.serialize_f64(*n)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Serialize;
    use serde_json::json;

    #[derive(Debug, Default, Deserialize, Serialize)]
    #[serde(default)]
    struct Record {
        #[serde(deserialize_with = "count")]
        count: u32,
        #[serde(deserialize_with = "real", serialize_with = "compact")]
        real: f64,
        #[serde(deserialize_with = "text")]
        text: String,
        #[serde(deserialize_with = "or_default")]
        list: Vec<u8>,
        #[serde(deserialize_with = "opt_text")]
        grade: Option<String>,
    }

    fn decode(value: Value) -> Record {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn counts_accept_any_shape() {
        assert_eq!(decode(json!({ "count": 12 })).count, 12);
        assert_eq!(decode(json!({ "count": 12.9 })).count, 12);
        assert_eq!(decode(json!({ "count": -3 })).count, 0);
        assert_eq!(decode(json!({ "count": "7" })).count, 7);
        assert_eq!(decode(json!({ "count": "A1" })).count, 0);
        assert_eq!(decode(json!({ "count": true })).count, 0);
        assert_eq!(decode(json!({ "count": 1e12 })).count, u32::MAX);
    }

    #[test]
    fn reals_and_text_fall_back_to_defaults() {
        let record = decode(json!({ "real": "88.5", "text": 2024, "list": "nope" }));
        assert!((record.real - 88.5).abs() < f64::EPSILON);
        assert_eq!(record.text, "2024");
        assert!(record.list.is_empty());
        assert_eq!(record.grade, None);

        let record = decode(json!({ "real": {}, "text": null }));
        assert!(record.real.abs() < f64::EPSILON);
        assert_eq!(record.text, "");

        assert_eq!(decode(json!({ "grade": 3 })).grade.as_deref(), Some("3"));
        assert_eq!(decode(json!({ "grade": "" })).grade.as_deref(), Some(""));
    }

    #[test]
    fn whole_reals_serialize_as_integers() {
        let whole = serde_json::to_string(&Record { real: 100.0, ..Record::default() }).unwrap();
        assert!(whole.contains(r#""real":100,"#));
        let frac = serde_json::to_string(&Record { real: 95.5, ..Record::default() }).unwrap();
        assert!(frac.contains(r#""real":95.5,"#));
    }
}
