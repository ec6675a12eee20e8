//! Lenient deserializers for parameter records.

use serde::{Deserialize, Deserializer, de::Error};

#[derive(Deserialize)]
#[serde(untagged)]
enum StringOrNumber {
    Number(u64),
    String(String),
}

/// Accept a count as `20` or `"20"`.
pub fn count<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<StringOrNumber>::deserialize(deserializer)? {
        None => Ok(None),
        Some(StringOrNumber::Number(n)) => u32::try_from(n)
            .map(Some)
            .map_err(|_| D::Error::custom(format!("count {} is too large", n))),
        Some(StringOrNumber::String(s)) => s
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| D::Error::custom(format!("count must be a number, got \"{}\"", s))),
    }
}

/// Tell an absent field (`None`) from an explicit `null` (`Some(None)`).
/// Use with `#[serde(default)]`.
pub fn nullable<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug, Deserialize)]
    struct Fields {
        #[serde(default, deserialize_with = "count")]
        count: Option<u32>,
        #[serde(default, deserialize_with = "nullable")]
        parent: Option<Option<String>>,
    }

    #[test]
    fn test_count_accepts_strings_and_numbers() {
        let fields: Fields = serde_json::from_value(json!({"count": "25"})).unwrap();
        assert_eq!(fields.count, Some(25));
        let fields: Fields = serde_json::from_value(json!({"count": 7})).unwrap();
        assert_eq!(fields.count, Some(7));
        assert!(serde_json::from_value::<Fields>(json!({"count": "lots"})).is_err());
    }

    #[test]
    fn test_nullable_distinguishes_null_from_absent() {
        let fields: Fields = serde_json::from_value(json!({})).unwrap();
        assert_eq!(fields.parent, None);
        let fields: Fields = serde_json::from_value(json!({"parent": null})).unwrap();
        assert_eq!(fields.parent, Some(None));
        let fields: Fields = serde_json::from_value(json!({"parent": "3"})).unwrap();
        assert_eq!(fields.parent, Some(Some("3".to_string())));
    }
}
