use core::fmt;

use serde::{de, Deserializer};

/// Captures a report field as raw text.
///
/// `--reportformat json` quotes every value, `json_std` emits numbers as numbers
/// and undefined values as `null`. Both end up here as the decimal text (or
/// `None` for `null`) so that the extractor sees one representation.
pub(crate) fn raw<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de> {
    struct RawVisitor;
    impl<'de> de::Visitor<'de> for RawVisitor {
        type Value = Option<String>;

        fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
            formatter.write_str("a string, number or null")
        }

        fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
            where
                E: de::Error, {
            Ok(Some(v.to_owned()))
        }

        fn visit_string<E>(self, v: String) -> Result<Self::Value, E>
            where
                E: de::Error, {
            Ok(Some(v))
        }

        fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
            where
                E: de::Error, {
            Ok(Some(v.to_string()))
        }

        fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E>
            where
                E: de::Error, {
            Ok(Some(v.to_string()))
        }

        fn visit_f64<E>(self, v: f64) -> Result<Self::Value, E>
            where
                E: de::Error, {
            Ok(Some(v.to_string()))
        }

        fn visit_unit<E>(self) -> Result<Self::Value, E>
            where
                E: de::Error, {
            Ok(None)
        }

        fn visit_none<E>(self) -> Result<Self::Value, E>
            where
                E: de::Error, {
            Ok(None)
        }

        fn visit_some<D>(self, deserializer: D) -> Result<Self::Value, D::Error>
            where
                D: Deserializer<'de>, {
            deserializer.deserialize_any(self)
        }
    }
    deserializer.deserialize_any(RawVisitor)
}
