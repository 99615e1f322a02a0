//! Channel address model
//!
//! A device channel is addressed as `module/leaf` (e.g. `ess0/Soc`,
//! `_sum/GridActivePower`). Every channel carries declared type and unit
//! metadata plus a value that is numeric, textual or absent.

use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Separator between the segments of a channel address
pub const ADDRESS_SEPARATOR: char = '/';

/// Value of a single channel
///
/// Decoding never fails: anything that is neither a JSON number nor a JSON
/// string (including `null`) becomes [`ChannelValue::Absent`].
#[derive(Debug, Clone, PartialEq, Default)]
pub enum ChannelValue {
    /// Not observed (null, missing or unparseable)
    #[default]
    Absent,
    /// Numeric reading
    Numeric(f64),
    /// Textual reading
    Text(String),
}

impl ChannelValue {
    /// Decode a JSON scalar, numeric first then string
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::Number(n) => n.as_f64().map(Self::Numeric).unwrap_or(Self::Absent),
            Value::String(s) => Self::Text(s.clone()),
            _ => Self::Absent,
        }
    }

    /// Numeric reading, if any
    pub fn numeric(&self) -> Option<f64> {
        match self {
            Self::Numeric(v) => Some(*v),
            _ => None,
        }
    }

    /// Textual reading, if any
    pub fn text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Whether the channel was observed at all
    pub fn is_absent(&self) -> bool {
        matches!(self, Self::Absent)
    }
}

impl<'de> Deserialize<'de> for ChannelValue {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Value::deserialize(deserializer)?;
        Ok(Self::from_json(&raw))
    }
}

/// One channel as returned by the device REST API
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ChannelRecord {
    /// Full channel address (`module/leaf`)
    pub address: String,
    /// Declared channel type (`INTEGER`, `LONG`, `STRING`, ...)
    #[serde(rename = "type")]
    pub declared_type: String,
    /// Access mode (`RO`, `RW`, `WO`)
    pub access_mode: String,
    /// Human readable description
    pub text: String,
    /// Unit label (`W`, `Wh`, `%`, ...)
    #[serde(rename = "unit")]
    pub unit_label: String,
    /// Channel value
    pub value: ChannelValue,
}

impl ChannelRecord {
    /// Empty record, used for unmatched lookups
    pub const EMPTY: ChannelRecord = ChannelRecord {
        address: String::new(),
        declared_type: String::new(),
        access_mode: String::new(),
        text: String::new(),
        unit_label: String::new(),
        value: ChannelValue::Absent,
    };

    /// Decode the body of an explicit single-channel query.
    ///
    /// The device answers with a channel object; older firmware answers with
    /// the bare scalar. Any other shape yields an absent value.
    pub fn from_explicit(address: &str, body: &Value) -> Self {
        match body {
            Value::Object(_) => match ChannelRecord::deserialize(body) {
                Ok(mut record) => {
                    if record.address.is_empty() {
                        record.address = address.to_string();
                    }
                    record
                }
                Err(_) => Self::absent(address),
            },
            scalar => Self {
                address: address.to_string(),
                value: ChannelValue::from_json(scalar),
                ..Default::default()
            },
        }
    }

    /// Record with an absent value for the given address
    pub fn absent(address: &str) -> Self {
        Self {
            address: address.to_string(),
            ..Default::default()
        }
    }

    /// Address split into its segments
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.address.split(ADDRESS_SEPARATOR)
    }
}

/// Join address segments with `/`
pub fn join_address(segments: &[&str]) -> String {
    segments.join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_value_numeric_first() {
        assert_eq!(ChannelValue::from_json(&json!(42)), ChannelValue::Numeric(42.0));
        assert_eq!(ChannelValue::from_json(&json!(-1.5)), ChannelValue::Numeric(-1.5));
    }

    #[test]
    fn test_value_text() {
        let value = ChannelValue::from_json(&json!("On-Grid"));
        assert_eq!(value.text(), Some("On-Grid"));
        assert_eq!(value.numeric(), None);
    }

    #[test]
    fn test_value_absent_shapes() {
        assert!(ChannelValue::from_json(&json!(null)).is_absent());
        assert!(ChannelValue::from_json(&json!(true)).is_absent());
        assert!(ChannelValue::from_json(&json!([1, 2])).is_absent());
        assert!(ChannelValue::from_json(&json!({"a": 1})).is_absent());
    }

    #[test]
    fn test_record_deserialize() {
        let record: ChannelRecord = serde_json::from_value(json!({
            "address": "_sum/EssSoc",
            "type": "INTEGER",
            "accessMode": "RO",
            "text": "",
            "unit": "%",
            "value": 87
        }))
        .unwrap();

        assert_eq!(record.address, "_sum/EssSoc");
        assert_eq!(record.declared_type, "INTEGER");
        assert_eq!(record.access_mode, "RO");
        assert_eq!(record.unit_label, "%");
        assert_eq!(record.value, ChannelValue::Numeric(87.0));
    }

    #[test]
    fn test_record_null_value_is_absent() {
        let record: ChannelRecord =
            serde_json::from_value(json!({"address": "meter0/Frequency", "value": null})).unwrap();
        assert!(record.value.is_absent());
        assert!(record.unit_label.is_empty());
    }

    #[test]
    fn test_from_explicit_scalar() {
        let record = ChannelRecord::from_explicit("_sum/State", &json!(0));
        assert_eq!(record.address, "_sum/State");
        assert_eq!(record.value.numeric(), Some(0.0));
    }

    #[test]
    fn test_from_explicit_object_without_address() {
        let record = ChannelRecord::from_explicit("ess0/Soc", &json!({"value": 55}));
        assert_eq!(record.address, "ess0/Soc");
        assert_eq!(record.value.numeric(), Some(55.0));
    }

    #[test]
    fn test_segments() {
        let record = ChannelRecord::absent("meter1/VoltageL2");
        let segments: Vec<&str> = record.segments().collect();
        assert_eq!(segments, vec!["meter1", "VoltageL2"]);
        assert_eq!(join_address(&["meter1", "VoltageL2"]), record.address);
    }
}
