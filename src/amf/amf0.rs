use chrono::{DateTime, TimeZone, Utc};

/// AMF0 value tree.
///
/// The set of variants is closed: anything else on the wire is rejected by
/// the decoder rather than mapped onto a catch-all.
#[derive(Debug, Clone, PartialEq)]
pub enum Amf0Value {
    Number(f64),                 // 0x00
    Boolean(bool),               // 0x01
    String(String),              // 0x02, or 0x0C when 65536 bytes or longer
    Object(Amf0Object),          // 0x03
    Null,                        // 0x05
    Undefined,                   // 0x06
    EcmaArray(Amf0Object),       // 0x08
    StrictArray(Vec<Amf0Value>), // 0x0A
    Date(f64),                   // 0x0B, epoch milliseconds
    LongString(String),          // 0x0C
}

// AMF0 type markers
pub mod markers {
    pub const NUMBER: u8 = 0x00;
    pub const BOOLEAN: u8 = 0x01;
    pub const STRING: u8 = 0x02;
    pub const OBJECT: u8 = 0x03;
    pub const NULL: u8 = 0x05;
    pub const UNDEFINED: u8 = 0x06;
    pub const ECMA_ARRAY: u8 = 0x08;
    pub const OBJECT_END: u8 = 0x09;
    pub const STRICT_ARRAY: u8 = 0x0A;
    pub const DATE: u8 = 0x0B;
    pub const LONG_STRING: u8 = 0x0C;
}

/// Strings at or above this byte length are written with the long-string marker.
pub const LONG_STRING_THRESHOLD: usize = 65536;

/// Ordered key/value pairs shared by Object and ECMA array.
///
/// Wire order is preserved; lookups are linear, which is fine for the
/// handful of properties command objects carry.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Amf0Object {
    entries: Vec<(String, Amf0Value)>,
}

impl Amf0Object {
    pub fn new() -> Self {
        Amf0Object { entries: Vec::new() }
    }

    /// Set a property, replacing an existing value in place
    pub fn insert(&mut self, key: impl Into<String>, value: Amf0Value) {
        let key = key.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    /// Builder-style insert
    pub fn with(mut self, key: impl Into<String>, value: Amf0Value) -> Self {
        self.insert(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&Amf0Value> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn remove(&mut self, key: &str) -> Option<Amf0Value> {
        let idx = self.entries.iter().position(|(k, _)| k == key)?;
        Some(self.entries.remove(idx).1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Amf0Value)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Append without the duplicate check, used by the decoder to keep wire order
    pub(crate) fn push_raw(&mut self, key: String, value: Amf0Value) {
        self.entries.push((key, value));
    }
}

impl<K: Into<String>> FromIterator<(K, Amf0Value)> for Amf0Object {
    fn from_iter<I: IntoIterator<Item = (K, Amf0Value)>>(iter: I) -> Self {
        let mut obj = Amf0Object::new();
        for (k, v) in iter {
            obj.insert(k, v);
        }
        obj
    }
}

impl Amf0Value {
    /// String value, marker picked by length at encode time
    pub fn string(s: impl Into<String>) -> Self {
        Amf0Value::String(s.into())
    }

    /// Integers and floats all travel as doubles
    pub fn number(n: impl Into<f64>) -> Self {
        Amf0Value::Number(n.into())
    }

    pub fn date_from(dt: DateTime<Utc>) -> Self {
        Amf0Value::Date(dt.timestamp_millis() as f64)
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Amf0Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Amf0Value::String(s) | Amf0Value::LongString(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Amf0Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Properties of an Object or ECMA array
    pub fn as_object(&self) -> Option<&Amf0Object> {
        match self {
            Amf0Value::Object(obj) | Amf0Value::EcmaArray(obj) => Some(obj),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Amf0Value]> {
        match self {
            Amf0Value::StrictArray(arr) => Some(arr),
            _ => None,
        }
    }

    pub fn as_datetime(&self) -> Option<DateTime<Utc>> {
        match self {
            Amf0Value::Date(ms) if ms.is_finite() => {
                Utc.timestamp_millis_opt(*ms as i64).single()
            }
            _ => None,
        }
    }

    /// Get property from object
    pub fn get_property(&self, key: &str) -> Option<&Amf0Value> {
        self.as_object().and_then(|obj| obj.get(key))
    }

    /// Check if null or undefined
    pub fn is_null(&self) -> bool {
        matches!(self, Amf0Value::Null | Amf0Value::Undefined)
    }
}
