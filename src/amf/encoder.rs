use crate::amf::amf0::{markers, Amf0Object, Amf0Value, LONG_STRING_THRESHOLD};
use crate::{ByteBuffer, Error, Result};

pub struct Amf0Encoder {
    buffer: ByteBuffer,
}

impl Default for Amf0Encoder {
    fn default() -> Self {
        Self::new()
    }
}

impl Amf0Encoder {
    pub fn new() -> Self {
        Amf0Encoder {
            buffer: ByteBuffer::with_capacity(256),
        }
    }

    pub fn encode(&mut self, value: &Amf0Value) -> Result<()> {
        match value {
            Amf0Value::Number(n) => self.encode_number(*n),
            Amf0Value::Boolean(b) => self.encode_boolean(*b),
            Amf0Value::String(s) => self.encode_string(s),
            Amf0Value::LongString(s) => self.encode_long_string(s),
            Amf0Value::Object(obj) => self.encode_object(obj)?,
            Amf0Value::Null => self.buffer.write_u8(markers::NULL),
            Amf0Value::Undefined => self.buffer.write_u8(markers::UNDEFINED),
            Amf0Value::EcmaArray(obj) => self.encode_ecma_array(obj)?,
            Amf0Value::StrictArray(arr) => self.encode_strict_array(arr)?,
            Amf0Value::Date(millis) => self.encode_date(*millis),
        }
        Ok(())
    }

    /// Encode each value back to back, as command and data payloads are laid out
    pub fn encode_all<'v>(&mut self, values: impl IntoIterator<Item = &'v Amf0Value>) -> Result<()> {
        for value in values {
            self.encode(value)?;
        }
        Ok(())
    }

    fn encode_number(&mut self, value: f64) {
        self.buffer.write_u8(markers::NUMBER);
        self.buffer.write_f64_be(value);
    }

    fn encode_boolean(&mut self, value: bool) {
        self.buffer.write_u8(markers::BOOLEAN);
        self.buffer.write_u8(value as u8);
    }

    fn encode_string(&mut self, value: &str) {
        let bytes = value.as_bytes();
        if bytes.len() >= LONG_STRING_THRESHOLD {
            self.encode_long_string(value);
            return;
        }
        self.buffer.write_u8(markers::STRING);
        self.buffer.write_u16_be(bytes.len() as u16);
        self.buffer.write_bytes(bytes);
    }

    fn encode_long_string(&mut self, value: &str) {
        let bytes = value.as_bytes();
        self.buffer.write_u8(markers::LONG_STRING);
        self.buffer.write_u32_be(bytes.len() as u32);
        self.buffer.write_bytes(bytes);
    }

    fn encode_object(&mut self, obj: &Amf0Object) -> Result<()> {
        self.buffer.write_u8(markers::OBJECT);
        self.write_properties(obj)
    }

    fn encode_ecma_array(&mut self, obj: &Amf0Object) -> Result<()> {
        self.buffer.write_u8(markers::ECMA_ARRAY);
        self.buffer.write_u32_be(obj.len() as u32);
        self.write_properties(obj)
    }

    fn encode_strict_array(&mut self, arr: &[Amf0Value]) -> Result<()> {
        self.buffer.write_u8(markers::STRICT_ARRAY);
        self.buffer.write_u32_be(arr.len() as u32);
        for value in arr {
            self.encode(value)?;
        }
        Ok(())
    }

    fn encode_date(&mut self, millis: f64) {
        self.buffer.write_u8(markers::DATE);
        self.buffer.write_f64_be(millis);
        self.buffer.write_i16_be(0);
    }

    /// Key/value pairs followed by the 0x00 0x00 0x09 terminator.
    /// An empty key would read back as the terminator, so it is rejected.
    fn write_properties(&mut self, obj: &Amf0Object) -> Result<()> {
        for (key, value) in obj.iter() {
            if key.is_empty() {
                return Err(Error::amf_encode("empty property key"));
            }
            let bytes = key.as_bytes();
            if bytes.len() > u16::MAX as usize {
                return Err(Error::amf_encode(format!(
                    "property name of {} bytes exceeds 65535",
                    bytes.len()
                )));
            }
            self.buffer.write_u16_be(bytes.len() as u16);
            self.buffer.write_bytes(bytes);
            self.encode(value)?;
        }
        self.buffer.write_u16_be(0);
        self.buffer.write_u8(markers::OBJECT_END);
        Ok(())
    }

    pub fn get_bytes(&self) -> &[u8] {
        self.buffer.as_slice()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buffer.into_vec()
    }
}

/// Encode a single value
pub fn encode_amf0(value: &Amf0Value) -> Result<Vec<u8>> {
    let mut encoder = Amf0Encoder::new();
    encoder.encode(value)?;
    Ok(encoder.into_bytes())
}

/// Encode a sequence of values back to back
pub fn encode_amf0_values(values: &[Amf0Value]) -> Result<Vec<u8>> {
    let mut encoder = Amf0Encoder::new();
    encoder.encode_all(values)?;
    Ok(encoder.into_bytes())
}
