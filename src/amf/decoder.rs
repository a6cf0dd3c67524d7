use crate::amf::amf0::{markers, Amf0Object, Amf0Value};
use crate::{ByteBuffer, Error, Result};

/// Nesting limit for objects and arrays; hostile payloads could otherwise
/// recurse until the stack overflows.
pub const MAX_NESTING_DEPTH: usize = 64;

pub struct Amf0Decoder<'a> {
    buffer: &'a mut ByteBuffer,
    depth: usize,
}

impl<'a> Amf0Decoder<'a> {
    pub fn new(buffer: &'a mut ByteBuffer) -> Self {
        Amf0Decoder { buffer, depth: 0 }
    }

    /// Check if decoder has remaining data to decode
    pub fn has_remaining(&self) -> bool {
        self.buffer.remaining() > 0
    }

    pub fn decode(&mut self) -> Result<Amf0Value> {
        let marker = self.buffer.read_u8()?;

        self.depth += 1;
        if self.depth > MAX_NESTING_DEPTH {
            return Err(Error::amf_decode(format!(
                "nesting deeper than {} levels",
                MAX_NESTING_DEPTH
            )));
        }
        let value = self.decode_marker(marker);
        self.depth -= 1;
        value
    }

    /// Decode values until the buffer is exhausted
    pub fn decode_all(&mut self) -> Result<Vec<Amf0Value>> {
        let mut values = Vec::new();
        while self.has_remaining() {
            values.push(self.decode()?);
        }
        Ok(values)
    }

    fn decode_marker(&mut self, marker: u8) -> Result<Amf0Value> {
        match marker {
            markers::NUMBER => Ok(Amf0Value::Number(self.buffer.read_f64_be()?)),
            markers::BOOLEAN => Ok(Amf0Value::Boolean(self.buffer.read_u8()? != 0)),
            markers::STRING => {
                let len = self.buffer.read_u16_be()? as usize;
                Ok(Amf0Value::String(self.read_utf8(len, "string")?))
            }
            markers::OBJECT => Ok(Amf0Value::Object(self.decode_properties()?)),
            markers::NULL => Ok(Amf0Value::Null),
            markers::UNDEFINED => Ok(Amf0Value::Undefined),
            markers::ECMA_ARRAY => {
                // The count is advisory; the terminator decides where the array ends
                let _count = self.buffer.read_u32_be()?;
                Ok(Amf0Value::EcmaArray(self.decode_properties()?))
            }
            markers::STRICT_ARRAY => self.decode_strict_array(),
            markers::DATE => {
                let millis = self.buffer.read_f64_be()?;
                let _timezone = self.buffer.read_i16_be()?;
                Ok(Amf0Value::Date(millis))
            }
            markers::LONG_STRING => {
                let len = self.buffer.read_u32_be()? as usize;
                Ok(Amf0Value::LongString(self.read_utf8(len, "long string")?))
            }
            other => Err(Error::UnknownMarker(other)),
        }
    }

    fn decode_properties(&mut self) -> Result<Amf0Object> {
        let mut object = Amf0Object::new();
        loop {
            let name_len = self.buffer.read_u16_be()? as usize;
            if name_len == 0 {
                let end = self.buffer.read_u8()?;
                if end != markers::OBJECT_END {
                    return Err(Error::amf_decode(format!(
                        "expected object end marker, found 0x{:02x}",
                        end
                    )));
                }
                return Ok(object);
            }
            let name = self.read_utf8(name_len, "property name")?;
            let value = self.decode()?;
            object.push_raw(name, value);
        }
    }

    fn decode_strict_array(&mut self) -> Result<Amf0Value> {
        let count = self.buffer.read_u32_be()? as usize;
        // Every element takes at least one byte, so the count cannot
        // legitimately exceed what is left
        if count > self.buffer.remaining() {
            return Err(Error::truncated(count, self.buffer.remaining()));
        }
        let mut array = Vec::with_capacity(count);
        for _ in 0..count {
            array.push(self.decode()?);
        }
        Ok(Amf0Value::StrictArray(array))
    }

    fn read_utf8(&mut self, len: usize, what: &str) -> Result<String> {
        let bytes = self.buffer.read_bytes(len)?;
        String::from_utf8(bytes)
            .map_err(|e| Error::amf_decode(format!("Invalid UTF-8 in {}: {}", what, e)))
    }
}

/// Decode exactly one value from `data`
pub fn decode_amf0(data: &[u8]) -> Result<Amf0Value> {
    let mut buffer = ByteBuffer::new(data.to_vec());
    Amf0Decoder::new(&mut buffer).decode()
}

/// Decode every value in `data`
pub fn decode_amf0_values(data: &[u8]) -> Result<Vec<Amf0Value>> {
    let mut buffer = ByteBuffer::new(data.to_vec());
    Amf0Decoder::new(&mut buffer).decode_all()
}
