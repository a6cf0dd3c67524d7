use crate::amf::{Amf0Decoder, Amf0Encoder, Amf0Object, Amf0Value};
use crate::protocol::RtmpMessage;
use crate::{ByteBuffer, Error, Result};

/// Decoded AMF0 command message.
///
/// `arguments` holds everything after the transaction id in wire order, so
/// the command object (usually an Object or Null) is `arguments[0]`.
#[derive(Debug, Clone, PartialEq)]
pub struct RtmpCommand {
    pub name: String,
    pub transaction_id: f64,
    pub arguments: Vec<Amf0Value>,
}

impl RtmpCommand {
    pub fn new(name: impl Into<String>, transaction_id: f64) -> Self {
        RtmpCommand {
            name: name.into(),
            transaction_id,
            arguments: Vec::new(),
        }
    }

    pub fn with_argument(mut self, value: Amf0Value) -> Self {
        self.arguments.push(value);
        self
    }

    /// The command object, when the peer sent one
    pub fn command_object(&self) -> Option<&Amf0Value> {
        self.arguments.first()
    }

    pub fn connect(app: &str, tc_url: &str) -> Self {
        let obj = Amf0Object::new()
            .with("app", Amf0Value::string(app))
            .with("type", Amf0Value::string("nonprivate"))
            .with("flashVer", Amf0Value::string("FMLE/3.0"))
            .with("tcUrl", Amf0Value::string(tc_url));

        RtmpCommand::new("connect", 1.0).with_argument(Amf0Value::Object(obj))
    }

    pub fn create_stream(transaction_id: f64) -> Self {
        RtmpCommand::new("createStream", transaction_id).with_argument(Amf0Value::Null)
    }

    pub fn result(transaction_id: f64, properties: Amf0Value, info: Amf0Value) -> Self {
        RtmpCommand::new("_result", transaction_id)
            .with_argument(properties)
            .with_argument(info)
    }

    pub fn error(transaction_id: f64, info: Amf0Value) -> Self {
        RtmpCommand::new("_error", transaction_id)
            .with_argument(Amf0Value::Null)
            .with_argument(info)
    }

    pub fn on_status(level: &str, code: &str, description: &str) -> Self {
        let info = Amf0Object::new()
            .with("level", Amf0Value::string(level))
            .with("code", Amf0Value::string(code))
            .with("description", Amf0Value::string(description));

        RtmpCommand::new("onStatus", 0.0)
            .with_argument(Amf0Value::Null)
            .with_argument(Amf0Value::Object(info))
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut encoder = Amf0Encoder::new();
        encoder.encode(&Amf0Value::string(self.name.as_str()))?;
        encoder.encode(&Amf0Value::Number(self.transaction_id))?;
        encoder.encode_all(&self.arguments)?;
        Ok(encoder.into_bytes())
    }

    pub fn decode(data: &[u8]) -> Result<Self> {
        let mut buffer = ByteBuffer::new(data.to_vec());
        let mut decoder = Amf0Decoder::new(&mut buffer);

        let name = match decoder.decode()? {
            Amf0Value::String(s) | Amf0Value::LongString(s) => s,
            other => {
                return Err(Error::amf_decode(format!(
                    "command name must be a string, found {:?}",
                    other
                )))
            }
        };

        // Some encoders end bare notifications right after the name
        let transaction_id = if decoder.has_remaining() {
            decoder
                .decode()?
                .as_number()
                .ok_or_else(|| Error::amf_decode("transaction id must be a number"))?
        } else {
            0.0
        };

        let arguments = decoder.decode_all()?;

        Ok(RtmpCommand {
            name,
            transaction_id,
            arguments,
        })
    }

    /// Wrap into a command message on the command chunk stream
    pub fn into_message(&self, timestamp: u32, stream_id: u32) -> Result<RtmpMessage> {
        Ok(RtmpMessage::command(self.encode()?, timestamp, stream_id))
    }
}
