use bytes::Bytes;

use super::value::{Value, Values};
use crate::errors::CodecError;

// -----------------------------------------------------------------------------
// ----- Codec -----------------------------------------------------------------

/// Turns a session's values into the payload stored in the cache and back.
pub trait Codec: Send + Sync + 'static {
    fn encode(&self, values: &Values) -> Result<Bytes, CodecError>;

    fn decode(&self, payload: &[u8]) -> Result<Values, CodecError>;
}

// -----------------------------------------------------------------------------
// ----- JsonCodec -------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn encode(&self, values: &Values) -> Result<Bytes, CodecError> {
        // serde_json writes NaN/inf as null, which would never decode again.
        if let Some((key, _)) = values
            .iter()
            .find(|(_, v)| matches!(v, Value::Float(f) if !f.is_finite()))
        {
            return Err(CodecError::Encode(format!(
                "non-finite float under key '{key}'"
            )));
        }

        serde_json::to_vec(values)
            .map(Bytes::from)
            .map_err(|e| CodecError::Encode(e.to_string()))
    }

    fn decode(&self, payload: &[u8]) -> Result<Values, CodecError> {
        serde_json::from_slice(payload).map_err(|e| CodecError::Decode(e.to_string()))
    }
}

// -----------------------------------------------------------------------------
// ----- Tests -----------------------------------------------------------------


// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
