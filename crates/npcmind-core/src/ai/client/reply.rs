//! Typed replies for `send`
//!
//! `String` takes the model text verbatim. `Json<T>` decodes it through the
//! lenient JSON ladder.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::ai::parsers::{decode_ladder, DecodeStep, ParseFailure};

/// A value that can be built from a terminal model response
pub trait Reply: Sized + Send {
    fn from_model_text(raw: &str) -> Result<Self, ParseFailure>;

    /// Form stored in the response cache
    fn cache_payload(&self) -> Value;
}

impl Reply for String {
    fn from_model_text(raw: &str) -> Result<Self, ParseFailure> {
        Ok(raw.to_string())
    }

    fn cache_payload(&self) -> Value {
        Value::String(self.clone())
    }
}

/// Structured reply decoded from JSON model output
#[derive(Debug, Clone, PartialEq)]
pub struct Json<T>(pub T);

impl<T> Json<T> {
    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T> std::ops::Deref for Json<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.0
    }
}

impl<T: DeserializeOwned + Serialize + Send> Reply for Json<T> {
    fn from_model_text(raw: &str) -> Result<Self, ParseFailure> {
        let (value, step) = decode_ladder::<T>(raw)?;
        if step != DecodeStep::Direct {
            tracing::info!(step = ?step, "Recovered structured reply from malformed JSON");
        }
        Ok(Json(value))
    }

    fn cache_payload(&self) -> Value {
        serde_json::to_value(&self.0).unwrap_or(Value::Null)
    }
}
