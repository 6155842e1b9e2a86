//! JSON encoding for request and response models.
//!
//! Models implement [`JsonModel`] for the direction(s) the service uses them
//! in. Request-only models override [`JsonModel::write`], response-only models
//! override [`JsonModel::read`]; calling the other direction fails with
//! [`ServiceError::Unsupported`].
//!
//! Field mapping itself is serde's: wire names come from `#[serde(rename)]`,
//! unknown properties are skipped, and optional fields use
//! `skip_serializing_if = "Option::is_none"` so only set fields are emitted.

use crate::error::{Direction, ServiceError, ServiceResult};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// A model exchanged with a service as a JSON document.
pub trait JsonModel: Sized {
    /// Name used in error messages.
    const MODEL_NAME: &'static str;

    /// Decode the model from a response body.
    fn read(_json: &[u8]) -> ServiceResult<Self> {
        Err(ServiceError::unsupported(Self::MODEL_NAME, Direction::Read))
    }

    /// Encode the model as a request body.
    fn write(&self) -> ServiceResult<Vec<u8>> {
        Err(ServiceError::unsupported(Self::MODEL_NAME, Direction::Write))
    }
}

/// Serde-backed body of [`JsonModel::read`].
pub fn read_json<T: DeserializeOwned>(json: &[u8]) -> ServiceResult<T> {
    Ok(serde_json::from_slice(json)?)
}

/// Serde-backed body of [`JsonModel::write`].
pub fn write_json<T: Serialize>(model: &T) -> ServiceResult<Vec<u8>> {
    Ok(serde_json::to_vec(model)?)
}

impl JsonModel for serde_json::Value {
    const MODEL_NAME: &'static str = "Value";

    fn read(json: &[u8]) -> ServiceResult<Self> {
        read_json(json)
    }

    fn write(&self) -> ServiceResult<Vec<u8>> {
        write_json(self)
    }
}
