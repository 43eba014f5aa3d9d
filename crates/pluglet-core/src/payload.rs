//! Type-tagged payloads crossing the adapter boundary.
//!
//! A [`Payload`] carries a body of some concrete type together with its
//! [`PayloadType`]. When the receiver expects the same type the body is moved
//! through untouched; otherwise it is converted by a serde round trip.

use std::any::{Any, TypeId, type_name};
use std::fmt;

use serde::Serialize;
use serde::de::{DeserializeOwned, Error as _};
use serde_json::Value;

/// Runtime identity of a payload body type.
#[derive(Clone, Copy)]
pub struct PayloadType {
    id: TypeId,
    name: &'static str,
}

impl PayloadType {
    pub fn of<T: 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: type_name::<T>(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn is<T: 'static>(&self) -> bool {
        self.id == TypeId::of::<T>()
    }
}

impl PartialEq for PayloadType {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for PayloadType {}

impl fmt::Debug for PayloadType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

trait AnyBody: Send {
    fn to_json(&self) -> Result<Value, serde_json::Error>;
    fn into_any(self: Box<Self>) -> Box<dyn Any + Send>;
}

impl<T: Serialize + Send + 'static> AnyBody for T {
    fn to_json(&self) -> Result<Value, serde_json::Error> {
        serde_json::to_value(self)
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any + Send> {
        self
    }
}

/// A message body with its runtime type.
pub struct Payload {
    payload_type: PayloadType,
    body: Box<dyn AnyBody>,
}

impl Payload {
    pub fn new<T: Serialize + Send + 'static>(body: T) -> Self {
        Self {
            payload_type: PayloadType::of::<T>(),
            body: Box::new(body),
        }
    }

    pub fn payload_type(&self) -> PayloadType {
        self.payload_type
    }

    pub fn to_json(&self) -> Result<Value, serde_json::Error> {
        self.body.to_json()
    }

    /// Re-encodes the body as a JSON value payload.
    pub fn into_json(self) -> Result<Self, serde_json::Error> {
        if self.payload_type.is::<Value>() {
            return Ok(self);
        }
        Ok(Self::new(self.body.to_json()?))
    }

    /// Extracts the body as `T`.
    ///
    /// Moves the body out when it already is a `T`, otherwise serializes it
    /// and deserializes a `T` from the result.
    pub fn into_body<T: DeserializeOwned + 'static>(self) -> Result<T, serde_json::Error> {
        if self.payload_type.is::<T>() {
            return self
                .body
                .into_any()
                .downcast::<T>()
                .map(|body| *body)
                .map_err(|_| serde_json::Error::custom("payload body does not match its type tag"));
        }
        serde_json::from_value(self.body.to_json()?)
    }
}

impl fmt::Debug for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Payload")
            .field("type", &self.payload_type)
            .finish_non_exhaustive()
    }
}
