//! Lazily parsed, dirty-tracked structured payloads
//!
//! Rows store their structured payload as an opaque JSON blob. Loading a
//! row keeps the blob as it is; it is only parsed when the payload is
//! first accessed. Any mutable access marks the payload dirty, whether or
//! not the value actually changes.

use serde::de::DeserializeOwned;
use serde::{Serialize, Serializer};
use std::fmt;

use crate::core::error::Result;

/// Serialised payload as stored in a row
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Blob(pub Vec<u8>);

impl Blob {
    pub fn encode<T: Serialize>(value: &T) -> Result<Self> {
        Ok(Self(serde_json::to_vec(value)?))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Blob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Blob({})", String::from_utf8_lossy(&self.0))
    }
}

impl Serialize for Blob {
    /// Dumps embed the payload as structured JSON rather than bytes
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        if self.0.is_empty() {
            return serializer.serialize_none();
        }
        match serde_json::from_slice::<serde_json::Value>(&self.0) {
            Ok(v) => v.serialize(serializer),
            Err(_) => serializer.serialize_bytes(&self.0),
        }
    }
}

enum LazyState<T> {
    Unparsed(Blob),
    Parsed { value: T, dirty: bool },
}

pub struct LazyPayload<T> {
    state: LazyState<T>,
}

impl<T> LazyPayload<T>
where
    T: Serialize + DeserializeOwned + Default,
{
    /// Wrap a blob loaded from the database; nothing is parsed yet
    pub fn from_blob(blob: Blob) -> Self {
        Self {
            state: LazyState::Unparsed(blob),
        }
    }

    /// A default value that has not been modified
    pub fn new_default() -> Self {
        Self {
            state: LazyState::Parsed {
                value: T::default(),
                dirty: false,
            },
        }
    }

    fn ensure_parsed(&mut self) -> Result<()> {
        if let LazyState::Unparsed(blob) = &self.state {
            let value = if blob.is_empty() {
                T::default()
            } else {
                serde_json::from_slice(&blob.0)?
            };
            self.state = LazyState::Parsed {
                value,
                dirty: false,
            };
        }
        Ok(())
    }

    pub fn get(&mut self) -> Result<&T> {
        self.ensure_parsed()?;
        match &self.state {
            LazyState::Parsed { value, .. } => Ok(value),
            LazyState::Unparsed(_) => unreachable!("payload parsed above"),
        }
    }

    pub fn get_mut(&mut self) -> Result<&mut T> {
        self.ensure_parsed()?;
        match &mut self.state {
            LazyState::Parsed { value, dirty } => {
                *dirty = true;
                Ok(value)
            }
            LazyState::Unparsed(_) => unreachable!("payload parsed above"),
        }
    }

    /// Replace the value outright, marking it dirty
    pub fn set(&mut self, value: T) {
        self.state = LazyState::Parsed { value, dirty: true };
    }

    pub fn is_parsed(&self) -> bool {
        matches!(self.state, LazyState::Parsed { .. })
    }

    pub fn is_dirty(&self) -> bool {
        matches!(self.state, LazyState::Parsed { dirty: true, .. })
    }

    /// Blob for writing back; unparsed payloads are passed through
    pub fn to_blob(&self) -> Result<Blob> {
        match &self.state {
            LazyState::Unparsed(blob) => Ok(blob.clone()),
            LazyState::Parsed { value, .. } => Blob::encode(value),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for LazyPayload<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.state {
            LazyState::Unparsed(blob) => write!(f, "Unparsed({:?})", blob),
            LazyState::Parsed { value, dirty } => f
                .debug_struct("Parsed")
                .field("value", value)
                .field("dirty", dirty)
                .finish(),
        }
    }
}
