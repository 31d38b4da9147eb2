//! The remote capability surface consumed by the engine.
//!
//! A [`LiveBinding`] exposes `get`/`set`/`call` on opaque [`ObjectRef`]s. The
//! engine never holds remote objects across phases; it re-resolves them from
//! positional handles ([`TrackHandle`], [`SlotIndex`]) because the session
//! offers no stable keys. Reordering or deleting tracks outside the engine
//! invalidates every cached handle.

use std::{collections::BTreeMap, fmt};

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub type RemoteResult<T> = Result<T, RemoteError>;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum RemoteError {
    /// The object does not expose this member in the running session/version.
    #[error("{object} has no member `{member}`")]
    MissingMember { object: ObjectRef, member: String },
    /// The member exists and was invoked, but the remote side refused it.
    #[error("`{member}` was rejected: {reason}")]
    Rejected { member: String, reason: String },
    #[error("object {0} no longer exists")]
    StaleObject(ObjectRef),
}

impl RemoteError {
    #[must_use]
    pub fn is_missing(&self) -> bool {
        matches!(self, Self::MissingMember { .. })
    }

    pub fn rejected(member: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Rejected {
            member: member.into(),
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ObjectRef(pub u64);

impl ObjectRef {
    /// Every binding exposes the song as object zero.
    pub const SONG: Self = Self(0);
}

impl fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "obj#{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemoteValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Object(ObjectRef),
    List(Vec<RemoteValue>),
    Record(BTreeMap<String, RemoteValue>),
}

impl RemoteValue {
    /// Numeric view; the remote side reports booleans as 0/1 in places.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(value) => Some(*value as f64),
            Self::Float(value) => Some(*value),
            Self::Bool(value) => Some(f64::from(u8::from(*value))),
            Self::Text(text) => text.trim().parse().ok(),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(value) => Some(*value),
            Self::Int(value) => Some(*value != 0),
            Self::Float(value) => Some(*value != 0.0),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_object(&self) -> Option<ObjectRef> {
        match self {
            Self::Object(object) => Some(*object),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_list(&self) -> Option<&[RemoteValue]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn record<I, K>(fields: I) -> Self
    where
        I: IntoIterator<Item = (K, RemoteValue)>,
        K: Into<String>,
    {
        Self::Record(
            fields
                .into_iter()
                .map(|(key, value)| (key.into(), value))
                .collect(),
        )
    }
}

impl From<bool> for RemoteValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for RemoteValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f64> for RemoteValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for RemoteValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for RemoteValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<ObjectRef> for RemoteValue {
    fn from(value: ObjectRef) -> Self {
        Self::Object(value)
    }
}

/// Synchronous remote object binding. Every call is issued and completed
/// before the next one; implementations need no internal ordering guarantees.
pub trait LiveBinding {
    fn get(&mut self, object: ObjectRef, property: &str) -> RemoteResult<RemoteValue>;

    fn set(&mut self, object: ObjectRef, property: &str, value: RemoteValue) -> RemoteResult<()>;

    fn call(
        &mut self,
        object: ObjectRef,
        method: &str,
        args: Vec<RemoteValue>,
    ) -> RemoteResult<RemoteValue>;
}

impl<B: LiveBinding + ?Sized> LiveBinding for &mut B {
    fn get(&mut self, object: ObjectRef, property: &str) -> RemoteResult<RemoteValue> {
        (**self).get(object, property)
    }

    fn set(&mut self, object: ObjectRef, property: &str, value: RemoteValue) -> RemoteResult<()> {
        (**self).set(object, property, value)
    }

    fn call(
        &mut self,
        object: ObjectRef,
        method: &str,
        args: Vec<RemoteValue>,
    ) -> RemoteResult<RemoteValue> {
        (**self).call(object, method, args)
    }
}

/// Positional address of a track. `Track` and `Return` index into the
/// session's `tracks` and `return_tracks` lists as they were when the handle
/// was taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackHandle {
    Track(usize),
    Return(usize),
    Master,
}

impl fmt::Display for TrackHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Track(index) => write!(f, "track[{index}]"),
            Self::Return(index) => write!(f, "return[{index}]"),
            Self::Master => f.write_str("master"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SlotIndex(pub usize);

impl fmt::Display for SlotIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "slot[{}]", self.0)
    }
}
