/*!
 * Core Types
 * Identifiers, keys, and attribute maps shared by every signal domain
 */

use bytes::Bytes;
use serde::{Serialize, Serializer};
use std::borrow::Cow;
use std::fmt;

/// Inline-optimized string for short hot-path values (names, keys, messages)
pub type InlineString = smartstring::alias::String;

/// Nanoseconds since the Unix epoch
pub type UnixNanos = u64;

/// Attribute value as produced by OTLP conversion
pub type AttributeValue = serde_json::Value;

/// Trace identifier (opaque byte string, rendered as lowercase hex)
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct TraceId(Bytes);

/// Span identifier (opaque byte string, rendered as lowercase hex)
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct SpanId(Bytes);

macro_rules! impl_id {
    ($name:ident) => {
        impl $name {
            #[inline]
            pub fn new(bytes: impl Into<Bytes>) -> Self {
                Self(bytes.into())
            }

            #[inline]
            pub fn as_bytes(&self) -> &[u8] {
                &self.0
            }

            #[inline]
            pub fn is_empty(&self) -> bool {
                self.0.is_empty()
            }

            /// Lowercase hex rendering, the canonical display form
            #[inline]
            pub fn hex(&self) -> String {
                hex::encode(&self.0)
            }

            /// True when the canonical hex form starts with `prefix`
            /// (case-insensitive)
            pub fn matches_hex_prefix(&self, prefix: &str) -> bool {
                self.hex().starts_with(&prefix.to_ascii_lowercase())
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!(stringify!($name), "({})"), self.hex())
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.hex())
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(&self.hex())
            }
        }

        impl From<&[u8]> for $name {
            fn from(bytes: &[u8]) -> Self {
                Self(Bytes::copy_from_slice(bytes))
            }
        }

        impl From<Vec<u8>> for $name {
            fn from(bytes: Vec<u8>) -> Self {
                Self(Bytes::from(bytes))
            }
        }
    };
}

impl_id!(TraceId);
impl_id!(SpanId);

/// Logical application identity: name plus optional instance id.
///
/// `instance_id = None` acts as a filter meaning "every instance of this
/// name". Registry keys always carry a concrete instance id.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ApplicationKey {
    pub name: InlineString,
    pub instance_id: Option<InlineString>,
}

impl ApplicationKey {
    #[inline]
    pub fn new(name: impl Into<InlineString>, instance_id: impl Into<InlineString>) -> Self {
        Self {
            name: name.into(),
            instance_id: Some(instance_id.into()),
        }
    }

    /// Filter key matching every instance of `name`
    #[inline]
    pub fn all_instances(name: impl Into<InlineString>) -> Self {
        Self {
            name: name.into(),
            instance_id: None,
        }
    }

    /// Filter semantics: `self` is the filter, `other` a concrete key.
    /// Names compare case-insensitively; a `None` instance id matches all.
    pub fn matches(&self, other: &ApplicationKey) -> bool {
        if !self.name.eq_ignore_ascii_case(&other.name) {
            return false;
        }
        match &self.instance_id {
            None => true,
            Some(id) => other.instance_id.as_deref() == Some(id.as_str()),
        }
    }
}

impl fmt::Display for ApplicationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.instance_id {
            Some(id) => write!(f, "{}-{}", self.name, id),
            None => f.write_str(&self.name),
        }
    }
}

/// Log severity, collapsed from the OTLP 1..=24 severity number range
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[repr(u8)]
pub enum Severity {
    Trace = 0,
    Debug = 1,
    Info = 2,
    Warn = 3,
    Error = 4,
    Fatal = 5,
}

impl Severity {
    /// Map an OTLP severity number to its band. Zero/unknown maps to Info.
    pub fn from_otlp(number: u32) -> Self {
        match number {
            1..=4 => Severity::Trace,
            5..=8 => Severity::Debug,
            0 | 9..=12 => Severity::Info,
            13..=16 => Severity::Warn,
            17..=20 => Severity::Error,
            _ => Severity::Fatal,
        }
    }

    #[inline]
    pub fn is_error(self) -> bool {
        self >= Severity::Error
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Trace => "Trace",
            Severity::Debug => "Debug",
            Severity::Info => "Info",
            Severity::Warn => "Warn",
            Severity::Error => "Error",
            Severity::Fatal => "Fatal",
        }
    }
}

/// Span kind per the OTLP model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum SpanKind {
    Unspecified,
    Internal,
    Server,
    Client,
    Producer,
    Consumer,
}

impl SpanKind {
    pub fn as_str(self) -> &'static str {
        match self {
            SpanKind::Unspecified => "Unspecified",
            SpanKind::Internal => "Internal",
            SpanKind::Server => "Server",
            SpanKind::Client => "Client",
            SpanKind::Producer => "Producer",
            SpanKind::Consumer => "Consumer",
        }
    }
}

/// Span status per the OTLP model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum SpanStatus {
    Unset,
    Ok,
    Error,
}

impl SpanStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            SpanStatus::Unset => "Unset",
            SpanStatus::Ok => "Ok",
            SpanStatus::Error => "Error",
        }
    }
}

/// Ordered attribute map. Preserves producer order; lookups are linear,
/// which is fine at the attribute counts telemetry records carry.
#[derive(Clone, Debug, Default, Serialize)]
pub struct Attributes(Vec<(InlineString, AttributeValue)>);

impl Attributes {
    #[inline]
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn from_pairs(pairs: Vec<(InlineString, AttributeValue)>) -> Self {
        Self(pairs)
    }

    pub fn get(&self, key: &str) -> Option<&AttributeValue> {
        self.0.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// String rendering of one attribute, if present
    pub fn get_text(&self, key: &str) -> Option<Cow<'_, str>> {
        self.get(key).map(value_text)
    }

    pub fn keys(&self) -> impl Iterator<Item = &InlineString> {
        self.0.iter().map(|(k, _)| k)
    }

    pub fn iter(&self) -> impl Iterator<Item = &(InlineString, AttributeValue)> {
        self.0.iter()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(InlineString, AttributeValue)> for Attributes {
    fn from_iter<I: IntoIterator<Item = (InlineString, AttributeValue)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Render an attribute value the way filter comparisons and histograms
/// see it: strings unquoted, everything else as compact JSON.
pub fn value_text(value: &AttributeValue) -> Cow<'_, str> {
    match value {
        AttributeValue::String(s) => Cow::Borrowed(s.as_str()),
        other => Cow::Owned(other.to_string()),
    }
}
