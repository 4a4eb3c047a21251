// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.

//! Error types for sketch operations

use std::fmt;

/// ErrorKind is all kinds of Error this crate produces.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ErrorKind {
    /// A constructor or merge argument is invalid (bad rate, zero size,
    /// mismatched operand shapes).
    InvalidArgument,
    /// A cuckoo insert exhausted its swap budget and could not expand.
    FilterFull,
    /// The operation is unavailable on this structure.
    NotSupported,
    /// An aggregation policy tag was not recognized.
    UnknownPolicy,
    /// Persisted sketch data is malformed (short, mis-sized, or corrupt).
    MalformedPersistedData,
}

impl ErrorKind {
    /// The kind's name, as rendered in error messages.
    pub const fn as_str(self) -> &'static str {
        match self {
            ErrorKind::InvalidArgument => "InvalidArgument",
            ErrorKind::FilterFull => "FilterFull",
            ErrorKind::NotSupported => "NotSupported",
            ErrorKind::UnknownPolicy => "UnknownPolicy",
            ErrorKind::MalformedPersistedData => "MalformedPersistedData",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned by every fallible operation in the crate.
///
/// Carries a [`ErrorKind`], a human-readable message, optional
/// `key=value` context attached at the failure site, and an optional
/// underlying cause (typically an I/O error from a persistence path).
pub struct Error {
    kind: ErrorKind,
    message: String,
    context: Vec<String>,
    source: Option<anyhow::Error>,
}

impl Error {
    /// Create a new Error with error kind and message.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            context: Vec::new(),
            source: None,
        }
    }

    /// Attaches a `key=value` context pair to the error.
    pub fn with_context(mut self, key: &'static str, value: impl ToString) -> Self {
        self.context.push(format!("{key}={}", value.to_string()));
        self
    }

    /// Attaches the underlying cause, replacing any earlier one.
    pub fn with_source(mut self, source: impl Into<anyhow::Error>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Return error's kind.
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Return error's message.
    pub fn message(&self) -> &str {
        self.message.as_str()
    }
}

// Convenience constructors, one per failure family
impl Error {
    pub(crate) fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidArgument, msg)
    }

    pub(crate) fn incompatible(operation: &'static str, msg: impl fmt::Display) -> Self {
        Self::invalid_argument(format!("incompatible operands for {operation}: {msg}"))
    }

    pub(crate) fn filter_full(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::FilterFull, msg)
    }

    pub(crate) fn not_supported(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotSupported, msg)
    }

    pub(crate) fn unknown_policy(tag: impl fmt::Display) -> Self {
        Self::new(
            ErrorKind::UnknownPolicy,
            format!("unrecognized aggregation policy: {tag}"),
        )
    }

    pub(crate) fn persisted(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::MalformedPersistedData, msg)
    }

    pub(crate) fn insufficient_data(msg: impl fmt::Display) -> Self {
        Self::persisted(format!("insufficient data: {msg}"))
    }

    pub(crate) fn size_mismatch(expected: impl fmt::Display, actual: impl fmt::Display) -> Self {
        Self::persisted(format!(
            "size mismatch: expected {expected} bytes, got {actual}"
        ))
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)?;
        if !self.context.is_empty() {
            write!(f, " ({})", self.context.join(", "))?;
        }
        if let Some(source) = &self.source {
            write!(f, ": {source}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = f.debug_struct("Error");
        out.field("kind", &self.kind);
        out.field("message", &self.message);
        if !self.context.is_empty() {
            out.field("context", &self.context);
        }
        if let Some(source) = &self.source {
            out.field("source", source);
        }
        out.finish()
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source.as_ref().map(|cause| cause.as_ref())
    }
}
