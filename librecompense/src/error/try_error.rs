// Copyright 2023 Bitwise IO, Inc.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Contains TryError

use std::error::Error;
use std::fmt::{Display, Formatter, Result as FormatResult};

/// A business failure raised by application code during a Try phase.
///
/// The `kind` plays the role of an error class: it is what the delay-cancel policy matches
/// against, either on this error or on the innermost error of its cause chain.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TryError {
    kind: String,
    message: String,
    ambiguous: bool,
    cause: Option<Box<TryError>>,
}

impl TryError {
    pub fn new(kind: &str, message: &str) -> Self {
        TryError {
            kind: kind.into(),
            message: message.into(),
            ambiguous: false,
            cause: None,
        }
    }

    /// Creates an error whose outcome is unknown to the caller, e.g. a timed out remote call.
    ///
    /// An ambiguous failure defers the confirm/cancel decision to recovery regardless of the
    /// configured delay-cancel kinds.
    pub fn ambiguous(kind: &str, message: &str) -> Self {
        TryError {
            ambiguous: true,
            ..TryError::new(kind, message)
        }
    }

    pub fn with_cause(mut self, cause: TryError) -> Self {
        self.cause = Some(Box::new(cause));
        self
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn is_ambiguous(&self) -> bool {
        self.ambiguous
    }

    pub fn cause(&self) -> Option<&TryError> {
        self.cause.as_deref()
    }

    /// Returns the innermost cause, or `None` if this error has no cause.
    pub fn root_cause(&self) -> Option<&TryError> {
        let mut current = self.cause.as_deref()?;
        while let Some(next) = current.cause.as_deref() {
            current = next;
        }
        Some(current)
    }
}

impl Error for TryError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.cause.as_deref().map(|e| e as &(dyn Error + 'static))
    }
}

impl Display for TryError {
    fn fmt(&self, f: &mut Formatter) -> FormatResult {
        write!(f, "{}: {}", self.kind, self.message)
    }
}
