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

//! Contains SystemError

use std::error::Error;
use std::fmt::{Display, Formatter, Result as FormatResult};

use super::InternalError;
use super::InvalidStateError;

/// A programming or configuration error which is always fatal to the current call.
#[derive(Debug)]
pub enum SystemError {
    /// The coordinator was used in a way that violates its contract, such as cleaning up a
    /// transaction which is not the active one.
    InvalidState(InvalidStateError),

    /// A confirm or cancel target could not be resolved or its invocation failed.
    Internal(InternalError),
}

impl Error for SystemError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            SystemError::InvalidState(e) => Some(e),
            SystemError::Internal(e) => Some(e),
        }
    }
}

impl Display for SystemError {
    fn fmt(&self, f: &mut Formatter) -> FormatResult {
        match self {
            SystemError::InvalidState(e) => write!(f, "{}", e),
            SystemError::Internal(e) => write!(f, "{}", e),
        }
    }
}

impl From<InvalidStateError> for SystemError {
    fn from(err: InvalidStateError) -> Self {
        SystemError::InvalidState(err)
    }
}

impl From<InternalError> for SystemError {
    fn from(err: InternalError) -> Self {
        SystemError::Internal(err)
    }
}
