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

//! Contains TccError

use std::error::Error;
use std::fmt::{Display, Formatter, Result as FormatResult};

use crate::xid::Xid;

use super::InternalError;
use super::InvalidStateError;
use super::RepositoryError;
use super::SystemError;
use super::TryError;

/// An error which can occur while coordinating a compensable transaction.
#[derive(Debug)]
pub enum TccError {
    /// No stored transaction matches the xid. At a provider this means the confirm or cancel
    /// already completed.
    NoExistedTransaction(Xid),

    /// The confirm replay failed or could not be scheduled; recovery will retry it.
    Confirming(InternalError),

    /// The cancel replay failed or could not be scheduled; recovery will retry it.
    Cancelling(InternalError),

    /// A programming or configuration error.
    System(SystemError),

    /// The transaction store rejected an operation.
    Repository(RepositoryError),

    /// The Try phase failed with a business error.
    Try(TryError),
}

impl TccError {
    /// The classification name checked against the delay-cancel kinds.
    pub fn kind(&self) -> &str {
        match self {
            TccError::NoExistedTransaction(_) => "NoExistedTransaction",
            TccError::Confirming(_) => "Confirming",
            TccError::Cancelling(_) => "Cancelling",
            TccError::System(_) => "System",
            TccError::Repository(RepositoryError::VersionConflict { .. }) => "OptimisticLock",
            TccError::Repository(_) => "Repository",
            TccError::Try(e) => e.kind(),
        }
    }

    /// The kind of the innermost business cause, when there is one.
    pub fn root_cause_kind(&self) -> Option<&str> {
        match self {
            TccError::Try(e) => e.root_cause().map(TryError::kind),
            _ => None,
        }
    }
}

impl Error for TccError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            TccError::NoExistedTransaction(_) => None,
            TccError::Confirming(e) => Some(e),
            TccError::Cancelling(e) => Some(e),
            TccError::System(e) => Some(e),
            TccError::Repository(e) => Some(e),
            TccError::Try(e) => Some(e),
        }
    }
}

impl Display for TccError {
    fn fmt(&self, f: &mut Formatter) -> FormatResult {
        match self {
            TccError::NoExistedTransaction(xid) => {
                write!(f, "no transaction exists for xid {}", xid)
            }
            TccError::Confirming(e) => write!(f, "confirm failed: {}", e),
            TccError::Cancelling(e) => write!(f, "cancel failed: {}", e),
            TccError::System(e) => write!(f, "{}", e),
            TccError::Repository(e) => write!(f, "{}", e),
            TccError::Try(e) => write!(f, "{}", e),
        }
    }
}

impl From<SystemError> for TccError {
    fn from(err: SystemError) -> Self {
        TccError::System(err)
    }
}

impl From<InvalidStateError> for TccError {
    fn from(err: InvalidStateError) -> Self {
        TccError::System(SystemError::InvalidState(err))
    }
}

impl From<InternalError> for TccError {
    fn from(err: InternalError) -> Self {
        TccError::System(SystemError::Internal(err))
    }
}

impl From<RepositoryError> for TccError {
    fn from(err: RepositoryError) -> Self {
        TccError::Repository(err)
    }
}

impl From<TryError> for TccError {
    fn from(err: TryError) -> Self {
        TccError::Try(err)
    }
}
