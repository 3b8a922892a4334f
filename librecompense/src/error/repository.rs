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

//! Contains RepositoryError

use std::error::Error;
use std::fmt::{Display, Formatter, Result as FormatResult};

use crate::xid::Xid;

use super::InternalError;

/// An error returned by a `TransactionRepository`.
#[derive(Debug)]
pub enum RepositoryError {
    /// An update was conditioned on a version which is no longer the stored version. Another
    /// writer (usually the recovery job) has won the race.
    VersionConflict { xid: Xid, version: u64 },

    /// A transaction with the same xid is already stored.
    Duplicate(Xid),

    /// The underlying store failed.
    Internal(InternalError),
}

impl Error for RepositoryError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            RepositoryError::VersionConflict { .. } => None,
            RepositoryError::Duplicate(_) => None,
            RepositoryError::Internal(e) => Some(e),
        }
    }
}

impl Display for RepositoryError {
    fn fmt(&self, f: &mut Formatter) -> FormatResult {
        match self {
            RepositoryError::VersionConflict { xid, version } => write!(
                f,
                "transaction {} was modified concurrently; version {} is stale",
                xid, version
            ),
            RepositoryError::Duplicate(xid) => write!(f, "transaction {} already exists", xid),
            RepositoryError::Internal(e) => write!(f, "{}", e),
        }
    }
}

impl From<InternalError> for RepositoryError {
    fn from(err: InternalError) -> Self {
        RepositoryError::Internal(err)
    }
}
