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

use serde::{Deserialize, Serialize};

use crate::error::InvalidStateError;
use crate::status::TransactionStatus;
use crate::xid::Xid;

/// The state propagated from a coordinating call to a branch call.
///
/// This is the only transaction state which crosses a process boundary.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionContext {
    xid: Xid,
    status: i32,
}

impl TransactionContext {
    pub fn new(xid: Xid, status: TransactionStatus) -> Self {
        TransactionContext {
            xid,
            status: status.id(),
        }
    }

    pub fn xid(&self) -> &Xid {
        &self.xid
    }

    pub fn status_id(&self) -> i32 {
        self.status
    }

    /// Decodes the propagated status ordinal.
    pub fn status(&self) -> Result<TransactionStatus, InvalidStateError> {
        TransactionStatus::from_id(self.status)
    }
}
