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

//! Transaction identifiers.

use std::fmt::{Display, Formatter, Result as FormatResult};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifies a transaction as a pair of a global transaction id and a branch qualifier.
///
/// The global id is generated once, by the root transaction. Every branch created for the same
/// distributed transaction shares it and receives its own branch qualifier.
///
/// ```
/// use recompense::Xid;
///
/// let root = Xid::new();
/// let branch = root.branch();
///
/// assert_eq!(root.global_transaction_id(), branch.global_transaction_id());
/// assert_ne!(root, branch);
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Xid {
    global_transaction_id: [u8; 16],
    branch_qualifier: [u8; 16],
}

impl Xid {
    /// Creates an identifier for a new distributed transaction.
    pub fn new() -> Self {
        Xid::with_global_transaction_id(*Uuid::new_v4().as_bytes())
    }

    /// Creates an identifier with the given global id and a fresh branch qualifier.
    pub fn with_global_transaction_id(global_transaction_id: [u8; 16]) -> Self {
        Xid {
            global_transaction_id,
            branch_qualifier: *Uuid::new_v4().as_bytes(),
        }
    }

    /// Creates a child identifier sharing this identifier's global id.
    pub fn branch(&self) -> Self {
        Xid::with_global_transaction_id(self.global_transaction_id)
    }

    pub fn global_transaction_id(&self) -> &[u8; 16] {
        &self.global_transaction_id
    }

    pub fn branch_qualifier(&self) -> &[u8; 16] {
        &self.branch_qualifier
    }
}

impl Default for Xid {
    fn default() -> Self {
        Xid::new()
    }
}

impl Display for Xid {
    fn fmt(&self, f: &mut Formatter) -> FormatResult {
        write!(
            f,
            "{}:{}",
            Uuid::from_bytes(self.global_transaction_id),
            Uuid::from_bytes(self.branch_qualifier)
        )
    }
}
