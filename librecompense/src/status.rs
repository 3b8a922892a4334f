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

use std::fmt::{Display, Formatter, Result as FormatResult};

use serde::{Deserialize, Serialize};

use crate::error::InvalidStateError;

/// The phase a transaction is in.
///
/// There is no terminal status: a transaction which finishes confirming or cancelling is
/// deleted from the store.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransactionStatus {
    Trying,
    Confirming,
    Cancelling,
}

impl TransactionStatus {
    /// The ordinal carried in a `TransactionContext`.
    pub fn id(&self) -> i32 {
        match self {
            TransactionStatus::Trying => 1,
            TransactionStatus::Confirming => 2,
            TransactionStatus::Cancelling => 3,
        }
    }

    pub fn from_id(id: i32) -> Result<Self, InvalidStateError> {
        match id {
            1 => Ok(TransactionStatus::Trying),
            2 => Ok(TransactionStatus::Confirming),
            3 => Ok(TransactionStatus::Cancelling),
            _ => Err(InvalidStateError::with_message(format!(
                "unknown transaction status id: {id}"
            ))),
        }
    }
}

impl Display for TransactionStatus {
    fn fmt(&self, f: &mut Formatter) -> FormatResult {
        match self {
            TransactionStatus::Trying => f.write_str("TRYING"),
            TransactionStatus::Confirming => f.write_str("CONFIRMING"),
            TransactionStatus::Cancelling => f.write_str("CANCELLING"),
        }
    }
}

/// Whether a transaction started the distributed transaction or joined it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransactionType {
    Root,
    Branch,
}

impl TransactionType {
    pub fn id(&self) -> i32 {
        match self {
            TransactionType::Root => 1,
            TransactionType::Branch => 2,
        }
    }

    pub fn from_id(id: i32) -> Result<Self, InvalidStateError> {
        match id {
            1 => Ok(TransactionType::Root),
            2 => Ok(TransactionType::Branch),
            _ => Err(InvalidStateError::with_message(format!(
                "unknown transaction type id: {id}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_ids_are_stable() {
        assert_eq!(TransactionStatus::Trying.id(), 1);
        assert_eq!(TransactionStatus::Confirming.id(), 2);
        assert_eq!(TransactionStatus::Cancelling.id(), 3);
        assert_eq!(
            TransactionStatus::from_id(2).unwrap(),
            TransactionStatus::Confirming
        );
        assert!(TransactionStatus::from_id(0).is_err());
        assert!(TransactionStatus::from_id(4).is_err());
    }

    #[test]
    fn type_ids_are_stable() {
        assert_eq!(TransactionType::from_id(1).unwrap(), TransactionType::Root);
        assert_eq!(TransactionType::from_id(2).unwrap(), TransactionType::Branch);
        assert!(TransactionType::from_id(3).is_err());
    }
}
