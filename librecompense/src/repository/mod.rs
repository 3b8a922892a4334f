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

//! Durable storage of transactions.
//!
//! The store is the single source of truth for a transaction. No in-process lock serializes
//! access to a given xid; correctness relies on every update being conditioned on the version
//! last read.

#[cfg(feature = "repository-memory")]
mod memory;

use std::time::SystemTime;

use crate::error::RepositoryError;
use crate::transaction::Transaction;
use crate::xid::Xid;

#[cfg(feature = "repository-memory")]
pub use memory::MemoryTransactionRepository;

pub trait TransactionRepository: Send + Sync {
    /// Stores a new transaction. The stored copy's last update time is taken from the
    /// repository's clock.
    ///
    /// # Errors
    ///
    /// [`RepositoryError::Duplicate`] is returned if the xid is already stored.
    fn create(&self, transaction: &Transaction) -> Result<(), RepositoryError>;

    /// Replaces the stored transaction if its version equals `transaction.version()`.
    ///
    /// On success the implementation advances the version and the last update time of both the
    /// stored copy and `transaction`.
    ///
    /// # Errors
    ///
    /// [`RepositoryError::VersionConflict`] is returned if the stored version differs or the
    /// transaction is no longer stored.
    fn update(&self, transaction: &mut Transaction) -> Result<(), RepositoryError>;

    /// Removes the transaction. Removing an absent transaction is not an error.
    fn delete(&self, transaction: &Transaction) -> Result<(), RepositoryError>;

    fn find_by_xid(&self, xid: &Xid) -> Result<Option<Transaction>, RepositoryError>;

    /// Returns every transaction whose last update is before `since`.
    fn find_all_unmodified_since(
        &self,
        since: SystemTime,
    ) -> Result<Vec<Transaction>, RepositoryError>;
}
