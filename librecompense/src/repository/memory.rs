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

use std::collections::HashMap;
use std::time::SystemTime;

use parking_lot::Mutex;

use crate::error::RepositoryError;
use crate::time::{SystemTimeFactory, TimeSource};
use crate::transaction::Transaction;
use crate::xid::Xid;

use super::TransactionRepository;

/// Keeps transactions in process memory.
///
/// Transactions do not survive a restart; this store is meant for tests and single-process
/// deployments.
pub struct MemoryTransactionRepository<TS = SystemTimeFactory>
where
    TS: TimeSource,
{
    transactions: Mutex<HashMap<Xid, Transaction>>,
    time_source: TS,
}

impl MemoryTransactionRepository<SystemTimeFactory> {
    pub fn new() -> Self {
        MemoryTransactionRepository::with_time_source(SystemTimeFactory::new())
    }
}

impl Default for MemoryTransactionRepository<SystemTimeFactory> {
    fn default() -> Self {
        MemoryTransactionRepository::new()
    }
}

impl<TS> MemoryTransactionRepository<TS>
where
    TS: TimeSource,
{
    pub fn with_time_source(time_source: TS) -> Self {
        MemoryTransactionRepository {
            transactions: Mutex::new(HashMap::new()),
            time_source,
        }
    }

    pub fn len(&self) -> usize {
        self.transactions.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.lock().is_empty()
    }
}

impl<TS> TransactionRepository for MemoryTransactionRepository<TS>
where
    TS: TimeSource,
{
    fn create(&self, transaction: &Transaction) -> Result<(), RepositoryError> {
        let mut transactions = self.transactions.lock();
        if transactions.contains_key(transaction.xid()) {
            return Err(RepositoryError::Duplicate(transaction.xid().clone()));
        }
        let mut stored = transaction.clone();
        stored.set_last_update_time(self.time_source.now());
        transactions.insert(transaction.xid().clone(), stored);
        Ok(())
    }

    fn update(&self, transaction: &mut Transaction) -> Result<(), RepositoryError> {
        let mut transactions = self.transactions.lock();
        let stored_version = transactions.get(transaction.xid()).map(Transaction::version);
        if stored_version != Some(transaction.version()) {
            return Err(RepositoryError::VersionConflict {
                xid: transaction.xid().clone(),
                version: transaction.version(),
            });
        }

        transaction.update_version();
        transaction.set_last_update_time(self.time_source.now());
        transactions.insert(transaction.xid().clone(), transaction.clone());
        Ok(())
    }

    fn delete(&self, transaction: &Transaction) -> Result<(), RepositoryError> {
        self.transactions.lock().remove(transaction.xid());
        Ok(())
    }

    fn find_by_xid(&self, xid: &Xid) -> Result<Option<Transaction>, RepositoryError> {
        Ok(self.transactions.lock().get(xid).cloned())
    }

    fn find_all_unmodified_since(
        &self,
        since: SystemTime,
    ) -> Result<Vec<Transaction>, RepositoryError> {
        Ok(self
            .transactions
            .lock()
            .values()
            .filter(|t| t.last_update_time() < since)
            .cloned()
            .collect())
    }
}
