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

//! Redrives transactions left incomplete by a crash, a failed confirm or cancel, or a deferred
//! cancel decision.
//!
//! The host decides when to run a pass, typically on the schedule named by
//! [`RecoverConfig::cron_expression`].

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::config::RecoverConfig;
use crate::context::TransactionContext;
use crate::error::{RepositoryError, TccError};
use crate::manager::{TransactionManager, TransactionScope};
use crate::status::{TransactionStatus, TransactionType};
use crate::time::{SystemTimeFactory, TimeSource};
use crate::transaction::Transaction;

/// What a recovery pass did with the transactions it found.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RecoverySummary {
    pub confirmed: usize,
    pub cancelled: usize,
    pub skipped: usize,
    pub failed: usize,
}

pub struct TransactionRecovery<TS = SystemTimeFactory>
where
    TS: TimeSource,
{
    manager: Arc<TransactionManager>,
    config: RecoverConfig,
    time_source: TS,
}

impl TransactionRecovery<SystemTimeFactory> {
    pub fn new(manager: Arc<TransactionManager>, config: RecoverConfig) -> Self {
        TransactionRecovery::with_time_source(manager, config, SystemTimeFactory::new())
    }
}

impl<TS> TransactionRecovery<TS>
where
    TS: TimeSource,
{
    pub fn with_time_source(
        manager: Arc<TransactionManager>,
        config: RecoverConfig,
        time_source: TS,
    ) -> Self {
        TransactionRecovery {
            manager,
            config,
            time_source,
        }
    }

    /// Runs one recovery pass over every transaction unmodified for the recover duration.
    ///
    /// A failure to recover one transaction is logged and counted; the pass continues with the
    /// next one.
    ///
    /// # Errors
    ///
    /// A [`RepositoryError`] is returned if the candidate transactions cannot be loaded.
    pub fn start_recover(&self) -> Result<RecoverySummary, RepositoryError> {
        let since = recover_threshold(self.time_source.now(), &self.config);

        let transactions = self
            .manager
            .repository()
            .find_all_unmodified_since(since)?;

        let mut summary = RecoverySummary::default();

        for transaction in transactions {
            let status = match self.recover_status(&transaction) {
                Some(status) => status,
                None => {
                    summary.skipped += 1;
                    continue;
                }
            };

            match self.recover(&transaction, status) {
                Ok(true) => match status {
                    TransactionStatus::Confirming => summary.confirmed += 1,
                    _ => summary.cancelled += 1,
                },
                Ok(false) => summary.skipped += 1,
                Err(err) => {
                    warn!(
                        "recover failed with transaction {}, will retry later: {}",
                        transaction.xid(),
                        err
                    );
                    summary.failed += 1;
                }
            }
        }

        if summary != RecoverySummary::default() {
            info!(
                "recovery pass finished: {} confirmed, {} cancelled, {} skipped, {} failed",
                summary.confirmed, summary.cancelled, summary.skipped, summary.failed
            );
        }

        Ok(summary)
    }

    /// Returns the status recovery should drive the transaction to, if it should be touched at
    /// all.
    fn recover_status(&self, transaction: &Transaction) -> Option<TransactionStatus> {
        if transaction.retried_count() > self.config.max_retry_count() {
            error!(
                "recover failed with max retry count, will not try again. xid: {}, status: {}, \
                 retried count: {}",
                transaction.xid(),
                transaction.status(),
                transaction.retried_count()
            );
            return None;
        }

        match (transaction.status(), transaction.transaction_type()) {
            (TransactionStatus::Confirming, _) => Some(TransactionStatus::Confirming),
            (TransactionStatus::Cancelling, _) => Some(TransactionStatus::Cancelling),
            (TransactionStatus::Trying, TransactionType::Root) => {
                Some(TransactionStatus::Cancelling)
            }
            (TransactionStatus::Trying, TransactionType::Branch) => None,
        }
    }

    // Returns false if another process got to the transaction first.
    fn recover(
        &self,
        transaction: &Transaction,
        status: TransactionStatus,
    ) -> Result<bool, TccError> {
        let mut scope = TransactionScope::new();
        let context = TransactionContext::new(transaction.xid().clone(), status);

        let xid = match self.manager.propagation_exist_begin(&mut scope, &context) {
            Ok(xid) => xid,
            Err(TccError::NoExistedTransaction(_)) => return Ok(false),
            Err(err) => return Err(err),
        };

        let result = self.redrive(&mut scope, status);
        let cleaned = self.manager.clean_after_completion(&mut scope, Some(&xid));

        match result {
            Err(TccError::Repository(RepositoryError::VersionConflict { .. })) => {
                debug!("transaction {} changed during recovery, skipping", xid);
                cleaned.map(|_| false)
            }
            Err(err) => Err(err),
            Ok(()) => cleaned.map(|_| true),
        }
    }

    fn redrive(
        &self,
        scope: &mut TransactionScope,
        status: TransactionStatus,
    ) -> Result<(), TccError> {
        if let Some(current) = scope.current_mut() {
            current.add_retried_count();
        }
        self.manager.sync_transaction(scope)?;

        match status {
            TransactionStatus::Confirming => self.manager.commit(scope, false),
            _ => self.manager.rollback(scope, false),
        }
    }
}

/// The earliest last-update time which recovery leaves alone at `now`.
pub fn recover_threshold(now: SystemTime, config: &RecoverConfig) -> SystemTime {
    now.checked_sub(config.recover_duration())
        .unwrap_or(UNIX_EPOCH)
        .max(UNIX_EPOCH)
}
