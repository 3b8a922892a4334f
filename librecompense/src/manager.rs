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

//! Transaction lifecycle: begin, propagate, commit, rollback and cleanup.

use std::sync::Arc;

use crate::config::RecoverConfig;
use crate::context::TransactionContext;
use crate::error::{InternalError, InvalidStateError, TccError};
use crate::executor::{AsyncExecutor, ThreadPoolExecutor};
use crate::participant::Participant;
use crate::repository::TransactionRepository;
use crate::status::TransactionStatus;
use crate::terminator::Terminator;
use crate::transaction::Transaction;
use crate::xid::Xid;

/// The transactions active on one thread of execution, innermost last.
///
/// A scope is never shared between threads. Work handed to another thread must carry a
/// `TransactionContext` explicitly and start from its own scope.
#[derive(Debug, Default)]
pub struct TransactionScope {
    transactions: Vec<Transaction>,
}

impl TransactionScope {
    pub fn new() -> Self {
        TransactionScope {
            transactions: Vec::new(),
        }
    }

    pub fn is_transaction_active(&self) -> bool {
        !self.transactions.is_empty()
    }

    pub fn current(&self) -> Option<&Transaction> {
        self.transactions.last()
    }

    pub fn current_mut(&mut self) -> Option<&mut Transaction> {
        self.transactions.last_mut()
    }

    pub fn depth(&self) -> usize {
        self.transactions.len()
    }

    fn push(&mut self, transaction: Transaction) {
        self.transactions.push(transaction);
    }

    fn pop(&mut self) -> Option<Transaction> {
        self.transactions.pop()
    }
}

// The two ways a transaction can finish. Both follow the same persist-then-replay sequence.
#[derive(Clone, Copy)]
enum Termination {
    Confirm,
    Cancel,
}

impl Termination {
    fn status(self) -> TransactionStatus {
        match self {
            Termination::Confirm => TransactionStatus::Confirming,
            Termination::Cancel => TransactionStatus::Cancelling,
        }
    }

    fn name(self) -> &'static str {
        match self {
            Termination::Confirm => "confirm",
            Termination::Cancel => "cancel",
        }
    }

    fn failure(self, err: InternalError) -> TccError {
        match self {
            Termination::Confirm => TccError::Confirming(err),
            Termination::Cancel => TccError::Cancelling(err),
        }
    }

    // Replays every participant and removes the record. A failure leaves the record in place
    // for recovery to redrive from the first participant.
    fn run(
        self,
        repository: &dyn TransactionRepository,
        terminator: &Terminator,
        transaction: &Transaction,
    ) -> Result<(), TccError> {
        let replayed = match self {
            Termination::Confirm => transaction.commit(terminator),
            Termination::Cancel => transaction.rollback(terminator),
        };

        replayed
            .map_err(TccError::from)
            .and_then(|_| repository.delete(transaction).map_err(TccError::from))
            .map_err(|err| {
                warn!(
                    "compensable transaction {} {} failed, recovery job will retry later: {}",
                    transaction.xid(),
                    self.name(),
                    err
                );
                self.failure(InternalError::from_source(Box::new(err)))
            })
    }
}

/// Creates, propagates and completes compensable transactions.
///
/// Every operation acts on an explicit [`TransactionScope`]; `commit`, `rollback`,
/// `sync_transaction` and `enlist_participant` act on the scope's innermost transaction.
pub struct TransactionManager {
    repository: Arc<dyn TransactionRepository>,
    terminator: Arc<Terminator>,
    executor: Arc<dyn AsyncExecutor>,
}

impl TransactionManager {
    pub fn repository(&self) -> &Arc<dyn TransactionRepository> {
        &self.repository
    }

    /// Starts a root transaction and makes it the scope's current transaction.
    pub fn begin(&self, scope: &mut TransactionScope) -> Result<Xid, TccError> {
        let transaction = Transaction::new_root();
        self.repository.create(&transaction)?;

        debug!("begin root transaction {}", transaction.xid());

        let xid = transaction.xid().clone();
        scope.push(transaction);
        Ok(xid)
    }

    /// Starts a branch transaction for a context received from a coordinating call.
    pub fn propagation_new_begin(
        &self,
        scope: &mut TransactionScope,
        context: &TransactionContext,
    ) -> Result<Xid, TccError> {
        let transaction = Transaction::new_branch(context);
        self.repository.create(&transaction)?;

        debug!("begin branch transaction {}", transaction.xid());

        let xid = transaction.xid().clone();
        scope.push(transaction);
        Ok(xid)
    }

    /// Loads the stored transaction named by the context and moves it to the context's status.
    ///
    /// # Errors
    ///
    /// [`TccError::NoExistedTransaction`] is returned if no transaction matches; the caller
    /// should treat the transaction as already completed.
    pub fn propagation_exist_begin(
        &self,
        scope: &mut TransactionScope,
        context: &TransactionContext,
    ) -> Result<Xid, TccError> {
        let status = context.status()?;
        let mut transaction = self
            .repository
            .find_by_xid(context.xid())?
            .ok_or_else(|| TccError::NoExistedTransaction(context.xid().clone()))?;

        debug!("resume transaction {} as {}", transaction.xid(), status);

        transaction.change_status(status);
        let xid = transaction.xid().clone();
        scope.push(transaction);
        Ok(xid)
    }

    /// Moves the current transaction to CONFIRMING and replays its confirm actions.
    ///
    /// With `async_commit` the replay runs on the executor and this call returns once the status
    /// change is stored.
    ///
    /// # Errors
    ///
    /// [`TccError::Confirming`] is returned if the replay fails or cannot be scheduled; the
    /// transaction stays stored for recovery.
    pub fn commit(&self, scope: &mut TransactionScope, async_commit: bool) -> Result<(), TccError> {
        self.terminate(scope, Termination::Confirm, async_commit)
    }

    /// Moves the current transaction to CANCELLING and replays its cancel actions.
    ///
    /// # Errors
    ///
    /// [`TccError::Cancelling`] is returned if the replay fails or cannot be scheduled; the
    /// transaction stays stored for recovery.
    pub fn rollback(
        &self,
        scope: &mut TransactionScope,
        async_rollback: bool,
    ) -> Result<(), TccError> {
        self.terminate(scope, Termination::Cancel, async_rollback)
    }

    /// Stores the current transaction's participants without changing its status.
    pub fn sync_transaction(&self, scope: &mut TransactionScope) -> Result<(), TccError> {
        let transaction = current_mut(scope)?;
        self.repository.update(transaction)?;
        Ok(())
    }

    /// Appends a participant to the current transaction and stores it.
    pub fn enlist_participant(
        &self,
        scope: &mut TransactionScope,
        participant: Participant,
    ) -> Result<(), TccError> {
        let transaction = current_mut(scope)?;

        debug!(
            "enlist participant {} in transaction {}",
            participant.xid(),
            transaction.xid()
        );

        transaction.enlist_participant(participant)?;
        self.repository.update(transaction)?;
        Ok(())
    }

    /// Removes the transaction named by `xid` from the scope.
    ///
    /// `None` is a no-op, which lets callers clean up unconditionally even when beginning the
    /// transaction failed.
    ///
    /// # Errors
    ///
    /// A [`TccError::System`] is returned if `xid` does not name the current transaction.
    pub fn clean_after_completion(
        &self,
        scope: &mut TransactionScope,
        xid: Option<&Xid>,
    ) -> Result<(), TccError> {
        let xid = match xid {
            Some(xid) => xid,
            None => return Ok(()),
        };

        match scope.current() {
            Some(current) if current.xid() == xid => {
                scope.pop();
                debug!("clean transaction {} after completion", xid);
                Ok(())
            }
            _ => Err(TccError::from(InvalidStateError::with_message(format!(
                "illegal transaction {} when clean after completion",
                xid
            )))),
        }
    }

    fn terminate(
        &self,
        scope: &mut TransactionScope,
        termination: Termination,
        asynchronous: bool,
    ) -> Result<(), TccError> {
        let transaction = current_mut(scope)?;
        transaction.change_status(termination.status());
        self.repository.update(transaction)?;

        debug!(
            "update transaction {} status to {}",
            transaction.xid(),
            termination.status()
        );

        let transaction = transaction.clone();

        if !asynchronous {
            return termination.run(&*self.repository, &self.terminator, &transaction);
        }

        let repository = self.repository.clone();
        let terminator = self.terminator.clone();
        let xid = transaction.xid().clone();

        self.executor
            .execute(Box::new(move || {
                // failures are logged by `run` and left for recovery
                let _ = termination.run(&*repository, &terminator, &transaction);
            }))
            .map_err(|err| {
                warn!(
                    "compensable transaction {} async {} submit failed, \
                     recovery job will retry later: {}",
                    xid,
                    termination.name(),
                    err
                );
                termination.failure(err)
            })
    }
}

fn current_mut(scope: &mut TransactionScope) -> Result<&mut Transaction, TccError> {
    scope.current_mut().ok_or_else(|| {
        TccError::from(InvalidStateError::with_message(
            "no active compensable transaction".into(),
        ))
    })
}

#[derive(Default)]
pub struct TransactionManagerBuilder {
    repository: Option<Arc<dyn TransactionRepository>>,
    terminator: Option<Terminator>,
    executor: Option<Arc<dyn AsyncExecutor>>,
    thread_pool_size: Option<usize>,
}

impl TransactionManagerBuilder {
    pub fn new() -> Self {
        Self {
            repository: None,
            terminator: None,
            executor: None,
            thread_pool_size: None,
        }
    }

    pub fn with_repository(mut self, repository: Arc<dyn TransactionRepository>) -> Self {
        self.repository = Some(repository);
        self
    }

    pub fn with_terminator(mut self, terminator: Terminator) -> Self {
        self.terminator = Some(terminator);
        self
    }

    /// Uses `executor` for asynchronous confirm and cancel instead of a thread pool.
    pub fn with_executor(mut self, executor: Arc<dyn AsyncExecutor>) -> Self {
        self.executor = Some(executor);
        self
    }

    /// Sizes the thread pool from the config's `async_terminate_thread_pool_size`.
    pub fn with_recover_config(mut self, config: &RecoverConfig) -> Self {
        self.thread_pool_size = Some(config.async_terminate_thread_pool_size());
        self
    }

    pub fn build(self) -> Result<TransactionManager, InvalidStateError> {
        let repository = self
            .repository
            .ok_or_else(|| InvalidStateError::with_message("missing repository field".into()))?;

        let terminator = self
            .terminator
            .ok_or_else(|| InvalidStateError::with_message("missing terminator field".into()))?;

        let executor: Arc<dyn AsyncExecutor> = match self.executor {
            Some(executor) => executor,
            None => {
                let size = self.thread_pool_size.unwrap_or_else(|| {
                    RecoverConfig::default().async_terminate_thread_pool_size()
                });
                let pool = ThreadPoolExecutor::new(size).map_err(|e| {
                    InvalidStateError::with_message(format!(
                        "unable to start async terminate thread pool: {}",
                        e
                    ))
                })?;
                Arc::new(pool)
            }
        };

        Ok(TransactionManager {
            repository,
            terminator: Arc::new(terminator),
            executor,
        })
    }
}
