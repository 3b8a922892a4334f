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

use std::collections::HashSet;
use std::sync::Arc;

use crate::context::TransactionContext;
use crate::editor::ContextEditorRegistry;
use crate::error::{InvalidStateError, TccError};
use crate::invocation::MethodCall;
use crate::manager::{TransactionManager, TransactionScope};
use crate::status::TransactionStatus;
use crate::xid::Xid;

use super::{context_editor, Compensable, MethodType, TryOutcome};

/// Decides the role of each compensable call and drives the transaction around it.
pub struct CompensableTransactionInterceptor {
    manager: Arc<TransactionManager>,
    editors: ContextEditorRegistry,
    delay_cancel_exceptions: HashSet<String>,
}

impl CompensableTransactionInterceptor {
    pub fn new(
        manager: Arc<TransactionManager>,
        editors: ContextEditorRegistry,
        delay_cancel_exceptions: HashSet<String>,
    ) -> Self {
        CompensableTransactionInterceptor {
            manager,
            editors,
            delay_cancel_exceptions,
        }
    }

    /// Runs `proceed` for `call` in the role the call plays in a transaction.
    ///
    /// A root call begins a transaction, runs the Try phase, then confirms or cancels. A provider
    /// call either runs its local Try phase in a new branch, or confirms or cancels an existing
    /// branch without calling `proceed` at all. Any other call just proceeds.
    ///
    /// # Errors
    ///
    /// The Try phase's error is returned unchanged after the transaction has been cancelled or
    /// kept for recovery. Errors of the transaction machinery are returned as they are.
    pub fn intercept<R, F>(
        &self,
        scope: &mut TransactionScope,
        compensable: &Compensable,
        call: MethodCall,
        proceed: F,
    ) -> Result<R, TccError>
    where
        R: Default,
        F: FnOnce(&mut TransactionScope, MethodCall) -> Result<R, TccError>,
    {
        let context = context_editor(&self.editors, compensable)?.get(&call)?;
        let is_transaction_active = scope.is_transaction_active();

        if !MethodType::is_legal(
            compensable.propagation(),
            is_transaction_active,
            context.as_ref(),
        ) {
            return Err(TccError::from(InvalidStateError::with_message(format!(
                "no active compensable transaction while propagation is mandatory for method {}",
                call.method_name()
            ))));
        }

        let method_type = MethodType::calculate(
            compensable.propagation(),
            is_transaction_active,
            context.as_ref(),
        );

        match (method_type, context) {
            (MethodType::Root, _) => self.root_method_proceed(scope, compensable, call, proceed),
            (MethodType::Provider, Some(context)) => {
                self.provider_method_proceed(scope, compensable, &context, call, proceed)
            }
            _ => proceed(scope, call),
        }
    }

    fn root_method_proceed<R, F>(
        &self,
        scope: &mut TransactionScope,
        compensable: &Compensable,
        call: MethodCall,
        proceed: F,
    ) -> Result<R, TccError>
    where
        F: FnOnce(&mut TransactionScope, MethodCall) -> Result<R, TccError>,
    {
        let xid = self.manager.begin(scope)?;

        let tried = proceed(scope, call);
        let outcome = TryOutcome::classify(tried, |kind| {
            self.delay_cancel_exceptions.contains(kind)
                || compensable.delay_cancel_exceptions().contains(kind)
        });

        let result = match outcome {
            TryOutcome::Success(value) => self
                .manager
                .commit(scope, compensable.async_confirm())
                .map(|_| value),
            TryOutcome::Ambiguous(err) => {
                warn!(
                    "compensable transaction {} try failed with delay-cancel error, \
                     leaving it to recovery: {}",
                    xid, err
                );
                self.manager.sync_transaction(scope).and(Err(err))
            }
            TryOutcome::Failure(err) => {
                warn!("compensable transaction {} try failed: {}", xid, err);
                self.manager
                    .rollback(scope, compensable.async_cancel())
                    .and(Err(err))
            }
        };

        self.complete(scope, &xid, result)
    }

    fn provider_method_proceed<R, F>(
        &self,
        scope: &mut TransactionScope,
        compensable: &Compensable,
        context: &TransactionContext,
        call: MethodCall,
        proceed: F,
    ) -> Result<R, TccError>
    where
        R: Default,
        F: FnOnce(&mut TransactionScope, MethodCall) -> Result<R, TccError>,
    {
        match context.status()? {
            TransactionStatus::Trying => {
                let xid = self.manager.propagation_new_begin(scope, context)?;
                let result = proceed(scope, call);
                self.complete(scope, &xid, result)
            }
            TransactionStatus::Confirming => {
                let xid = match self.resume(scope, context)? {
                    Some(xid) => xid,
                    None => return Ok(R::default()),
                };
                let result = self
                    .manager
                    .commit(scope, compensable.async_confirm())
                    .map(|_| R::default());
                self.complete(scope, &xid, result)
            }
            TransactionStatus::Cancelling => {
                let xid = match self.resume(scope, context)? {
                    Some(xid) => xid,
                    None => return Ok(R::default()),
                };
                let result = self
                    .manager
                    .rollback(scope, compensable.async_cancel())
                    .map(|_| R::default());
                self.complete(scope, &xid, result)
            }
        }
    }

    // Loads the branch named by the context. `None` means the branch already completed.
    fn resume(
        &self,
        scope: &mut TransactionScope,
        context: &TransactionContext,
    ) -> Result<Option<Xid>, TccError> {
        match self.manager.propagation_exist_begin(scope, context) {
            Ok(xid) => Ok(Some(xid)),
            Err(TccError::NoExistedTransaction(xid)) => {
                debug!("transaction {} already completed", xid);
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }

    // Removes the transaction from the scope whatever `result` is. An error of the call itself
    // takes precedence over an error of the cleanup.
    fn complete<R>(
        &self,
        scope: &mut TransactionScope,
        xid: &Xid,
        result: Result<R, TccError>,
    ) -> Result<R, TccError> {
        let cleaned = self.manager.clean_after_completion(scope, Some(xid));

        match (result, cleaned) {
            (Ok(value), Ok(())) => Ok(value),
            (Ok(_), Err(err)) => Err(err),
            (Err(err), Ok(())) => Err(err),
            (Err(err), Err(clean_err)) => {
                error!(
                    "unable to clean transaction {} after failure: {}",
                    xid, clean_err
                );
                Err(err)
            }
        }
    }
}
