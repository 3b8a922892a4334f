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

use std::sync::Arc;

use crate::context::TransactionContext;
use crate::editor::ContextEditorRegistry;
use crate::error::{InvalidStateError, TccError};
use crate::invocation::{InvocationContext, MethodCall};
use crate::manager::{TransactionManager, TransactionScope};
use crate::participant::Participant;
use crate::status::TransactionStatus;

use super::{context_editor, Compensable};

/// Enlists each compensable call made while a transaction is trying as a participant.
pub struct ResourceCoordinatorInterceptor {
    manager: Arc<TransactionManager>,
    editors: ContextEditorRegistry,
}

impl ResourceCoordinatorInterceptor {
    pub fn new(manager: Arc<TransactionManager>, editors: ContextEditorRegistry) -> Self {
        ResourceCoordinatorInterceptor { manager, editors }
    }

    pub fn intercept<R, F>(
        &self,
        scope: &mut TransactionScope,
        compensable: &Compensable,
        mut call: MethodCall,
        proceed: F,
    ) -> Result<R, TccError>
    where
        F: FnOnce(&mut TransactionScope, MethodCall) -> Result<R, TccError>,
    {
        let trying = scope
            .current()
            .map(|transaction| transaction.status() == TransactionStatus::Trying)
            .unwrap_or(false);

        if trying {
            self.enlist_participant(scope, compensable, &mut call)?;
        }

        proceed(scope, call)
    }

    // The participant gets a fresh branch of the current transaction. A call which carries no
    // context yet is stamped with one so that the callee can join as a provider.
    fn enlist_participant(
        &self,
        scope: &mut TransactionScope,
        compensable: &Compensable,
        call: &mut MethodCall,
    ) -> Result<(), TccError> {
        let xid = scope
            .current()
            .map(|transaction| transaction.xid().branch())
            .ok_or_else(|| {
                InvalidStateError::with_message("no active compensable transaction".into())
            })?;

        let editor = context_editor(&self.editors, compensable)?;
        if editor.get(call)?.is_none() {
            editor.set(
                &TransactionContext::new(xid.clone(), TransactionStatus::Trying),
                call,
            )?;
        }

        let participant = Participant::new(
            xid,
            InvocationContext::from_call(call, compensable.confirm_method()),
            InvocationContext::from_call(call, compensable.cancel_method()),
            compensable.context_editor(),
        );

        self.manager.enlist_participant(scope, participant)
    }
}
