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

use crate::context::TransactionContext;
use crate::error::SystemError;
use crate::invocation::InvocationContext;
use crate::status::TransactionStatus;
use crate::terminator::Terminator;
use crate::xid::Xid;

/// One reservation made during a Try phase, with the actions which confirm or cancel it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Participant {
    xid: Xid,
    confirm_invocation: InvocationContext,
    cancel_invocation: InvocationContext,
    context_editor: String,
}

impl Participant {
    pub fn new(
        xid: Xid,
        confirm_invocation: InvocationContext,
        cancel_invocation: InvocationContext,
        context_editor: &str,
    ) -> Self {
        Participant {
            xid,
            confirm_invocation,
            cancel_invocation,
            context_editor: context_editor.into(),
        }
    }

    pub fn xid(&self) -> &Xid {
        &self.xid
    }

    pub fn confirm_invocation(&self) -> &InvocationContext {
        &self.confirm_invocation
    }

    pub fn cancel_invocation(&self) -> &InvocationContext {
        &self.cancel_invocation
    }

    pub fn context_editor(&self) -> &str {
        &self.context_editor
    }

    pub(crate) fn commit(&self, terminator: &Terminator) -> Result<(), SystemError> {
        terminator.invoke(
            &TransactionContext::new(self.xid.clone(), TransactionStatus::Confirming),
            &self.confirm_invocation,
            &self.context_editor,
        )?;
        Ok(())
    }

    pub(crate) fn rollback(&self, terminator: &Terminator) -> Result<(), SystemError> {
        terminator.invoke(
            &TransactionContext::new(self.xid.clone(), TransactionStatus::Cancelling),
            &self.cancel_invocation,
            &self.context_editor,
        )?;
        Ok(())
    }
}
