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

use crate::editor::ARGUMENT_CONTEXT_EDITOR;

/// How a compensable method relates to a transaction already in progress.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Propagation {
    /// Join the propagated transaction, or start a new one when there is none.
    Required,
    /// Classified exactly like `Required`: a call with neither an active nor a propagated
    /// transaction starts a root rather than running outside a transaction.
    Supports,
    /// Fail unless a transaction is active or propagated.
    Mandatory,
    /// Start a new root transaction even inside an active one. A propagated context still
    /// makes the call a provider branch.
    RequiresNew,
}

/// The declaration attached to a method taking part in TCC transactions.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Compensable {
    propagation: Propagation,
    confirm_method: String,
    cancel_method: String,
    async_confirm: bool,
    async_cancel: bool,
    context_editor: String,
    delay_cancel_exceptions: HashSet<String>,
}

impl Compensable {
    pub fn new(confirm_method: &str, cancel_method: &str) -> Self {
        Compensable {
            propagation: Propagation::Required,
            confirm_method: confirm_method.into(),
            cancel_method: cancel_method.into(),
            async_confirm: false,
            async_cancel: false,
            context_editor: ARGUMENT_CONTEXT_EDITOR.into(),
            delay_cancel_exceptions: HashSet::new(),
        }
    }

    pub fn with_propagation(mut self, propagation: Propagation) -> Self {
        self.propagation = propagation;
        self
    }

    pub fn with_async_confirm(mut self, async_confirm: bool) -> Self {
        self.async_confirm = async_confirm;
        self
    }

    pub fn with_async_cancel(mut self, async_cancel: bool) -> Self {
        self.async_cancel = async_cancel;
        self
    }

    pub fn with_context_editor(mut self, context_editor: &str) -> Self {
        self.context_editor = context_editor.into();
        self
    }

    /// Adds error kinds which defer the cancel decision for this method only, on top of the
    /// configured ones.
    pub fn with_delay_cancel_exceptions<I, S>(mut self, kinds: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.delay_cancel_exceptions
            .extend(kinds.into_iter().map(Into::into));
        self
    }

    pub fn propagation(&self) -> Propagation {
        self.propagation
    }

    pub fn confirm_method(&self) -> &str {
        &self.confirm_method
    }

    pub fn cancel_method(&self) -> &str {
        &self.cancel_method
    }

    pub fn async_confirm(&self) -> bool {
        self.async_confirm
    }

    pub fn async_cancel(&self) -> bool {
        self.async_cancel
    }

    pub fn context_editor(&self) -> &str {
        &self.context_editor
    }

    pub fn delay_cancel_exceptions(&self) -> &HashSet<String> {
        &self.delay_cancel_exceptions
    }
}
