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

//! Strategies for carrying a `TransactionContext` on a call.
//!
//! Each compensable declaration names the strategy it uses by id. The strategy is looked up in
//! a [`ContextEditorRegistry`] both when a call is intercepted and when a participant's confirm
//! or cancel action is replayed, so the same id must be registered on both sides of a call.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

use crate::context::TransactionContext;
use crate::error::InternalError;
use crate::invocation::MethodCall;

/// Id of [`AttachmentContextEditor`].
pub const ATTACHMENT_CONTEXT_EDITOR: &str = "attachment";
/// Id of [`ArgumentContextEditor`].
pub const ARGUMENT_CONTEXT_EDITOR: &str = "argument";
/// Id of [`NullContextEditor`].
pub const NULL_CONTEXT_EDITOR: &str = "null";

/// The attachment key under which [`AttachmentContextEditor`] stores the context.
pub const TRANSACTION_CONTEXT_KEY: &str = "TRANSACTION_CONTEXT";

/// The declared parameter type which [`ArgumentContextEditor`] looks for.
pub const TRANSACTION_CONTEXT_PARAMETER: &str = "TransactionContext";

/// Reads and writes the transaction context carried by a call.
pub trait TransactionContextEditor: Send + Sync {
    /// Returns the context carried by `call`, if any.
    ///
    /// # Errors
    ///
    /// An [`InternalError`] is returned if a context is present but cannot be decoded.
    fn get(&self, call: &MethodCall) -> Result<Option<TransactionContext>, InternalError>;

    /// Stamps `context` onto `call`.
    ///
    /// # Errors
    ///
    /// An [`InternalError`] is returned if the context cannot be encoded.
    fn set(&self, context: &TransactionContext, call: &mut MethodCall) -> Result<(), InternalError>;
}

/// Carries the context as JSON text in the call's attachments, the way an RPC transport carries
/// out-of-band metadata.
#[derive(Default, Clone)]
pub struct AttachmentContextEditor {}

impl AttachmentContextEditor {
    pub fn new() -> Self {
        AttachmentContextEditor {}
    }
}

impl TransactionContextEditor for AttachmentContextEditor {
    fn get(&self, call: &MethodCall) -> Result<Option<TransactionContext>, InternalError> {
        match call.attachment(TRANSACTION_CONTEXT_KEY) {
            Some(text) if !text.is_empty() => serde_json::from_str(text)
                .map(Some)
                .map_err(|e| InternalError::from_source(Box::new(e))),
            _ => Ok(None),
        }
    }

    fn set(
        &self,
        context: &TransactionContext,
        call: &mut MethodCall,
    ) -> Result<(), InternalError> {
        let text =
            serde_json::to_string(context).map_err(|e| InternalError::from_source(Box::new(e)))?;
        call.set_attachment(TRANSACTION_CONTEXT_KEY, text);
        Ok(())
    }
}

/// Carries the context in the argument declared with the `TransactionContext` parameter type.
///
/// Calls without such a parameter never carry a context.
#[derive(Default, Clone)]
pub struct ArgumentContextEditor {}

impl ArgumentContextEditor {
    pub fn new() -> Self {
        ArgumentContextEditor {}
    }

    fn position(call: &MethodCall) -> Option<usize> {
        call.parameter_types()
            .iter()
            .position(|t| t == TRANSACTION_CONTEXT_PARAMETER)
            .filter(|i| *i < call.args().len())
    }
}

impl TransactionContextEditor for ArgumentContextEditor {
    fn get(&self, call: &MethodCall) -> Result<Option<TransactionContext>, InternalError> {
        match Self::position(call).map(|i| &call.args()[i]) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => serde_json::from_value(value.clone())
                .map(Some)
                .map_err(|e| InternalError::from_source(Box::new(e))),
        }
    }

    fn set(
        &self,
        context: &TransactionContext,
        call: &mut MethodCall,
    ) -> Result<(), InternalError> {
        if let Some(i) = Self::position(call) {
            call.args_mut()[i] = serde_json::to_value(context)
                .map_err(|e| InternalError::from_source(Box::new(e)))?;
        }
        Ok(())
    }
}

/// Never carries a context.
#[derive(Default, Clone)]
pub struct NullContextEditor {}

impl NullContextEditor {
    pub fn new() -> Self {
        NullContextEditor {}
    }
}

impl TransactionContextEditor for NullContextEditor {
    fn get(&self, _call: &MethodCall) -> Result<Option<TransactionContext>, InternalError> {
        Ok(None)
    }

    fn set(
        &self,
        _context: &TransactionContext,
        _call: &mut MethodCall,
    ) -> Result<(), InternalError> {
        Ok(())
    }
}

/// Context editors by id.
#[derive(Clone)]
pub struct ContextEditorRegistry {
    editors: HashMap<String, Arc<dyn TransactionContextEditor>>,
}

impl ContextEditorRegistry {
    /// Creates a registry with no editors.
    pub fn empty() -> Self {
        ContextEditorRegistry {
            editors: HashMap::new(),
        }
    }

    /// Creates a registry containing the attachment, argument and null editors.
    pub fn new() -> Self {
        ContextEditorRegistry::empty()
            .with_editor(ATTACHMENT_CONTEXT_EDITOR, Arc::new(AttachmentContextEditor::new()))
            .with_editor(ARGUMENT_CONTEXT_EDITOR, Arc::new(ArgumentContextEditor::new()))
            .with_editor(NULL_CONTEXT_EDITOR, Arc::new(NullContextEditor::new()))
    }

    pub fn with_editor(mut self, id: &str, editor: Arc<dyn TransactionContextEditor>) -> Self {
        self.editors.insert(id.into(), editor);
        self
    }

    pub fn get(&self, id: &str) -> Option<Arc<dyn TransactionContextEditor>> {
        self.editors.get(id).cloned()
    }
}

impl Default for ContextEditorRegistry {
    fn default() -> Self {
        ContextEditorRegistry::new()
    }
}
