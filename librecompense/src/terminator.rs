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

//! Replays persisted invocations against registered services.

use std::collections::HashMap;
use std::error::Error;
use std::sync::Arc;

use serde_json::Value;

use crate::context::TransactionContext;
use crate::editor::ContextEditorRegistry;
use crate::error::{InternalError, InvalidStateError, SystemError};
use crate::interceptor::Compensable;
use crate::invocation::{InvocationContext, MethodCall};

/// A registered method implementation.
pub type ServiceHandler =
    Arc<dyn Fn(MethodCall) -> Result<Value, Box<dyn Error>> + Send + Sync>;

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
struct MethodKey {
    target_type: String,
    method_name: String,
    parameter_types: Vec<String>,
}

/// Maps `(target type, method name, parameter types)` to a callable.
///
/// The registry is populated at startup and is read-only afterwards.
#[derive(Clone, Default)]
pub struct ServiceRegistry {
    methods: HashMap<MethodKey, ServiceHandler>,
}

impl ServiceRegistry {
    pub fn new() -> Self {
        ServiceRegistry {
            methods: HashMap::new(),
        }
    }

    pub fn with_method<F>(
        mut self,
        target_type: &str,
        method_name: &str,
        parameter_types: &[&str],
        handler: F,
    ) -> Self
    where
        F: Fn(MethodCall) -> Result<Value, Box<dyn Error>> + Send + Sync + 'static,
    {
        self.methods.insert(
            MethodKey {
                target_type: target_type.into(),
                method_name: method_name.into(),
                parameter_types: parameter_types.iter().map(|t| t.to_string()).collect(),
            },
            Arc::new(handler),
        );
        self
    }

    pub fn resolve(
        &self,
        target_type: &str,
        method_name: &str,
        parameter_types: &[String],
    ) -> Option<ServiceHandler> {
        self.methods
            .get(&MethodKey {
                target_type: target_type.into(),
                method_name: method_name.into(),
                parameter_types: parameter_types.to_vec(),
            })
            .cloned()
    }

    /// Checks that the confirm and cancel methods of a compensable declaration are registered
    /// with the given signature.
    ///
    /// # Errors
    ///
    /// An [`InvalidStateError`] naming the first missing method is returned.
    pub fn verify_compensable(
        &self,
        target_type: &str,
        parameter_types: &[&str],
        compensable: &Compensable,
    ) -> Result<(), InvalidStateError> {
        let parameter_types: Vec<String> = parameter_types.iter().map(|t| t.to_string()).collect();
        for method_name in [compensable.confirm_method(), compensable.cancel_method()] {
            if self
                .resolve(target_type, method_name, &parameter_types)
                .is_none()
            {
                return Err(InvalidStateError::with_message(format!(
                    "no method {target_type}::{method_name}({}) registered",
                    parameter_types.join(", ")
                )));
            }
        }
        Ok(())
    }
}

/// Turns a persisted invocation back into a live call.
#[derive(Clone)]
pub struct Terminator {
    services: Arc<ServiceRegistry>,
    editors: Arc<ContextEditorRegistry>,
}

impl Terminator {
    pub fn new(services: ServiceRegistry, editors: ContextEditorRegistry) -> Self {
        Terminator {
            services: Arc::new(services),
            editors: Arc::new(editors),
        }
    }

    /// Invokes the described method with its stored arguments, after stamping `context` on the
    /// call with the editor registered under `editor_id`.
    ///
    /// An invocation with an empty method name is a no-op returning `Value::Null`.
    ///
    /// # Errors
    ///
    /// A [`SystemError`] is returned if the method or the editor is not registered, if the
    /// context cannot be stamped, or if the method itself fails.
    pub fn invoke(
        &self,
        context: &TransactionContext,
        invocation: &InvocationContext,
        editor_id: &str,
    ) -> Result<Value, SystemError> {
        if invocation.method_name().is_empty() {
            return Ok(Value::Null);
        }

        let handler = self
            .services
            .resolve(
                invocation.target_type(),
                invocation.method_name(),
                invocation.parameter_types(),
            )
            .ok_or_else(|| {
                InternalError::with_message(format!(
                    "no method {}::{}({}) registered",
                    invocation.target_type(),
                    invocation.method_name(),
                    invocation.parameter_types().join(", ")
                ))
            })?;

        let editor = self.editors.get(editor_id).ok_or_else(|| {
            InternalError::with_message(format!("no context editor registered as {editor_id}"))
        })?;

        let mut call = invocation.to_call();
        editor.set(context, &mut call)?;

        debug!(
            "invoking {}::{} for transaction {}",
            invocation.target_type(),
            invocation.method_name(),
            context.xid()
        );

        handler(call).map_err(|e| SystemError::Internal(InternalError::from_source(e)))
    }
}
