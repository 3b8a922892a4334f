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

//! Live and durable descriptions of a method call.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A call in flight through the interceptor chain.
///
/// `attachments` models the out-of-band metadata an RPC transport carries next to the
/// arguments; context editors may use it to propagate a `TransactionContext`.
#[derive(Clone, Debug, PartialEq)]
pub struct MethodCall {
    target_type: String,
    method_name: String,
    parameter_types: Vec<String>,
    args: Vec<Value>,
    attachments: BTreeMap<String, String>,
}

impl MethodCall {
    pub fn new(
        target_type: &str,
        method_name: &str,
        parameter_types: Vec<String>,
        args: Vec<Value>,
    ) -> Self {
        MethodCall {
            target_type: target_type.into(),
            method_name: method_name.into(),
            parameter_types,
            args,
            attachments: BTreeMap::new(),
        }
    }

    pub fn target_type(&self) -> &str {
        &self.target_type
    }

    pub fn method_name(&self) -> &str {
        &self.method_name
    }

    pub fn parameter_types(&self) -> &[String] {
        &self.parameter_types
    }

    pub fn args(&self) -> &[Value] {
        &self.args
    }

    pub fn args_mut(&mut self) -> &mut Vec<Value> {
        &mut self.args
    }

    pub fn attachment(&self, key: &str) -> Option<&str> {
        self.attachments.get(key).map(String::as_str)
    }

    pub fn set_attachment(&mut self, key: &str, value: String) {
        self.attachments.insert(key.into(), value);
    }

    pub fn attachments(&self) -> &BTreeMap<String, String> {
        &self.attachments
    }
}

/// A durable description of a call to replay later.
///
/// This is plain data so that a confirm or cancel action survives a process restart.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InvocationContext {
    target_type: String,
    method_name: String,
    parameter_types: Vec<String>,
    args: Vec<Value>,
}

impl InvocationContext {
    pub fn new(
        target_type: &str,
        method_name: &str,
        parameter_types: Vec<String>,
        args: Vec<Value>,
    ) -> Self {
        InvocationContext {
            target_type: target_type.into(),
            method_name: method_name.into(),
            parameter_types,
            args,
        }
    }

    /// Describes a call to `method_name` on the same target, with the same signature and
    /// arguments, as `call`.
    pub fn from_call(call: &MethodCall, method_name: &str) -> Self {
        InvocationContext::new(
            call.target_type(),
            method_name,
            call.parameter_types().to_vec(),
            call.args().to_vec(),
        )
    }

    pub fn target_type(&self) -> &str {
        &self.target_type
    }

    pub fn method_name(&self) -> &str {
        &self.method_name
    }

    pub fn parameter_types(&self) -> &[String] {
        &self.parameter_types
    }

    pub fn args(&self) -> &[Value] {
        &self.args
    }

    /// Turns the description back into a live call without attachments.
    pub fn to_call(&self) -> MethodCall {
        MethodCall::new(
            &self.target_type,
            &self.method_name,
            self.parameter_types.clone(),
            self.args.clone(),
        )
    }
}
