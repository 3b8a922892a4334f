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

use crate::context::TransactionContext;

use super::Propagation;

/// The role an intercepted call plays in a transaction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MethodType {
    /// Starts a new distributed transaction.
    Root,
    /// A branch invoked by a remote coordinator.
    Provider,
    /// A plain call inside an active transaction.
    Normal,
}

impl MethodType {
    pub fn calculate(
        propagation: Propagation,
        is_transaction_active: bool,
        context: Option<&TransactionContext>,
    ) -> Self {
        match (context, propagation) {
            (Some(_), _) => MethodType::Provider,
            (None, Propagation::RequiresNew) => MethodType::Root,
            (None, _) if !is_transaction_active => MethodType::Root,
            (None, _) => MethodType::Normal,
        }
    }

    /// Returns false when a mandatory call has neither an active nor a propagated transaction.
    pub fn is_legal(
        propagation: Propagation,
        is_transaction_active: bool,
        context: Option<&TransactionContext>,
    ) -> bool {
        !(propagation == Propagation::Mandatory && !is_transaction_active && context.is_none())
    }
}
