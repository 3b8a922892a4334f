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

//! The compensable call protocol.
//!
//! A call to a compensable method passes through two interceptors before it reaches the
//! method body:
//!
//! 1. [`CompensableTransactionInterceptor`] decides whether the call starts a transaction, joins
//!    one propagated by a remote coordinator, or simply runs inside the current one, and drives
//!    the confirm or cancel decision when the call is a root.
//! 2. [`ResourceCoordinatorInterceptor`] enlists the call as a participant of the current
//!    transaction while it is trying.
//!
//! [`InterceptorChain`] composes the two in that order.

mod compensable;
mod compensable_interceptor;
mod method_type;
mod outcome;
mod resource_coordinator;

use std::collections::HashSet;
use std::sync::Arc;

use crate::editor::{ContextEditorRegistry, TransactionContextEditor};
use crate::error::{InvalidStateError, TccError};
use crate::invocation::MethodCall;
use crate::manager::{TransactionManager, TransactionScope};

pub use compensable::{Compensable, Propagation};
pub use compensable_interceptor::CompensableTransactionInterceptor;
pub use method_type::MethodType;
pub use outcome::TryOutcome;
pub use resource_coordinator::ResourceCoordinatorInterceptor;

fn context_editor(
    editors: &ContextEditorRegistry,
    compensable: &Compensable,
) -> Result<Arc<dyn TransactionContextEditor>, TccError> {
    editors.get(compensable.context_editor()).ok_or_else(|| {
        TccError::from(InvalidStateError::with_message(format!(
            "no context editor registered as {}",
            compensable.context_editor()
        )))
    })
}

/// Runs compensable calls through the transaction interceptor and then the resource coordinator.
pub struct InterceptorChain {
    compensable: CompensableTransactionInterceptor,
    coordinator: ResourceCoordinatorInterceptor,
}

impl InterceptorChain {
    pub fn new(
        manager: Arc<TransactionManager>,
        editors: ContextEditorRegistry,
        delay_cancel_exceptions: HashSet<String>,
    ) -> Self {
        InterceptorChain {
            compensable: CompensableTransactionInterceptor::new(
                manager.clone(),
                editors.clone(),
                delay_cancel_exceptions,
            ),
            coordinator: ResourceCoordinatorInterceptor::new(manager, editors),
        }
    }

    /// Invokes a compensable method.
    ///
    /// `proceed` is the method body. It receives the scope in which any nested compensable call
    /// must be made, along with the call as stamped by the interceptors.
    pub fn invoke<R, F>(
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
        self.compensable.intercept(scope, compensable, call, |scope, call| {
            self.coordinator.intercept(scope, compensable, call, proceed)
        })
    }
}

#[cfg(all(test, feature = "repository-memory"))]
mod tests {
    use std::error::Error;
    use std::time::{Duration, SystemTime};

    use parking_lot::Mutex;
    use serde_json::{json, Value};

    use crate::config::RecoverConfig;
    use crate::context::TransactionContext;
    use crate::editor::{ArgumentContextEditor, TRANSACTION_CONTEXT_PARAMETER};
    use crate::error::TryError;
    use crate::manager::TransactionManagerBuilder;
    use crate::repository::{MemoryTransactionRepository, TransactionRepository};
    use crate::status::TransactionStatus;
    use crate::terminator::{ServiceRegistry, Terminator};
    use crate::xid::Xid;

    use super::*;

    struct Fixture {
        repository: Arc<MemoryTransactionRepository>,
        chain: InterceptorChain,
        calls: Arc<Mutex<Vec<String>>>,
    }

    // An order service whose confirm and cancel methods record the order they were replayed
    // for.
    fn fixture() -> Fixture {
        let repository = Arc::new(MemoryTransactionRepository::new());
        let calls = Arc::new(Mutex::new(Vec::new()));

        let mut services = ServiceRegistry::new();
        for method in ["confirmOrder", "cancelOrder", "confirmLine", "cancelLine"] {
            let calls = calls.clone();
            services =
                services.with_method("OrderService", method, &["String"], move |call: MethodCall| {
                    calls
                        .lock()
                        .push(format!("{}:{}", call.method_name(), call.args()[0]));
                    Ok(Value::Null)
                });
        }

        let editors = ContextEditorRegistry::new();
        let manager = TransactionManagerBuilder::new()
            .with_repository(repository.clone())
            .with_terminator(Terminator::new(services, editors.clone()))
            .with_recover_config(&RecoverConfig::default())
            .build()
            .unwrap();

        Fixture {
            repository,
            chain: InterceptorChain::new(
                Arc::new(manager),
                editors,
                RecoverConfig::default().delay_cancel_exceptions().clone(),
            ),
            calls,
        }
    }

    fn place_order() -> (Compensable, MethodCall) {
        (
            Compensable::new("confirmOrder", "cancelOrder"),
            MethodCall::new(
                "OrderService",
                "placeOrder",
                vec!["String".into()],
                vec![json!("o-1")],
            ),
        )
    }

    #[test]
    fn root_success_confirms_every_participant() -> Result<(), Box<dyn Error>> {
        let f = fixture();
        let mut scope = TransactionScope::new();
        let (compensable, call) = place_order();
        let root_xid = Arc::new(Mutex::new(None));

        let seen = root_xid.clone();
        let value = f
            .chain
            .invoke(&mut scope, &compensable, call, |scope, call| {
                *seen.lock() = scope.current().map(|t| t.xid().clone());

                let line = Compensable::new("confirmLine", "cancelLine");
                let line_call = MethodCall::new(
                    "OrderService",
                    "addLine",
                    vec!["String".into()],
                    vec![json!("l-1")],
                );
                f.chain.invoke(scope, &line, line_call, |scope, _| {
                    assert_eq!(scope.current().map(|t| t.participants().len()), Some(2));
                    Ok(())
                })?;

                Ok(call.args()[0].clone())
            })?;

        assert_eq!(value, json!("o-1"));
        assert_eq!(
            *f.calls.lock(),
            vec!["confirmOrder:\"o-1\"", "confirmLine:\"l-1\""]
        );
        assert!(!scope.is_transaction_active());

        let xid = root_xid.lock().clone().ok_or("no root transaction")?;
        assert!(f.repository.find_by_xid(&xid)?.is_none());

        Ok(())
    }

    #[test]
    fn root_failure_cancels_and_returns_the_try_error() -> Result<(), Box<dyn Error>> {
        let f = fixture();
        let mut scope = TransactionScope::new();
        let (compensable, call) = place_order();

        let result: Result<(), TccError> =
            f.chain.invoke(&mut scope, &compensable, call, |_, _| {
                Err(TryError::new("OutOfStock", "no stock for o-1").into())
            });

        match result {
            Err(TccError::Try(err)) => assert_eq!(err.kind(), "OutOfStock"),
            other => panic!("unexpected result {:?}", other),
        }
        assert_eq!(*f.calls.lock(), vec!["cancelOrder:\"o-1\""]);
        assert!(f.repository.is_empty());
        assert!(!scope.is_transaction_active());

        Ok(())
    }

    #[test]
    fn delay_cancel_error_leaves_transaction_trying() -> Result<(), Box<dyn Error>> {
        let f = fixture();
        let mut scope = TransactionScope::new();
        let (compensable, call) = place_order();

        let result: Result<(), TccError> =
            f.chain.invoke(&mut scope, &compensable, call, |_, _| {
                Err(TryError::new("RemoteError", "inventory call failed")
                    .with_cause(TryError::new("SocketTimeout", "read timed out"))
                    .into())
            });

        assert!(matches!(result, Err(TccError::Try(_))));
        assert!(f.calls.lock().is_empty());

        let stored = f
            .repository
            .find_all_unmodified_since(SystemTime::now() + Duration::from_secs(60))?;
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].status(), TransactionStatus::Trying);
        assert_eq!(stored[0].participants().len(), 1);
        assert_eq!(stored[0].version(), 3);

        Ok(())
    }

    #[test]
    fn declaration_adds_delay_cancel_kinds() -> Result<(), Box<dyn Error>> {
        let f = fixture();
        let mut scope = TransactionScope::new();
        let (compensable, call) = place_order();
        let compensable = compensable.with_delay_cancel_exceptions(["GatewayTimeout"]);

        let result: Result<(), TccError> =
            f.chain.invoke(&mut scope, &compensable, call, |_, _| {
                Err(TryError::new("GatewayTimeout", "no answer").into())
            });

        assert!(result.is_err());
        assert!(f.calls.lock().is_empty());
        assert_eq!(f.repository.len(), 1);

        Ok(())
    }

    #[test]
    fn mandatory_without_transaction_fails_before_proceeding() {
        let f = fixture();
        let mut scope = TransactionScope::new();
        let (compensable, call) = place_order();
        let compensable = compensable.with_propagation(Propagation::Mandatory);

        let result: Result<(), TccError> =
            f.chain.invoke(&mut scope, &compensable, call, |_, _| panic!("proceeded"));

        assert!(matches!(result, Err(TccError::System(_))));
        assert!(f.repository.is_empty());
    }

    #[test]
    fn completed_provider_branch_is_acknowledged() -> Result<(), Box<dyn Error>> {
        let f = fixture();
        let mut scope = TransactionScope::new();
        let compensable = Compensable::new("confirmLine", "cancelLine");
        let mut call = MethodCall::new(
            "OrderService",
            "addLine",
            vec![TRANSACTION_CONTEXT_PARAMETER.into(), "String".into()],
            vec![Value::Null, json!("l-1")],
        );
        ArgumentContextEditor::new().set(
            &TransactionContext::new(Xid::new(), TransactionStatus::Confirming),
            &mut call,
        )?;

        let value: u32 = f
            .chain
            .invoke(&mut scope, &compensable, call, |_, _| panic!("proceeded"))?;

        assert_eq!(value, 0);
        assert!(f.calls.lock().is_empty());
        assert!(!scope.is_transaction_active());

        Ok(())
    }

    #[test]
    fn unknown_context_editor_is_rejected() {
        let f = fixture();
        let mut scope = TransactionScope::new();
        let (compensable, call) = place_order();
        let compensable = compensable.with_context_editor("grpc");

        let result: Result<(), TccError> =
            f.chain.invoke(&mut scope, &compensable, call, |_, _| Ok(()));

        assert!(matches!(result, Err(TccError::System(_))));
        assert!(f.repository.is_empty());
    }
}
