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

//! An order service coordinating an inventory service and a payment service, each with its own
//! transaction store. Remote calls are modelled as direct calls carrying the transaction
//! context in their attachments.

#![cfg(all(feature = "repository-memory", feature = "recovery"))]

use std::collections::HashSet;
use std::error::Error;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use parking_lot::Mutex;
use serde_json::{json, Value};

use recompense::editor::{
    AttachmentContextEditor, TransactionContextEditor, ATTACHMENT_CONTEXT_EDITOR,
};
use recompense::error::{InternalError, TccError, TryError};
use recompense::interceptor::{Compensable, InterceptorChain};
use recompense::recovery::TransactionRecovery;
use recompense::repository::MemoryTransactionRepository;
use recompense::{
    AsyncExecutor, FixedTimeSource, Job, MethodCall, ServiceRegistry, TransactionConfigurator,
    TransactionConfiguratorBuilder, TransactionContext, TransactionScope, TransactionStatus, Xid,
};

type Log = Arc<Mutex<Vec<String>>>;

// Runs asynchronous confirm and cancel on the calling thread.
struct InlineExecutor;

impl AsyncExecutor for InlineExecutor {
    fn execute(&self, job: Job) -> Result<(), InternalError> {
        job();
        Ok(())
    }
}

fn recording_services(
    services: ServiceRegistry,
    target_type: &str,
    methods: &[&str],
    log: &Log,
) -> ServiceRegistry {
    methods.iter().fold(services, |services, method| {
        let log = log.clone();
        services.with_method(target_type, method, &["String"], move |call: MethodCall| {
            log.lock().push(format!("{}:{}", call.method_name(), call.args()[0]));
            Ok(Value::Null)
        })
    })
}

fn configurator(services: ServiceRegistry) -> Result<TransactionConfigurator, Box<dyn Error>> {
    Ok(TransactionConfiguratorBuilder::new()
        .with_repository(Arc::new(MemoryTransactionRepository::new()))
        .with_services(services)
        .with_executor(Arc::new(InlineExecutor))
        .build()?)
}

fn stored(configurator: &TransactionConfigurator) -> Result<usize, Box<dyn Error>> {
    Ok(configurator
        .transaction_repository()
        .find_all_unmodified_since(SystemTime::now() + Duration::from_secs(3600))?
        .len())
}

/// A remote service exposing one compensable Try method.
struct Provider {
    configurator: TransactionConfigurator,
    chain: InterceptorChain,
    compensable: Compensable,
    failure: Option<TryError>,
    log: Log,
    branches: Mutex<Vec<Xid>>,
}

impl Provider {
    fn new(
        target_type: &str,
        confirm_method: &str,
        cancel_method: &str,
        failure: Option<TryError>,
    ) -> Result<Arc<Self>, Box<dyn Error>> {
        let log = Log::default();
        let services = recording_services(
            ServiceRegistry::new(),
            target_type,
            &[confirm_method, cancel_method],
            &log,
        );
        let configurator = configurator(services)?;

        Ok(Arc::new(Provider {
            chain: configurator.interceptor_chain(),
            configurator,
            compensable: Compensable::new(confirm_method, cancel_method)
                .with_context_editor(ATTACHMENT_CONTEXT_EDITOR),
            failure,
            log,
            branches: Mutex::new(Vec::new()),
        }))
    }

    // Entry point of an incoming remote call. Every call starts from an empty scope.
    fn serve(&self, call: MethodCall) -> Result<Value, TccError> {
        let mut scope = TransactionScope::new();
        self.chain
            .invoke(&mut scope, &self.compensable, call, |scope, call| {
                if let Some(transaction) = scope.current() {
                    self.branches.lock().push(transaction.xid().clone());
                }
                match &self.failure {
                    Some(err) => Err(err.clone().into()),
                    None => Ok(json!(format!("done {}", call.args()[0]))),
                }
            })
    }
}

fn remote(
    provider: &Arc<Provider>,
) -> impl Fn(MethodCall) -> Result<Value, Box<dyn Error>> {
    let provider = provider.clone();
    move |call| {
        provider
            .serve(call)
            .map_err(|e| Box::new(e) as Box<dyn Error>)
    }
}

// A client-side stub: replaying its confirm or cancel repeats the remote call, which the
// provider recognizes by the propagated status.
fn stub(method: &str) -> Compensable {
    Compensable::new(method, method).with_context_editor(ATTACHMENT_CONTEXT_EDITOR)
}

struct OrderService {
    configurator: TransactionConfigurator,
    chain: InterceptorChain,
    inventory: Arc<Provider>,
    payment: Arc<Provider>,
    log: Log,
    root: Mutex<Option<Xid>>,
    participants: Mutex<Vec<Xid>>,
}

impl OrderService {
    fn new(inventory: Arc<Provider>, payment: Arc<Provider>) -> Result<Self, Box<dyn Error>> {
        let log = Log::default();
        let services = recording_services(
            ServiceRegistry::new(),
            "OrderService",
            &["confirmOrder", "cancelOrder"],
            &log,
        )
        .with_method("InventoryService", "reserve", &["String"], remote(&inventory))
        .with_method("PaymentService", "debit", &["String"], remote(&payment));
        let configurator = configurator(services)?;

        Ok(OrderService {
            chain: configurator.interceptor_chain(),
            configurator,
            inventory,
            payment,
            log,
            root: Mutex::new(None),
            participants: Mutex::new(Vec::new()),
        })
    }

    fn place_order(&self, compensable: &Compensable) -> Result<Value, TccError> {
        let mut scope = TransactionScope::new();
        let call = MethodCall::new(
            "OrderService",
            "placeOrder",
            vec!["String".into()],
            vec![json!("o-1")],
        );

        self.chain.invoke(&mut scope, compensable, call, |scope, call| {
            let reserve = MethodCall::new(
                "InventoryService",
                "reserve",
                vec!["String".into()],
                vec![json!("sku-1")],
            );
            self.chain
                .invoke(scope, &stub("reserve"), reserve, |_, call| self.inventory.serve(call))?;

            let debit = MethodCall::new(
                "PaymentService",
                "debit",
                vec!["String".into()],
                vec![json!("acct-1")],
            );
            self.chain
                .invoke(scope, &stub("debit"), debit, |_, call| self.payment.serve(call))?;

            if let Some(transaction) = scope.current() {
                *self.root.lock() = Some(transaction.xid().clone());
                *self.participants.lock() = transaction
                    .participants()
                    .iter()
                    .map(|p| p.xid().clone())
                    .collect();
            }

            Ok(call.args()[0].clone())
        })
    }
}

fn services(payment_failure: Option<TryError>) -> Result<OrderService, Box<dyn Error>> {
    let inventory = Provider::new("InventoryService", "confirmReserve", "cancelReserve", None)?;
    let payment = Provider::new("PaymentService", "confirmDebit", "cancelDebit", payment_failure)?;
    OrderService::new(inventory, payment)
}

fn order() -> Compensable {
    Compensable::new("confirmOrder", "cancelOrder")
}

#[test]
fn confirm_reaches_every_service_once() -> Result<(), Box<dyn Error>> {
    let orders = services(None)?;

    let value = orders.place_order(&order())?;

    assert_eq!(value, json!("o-1"));
    assert_eq!(*orders.log.lock(), vec!["confirmOrder:\"o-1\""]);
    assert_eq!(
        *orders.inventory.log.lock(),
        vec!["confirmReserve:\"sku-1\""]
    );
    assert_eq!(*orders.payment.log.lock(), vec!["confirmDebit:\"acct-1\""]);

    assert_eq!(stored(&orders.configurator)?, 0);
    assert_eq!(stored(&orders.inventory.configurator)?, 0);
    assert_eq!(stored(&orders.payment.configurator)?, 0);

    Ok(())
}

#[test]
fn participants_share_the_global_transaction_id() -> Result<(), Box<dyn Error>> {
    let orders = services(None)?;

    orders.place_order(&order())?;

    let root = orders.root.lock().clone().ok_or("no root transaction")?;
    let participants = orders.participants.lock().clone();
    assert_eq!(participants.len(), 3);

    let qualifiers: HashSet<[u8; 16]> = participants
        .iter()
        .map(|xid| *xid.branch_qualifier())
        .collect();
    assert_eq!(qualifiers.len(), 3);
    assert!(!qualifiers.contains(root.branch_qualifier()));

    for xid in participants
        .iter()
        .chain(orders.inventory.branches.lock().iter())
        .chain(orders.payment.branches.lock().iter())
    {
        assert_eq!(xid.global_transaction_id(), root.global_transaction_id());
    }

    // each provider's branch is the participant its stub was enlisted as
    assert_eq!(orders.inventory.branches.lock()[0], participants[1]);
    assert_eq!(orders.payment.branches.lock()[0], participants[2]);

    Ok(())
}

#[test]
fn failed_try_cancels_every_service() -> Result<(), Box<dyn Error>> {
    let orders = services(Some(TryError::new(
        "InsufficientFunds",
        "acct-1 cannot cover the order",
    )))?;

    let result = orders.place_order(&order());

    match result {
        Err(TccError::Try(err)) => assert_eq!(err.kind(), "InsufficientFunds"),
        other => panic!("unexpected result {:?}", other),
    }
    assert_eq!(*orders.log.lock(), vec!["cancelOrder:\"o-1\""]);
    assert_eq!(*orders.inventory.log.lock(), vec!["cancelReserve:\"sku-1\""]);
    assert_eq!(*orders.payment.log.lock(), vec!["cancelDebit:\"acct-1\""]);

    assert_eq!(stored(&orders.configurator)?, 0);
    assert_eq!(stored(&orders.inventory.configurator)?, 0);
    assert_eq!(stored(&orders.payment.configurator)?, 0);

    Ok(())
}

#[test]
fn redelivered_confirm_is_acknowledged_without_replay() -> Result<(), Box<dyn Error>> {
    let orders = services(None)?;
    orders.place_order(&order())?;

    let branch = orders.inventory.branches.lock()[0].clone();
    let mut call = MethodCall::new(
        "InventoryService",
        "reserve",
        vec!["String".into()],
        vec![json!("sku-1")],
    );
    AttachmentContextEditor::new().set(
        &TransactionContext::new(branch, TransactionStatus::Confirming),
        &mut call,
    )?;

    let value = orders.inventory.serve(call)?;

    assert_eq!(value, Value::Null);
    assert_eq!(
        *orders.inventory.log.lock(),
        vec!["confirmReserve:\"sku-1\""]
    );

    Ok(())
}

#[test]
fn asynchronous_confirm_and_cancel_complete() -> Result<(), Box<dyn Error>> {
    let orders = services(None)?;

    orders.place_order(&order().with_async_confirm(true))?;

    assert_eq!(*orders.log.lock(), vec!["confirmOrder:\"o-1\""]);
    assert_eq!(stored(&orders.configurator)?, 0);

    let orders = services(Some(TryError::new("Declined", "card declined")))?;

    assert!(orders
        .place_order(&order().with_async_cancel(true))
        .is_err());
    assert_eq!(*orders.log.lock(), vec!["cancelOrder:\"o-1\""]);
    assert_eq!(stored(&orders.configurator)?, 0);

    Ok(())
}

/// Test that a Try phase ending in a timeout leaves every transaction in place, and that
/// recovery later cancels the whole distributed transaction from the root.
#[test]
fn timed_out_try_is_cancelled_by_recovery() -> Result<(), Box<dyn Error>> {
    let orders = services(Some(
        TryError::new("RemoteError", "payment gateway failed")
            .with_cause(TryError::new("SocketTimeout", "read timed out")),
    ))?;

    assert!(orders.place_order(&order()).is_err());

    assert!(orders.log.lock().is_empty());
    assert_eq!(stored(&orders.configurator)?, 1);
    assert_eq!(stored(&orders.inventory.configurator)?, 1);
    assert_eq!(stored(&orders.payment.configurator)?, 1);

    let later = FixedTimeSource::new(SystemTime::now() + Duration::from_secs(600));

    // providers never decide for their branches
    let summary = TransactionRecovery::with_time_source(
        orders.payment.configurator.transaction_manager().clone(),
        orders.payment.configurator.recover_config().clone(),
        later.clone(),
    )
    .start_recover()?;
    assert_eq!(summary.skipped, 1);
    assert_eq!(stored(&orders.payment.configurator)?, 1);

    let summary = TransactionRecovery::with_time_source(
        orders.configurator.transaction_manager().clone(),
        orders.configurator.recover_config().clone(),
        later,
    )
    .start_recover()?;

    assert_eq!(summary.cancelled, 1);
    assert_eq!(*orders.log.lock(), vec!["cancelOrder:\"o-1\""]);
    assert_eq!(*orders.inventory.log.lock(), vec!["cancelReserve:\"sku-1\""]);
    assert_eq!(*orders.payment.log.lock(), vec!["cancelDebit:\"acct-1\""]);

    assert_eq!(stored(&orders.configurator)?, 0);
    assert_eq!(stored(&orders.inventory.configurator)?, 0);
    assert_eq!(stored(&orders.payment.configurator)?, 0);

    Ok(())
}
