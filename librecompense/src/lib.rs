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

#[macro_use]
extern crate log;

mod config;
mod configurator;
mod context;
pub mod editor;
pub mod error;
mod executor;
pub mod interceptor;
mod invocation;
mod manager;
mod participant;
#[cfg(feature = "recovery")]
pub mod recovery;
pub mod repository;
mod status;
mod terminator;
mod time;
mod transaction;
mod xid;

pub use config::{RecoverConfig, RecoverConfigBuilder, DEFAULT_DELAY_CANCEL_EXCEPTIONS};
pub use configurator::{TransactionConfigurator, TransactionConfiguratorBuilder};
pub use context::TransactionContext;
pub use executor::{AsyncExecutor, Job, ThreadPoolExecutor};
pub use invocation::{InvocationContext, MethodCall};
pub use manager::{TransactionManager, TransactionManagerBuilder, TransactionScope};
pub use participant::Participant;
pub use status::{TransactionStatus, TransactionType};
pub use terminator::{ServiceHandler, ServiceRegistry, Terminator};
pub use time::{FixedTimeSource, SystemTimeFactory, TimeSource};
pub use transaction::Transaction;
pub use xid::Xid;
