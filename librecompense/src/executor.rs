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

//! Execution of asynchronous confirm and cancel replays.

use std::any::Any;

use rayon::{ThreadPool, ThreadPoolBuilder};

use crate::error::InternalError;

/// A unit of work handed to an [`AsyncExecutor`].
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Runs jobs on an execution context separate from the caller's.
pub trait AsyncExecutor: Send + Sync {
    /// Schedules `job` and returns without waiting for it.
    ///
    /// # Errors
    ///
    /// An [`InternalError`] is returned if the job could not be scheduled.
    fn execute(&self, job: Job) -> Result<(), InternalError>;
}

/// A bounded worker pool.
///
/// A job that panics is logged and dropped. The worker keeps serving later jobs, and the
/// transaction the job was completing stays stored for recovery.
pub struct ThreadPoolExecutor {
    pool: ThreadPool,
}

impl ThreadPoolExecutor {
    /// Starts a pool of `size` worker threads.
    ///
    /// # Errors
    ///
    /// An [`InternalError`] is returned if the worker threads cannot be started.
    pub fn new(size: usize) -> Result<Self, InternalError> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(size)
            .thread_name(|i| format!("tcc-terminate-{i}"))
            .panic_handler(log_panic)
            .build()
            .map_err(|e| InternalError::from_source(Box::new(e)))?;
        Ok(ThreadPoolExecutor { pool })
    }
}

impl AsyncExecutor for ThreadPoolExecutor {
    fn execute(&self, job: Job) -> Result<(), InternalError> {
        self.pool.spawn(job);
        Ok(())
    }
}

fn log_panic(payload: Box<dyn Any + Send>) {
    let message = payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string());
    error!("asynchronous job panicked: {}", message);
}
