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
use std::time::Duration;

use crate::error::InvalidStateError;

const DEFAULT_MAX_RETRY_COUNT: u32 = 30;
const DEFAULT_RECOVER_DURATION_SECONDS: u64 = 120;
const DEFAULT_CRON_EXPRESSION: &str = "0 */1 * * * ?";
const DEFAULT_ASYNC_TERMINATE_THREAD_POOL_SIZE: usize = 16;

/// Error kinds which defer the confirm/cancel decision to recovery unless configured otherwise.
pub const DEFAULT_DELAY_CANCEL_EXCEPTIONS: [&str; 2] = ["OptimisticLock", "SocketTimeout"];

/// Settings shared by the coordinator and the recovery job.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecoverConfig {
    max_retry_count: u32,
    recover_duration: Duration,
    cron_expression: String,
    delay_cancel_exceptions: HashSet<String>,
    async_terminate_thread_pool_size: usize,
}

impl RecoverConfig {
    /// Retries after which recovery stops redriving a transaction.
    pub fn max_retry_count(&self) -> u32 {
        self.max_retry_count
    }

    /// How long a transaction must be unmodified before recovery touches it.
    pub fn recover_duration(&self) -> Duration {
        self.recover_duration
    }

    /// The schedule on which the host should run recovery.
    pub fn cron_expression(&self) -> &str {
        &self.cron_expression
    }

    pub fn delay_cancel_exceptions(&self) -> &HashSet<String> {
        &self.delay_cancel_exceptions
    }

    pub fn async_terminate_thread_pool_size(&self) -> usize {
        self.async_terminate_thread_pool_size
    }
}

impl Default for RecoverConfig {
    fn default() -> Self {
        RecoverConfig {
            max_retry_count: DEFAULT_MAX_RETRY_COUNT,
            recover_duration: Duration::from_secs(DEFAULT_RECOVER_DURATION_SECONDS),
            cron_expression: DEFAULT_CRON_EXPRESSION.into(),
            delay_cancel_exceptions: DEFAULT_DELAY_CANCEL_EXCEPTIONS
                .iter()
                .map(|kind| kind.to_string())
                .collect(),
            async_terminate_thread_pool_size: DEFAULT_ASYNC_TERMINATE_THREAD_POOL_SIZE,
        }
    }
}

#[derive(Default)]
pub struct RecoverConfigBuilder {
    max_retry_count: Option<u32>,
    recover_duration: Option<Duration>,
    cron_expression: Option<String>,
    delay_cancel_exceptions: Option<HashSet<String>>,
    async_terminate_thread_pool_size: Option<usize>,
}

impl RecoverConfigBuilder {
    pub fn new() -> Self {
        Self {
            max_retry_count: None,
            recover_duration: None,
            cron_expression: None,
            delay_cancel_exceptions: None,
            async_terminate_thread_pool_size: None,
        }
    }

    pub fn with_max_retry_count(mut self, max_retry_count: u32) -> Self {
        self.max_retry_count = Some(max_retry_count);
        self
    }

    pub fn with_recover_duration(mut self, recover_duration: Duration) -> Self {
        self.recover_duration = Some(recover_duration);
        self
    }

    pub fn with_cron_expression(mut self, cron_expression: &str) -> Self {
        self.cron_expression = Some(cron_expression.into());
        self
    }

    /// Replaces the default delay-cancel kinds.
    pub fn with_delay_cancel_exceptions<I, S>(mut self, kinds: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.delay_cancel_exceptions = Some(kinds.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_async_terminate_thread_pool_size(mut self, size: usize) -> Self {
        self.async_terminate_thread_pool_size = Some(size);
        self
    }

    pub fn build(self) -> Result<RecoverConfig, InvalidStateError> {
        let defaults = RecoverConfig::default();

        let recover_duration = self.recover_duration.unwrap_or(defaults.recover_duration);
        if recover_duration.is_zero() {
            return Err(InvalidStateError::with_message(
                "recover_duration must be greater than zero".into(),
            ));
        }

        let async_terminate_thread_pool_size = self
            .async_terminate_thread_pool_size
            .unwrap_or(defaults.async_terminate_thread_pool_size);
        if async_terminate_thread_pool_size == 0 {
            return Err(InvalidStateError::with_message(
                "async_terminate_thread_pool_size must be greater than zero".into(),
            ));
        }

        Ok(RecoverConfig {
            max_retry_count: self.max_retry_count.unwrap_or(defaults.max_retry_count),
            recover_duration,
            cron_expression: self.cron_expression.unwrap_or(defaults.cron_expression),
            delay_cancel_exceptions: self
                .delay_cancel_exceptions
                .unwrap_or(defaults.delay_cancel_exceptions),
            async_terminate_thread_pool_size,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_defaults_match_default_config() {
        let config = RecoverConfigBuilder::new().build().unwrap();

        assert_eq!(config, RecoverConfig::default());
        assert_eq!(config.max_retry_count(), 30);
        assert_eq!(config.recover_duration(), Duration::from_secs(120));
        assert_eq!(config.cron_expression(), "0 */1 * * * ?");
        assert!(config.delay_cancel_exceptions().contains("OptimisticLock"));
        assert!(config.delay_cancel_exceptions().contains("SocketTimeout"));
    }

    #[test]
    fn build_overrides() {
        let config = RecoverConfigBuilder::new()
            .with_max_retry_count(3)
            .with_recover_duration(Duration::from_secs(5))
            .with_cron_expression("*/5 * * * * ?")
            .with_delay_cancel_exceptions(["Timeout"])
            .with_async_terminate_thread_pool_size(2)
            .build()
            .unwrap();

        assert_eq!(config.max_retry_count(), 3);
        assert_eq!(config.recover_duration(), Duration::from_secs(5));
        assert_eq!(config.cron_expression(), "*/5 * * * * ?");
        assert_eq!(config.delay_cancel_exceptions().len(), 1);
        assert!(config.delay_cancel_exceptions().contains("Timeout"));
        assert_eq!(config.async_terminate_thread_pool_size(), 2);
    }

    #[test]
    fn build_rejects_zero_values() {
        assert!(RecoverConfigBuilder::new()
            .with_async_terminate_thread_pool_size(0)
            .build()
            .is_err());
        assert!(RecoverConfigBuilder::new()
            .with_recover_duration(Duration::ZERO)
            .build()
            .is_err());
    }
}
