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

use std::sync::Arc;

use crate::config::RecoverConfig;
use crate::editor::ContextEditorRegistry;
use crate::error::InvalidStateError;
use crate::executor::AsyncExecutor;
use crate::interceptor::InterceptorChain;
use crate::manager::{TransactionManager, TransactionManagerBuilder};
#[cfg(feature = "recovery")]
use crate::recovery::TransactionRecovery;
use crate::repository::TransactionRepository;
use crate::terminator::{ServiceRegistry, Terminator};

/// Everything one service needs to take part in compensable transactions.
pub struct TransactionConfigurator {
    manager: Arc<TransactionManager>,
    editors: ContextEditorRegistry,
    recover_config: RecoverConfig,
}

impl TransactionConfigurator {
    pub fn transaction_manager(&self) -> &Arc<TransactionManager> {
        &self.manager
    }

    pub fn transaction_repository(&self) -> &Arc<dyn TransactionRepository> {
        self.manager.repository()
    }

    pub fn recover_config(&self) -> &RecoverConfig {
        &self.recover_config
    }

    pub fn context_editors(&self) -> &ContextEditorRegistry {
        &self.editors
    }

    /// Returns an interceptor chain for this service, honoring the configured delay-cancel
    /// kinds.
    pub fn interceptor_chain(&self) -> InterceptorChain {
        InterceptorChain::new(
            self.manager.clone(),
            self.editors.clone(),
            self.recover_config.delay_cancel_exceptions().clone(),
        )
    }

    #[cfg(feature = "recovery")]
    pub fn transaction_recovery(&self) -> TransactionRecovery {
        TransactionRecovery::new(self.manager.clone(), self.recover_config.clone())
    }
}

#[derive(Default)]
pub struct TransactionConfiguratorBuilder {
    repository: Option<Arc<dyn TransactionRepository>>,
    services: Option<ServiceRegistry>,
    editors: Option<ContextEditorRegistry>,
    executor: Option<Arc<dyn AsyncExecutor>>,
    recover_config: Option<RecoverConfig>,
}

impl TransactionConfiguratorBuilder {
    pub fn new() -> Self {
        Self {
            repository: None,
            services: None,
            editors: None,
            executor: None,
            recover_config: None,
        }
    }

    pub fn with_repository(mut self, repository: Arc<dyn TransactionRepository>) -> Self {
        self.repository = Some(repository);
        self
    }

    /// The services whose confirm and cancel methods may be replayed.
    pub fn with_services(mut self, services: ServiceRegistry) -> Self {
        self.services = Some(services);
        self
    }

    /// Defaults to the attachment, argument and null editors.
    pub fn with_context_editors(mut self, editors: ContextEditorRegistry) -> Self {
        self.editors = Some(editors);
        self
    }

    pub fn with_executor(mut self, executor: Arc<dyn AsyncExecutor>) -> Self {
        self.executor = Some(executor);
        self
    }

    pub fn with_recover_config(mut self, recover_config: RecoverConfig) -> Self {
        self.recover_config = Some(recover_config);
        self
    }

    pub fn build(self) -> Result<TransactionConfigurator, InvalidStateError> {
        let repository = self
            .repository
            .ok_or_else(|| InvalidStateError::with_message("missing repository field".into()))?;

        let services = self
            .services
            .ok_or_else(|| InvalidStateError::with_message("missing services field".into()))?;

        let editors = self.editors.unwrap_or_default();
        let recover_config = self.recover_config.unwrap_or_default();

        let mut manager = TransactionManagerBuilder::new()
            .with_repository(repository)
            .with_terminator(Terminator::new(services, editors.clone()))
            .with_recover_config(&recover_config);
        if let Some(executor) = self.executor {
            manager = manager.with_executor(executor);
        }

        Ok(TransactionConfigurator {
            manager: Arc::new(manager.build()?),
            editors,
            recover_config,
        })
    }
}

#[cfg(all(test, feature = "repository-memory"))]
mod tests {
    use crate::config::RecoverConfigBuilder;
    use crate::repository::MemoryTransactionRepository;

    use super::*;

    #[test]
    fn build_with_defaults() {
        let configurator = TransactionConfiguratorBuilder::new()
            .with_repository(Arc::new(MemoryTransactionRepository::new()))
            .with_services(ServiceRegistry::new())
            .build()
            .unwrap();

        assert_eq!(configurator.recover_config(), &RecoverConfig::default());
        assert!(configurator
            .context_editors()
            .get(crate::editor::ATTACHMENT_CONTEXT_EDITOR)
            .is_some());
        assert!(configurator
            .transaction_repository()
            .find_by_xid(&crate::xid::Xid::new())
            .unwrap()
            .is_none());
    }

    #[test]
    fn build_keeps_recover_config() {
        let config = RecoverConfigBuilder::new()
            .with_max_retry_count(5)
            .build()
            .unwrap();

        let configurator = TransactionConfiguratorBuilder::new()
            .with_repository(Arc::new(MemoryTransactionRepository::new()))
            .with_services(ServiceRegistry::new())
            .with_recover_config(config.clone())
            .build()
            .unwrap();

        assert_eq!(configurator.recover_config(), &config);
    }

    #[test]
    fn build_requires_repository_and_services() {
        assert!(TransactionConfiguratorBuilder::new()
            .with_services(ServiceRegistry::new())
            .build()
            .is_err());
        assert!(TransactionConfiguratorBuilder::new()
            .with_repository(Arc::new(MemoryTransactionRepository::new()))
            .build()
            .is_err());
    }
}
