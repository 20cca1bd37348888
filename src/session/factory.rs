use std::sync::Arc;
use crate::executor::{new_executor, ExecutorType};
use crate::plugin::InterceptingExecutor;
use crate::storage::Driver;
use crate::transaction::DriverTransaction;
use super::config::Configuration;
use super::session::Session;

/// Opens sessions over one configuration and driver
pub struct SessionFactory {
    configuration: Arc<Configuration>,
    driver: Arc<dyn Driver>,
}

impl SessionFactory {
    pub fn new(configuration: Configuration, driver: Arc<dyn Driver>) -> Self {
        let settings = configuration.settings();
        tracing::info!(
            environment = %settings.environment,
            statements = configuration.statement_ids().len(),
            plugins = configuration.interceptor_chain().len(),
            cache_enabled = settings.cache_enabled,
            "session factory ready"
        );
        Self {
            configuration: Arc::new(configuration),
            driver,
        }
    }

    pub fn configuration(&self) -> &Arc<Configuration> {
        &self.configuration
    }

    /// Session with the configured executor type and auto-commit mode
    pub fn open_session(&self) -> Session {
        let settings = self.configuration.settings();
        self.open_session_with(settings.default_executor_type, settings.auto_commit)
    }

    pub fn open_session_with(&self, executor_type: ExecutorType, auto_commit: bool) -> Session {
        let transaction = DriverTransaction::new(Arc::clone(&self.driver), auto_commit);
        let executor = new_executor(
            executor_type,
            Box::new(transaction),
            &self.configuration.settings().executor_options(),
        );
        let executor = InterceptingExecutor::wrap(executor, self.configuration.interceptor_chain());
        tracing::debug!(?executor_type, auto_commit, "opened session");
        Session::new(Arc::clone(&self.configuration), executor, auto_commit)
    }
}

#[cfg(test)]
mod tests {
    use crate::executor::ExecutorType;
    use crate::session::test_support::factory;

    #[test]
    fn test_sessions_share_configuration() {
        let (factory, driver) = factory();
        let a = factory.open_session();
        let b = factory.open_session_with(ExecutorType::Reuse, true);
        assert!(std::ptr::eq(a.configuration(), b.configuration()));
        assert!(!a.is_auto_commit());
        assert!(b.is_auto_commit());
        assert_eq!(driver.stats().connections, 0);
    }
}
