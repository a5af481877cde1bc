//! HTTP API.
pub mod activation;
pub mod register;
pub mod status;
pub mod users;

/// Application state backed by an in-memory store.
///
/// MUST NEVER be used in production.
#[cfg(test)]
pub fn state(
    store: std::sync::Arc<crate::account::MemoryUserStore>,
) -> crate::AppState {
    use std::sync::Arc;

    use crate::account::{AccountService, ActivationLink};
    use crate::config::Configuration;
    use crate::mail::MailManager;
    use crate::template::Templates;

    let mut config = Configuration::default();
    config.url = "http://localhost:8080/".into();
    config.context_path = "/community".into();

    let accounts = AccountService::new(
        store,
        Arc::new(MailManager::default()),
        Arc::new(Templates::default()),
        ActivationLink::new(config.domain(), &config.context_path),
    );

    crate::AppState {
        config: Arc::new(config),
        accounts,
        metrics: None,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::account::MemoryUserStore;

    #[test]
    fn test_state_keeps_config_defaults() {
        let state = super::state(Arc::new(MemoryUserStore::new()));

        assert_eq!(state.config.domain(), "http://localhost:8080");
        assert_eq!(state.config.context_path, "/community");
        assert_eq!(state.config.version(), env!("CARGO_PKG_VERSION"));
        assert_eq!(state.config.port, 8080);
    }
}
