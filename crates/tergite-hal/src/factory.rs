//! Providers for every saved account, retrievable by service name.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::account::{AccountInfo, AccountStore};
use crate::error::{HalError, HalResult};
use crate::provider::Provider;
use crate::transport::Transport;

/// Providers keyed by service name, in the order they were added.
pub struct ProviderFactory {
    store: AccountStore,
    transport: Option<Arc<dyn Transport>>,
    providers: Vec<(String, Arc<Provider>)>,
}

impl fmt::Debug for ProviderFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderFactory")
            .field("store", &self.store)
            .field("providers", &self.providers())
            .finish_non_exhaustive()
    }
}

impl ProviderFactory {
    /// An empty factory over `store`. Call [`load_accounts`](Self::load_accounts)
    /// to populate it from the file.
    pub fn new(store: AccountStore) -> Self {
        Self {
            store,
            transport: None,
            providers: Vec::new(),
        }
    }

    /// Share one transport between all providers instead of opening an HTTP
    /// client per account.
    pub fn with_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn store(&self) -> &AccountStore {
        &self.store
    }

    fn build(&self, account: AccountInfo) -> HalResult<Provider> {
        match &self.transport {
            Some(transport) => Ok(Provider::with_transport(account, Arc::clone(transport))),
            None => Provider::new(account),
        }
    }

    fn insert(&mut self, provider: Provider) -> Arc<Provider> {
        let name = provider.service_name().to_string();
        let provider = Arc::new(provider);
        match self.providers.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = Arc::clone(&provider),
            None => self.providers.push((name, Arc::clone(&provider))),
        }
        provider
    }

    /// Create a provider for every account in the store. Returns how many
    /// were loaded.
    pub fn load_accounts(&mut self) -> HalResult<usize> {
        let accounts = self.store.load()?;
        if accounts.is_empty() {
            warn!(
                path = %self.store.path().display(),
                "No stored provider account found"
            );
        }
        let count = accounts.len();
        for account in accounts {
            let provider = self.build(account)?;
            self.insert(provider);
        }
        debug!(count, "loaded provider accounts");
        Ok(count)
    }

    /// Add (or replace) the provider for `account`, optionally saving the
    /// account to the store first.
    pub fn use_provider_account(
        &mut self,
        account: AccountInfo,
        save: bool,
    ) -> HalResult<Arc<Provider>> {
        if save {
            self.store.save(std::slice::from_ref(&account))?;
        }
        let provider = self.build(account)?;
        Ok(self.insert(provider))
    }

    /// Service names of the loaded providers.
    pub fn providers(&self) -> Vec<&str> {
        self.providers.iter().map(|(n, _)| n.as_str()).collect()
    }

    /// The provider named `service_name`, or the first one when the name is
    /// not given or not found.
    pub fn get_provider(&self, service_name: Option<&str>) -> HalResult<Arc<Provider>> {
        let (_, first) = self.providers.first().ok_or(HalError::NoProvider)?;
        let found = service_name
            .and_then(|name| self.providers.iter().find(|(n, _)| n == name))
            .map(|(_, p)| p);
        Ok(Arc::clone(found.unwrap_or(first)))
    }
}
