use std::sync::Arc;

use crate::account::AccountService;
use crate::store::AccountStore;
use crate::transfer::TransferCoordinator;

/// Gateway application state (shared)
pub struct AppState<S> {
    pub store: Arc<S>,
    pub accounts: AccountService<S>,
    pub transfers: TransferCoordinator<S>,
}

impl<S: AccountStore> AppState<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self {
            accounts: AccountService::new(Arc::clone(&store)),
            transfers: TransferCoordinator::new(Arc::clone(&store)),
            store,
        }
    }
}
