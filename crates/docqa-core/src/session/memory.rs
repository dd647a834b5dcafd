use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::{StoredToken, TokenCallback, TokenStore, TokenStoreError};
use crate::observers::{ObserverList, Subscription};

#[derive(Default)]
struct Slot {
    token: Option<StoredToken>,
    generation: u64,
}

/// Process-local token store.
pub struct MemoryTokenStore {
    slot: Mutex<Slot>,
    observers: Arc<ObserverList<Option<StoredToken>>>,
}

impl Default for MemoryTokenStore {
    fn default() -> Self {
        Self {
            slot: Mutex::new(Slot::default()),
            observers: ObserverList::new(),
        }
    }
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(token: StoredToken) -> Self {
        let store = Self::default();
        store.lock().token = Some(token);
        store
    }

    fn lock(&self) -> MutexGuard<'_, Slot> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn replace(&self, token: Option<StoredToken>) {
        {
            let mut slot = self.lock();
            if slot.token == token {
                return;
            }
            slot.token = token.clone();
            slot.generation += 1;
        }
        self.observers.notify(&token);
    }
}

impl TokenStore for MemoryTokenStore {
    fn get_token(&self) -> Option<StoredToken> {
        self.lock().token.clone()
    }

    fn set_token(&self, token: StoredToken) -> Result<(), TokenStoreError> {
        self.replace(Some(token));
        Ok(())
    }

    fn clear_token(&self) -> Result<(), TokenStoreError> {
        self.replace(None);
        Ok(())
    }

    fn generation(&self) -> u64 {
        self.lock().generation
    }

    fn on_change(&self, callback: TokenCallback) -> Subscription {
        self.observers
            .register(Arc::new(move |token: &Option<StoredToken>| callback(token.as_ref())))
    }
}

impl std::fmt::Debug for MemoryTokenStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let slot = self.lock();
        f.debug_struct("MemoryTokenStore")
            .field("has_token", &slot.token.is_some())
            .field("generation", &slot.generation)
            .finish()
    }
}
