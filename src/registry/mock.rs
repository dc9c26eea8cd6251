//! Scriptable registry provider used by the scheduler tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::errors::Result;

use super::{Binding, RegistryProvider, RegistryToken};

/// Registry double returning pre-programmed fetch results.
///
/// Queued responses are consumed in order; once the script runs dry every
/// further fetch returns a token derived from the binding with the fixed
/// credential. Clones share the script and the call counter, so tests can
/// keep a handle after boxing the provider.
#[derive(Clone)]
pub struct MockRegistry {
    binding: Binding,
    auth: String,
    state: Arc<MockState>,
}

struct MockState {
    responses: Mutex<VecDeque<Result<RegistryToken>>>,
    fetch_calls: AtomicUsize,
}

impl MockRegistry {
    pub fn new(binding: Binding, auth: &str) -> Self {
        Self {
            binding,
            auth: auth.to_string(),
            state: Arc::new(MockState {
                responses: Mutex::new(VecDeque::new()),
                fetch_calls: AtomicUsize::new(0),
            }),
        }
    }

    /// Queue the outcome of the next `fetch_token` call
    pub fn push_response(&self, response: Result<RegistryToken>) {
        self.state
            .responses
            .lock()
            .expect("mock registry lock poisoned")
            .push_back(response);
    }

    /// Number of `fetch_token` calls made so far
    pub fn fetch_calls(&self) -> usize {
        self.state.fetch_calls.load(Ordering::SeqCst)
    }

    /// The token returned when no response is queued
    pub fn default_token(&self) -> RegistryToken {
        RegistryToken {
            secret_name: self.binding.secret_name.clone(),
            namespace: self.binding.namespace.clone(),
            auth: self.auth.clone(),
            registry_uri: self.binding.registry_uri.clone(),
        }
    }
}

#[async_trait]
impl RegistryProvider for MockRegistry {
    fn configure(&mut self) -> Result<()> {
        Ok(())
    }

    async fn fetch_token(&self) -> Result<RegistryToken> {
        self.state.fetch_calls.fetch_add(1, Ordering::SeqCst);
        let queued = self
            .state
            .responses
            .lock()
            .expect("mock registry lock poisoned")
            .pop_front();
        match queued {
            Some(response) => response,
            None => Ok(self.default_token()),
        }
    }
}
