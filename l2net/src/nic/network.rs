use std::collections::HashMap;
use std::sync::Arc;

use crate::layer::{Error, Result};
use super::{Adapter, Link};

/// The adapters available to sessions, by name.
///
/// Passed explicitly to whatever constructs sessions.
#[derive(Default)]
pub struct Network {
    adapters: HashMap<String, Arc<Adapter>>,
}

impl Network {
    /// A network without adapters.
    pub fn new() -> Self {
        Network::default()
    }

    /// Register an adapter on `link`, replacing any adapter of the same name.
    pub fn add(&mut self, name: &str, link: Arc<dyn Link>) -> Arc<Adapter> {
        let adapter = Arc::new(Adapter::new(name, link));
        self.adapters.insert(name.to_string(), Arc::clone(&adapter));
        adapter
    }

    /// Look up an adapter by name.
    pub fn adapter(&self, name: &str) -> Result<&Arc<Adapter>> {
        self.adapters
            .get(name)
            .ok_or_else(|| Error::UnknownAdapter(name.to_string()))
    }

    /// Iterate over all adapters.
    pub fn adapters(&self) -> impl Iterator<Item=&Arc<Adapter>> + '_ {
        self.adapters.values()
    }
}
