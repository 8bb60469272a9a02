//! Category → processor registration table.
//!
//! Built once at startup and shared read-only by every connection.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::dispatch::classify::RequestCategory;
use crate::dispatch::processor::ProcessorFactory;

/// Immutable table of registered processors.
#[derive(Clone, Default)]
pub struct ProcessorRegistry {
    factories: HashMap<RequestCategory, Arc<dyn ProcessorFactory>>,
}

impl ProcessorRegistry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    /// Processor bound to `category`, if any.
    pub fn get(&self, category: RequestCategory) -> Option<&Arc<dyn ProcessorFactory>> {
        self.factories.get(&category)
    }

    /// Registered categories, in declaration order.
    pub fn categories(&self) -> Vec<RequestCategory> {
        RequestCategory::ALL
            .into_iter()
            .filter(|category| self.factories.contains_key(category))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}

impl fmt::Debug for ProcessorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for category in self.categories() {
            if let Some(factory) = self.factories.get(&category) {
                map.entry(&category, &factory.name());
            }
        }
        map.finish()
    }
}

/// Builder for [`ProcessorRegistry`].
#[derive(Default)]
pub struct RegistryBuilder {
    factories: HashMap<RequestCategory, Arc<dyn ProcessorFactory>>,
}

impl RegistryBuilder {
    /// Bind `factory` to `category`. A later registration replaces an earlier one.
    pub fn register(mut self, category: RequestCategory, factory: impl ProcessorFactory) -> Self {
        self.register_shared(category, Arc::new(factory));
        self
    }

    /// Bind an already shared factory, e.g. one serving several categories.
    pub fn register_arc(
        mut self,
        category: RequestCategory,
        factory: Arc<dyn ProcessorFactory>,
    ) -> Self {
        self.register_shared(category, factory);
        self
    }

    fn register_shared(&mut self, category: RequestCategory, factory: Arc<dyn ProcessorFactory>) {
        let name = factory.name().to_owned();
        if let Some(previous) = self.factories.insert(category, factory) {
            tracing::warn!(
                %category,
                previous = previous.name(),
                replacement = %name,
                "Processor registration replaced"
            );
        }
    }

    pub fn build(self) -> ProcessorRegistry {
        ProcessorRegistry {
            factories: self.factories,
        }
    }
}
