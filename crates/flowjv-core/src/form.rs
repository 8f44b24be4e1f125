//! Form facade: one schema, one store, one router.

use crate::config::FormConfig;
use crate::error::FlowError;
use crate::logic::Operators;
use crate::path::Path;
use crate::schema::Schema;
use crate::store::{Changes, Store};
use crate::subscribe::{Router, SubscriptionId};
use serde_json::Value;
use tracing::debug;

/// A live form instance.
///
/// Mutations revalidate synchronously and notify subscribers before they
/// return. Callbacks receive the settled store read-only.
#[derive(Debug)]
pub struct Form {
    store: Store,
    router: Router,
}

impl Form {
    /// Load `schema` with the built-in operators only.
    pub fn new(schema: &Value, initial: Option<Value>, config: FormConfig) -> Result<Self, FlowError> {
        Self::with_operators(schema, &Operators::new(), initial, config)
    }

    pub fn with_operators(
        schema: &Value,
        operators: &Operators,
        initial: Option<Value>,
        config: FormConfig,
    ) -> Result<Self, FlowError> {
        let schema = Schema::from_json(schema, operators)?;
        Ok(Self::from_schema(schema, initial, config))
    }

    pub fn from_schema(schema: Schema, initial: Option<Value>, config: FormConfig) -> Self {
        debug!(nodes = schema.len(), rules = schema.rule_count(), "form created");
        Self {
            store: Store::new(schema, initial, config),
            router: Router::new(),
        }
    }

    pub fn schema(&self) -> &Schema {
        self.store.schema()
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn data(&self) -> &Value {
        self.store.data()
    }

    pub fn get(&self, path: &Path) -> Option<&Value> {
        self.store.get(path)
    }

    pub fn errors(&self, path: &Path) -> &[String] {
        self.store.errors(path)
    }

    pub fn is_touched(&self, path: &Path) -> bool {
        self.store.is_touched(path)
    }

    /// No error at any path.
    pub fn is_valid(&self) -> bool {
        self.store.error_entries().next().is_none()
    }

    pub fn set(&mut self, path: &Path, value: Value) -> Result<(), FlowError> {
        let changes = self.store.set(path, value)?;
        self.notify(&changes);
        Ok(())
    }

    pub fn mark_touched(&mut self, path: &Path, touched: bool) -> Result<(), FlowError> {
        let changes = self.store.mark_touched(path, touched)?;
        self.notify(&changes);
        Ok(())
    }

    pub fn touch_all(&mut self) {
        let changes = self.store.touch_all();
        self.notify(&changes);
    }

    pub fn reset(&mut self, initial: Value) {
        let changes = self.store.reset(initial);
        self.notify(&changes);
    }

    pub fn subscribe<F>(&mut self, path: Path, callback: F) -> SubscriptionId
    where
        F: FnMut(&Path, &Store) + Send + 'static,
    {
        self.router.subscribe(path, callback)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.router.unsubscribe(id)
    }

    fn notify(&mut self, changes: &Changes) {
        let fired = self.router.dispatch(changes, &self.store);
        if fired > 0 {
            debug!(fired, "subscribers notified");
        }
    }
}
