//! Exported process variables.
//!
//! # Responsibilities
//! - Keep a registry of named variables (counters, computed values)
//! - Produce a read-only snapshot for the vars endpoint
//!
//! # Design Decisions
//! - The endpoint depends on [`VarsProvider`], not on this registry, so any
//!   source of key/value pairs can be exported
//! - Names are unique; publishing a name twice is an error
//! - Snapshots are sorted by name

use dashmap::{mapref::entry::Entry, DashMap};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Read-only source of exported variables.
pub trait VarsProvider: Send + Sync {
    /// Current value of every variable, keyed by name.
    fn snapshot(&self) -> BTreeMap<String, Value>;
}

impl VarsProvider for BTreeMap<String, Value> {
    fn snapshot(&self) -> BTreeMap<String, Value> {
        self.clone()
    }
}

/// A single exported variable.
pub trait Var: Send + Sync {
    fn value(&self) -> Value;
}

#[derive(Debug, thiserror::Error)]
pub enum VarsError {
    #[error("reuse of exported var name: {0}")]
    Duplicate(String),
}

/// Integer counter. Clones share the same value.
#[derive(Debug, Clone, Default)]
pub struct Counter(Arc<AtomicI64>);

impl Counter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, delta: i64) {
        self.0.fetch_add(delta, Ordering::Relaxed);
    }

    pub fn increment(&self) {
        self.add(1);
    }

    pub fn set(&self, value: i64) {
        self.0.store(value, Ordering::Relaxed);
    }

    pub fn get(&self) -> i64 {
        self.0.load(Ordering::Relaxed)
    }
}

impl Var for Counter {
    fn value(&self) -> Value {
        Value::from(self.get())
    }
}

/// A variable computed on every snapshot.
pub struct Func(Box<dyn Fn() -> Value + Send + Sync>);

impl Func {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn() -> Value + Send + Sync + 'static,
    {
        Self(Box::new(f))
    }
}

impl Var for Func {
    fn value(&self) -> Value {
        (self.0)()
    }
}

impl fmt::Debug for Func {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Func(..)")
    }
}

/// Registry of exported variables. Clones share one registry.
#[derive(Clone, Default)]
pub struct Vars {
    vars: Arc<DashMap<String, Arc<dyn Var>>>,
}

impl Vars {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry exporting `cmdline` and `uptime_seconds`.
    pub fn with_process_defaults() -> Self {
        let vars = Self::new();
        let started = Instant::now();
        // The registry is empty, so these names cannot collide.
        let _ = vars.publish(
            "cmdline",
            Func::new(|| Value::from(std::env::args().collect::<Vec<_>>())),
        );
        let _ = vars.publish(
            "uptime_seconds",
            Func::new(move || Value::from(started.elapsed().as_secs_f64())),
        );
        vars
    }

    /// Export `var` under `name`.
    pub fn publish<V>(&self, name: impl Into<String>, var: V) -> Result<(), VarsError>
    where
        V: Var + 'static,
    {
        match self.vars.entry(name.into()) {
            Entry::Occupied(entry) => Err(VarsError::Duplicate(entry.key().clone())),
            Entry::Vacant(entry) => {
                tracing::debug!(name = %entry.key(), "Exported var published");
                entry.insert(Arc::new(var));
                Ok(())
            }
        }
    }

    /// Create and export a new counter.
    pub fn counter(&self, name: impl Into<String>) -> Result<Counter, VarsError> {
        let counter = Counter::new();
        self.publish(name, counter.clone())?;
        Ok(counter)
    }

    /// Current value of a single variable.
    pub fn get(&self, name: &str) -> Option<Value> {
        self.vars.get(name).map(|var| var.value().value())
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }
}

impl VarsProvider for Vars {
    fn snapshot(&self) -> BTreeMap<String, Value> {
        self.vars
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().value()))
            .collect()
    }
}

impl fmt::Debug for Vars {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Vars").field("len", &self.vars.len()).finish()
    }
}
