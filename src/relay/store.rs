use std::collections::HashMap;
use std::sync::Mutex;

use serde_json::Value;

/// Opaque key/value store the page context uses through the relay to keep
/// small bits of state alive across navigations (e.g. the last issued
/// command). String keys to arbitrary JSON values; no schema beyond that.
#[derive(Debug, Default)]
pub struct VarStore {
    vars: Mutex<HashMap<String, Value>>,
}

impl VarStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, key: &str, value: Value) {
        self.vars.lock().unwrap().insert(key.to_string(), value);
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.vars.lock().unwrap().get(key).cloned()
    }

    pub fn clear(&self, key: &str) -> bool {
        self.vars.lock().unwrap().remove(key).is_some()
    }
}
