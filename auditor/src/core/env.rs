//! Scoped environment overlay for spawned tools.
//!
//! The overlay is applied to every child process through `Command::envs`; the
//! auditor's own process environment is never touched.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

/// Environment variables layered over the inherited process environment.
///
/// Clones share the same overlay.
#[derive(Debug, Clone, Default)]
pub struct Environment {
    vars: Rc<RefCell<BTreeMap<String, String>>>,
}

impl Environment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.vars.borrow().get(key).cloned()
    }

    /// Current overlay contents.
    pub fn vars(&self) -> BTreeMap<String, String> {
        self.vars.borrow().clone()
    }

    /// Apply `overrides` until the returned guard is dropped.
    ///
    /// Each key returns to the value it had when this scope was entered, or is
    /// removed if it was absent. Scopes nest.
    #[must_use = "the overrides are reverted as soon as the scope is dropped"]
    pub fn scoped(&self, overrides: &BTreeMap<String, String>) -> EnvScope {
        let mut saved = Vec::with_capacity(overrides.len());
        {
            let mut vars = self.vars.borrow_mut();
            for (key, value) in overrides {
                saved.push((key.clone(), vars.insert(key.clone(), value.clone())));
            }
        }
        EnvScope {
            vars: Rc::clone(&self.vars),
            saved,
        }
    }

    /// `K=V ` prefix for rendering a command line, empty without overrides.
    pub fn render_prefix(&self) -> String {
        self.vars
            .borrow()
            .iter()
            .map(|(k, v)| format!("{k}={v} "))
            .collect()
    }
}

/// Guard returned by [`Environment::scoped`].
#[derive(Debug)]
pub struct EnvScope {
    vars: Rc<RefCell<BTreeMap<String, String>>>,
    saved: Vec<(String, Option<String>)>,
}

impl Drop for EnvScope {
    fn drop(&mut self) {
        let mut vars = self.vars.borrow_mut();
        for (key, previous) in self.saved.drain(..).rev() {
            match previous {
                Some(value) => vars.insert(key, value),
                None => vars.remove(&key),
            };
        }
    }
}
