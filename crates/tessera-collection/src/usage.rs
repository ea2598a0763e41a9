//! Reverse index of custom element usage.

use std::collections::{BTreeSet, HashMap};

/// Which custom element names each item uses, and which items use each name.
#[derive(Debug, Clone, Default)]
pub struct UsageIndex {
    by_user: HashMap<String, BTreeSet<String>>,
    by_name: HashMap<String, BTreeSet<String>>,
}

impl UsageIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `user` references the custom element `name`.
    pub fn record_use(&mut self, user: &str, name: &str) {
        self.by_user
            .entry(user.to_string())
            .or_default()
            .insert(name.to_string());
        self.by_name
            .entry(name.to_string())
            .or_default()
            .insert(user.to_string());
    }

    /// Remove a single `user` → `name` edge.
    pub fn forget_use(&mut self, user: &str, name: &str) {
        if let Some(names) = self.by_user.get_mut(user) {
            names.remove(name);
            if names.is_empty() {
                self.by_user.remove(user);
            }
        }
        if let Some(users) = self.by_name.get_mut(name) {
            users.remove(user);
            if users.is_empty() {
                self.by_name.remove(name);
            }
        }
    }

    /// Remove every edge originating at `user`.
    pub fn forget_user(&mut self, user: &str) {
        let names: Vec<String> = self.uses_of(user).map(str::to_string).collect();
        for name in names {
            self.forget_use(user, &name);
        }
    }

    /// Replace the edges of `user` with `names`, touching only what changed.
    pub fn replace_uses(&mut self, user: &str, names: &[String]) {
        let next: BTreeSet<&str> = names.iter().map(String::as_str).collect();
        let stale: Vec<String> = self
            .uses_of(user)
            .filter(|n| !next.contains(n))
            .map(str::to_string)
            .collect();

        for name in stale {
            self.forget_use(user, &name);
        }
        for name in next {
            self.record_use(user, name);
        }
    }

    /// Items that use the custom element `name`.
    pub fn users_of<'a>(&'a self, name: &str) -> impl Iterator<Item = &'a str> + 'a {
        self.by_name
            .get(name)
            .into_iter()
            .flat_map(|users| users.iter().map(String::as_str))
    }

    /// Custom element names used by `user`.
    pub fn uses_of<'a>(&'a self, user: &str) -> impl Iterator<Item = &'a str> + 'a {
        self.by_user
            .get(user)
            .into_iter()
            .flat_map(|names| names.iter().map(String::as_str))
    }

    pub fn is_empty(&self) -> bool {
        self.by_user.is_empty()
    }
}
