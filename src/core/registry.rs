use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;

/// In-memory set of keys handed out during generation.
///
/// Reservation is advisory: it prevents two local generators from claiming the
/// same key, but it is not coordinated with the downstream unique constraint,
/// so a key persisted by an earlier process can still collide on write.
#[derive(Debug)]
pub struct UniquenessRegistry {
    kind: &'static str,
    keys: Mutex<HashSet<String>>,
}

impl UniquenessRegistry {
    pub fn new(kind: &'static str) -> Self {
        Self {
            kind,
            keys: Mutex::new(HashSet::new()),
        }
    }

    pub fn kind(&self) -> &'static str {
        self.kind
    }

    /// Inserts `candidate` if absent; `false` means someone already holds it.
    pub fn reserve(&self, candidate: &str) -> bool {
        let mut keys = self.keys.lock();
        if keys.contains(candidate) {
            return false;
        }
        keys.insert(candidate.to_string())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.keys.lock().contains(key)
    }

    pub fn len(&self) -> usize {
        self.keys.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.lock().is_empty()
    }

    pub fn clear(&self) {
        self.keys.lock().clear();
    }
}

/// The pair of registries one orchestrator instance owns and injects into its factory.
#[derive(Debug, Clone)]
pub struct Registries {
    pub emails: Arc<UniquenessRegistry>,
    pub account_numbers: Arc<UniquenessRegistry>,
}

impl Registries {
    pub fn new() -> Self {
        Self {
            emails: Arc::new(UniquenessRegistry::new("email")),
            account_numbers: Arc::new(UniquenessRegistry::new("account number")),
        }
    }

    pub fn clear(&self) {
        self.emails.clear();
        self.account_numbers.clear();
    }
}

impl Default for Registries {
    fn default() -> Self {
        Self::new()
    }
}
