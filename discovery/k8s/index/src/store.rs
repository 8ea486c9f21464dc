use parking_lot::RwLock;

/// Identifies a stored object by namespace and name.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ObjectKey {
    pub namespace: String,
    pub name: String,
}

impl std::fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// A thread-safe object cache standing in for the watcher substrate's keyed
/// store: lookup by key, snapshot listing, and label-style selection, all in
/// insertion order.
///
/// Insertion order is load-bearing: downstream consumers deduplicate by
/// retaining the first occurrence of an (address, port) pair, so listings
/// must be stable across queries.
#[derive(Debug)]
pub struct ObjectStore<T> {
    entries: RwLock<Vec<(ObjectKey, T)>>,
}

impl<T> Default for ObjectStore<T> {
    fn default() -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
        }
    }
}

impl<T: Clone> ObjectStore<T> {
    pub fn get(&self, key: &ObjectKey) -> Option<T> {
        self.entries
            .read()
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, obj)| obj.clone())
    }

    /// Inserts or replaces an entry. Replacement keeps the entry's original
    /// position.
    pub fn upsert(&self, key: ObjectKey, obj: T) {
        let mut entries = self.entries.write();
        match entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, existing)) => *existing = obj,
            None => entries.push((key, obj)),
        }
    }

    pub fn remove(&self, key: &ObjectKey) -> Option<T> {
        let mut entries = self.entries.write();
        let idx = entries.iter().position(|(k, _)| k == key)?;
        Some(entries.remove(idx).1)
    }

    pub fn list(&self) -> Vec<T> {
        self.entries
            .read()
            .iter()
            .map(|(_, obj)| obj.clone())
            .collect()
    }

    /// Returns all objects admitted by `selector`, in insertion order.
    pub fn select(&self, selector: impl Fn(&T) -> bool) -> Vec<T> {
        self.entries
            .read()
            .iter()
            .filter(|(_, obj)| selector(obj))
            .map(|(_, obj)| obj.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}
