// Provider registry - immutable snapshots swapped on reload

use parking_lot::RwLock;
use std::sync::Arc;

use crate::config::ProviderEntry;

/// One fully-formed version of the provider set. Never mutated after creation.
#[derive(Debug, Default)]
pub struct Snapshot {
    generation: u64,
    entries: Vec<ProviderEntry>,
}

impl Snapshot {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Exact, case-sensitive alias match. The first entry wins on duplicates.
    pub fn lookup(&self, alias: &str) -> Option<&ProviderEntry> {
        self.entries.iter().find(|entry| entry.alias == alias)
    }

    pub fn list(&self) -> &[ProviderEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Holds the current [`Snapshot`].
///
/// The lock guards only the `Arc` pointer: readers clone it and drop the
/// guard immediately, and `load` builds the new snapshot before taking the
/// write lock, so a reload never waits on a request and vice versa.
#[derive(Debug, Default)]
pub struct ProviderRegistry {
    current: RwLock<Arc<Snapshot>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current snapshot. Hold on to it for the whole request to get a
    /// consistent view across several lookups.
    pub fn snapshot(&self) -> Arc<Snapshot> {
        Arc::clone(&self.current.read())
    }

    /// Install `entries` as the new current snapshot and return its generation.
    pub fn load(&self, entries: Vec<ProviderEntry>) -> u64 {
        let mut next = Snapshot {
            generation: 0,
            entries,
        };

        let mut current = self.current.write();
        next.generation = current.generation + 1;
        let generation = next.generation;
        *current = Arc::new(next);
        generation
    }

    pub fn lookup(&self, alias: &str) -> Option<ProviderEntry> {
        self.snapshot().lookup(alias).cloned()
    }

    pub fn list(&self) -> Vec<ProviderEntry> {
        self.snapshot().list().to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proxy::ProviderKind;

    fn entry(alias: &str, model: &str, key: &str) -> ProviderEntry {
        ProviderEntry {
            alias: alias.to_string(),
            provider_kind: Some(ProviderKind::Novita),
            api_base: None,
            upstream_model: model.to_string(),
            api_key: key.to_string(),
            system_message: None,
            modelfile: None,
            parameters: None,
            template: None,
        }
    }

    #[test]
    fn test_empty_registry() {
        let registry = ProviderRegistry::new();
        assert!(registry.lookup("anything").is_none());
        assert!(registry.list().is_empty());
        assert_eq!(registry.snapshot().generation(), 0);
    }

    #[test]
    fn test_lookup_is_exact_and_case_sensitive() {
        let registry = ProviderRegistry::new();
        registry.load(vec![entry("gpt", "a", "k"), entry("GPT-4", "b", "k")]);

        assert_eq!(registry.lookup("gpt").unwrap().upstream_model, "a");
        assert_eq!(registry.lookup("GPT-4").unwrap().upstream_model, "b");
        assert!(registry.lookup("GPT").is_none());
        assert!(registry.lookup("gpt-4").is_none());
        assert!(registry.lookup("gp").is_none());
        assert!(registry.lookup("").is_none());
    }

    #[test]
    fn test_duplicate_alias_first_match_wins() {
        let registry = ProviderRegistry::new();
        registry.load(vec![
            entry("dup", "first", "k1"),
            entry("other", "x", "k"),
            entry("dup", "second", "k2"),
        ]);

        let found = registry.lookup("dup").unwrap();
        assert_eq!(found.upstream_model, "first");
        assert_eq!(found.api_key, "k1");
        assert_eq!(registry.list().len(), 3);
    }

    #[test]
    fn test_load_replaces_whole_set() {
        let registry = ProviderRegistry::new();
        assert_eq!(registry.load(vec![entry("old", "a", "k"), entry("both", "a", "k")]), 1);
        assert_eq!(registry.load(vec![entry("new", "b", "k"), entry("both", "b", "k")]), 2);

        assert!(registry.lookup("old").is_none());
        assert!(registry.lookup("new").is_some());
        assert_eq!(registry.lookup("both").unwrap().upstream_model, "b");
    }

    #[test]
    fn test_held_snapshot_is_unaffected_by_reload() {
        let registry = ProviderRegistry::new();
        registry.load(vec![entry("a", "one", "k")]);
        let held = registry.snapshot();

        registry.load(vec![entry("b", "two", "k")]);

        assert!(held.lookup("a").is_some());
        assert!(held.lookup("b").is_none());
        assert_eq!(held.generation(), 1);
        assert_eq!(registry.snapshot().generation(), 2);
    }

    #[test]
    fn test_concurrent_reload_never_mixes_snapshots() {
        let registry = Arc::new(ProviderRegistry::new());
        registry.load(vec![entry("m", "model-0", "key-0")]);

        let writer = {
            let registry = Arc::clone(&registry);
            std::thread::spawn(move || {
                for i in 1..=2000 {
                    registry.load(vec![
                        entry("m", &format!("model-{i}"), &format!("key-{i}")),
                        entry(&format!("extra-{i}"), "x", "y"),
                    ]);
                }
            })
        };

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || {
                    for _ in 0..5000 {
                        let found = registry.lookup("m").expect("alias always present");
                        let model_gen = found.upstream_model.trim_start_matches("model-");
                        let key_gen = found.api_key.trim_start_matches("key-");
                        assert_eq!(model_gen, key_gen, "torn read: {found:?}");

                        let snapshot = registry.snapshot();
                        let generation = snapshot.generation();
                        let expected = if generation == 1 { 1 } else { 2 };
                        assert_eq!(snapshot.len(), expected);
                    }
                })
            })
            .collect();

        writer.join().unwrap();
        for reader in readers {
            reader.join().unwrap();
        }
        assert_eq!(registry.lookup("m").unwrap().upstream_model, "model-2000");
    }
}
