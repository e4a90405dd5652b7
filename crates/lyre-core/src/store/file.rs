use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use serde_json::{Map, Value};
use tracing::{debug, trace};

use super::{Namespace, StoreBackend};
use crate::error::{StoreError, StoreResult};

type Entries = BTreeMap<String, Value>;

/// Persistent backend writing one JSON object per namespace.
///
/// Layout under the root directory:
///
/// ```text
/// global.json
/// scripts/<script>.json
/// instances/<instance>/<script>.json
/// ```
///
/// Namespaces are loaded on first access and cached. Every write rewrites the
/// namespace file through a temporary file and a rename, so a crash leaves
/// either the old or the new contents.
#[derive(Debug)]
pub struct JsonFileStore {
    root: PathBuf,
    cache: Mutex<HashMap<Namespace, Entries>>,
}

impl JsonFileStore {
    /// Opens (and creates, if needed) a store rooted at `root`.
    pub fn open(root: impl Into<PathBuf>) -> StoreResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        debug!(root = %root.display(), "Opened JSON file store");
        Ok(Self {
            root,
            cache: Mutex::new(HashMap::new()),
        })
    }

    /// Returns the root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, ns: &Namespace) -> PathBuf {
        match ns {
            Namespace::Global => self.root.join("global.json"),
            Namespace::Script(script) => self
                .root
                .join("scripts")
                .join(format!("{}.json", sanitize(script))),
            Namespace::Instance { script, instance } => self
                .root
                .join("instances")
                .join(sanitize(instance))
                .join(format!("{}.json", sanitize(script))),
        }
    }

    fn load(&self, ns: &Namespace) -> StoreResult<Entries> {
        let path = self.path_for(ns);
        match fs::read(&path) {
            Ok(bytes) => match serde_json::from_slice::<Value>(&bytes) {
                Ok(Value::Object(map)) => Ok(map.into_iter().collect()),
                _ => Err(StoreError::Corrupt(path.display().to_string())),
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Entries::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn persist(&self, ns: &Namespace, entries: &Entries) -> StoreResult<()> {
        let path = self.path_for(ns);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_vec_pretty(entries)?)?;
        fs::rename(&tmp, &path)?;
        trace!(path = %path.display(), entries = entries.len(), "Persisted namespace");
        Ok(())
    }

    /// Runs `f` against the cached entries of `ns`, loading them first.
    fn with_entries<R>(
        &self,
        ns: &Namespace,
        f: impl FnOnce(&mut Entries) -> R,
    ) -> StoreResult<R> {
        let mut cache = self.cache.lock();
        if !cache.contains_key(ns) {
            let loaded = self.load(ns)?;
            cache.insert(ns.clone(), loaded);
        }
        let entries = cache.entry(ns.clone()).or_default();
        Ok(f(entries))
    }
}

impl StoreBackend for JsonFileStore {
    fn set(&self, ns: &Namespace, key: &str, value: Value) -> StoreResult<()> {
        let mut cache = self.cache.lock();
        let mut entries = match cache.get(ns) {
            Some(entries) => entries.clone(),
            None => self.load(ns)?,
        };
        entries.insert(key.to_string(), value);
        self.persist(ns, &entries)?;
        cache.insert(ns.clone(), entries);
        Ok(())
    }

    fn get(&self, ns: &Namespace, key: &str) -> StoreResult<Option<Value>> {
        self.with_entries(ns, |entries| entries.get(key).cloned())
    }

    fn unset(&self, ns: &Namespace, key: &str) -> StoreResult<bool> {
        let mut cache = self.cache.lock();
        let mut entries = match cache.get(ns) {
            Some(entries) => entries.clone(),
            None => self.load(ns)?,
        };
        if entries.remove(key).is_none() {
            cache.insert(ns.clone(), entries);
            return Ok(false);
        }
        self.persist(ns, &entries)?;
        cache.insert(ns.clone(), entries);
        Ok(true)
    }

    fn keys(&self, ns: &Namespace) -> StoreResult<Vec<String>> {
        self.with_entries(ns, |entries| entries.keys().cloned().collect())
    }

    fn all(&self, ns: &Namespace) -> StoreResult<Map<String, Value>> {
        self.with_entries(ns, |entries| {
            entries.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
        })
    }
}

/// Maps a script or instance name onto a file name.
///
/// ASCII letters, digits, `-` and `_` are kept; every other byte becomes
/// `%XX`. Distinct names always map to distinct file names, and the result
/// never contains a separator or a leading dot.
fn sanitize(name: &str) -> String {
    if name.is_empty() {
        return "%".to_string();
    }
    let mut encoded = String::with_capacity(name.len());
    for byte in name.bytes() {
        if byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'_') {
            encoded.push(char::from(byte));
        } else {
            encoded.push_str(&format!("%{byte:02X}"));
        }
    }
    encoded
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let ns = Namespace::Instance {
            script: "radio".into(),
            instance: "i1".into(),
        };

        {
            let store = JsonFileStore::open(dir.path()).unwrap();
            store.set(&ns, "volume", json!(30)).unwrap();
            store.set(&Namespace::Global, "motd", json!("hi")).unwrap();
        }

        let store = JsonFileStore::open(dir.path()).unwrap();
        assert_eq!(store.get(&ns, "volume").unwrap(), Some(json!(30)));
        assert_eq!(store.keys(&Namespace::Global).unwrap(), vec!["motd"]);
        assert!(dir.path().join("instances/i1/radio.json").exists());
    }

    #[test]
    fn test_unset_rewrites_file() {
        let dir = tempfile::tempdir().unwrap();
        let ns = Namespace::Script("quotes".into());
        let store = JsonFileStore::open(dir.path()).unwrap();
        store.set(&ns, "a", json!(1)).unwrap();

        assert!(store.unset(&ns, "a").unwrap());
        assert!(!store.unset(&ns, "a").unwrap());

        let reopened = JsonFileStore::open(dir.path()).unwrap();
        assert!(reopened.all(&ns).unwrap().is_empty());
    }

    #[test]
    fn test_corrupt_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("global.json"), b"[1, 2]").unwrap();
        let store = JsonFileStore::open(dir.path()).unwrap();

        assert!(matches!(
            store.get(&Namespace::Global, "x"),
            Err(StoreError::Corrupt(_))
        ));
    }

    #[test]
    fn test_sanitize() {
        assert_eq!(sanitize("../etc/passwd"), "%2E%2E%2Fetc%2Fpasswd");
        assert_eq!(sanitize(".."), "%2E%2E");
        assert_eq!(sanitize("my script"), "my%20script");
        assert_eq!(sanitize("my_script"), "my_script");
        assert_eq!(sanitize("my%20script"), "my%2520script");
        assert_eq!(sanitize(""), "%");
    }

    #[test]
    fn test_similar_names_do_not_share_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let names = ["my script", "my_script", "my%20script", "my/script", ""];
        {
            let store = JsonFileStore::open(dir.path()).unwrap();
            for (i, name) in names.iter().enumerate() {
                store
                    .set(&Namespace::Script((*name).into()), "n", json!(i))
                    .unwrap();
                store
                    .set(
                        &Namespace::Instance {
                            script: "s".into(),
                            instance: (*name).into(),
                        },
                        "n",
                        json!(i),
                    )
                    .unwrap();
            }
        }

        let store = JsonFileStore::open(dir.path()).unwrap();
        for (i, name) in names.iter().enumerate() {
            let script = Namespace::Script((*name).into());
            let instance = Namespace::Instance {
                script: "s".into(),
                instance: (*name).into(),
            };
            assert_eq!(store.get(&script, "n").unwrap(), Some(json!(i)));
            assert_eq!(store.get(&instance, "n").unwrap(), Some(json!(i)));
        }
    }
}
