/* src/server/markdoc/rust/src/cache.rs */

use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use lru::LruCache;

use crate::context::ParsedMarkdown;

type Key = (PathBuf, String);

/// LRU of parse results keyed by `(file, source)`, plus a file -> keys
/// index so one file's entries can be dropped without touching the rest.
pub struct MarkdownCache<T = ParsedMarkdown> {
  entries: Mutex<LruCache<Key, Arc<T>>>,
  index: Mutex<LruCache<PathBuf, Vec<Key>>>,
}

fn capacity(n: usize) -> NonZeroUsize {
  NonZeroUsize::new(n).unwrap_or(NonZeroUsize::MIN)
}

impl<T> MarkdownCache<T> {
  pub fn new(entries: usize, files: usize) -> Self {
    Self {
      entries: Mutex::new(LruCache::new(capacity(entries))),
      index: Mutex::new(LruCache::new(capacity(files))),
    }
  }

  pub fn get(&self, file: &Path, source: &str) -> Option<Arc<T>> {
    let key = (file.to_path_buf(), source.to_string());
    self.entries.lock().unwrap_or_else(PoisonError::into_inner).get(&key).cloned()
  }

  pub fn insert(&self, file: &Path, source: &str, value: Arc<T>) {
    let key = (file.to_path_buf(), source.to_string());
    let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
    entries.put(key.clone(), value);

    let mut index = self.index.lock().unwrap_or_else(PoisonError::into_inner);
    match index.get_mut(file) {
      Some(keys) => {
        // Keys of evicted entries would only pin old sources.
        keys.retain(|k| *k != key && entries.contains(k));
        keys.push(key);
      }
      None => {
        index.put(file.to_path_buf(), vec![key]);
      }
    }
  }

  /// Drop the entries derived from `file`, or everything when `None`.
  pub fn clear(&self, file: Option<&Path>) {
    let Some(file) = file else {
      self.entries.lock().unwrap_or_else(PoisonError::into_inner).clear();
      self.index.lock().unwrap_or_else(PoisonError::into_inner).clear();
      return;
    };
    let keys = self.index.lock().unwrap_or_else(PoisonError::into_inner).pop(file);
    let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
    for key in keys.unwrap_or_default() {
      entries.pop(&key);
    }
    tracing::debug!(file = %file.display(), "markdown cache cleared for file");
  }

  pub fn len(&self) -> usize {
    self.entries.lock().unwrap_or_else(PoisonError::into_inner).len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }
}

impl<T> Default for MarkdownCache<T> {
  fn default() -> Self {
    Self::new(1024, 1024)
  }
}
