//! In-memory [`CacheStorage`].

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::CacheStorage;
use super::hash::compute_entry_key;
use crate::Error;
use crate::http::{Request, Response};

struct MemoryGeneration {
    name: String,
    entries: HashMap<String, Response>,
}

impl MemoryGeneration {
    fn new(name: &str) -> Self {
        Self { name: name.to_string(), entries: HashMap::new() }
    }
}

/// Process-local cache storage.
///
/// Generations are kept in creation order behind a tokio RwLock; clones
/// share the same store.
#[derive(Clone, Default)]
pub struct MemoryStorage {
    generations: Arc<RwLock<Vec<MemoryGeneration>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

fn entry_key(request: &Request) -> String {
    compute_entry_key(&request.method, &request.cache_url())
}

fn generation_mut<'a>(generations: &'a mut Vec<MemoryGeneration>, name: &str) -> &'a mut MemoryGeneration {
    let index = match generations.iter().position(|g| g.name == name) {
        Some(index) => index,
        None => {
            generations.push(MemoryGeneration::new(name));
            generations.len() - 1
        }
    };
    &mut generations[index]
}

#[async_trait]
impl CacheStorage for MemoryStorage {
    async fn open(&self, generation: &str) -> Result<(), Error> {
        let mut generations = self.generations.write().await;
        generation_mut(&mut generations, generation);
        Ok(())
    }

    async fn keys(&self) -> Result<Vec<String>, Error> {
        let generations = self.generations.read().await;
        Ok(generations.iter().map(|g| g.name.clone()).collect())
    }

    async fn delete(&self, generation: &str) -> Result<bool, Error> {
        let mut generations = self.generations.write().await;
        let before = generations.len();
        generations.retain(|g| g.name != generation);
        Ok(generations.len() != before)
    }

    async fn match_in(&self, generation: &str, request: &Request) -> Result<Option<Response>, Error> {
        let key = entry_key(request);
        let generations = self.generations.read().await;
        Ok(generations
            .iter()
            .find(|g| g.name == generation)
            .and_then(|g| g.entries.get(&key))
            .cloned())
    }

    async fn match_any(&self, request: &Request) -> Result<Option<Response>, Error> {
        let key = entry_key(request);
        let generations = self.generations.read().await;
        Ok(generations.iter().find_map(|g| g.entries.get(&key)).cloned())
    }

    async fn put(&self, generation: &str, request: &Request, response: &Response) -> Result<(), Error> {
        let key = entry_key(request);
        let mut generations = self.generations.write().await;
        generation_mut(&mut generations, generation)
            .entries
            .insert(key, response.clone());
        Ok(())
    }

    async fn put_all(&self, generation: &str, entries: &[(Request, Response)]) -> Result<(), Error> {
        let mut generations = self.generations.write().await;
        let target = generation_mut(&mut generations, generation);
        for (request, response) in entries {
            target.entries.insert(entry_key(request), response.clone());
        }
        Ok(())
    }

    async fn entry_count(&self, generation: &str) -> Result<u64, Error> {
        let generations = self.generations.read().await;
        Ok(generations
            .iter()
            .find(|g| g.name == generation)
            .map_or(0, |g| g.entries.len() as u64))
    }
}
