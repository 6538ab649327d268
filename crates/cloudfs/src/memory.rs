//! In-memory flat object store.
//!
//! Backs the test suite the way a real bucket would: flat keys, paginated
//! listings, optional leases and scripted copy statuses, a container that
//! can start out missing. Also handy for derived-data pipelines that want
//! provider semantics without a network.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use url::Url;

use crate::backend::{
    ByteStream, Capabilities, CopyState, Lease, ObjectBackend, ObjectEntry, ObjectMeta,
    ObjectPage, PrefixMatchPolicy,
};
use crate::error::{Error, Result};

#[derive(Debug, Clone)]
struct StoredObject {
    data: Bytes,
    last_modified: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct State {
    objects: BTreeMap<String, StoredObject>,
    /// key -> active lease id
    leases: HashMap<String, String>,
    /// Scripted statuses reported for a destination key, consumed per poll.
    copy_statuses: HashMap<String, VecDeque<CopyState>>,
    released_leases: Vec<(String, String)>,
    put_count: usize,
    lease_counter: usize,
}

/// An in-memory [`ObjectBackend`] with knobs for exercising every core
/// code path.
pub struct MemoryBackend {
    state: Arc<Mutex<State>>,
    container_exists: AtomicBool,
    page_size: usize,
    prefix_match_policy: PrefixMatchPolicy,
    native_append: bool,
    lease_support: bool,
    copy_status_support: bool,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        MemoryBackend::new()
    }
}

impl MemoryBackend {
    pub fn new() -> Self {
        MemoryBackend {
            state: Arc::new(Mutex::new(State::default())),
            container_exists: AtomicBool::new(true),
            page_size: 1000,
            prefix_match_policy: PrefixMatchPolicy::TreatAsDirectory,
            native_append: false,
            lease_support: false,
            copy_status_support: false,
        }
    }

    /// Caps listing pages so continuation-token handling gets exercised.
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn with_prefix_match_policy(mut self, policy: PrefixMatchPolicy) -> Self {
        self.prefix_match_policy = policy;
        self
    }

    /// Enables the native append primitive.
    pub fn with_native_append(mut self) -> Self {
        self.native_append = true;
        self
    }

    /// Enables exclusive leases.
    pub fn with_lease_support(mut self) -> Self {
        self.lease_support = true;
        self
    }

    /// Enables asynchronous server-side copies whose status is polled.
    pub fn with_copy_status_support(mut self) -> Self {
        self.copy_status_support = true;
        self
    }

    /// Starts with no container; operations fail with `ContainerNotFound`
    /// until `create_container_if_missing` runs.
    pub fn without_container(self) -> Self {
        self.container_exists.store(false, Ordering::SeqCst);
        self
    }

    /// Queues the statuses `copy_status` will report for `dest`, one per
    /// poll; an exhausted queue reports `Success`.
    pub async fn script_copy_statuses(&self, dest: &str, statuses: Vec<CopyState>) {
        let mut state = self.state.lock().await;
        state
            .copy_statuses
            .insert(dest.to_string(), statuses.into());
    }

    /// Seeds an object without counting as a put.
    pub async fn insert_object(&self, key: &str, data: impl Into<Bytes>) {
        let mut state = self.state.lock().await;
        state.objects.insert(
            key.to_string(),
            StoredObject {
                data: data.into(),
                last_modified: Utc::now(),
            },
        );
    }

    pub async fn object(&self, key: &str) -> Option<Vec<u8>> {
        let state = self.state.lock().await;
        state.objects.get(key).map(|o| o.data.to_vec())
    }

    pub async fn keys(&self) -> Vec<String> {
        let state = self.state.lock().await;
        state.objects.keys().cloned().collect()
    }

    /// Number of `put_object`/`append_object` commits so far.
    pub async fn put_count(&self) -> usize {
        self.state.lock().await.put_count
    }

    pub async fn active_leases(&self) -> Vec<String> {
        let state = self.state.lock().await;
        state.leases.keys().cloned().collect()
    }

    /// `(key, lease id)` pairs released so far.
    pub async fn released_leases(&self) -> Vec<(String, String)> {
        self.state.lock().await.released_leases.clone()
    }

    fn check_container(&self) -> Result<()> {
        if self.container_exists.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(Error::container_not_found("memory"))
        }
    }
}

#[async_trait]
impl ObjectBackend for MemoryBackend {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            supports_native_append: self.native_append,
            supports_atomic_rename: false,
            supports_presigned_url: true,
            supports_watch: false,
            supports_copy_status: self.copy_status_support,
            supports_lease: self.lease_support,
            hierarchical: false,
            prefix_match_policy: self.prefix_match_policy,
        }
    }

    async fn list_objects(
        &self,
        prefix: &str,
        token: Option<String>,
        max_keys: Option<usize>,
    ) -> Result<ObjectPage> {
        let state = self.state.lock().await;
        self.check_container()?;

        let matching: Vec<(&String, &StoredObject)> = state
            .objects
            .range(prefix.to_string()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .collect();

        let offset: usize = token.and_then(|t| t.parse().ok()).unwrap_or(0);
        let mut limit = self.page_size;
        if let Some(max) = max_keys {
            limit = limit.min(max);
        }

        let objects: Vec<ObjectEntry> = matching
            .iter()
            .skip(offset)
            .take(limit)
            .map(|(key, object)| ObjectEntry {
                key: (*key).clone(),
                size: object.data.len() as u64,
                last_modified: object.last_modified,
                is_directory: false,
            })
            .collect();

        let consumed = offset + objects.len();
        let next_token = if consumed < matching.len() && max_keys.is_none() {
            Some(consumed.to_string())
        } else {
            None
        };
        Ok(ObjectPage {
            objects,
            next_token,
        })
    }

    async fn object_metadata(&self, key: &str) -> Result<Option<ObjectMeta>> {
        let state = self.state.lock().await;
        self.check_container()?;
        Ok(state.objects.get(key).map(|object| ObjectMeta {
            size: object.data.len() as u64,
            last_modified: object.last_modified,
            is_directory: false,
        }))
    }

    async fn object_reader(&self, key: &str) -> Result<ByteStream> {
        let state = self.state.lock().await;
        self.check_container()?;
        match state.objects.get(key) {
            Some(object) => Ok(ByteStream::from_bytes(object.data.clone())),
            None => Err(Error::not_found(key)),
        }
    }

    async fn put_object(&self, key: &str, content: ByteStream) -> Result<()> {
        let data = content.read_to_end().await?;
        let mut state = self.state.lock().await;
        self.check_container()?;
        state.objects.insert(
            key.to_string(),
            StoredObject {
                data: data.into(),
                last_modified: Utc::now(),
            },
        );
        state.put_count += 1;
        Ok(())
    }

    async fn delete_object(&self, key: &str) -> Result<()> {
        let mut state = self.state.lock().await;
        self.check_container()?;
        state.objects.remove(key);
        Ok(())
    }

    async fn delete_objects(&self, keys: &[String]) -> Result<()> {
        let mut state = self.state.lock().await;
        self.check_container()?;
        for key in keys {
            state.objects.remove(key);
        }
        Ok(())
    }

    async fn copy_object(&self, src: &str, dest: &str) -> Result<()> {
        let mut state = self.state.lock().await;
        self.check_container()?;
        let Some(object) = state.objects.get(src).cloned() else {
            return Err(Error::not_found(src));
        };
        state.objects.insert(dest.to_string(), object);
        Ok(())
    }

    async fn copy_status(&self, key: &str) -> Result<CopyState> {
        if !self.copy_status_support {
            return Err(Error::unsupported("copy_status", self.name()));
        }
        let mut state = self.state.lock().await;
        let status = state
            .copy_statuses
            .get_mut(key)
            .and_then(|queue| queue.pop_front())
            .unwrap_or(CopyState::Success);
        Ok(status)
    }

    async fn append_object(&self, key: &str, content: ByteStream) -> Result<()> {
        if !self.native_append {
            return Err(Error::unsupported("append_object", self.name()));
        }
        let appended = content.read_to_end().await?;
        let mut state = self.state.lock().await;
        self.check_container()?;
        let mut data = state
            .objects
            .get(key)
            .map(|o| o.data.to_vec())
            .unwrap_or_default();
        data.extend_from_slice(&appended);
        state.objects.insert(
            key.to_string(),
            StoredObject {
                data: data.into(),
                last_modified: Utc::now(),
            },
        );
        state.put_count += 1;
        Ok(())
    }

    async fn presign_url(&self, key: &str, validity: Duration) -> Result<Url> {
        let state = self.state.lock().await;
        self.check_container()?;
        if !state.objects.contains_key(key) {
            return Err(Error::not_found(key));
        }
        let expires_at = Utc::now() + chrono::Duration::from_std(validity)
            .unwrap_or_else(|_| chrono::Duration::zero());
        let url = format!(
            "memory://bucket/{key}?expires_at={}",
            expires_at.timestamp()
        );
        Url::parse(&url).map_err(|e| Error::backend(e.to_string()))
    }

    async fn acquire_lease(&self, key: &str) -> Result<Lease> {
        if !self.lease_support {
            return Err(Error::unsupported("acquire_lease", self.name()));
        }
        let mut state = self.state.lock().await;
        self.check_container()?;
        if state.leases.contains_key(key) {
            return Err(Error::backend(format!("lease already held on {key}")));
        }
        state.lease_counter += 1;
        let id = format!("lease-{}", state.lease_counter);
        state.leases.insert(key.to_string(), id.clone());
        Ok(Lease { id })
    }

    async fn release_lease(&self, key: &str, lease: &Lease) -> Result<()> {
        if !self.lease_support {
            return Err(Error::unsupported("release_lease", self.name()));
        }
        let mut state = self.state.lock().await;
        match state.leases.get(key) {
            Some(held) if *held == lease.id => {
                state.leases.remove(key);
                state
                    .released_leases
                    .push((key.to_string(), lease.id.clone()));
                Ok(())
            }
            _ => Err(Error::backend(format!("no such lease on {key}"))),
        }
    }

    async fn create_container_if_missing(&self) -> Result<()> {
        self.container_exists.store(true, Ordering::SeqCst);
        Ok(())
    }
}
