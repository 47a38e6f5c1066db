use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use futures::future::{ready, BoxFuture, FutureExt};
use url::{ParseError, Url};
use uuid::Uuid;

use crate::errors::BackendError;
use crate::store::Store;

/// An object store that keeps everything in memory.
pub struct MockStore {
    pub map: RwLock<HashMap<Uuid, (String, Vec<u8>)>>,
    base_url: Url,
}

impl MockStore {
    pub fn new(base_url: Url) -> Self {
        MockStore {
            map: Default::default(),
            base_url,
        }
    }

    pub fn len(&self) -> usize {
        self.map.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Store for MockStore {
    type Output = ();
    type Raw = Vec<u8>;

    fn delete(&self, key: &Uuid) -> BoxFuture<Result<(), BackendError>> {
        self.map
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);

        ready(Ok(())).boxed()
    }

    fn get_url(&self, key: &Uuid) -> Result<Url, ParseError> {
        self.base_url.join(&key.to_string())
    }

    fn save(
        &self,
        key: &Uuid,
        content_type: String,
        raw: Vec<u8>,
    ) -> BoxFuture<Result<(), BackendError>> {
        self.map
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(*key, (content_type, raw));

        ready(Ok(())).boxed()
    }
}
