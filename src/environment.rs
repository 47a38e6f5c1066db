use std::sync::Arc;

use log::Logger;

use crate::config::DEFAULT_POPULAR_COUNT;
use crate::db::SafeDb;
use crate::store::Store;
use crate::urls::Urls;

pub type VecStore<O> = dyn Store<Output = O, Raw = Vec<u8>> + Send + Sync;

/// Bounds on the output type of the object store.
pub trait SafeStore: Clone + Send + Sync {}

impl<T: Clone + Send + Sync> SafeStore for T {}

#[derive(Clone)]
pub struct Environment<O: SafeStore> {
    pub logger: Arc<Logger>,
    pub db: Arc<SafeDb>,
    pub urls: Arc<Urls>,
    pub store: Arc<VecStore<O>>,
    pub config: Config,
}

impl<O: SafeStore> Environment<O> {
    pub fn new(
        logger: Arc<Logger>,
        db: Arc<SafeDb>,
        urls: Arc<Urls>,
        store: Arc<VecStore<O>>,
        config: Config,
    ) -> Self {
        Self {
            logger,
            db,
            urls,
            store,
            config,
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct Config {
    /// Length of the popularity ranking.
    pub(crate) popular_count: i64,
}

impl Config {
    /// Panics unless the ranking holds at least one video.
    pub fn new(popular_count: i64) -> Self {
        if popular_count < 1 {
            panic!("popular count must be at least 1 (got {})", popular_count);
        }

        Self { popular_count }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config::new(DEFAULT_POPULAR_COUNT)
    }
}
