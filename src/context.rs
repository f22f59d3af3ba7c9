//! Shared state behind a catalog and everything created through it

use std::sync::Arc;

use crate::config::Config;
use crate::native::NativeClient;
use crate::pool::ScratchPool;

#[derive(Debug)]
pub(crate) struct Context {
    pub(crate) client: Arc<dyn NativeClient>,
    pub(crate) config: Config,
    pub(crate) scratch: ScratchPool,
}

impl Context {
    pub(crate) fn new(client: Arc<dyn NativeClient>, config: Config) -> Arc<Self> {
        let scratch = ScratchPool::new(config.scratch_pool_size);
        Arc::new(Self {
            client,
            config,
            scratch,
        })
    }
}
