use crate::{config::Config, extension::Extensions, report::ErrorPipeline};
use serenity::all::UserId;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

/// Collection of data that is shared across events
pub struct Context<'a> {
    // oscbot's own context types
    pub cfg: &'a Config,
    pub owner: UserId,
    pub extensions: &'a Extensions,
    pub status: &'a Status,
    pub reporter: ErrorPipeline,
    // Discord/Serenity context types
    pub cache: &'a Arc<serenity::all::Cache>,
    pub http: &'a Arc<serenity::all::Http>,
    pub cache_http: &'a CacheHttp,
}

/// Many Serenity functions take a `impl CacheHttp` in order to first check the cache if the item
/// is available and fall back to an http request otherwise.  The most readily available type that
/// impl's this is named very differently in a way that could be confusing, and so we alias it.
pub type CacheHttp = serenity::all::Context;

/// Connection state, flipped by the gateway's ready event
#[derive(Default)]
pub struct Status {
    ready: AtomicBool,
    logged_in: AtomicBool,
}

impl Status {
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    /// Mark the connection ready.  Returns whether this is the first login of the process.
    pub fn mark_ready(&self) -> bool {
        self.ready.store(true, Ordering::SeqCst);
        !self.logged_in.swap(true, Ordering::SeqCst)
    }
}
