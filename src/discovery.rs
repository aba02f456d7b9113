//! Proxy discovery collaborators
//!
//! The balancer never produces candidate addresses itself; a [`ProxySource`]
//! is injected at construction and its result is trusted verbatim. Sources
//! should be safe to call occasionally more than once, although the pool
//! cache never issues two concurrent calls.

use async_trait::async_trait;
use futures::future::BoxFuture;
use futures::FutureExt;

use crate::error::Result;
use crate::models::ProxyAddress;

/// Asynchronous producer of candidate proxy addresses
#[async_trait]
pub trait ProxySource: Send + Sync {
    /// Fetch the current set of candidates, in rotation order
    async fn fetch(&self) -> Result<Vec<ProxyAddress>>;
}

/// Fixed list of addresses; mostly useful for tests and small deployments
pub struct StaticSource {
    addresses: Vec<ProxyAddress>,
}

impl StaticSource {
    pub fn new<I, A>(addresses: I) -> Self
    where
        I: IntoIterator<Item = A>,
        A: Into<ProxyAddress>,
    {
        Self {
            addresses: addresses.into_iter().map(Into::into).collect(),
        }
    }
}

#[async_trait]
impl ProxySource for StaticSource {
    async fn fetch(&self) -> Result<Vec<ProxyAddress>> {
        Ok(self.addresses.clone())
    }
}

type SourceFn = Box<dyn Fn() -> BoxFuture<'static, Result<Vec<ProxyAddress>>> + Send + Sync>;

/// Adapter turning an async closure into a [`ProxySource`]
pub struct FnSource {
    f: SourceFn,
}

impl FnSource {
    pub fn new<F, Fut>(f: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = Result<Vec<ProxyAddress>>> + Send + 'static,
    {
        Self {
            f: Box::new(move || f().boxed()),
        }
    }
}

#[async_trait]
impl ProxySource for FnSource {
    async fn fetch(&self) -> Result<Vec<ProxyAddress>> {
        (self.f)().await
    }
}
