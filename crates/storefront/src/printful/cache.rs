//! Single-slot memo for values fetched once from the provider.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;

/// Lazily initialised value with an optional time-to-live.
///
/// Concurrent callers during initialisation share one fetch. Failed fetches
/// are not cached.
#[derive(Clone)]
pub struct Memo<T: Clone + Send + Sync + 'static> {
    cache: Cache<(), T>,
}

impl<T: Clone + Send + Sync + 'static> Memo<T> {
    /// `ttl = None` keeps the value for the life of the process.
    #[must_use]
    pub fn new(ttl: Option<Duration>) -> Self {
        let builder = Cache::<(), T>::builder().max_capacity(1);
        let cache = match ttl {
            Some(ttl) => builder.time_to_live(ttl).build(),
            None => builder.build(),
        };
        Self { cache }
    }

    /// Return the stored value, running `init` if there is none.
    ///
    /// # Errors
    ///
    /// Returns the error from `init`, shared between coalesced callers.
    pub async fn get_or_try_init<F, E>(&self, init: F) -> Result<T, Arc<E>>
    where
        F: Future<Output = Result<T, E>>,
        E: Send + Sync + 'static,
    {
        self.cache.try_get_with((), init).await
    }

    /// The stored value, if initialised and not expired.
    pub async fn get(&self) -> Option<T> {
        self.cache.get(&()).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[tokio::test]
    async fn test_initialises_once() {
        let memo = Memo::<i64>::new(None);
        let calls = AtomicUsize::new(0);

        for _ in 0..3 {
            let value = memo
                .get_or_try_init(async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, std::io::Error>(7)
                })
                .await;
            assert_eq!(value.ok(), Some(7));
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(memo.get().await, Some(7));
    }

    #[tokio::test]
    async fn test_failure_is_not_cached() {
        let memo = Memo::<i64>::new(None);

        let first = memo
            .get_or_try_init(async { Err::<i64, _>(std::io::Error::other("down")) })
            .await;
        assert!(first.is_err());
        assert_eq!(memo.get().await, None);

        let second = memo.get_or_try_init(async { Ok::<_, std::io::Error>(9) }).await;
        assert_eq!(second.ok(), Some(9));
    }
}
