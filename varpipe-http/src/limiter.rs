use tokio::sync::{Semaphore, SemaphorePermit};

/// Concurrency cap for one named upstream, backed by a counting semaphore.
///
/// Each request holds a permit for the duration of a single attempt; the
/// permit is released on drop, so success, failure, and unwind all return
/// it to the pool. One limiter is shared per upstream key across the whole
/// process, so e.g. alignment and annotation calls to the same upstream
/// contend for the same pool.
#[derive(Debug)]
pub struct RateLimiter {
    semaphore: Semaphore,
}

impl RateLimiter {
    pub fn new(max_concurrent: usize) -> Self {
        RateLimiter {
            semaphore: Semaphore::new(max_concurrent),
        }
    }

    /// Wait for a permit. The returned guard releases it when dropped.
    pub async fn acquire(&self) -> SemaphorePermit<'_> {
        // The semaphore is never closed, so acquire can only fail if this
        // limiter were dropped while waiting, which the borrow prevents.
        self.semaphore
            .acquire()
            .await
            .unwrap_or_else(|_| unreachable!("rate limiter semaphore closed"))
    }

    pub fn available_permits(&self) -> usize {
        self.semaphore.available_permits()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn acquire_takes_a_permit() {
        let limiter = RateLimiter::new(2);
        let _permit = limiter.acquire().await;
        assert_eq!(limiter.available_permits(), 1);
    }

    #[tokio::test]
    async fn dropping_the_permit_releases_it() {
        let limiter = RateLimiter::new(2);
        {
            let _permit = limiter.acquire().await;
            assert_eq!(limiter.available_permits(), 1);
        }
        assert_eq!(limiter.available_permits(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_pool_blocks_until_release() {
        let limiter = RateLimiter::new(1);
        let permit = limiter.acquire().await;

        let pending = tokio::time::timeout(
            std::time::Duration::from_millis(50),
            limiter.acquire(),
        );
        assert!(pending.await.is_err(), "second acquire should block");

        drop(permit);
        let _second = limiter.acquire().await;
        assert_eq!(limiter.available_permits(), 0);
    }
}
