use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// Width and progress cadence for bulk store I/O.
#[derive(Debug, Clone, Copy)]
pub struct PoolOptions {
    pub width: usize,
    pub progress_every: usize,
}

impl Default for PoolOptions {
    fn default() -> Self {
        Self {
            width: crate::config::DEFAULT_CONCURRENCY,
            progress_every: crate::config::DEFAULT_PROGRESS_EVERY,
        }
    }
}

/// Runs `op` over `items` with at most `opts.width` calls in flight.
///
/// Completion order is unspecified. The first error is returned and the
/// remaining in-flight calls are aborted; work that already finished stays
/// done. Returns the number of completed calls.
pub async fn run_bounded<T, F, Fut>(
    label: &'static str,
    items: Vec<T>,
    opts: PoolOptions,
    op: F,
) -> anyhow::Result<usize>
where
    T: Send + 'static,
    F: Fn(T) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    let total = items.len();
    if total == 0 {
        return Ok(0);
    }

    let sem = Arc::new(Semaphore::new(opts.width.max(1)));
    let op = Arc::new(op);
    let done = Arc::new(AtomicUsize::new(0));
    let every = opts.progress_every.max(1);
    let mut set = JoinSet::new();

    for item in items {
        let permit = sem.clone().acquire_owned().await?;
        let op = op.clone();
        let done = done.clone();
        set.spawn(async move {
            let _permit = permit;
            op(item).await?;
            let n = done.fetch_add(1, Ordering::SeqCst) + 1;
            if n % every == 0 {
                tracing::info!(event = "pairq.pool.progress", op = label, done = n, total);
            }
            Ok::<(), anyhow::Error>(())
        });
    }

    while let Some(joined) = set.join_next().await {
        joined??;
    }

    Ok(done.load(Ordering::SeqCst))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_never_exceeds_width() -> anyhow::Result<()> {
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let opts = PoolOptions {
            width: 3,
            progress_every: 10,
        };

        let (f, p) = (in_flight.clone(), peak.clone());
        let n = run_bounded("test", (0..25).collect(), opts, move |_: u32| {
            let (f, p) = (f.clone(), p.clone());
            async move {
                let now = f.fetch_add(1, Ordering::SeqCst) + 1;
                p.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(2)).await;
                f.fetch_sub(1, Ordering::SeqCst);
                Ok(())
            }
        })
        .await?;

        assert_eq!(n, 25);
        assert!(peak.load(Ordering::SeqCst) <= 3);
        assert!(peak.load(Ordering::SeqCst) >= 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_first_error_propagates() {
        let res = run_bounded("test", vec![1, 2, 3], PoolOptions::default(), |i: u32| async move {
            if i == 2 {
                anyhow::bail!("store down");
            }
            Ok(())
        })
        .await;
        assert!(res.unwrap_err().to_string().contains("store down"));
    }

    #[tokio::test]
    async fn test_empty_is_noop() -> anyhow::Result<()> {
        let n = run_bounded("test", Vec::<u32>::new(), PoolOptions::default(), |_| async {
            Ok(())
        })
        .await?;
        assert_eq!(n, 0);
        Ok(())
    }
}
