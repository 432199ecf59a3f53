use std::future::Future;
use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

use crate::error::{ResearchError, ResearchResult};

/// 以给定的最大并发数执行一组future，全部完成后按输入顺序返回结果
///
/// 任一时刻处于执行中的future不超过`max_concurrent`个（至少为1）。
pub async fn do_parallel_with_limit<F, T>(futures: Vec<F>, max_concurrent: usize) -> Vec<T>
where
    F: Future<Output = T>,
{
    let semaphore = Arc::new(Semaphore::new(max_concurrent.max(1)));

    let guarded = futures.into_iter().map(|future| {
        let semaphore = semaphore.clone();
        async move {
            // 信号量不会被关闭，acquire失败时退化为不限流执行
            let _permit = semaphore.acquire().await.ok();
            future.await
        }
    });

    join_all(guarded).await
}

/// 让future与取消信号赛跑，信号先触发时放弃执行中的future并返回`Cancelled`
pub async fn cancellable<F, T>(cancel: &CancellationToken, future: F) -> ResearchResult<T>
where
    F: Future<Output = ResearchResult<T>>,
{
    if cancel.is_cancelled() {
        return Err(ResearchError::Cancelled);
    }

    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(ResearchError::Cancelled),
        result = future => result,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_parallel_limit_is_respected() {
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let futures: Vec<_> = (0..8)
            .map(|i| {
                let in_flight = in_flight.clone();
                let peak = peak.clone();
                async move {
                    let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    in_flight.fetch_sub(1, Ordering::SeqCst);
                    i
                }
            })
            .collect();

        let results = do_parallel_with_limit(futures, 3).await;

        assert_eq!(results, (0..8).collect::<Vec<_>>());
        assert!(peak.load(Ordering::SeqCst) <= 3);
        assert!(peak.load(Ordering::SeqCst) >= 2, "futures should overlap");
    }

    #[tokio::test]
    async fn test_zero_limit_still_makes_progress() {
        let futures: Vec<_> = (0..3).map(|i| async move { i * 2 }).collect();
        assert_eq!(do_parallel_with_limit(futures, 0).await, vec![0, 2, 4]);
    }

    #[tokio::test]
    async fn test_cancellable_abandons_pending_future() {
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            trigger.cancel();
        });

        let result: ResearchResult<()> = cancellable(&cancel, async {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(())
        })
        .await;

        assert!(matches!(result, Err(ResearchError::Cancelled)));
    }

    #[tokio::test]
    async fn test_cancellable_skips_work_when_already_cancelled() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let ran = Arc::new(AtomicUsize::new(0));
        let counter = ran.clone();

        let result = cancellable(&cancel, async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(1)
        })
        .await;

        assert!(result.unwrap_err().is_cancelled());
        assert_eq!(ran.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_cancellable_passes_result_through() {
        let cancel = CancellationToken::new();
        assert_eq!(cancellable(&cancel, async { Ok(7) }).await.unwrap(), 7);
    }
}
