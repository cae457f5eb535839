#[cfg(test)]
mod tests {
    use conveyor::{
        channels::merge,
        errors::TaskError,
        model::{Task, TaskResult},
        pool::{Config, WorkerPool},
    };
    use std::{
        collections::HashSet,
        future::Future,
        sync::Arc,
        time::{Duration, Instant},
    };
    use tokio::sync::mpsc;
    use tokio_util::sync::CancellationToken;

    async fn measure<F, Fut, T>(name: &str, f: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let start = Instant::now();
        let result = f().await;
        let elapsed = start.elapsed();
        println!("✓ {}: {:?}", name, elapsed);
        result
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn load_test_1_small_fast_tasks() {
        println!("\n=== LOAD TEST 1: 10k быстрых задач (100μs каждая) ===");
        let pool = WorkerPool::<u64, u64>::with_config(Config::io_bound()).unwrap();
        let tasks: Vec<_> = (0..10_000).map(|id| Task::new(id, id)).collect();

        let results = measure("10k tasks @ 100μs", || async {
            pool.process_tasks(CancellationToken::new(), tasks, |task: Task<u64>| async move {
                tokio::time::sleep(Duration::from_micros(100)).await;
                TaskResult::success(task.id, task.payload * 2)
            })
            .await
            .unwrap()
        })
        .await;

        assert_eq!(results.len(), 10_000);
        let ids: HashSet<u64> = results.iter().map(|r| r.task_id).collect();
        assert_eq!(ids.len(), 10_000);

        pool.stop().await.unwrap();
        let metrics = pool.metrics();
        println!("  Обработано: {}/{}", metrics.processed, results.len());
        println!("  Success rate: {:.1}%", metrics.success_rate() * 100.0);
        assert_eq!(metrics.dropped_results, 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn load_test_2_many_more_tasks_than_capacity() {
        println!("\n=== LOAD TEST 2: 1 воркер, 5k задач при емкости 2 ===");
        let pool = WorkerPool::<u64, String>::new(1).unwrap();
        let tasks: Vec<_> = (0..5_000).map(|id| Task::new(id, id)).collect();

        let results = measure("5k tasks through capacity 2", || async {
            tokio::time::timeout(
                Duration::from_secs(30),
                pool.process_tasks(CancellationToken::new(), tasks, |task: Task<u64>| async move {
                    if task.payload % 100 == 0 {
                        return TaskResult::failure(task.id, TaskError::new("every hundredth"));
                    }
                    TaskResult::success(task.id, format!("result_{}", task.payload))
                }),
            )
            .await
            .expect("process_tasks не должен блокироваться")
            .unwrap()
        })
        .await;

        let failed = results.iter().filter(|r| !r.is_ok()).count();
        assert_eq!(results.len(), 5_000);
        assert_eq!(failed, 50);
        pool.stop().await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn load_test_3_cancellation_mid_run() {
        println!("\n=== LOAD TEST 3: отмена посреди обработки ===");
        let pool = WorkerPool::<u64, u64>::new(8).unwrap();
        let token = CancellationToken::new();
        let tasks: Vec<_> = (0..2_000).map(|id| Task::new(id, id)).collect();

        let deadline = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            deadline.cancel();
        });

        let results = measure("cancelled run", || async {
            pool.process_tasks(token.clone(), tasks, |task: Task<u64>| async move {
                tokio::time::sleep(Duration::from_millis(5)).await;
                TaskResult::success(task.id, task.payload)
            })
            .await
            .unwrap()
        })
        .await;

        assert!(results.len() < 2_000, "Отмена должна прервать сбор");
        tokio::time::timeout(Duration::from_secs(2), pool.stop())
            .await
            .expect("stop после отмены должен завершаться быстро")
            .unwrap();

        let metrics = pool.metrics();
        println!("  Получено: {}, обработано: {}, потеряно: {}",
                 results.len(), metrics.processed, metrics.dropped_results);
        assert!(metrics.processed >= results.len());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn load_test_4_concurrent_submitters() {
        println!("\n=== LOAD TEST 4: 50 отправителей по 100 задач ===");
        let pool = Arc::new(WorkerPool::<u64, u64>::new(16).unwrap());
        pool.start(CancellationToken::new(), |task: Task<u64>| async move {
            TaskResult::success(task.id, task.payload)
        })
        .unwrap();

        let submitters: Vec<_> = (0..50u64)
            .map(|s| {
                let pool = Arc::clone(&pool);
                tokio::spawn(async move {
                    for i in 0..100u64 {
                        let id = s * 100 + i;
                        pool.submit(Task::new(id, id)).await.unwrap();
                    }
                })
            })
            .collect();

        let results = pool.results();
        let collector = tokio::spawn(async move { results.collect().await });

        for submitter in submitters {
            submitter.await.unwrap();
        }
        pool.stop().await.unwrap();

        let collected = collector.await.unwrap();
        let ids: HashSet<u64> = collected.iter().map(|r| r.task_id).collect();
        assert_eq!(collected.len(), 5_000);
        assert_eq!(ids.len(), 5_000);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn load_test_5_wide_merge() {
        println!("\n=== LOAD TEST 5: слияние 32 каналов ===");
        let mut inputs = Vec::new();
        for source in 0..32u64 {
            let (tx, rx) = mpsc::channel(16);
            inputs.push(rx);
            tokio::spawn(async move {
                for n in 0..500u64 {
                    if tx.send((source, n)).await.is_err() {
                        break;
                    }
                }
            });
        }

        let mut merged = merge(CancellationToken::new(), inputs);
        let mut last_seen = vec![None::<u64>; 32];
        let mut total = 0;
        while let Some((source, n)) = merged.recv().await {
            let last = &mut last_seen[source as usize];
            assert!(last.map_or(true, |prev| prev < n), "Порядок внутри входа нарушен");
            *last = Some(n);
            total += 1;
        }
        assert_eq!(total, 32 * 500);
    }
}
