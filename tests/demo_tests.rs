#[cfg(test)]
mod tests {
    use conveyor::demo;

    #[tokio::test(start_paused = true)]
    async fn test_unbuffered_channels() {
        println!("\n=== TEST: Демо небуферизованного канала ===");
        let lines = demo::unbuffered_channels().await;
        assert_eq!(lines.len(), 6);
        assert!(lines.iter().all(|l| l.contains("received: message")));
        println!("  ✓ {} сообщений", lines.len());
    }

    #[tokio::test(start_paused = true)]
    async fn test_buffered_queue() {
        let lines = demo::buffered_queue().await;
        assert_eq!(lines.len(), 10);
        for id in 1..=10 {
            let name = format!("task-{} ", id);
            assert_eq!(lines.iter().filter(|l| l.contains(&name)).count(), 1, "{}", name);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_select_timeout() {
        let lines = demo::select_timeout().await;
        assert_eq!(lines.len(), 5, "{:?}", lines);
        assert_eq!(lines.iter().filter(|l| l.contains("from ch1")).count(), 3);
        assert_eq!(lines.iter().filter(|l| l.contains("from ch2")).count(), 2);
        assert!(!lines.iter().any(|l| l.contains("timeout")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_worker_pool_basic() {
        println!("\n=== TEST: Демо базового пула ===");
        let lines = demo::worker_pool_basic().await.unwrap();
        assert_eq!(lines.len(), 8);
        println!("  ✓ {} задач выполнено", lines.len());
    }

    #[tokio::test(start_paused = true)]
    async fn test_worker_pool_with_results() {
        let lines = demo::worker_pool_with_results().await.unwrap();
        assert_eq!(lines.len(), 6);
        assert_eq!(lines.iter().filter(|l| l.contains("failed")).count(), 1);
        assert!(lines.iter().all(|l| l.starts_with("processor ")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_fan_out_fan_in() {
        println!("\n=== TEST: Демо fan-out/fan-in ===");
        let mut values = demo::fan_out_fan_in().await;
        values.sort_unstable();
        assert_eq!(values, vec![2, 4, 4, 6, 8, 12]);
        println!("  ✓ Результаты: {:?}", values);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_all() {
        demo::run_all().await.unwrap();
    }
}
