//! Консольные демонстрации примитивов конкурентности.
//!
//! Каждая демонстрация пишет строки в лог и возвращает их, чтобы тесты могли
//! проверить вывод.

use super::{
    channels::merge,
    errors::{PoolError, TaskError},
    model::{Task, TaskResult},
    pool::WorkerPool,
};
use std::sync::Arc;
use rand::Rng;
use tokio::{
    sync::{mpsc, Mutex},
    task::JoinSet,
    time::{sleep, Duration},
};
use tokio_util::sync::CancellationToken;


fn random_millis(min: u64, spread: u64) -> Duration {
    Duration::from_millis(min + rand::thread_rng().gen_range(0..spread))
}

fn emit(demo: &'static str, line: String, lines: &mut Vec<String>) {
    tracing::info!(demo, "{}", line);
    lines.push(line);
}

async fn join_lines(mut set: JoinSet<Vec<String>>) -> Vec<String> {
    let mut lines = Vec::new();
    while let Some(joined) = set.join_next().await {
        match joined {
            Ok(part) => lines.extend(part),
            Err(err) => tracing::error!(error = %err, "Demo task failed"),
        }
    }
    lines
}


/// Два производителя и два потребителя на канале емкости 1.
pub async fn unbuffered_channels() -> Vec<String> {
    let (tx, rx) = mpsc::channel::<String>(1);
    let rx = Arc::new(Mutex::new(rx));
    let mut set = JoinSet::new();

    for producer in 1..=2u64 {
        let tx = tx.clone();
        set.spawn(async move {
            for n in 1..=3 {
                let message = format!("message {} from producer {}", n, producer);
                if tx.send(message).await.is_err() {
                    break;
                }
                sleep(Duration::from_millis(producer * 200)).await;
            }
            Vec::new()
        });
    }
    drop(tx);

    for consumer in 1..=2 {
        let rx = Arc::clone(&rx);
        set.spawn(async move {
            let mut lines = Vec::new();
            for _ in 0..3 {
                let message = rx.lock().await.recv().await;
                let Some(message) = message else { break };
                emit("unbuffered", format!("consumer {} received: {}", consumer, message), &mut lines);
                sleep(Duration::from_millis(150)).await;
            }
            lines
        });
    }

    let lines = join_lines(set).await;
    tracing::info!(demo = "unbuffered", "All messages processed");
    lines
}


/// Очередь задач на буферизованном канале: один производитель, три воркера.
pub async fn buffered_queue() -> Vec<String> {
    let (tx, rx) = mpsc::channel::<(u64, String)>(10);
    let rx = Arc::new(Mutex::new(rx));
    let mut workers = JoinSet::new();

    for worker in 1..=3 {
        let rx = Arc::clone(&rx);
        workers.spawn(async move {
            let mut lines = Vec::new();
            loop {
                let task = rx.lock().await.recv().await;
                let Some((_, name)) = task else { break };
                let took = random_millis(100, 300);
                sleep(took).await;
                emit("buffered", format!("worker {}: {} in {:?}", worker, name, took), &mut lines);
            }
            lines
        });
    }

    for id in 1..=10 {
        if tx.send((id, format!("task-{}", id))).await.is_err() {
            break;
        }
        sleep(random_millis(0, 150)).await;
    }
    // Закрываем очередь только после того, как производитель закончил
    drop(tx);

    join_lines(workers).await
}


/// `select!` по двум каналам с таймаутом ожидания 1.5 секунды.
pub async fn select_timeout() -> Vec<String> {
    let (tx1, mut rx1) = mpsc::channel::<String>(1);
    let (tx2, mut rx2) = mpsc::channel::<String>(1);

    tokio::spawn(async move {
        for n in 1..=3 {
            sleep(Duration::from_secs(1)).await;
            if tx1.send(format!("message {} from ch1", n)).await.is_err() {
                break;
            }
        }
    });
    tokio::spawn(async move {
        for n in 1..=2 {
            sleep(Duration::from_secs(2)).await;
            if tx2.send(format!("message {} from ch2", n)).await.is_err() {
                break;
            }
        }
    });

    let mut lines = Vec::new();
    for _ in 0..5 {
        tokio::select! {
            Some(message) = rx1.recv() => emit("select", format!("received: {}", message), &mut lines),
            Some(message) = rx2.recv() => emit("select", format!("received: {}", message), &mut lines),
            _ = sleep(Duration::from_millis(1500)) => {
                emit("select", "timeout: no messages for 1.5s".to_string(), &mut lines);
                break;
            }
        }
    }
    lines
}


/// Базовый пул: 3 воркера, 8 задач.
pub async fn worker_pool_basic() -> Result<Vec<String>, PoolError> {
    const WORKERS: usize = 3;
    const TASKS: u64 = 8;

    let pool = Arc::new(WorkerPool::<u64, String>::new(WORKERS)?);
    pool.start(CancellationToken::new(), |task: Task<u64>| async move {
        sleep(random_millis(200, 500)).await;
        TaskResult::success(task.id, format!("task {} done", task.payload))
    })?;

    let producer = {
        let pool = Arc::clone(&pool);
        tokio::spawn(async move {
            for id in 1..=TASKS {
                pool.submit(Task::new(id, id)).await?;
            }
            pool.stop().await
        })
    };

    let mut lines = Vec::new();
    let results = pool.results();
    while let Some(result) = results.recv().await {
        if let Some(output) = result.output {
            emit("pool_basic", output, &mut lines);
        }
    }

    match producer.await {
        Ok(stopped) => stopped?,
        Err(err) => return Err(PoolError::WorkerPanicked(err.to_string())),
    }
    Ok(lines)
}


/// Пул из двух воркеров и вторая стадия из двух обработчиков результатов.
pub async fn worker_pool_with_results() -> Result<Vec<String>, PoolError> {
    const WORKERS: usize = 2;
    const TASKS: u64 = 6;

    let pool = Arc::new(WorkerPool::<u64, String>::new(WORKERS)?);
    pool.start(CancellationToken::new(), |task: Task<u64>| async move {
        sleep(random_millis(100, 400)).await;
        if task.payload % 5 == 0 {
            return TaskResult::failure(task.id, TaskError::new("payload rejected"));
        }
        TaskResult::success(task.id, format!("task {} processed", task.payload))
    })?;

    let (formatted_tx, mut formatted_rx) = mpsc::channel::<String>(TASKS as usize);
    let mut processors = JoinSet::new();
    for processor in 1..=2 {
        let results = pool.results();
        let formatted_tx = formatted_tx.clone();
        processors.spawn(async move {
            while let Some(result) = results.recv().await {
                sleep(random_millis(50, 100)).await;
                let line = match result.into_result() {
                    Ok(output) => format!(
                        "processor {}: {}",
                        processor,
                        output.unwrap_or_default()
                    ),
                    Err(err) => format!("processor {}: failed: {}", processor, err),
                };
                if formatted_tx.send(line).await.is_err() {
                    break;
                }
            }
        });
    }
    // Выход второй стадии закрывается, когда завершатся оба обработчика
    drop(formatted_tx);

    let producer = {
        let pool = Arc::clone(&pool);
        tokio::spawn(async move {
            for id in 1..=TASKS {
                pool.submit(Task::new(id, id)).await?;
            }
            pool.stop().await
        })
    };

    let mut lines = Vec::new();
    while let Some(line) = formatted_rx.recv().await {
        emit("pool_results", line, &mut lines);
    }

    while processors.join_next().await.is_some() {}
    match producer.await {
        Ok(stopped) => stopped?,
        Err(err) => return Err(PoolError::WorkerPanicked(err.to_string())),
    }
    Ok(lines)
}


fn make_producer(token: CancellationToken, id: i64) -> mpsc::Receiver<i64> {
    let (tx, rx) = mpsc::channel(1);
    tokio::spawn(async move {
        for n in 1..=3 {
            tokio::select! {
                biased;
                _ = token.cancelled() => return,
                sent = tx.send(n * id) => {
                    if sent.is_err() {
                        return;
                    }
                    sleep(Duration::from_millis(200)).await;
                }
            }
        }
    });
    rx
}

fn make_doubler(token: CancellationToken, mut input: mpsc::Receiver<i64>) -> mpsc::Receiver<i64> {
    let (tx, rx) = mpsc::channel(1);
    tokio::spawn(async move {
        while let Some(n) = input.recv().await {
            tokio::select! {
                biased;
                _ = token.cancelled() => return,
                sent = tx.send(n * 2) => {
                    if sent.is_err() {
                        return;
                    }
                    sleep(Duration::from_millis(100)).await;
                }
            }
        }
    });
    rx
}

/// Fan-out на два конвейера и fan-in через [`merge`] с дедлайном 5 секунд.
pub async fn fan_out_fan_in() -> Vec<i64> {
    let token = CancellationToken::new();
    let deadline = token.clone();
    let timer = tokio::spawn(async move {
        sleep(Duration::from_secs(5)).await;
        deadline.cancel();
    });

    let first = make_doubler(token.clone(), make_producer(token.clone(), 1));
    let second = make_doubler(token.clone(), make_producer(token.clone(), 2));
    let mut merged = merge(token.clone(), vec![first, second]);

    let mut values = Vec::new();
    while let Some(value) = merged.recv().await {
        tracing::info!(demo = "fan_in", value, "Result");
        values.push(value);
    }

    timer.abort();
    token.cancel();
    values
}


/// Запускает все консольные демонстрации конкурентно.
pub async fn run_all() -> Result<(), PoolError> {
    let (unbuffered, buffered, select, basic, with_results, fan_in) = tokio::join!(
        unbuffered_channels(),
        buffered_queue(),
        select_timeout(),
        worker_pool_basic(),
        worker_pool_with_results(),
        fan_out_fan_in(),
    );

    let basic = basic?;
    let with_results = with_results?;
    tracing::info!(
        unbuffered = unbuffered.len(),
        buffered = buffered.len(),
        select = select.len(),
        pool_basic = basic.len(),
        pool_results = with_results.len(),
        fan_in = fan_in.len(),
        "Demos finished"
    );
    Ok(())
}
