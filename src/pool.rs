use super::{
    errors::PoolError,
    handle::ResultReceiver,
    model::{
        Lifecycle,
        PoolMetrics,
        Task,
        TaskResult,
    },
};
use std::{
    future::Future,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};
use crossbeam::utils::CachePadded;
use parking_lot::Mutex;
use tokio::{
    sync::{mpsc, Mutex as AsyncMutex},
    task::JoinSet,
};
use tokio_util::sync::CancellationToken;
use tracing::Instrument;


/// Конфигурация пула воркеров
#[derive(Debug, Clone)]
pub struct Config {
    pub num_workers: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self::cpu_bound()
    }
}

impl Config {
    pub fn new(num_workers: usize) -> Self {
        Self { num_workers }
    }

    pub fn cpu_bound() -> Self {
        Self {
            num_workers: num_cpus::get(),
        }
    }

    pub fn io_bound() -> Self {
        Self {
            num_workers: num_cpus::get() * 2,
        }
    }

    /// Емкость и очереди задач, и очереди результатов.
    #[inline]
    pub fn queue_capacity(&self) -> usize {
        self.num_workers * 2
    }

    pub fn validate(&self) -> Result<(), PoolError> {
        if self.num_workers == 0 {
            return Err(PoolError::invalid_config("worker count must be at least 1"));
        }
        Ok(())
    }
}


#[derive(Default)]
struct PoolStats {
    submitted: CachePadded<AtomicUsize>,
    processed: CachePadded<AtomicUsize>,
    failed: CachePadded<AtomicUsize>,
    dropped_results: CachePadded<AtomicUsize>,
    panicked_workers: CachePadded<AtomicUsize>,
    busy_workers: CachePadded<AtomicUsize>,
}

struct BusyGuard<'a>(&'a AtomicUsize);

impl<'a> BusyGuard<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::Relaxed);
        Self(counter)
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::Relaxed);
    }
}

type SharedReceiver<T> = Arc<AsyncMutex<mpsc::Receiver<T>>>;

struct WorkerContext<P, O> {
    tasks: SharedReceiver<Task<P>>,
    results: mpsc::Sender<TaskResult<O>>,
    token: CancellationToken,
    stats: Arc<PoolStats>,
}


/// Пул с фиксированным числом воркеров и ограниченными очередями задач и результатов.
///
/// Жизненный цикл: `Created -> Running -> Draining -> Stopped`. Очередь
/// результатов закрывается только в [`WorkerPool::stop`], после выхода всех
/// воркеров, поэтому запись в закрытую очередь невозможна.
pub struct WorkerPool<P, O> {
    config: Config,
    lifecycle: Arc<Mutex<Lifecycle>>,
    task_tx: Mutex<Option<mpsc::Sender<Task<P>>>>,
    task_rx: SharedReceiver<Task<P>>,
    result_tx: Mutex<Option<mpsc::Sender<TaskResult<O>>>>,
    results: ResultReceiver<O>,
    workers: Mutex<Option<JoinSet<()>>>,
    stats: Arc<PoolStats>,
}

impl<P, O> WorkerPool<P, O>
where
    P: Send + 'static,
    O: Send + 'static,
{
    pub fn new(num_workers: usize) -> Result<Self, PoolError> {
        Self::with_config(Config::new(num_workers))
    }

    pub fn with_config(config: Config) -> Result<Self, PoolError> {
        config.validate()?;

        let capacity = config.queue_capacity();
        let (task_tx, task_rx) = mpsc::channel(capacity);
        let (result_tx, result_rx) = mpsc::channel(capacity);

        Ok(Self {
            config,
            lifecycle: Arc::new(Mutex::new(Lifecycle::Created)),
            task_tx: Mutex::new(Some(task_tx)),
            task_rx: Arc::new(AsyncMutex::new(task_rx)),
            result_tx: Mutex::new(Some(result_tx)),
            results: ResultReceiver::new(result_rx),
            workers: Mutex::new(None),
            stats: Arc::new(PoolStats::default()),
        })
    }

    #[inline]
    pub fn config(&self) -> &Config {
        &self.config
    }

    #[inline]
    pub fn lifecycle(&self) -> Lifecycle {
        *self.lifecycle.lock()
    }

    /// Запускает `num_workers` воркеров, разделяющих `token` и `processor`.
    ///
    /// Должен вызываться внутри контекста tokio runtime: воркеры
    /// спавнятся в текущий runtime, вне его вызов паникует.
    ///
    /// Обработчик вызывается конкурентно без дополнительных блокировок. Ошибки
    /// он возвращает внутри [`TaskResult`]; паника убивает только свой воркер.
    pub fn start<F, Fut>(&self, token: CancellationToken, processor: F) -> Result<(), PoolError>
    where
        F: Fn(Task<P>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = TaskResult<O>> + Send + 'static,
    {
        let mut lifecycle = self.lifecycle.lock();
        match *lifecycle {
            Lifecycle::Created => {}
            Lifecycle::Running => return Err(PoolError::AlreadyStarted),
            Lifecycle::Draining | Lifecycle::Stopped => return Err(PoolError::AlreadyStopped),
        }

        let results = self
            .result_tx
            .lock()
            .clone()
            .ok_or(PoolError::AlreadyStopped)?;
        let processor = Arc::new(processor);
        let mut workers = JoinSet::new();

        for id in 0..self.config.num_workers {
            let ctx = WorkerContext {
                tasks: Arc::clone(&self.task_rx),
                results: results.clone(),
                token: token.clone(),
                stats: Arc::clone(&self.stats),
            };
            let processor = Arc::clone(&processor);
            workers.spawn(
                worker_loop(ctx, processor).instrument(tracing::debug_span!("worker", id)),
            );
        }

        *self.workers.lock() = Some(workers);
        *lifecycle = Lifecycle::Running;

        tracing::debug!(
            workers = self.config.num_workers,
            capacity = self.config.queue_capacity(),
            "Worker pool started"
        );
        Ok(())
    }

    /// Блокирующая постановка в очередь: ждет, пока в очереди задач не появится место.
    pub async fn submit(&self, task: Task<P>) -> Result<(), PoolError> {
        let sender = self.task_tx.lock().clone().ok_or(PoolError::QueueClosed)?;
        sender
            .send(task)
            .await
            .map_err(|_| PoolError::QueueClosed)?;
        self.stats.submitted.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    #[inline]
    pub fn results(&self) -> ResultReceiver<O> {
        self.results.clone()
    }

    /// Закрывает очередь задач, дожидается выхода всех воркеров и только
    /// затем закрывает очередь результатов.
    ///
    /// Слив идет в отдельной задаче: если future `stop` отброшен (например,
    /// по таймауту), воркеры все равно дорабатывают, очередь результатов
    /// закрывается и пул переходит в `Stopped`.
    ///
    /// Повторный вызов возвращает [`PoolError::AlreadyStopped`]. Пока
    /// токен не отменен, результаты должен кто-то читать, иначе воркер,
    /// ждущий места в очереди результатов, не завершится.
    pub async fn stop(&self) -> Result<(), PoolError> {
        {
            let mut lifecycle = self.lifecycle.lock();
            if matches!(*lifecycle, Lifecycle::Draining | Lifecycle::Stopped) {
                return Err(PoolError::AlreadyStopped);
            }
            *lifecycle = Lifecycle::Draining;
        }

        drop(self.task_tx.lock().take());
        tracing::debug!("Task queue closed, draining workers");

        let workers = self.workers.lock().take();
        let result_tx = self.result_tx.lock().take();
        let lifecycle = Arc::clone(&self.lifecycle);
        let stats = Arc::clone(&self.stats);

        let drain = tokio::spawn(async move {
            if let Some(mut workers) = workers {
                while let Some(joined) = workers.join_next().await {
                    if let Err(err) = joined {
                        if err.is_panic() {
                            stats.panicked_workers.fetch_add(1, Ordering::Relaxed);
                            tracing::error!(error = %err, "Worker panicked");
                        } else {
                            tracing::warn!(error = %err, "Worker aborted");
                        }
                    }
                }
            }

            drop(result_tx);
            *lifecycle.lock() = Lifecycle::Stopped;

            tracing::debug!(
                processed = stats.processed.load(Ordering::Relaxed),
                dropped = stats.dropped_results.load(Ordering::Relaxed),
                "Worker pool stopped"
            );
        });

        drain
            .await
            .map_err(|err| PoolError::WorkerPanicked(err.to_string()))
    }

    /// Запускает пул, отправляет все задачи и собирает `tasks.len()` результатов.
    ///
    /// При отмене токена возвращает то, что успело прийти. Соответствие
    /// результатов задачам проверяйте по `task_id`. `stop` не вызывается.
    pub async fn process_tasks<F, Fut>(
        &self,
        token: CancellationToken,
        tasks: Vec<Task<P>>,
        processor: F,
    ) -> Result<Vec<TaskResult<O>>, PoolError>
    where
        F: Fn(Task<P>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = TaskResult<O>> + Send + 'static,
    {
        self.start(token.clone(), processor)?;

        let expected = tasks.len();
        let results = self.results();

        let submit_all = async {
            for task in tasks {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => break,
                    submitted = self.submit(task) => submitted?,
                }
            }
            Ok::<_, PoolError>(())
        };

        let collect = async {
            let mut collected = Vec::with_capacity(expected);
            while collected.len() < expected {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => break,
                    result = results.recv() => match result {
                        Some(result) => collected.push(result),
                        None => break,
                    },
                }
            }
            Ok::<_, PoolError>(collected)
        };

        let ((), collected) = tokio::try_join!(submit_all, collect)?;

        if collected.len() < expected {
            tracing::debug!(
                expected,
                collected = collected.len(),
                "Collection cut short by cancellation"
            );
        }
        Ok(collected)
    }

    pub fn metrics(&self) -> PoolMetrics {
        let queued_tasks = self
            .task_tx
            .lock()
            .as_ref()
            .map(|tx| tx.max_capacity() - tx.capacity())
            .unwrap_or(0);

        PoolMetrics {
            workers: self.config.num_workers,
            busy_workers: self.stats.busy_workers.load(Ordering::Relaxed),
            queued_tasks,
            submitted: self.stats.submitted.load(Ordering::Relaxed),
            processed: self.stats.processed.load(Ordering::Relaxed),
            failed: self.stats.failed.load(Ordering::Relaxed),
            dropped_results: self.stats.dropped_results.load(Ordering::Relaxed),
            panicked_workers: self.stats.panicked_workers.load(Ordering::Relaxed),
        }
    }
}


async fn recv_shared<T>(receiver: &SharedReceiver<T>) -> Option<T> {
    receiver.lock().await.recv().await
}

async fn worker_loop<P, O, F, Fut>(ctx: WorkerContext<P, O>, processor: Arc<F>)
where
    F: Fn(Task<P>) -> Fut,
    Fut: Future<Output = TaskResult<O>>,
{
    tracing::trace!("Worker started");

    loop {
        // Idle
        let task = tokio::select! {
            biased;
            _ = ctx.token.cancelled() => {
                tracing::trace!("Cancelled while idle");
                break;
            }
            task = recv_shared(&ctx.tasks) => match task {
                Some(task) => task,
                None => {
                    tracing::trace!("Task queue closed");
                    break;
                }
            },
        };

        // Processing: взятая задача всегда обрабатывается до конца
        let task_id = task.id;
        let result = {
            let _busy = BusyGuard::enter(&ctx.stats.busy_workers);
            processor(task).await
        };
        ctx.stats.processed.fetch_add(1, Ordering::Relaxed);
        if let Some(err) = &result.error {
            ctx.stats.failed.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(task_id, error = %err, "Task failed");
        }

        // Доставка best-effort: при отмене результат теряется
        tokio::select! {
            biased;
            _ = ctx.token.cancelled() => {
                ctx.stats.dropped_results.fetch_add(1, Ordering::Relaxed);
                tracing::trace!(task_id, "Result dropped on cancellation");
                break;
            }
            sent = ctx.results.send(result) => {
                if sent.is_err() {
                    ctx.stats.dropped_results.fetch_add(1, Ordering::Relaxed);
                    break;
                }
            }
        }
    }

    tracing::trace!("Worker exited");
}
