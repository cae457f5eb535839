use super::errors::TaskError;

/// Единица работы: идентификатор и полезная нагрузка.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task<P> {
    pub id: u64,
    pub payload: P,
}

impl<P> Task<P> {
    pub fn new(id: u64, payload: P) -> Self {
        Self { id, payload }
    }
}

/// Итог обработки задачи.
///
/// `output` есть только при отсутствии `error`; оба поля пустые: допустимый
/// "пустой" результат.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskResult<O> {
    pub task_id: u64,
    pub output: Option<O>,
    pub error: Option<TaskError>,
}

impl<O> TaskResult<O> {
    pub fn success(task_id: u64, output: O) -> Self {
        Self {
            task_id,
            output: Some(output),
            error: None,
        }
    }

    pub fn failure(task_id: u64, error: TaskError) -> Self {
        Self {
            task_id,
            output: None,
            error: Some(error),
        }
    }

    pub fn empty(task_id: u64) -> Self {
        Self {
            task_id,
            output: None,
            error: None,
        }
    }

    #[inline]
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }

    pub fn into_result(self) -> Result<Option<O>, TaskError> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(self.output),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Created,
    Running,
    Draining,
    Stopped,
}

#[derive(Debug, Clone)]
pub struct PoolMetrics {
    pub workers: usize,
    pub busy_workers: usize,
    pub queued_tasks: usize,
    pub submitted: usize,
    pub processed: usize,
    pub failed: usize,
    pub dropped_results: usize,
    pub panicked_workers: usize,
}

impl PoolMetrics {
    pub fn utilization(&self) -> f64 {
        if self.workers == 0 {
            return 0.0;
        }
        self.busy_workers as f64 / self.workers as f64
    }

    pub fn success_rate(&self) -> f64 {
        if self.processed == 0 {
            return 1.0;
        }
        (self.processed - self.failed) as f64 / self.processed as f64
    }
}
