use thiserror::Error;

/// Ошибки жизненного цикла пула и неверного использования API.
///
/// Ошибки обработчика задач сюда не попадают: они возвращаются как данные
/// внутри [`crate::model::TaskResult`].
#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum PoolError {
    #[error("invalid pool configuration: {0}")]
    InvalidConfig(String),

    #[error("pool is already running")]
    AlreadyStarted,

    #[error("pool has already been stopped")]
    AlreadyStopped,

    /// Submit после Stop
    #[error("task queue is closed")]
    QueueClosed,

    #[error("worker panicked: {0}")]
    WorkerPanicked(String),
}

impl PoolError {
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        PoolError::InvalidConfig(msg.into())
    }
}

/// Описание сбоя обработчика, доставляется потребителю результатов.
#[derive(Debug, Error, PartialEq, Eq, Clone)]
#[error("{message}")]
pub struct TaskError {
    message: String,
}

impl TaskError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    #[inline]
    pub fn message(&self) -> &str {
        &self.message
    }
}

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("server error: {0}")]
    Serve(#[from] std::io::Error),

    #[error("server task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("graceful shutdown timed out after {0:?}")]
    ShutdownTimeout(std::time::Duration),
}
