//! Примитивы конкурентности поверх tokio
//!
//! # Features
//! - Пул воркеров с ограниченными очередями задач и результатов
//! - Отмена через общий `CancellationToken` на каждой точке ожидания
//! - Graceful stop: очередь результатов закрывается после выхода всех воркеров
//! - Fan-in слияние каналов с единственным владельцем закрытия
//! - Демонстрационный HTTP сервер со счетчиками запросов

pub mod channels;
pub mod config;
pub mod demo;
pub mod errors;
pub mod handle;
pub mod model;
pub mod pool;
pub mod server;
pub mod telemetry;
pub mod utils;

pub use errors::{PoolError, TaskError};
pub use handle::ResultReceiver;
pub use model::{Lifecycle, PoolMetrics, Task, TaskResult};
pub use pool::{Config, WorkerPool};
