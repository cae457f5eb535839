use super::model::TaskResult;
use std::sync::Arc;
use futures::stream::{self, Stream};
use tokio::{
    sync::{mpsc, Mutex},
    time::Duration,
};


/// Handle на очередь результатов пула.
///
/// Клоны делят один приемник: каждый результат получает ровно один читатель,
/// широковещательной рассылки нет.
pub struct ResultReceiver<O> {
    inner: Arc<Mutex<mpsc::Receiver<TaskResult<O>>>>,
}

impl<O> Clone for ResultReceiver<O> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<O> ResultReceiver<O> {

    pub(crate) fn new(receiver: mpsc::Receiver<TaskResult<O>>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(receiver)),
        }
    }

    /// `None` после закрытия очереди результатов и ее опустошения.
    #[inline]
    pub async fn recv(&self) -> Option<TaskResult<O>> {
        self.inner.lock().await.recv().await
    }

    /// `None` и по таймауту, и после закрытия очереди.
    pub async fn recv_timeout(&self, timeout: Duration) -> Option<TaskResult<O>> {
        tokio::time::timeout(timeout, self.recv()).await.ok().flatten()
    }

    /// Не ждет; `None`, если результата нет прямо сейчас или приемник занят другим читателем.
    pub fn try_recv(&self) -> Option<TaskResult<O>> {
        let mut guard = self.inner.try_lock().ok()?;
        guard.try_recv().ok()
    }

    /// Читает до закрытия очереди.
    pub async fn collect(&self) -> Vec<TaskResult<O>> {
        let mut results = Vec::new();
        while let Some(result) = self.recv().await {
            results.push(result);
        }
        results
    }

    pub fn into_stream(self) -> impl Stream<Item = TaskResult<O>>
    where
        O: Send + 'static,
    {
        stream::unfold(self, |receiver| async move {
            receiver.recv().await.map(|result| (result, receiver))
        })
    }
}
