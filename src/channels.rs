//! Fan-in и простые канальные стадии.
//!
//! Выход каждой функции закрывается ровно один раз и только одним владельцем:
//! отдельной задачей-координатором, которая держит исходный `Sender` и
//! отпускает его, когда все читатели входов завершились.

use futures::stream::{self, Stream, StreamExt};
use tokio::{
    sync::mpsc,
    task::JoinSet,
};
use tokio_util::sync::CancellationToken;

/// Ближайший аналог небуферизованного канала в tokio.
pub const MERGE_CAPACITY: usize = 1;


/// Сливает входные каналы в один.
///
/// Порядок внутри одного входа сохраняется, чередование между входами не
/// определено. Выход закрывается, когда закрыты все входы или отменен
/// `token`; непрочитанные элементы при отмене теряются.
pub fn merge<T>(token: CancellationToken, inputs: Vec<mpsc::Receiver<T>>) -> mpsc::Receiver<T>
where
    T: Send + 'static,
{
    let streams = inputs.into_iter().map(receiver_stream).collect();
    merge_streams(token, streams)
}

/// То же, что [`merge`], для произвольных потоков.
pub fn merge_streams<T, S>(token: CancellationToken, inputs: Vec<S>) -> mpsc::Receiver<T>
where
    T: Send + 'static,
    S: Stream<Item = T> + Send + 'static,
{
    let (tx, rx) = mpsc::channel(MERGE_CAPACITY);
    let mut readers = JoinSet::new();

    for (index, input) in inputs.into_iter().enumerate() {
        let out = tx.clone();
        let token = token.clone();
        readers.spawn(async move {
            forward(index, input, out, token).await;
        });
    }

    tokio::spawn(async move {
        while let Some(joined) = readers.join_next().await {
            if let Err(err) = joined {
                tracing::warn!(error = %err, "Merge reader failed");
            }
        }
        // Единственная точка закрытия выхода
        drop(tx);
        tracing::trace!("Merge output closed");
    });

    rx
}

/// Слияние без отмены: выход закрывается только когда закрыты все входы.
pub fn safe_merge<T>(inputs: Vec<mpsc::Receiver<T>>) -> mpsc::Receiver<T>
where
    T: Send + 'static,
{
    merge(CancellationToken::new(), inputs)
}

/// Одностадийный преобразователь с буферизованным выходом.
///
/// Емкость выхода `max(buffer, 1)`. Порядок сохраняется; выход закрывается
/// после закрытия входа или ухода читателя.
pub fn map_buffered<T, U, F>(mut input: mpsc::Receiver<T>, buffer: usize, f: F) -> mpsc::Receiver<U>
where
    T: Send + 'static,
    U: Send + 'static,
    F: Fn(T) -> U + Send + 'static,
{
    let (tx, rx) = mpsc::channel(buffer.max(1));

    tokio::spawn(async move {
        while let Some(value) = input.recv().await {
            if tx.send(f(value)).await.is_err() {
                break;
            }
        }
    });

    rx
}


fn receiver_stream<T>(receiver: mpsc::Receiver<T>) -> impl Stream<Item = T> + Send + 'static
where
    T: Send + 'static,
{
    stream::unfold(receiver, |mut receiver| async move {
        receiver.recv().await.map(|value| (value, receiver))
    })
}

async fn forward<T, S>(index: usize, input: S, out: mpsc::Sender<T>, token: CancellationToken)
where
    S: Stream<Item = T>,
{
    tokio::pin!(input);

    loop {
        let value = tokio::select! {
            biased;
            _ = token.cancelled() => break,
            value = input.next() => match value {
                Some(value) => value,
                None => break,
            },
        };

        tokio::select! {
            biased;
            _ = token.cancelled() => break,
            sent = out.send(value) => {
                if sent.is_err() {
                    break;
                }
            }
        }
    }

    tracing::trace!(input = index, "Merge reader finished");
}
