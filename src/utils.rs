use super::errors::PoolError;
use std::{
    sync::atomic::{AtomicU64, Ordering},
    thread,
    time::Duration,
};
use crossbeam::{
    sync::WaitGroup,
    utils::CachePadded,
};

/// Имитация работы после каждого элемента в [`process_items`].
pub const ITEM_WORK: Duration = Duration::from_millis(10);


/// Потокобезопасный счетчик, принадлежащий владельцу, а не процессу.
#[derive(Debug, Default)]
pub struct Counter {
    value: CachePadded<AtomicU64>,
}

impl Counter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Возвращает новое значение.
    #[inline]
    pub fn increment(&self) -> u64 {
        self.value.fetch_add(1, Ordering::AcqRel) + 1
    }

    #[inline]
    pub fn value(&self) -> u64 {
        self.value.load(Ordering::Acquire)
    }
}


/// Запускает `processor` на каждом элементе в отдельном потоке и ждет все.
///
/// Синхронизация общих данных внутри `processor` на вызывающем.
pub fn process_items<T, F>(items: Vec<T>, processor: F) -> Result<(), PoolError>
where
    T: Send,
    F: Fn(T) + Sync,
{
    let processor = &processor;

    crossbeam::scope(|scope| {
        let wg = WaitGroup::new();
        for item in items {
            let wg = wg.clone();
            scope.spawn(move |_| {
                processor(item);
                thread::sleep(ITEM_WORK);
                drop(wg);
            });
        }
        wg.wait();
    })
    .map_err(|panic| PoolError::WorkerPanicked(format!("{:?}", panic)))
}
