use anyhow::{anyhow, Result};
use std::sync::mpsc::{self, SyncSender};
use std::thread;

/// Number of results that may be buffered between the producer and the
/// consumer.
pub const QUEUE_CAPACITY: usize = 10;

/// Runs `produce` on its own thread and feeds everything it sends into
/// `consume` on the current thread.
///
/// `produce` signals the end of the stream by dropping the sender. If
/// `consume` fails, the receiving side is closed so the producer stops at
/// its next send; the consumer's error is reported in that case.
pub fn drain<T, P, C>(produce: P, mut consume: C) -> Result<()>
where
    T: Send,
    P: FnOnce(SyncSender<T>) -> Result<()> + Send,
    C: FnMut(T) -> Result<()>,
{
    let (tx, rx) = mpsc::sync_channel(QUEUE_CAPACITY);
    thread::scope(|scope| {
        let producer = scope.spawn(move || produce(tx));
        let consumed = rx.iter().try_for_each(&mut consume);
        drop(rx);
        let produced = producer
            .join()
            .map_err(|_| anyhow!("producer thread panicked"))?;
        consumed?;
        produced
    })
}
