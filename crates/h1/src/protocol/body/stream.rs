use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll, ready};

use bytes::Bytes;
use futures::FutureExt;
use futures::channel::oneshot;
use futures::future::poll_fn;
use tracing::{trace, warn};

use crate::protocol::BodyError;

/// One element of a chunked body stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamItem {
    Chunk(Bytes),
    End,
    Error(BodyError),
}

impl StreamItem {
    /// `End` and `Error` terminate the stream.
    #[inline]
    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamItem::End | StreamItem::Error(_))
    }
}

type PullCallback = Box<dyn FnOnce(StreamItem) + Send>;

struct Shared {
    queue: VecDeque<StreamItem>,
    pending: Option<PullCallback>,
    // a terminal element was pushed
    terminated: bool,
    // a terminal element was delivered
    closed: bool,
    consumer_released: bool,
}

fn lock(shared: &Mutex<Shared>) -> MutexGuard<'_, Shared> {
    shared.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Creates a single-producer/single-consumer chunked body stream.
///
/// The same pair serves both directions: for a transfer-chunked request body the
/// connection pushes and the responder pulls, for a streamed response body the
/// responder pushes and the serializer pulls.
///
/// Elements are delivered in push order. Pushing never waits: elements that
/// arrive while no pull is outstanding are queued without bound, and the
/// consumer retires them at its own pace.
pub fn channel() -> (BodySender, BodyStream) {
    let shared = Arc::new(Mutex::new(Shared {
        queue: VecDeque::new(),
        pending: None,
        terminated: false,
        closed: false,
        consumer_released: false,
    }));

    (BodySender { shared: Arc::clone(&shared) }, BodyStream { shared, receiving: None })
}

/// The producer half of a chunked body stream.
///
/// Dropping a sender before it pushed `End` or `Error` delivers
/// `Error(BodyError::Aborted)` to the consumer.
pub struct BodySender {
    shared: Arc<Mutex<Shared>>,
}

impl BodySender {
    /// Pushes one element.
    ///
    /// If the consumer is waiting in [`BodyStream::pull`], its callback receives
    /// the element directly, otherwise the element is queued. Once the consumer
    /// has released the stream, elements are discarded.
    ///
    /// # Errors
    ///
    /// Returns [`BodyError::Closed`] if a terminal element was already pushed.
    pub fn push(&self, item: StreamItem) -> Result<(), BodyError> {
        let callback = {
            let mut shared = lock(&self.shared);
            if shared.terminated {
                warn!(terminal = item.is_terminal(), "push after end of body stream, item rejected");
                return Err(BodyError::Closed);
            }
            shared.terminated = item.is_terminal();

            if shared.consumer_released {
                trace!("body stream consumer released, discard item");
                return Ok(());
            }

            match shared.pending.take() {
                Some(callback) => {
                    shared.closed = item.is_terminal();
                    callback
                }
                None => {
                    shared.queue.push_back(item);
                    return Ok(());
                }
            }
        };

        // invoked outside the lock, the callback may pull again
        callback(item);
        Ok(())
    }

    pub fn push_chunk(&self, bytes: Bytes) -> Result<(), BodyError> {
        self.push(StreamItem::Chunk(bytes))
    }

    pub fn push_end(&self) -> Result<(), BodyError> {
        self.push(StreamItem::End)
    }

    pub fn push_error(&self, error: BodyError) -> Result<(), BodyError> {
        self.push(StreamItem::Error(error))
    }

    /// Returns true once `End` or `Error` has been pushed.
    pub fn is_terminated(&self) -> bool {
        lock(&self.shared).terminated
    }

    /// Returns true once the consumer dropped its half.
    pub fn is_released(&self) -> bool {
        lock(&self.shared).consumer_released
    }

    /// Number of pushed elements the consumer has not pulled yet.
    pub fn queued_len(&self) -> usize {
        lock(&self.shared).queue.len()
    }
}

impl Drop for BodySender {
    fn drop(&mut self) {
        if !self.is_terminated() {
            let _ = self.push_error(BodyError::aborted("body producer released before end of stream"));
        }
    }
}

impl std::fmt::Debug for BodySender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BodySender").field("terminated", &self.is_terminated()).finish()
    }
}

/// The consumer half of a chunked body stream.
pub struct BodyStream {
    shared: Arc<Mutex<Shared>>,
    receiving: Option<oneshot::Receiver<StreamItem>>,
}

impl BodyStream {
    /// Requests the next element; `callback` is invoked exactly once with it.
    ///
    /// A queued element is delivered synchronously, otherwise the callback waits
    /// for the next push. After the terminal element was delivered, pulling is
    /// a no-op and the callback is dropped uninvoked.
    ///
    /// # Errors
    ///
    /// Returns [`BodyError::PullInFlight`] if an earlier callback has not fired yet.
    pub fn pull<F>(&mut self, callback: F) -> Result<(), BodyError>
    where
        F: FnOnce(StreamItem) + Send + 'static,
    {
        let item = {
            let mut shared = lock(&self.shared);
            if shared.closed {
                trace!("pull on closed body stream");
                return Ok(());
            }

            if shared.pending.is_some() {
                warn!("pull while another pull is outstanding, request rejected");
                return Err(BodyError::PullInFlight);
            }

            match shared.queue.pop_front() {
                Some(item) => {
                    shared.closed = item.is_terminal();
                    item
                }
                None => {
                    shared.pending = Some(Box::new(callback));
                    return Ok(());
                }
            }
        };

        callback(item);
        Ok(())
    }

    /// Returns true once the terminal element was delivered.
    pub fn is_closed(&self) -> bool {
        self.receiving.is_none() && lock(&self.shared).closed
    }

    /// Polls for the next element, `None` after the terminal element was delivered.
    pub fn poll_item(&mut self, cx: &mut Context<'_>) -> Poll<Option<StreamItem>> {
        loop {
            if let Some(receiver) = &mut self.receiving {
                let result = ready!(receiver.poll_unpin(cx));
                self.receiving = None;
                let item = result.unwrap_or_else(|_canceled| StreamItem::Error(BodyError::aborted("body stream pull canceled")));
                return Poll::Ready(Some(item));
            }

            if self.is_closed() {
                return Poll::Ready(None);
            }

            let (tx, rx) = oneshot::channel();
            if let Err(e) = self.pull(move |item| {
                let _ = tx.send(item);
            }) {
                return Poll::Ready(Some(StreamItem::Error(e)));
            }
            self.receiving = Some(rx);
        }
    }

    /// Waits for the next element, `None` after the terminal element was delivered.
    pub async fn next_item(&mut self) -> Option<StreamItem> {
        poll_fn(|cx| self.poll_item(cx)).await
    }
}

impl Drop for BodyStream {
    fn drop(&mut self) {
        let mut shared = lock(&self.shared);
        shared.consumer_released = true;
        shared.queue.clear();
        shared.pending.take();
    }
}

impl std::fmt::Debug for BodyStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BodyStream").field("closed", &self.is_closed()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::task::noop_waker_ref;
    use std::sync::Mutex as StdMutex;

    fn collector() -> (Arc<StdMutex<Vec<StreamItem>>>, impl Fn() -> Box<dyn FnOnce(StreamItem) + Send>) {
        let received = Arc::new(StdMutex::new(Vec::new()));
        let sink = Arc::clone(&received);
        let make = move || {
            let sink = Arc::clone(&sink);
            Box::new(move |item| sink.lock().unwrap().push(item)) as Box<dyn FnOnce(StreamItem) + Send>
        };
        (received, make)
    }

    #[test]
    fn pull_delivers_queued_items_synchronously() {
        let (sender, mut stream) = channel();
        sender.push_chunk(Bytes::from_static(b"hello")).unwrap();
        sender.push_end().unwrap();

        let (received, callback) = collector();
        stream.pull(callback()).unwrap();
        assert_eq!(*received.lock().unwrap(), vec![StreamItem::Chunk(Bytes::from_static(b"hello"))]);

        stream.pull(callback()).unwrap();
        assert_eq!(received.lock().unwrap().last(), Some(&StreamItem::End));
        assert!(stream.is_closed());
    }

    #[test]
    fn pending_pull_is_satisfied_by_next_push() {
        let (sender, mut stream) = channel();
        let (received, callback) = collector();

        stream.pull(callback()).unwrap();
        assert!(received.lock().unwrap().is_empty());

        sender.push_chunk(Bytes::from_static(b"a")).unwrap();
        assert_eq!(*received.lock().unwrap(), vec![StreamItem::Chunk(Bytes::from_static(b"a"))]);
        assert_eq!(sender.queued_len(), 0);
    }

    #[test]
    fn second_outstanding_pull_is_rejected() {
        let (_sender, mut stream) = channel();
        let (_received, callback) = collector();

        stream.pull(callback()).unwrap();
        assert_eq!(stream.pull(callback()), Err(BodyError::PullInFlight));
    }

    #[test]
    fn push_after_terminal_is_rejected() {
        let (sender, _stream) = channel();
        sender.push_end().unwrap();

        assert_eq!(sender.push_chunk(Bytes::from_static(b"late")), Err(BodyError::Closed));
        assert_eq!(sender.push_error(BodyError::aborted("late")), Err(BodyError::Closed));
    }

    #[test]
    fn pull_after_close_receives_nothing() {
        let (sender, mut stream) = channel();
        sender.push_end().unwrap();

        let (received, callback) = collector();
        stream.pull(callback()).unwrap();
        stream.pull(callback()).unwrap();

        assert_eq!(*received.lock().unwrap(), vec![StreamItem::End]);
    }

    #[test]
    fn dropped_sender_aborts_stream() {
        let (sender, mut stream) = channel();
        sender.push_chunk(Bytes::from_static(b"partial")).unwrap();
        drop(sender);

        let mut cx = Context::from_waker(noop_waker_ref());
        assert_eq!(stream.poll_item(&mut cx), Poll::Ready(Some(StreamItem::Chunk(Bytes::from_static(b"partial")))));
        assert!(matches!(stream.poll_item(&mut cx), Poll::Ready(Some(StreamItem::Error(BodyError::Aborted { .. })))));
        assert_eq!(stream.poll_item(&mut cx), Poll::Ready(None));
    }

    #[test]
    fn released_consumer_discards_pushes() {
        let (sender, stream) = channel();
        drop(stream);

        assert!(sender.is_released());
        sender.push_chunk(Bytes::from_static(b"ignored")).unwrap();
        assert_eq!(sender.queued_len(), 0);
        sender.push_end().unwrap();
    }

    #[tokio::test]
    async fn items_arrive_in_push_order_across_tasks() {
        let (sender, mut stream) = channel();

        let producer = tokio::spawn(async move {
            for i in 0..64u8 {
                sender.push_chunk(Bytes::from(vec![i])).unwrap();
                tokio::task::yield_now().await;
            }
            sender.push_end().unwrap();
        });

        let mut seen = Vec::new();
        while let Some(item) = stream.next_item().await {
            match item {
                StreamItem::Chunk(bytes) => seen.push(bytes[0]),
                StreamItem::End => break,
                StreamItem::Error(e) => panic!("unexpected stream error: {e}"),
            }
        }
        producer.await.unwrap();

        assert_eq!(seen, (0..64u8).collect::<Vec<_>>());
        assert_eq!(stream.next_item().await, None);
    }
}
