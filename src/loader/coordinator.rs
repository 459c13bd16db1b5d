use std::future::Future;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Result of a fetch, tagged with the generation that issued it.
#[derive(Debug)]
pub struct Completion<T> {
    pub generation: u64,
    pub value: T,
}

struct InFlight {
    generation: u64,
    handle: JoinHandle<()>,
}

/// Keeps at most one fetch outstanding.
///
/// Every fetch runs in its own task and reports through the completion
/// channel handed out by [`FetchCoordinator::new`]. Starting a fetch aborts
/// the previous one, and completions from any generation other than the
/// current one are rejected by [`FetchCoordinator::accept`].
pub struct FetchCoordinator<T> {
    generation: u64,
    in_flight: Option<InFlight>,
    completions: mpsc::UnboundedSender<Completion<T>>,
}

impl<T: Send + 'static> FetchCoordinator<T> {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Completion<T>>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let coordinator = Self {
            generation: 0,
            in_flight: None,
            completions: tx,
        };
        (coordinator, rx)
    }

    /// Spawn `fetch`, superseding whatever was in flight.
    pub fn begin<F>(&mut self, fetch: F) -> u64
    where
        F: Future<Output = T> + Send + 'static,
    {
        self.cancel();

        self.generation += 1;
        let generation = self.generation;
        let completions = self.completions.clone();
        let handle = tokio::spawn(async move {
            let value = fetch.await;
            let _ = completions.send(Completion { generation, value });
        });

        self.in_flight = Some(InFlight { generation, handle });
        generation
    }

    /// Abort the outstanding fetch, if any. Returns whether one was running.
    pub fn cancel(&mut self) -> bool {
        match self.in_flight.take() {
            Some(in_flight) => {
                in_flight.handle.abort();
                true
            }
            None => false,
        }
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight.is_some()
    }

    /// The completion's value if it belongs to the outstanding fetch.
    pub fn accept(&mut self, completion: Completion<T>) -> Option<T> {
        match &self.in_flight {
            Some(in_flight) if in_flight.generation == completion.generation => {
                self.in_flight = None;
                Some(completion.value)
            }
            _ => None,
        }
    }
}

impl<T> Drop for FetchCoordinator<T> {
    fn drop(&mut self) {
        if let Some(in_flight) = self.in_flight.take() {
            in_flight.handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use tokio::sync::oneshot;

    use super::*;

    #[tokio::test]
    async fn test_completion_accepted_once() {
        let (mut coordinator, mut completions) = FetchCoordinator::new();
        let generation = coordinator.begin(async { 7 });

        let completion = completions.recv().await.unwrap();
        assert_eq!(completion.generation, generation);
        assert_eq!(coordinator.accept(completion), Some(7));
        assert!(!coordinator.is_in_flight());
    }

    #[tokio::test]
    async fn test_superseded_result_is_rejected() {
        let (mut coordinator, _completions) = FetchCoordinator::new();
        let first = coordinator.begin(std::future::pending::<u32>());
        let second = coordinator.begin(std::future::pending::<u32>());
        assert_ne!(first, second);

        let stale = Completion {
            generation: first,
            value: 1,
        };
        assert_eq!(coordinator.accept(stale), None);
        assert!(coordinator.is_in_flight());
    }

    #[tokio::test]
    async fn test_cancel_aborts_and_is_idempotent() {
        let (mut coordinator, mut completions) = FetchCoordinator::new();
        let (mut gate_tx, gate_rx) = oneshot::channel::<u32>();
        coordinator.begin(async move { gate_rx.await.unwrap_or(0) });

        assert!(coordinator.cancel());
        assert!(!coordinator.cancel());
        assert!(!coordinator.is_in_flight());

        // Resolves once the aborted task has dropped its receiver.
        gate_tx.closed().await;
        assert!(gate_tx.send(5).is_err());
        assert!(completions.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_late_completion_after_cancel_is_rejected() {
        let (mut coordinator, _completions) = FetchCoordinator::<u32>::new();
        let generation = coordinator.begin(std::future::pending());
        coordinator.cancel();

        let late = Completion {
            generation,
            value: 3,
        };
        assert_eq!(coordinator.accept(late), None);
    }
}
