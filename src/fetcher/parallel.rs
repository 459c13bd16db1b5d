use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Semaphore;

use crate::fetcher::{HttpResponse, HttpTransport, RequestSpec, TransportError};

/// Caps the number of requests in flight across every loader sharing it.
pub struct ParallelTransport {
    inner: Arc<dyn HttpTransport>,
    semaphore: Arc<Semaphore>,
}

impl ParallelTransport {
    pub fn with_workers(inner: Arc<dyn HttpTransport>, workers: usize) -> Self {
        Self {
            inner,
            semaphore: Arc::new(Semaphore::new(workers.max(1))),
        }
    }

    pub fn available_permits(&self) -> usize {
        self.semaphore.available_permits()
    }
}

#[async_trait]
impl HttpTransport for ParallelTransport {
    async fn execute(&self, request: RequestSpec) -> Result<HttpResponse, TransportError> {
        let _permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|_| TransportError::Other("Transport shut down".to_string()))?;

        self.inner.execute(request).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use url::Url;

    use super::*;

    #[derive(Default)]
    struct CountingTransport {
        active: AtomicUsize,
        peak: AtomicUsize,
    }

    #[async_trait]
    impl HttpTransport for CountingTransport {
        async fn execute(&self, _request: RequestSpec) -> Result<HttpResponse, TransportError> {
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            self.active.fetch_sub(1, Ordering::SeqCst);
            Ok(HttpResponse {
                status: 200,
                headers: Vec::new(),
                body: Vec::new(),
            })
        }
    }

    #[tokio::test]
    async fn test_limits_concurrent_requests() {
        let inner = Arc::new(CountingTransport::default());
        let transport = Arc::new(ParallelTransport::with_workers(inner.clone(), 2));

        let mut handles = Vec::new();
        for _ in 0..6 {
            let transport = transport.clone();
            handles.push(tokio::spawn(async move {
                let url = Url::parse("https://example.com/").unwrap();
                transport.execute(RequestSpec::get(url)).await
            }));
        }
        for handle in handles {
            assert!(handle.await.unwrap().is_ok());
        }

        assert_eq!(inner.peak.load(Ordering::SeqCst), 2);
        assert_eq!(transport.available_permits(), 2);
    }

    #[tokio::test]
    async fn test_waits_for_a_free_permit() {
        let transport = ParallelTransport::with_workers(Arc::new(CountingTransport::default()), 1);
        let held = transport.semaphore.clone().try_acquire_owned().unwrap();

        let url = Url::parse("https://example.com/").unwrap();
        let mut request = tokio_test::task::spawn(transport.execute(RequestSpec::get(url)));
        tokio_test::assert_pending!(request.poll());

        drop(held);
        assert!(request.is_woken());
    }

    #[test]
    fn test_zero_workers_still_allows_one() {
        let transport = ParallelTransport::with_workers(Arc::new(CountingTransport::default()), 0);
        assert_eq!(transport.available_permits(), 1);
    }
}
