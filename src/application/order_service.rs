use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use uuid::Uuid;

use crate::application::confirmation;
use crate::domain::errors::DomainError;
use crate::domain::order::{ImageUpload, NewOrder, Order, OrderChange};
use crate::domain::ports::{BlobStore, Notifier, OrderRepository};

pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(10);

/// Result of a state-changing operation.
///
/// `primary` is the operation's contract (the store write). `advisory`
/// carries the outcome of best-effort side effects such as the confirmation
/// email or blob cleanup and never affects [`Outcome::success`].
#[derive(Debug)]
pub struct Outcome {
    pub primary: Result<(), DomainError>,
    pub advisory: Result<(), DomainError>,
}

impl Outcome {
    fn completed(advisory: Result<(), DomainError>) -> Self {
        Self {
            primary: Ok(()),
            advisory,
        }
    }

    fn failed(error: DomainError) -> Self {
        Self {
            primary: Err(error),
            advisory: Ok(()),
        }
    }

    pub fn success(&self) -> bool {
        self.primary.is_ok()
    }
}

/// Orchestrates intake, mark-paid and delete against the injected order
/// store, blob store and notifier.
pub struct OrderService {
    repo: Arc<dyn OrderRepository>,
    blobs: Arc<dyn BlobStore>,
    notifier: Arc<dyn Notifier>,
    timeout: Duration,
}

impl OrderService {
    pub fn new(
        repo: Arc<dyn OrderRepository>,
        blobs: Arc<dyn BlobStore>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            repo,
            blobs,
            notifier,
            timeout: DEFAULT_STORE_TIMEOUT,
        }
    }

    /// Upper bound for blob store calls and image cleanup. Order store calls
    /// are bounded by the store's own timeouts.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Store the image, then record an unpaid order pointing at it.
    ///
    /// If the image is stored but the insert fails the image is left behind;
    /// the call still fails and nothing references the orphan.
    pub async fn intake(&self, email: String, upload: ImageUpload) -> Result<Uuid, DomainError> {
        if upload.bytes.is_empty() {
            return Err(DomainError::MissingPayload);
        }

        let image_ref = self
            .bounded(self.blobs.put(upload.original_name.as_deref(), upload.bytes))
            .await?;

        let new_order = NewOrder {
            email: email.clone(),
            image_ref: image_ref.clone(),
        };
        match self.with_repo(move |repo| repo.insert(new_order)).await {
            Ok(id) => {
                log::info!("Order {} received from {}, image saved as {}", id, email, image_ref);
                Ok(id)
            }
            Err(e) => {
                log::error!(
                    "Failed to record order for {}; stored image {} is orphaned: {}",
                    email,
                    image_ref,
                    e
                );
                Err(e)
            }
        }
    }

    pub async fn list_orders(&self) -> Result<Vec<Order>, DomainError> {
        self.with_repo(|repo| repo.find_all()).await
    }

    pub async fn get_order(&self, id: Uuid) -> Result<Option<Order>, DomainError> {
        self.with_repo(move |repo| repo.find_by_id(id)).await
    }

    pub async fn fetch_image(&self, image_ref: &str) -> Result<Option<Bytes>, DomainError> {
        self.bounded(self.blobs.get(image_ref)).await
    }

    /// Flip `paid` to true and send the confirmation.
    ///
    /// Marking an order that is already paid succeeds without writing again;
    /// the confirmation is only re-sent if no earlier attempt delivered it.
    pub async fn mark_paid(&self, id: Uuid) -> Outcome {
        let order = match self.lookup(id).await {
            Ok(order) => order,
            Err(e) => return fail("mark-paid", id, e),
        };

        if order.paid {
            log::info!("Order {} is already paid", id);
        } else {
            match self
                .with_repo(move |repo| repo.update(id, OrderChange::MarkPaid))
                .await
            {
                Ok(true) => {}
                Ok(false) => return fail("mark-paid", id, DomainError::NotFound),
                Err(e) => return fail("mark-paid", id, e),
            }
        }

        if order.notified {
            return Outcome::completed(Ok(()));
        }

        let paid = Order {
            paid: true,
            ..order
        };
        let advisory = self.notify(paid).await;
        if advisory.is_ok() {
            if let Err(e) = self
                .with_repo(move |repo| repo.update(id, OrderChange::MarkNotified))
                .await
            {
                log::warn!("Confirmation for order {} sent but not recorded: {}", id, e);
            }
        }
        Outcome::completed(advisory)
    }

    /// Remove the order's image (best effort), then the order itself.
    pub async fn delete(&self, id: Uuid) -> Outcome {
        let order = match self.lookup(id).await {
            Ok(order) => order,
            Err(e) => return fail("delete", id, e),
        };

        let advisory = self.remove_blob(&order).await;

        match self.with_repo(move |repo| repo.delete_by_id(id)).await {
            Ok(true) => {
                log::info!("Order {} deleted", id);
                Outcome::completed(advisory)
            }
            Ok(false) => fail("delete", id, DomainError::NotFound),
            Err(e) => fail("delete", id, e),
        }
    }

    async fn lookup(&self, id: Uuid) -> Result<Order, DomainError> {
        self.get_order(id).await?.ok_or(DomainError::NotFound)
    }

    async fn notify(&self, order: Order) -> Result<(), DomainError> {
        let notifier = Arc::clone(&self.notifier);
        let message = confirmation::render(&order);
        let destination = order.email.clone();

        let task = tokio::spawn(async move {
            notifier
                .send(&destination, message.subject, &message.html_body)
                .await
        });

        match task.await {
            Ok(Ok(receipt)) => {
                log::info!(
                    "Confirmation for order {} sent to {} ({})",
                    order.id,
                    receipt.destination,
                    receipt.detail
                );
                Ok(())
            }
            Ok(Err(e)) => {
                log::warn!("Confirmation for order {} not sent: {}", order.id, e);
                Err(e)
            }
            Err(e) => {
                log::warn!("Confirmation task for order {} aborted: {}", order.id, e);
                Err(DomainError::NotificationFailed(e.to_string()))
            }
        }
    }

    async fn remove_blob(&self, order: &Order) -> Result<(), DomainError> {
        let blobs = Arc::clone(&self.blobs);
        let image_ref = order.image_ref.clone();
        let task = tokio::spawn(async move { blobs.delete(&image_ref).await });

        let result = match tokio::time::timeout(self.timeout, task).await {
            Ok(Ok(Ok(removed))) => {
                if !removed {
                    log::info!("No stored image {} for order {}", order.image_ref, order.id);
                }
                Ok(())
            }
            Ok(Ok(Err(DomainError::BlobCleanupFailed(msg)))) => {
                Err(DomainError::BlobCleanupFailed(msg))
            }
            Ok(Ok(Err(e))) => Err(DomainError::BlobCleanupFailed(e.to_string())),
            Ok(Err(e)) => Err(DomainError::BlobCleanupFailed(e.to_string())),
            Err(_) => Err(DomainError::BlobCleanupFailed(format!(
                "timed out after {:?}",
                self.timeout
            ))),
        };

        if let Err(e) = &result {
            log::warn!("Image {} for order {} not removed: {}", order.image_ref, order.id, e);
        }
        result
    }

    async fn bounded<T, F>(&self, fut: F) -> Result<T, DomainError>
    where
        F: Future<Output = Result<T, DomainError>>,
    {
        tokio::time::timeout(self.timeout, fut)
            .await
            .map_err(|_| timed_out(self.timeout))?
    }

    /// Run a blocking order store call off the async workers.
    ///
    /// The call is awaited to completion: its duration is bounded by the
    /// store itself (pool checkout and statement timeouts), so the reported
    /// result always matches what was committed.
    async fn with_repo<T, F>(&self, op: F) -> Result<T, DomainError>
    where
        F: FnOnce(&dyn OrderRepository) -> Result<T, DomainError> + Send + 'static,
        T: Send + 'static,
    {
        let repo = Arc::clone(&self.repo);
        tokio::task::spawn_blocking(move || op(repo.as_ref()))
            .await
            .map_err(|e| DomainError::StorageUnavailable(e.to_string()))?
    }
}

fn timed_out(timeout: Duration) -> DomainError {
    DomainError::StorageUnavailable(format!("timed out after {:?}", timeout))
}

fn fail(operation: &str, id: Uuid, error: DomainError) -> Outcome {
    match &error {
        DomainError::NotFound => log::warn!("{} {}: order not found", operation, id),
        other => log::error!("{} {} failed: {}", operation, id, other),
    }
    Outcome::failed(error)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::domain::order::DeliveryReceipt;
    use crate::infrastructure::blob_store::ObjectBlobStore;
    use crate::infrastructure::memory_repo::InMemoryOrderRepository;

    const JPEG: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0, 0x00];

    /// Records each send together with the paid flag the store held at the
    /// time of sending.
    struct RecordingNotifier {
        repo: Arc<InMemoryOrderRepository>,
        sent: Mutex<Vec<(String, String, bool)>>,
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn send(
            &self,
            destination: &str,
            subject: &str,
            _html_body: &str,
        ) -> Result<DeliveryReceipt, DomainError> {
            let paid_in_store = self
                .repo
                .find_all()?
                .iter()
                .any(|o| o.email == destination && o.paid);
            self.sent.lock().unwrap().push((
                destination.to_string(),
                subject.to_string(),
                paid_in_store,
            ));
            Ok(DeliveryReceipt {
                destination: destination.to_string(),
                detail: "recorded".to_string(),
            })
        }
    }

    struct FailingNotifier;

    #[async_trait]
    impl Notifier for FailingNotifier {
        async fn send(&self, _: &str, _: &str, _: &str) -> Result<DeliveryReceipt, DomainError> {
            Err(DomainError::NotificationFailed("relay refused".to_string()))
        }
    }

    struct PanickingNotifier;

    #[async_trait]
    impl Notifier for PanickingNotifier {
        async fn send(&self, _: &str, _: &str, _: &str) -> Result<DeliveryReceipt, DomainError> {
            panic!("transport exploded");
        }
    }

    /// Accepts writes, refuses deletes.
    struct StickyBlobStore {
        inner: ObjectBlobStore,
    }

    #[async_trait]
    impl BlobStore for StickyBlobStore {
        async fn put(&self, name: Option<&str>, bytes: Bytes) -> Result<String, DomainError> {
            self.inner.put(name, bytes).await
        }

        async fn get(&self, image_ref: &str) -> Result<Option<Bytes>, DomainError> {
            self.inner.get(image_ref).await
        }

        async fn delete(&self, _: &str) -> Result<bool, DomainError> {
            Err(DomainError::BlobCleanupFailed("permission denied".to_string()))
        }
    }

    struct UnreachableBlobStore;

    #[async_trait]
    impl BlobStore for UnreachableBlobStore {
        async fn put(&self, _: Option<&str>, _: Bytes) -> Result<String, DomainError> {
            Err(DomainError::StorageUnavailable("connection refused".to_string()))
        }

        async fn get(&self, _: &str) -> Result<Option<Bytes>, DomainError> {
            Err(DomainError::StorageUnavailable("connection refused".to_string()))
        }

        async fn delete(&self, _: &str) -> Result<bool, DomainError> {
            Err(DomainError::StorageUnavailable("connection refused".to_string()))
        }
    }

    struct UnreachableRepository;

    impl OrderRepository for UnreachableRepository {
        fn insert(&self, _: NewOrder) -> Result<Uuid, DomainError> {
            Err(DomainError::StorageUnavailable("connection refused".to_string()))
        }

        fn find_by_id(&self, _: Uuid) -> Result<Option<Order>, DomainError> {
            Err(DomainError::StorageUnavailable("connection refused".to_string()))
        }

        fn find_all(&self) -> Result<Vec<Order>, DomainError> {
            Err(DomainError::StorageUnavailable("connection refused".to_string()))
        }

        fn update(&self, _: Uuid, _: OrderChange) -> Result<bool, DomainError> {
            Err(DomainError::StorageUnavailable("connection refused".to_string()))
        }

        fn delete_by_id(&self, _: Uuid) -> Result<bool, DomainError> {
            Err(DomainError::StorageUnavailable("connection refused".to_string()))
        }
    }

    /// Wraps the in-memory store: writes commit only after `write_delay`,
    /// and record deletes can be made to fail.
    struct FaultyRepository {
        inner: Arc<InMemoryOrderRepository>,
        write_delay: Duration,
        fail_delete: bool,
    }

    impl FaultyRepository {
        fn new(inner: Arc<InMemoryOrderRepository>) -> Self {
            Self {
                inner,
                write_delay: Duration::ZERO,
                fail_delete: false,
            }
        }
    }

    impl OrderRepository for FaultyRepository {
        fn insert(&self, order: NewOrder) -> Result<Uuid, DomainError> {
            std::thread::sleep(self.write_delay);
            self.inner.insert(order)
        }

        fn find_by_id(&self, id: Uuid) -> Result<Option<Order>, DomainError> {
            self.inner.find_by_id(id)
        }

        fn find_all(&self) -> Result<Vec<Order>, DomainError> {
            self.inner.find_all()
        }

        fn update(&self, id: Uuid, change: OrderChange) -> Result<bool, DomainError> {
            std::thread::sleep(self.write_delay);
            self.inner.update(id, change)
        }

        fn delete_by_id(&self, id: Uuid) -> Result<bool, DomainError> {
            if self.fail_delete {
                return Err(DomainError::StorageUnavailable("connection reset".to_string()));
            }
            self.inner.delete_by_id(id)
        }
    }

    /// Refuses the first send, accepts every later one.
    struct FlakyNotifier {
        attempts: AtomicUsize,
        sent: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Notifier for FlakyNotifier {
        async fn send(
            &self,
            destination: &str,
            _subject: &str,
            _html_body: &str,
        ) -> Result<DeliveryReceipt, DomainError> {
            if self.attempts.fetch_add(1, Ordering::SeqCst) == 0 {
                return Err(DomainError::NotificationFailed("relay busy".to_string()));
            }
            self.sent.lock().unwrap().push(destination.to_string());
            Ok(DeliveryReceipt {
                destination: destination.to_string(),
                detail: "recorded".to_string(),
            })
        }
    }

    /// Stores nothing; every write outlasts any reasonable timeout.
    struct StalledBlobStore;

    #[async_trait]
    impl BlobStore for StalledBlobStore {
        async fn put(&self, _: Option<&str>, _: Bytes) -> Result<String, DomainError> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok("never".to_string())
        }

        async fn get(&self, _: &str) -> Result<Option<Bytes>, DomainError> {
            Ok(None)
        }

        async fn delete(&self, _: &str) -> Result<bool, DomainError> {
            Ok(false)
        }
    }

    struct Harness {
        repo: Arc<InMemoryOrderRepository>,
        blobs: Arc<ObjectBlobStore>,
        notifier: Arc<RecordingNotifier>,
        service: OrderService,
    }

    fn harness() -> Harness {
        let repo = Arc::new(InMemoryOrderRepository::new());
        let blobs = Arc::new(ObjectBlobStore::in_memory());
        let notifier = Arc::new(RecordingNotifier {
            repo: Arc::clone(&repo),
            sent: Mutex::new(vec![]),
        });
        let service = OrderService::new(repo.clone(), blobs.clone(), notifier.clone());
        Harness {
            repo,
            blobs,
            notifier,
            service,
        }
    }

    fn upload(bytes: &'static [u8]) -> ImageUpload {
        ImageUpload {
            original_name: Some("receipt.jpg".to_string()),
            bytes: Bytes::from_static(bytes),
        }
    }

    #[tokio::test]
    async fn intake_records_unpaid_order_with_retrievable_image() {
        let h = harness();

        let id = h
            .service
            .intake("a@b.com".to_string(), upload(JPEG))
            .await
            .unwrap();

        let order = h.service.get_order(id).await.unwrap().expect("order exists");
        assert_eq!(order.email, "a@b.com");
        assert!(!order.paid);
        assert_eq!(
            h.service.fetch_image(&order.image_ref).await.unwrap(),
            Some(Bytes::from_static(JPEG))
        );
    }

    #[tokio::test]
    async fn intake_without_image_creates_nothing() {
        let h = harness();

        let result = h.service.intake("a@b.com".to_string(), upload(b"")).await;

        assert!(matches!(result, Err(DomainError::MissingPayload)));
        assert!(h.service.list_orders().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn intake_does_not_record_order_when_blob_write_fails() {
        let repo = Arc::new(InMemoryOrderRepository::new());
        let service = OrderService::new(
            repo.clone(),
            Arc::new(UnreachableBlobStore),
            Arc::new(FailingNotifier),
        );

        let result = service.intake("a@b.com".to_string(), upload(JPEG)).await;

        assert!(matches!(result, Err(DomainError::StorageUnavailable(_))));
        assert!(repo.find_all().unwrap().is_empty());
    }

    #[tokio::test]
    async fn intake_fails_when_order_store_is_unreachable() {
        let service = OrderService::new(
            Arc::new(UnreachableRepository),
            Arc::new(ObjectBlobStore::in_memory()),
            Arc::new(FailingNotifier),
        );

        let result = service.intake("a@b.com".to_string(), upload(JPEG)).await;

        assert!(matches!(result, Err(DomainError::StorageUnavailable(_))));
    }

    #[tokio::test]
    async fn mark_paid_is_idempotent_and_notifies_once() {
        let h = harness();
        let id = h
            .service
            .intake("a@b.com".to_string(), upload(JPEG))
            .await
            .unwrap();

        let first = h.service.mark_paid(id).await;
        let second = h.service.mark_paid(id).await;

        assert!(first.success());
        assert!(first.advisory.is_ok());
        assert!(second.success());
        let order = h.repo.find_by_id(id).unwrap().unwrap();
        assert!(order.paid);
        assert!(order.notified);

        let sent = h.notifier.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "a@b.com");
        assert_eq!(sent[0].1, confirmation::SUBJECT);
    }

    #[tokio::test]
    async fn mark_paid_updates_store_before_notifying() {
        let h = harness();
        let id = h
            .service
            .intake("a@b.com".to_string(), upload(JPEG))
            .await
            .unwrap();

        assert!(h.service.mark_paid(id).await.success());

        let sent = h.notifier.sent.lock().unwrap();
        assert!(sent[0].2, "order must already be paid when the email goes out");
    }

    #[tokio::test]
    async fn mark_paid_unknown_id_fails_without_creating_records() {
        let h = harness();

        let outcome = h.service.mark_paid(Uuid::new_v4()).await;

        assert!(!outcome.success());
        assert!(matches!(outcome.primary, Err(DomainError::NotFound)));
        assert!(h.service.list_orders().await.unwrap().is_empty());
        assert!(h.notifier.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn notifier_failure_keeps_order_paid() {
        let repo = Arc::new(InMemoryOrderRepository::new());
        let service = OrderService::new(
            repo.clone(),
            Arc::new(ObjectBlobStore::in_memory()),
            Arc::new(FailingNotifier),
        );
        let id = service.intake("a@b.com".to_string(), upload(JPEG)).await.unwrap();

        let outcome = service.mark_paid(id).await;

        assert!(outcome.success());
        assert!(matches!(outcome.advisory, Err(DomainError::NotificationFailed(_))));
        assert!(repo.find_by_id(id).unwrap().unwrap().paid);
    }

    #[tokio::test]
    async fn notifier_panic_is_captured_as_advisory() {
        let repo = Arc::new(InMemoryOrderRepository::new());
        let service = OrderService::new(
            repo.clone(),
            Arc::new(ObjectBlobStore::in_memory()),
            Arc::new(PanickingNotifier),
        );
        let id = service.intake("a@b.com".to_string(), upload(JPEG)).await.unwrap();

        let outcome = service.mark_paid(id).await;

        assert!(outcome.success());
        assert!(matches!(outcome.advisory, Err(DomainError::NotificationFailed(_))));
        assert!(repo.find_by_id(id).unwrap().unwrap().paid);
    }

    #[tokio::test]
    async fn mark_paid_reports_failure_when_store_is_unreachable() {
        let service = OrderService::new(
            Arc::new(UnreachableRepository),
            Arc::new(ObjectBlobStore::in_memory()),
            Arc::new(FailingNotifier),
        );

        let outcome = service.mark_paid(Uuid::new_v4()).await;

        assert!(!outcome.success());
        assert!(matches!(outcome.primary, Err(DomainError::StorageUnavailable(_))));
    }

    #[tokio::test]
    async fn delete_removes_order_and_image() {
        let h = harness();
        let id = h
            .service
            .intake("a@b.com".to_string(), upload(JPEG))
            .await
            .unwrap();
        let image_ref = h.repo.find_by_id(id).unwrap().unwrap().image_ref;

        let outcome = h.service.delete(id).await;

        assert!(outcome.success());
        assert!(outcome.advisory.is_ok());
        assert!(h.service.get_order(id).await.unwrap().is_none());
        assert!(h.service.list_orders().await.unwrap().is_empty());
        assert_eq!(h.blobs.get(&image_ref).await.unwrap(), None);
    }

    #[tokio::test]
    async fn second_delete_reports_failure() {
        let h = harness();
        let id = h
            .service
            .intake("a@b.com".to_string(), upload(JPEG))
            .await
            .unwrap();

        assert!(h.service.delete(id).await.success());
        let again = h.service.delete(id).await;

        assert!(!again.success());
        assert!(matches!(again.primary, Err(DomainError::NotFound)));
    }

    #[tokio::test]
    async fn blob_cleanup_failure_does_not_block_deletion() {
        let repo = Arc::new(InMemoryOrderRepository::new());
        let service = OrderService::new(
            repo.clone(),
            Arc::new(StickyBlobStore {
                inner: ObjectBlobStore::in_memory(),
            }),
            Arc::new(FailingNotifier),
        );
        let id = service.intake("a@b.com".to_string(), upload(JPEG)).await.unwrap();

        let outcome = service.delete(id).await;

        assert!(outcome.success());
        assert!(matches!(outcome.advisory, Err(DomainError::BlobCleanupFailed(_))));
        assert!(repo.find_by_id(id).unwrap().is_none());
    }

    #[tokio::test]
    async fn slow_store_writes_are_reported_as_committed() {
        let repo = Arc::new(InMemoryOrderRepository::new());
        let mut faulty = FaultyRepository::new(repo.clone());
        faulty.write_delay = Duration::from_millis(200);
        let notifier = Arc::new(RecordingNotifier {
            repo: Arc::clone(&repo),
            sent: Mutex::new(vec![]),
        });
        let service = OrderService::new(
            Arc::new(faulty),
            Arc::new(ObjectBlobStore::in_memory()),
            notifier.clone(),
        )
        .with_timeout(Duration::from_millis(50));

        let id = service
            .intake("a@b.com".to_string(), upload(JPEG))
            .await
            .expect("a slow insert that commits must not be reported as failed");
        assert_eq!(repo.find_all().unwrap().len(), 1);

        let outcome = service.mark_paid(id).await;

        assert!(outcome.success());
        assert!(outcome.advisory.is_ok());
        let order = repo.find_by_id(id).unwrap().unwrap();
        assert!(order.paid);
        assert!(order.notified);
        assert_eq!(notifier.sent.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn slow_blob_write_times_out_without_recording_order() {
        let repo = Arc::new(InMemoryOrderRepository::new());
        let service = OrderService::new(
            repo.clone(),
            Arc::new(StalledBlobStore),
            Arc::new(FailingNotifier),
        )
        .with_timeout(Duration::from_millis(50));

        let result = service.intake("a@b.com".to_string(), upload(JPEG)).await;

        assert!(matches!(result, Err(DomainError::StorageUnavailable(_))));
        assert!(repo.find_all().unwrap().is_empty());
    }

    #[tokio::test]
    async fn unsent_confirmation_is_retried_by_next_mark_paid() {
        let repo = Arc::new(InMemoryOrderRepository::new());
        let notifier = Arc::new(FlakyNotifier {
            attempts: AtomicUsize::new(0),
            sent: Mutex::new(vec![]),
        });
        let service = OrderService::new(
            repo.clone(),
            Arc::new(ObjectBlobStore::in_memory()),
            notifier.clone(),
        );
        let id = service.intake("a@b.com".to_string(), upload(JPEG)).await.unwrap();

        let first = service.mark_paid(id).await;
        assert!(first.success());
        assert!(matches!(first.advisory, Err(DomainError::NotificationFailed(_))));
        let order = repo.find_by_id(id).unwrap().unwrap();
        assert!(order.paid);
        assert!(!order.notified);

        let second = service.mark_paid(id).await;
        assert!(second.success());
        assert!(second.advisory.is_ok());
        assert!(repo.find_by_id(id).unwrap().unwrap().notified);

        let third = service.mark_paid(id).await;
        assert!(third.success());

        assert_eq!(*notifier.sent.lock().unwrap(), vec!["a@b.com".to_string()]);
        assert_eq!(notifier.attempts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn delete_reports_failure_when_record_delete_fails() {
        let repo = Arc::new(InMemoryOrderRepository::new());
        let blobs = Arc::new(ObjectBlobStore::in_memory());
        let mut faulty = FaultyRepository::new(repo.clone());
        faulty.fail_delete = true;
        let service = OrderService::new(Arc::new(faulty), blobs.clone(), Arc::new(FailingNotifier));
        let id = service.intake("a@b.com".to_string(), upload(JPEG)).await.unwrap();
        let image_ref = repo.find_by_id(id).unwrap().unwrap().image_ref;

        let outcome = service.delete(id).await;

        assert!(!outcome.success());
        assert!(matches!(outcome.primary, Err(DomainError::StorageUnavailable(_))));
        assert!(repo.find_by_id(id).unwrap().is_some(), "the record must survive");
        // The image is removed before the record, so it is already gone.
        assert_eq!(blobs.get(&image_ref).await.unwrap(), None);
    }

    #[tokio::test]
    async fn full_lifecycle() {
        let h = harness();

        let id = h
            .service
            .intake("a@b.com".to_string(), upload(JPEG))
            .await
            .unwrap();
        let order = h.service.get_order(id).await.unwrap().unwrap();
        assert_eq!(order.email, "a@b.com");
        assert!(!order.paid);

        assert!(h.service.mark_paid(id).await.success());
        assert!(h.service.get_order(id).await.unwrap().unwrap().paid);

        assert!(h.service.delete(id).await.success());
        assert!(h.service.get_order(id).await.unwrap().is_none());
    }
}
