//! Dispatcher delivering through the spool directory Sender

use std::sync::Arc;

use mailqueue_core::application::{Dispatcher, EmailQueue, EnqueueEmailRequest, QueueConfig};
use mailqueue_core::domain::JobStatus;
use mailqueue_core::port::id_provider::mocks::SequentialIdProvider;
use mailqueue_core::port::notification_sink::mocks::RecordingSink;
use mailqueue_core::port::time_provider::mocks::MockTimeProvider;
use mailqueue_core::port::IdProvider;
use mailqueue_infra_sqlite::{create_pool, run_migrations, SqliteJobStore};
use mailqueue_infra_system::{SpoolSender, TracingNotificationSink};

const NOW: i64 = 1_700_000_000_000;

struct MessageIds;

impl IdProvider for MessageIds {
    fn next_id(&self) -> String {
        "msg-1".to_string()
    }
}

#[tokio::test]
async fn test_sent_job_has_spooled_envelope() {
    let dir = tempfile::tempdir().unwrap();
    let pool = create_pool("sqlite::memory:").await.unwrap();
    run_migrations(&pool).await.unwrap();

    let clock = Arc::new(MockTimeProvider::new(NOW));
    let store = Arc::new(SqliteJobStore::new(pool));
    let recorded = Arc::new(RecordingSink::new());
    let sender = Arc::new(
        SpoolSender::open(dir.path().join("outbox"), Arc::new(MessageIds), clock.clone())
            .await
            .unwrap(),
    );
    let config = QueueConfig::default();

    let queue = EmailQueue::new(
        store.clone(),
        Arc::new(SequentialIdProvider::default()),
        clock.clone(),
        &config,
    );
    let dispatcher = Dispatcher::new(
        store,
        sender.clone(),
        Arc::new(TracingNotificationSink::wrap(recorded.clone())),
        clock,
        &config,
    );

    let mut req = EnqueueEmailRequest::new("client@example.com", "Reminder", "Invoice is due");
    req.metadata = Some(serde_json::json!({"invoice_id": "inv-9"}));
    let id = queue.add_email(req).await.unwrap();

    dispatcher.run_cycle().await.unwrap();

    let job = queue.get_job(&id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Sent);
    assert_eq!(job.message_id.as_deref(), Some("msg-1"));

    let envelope: serde_json::Value = serde_json::from_slice(
        &std::fs::read(sender.spool_dir().join("msg-1.json")).unwrap(),
    )
    .unwrap();
    assert_eq!(envelope["to"], "client@example.com");
    assert_eq!(envelope["metadata"]["invoice_id"], "inv-9");

    assert_eq!(recorded.published().len(), 1);
}
