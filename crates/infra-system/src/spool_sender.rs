// Spool directory Sender
// Each accepted message becomes one JSON envelope file; a relay picks them up from there.
use async_trait::async_trait;
use mailqueue_core::domain::{ErrorKind, JobMetadata};
use mailqueue_core::port::{IdProvider, OutgoingEmail, SendError, Sender, TimeProvider};
use serde::Serialize;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

const ENVELOPE_EXTENSION: &str = "json";
const PARTIAL_EXTENSION: &str = "partial";

/// Spooled message as written to disk
#[derive(Debug, Serialize)]
struct Envelope<'a> {
    message_id: &'a str,
    to: &'a str,
    subject: &'a str,
    content: &'a str,
    metadata: Option<&'a JobMetadata>,
    spooled_at: i64,
}

pub struct SpoolSender {
    spool_dir: PathBuf,
    id_provider: Arc<dyn IdProvider>,
    time_provider: Arc<dyn TimeProvider>,
}

impl SpoolSender {
    /// Create the spool directory if needed
    ///
    /// # Arguments
    /// * `spool_dir` - Directory that receives one `<message_id>.json` per message
    /// * `id_provider` - Message id generator
    /// * `time_provider` - Stamps `spooled_at`
    pub async fn open(
        spool_dir: impl Into<PathBuf>,
        id_provider: Arc<dyn IdProvider>,
        time_provider: Arc<dyn TimeProvider>,
    ) -> io::Result<Self> {
        let spool_dir = spool_dir.into();
        tokio::fs::create_dir_all(&spool_dir).await?;
        Ok(Self {
            spool_dir,
            id_provider,
            time_provider,
        })
    }

    pub fn spool_dir(&self) -> &Path {
        &self.spool_dir
    }

    /// Map filesystem failures onto the retry taxonomy
    fn io_error(err: io::Error) -> SendError {
        // An unwritable spool needs an operator, everything else may clear up
        let kind = match err.kind() {
            io::ErrorKind::PermissionDenied => ErrorKind::Authentication,
            _ => ErrorKind::Network,
        };
        SendError::with_kind(kind, format!("spool write failed: {}", err))
    }
}

#[async_trait]
impl Sender for SpoolSender {
    async fn send(&self, email: OutgoingEmail<'_>) -> Result<String, SendError> {
        let message_id = self.id_provider.next_id();
        let envelope = Envelope {
            message_id: &message_id,
            to: email.recipient,
            subject: email.subject,
            content: email.content,
            metadata: email.metadata,
            spooled_at: self.time_provider.now_millis(),
        };

        let body = serde_json::to_vec_pretty(&envelope).map_err(|e| {
            SendError::with_kind(ErrorKind::Validation, format!("unencodable message: {}", e))
        })?;

        // Write then rename so a relay never sees a half-written envelope
        let partial = self
            .spool_dir
            .join(format!("{}.{}", message_id, PARTIAL_EXTENSION));
        let target = self
            .spool_dir
            .join(format!("{}.{}", message_id, ENVELOPE_EXTENSION));

        if let Err(e) = tokio::fs::write(&partial, &body).await {
            warn!(path = %partial.display(), error = %e, "Spool write failed");
            return Err(Self::io_error(e));
        }
        if let Err(e) = tokio::fs::rename(&partial, &target).await {
            let _ = tokio::fs::remove_file(&partial).await;
            return Err(Self::io_error(e));
        }

        debug!(message_id = %message_id, path = %target.display(), "Message spooled");
        Ok(message_id)
    }
}
