//! Fans the queued data sets out to local storage, the web server and e-mail.
//! Each channel succeeds or fails on its own.

use crate::email::{MailComposer, compose_email};
use crate::local::LocalStore;
use crate::upload::{PROCESSING_ERROR, Transport, UploadOutcome, Uploader, upload_url};
use std::fmt;
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::{info, warn};
use ucm_core::config::DataCollectionSettings;
use ucm_core::{AppContext, Capabilities, Notification};
use ucm_data::DataCollection;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelOutcome {
    /// Turned off in the settings.
    Disabled,
    /// Not attempted, with the reason.
    Skipped(String),
    Succeeded(String),
    Failed(String),
}

impl ChannelOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ChannelOutcome::Succeeded(_))
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, ChannelOutcome::Failed(_))
    }
}

impl fmt::Display for ChannelOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelOutcome::Disabled => f.write_str("disabled"),
            ChannelOutcome::Skipped(why) => write!(f, "skipped ({why})"),
            ChannelOutcome::Succeeded(msg) => write!(f, "ok: {msg}"),
            ChannelOutcome::Failed(msg) => write!(f, "failed: {msg}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportReport {
    pub local: ChannelOutcome,
    pub upload: ChannelOutcome,
    pub email: ChannelOutcome,
}

impl ExportReport {
    fn all(outcome: ChannelOutcome) -> Self {
        Self {
            local: outcome.clone(),
            upload: outcome.clone(),
            email: outcome,
        }
    }

    pub fn any_failed(&self) -> bool {
        [&self.local, &self.upload, &self.email]
            .iter()
            .any(|o| o.is_failure())
    }

    /// Messages for the participant.
    pub fn notifications(&self) -> Vec<Notification> {
        let mut out = Vec::new();
        if let ChannelOutcome::Failed(msg) = &self.local {
            out.push(Notification::Error(msg.clone()));
        }
        match &self.upload {
            ChannelOutcome::Succeeded(msg) => out.push(Notification::Success(msg.clone())),
            ChannelOutcome::Failed(msg) => out.push(Notification::Error(msg.clone())),
            _ => {}
        }
        if let ChannelOutcome::Failed(msg) = &self.email {
            out.push(Notification::Error(msg.clone()));
        }
        out
    }
}

/// Result of an upload running in the background.
pub struct PendingUpload {
    rx: oneshot::Receiver<UploadOutcome>,
}

impl PendingUpload {
    /// Non-blocking poll, meant for the owner's loop.
    pub fn try_take(&mut self) -> Option<UploadOutcome> {
        match self.rx.try_recv() {
            Ok(outcome) => Some(outcome),
            Err(oneshot::error::TryRecvError::Empty) => None,
            Err(oneshot::error::TryRecvError::Closed) => Some(lost_upload()),
        }
    }

    pub async fn wait(self) -> UploadOutcome {
        self.rx.await.unwrap_or_else(|_| lost_upload())
    }
}

fn lost_upload() -> UploadOutcome {
    UploadOutcome {
        success: false,
        message: PROCESSING_ERROR.to_string(),
    }
}

pub struct ExportRouter<T: Transport, M: MailComposer> {
    app_name: String,
    settings: DataCollectionSettings,
    capabilities: Capabilities,
    store: LocalStore,
    uploader: Arc<Uploader<T>>,
    composer: M,
}

impl<T: Transport, M: MailComposer> ExportRouter<T, M> {
    pub fn new(ctx: &AppContext, transport: T, composer: M) -> Self {
        let settings = ctx.settings.data_collection.clone();
        let url = upload_url(&settings.server_uri, &ctx.settings.current_task);
        Self {
            app_name: ctx.app_name.clone(),
            store: LocalStore::new(settings.storage_root()),
            settings,
            capabilities: ctx.capabilities,
            uploader: Arc::new(Uploader::new(transport, url)),
            composer,
        }
    }

    pub fn store(&self) -> &LocalStore {
        &self.store
    }

    pub fn upload_url(&self) -> &str {
        self.uploader.url()
    }

    /// Runs every enabled channel on the collection.
    pub async fn export(&mut self, data: &mut DataCollection) -> ExportReport {
        if let Some(blocked) = blocked(data) {
            warn!(reason = %blocked, "export skipped");
            return ExportReport::all(blocked);
        }
        let report = ExportReport {
            local: self.save_local(data),
            upload: self.upload(data).await,
            email: self.send_email(data),
        };
        info!(
            local = %report.local,
            upload = %report.upload,
            email = %report.email,
            "export finished"
        );
        report
    }

    pub fn save_local(&self, data: &mut DataCollection) -> ChannelOutcome {
        if !self.settings.is_local_storage_enabled {
            return ChannelOutcome::Disabled;
        }
        if let Some(blocked) = blocked(data) {
            return blocked;
        }
        if !self.capabilities.can_write {
            return ChannelOutcome::Skipped("no permission to write to storage".into());
        }
        let report = self.store.write_all(data.records());
        data.set_data_saved(report.is_success());
        if report.is_success() {
            ChannelOutcome::Succeeded(format!(
                "{} files saved to {}",
                report.written.len(),
                self.store.root().display()
            ))
        } else {
            let reasons: Vec<String> = report
                .failures
                .iter()
                .map(|(name, e)| format!("Failed to write {name}: {e}"))
                .collect();
            ChannelOutcome::Failed(reasons.join("\n"))
        }
    }

    fn upload_gate(&self, data: &DataCollection) -> Option<ChannelOutcome> {
        if !self.settings.is_upload_enabled {
            return Some(ChannelOutcome::Disabled);
        }
        if let Some(blocked) = blocked(data) {
            return Some(blocked);
        }
        if !self.capabilities.can_upload {
            return Some(ChannelOutcome::Skipped(
                "Permission to access Internet denied.".into(),
            ));
        }
        None
    }

    pub async fn upload(&self, data: &mut DataCollection) -> ChannelOutcome {
        if let Some(outcome) = self.upload_gate(data) {
            return outcome;
        }
        let outcome = self.uploader.upload(data.records()).await;
        self.apply_upload(outcome, data)
    }

    /// Starts the upload on the tokio runtime and returns at once. Feed the
    /// eventual result to [`apply_upload`](Self::apply_upload). The queued
    /// data stays in place, so a failed upload can be retried.
    pub fn start_upload(&self, data: &DataCollection) -> Result<PendingUpload, ChannelOutcome> {
        if let Some(outcome) = self.upload_gate(data) {
            return Err(outcome);
        }
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            return Err(ChannelOutcome::Failed(PROCESSING_ERROR.into()));
        };
        let (tx, rx) = oneshot::channel();
        let uploader = Arc::clone(&self.uploader);
        let records = data.records().to_vec();
        runtime.spawn(async move {
            let outcome = uploader.upload(&records).await;
            // The receiver may be gone if the owner stopped waiting.
            let _ = tx.send(outcome);
        });
        Ok(PendingUpload { rx })
    }

    pub fn apply_upload(&self, outcome: UploadOutcome, data: &mut DataCollection) -> ChannelOutcome {
        data.set_data_sent(outcome.success);
        if outcome.success {
            ChannelOutcome::Succeeded(outcome.message)
        } else {
            ChannelOutcome::Failed(outcome.message)
        }
    }

    pub fn send_email(&mut self, data: &DataCollection) -> ChannelOutcome {
        if !self.settings.is_email_enabled {
            return ChannelOutcome::Disabled;
        }
        if let Some(blocked) = blocked(data) {
            return blocked;
        }
        if self.settings.email_recipient.trim().is_empty() {
            return ChannelOutcome::Skipped("no e-mail recipient configured".into());
        }
        let message = compose_email(
            &self.app_name,
            &self.settings.email_recipient,
            data.email_entries(),
        );
        match self.composer.compose(&message) {
            Ok(()) => ChannelOutcome::Succeeded(format!("e-mail to {}", message.recipient)),
            Err(e) => ChannelOutcome::Failed(e.to_string()),
        }
    }

    /// Deletes everything stored locally for `user`.
    pub fn remove_user_data(&self, user: &str) -> crate::Result<usize> {
        self.store.remove_user_data(user)
    }
}

fn blocked(data: &DataCollection) -> Option<ChannelOutcome> {
    if data.is_invalid() {
        Some(ChannelOutcome::Skipped("data set is invalid".into()))
    } else if data.is_interrupted() {
        Some(ChannelOutcome::Skipped("session was interrupted".into()))
    } else if data.is_empty() {
        Some(ChannelOutcome::Skipped("nothing to export".into()))
    } else {
        None
    }
}
