use std::path::Path;
use std::sync::{Arc, Mutex};
use ucm_core::config::DataCollectionSettings;
use ucm_core::{AppContext, Capabilities, DeviceInfo, Notification, Settings};
use ucm_data::{DataCollection, Timestamp, UserProfile};
use ucm_export::{
    ChannelOutcome, DashPayload, EmailMessage, ExportError, ExportRouter, MailComposer, Transport,
};

#[derive(Clone)]
struct FakeTransport {
    reply: Option<String>,
    calls: Arc<Mutex<Vec<(String, DashPayload)>>>,
}

impl FakeTransport {
    fn replying(text: &str) -> Self {
        Self {
            reply: Some(text.to_string()),
            calls: Arc::default(),
        }
    }

    fn unreachable() -> Self {
        Self {
            reply: None,
            calls: Arc::default(),
        }
    }
}

impl Transport for FakeTransport {
    async fn post(&self, url: &str, payload: &DashPayload) -> ucm_export::Result<String> {
        self.calls
            .lock()
            .unwrap()
            .push((url.to_string(), payload.clone()));
        self.reply
            .clone()
            .ok_or_else(|| ExportError::Network(url.to_string()))
    }
}

#[derive(Default)]
struct Mailbox(Vec<EmailMessage>);

impl MailComposer for Mailbox {
    fn compose(&mut self, message: &EmailMessage) -> ucm_export::Result<()> {
        self.0.push(message.clone());
        Ok(())
    }
}

fn context(root: &Path, capabilities: Capabilities) -> AppContext {
    let settings = Settings {
        current_user: "u1".into(),
        data_collection: DataCollectionSettings {
            is_local_storage_enabled: true,
            is_upload_enabled: true,
            is_email_enabled: true,
            server_uri: "http://lab.example.org/".into(),
            email_recipient: "lab@example.org".into(),
            storage_root: Some(root.to_path_buf()),
        },
        ..Settings::default()
    };
    AppContext::new(settings, DeviceInfo::default()).with_capabilities(capabilities)
}

fn collection(ctx: &AppContext) -> DataCollection {
    let ts = Timestamp::now();
    let mut data = DataCollection::new();
    data.new_collection(&ctx.settings.current_user, &ctx.device, &ts);
    data.add_user_data(&UserProfile::default(), &ctx.settings.current_task, &ts);
    data
}

const OK_REPLY: &str =
    r#"{"response":{"output-data-upload":{"children":[{"props":{"children":"Upload successful."}}]}}}"#;

#[tokio::test]
async fn every_channel_reports_on_its_own() {
    let tmp = tempfile::tempdir().unwrap();
    let ctx = context(tmp.path(), Capabilities::default());
    let transport = FakeTransport::replying(OK_REPLY);
    let mut router = ExportRouter::new(&ctx, transport.clone(), Mailbox::default());
    let mut data = collection(&ctx);

    let report = router.export(&mut data).await;
    assert!(report.local.is_success(), "{}", report.local);
    assert_eq!(report.upload, ChannelOutcome::Succeeded("Upload successful.".into()));
    assert!(report.email.is_success());
    assert!(data.is_data_saved());
    assert!(data.is_data_sent());
    assert!(tmp.path().join("Circle_Task").join("u1").join("user.csv").exists());

    let calls = transport.calls.lock().unwrap();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].0, "http://lab.example.org/circletask/_dash-update-component");
    assert_eq!(
        report.notifications(),
        [Notification::Success("Upload successful.".into())]
    );
}

#[tokio::test]
async fn error_anywhere_in_reply_fails_upload() {
    let tmp = tempfile::tempdir().unwrap();
    let ctx = context(tmp.path(), Capabilities::default());
    let reply = r#"{"response":{"props":{"children":[{"props":{"children":"Upload failed. ERROR: invalid file"}}]}}}"#;
    let router = ExportRouter::new(&ctx, FakeTransport::replying(reply), Mailbox::default());
    let mut data = collection(&ctx);

    let outcome = router.upload(&mut data).await;
    assert_eq!(
        outcome,
        ChannelOutcome::Failed("Upload failed. ERROR: invalid file".into())
    );
    assert!(!data.is_data_sent());
    // Data stays queued for another attempt.
    assert_eq!(data.records().len(), 2);
}

#[tokio::test]
async fn short_plain_reply_is_passed_through() {
    let tmp = tempfile::tempdir().unwrap();
    let ctx = context(tmp.path(), Capabilities::default());
    let router = ExportRouter::new(
        &ctx,
        FakeTransport::replying("Service Unavailable"),
        Mailbox::default(),
    );
    let mut data = collection(&ctx);
    assert_eq!(
        router.upload(&mut data).await,
        ChannelOutcome::Failed("Service Unavailable".into())
    );
}

#[tokio::test]
async fn unreachable_server_names_the_url() {
    let tmp = tempfile::tempdir().unwrap();
    let ctx = context(tmp.path(), Capabilities::default());
    let router = ExportRouter::new(&ctx, FakeTransport::unreachable(), Mailbox::default());
    let mut data = collection(&ctx);
    assert_eq!(
        router.upload(&mut data).await,
        ChannelOutcome::Failed(
            "ERROR: Server not reachable:\nhttp://lab.example.org/circletask/_dash-update-component"
                .into()
        )
    );
}

#[tokio::test]
async fn capabilities_gate_channels() {
    let tmp = tempfile::tempdir().unwrap();
    let ctx = context(
        tmp.path(),
        Capabilities {
            can_write: false,
            can_upload: false,
        },
    );
    let transport = FakeTransport::replying(OK_REPLY);
    let mut router = ExportRouter::new(&ctx, transport.clone(), Mailbox::default());
    let mut data = collection(&ctx);

    let report = router.export(&mut data).await;
    assert!(matches!(report.local, ChannelOutcome::Skipped(_)));
    assert!(matches!(report.upload, ChannelOutcome::Skipped(_)));
    assert!(report.email.is_success());
    assert!(transport.calls.lock().unwrap().is_empty());
    assert!(!report.any_failed());
}

#[tokio::test]
async fn invalid_collection_is_never_exported() {
    let tmp = tempfile::tempdir().unwrap();
    let ctx = context(tmp.path(), Capabilities::default());
    let transport = FakeTransport::replying(OK_REPLY);
    let mut mailbox = Mailbox::default();
    let mut data = collection(&ctx);
    data.mark_invalid();

    {
        let mut router = ExportRouter::new(&ctx, transport.clone(), &mut mailbox);
        let report = router.export(&mut data).await;
        assert!(matches!(report.local, ChannelOutcome::Skipped(_)));
        assert!(matches!(report.upload, ChannelOutcome::Skipped(_)));
        assert!(matches!(report.email, ChannelOutcome::Skipped(_)));
    }
    assert!(transport.calls.lock().unwrap().is_empty());
    assert!(mailbox.0.is_empty());
    assert_eq!(std::fs::read_dir(tmp.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn interrupted_session_is_never_exported() {
    let tmp = tempfile::tempdir().unwrap();
    let ctx = context(tmp.path(), Capabilities::default());
    let transport = FakeTransport::replying(OK_REPLY);
    let mut router = ExportRouter::new(&ctx, transport.clone(), Mailbox::default());
    let mut data = collection(&ctx);
    data.discard_session();

    let report = router.export(&mut data).await;
    assert_eq!(
        report.local,
        ChannelOutcome::Skipped("session was interrupted".into())
    );
    assert!(matches!(report.upload, ChannelOutcome::Skipped(_)));
    assert!(matches!(report.email, ChannelOutcome::Skipped(_)));
    assert!(transport.calls.lock().unwrap().is_empty());
    assert_eq!(std::fs::read_dir(tmp.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn background_upload_completes_through_handle() {
    let tmp = tempfile::tempdir().unwrap();
    let ctx = context(tmp.path(), Capabilities::default());
    let router = ExportRouter::new(&ctx, FakeTransport::replying(OK_REPLY), Mailbox::default());
    let mut data = collection(&ctx);

    let pending = router.start_upload(&data).unwrap();
    let outcome = pending.wait().await;
    assert!(router.apply_upload(outcome, &mut data).is_success());
    assert!(data.is_data_sent());
}

#[test]
fn background_upload_needs_a_runtime() {
    let tmp = tempfile::tempdir().unwrap();
    let ctx = context(tmp.path(), Capabilities::default());
    let router = ExportRouter::new(&ctx, FakeTransport::replying(OK_REPLY), Mailbox::default());
    let data = collection(&ctx);
    assert!(matches!(
        router.start_upload(&data),
        Err(ChannelOutcome::Failed(_))
    ));
}
