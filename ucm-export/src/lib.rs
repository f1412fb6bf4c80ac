//! Delivery of collected data: local files, server upload and e-mail.

pub mod email;
pub mod error;
pub mod local;
pub mod router;
pub mod upload;

pub use email::{EmailMessage, MailComposer, OutboxComposer, compose_email};
pub use error::{ExportError, Result};
pub use local::{LocalStore, LocalWriteReport};
pub use router::{ChannelOutcome, ExportReport, ExportRouter, PendingUpload};
pub use upload::{
    DashPayload, HttpTransport, Transport, UploadOutcome, UploadReply, Uploader, build_payload,
    is_upload_success, parse_response, upload_route, upload_url,
};
