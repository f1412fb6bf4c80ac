use crate::error::{ExportError, Result};
use chrono::Local;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::PathBuf;
use tracing::info;
use ucm_data::EmailEntry;
use ucm_data::time::TIME_FMT;

pub const DISCLAIMER: &str = "Disclaimer:\n\
By submitting this e-mail you agree to the data processing and evaluation for the purpose of \
this scientific investigation and any other purpose that an interested third party might have.\n\
The research data below will be copied from the received e-mail and will be made publicly \
available on the Internet under a CC-BY-SA license, as stated in the privacy policy you gave \
your consent to before participating in the study. The e-mail itself will be deleted within \
10 days from our e-mail service to separate the sender's address from the research data \
for the purpose of anonymization. The research data itself does not contain personal \
or sensitive information that could be used to identify you.\n";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    pub recipient: String,
    pub subject: String,
    pub body: String,
}

pub fn compose_email(app_name: &str, recipient: &str, entries: &[EmailEntry]) -> EmailMessage {
    let mut body = String::from(DISCLAIMER);
    body.push_str("\n\n### Data ###\n\n");
    for entry in entries {
        body.push_str(&entry.lines().join("\n"));
        body.push_str("\n\n");
    }
    EmailMessage {
        recipient: recipient.to_string(),
        subject: format!("New {app_name} Data Set"),
        body,
    }
}

/// Hands a composed message to whatever sends it, e.g. the platform's mail app.
pub trait MailComposer {
    fn compose(&mut self, message: &EmailMessage) -> Result<()>;
}

impl<M: MailComposer + ?Sized> MailComposer for &mut M {
    fn compose(&mut self, message: &EmailMessage) -> Result<()> {
        (**self).compose(message)
    }
}

/// Drops messages as text files into a directory for the participant to send.
#[derive(Debug, Clone)]
pub struct OutboxComposer {
    dir: PathBuf,
    sent: usize,
}

impl OutboxComposer {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            sent: 0,
        }
    }

    pub fn sent(&self) -> usize {
        self.sent
    }
}

impl MailComposer for OutboxComposer {
    fn compose(&mut self, message: &EmailMessage) -> Result<()> {
        fs::create_dir_all(&self.dir).map_err(|e| ExportError::Composer(e.to_string()))?;
        let stamp = Local::now().format(TIME_FMT).to_string();
        // Never overwrite a message another run left in the same second.
        let mut n = self.sent;
        let (path, mut file) = loop {
            let path = self.dir.join(format!("{stamp}-{n}.txt"));
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(file) => break (path, file),
                Err(e) if e.kind() == ErrorKind::AlreadyExists => n += 1,
                Err(e) => return Err(ExportError::Composer(e.to_string())),
            }
        };
        let text = format!(
            "To: {}\nSubject: {}\n\n{}",
            message.recipient, message.subject, message.body
        );
        file.write_all(text.as_bytes())
            .map_err(|e| ExportError::Composer(e.to_string()))?;
        self.sent += 1;
        info!(path = %path.display(), "e-mail placed in outbox");
        Ok(())
    }
}
