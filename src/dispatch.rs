//! Routes each operation to the configured backend and renders the
//! outcome as JSON.
//!
//! Every operation returns a `serde_json::Value`. Failures never escape
//! as `Err`: they come back as `{"error": message, "kind": kind}`.

use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::archive::ArchiveBackend;
use crate::backend::{MailStore, MessageSender, OutgoingMessage};
use crate::config::{BackendKind, Config};
use crate::error::{MailError, Result};
use crate::relay::RelaySender;
use crate::remote::RemoteStore;

/// Page size used when the caller gives none.
pub const DEFAULT_LIMIT: usize = 20;

/// Owns one store and one sender, chosen once from the configuration.
pub struct Dispatcher {
    config: Config,
    store: Option<Box<dyn MailStore>>,
    sender: Box<dyn MessageSender>,
}

impl Dispatcher {
    pub fn new(config: Config) -> Self {
        let store: Option<Box<dyn MailStore>> = match config.backend {
            BackendKind::Thunderbird => Some(Box::new(ArchiveBackend::from_config(&config))),
            BackendKind::Imap => Some(Box::new(RemoteStore::from_config(&config))),
            BackendKind::Unsupported(_) => None,
        };
        let sender = Box::new(RelaySender::from_config(&config));
        debug!(backend = %config.backend, "Dispatcher ready");
        Self {
            config,
            store,
            sender,
        }
    }

    /// Build a dispatcher around caller-supplied parts. A `None` store
    /// behaves like an unsupported backend.
    pub fn with_parts(
        config: Config,
        store: Option<Box<dyn MailStore>>,
        sender: Box<dyn MessageSender>,
    ) -> Self {
        Self {
            config,
            store,
            sender,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    fn store(&self) -> Result<&dyn MailStore> {
        self.store
            .as_deref()
            .ok_or_else(|| MailError::UnsupportedBackend(self.config.backend.to_string()))
    }

    fn ensure_supported(&self) -> Result<()> {
        if self.config.backend.is_supported() {
            Ok(())
        } else {
            Err(MailError::UnsupportedBackend(self.config.backend.to_string()))
        }
    }

    pub fn list_email_folders(&self) -> Value {
        render("list_email_folders", || {
            let listing = self.store()?.list_folders()?;
            Ok(json!(listing))
        })
    }

    pub fn read_emails(&self, folder: &str, limit: Option<usize>, offset: Option<usize>) -> Value {
        let limit = limit.unwrap_or(DEFAULT_LIMIT);
        let offset = offset.unwrap_or(0);
        render("read_emails", || {
            let emails = self.store()?.read(folder, limit, offset)?;
            Ok(json!({ "count": emails.len(), "emails": emails }))
        })
    }

    pub fn search_emails(&self, query: &str, folder: Option<&str>, limit: Option<usize>) -> Value {
        let limit = limit.unwrap_or(DEFAULT_LIMIT);
        render("search_emails", || {
            let results = self.store()?.search(query, folder, limit)?;
            Ok(json!({ "query": query, "results": results }))
        })
    }

    pub fn send_email(&self, to: &str, subject: &str, body: &str, cc: Option<&str>) -> Value {
        render("send_email", || {
            self.ensure_supported()?;
            let message = OutgoingMessage {
                to: to.to_string(),
                subject: subject.to_string(),
                body: body.to_string(),
                cc: cc.map(String::from),
            };
            let confirmation = self.sender.send(&message)?;
            Ok(json!({ "success": true, "message": confirmation }))
        })
    }

    /// Effective configuration with the password replaced by a flag.
    pub fn get_email_config(&self) -> Value {
        let config = &self.config;
        json!({
            "client_type": config.backend.as_str(),
            "thunderbird_profile": config
                .archive
                .profile
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_default(),
            "imap_server": config.imap.host,
            "imap_port": config.imap.port,
            "smtp_server": config.smtp.host,
            "smtp_port": config.smtp.port,
            "email_address": config.account.address,
            "password_set": !config.account.password.is_empty(),
        })
    }
}

fn render(operation: &str, f: impl FnOnce() -> Result<Value>) -> Value {
    match f() {
        Ok(value) => value,
        Err(e) => {
            warn!(operation, kind = e.kind(), error = %e, "Operation failed");
            error_value(&e)
        }
    }
}

/// JSON form of an error.
pub fn error_value(error: &MailError) -> Value {
    json!({ "error": error.to_string(), "kind": error.kind() })
}
