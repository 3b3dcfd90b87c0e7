//! Outbound mail over an authenticated SMTP relay.

use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message as Email, SmtpTransport, Transport};
use tracing::debug;

use crate::backend::{MessageSender, OutgoingMessage};
use crate::config::{Config, DEFAULT_SMTP_PORT};
use crate::error::{MailError, Result};

/// Sends plain-text messages through the configured relay using STARTTLS.
#[derive(Clone)]
pub struct RelaySender {
    host: String,
    port: u16,
    address: String,
    password: String,
}

impl RelaySender {
    pub fn new(
        host: impl Into<String>,
        port: u16,
        address: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            port,
            address: address.into(),
            password: password.into(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.smtp.host.clone(),
            config.smtp.port,
            config.account.address.clone(),
            config.account.password.clone(),
        )
    }

    fn ensure_configured(&self) -> Result<()> {
        if self.host.trim().is_empty() || self.address.trim().is_empty() {
            return Err(MailError::Configuration(
                "SMTP not configured. Set SMTP_SERVER and EMAIL_ADDRESS.".into(),
            ));
        }
        Ok(())
    }

    fn transport(&self) -> Result<SmtpTransport> {
        let port = if self.port == 0 { DEFAULT_SMTP_PORT } else { self.port };
        let transport = SmtpTransport::starttls_relay(&self.host)?
            .port(port)
            .credentials(Credentials::new(self.address.clone(), self.password.clone()))
            .build();
        Ok(transport)
    }
}

impl std::fmt::Debug for RelaySender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelaySender")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}

impl MessageSender for RelaySender {
    fn send(&self, message: &OutgoingMessage) -> Result<String> {
        self.ensure_configured()?;
        let email = compose(&self.address, message)?;
        debug!(host = %self.host, port = self.port, to = %message.to, "Sending via relay");
        deliver(&self.transport()?, &email)?;
        Ok(format!("Email sent to {}", message.to))
    }
}

/// Build the wire message. Every non-empty comma-separated `cc` entry
/// becomes a `Cc:` recipient and is added to the envelope.
pub fn compose(from: &str, message: &OutgoingMessage) -> Result<Email> {
    let mut builder = Email::builder()
        .from(parse_mailbox(from)?)
        .to(parse_mailbox(&message.to)?)
        .subject(message.subject.as_str());

    for cc in cc_addresses(message.cc.as_deref()) {
        builder = builder.cc(parse_mailbox(cc)?);
    }

    builder
        .header(ContentType::TEXT_PLAIN)
        .body(message.body.clone())
        .map_err(|e| MailError::Parse(format!("Could not build message: {e}")))
}

/// Hand a composed message to any lettre transport.
pub fn deliver<T>(transport: &T, email: &Email) -> Result<()>
where
    T: Transport,
    T::Error: std::fmt::Display,
{
    transport
        .send(email)
        .map(|_| ())
        .map_err(|e| MailError::Transport(e.to_string()))
}

fn cc_addresses(cc: Option<&str>) -> impl Iterator<Item = &str> {
    cc.unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|addr| !addr.is_empty())
}

fn parse_mailbox(address: &str) -> Result<Mailbox> {
    address
        .trim()
        .parse::<Mailbox>()
        .map_err(|e| MailError::InvalidAddress {
            address: address.to_string(),
            reason: e.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use lettre::transport::stub::StubTransport;

    fn outgoing(cc: Option<&str>) -> OutgoingMessage {
        OutgoingMessage {
            to: "bob@example.com".into(),
            subject: "Lunch".into(),
            body: "Noon?".into(),
            cc: cc.map(String::from),
        }
    }

    #[test]
    fn test_unconfigured_relay_is_rejected() {
        let sender = RelaySender::new("", 587, "me@example.com", "pw");
        let err = sender.send(&outgoing(None)).unwrap_err();
        assert_eq!(err.kind(), "configuration_error");
        assert_eq!(
            err.to_string(),
            "SMTP not configured. Set SMTP_SERVER and EMAIL_ADDRESS."
        );

        let no_address = RelaySender::new("smtp.example.com", 587, "", "pw");
        assert!(matches!(
            no_address.send(&outgoing(None)),
            Err(MailError::Configuration(_))
        ));
    }

    #[test]
    fn test_cc_recipients_join_envelope() {
        let cc = Some(" carol@example.com, ,dave@example.com ");
        let email = compose("me@example.com", &outgoing(cc)).unwrap();
        let recipients: Vec<String> = email
            .envelope()
            .to()
            .iter()
            .map(|addr| addr.to_string())
            .collect();
        assert_eq!(
            recipients,
            vec!["bob@example.com", "carol@example.com", "dave@example.com"]
        );
        assert_eq!(
            email.envelope().from().map(|a| a.to_string()).as_deref(),
            Some("me@example.com")
        );
    }

    #[test]
    fn test_body_is_plain_text() {
        let email = compose("me@example.com", &outgoing(None)).unwrap();
        let wire = String::from_utf8(email.formatted()).unwrap();
        assert!(wire.contains("Content-Type: text/plain; charset=utf-8"));
        assert!(wire.contains("Subject: Lunch"));
        assert!(wire.contains("Noon?"));
        assert!(!wire.contains("Cc:"));
    }

    #[test]
    fn test_invalid_recipient() {
        let mut message = outgoing(None);
        message.to = "not an address".into();
        let err = compose("me@example.com", &message).unwrap_err();
        assert_eq!(err.kind(), "invalid_address");
    }

    #[test]
    fn test_deliver_through_stub() {
        let email = compose("me@example.com", &outgoing(None)).unwrap();
        assert!(deliver(&StubTransport::new_ok(), &email).is_ok());

        let err = deliver(&StubTransport::new_error(), &email).unwrap_err();
        assert_eq!(err.kind(), "transport_failure");
    }

    #[test]
    fn test_debug_hides_password() {
        let sender = RelaySender::new("smtp.example.com", 587, "me@example.com", "hunter2");
        assert!(!format!("{sender:?}").contains("hunter2"));
    }
}
