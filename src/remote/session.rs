//! IMAP session plumbing.
//!
//! A [`Connector`] performs connect + login and hands back a
//! [`MailSession`]. Callers never hold a bare session: they get a
//! [`SessionGuard`], which logs out when it goes out of scope, on every
//! exit path.

use std::net::TcpStream;
use std::ops::{Deref, DerefMut};

use native_tls::{TlsConnector, TlsStream};
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::{MailError, Result};
use crate::parser::header::decode_mailbox_name;

/// An authenticated session with a remote store.
pub trait MailSession {
    /// Raw mailbox names, as the server sends them.
    fn list_folders(&mut self) -> Result<Vec<String>>;
    fn select(&mut self, folder: &str) -> Result<()>;
    /// Sequence numbers matching `criteria`, ascending.
    fn search(&mut self, criteria: &str) -> Result<Vec<u32>>;
    /// Full RFC 822 bytes of one message.
    fn fetch_raw(&mut self, seq: u32) -> Result<Vec<u8>>;
    fn logout(&mut self) -> Result<()>;
}

/// Opens authenticated sessions.
pub trait Connector: Send + Sync {
    type Session: MailSession;

    fn connect(&self) -> Result<Self::Session>;

    /// Connect and wrap the session in a guard.
    fn open(&self) -> Result<SessionGuard<Self::Session>> {
        let session = self.connect()?;
        debug!("Session authenticated");
        Ok(SessionGuard::new(session))
    }
}

/// Owns a session and logs it out on drop.
pub struct SessionGuard<S: MailSession> {
    session: S,
    logged_out: bool,
}

impl<S: MailSession> SessionGuard<S> {
    pub fn new(session: S) -> Self {
        Self {
            session,
            logged_out: false,
        }
    }

    /// Log out explicitly. Errors are logged, not returned: by the time we
    /// tear down, the operation's own result is what matters.
    pub fn close(mut self) {
        self.logout_once();
    }

    fn logout_once(&mut self) {
        if self.logged_out {
            return;
        }
        self.logged_out = true;
        match self.session.logout() {
            Ok(()) => debug!("Session logged out"),
            Err(e) => warn!(error = %e, "Logout failed"),
        }
    }
}

impl<S: MailSession> Deref for SessionGuard<S> {
    type Target = S;

    fn deref(&self) -> &S {
        &self.session
    }
}

impl<S: MailSession> DerefMut for SessionGuard<S> {
    fn deref_mut(&mut self) -> &mut S {
        &mut self.session
    }
}

impl<S: MailSession> Drop for SessionGuard<S> {
    fn drop(&mut self) {
        self.logout_once();
    }
}

// ── IMAP over TLS ───────────────────────────────────────────────

/// Connects to an IMAP server over implicit TLS and logs in.
#[derive(Clone)]
pub struct ImapConnector {
    host: String,
    port: u16,
    username: String,
    password: String,
}

impl ImapConnector {
    pub fn new(
        host: impl Into<String>,
        port: u16,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            port,
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.imap.host.clone(),
            config.imap.port,
            config.account.address.clone(),
            config.account.password.clone(),
        )
    }
}

impl std::fmt::Debug for ImapConnector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImapConnector")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

impl Connector for ImapConnector {
    type Session = ImapSession;

    fn connect(&self) -> Result<ImapSession> {
        if self.host.trim().is_empty() {
            return Err(MailError::Configuration(
                "IMAP not configured. Set IMAP_SERVER.".into(),
            ));
        }

        debug!(host = %self.host, port = self.port, "Connecting to IMAP server");
        let tls = TlsConnector::builder()
            .build()
            .map_err(|e| MailError::Transport(format!("TLS setup failed: {e}")))?;
        let client = imap::connect((self.host.as_str(), self.port), &self.host, &tls)?;

        let session = client
            .login(&self.username, &self.password)
            .map_err(|(e, _client)| MailError::Transport(format!("IMAP login failed: {e}")))?;

        Ok(ImapSession { inner: session })
    }
}

/// A logged-in IMAP session.
pub struct ImapSession {
    inner: imap::Session<TlsStream<TcpStream>>,
}

impl MailSession for ImapSession {
    fn list_folders(&mut self) -> Result<Vec<String>> {
        let names = self.inner.list(None, Some("*"))?;
        Ok(names.iter().map(|name| name.name().to_string()).collect())
    }

    fn select(&mut self, folder: &str) -> Result<()> {
        let mailbox = self.inner.select(folder)?;
        debug!(folder, exists = mailbox.exists, "Folder selected");
        Ok(())
    }

    fn search(&mut self, criteria: &str) -> Result<Vec<u32>> {
        let mut ids: Vec<u32> = self.inner.search(criteria)?.into_iter().collect();
        ids.sort_unstable();
        Ok(ids)
    }

    fn fetch_raw(&mut self, seq: u32) -> Result<Vec<u8>> {
        let fetches = self.inner.fetch(seq.to_string(), "RFC822")?;
        fetches
            .iter()
            .find_map(|fetch| fetch.body())
            .map(<[u8]>::to_vec)
            .ok_or_else(|| MailError::Transport(format!("Server returned no body for message {seq}")))
    }

    fn logout(&mut self) -> Result<()> {
        self.inner.logout()?;
        Ok(())
    }
}

/// Display form of a raw mailbox name.
pub fn display_name(raw: &str) -> String {
    decode_mailbox_name(raw)
}
