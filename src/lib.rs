//! `mailbridge` — uniform access to email in local mbox archives and on
//! IMAP servers.
//!
//! Folders can be listed, read page by page, and searched through one
//! interface regardless of where the mail lives; outgoing mail goes through
//! an SMTP relay. Every message is normalized into the same plain-text
//! record, and the [`dispatch::Dispatcher`] renders results as JSON.

pub mod archive;
pub mod backend;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod model;
pub mod parser;
pub mod relay;
pub mod remote;
