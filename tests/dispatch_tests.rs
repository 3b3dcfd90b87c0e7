//! End-to-end tests through the dispatcher, configured the way the binary
//! configures it.

use std::collections::HashMap;
use std::path::Path;

use assert_fs::prelude::*;
use serde_json::json;

use mailbridge::config::Config;
use mailbridge::dispatch::Dispatcher;

fn config_from(pairs: &[(&str, &str)]) -> Config {
    let vars: HashMap<&str, &str> = pairs.iter().copied().collect();
    Config::new().apply_env(|key| vars.get(key).map(|v| v.to_string()))
}

fn profile_with_inbox() -> assert_fs::TempDir {
    let profile = assert_fs::TempDir::new().unwrap();
    let fixture = Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join("simple.mbox");
    profile
        .child("Mail/Local Folders/Inbox")
        .write_binary(&std::fs::read(fixture).unwrap())
        .unwrap();
    profile
}

#[test]
fn test_archive_round_trip_through_dispatcher() {
    let profile = profile_with_inbox();
    let dispatcher = Dispatcher::new(config_from(&[
        ("EMAIL_CLIENT_TYPE", "thunderbird"),
        ("THUNDERBIRD_PROFILE", profile.path().to_str().unwrap()),
    ]));

    let folders = dispatcher.list_email_folders();
    let inbox = folders["folders"][0]["path"].as_str().unwrap().to_string();
    assert_eq!(folders["folders"][0]["name"], "Local Folders/Inbox");

    let page = dispatcher.read_emails(&inbox, Some(2), None);
    assert_eq!(page["count"], 2);
    assert_eq!(page["emails"][1]["subject"], "Re: Hello");
    assert_eq!(page["emails"][0]["body_truncated"], false);

    let found = dispatcher.search_emails("hello", Some(&inbox), None);
    assert_eq!(found["query"], "hello");
    assert_eq!(found["results"].as_array().unwrap().len(), 2);
    assert!(found["results"][0]["body_preview"].is_string());
}

#[test]
fn test_unknown_client_type() {
    let dispatcher = Dispatcher::new(config_from(&[("EMAIL_CLIENT_TYPE", "outlook")]));
    assert_eq!(
        dispatcher.list_email_folders(),
        json!({ "error": "Unsupported client type: outlook", "kind": "unsupported_backend" })
    );
    assert_eq!(dispatcher.get_email_config()["client_type"], "outlook");
}

#[test]
fn test_imap_without_server_does_not_connect() {
    let dispatcher = Dispatcher::new(config_from(&[("EMAIL_CLIENT_TYPE", "imap")]));
    let value = dispatcher.read_emails("INBOX", None, None);
    assert_eq!(value["kind"], "configuration_error");
    assert_eq!(value["error"], "IMAP not configured. Set IMAP_SERVER.");
}

#[test]
fn test_send_without_relay() {
    let dispatcher = Dispatcher::new(config_from(&[("EMAIL_ADDRESS", "me@example.com")]));
    assert_eq!(
        dispatcher.send_email("bob@example.com", "Hi", "Body", None),
        json!({
            "error": "SMTP not configured. Set SMTP_SERVER and EMAIL_ADDRESS.",
            "kind": "configuration_error",
        })
    );
}

#[test]
fn test_config_reflects_environment() {
    let dispatcher = Dispatcher::new(config_from(&[
        ("EMAIL_CLIENT_TYPE", "imap"),
        ("IMAP_SERVER", "imap.example.com"),
        ("IMAP_PORT", "1993"),
        ("SMTP_PORT", "not-a-port"),
        ("EMAIL_ADDRESS", "me@example.com"),
    ]));
    let value = dispatcher.get_email_config();
    assert_eq!(value["imap_server"], "imap.example.com");
    assert_eq!(value["imap_port"], 1993);
    assert_eq!(value["smtp_port"], 587);
    assert_eq!(value["password_set"], false);
}

#[test]
fn test_missing_mailbox_path() {
    let profile = profile_with_inbox();
    let dispatcher = Dispatcher::new(config_from(&[(
        "THUNDERBIRD_PROFILE",
        profile.path().to_str().unwrap(),
    )]));
    let value = dispatcher.read_emails("/definitely/not/here", None, None);
    assert_eq!(
        value,
        json!({ "error": "Mailbox not found: /definitely/not/here", "kind": "not_found" })
    );
}
