//! Integration tests for the mbox container, record builder and codecs.

use assert_fs::prelude::*;
use chrono::{TimeZone, Utc};

use mailsift::mailbox::mboxdir::MboxDirectory;
use mailsift::mailbox::{MailFolder, Mailbox};
use mailsift::model::address::{is_valid_address, normalize_addresses};
use mailsift::model::message::ParsedMessage;
use mailsift::parser::builder::MessageBuilder;
use mailsift::parser::identifier::extract_identifiers;
use mailsift::parser::timestamp::{decode_filetime, encode_filetime};

const TWO_MESSAGES: &str = "From alice@example.com Mon Jan  1 12:00:00 2018\n\
From: Alice Smith <Alice@Example.com>\n\
To: Bob <bob@example.com>, carol@example.com\n\
Subject: Budget\n\
Date: Mon, 1 Jan 2018 12:00:00 +0000\n\
Message-ID: <budget-1@example.com>\n\
\n\
Can you send the numbers?\n\
\n\
From bob@example.com Mon Jan  1 12:30:00 2018\n\
From: bob@example.com\n\
To: Alice Smith <alice@example.com>\n\
Subject: RE: Budget\n\
Date: Mon, 1 Jan 2018 12:30:00 +0000\n\
Message-ID: <budget-2@example.com>\n\
In-Reply-To: <budget-1@example.com>\n\
References: <budget-1@example.com>\n\
\n\
Attached.\n";

/// Parse every message of the single folder in `path`.
fn parse_all(path: &std::path::Path) -> Vec<ParsedMessage> {
    let mailbox = MboxDirectory::open(path).unwrap();
    let folder = mailbox.root_folders().unwrap().remove(0);
    let builder = MessageBuilder::default();
    (0..folder.message_count().unwrap())
        .map(|i| {
            let raw = folder.message(i).unwrap();
            builder.build(&raw, folder.name()).unwrap()
        })
        .collect()
}

// ─── Test 1: mbox folder → validated records ────────────────────────

#[test]
fn test_parse_mbox_records() {
    let temp = assert_fs::TempDir::new().unwrap();
    let file = temp.child("Inbox.mbox");
    file.write_str(TWO_MESSAGES).unwrap();

    let messages = parse_all(file.path());
    assert_eq!(messages.len(), 2);

    let first = &messages[0];
    assert_eq!(first.folder_path, "Inbox");
    assert_eq!(first.from_address, "alice@example.com");
    assert_eq!(first.sender_name.as_deref(), Some("Alice Smith"));
    assert_eq!(first.global_message_id, "budget-1@example.com");
    assert!(!first.global_id_synthesized);
    assert_eq!(
        first.to_address.as_ref().map(|r| r.as_slice().to_vec()),
        Some(vec!["bob@example.com".to_string(), "carol@example.com".to_string()])
    );
    assert_eq!(
        first.submit_time,
        Some(Utc.with_ymd_and_hms(2018, 1, 1, 12, 0, 0).unwrap())
    );
    assert_eq!(first.plain_text_body.as_deref().map(str::trim), Some("Can you send the numbers?"));
    assert!(first.in_reply_to.is_none());

    let second = &messages[1];
    assert_eq!(second.in_reply_to.as_deref(), Some("budget-1@example.com"));
    assert_eq!(second.references, Some(vec!["budget-1@example.com".to_string()]));
    assert_eq!(second.subject.as_deref(), Some("RE: Budget"));
}

// ─── Test 2: Body truncated to exactly the configured length ────────

#[test]
fn test_body_truncation() {
    let temp = assert_fs::TempDir::new().unwrap();
    let file = temp.child("Big.mbox");
    let body = "x".repeat(25_000);
    file.write_str(&format!(
        "From a@example.com Mon Jan  1 12:00:00 2018\nFrom: a@example.com\nMessage-ID: <big@example.com>\n\n{body}\n"
    ))
    .unwrap();

    let messages = parse_all(file.path());
    let plain = messages[0].plain_text_body.as_deref().unwrap();
    assert_eq!(plain.chars().count(), 10_000);
}

// ─── Test 3: Charset declared in Content-Type ───────────────────────

#[test]
fn test_charset_decoding() {
    let temp = assert_fs::TempDir::new().unwrap();
    let file = temp.child("Latin.mbox");
    file.write_str(
        "From a@example.com Mon Jan  1 12:00:00 2018\n\
From: a@example.com\n\
Message-ID: <latin@example.com>\n\
Content-Type: text/plain; charset=iso-8859-1\n\
Content-Transfer-Encoding: quoted-printable\n\
\n\
caf=E9 cr=E8me\n",
    )
    .unwrap();

    let messages = parse_all(file.path());
    assert_eq!(messages[0].charset.as_deref(), Some("iso-8859-1"));
    assert!(messages[0]
        .plain_text_body
        .as_deref()
        .unwrap()
        .starts_with("café crème"));
}

// ─── Test 4: HTML-only message gets a converted plain body ──────────

#[test]
fn test_html_only_converted() {
    let temp = assert_fs::TempDir::new().unwrap();
    let file = temp.child("Html.mbox");
    file.write_str(
        "From a@example.com Mon Jan  1 12:00:00 2018\n\
From: a@example.com\n\
Message-ID: <html@example.com>\n\
Content-Type: text/html; charset=utf-8\n\
\n\
<html><body><p>Hello <b>there</b></p><script>x()</script></body></html>\n",
    )
    .unwrap();

    let msg = &parse_all(file.path())[0];
    assert!(msg.plain_text_is_converted);
    let plain = msg.plain_text_body.as_deref().unwrap();
    assert!(plain.contains("Hello there"));
    assert!(!plain.contains("x()"));
    assert!(msg.html_body.as_deref().unwrap().contains("<b>there</b>"));
}

// ─── Test 5: Missing Message-ID is synthesized deterministically ────

#[test]
fn test_synthesized_message_id() {
    let temp = assert_fs::TempDir::new().unwrap();
    let file = temp.child("NoId.mbox");
    file.write_str("From a@example.com Mon Jan  1 12:00:00 2018\nFrom: a@example.com\nSubject: hi\n\nbody\n")
        .unwrap();

    let first = parse_all(file.path());
    let second = parse_all(file.path());
    assert!(first[0].global_id_synthesized);
    assert_eq!(first[0].global_message_id, second[0].global_message_id);
    assert!(first[0].global_message_id.ends_with("@mailsift.invalid"));
}

// ─── Test 6: Invalid sender fails only that message ─────────────────

#[test]
fn test_invalid_sender_rejected() {
    let temp = assert_fs::TempDir::new().unwrap();
    let file = temp.child("Bad.mbox");
    file.write_str(
        "From x Mon Jan  1 12:00:00 2018\nFrom: nobody@localhost\nMessage-ID: <bad@x.com>\n\nbody\n",
    )
    .unwrap();

    let mailbox = MboxDirectory::open(file.path()).unwrap();
    let folder = mailbox.root_folders().unwrap().remove(0);
    let raw = folder.message(0).unwrap();
    let err = MessageBuilder::default().build(&raw, "Bad").unwrap_err();
    assert_eq!(err.field, "from");
}

// ─── Address normalization ──────────────────────────────────────────

#[test]
fn test_normalize_single_address() {
    let recipients = normalize_addresses(Some(" John Doe <JOHN@X.COM> ")).unwrap();
    assert_eq!(recipients.as_slice(), ["john@x.com".to_string()]);
}

#[test]
fn test_normalize_idempotent() {
    let raw = "\"Doe, Jane\" <Jane@X.com>, bob@y.org, Carol <carol@z.net>";
    let once = normalize_addresses(Some(raw)).unwrap();
    let twice = normalize_addresses(Some(&once.to_header_value())).unwrap();
    assert_eq!(once, twice);
    assert!(once.iter().all(|a| is_valid_address(a)));
}

// ─── Identifiers ────────────────────────────────────────────────────

#[test]
fn test_extract_message_ids() {
    assert_eq!(
        extract_identifiers(Some("<a@x.com> <b@y.com>\r\n\t<c@z.com>")),
        Some(vec!["a@x.com".to_string(), "b@y.com".to_string(), "c@z.com".to_string()])
    );
    assert_eq!(extract_identifiers(Some("no brackets")), None);
    assert_eq!(extract_identifiers(None), None);
}

// ─── FILETIME codec ─────────────────────────────────────────────────

#[test]
fn test_filetime_floor_and_monotonic() {
    let floor = Utc.with_ymd_and_hms(1601, 1, 1, 0, 0, 0).unwrap();
    let mut previous = None;
    for raw in [1u64, 10, 1_000_000, 116_444_736_000_000_000, 131_592_384_000_000_000] {
        let decoded = decode_filetime(Some(raw)).unwrap();
        assert!(decoded >= floor);
        if let Some(prev) = previous {
            assert!(decoded > prev);
        }
        previous = Some(decoded);
    }
    assert_eq!(decode_filetime(Some(0)), None);
    assert_eq!(decode_filetime(None), None);

    let epoch = Utc.with_ymd_and_hms(1970, 1, 1, 0, 0, 0).unwrap();
    assert_eq!(encode_filetime(&epoch), Some(116_444_736_000_000_000));
}
