use crate::session::FetchedMessage;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

/// Longest file name we generate, in bytes.
pub const MAX_FILE_NAME_LENGTH: usize = 150;

/// Full-width hyphen, which is unlikely to show up in any of the fields.
const SEPARATOR: &str = "\u{ff0d}";
const EXTENSION: &str = ".eml";
const UNKNOWN: &str = "Unknown";

/// Characters left alone when escaping a subject, as for a URL path segment.
const SUBJECT_KEEP: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~')
    .remove(b'$')
    .remove(b'&')
    .remove(b'+')
    .remove(b':')
    .remove(b'=')
    .remove(b'@');

fn format_date(message: &FetchedMessage) -> String {
    message
        .internal_date
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S %z").to_string())
        .unwrap_or_else(|| UNKNOWN.to_string())
}

fn format_sender(message: &FetchedMessage) -> String {
    match &message.from {
        Some(from) => format!("{}@{}", from.mailbox, from.host)
            .replace(|c: char| c == '/' || c == '\0', "_"),
        None => UNKNOWN.to_string(),
    }
}

fn escape_subject(message: &FetchedMessage) -> String {
    let subject = message.subject.as_deref().unwrap_or("");
    utf8_percent_encode(subject, SUBJECT_KEEP).to_string()
}

/// Cuts `s` down to at most `max` bytes without splitting a character.
fn truncate_to(s: &mut String, max: usize) {
    if s.len() <= max {
        return;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    s.truncate(end);
}

/// Builds `DATE－SENDER－SUBJECT－UID.eml` for a message.
///
/// Names longer than `MAX_FILE_NAME_LENGTH` are shortened by cutting the
/// subject. If that is not enough, the subject is dropped and the sender is
/// cut as well. The date, the UID and the extension are always kept whole.
pub fn generate_file_name(message: &FetchedMessage) -> String {
    let date = format_date(message);
    let mut sender = format_sender(message);
    let mut subject = escape_subject(message);
    let uid = message.uid.unwrap_or(message.seq).to_string();

    let fixed = date.len() + uid.len() + SEPARATOR.len() * 3 + EXTENSION.len();
    let budget = MAX_FILE_NAME_LENGTH.saturating_sub(fixed);
    if sender.len() + subject.len() > budget {
        if sender.len() <= budget {
            // The escaped subject is pure ASCII, so any cut is valid.
            subject.truncate(budget - sender.len());
        } else {
            subject.clear();
            truncate_to(&mut sender, budget);
        }
    }

    format!(
        "{date}{sep}{sender}{sep}{subject}{sep}{uid}{ext}",
        date = date,
        sender = sender,
        subject = subject,
        uid = uid,
        sep = SEPARATOR,
        ext = EXTENSION,
    )
}
