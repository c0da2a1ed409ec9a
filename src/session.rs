use anyhow::{anyhow, bail, Context, Result};
use chrono::{DateTime, FixedOffset};
use crate::stream::QUEUE_CAPACITY;
use imap::types::{Fetch, NameAttribute};
use log::info;
use native_tls::{TlsConnector, TlsStream};
use std::fmt;
use std::net::TcpStream;
use std::sync::mpsc::SyncSender;

const DEFAULT_PORT: u16 = 993;

/// Messages requested per FETCH command. The server's whole response is
/// buffered before any message is handed on, so this bounds memory use.
const FETCH_CHUNK: u32 = QUEUE_CAPACITY as u32;

/// A folder as returned by `LIST`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FolderInfo {
    pub path: String,
    /// False for `\Noselect` folders, which only exist as hierarchy nodes.
    pub selectable: bool,
    /// Hierarchy separator, `None` for a flat namespace.
    pub delimiter: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Address {
    pub mailbox: String,
    pub host: String,
}

/// One message as it comes out of a `FETCH`, detached from the connection
/// buffer it was parsed from.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FetchedMessage {
    pub seq: u32,
    pub uid: Option<u32>,
    pub internal_date: Option<DateTime<FixedOffset>>,
    pub from: Option<Address>,
    pub subject: Option<String>,
    pub size: Option<u32>,
    pub body: Vec<Vec<u8>>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FetchQuery {
    /// Flags, internal date and size only.
    Fast,
    /// Everything needed to name and store the message.
    Full,
}

impl FetchQuery {
    fn as_imap(self) -> &'static str {
        match self {
            FetchQuery::Fast => "FAST",
            // PEEK keeps the server from setting \Seen.
            FetchQuery::Full => "(ENVELOPE INTERNALDATE UID BODY.PEEK[])",
        }
    }
}

/// An inclusive range of message sequence numbers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SequenceRange {
    pub first: u32,
    pub last: u32,
}

impl SequenceRange {
    /// The range covering every message of a folder holding `count`
    /// messages, or `None` for an empty folder.
    pub fn all(count: u32) -> Option<Self> {
        if count == 0 {
            None
        } else {
            Some(SequenceRange { first: 1, last: count })
        }
    }

    pub fn len(&self) -> u64 {
        u64::from(self.last - self.first) + 1
    }

    /// Splits the range into consecutive ranges of at most `size` messages.
    pub fn chunks(self, size: u32) -> impl Iterator<Item = SequenceRange> {
        let size = size.max(1);
        let last = self.last;
        let mut next = Some(self.first);
        std::iter::from_fn(move || {
            let first = next?;
            let end = first.saturating_add(size - 1).min(last);
            next = if end < last { Some(end + 1) } else { None };
            Some(SequenceRange { first, last: end })
        })
    }
}

impl fmt::Display for SequenceRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.first, self.last)
    }
}

/// The operations the downloader needs from an authenticated mail session.
///
/// Streaming operations push their results into `sink` and drop it once
/// they are done; the returned `Result` tells whether the stream ended
/// because it was complete or because something failed.
pub trait MailSession: Send {
    /// Selects `folder` and returns the number of messages in it.
    fn select(&mut self, folder: &str) -> Result<u32>;

    fn list(&mut self, reference: &str, pattern: &str, sink: SyncSender<FolderInfo>)
        -> Result<()>;

    fn fetch(
        &mut self,
        range: SequenceRange,
        query: FetchQuery,
        sink: SyncSender<FetchedMessage>,
    ) -> Result<()>;

    fn logout(&mut self) -> Result<()>;
}

fn send<T>(sink: &SyncSender<T>, item: T) -> Result<()> {
    sink.send(item)
        .map_err(|_| anyhow!("receiver stopped accepting results"))
}

/// Decodes RFC 2047 encoded words in a raw header value, falling back to
/// lossy UTF-8 when it cannot be parsed.
fn decode_header_value(raw: &[u8]) -> String {
    let lossy = String::from_utf8_lossy(raw);
    if !lossy.contains("=?") {
        return lossy.into_owned();
    }
    let header = format!("X: {}", lossy);
    match mailparse::parse_header(header.as_bytes()) {
        Ok((header, _)) => header.get_value(),
        Err(_) => lossy.into_owned(),
    }
}

fn raw_bytes<B: AsRef<[u8]> + ?Sized>(raw: &B) -> &[u8] {
    raw.as_ref()
}

fn lossy(raw: Option<&[u8]>) -> String {
    raw.map(|raw| String::from_utf8_lossy(raw).into_owned())
        .unwrap_or_default()
}

fn convert_fetch(fetch: &Fetch) -> FetchedMessage {
    let envelope = fetch.envelope();
    let from = envelope
        .and_then(|envelope| envelope.from.as_ref())
        .and_then(|addresses| addresses.first())
        .map(|address| Address {
            mailbox: lossy(address.mailbox.as_ref().map(raw_bytes)),
            host: lossy(address.host.as_ref().map(raw_bytes)),
        });
    let subject = envelope
        .and_then(|envelope| envelope.subject.as_ref())
        .map(|subject| decode_header_value(raw_bytes(subject)));
    let body = fetch
        .body()
        .map(|body| vec![body.to_vec()])
        .unwrap_or_default();
    FetchedMessage {
        seq: fetch.message,
        uid: fetch.uid,
        internal_date: fetch.internal_date(),
        from,
        subject,
        size: fetch.size,
        body,
    }
}

/// An IMAP session over implicit TLS.
pub struct ImapSession {
    inner: imap::Session<TlsStream<TcpStream>>,
}

impl MailSession for ImapSession {
    fn select(&mut self, folder: &str) -> Result<u32> {
        // EXAMINE opens the folder read-only; nothing here modifies it.
        Ok(self.inner.examine(folder)?.exists)
    }

    fn list(&mut self, reference: &str, pattern: &str, sink: SyncSender<FolderInfo>)
        -> Result<()>
    {
        let names = self.inner.list(Some(reference), Some(pattern))?;
        for name in names.iter() {
            let selectable = !name
                .attributes()
                .iter()
                .any(|attr| *attr == NameAttribute::NoSelect);
            send(&sink, FolderInfo {
                path: name.name().to_string(),
                selectable,
                delimiter: name.delimiter().map(str::to_string),
            })?;
        }
        Ok(())
    }

    fn fetch(
        &mut self,
        range: SequenceRange,
        query: FetchQuery,
        sink: SyncSender<FetchedMessage>,
    ) -> Result<()> {
        for chunk in range.chunks(FETCH_CHUNK) {
            let fetches = self
                .inner
                .fetch(chunk.to_string(), query.as_imap())
                .with_context(|| format!("failed to fetch messages {}", chunk))?;
            for fetch in fetches.iter() {
                send(&sink, convert_fetch(fetch))?;
            }
        }
        Ok(())
    }

    fn logout(&mut self) -> Result<()> {
        self.inner.logout().context("failed to log out")
    }
}

/// Splits `host[:port]` into its parts. IPv6 literals need brackets when a
/// port is given.
pub fn split_server(server: &str) -> Result<(String, u16)> {
    let server = server.trim();
    if server.is_empty() {
        bail!("no server given");
    }
    if let Some(rest) = server.strip_prefix('[') {
        let (host, rest) = rest
            .split_once(']')
            .ok_or_else(|| anyhow!("unterminated IPv6 literal in {:?}", server))?;
        let port = match rest.strip_prefix(':') {
            Some(port) => parse_port(port)?,
            None if rest.is_empty() => DEFAULT_PORT,
            None => bail!("unexpected {:?} after IPv6 literal", rest),
        };
        return Ok((host.to_string(), port));
    }
    match server.rsplit_once(':') {
        // More than one colon without brackets is a bare IPv6 address.
        Some((host, _)) if host.contains(':') => Ok((server.to_string(), DEFAULT_PORT)),
        Some((host, port)) => Ok((host.to_string(), parse_port(port)?)),
        None => Ok((server.to_string(), DEFAULT_PORT)),
    }
}

fn parse_port(port: &str) -> Result<u16> {
    port.parse()
        .with_context(|| format!("invalid port {:?}", port))
}

/// Opens a TLS connection to `server` and logs in.
pub fn connect(server: &str, user: &str, password: &str) -> Result<ImapSession> {
    let (host, port) = split_server(server)?;
    let tls = TlsConnector::builder().build()?;

    info!("Connecting to {}:{}...", host, port);
    let client = imap::connect((host.as_str(), port), &host, &tls)
        .with_context(|| format!("failed to connect to {}:{}", host, port))?;
    info!("Connected");

    let inner = client
        .login(user, password)
        .map_err(|(err, _)| err)
        .with_context(|| format!("failed to log in as {}", user))?;
    info!("Logged in");

    Ok(ImapSession { inner })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_server() {
        fn assert_split(server: &str, host: &str, port: u16) {
            assert_eq!(split_server(server).unwrap(), (host.to_string(), port));
        }

        assert_split("imap.example.com", "imap.example.com", 993);
        assert_split("imap.example.com:143", "imap.example.com", 143);
        assert_split(" imap.example.com:993 ", "imap.example.com", 993);
        assert_split("[::1]:1993", "::1", 1993);
        assert_split("[::1]", "::1", 993);
        assert_split("fe80::1", "fe80::1", 993);

        assert!(split_server("").is_err());
        assert!(split_server("imap.example.com:imap").is_err());
        assert!(split_server("imap.example.com:70000").is_err());
        assert!(split_server("[::1").is_err());
        assert!(split_server("[::1]x").is_err());
    }

    #[test]
    fn test_sequence_range() {
        assert_eq!(SequenceRange::all(0), None);
        let range = SequenceRange::all(42).unwrap();
        assert_eq!(range.to_string(), "1:42");
        assert_eq!(range.len(), 42);
        assert_eq!(SequenceRange::all(1).unwrap().to_string(), "1:1");
    }

    #[test]
    fn test_sequence_range_chunks() {
        fn chunks(count: u32, size: u32) -> Vec<String> {
            SequenceRange::all(count)
                .unwrap()
                .chunks(size)
                .map(|chunk| chunk.to_string())
                .collect()
        }

        assert_eq!(chunks(25, 10), ["1:10", "11:20", "21:25"]);
        assert_eq!(chunks(20, 10), ["1:10", "11:20"]);
        assert_eq!(chunks(3, 10), ["1:3"]);
        assert_eq!(chunks(1, 10), ["1:1"]);
        assert_eq!(chunks(3, 0), ["1:1", "2:2", "3:3"]);

        let range = SequenceRange { first: u32::MAX - 2, last: u32::MAX };
        let all: Vec<_> = range.chunks(2).collect();
        assert_eq!(all.len(), 2);
        assert_eq!(all[1].last, u32::MAX);

        let total: u64 = SequenceRange::all(12345)
            .unwrap()
            .chunks(FETCH_CHUNK)
            .map(|chunk| {
                assert!(chunk.len() <= u64::from(FETCH_CHUNK));
                chunk.len()
            })
            .sum();
        assert_eq!(total, 12345);
    }

    #[test]
    fn test_fetch_query() {
        assert_eq!(FetchQuery::Fast.as_imap(), "FAST");
        assert!(FetchQuery::Full.as_imap().contains("BODY.PEEK[]"));
        assert!(FetchQuery::Full.as_imap().contains("UID"));
    }

    #[test]
    fn test_decode_header_value() {
        assert_eq!(decode_header_value(b"Plain subject"), "Plain subject");
        assert_eq!(
            decode_header_value(b"=?UTF-8?B?SGVsbG8gV29ybGQ=?="),
            "Hello World"
        );
        assert_eq!(
            decode_header_value(b"=?ISO-8859-1?Q?Caf=E9?="),
            "Caf\u{e9}"
        );
        assert_eq!(decode_header_value(b"caf\xe9"), "caf\u{fffd}");
    }
}
