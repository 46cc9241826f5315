//! Scholar alert retrieval over raw IMAP + TLS.
//!
//! A small blocking IMAP client on top of `rustls`: LOGIN, SELECT, SEARCH,
//! FETCH RFC822, STORE and EXPUNGE are all the pipeline needs. Callers use
//! the async wrappers on `ImapMailbox`, which run the session on the
//! blocking pool.

use std::io::{Read, Write};
use std::net::TcpStream;
use std::sync::Arc;
use std::time::Duration;

use chrono::{Local, NaiveDate};
use secrecy::ExposeSecret;

use crate::config::{EmailConfig, EmailFilter, TimeWindow};
use crate::error::MailError;
use crate::mail::ParsedEmail;

type TlsStream = rustls::StreamOwned<rustls::ClientConnection, TcpStream>;

const READ_TIMEOUT: Duration = Duration::from_secs(30);

/// The alert mailbox: one IMAP account plus the alert filter.
#[derive(Debug, Clone)]
pub struct ImapMailbox {
    config: EmailConfig,
    filter: EmailFilter,
}

impl ImapMailbox {
    pub fn new(config: EmailConfig, filter: EmailFilter) -> Self {
        Self { config, filter }
    }

    /// Fetch alert emails matching the sender, time window and subject filter.
    pub async fn fetch_alerts(&self) -> Result<Vec<ParsedEmail>, MailError> {
        let config = self.config.clone();
        let filter = self.filter.clone();
        let today = Local::now().date_naive();
        tokio::task::spawn_blocking(move || fetch_alerts_blocking(&config, &filter, today))
            .await
            .map_err(|e| MailError::Task(e.to_string()))?
    }

    /// Delete alert emails received before `window` ago. Returns how many
    /// messages were flagged and expunged.
    pub async fn delete_older_than(&self, window: TimeWindow) -> Result<usize, MailError> {
        let config = self.config.clone();
        let from = self.filter.from.clone();
        let before = window.start_date_from_now();
        tokio::task::spawn_blocking(move || delete_before_blocking(&config, &from, before))
            .await
            .map_err(|e| MailError::Task(e.to_string()))?
    }
}

fn fetch_alerts_blocking(
    config: &EmailConfig,
    filter: &EmailFilter,
    today: NaiveDate,
) -> Result<Vec<ParsedEmail>, MailError> {
    let mut session = ImapSession::open(config)?;
    session.select(&config.folder)?;

    let since = filter.time_window.map(|w| w.start_date(today));
    let base = search_criteria(&filter.from, since, None);
    let mut ids = session.search(&base)?;

    if ids.is_empty() && !filter.subject.is_empty() {
        for subject in &filter.subject {
            let criteria = search_criteria(&filter.from, since, Some(subject));
            for id in session.search(&criteria)? {
                if !ids.contains(&id) {
                    ids.push(id);
                }
            }
        }
    }
    tracing::info!("Found {} candidate alert email(s) in {}", ids.len(), config.folder);

    let mut emails = Vec::new();
    for id in &ids {
        let Some(raw) = session.fetch_rfc822(id)? else {
            tracing::warn!("FETCH {id} returned no message body");
            continue;
        };
        let Some(email) = ParsedEmail::parse(&raw) else {
            tracing::warn!("Message {id} could not be parsed as an email");
            continue;
        };
        if !filter.accepts_subject(&email.subject) {
            tracing::debug!("Skipping message {id}: subject {:?} not in filter", email.subject);
            continue;
        }
        emails.push(email);
    }

    session.logout();
    tracing::info!("Fetched {} alert email(s)", emails.len());
    Ok(emails)
}

fn delete_before_blocking(
    config: &EmailConfig,
    from: &str,
    before: NaiveDate,
) -> Result<usize, MailError> {
    let mut session = ImapSession::open(config)?;
    session.select(&config.folder)?;

    let criteria = format!("{} BEFORE {}", search_criteria(from, None, None), imap_date(before));
    let ids = session.search(&criteria)?;
    if ids.is_empty() {
        tracing::info!("No alert emails older than {before} to delete");
        session.logout();
        return Ok(0);
    }

    session.command(&format!("STORE {} +FLAGS (\\Deleted)", ids.join(",")))?;
    session.command("EXPUNGE")?;
    session.logout();

    tracing::info!("Deleted {} alert email(s) older than {before}", ids.len());
    Ok(ids.len())
}

// ── Session ─────────────────────────────────────────────────────────

/// Untagged lines plus any literal payloads, in arrival order.
#[derive(Debug, Default)]
struct Response {
    lines: Vec<String>,
    literals: Vec<Vec<u8>>,
}

struct ImapSession {
    stream: TlsStream,
    next_tag: u32,
}

impl ImapSession {
    /// Connect, read the greeting and log in.
    fn open(config: &EmailConfig) -> Result<Self, MailError> {
        let tcp = TcpStream::connect((config.imap_host.as_str(), config.imap_port)).map_err(|e| {
            MailError::Connect {
                host: config.imap_host.clone(),
                reason: e.to_string(),
            }
        })?;
        tcp.set_read_timeout(Some(READ_TIMEOUT))?;

        let mut root_store = rustls::RootCertStore::empty();
        root_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
        let tls_config = Arc::new(
            rustls::ClientConfig::builder()
                .with_root_certificates(root_store)
                .with_no_client_auth(),
        );
        let server_name = rustls_pki_types::ServerName::try_from(config.imap_host.clone())
            .map_err(|e| MailError::Tls(e.to_string()))?;
        let conn = rustls::ClientConnection::new(tls_config, server_name)
            .map_err(|e| MailError::Tls(e.to_string()))?;

        let mut session = Self {
            stream: rustls::StreamOwned::new(conn, tcp),
            next_tag: 1,
        };
        let _greeting = session.read_line()?;

        let login = format!(
            "LOGIN {} {}",
            quote(&config.username),
            quote(config.password.expose_secret())
        );
        session.command(&login).map_err(|e| match e {
            MailError::Command { .. } => MailError::LoginFailed {
                username: config.username.clone(),
            },
            other => other,
        })?;
        tracing::debug!("IMAP login to {} as {}", config.imap_host, config.username);
        Ok(session)
    }

    fn read_line(&mut self) -> Result<Vec<u8>, MailError> {
        let mut buf = Vec::new();
        let mut byte = [0u8; 1];
        loop {
            match self.stream.read(&mut byte)? {
                0 => return Err(MailError::Closed),
                _ => {
                    buf.push(byte[0]);
                    if buf.ends_with(b"\r\n") {
                        return Ok(buf);
                    }
                }
            }
        }
    }

    /// Send a tagged command and collect its response. A tagged NO or BAD
    /// becomes `MailError::Command`.
    fn command(&mut self, cmd: &str) -> Result<Response, MailError> {
        let tag = format!("A{}", self.next_tag);
        self.next_tag += 1;

        self.stream.write_all(format!("{tag} {cmd}\r\n").as_bytes())?;
        self.stream.flush()?;

        let mut response = Response::default();
        loop {
            let raw = self.read_line()?;
            let line = String::from_utf8_lossy(&raw).into_owned();

            if let Some(len) = literal_len(&line) {
                let mut literal = vec![0u8; len];
                self.stream.read_exact(&mut literal)?;
                response.literals.push(literal);
                response.lines.push(line);
                continue;
            }

            if let Some(ok) = tagged_status(&line, &tag) {
                if ok {
                    return Ok(response);
                }
                let verb = cmd.split_whitespace().next().unwrap_or(cmd);
                return Err(MailError::Command {
                    command: verb.to_string(),
                    response: line.trim_end().to_string(),
                });
            }
            response.lines.push(line);
        }
    }

    fn select(&mut self, folder: &str) -> Result<(), MailError> {
        self.command(&format!("SELECT {}", quote(folder)))?;
        Ok(())
    }

    fn search(&mut self, criteria: &str) -> Result<Vec<String>, MailError> {
        tracing::debug!("IMAP SEARCH {criteria}");
        let response = self.command(&format!("SEARCH {criteria}"))?;
        Ok(parse_search(&response.lines))
    }

    fn fetch_rfc822(&mut self, id: &str) -> Result<Option<Vec<u8>>, MailError> {
        let response = self.command(&format!("FETCH {id} RFC822"))?;
        Ok(response.literals.into_iter().next())
    }

    fn logout(&mut self) {
        if let Err(e) = self.command("LOGOUT") {
            tracing::debug!("IMAP LOGOUT failed: {e}");
        }
    }
}

// ── Protocol helpers ────────────────────────────────────────────────

/// IMAP quoted string.
fn quote(value: &str) -> String {
    format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
}

/// `dd-Mon-YYYY`, the IMAP search date format.
fn imap_date(date: NaiveDate) -> String {
    date.format("%d-%b-%Y").to_string()
}

fn search_criteria(from: &str, since: Option<NaiveDate>, subject: Option<&str>) -> String {
    let mut terms = Vec::new();
    if !from.is_empty() {
        terms.push(format!("FROM {}", quote(from)));
    }
    if let Some(date) = since {
        terms.push(format!("SINCE {}", imap_date(date)));
    }
    if let Some(subject) = subject {
        terms.push(format!("SUBJECT {}", quote(subject)));
    }
    if terms.is_empty() {
        "ALL".to_string()
    } else {
        terms.join(" ")
    }
}

/// Size of a `{N}` literal announced at the end of a response line.
fn literal_len(line: &str) -> Option<usize> {
    let body = line.strip_suffix("\r\n").unwrap_or(line);
    let inner = body.strip_suffix('}')?;
    let open = inner.rfind('{')?;
    inner[open + 1..].parse().ok()
}

/// `Some(true)` for a tagged OK, `Some(false)` for tagged NO/BAD, `None` if
/// the line is not the completion for `tag`.
fn tagged_status(line: &str, tag: &str) -> Option<bool> {
    let rest = line.strip_prefix(tag)?.strip_prefix(' ')?;
    Some(rest.get(..2).is_some_and(|s| s.eq_ignore_ascii_case("OK")))
}

fn parse_search(lines: &[String]) -> Vec<String> {
    lines
        .iter()
        .filter_map(|line| line.strip_prefix("* SEARCH"))
        .flat_map(|ids| ids.split_whitespace().map(str::to_string))
        .collect()
}
