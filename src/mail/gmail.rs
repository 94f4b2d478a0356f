//! Gmail REST API driver

use std::time::Duration;

use base64::Engine;
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use chrono::{DateTime, Utc};
use mail_builder::MessageBuilder;
use mail_builder::headers::address::Address;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::driver::{DriverError, MailDriver};
use super::types::{
    Folder, MailMessage, OutgoingMessage, ThreadDetail, ThreadFlags, ThreadList, ThreadRef,
};
use crate::config::GmailConfig;
use crate::constants::{HTML_RENDER_WIDTH, HTTP_TIMEOUT_SECS};
use crate::retry::{RetryConfig, with_retry};

/// base64url as Gmail uses it: encodes without padding, decodes either way.
const URL_SAFE_LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new()
        .with_encode_padding(false)
        .with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

pub struct GmailDriver {
    client: Client,
    access_token: String,
    base_url: String,
    retry: RetryConfig,
}

// === Wire types ===

#[derive(Debug, Deserialize)]
struct ThreadListResponse {
    #[serde(default)]
    threads: Vec<ThreadIndex>,
    #[serde(rename = "nextPageToken")]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ThreadIndex {
    id: String,
    #[serde(default)]
    snippet: String,
}

#[derive(Debug, Deserialize)]
struct ThreadResponse {
    id: String,
    #[serde(default)]
    messages: Vec<FullMessage>,
}

#[derive(Debug, Deserialize)]
struct FullMessage {
    id: String,
    #[serde(rename = "internalDate")]
    internal_date: Option<String>,
    #[serde(rename = "labelIds", default)]
    label_ids: Vec<String>,
    #[serde(default)]
    payload: MessagePart,
}

#[derive(Debug, Default, Deserialize)]
struct MessagePart {
    #[serde(rename = "mimeType", default)]
    mime_type: String,
    #[serde(default)]
    filename: String,
    #[serde(default)]
    headers: Vec<Header>,
    #[serde(default)]
    body: PartBody,
    #[serde(default)]
    parts: Vec<MessagePart>,
}

#[derive(Debug, Deserialize)]
struct Header {
    name: String,
    value: String,
}

#[derive(Debug, Default, Deserialize)]
struct PartBody {
    data: Option<String>,
}

#[derive(Serialize)]
struct SendRequest<'a> {
    raw: &'a str,
    #[serde(rename = "threadId", skip_serializing_if = "Option::is_none")]
    thread_id: Option<&'a str>,
}

#[derive(Deserialize)]
struct SendResponse {
    id: String,
}

impl GmailDriver {
    pub fn new(access_token: String, config: &GmailConfig) -> Result<Self, DriverError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client,
            access_token,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            retry: RetryConfig::default(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&'static str, String)],
    ) -> Result<T, DriverError> {
        let response = self
            .client
            .get(self.url(path))
            .bearer_auth(&self.access_token)
            .query(params)
            .send()
            .await?;
        parse_response(response).await
    }
}

async fn parse_response<T: DeserializeOwned>(response: Response) -> Result<T, DriverError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(DriverError::Api { status, body });
    }
    Ok(response.json().await?)
}

impl MailDriver for GmailDriver {
    async fn list(
        &self,
        folder: Folder,
        query: &str,
        max_results: u32,
    ) -> Result<ThreadList, DriverError> {
        let params = list_params(folder, query, max_results);
        tracing::debug!("Listing Gmail threads with {:?}", params);

        let response: ThreadListResponse = with_retry(&self.retry, "List threads", || {
            self.get_json("threads", &params)
        })
        .await?;

        Ok(ThreadList {
            threads: response
                .threads
                .into_iter()
                .map(|t| ThreadRef {
                    id: t.id,
                    snippet: t.snippet,
                })
                .collect(),
            next_page_token: response.next_page_token,
        })
    }

    async fn get(&self, thread_id: &str) -> Result<ThreadDetail, DriverError> {
        let path = format!("threads/{}", thread_id);
        let params = [("format", "full".to_string())];

        let response: ThreadResponse =
            with_retry(&self.retry, "Fetch thread", || self.get_json(&path, &params)).await?;
        Ok(thread_from_response(response))
    }

    async fn send(&self, message: &OutgoingMessage) -> Result<String, DriverError> {
        let raw = URL_SAFE_LENIENT.encode(build_raw_message(message)?);
        let request = SendRequest {
            raw: &raw,
            thread_id: message.thread_id.as_deref(),
        };

        // Sends are not retried: a timed-out send may still have been delivered
        let response = self
            .client
            .post(self.url("messages/send"))
            .bearer_auth(&self.access_token)
            .json(&request)
            .send()
            .await?;
        let sent: SendResponse = parse_response(response).await?;

        tracing::info!("Sent message {} to {} recipients", sent.id, message.to.len());
        Ok(sent.id)
    }
}

/// Query parameters for a thread listing in `folder`.
fn list_params(folder: Folder, query: &str, max_results: u32) -> Vec<(&'static str, String)> {
    let mut params = vec![("maxResults", max_results.to_string())];

    let query = query.trim();
    let query = match folder {
        Folder::Archive if query.is_empty() => "-in:inbox".to_string(),
        Folder::Archive => format!("-in:inbox {}", query),
        _ => query.to_string(),
    };
    if !query.is_empty() {
        params.push(("q", query));
    }

    let label = match folder {
        Folder::Inbox => Some("INBOX"),
        Folder::Sent => Some("SENT"),
        Folder::Drafts => Some("DRAFT"),
        Folder::Starred => Some("STARRED"),
        Folder::Spam => Some("SPAM"),
        Folder::Trash => Some("TRASH"),
        Folder::Archive => None,
    };
    if let Some(label) = label {
        params.push(("labelIds", label.to_string()));
    }
    if matches!(folder, Folder::Spam | Folder::Trash) {
        params.push(("includeSpamTrash", "true".to_string()));
    }
    params
}

fn thread_from_response(response: ThreadResponse) -> ThreadDetail {
    ThreadDetail {
        id: response.id,
        messages: response
            .messages
            .into_iter()
            .map(message_from_response)
            .collect(),
    }
}

fn message_from_response(message: FullMessage) -> MailMessage {
    let header = |name: &str| {
        message
            .payload
            .headers
            .iter()
            .find(|h| h.name.eq_ignore_ascii_case(name))
            .map(|h| h.value.trim().to_string())
    };

    let date = header("Date")
        .and_then(|d| DateTime::parse_from_rfc2822(&d).ok())
        .map(|d| d.with_timezone(&Utc))
        .or_else(|| {
            message
                .internal_date
                .as_deref()
                .and_then(|ms| ms.parse::<i64>().ok())
                .and_then(DateTime::from_timestamp_millis)
        });
    let flags = message
        .label_ids
        .iter()
        .fold(ThreadFlags::empty(), |acc, label| {
            acc | ThreadFlags::from_label(label)
        });

    MailMessage {
        from: header("From").unwrap_or_default(),
        to: header("To").map(|v| split_addresses(&v)).unwrap_or_default(),
        cc: header("Cc").map(|v| split_addresses(&v)).unwrap_or_default(),
        subject: header("Subject").unwrap_or_default(),
        message_id: header("Message-ID"),
        body: extract_body(&message.payload),
        date,
        flags,
    }
}

/// Split an address header on commas outside quoted display names.
fn split_addresses(value: &str) -> Vec<String> {
    let mut addresses = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;

    for c in value.chars() {
        match c {
            '"' => {
                in_quotes = !in_quotes;
                current.push(c);
            }
            ',' if !in_quotes => {
                addresses.push(std::mem::take(&mut current));
            }
            _ => current.push(c),
        }
    }
    addresses.push(current);

    addresses
        .into_iter()
        .map(|a| a.trim().to_string())
        .filter(|a| !a.is_empty())
        .collect()
}

/// Message text: the first `text/plain` part, else the first `text/html`
/// part rendered as text. Attachments are skipped.
fn extract_body(payload: &MessagePart) -> String {
    let mut plain = None;
    let mut html = None;
    collect_text_parts(payload, &mut plain, &mut html);

    let body = match (plain, html) {
        (Some(text), _) => text,
        (None, Some(html)) => render_html(&html),
        (None, None) => String::new(),
    };
    body.replace("\r\n", "\n").trim().to_string()
}

fn collect_text_parts(part: &MessagePart, plain: &mut Option<String>, html: &mut Option<String>) {
    if !part.filename.is_empty() {
        return;
    }
    let mime = part.mime_type.to_ascii_lowercase();
    if mime == "text/plain" && plain.is_none() {
        *plain = decode_part(part);
    } else if mime == "text/html" && html.is_none() {
        *html = decode_part(part);
    }
    for child in &part.parts {
        collect_text_parts(child, plain, html);
    }
}

fn decode_part(part: &MessagePart) -> Option<String> {
    let data = part.body.data.as_deref()?;
    match URL_SAFE_LENIENT.decode(data.trim()) {
        Ok(bytes) => Some(String::from_utf8_lossy(&bytes).into_owned()),
        Err(e) => {
            tracing::warn!("Skipping undecodable {} part: {}", part.mime_type, e);
            None
        }
    }
}

fn render_html(html: &str) -> String {
    html2text::config::plain()
        .string_from_read(html.as_bytes(), HTML_RENDER_WIDTH)
        .unwrap_or_else(|e| {
            tracing::warn!("Failed to render HTML body: {}", e);
            html.to_string()
        })
}

/// `Name <addr>` or a bare address as a mail-builder address.
fn mailbox(value: &str) -> Address<'static> {
    let address = super::types::address_of(value).to_string();
    let name = value
        .rfind('<')
        .map(|start| value[..start].trim().trim_matches('"').trim().to_string())
        .filter(|name| !name.is_empty());
    Address::new_address(name, address)
}

fn message_id_value(id: &str) -> String {
    id.trim().trim_start_matches('<').trim_end_matches('>').to_string()
}

/// Render an outgoing message as RFC 5322 bytes.
fn build_raw_message(message: &OutgoingMessage) -> Result<Vec<u8>, DriverError> {
    let mut builder = MessageBuilder::new()
        .to(Address::new_list(
            message.to.iter().map(|a| mailbox(a)).collect(),
        ))
        .subject(message.subject.clone())
        .text_body(message.body.clone());

    if !message.from.trim().is_empty() {
        builder = builder.from(mailbox(&message.from));
    }
    if !message.cc.is_empty() {
        builder = builder.cc(Address::new_list(
            message.cc.iter().map(|a| mailbox(a)).collect(),
        ));
    }
    if let Some(in_reply_to) = &message.in_reply_to {
        builder = builder.in_reply_to(message_id_value(in_reply_to));
    }
    if !message.references.is_empty() {
        builder = builder.references(
            message
                .references
                .iter()
                .map(|r| message_id_value(r))
                .collect::<Vec<_>>(),
        );
    }

    Ok(builder.write_to_vec()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(text: &str) -> String {
        URL_SAFE_LENIENT.encode(text)
    }

    fn thread_json() -> String {
        serde_json::json!({
            "id": "t-100",
            "messages": [
                {
                    "id": "m-1",
                    "internalDate": "1718445600000",
                    "labelIds": ["INBOX", "STARRED"],
                    "payload": {
                        "mimeType": "multipart/alternative",
                        "headers": [
                            {"name": "From", "value": "\"Lee, Sam\" <sam@example.com>"},
                            {"name": "To", "value": "ada@example.com, \"Kim, Jo\" <jo@example.com>"},
                            {"name": "Subject", "value": "Quarterly review"},
                            {"name": "Message-ID", "value": "<abc@mail.example.com>"},
                            {"name": "Date", "value": "Sat, 15 Jun 2024 10:00:00 +0000"}
                        ],
                        "body": {"size": 0},
                        "parts": [
                            {
                                "mimeType": "text/plain",
                                "filename": "",
                                "body": {"size": 20, "data": encode("Can we meet Friday?\r\n")}
                            },
                            {
                                "mimeType": "text/html",
                                "filename": "",
                                "body": {"size": 30, "data": encode("<p>Can we meet <b>Friday</b>?</p>")}
                            }
                        ]
                    }
                },
                {
                    "id": "m-2",
                    "internalDate": "1718532000000",
                    "labelIds": ["UNREAD"],
                    "payload": {
                        "mimeType": "multipart/mixed",
                        "headers": [
                            {"name": "from", "value": "ada@example.com"},
                            {"name": "subject", "value": "Re: Quarterly review"}
                        ],
                        "parts": [
                            {
                                "mimeType": "text/html",
                                "filename": "",
                                "body": {"data": encode("<div><p>Friday works.</p></div>")}
                            },
                            {
                                "mimeType": "text/plain",
                                "filename": "notes.txt",
                                "body": {"attachmentId": "att-1", "size": 120}
                            }
                        ]
                    }
                }
            ]
        })
        .to_string()
    }

    #[test]
    fn test_list_params_for_folders() {
        let params = list_params(Folder::Inbox, " from:sam ", 20);
        assert!(params.contains(&("maxResults", "20".to_string())));
        assert!(params.contains(&("q", "from:sam".to_string())));
        assert!(params.contains(&("labelIds", "INBOX".to_string())));

        let params = list_params(Folder::Archive, "invoice", 5);
        assert!(params.contains(&("q", "-in:inbox invoice".to_string())));
        assert!(!params.iter().any(|(k, _)| *k == "labelIds"));

        let params = list_params(Folder::Trash, "", 5);
        assert!(!params.iter().any(|(k, _)| *k == "q"));
        assert!(params.contains(&("includeSpamTrash", "true".to_string())));
    }

    #[test]
    fn test_thread_parsing() {
        let response: ThreadResponse = serde_json::from_str(&thread_json()).unwrap();
        let thread = thread_from_response(response);

        assert_eq!(thread.id, "t-100");
        assert_eq!(thread.messages.len(), 2);

        let first = &thread.messages[0];
        assert_eq!(first.from, "\"Lee, Sam\" <sam@example.com>");
        assert_eq!(first.to, vec!["ada@example.com", "\"Kim, Jo\" <jo@example.com>"]);
        assert_eq!(first.subject, "Quarterly review");
        assert_eq!(first.message_id.as_deref(), Some("<abc@mail.example.com>"));
        assert_eq!(first.body, "Can we meet Friday?");
        assert_eq!(
            first.date.map(|d| d.to_rfc3339()),
            Some("2024-06-15T10:00:00+00:00".to_string())
        );
        assert_eq!(first.flags, ThreadFlags::STARRED);

        let second = &thread.messages[1];
        assert_eq!(second.subject, "Re: Quarterly review");
        assert!(second.body.contains("Friday works."));
        assert!(!second.body.contains("<p>"));
        assert_eq!(second.flags, ThreadFlags::UNREAD);
        // No Date header: falls back to internalDate
        assert_eq!(second.date.map(|d| d.timestamp_millis()), Some(1718532000000));
    }

    #[test]
    fn test_decode_accepts_padded_data() {
        let part = MessagePart {
            mime_type: "text/plain".to_string(),
            body: PartBody {
                data: Some("aGk_Pz8=".to_string()),
            },
            ..Default::default()
        };
        assert_eq!(decode_part(&part).as_deref(), Some("hi???"));
    }

    #[test]
    fn test_list_response_parsing() {
        let json = r#"{"threads":[{"id":"a","snippet":"hello","historyId":"1"}],"nextPageToken":"p2"}"#;
        let response: ThreadListResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.threads[0].id, "a");
        assert_eq!(response.next_page_token.as_deref(), Some("p2"));

        let empty: ThreadListResponse = serde_json::from_str(r#"{"resultSizeEstimate":0}"#).unwrap();
        assert!(empty.threads.is_empty());
    }

    #[test]
    fn test_build_raw_message() {
        let message = OutgoingMessage {
            from: "Ada <ada@example.com>".to_string(),
            to: vec!["\"Lee, Sam\" <sam@example.com>".to_string()],
            cc: vec!["jo@example.com".to_string()],
            subject: "Re: Quarterly review".to_string(),
            body: "Friday works.\n\nAda".to_string(),
            thread_id: Some("t-100".to_string()),
            in_reply_to: Some("<abc@mail.example.com>".to_string()),
            references: vec!["<abc@mail.example.com>".to_string()],
        };
        let raw = String::from_utf8(build_raw_message(&message).unwrap()).unwrap();

        assert!(raw.contains("Subject: Re: Quarterly review"));
        assert!(raw.contains("sam@example.com"));
        assert!(raw.contains("Cc: "));
        assert!(raw.contains("jo@example.com"));
        assert!(raw.contains("In-Reply-To: <abc@mail.example.com>"));
        assert!(raw.contains("References: <abc@mail.example.com>"));
        assert!(raw.contains("Friday works."));
        assert!(!raw.contains("<<"));
    }

    #[test]
    fn test_split_addresses() {
        assert_eq!(
            split_addresses("a@x.com, \"B, Bee\" <b@x.com>,,"),
            vec!["a@x.com", "\"B, Bee\" <b@x.com>"]
        );
        assert!(split_addresses("  ").is_empty());
    }
}
