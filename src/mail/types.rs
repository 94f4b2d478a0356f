use std::fmt;
use std::str::FromStr;

use bitflags::bitflags;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::compose::ThreadMessage;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
    pub struct ThreadFlags: u32 {
        const UNREAD = 0b00000001;
        const STARRED = 0b00000010;
        const IMPORTANT = 0b00000100;
    }
}

impl ThreadFlags {
    /// Flags implied by a provider label id.
    pub fn from_label(label: &str) -> Self {
        match label {
            "UNREAD" => ThreadFlags::UNREAD,
            "STARRED" => ThreadFlags::STARRED,
            "IMPORTANT" => ThreadFlags::IMPORTANT,
            _ => ThreadFlags::empty(),
        }
    }
}

/// Mailbox folders the driver can list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Folder {
    Inbox,
    Sent,
    Drafts,
    Starred,
    Spam,
    Trash,
    /// Everything not in the inbox
    Archive,
}

impl FromStr for Folder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "inbox" => Ok(Folder::Inbox),
            "sent" => Ok(Folder::Sent),
            "draft" | "drafts" => Ok(Folder::Drafts),
            "starred" => Ok(Folder::Starred),
            "spam" => Ok(Folder::Spam),
            "trash" | "bin" => Ok(Folder::Trash),
            "archive" | "archived" => Ok(Folder::Archive),
            other => Err(format!("Unknown folder '{}'", other)),
        }
    }
}

impl fmt::Display for Folder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Folder::Inbox => "inbox",
            Folder::Sent => "sent",
            Folder::Drafts => "drafts",
            Folder::Starred => "starred",
            Folder::Spam => "spam",
            Folder::Trash => "trash",
            Folder::Archive => "archive",
        })
    }
}

/// One entry of a thread listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadRef {
    pub id: String,
    pub snippet: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ThreadList {
    pub threads: Vec<ThreadRef>,
    pub next_page_token: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailMessage {
    pub message_id: Option<String>,
    pub from: String,
    pub to: Vec<String>,
    pub cc: Vec<String>,
    pub subject: String,
    pub date: Option<DateTime<Utc>>,
    pub body: String,
    pub flags: ThreadFlags,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadDetail {
    pub id: String,
    /// Oldest first
    pub messages: Vec<MailMessage>,
}

/// Line-oriented view of a thread for search results.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadSummary {
    pub id: String,
    pub snippet: String,
    pub subject: String,
    pub from: String,
    pub date: Option<DateTime<Utc>>,
    pub message_count: usize,
    pub flags: ThreadFlags,
}

impl ThreadSummary {
    pub fn from_detail(detail: &ThreadDetail, snippet: &str) -> Self {
        let first = detail.messages.first();
        let last = detail.messages.last();
        let flags = detail
            .messages
            .iter()
            .fold(ThreadFlags::empty(), |acc, m| acc | m.flags);

        Self {
            id: detail.id.clone(),
            snippet: snippet.to_string(),
            subject: first.map(|m| m.subject.clone()).unwrap_or_default(),
            from: last.map(|m| m.from.clone()).unwrap_or_default(),
            date: last.and_then(|m| m.date),
            message_count: detail.messages.len(),
            flags,
        }
    }
}

/// A message to hand to the driver for delivery.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutgoingMessage {
    pub from: String,
    pub to: Vec<String>,
    pub cc: Vec<String>,
    pub subject: String,
    pub body: String,
    /// Provider thread to file the message under
    pub thread_id: Option<String>,
    pub in_reply_to: Option<String>,
    pub references: Vec<String>,
}

/// Bare address from a header value such as `"Sam" <sam@example.com>`.
pub fn address_of(value: &str) -> &str {
    match (value.rfind('<'), value.rfind('>')) {
        (Some(start), Some(end)) if start < end => value[start + 1..end].trim(),
        _ => value.trim().trim_matches('"'),
    }
}

impl ThreadDetail {
    /// Thread messages in the shape the drafting prompt expects.
    pub fn prompt_messages(&self) -> Vec<ThreadMessage> {
        self.messages
            .iter()
            .map(|m| ThreadMessage {
                from: m.from.clone(),
                to: m.to.clone(),
                body: m.body.clone(),
            })
            .collect()
    }

    /// Subject for a reply, with a single `Re:` prefix.
    pub fn reply_subject(&self) -> String {
        let subject = self
            .messages
            .first()
            .map(|m| m.subject.trim())
            .unwrap_or_default();
        if subject.get(..3).is_some_and(|p| p.eq_ignore_ascii_case("re:")) {
            subject.to_string()
        } else {
            format!("Re: {}", subject)
        }
    }

    /// Reply-all recipients for the latest message (sender, To and Cc),
    /// excluding `own_address`.
    ///
    /// When the latest message is our own, the reply goes to its recipients
    /// instead of back to ourselves.
    pub fn reply_recipients(&self, own_address: &str) -> Vec<String> {
        let Some(last) = self.messages.last() else {
            return Vec::new();
        };
        let is_own = |value: &str| address_of(value).eq_ignore_ascii_case(own_address);

        let mut recipients: Vec<String> = Vec::new();
        let candidates = std::iter::once(&last.from)
            .chain(last.to.iter())
            .chain(last.cc.iter());
        for candidate in candidates {
            if candidate.trim().is_empty() || is_own(candidate) {
                continue;
            }
            let address = address_of(candidate);
            if !recipients
                .iter()
                .any(|r| address_of(r).eq_ignore_ascii_case(address))
            {
                recipients.push(candidate.trim().to_string());
            }
        }
        recipients
    }

    /// `In-Reply-To` and `References` values for answering the latest message.
    pub fn reply_headers(&self) -> (Option<String>, Vec<String>) {
        let references: Vec<String> = self
            .messages
            .iter()
            .filter_map(|m| m.message_id.clone())
            .collect();
        (references.last().cloned(), references)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(id: &str, from: &str, to: &[&str], subject: &str) -> MailMessage {
        MailMessage {
            message_id: Some(format!("<{}@mail.example.com>", id)),
            from: from.to_string(),
            to: to.iter().map(|s| s.to_string()).collect(),
            cc: Vec::new(),
            subject: subject.to_string(),
            date: None,
            body: format!("body of {}", id),
            flags: ThreadFlags::empty(),
        }
    }

    #[test]
    fn test_address_of() {
        assert_eq!(address_of("\"Sam Lee\" <sam@example.com>"), "sam@example.com");
        assert_eq!(address_of("sam@example.com"), "sam@example.com");
        assert_eq!(address_of("  \"sam@example.com\" "), "sam@example.com");
    }

    #[test]
    fn test_folder_parsing() {
        assert_eq!("INBOX".parse::<Folder>(), Ok(Folder::Inbox));
        assert_eq!("archived".parse::<Folder>(), Ok(Folder::Archive));
        assert!("nowhere".parse::<Folder>().is_err());
    }

    #[test]
    fn test_reply_subject() {
        let detail = ThreadDetail {
            id: "t1".to_string(),
            messages: vec![message("m1", "a@x.com", &["b@x.com"], "Budget")],
        };
        assert_eq!(detail.reply_subject(), "Re: Budget");

        let detail = ThreadDetail {
            id: "t1".to_string(),
            messages: vec![message("m1", "a@x.com", &["b@x.com"], "RE: Budget")],
        };
        assert_eq!(detail.reply_subject(), "RE: Budget");
    }

    #[test]
    fn test_reply_recipients_excludes_self_and_duplicates() {
        let detail = ThreadDetail {
            id: "t1".to_string(),
            messages: vec![
                message("m1", "me@x.com", &["sam@x.com"], "Plan"),
                message(
                    "m2",
                    "Sam <sam@x.com>",
                    &["Me <ME@x.com>", "kim@x.com", "sam@x.com"],
                    "Re: Plan",
                ),
            ],
        };
        assert_eq!(
            detail.reply_recipients("me@x.com"),
            vec!["Sam <sam@x.com>", "kim@x.com"]
        );
    }

    #[test]
    fn test_reply_recipients_include_cc() {
        let mut last = message("m1", "sam@x.com", &["me@x.com"], "Plan");
        last.cc = vec!["kim@x.com".to_string(), "ME@X.COM".to_string()];
        let detail = ThreadDetail {
            id: "t1".to_string(),
            messages: vec![last],
        };
        assert_eq!(detail.reply_recipients("me@x.com"), vec!["sam@x.com", "kim@x.com"]);
    }

    #[test]
    fn test_reply_to_own_message_targets_its_recipients() {
        let detail = ThreadDetail {
            id: "t1".to_string(),
            messages: vec![message("m1", "me@x.com", &["sam@x.com"], "Plan")],
        };
        assert_eq!(detail.reply_recipients("me@x.com"), vec!["sam@x.com"]);
    }

    #[test]
    fn test_reply_headers_and_prompt_messages() {
        let detail = ThreadDetail {
            id: "t1".to_string(),
            messages: vec![
                message("m1", "a@x.com", &["b@x.com"], "Plan"),
                message("m2", "b@x.com", &["a@x.com"], "Re: Plan"),
            ],
        };
        let (in_reply_to, references) = detail.reply_headers();
        assert_eq!(in_reply_to.as_deref(), Some("<m2@mail.example.com>"));
        assert_eq!(references.len(), 2);

        let prompt_messages = detail.prompt_messages();
        assert_eq!(prompt_messages[0].from, "a@x.com");
        assert_eq!(prompt_messages[1].body, "body of m2");
    }

    #[test]
    fn test_summary_from_detail() {
        let mut first = message("m1", "a@x.com", &["b@x.com"], "Plan");
        first.flags = ThreadFlags::STARRED;
        let mut second = message("m2", "b@x.com", &["a@x.com"], "Re: Plan");
        second.flags = ThreadFlags::UNREAD;
        let detail = ThreadDetail {
            id: "t1".to_string(),
            messages: vec![first, second],
        };

        let summary = ThreadSummary::from_detail(&detail, "snippet");
        assert_eq!(summary.subject, "Plan");
        assert_eq!(summary.from, "b@x.com");
        assert_eq!(summary.message_count, 2);
        assert!(summary.flags.contains(ThreadFlags::STARRED | ThreadFlags::UNREAD));
        assert_eq!(ThreadFlags::from_label("STARRED"), ThreadFlags::STARRED);
        assert!(ThreadFlags::from_label("INBOX").is_empty());
    }
}
