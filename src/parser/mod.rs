//! HRF wire-text parser
//!
//! Scans a delimited token stream into [`Message`]s. A message on the wire is
//!
//! ```text
//! <|start|>ROLE[<|channel|>CHANNEL[ to=RECIPIENT]][<|constrain|>CONTENTTYPE]<|message|>CONTENT<terminator>
//! ```
//!
//! where the terminator is one of `<|end|>`, `<|call|>` or `<|return|>`. Text
//! between messages is ignored. Content is kept byte-for-byte; only
//! `json` and `harmony-script` content is decoded.

use serde_json::Value as JsonValue;
use thiserror::Error;

use crate::types::{
    Channel, Conversation, Message, Termination, CONTENT_TYPE_HARMONY_SCRIPT, CONTENT_TYPE_JSON,
};

pub mod semantic_validator;


/* ===================== Tokens ===================== */

pub const START: &str = "<|start|>";
pub const MESSAGE: &str = "<|message|>";
pub const CHANNEL: &str = "<|channel|>";
pub const CONSTRAIN: &str = "<|constrain|>";
pub const END: &str = "<|end|>";
pub const CALL: &str = "<|call|>";
pub const RETURN: &str = "<|return|>";

const HEADER_BREAKS: &[&str] = &[CHANNEL, CONSTRAIN, MESSAGE];
const CHANNEL_BREAKS: &[&str] = &[CONSTRAIN, MESSAGE];
const CONSTRAIN_BREAKS: &[&str] = &[MESSAGE];
const TERMINATORS: &[&str] = &[END, CALL, RETURN];

/// Prefix marking the recipient inside a channel header.
const RECIPIENT_PREFIX: &str = "to=";

/* ===================== Error Types ===================== */

#[derive(Debug, Error)]
pub enum FormatError {
    #[error("message {index} (byte {offset}): missing role")]
    MissingRole { index: usize, offset: usize },

    #[error("message {index} (byte {offset}): header did not lead to message")]
    HeaderWithoutMessage { index: usize, offset: usize },

    #[error("message {index} (byte {offset}): unknown channel '{name}'")]
    UnknownChannel {
        index: usize,
        offset: usize,
        name: String,
    },

    #[error("message {index} (byte {offset}): missing terminator")]
    MissingTerminator { index: usize, offset: usize },

    #[error("message {index}: content is not valid {content_type}: {source}")]
    InvalidJson {
        index: usize,
        content_type: String,
        #[source]
        source: serde_json::Error,
    },
}

pub type ParseResult<T> = Result<T, FormatError>;

/* ===================== Public API ===================== */

/// Parse raw wire text into an ordered conversation.
///
/// Text with no `<|start|>` token parses to an empty conversation.
pub fn parse(text: &str) -> ParseResult<Conversation> {
    let mut messages = Vec::new();
    let mut cursor = 0;

    while let Some(found) = text[cursor..].find(START) {
        let header_start = cursor + found + START.len();
        let (message, next) = parse_message(text, header_start, messages.len())?;
        tracing::trace!(
            index = messages.len(),
            role = %message.role,
            termination = ?message.termination,
            "lexed message"
        );
        messages.push(message);
        cursor = next;
    }

    Ok(messages)
}

/// Render messages back to wire text.
///
/// String content is written verbatim, structured content as compact JSON.
/// A message without a termination is closed with `<|end|>`.
pub fn render(messages: &[Message]) -> String {
    let mut out = String::new();

    for message in messages {
        out.push_str(START);
        out.push_str(&message.role);

        if message.channel.is_some() || message.recipient.is_some() {
            out.push_str(CHANNEL);
            let mut parts = Vec::new();
            if let Some(channel) = message.channel {
                parts.push(channel.as_str().to_string());
            }
            if let Some(recipient) = &message.recipient {
                parts.push(format!("{}{}", RECIPIENT_PREFIX, recipient));
            }
            out.push_str(&parts.join(" "));
        }

        if let Some(content_type) = &message.content_type {
            out.push_str(CONSTRAIN);
            out.push_str(content_type);
        }

        out.push_str(MESSAGE);
        match &message.content {
            JsonValue::String(s) => out.push_str(s),
            JsonValue::Null => {}
            other => out.push_str(&other.to_string()),
        }

        out.push_str(match message.termination {
            Some(Termination::Call) => CALL,
            Some(Termination::Return) => RETURN,
            Some(Termination::End) | None => END,
        });
    }

    out
}

/* ===================== Scanner ===================== */

/// Leftmost occurrence of any of `tokens` at or after `from`.
///
/// Returns the absolute position and the matched token.
fn find_first<'t>(text: &str, from: usize, tokens: &[&'t str]) -> Option<(usize, &'t str)> {
    tokens
        .iter()
        .filter_map(|token| text[from..].find(token).map(|pos| (from + pos, *token)))
        .min_by_key(|(pos, _)| *pos)
}

/// Parse one message whose header begins at `pos` (just after `<|start|>`).
///
/// Returns the message and the position just after its terminator.
fn parse_message(text: &str, pos: usize, index: usize) -> ParseResult<(Message, usize)> {
    let missing_message = || FormatError::HeaderWithoutMessage { index, offset: pos };

    // Role runs up to the first channel, constrain or message token
    let (mut brk, mut token) = find_first(text, pos, HEADER_BREAKS).ok_or_else(missing_message)?;
    let role = text[pos..brk].trim();
    if role.is_empty() {
        return Err(FormatError::MissingRole { index, offset: pos });
    }

    let mut channel = None;
    let mut recipient = None;
    let mut content_type = None;

    if token == CHANNEL {
        let channel_start = brk + CHANNEL.len();
        let (next, next_token) =
            find_first(text, channel_start, CHANNEL_BREAKS).ok_or_else(missing_message)?;

        for part in text[channel_start..next].split_whitespace() {
            if let Some(to) = part.strip_prefix(RECIPIENT_PREFIX) {
                if !to.is_empty() {
                    recipient = Some(to.to_string());
                }
            } else if channel.is_none() {
                channel = Some(Channel::from_name(part).ok_or_else(|| {
                    FormatError::UnknownChannel {
                        index,
                        offset: channel_start,
                        name: part.to_string(),
                    }
                })?);
            }
        }

        brk = next;
        token = next_token;
    }

    if token == CONSTRAIN {
        let constrain_start = brk + CONSTRAIN.len();
        let (next, next_token) =
            find_first(text, constrain_start, CONSTRAIN_BREAKS).ok_or_else(missing_message)?;

        // An empty declaration is kept so validation can reject it
        content_type = Some(text[constrain_start..next].trim().to_string());

        brk = next;
        token = next_token;
    }

    if token != MESSAGE {
        return Err(missing_message());
    }

    let content_start = brk + MESSAGE.len();
    let (content_end, terminator) = find_first(text, content_start, TERMINATORS)
        .ok_or(FormatError::MissingTerminator {
            index,
            offset: content_start,
        })?;
    let raw = &text[content_start..content_end];

    let content = match content_type.as_deref() {
        Some(ct)
            if ct.eq_ignore_ascii_case(CONTENT_TYPE_JSON)
                || ct.eq_ignore_ascii_case(CONTENT_TYPE_HARMONY_SCRIPT) =>
        {
            serde_json::from_str(raw).map_err(|source| FormatError::InvalidJson {
                index,
                content_type: ct.to_string(),
                source,
            })?
        }
        _ => JsonValue::String(raw.to_string()),
    };

    let termination = match terminator {
        CALL => Termination::Call,
        RETURN => Termination::Return,
        _ => Termination::End,
    };

    let message = Message {
        role: role.to_string(),
        channel,
        recipient,
        content_type,
        content,
        termination: Some(termination),
    };

    Ok((message, content_end + terminator.len()))
}
