//! SMS inbox and outbox.
//!
//! Message bodies travel base64-encoded in both directions so the firmware
//! never sees raw multi-byte text.

use serde::{Deserialize, Serialize};
use serde_json::json;

use super::{read, write};
use crate::client::{ClientError, CommandClient, CommandResponse};
use crate::cmd;
use crate::encoding::{b64_decode_utf8, b64_encode_utf8};

/// Separator the firmware expects between recipient numbers.
pub const NUMBER_SEPARATOR: &str = ";";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SmsBox {
    #[default]
    Inbox,
    Outbox,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SmsMessage {
    pub id: String,
    pub number: String,
    /// Decoded body. Empty when the device sent something undecodable.
    pub content: String,
    pub date: String,
    pub read: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawMessage {
    #[serde(deserialize_with = "id_string")]
    id: String,
    #[serde(default)]
    number: String,
    #[serde(default)]
    content: String,
    #[serde(default)]
    date: String,
    #[serde(default, deserialize_with = "super::flag::deserialize")]
    read: bool,
}

impl From<RawMessage> for SmsMessage {
    fn from(raw: RawMessage) -> Self {
        Self {
            id: raw.id,
            number: raw.number,
            content: b64_decode_utf8(&raw.content),
            date: raw.date,
            read: raw.read,
        }
    }
}

#[derive(Deserialize)]
struct RawListing {
    #[serde(default)]
    list: Vec<RawMessage>,
}

/// Ids come back as numbers on some firmware builds.
fn id_string<'de, D: serde::Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    use serde_json::Value;
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    })
}

pub struct Sms<'a> {
    client: &'a CommandClient,
}

impl CommandClient {
    pub fn sms(&self) -> Sms<'_> {
        Sms { client: self }
    }
}

impl Sms<'_> {
    pub async fn list_messages(&self, mailbox: SmsBox) -> Result<Vec<SmsMessage>, ClientError> {
        let listing: RawListing =
            read(self.client, cmd::SMS_LIST, &json!({ "box": mailbox })).await?;
        Ok(listing.list.into_iter().map(SmsMessage::from).collect())
    }

    pub async fn send_message<S: AsRef<str>>(
        &self,
        numbers: &[S],
        content: &str,
    ) -> Result<CommandResponse, ClientError> {
        let number = numbers
            .iter()
            .map(AsRef::as_ref)
            .collect::<Vec<_>>()
            .join(NUMBER_SEPARATOR);
        let payload = json!({
            "number": number,
            "content": b64_encode_utf8(content),
        });
        write(self.client, cmd::SMS_SEND, &payload).await
    }

    pub async fn delete_messages<S: AsRef<str>>(
        &self,
        ids: &[S],
    ) -> Result<CommandResponse, ClientError> {
        write(self.client, cmd::SMS_DELETE, &json!({ "ids": id_list(ids) })).await
    }

    pub async fn mark_read<S: AsRef<str>>(
        &self,
        ids: &[S],
    ) -> Result<CommandResponse, ClientError> {
        write(self.client, cmd::SMS_MARK_READ, &json!({ "ids": id_list(ids) })).await
    }
}

fn id_list<S: AsRef<str>>(ids: &[S]) -> Vec<&str> {
    ids.iter().map(AsRef::as_ref).collect()
}
