//! Typed wrappers over [`CommandClient`], one function per device operation.
//!
//! Reads send `GET` and decode the reply; a reply without `success: true`
//! becomes [`ClientError::Rejected`]. Writes send `POST` and hand back the raw
//! [`CommandResponse`] so callers can show the firmware's message.
//!
//! List-style settings (APN profiles, forwarding rules, filters, tunnels) are
//! edited with an `action` field of `add`, `edit` or `delete`.

pub mod network;
pub mod sms;
pub mod system;
pub mod wifi;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::client::{ClientError, CommandClient, CommandResponse, Method};

/// Edit operation for list-style settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Add,
    Edit,
    Delete,
}

/// An entry of a list-style setting, identified by the firmware-assigned `id`.
pub trait ListItem: Serialize {
    fn id(&self) -> Option<&str>;
}

#[derive(Serialize)]
struct ListEdit<'a, T: Serialize> {
    action: Action,
    #[serde(flatten)]
    item: &'a T,
}

#[derive(Deserialize)]
struct Listing<T> {
    #[serde(default = "Vec::new")]
    list: Vec<T>,
}

pub(crate) async fn read<T, P>(
    client: &CommandClient,
    cmd: u32,
    payload: &P,
) -> Result<T, ClientError>
where
    T: DeserializeOwned,
    P: Serialize + ?Sized,
{
    let response = client.request(cmd, Method::Get, payload).await?;
    if !response.success() {
        return Err(ClientError::Rejected {
            cmd,
            message: response.message().map(str::to_string),
        });
    }
    response
        .decode()
        .map_err(|source| ClientError::Decode { cmd, source })
}

pub(crate) async fn read_list<T, P>(
    client: &CommandClient,
    cmd: u32,
    payload: &P,
) -> Result<Vec<T>, ClientError>
where
    T: DeserializeOwned,
    P: Serialize + ?Sized,
{
    let listing: Listing<T> = read(client, cmd, payload).await?;
    Ok(listing.list)
}

pub(crate) async fn write<P>(
    client: &CommandClient,
    cmd: u32,
    payload: &P,
) -> Result<CommandResponse, ClientError>
where
    P: Serialize + ?Sized,
{
    client.request(cmd, Method::Post, payload).await
}

/// Add `item` if it has no id yet, otherwise edit it in place.
pub(crate) async fn save_item<T: ListItem>(
    client: &CommandClient,
    cmd: u32,
    item: &T,
) -> Result<CommandResponse, ClientError> {
    let action = if item.id().is_some_and(|id| !id.is_empty()) {
        Action::Edit
    } else {
        Action::Add
    };
    write(client, cmd, &ListEdit { action, item }).await
}

pub(crate) async fn delete_item(
    client: &CommandClient,
    cmd: u32,
    id: &str,
) -> Result<CommandResponse, ClientError> {
    write(client, cmd, &json!({ "action": Action::Delete, "id": id })).await
}

/// Firmware booleans arrive as `true`, `1` or `"1"` depending on the page.
pub(crate) mod flag {
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
        Ok(match Value::deserialize(deserializer)? {
            Value::Bool(b) => b,
            Value::Number(n) => n.as_u64().is_some_and(|n| n != 0),
            Value::String(s) => matches!(s.as_str(), "1" | "true" | "on" | "yes"),
            _ => false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    #[derive(Serialize)]
    struct Rule {
        #[serde(skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        name: String,
    }

    #[test]
    fn test_list_edit_flattens_item() {
        let rule = Rule {
            id: Some("3".into()),
            name: "web".into(),
        };
        let value = serde_json::to_value(ListEdit {
            action: Action::Edit,
            item: &rule,
        })
        .unwrap();
        assert_eq!(value, json!({"action": "edit", "id": "3", "name": "web"}));
    }

    #[test]
    fn test_listing_defaults_to_empty() {
        let listing: Listing<Value> = serde_json::from_value(json!({"success": true})).unwrap();
        assert!(listing.list.is_empty());
    }

    #[derive(Deserialize)]
    struct Flags {
        #[serde(with = "flag")]
        a: bool,
        #[serde(with = "flag")]
        b: bool,
        #[serde(with = "flag")]
        c: bool,
        #[serde(with = "flag")]
        d: bool,
    }

    #[test]
    fn test_flag_accepts_firmware_spellings() {
        let flags: Flags =
            serde_json::from_value(json!({"a": true, "b": 1, "c": "1", "d": "0"})).unwrap();
        assert!(flags.a && flags.b && flags.c);
        assert!(!flags.d);
    }
}
