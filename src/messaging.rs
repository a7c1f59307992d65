//! Messages exchanged with the embedding host.
//!
//! Both directions are JSON objects tagged by a `type` field, matching what
//! the host page posts and listens for.

use serde::{Deserialize, Serialize};

use crate::attendance::UserData;

/// Messages the host sends in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum InboundMessage {
    /// The user's attendance data changed (login, sync, or an edit made
    /// elsewhere). Replaces the local copy wholesale.
    UserDataUpdated {
        #[serde(default)]
        data: UserData,
    },
    /// Jump to the shows of a tour.
    ExecLiveSearch {
        #[serde(rename = "tourName", default)]
        tour_name: String,
    },
    /// A newer data version is available; refetch now.
    ForceUpdateData {
        #[serde(rename = "newVersion", default, skip_serializing_if = "Option::is_none")]
        new_version: Option<String>,
    },
}

/// Messages sent out to the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum OutboundMessage {
    /// Ask the host to open the account setup screen.
    #[serde(rename = "openMyLLDB")]
    OpenAccountSetup,
    #[serde(rename = "updateUserLiveRecord")]
    UpdateUserLiveRecord {
        id: String,
        attended: bool,
        memo: String,
        link: String,
    },
}

impl InboundMessage {
    pub fn from_json(raw: &str) -> serde_json::Result<Self> {
        serde_json::from_str(raw)
    }
}

impl OutboundMessage {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attendance::AttendanceStore;

    #[test]
    fn test_inbound_user_data() {
        let msg = InboundMessage::from_json(
            r#"{"type":"userDataUpdated","data":{"attendedLives":{"2024/03/15":{"memo":"great"}},"settings":{"syncId":"abc"}}}"#,
        )
        .unwrap();
        let InboundMessage::UserDataUpdated { data } = msg else {
            panic!("wrong variant");
        };
        assert!(data.is_registered());
        assert_eq!(data.attended_lives["2024/03/15"].memo, "great");
    }

    #[test]
    fn test_inbound_search_and_update() {
        let msg = InboundMessage::from_json(r#"{"type":"execLiveSearch","tourName":"Love Like Pop vol.24"}"#).unwrap();
        assert_eq!(msg, InboundMessage::ExecLiveSearch { tour_name: "Love Like Pop vol.24".into() });

        let msg = InboundMessage::from_json(r#"{"type":"forceUpdateData"}"#).unwrap();
        assert_eq!(msg, InboundMessage::ForceUpdateData { new_version: None });
    }

    #[test]
    fn test_unknown_type_rejected() {
        assert!(InboundMessage::from_json(r#"{"type":"somethingElse"}"#).is_err());
    }

    #[test]
    fn test_outbound_wire_format() {
        assert_eq!(OutboundMessage::OpenAccountSetup.to_json().unwrap(), r#"{"type":"openMyLLDB"}"#);
        let msg = OutboundMessage::UpdateUserLiveRecord {
            id: "2024/03/15".into(),
            attended: true,
            memo: String::new(),
            link: String::new(),
        };
        let value: serde_json::Value = serde_json::from_str(&msg.to_json().unwrap()).unwrap();
        assert_eq!(value["type"], "updateUserLiveRecord");
        assert_eq!(value["id"], "2024/03/15");
        assert_eq!(value["attended"], true);
    }
}
