use serde::{Deserialize, Serialize};

use crate::api::Document;

/// Frames of a collection listen stream.
///
/// The stream opens with a snapshot of the current contents, and every later
/// change produces another full snapshot, never a delta. Pings are keepalives
/// and carry no data.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ListenEvent {
    Snapshot { documents: Vec<Document> },
    Ping,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn snapshot_frame_round_trips() {
        let raw = json!({
            "type": "snapshot",
            "data": { "documents": [ { "id": "a", "fields": { "text": "hi" } } ] },
        });
        let event: ListenEvent = serde_json::from_value(raw).unwrap();
        match event {
            ListenEvent::Snapshot { documents } => {
                assert_eq!(documents.len(), 1);
                assert_eq!(documents[0].id, "a");
            }
            other => panic!("expected snapshot, got {other:?}"),
        }
    }

    #[test]
    fn ping_frame_has_no_payload() {
        let event: ListenEvent = serde_json::from_str(r#"{"type":"ping"}"#).unwrap();
        assert!(matches!(event, ListenEvent::Ping));
    }
}
