use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Storage "object created" notification, S3 event layout.
#[derive(Debug, Deserialize, ToSchema)]
pub struct ObjectCreatedNotification {
    #[serde(rename = "Records", default)]
    pub records: Vec<EventRecord>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EventRecord {
    #[serde(default)]
    pub event_name: Option<String>,
    pub s3: S3Entity,
}

impl EventRecord {
    /// Records without an event name are treated as creations.
    pub fn is_object_created(&self) -> bool {
        self.event_name
            .as_deref()
            .is_none_or(|name| name.starts_with("ObjectCreated"))
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct S3Entity {
    pub bucket: S3Bucket,
    pub object: S3Object,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct S3Bucket {
    pub name: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct S3Object {
    pub key: String,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum RecordOutcome {
    Enqueued,
    Duplicate,
    Ignored,
    Failed,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RecordResult {
    pub bucket: String,
    pub key: String,
    pub job_id: Option<Uuid>,
    pub outcome: RecordOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct NotificationResponse {
    pub records: Vec<RecordResult>,
}

impl NotificationResponse {
    pub fn has_failures(&self) -> bool {
        self.records
            .iter()
            .any(|r| matches!(r.outcome, RecordOutcome::Failed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_s3_put_event() {
        let raw = r#"{
            "Records": [{
                "eventVersion": "2.1",
                "eventSource": "aws:s3",
                "eventName": "ObjectCreated:Put",
                "s3": {
                    "bucket": { "name": "uploads", "arn": "arn:aws:s3:::uploads" },
                    "object": { "key": "videos/My+Trip.mp4", "size": 1024 }
                }
            }]
        }"#;

        let event: ObjectCreatedNotification = serde_json::from_str(raw).unwrap();
        assert_eq!(event.records.len(), 1);
        assert!(event.records[0].is_object_created());
        assert_eq!(event.records[0].s3.bucket.name, "uploads");
        assert_eq!(event.records[0].s3.object.key, "videos/My+Trip.mp4");
    }

    #[test]
    fn removal_events_are_not_creations() {
        let raw = r#"{"Records":[{"eventName":"ObjectRemoved:Delete",
            "s3":{"bucket":{"name":"uploads"},"object":{"key":"a.mp4"}}}]}"#;

        let event: ObjectCreatedNotification = serde_json::from_str(raw).unwrap();
        assert!(!event.records[0].is_object_created());
    }
}
