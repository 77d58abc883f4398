use serde::{Deserialize, Serialize};

/// A partial progress update. Unset fields leave the node unchanged.
///
/// Plain strings convert into a message-only update, so
/// `ctx.update("Parsing").await?` and
/// `ctx.update(UpdateInfo::progress("Parsing", 3, 10)).await?` both work.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_indeterminate: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub can_abort: Option<bool>,
}

impl UpdateInfo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn message(message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            ..Self::default()
        }
    }

    /// Determinate progress: `current` out of `max` with a status message.
    pub fn progress(message: impl Into<String>, current: u64, max: u64) -> Self {
        Self {
            message: Some(message.into()),
            current: Some(current),
            max: Some(max),
            is_indeterminate: Some(false),
            can_abort: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_current(mut self, current: u64) -> Self {
        self.current = Some(current);
        self
    }

    pub fn with_max(mut self, max: u64) -> Self {
        self.max = Some(max);
        self
    }

    pub fn with_indeterminate(mut self, is_indeterminate: bool) -> Self {
        self.is_indeterminate = Some(is_indeterminate);
        self
    }

    pub fn with_can_abort(mut self, can_abort: bool) -> Self {
        self.can_abort = Some(can_abort);
        self
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

impl From<&str> for UpdateInfo {
    fn from(message: &str) -> Self {
        Self::message(message)
    }
}

impl From<String> for UpdateInfo {
    fn from(message: String) -> Self {
        Self::message(message)
    }
}

impl From<&String> for UpdateInfo {
    fn from(message: &String) -> Self {
        Self::message(message.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_converts_to_message_only() {
        let info: UpdateInfo = "Loading".into();
        assert_eq!(info.message.as_deref(), Some("Loading"));
        assert_eq!(info.current, None);
        assert_eq!(info.is_indeterminate, None);
    }

    #[test]
    fn progress_is_determinate() {
        let info = UpdateInfo::progress("Parsing", 3, 10);
        assert_eq!(info.current, Some(3));
        assert_eq!(info.max, Some(10));
        assert_eq!(info.is_indeterminate, Some(false));
    }

    #[test]
    fn deserializes_partial_payload() {
        let info: UpdateInfo = serde_json::from_str(r#"{"current": 5, "can_abort": false}"#).unwrap();
        assert_eq!(info, UpdateInfo::new().with_current(5).with_can_abort(false));
        assert!(UpdateInfo::new().is_empty());
    }
}
