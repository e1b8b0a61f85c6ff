use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Deserialize, Serialize, Default, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct ManagedConnectorStatus {
    /// lifecycle conditions, oldest first
    pub conditions: Vec<Condition>,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    #[serde(rename = "type")]
    pub type_: ConditionType,
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub last_transition_time: String,
}

#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConditionType {
    Installing,
    Validating,
    Augmenting,
    Running,
    Paused,
    Deleted,
    Error,
}

impl fmt::Display for ConditionType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            Self::Installing => "Installing",
            Self::Validating => "Validating",
            Self::Augmenting => "Augmenting",
            Self::Running => "Running",
            Self::Paused => "Paused",
            Self::Deleted => "Deleted",
            Self::Error => "Error",
        };
        write!(f, "{name}")
    }
}

impl Condition {
    pub fn new(type_: ConditionType, status: impl Into<String>) -> Self {
        Self {
            type_,
            status: status.into(),
            reason: None,
            message: None,
            last_transition_time: String::new(),
        }
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

impl ManagedConnectorStatus {
    /// current phase of the connector, that is the type of the most recent condition
    pub fn phase(&self) -> Option<ConditionType> {
        self.conditions.last().map(|condition| condition.type_)
    }

    pub fn push_condition(&mut self, condition: Condition) {
        self.conditions.push(condition);
    }
}
