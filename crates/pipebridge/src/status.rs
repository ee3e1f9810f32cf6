//! Lifecycle states for the bridge and its engine thread.

use serde::{Deserialize, Serialize};

/// State of the engine thread.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EngineStatus {
    /// Thread spawned, running one-time initialization
    #[default]
    Starting,
    /// Inside the engine's run loop
    Running,
    /// Run loop returned normally
    Exited,
    /// Initialization or run loop returned an error
    Failed,
    /// The engine panicked; the panic was caught on its thread
    Panicked,
}

impl EngineStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Exited | Self::Failed | Self::Panicked)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Starting => "STARTING",
            Self::Running => "RUNNING",
            Self::Exited => "EXITED",
            Self::Failed => "FAILED",
            Self::Panicked => "PANICKED",
        }
    }
}

/// State of the bridge as seen from its entry points.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BridgeState {
    /// `start` not called yet: sends are dropped, reads return empty.
    #[default]
    Uninitialized,
    Running,
    /// `shutdown` ran; not restartable.
    Stopped,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engine_status_default_is_starting() {
        assert_eq!(EngineStatus::default(), EngineStatus::Starting);
    }

    #[test]
    fn terminal_states() {
        assert!(!EngineStatus::Starting.is_terminal());
        assert!(!EngineStatus::Running.is_terminal());
        assert!(EngineStatus::Exited.is_terminal());
        assert!(EngineStatus::Failed.is_terminal());
        assert!(EngineStatus::Panicked.is_terminal());
    }

    #[test]
    fn engine_status_serializes_screaming_snake_case() {
        insta::assert_json_snapshot!(
            [
                EngineStatus::Starting,
                EngineStatus::Running,
                EngineStatus::Exited,
                EngineStatus::Failed,
                EngineStatus::Panicked,
            ],
            @r#"
        [
          "STARTING",
          "RUNNING",
          "EXITED",
          "FAILED",
          "PANICKED"
        ]
        "#
        );
    }

    #[test]
    fn as_str_matches_serde() {
        for status in [
            EngineStatus::Starting,
            EngineStatus::Running,
            EngineStatus::Exited,
            EngineStatus::Failed,
            EngineStatus::Panicked,
        ] {
            let json = serde_json::to_string(&status).unwrap();
            assert_eq!(json, format!("\"{}\"", status.as_str()));
        }
    }

    #[test]
    fn bridge_state_serializes_lowercase() {
        insta::assert_json_snapshot!(
            [
                BridgeState::Uninitialized,
                BridgeState::Running,
                BridgeState::Stopped,
            ],
            @r#"
        [
          "uninitialized",
          "running",
          "stopped"
        ]
        "#
        );
    }

    #[test]
    fn bridge_state_deserializes_lowercase() {
        assert_eq!(
            serde_json::from_str::<BridgeState>("\"stopped\"").unwrap(),
            BridgeState::Stopped
        );
    }
}
