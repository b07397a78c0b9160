use serde::{Deserialize, Serialize};

/// Browser tab identifier. Opaque to the tracker, only compared for equality.
#[derive(PartialEq, Eq, Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TabId(pub i64);

/// Notification coming from the browser. Serialized one per line on the daemon input, for example
/// `{"type":"focusChanged","tabId":3,"url":"https://github.com"}`.
#[derive(PartialEq, Eq, Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum BrowserEvent {
    #[serde(rename_all = "camelCase")]
    FocusChanged {
        tab_id: TabId,
        #[serde(default)]
        url: Option<String>,
    },
    /// Also sent for background tabs, which the tracker ignores while a session is active.
    #[serde(rename_all = "camelCase")]
    NavigationComplete {
        tab_id: TabId,
        #[serde(default)]
        url: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    TabClosed { tab_id: TabId },
    WindowClosed,
    IdleOrLocked,
    ScheduledTick { tag: TickTag },
}

#[derive(PartialEq, Eq, Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TickTag {
    /// Roll the current period into history.
    DailyAggregation,
    /// Persist the time accrued by the active session without ending it.
    Checkpoint,
    #[serde(other)]
    Unknown,
}
