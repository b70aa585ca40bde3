//! Host (browser) callback model.
//!
//! These types mirror what the extension forwards from its `tabs` and
//! `windows` listeners. Identifiers are the browser's own integer ids.

use serde::{Deserialize, Serialize};

/// Browser-assigned tab identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TabId(pub i64);

/// Browser-assigned window identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WindowId(pub i64);

/// A tab as reported by the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TabInfo {
    pub id: TabId,
    pub window_id: WindowId,
    /// Missing while the tab has not committed a navigation yet, or when the
    /// extension lacks permission to read it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// A tab or window callback fired by the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HostEvent {
    /// The user switched to a tab.
    TabActivated { tab: TabInfo },
    /// A tab changed; only `complete && active` updates count as navigation
    /// on the focused tab.
    TabUpdated {
        tab: TabInfo,
        #[serde(default)]
        complete: bool,
        #[serde(default)]
        active: bool,
    },
    /// A tab was closed.
    TabRemoved {
        tab_id: TabId,
        window_id: WindowId,
        #[serde(default)]
        window_closing: bool,
    },
    /// Window focus moved. `window_id` is `None` when no browser window has
    /// focus; `active_tab` is the focused window's active tab.
    WindowFocusChanged {
        #[serde(default)]
        window_id: Option<WindowId>,
        #[serde(default)]
        active_tab: Option<TabInfo>,
    },
}
