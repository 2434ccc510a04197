//! Everything that changes state travels as an [`Action`].

use std::fmt;
use std::sync::Arc;

use bacreg_core::{Device, DeviceKey, DeviceRegistry, EditorKey, RegistryEditor, ScanState};

use crate::screen::ScreenId;

/// What the devices screen shows.
#[derive(Debug, Clone)]
pub struct InventoryView {
    pub devices: Vec<Device>,
    pub warnings: Vec<String>,
    pub state: ScanState,
    /// Device whose points are streaming in.
    pub configuring: Option<DeviceKey>,
    pub connected: bool,
}

/// What the registry screen shows.
#[derive(Debug, Clone)]
pub struct RegistryView {
    pub device: DeviceKey,
    pub registry: DeviceRegistry,
    pub editor: RegistryEditor,
    pub find_term: Option<String>,
    pub dirty: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationLevel {
    Info,
    Success,
    Warning,
    Error,
}

#[derive(Debug, Clone)]
pub struct Notification {
    pub message: String,
    pub level: NotificationLevel,
}

impl Notification {
    pub fn info(message: impl Into<String>) -> Self {
        Self::new(message, NotificationLevel::Info)
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self::new(message, NotificationLevel::Success)
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(message, NotificationLevel::Warning)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(message, NotificationLevel::Error)
    }

    fn new(message: impl Into<String>, level: NotificationLevel) -> Self {
        Self {
            message: message.into(),
            level,
        }
    }
}

/// Text the operator is asked for. Column-relative prompts act on the
/// focused column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptKind {
    Filter,
    Find,
    Replace,
    ReplaceAll,
    AddColumn,
    CloneColumn,
    AddPoint,
    EditCell,
    WritePath,
}

impl PromptKind {
    pub fn title(self) -> &'static str {
        match self {
            Self::Filter => "Filter rows",
            Self::Find => "Find",
            Self::Replace => "Replace with",
            Self::ReplaceAll => "Replace all with",
            Self::AddColumn => "New column label",
            Self::CloneColumn => "Label for the copy",
            Self::AddPoint => "New point name",
            Self::EditCell => "Cell value",
            Self::WritePath => "Write registry to",
        }
    }
}

/// Changes that wait for a yes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfirmAction {
    RemovePoints(Vec<String>),
    RemoveColumn { index: usize, label: String },
    QuitUnsaved,
}

impl fmt::Display for ConfirmAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RemovePoints(points) if points.len() == 1 => {
                write!(f, "Remove point {}?", points[0])
            }
            Self::RemovePoints(points) => write!(f, "Remove {} points?", points.len()),
            Self::RemoveColumn { label, .. } => write!(f, "Remove column {label}?"),
            Self::QuitUnsaved => f.write_str("Quit without writing your changes?"),
        }
    }
}

#[derive(Debug, Clone)]
pub enum Action {
    // ── Lifecycle ────────────────────────────────────────
    Quit,
    Tick,
    Render,

    // ── Navigation ───────────────────────────────────────
    SwitchScreen(ScreenId),
    ToggleHelp,

    // ── Discovery ────────────────────────────────────────
    StartScan,
    CancelScan,
    /// Stream the device's points from the platform.
    ConfigureDevice(DeviceKey),
    /// Edit the points the device already holds.
    OpenDevice(DeviceKey),
    InventoryUpdated(Arc<InventoryView>),

    // ── Registry ─────────────────────────────────────────
    /// `None` once no registry is open.
    RegistryUpdated(Option<Arc<RegistryView>>),
    Editor(EditorKey),
    MoveCursor { rows: isize, columns: isize },
    ResizeColumn { grow: bool },
    OpenPrompt(PromptKind),
    PromptSubmit(PromptKind, String),
    FindNext,
    RequestRemoveColumn,
    /// Drop the find and the filter.
    ClearSelection,
    WriteFile,
    SaveToPlatform,

    // ── Feedback ─────────────────────────────────────────
    ConfirmYes,
    ConfirmNo,
    Notify(Notification),
    /// The platform rejected the session token.
    Unauthorized(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn confirm_messages() {
        assert_eq!(
            ConfirmAction::RemovePoints(vec!["AHU-1".into()]).to_string(),
            "Remove point AHU-1?"
        );
        assert_eq!(
            ConfirmAction::RemovePoints(vec!["A".into(), "B".into()]).to_string(),
            "Remove 2 points?"
        );
        assert_eq!(
            ConfirmAction::RemoveColumn {
                index: 2,
                label: "Units".into()
            }
            .to_string(),
            "Remove column Units?"
        );
    }
}
