// bacreg-core: Discovery, registries and the registry editor between bacreg-api and consumers (CLI/TUI).

pub mod codec;
pub mod config;
pub mod discovery;
pub mod editor;
pub mod error;
pub mod model;
pub mod registry;
pub mod remote;
pub mod workspace;

// ── Primary re-exports ──────────────────────────────────────────────
pub use codec::{CsvError, ParsedCsv, RenderMode, Rendered, TableView};
pub use config::{PlatformConfig, TlsVerification};
pub use discovery::{DiscoveryEvent, DiscoverySession, EventKind, Inventory, ScanState};
pub use editor::{EditorAction, EditorKey, FetchRequest, KeyboardRange, RegistryEditor, RowFilter};
pub use error::CoreError;
pub use registry::{DeviceRegistry, RegistryHandoff};
pub use remote::{
    AuthorizationObserver, Offline, PlatformConnection, RegistrySink, RemoteCalls, ScanRequest,
};
pub use workspace::Workspace;

// Re-export model types at the crate root for ergonomics.
pub use model::{
    Cell, Column, ColumnTemplate, Device, DeviceKey, PointRecord, RegistryRow, Warning, Warnings,
};
