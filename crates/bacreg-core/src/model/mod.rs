// ── Domain model ──

pub mod cell;
pub mod device;
pub mod row;
pub mod warning;

pub use cell::{Cell, Column, ColumnTemplate, DEFAULT_COLUMN_WIDTH, MIN_COLUMN_WIDTH, normalize_key};
pub use device::{Device, DeviceAnnouncement, DeviceKey, PayloadError, PointAnnouncement};
pub use row::{HIDDEN_INDEX, PointRecord, RegistryRow};
pub use warning::{DUPLICATE_ID, DUPLICATE_ID_MESSAGE, Warning, Warnings};
