// ── Workspace ──
//
// The state one operator works on: the device inventory, the discovery
// session feeding it and the editor over one device's registry. Owned by
// the CLI/TUI and passed where needed; nothing here is global.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::codec;
use crate::discovery::{DiscoveryEvent, DiscoverySession, Inventory, ScanState};
use crate::editor::{EditorAction, EditorKey, FetchRequest, RegistryEditor};
use crate::error::CoreError;
use crate::model::{Device, DeviceKey};
use crate::registry::{DeviceRegistry, RegistryHandoff};
use crate::remote::{AuthorizationObserver, RegistrySink, RemoteCalls, ScanRequest};

pub struct Workspace<R> {
    remote: R,
    inventory: Inventory,
    session: DiscoverySession,
    editor: Option<RegistryEditor>,
    observer: Option<Arc<dyn AuthorizationObserver>>,
    platform_uuid: String,
}

impl<R: RemoteCalls> Workspace<R> {
    pub fn new(remote: R, session: DiscoverySession, platform_uuid: impl Into<String>) -> Self {
        Self {
            remote,
            inventory: Inventory::default(),
            session,
            editor: None,
            observer: None,
            platform_uuid: platform_uuid.into(),
        }
    }

    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn AuthorizationObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn remote(&self) -> &R {
        &self.remote
    }

    pub fn inventory(&self) -> &Inventory {
        &self.inventory
    }

    pub fn session(&self) -> &DiscoverySession {
        &self.session
    }

    pub fn editor(&self) -> Option<&RegistryEditor> {
        self.editor.as_ref()
    }

    pub fn device(&self, key: &DeviceKey) -> Option<&Device> {
        self.inventory.device(key)
    }

    // ── Discovery ────────────────────────────────────────────────────

    pub async fn start_scan(
        &mut self,
        request: &ScanRequest,
        device_feed: mpsc::Receiver<String>,
    ) -> Result<u64, CoreError> {
        let result = self
            .session
            .start(&mut self.inventory, &self.remote, request, device_feed)
            .await;
        if result.is_ok() {
            self.editor = None;
        }
        self.forward(result)
    }

    pub async fn configure_device(
        &mut self,
        key: &DeviceKey,
        point_feed: mpsc::Receiver<String>,
    ) -> Result<(), CoreError> {
        let result = self
            .session
            .configure_device(&mut self.inventory, &self.remote, key, point_feed)
            .await;
        self.forward(result)
    }

    pub async fn next_event(&mut self) -> Option<DiscoveryEvent> {
        self.session.next_event().await
    }

    pub fn apply(&mut self, event: DiscoveryEvent) {
        self.session.apply(&mut self.inventory, event);
    }

    /// Apply events until the session has nothing left to wait for.
    pub async fn run_discovery(&mut self) -> ScanState {
        self.session.run(&mut self.inventory).await
    }

    pub fn cancel_scan(&mut self) {
        self.session.cancel();
    }

    /// Add a device by hand, outside any scan.
    pub fn add_device(&mut self, key: DeviceKey) -> Result<(), CoreError> {
        let key_props = crate::registry::default_key_props();
        let device = Device::new(key, self.platform_uuid.clone(), key_props);
        self.inventory.add_device(device).map(|_| ())
    }

    // ── Registry editing ─────────────────────────────────────────────

    /// Point the editor at `key`'s registry with fresh selection state.
    pub fn open_editor(&mut self, key: &DeviceKey) -> Result<(), CoreError> {
        if self.inventory.device(key).is_none() {
            return Err(CoreError::DeviceNotFound {
                identifier: key.to_string(),
            });
        }
        self.editor = Some(RegistryEditor::new(key.clone()));
        debug!(device = %key, "editor opened");
        Ok(())
    }

    pub fn close_editor(&mut self) {
        self.editor = None;
    }

    /// The open editor and the registry it edits.
    pub fn editing(&mut self) -> Result<(&mut RegistryEditor, &mut DeviceRegistry), CoreError> {
        let editor = self.editor.as_mut().ok_or(CoreError::NoActiveDevice)?;
        let device = self
            .inventory
            .device_mut(editor.device())
            .ok_or_else(|| CoreError::DeviceNotFound {
                identifier: editor.device().to_string(),
            })?;
        Ok((editor, &mut device.registry))
    }

    /// Replace `key`'s registry with a CSV file, adding the device if needed.
    ///
    /// Returns the warnings to show: rows omitted for their shape and rows
    /// dropped for repeating a point name.
    pub fn import_csv(&mut self, key: &DeviceKey, text: &str) -> Result<Vec<String>, CoreError> {
        let parsed = codec::parse(text)?;
        if self.inventory.device(key).is_none() {
            self.add_device(key.clone())?;
        }
        let mut warnings = parsed.warnings.clone();
        let device = self
            .inventory
            .device_mut(key)
            .ok_or_else(|| CoreError::Internal(format!("device {key} vanished during import")))?;

        let dropped = device.registry.load_from_csv(parsed);
        warnings.extend(
            dropped
                .into_iter()
                .map(|name| format!("Point \"{name}\" appears more than once and was omitted.")),
        );
        if self.editor.as_ref().is_some_and(|e| e.device() == key) {
            self.editor = Some(RegistryEditor::new(key.clone()));
        }
        info!(device = %key, rows = device.registry.len(), "registry imported");
        Ok(warnings)
    }

    pub fn handle_editor_key(&mut self, key: EditorKey) -> Result<Option<EditorAction>, CoreError> {
        let (editor, registry) = self.editing()?;
        Ok(editor.handle_key(registry, key))
    }

    /// Ask the platform for the rows in `request` and merge the answer.
    ///
    /// On failure the rows are unmarked so they can be fetched again, and
    /// the registry is otherwise left as it was.
    pub async fn fetch_extended(&mut self, request: FetchRequest) -> Result<usize, CoreError> {
        let result = self.remote.fetch_point_details(&request).await;
        match result {
            Ok(records) => {
                let device = self.inventory.device_mut(&request.device);
                let updated = device.map_or(0, |d| d.registry.apply_point_details(&records));
                debug!(device = %request.device, updated, "extended attributes merged");
                Ok(updated)
            }
            Err(e) => {
                warn!(device = %request.device, error = %e, "point detail fetch failed");
                if let (Some(editor), Some(device)) = (
                    self.editor.as_ref(),
                    self.inventory.device_mut(&request.device),
                ) {
                    editor.revert_fetch(&mut device.registry, &request);
                }
                self.forward(Err(e))
            }
        }
    }

    /// Remove points from the open registry and fix up selection.
    pub fn remove_points(&mut self, point_keys: &[String]) -> Result<usize, CoreError> {
        let (editor, registry) = self.editing()?;
        let removed = registry.remove_points(point_keys);
        editor.rows_removed(registry);
        Ok(removed)
    }

    /// Hand `key`'s registry to `sink`.
    pub async fn save<S: RegistrySink>(
        &mut self,
        sink: &S,
        key: &DeviceKey,
    ) -> Result<RegistryHandoff, CoreError> {
        let device = self
            .inventory
            .device(key)
            .ok_or_else(|| CoreError::DeviceNotFound {
                identifier: key.to_string(),
            })?;
        let handoff = device.registry.handoff(key);
        let result = sink.save(&handoff).await;
        self.forward(result.map(|()| handoff))
    }

    // ── Authorization ────────────────────────────────────────────────

    /// Drop everything tied to the session.
    pub fn clear_authorization(&mut self) {
        self.session.reset();
        self.inventory.clear();
        self.editor = None;
    }

    fn forward<T>(&mut self, result: Result<T, CoreError>) -> Result<T, CoreError> {
        if let Err(CoreError::Unauthorized { message }) = &result {
            warn!("platform rejected the session token");
            if let Some(observer) = &self.observer {
                observer.authorization_expired(message);
            }
            self.clear_authorization();
        }
        result
    }
}
