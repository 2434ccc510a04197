//! Application core: event loop, workspace ownership, action dispatch.
//!
//! The [`App`] is the only owner of the [`Workspace`]. Terminal events and
//! discovery announcements are multiplexed in one `select!`; screens get
//! read-only snapshots of the inventory and the open registry.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use color_eyre::eyre::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::{
    Frame,
    layout::{Constraint, Layout, Rect},
    style::Style,
    text::{Line, Span},
    widgets::{Block, BorderType, Borders, Clear, Paragraph, Tabs},
};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use bacreg_core::{
    AuthorizationObserver, CoreError, Device, DeviceKey, DiscoveryEvent, DiscoverySession,
    EditorAction, EditorKey, RegistryEditor, ScanRequest, ScanState, Workspace, codec,
};

use crate::action::{
    Action, ConfirmAction, InventoryView, Notification, NotificationLevel, PromptKind,
    RegistryView,
};
use crate::component::Component;
use crate::event::{Event, EventReader};
use crate::remote::Remote;
use crate::screen::ScreenId;
use crate::screens::create_screens;
use crate::theme;
use crate::tui::Tui;
use crate::widgets::{
    centered,
    prompt::{self, Prompt, PromptOutcome},
};

const NOTIFICATION_TTL: Duration = Duration::from_secs(4);
/// Column width step for `<` and `>`.
const RESIZE_STEP: u16 = 20;

/// What the app starts on.
pub enum Startup {
    /// Scan the network and wait for the operator.
    Scan,
    /// Scan for one device and open its points as soon as it answers.
    Device { id: String, address: String },
    /// Edit a registry file, filed under `key`.
    File { path: PathBuf, key: DeviceKey },
}

/// Forwards token expiry from the workspace into the action queue.
struct ExpiryNotifier(mpsc::UnboundedSender<Action>);

impl AuthorizationObserver for ExpiryNotifier {
    fn authorization_expired(&self, message: &str) {
        let _ = self.0.send(Action::Unauthorized(message.to_owned()));
    }
}

/// Where one loop iteration's input came from.
enum Input {
    Terminal(Event),
    Discovery(DiscoveryEvent),
}

pub struct App {
    ws: Workspace<Remote>,
    /// Second handle on the platform; `save` borrows the workspace mutably.
    sink: Remote,
    /// Closes every announcement stream opened by this app.
    streams: CancellationToken,
    scan_request: ScanRequest,
    startup: Option<Startup>,
    /// Device to open once a scan reports it, as (id, address).
    awaited: Option<(String, String)>,
    /// Device whose point stream is still open.
    collecting: Option<DeviceKey>,
    /// Where `w` writes; set by `--file` or the first write prompt.
    file: Option<PathBuf>,

    active_screen: ScreenId,
    screens: HashMap<ScreenId, Box<dyn Component>>,
    running: bool,
    help_visible: bool,
    prompt: Option<Prompt>,
    pending_confirm: Option<ConfirmAction>,
    notification: Option<(Notification, Instant)>,
    /// Active find term and the column it searches.
    find: Option<(String, usize)>,
    dirty: bool,
    inventory_stale: bool,
    registry_stale: bool,

    action_tx: mpsc::UnboundedSender<Action>,
    action_rx: mpsc::UnboundedReceiver<Action>,
}

impl App {
    pub fn new(
        remote: Remote,
        sink: Remote,
        session: DiscoverySession,
        platform_uuid: String,
        scan_request: ScanRequest,
        startup: Startup,
    ) -> Self {
        let (action_tx, action_rx) = mpsc::unbounded_channel();
        let observer = Arc::new(ExpiryNotifier(action_tx.clone()));
        let ws = Workspace::new(remote, session, platform_uuid).with_observer(observer);

        Self {
            ws,
            sink,
            streams: CancellationToken::new(),
            scan_request,
            startup: Some(startup),
            awaited: None,
            collecting: None,
            file: None,
            active_screen: ScreenId::Devices,
            screens: create_screens().into_iter().collect(),
            running: true,
            help_visible: false,
            prompt: None,
            pending_confirm: None,
            notification: None,
            find: None,
            dirty: false,
            inventory_stale: true,
            registry_stale: true,
            action_tx,
            action_rx,
        }
    }

    /// Run the main event loop until the operator quits.
    pub async fn run(&mut self) -> Result<()> {
        let mut tui = Tui::new()?;
        tui.enter()?;
        if let Some(screen) = self.screens.get_mut(&self.active_screen) {
            screen.set_focused(true);
        }
        if let Some(startup) = self.startup.take() {
            self.start(startup).await;
        }

        let mut events = EventReader::new(Duration::from_millis(250), Duration::from_millis(33));
        info!("TUI event loop started");

        while self.running {
            // Discovery events come first so a burst of announcements is
            // applied before the next frame.
            let input = tokio::select! {
                biased;
                Some(event) = self.ws.next_event() => Input::Discovery(event),
                event = events.next() => match event {
                    Some(event) => Input::Terminal(event),
                    None => break,
                },
            };

            match input {
                Input::Discovery(event) => self.apply_discovery(event).await,
                Input::Terminal(event) => self.handle_event(event)?,
            }

            while let Ok(action) = self.action_rx.try_recv() {
                let render = matches!(action, Action::Render);
                self.process_action(action).await?;
                if render {
                    tui.draw(|frame| self.render(frame))?;
                }
            }
        }

        self.streams.cancel();
        events.stop();
        info!("TUI event loop ended");
        Ok(())
    }

    async fn start(&mut self, startup: Startup) {
        match startup {
            Startup::Scan => self.start_scan().await,
            Startup::Device { id, address } => {
                self.awaited = Some((id, address));
                self.start_scan().await;
            }
            Startup::File { path, key } => self.open_file(path, &key),
        }
    }

    fn send(&self, action: Action) {
        let _ = self.action_tx.send(action);
    }

    fn notify(&self, notification: Notification) {
        self.send(Action::Notify(notification));
    }

    fn report(&self, error: &CoreError) {
        // Expired tokens arrive through the observer with their own message.
        if !error.is_unauthorized() {
            self.notify(Notification::error(error.to_string()));
        }
    }

    // ── Input ───────────────────────────────────────────────────────

    fn handle_event(&mut self, event: Event) -> Result<()> {
        match event {
            Event::Key(key) => {
                if let Some(action) = self.handle_key_event(key)? {
                    self.send(action);
                }
            }
            Event::Tick => self.send(Action::Tick),
            Event::Resize | Event::Render => {
                self.publish();
                self.send(Action::Render);
            }
        }
        Ok(())
    }

    /// Map a key to an action. Overlays capture input first; screen keys
    /// go to the active screen.
    fn handle_key_event(&mut self, key: KeyEvent) -> Result<Option<Action>> {
        if key.modifiers == KeyModifiers::CONTROL && key.code == KeyCode::Char('c') {
            self.running = false;
            return Ok(None);
        }

        if self.pending_confirm.is_some() {
            return Ok(match key.code {
                KeyCode::Char('y' | 'Y') | KeyCode::Enter => Some(Action::ConfirmYes),
                KeyCode::Char('n' | 'N') | KeyCode::Esc => Some(Action::ConfirmNo),
                _ => None,
            });
        }

        if let Some(prompt) = &mut self.prompt {
            let kind = prompt.kind;
            return Ok(match prompt.handle_key(key) {
                PromptOutcome::Editing => None,
                PromptOutcome::Canceled => {
                    self.prompt = None;
                    None
                }
                PromptOutcome::Submitted(text) => {
                    self.prompt = None;
                    Some(Action::PromptSubmit(kind, text))
                }
            });
        }

        if self.help_visible {
            return Ok(match key.code {
                KeyCode::Esc | KeyCode::Char('?') => Some(Action::ToggleHelp),
                _ => None,
            });
        }

        match (key.modifiers, key.code) {
            (KeyModifiers::NONE, KeyCode::Char('q')) => return Ok(Some(Action::Quit)),
            (_, KeyCode::Char('?')) => return Ok(Some(Action::ToggleHelp)),
            (KeyModifiers::NONE, KeyCode::Char(c @ '1'..='9')) => {
                let screen = c
                    .to_digit(10)
                    .and_then(|n| u8::try_from(n).ok())
                    .and_then(ScreenId::from_number);
                if let Some(screen) = screen {
                    return Ok(Some(Action::SwitchScreen(screen)));
                }
            }
            (KeyModifiers::NONE, KeyCode::Tab) => {
                return Ok(Some(Action::SwitchScreen(self.active_screen.next())));
            }
            _ => {}
        }

        if let Some(screen) = self.screens.get_mut(&self.active_screen) {
            return screen.handle_key_event(key);
        }
        Ok(None)
    }

    // ── Dispatch ────────────────────────────────────────────────────

    #[allow(clippy::too_many_lines)]
    async fn process_action(&mut self, action: Action) -> Result<()> {
        match action {
            Action::Quit => {
                if self.dirty {
                    self.pending_confirm = Some(ConfirmAction::QuitUnsaved);
                } else {
                    self.running = false;
                }
            }

            Action::SwitchScreen(target) => self.switch_screen(target),

            Action::ToggleHelp => self.help_visible = !self.help_visible,

            Action::Tick => {
                if self
                    .notification
                    .as_ref()
                    .is_some_and(|(_, shown)| shown.elapsed() > NOTIFICATION_TTL)
                {
                    self.notification = None;
                }
                self.broadcast(&Action::Tick)?;
            }

            Action::Render => {}

            // ── Discovery ──
            Action::StartScan => self.start_scan().await,
            Action::CancelScan => {
                self.ws.cancel_scan();
                self.streams.cancel();
                self.collecting = None;
                self.inventory_stale = true;
                self.notify(Notification::info("Scan canceled"));
            }
            Action::ConfigureDevice(key) => self.configure(key).await,
            Action::OpenDevice(key) => self.open_device(&key),

            // ── Registry ──
            Action::Editor(key) => self.editor_key(key).await,
            Action::MoveCursor { rows, columns } => self.move_cursor(rows, columns),
            Action::ResizeColumn { grow } => self.resize_column(grow),
            Action::OpenPrompt(kind) => self.open_prompt(kind),
            Action::PromptSubmit(kind, text) => self.submit_prompt(kind, text),
            Action::FindNext => self.find_next(),
            Action::RequestRemoveColumn => self.request_remove_column(),
            Action::ClearSelection => self.clear_selection(),
            Action::WriteFile => match self.file.clone() {
                Some(path) => self.write_file(path),
                None => self.open_prompt(PromptKind::WritePath),
            },
            Action::SaveToPlatform => self.save().await,

            // ── Feedback ──
            Action::ConfirmYes => {
                if let Some(confirm) = self.pending_confirm.take() {
                    self.execute_confirm(confirm);
                }
            }
            Action::ConfirmNo => self.pending_confirm = None,
            Action::Notify(notification) => {
                self.notification = Some((notification, Instant::now()));
            }
            Action::Unauthorized(message) => {
                warn!(%message, "session expired");
                self.ws.clear_authorization();
                self.streams.cancel();
                self.collecting = None;
                self.find = None;
                self.dirty = false;
                self.mark_stale();
                self.notify(Notification::error(format!(
                    "Session expired ({message}). Restart to sign in again."
                )));
            }

            update @ (Action::InventoryUpdated(_) | Action::RegistryUpdated(_)) => {
                self.broadcast(&update)?;
            }
        }
        Ok(())
    }

    /// Hand `action` to every screen and queue whatever they answer.
    fn broadcast(&mut self, action: &Action) -> Result<()> {
        let mut follow_ups = Vec::new();
        for screen in self.screens.values_mut() {
            if let Some(next) = screen.update(action)? {
                follow_ups.push(next);
            }
        }
        for next in follow_ups {
            self.send(next);
        }
        Ok(())
    }

    fn switch_screen(&mut self, target: ScreenId) {
        if target == self.active_screen {
            return;
        }
        debug!("switching screen: {} → {}", self.active_screen, target);
        if let Some(screen) = self.screens.get_mut(&self.active_screen) {
            screen.set_focused(false);
        }
        self.active_screen = target;
        if let Some(screen) = self.screens.get_mut(&self.active_screen) {
            screen.set_focused(true);
        }
    }

    // ── Snapshots ───────────────────────────────────────────────────

    fn mark_stale(&mut self) {
        self.inventory_stale = true;
        self.registry_stale = true;
    }

    /// Queue fresh snapshots for whatever changed since the last frame.
    fn publish(&mut self) {
        if std::mem::take(&mut self.inventory_stale) {
            let view = self.inventory_view();
            self.send(Action::InventoryUpdated(Arc::new(view)));
        }
        if std::mem::take(&mut self.registry_stale) {
            let view = self.registry_view().map(Arc::new);
            self.send(Action::RegistryUpdated(view));
        }
    }

    fn inventory_view(&self) -> InventoryView {
        let inventory = self.ws.inventory();
        InventoryView {
            devices: inventory.devices().to_vec(),
            warnings: inventory
                .warnings()
                .iter()
                .map(|w| format!("{} ({})", w.message, w.items.join(", ")))
                .collect(),
            state: self.ws.session().state(),
            configuring: self.collecting.clone(),
            connected: self.ws.remote().is_connected(),
        }
    }

    fn registry_view(&self) -> Option<RegistryView> {
        let editor = self.ws.editor()?;
        let device = self.ws.device(editor.device())?;
        Some(RegistryView {
            device: editor.device().clone(),
            registry: device.registry.clone(),
            editor: editor.clone(),
            find_term: self.find.as_ref().map(|(term, _)| term.clone()),
            dirty: self.dirty,
        })
    }

    // ── Discovery ───────────────────────────────────────────────────

    async fn start_scan(&mut self) {
        if !self.ws.remote().is_connected() {
            self.notify(Notification::warning(
                "No platform profile is configured; only local files can be edited.",
            ));
            return;
        }
        if self.dirty {
            self.notify(Notification::warning(
                "Write or save the open registry before scanning again.",
            ));
            return;
        }

        self.streams.cancel();
        self.streams = CancellationToken::new();
        self.collecting = None;

        let feed = match self.ws.remote().device_feed(self.streams.clone()).await {
            Ok(feed) => feed,
            Err(e) => return self.report(&e),
        };
        match self.ws.start_scan(&self.scan_request, feed).await {
            Ok(generation) => {
                debug!(generation, "scan started");
                self.find = None;
                self.mark_stale();
                self.switch_screen(ScreenId::Devices);
            }
            Err(e) => self.report(&e),
        }
    }

    async fn apply_discovery(&mut self, event: DiscoveryEvent) {
        self.ws.apply(event);
        self.inventory_stale = true;

        if let Some(key) = &self.collecting {
            if self.ws.editor().is_some_and(|e| e.device() == key) {
                self.registry_stale = true;
            }
            match self.ws.device(key) {
                Some(device) if !device.configuring => {
                    let message = format!("Collected {} points from {key}", device.registry.len());
                    self.notify(Notification::success(message));
                    self.collecting = None;
                }
                None => self.collecting = None,
                Some(_) => {}
            }
        }

        if let Some(key) = self.awaited_device() {
            self.awaited = None;
            self.configure(key).await;
        } else if self.awaited.is_some() && self.ws.session().state() != ScanState::Scanning {
            if let Some((id, address)) = self.awaited.take() {
                self.notify(Notification::error(format!(
                    "Device {id} at {address} did not answer the scan"
                )));
            }
        }
    }

    /// The awaited device once the scan has found it, preferring an exact
    /// address match.
    fn awaited_device(&self) -> Option<DeviceKey> {
        let (id, address) = self.awaited.as_ref()?;
        let devices = self.ws.inventory().devices();
        devices
            .iter()
            .find(|d| &d.id == id && &d.address == address)
            .or_else(|| devices.iter().find(|d| &d.id == id))
            .map(Device::key)
    }

    /// Stream `key`'s points from the platform and open them for editing.
    async fn configure(&mut self, key: DeviceKey) {
        if self.dirty {
            self.notify(Notification::warning(
                "Write or save the open registry before collecting points.",
            ));
            return;
        }
        let feed = match self.ws.remote().point_feed(self.streams.clone()).await {
            Ok(feed) => feed,
            Err(e) => return self.report(&e),
        };
        if let Err(e) = self.ws.configure_device(&key, feed).await {
            return self.report(&e);
        }
        self.notify(Notification::info(format!("Collecting points from {key}")));
        self.open_device(&key);
        self.collecting = Some(key);
    }

    fn open_device(&mut self, key: &DeviceKey) {
        if self.ws.editor().is_some_and(|e| e.device() == key) {
            self.switch_screen(ScreenId::Registry);
            return;
        }
        if self.dirty {
            self.notify(Notification::warning(
                "Write or save the open registry before switching devices.",
            ));
            return;
        }
        match self.ws.open_editor(key) {
            Ok(()) => {
                self.find = None;
                self.registry_stale = true;
                self.switch_screen(ScreenId::Registry);
            }
            Err(e) => self.report(&e),
        }
    }

    fn open_file(&mut self, path: PathBuf, key: &DeviceKey) {
        let text = match std::fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) => {
                self.notify(Notification::error(format!(
                    "Cannot read {}: {e}",
                    path.display()
                )));
                return;
            }
        };
        let warnings = match self.ws.import_csv(key, &text) {
            Ok(warnings) => warnings,
            Err(e) => return self.report(&e),
        };
        for warning in &warnings {
            warn!(file = %path.display(), "{warning}");
        }
        match warnings.as_slice() {
            [] => {}
            [only] => self.notify(Notification::warning(only.clone())),
            many => self.notify(Notification::warning(format!(
                "{} import warnings; see the log for details",
                many.len()
            ))),
        }
        self.file = Some(path);
        self.open_device(key);
        self.inventory_stale = true;
    }

    // ── Editing ─────────────────────────────────────────────────────

    /// The focused cell, defaulting to column 0 when nothing is focused.
    fn cursor(&self) -> (Option<usize>, usize) {
        self.ws.editor().map_or((None, 0), |e| {
            (e.selected_cell_row(), e.selected_cell_column().unwrap_or(0))
        })
    }

    fn edited(&mut self) {
        self.dirty = true;
        self.registry_stale = true;
        self.inventory_stale = true;
    }

    async fn editor_key(&mut self, key: EditorKey) {
        let action = match self.ws.handle_editor_key(key) {
            Ok(action) => action,
            Err(e) => return self.report(&e),
        };
        self.registry_stale = true;
        match action {
            Some(EditorAction::FetchAttributes(request)) => {
                let requested = request.points.len();
                match self.ws.fetch_extended(request).await {
                    Ok(updated) => {
                        self.edited();
                        self.notify(Notification::success(format!(
                            "Fetched attributes for {updated} of {requested} points"
                        )));
                    }
                    Err(e) => self.report(&e),
                }
            }
            Some(EditorAction::RemovePoints(points)) => {
                self.pending_confirm = Some(ConfirmAction::RemovePoints(points));
            }
            None => {}
        }
    }

    fn move_cursor(&mut self, rows: isize, columns: isize) {
        let Ok((editor, registry)) = self.ws.editing() else {
            return;
        };
        let visible: Vec<usize> = registry
            .rows()
            .iter()
            .enumerate()
            .filter(|(_, r)| r.visible)
            .map(|(i, _)| i)
            .collect();
        if visible.is_empty() || registry.width() == 0 {
            return;
        }

        let position = editor
            .selected_cell_row()
            .and_then(|row| visible.iter().position(|&v| v == row));
        let position = match position {
            Some(p) => step(p, rows, visible.len()),
            None => 0,
        };
        let column = step(
            editor.selected_cell_column().unwrap_or(0),
            columns,
            registry.width(),
        );
        editor.select_cell(visible[position], column);
        self.registry_stale = true;
    }

    fn resize_column(&mut self, grow: bool) {
        let (_, column) = self.cursor();
        let Ok((_, registry)) = self.ws.editing() else {
            return;
        };
        let Some(width) = registry.columns().get(column).map(|c| c.width) else {
            return;
        };
        let width = if grow {
            width.saturating_add(RESIZE_STEP)
        } else {
            width.saturating_sub(RESIZE_STEP)
        };
        registry.resize_column(column, width);
        self.registry_stale = true;
    }

    fn open_prompt(&mut self, kind: PromptKind) {
        if self.ws.editor().is_none() && kind != PromptKind::WritePath {
            self.notify(Notification::warning("Open a registry first"));
            return;
        }
        let initial = match kind {
            PromptKind::Replace | PromptKind::ReplaceAll if self.find.is_none() => {
                self.notify(Notification::warning("Find something first (f)"));
                return;
            }
            PromptKind::EditCell => match self.focused_value() {
                Some(value) => value,
                None => {
                    self.notify(Notification::warning("Move the cursor onto a cell first"));
                    return;
                }
            },
            PromptKind::Find => self.find.as_ref().map(|(t, _)| t.clone()).unwrap_or_default(),
            PromptKind::Filter => self
                .ws
                .editor()
                .and_then(RegistryEditor::active_filter)
                .map(|f| f.term.clone())
                .unwrap_or_default(),
            PromptKind::WritePath => self
                .file
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_default(),
            _ => String::new(),
        };
        self.prompt = Some(Prompt::new(kind, initial));
    }

    fn focused_value(&self) -> Option<String> {
        let editor = self.ws.editor()?;
        let (row, column) = (editor.selected_cell_row()?, editor.selected_cell_column()?);
        let device = self.ws.device(editor.device())?;
        let cell = device.registry.row(row)?.cells.get(column)?;
        Some(cell.value.clone())
    }

    #[allow(clippy::too_many_lines)]
    fn submit_prompt(&mut self, kind: PromptKind, text: String) {
        if kind == PromptKind::WritePath {
            if text.trim().is_empty() {
                return;
            }
            self.write_file(PathBuf::from(text.trim()));
            return;
        }

        let (row, column) = self.cursor();
        let find = self.find.clone();
        let Ok((editor, registry)) = self.ws.editing() else {
            return;
        };
        if column >= registry.width() {
            return;
        }

        let outcome: Result<Option<Notification>, CoreError> = match kind {
            PromptKind::Filter if text.is_empty() => {
                editor.clear_filter(registry);
                self.find = None;
                Ok(None)
            }
            PromptKind::Filter => {
                editor.filter(registry, &text, column);
                let shown = registry.rows().iter().filter(|r| r.visible).count();
                Ok(Some(Notification::info(format!(
                    "{shown} of {} points match",
                    registry.len()
                ))))
            }
            PromptKind::Find => {
                if let Some((_, previous)) = &find {
                    editor.clear_find(registry, *previous);
                }
                if text.is_empty() {
                    self.find = None;
                    Ok(None)
                } else {
                    let hit = editor.find_next(registry, &text, column);
                    let matches = editor.selected_cells().len();
                    self.find = Some((text, column));
                    Ok(Some(if hit.is_some() {
                        Notification::info(format!("{matches} match(es)"))
                    } else {
                        Notification::warning("No matches")
                    }))
                }
            }
            PromptKind::Replace | PromptKind::ReplaceAll => {
                let Some((term, find_column)) = find else {
                    return;
                };
                if kind == PromptKind::Replace {
                    editor.replace(registry, &term, &text, find_column);
                    Ok(None)
                } else {
                    let count = editor.selected_cells().len();
                    editor.replace_all(registry, &term, &text, find_column);
                    Ok(Some(Notification::success(format!("Replaced in {count} cell(s)"))))
                }
            }
            PromptKind::AddColumn | PromptKind::CloneColumn => {
                let added = if kind == PromptKind::AddColumn {
                    registry.add_column(column, &text)
                } else {
                    registry.clone_column(column, &text)
                };
                added.map(|index| {
                    if let Some(row) = row {
                        editor.select_cell(row, index);
                    }
                    None
                })
            }
            PromptKind::AddPoint => registry.add_point(&text).map(|index| {
                editor.select_cell(index, 0);
                None
            }),
            PromptKind::EditCell => {
                match row {
                    Some(row) if row < registry.len() => registry.update_cell(row, column, text),
                    _ => return,
                }
                Ok(None)
            }
            PromptKind::WritePath => Ok(None),
        };

        match outcome {
            Ok(notification) => {
                if !matches!(kind, PromptKind::Filter | PromptKind::Find) {
                    self.edited();
                }
                self.registry_stale = true;
                if let Some(notification) = notification {
                    self.notify(notification);
                }
            }
            Err(e) => self.report(&e),
        }
    }

    fn find_next(&mut self) {
        let Some((term, column)) = self.find.clone() else {
            self.notify(Notification::warning("Find something first (f)"));
            return;
        };
        let Ok((editor, registry)) = self.ws.editing() else {
            return;
        };
        if column >= registry.width() {
            return;
        }
        if editor.find_next(registry, &term, column).is_none() {
            self.notify(Notification::warning("No matches"));
        }
        self.registry_stale = true;
    }

    fn clear_selection(&mut self) {
        let find = self.find.take();
        let Ok((editor, registry)) = self.ws.editing() else {
            return;
        };
        if let Some((_, column)) = find {
            editor.clear_find(registry, column);
        }
        editor.clear_filter(registry);
        self.registry_stale = true;
    }

    fn request_remove_column(&mut self) {
        let (_, index) = self.cursor();
        let Some(editor) = self.ws.editor() else {
            return;
        };
        let label = self
            .ws
            .device(editor.device())
            .and_then(|d| d.registry.columns().get(index))
            .map(|c| c.label.clone());
        match label {
            None => {}
            Some(_) if index == 0 => {
                self.notify(Notification::warning("The point name column cannot be removed"));
            }
            Some(label) => self.pending_confirm = Some(ConfirmAction::RemoveColumn { index, label }),
        }
    }

    fn execute_confirm(&mut self, confirm: ConfirmAction) {
        match confirm {
            ConfirmAction::QuitUnsaved => self.running = false,
            ConfirmAction::RemovePoints(points) => match self.ws.remove_points(&points) {
                Ok(removed) => {
                    self.edited();
                    self.notify(Notification::success(format!("Removed {removed} point(s)")));
                }
                Err(e) => self.report(&e),
            },
            ConfirmAction::RemoveColumn { index, label } => {
                let find_column = self.find.as_ref().map(|(_, c)| *c);
                let Ok((editor, registry)) = self.ws.editing() else {
                    return;
                };
                if index >= registry.width() {
                    return;
                }
                if let Some(column) = find_column {
                    editor.clear_find(registry, column);
                }
                match registry.remove_column(index) {
                    Ok(_) => {
                        self.find = None;
                        self.edited();
                        self.notify(Notification::success(format!("Removed column {label}")));
                    }
                    Err(e) => self.report(&e),
                }
            }
        }
    }

    // ── Persistence ─────────────────────────────────────────────────

    fn write_file(&mut self, path: PathBuf) {
        let Some(key) = self.ws.editor().map(|e| e.device().clone()) else {
            self.notify(Notification::warning("Open a registry first"));
            return;
        };
        let Some(device) = self.ws.device(&key) else {
            return;
        };
        let handoff = device.registry.handoff(&key);
        let written = codec::render_handoff(&handoff)
            .map_err(|e| e.to_string())
            .and_then(|text| std::fs::write(&path, text).map_err(|e| e.to_string()));
        match written {
            Ok(()) => {
                info!(path = %path.display(), points = handoff.rows.len(), "registry written");
                self.notify(Notification::success(format!(
                    "Wrote {} points to {}",
                    handoff.rows.len(),
                    path.display()
                )));
                self.file = Some(path);
                self.dirty = false;
                self.registry_stale = true;
            }
            Err(e) => self.notify(Notification::error(format!(
                "Cannot write {}: {e}",
                path.display()
            ))),
        }
    }

    async fn save(&mut self) {
        let Some(key) = self.ws.editor().map(|e| e.device().clone()) else {
            self.notify(Notification::warning("Open a registry first"));
            return;
        };
        if !self.sink.is_connected() {
            self.notify(Notification::warning(
                "No platform profile is configured; write the file with w instead",
            ));
            return;
        }
        match self.ws.save(&self.sink, &key).await {
            Ok(handoff) => {
                self.dirty = false;
                self.registry_stale = true;
                self.notify(Notification::success(format!(
                    "Saved {} points for {key}",
                    handoff.rows.len()
                )));
            }
            Err(e) => self.report(&e),
        }
    }

    // ── Rendering ───────────────────────────────────────────────────

    fn render(&self, frame: &mut Frame) {
        let area = frame.area();
        let layout = Layout::vertical([
            Constraint::Min(1),
            Constraint::Length(1),
            Constraint::Length(1),
        ])
        .split(area);

        if let Some(screen) = self.screens.get(&self.active_screen) {
            screen.render(frame, layout[0]);
        }
        self.render_tab_bar(frame, layout[1]);
        self.render_status_bar(frame, layout[2]);

        if let Some((notification, _)) = &self.notification {
            render_notification(frame, area, notification);
        }
        if let Some(prompt) = &self.prompt {
            prompt.render(frame, area);
        }
        if let Some(confirm) = &self.pending_confirm {
            prompt::render_confirm(frame, area, confirm);
        }
        if self.help_visible {
            render_help(frame, area);
        }
    }

    fn render_tab_bar(&self, frame: &mut Frame, area: Rect) {
        let titles: Vec<Line> = ScreenId::ALL
            .iter()
            .map(|&id| {
                Line::from(Span::styled(
                    format!(" {} {} ", id.number(), id.label()),
                    theme::tab(id == self.active_screen),
                ))
            })
            .collect();
        let selected = ScreenId::ALL
            .iter()
            .position(|&s| s == self.active_screen)
            .unwrap_or(0);
        let tabs = Tabs::new(titles)
            .divider(Span::styled(" ", theme::key_hint()))
            .select(selected);
        frame.render_widget(tabs, area);
    }

    fn render_status_bar(&self, frame: &mut Frame, area: Rect) {
        let connection = if self.ws.remote().is_connected() {
            Span::styled("● platform", Style::default().fg(theme::GREEN))
        } else {
            Span::styled("○ offline", Style::default().fg(theme::MUTED))
        };
        let scan = Span::styled(
            format!("  scan {}", self.ws.session().state()),
            theme::key_hint(),
        );
        let file = self.file.as_ref().map_or_else(
            || Span::raw(""),
            |p| Span::styled(format!("  {}", p.display()), theme::key_hint()),
        );
        let dirty = if self.dirty {
            Span::styled("  modified", Style::default().fg(theme::YELLOW))
        } else {
            Span::raw("")
        };
        let hints = Span::styled("  │ ? help  Tab screens  q quit", theme::key_hint());
        let line = Line::from(vec![Span::raw(" "), connection, scan, file, dirty, hints]);
        frame.render_widget(Paragraph::new(line), area);
    }
}

/// `current` moved by `delta`, clamped to `0..len`.
fn step(current: usize, delta: isize, len: usize) -> usize {
    current.saturating_add_signed(delta).min(len.saturating_sub(1))
}

fn render_notification(frame: &mut Frame, area: Rect, notification: &Notification) {
    let (color, icon) = match notification.level {
        NotificationLevel::Success => (theme::GREEN, "✓"),
        NotificationLevel::Error => (theme::RED, "✗"),
        NotificationLevel::Warning => (theme::YELLOW, "!"),
        NotificationLevel::Info => (theme::CYAN, "·"),
    };
    let width = u16::try_from(notification.message.chars().count() + 6)
        .unwrap_or(u16::MAX)
        .clamp(20, area.width.saturating_sub(2).max(20));
    let height = 3u16;
    let toast = Rect::new(
        area.x + area.width.saturating_sub(width + 1),
        area.y + area.height.saturating_sub(height + 2),
        width.min(area.width),
        height.min(area.height),
    );

    frame.render_widget(Clear, toast);
    let block = Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(Style::default().fg(color))
        .style(Style::default().bg(theme::BG_POPUP));
    let line = Line::from(vec![
        Span::styled(format!(" {icon} "), Style::default().fg(color)),
        Span::styled(notification.message.as_str(), theme::row()),
    ]);
    frame.render_widget(Paragraph::new(line).block(block), toast);
}

fn render_help(frame: &mut Frame, area: Rect) {
    const SECTIONS: &[(&str, &[(&str, &str)])] = &[
        (
            "Global",
            &[
                ("1/2 Tab", "Switch screen"),
                ("?", "This help"),
                ("q", "Quit"),
            ],
        ),
        (
            "Devices",
            &[
                ("s / x", "Scan / cancel scan"),
                ("p", "Collect points from the platform"),
                ("Enter", "Open the device registry"),
            ],
        ),
        (
            "Registry",
            &[
                ("hjkl", "Move the cursor"),
                ("e Enter", "Edit cell"),
                ("/", "Filter rows by the cursor column"),
                ("f n", "Find in column / next match"),
                ("r R", "Replace / replace all"),
                ("+ c x", "Add / clone / remove column"),
                ("< >", "Narrow / widen column"),
                ("a", "Add point"),
                ("Ctrl+R", "Keyboard range mode"),
                ("J K", "Extend range (range mode)"),
                ("Enter Del", "Fetch attributes / remove (range mode)"),
                ("w s", "Write file / save to platform"),
            ],
        ),
    ];

    let mut lines = Vec::new();
    for (title, keys) in SECTIONS {
        lines.push(Line::from(Span::styled(
            format!("  {title}"),
            Style::default().fg(theme::CYAN),
        )));
        for (key, label) in *keys {
            lines.push(Line::from(vec![
                Span::styled(format!("  {key:<11}"), theme::key_hint_key()),
                Span::styled(*label, theme::key_hint()),
            ]));
        }
        lines.push(Line::from(""));
    }
    lines.push(Line::from(Span::styled(
        "  Esc or ? to close",
        theme::key_hint(),
    )));

    let height = u16::try_from(lines.len() + 2).unwrap_or(u16::MAX);
    let popup = centered(area, 60, height);
    frame.render_widget(Clear, popup);
    let block = Block::default()
        .title(" Keyboard Shortcuts ")
        .title_style(theme::title())
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(theme::border(true))
        .style(Style::default().bg(theme::BG_POPUP));
    frame.render_widget(Paragraph::new(lines).block(block), popup);
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use bacreg_core::Offline;
    use pretty_assertions::assert_eq;

    const REGISTRY: &str = "Point Name,Volttron Point Name,Units,Writable\n\
                            SupplyTemp,supply_temp,degF,FALSE\n\
                            ReturnTemp,return_temp,degF,FALSE\n\
                            Fan Cmd,fan_cmd,,TRUE\n";

    fn offline_app() -> App {
        App::new(
            Remote::Offline(Offline),
            Remote::Offline(Offline),
            DiscoverySession::new("local"),
            "local".into(),
            ScanRequest::default(),
            Startup::Scan,
        )
    }

    fn app_with_file(dir: &tempfile::TempDir) -> (App, PathBuf) {
        let path = dir.path().join("ahu.csv");
        std::fs::write(&path, REGISTRY).unwrap();
        let mut app = offline_app();
        app.open_file(path.clone(), &DeviceKey::new("ahu", "local"));
        (app, path)
    }

    fn values(app: &App, column: usize) -> Vec<String> {
        let view = app.registry_view().unwrap();
        view.registry
            .rows()
            .iter()
            .map(|r| r.cells[column].value.clone())
            .collect()
    }

    #[test]
    fn step_clamps_both_ends() {
        assert_eq!(step(0, -1, 5), 0);
        assert_eq!(step(3, 1, 5), 4);
        assert_eq!(step(4, 1, 5), 4);
        assert_eq!(step(2, isize::MIN, 5), 0);
        assert_eq!(step(2, isize::MAX, 5), 4);
    }

    #[test]
    fn opening_a_file_focuses_its_registry() {
        let dir = tempfile::tempdir().unwrap();
        let (app, path) = app_with_file(&dir);
        assert_eq!(app.active_screen, ScreenId::Registry);
        assert_eq!(app.file.as_deref(), Some(path.as_path()));
        assert_eq!(app.registry_view().unwrap().registry.len(), 3);
        assert!(!app.dirty);
    }

    #[test]
    fn cursor_skips_filtered_rows() {
        let dir = tempfile::tempdir().unwrap();
        let (mut app, _) = app_with_file(&dir);

        app.move_cursor(0, 0);
        app.submit_prompt(PromptKind::Filter, "temp".into());
        app.move_cursor(1, 0);
        assert_eq!(app.cursor(), (Some(1), 0));

        // Row 2 ("Fan Cmd") is filtered out, so the cursor stays put.
        app.move_cursor(1, 0);
        assert_eq!(app.cursor(), (Some(1), 0));
        app.move_cursor(0, 9);
        assert_eq!(app.cursor(), (Some(1), 3));
    }

    #[test]
    fn find_then_replace_all_edits_only_matches() {
        let dir = tempfile::tempdir().unwrap();
        let (mut app, _) = app_with_file(&dir);

        app.move_cursor(0, 1);
        app.submit_prompt(PromptKind::Find, "_temp".into());
        assert_eq!(app.find, Some(("_temp".into(), 1)));
        assert!(!app.dirty);

        app.submit_prompt(PromptKind::ReplaceAll, "_t".into());
        assert_eq!(values(&app, 1), ["supply_t", "return_t", "fan_cmd"]);
        assert!(app.dirty);
    }

    #[test]
    fn edit_cell_updates_the_focused_value() {
        let dir = tempfile::tempdir().unwrap();
        let (mut app, _) = app_with_file(&dir);

        app.move_cursor(0, 0);
        app.move_cursor(2, 2);
        assert_eq!(app.focused_value().as_deref(), Some(""));
        app.submit_prompt(PromptKind::EditCell, "%".into());
        assert_eq!(values(&app, 2), ["degF", "degF", "%"]);
    }

    #[test]
    fn duplicate_point_is_reported_not_added() {
        let dir = tempfile::tempdir().unwrap();
        let (mut app, _) = app_with_file(&dir);

        app.submit_prompt(PromptKind::AddPoint, "SupplyTemp".into());
        assert_eq!(app.registry_view().unwrap().registry.len(), 3);
        assert!(!app.dirty);

        app.submit_prompt(PromptKind::AddPoint, "MixedAirTemp".into());
        assert_eq!(app.registry_view().unwrap().registry.len(), 4);
        assert!(app.dirty);
    }

    #[test]
    fn point_name_column_cannot_be_removed() {
        let dir = tempfile::tempdir().unwrap();
        let (mut app, _) = app_with_file(&dir);

        app.move_cursor(0, 0);
        app.request_remove_column();
        assert!(app.pending_confirm.is_none());

        app.move_cursor(0, 2);
        app.request_remove_column();
        assert_eq!(
            app.pending_confirm,
            Some(ConfirmAction::RemoveColumn {
                index: 2,
                label: "Units".into()
            })
        );
        let confirm = app.pending_confirm.take().unwrap();
        app.execute_confirm(confirm);
        assert_eq!(app.registry_view().unwrap().registry.width(), 3);
    }

    #[tokio::test]
    async fn range_delete_asks_before_removing() {
        let dir = tempfile::tempdir().unwrap();
        let (mut app, _) = app_with_file(&dir);

        app.editor_key(EditorKey::RangeMode).await;
        app.editor_key(EditorKey::ExtendDown).await;
        app.editor_key(EditorKey::Delete).await;
        let Some(ConfirmAction::RemovePoints(points)) = app.pending_confirm.take() else {
            panic!("expected a removal prompt");
        };
        assert_eq!(points, ["SupplyTemp", "ReturnTemp"]);

        app.execute_confirm(ConfirmAction::RemovePoints(points));
        assert_eq!(values(&app, 0), ["Fan Cmd"]);
    }

    #[test]
    fn writing_keeps_the_header_and_clears_dirty() {
        let dir = tempfile::tempdir().unwrap();
        let (mut app, path) = app_with_file(&dir);

        app.submit_prompt(PromptKind::AddPoint, "MixedAirTemp".into());
        assert!(app.dirty);
        app.write_file(path.clone());
        assert!(!app.dirty);

        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.starts_with("Point Name,Volttron Point Name,Units,Writable\n"));
        assert!(written.ends_with("MixedAirTemp,,,\n"));
    }

    #[tokio::test]
    async fn quitting_with_edits_asks_first() {
        let dir = tempfile::tempdir().unwrap();
        let (mut app, _) = app_with_file(&dir);

        app.submit_prompt(PromptKind::AddPoint, "MixedAirTemp".into());
        app.process_action(Action::Quit).await.unwrap();
        assert!(app.running);
        assert_eq!(app.pending_confirm, Some(ConfirmAction::QuitUnsaved));

        app.process_action(Action::ConfirmYes).await.unwrap();
        assert!(!app.running);
    }

    #[tokio::test]
    async fn scanning_offline_is_refused() {
        let mut app = offline_app();
        app.start_scan().await;
        assert_eq!(app.ws.session().state(), ScanState::Idle);
        let Ok(Action::Notify(notification)) = app.action_rx.try_recv() else {
            panic!("expected a notification");
        };
        assert_eq!(notification.level, NotificationLevel::Warning);
    }
}
