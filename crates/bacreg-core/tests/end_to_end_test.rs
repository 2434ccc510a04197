#![allow(clippy::unwrap_used)]

// Scan → configure a device → edit its registry → save, against fake collaborators.

use std::sync::Mutex;
use std::time::Duration;

use pretty_assertions::assert_eq;
use tokio::sync::mpsc;

use bacreg_core::discovery::FEED_CAPACITY;
use bacreg_core::{
    CoreError, DeviceKey, DiscoverySession, FetchRequest, PointRecord, RegistryHandoff,
    RegistryRow, RegistrySink, RemoteCalls, ScanRequest, ScanState, Workspace,
};

#[derive(Default)]
struct FakePlatform {
    scans: Mutex<Vec<ScanRequest>>,
    published: Mutex<Vec<DeviceKey>>,
}

impl RemoteCalls for FakePlatform {
    async fn start_scan(&self, request: &ScanRequest) -> Result<(), CoreError> {
        self.scans.lock().unwrap().push(request.clone());
        Ok(())
    }

    async fn publish_points(&self, device: &DeviceKey) -> Result<(), CoreError> {
        self.published.lock().unwrap().push(device.clone());
        Ok(())
    }

    async fn fetch_point_details(
        &self,
        _request: &FetchRequest,
    ) -> Result<Vec<PointRecord>, CoreError> {
        Ok(Vec::new())
    }
}

#[derive(Default)]
struct MemorySink(Mutex<Vec<RegistryHandoff>>);

impl RegistrySink for MemorySink {
    async fn save(&self, handoff: &RegistryHandoff) -> Result<(), CoreError> {
        self.0.lock().unwrap().push(handoff.clone());
        Ok(())
    }
}

/// A point record in the attribute order the proxy sends.
fn point(name: &str, index: u32) -> String {
    format!(
        r#"{{"device_id": 150, "address": "10.0.0.5", "results": {{"Reference Point Name": "{name}", "Volttron Point Name": "{name}", "Units": "degreesFahrenheit", "BACnet Object Type": "analogValue", "Property": "presentValue", "Writable": "FALSE", "Index": {index}}}}}"#
    )
}

#[tokio::test]
async fn scan_configure_edit_and_save() {
    let mut ws = Workspace::new(
        FakePlatform::default(),
        DiscoverySession::new("platform-1"),
        "platform-1",
    );

    // Scan 100..=200 and collect one device plus a repeat and a conflict.
    let (dev_tx, dev_rx) = mpsc::channel(FEED_CAPACITY);
    let request = ScanRequest {
        low_device_id: Some(100),
        high_device_id: Some(200),
        ..ScanRequest::default()
    };
    ws.start_scan(&request, dev_rx).await.unwrap();
    assert_eq!(ws.session().state(), ScanState::Scanning);

    for address in ["10.0.0.5", "10.0.0.5", "10.0.0.9"] {
        let raw = serde_json::json!({"device_id": 150, "address": address, "max_apdu_length": 1476});
        dev_tx.send(raw.to_string()).await.unwrap();
    }
    drop(dev_tx);
    assert_eq!(ws.run_discovery().await, ScanState::Completed);
    assert_eq!(ws.inventory().len(), 1);
    assert_eq!(
        ws.inventory().warnings().get("duplicate_id").unwrap().items,
        vec!["150"]
    );
    assert_eq!(ws.remote().scans.lock().unwrap()[0], request);

    // Stream points A, B, C for device 150.
    let key = DeviceKey::new("150", "10.0.0.5");
    let (pt_tx, pt_rx) = mpsc::channel(FEED_CAPACITY);
    ws.configure_device(&key, pt_rx).await.unwrap();
    for (i, name) in ["A", "B", "C"].into_iter().enumerate() {
        pt_tx.send(point(name, u32::try_from(i).unwrap())).await.unwrap();
    }
    pt_tx.send(point("B", 1)).await.unwrap();
    drop(pt_tx);
    ws.run_discovery().await;
    assert_eq!(*ws.remote().published.lock().unwrap(), vec![key.clone()]);

    // Edit.
    ws.open_editor(&key).unwrap();
    let (editor, registry) = ws.editing().unwrap();
    let names: Vec<_> = registry.rows().iter().map(RegistryRow::point_name).collect();
    assert_eq!(names, vec!["A", "B", "C"]);
    assert_eq!(registry.columns()[0].key, "reference_point_name");

    registry.add_column(0, "Notes").unwrap();
    for row in registry.rows() {
        assert_eq!(row.cells[1].key, "notes");
        assert_eq!(row.cells[1].value, "");
        assert_eq!(row.cells.len(), registry.width());
    }

    assert_eq!(editor.find_next(registry, "B", 0), Some(1));
    assert_eq!(editor.replace(registry, "B", "B2", 0), None);
    assert_eq!(registry.rows()[1].point_name(), "B2");
    assert!(editor.selected_cells().is_empty());
    assert_eq!(editor.selected_cell_row(), None);

    // Save.
    let sink = MemorySink::default();
    let handoff = ws.save(&sink, &key).await.unwrap();
    assert_eq!(handoff.columns[1].label, "Notes");
    let names: Vec<_> = handoff.rows.iter().map(|r| r[0].as_str()).collect();
    assert_eq!(names, vec!["A", "B2", "C"]);
    assert_eq!(sink.0.lock().unwrap().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn silent_network_times_out() {
    let session = DiscoverySession::new("platform-1").with_timeout(Duration::from_millis(10_000));
    let mut ws = Workspace::new(FakePlatform::default(), session, "platform-1");

    let (dev_tx, dev_rx) = mpsc::channel(FEED_CAPACITY);
    ws.start_scan(&ScanRequest::default(), dev_rx).await.unwrap();

    assert_eq!(ws.run_discovery().await, ScanState::Canceled);
    assert!(dev_tx.is_closed());
    assert!(ws.inventory().is_empty());
}

#[tokio::test]
async fn new_scan_discards_previous_inventory() {
    let mut ws = Workspace::new(
        FakePlatform::default(),
        DiscoverySession::new("platform-1"),
        "platform-1",
    );

    let (tx, rx) = mpsc::channel(FEED_CAPACITY);
    ws.start_scan(&ScanRequest::default(), rx).await.unwrap();
    tx.send(r#"{"device_id": 1, "address": "a"}"#.to_owned())
        .await
        .unwrap();
    let event = ws.next_event().await.unwrap();
    ws.apply(event);
    assert_eq!(ws.inventory().len(), 1);

    let (tx2, rx2) = mpsc::channel(FEED_CAPACITY);
    ws.start_scan(&ScanRequest::default(), rx2).await.unwrap();
    assert!(ws.inventory().is_empty());
    assert!(tx.is_closed());
    drop(tx2);
    assert_eq!(ws.run_discovery().await, ScanState::Completed);
}
