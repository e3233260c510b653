//! Integration tests for packline.
//!
//! These tests drive the engine end to end against an in-process mock ERP
//! kernel: schema loading through typed plugins, barcode validation round
//! trips, the pending-lines gate, and process finalization with message
//! parsing.

use anyhow::Result;
use async_trait::async_trait;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use axum::{Json, Router};
use packline::{
    ActionCaller, CallOptions, EngineConfig, KernelClient, KernelError, LoadContext, LoadPlugin,
    PluginLoader, PluginRegistry, ProcessContext, ProcessController, ProcessInput, ProcessPlugin,
    ScanContext, ScanFeedback, ScanMatch, ScanOutcome, ScanPlugin, SelectionContext,
};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

const PROCESS_ID: &str = "PACK-PROCESS-1";
const VALIDATE_ACTION: &str = "com.example.warehouse.ValidateBarcodeAction";
const SHIP_ACTION: &str = "com.example.warehouse.GeneratePackAction";
const KNOWN_BARCODE: &str = "8411000000017";

/// Requests captured by the mock kernel, for assertions.
#[derive(Clone, Default)]
struct Recorded {
    requests: Arc<Mutex<Vec<(String, Value, Option<String>)>>>,
}

impl Recorded {
    fn push(&self, action: &str, body: Value, auth: Option<String>) {
        self.requests
            .lock()
            .unwrap()
            .push((action.to_string(), body, auth));
    }

    fn take(&self) -> Vec<(String, Value, Option<String>)> {
        std::mem::take(&mut *self.requests.lock().unwrap())
    }
}

async fn kernel_handler(
    State(recorded): State<Recorded>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    let action = params.get("_action").cloned().unwrap_or_default();
    let auth = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    recorded.push(&action, body.clone(), auth);

    match action.as_str() {
        VALIDATE_ACTION => {
            let barcode = body["_params"]["barcode"].as_str().unwrap_or_default();
            if barcode == KNOWN_BARCODE {
                (
                    StatusCode::OK,
                    Json(json!({
                        "responseActions": [{
                            "returnData": {
                                "shipmentLineId": "SL1",
                                "conversionRate": 2.0,
                                "scannedBarcode": barcode
                            }
                        }]
                    })),
                )
            } else {
                (
                    StatusCode::OK,
                    Json(json!({ "responseActions": [{ "returnData": {} }] })),
                )
            }
        }
        SHIP_ACTION => (
            StatusCode::OK,
            Json(json!({
                "responseActions": [{
                    "showMsgInProcessView": {
                        "msgType": "success",
                        "msgTitle": "Pack generated",
                        "msgText": "Shipment completed. <a onclick=\"openDirectTab('TAB9', 'REC9', null)\">Goods Shipment</a>"
                    }
                }]
            })),
        ),
        _ => (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({}))),
    }
}

async fn datasource_handler(Json(body): Json<Value>) -> Json<Value> {
    assert_eq!(body["entity"], "ShipmentLine");
    Json(json!({
        "data": [
            { "productId": "P1", "shipmentLineId": "SL1", "quantity": 10.0, "productName": "Widget" },
            { "productId": "P2", "shipmentLineId": "SL2", "quantity": 4.0, "productName": "Gadget" }
        ]
    }))
}

/// Spin up the mock kernel and return a config pointed at it.
async fn mock_kernel() -> (EngineConfig, Recorded) {
    let recorded = Recorded::default();
    let app = Router::new()
        .route(
            "/api/erp/org.openbravo.client.kernel",
            post(kernel_handler),
        )
        .route("/datasource", post(datasource_handler))
        .with_state(recorded.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    let config = EngineConfig {
        base_url: format!("http://{addr}"),
        ..Default::default()
    };
    (config, recorded)
}

// =============================================================================
// Kernel client round trips
// =============================================================================

mod kernel_client {
    use super::*;

    #[tokio::test]
    async fn call_action_sends_auth_and_nested_params() {
        let (config, recorded) = mock_kernel().await;
        let client = KernelClient::new(&config, "test-token", PROCESS_ID);

        let response = client
            .call_action(
                VALIDATE_ACTION,
                json!({ "barcode": KNOWN_BARCODE }),
                &CallOptions::default(),
            )
            .await
            .unwrap();
        assert_eq!(
            response["responseActions"][0]["returnData"]["shipmentLineId"],
            "SL1"
        );

        let requests = recorded.take();
        assert_eq!(requests.len(), 1);
        let (action, body, auth) = &requests[0];
        assert_eq!(action, VALIDATE_ACTION);
        assert_eq!(body["_buttonValue"], "DONE");
        assert_eq!(body["_params"]["barcode"], KNOWN_BARCODE);
        assert_eq!(auth.as_deref(), Some("Bearer test-token"));
    }

    #[tokio::test]
    async fn call_action_flattens_top_level_params() {
        let (config, recorded) = mock_kernel().await;
        let client = KernelClient::new(&config, "test-token", PROCESS_ID);

        client
            .call_action(
                SHIP_ACTION,
                json!({ "recordId": "R1", "boxCount": 2 }),
                &CallOptions {
                    top_level: true,
                    entity_name: Some("ShipmentLine".to_string()),
                    process_id: None,
                },
            )
            .await
            .unwrap();

        let requests = recorded.take();
        let (_, body, _) = &requests[0];
        assert_eq!(body["recordId"], "R1");
        assert_eq!(body["boxCount"], 2);
        assert_eq!(body["_entityName"], "ShipmentLine");
        assert!(body.get("_params").is_none());
    }

    #[tokio::test]
    async fn non_2xx_action_is_a_hard_failure() {
        let (config, _) = mock_kernel().await;
        let client = KernelClient::new(&config, "test-token", PROCESS_ID);

        let err = client
            .call_action("unknown.Action", json!({}), &CallOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            KernelError::ActionCallFailed { status: 500 }
        ));
    }

    #[tokio::test]
    async fn fetch_datasource_posts_entity_and_params() {
        let (config, _) = mock_kernel().await;
        let client = KernelClient::new(&config, "test-token", PROCESS_ID);

        let response = client
            .fetch_datasource("ShipmentLine", json!({ "shipmentId": "R1" }))
            .await
            .unwrap();
        assert_eq!(response["data"][0]["shipmentLineId"], "SL1");
    }
}

// =============================================================================
// Typed plugins used by the end-to-end flow
// =============================================================================

struct PackingLoad;

#[async_trait]
impl LoadPlugin for PackingLoad {
    async fn on_load(
        &self,
        ctx: &LoadContext,
        _process_definition: &Value,
        selection: &SelectionContext,
    ) -> Result<Value> {
        let record_id = selection.first_record_id().unwrap_or_default().to_string();
        let lines = ctx
            .fetch_datasource
            .fetch_datasource("ShipmentLine", json!({ "shipmentId": record_id }))
            .await?;
        Ok(json!({
            "type": "warehouseProcess",
            "titleKey": "packing.title",
            "inputBar": ["boxSelector", "addBox", "qty", "barcode"],
            "gridColumns": [
                { "field": "productName", "labelKey": "packing.product" },
                { "field": "quantity", "labelKey": "packing.quantity", "align": "right" },
                { "field": "qtyPending", "labelKey": "packing.pending", "align": "right" }
            ],
            "features": {},
            "initialData": { "lines": lines["data"], "boxCount": 1 },
            "recordId": record_id
        }))
    }
}

struct BarcodeScan;

#[async_trait]
impl ScanPlugin for BarcodeScan {
    async fn on_scan(&self, ctx: &ScanContext) -> Result<ScanOutcome> {
        let response = ctx
            .call_action
            .call_action(
                VALIDATE_ACTION,
                json!({ "barcode": ctx.barcode }),
                &CallOptions::default(),
            )
            .await?;
        let ret = &response["responseActions"][0]["returnData"];
        let Some(line_id) = ret["shipmentLineId"].as_str() else {
            return Ok(ScanOutcome::rejected_with("Wrong barcode"));
        };
        let rate = ret["conversionRate"].as_f64().unwrap_or(1.0);
        Ok(ScanOutcome::Match(ScanMatch {
            match_field: "shipmentLineId".to_string(),
            match_value: line_id.to_string(),
            qty: ctx.qty * rate,
            scanned_code: ret["scannedBarcode"].as_str().map(str::to_string),
        }))
    }
}

struct GeneratePack;

#[async_trait]
impl ProcessPlugin for GeneratePack {
    async fn on_process(&self, ctx: &ProcessContext, input: &ProcessInput) -> Result<Value> {
        let response = ctx
            .call_action
            .call_action(
                SHIP_ACTION,
                json!({
                    "recordId": input.record_id.clone(),
                    "boxCount": input.box_count,
                    "calculateWeight": input.calculate_weight,
                    "lines": input.lines.clone(),
                }),
                &CallOptions::default(),
            )
            .await?;
        Ok(response)
    }
}

fn registry() -> Arc<PluginRegistry> {
    let mut registry = PluginRegistry::new();
    registry.register_load(PROCESS_ID, Arc::new(PackingLoad));
    registry.register_scan(PROCESS_ID, Arc::new(BarcodeScan));
    registry.register_process(PROCESS_ID, Arc::new(GeneratePack));
    Arc::new(registry)
}

async fn open_controller(config: &EngineConfig) -> ProcessController {
    let loader = PluginLoader::new(registry(), config);
    let kernel = Arc::new(KernelClient::new(config, "test-token", PROCESS_ID));
    let selection = SelectionContext::new(vec![json!({ "id": "SHIP-7" })]);
    ProcessController::open(&loader, PROCESS_ID, kernel, &json!({}), &selection)
        .await
        .unwrap()
        .expect("packing process should produce a schema")
}

// =============================================================================
// End-to-end flow
// =============================================================================

mod full_flow {
    use super::*;

    #[tokio::test]
    async fn load_builds_schema_and_state_from_datasource() {
        let (config, _) = mock_kernel().await;
        let controller = open_controller(&config).await;

        assert_eq!(controller.schema().record_id, "SHIP-7");
        assert_eq!(controller.state().box_count(), 1);
        assert_eq!(controller.state().lines().len(), 2);
        assert_eq!(controller.state().lines()[0].qty_pending, 10.0);
        assert_eq!(
            controller.state().lines()[0].field_value("productName").as_deref(),
            Some("Widget")
        );
    }

    #[tokio::test]
    async fn unregistered_process_is_not_a_warehouse_process() {
        let (config, _) = mock_kernel().await;
        let loader = PluginLoader::new(registry(), &config);
        let kernel = Arc::new(KernelClient::new(&config, "test-token", "OTHER"));
        let opened = ProcessController::open(
            &loader,
            "OTHER",
            kernel,
            &json!({}),
            &SelectionContext::default(),
        )
        .await
        .unwrap();
        assert!(opened.is_none());
    }

    #[tokio::test]
    async fn scan_applies_backend_conversion_rate() {
        let (config, _) = mock_kernel().await;
        let mut controller = open_controller(&config).await;

        let feedback = controller.validate_scan(KNOWN_BARCODE, 2.0).await.unwrap();
        assert_eq!(feedback, ScanFeedback::Applied { matched: true });
        // qty 2 at conversion rate 2 lands 4 units in box 1 of line SL1.
        let line = &controller.state().lines()[0];
        assert_eq!(line.get_box(1), 4.0);
        assert_eq!(line.qty_verified, 4.0);
        assert_eq!(line.qty_pending, 6.0);
        assert!(controller.last_error().is_none());
    }

    #[tokio::test]
    async fn unknown_barcode_surfaces_error_without_mutation() {
        let (config, _) = mock_kernel().await;
        let mut controller = open_controller(&config).await;

        let feedback = controller.validate_scan("0000000", 1.0).await.unwrap();
        assert_eq!(feedback, ScanFeedback::Ignored);
        assert_eq!(controller.last_error(), Some("Wrong barcode"));
        for line in controller.state().lines() {
            assert_eq!(line.qty_verified, 0.0);
        }
    }

    #[tokio::test]
    async fn confirm_gates_then_processes_and_parses_link() {
        let (config, recorded) = mock_kernel().await;
        let mut controller = open_controller(&config).await;

        // Pending lines: the gate blocks and opens the dialog.
        controller.confirm().await.unwrap();
        assert!(controller.confirm_dialog().open);
        assert!(!controller.has_result());
        controller.acknowledge_dialog();
        recorded.take();

        // Reconcile both lines: SL1 via scans, SL2 via a manual box edit.
        controller.validate_scan(KNOWN_BARCODE, 5.0).await.unwrap();
        controller.add_box();
        controller.edit_box_qty(1, 2, 4.0);
        assert!(!controller.state().has_pending());

        controller.confirm().await.unwrap();
        assert!(!controller.confirm_dialog().open);
        let result = controller.take_result().unwrap();
        assert_eq!(result.title, "Pack generated");
        assert_eq!(result.link_tab_id.as_deref(), Some("TAB9"));
        assert_eq!(result.link_record_id.as_deref(), Some("REC9"));
        assert!(result.text.starts_with("Shipment completed."));
        assert!(!result.text.contains("Goods Shipment"));

        // The finalization call carried the full state.
        let requests = recorded.take();
        let (action, body, _) = requests
            .iter()
            .find(|(a, _, _)| a == SHIP_ACTION)
            .expect("process call reached the kernel");
        assert_eq!(action, SHIP_ACTION);
        assert_eq!(body["_params"]["recordId"], "SHIP-7");
        assert_eq!(body["_params"]["boxCount"], 2);
        assert_eq!(body["_params"]["lines"][0]["qtyPending"], 0.0);
    }

    #[tokio::test]
    async fn capability_surface_is_limited_to_bound_calls() {
        // The scan context exposes only the action caller; this test pins
        // the shape so a datasource capability cannot sneak in unnoticed.
        let (config, _) = mock_kernel().await;
        let client = Arc::new(KernelClient::new(&config, "test-token", PROCESS_ID));
        let ctx = ScanContext {
            barcode: KNOWN_BARCODE.to_string(),
            qty: 1.0,
            current_box: 1,
            lines: Vec::new(),
            call_action: ActionCaller::new(client),
        };
        let outcome = BarcodeScan.on_scan(&ctx).await.unwrap();
        assert!(matches!(outcome, ScanOutcome::Match(_)));
    }

    #[tokio::test]
    async fn kernel_failure_during_scan_is_a_dismissible_error() {
        let (config, _) = mock_kernel().await;
        let mut controller = open_controller(&config).await;

        struct BrokenAction;

        #[async_trait]
        impl ScanPlugin for BrokenAction {
            async fn on_scan(&self, ctx: &ScanContext) -> Result<ScanOutcome> {
                // Unknown action handler: the mock kernel answers 500.
                ctx.call_action
                    .call_action("no.such.Action", json!({}), &CallOptions::default())
                    .await?;
                unreachable!("the kernel call fails first")
            }
        }

        // Swap in a registry whose scan plugin hits a failing endpoint.
        let mut broken = PluginRegistry::new();
        broken.register_load(PROCESS_ID, Arc::new(PackingLoad));
        broken.register_scan(PROCESS_ID, Arc::new(BrokenAction));
        let loader = PluginLoader::new(Arc::new(broken), &config);
        let kernel = Arc::new(KernelClient::new(&config, "test-token", PROCESS_ID));
        let selection = SelectionContext::new(vec![json!({ "id": "SHIP-7" })]);
        controller = ProcessController::open(&loader, PROCESS_ID, kernel, &json!({}), &selection)
            .await
            .unwrap()
            .unwrap();

        controller.validate_scan(KNOWN_BARCODE, 1.0).await.unwrap();
        assert_eq!(controller.last_error(), Some("Validation failed"));
        for line in controller.state().lines() {
            assert_eq!(line.qty_verified, 0.0);
        }
    }
}
