use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use rust_decimal::Decimal;
use uuid::Uuid;

use torque_core::repository::{ItemRepository, OrderRepository, Page};
use torque_core::catalog::NewItem;
use torque_core::report::NewTechnicalReport;
use torque_core::{OrderStatus, StoreError};
use torque_order::{CreateOrderInput, ImagePayload, OrderError, OrderLineRequest, OrderService};
use torque_storage::{ImageStore, SimulatedImageStore, StorageError, StorageResult};
use torque_store::MemoryStore;

struct FailingImageStore;

#[async_trait]
impl ImageStore for FailingImageStore {
    async fn upload_image(&self, _: &str, _: &str, _: &str) -> StorageResult<String> {
        Err(StorageError::Upload("bucket unreachable".into()))
    }

    async fn delete_image(&self, _: &str) -> StorageResult<()> {
        Ok(())
    }

    async fn presigned_url(&self, _: &str, _: Duration) -> StorageResult<String> {
        Err(StorageError::Upload("bucket unreachable".into()))
    }
}

fn service_with(store: &MemoryStore, images: Arc<dyn ImageStore>) -> OrderService {
    OrderService::new(
        Arc::new(store.clone()),
        Arc::new(store.clone()),
        images,
    )
}

fn service(store: &MemoryStore) -> OrderService {
    service_with(
        store,
        Arc::new(SimulatedImageStore::new("maintenance-images", "us-east-1")),
    )
}

async fn seed_item(store: &MemoryStore, sku: &str, price: Decimal, stock: i32) -> Uuid {
    store
        .create_item(NewItem {
            name: format!("Part {}", sku),
            sku: sku.to_string(),
            price,
            stock,
            category_id: None,
        })
        .await
        .unwrap()
        .id
}

fn order_input(request_id: &str, lines: Vec<OrderLineRequest>) -> CreateOrderInput {
    CreateOrderInput {
        request_id: request_id.to_string(),
        report: NewTechnicalReport {
            title: "Hydraulic pump failure".to_string(),
            description: "Pump seal worn, pressure dropping under load".to_string(),
            diagnosis: Some("Seal kit replacement required".to_string()),
            recommendations: None,
        },
        created_by: None,
        image: None,
        lines,
    }
}

#[tokio::test]
async fn replay_returns_same_order_and_decrements_stock_once() {
    let store = MemoryStore::new();
    let svc = service(&store);
    let item_id = seed_item(&store, "PMP-100", Decimal::new(4999, 2), 10).await;

    let input = order_input(
        "REQ-1",
        vec![OrderLineRequest {
            item_id,
            quantity: 3,
        }],
    );

    let (first, created_first) = svc.create_order(input.clone()).await.unwrap();
    let (second, created_second) = svc.create_order(input).await.unwrap();

    assert!(created_first);
    assert!(!created_second);
    assert_eq!(first.order.id, second.order.id);

    let stock = store.get_item(item_id).await.unwrap().unwrap().item.stock;
    assert_eq!(stock, 7);
}

#[tokio::test]
async fn order_references_the_report_created_with_it() {
    let store = MemoryStore::new();
    let svc = service(&store);
    let item_id = seed_item(&store, "PMP-100", Decimal::new(4999, 2), 10).await;

    let (detail, _) = svc
        .create_order(order_input(
            "REQ-REPORT",
            vec![OrderLineRequest {
                item_id,
                quantity: 1,
            }],
        ))
        .await
        .unwrap();

    assert_eq!(detail.order.technical_report_id, detail.technical_report.id);
    assert_eq!(detail.technical_report.title, "Hydraulic pump failure");

    let reread = svc.get_order(detail.order.id).await.unwrap();
    assert_eq!(reread.order.technical_report_id, reread.technical_report.id);
}

#[tokio::test]
async fn unknown_item_aborts_without_side_effects() {
    let store = MemoryStore::new();
    let svc = service(&store);
    let known = seed_item(&store, "PMP-100", Decimal::new(4999, 2), 10).await;

    let input = order_input(
        "REQ-2",
        vec![
            OrderLineRequest {
                item_id: known,
                quantity: 2,
            },
            OrderLineRequest {
                item_id: Uuid::new_v4(),
                quantity: 1,
            },
        ],
    );

    let err = svc.create_order(input).await.unwrap_err();
    assert!(matches!(err, OrderError::ItemNotFound(_)));

    // Nothing was written and the known item's stock is untouched.
    assert!(svc.get_order_by_request_id("REQ-2").await.is_err());
    let stock = store.get_item(known).await.unwrap().unwrap().item.stock;
    assert_eq!(stock, 10);
}

#[tokio::test]
async fn unit_price_is_a_snapshot() {
    let store = MemoryStore::new();
    let svc = service(&store);
    let item_id = seed_item(&store, "FLT-200", Decimal::new(1250, 2), 10).await;

    let (detail, _) = svc
        .create_order(order_input(
            "REQ-3",
            vec![OrderLineRequest {
                item_id,
                quantity: 2,
            }],
        ))
        .await
        .unwrap();

    // Raise the catalog price afterwards; the order keeps the old one.
    store
        .update_item(
            item_id,
            torque_core::catalog::ItemPatch {
                price: Some(Decimal::new(9999, 2)),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let reread = svc.get_order(detail.order.id).await.unwrap();
    assert_eq!(reread.lines[0].unit_price, Decimal::new(1250, 2));
    assert_eq!(reread.total_amount(), Decimal::new(2500, 2));
}

#[tokio::test]
async fn concurrent_requests_with_same_id_create_one_order() {
    let store = MemoryStore::new();
    let svc = service(&store);
    let item_id = seed_item(&store, "BRG-300", Decimal::new(750, 2), 10).await;

    let input = order_input(
        "REQ-4",
        vec![OrderLineRequest {
            item_id,
            quantity: 2,
        }],
    );

    let (a, b) = tokio::join!(svc.create_order(input.clone()), svc.create_order(input));
    let (a, created_a) = a.unwrap();
    let (b, created_b) = b.unwrap();

    assert_eq!(a.order.id, b.order.id);
    // Exactly one of the two performed the write.
    assert!(created_a ^ created_b);

    let stock = store.get_item(item_id).await.unwrap().unwrap().item.stock;
    assert_eq!(stock, 8);
}

#[tokio::test]
async fn insufficient_stock_is_rejected_with_availability() {
    let store = MemoryStore::new();
    let svc = service(&store);
    let item_id = seed_item(&store, "FIL-001", Decimal::new(899, 2), 5).await;

    let (_, created) = svc
        .create_order(order_input(
            "REQ-5",
            vec![OrderLineRequest {
                item_id,
                quantity: 3,
            }],
        ))
        .await
        .unwrap();
    assert!(created);

    let err = svc
        .create_order(order_input(
            "REQ-6",
            vec![OrderLineRequest {
                item_id,
                quantity: 3,
            }],
        ))
        .await
        .unwrap_err();

    match err {
        OrderError::InsufficientStock {
            available,
            requested,
            ..
        } => {
            assert_eq!(available, 2);
            assert_eq!(requested, 3);
        }
        other => panic!("expected InsufficientStock, got {:?}", other),
    }
}

#[tokio::test]
async fn failed_image_upload_aborts_the_order() {
    let store = MemoryStore::new();
    let svc = service_with(&store, Arc::new(FailingImageStore));
    let item_id = seed_item(&store, "PMP-100", Decimal::new(4999, 2), 10).await;

    let mut input = order_input(
        "REQ-7",
        vec![OrderLineRequest {
            item_id,
            quantity: 1,
        }],
    );
    input.image = Some(ImagePayload {
        data_base64: STANDARD.encode(b"photo"),
        content_type: "image/jpeg".to_string(),
    });

    let err = svc.create_order(input).await.unwrap_err();
    assert!(matches!(err, OrderError::ImageUpload(_)));

    assert!(svc.get_order_by_request_id("REQ-7").await.is_err());
    let stock = store.get_item(item_id).await.unwrap().unwrap().item.stock;
    assert_eq!(stock, 10);
}

#[tokio::test]
async fn successful_image_upload_lands_on_the_order() {
    let store = MemoryStore::new();
    let svc = service(&store);
    let item_id = seed_item(&store, "PMP-100", Decimal::new(4999, 2), 10).await;

    let mut input = order_input(
        "REQ-8",
        vec![OrderLineRequest {
            item_id,
            quantity: 1,
        }],
    );
    input.image = Some(ImagePayload {
        data_base64: STANDARD.encode(b"photo"),
        content_type: "image/png".to_string(),
    });

    let (detail, _) = svc.create_order(input).await.unwrap();
    let url = detail.order.image_url.unwrap();
    assert!(url.contains("maintenance-images/REQ-8/"));
    assert!(url.ends_with(".png"));
}

#[tokio::test]
async fn cancellation_restores_stock() {
    let store = MemoryStore::new();
    let svc = service(&store);
    let item_id = seed_item(&store, "BRG-300", Decimal::new(750, 2), 10).await;

    let (detail, _) = svc
        .create_order(order_input(
            "REQ-9",
            vec![OrderLineRequest {
                item_id,
                quantity: 4,
            }],
        ))
        .await
        .unwrap();
    assert_eq!(
        store.get_item(item_id).await.unwrap().unwrap().item.stock,
        6
    );

    let cancelled = svc
        .update_status(detail.order.id, OrderStatus::Cancelled)
        .await
        .unwrap();
    assert_eq!(cancelled.order.status, OrderStatus::Cancelled);
    assert_eq!(
        store.get_item(item_id).await.unwrap().unwrap().item.stock,
        10
    );
}

#[tokio::test]
async fn repeated_cancellation_restores_stock_once() {
    let store = MemoryStore::new();
    let svc = service(&store);
    let item_id = seed_item(&store, "BRG-300", Decimal::new(750, 2), 10).await;

    let (detail, _) = svc
        .create_order(order_input(
            "REQ-DC",
            vec![OrderLineRequest {
                item_id,
                quantity: 4,
            }],
        ))
        .await
        .unwrap();

    // Drive the store directly, as two racing requests that both passed
    // the transition check would.
    store.cancel_order(detail.order.id).await.unwrap();
    let err = store.cancel_order(detail.order.id).await.unwrap_err();
    assert!(matches!(err, StoreError::InvalidState(_)));

    let stock = store.get_item(item_id).await.unwrap().unwrap().item.stock;
    assert_eq!(stock, 10);
}

#[tokio::test]
async fn lifecycle_transitions_are_enforced() {
    let store = MemoryStore::new();
    let svc = service(&store);
    let item_id = seed_item(&store, "FLT-200", Decimal::new(1250, 2), 10).await;

    let (detail, _) = svc
        .create_order(order_input(
            "REQ-10",
            vec![OrderLineRequest {
                item_id,
                quantity: 1,
            }],
        ))
        .await
        .unwrap();
    let id = detail.order.id;

    // pending cannot jump straight to completed
    let err = svc.update_status(id, OrderStatus::Completed).await.unwrap_err();
    assert!(matches!(err, OrderError::InvalidTransition { .. }));

    svc.update_status(id, OrderStatus::InProgress).await.unwrap();
    let done = svc.update_status(id, OrderStatus::Completed).await.unwrap();
    assert_eq!(done.order.status, OrderStatus::Completed);

    // completed is terminal
    let err = svc.update_status(id, OrderStatus::Cancelled).await.unwrap_err();
    assert!(matches!(err, OrderError::InvalidTransition { .. }));
}

#[tokio::test]
async fn rejects_empty_and_invalid_lines() {
    let store = MemoryStore::new();
    let svc = service(&store);
    let item_id = seed_item(&store, "PMP-100", Decimal::new(4999, 2), 10).await;

    let err = svc
        .create_order(order_input("REQ-11", vec![]))
        .await
        .unwrap_err();
    assert!(matches!(err, OrderError::Validation(_)));

    let err = svc
        .create_order(order_input(
            "REQ-12",
            vec![OrderLineRequest {
                item_id,
                quantity: 0,
            }],
        ))
        .await
        .unwrap_err();
    assert!(matches!(err, OrderError::Validation(_)));
}

#[tokio::test]
async fn listing_filters_by_status() {
    let store = MemoryStore::new();
    let svc = service(&store);
    let item_id = seed_item(&store, "PMP-100", Decimal::new(4999, 2), 50).await;

    for n in 0..3 {
        svc.create_order(order_input(
            &format!("REQ-L{}", n),
            vec![OrderLineRequest {
                item_id,
                quantity: 1,
            }],
        ))
        .await
        .unwrap();
    }
    let first = svc.get_order_by_request_id("REQ-L0").await.unwrap();
    svc.update_status(first.order.id, OrderStatus::InProgress)
        .await
        .unwrap();

    let pending = svc
        .list_orders(Some(OrderStatus::Pending), Page::default())
        .await
        .unwrap();
    assert_eq!(pending.len(), 2);

    let all = svc.list_orders(None, Page::default()).await.unwrap();
    assert_eq!(all.len(), 3);
}
