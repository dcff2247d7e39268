//! Concurrent requests against a file-backed database with a real pool.

use std::time::Duration;

use chrono::{NaiveDate, NaiveTime, Utc};
use mise_core::{
    ErrorKind, InventoryUnit, MenuCategory, MenuItem, Money, NewEvent, NewIngredient,
    NewMenuItem, NewOrder, NewOrderLine, NewRecipe, NewReservation, Quantity, Restaurant,
};
use mise_db::{Database, DbConfig, DbError, RetryPolicy};
use tempfile::TempDir;

async fn file_db() -> (TempDir, Database) {
    let dir = tempfile::tempdir().unwrap();
    let config = DbConfig::new(dir.path().join("mise.db"))
        .max_connections(8)
        .busy_timeout(Duration::from_secs(10))
        .retry(RetryPolicy::new(
            10,
            Duration::from_millis(10),
            Duration::from_millis(200),
        ));
    let db = Database::new(config).await.unwrap();
    (dir, db)
}

async fn restaurant(db: &Database) -> Restaurant {
    db.catalog()
        .create_restaurant("Chez Mise", "1 Main St", None)
        .await
        .unwrap()
}

/// A burger using 0.2 kg of beef, with 10 kg in stock.
async fn burger_and_beef(db: &Database, restaurant_id: &str) -> (MenuItem, String) {
    let burger = db
        .catalog()
        .create_menu_item(&NewMenuItem {
            restaurant_id: restaurant_id.to_string(),
            name: "Burger".to_string(),
            description: None,
            category: MenuCategory::MainCourse,
            price: Money::parse("10.00").unwrap(),
            is_available: true,
        })
        .await
        .unwrap();
    let beef = db
        .inventory()
        .create_ingredient(&NewIngredient {
            restaurant_id: restaurant_id.to_string(),
            name: "Beef".to_string(),
            unit: InventoryUnit::Kg,
            quantity: Quantity::from_units(10),
            alert_threshold: Quantity::from_units(1),
        })
        .await
        .unwrap();
    db.recipes()
        .add(&NewRecipe {
            menu_item_id: burger.id.clone(),
            ingredient_id: beef.id.clone(),
            quantity_used: Quantity::parse("0.2").unwrap(),
            unit: "kg".to_string(),
        })
        .await
        .unwrap();
    (burger, beef.id)
}

fn one_burger(restaurant_id: &str, burger: &MenuItem) -> NewOrder {
    NewOrder {
        restaurant_id: restaurant_id.to_string(),
        items: vec![NewOrderLine {
            menu_item_id: burger.id.clone(),
            quantity: 1,
        }],
        ..Default::default()
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_registrations_never_exceed_capacity() {
    let (_dir, db) = file_db().await;
    let event = db
        .registrations()
        .create_event(&NewEvent {
            title: "Wine tasting".to_string(),
            description: String::new(),
            starts_at: Utc::now(),
            location: "Cellar".to_string(),
            capacity: 3,
        })
        .await
        .unwrap();

    let mut handles = Vec::new();
    for n in 0..12 {
        let db = db.clone();
        let event_id = event.id.clone();
        handles.push(tokio::spawn(async move {
            db.registrations().register(&event_id, &format!("user-{n}")).await
        }));
    }

    let mut accepted = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => accepted += 1,
            Err(err) => assert_eq!(err.kind(), ErrorKind::CapacityExceeded),
        }
    }

    assert_eq!(accepted, 3);
    assert_eq!(db.registrations().active_count(&event.id).await.unwrap(), 3);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_overlapping_reservations_admit_one() {
    let (_dir, db) = file_db().await;
    let r = restaurant(&db).await;
    let table = db.catalog().create_table(&r.id, 7, 4).await.unwrap();
    let date = NaiveDate::from_ymd_opt(2026, 10, 19).unwrap();

    let mut handles = Vec::new();
    for n in 0..8u32 {
        let db = db.clone();
        let request = NewReservation {
            restaurant_id: r.id.clone(),
            table_id: table.id.clone(),
            customer_name: format!("Guest {n}"),
            customer_phone: "555-0100".to_string(),
            special_requests: None,
            reservation_date: date,
            // 18:00-19:00, 18:05-19:05, ... all pairwise overlapping
            start_time: NaiveTime::from_hms_opt(18, n * 5, 0).unwrap(),
            end_time: NaiveTime::from_hms_opt(19, n * 5, 0).unwrap(),
        };
        handles.push(tokio::spawn(async move {
            db.reservations().create(&request).await
        }));
    }

    let mut confirmed = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => confirmed += 1,
            Err(err) => assert_eq!(err.kind(), ErrorKind::SlotConflict),
        }
    }

    assert_eq!(confirmed, 1);
    let day = db.reservations().list_for_table(&table.id, date).await.unwrap();
    assert_eq!(day.len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_payments_lose_no_deduction() {
    let (_dir, db) = file_db().await;
    let r = restaurant(&db).await;
    let (burger, beef_id) = burger_and_beef(&db, &r.id).await;

    let mut order_ids = Vec::new();
    for _ in 0..10 {
        let order = db.orders().create_order(&one_burger(&r.id, &burger)).await.unwrap();
        order_ids.push(order.id);
    }

    let handles: Vec<_> = order_ids
        .into_iter()
        .map(|id| {
            let db = db.clone();
            tokio::spawn(async move { db.orders().pay_order(&id).await })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let beef = db.inventory().get(&beef_id).await.unwrap().unwrap();
    assert_eq!(beef.quantity(), Quantity::from_units(8));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn racing_pays_of_one_order_deduct_once() {
    let (_dir, db) = file_db().await;
    let r = restaurant(&db).await;
    let (burger, beef_id) = burger_and_beef(&db, &r.id).await;
    let order = db.orders().create_order(&one_burger(&r.id, &burger)).await.unwrap();

    let handles: Vec<_> = (0..6)
        .map(|_| {
            let db = db.clone();
            let id = order.id.clone();
            tokio::spawn(async move { db.orders().pay_order(&id).await })
        })
        .collect();

    let mut first_payments = 0;
    for handle in handles {
        let receipt = handle.await.unwrap().unwrap();
        if !receipt.already_paid {
            first_payments += 1;
        }
    }

    assert_eq!(first_payments, 1);
    let beef = db.inventory().get(&beef_id).await.unwrap().unwrap();
    assert_eq!(beef.quantity(), Quantity::parse("9.8").unwrap());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_line_adds_keep_total_exact() {
    let (_dir, db) = file_db().await;
    let r = restaurant(&db).await;
    let (burger, _) = burger_and_beef(&db, &r.id).await;
    let order = db.orders().create_order(&one_burger(&r.id, &burger)).await.unwrap();

    let handles: Vec<_> = (0..20)
        .map(|_| {
            let db = db.clone();
            let order_id = order.id.clone();
            let burger_id = burger.id.clone();
            tokio::spawn(async move { db.orders().add_item(&order_id, &burger_id, 1).await })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let items = db.orders().get_items(&order.id).await.unwrap();
    assert_eq!(items.len(), 21);
    let order = db.orders().get(&order.id).await.unwrap().unwrap();
    assert_eq!(order.total(), Money::parse("210.00").unwrap());
    assert_eq!(mise_core::order_total(&items), order.total());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_cancels_and_registrations_respect_capacity() {
    let (_dir, db) = file_db().await;
    let event = db
        .registrations()
        .create_event(&NewEvent {
            title: "Cheese course".to_string(),
            description: String::new(),
            starts_at: Utc::now(),
            location: "Bar".to_string(),
            capacity: 2,
        })
        .await
        .unwrap();
    let ada = db.registrations().register(&event.id, "ada").await.unwrap();
    let grace = db.registrations().register(&event.id, "grace").await.unwrap();

    let mut handles = Vec::new();
    for id in [ada.id.clone(), grace.id.clone()] {
        let db = db.clone();
        handles.push(tokio::spawn(async move {
            db.registrations().cancel(&id).await.map(|_| ())
        }));
    }
    for n in 0..6 {
        let db = db.clone();
        let event_id = event.id.clone();
        handles.push(tokio::spawn(async move {
            db.registrations()
                .register(&event_id, &format!("walk-in-{n}"))
                .await
                .map(|_| ())
        }));
    }
    for handle in handles {
        if let Err(err) = handle.await.unwrap() {
            assert_eq!(err.kind(), ErrorKind::CapacityExceeded);
        }
    }

    let active = db.registrations().active_count(&event.id).await.unwrap();
    assert!(active <= 2);
    let cancelled = db.registrations().get_registration(&ada.id).await.unwrap().unwrap();
    assert!(!cancelled.status.is_active());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn stock_writes_behind_a_held_lock_give_up_with_conflict() {
    let dir = tempfile::tempdir().unwrap();
    let config = DbConfig::new(dir.path().join("mise.db"))
        .max_connections(4)
        .busy_timeout(Duration::from_millis(50))
        .retry(RetryPolicy::new(
            3,
            Duration::from_millis(1),
            Duration::from_millis(5),
        ));
    let db = Database::new(config).await.unwrap();
    let r = restaurant(&db).await;
    let (_, beef_id) = burger_and_beef(&db, &r.id).await;

    let mut holder = db.pool().begin().await.unwrap();
    sqlx::query("UPDATE restaurants SET name = name WHERE id = ?1")
        .bind(&r.id)
        .execute(&mut *holder)
        .await
        .unwrap();

    let adjusted = db.inventory().adjust(&beef_id, Quantity::from_units(1)).await;
    assert!(matches!(
        adjusted,
        Err(DbError::ConcurrencyConflict { attempts: 3, .. })
    ));
    let deducted = db.inventory().deduct(&beef_id, Quantity::from_units(1)).await;
    assert_eq!(deducted.unwrap_err().kind(), ErrorKind::ConcurrencyConflict);

    holder.rollback().await.unwrap();

    let restocked = db
        .inventory()
        .adjust(&beef_id, Quantity::from_units(1))
        .await
        .unwrap();
    assert_eq!(restocked.quantity(), Quantity::from_units(11));
}
