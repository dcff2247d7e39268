//! # Demo Data Seeder
//!
//! Populates a database with one demo restaurant: tables, a small menu with
//! recipes, stocked ingredients, a few paid orders and a tasting event.
//!
//! ## Usage
//! ```bash
//! # Seed ./mise_dev.db with the default settings
//! cargo run -p mise-db --bin seed
//!
//! # Use a config file and another database
//! cargo run -p mise-db --bin seed -- --config mise.toml --db ./data/mise.db
//! ```
//!
//! Seeding is skipped when the database already has a restaurant.

use chrono::{Duration, Utc};
use std::env;
use std::path::PathBuf;

use mise_core::{
    InventoryUnit, MenuCategory, Money, NewEvent, NewIngredient, NewMenuItem, NewOrder,
    NewOrderLine, NewRecipe, NewReservation, Quantity,
};
use mise_db::{Database, EngineConfig};

/// (name, category, price)
const MENU: &[(&str, MenuCategory, &str)] = &[
    ("Burrata", MenuCategory::Appetizer, "9.50"),
    ("Steak Frites", MenuCategory::MainCourse, "24.00"),
    ("Mushroom Risotto", MenuCategory::MainCourse, "18.50"),
    ("Tarte Tatin", MenuCategory::Dessert, "8.00"),
    ("House Red", MenuCategory::Drink, "7.00"),
];

/// (name, unit, on hand, alert threshold)
const PANTRY: &[(&str, InventoryUnit, &str, &str)] = &[
    ("Burrata", InventoryUnit::Unit, "24", "6"),
    ("Beef Sirloin", InventoryUnit::Kg, "12", "3"),
    ("Potatoes", InventoryUnit::Kg, "25", "5"),
    ("Arborio Rice", InventoryUnit::Kg, "8", "2"),
    ("Mushrooms", InventoryUnit::Kg, "4", "1.5"),
    ("Apples", InventoryUnit::Kg, "6", "2"),
    ("Red Wine", InventoryUnit::L, "18", "4"),
];

/// (menu item, ingredient, per portion)
const RECIPES: &[(&str, &str, &str)] = &[
    ("Burrata", "Burrata", "1"),
    ("Steak Frites", "Beef Sirloin", "0.25"),
    ("Steak Frites", "Potatoes", "0.3"),
    ("Mushroom Risotto", "Arborio Rice", "0.09"),
    ("Mushroom Risotto", "Mushrooms", "0.12"),
    ("Tarte Tatin", "Apples", "0.15"),
    ("House Red", "Red Wine", "0.15"),
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();

    let mut config_path: Option<PathBuf> = None;
    let mut db_path: Option<String> = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--config" | "-c" => {
                if i + 1 < args.len() {
                    config_path = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                }
            }
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = Some(args[i + 1].clone());
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Mise Demo Seeder");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -c, --config <PATH>  TOML config file");
                println!("  -d, --db <PATH>      Database file path (default: ./mise_dev.db)");
                println!("  -h, --help           Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    let mut config = EngineConfig::load(config_path.as_deref())?;
    if let Some(path) = db_path {
        config.database.path = PathBuf::from(path);
    } else if config_path.is_none() && env::var("MISE_DATABASE_PATH").is_err() {
        config.database.path = PathBuf::from("./mise_dev.db");
    }
    config.logging.init();

    println!("Mise Demo Seeder");
    println!("================");
    println!("Database: {}", config.database.path.display());
    println!();

    let db = Database::new(config.db_config()).await?;

    if !db.catalog().list_restaurants().await?.is_empty() {
        println!("Database already has a restaurant, skipping seed.");
        println!("Delete the database file to regenerate.");
        return Ok(());
    }

    let restaurant = db
        .catalog()
        .create_restaurant("Chez Mise", "12 Rue des Cuisiniers", Some("+33 1 23 45 67"))
        .await?;

    let mut tables = Vec::new();
    for (number, seats) in [(1, 2), (2, 2), (3, 4), (4, 4), (5, 6)] {
        tables.push(db.catalog().create_table(&restaurant.id, number, seats).await?);
    }
    println!("Created {} tables", tables.len());

    let mut menu = Vec::new();
    for (name, category, price) in MENU {
        let item = db
            .catalog()
            .create_menu_item(&NewMenuItem {
                restaurant_id: restaurant.id.clone(),
                name: name.to_string(),
                description: None,
                category: *category,
                price: Money::parse(price)?,
                is_available: true,
            })
            .await?;
        menu.push(item);
    }

    let mut pantry = Vec::new();
    for (name, unit, on_hand, threshold) in PANTRY {
        let ingredient = db
            .inventory()
            .create_ingredient(&NewIngredient {
                restaurant_id: restaurant.id.clone(),
                name: name.to_string(),
                unit: *unit,
                quantity: Quantity::parse(on_hand)?,
                alert_threshold: Quantity::parse(threshold)?,
            })
            .await?;
        pantry.push(ingredient);
    }

    for (dish, ingredient, per_portion) in RECIPES {
        let (Some(dish), Some(ingredient)) = (
            menu.iter().find(|m| m.name == *dish),
            pantry.iter().find(|p| p.name == *ingredient),
        ) else {
            continue;
        };
        db.recipes()
            .add(&NewRecipe {
                menu_item_id: dish.id.clone(),
                ingredient_id: ingredient.id.clone(),
                quantity_used: Quantity::parse(per_portion)?,
                unit: ingredient.unit.to_string(),
            })
            .await?;
    }
    println!("Created {} menu items, {} ingredients", menu.len(), pantry.len());

    let today = Utc::now().date_naive();
    let reservation = db
        .reservations()
        .create(&NewReservation {
            restaurant_id: restaurant.id.clone(),
            table_id: tables[2].id.clone(),
            customer_name: "Ada Lovelace".to_string(),
            customer_phone: "020 7946 0018".to_string(),
            special_requests: Some("Window seat".to_string()),
            reservation_date: today,
            start_time: chrono::NaiveTime::from_hms_opt(19, 0, 0).ok_or("invalid time")?,
            end_time: chrono::NaiveTime::from_hms_opt(21, 0, 0).ok_or("invalid time")?,
        })
        .await?;
    println!("Reserved table {} for {}", tables[2].table_number, reservation.customer_name);

    for (i, table) in tables.iter().take(3).enumerate() {
        let lines = menu
            .iter()
            .skip(i)
            .take(3)
            .map(|item| NewOrderLine {
                menu_item_id: item.id.clone(),
                quantity: (i + 1) as i64,
            })
            .collect();

        let order = db
            .orders()
            .create_order(&NewOrder {
                restaurant_id: restaurant.id.clone(),
                table_id: Some(table.id.clone()),
                items: lines,
                ..Default::default()
            })
            .await?;
        let receipt = db.orders().pay_order(&order.id).await?;
        println!(
            "Paid order {} at table {}: {}",
            receipt.order.id, table.table_number, receipt.order.total()
        );
    }

    let event = db
        .registrations()
        .create_event(&NewEvent {
            title: "Natural Wine Evening".to_string(),
            description: "Six producers, six wines".to_string(),
            starts_at: Utc::now() + Duration::days(14),
            location: "The cellar".to_string(),
            capacity: 20,
        })
        .await?;
    for user in ["guest-ada", "guest-grace"] {
        db.registrations().register(&event.id, user).await?;
    }

    println!();
    let sales = db.reports().daily_sales(Some(&restaurant.id), today).await?;
    println!("Sales today: {} over {} orders", sales.total, sales.order_count);

    let popular = db
        .reports()
        .popular_items_recent(Some(&restaurant.id), &config.reports)
        .await?;
    for item in popular {
        println!("  {:<20} x{}", item.name, item.total_quantity);
    }

    let low = db.inventory().list_low_stock(Some(&restaurant.id)).await?;
    if !low.is_empty() {
        println!("Low stock: {}", low.len());
    }

    println!();
    println!("Seed complete!");
    Ok(())
}
