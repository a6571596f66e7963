//! # Seed Data Generator
//!
//! Populates a database with a demo South Indian tiffin menu, stock and
//! recipes, plus an admin account, for development.
//!
//! ## Usage
//! ```bash
//! cargo run -p tiffin-db --bin seed
//!
//! # Specify database path and admin password
//! cargo run -p tiffin-db --bin seed -- --db ./data/tiffin.db --password changeme
//! ```

use std::env;

use tiffin_core::{Quantity, Unit};
use tiffin_db::repository::{NewIngredient, NewMenuItem, RecipeInput};
use tiffin_db::{Database, DbConfig};

/// (category, [(name, price in paise, vegetarian)])
const MENU: &[(&str, &[(&str, i64, bool)])] = &[
    (
        "Tiffin",
        &[
            ("Idli (2 pcs)", 4000, true),
            ("Medu Vada", 4500, true),
            ("Masala Dosa", 9000, true),
            ("Rava Dosa", 9500, true),
            ("Pongal", 7000, true),
            ("Egg Dosa", 10000, false),
        ],
    ),
    (
        "Meals",
        &[
            ("Veg Thali", 18000, true),
            ("Curd Rice", 8000, true),
            ("Chicken Biryani", 22000, false),
        ],
    ),
    (
        "Beverages",
        &[
            ("Filter Coffee", 3000, true),
            ("Masala Chai", 2500, true),
            ("Sweet Lassi", 6000, true),
        ],
    ),
];

/// (name, unit, initial, minimum, full) in whole units.
const STOCK: &[(&str, Unit, i64, i64, i64)] = &[
    ("Dosa Batter", Unit::Kilogram, 20, 4, 25),
    ("Rice", Unit::Kilogram, 40, 10, 50),
    ("Potato Masala", Unit::Kilogram, 6, 1, 8),
    ("Curd", Unit::Kilogram, 10, 2, 12),
    ("Milk", Unit::Litre, 15, 3, 20),
    ("Coffee Powder", Unit::Gram, 900, 200, 1000),
    ("Eggs", Unit::Piece, 60, 12, 90),
];

/// (menu item, [(ingredient, amount, unit)])
const RECIPES: &[(&str, &[(&str, &str, Unit)])] = &[
    ("Idli (2 pcs)", &[("Dosa Batter", "120", Unit::Gram)]),
    (
        "Masala Dosa",
        &[
            ("Dosa Batter", "150", Unit::Gram),
            ("Potato Masala", "100", Unit::Gram),
        ],
    ),
    (
        "Egg Dosa",
        &[("Dosa Batter", "150", Unit::Gram), ("Eggs", "1", Unit::Piece)],
    ),
    (
        "Curd Rice",
        &[("Rice", "200", Unit::Gram), ("Curd", "150", Unit::Gram)],
    ),
    (
        "Filter Coffee",
        &[("Milk", "120", Unit::Millilitre), ("Coffee Powder", "10", Unit::Gram)],
    ),
    ("Masala Chai", &[("Milk", "100", Unit::Millilitre)]),
    ("Sweet Lassi", &[("Curd", "200", Unit::Gram)]),
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();

    let mut db_path = String::from("./tiffin_dev.db");
    let mut password = String::from("admin123");

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--password" | "-p" => {
                if i + 1 < args.len() {
                    password = args[i + 1].clone();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Tiffin POS Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -d, --db <PATH>          Database file path (default: ./tiffin_dev.db)");
                println!("  -p, --password <PASS>    Password for the 'admin' user (default: admin123)");
                println!("  -h, --help               Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    println!("🌱 Tiffin POS Seed Data Generator");
    println!("=================================");
    println!("Database: {}", db_path);
    println!();

    let db = Database::new(DbConfig::new(&db_path)).await?;
    println!("✓ Connected to database");
    println!("✓ Migrations applied");

    if !db.menu().list_categories().await?.is_empty() {
        println!("⚠ Database already has a menu");
        println!("  Skipping seed to avoid duplicates.");
        println!("  Delete the database file to regenerate.");
        return Ok(());
    }

    match db.users().ensure_admin("admin", &password).await? {
        Some(_) => println!("✓ Created user 'admin'"),
        None => println!("  Users already exist, no admin created"),
    }

    let mut items = 0;
    for (category, dishes) in MENU {
        let cat = db.menu().create_category(category).await?;
        for (name, price_paise, is_vegetarian) in dishes.iter() {
            db.menu()
                .create_item(NewMenuItem {
                    category_id: cat.id.clone(),
                    name: name.to_string(),
                    description: None,
                    price_paise: *price_paise,
                    is_vegetarian: *is_vegetarian,
                })
                .await?;
            items += 1;
        }
    }
    println!("✓ {} categories, {} menu items", MENU.len(), items);

    for (name, unit, initial, minimum, full) in STOCK {
        db.inventory()
            .create_ingredient(NewIngredient {
                name: name.to_string(),
                unit: *unit,
                initial: Quantity::of(*initial, *unit),
                minimum: Quantity::of(*minimum, *unit),
                full: Quantity::of(*full, *unit),
            })
            .await?;
    }
    println!("✓ {} ingredients", STOCK.len());

    for (dish, lines) in RECIPES {
        let Some(item) = db
            .menu()
            .search_items(dish, 5)
            .await?
            .into_iter()
            .find(|i| i.name == *dish)
        else {
            eprintln!("Menu item {} not found, skipping recipe", dish);
            continue;
        };

        let mut inputs = Vec::with_capacity(lines.len());
        for (ingredient, amount, unit) in lines.iter() {
            let Some(found) = db.inventory().find_ingredient_by_name(ingredient).await? else {
                eprintln!("Ingredient {} not found, skipping", ingredient);
                continue;
            };
            inputs.push(RecipeInput {
                ingredient_id: found.id,
                amount: amount.to_string(),
                unit: *unit,
            });
        }
        db.inventory().set_recipe(&item.id, &inputs).await?;
    }
    println!("✓ {} recipes", RECIPES.len());

    println!();
    println!("✓ Seed complete!");

    Ok(())
}
