//! Menu and category commands.

use std::collections::HashMap;
use std::io::Write;

use clap::Subcommand;

use super::{parse_money, resolve_category, resolve_item, Output};
use crate::error::CliResult;
use crate::state::AppState;
use tiffin_core::{MenuItem, Permission};
use tiffin_db::repository::{MenuItemChanges, NewMenuItem};

#[derive(Debug, Subcommand)]
pub enum MenuCommand {
    /// List menu items
    List {
        /// Only this category (name or id)
        #[arg(long)]
        category: Option<String>,

        /// Include sold-out items
        #[arg(long)]
        all: bool,
    },

    /// Search items by name
    Search {
        query: String,

        #[arg(long, default_value_t = 10)]
        limit: i64,
    },

    /// Add an item to a category
    Add {
        name: String,

        #[arg(long)]
        category: String,

        /// Price in rupees, e.g. 149.50
        #[arg(long)]
        price: String,

        #[arg(long)]
        description: Option<String>,

        #[arg(long)]
        non_veg: bool,
    },

    /// Change an item's name, price, category or description
    Update {
        /// Item name or id
        item: String,

        #[arg(long)]
        name: Option<String>,

        #[arg(long)]
        price: Option<String>,

        #[arg(long)]
        category: Option<String>,

        #[arg(long, conflicts_with = "clear_description")]
        description: Option<String>,

        #[arg(long)]
        clear_description: bool,

        #[arg(long)]
        vegetarian: Option<bool>,
    },

    /// Mark an item available again
    Enable { item: String },

    /// Mark an item sold out for now
    Disable { item: String },

    /// Remove an item from the menu (bills keep their copy)
    Remove { item: String },
}

#[derive(Debug, Subcommand)]
pub enum CategoryCommand {
    /// List categories
    List,

    /// Add a category
    Add { name: String },

    /// Rename a category
    Rename { category: String, new_name: String },

    /// Delete a category with no active items
    Delete { category: String },
}

pub async fn run(state: &AppState, command: MenuCommand, out: &mut Output<'_>) -> CliResult<()> {
    let db = &state.db;

    match command {
        MenuCommand::List { category, all } => {
            state.require(Permission::ViewMenu).await?;
            let category_id = match category {
                Some(c) => Some(resolve_category(db, &c).await?.id),
                None => None,
            };
            let items = db.menu().list_items(category_id.as_deref(), all).await?;
            print_items(state, &items, out).await?;
        }
        MenuCommand::Search { query, limit } => {
            state.require(Permission::ViewMenu).await?;
            let items = db.menu().search_items(&query, limit).await?;
            print_items(state, &items, out).await?;
        }
        MenuCommand::Add {
            name,
            category,
            price,
            description,
            non_veg,
        } => {
            state.require(Permission::ManageMenu).await?;
            let category = resolve_category(db, &category).await?;
            let item = db
                .menu()
                .create_item(NewMenuItem {
                    category_id: category.id,
                    name,
                    description,
                    price_paise: parse_money(&price)?.paise(),
                    is_vegetarian: !non_veg,
                })
                .await?;
            if out.is_json() {
                return out.json(&item);
            }
            writeln!(out, "Added {} at {} to {}", item.name, item.price(), category.name)?;
        }
        MenuCommand::Update {
            item,
            name,
            price,
            category,
            description,
            clear_description,
            vegetarian,
        } => {
            state.require(Permission::ManageMenu).await?;
            let existing = resolve_item(db, &item).await?;
            let category_id = match category {
                Some(c) => Some(resolve_category(db, &c).await?.id),
                None => None,
            };
            let price_paise = match price {
                Some(p) => Some(parse_money(&p)?.paise()),
                None => None,
            };
            let description = if clear_description {
                Some(None)
            } else {
                description.map(Some)
            };

            let updated = db
                .menu()
                .update_item(
                    &existing.id,
                    MenuItemChanges {
                        category_id,
                        name,
                        description,
                        price_paise,
                        is_vegetarian: vegetarian,
                    },
                )
                .await?;
            if out.is_json() {
                return out.json(&updated);
            }
            writeln!(out, "Updated {} ({})", updated.name, updated.price())?;
        }
        MenuCommand::Enable { item } => {
            state.require(Permission::ManageMenu).await?;
            let item = resolve_item(db, &item).await?;
            db.menu().set_availability(&item.id, true).await?;
            writeln!(out, "{} is available", item.name)?;
        }
        MenuCommand::Disable { item } => {
            state.require(Permission::ManageMenu).await?;
            let item = resolve_item(db, &item).await?;
            db.menu().set_availability(&item.id, false).await?;
            writeln!(out, "{} is sold out", item.name)?;
        }
        MenuCommand::Remove { item } => {
            state.require(Permission::ManageMenu).await?;
            let item = resolve_item(db, &item).await?;
            db.menu().soft_delete_item(&item.id).await?;
            writeln!(out, "Removed {} from the menu", item.name)?;
        }
    }
    Ok(())
}

pub async fn run_category(
    state: &AppState,
    command: CategoryCommand,
    out: &mut Output<'_>,
) -> CliResult<()> {
    let db = &state.db;

    match command {
        CategoryCommand::List => {
            state.require(Permission::ViewMenu).await?;
            let categories = db.menu().list_categories().await?;
            if out.is_json() {
                return out.json(&categories);
            }
            for category in &categories {
                let count = db.menu().list_items(Some(&category.id), true).await?.len();
                writeln!(out, "{:<30} {:>3} item(s)", category.name, count)?;
            }
        }
        CategoryCommand::Add { name } => {
            state.require(Permission::ManageMenu).await?;
            let category = db.menu().create_category(&name).await?;
            writeln!(out, "Added category {}", category.name)?;
        }
        CategoryCommand::Rename { category, new_name } => {
            state.require(Permission::ManageMenu).await?;
            let existing = resolve_category(db, &category).await?;
            let renamed = db.menu().rename_category(&existing.id, &new_name).await?;
            writeln!(out, "Renamed {} to {}", existing.name, renamed.name)?;
        }
        CategoryCommand::Delete { category } => {
            state.require(Permission::ManageMenu).await?;
            let existing = resolve_category(db, &category).await?;
            db.menu().delete_category(&existing.id).await?;
            writeln!(out, "Deleted category {}", existing.name)?;
        }
    }
    Ok(())
}

async fn print_items(state: &AppState, items: &[MenuItem], out: &mut Output<'_>) -> CliResult<()> {
    if out.is_json() {
        return out.json(items);
    }
    if items.is_empty() {
        writeln!(out, "No menu items")?;
        return Ok(());
    }

    let categories: HashMap<String, String> = state
        .db
        .menu()
        .list_categories()
        .await?
        .into_iter()
        .map(|c| (c.id, c.name))
        .collect();

    writeln!(out, "{:<16} {:<32} {:>10}  {:<7} STATUS", "CATEGORY", "ITEM", "PRICE", "TYPE")?;
    for item in items {
        let category = categories.get(&item.category_id).map(String::as_str).unwrap_or("?");
        let kind = if item.is_vegetarian { "veg" } else { "non-veg" };
        let status = if item.is_available { "" } else { "sold out" };
        writeln!(
            out,
            "{:<16} {:<32} {:>10}  {:<7} {}",
            category,
            item.name,
            item.price().to_string(),
            kind,
            status
        )?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::state::testing::state_as;
    use tiffin_core::Role;

    #[tokio::test]
    async fn test_manager_builds_menu_staff_reads_it() {
        let manager = state_as(Role::Manager).await;
        let mut buf = Vec::new();
        let mut out = Output::new(&mut buf, false);

        run_category(&manager, CategoryCommand::Add { name: "Tiffin".to_string() }, &mut out)
            .await
            .unwrap();
        run(
            &manager,
            MenuCommand::Add {
                name: "Masala Dosa".to_string(),
                category: "tiffin".to_string(),
                price: "90".to_string(),
                description: None,
                non_veg: false,
            },
            &mut out,
        )
        .await
        .unwrap();
        run(
            &manager,
            MenuCommand::Update {
                item: "masala dosa".to_string(),
                name: None,
                price: Some("95.50".to_string()),
                category: None,
                description: None,
                clear_description: false,
                vegetarian: None,
            },
            &mut out,
        )
        .await
        .unwrap();
        run(&manager, MenuCommand::List { category: None, all: false }, &mut out)
            .await
            .unwrap();

        let text = String::from_utf8(buf).unwrap();
        assert!(text.contains("Added Masala Dosa at ₹90.00 to Tiffin"));
        assert!(text.contains("₹95.50"));
    }

    #[tokio::test]
    async fn test_staff_cannot_edit_menu() {
        let staff = state_as(Role::Staff).await;
        let mut buf = Vec::new();
        let mut out = Output::new(&mut buf, false);

        let err = run_category(&staff, CategoryCommand::Add { name: "Tiffin".to_string() }, &mut out)
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::PermissionDenied);
        assert!(run(&staff, MenuCommand::List { category: None, all: true }, &mut out)
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_zero_price_rejected() {
        let manager = state_as(Role::Manager).await;
        manager.db.menu().create_category("Drinks").await.unwrap();
        let mut buf = Vec::new();
        let mut out = Output::new(&mut buf, false);

        let err = run(
            &manager,
            MenuCommand::Add {
                name: "Water".to_string(),
                category: "Drinks".to_string(),
                price: "0".to_string(),
                description: None,
                non_veg: false,
            },
            &mut out,
        )
        .await
        .unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationError);
    }
}
