//! Stock levels and recipes.

use std::io::Write;

use clap::Subcommand;

use super::{resolve_ingredient, resolve_item, Output};
use crate::error::{CliError, CliResult};
use crate::state::AppState;
use tiffin_core::inventory::StockLevel;
use tiffin_core::{CoreError, Permission, Quantity, Unit};
use tiffin_db::repository::{NewIngredient, RecipeEntry, RecipeInput};

#[derive(Debug, Subcommand)]
pub enum InventoryCommand {
    /// Show every ingredient's stock
    List,

    /// Show ingredients at or below their minimum
    Low,

    /// Start tracking an ingredient
    Add {
        name: String,

        /// g, kg, ml, l or pcs
        #[arg(long)]
        unit: String,

        /// Opening stock, in the ingredient's unit
        #[arg(long, default_value = "0")]
        stock: String,

        /// Low-stock threshold
        #[arg(long, default_value = "0")]
        min: String,

        /// Level considered 100%
        #[arg(long, default_value = "0")]
        full: String,
    },

    /// Add delivered stock (negative to write off)
    Restock {
        ingredient: String,

        #[arg(allow_hyphen_values = true)]
        amount: String,
    },

    /// Set stock to a counted amount
    Set {
        ingredient: String,

        #[arg(allow_hyphen_values = true)]
        amount: String,
    },

    /// Change the minimum and full levels
    Levels {
        ingredient: String,

        #[arg(long)]
        min: String,

        #[arg(long)]
        full: String,
    },
}

#[derive(Debug, Subcommand)]
pub enum RecipeCommand {
    /// Show what one serving of an item uses
    Show { item: String },

    /// Replace an item's recipe, e.g. `Paneer=150g Curd=0.05kg`
    Set {
        item: String,

        #[arg(required = true)]
        lines: Vec<String>,
    },

    /// Remove an item's recipe
    Clear { item: String },
}

pub async fn run(state: &AppState, command: InventoryCommand, out: &mut Output<'_>) -> CliResult<()> {
    let db = &state.db;
    state.require(Permission::ManageInventory).await?;

    match command {
        InventoryCommand::List => {
            let levels = db.inventory().list_inventory().await?;
            print_levels(&levels, out)?;
        }
        InventoryCommand::Low => {
            let alerts = db.inventory().low_stock().await?;
            if out.is_json() {
                return out.json(&alerts);
            }
            if alerts.is_empty() {
                writeln!(out, "All ingredients above minimum")?;
            }
            for alert in &alerts {
                writeln!(out, "{:>4}%  {}", alert.percentage, alert.message())?;
            }
        }
        InventoryCommand::Add {
            name,
            unit,
            stock,
            min,
            full,
        } => {
            let unit = parse_unit(&unit)?;
            let level = db
                .inventory()
                .create_ingredient(NewIngredient {
                    name,
                    unit,
                    initial: parse_amount(&stock, unit)?,
                    minimum: parse_amount(&min, unit)?,
                    full: parse_amount(&full, unit)?,
                })
                .await?;
            print_change("Added", &level, out)?;
        }
        InventoryCommand::Restock { ingredient, amount } => {
            let ingredient = resolve_ingredient(db, &ingredient).await?;
            let delta = parse_amount(&amount, ingredient.unit)?;
            let level = db.inventory().restock(&ingredient.id, delta).await?;
            print_change("Restocked", &level, out)?;
        }
        InventoryCommand::Set { ingredient, amount } => {
            let ingredient = resolve_ingredient(db, &ingredient).await?;
            let current = parse_amount(&amount, ingredient.unit)?;
            let level = db.inventory().set_stock(&ingredient.id, current).await?;
            print_change("Counted", &level, out)?;
        }
        InventoryCommand::Levels {
            ingredient,
            min,
            full,
        } => {
            let ingredient = resolve_ingredient(db, &ingredient).await?;
            let level = db
                .inventory()
                .set_levels(
                    &ingredient.id,
                    parse_amount(&min, ingredient.unit)?,
                    parse_amount(&full, ingredient.unit)?,
                )
                .await?;
            print_change("Updated", &level, out)?;
        }
    }
    Ok(())
}

pub async fn run_recipe(state: &AppState, command: RecipeCommand, out: &mut Output<'_>) -> CliResult<()> {
    let db = &state.db;

    match command {
        RecipeCommand::Show { item } => {
            state.require(Permission::ViewMenu).await?;
            let item = resolve_item(db, &item).await?;
            let recipe = db.inventory().get_recipe(&item.id).await?;
            print_recipe(&item.name, &recipe, out)?;
        }
        RecipeCommand::Set { item, lines } => {
            state.require(Permission::ManageInventory).await?;
            let item = resolve_item(db, &item).await?;
            let mut inputs = Vec::with_capacity(lines.len());
            for line in &lines {
                let (name, amount, unit) = parse_recipe_line(line)?;
                let ingredient = resolve_ingredient(db, name).await?;
                inputs.push(RecipeInput {
                    ingredient_id: ingredient.id,
                    amount: amount.to_string(),
                    unit: unit.unwrap_or(ingredient.unit),
                });
            }
            let recipe = db.inventory().set_recipe(&item.id, &inputs).await?;
            print_recipe(&item.name, &recipe, out)?;
        }
        RecipeCommand::Clear { item } => {
            state.require(Permission::ManageInventory).await?;
            let item = resolve_item(db, &item).await?;
            db.inventory().set_recipe(&item.id, &[]).await?;
            writeln!(out, "Cleared recipe for {}", item.name)?;
        }
    }
    Ok(())
}

fn parse_unit(input: &str) -> CliResult<Unit> {
    Unit::parse(input).map_err(|e| CoreError::from(e).into())
}

fn parse_amount(input: &str, unit: Unit) -> CliResult<Quantity> {
    Quantity::parse(input, unit).map_err(|e| CoreError::from(e).into())
}

/// Splits `Paneer=150g` into name, amount and an optional unit suffix.
fn parse_recipe_line(line: &str) -> CliResult<(&str, &str, Option<Unit>)> {
    let (name, rest) = line
        .split_once('=')
        .ok_or_else(|| CliError::validation(format!("Expected INGREDIENT=AMOUNT, got '{}'", line)))?;
    let (name, rest) = (name.trim(), rest.trim());
    if name.is_empty() || rest.is_empty() {
        return Err(CliError::validation(format!(
            "Expected INGREDIENT=AMOUNT, got '{}'",
            line
        )));
    }

    let split = rest
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(rest.len());
    let (amount, suffix) = rest.split_at(split);
    let unit = match suffix.trim() {
        "" => None,
        symbol => Some(parse_unit(symbol)?),
    };
    Ok((name, amount, unit))
}

fn print_levels(levels: &[StockLevel], out: &mut Output<'_>) -> CliResult<()> {
    if out.is_json() {
        return out.json(levels);
    }
    if levels.is_empty() {
        writeln!(out, "No ingredients tracked")?;
        return Ok(());
    }

    writeln!(out, "{:<24} {:>12} {:>12} {:>6}", "INGREDIENT", "STOCK", "MINIMUM", "LEVEL")?;
    for level in levels {
        let flag = if level.is_low() { "  LOW" } else { "" };
        writeln!(
            out,
            "{:<24} {:>12} {:>12} {:>5}%{}",
            level.name,
            level.current.format_in(level.unit),
            level.minimum.format_in(level.unit),
            level.percentage(),
            flag
        )?;
    }
    Ok(())
}

fn print_change(verb: &str, level: &StockLevel, out: &mut Output<'_>) -> CliResult<()> {
    if out.is_json() {
        return out.json(level);
    }
    writeln!(
        out,
        "{} {}: {} in stock",
        verb,
        level.name,
        level.current.format_in(level.unit)
    )?;
    if level.is_low() {
        writeln!(
            out,
            "low stock: at or below minimum of {}",
            level.minimum.format_in(level.unit)
        )?;
    }
    Ok(())
}

fn print_recipe(item_name: &str, recipe: &[RecipeEntry], out: &mut Output<'_>) -> CliResult<()> {
    if out.is_json() {
        return out.json(recipe);
    }
    if recipe.is_empty() {
        writeln!(out, "{} has no recipe; selling it uses no stock", item_name)?;
        return Ok(());
    }
    writeln!(out, "One {} uses:", item_name)?;
    for entry in recipe {
        writeln!(
            out,
            "  {:<24} {}",
            entry.ingredient_name,
            entry.quantity().format_in(entry.unit)
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
    use tiffin_db::repository::NewMenuItem;

    #[test]
    fn test_parse_recipe_line() {
        assert_eq!(
            parse_recipe_line("Paneer=150g").unwrap(),
            ("Paneer", "150", Some(Unit::Gram))
        );
        assert_eq!(
            parse_recipe_line("Milk = 0.2 l").unwrap(),
            ("Milk", "0.2", Some(Unit::Litre))
        );
        assert_eq!(parse_recipe_line("Egg=2").unwrap(), ("Egg", "2", None));
        assert!(parse_recipe_line("Paneer").is_err());
        assert!(parse_recipe_line("Paneer=150cups").is_err());
    }

    #[tokio::test]
    async fn test_add_restock_and_recipe() {
        let manager = state_as(Role::Manager).await;
        let cat = manager.db.menu().create_category("Curries").await.unwrap();
        manager
            .db
            .menu()
            .create_item(NewMenuItem {
                category_id: cat.id,
                name: "Paneer Butter Masala".to_string(),
                description: None,
                price_paise: 24000,
                is_vegetarian: true,
            })
            .await
            .unwrap();

        let mut buf = Vec::new();
        let mut out = Output::new(&mut buf, false);
        run(
            &manager,
            InventoryCommand::Add {
                name: "Paneer".to_string(),
                unit: "kg".to_string(),
                stock: "2".to_string(),
                min: "0.5".to_string(),
                full: "5".to_string(),
            },
            &mut out,
        )
        .await
        .unwrap();
        run(
            &manager,
            InventoryCommand::Restock {
                ingredient: "paneer".to_string(),
                amount: "1.25".to_string(),
            },
            &mut out,
        )
        .await
        .unwrap();
        run_recipe(
            &manager,
            RecipeCommand::Set {
                item: "paneer butter".to_string(),
                lines: vec!["Paneer=150g".to_string()],
            },
            &mut out,
        )
        .await
        .unwrap();

        let text = String::from_utf8(buf).unwrap();
        assert!(text.contains("Restocked Paneer: 3.25 kg in stock"));
        assert!(text.contains("Paneer                   150 g"));
    }

    #[tokio::test]
    async fn test_staff_reads_recipes_but_not_stock() {
        let staff = state_as(Role::Staff).await;
        let mut buf = Vec::new();
        let mut out = Output::new(&mut buf, false);
        let err = run(&staff, InventoryCommand::List, &mut out).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::PermissionDenied);
    }
}
