//! Database schema and operations

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use rusqlite::Connection;

use crate::catalog::Catalog;
use crate::models::{Building, Item, ItemForm, Recipe};

/// Initialize the database schema
pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        -- Items, raw resources included
        CREATE TABLE IF NOT EXISTS items (
            name TEXT PRIMARY KEY,
            category TEXT NOT NULL,
            sink_value REAL NOT NULL DEFAULT 0,
            form TEXT NOT NULL DEFAULT 'solid',
            is_raw INTEGER NOT NULL DEFAULT 0
        );

        -- Production buildings
        CREATE TABLE IF NOT EXISTS buildings (
            name TEXT PRIMARY KEY,
            power_mw REAL NOT NULL
        );

        -- Materials needed to construct a building
        CREATE TABLE IF NOT EXISTS building_costs (
            building TEXT,
            item TEXT,
            quantity REAL NOT NULL,
            PRIMARY KEY (building, item)
        );

        CREATE TABLE IF NOT EXISTS recipes (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            building TEXT NOT NULL,
            duration_secs REAL NOT NULL,
            alternate INTEGER NOT NULL DEFAULT 0
        );

        -- Quantities are per production cycle
        CREATE TABLE IF NOT EXISTS recipe_ingredients (
            recipe_id TEXT,
            item TEXT,
            quantity REAL NOT NULL,
            PRIMARY KEY (recipe_id, item)
        );

        CREATE TABLE IF NOT EXISTS recipe_products (
            recipe_id TEXT,
            item TEXT,
            quantity REAL NOT NULL,
            PRIMARY KEY (recipe_id, item)
        );

        CREATE INDEX IF NOT EXISTS idx_recipe_products_item ON recipe_products(item);
        "#,
    )?;
    Ok(())
}

/// Insert or replace an item
pub fn upsert_item(conn: &Connection, item: &Item, is_raw: bool) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO items (name, category, sink_value, form, is_raw)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        (
            &item.name,
            &item.category,
            item.sink_value,
            item.form.as_str(),
            is_raw,
        ),
    )?;
    Ok(())
}

/// Insert or replace a building along with its build cost
pub fn upsert_building(conn: &Connection, building: &Building) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO buildings (name, power_mw) VALUES (?1, ?2)",
        (&building.name, building.power_mw),
    )?;
    conn.execute(
        "DELETE FROM building_costs WHERE building = ?1",
        [&building.name],
    )?;
    for (item, quantity) in &building.build_cost {
        conn.execute(
            "INSERT INTO building_costs (building, item, quantity) VALUES (?1, ?2, ?3)",
            (&building.name, item, quantity),
        )?;
    }
    Ok(())
}

/// Insert or replace a recipe with its ingredient and product rows
pub fn upsert_recipe(conn: &Connection, recipe: &Recipe) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO recipes (id, name, building, duration_secs, alternate)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        (
            &recipe.id,
            &recipe.name,
            &recipe.building,
            recipe.duration_secs,
            recipe.alternate,
        ),
    )?;
    conn.execute("DELETE FROM recipe_ingredients WHERE recipe_id = ?1", [&recipe.id])?;
    conn.execute("DELETE FROM recipe_products WHERE recipe_id = ?1", [&recipe.id])?;
    for (item, quantity) in &recipe.ingredients {
        conn.execute(
            "INSERT INTO recipe_ingredients (recipe_id, item, quantity) VALUES (?1, ?2, ?3)",
            (&recipe.id, item, quantity),
        )?;
    }
    for (item, quantity) in &recipe.products {
        conn.execute(
            "INSERT INTO recipe_products (recipe_id, item, quantity) VALUES (?1, ?2, ?3)",
            (&recipe.id, item, quantity),
        )?;
    }
    Ok(())
}

/// Clear all catalog data (for re-import)
pub fn clear_catalog(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        DELETE FROM recipe_products;
        DELETE FROM recipe_ingredients;
        DELETE FROM recipes;
        DELETE FROM building_costs;
        DELETE FROM buildings;
        DELETE FROM items;
        "#,
    )?;
    Ok(())
}

/// Write a whole catalog in one transaction
pub fn save_catalog(conn: &mut Connection, catalog: &Catalog) -> Result<()> {
    use crate::catalog::RecipeCatalog;

    let tx = conn.transaction()?;
    for item in catalog.items() {
        upsert_item(&tx, item, catalog.is_raw(&item.name))?;
    }
    for building in catalog.buildings() {
        upsert_building(&tx, building)?;
    }
    for recipe in catalog.recipes() {
        upsert_recipe(&tx, recipe)?;
    }
    tx.commit()?;
    Ok(())
}

fn quantity_map(conn: &Connection, sql: &str) -> Result<BTreeMap<String, BTreeMap<String, f64>>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map([], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, f64>(2)?,
        ))
    })?;

    let mut results: BTreeMap<String, BTreeMap<String, f64>> = BTreeMap::new();
    for row in rows {
        let (owner, item, quantity) = row?;
        results.entry(owner).or_default().insert(item, quantity);
    }
    Ok(results)
}

/// Load the full catalog into memory
pub fn load_catalog(conn: &Connection) -> Result<Catalog> {
    let mut catalog = Catalog::new();

    let mut stmt = conn.prepare("SELECT name, category, sink_value, form, is_raw FROM items")?;
    let rows = stmt.query_map([], |row| {
        Ok((
            Item {
                name: row.get(0)?,
                category: row.get(1)?,
                sink_value: row.get(2)?,
                form: ItemForm::parse(&row.get::<_, String>(3)?),
            },
            row.get::<_, bool>(4)?,
        ))
    })?;
    for row in rows {
        let (item, is_raw) = row?;
        if is_raw {
            catalog.insert_raw(item);
        } else {
            catalog.insert_item(item);
        }
    }

    let mut costs = quantity_map(conn, "SELECT building, item, quantity FROM building_costs")?;
    let mut stmt = conn.prepare("SELECT name, power_mw FROM buildings")?;
    let rows = stmt.query_map([], |row| {
        Ok(Building {
            name: row.get(0)?,
            power_mw: row.get(1)?,
            build_cost: BTreeMap::new(),
        })
    })?;
    for row in rows {
        let mut building = row?;
        building.build_cost = costs.remove(&building.name).unwrap_or_default();
        catalog.insert_building(building);
    }

    let mut ingredients =
        quantity_map(conn, "SELECT recipe_id, item, quantity FROM recipe_ingredients")?;
    let mut products = quantity_map(conn, "SELECT recipe_id, item, quantity FROM recipe_products")?;
    let mut stmt =
        conn.prepare("SELECT id, name, building, duration_secs, alternate FROM recipes ORDER BY id")?;
    let rows = stmt.query_map([], |row| {
        Ok(Recipe {
            id: row.get(0)?,
            name: row.get(1)?,
            building: row.get(2)?,
            duration_secs: row.get(3)?,
            ingredients: BTreeMap::new(),
            products: BTreeMap::new(),
            alternate: row.get(4)?,
        })
    })?;
    for row in rows {
        let mut recipe = row?;
        recipe.ingredients = ingredients.remove(&recipe.id).unwrap_or_default();
        recipe.products = products.remove(&recipe.id).unwrap_or_default();
        let id = recipe.id.clone();
        catalog
            .insert_recipe(recipe)
            .with_context(|| format!("Recipe '{}' in database is invalid", id))?;
    }

    Ok(catalog)
}

/// List all buildings in the database
pub fn list_buildings(conn: &Connection) -> Result<Vec<Building>> {
    let mut stmt = conn.prepare("SELECT name, power_mw FROM buildings ORDER BY name")?;

    let rows = stmt.query_map([], |row| {
        Ok(Building {
            name: row.get(0)?,
            power_mw: row.get(1)?,
            build_cost: BTreeMap::new(),
        })
    })?;

    let mut results = Vec::new();
    for row in rows {
        results.push(row?);
    }
    Ok(results)
}

/// List all items with their raw flag
pub fn list_items(conn: &Connection) -> Result<Vec<(Item, bool)>> {
    let mut stmt = conn.prepare(
        "SELECT name, category, sink_value, form, is_raw FROM items ORDER BY is_raw DESC, name",
    )?;

    let rows = stmt.query_map([], |row| {
        Ok((
            Item {
                name: row.get(0)?,
                category: row.get(1)?,
                sink_value: row.get(2)?,
                form: ItemForm::parse(&row.get::<_, String>(3)?),
            },
            row.get(4)?,
        ))
    })?;

    let mut results = Vec::new();
    for row in rows {
        results.push(row?);
    }
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::RecipeCatalog;
    use crate::sample;

    #[test]
    fn catalog_round_trips_through_sqlite() {
        let mut conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        let original = sample::sample_catalog().unwrap();
        save_catalog(&mut conn, &original).unwrap();

        let loaded = load_catalog(&conn).unwrap();
        assert_eq!(loaded.recipes().count(), original.recipes().count());
        assert_eq!(loaded.items().count(), original.items().count());
        assert!(loaded.is_raw("IronOre"));
        assert!(!loaded.is_raw("IronPlate"));
        assert_eq!(
            loaded.recipe("alt_pure_iron_ingot"),
            original.recipe("alt_pure_iron_ingot")
        );
        assert_eq!(loaded.building("Constructor"), original.building("Constructor"));
    }

    #[test]
    fn clear_empties_every_table() {
        let mut conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        save_catalog(&mut conn, &sample::sample_catalog().unwrap()).unwrap();
        clear_catalog(&conn).unwrap();
        assert!(load_catalog(&conn).unwrap().is_empty());
        assert!(list_buildings(&conn).unwrap().is_empty());
    }

    #[test]
    fn upsert_replaces_recipe_rows() {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        let recipe = Recipe::new("screw", "Screw", "Constructor")
            .duration(6.0)
            .ingredient("IronRod", 1.0)
            .product("Screw", 4.0);
        upsert_recipe(&conn, &recipe).unwrap();
        upsert_recipe(&conn, &recipe.clone().ingredient("IronIngot", 2.0)).unwrap();
        let loaded = load_catalog(&conn).unwrap();
        assert_eq!(loaded.recipe("screw").unwrap().ingredients.len(), 2);
    }
}
