//! Catalog import from game "Docs" JSON dumps
//!
//! The dumps group classes by their native class and store every property as
//! an Unreal-formatted string, e.g.
//! `((ItemClass="/Script/Engine.BlueprintGeneratedClass'/Game/.../Desc_IronIngot.Desc_IronIngot_C'",Amount=3))`.
//! Item, building and recipe classes are pulled out of those strings and
//! written to the catalog database.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use regex::Regex;
use rusqlite::Connection;
use serde::Deserialize;
use walkdir::WalkDir;

use crate::catalog::Catalog;
use crate::db;
use crate::models::{Building, Item, ItemForm, Recipe};

#[derive(Debug, Deserialize)]
struct NativeClassGroup {
    #[serde(rename = "NativeClass")]
    native_class: String,
    #[serde(rename = "Classes")]
    classes: Vec<DocsClass>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct DocsClass {
    #[serde(rename = "ClassName")]
    class_name: String,
    #[serde(rename = "mDisplayName")]
    display_name: String,
    #[serde(rename = "mIngredients")]
    ingredients: String,
    #[serde(rename = "mProduct")]
    product: String,
    #[serde(rename = "mManufactoringDuration")]
    duration: String,
    #[serde(rename = "mProducedIn")]
    produced_in: String,
    #[serde(rename = "mResourceSinkPoints")]
    sink_points: String,
    #[serde(rename = "mForm")]
    form: String,
    #[serde(rename = "mPowerConsumption")]
    power_consumption: String,
}

/// Recipe as found in the dump, before fluid scaling and building checks
#[derive(Debug)]
struct PendingRecipe {
    id: String,
    name: String,
    duration_secs: f64,
    ingredients: Vec<(String, f64)>,
    products: Vec<(String, f64)>,
    produced_in: Vec<String>,
}

/// Everything pulled out of one or more dump files
#[derive(Debug, Default)]
struct ExtractedDocs {
    items: BTreeMap<String, (Item, bool)>,
    buildings: BTreeMap<String, Building>,
    recipes: Vec<PendingRecipe>,
}

struct Patterns {
    item_amount: Regex,
    building: Regex,
}

impl Patterns {
    fn new() -> Result<Self> {
        Ok(Self {
            // .Desc_IronIngot_C'",Amount=3
            item_amount: Regex::new(r#"\.(\w+)_C['"]*\s*,\s*Amount=(\d+(?:\.\d+)?)"#)?,
            // .Build_ConstructorMk1_C
            building: Regex::new(r"\.Build_(\w+)_C")?,
        })
    }

    fn amounts(&self, packed: &str) -> Vec<(String, f64)> {
        self.item_amount
            .captures_iter(packed)
            .filter_map(|cap| {
                let amount = cap[2].parse::<f64>().ok()?;
                Some((short_name(&cap[1]), amount))
            })
            .collect()
    }

    fn buildings(&self, packed: &str) -> Vec<String> {
        self.building
            .captures_iter(packed)
            .map(|cap| cap[1].to_string())
            .collect()
    }
}

/// `Desc_IronIngot_C` -> `IronIngot`
fn short_name(class: &str) -> String {
    let class = class.strip_suffix("_C").unwrap_or(class);
    for prefix in ["Desc_", "Build_", "Recipe_", "BP_"] {
        if let Some(rest) = class.strip_prefix(prefix) {
            return rest.to_string();
        }
    }
    class.to_string()
}

fn parse_number(s: &str) -> f64 {
    s.trim().parse::<f64>().unwrap_or(0.0)
}

/// Category for item descriptor classes; `None` for anything else.
fn item_category(native_class: &str) -> Option<&'static str> {
    let categories = [
        ("FGResourceDescriptor'", "resource"),
        ("FGItemDescriptorBiomass'", "biomass"),
        ("FGItemDescriptorNuclearFuel'", "nuclear"),
        ("FGConsumableDescriptor'", "consumable"),
        ("FGEquipmentDescriptor'", "equipment"),
        ("FGAmmoType", "ammo"),
        ("FGItemDescriptor'", "part"),
    ];
    categories
        .iter()
        .find(|(marker, _)| native_class.contains(marker))
        .map(|(_, category)| *category)
}

fn parse_form(form: &str) -> ItemForm {
    match form {
        "RF_LIQUID" => ItemForm::Liquid,
        "RF_GAS" => ItemForm::Gas,
        _ => ItemForm::Solid,
    }
}

/// Read a dump, which the game ships as UTF-16LE with a BOM
fn read_docs(path: &Path) -> Result<String> {
    let bytes = fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    if let Some(body) = bytes.strip_prefix(&[0xFF, 0xFE]) {
        if body.len() % 2 != 0 {
            bail!("{} has an odd number of UTF-16 bytes", path.display());
        }
        let units: Vec<u16> = body
            .chunks_exact(2)
            .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
            .collect();
        return String::from_utf16(&units)
            .with_context(|| format!("{} is not valid UTF-16", path.display()));
    }
    let body = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(&bytes);
    String::from_utf8(body.to_vec()).with_context(|| format!("{} is not valid UTF-8", path.display()))
}

/// Find all JSON files that look like class dumps. Files that cannot be
/// read or decoded are logged and counted in `stats.errors`.
pub fn find_docs_files(dir: &Path, stats: &mut ImportStats) -> Result<Vec<PathBuf>> {
    let mut docs = Vec::new();

    for entry in WalkDir::new(dir)
        .follow_links(true)
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let path = entry.path();
        if path.extension().is_some_and(|ext| ext == "json") {
            let content = match read_docs(path) {
                Ok(content) => content,
                Err(e) => {
                    tracing::warn!(file = %path.display(), "unreadable: {:#}", e);
                    stats.errors += 1;
                    continue;
                }
            };
            if content.contains("\"NativeClass\"") {
                docs.push(path.to_path_buf());
            }
        }
    }

    docs.sort();
    Ok(docs)
}

fn parse_docs_file(path: &Path, patterns: &Patterns, out: &mut ExtractedDocs) -> Result<()> {
    let content = read_docs(path)?;
    let groups: Vec<NativeClassGroup> = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))?;

    for group in groups {
        let native = group.native_class.as_str();
        if let Some(category) = item_category(native) {
            let raw = category == "resource";
            for class in group.classes {
                let name = short_name(&class.class_name);
                let item = Item {
                    name: name.clone(),
                    category: category.to_string(),
                    sink_value: parse_number(&class.sink_points),
                    form: parse_form(&class.form),
                };
                out.items.insert(name, (item, raw));
            }
        } else if native.contains("FGBuildableManufacturer") {
            for class in group.classes {
                let name = short_name(&class.class_name);
                let building = Building::new(name.clone(), parse_number(&class.power_consumption));
                out.buildings.insert(name, building);
            }
        } else if native.contains("FGRecipe'") {
            for class in group.classes {
                out.recipes.push(PendingRecipe {
                    id: short_name(&class.class_name),
                    name: class.display_name,
                    duration_secs: parse_number(&class.duration),
                    ingredients: patterns.amounts(&class.ingredients),
                    products: patterns.amounts(&class.product),
                    produced_in: patterns.buildings(&class.produced_in),
                });
            }
        }
    }
    Ok(())
}

/// Resolve buildings and fluid units, dropping recipes no machine runs.
fn resolve(docs: ExtractedDocs, stats: &mut ImportStats) -> Catalog {
    let mut catalog = Catalog::new();
    let is_fluid = |item: &str| {
        docs.items
            .get(item)
            .is_some_and(|(i, _)| i.form != ItemForm::Solid)
    };
    let scale = |(item, amount): &(String, f64)| {
        // Dumps store fluids in litres; recipes work in m³.
        let amount = if is_fluid(item) { amount / 1000.0 } else { *amount };
        (item.clone(), amount)
    };

    for recipe in &docs.recipes {
        let Some(building) = recipe
            .produced_in
            .iter()
            .find(|b| docs.buildings.contains_key(*b))
        else {
            tracing::debug!(recipe = %recipe.id, "skipping recipe without a manufacturer");
            stats.skipped += 1;
            continue;
        };
        if recipe.products.is_empty() || recipe.duration_secs <= 0.0 {
            tracing::warn!(recipe = %recipe.id, "skipping recipe with no products or duration");
            stats.skipped += 1;
            continue;
        }

        let mut built = Recipe::new(recipe.id.clone(), recipe.name.clone(), building.clone())
            .duration(recipe.duration_secs);
        built.ingredients = recipe.ingredients.iter().map(&scale).collect();
        built.products = recipe.products.iter().map(&scale).collect();
        built.alternate = recipe.id.starts_with("Alternate_");

        match catalog.insert_recipe(built) {
            Ok(()) => stats.recipes += 1,
            Err(e) => {
                tracing::warn!(recipe = %recipe.id, "rejected: {}", e);
                stats.errors += 1;
            }
        }
    }

    for (item, raw) in docs.items.into_values() {
        stats.items += 1;
        if raw {
            catalog.insert_raw(item);
        } else {
            catalog.insert_item(item);
        }
    }
    for building in docs.buildings.into_values() {
        stats.buildings += 1;
        catalog.insert_building(building);
    }
    catalog
}

/// Import every dump under `docs_dir` and write the result to the database
pub fn import_to_database(conn: &mut Connection, docs_dir: &Path) -> Result<ImportStats> {
    let mut stats = ImportStats::default();
    let patterns = Patterns::new()?;

    tracing::info!(dir = %docs_dir.display(), "scanning for class dumps");
    let files = find_docs_files(docs_dir, &mut stats)?;
    tracing::info!(files = files.len(), "found class dumps");

    let mut docs = ExtractedDocs::default();
    for path in &files {
        match parse_docs_file(path, &patterns, &mut docs) {
            Ok(()) => {
                stats.files += 1;
                tracing::info!(file = %path.display(), "parsed");
            }
            Err(e) => {
                tracing::warn!(file = %path.display(), "failed to parse: {:#}", e);
                stats.errors += 1;
            }
        }
    }

    let catalog = resolve(docs, &mut stats);
    db::save_catalog(conn, &catalog)?;
    Ok(stats)
}

#[derive(Debug, Default)]
pub struct ImportStats {
    pub files: usize,
    pub items: usize,
    pub buildings: usize,
    pub recipes: usize,
    pub skipped: usize,
    pub errors: usize,
}

impl fmt::Display for ImportStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Imported {} items, {} buildings, {} recipes from {} file(s). Skipped: {}, Errors: {}",
            self.items, self.buildings, self.recipes, self.files, self.skipped, self.errors
        )
    }
}
