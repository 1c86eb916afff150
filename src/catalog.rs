//! Read-only recipe catalog
//!
//! The planner never talks to storage directly: everything it needs is
//! looked up through [`RecipeCatalog`], so fixture catalogs can be built in
//! memory for tests and the SQLite store only has to produce a [`Catalog`].

use std::collections::{BTreeMap, BTreeSet};

use crate::error::{PlannerError, Result};
use crate::models::{Building, Item, Recipe, RecipeSelection};

pub trait RecipeCatalog {
    /// All recipes listing `item` as a product, ordered by recipe id.
    fn recipes_producing(&self, item: &str) -> Vec<&Recipe>;

    fn recipe(&self, id: &str) -> Option<&Recipe>;

    fn is_raw(&self, item: &str) -> bool;

    fn item(&self, name: &str) -> Option<&Item>;

    fn building(&self, name: &str) -> Option<&Building>;

    /// The first non-alternate recipe producing `item`.
    fn default_recipe(&self, item: &str) -> Option<&Recipe> {
        self.recipes_producing(item)
            .into_iter()
            .find(|r| !r.alternate)
    }

    /// Recipes eligible for `item` under `selection`, in preference order.
    ///
    /// Selected ids that do not resolve, or resolve to a recipe that does not
    /// make the item, are skipped. Falls back to the default recipe.
    fn candidate_recipes(&self, item: &str, selection: &RecipeSelection) -> Vec<&Recipe> {
        let selected: Vec<&Recipe> = selection
            .get(item)
            .iter()
            .filter_map(|id| self.recipe(id))
            .filter(|r| r.products.contains_key(item))
            .collect();
        if !selected.is_empty() {
            return selected;
        }
        self.default_recipe(item).into_iter().collect()
    }

    /// Like [`recipes_producing`](Self::recipes_producing), but an item
    /// nothing makes is an error.
    fn producers(&self, item: &str) -> Result<Vec<&Recipe>> {
        let recipes = self.recipes_producing(item);
        if recipes.is_empty() {
            return Err(PlannerError::NoRecipeFound(item.to_string()));
        }
        Ok(recipes)
    }

    /// The recipe used when only one can be chosen.
    fn active_recipe(&self, item: &str, selection: &RecipeSelection) -> Option<&Recipe> {
        self.candidate_recipes(item, selection).into_iter().next()
    }
}

/// In-memory catalog indexed by product
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    items: BTreeMap<String, Item>,
    raw: BTreeSet<String>,
    buildings: BTreeMap<String, Building>,
    recipes: BTreeMap<String, Recipe>,
    by_product: BTreeMap<String, Vec<String>>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_item(&mut self, item: Item) {
        self.items.insert(item.name.clone(), item);
    }

    /// Register an item as an extractable raw resource.
    pub fn insert_raw(&mut self, item: Item) {
        self.raw.insert(item.name.clone());
        self.insert_item(item);
    }

    pub fn insert_building(&mut self, building: Building) {
        self.buildings.insert(building.name.clone(), building);
    }

    /// Add a recipe; ids must be unique and the recipe must produce something.
    pub fn insert_recipe(&mut self, recipe: Recipe) -> Result<()> {
        if self.recipes.contains_key(&recipe.id) {
            return Err(PlannerError::InvalidRecipe {
                recipe: recipe.id,
                reason: "duplicate recipe id".to_string(),
            });
        }
        if recipe.products.is_empty() {
            return Err(PlannerError::InvalidRecipe {
                recipe: recipe.id,
                reason: "recipe has no products".to_string(),
            });
        }
        for product in recipe.products.keys() {
            self.by_product
                .entry(product.clone())
                .or_default()
                .push(recipe.id.clone());
        }
        self.recipes.insert(recipe.id.clone(), recipe);
        Ok(())
    }

    pub fn items(&self) -> impl Iterator<Item = &Item> {
        self.items.values()
    }

    pub fn buildings(&self) -> impl Iterator<Item = &Building> {
        self.buildings.values()
    }

    pub fn recipes(&self) -> impl Iterator<Item = &Recipe> {
        self.recipes.values()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty() && self.recipes.is_empty()
    }
}

impl RecipeCatalog for Catalog {
    fn recipes_producing(&self, item: &str) -> Vec<&Recipe> {
        let Some(ids) = self.by_product.get(item) else {
            return Vec::new();
        };
        let mut recipes: Vec<&Recipe> = ids.iter().filter_map(|id| self.recipes.get(id)).collect();
        recipes.sort_by(|a, b| a.id.cmp(&b.id));
        recipes
    }

    fn recipe(&self, id: &str) -> Option<&Recipe> {
        self.recipes.get(id)
    }

    fn is_raw(&self, item: &str) -> bool {
        self.raw.contains(item)
    }

    fn item(&self, name: &str) -> Option<&Item> {
        self.items.get(name)
    }

    fn building(&self, name: &str) -> Option<&Building> {
        self.buildings.get(name)
    }
}
