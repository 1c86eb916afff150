//! Raw-resource cost propagation
//!
//! Expands an item into the raw resources needed to make it under the active
//! recipe selection. Per-unit results are memoized under the item and the
//! selection's signature, so a lookup can never return a vector computed for a
//! different selection even before the cache is cleared.

use std::collections::{BTreeMap, HashMap};
use std::time::{Duration, Instant};

use crate::catalog::RecipeCatalog;
use crate::error::{PlannerError, Result};
use crate::models::{Recipe, RecipeSelection};

/// Raw resource name -> quantity.
pub type CostVector = BTreeMap<String, f64>;

#[derive(Debug)]
struct CachedCost {
    per_unit: CostVector,
    stored_at: Instant,
}

/// Per-unit cost memo keyed by (item, selection signature).
///
/// Expiry only bounds memory; correctness comes from the signature key.
#[derive(Debug)]
pub struct CostCache {
    entries: HashMap<(String, String), CachedCost>,
    ttl: Duration,
}

impl CostCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: HashMap::new(),
            ttl,
        }
    }

    fn get(&mut self, item: &str, signature: &str) -> Option<&CostVector> {
        let key = (item.to_string(), signature.to_string());
        let expired = self
            .entries
            .get(&key)
            .is_some_and(|e| e.stored_at.elapsed() > self.ttl);
        if expired {
            self.entries.remove(&key);
            return None;
        }
        self.entries.get(&key).map(|e| &e.per_unit)
    }

    fn insert(&mut self, item: &str, signature: &str, per_unit: CostVector) {
        self.entries.insert(
            (item.to_string(), signature.to_string()),
            CachedCost {
                per_unit,
                stored_at: Instant::now(),
            },
        );
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

pub struct CostPropagator<'a, C: RecipeCatalog + ?Sized> {
    catalog: &'a C,
    selection: RecipeSelection,
    signature: String,
    cache: CostCache,
}

impl<'a, C: RecipeCatalog + ?Sized> CostPropagator<'a, C> {
    pub fn new(catalog: &'a C, selection: RecipeSelection, cache_ttl: Duration) -> Self {
        Self::with_cache(catalog, selection, CostCache::new(cache_ttl))
    }

    /// Reuse a memo that outlives a single propagator.
    pub fn with_cache(catalog: &'a C, selection: RecipeSelection, cache: CostCache) -> Self {
        let signature = selection.signature();
        Self {
            catalog,
            selection,
            signature,
            cache,
        }
    }

    pub fn into_cache(self) -> CostCache {
        self.cache
    }

    /// Swap the active selection. The memo is dropped along with it.
    pub fn set_selection(&mut self, selection: RecipeSelection) {
        self.signature = selection.signature();
        self.selection = selection;
        self.clear_cache();
    }

    pub fn clear_cache(&mut self) {
        tracing::debug!(entries = self.cache.len(), "clearing cost cache");
        self.cache.clear();
    }

    pub fn cached_entries(&self) -> usize {
        self.cache.len()
    }

    /// Raw resources needed to make `quantity` of `item`.
    pub fn raw_cost(&mut self, item: &str, quantity: f64) -> Result<CostVector> {
        let unit = self.unit_cost(item)?;
        Ok(unit
            .into_iter()
            .map(|(raw, per_unit)| (raw, per_unit * quantity))
            .collect())
    }

    /// Raw resources needed to make one unit of `item`.
    pub fn unit_cost(&mut self, item: &str) -> Result<CostVector> {
        let mut path = Vec::new();
        self.unit_cost_on_path(item, &mut path)
    }

    fn unit_cost_on_path(&mut self, item: &str, path: &mut Vec<String>) -> Result<CostVector> {
        if self.catalog.is_raw(item) {
            return Ok(CostVector::from([(item.to_string(), 1.0)]));
        }
        if path.iter().any(|p| p == item) {
            let mut cycle = path.clone();
            cycle.push(item.to_string());
            return Err(PlannerError::CircularDependency(cycle));
        }
        if let Some(hit) = self.cache.get(item, &self.signature) {
            tracing::trace!(item, "cost cache hit");
            return Ok(hit.clone());
        }

        let catalog = self.catalog;
        let Some(recipe) = catalog.active_recipe(item, &self.selection) else {
            // Imported goods with no recipe count as their own leaf.
            return Ok(CostVector::from([(item.to_string(), 1.0)]));
        };
        let total = self.expand_recipe(recipe, item, path)?;
        self.cache.insert(item, &self.signature, total.clone());
        Ok(total)
    }

    /// Raw resources needed to make `quantity` of `item` through a specific
    /// recipe, regardless of what the selection would pick for `item` itself.
    pub fn recipe_cost(&mut self, recipe: &Recipe, item: &str, quantity: f64) -> Result<CostVector> {
        let mut path = Vec::new();
        let unit = self.expand_recipe(recipe, item, &mut path)?;
        Ok(unit
            .into_iter()
            .map(|(raw, per_unit)| (raw, per_unit * quantity))
            .collect())
    }

    fn expand_recipe(
        &mut self,
        recipe: &Recipe,
        item: &str,
        path: &mut Vec<String>,
    ) -> Result<CostVector> {
        let produced = checked_product_quantity(recipe, item)?;

        path.push(item.to_string());
        let mut total = CostVector::new();
        for (ingredient, quantity) in &recipe.ingredients {
            let sub = self.unit_cost_on_path(ingredient, path)?;
            let ratio = quantity / produced;
            for (raw, amount) in sub {
                *total.entry(raw).or_default() += amount * ratio;
            }
        }
        path.pop();
        Ok(total)
    }
}

/// Per-cycle output of `item`, rejecting recipes that would divide by zero.
pub fn checked_product_quantity(recipe: &Recipe, item: &str) -> Result<f64> {
    let produced = recipe.product_quantity(item);
    if produced.is_finite() && produced > 0.0 {
        Ok(produced)
    } else {
        Err(PlannerError::InvalidRecipe {
            recipe: recipe.name.clone(),
            reason: format!("produces {} of {} per cycle", produced, item),
        })
    }
}
