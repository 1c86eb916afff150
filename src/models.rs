//! Data models for items, buildings, recipes and production plans

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Physical form of an item. Fluids are measured in m³ instead of units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemForm {
    #[default]
    Solid,
    Liquid,
    Gas,
}

impl ItemForm {
    pub fn as_str(self) -> &'static str {
        match self {
            ItemForm::Solid => "solid",
            ItemForm::Liquid => "liquid",
            ItemForm::Gas => "gas",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "liquid" => ItemForm::Liquid,
            "gas" => ItemForm::Gas,
            _ => ItemForm::Solid,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub name: String,
    pub category: String,
    pub sink_value: f64, // 0 = cannot be sunk
    #[serde(default)]
    pub form: ItemForm,
}

impl Item {
    pub fn new(name: impl Into<String>, category: impl Into<String>, sink_value: f64) -> Self {
        Self {
            name: name.into(),
            category: category.into(),
            sink_value,
            form: ItemForm::Solid,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Building {
    pub name: String,
    pub power_mw: f64,
    #[serde(default)]
    pub build_cost: BTreeMap<String, f64>,
}

impl Building {
    pub fn new(name: impl Into<String>, power_mw: f64) -> Self {
        Self {
            name: name.into(),
            power_mw,
            build_cost: BTreeMap::new(),
        }
    }
}

/// A conversion performed by one machine per cycle.
///
/// Quantities are per cycle; `duration_secs` turns them into per-minute
/// rates for machine counts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recipe {
    pub id: String,
    pub name: String,
    pub building: String,
    pub duration_secs: f64,
    pub ingredients: BTreeMap<String, f64>,
    pub products: BTreeMap<String, f64>,
    #[serde(default)]
    pub alternate: bool,
}

impl Recipe {
    /// Start a recipe with a one minute cycle and no ingredients or products.
    pub fn new(id: impl Into<String>, name: impl Into<String>, building: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            building: building.into(),
            duration_secs: 60.0,
            ingredients: BTreeMap::new(),
            products: BTreeMap::new(),
            alternate: false,
        }
    }

    pub fn duration(mut self, secs: f64) -> Self {
        self.duration_secs = secs;
        self
    }

    pub fn ingredient(mut self, item: impl Into<String>, quantity: f64) -> Self {
        self.ingredients.insert(item.into(), quantity);
        self
    }

    pub fn product(mut self, item: impl Into<String>, quantity: f64) -> Self {
        self.products.insert(item.into(), quantity);
        self
    }

    pub fn alternate(mut self) -> Self {
        self.alternate = true;
        self
    }

    /// Quantity of `item` produced per cycle, 0 when the recipe does not make it.
    pub fn product_quantity(&self, item: &str) -> f64 {
        self.products.get(item).copied().unwrap_or(0.0)
    }

    pub fn produces(&self, item: &str) -> bool {
        self.product_quantity(item) > 0.0
    }

    /// Output of `item` per minute for a single machine.
    pub fn output_per_minute(&self, item: &str) -> f64 {
        if self.duration_secs <= 0.0 {
            return 0.0;
        }
        self.product_quantity(item) * 60.0 / self.duration_secs
    }
}

/// Miner tier; the base rate is the normal-purity output per minute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ExtractorTier {
    #[default]
    Mk1,
    Mk2,
    Mk3,
}

impl ExtractorTier {
    pub const MAX_BASE_RATE: f64 = 240.0;

    pub fn base_rate(self) -> f64 {
        match self {
            ExtractorTier::Mk1 => 60.0,
            ExtractorTier::Mk2 => 120.0,
            ExtractorTier::Mk3 => Self::MAX_BASE_RATE,
        }
    }

    pub fn next(self) -> Option<Self> {
        match self {
            ExtractorTier::Mk1 => Some(ExtractorTier::Mk2),
            ExtractorTier::Mk2 => Some(ExtractorTier::Mk3),
            ExtractorTier::Mk3 => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Purity {
    Impure,
    #[default]
    Normal,
    Pure,
}

impl Purity {
    pub fn multiplier(self) -> f64 {
        match self {
            Purity::Impure => 0.5,
            Purity::Normal => 1.0,
            Purity::Pure => 2.0,
        }
    }
}

/// A raw resource source feeding the factory
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceInput {
    pub resource: String,
    #[serde(default)]
    pub tier: ExtractorTier,
    #[serde(default)]
    pub purity: Purity,
    /// Explicit per-minute rate for sources that are not miners (wells, imports).
    #[serde(default)]
    pub rate: Option<f64>,
}

impl ResourceInput {
    pub fn miner(resource: impl Into<String>, tier: ExtractorTier, purity: Purity) -> Self {
        Self {
            resource: resource.into(),
            tier,
            purity,
            rate: None,
        }
    }

    pub fn fixed(resource: impl Into<String>, rate: f64) -> Self {
        Self {
            resource: resource.into(),
            tier: ExtractorTier::default(),
            purity: Purity::default(),
            rate: Some(rate),
        }
    }

    /// Per-minute rate before belt capping.
    pub fn effective_rate(&self) -> f64 {
        self.rate
            .unwrap_or_else(|| self.tier.base_rate() * self.purity.multiplier())
    }

    pub fn capped_rate(&self, belt_limit: f64) -> f64 {
        self.effective_rate().max(0.0).min(belt_limit)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductionGoal {
    pub item: String,
    pub rate: f64, // per minute
}

impl ProductionGoal {
    pub fn new(item: impl Into<String>, rate: f64) -> Self {
        Self {
            item: item.into(),
            rate,
        }
    }
}

/// Item name -> ordered list of enabled recipe ids.
///
/// An item with no entry (or an empty list) uses the catalog's default recipe.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecipeSelection(BTreeMap<String, Vec<String>>);

impl RecipeSelection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, item: impl Into<String>, recipe_ids: &[&str]) -> Self {
        self.set(item, recipe_ids.iter().map(|s| s.to_string()).collect());
        self
    }

    pub fn set(&mut self, item: impl Into<String>, recipe_ids: Vec<String>) {
        let item = item.into();
        if recipe_ids.is_empty() {
            self.0.remove(&item);
        } else {
            self.0.insert(item, recipe_ids);
        }
    }

    pub fn get(&self, item: &str) -> &[String] {
        self.0.get(item).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Vec<String>)> {
        self.0.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Deterministic fingerprint covering every item's selected recipes.
    pub fn signature(&self) -> String {
        let mut sig = String::new();
        for (item, ids) in &self.0 {
            let mut ids: Vec<&str> = ids.iter().map(String::as_str).collect();
            ids.sort_unstable();
            sig.push_str(item);
            sig.push('=');
            sig.push_str(&ids.join(","));
            sig.push(';');
        }
        sig
    }
}

/// Everything a single solve needs from the caller
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlanRequest {
    pub inputs: Vec<ResourceInput>,
    pub goals: Vec<ProductionGoal>,
    #[serde(default)]
    pub recipes: RecipeSelection,
    #[serde(default)]
    pub belt_limit: Option<f64>,
}

/// One row of the final plan
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConsolidatedStep {
    pub item: String,
    pub rate: f64,
    pub machine_count: f64,
    pub recipe_id: String,
    pub recipe_name: String,
    pub building: String,
    pub power_mw: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SinkResult {
    pub item: String,
    pub amount: f64,
    pub points: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GoalOutcome {
    pub item: String,
    pub target: f64,
    pub achieved: f64,
}

/// Result of a successful solve
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlanResult {
    pub steps: Vec<ConsolidatedStep>,
    pub sink: Option<SinkResult>,
    pub goals: Vec<GoalOutcome>,
    pub leftover: BTreeMap<String, f64>,
    pub iterations: usize,
}

impl PlanResult {
    pub fn total_power_mw(&self) -> f64 {
        self.steps.iter().map(|s| s.power_mw).sum()
    }

    pub fn achieved(&self, item: &str) -> f64 {
        self.goals
            .iter()
            .filter(|g| g.item == item)
            .map(|g| g.achieved)
            .sum()
    }

    pub fn step(&self, item: &str) -> Option<&ConsolidatedStep> {
        self.steps.iter().find(|s| s.item == item)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    /// Classify a shortfall fraction (shortfall / required).
    pub fn from_fraction(fraction: f64) -> Self {
        if fraction > 0.5 {
            Severity::Critical
        } else if fraction > 0.3 {
            Severity::High
        } else if fraction > 0.1 {
            Severity::Medium
        } else {
            Severity::Low
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Bottleneck {
    pub item: String,
    pub required: f64,
    pub available: f64,
    pub shortfall: f64,
    pub shortfall_fraction: f64,
    pub severity: Severity,
    pub suggestions: Vec<String>,
}
