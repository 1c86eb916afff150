//! Built-in sample catalog for trying the planner without game data

use crate::catalog::Catalog;
use crate::error::Result;
use crate::models::{
    Building, ExtractorTier, Item, ItemForm, PlanRequest, ProductionGoal, Purity, Recipe,
    RecipeSelection, ResourceInput,
};

fn building(name: &str, power_mw: f64, cost: &[(&str, f64)]) -> Building {
    let mut b = Building::new(name, power_mw);
    for (item, quantity) in cost {
        b.build_cost.insert(item.to_string(), *quantity);
    }
    b
}

/// Iron, copper, limestone and steel chains with a few alternates
pub fn sample_catalog() -> Result<Catalog> {
    let mut c = Catalog::new();

    c.insert_raw(Item::new("IronOre", "ore", 1.0));
    c.insert_raw(Item::new("CopperOre", "ore", 3.0));
    c.insert_raw(Item::new("Limestone", "ore", 2.0));
    c.insert_raw(Item::new("Coal", "ore", 3.0));
    c.insert_raw(Item {
        form: ItemForm::Liquid,
        ..Item::new("Water", "fluid", 0.0)
    });

    for (name, category, points) in [
        ("IronIngot", "ingot", 2.0),
        ("CopperIngot", "ingot", 6.0),
        ("SteelIngot", "ingot", 8.0),
        ("IronPlate", "part", 6.0),
        ("IronRod", "part", 4.0),
        ("Screw", "part", 2.0),
        ("Wire", "part", 6.0),
        ("Cable", "part", 24.0),
        ("Concrete", "part", 12.0),
        ("ReinforcedIronPlate", "component", 120.0),
        ("Rotor", "component", 140.0),
        ("ModularFrame", "component", 408.0),
    ] {
        c.insert_item(Item::new(name, category, points));
    }

    c.insert_building(building("Smelter", 4.0, &[("IronRod", 5.0), ("Wire", 8.0)]));
    c.insert_building(building(
        "Constructor",
        4.0,
        &[("ReinforcedIronPlate", 2.0), ("Cable", 8.0)],
    ));
    c.insert_building(building(
        "Assembler",
        15.0,
        &[("ReinforcedIronPlate", 8.0), ("Rotor", 4.0), ("Cable", 10.0)],
    ));
    c.insert_building(building(
        "Foundry",
        16.0,
        &[("ModularFrame", 10.0), ("Rotor", 10.0), ("Concrete", 20.0)],
    ));
    c.insert_building(building(
        "Refinery",
        30.0,
        &[("ModularFrame", 10.0), ("Concrete", 20.0), ("Cable", 20.0)],
    ));

    let recipes = [
        Recipe::new("iron_ingot", "Iron Ingot", "Smelter")
            .duration(2.0)
            .ingredient("IronOre", 1.0)
            .product("IronIngot", 1.0),
        Recipe::new("alt_pure_iron_ingot", "Alternate: Pure Iron Ingot", "Refinery")
            .duration(12.0)
            .ingredient("IronOre", 7.0)
            .ingredient("Water", 4.0)
            .product("IronIngot", 13.0)
            .alternate(),
        Recipe::new("copper_ingot", "Copper Ingot", "Smelter")
            .duration(2.0)
            .ingredient("CopperOre", 1.0)
            .product("CopperIngot", 1.0),
        Recipe::new("steel_ingot", "Steel Ingot", "Foundry")
            .duration(4.0)
            .ingredient("IronOre", 3.0)
            .ingredient("Coal", 3.0)
            .product("SteelIngot", 3.0),
        Recipe::new("iron_plate", "Iron Plate", "Constructor")
            .duration(6.0)
            .ingredient("IronIngot", 3.0)
            .product("IronPlate", 2.0),
        Recipe::new("iron_rod", "Iron Rod", "Constructor")
            .duration(4.0)
            .ingredient("IronIngot", 1.0)
            .product("IronRod", 1.0),
        Recipe::new("alt_steel_rod", "Alternate: Steel Rod", "Constructor")
            .duration(5.0)
            .ingredient("SteelIngot", 1.0)
            .product("IronRod", 4.0)
            .alternate(),
        Recipe::new("screw", "Screw", "Constructor")
            .duration(6.0)
            .ingredient("IronRod", 1.0)
            .product("Screw", 4.0),
        Recipe::new("alt_cast_screw", "Alternate: Cast Screw", "Constructor")
            .duration(24.0)
            .ingredient("IronIngot", 5.0)
            .product("Screw", 20.0)
            .alternate(),
        Recipe::new("wire", "Wire", "Constructor")
            .duration(4.0)
            .ingredient("CopperIngot", 1.0)
            .product("Wire", 2.0),
        Recipe::new("cable", "Cable", "Constructor")
            .duration(2.0)
            .ingredient("Wire", 2.0)
            .product("Cable", 1.0),
        Recipe::new("concrete", "Concrete", "Constructor")
            .duration(4.0)
            .ingredient("Limestone", 3.0)
            .product("Concrete", 1.0),
        Recipe::new("reinforced_iron_plate", "Reinforced Iron Plate", "Assembler")
            .duration(12.0)
            .ingredient("IronPlate", 6.0)
            .ingredient("Screw", 12.0)
            .product("ReinforcedIronPlate", 1.0),
        Recipe::new("rotor", "Rotor", "Assembler")
            .duration(15.0)
            .ingredient("IronRod", 5.0)
            .ingredient("Screw", 25.0)
            .product("Rotor", 1.0),
        Recipe::new("modular_frame", "Modular Frame", "Assembler")
            .duration(60.0)
            .ingredient("ReinforcedIronPlate", 3.0)
            .ingredient("IronRod", 12.0)
            .product("ModularFrame", 2.0),
    ];
    for recipe in recipes {
        c.insert_recipe(recipe)?;
    }

    Ok(c)
}

/// Reinforced plates and rotors from two iron nodes and a copper node
pub fn sample_request() -> PlanRequest {
    PlanRequest {
        inputs: vec![
            ResourceInput::miner("IronOre", ExtractorTier::Mk2, Purity::Normal),
            ResourceInput::miner("IronOre", ExtractorTier::Mk1, Purity::Pure),
            ResourceInput::miner("CopperOre", ExtractorTier::Mk1, Purity::Normal),
        ],
        goals: vec![
            ProductionGoal::new("ReinforcedIronPlate", 5.0),
            ProductionGoal::new("Rotor", 4.0),
            ProductionGoal::new("Cable", 15.0),
        ],
        recipes: RecipeSelection::new().with("Screw", &["alt_cast_screw"]),
        belt_limit: None,
    }
}
