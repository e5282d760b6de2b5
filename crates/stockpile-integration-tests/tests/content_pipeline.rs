//! Content loading through finalization: inheritance, deferral and the
//! fields the finalizer derives from loaded records.

use serde_json::{Value, json};
use stockpile_core::catalog::{BuildReport, Catalog};
use stockpile_core::flag;
use stockpile_core::id::*;
use stockpile_core::pocket::PocketType;
use stockpile_core::slots::{GUN_MODE_DEFAULT, Layer};
use stockpile_core::test_utils::test_catalog;
use stockpile_core::units::Mass;
use stockpile_data::{ContentLoader, LoadError, LoadReport};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Load `records` as the `core` source into a fresh test catalog and
/// finalize it.
fn build(records: Value) -> (Catalog, LoadReport, BuildReport) {
    init_logging();
    let mut catalog = test_catalog();
    let mut loader = ContentLoader::new(&mut catalog);
    let Value::Array(records) = records else {
        panic!("expected a list of records")
    };
    loader
        .load_source(&ContentSource::new("core"), records)
        .unwrap();
    let load = loader.finish().unwrap();
    let build = catalog.finalize().unwrap();
    (catalog, load, build)
}

#[test]
fn wool_jacket_is_clothing() {
    let (catalog, load, _) = build(json!([{
        "type": "ARMOR",
        "id": "jacket",
        "name": {"str": "wool jacket"},
        "weight": "800 g",
        "volume": "2500 ml",
        "material": [{"type": "wool", "portion": 100}],
        "warmth": 30
    }]));
    assert!(load.is_clean(), "{:?}", load.errors);

    let jacket = catalog.lookup(&ItypeId::new("jacket")).unwrap();
    assert_eq!(jacket.category.as_str(), "clothing");
    assert!(jacket.has_flag(flag::ALLERGEN_WOOL));
    let armor = jacket.armor.as_ref().unwrap();
    assert_eq!(armor.layer, Layer::Regular);
    assert_eq!(armor.warmth, 30);
    assert_eq!(jacket.name.plural, "wool jackets");
}

#[test]
fn single_shot_legacy_gun() {
    let (catalog, load, _) = build(json!([{
        "type": "GUN",
        "id": "pipe_shotgun",
        "skill": "shotgun",
        "ammo": ["shotgun_shell"],
        "weight": 2100,
        "volume": "1500 ml"
    }]));
    assert!(load.is_clean(), "{:?}", load.errors);

    let gun = catalog.lookup(&ItypeId::new("pipe_shotgun")).unwrap();
    assert_eq!(gun.pockets.len(), 1);
    assert_eq!(gun.pockets[0].pocket_type, PocketType::Magazine);
    assert_eq!(gun.ammo_capacity(&AmmoTypeId::new("shotgun_shell")), 1);
    assert_eq!(
        gun.gun.as_ref().unwrap().modes[GUN_MODE_DEFAULT].name,
        "manual"
    );
    assert_eq!(gun.category.as_str(), "guns");
}

#[test]
fn magazine_fed_gun_gets_default_magazine() {
    let (catalog, load, _) = build(json!([
        {
            "type": "GUN", "id": "glock_19", "skill": "pistol", "ammo": ["9mm"],
            "magazines": [["9mm", ["glockmag", "glockbigmag"]]]
        },
        {"type": "MAGAZINE", "id": "glockmag", "ammo_type": ["9mm"], "capacity": 15},
        {"type": "MAGAZINE", "id": "glockbigmag", "ammo_type": ["9mm"], "capacity": 30}
    ]));
    assert!(load.is_clean(), "{:?}", load.errors);

    let glock = catalog.lookup(&ItypeId::new("glock_19")).unwrap();
    assert!(glock.uses_magazine());
    assert_eq!(
        glock.magazine_default[&AmmoTypeId::new("9mm")],
        ItypeId::new("glockmag")
    );
    assert_eq!(glock.magazines[&AmmoTypeId::new("9mm")].len(), 2);

    let mag = catalog.lookup(&ItypeId::new("glockmag")).unwrap();
    assert_eq!(mag.ammo_capacity(&AmmoTypeId::new("9mm")), 15);
    assert_eq!(
        mag.magazine.as_ref().unwrap().default_ammo,
        Some(ItypeId::new("9mm_fmj"))
    );
}

#[test]
fn children_inherit_and_override() {
    let (catalog, load, _) = build(json!([
        {"type": "json_flag", "id": "BELT_CLIP"},
        {"type": "json_flag", "id": "NONCONDUCTIVE"},
        {"type": "tool_quality", "id": "HAMMER", "name": "hammering"},
        {
            "type": "TOOL", "abstract": "hammer_base",
            "weight": 500, "volume": "750 ml",
            "flags": ["BELT_CLIP"], "qualities": [["HAMMER", 1]]
        },
        {
            "type": "TOOL", "id": "hammer", "copy-from": "hammer_base",
            "name": "hammer"
        },
        {
            "type": "TOOL", "id": "sledge", "copy-from": "hammer",
            "proportional": {"weight": 4.0},
            "extend": {"flags": ["NONCONDUCTIVE"]},
            "delete": {"flags": ["BELT_CLIP"]}
        }
    ]));
    assert!(load.is_clean(), "{:?}", load.errors);

    let hammer = catalog.lookup(&ItypeId::new("hammer")).unwrap();
    assert_eq!(hammer.weight, Mass(500));
    assert!(hammer.has_flag("BELT_CLIP"));
    assert_eq!(hammer.looks_like, Some(ItypeId::new("hammer_base")));
    assert_eq!(hammer.qualities[&QualityId::new("HAMMER")], 1);

    let sledge = catalog.lookup(&ItypeId::new("sledge")).unwrap();
    assert_eq!(sledge.weight, Mass(2000));
    assert!(sledge.has_flag("NONCONDUCTIVE"));
    assert!(!sledge.has_flag("BELT_CLIP"));

    assert!(!catalog.has(&ItypeId::new("hammer_base")));
}

#[test]
fn copy_from_resolves_across_declaration_order() {
    let (catalog, load, _) = build(json!([
        {"type": "COMESTIBLE", "id": "apple_pie", "copy-from": "pie", "calories": 600},
        {"type": "COMESTIBLE", "id": "pie", "copy-from": "pastry", "fun": 5},
        {"type": "COMESTIBLE", "id": "pastry", "comestible_type": "FOOD", "calories": 300, "weight": 120}
    ]));
    assert!(load.is_clean(), "{:?}", load.errors);
    assert_eq!(load.deferred, 2);
    assert_eq!(load.drained, 2);

    let pie = catalog.lookup(&ItypeId::new("apple_pie")).unwrap();
    assert_eq!(pie.weight, Mass(120));
    let food = pie.comestible.as_ref().unwrap();
    assert_eq!(food.calories, 600);
    assert_eq!(food.fun, 5);
}

#[test]
fn unresolved_base_is_reported_and_skipped() {
    let (catalog, load, _) = build(json!([
        {"type": "GENERIC", "id": "rock", "weight": 250},
        {"type": "GENERIC", "id": "pebble", "copy-from": "boulder"}
    ]));
    assert_eq!(load.errors.len(), 1);
    assert!(matches!(
        &load.errors[0],
        LoadError::Unresolved { id, base } if id == "pebble" && base == "boulder"
    ));
    assert!(catalog.has(&ItypeId::new("rock")));
    assert!(!catalog.has(&ItypeId::new("pebble")));
}

#[test]
fn later_source_overrides_earlier_definition() {
    init_logging();
    let mut catalog = test_catalog();
    let mut loader = ContentLoader::new(&mut catalog);
    loader
        .load_source(
            &ContentSource::new("core"),
            vec![json!({"type": "GENERIC", "id": "rock", "weight": 250, "price": 10})],
        )
        .unwrap();
    loader
        .load_source(
            &ContentSource::new("big_rocks"),
            vec![json!({"type": "GENERIC", "id": "rock", "copy-from": "rock", "weight": 900})],
        )
        .unwrap();
    assert!(loader.finish().unwrap().is_clean());
    catalog.finalize().unwrap();

    let rock = catalog.lookup(&ItypeId::new("rock")).unwrap();
    assert_eq!(rock.weight, Mass(900));
    assert_eq!(rock.price, 10);
    assert_eq!(
        rock.src,
        vec![ContentSource::new("core"), ContentSource::new("big_rocks")]
    );
}
