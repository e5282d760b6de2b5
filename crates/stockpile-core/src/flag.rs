//! Flags the pipeline itself reads or synthesizes.
//!
//! Content may define any number of additional flags via `json_flag`
//! records; the ones listed in [`BUILTIN_FLAGS`] are always known so the
//! post-pass never strips a flag the pre-pass derived.

pub const NO_REPAIR: &str = "NO_REPAIR";
pub const NO_UNLOAD: &str = "NO_UNLOAD";

// Volume exemptions.
pub const AURA: &str = "AURA";
pub const CORPSE: &str = "CORPSE";
pub const IRREMOVABLE: &str = "IRREMOVABLE";
pub const NO_DROP: &str = "NO_DROP";
pub const NO_UNWIELD: &str = "NO_UNWIELD";
pub const PERSONAL: &str = "PERSONAL";
pub const PSEUDO: &str = "PSEUDO";
pub const ZERO_WEIGHT: &str = "ZERO_WEIGHT";

/// Flags exempting an archetype from the nonzero-volume guarantee.
pub const VOLUME_EXEMPT: &[&str] = &[
    AURA,
    CORPSE,
    IRREMOVABLE,
    NO_DROP,
    NO_UNWIELD,
    PERSONAL,
    PSEUDO,
    ZERO_WEIGHT,
];

// Armor layering.
pub const SKINTIGHT: &str = "SKINTIGHT";
pub const WAIST: &str = "WAIST";
pub const OUTER: &str = "OUTER";
pub const BELTED: &str = "BELTED";

// Guns.
pub const RELOAD_ONE: &str = "RELOAD_ONE";
pub const REACH_ATTACK: &str = "REACH_ATTACK";
pub const MELEE: &str = "MELEE";
pub const PRIMITIVE_RANGED_WEAPON: &str = "PRIMITIVE_RANGED_WEAPON";

/// Prefix of the `LIGHT_<n>` light-emission shorthand.
pub const LIGHT_PREFIX: &str = "LIGHT_";

// NPC-implied behavior chain.
pub const DANGEROUS: &str = "DANGEROUS";
pub const BOMB: &str = "BOMB";
pub const NPC_THROW_NOW: &str = "NPC_THROW_NOW";
pub const NPC_THROWN: &str = "NPC_THROWN";
pub const NPC_ACTIVATE: &str = "NPC_ACTIVATE";
pub const NPC_ALT_ATTACK: &str = "NPC_ALT_ATTACK";

// Diet and allergy.
pub const CANNIBALISM: &str = "CANNIBALISM";
pub const CARNIVORE_OK: &str = "CARNIVORE_OK";
pub const URSINE_HONEY: &str = "URSINE_HONEY";
pub const ALLERGEN_WOOL: &str = "ALLERGEN_WOOL";
pub const ALLERGEN_MILK: &str = "ALLERGEN_MILK";
pub const ALLERGEN_EGG: &str = "ALLERGEN_EGG";
pub const ALLERGEN_WHEAT: &str = "ALLERGEN_WHEAT";
pub const ALLERGEN_JUNK: &str = "ALLERGEN_JUNK";
pub const ALLERGEN_VEGGY: &str = "ALLERGEN_VEGGY";
pub const ALLERGEN_FRUIT: &str = "ALLERGEN_FRUIT";
pub const ALLERGEN_NUT: &str = "ALLERGEN_NUT";
pub const ALLERGEN_BREAD: &str = "ALLERGEN_BREAD";
pub const ALLERGEN_CHEESE: &str = "ALLERGEN_CHEESE";

/// Marks archetypes synthesized for ids with no authored definition.
pub const MISSING_DEFINITION: &str = "MISSING_DEFINITION";

/// Every flag the pipeline may derive. Seeded into the flag vocabulary.
pub const BUILTIN_FLAGS: &[&str] = &[
    NO_REPAIR,
    NO_UNLOAD,
    AURA,
    CORPSE,
    IRREMOVABLE,
    NO_DROP,
    NO_UNWIELD,
    PERSONAL,
    PSEUDO,
    ZERO_WEIGHT,
    SKINTIGHT,
    WAIST,
    OUTER,
    BELTED,
    RELOAD_ONE,
    REACH_ATTACK,
    MELEE,
    PRIMITIVE_RANGED_WEAPON,
    DANGEROUS,
    BOMB,
    NPC_THROW_NOW,
    NPC_THROWN,
    NPC_ACTIVATE,
    NPC_ALT_ATTACK,
    CANNIBALISM,
    CARNIVORE_OK,
    URSINE_HONEY,
    ALLERGEN_WOOL,
    ALLERGEN_MILK,
    ALLERGEN_EGG,
    ALLERGEN_WHEAT,
    ALLERGEN_JUNK,
    ALLERGEN_VEGGY,
    ALLERGEN_FRUIT,
    ALLERGEN_NUT,
    ALLERGEN_BREAD,
    ALLERGEN_CHEESE,
    MISSING_DEFINITION,
];

/// Material → diet flag implied by containing that material.
pub const MATERIAL_DIET_FLAGS: &[(&str, &str)] = &[
    ("wool", ALLERGEN_WOOL),
    ("milk", ALLERGEN_MILK),
    ("egg", ALLERGEN_EGG),
    ("wheat", ALLERGEN_WHEAT),
    ("junk", ALLERGEN_JUNK),
    ("veggy", ALLERGEN_VEGGY),
    ("bean", ALLERGEN_VEGGY),
    ("tomato", ALLERGEN_VEGGY),
    ("garlic", ALLERGEN_VEGGY),
    ("mushroom", ALLERGEN_VEGGY),
    ("fruit", ALLERGEN_FRUIT),
    ("nut", ALLERGEN_NUT),
    ("bread", ALLERGEN_BREAD),
    ("cheese", ALLERGEN_CHEESE),
    ("flesh", CARNIVORE_OK),
    ("iflesh", CARNIVORE_OK),
    ("honey", URSINE_HONEY),
];
