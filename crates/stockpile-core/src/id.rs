use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;

/// Declares a string-backed identifier newtype. Cheap to compare and hash;
/// cloning allocates.
macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            pub fn is_empty(&self) -> bool {
                self.0.is_empty()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }
    };
}

string_id! {
    /// Identifies an item archetype in the catalog.
    ItypeId
}
string_id! {
    /// Identifies an ammunition type (a caliber, not an ammo item).
    AmmoTypeId
}
string_id! {
    /// Identifies a material.
    MaterialId
}
string_id! {
    /// Identifies a string-tagged capability marker.
    FlagId
}
string_id! {
    /// Identifies a tool quality (e.g. `CUT`, `HAMMER`).
    QualityId
}
string_id! {
    SkillId
}
string_id! {
    VitaminId
}
string_id! {
    /// Identifies an item group (spawn table).
    GroupId
}
string_id! {
    RecipeId
}
string_id! {
    /// Identifies a display category.
    CategoryId
}
string_id! {
    FaultId
}
string_id! {
    TechniqueId
}
string_id! {
    MartialArtId
}
string_id! {
    DiseaseId
}
string_id! {
    /// Identifies a vehicle (structure) prototype.
    VehicleId
}
string_id! {
    /// Identifies the content pack that authored a record (the `src` tag).
    ContentSource
}
