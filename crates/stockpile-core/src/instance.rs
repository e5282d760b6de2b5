use crate::id::{FlagId, ItypeId};
use std::collections::{BTreeMap, BTreeSet};

/// A live item produced from an archetype, e.g. by a spawn table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemInstance {
    pub type_id: ItypeId,
    /// Content-variant tag, if the archetype has variants.
    pub variant: Option<String>,
    pub charges: i32,
    pub flags: BTreeSet<FlagId>,
    /// Free-form item variables.
    pub vars: BTreeMap<String, String>,
    pub contents: Vec<ItemInstance>,
}

impl ItemInstance {
    pub fn new(type_id: impl Into<ItypeId>) -> Self {
        Self {
            type_id: type_id.into(),
            variant: None,
            charges: 0,
            flags: BTreeSet::new(),
            vars: BTreeMap::new(),
            contents: Vec::new(),
        }
    }

    pub fn with_charges(mut self, charges: i32) -> Self {
        self.charges = charges;
        self
    }

    /// This item and everything nested inside it, depth first.
    pub fn walk(&self) -> Vec<&ItemInstance> {
        let mut out = vec![self];
        for c in &self.contents {
            out.extend(c.walk());
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn walk_visits_nested_contents() {
        let mut gun = ItemInstance::new("glock_19");
        let mut mag = ItemInstance::new("glockmag");
        mag.contents.push(ItemInstance::new("9mm").with_charges(15));
        gun.contents.push(mag);
        let ids: Vec<&str> = gun.walk().iter().map(|i| i.type_id.as_str()).collect();
        assert_eq!(ids, vec!["glock_19", "glockmag", "9mm"]);
    }
}
