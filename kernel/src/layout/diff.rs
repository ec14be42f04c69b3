// Layout Diff
//
// Structural difference between two resolved layouts. The physical
// store only acts on locality group changes; family changes are
// logical and live in the meta table alone.

use serde::Serialize;

use crate::layout::{LocalityGroup, ResolvedLayout};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LayoutDiff {
    pub added_locality_groups: Vec<LocalityGroup>,
    pub removed_locality_groups: Vec<String>,
    /// New definitions of groups whose storage policy changed.
    pub modified_locality_groups: Vec<LocalityGroup>,
    pub added_families: Vec<String>,
    pub removed_families: Vec<String>,
}

impl LayoutDiff {
    /// Changes needed to go from `old` to `new`. A missing `old` layout
    /// yields a diff that adds everything.
    pub fn between(old: Option<&ResolvedLayout>, new: &ResolvedLayout) -> Self {
        let mut diff = LayoutDiff::default();

        for group in new.locality_groups() {
            match old.and_then(|o| o.locality_group(&group.name)) {
                None => diff.added_locality_groups.push(group.clone()),
                Some(previous) if !previous.same_storage_policy(group) => {
                    diff.modified_locality_groups.push(group.clone())
                }
                Some(_) => {}
            }
        }

        for family in new.families() {
            if old.and_then(|o| o.family(&family.name)).is_none() {
                diff.added_families.push(family.name.clone());
            }
        }

        if let Some(old) = old {
            for group in old.locality_groups() {
                if new.locality_group(&group.name).is_none() {
                    diff.removed_locality_groups.push(group.name.clone());
                }
            }
            for family in old.families() {
                if new.family(&family.name).is_none() {
                    diff.removed_families.push(family.name.clone());
                }
            }
        }

        diff
    }

    pub fn is_empty(&self) -> bool {
        !self.touches_physical()
            && self.added_families.is_empty()
            && self.removed_families.is_empty()
    }

    /// Whether applying this diff requires altering physical column families.
    pub fn touches_physical(&self) -> bool {
        !self.added_locality_groups.is_empty()
            || !self.removed_locality_groups.is_empty()
            || !self.modified_locality_groups.is_empty()
    }
}
