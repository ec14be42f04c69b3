// Table Layouts
//
// Caller-facing layout documents and the immutable, versioned
// layouts resolved from them.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::validate::ValidationError;

pub mod diff;

/// Opaque layout version token.
///
/// Tokens assigned by the administrator are decimal counters starting at
/// `"1"`, so the successor of a token is always computable.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LayoutId(String);

impl LayoutId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Id given to the first layout of a table.
    pub fn initial() -> Self {
        Self("1".into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Position of this id in the counter sequence.
    pub fn sequence(&self) -> Option<u64> {
        self.0.parse().ok()
    }

    /// The id that follows this one, if this id is a counter value.
    pub fn next(&self) -> Option<LayoutId> {
        self.sequence()?
            .checked_add(1)
            .map(|n| LayoutId(n.to_string()))
    }
}

impl fmt::Display for LayoutId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for LayoutId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Cell versions retained by a locality group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "MaxVersionsRepr", into = "MaxVersionsRepr")]
pub enum MaxVersions {
    Bounded(u32),
    /// Keep every version ever written.
    Unbounded,
}

impl fmt::Display for MaxVersions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MaxVersions::Bounded(n) => write!(f, "{n}"),
            MaxVersions::Unbounded => f.write_str("unbounded"),
        }
    }
}

/// JSON form of [`MaxVersions`]: a count, or the keyword `"unbounded"`.
#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum MaxVersionsRepr {
    Count(u32),
    Keyword(String),
}

impl TryFrom<MaxVersionsRepr> for MaxVersions {
    type Error = String;

    fn try_from(repr: MaxVersionsRepr) -> Result<Self, Self::Error> {
        match repr {
            MaxVersionsRepr::Count(n) => Ok(MaxVersions::Bounded(n)),
            MaxVersionsRepr::Keyword(word) if word == "unbounded" => Ok(MaxVersions::Unbounded),
            MaxVersionsRepr::Keyword(word) => Err(format!("invalid max_versions `{word}`")),
        }
    }
}

impl From<MaxVersions> for MaxVersionsRepr {
    fn from(value: MaxVersions) -> Self {
        match value {
            MaxVersions::Bounded(n) => MaxVersionsRepr::Count(n),
            MaxVersions::Unbounded => MaxVersionsRepr::Keyword("unbounded".into()),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Compression {
    #[default]
    None,
    Gz,
    Lzo,
    Snappy,
}

fn is_false(value: &bool) -> bool {
    !*value
}

/// Declarative description of a table's schema, as submitted by a caller.
///
/// On updates, every field left unset inherits from the table's current
/// layout.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayoutDocument {
    #[serde(default)]
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default)]
    pub locality_groups: Vec<LocalityGroupSpec>,

    /// Informational; ids are always assigned by the administrator.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layout_id: Option<LayoutId>,

    /// Layout this document was written against.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_layout_id: Option<LayoutId>,
}

impl LayoutDocument {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_locality_group(mut self, group: LocalityGroupSpec) -> Self {
        self.locality_groups.push(group);
        self
    }

    pub fn with_reference(mut self, reference: LayoutId) -> Self {
        self.reference_layout_id = Some(reference);
        self
    }

    pub fn families(&self) -> impl Iterator<Item = &FamilySpec> {
        self.locality_groups.iter().flat_map(|g| g.families.iter())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalityGroupSpec {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_versions: Option<MaxVersions>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl_seconds: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compression: Option<Compression>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub in_memory: Option<bool>,

    #[serde(default)]
    pub families: Vec<FamilySpec>,

    /// Marks the group for removal in an update.
    #[serde(default, skip_serializing_if = "is_false")]
    pub delete: bool,
}

impl LocalityGroupSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn removal(name: impl Into<String>) -> Self {
        Self {
            delete: true,
            ..Self::new(name)
        }
    }

    pub fn max_versions(mut self, max_versions: MaxVersions) -> Self {
        self.max_versions = Some(max_versions);
        self
    }

    pub fn ttl_seconds(mut self, ttl: u64) -> Self {
        self.ttl_seconds = Some(ttl);
        self
    }

    pub fn compression(mut self, compression: Compression) -> Self {
        self.compression = Some(compression);
        self
    }

    pub fn in_memory(mut self, in_memory: bool) -> Self {
        self.in_memory = Some(in_memory);
        self
    }

    pub fn family(mut self, family: FamilySpec) -> Self {
        self.families.push(family);
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FamilySpec {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub columns: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "is_false")]
    pub delete: bool,
}

impl FamilySpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn removal(name: impl Into<String>) -> Self {
        Self {
            delete: true,
            ..Self::new(name)
        }
    }

    pub fn columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns = Some(columns.into_iter().map(Into::into).collect());
        self
    }
}

/// A locality group of a resolved layout. Maps to one physical column
/// family whose storage policy is shared by all of its logical families.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalityGroup {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub max_versions: MaxVersions,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl_seconds: Option<u64>,
    #[serde(default)]
    pub compression: Compression,
    #[serde(default)]
    pub in_memory: bool,
    pub families: Vec<Family>,
}

impl LocalityGroup {
    /// True when both groups would produce the same physical column family.
    pub fn same_storage_policy(&self, other: &LocalityGroup) -> bool {
        self.max_versions == other.max_versions
            && self.ttl_seconds == other.ttl_seconds
            && self.compression == other.compression
            && self.in_memory == other.in_memory
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Family {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub columns: Vec<String>,
}

/// Validated, versioned snapshot of a table layout.
///
/// Never mutated once built; a newer layout supersedes it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "LayoutRecord", into = "LayoutRecord")]
pub struct ResolvedLayout {
    name: String,
    description: Option<String>,
    layout_id: LayoutId,
    reference_layout_id: Option<LayoutId>,
    locality_groups: Vec<LocalityGroup>,
    locality_group_map: HashMap<String, usize>,
    family_map: HashMap<String, (usize, usize)>,
}

impl ResolvedLayout {
    /// Build a layout and its lookup maps. Group and family names must be
    /// unique.
    pub(crate) fn from_parts(
        name: String,
        description: Option<String>,
        layout_id: LayoutId,
        reference_layout_id: Option<LayoutId>,
        locality_groups: Vec<LocalityGroup>,
    ) -> Result<Self, ValidationError> {
        let mut locality_group_map = HashMap::with_capacity(locality_groups.len());
        let mut family_map = HashMap::new();

        for (group_index, group) in locality_groups.iter().enumerate() {
            if locality_group_map
                .insert(group.name.clone(), group_index)
                .is_some()
            {
                return Err(ValidationError::DuplicateLocalityGroup {
                    locality_group: group.name.clone(),
                });
            }
            if group.families.is_empty() {
                return Err(ValidationError::EmptyLocalityGroup {
                    locality_group: group.name.clone(),
                });
            }
            for (family_index, family) in group.families.iter().enumerate() {
                if family_map
                    .insert(family.name.clone(), (group_index, family_index))
                    .is_some()
                {
                    return Err(ValidationError::DuplicateFamily {
                        family: family.name.clone(),
                    });
                }
            }
        }

        Ok(Self {
            name,
            description,
            layout_id,
            reference_layout_id,
            locality_groups,
            locality_group_map,
            family_map,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn layout_id(&self) -> &LayoutId {
        &self.layout_id
    }

    /// Layout this one was resolved against; `None` for a table's first layout.
    pub fn reference_layout_id(&self) -> Option<&LayoutId> {
        self.reference_layout_id.as_ref()
    }

    pub fn locality_groups(&self) -> &[LocalityGroup] {
        &self.locality_groups
    }

    pub fn locality_group(&self, name: &str) -> Option<&LocalityGroup> {
        self.locality_group_map
            .get(name)
            .map(|&i| &self.locality_groups[i])
    }

    pub fn family(&self, name: &str) -> Option<&Family> {
        self.family_map
            .get(name)
            .map(|&(g, f)| &self.locality_groups[g].families[f])
    }

    /// Locality group holding the named family.
    pub fn family_locality_group(&self, family: &str) -> Option<&LocalityGroup> {
        self.family_map
            .get(family)
            .map(|&(g, _)| &self.locality_groups[g])
    }

    /// Versions retained for cells of the named family.
    pub fn family_max_versions(&self, family: &str) -> Option<MaxVersions> {
        self.family_locality_group(family).map(|g| g.max_versions)
    }

    pub fn families(&self) -> impl Iterator<Item = &Family> {
        self.locality_groups.iter().flat_map(|g| g.families.iter())
    }

    pub fn family_count(&self) -> usize {
        self.family_map.len()
    }

    /// Express this layout as a complete document.
    pub fn to_document(&self) -> LayoutDocument {
        LayoutDocument {
            name: self.name.clone(),
            description: self.description.clone(),
            locality_groups: self
                .locality_groups
                .iter()
                .map(|group| LocalityGroupSpec {
                    name: group.name.clone(),
                    description: group.description.clone(),
                    max_versions: Some(group.max_versions),
                    ttl_seconds: group.ttl_seconds,
                    compression: Some(group.compression),
                    in_memory: Some(group.in_memory),
                    families: group
                        .families
                        .iter()
                        .map(|family| FamilySpec {
                            name: family.name.clone(),
                            description: family.description.clone(),
                            columns: Some(family.columns.clone()),
                            delete: false,
                        })
                        .collect(),
                    delete: false,
                })
                .collect(),
            layout_id: Some(self.layout_id.clone()),
            reference_layout_id: self.reference_layout_id.clone(),
        }
    }

    /// Document for editing this layout: a full copy that references it.
    pub fn to_update_document(&self) -> LayoutDocument {
        LayoutDocument {
            layout_id: None,
            reference_layout_id: Some(self.layout_id.clone()),
            ..self.to_document()
        }
    }
}

#[derive(Serialize, Deserialize)]
struct LayoutRecord {
    name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    layout_id: LayoutId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    reference_layout_id: Option<LayoutId>,
    locality_groups: Vec<LocalityGroup>,
}

impl TryFrom<LayoutRecord> for ResolvedLayout {
    type Error = ValidationError;

    fn try_from(record: LayoutRecord) -> Result<Self, Self::Error> {
        ResolvedLayout::from_parts(
            record.name,
            record.description,
            record.layout_id,
            record.reference_layout_id,
            record.locality_groups,
        )
    }
}

impl From<ResolvedLayout> for LayoutRecord {
    fn from(layout: ResolvedLayout) -> Self {
        LayoutRecord {
            name: layout.name,
            description: layout.description,
            layout_id: layout.layout_id,
            reference_layout_id: layout.reference_layout_id,
            locality_groups: layout.locality_groups,
        }
    }
}
