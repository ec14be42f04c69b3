// Layout Version Resolution
//
// Turns a layout document into the next resolved layout of a table:
// checks the document's reference layout against the current one,
// merges partial updates, and assigns the next layout id.

use crate::layout::{
    Family, FamilySpec, LayoutDocument, LayoutId, LocalityGroup, LocalityGroupSpec,
    ResolvedLayout,
};
use crate::validate::{LayoutValidator, ValidationError};

fn describe(id: &Option<LayoutId>) -> String {
    match id {
        Some(id) => format!("`{id}`"),
        None => "none".into(),
    }
}

/// A layout update was written against a layout that is no longer current.
///
/// Callers must fetch the current layout and resubmit.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
#[error(
    "reference layout mismatch on table `{table}`: current layout is {}, reference is {}",
    describe(.current),
    describe(.reference)
)]
pub struct ConcurrencyError {
    pub table: String,
    pub current: Option<LayoutId>,
    pub reference: Option<LayoutId>,
}

#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum LayoutError {
    #[error("invalid layout: {0}")]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Concurrency(#[from] ConcurrencyError),
}

/// Resolves documents against a table's current layout.
#[derive(Default)]
pub struct LayoutResolver {
    validator: LayoutValidator,
}

impl LayoutResolver {
    pub fn new(validator: LayoutValidator) -> Self {
        Self { validator }
    }

    pub fn validator(&self) -> &LayoutValidator {
        &self.validator
    }

    /// Resolve `doc` for `table`.
    ///
    /// With no current layout the document must not carry a reference
    /// layout; otherwise its reference must equal the current layout id.
    pub fn resolve(
        &self,
        table: &str,
        doc: &LayoutDocument,
        current: Option<&ResolvedLayout>,
    ) -> Result<ResolvedLayout, LayoutError> {
        self.validator.validate(doc)?;

        if doc.name != table {
            return Err(ValidationError::TableNameMismatch {
                table: table.to_string(),
                document: doc.name.clone(),
            }
            .into());
        }

        let current_id = current.map(|c| c.layout_id().clone());
        if doc.reference_layout_id != current_id {
            return Err(ConcurrencyError {
                table: table.to_string(),
                current: current_id,
                reference: doc.reference_layout_id.clone(),
            }
            .into());
        }

        let (layout_id, groups, description) = match current {
            None => (
                LayoutId::initial(),
                merge_locality_groups(&[], &doc.locality_groups)?,
                doc.description.clone(),
            ),
            Some(current) => {
                let next = current
                    .layout_id()
                    .next()
                    .ok_or_else(|| ValidationError::InvalidLayoutId(current.layout_id().clone()))?;
                (
                    next,
                    merge_locality_groups(current.locality_groups(), &doc.locality_groups)?,
                    doc.description
                        .clone()
                        .or_else(|| current.description().map(str::to_string)),
                )
            }
        };

        let resolved = ResolvedLayout::from_parts(
            table.to_string(),
            description,
            layout_id,
            current_id,
            groups,
        )?;
        self.validator.validate(&resolved.to_document())?;
        Ok(resolved)
    }
}

/// Resolve with the built-in validation rules.
pub fn resolve(
    table: &str,
    doc: &LayoutDocument,
    current: Option<&ResolvedLayout>,
) -> Result<ResolvedLayout, LayoutError> {
    LayoutResolver::default().resolve(table, doc, current)
}

/// Apply group specs on top of the current groups. Groups not named in
/// `updates` are carried forward unchanged.
fn merge_locality_groups(
    current: &[LocalityGroup],
    updates: &[LocalityGroupSpec],
) -> Result<Vec<LocalityGroup>, ValidationError> {
    let mut groups = current.to_vec();

    for spec in updates {
        let position = groups.iter().position(|g| g.name == spec.name);
        match (position, spec.delete) {
            (Some(i), true) => {
                groups.remove(i);
            }
            (None, true) => {
                return Err(ValidationError::UnknownLocalityGroup {
                    locality_group: spec.name.clone(),
                })
            }
            (Some(i), false) => {
                let merged = merge_locality_group(&groups[i], spec)?;
                groups[i] = merged;
            }
            (None, false) => groups.push(new_locality_group(spec)?),
        }
    }

    Ok(groups)
}

fn merge_locality_group(
    current: &LocalityGroup,
    spec: &LocalityGroupSpec,
) -> Result<LocalityGroup, ValidationError> {
    Ok(LocalityGroup {
        name: current.name.clone(),
        description: spec
            .description
            .clone()
            .or_else(|| current.description.clone()),
        max_versions: spec.max_versions.unwrap_or(current.max_versions),
        ttl_seconds: spec.ttl_seconds.or(current.ttl_seconds),
        compression: spec.compression.unwrap_or(current.compression),
        in_memory: spec.in_memory.unwrap_or(current.in_memory),
        families: merge_families(&current.families, &spec.families)?,
    })
}

fn new_locality_group(spec: &LocalityGroupSpec) -> Result<LocalityGroup, ValidationError> {
    let max_versions = spec
        .max_versions
        .ok_or_else(|| ValidationError::MissingMaxVersions {
            locality_group: spec.name.clone(),
        })?;
    if spec.families.is_empty() {
        return Err(ValidationError::EmptyLocalityGroup {
            locality_group: spec.name.clone(),
        });
    }

    Ok(LocalityGroup {
        name: spec.name.clone(),
        description: spec.description.clone(),
        max_versions,
        ttl_seconds: spec.ttl_seconds,
        compression: spec.compression.unwrap_or_default(),
        in_memory: spec.in_memory.unwrap_or(false),
        families: merge_families(&[], &spec.families)?,
    })
}

fn merge_families(
    current: &[Family],
    updates: &[FamilySpec],
) -> Result<Vec<Family>, ValidationError> {
    let mut families = current.to_vec();

    for spec in updates {
        let position = families.iter().position(|f| f.name == spec.name);
        match (position, spec.delete) {
            (Some(i), true) => {
                families.remove(i);
            }
            (None, true) => {
                return Err(ValidationError::UnknownFamily {
                    family: spec.name.clone(),
                })
            }
            (Some(i), false) => {
                let family = &mut families[i];
                if let Some(description) = &spec.description {
                    family.description = Some(description.clone());
                }
                if let Some(columns) = &spec.columns {
                    family.columns = columns.clone();
                }
            }
            (None, false) => families.push(Family {
                name: spec.name.clone(),
                description: spec.description.clone(),
                columns: spec.columns.clone().unwrap_or_default(),
            }),
        }
    }

    Ok(families)
}
