// Layout Validation
//
// Rules are pure checks over a layout document. They run before any
// store is touched, and again over the merged result of an update.

use std::collections::HashSet;

use crate::layout::{LayoutDocument, LayoutId, MaxVersions};

/// A malformed layout document.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("table name is empty")]
    EmptyTableName,

    #[error("illegal table name `{name}`")]
    IllegalTableName { name: String },

    #[error("table `{table}` has no locality groups")]
    NoLocalityGroups { table: String },

    #[error("locality group `{locality_group}` is defined more than once")]
    DuplicateLocalityGroup { locality_group: String },

    #[error("family `{family}` is defined more than once")]
    DuplicateFamily { family: String },

    #[error("locality group `{locality_group}` has invalid max_versions {value}")]
    InvalidMaxVersions { locality_group: String, value: u32 },

    #[error("locality group `{locality_group}` has no families")]
    EmptyLocalityGroup { locality_group: String },

    #[error("illegal {kind} name `{name}`")]
    IllegalName { kind: &'static str, name: String },

    #[error("new locality group `{locality_group}` does not set max_versions")]
    MissingMaxVersions { locality_group: String },

    #[error("locality group `{locality_group}` does not exist")]
    UnknownLocalityGroup { locality_group: String },

    #[error("family `{family}` does not exist")]
    UnknownFamily { family: String },

    #[error("layout document names table `{document}` but was submitted for `{table}`")]
    TableNameMismatch { table: String, document: String },

    #[error("layout id `{0}` is not a layout counter")]
    InvalidLayoutId(LayoutId),

    #[error("rule `{rule}` failed: {reason}")]
    Rule { rule: &'static str, reason: String },
}

/// A single check over a layout document.
///
/// Rules must be pure and deterministic.
pub trait LayoutRule: Send + Sync {
    fn name(&self) -> &'static str;

    fn check(&self, doc: &LayoutDocument) -> Result<(), ValidationError>;
}

/// Ordered set of layout rules.
pub struct LayoutValidator {
    rules: Vec<Box<dyn LayoutRule>>,
}

impl LayoutValidator {
    /// A validator with no rules.
    pub fn empty() -> Self {
        Self { rules: Vec::new() }
    }

    /// The built-in rules, in evaluation order.
    pub fn standard() -> Self {
        let mut validator = Self::empty();
        validator.register(TableName);
        validator.register(HasLocalityGroups);
        validator.register(UniqueNames);
        validator.register(MaxVersionsRange);
        validator.register(NonEmptyLocalityGroups);
        validator.register(ComponentNames);
        validator
    }

    pub fn register<R: LayoutRule + 'static>(&mut self, rule: R) {
        self.rules.push(Box::new(rule));
    }

    pub fn rule_names(&self) -> Vec<&'static str> {
        self.rules.iter().map(|r| r.name()).collect()
    }

    /// Run every rule. Stops at the first failure.
    pub fn validate(&self, doc: &LayoutDocument) -> Result<(), ValidationError> {
        for rule in &self.rules {
            rule.check(doc)?;
        }
        Ok(())
    }
}

impl Default for LayoutValidator {
    fn default() -> Self {
        Self::standard()
    }
}

/// Validate with the built-in rules.
pub fn validate(doc: &LayoutDocument) -> Result<(), ValidationError> {
    LayoutValidator::standard().validate(doc)
}

/// `[A-Za-z_][A-Za-z0-9_]*`
pub fn is_legal_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

struct TableName;

impl LayoutRule for TableName {
    fn name(&self) -> &'static str {
        "table-name"
    }

    fn check(&self, doc: &LayoutDocument) -> Result<(), ValidationError> {
        if doc.name.is_empty() {
            return Err(ValidationError::EmptyTableName);
        }
        if !is_legal_name(&doc.name) {
            return Err(ValidationError::IllegalTableName {
                name: doc.name.clone(),
            });
        }
        Ok(())
    }
}

struct HasLocalityGroups;

impl LayoutRule for HasLocalityGroups {
    fn name(&self) -> &'static str {
        "has-locality-groups"
    }

    fn check(&self, doc: &LayoutDocument) -> Result<(), ValidationError> {
        if doc.locality_groups.is_empty() {
            return Err(ValidationError::NoLocalityGroups {
                table: doc.name.clone(),
            });
        }
        Ok(())
    }
}

/// Group names are unique, and so are family names across the whole
/// document. Removal markers do not claim a family name.
struct UniqueNames;

impl LayoutRule for UniqueNames {
    fn name(&self) -> &'static str {
        "unique-names"
    }

    fn check(&self, doc: &LayoutDocument) -> Result<(), ValidationError> {
        let mut groups = HashSet::new();
        for group in &doc.locality_groups {
            if !groups.insert(group.name.as_str()) {
                return Err(ValidationError::DuplicateLocalityGroup {
                    locality_group: group.name.clone(),
                });
            }
        }

        let mut families = HashSet::new();
        let live = doc
            .locality_groups
            .iter()
            .filter(|g| !g.delete)
            .flat_map(|g| g.families.iter())
            .filter(|f| !f.delete);
        for family in live {
            if !families.insert(family.name.as_str()) {
                return Err(ValidationError::DuplicateFamily {
                    family: family.name.clone(),
                });
            }
        }
        Ok(())
    }
}

struct MaxVersionsRange;

impl LayoutRule for MaxVersionsRange {
    fn name(&self) -> &'static str {
        "max-versions-range"
    }

    fn check(&self, doc: &LayoutDocument) -> Result<(), ValidationError> {
        for group in &doc.locality_groups {
            if let Some(MaxVersions::Bounded(0)) = group.max_versions {
                return Err(ValidationError::InvalidMaxVersions {
                    locality_group: group.name.clone(),
                    value: 0,
                });
            }
        }
        Ok(())
    }
}

struct NonEmptyLocalityGroups;

impl LayoutRule for NonEmptyLocalityGroups {
    fn name(&self) -> &'static str {
        "non-empty-locality-groups"
    }

    // In an update, a group that lists no families keeps the ones it has.
    // The resolver rejects new groups without families.
    fn check(&self, doc: &LayoutDocument) -> Result<(), ValidationError> {
        if doc.reference_layout_id.is_some() {
            return Ok(());
        }
        match doc
            .locality_groups
            .iter()
            .find(|g| !g.delete && g.families.is_empty())
        {
            Some(group) => Err(ValidationError::EmptyLocalityGroup {
                locality_group: group.name.clone(),
            }),
            None => Ok(()),
        }
    }
}

struct ComponentNames;

impl LayoutRule for ComponentNames {
    fn name(&self) -> &'static str {
        "component-names"
    }

    fn check(&self, doc: &LayoutDocument) -> Result<(), ValidationError> {
        for group in &doc.locality_groups {
            if !is_legal_name(&group.name) {
                return Err(ValidationError::IllegalName {
                    kind: "locality group",
                    name: group.name.clone(),
                });
            }
            for family in &group.families {
                if !is_legal_name(&family.name) {
                    return Err(ValidationError::IllegalName {
                        kind: "family",
                        name: family.name.clone(),
                    });
                }
                if let Some(column) = family
                    .columns
                    .iter()
                    .flatten()
                    .find(|c| !is_legal_name(c))
                {
                    return Err(ValidationError::IllegalName {
                        kind: "column",
                        name: column.clone(),
                    });
                }
            }
        }
        Ok(())
    }
}
