//! Per-entity-type field descriptor tables
//!
//! The diff engine, the relationship listener and the renderer all dispatch on
//! [`FieldKind`]. A [`Schema`] is built once at startup; building it also
//! produces the junction table that maps a many-to-many junction id back to
//! the field that declares it.

use crate::errors::{AuditError, Result};
use crate::model::entity_ref::{EntityId, EntityRef};
use crate::model::value::{FieldValue, Snapshot};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};

/// Fields excluded from logging unless an entity type says otherwise
pub const DEFAULT_UNLOGGED_FIELDS: &[&str] = &["id", "order"];

/// One declared choice of a choice-coded field
#[derive(Debug, Clone, PartialEq)]
pub struct Choice {
    /// Value as it appears in the log (already encoded)
    pub value: Value,
    pub label: String,
}

impl Choice {
    pub fn new(value: impl Into<Value>, label: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            label: label.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FieldKind {
    Scalar,
    Boolean,
    Choice(Vec<Choice>),
    /// Many-to-one or one-to-one reference to another entity type
    Relation { target: &'static str },
    /// Set-valued relation stored in a junction
    ManyToMany {
        target: &'static str,
        junction: &'static str,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldDescriptor {
    pub name: &'static str,
    /// Human-readable label (lowercase; capitalized when rendered)
    pub label: &'static str,
    pub kind: FieldKind,
}

impl FieldDescriptor {
    pub fn scalar(name: &'static str, label: &'static str) -> Self {
        Self {
            name,
            label,
            kind: FieldKind::Scalar,
        }
    }

    pub fn boolean(name: &'static str, label: &'static str) -> Self {
        Self {
            name,
            label,
            kind: FieldKind::Boolean,
        }
    }

    pub fn choice(name: &'static str, label: &'static str, choices: Vec<Choice>) -> Self {
        Self {
            name,
            label,
            kind: FieldKind::Choice(choices),
        }
    }

    pub fn relation(name: &'static str, label: &'static str, target: &'static str) -> Self {
        Self {
            name,
            label,
            kind: FieldKind::Relation { target },
        }
    }

    pub fn many_to_many(
        name: &'static str,
        label: &'static str,
        target: &'static str,
        junction: &'static str,
    ) -> Self {
        Self {
            name,
            label,
            kind: FieldKind::ManyToMany { target, junction },
        }
    }

    pub fn is_many_to_many(&self) -> bool {
        matches!(self.kind, FieldKind::ManyToMany { .. })
    }

    /// Entity type referenced by a relation or many-to-many field
    pub fn related_type(&self) -> Option<&'static str> {
        match self.kind {
            FieldKind::Relation { target } | FieldKind::ManyToMany { target, .. } => Some(target),
            _ => None,
        }
    }

    /// Label for a stored choice value
    pub fn choice_label(&self, value: &Value) -> Option<&str> {
        match &self.kind {
            FieldKind::Choice(choices) => choices
                .iter()
                .find(|c| &c.value == value)
                .map(|c| c.label.as_str()),
            _ => None,
        }
    }
}

/// Where an entity type's log entries are displayed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AnchorRule {
    /// Under the entity itself
    #[default]
    SelfAnchor,
    /// Under the entity referenced by the named relation field
    Relation(&'static str),
}

/// Renders an entity for display from its persisted row
pub type DisplayFn = fn(EntityId, &Snapshot) -> String;

#[derive(Debug, Clone)]
pub struct EntityDescriptor {
    /// Stable type tag used in log entry references
    pub entity_type: &'static str,
    pub verbose_name: &'static str,
    pub fields: Vec<FieldDescriptor>,
    pub unlogged_fields: Vec<&'static str>,
    pub anchor: AnchorRule,
    pub display: Option<DisplayFn>,
}

impl EntityDescriptor {
    pub fn new(entity_type: &'static str, verbose_name: &'static str) -> Self {
        Self {
            entity_type,
            verbose_name,
            fields: Vec::new(),
            unlogged_fields: DEFAULT_UNLOGGED_FIELDS.to_vec(),
            anchor: AnchorRule::SelfAnchor,
            display: None,
        }
    }

    pub fn field(mut self, field: FieldDescriptor) -> Self {
        self.fields.push(field);
        self
    }

    /// Replace the unlogged field set
    pub fn unlogged(mut self, fields: &[&'static str]) -> Self {
        self.unlogged_fields = fields.to_vec();
        self
    }

    /// Show log entries under the entity referenced by `field`
    pub fn anchored_to(mut self, field: &'static str) -> Self {
        self.anchor = AnchorRule::Relation(field);
        self
    }

    pub fn display_with(mut self, display: DisplayFn) -> Self {
        self.display = Some(display);
        self
    }

    pub fn get_field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn is_logged(&self, name: &str) -> bool {
        !self.unlogged_fields.contains(&name)
    }

    /// Logged fields whose values live on the entity's own row
    pub fn logged_value_fields(&self) -> impl Iterator<Item = &FieldDescriptor> {
        self.fields
            .iter()
            .filter(|f| !f.is_many_to_many() && self.is_logged(f.name))
    }

    pub fn logged_many_to_many_fields(&self) -> impl Iterator<Item = &FieldDescriptor> {
        self.fields
            .iter()
            .filter(|f| f.is_many_to_many() && self.is_logged(f.name))
    }

    /// Anchor for an entity of this type with the given row
    ///
    /// Falls back to the entity itself when the anchoring relation is unset.
    pub fn anchor_for(&self, id: EntityId, row: &Snapshot) -> EntityRef {
        if let AnchorRule::Relation(field) = self.anchor {
            let parent = self.get_field(field).and_then(|f| f.related_type());
            let parent_id = row.get(field).and_then(FieldValue::as_entity_id);
            if let (Some(parent_type), Some(parent_id)) = (parent, parent_id) {
                return EntityRef::new(parent_type, parent_id);
            }
        }
        EntityRef::new(self.entity_type, id)
    }

    pub fn display_name(&self, id: EntityId, row: &Snapshot) -> String {
        match self.display {
            Some(display) => display(id, row),
            None => format!("{} object ({})", self.verbose_name, id),
        }
    }
}

/// Owner side of a many-to-many junction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JunctionBinding {
    pub owner_type: &'static str,
    pub field: &'static str,
    pub related_type: &'static str,
}

/// Registry of all entity types enrolled in auditing
#[derive(Debug, Clone, Default)]
pub struct Schema {
    entities: BTreeMap<&'static str, EntityDescriptor>,
    junctions: HashMap<&'static str, JunctionBinding>,
}

impl Schema {
    pub fn builder() -> SchemaBuilder {
        SchemaBuilder::default()
    }

    pub fn get(&self, entity_type: &str) -> Option<&EntityDescriptor> {
        self.entities.get(entity_type)
    }

    /// Descriptor for a registered entity type
    pub fn descriptor(&self, entity_type: &str) -> Result<&EntityDescriptor> {
        self.get(entity_type)
            .ok_or_else(|| AuditError::UnknownEntityType {
                entity_type: entity_type.to_string(),
            })
    }

    /// Field declaring the junction, if any enrolled type declares it
    pub fn resolve_junction(&self, junction: &str) -> Option<&JunctionBinding> {
        self.junctions.get(junction)
    }

    /// Junction id of a many-to-many field
    pub fn junction_for(&self, entity_type: &str, field: &str) -> Result<&'static str> {
        let descriptor = self.descriptor(entity_type)?;
        let field_desc = descriptor
            .get_field(field)
            .ok_or_else(|| AuditError::UnknownField {
                entity_type: entity_type.to_string(),
                field: field.to_string(),
            })?;
        match field_desc.kind {
            FieldKind::ManyToMany { junction, .. } => Ok(junction),
            _ => Err(AuditError::NotManyToMany {
                entity_type: entity_type.to_string(),
                field: field.to_string(),
            }),
        }
    }

    pub fn entity_types(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.entities.keys().copied()
    }

    pub fn junctions(&self) -> impl Iterator<Item = (&'static str, &JunctionBinding)> + '_ {
        self.junctions.iter().map(|(junction, binding)| (*junction, binding))
    }
}

#[derive(Debug, Default)]
pub struct SchemaBuilder {
    entities: Vec<EntityDescriptor>,
}

impl SchemaBuilder {
    pub fn entity(mut self, descriptor: EntityDescriptor) -> Self {
        self.entities.push(descriptor);
        self
    }

    /// Validate declarations and build the junction table
    ///
    /// # Errors
    ///
    /// - `InvalidSchema` for duplicate entity types, relations to unregistered
    ///   types, or an anchor that does not name a relation field
    /// - `DuplicateJunction` when two fields share a junction id
    pub fn build(self) -> Result<Schema> {
        let mut entities = BTreeMap::new();
        for descriptor in self.entities {
            let entity_type = descriptor.entity_type;
            if entities.insert(entity_type, descriptor).is_some() {
                return Err(AuditError::InvalidSchema {
                    reason: format!("entity type {} registered twice", entity_type),
                });
            }
        }

        let mut junctions = HashMap::new();
        for descriptor in entities.values() {
            for field in &descriptor.fields {
                if let Some(target) = field.related_type() {
                    if !entities.contains_key(target) {
                        return Err(AuditError::InvalidSchema {
                            reason: format!(
                                "{}.{} references unregistered type {}",
                                descriptor.entity_type, field.name, target
                            ),
                        });
                    }
                }
                if let FieldKind::ManyToMany { target, junction } = field.kind {
                    let binding = JunctionBinding {
                        owner_type: descriptor.entity_type,
                        field: field.name,
                        related_type: target,
                    };
                    if junctions.insert(junction, binding).is_some() {
                        return Err(AuditError::DuplicateJunction {
                            junction: junction.to_string(),
                        });
                    }
                }
            }

            if let AnchorRule::Relation(field) = descriptor.anchor {
                let is_relation = descriptor
                    .get_field(field)
                    .is_some_and(|f| matches!(f.kind, FieldKind::Relation { .. }));
                if !is_relation {
                    return Err(AuditError::InvalidSchema {
                        reason: format!(
                            "{} is anchored to {}, which is not a relation field",
                            descriptor.entity_type, field
                        ),
                    });
                }
            }
        }

        Ok(Schema {
            entities,
            junctions,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> SchemaBuilder {
        Schema::builder()
            .entity(EntityDescriptor::new("user", "user"))
            .entity(
                EntityDescriptor::new("course", "course")
                    .field(FieldDescriptor::scalar("name", "name"))
                    .field(FieldDescriptor::scalar("order", "order"))
                    .field(FieldDescriptor::many_to_many(
                        "responsibles",
                        "responsibles",
                        "user",
                        "course_responsibles",
                    )),
            )
    }

    #[test]
    fn test_junction_resolves_to_declaring_field() {
        let schema = base().build().unwrap();
        let binding = schema.resolve_junction("course_responsibles").unwrap();

        assert_eq!(binding.owner_type, "course");
        assert_eq!(binding.field, "responsibles");
        assert_eq!(binding.related_type, "user");
        assert!(schema.resolve_junction("unknown").is_none());
    }

    #[test]
    fn test_default_unlogged_fields_exclude_order() {
        let schema = base().build().unwrap();
        let course = schema.descriptor("course").unwrap();

        let logged: Vec<_> = course.logged_value_fields().map(|f| f.name).collect();
        assert_eq!(logged, vec!["name"]);
    }

    #[test]
    fn test_duplicate_junction_is_rejected() {
        let err = base()
            .entity(
                EntityDescriptor::new("program", "program").field(FieldDescriptor::many_to_many(
                    "owners",
                    "owners",
                    "user",
                    "course_responsibles",
                )),
            )
            .build()
            .unwrap_err();

        assert_eq!(
            err,
            AuditError::DuplicateJunction {
                junction: "course_responsibles".to_string()
            }
        );
    }

    #[test]
    fn test_relation_to_unregistered_type_is_rejected() {
        let err = Schema::builder()
            .entity(
                EntityDescriptor::new("course", "course")
                    .field(FieldDescriptor::relation("program", "program", "program")),
            )
            .build()
            .unwrap_err();

        assert!(matches!(err, AuditError::InvalidSchema { .. }));
    }

    #[test]
    fn test_anchor_follows_relation_value() {
        let descriptor = EntityDescriptor::new("contribution", "contribution")
            .field(FieldDescriptor::relation("evaluation", "evaluation", "evaluation"))
            .anchored_to("evaluation");

        let mut row = Snapshot::new();
        row.insert("evaluation".into(), FieldValue::Ref(9));
        assert_eq!(descriptor.anchor_for(4, &row), EntityRef::new("evaluation", 9));

        row.insert("evaluation".into(), FieldValue::Null);
        assert_eq!(descriptor.anchor_for(4, &row), EntityRef::new("contribution", 4));
    }
}
