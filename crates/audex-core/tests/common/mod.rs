#![allow(dead_code)]

use std::sync::Arc;

use audex_core::context::{enter_request, RequestGuard};
use audex_core::{
    AuditSettings, AuditState, Auditable, Auditor, Choice, EntityDescriptor, EntityId,
    EntityRef, FieldDescriptor, FieldValue, MemoryDataStore, MemoryLogStore, Schema, Snapshot,
};
use audex_core_types::{ActorId, RequestContext, RequestId};
use chrono::NaiveDate;

pub type TestAuditor = Auditor<MemoryDataStore, MemoryLogStore>;

pub const RESPONSIBLES: &str = "course_responsibles";
pub const PARTICIPANTS: &str = "evaluation_participants";
pub const VOTERS: &str = "evaluation_voters";

fn text(row: &Snapshot, field: &str) -> String {
    match row.get(field) {
        Some(FieldValue::Text(s)) => s.clone(),
        _ => String::new(),
    }
}

/// Schema with users, courses, evaluations and contributions
///
/// Contributions are displayed under their evaluation; evaluation voters
/// are not logged.
pub fn schema() -> Arc<Schema> {
    let schema = Schema::builder()
        .entity(
            EntityDescriptor::new("user", "user")
                .field(FieldDescriptor::scalar("name", "name"))
                .display_with(|_, row| text(row, "name")),
        )
        .entity(
            EntityDescriptor::new("course", "course")
                .field(FieldDescriptor::scalar("name", "name"))
                .field(FieldDescriptor::scalar("order", "order"))
                .field(FieldDescriptor::boolean("is_private", "is private"))
                .field(FieldDescriptor::choice(
                    "state",
                    "state",
                    vec![Choice::new(10, "new"), Choice::new(20, "published")],
                ))
                .field(FieldDescriptor::scalar("starts_on", "starts on"))
                .field(FieldDescriptor::many_to_many(
                    "responsibles",
                    "responsibles",
                    "user",
                    RESPONSIBLES,
                ))
                .display_with(|_, row| text(row, "name")),
        )
        .entity(
            EntityDescriptor::new("evaluation", "evaluation")
                .field(FieldDescriptor::scalar("name", "name"))
                .field(FieldDescriptor::relation("course", "course", "course"))
                .field(FieldDescriptor::many_to_many(
                    "participants",
                    "participants",
                    "user",
                    PARTICIPANTS,
                ))
                .field(FieldDescriptor::many_to_many("voters", "voters", "user", VOTERS))
                .unlogged(&["id", "order", "voters"])
                .display_with(|_, row| text(row, "name")),
        )
        .entity(
            EntityDescriptor::new("contribution", "contribution")
                .field(FieldDescriptor::relation("evaluation", "evaluation", "evaluation"))
                .field(FieldDescriptor::relation("contributor", "contributor", "user"))
                .field(FieldDescriptor::choice(
                    "role",
                    "role",
                    vec![Choice::new(0, "contributor"), Choice::new(1, "editor")],
                ))
                .anchored_to("evaluation"),
        )
        .build()
        .unwrap();
    Arc::new(schema)
}

pub fn auditor() -> TestAuditor {
    let schema = schema();
    Auditor::new(
        schema.clone(),
        AuditSettings::default(),
        MemoryDataStore::new(schema),
        MemoryLogStore::new(),
    )
}

/// Enter a request with the given id and acting user
pub fn request(request_id: &str, actor: i64) -> RequestGuard {
    enter_request(
        RequestContext::with_request_id(RequestId::from_string(request_id.to_string()))
            .with_actor(ActorId::new(actor)),
    )
}

#[derive(Debug, Clone, Default)]
pub struct User {
    pub id: Option<EntityId>,
    pub name: String,
    pub audit: AuditState,
}

impl User {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }
}

impl Auditable for User {
    fn entity_type(&self) -> &'static str {
        "user"
    }

    fn id(&self) -> Option<EntityId> {
        self.id
    }

    fn set_id(&mut self, id: EntityId) {
        self.id = Some(id);
    }

    fn snapshot(&self) -> Snapshot {
        Snapshot::from([("name".to_string(), FieldValue::from(self.name.as_str()))])
    }

    fn audit_state(&self) -> &AuditState {
        &self.audit
    }

    fn audit_state_mut(&mut self) -> &mut AuditState {
        &mut self.audit
    }
}

#[derive(Debug, Clone)]
pub struct Course {
    pub id: Option<EntityId>,
    pub name: String,
    pub order: i64,
    pub is_private: Option<bool>,
    pub state: i64,
    pub starts_on: Option<NaiveDate>,
    pub audit: AuditState,
}

impl Course {
    pub fn new(name: &str) -> Self {
        Self {
            id: None,
            name: name.to_string(),
            order: 0,
            is_private: Some(false),
            state: 10,
            starts_on: None,
            audit: AuditState::new(),
        }
    }

    /// The same course as loaded again in a later request
    pub fn reloaded(&self) -> Self {
        Self {
            audit: AuditState::new(),
            ..self.clone()
        }
    }

    pub fn reference(&self) -> EntityRef {
        EntityRef::new("course", self.id.unwrap())
    }
}

impl Auditable for Course {
    fn entity_type(&self) -> &'static str {
        "course"
    }

    fn id(&self) -> Option<EntityId> {
        self.id
    }

    fn set_id(&mut self, id: EntityId) {
        self.id = Some(id);
    }

    fn snapshot(&self) -> Snapshot {
        Snapshot::from([
            ("name".to_string(), FieldValue::from(self.name.as_str())),
            ("order".to_string(), FieldValue::from(self.order)),
            ("is_private".to_string(), FieldValue::from(self.is_private)),
            ("state".to_string(), FieldValue::from(self.state)),
            ("starts_on".to_string(), FieldValue::from(self.starts_on)),
        ])
    }

    fn audit_state(&self) -> &AuditState {
        &self.audit
    }

    fn audit_state_mut(&mut self) -> &mut AuditState {
        &mut self.audit
    }
}

#[derive(Debug, Clone, Default)]
pub struct Evaluation {
    pub id: Option<EntityId>,
    pub name: String,
    pub course: Option<EntityId>,
    pub audit: AuditState,
}

impl Evaluation {
    pub fn new(name: &str, course: &Course) -> Self {
        Self {
            name: name.to_string(),
            course: course.id,
            ..Self::default()
        }
    }

    pub fn reference(&self) -> EntityRef {
        EntityRef::new("evaluation", self.id.unwrap())
    }
}

impl Auditable for Evaluation {
    fn entity_type(&self) -> &'static str {
        "evaluation"
    }

    fn id(&self) -> Option<EntityId> {
        self.id
    }

    fn set_id(&mut self, id: EntityId) {
        self.id = Some(id);
    }

    fn snapshot(&self) -> Snapshot {
        Snapshot::from([
            ("name".to_string(), FieldValue::from(self.name.as_str())),
            ("course".to_string(), FieldValue::reference(self.course)),
        ])
    }

    fn audit_state(&self) -> &AuditState {
        &self.audit
    }

    fn audit_state_mut(&mut self) -> &mut AuditState {
        &mut self.audit
    }
}

#[derive(Debug, Clone, Default)]
pub struct Contribution {
    pub id: Option<EntityId>,
    pub evaluation: Option<EntityId>,
    pub contributor: Option<EntityId>,
    pub role: i64,
    pub audit: AuditState,
}

impl Auditable for Contribution {
    fn entity_type(&self) -> &'static str {
        "contribution"
    }

    fn id(&self) -> Option<EntityId> {
        self.id
    }

    fn set_id(&mut self, id: EntityId) {
        self.id = Some(id);
    }

    fn snapshot(&self) -> Snapshot {
        Snapshot::from([
            ("evaluation".to_string(), FieldValue::reference(self.evaluation)),
            ("contributor".to_string(), FieldValue::reference(self.contributor)),
            ("role".to_string(), FieldValue::from(self.role)),
        ])
    }

    fn audit_state(&self) -> &AuditState {
        &self.audit
    }

    fn audit_state_mut(&mut self) -> &mut AuditState {
        &mut self.audit
    }
}

/// Save a batch of users and return their ids
pub fn users(auditor: &mut TestAuditor, names: &[&str]) -> Vec<EntityId> {
    names
        .iter()
        .map(|name| {
            let mut user = User::new(name);
            auditor.save(&mut user).unwrap();
            user.id.unwrap()
        })
        .collect()
}
