//! Shared fixtures for the end-to-end suite: a Person / Project / Task
//! demo graph, the computations persisted on it, and harness builders.

use crate::{
    engine::Engine,
    error::EngineError,
    model::relation::{RelationModel, StaticCatalog, ThroughModel},
    obs::sink::{EngineEvent, EventSink},
    record::{Datastore, Record},
    registry::{AttributeDecl, DependencyRegistry, RegistryConfig},
    store::memory::{MemRecord, MemStore},
    value::Value,
};
use std::{cell::RefCell, rc::Rc};

pub(crate) const PERSON: &str = "demo::Person";
pub(crate) const PROJECT: &str = "demo::Project";
pub(crate) const TASK: &str = "demo::Task";
pub(crate) const PROFILE: &str = "demo::Profile";

///
/// Harness
///

pub(crate) struct Harness {
    pub engine: Rc<Engine>,
    pub store: MemStore,
}

pub(crate) fn harness(registry: DependencyRegistry) -> Harness {
    let engine = Rc::new(Engine::new(Rc::new(registry)));
    let store = MemStore::new(engine.clone());

    Harness { engine, store }
}

///
/// Relation catalog
///

pub(crate) fn demo_catalog() -> StaticCatalog {
    let mut catalog = StaticCatalog::new();
    catalog.insert(
        PROJECT,
        RelationModel::many_to_one("tasks", TASK, "project_id"),
    );
    catalog.insert(
        PERSON,
        RelationModel::many_to_one("projects", PROJECT, "person_id"),
    );
    catalog.insert(
        PERSON,
        RelationModel::many_to_many_through(
            "tasks",
            TASK,
            ThroughModel {
                intermediate_path: PROJECT,
                intermediate_foreign_key: "project_id",
                owner_foreign_key: "person_id",
            },
        ),
    );
    catalog.insert(TASK, RelationModel::one_to_many("project", PROJECT, "project_id"));
    catalog.insert(
        PERSON,
        RelationModel::one_to_one("profile", PROFILE, "person_id"),
    );

    catalog
}

///
/// Computations
///

pub(crate) fn compute_all_tasks_completed(
    project: &dyn Record,
    ds: &dyn Datastore,
) -> Result<Value, EngineError> {
    let tasks = ds.find_all_where(TASK, "project_id", &project.primary_key());
    let done = tasks.iter().all(|task| {
        task.borrow()
            .read("completed")
            .and_then(|v| v.as_bool())
            .unwrap_or(false)
    });

    Ok(Value::Bool(done))
}

pub(crate) fn compute_all_projects_completed(
    person: &dyn Record,
    ds: &dyn Datastore,
) -> Result<Value, EngineError> {
    let projects = ds.find_all_where(PROJECT, "person_id", &person.primary_key());
    let done = projects.iter().all(|project| {
        project
            .borrow()
            .read("all_tasks_completed")
            .and_then(|v| v.as_bool())
            .unwrap_or(false)
    });

    Ok(Value::Bool(done))
}

pub(crate) fn compute_completed_task_count(
    person: &dyn Record,
    ds: &dyn Datastore,
) -> Result<Value, EngineError> {
    let mut count = 0u64;
    for project in ds.find_all_where(PROJECT, "person_id", &person.primary_key()) {
        let project_key = project.borrow().primary_key();
        for task in ds.find_all_where(TASK, "project_id", &project_key) {
            let completed = task
                .borrow()
                .read("completed")
                .and_then(|v| v.as_bool())
                .unwrap_or(false);
            if completed {
                count += 1;
            }
        }
    }

    Ok(Value::Uint(count))
}

pub(crate) fn compute_project_name(
    task: &dyn Record,
    ds: &dyn Datastore,
) -> Result<Value, EngineError> {
    let Some(project_key) = task.read("project_id").filter(|v| !v.is_null()) else {
        return Ok(Value::Null);
    };
    let Some(project) = ds.find(PROJECT, &project_key) else {
        return Ok(Value::Null);
    };
    let name = project.borrow().read("name").unwrap_or(Value::Null);

    Ok(name)
}

pub(crate) fn compute_profile_headline(
    person: &dyn Record,
    ds: &dyn Datastore,
) -> Result<Value, EngineError> {
    let profiles = ds.find_all_where(PROFILE, "person_id", &person.primary_key());
    let headline = profiles
        .first()
        .and_then(|profile| profile.borrow().read("headline"))
        .unwrap_or(Value::Null);

    Ok(headline)
}

///
/// Registries
///

/// Project completion, with task propagation wired up.
pub(crate) fn completion_registry(performant: bool) -> DependencyRegistry {
    let mut registry = DependencyRegistry::new();
    registry
        .declare(
            &demo_catalog(),
            AttributeDecl::new(PROJECT, "all_tasks_completed", compute_all_tasks_completed)
                .performant(performant)
                .depending_on("tasks"),
        )
        .expect("completion declaration should succeed");

    registry
}

/// Project completion with custom config defaults.
pub(crate) fn completion_registry_with(config: RegistryConfig) -> DependencyRegistry {
    let mut registry = DependencyRegistry::with_config(config);
    registry
        .declare(
            &demo_catalog(),
            AttributeDecl::new(PROJECT, "all_tasks_completed", compute_all_tasks_completed)
                .depending_on("tasks"),
        )
        .expect("completion declaration should succeed");

    registry
}

/// Project completion without any propagation edges; parents go stale on
/// purpose so binder behavior is observable.
pub(crate) fn stale_completion_registry() -> DependencyRegistry {
    let mut registry = DependencyRegistry::new();
    registry
        .declare(
            &demo_catalog(),
            AttributeDecl::new(PROJECT, "all_tasks_completed", compute_all_tasks_completed),
        )
        .expect("declaration should succeed");

    registry
}

///
/// Record builders
///

pub(crate) fn person(id: u64, name: &str) -> MemRecord {
    let mut record = MemRecord::new(PERSON);
    record.set("id", id);
    record.set("name", name);
    record
}

pub(crate) fn project(id: u64, person_id: impl Into<Value>, name: &str) -> MemRecord {
    let mut record = MemRecord::new(PROJECT);
    record.set("id", id);
    record.set("person_id", person_id);
    record.set("name", name);
    record
}

pub(crate) fn task(id: u64, project_id: impl Into<Value>, completed: bool) -> MemRecord {
    let mut record = MemRecord::new(TASK);
    record.set("id", id);
    record.set("project_id", project_id);
    record.set("completed", completed);
    record
}

pub(crate) fn profile(id: u64, person_id: u64, headline: &str) -> MemRecord {
    let mut record = MemRecord::new(PROFILE);
    record.set("id", id);
    record.set("person_id", person_id);
    record.set("headline", headline);
    record
}

///
/// CaptureSink
///
/// Scoped sink that buffers events for structural assertions.
///

#[derive(Default)]
pub(crate) struct CaptureSink {
    events: RefCell<Vec<EngineEvent>>,
}

impl CaptureSink {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn take(&self) -> Vec<EngineEvent> {
        std::mem::take(&mut self.events.borrow_mut())
    }

    pub(crate) fn count(&self, matches: impl Fn(&EngineEvent) -> bool) -> usize {
        self.events.borrow().iter().filter(|e| matches(e)).count()
    }
}

impl EventSink for CaptureSink {
    fn record(&self, event: EngineEvent) {
        self.events.borrow_mut().push(event);
    }
}
