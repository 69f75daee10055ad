use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::json;

use slate_models::{DeletedCounts, Project, StoreResult};

use super::*;
use crate::services::planner::MockSchedulePlanner;

/// In-memory project, scene and day store that records the order of writes.
#[derive(Default)]
struct MemoryStore {
    projects: Mutex<HashMap<String, Project>>,
    scenes: Mutex<Vec<Scene>>,
    days: Mutex<Vec<ShootingDay>>,
    /// (day id, scene id, sort order)
    scene_links: Mutex<Vec<(String, String, usize)>>,
    cast_links: Mutex<Vec<String>>,
    call_sheets: Mutex<Vec<String>>,
    marked: Mutex<Vec<String>>,
    events: Mutex<Vec<String>>,
    failing_days: Vec<u32>,
}

impl MemoryStore {
    fn with_project(project_id: &str, owner: &str, scene_count: usize) -> Self {
        let store = Self::default();
        store.projects.lock().unwrap().insert(
            project_id.to_string(),
            Project {
                id: project_id.to_string(),
                name: "Feature".into(),
                owner_id: owner.to_string(),
                member_ids: vec![],
            },
        );
        *store.scenes.lock().unwrap() = (0..scene_count)
            .map(|i| {
                Scene::new(format!("s{}", i), project_id)
                    .with_number((i + 1).to_string())
                    .with_location("Diner")
                    .with_sort_order(i as i64)
            })
            .collect();
        store
    }

    fn seed_day(&self, project_id: &str, day_number: u32, scene_ids: &[&str]) {
        let day = ShootingDay::from_new(new_day(project_id, day_number, scene_ids));
        for (i, scene_id) in scene_ids.iter().enumerate() {
            self.scene_links.lock().unwrap().push((day.id.clone(), scene_id.to_string(), i));
        }
        self.cast_links.lock().unwrap().push(day.id.clone());
        self.call_sheets.lock().unwrap().push(day.id.clone());
        self.days.lock().unwrap().push(day);
    }

    fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    fn linked_scene_ids(&self) -> Vec<String> {
        self.scene_links.lock().unwrap().iter().map(|(_, s, _)| s.clone()).collect()
    }
}

fn new_day(project_id: &str, day_number: u32, scene_ids: &[&str]) -> NewShootingDay {
    NewShootingDay {
        project_id: project_id.to_string(),
        date: NaiveDate::from_ymd_opt(2026, 1, day_number).unwrap(),
        day_number,
        unit: DEFAULT_UNIT.to_string(),
        general_call: None,
        estimated_wrap: None,
        notes: None,
        scene_ids: scene_ids.iter().map(|s| s.to_string()).collect(),
    }
}

#[async_trait]
impl ProjectStore for MemoryStore {
    async fn find_accessible(&self, project_id: &str, uid: &str) -> StoreResult<Option<Project>> {
        Ok(self
            .projects
            .lock()
            .unwrap()
            .get(project_id)
            .filter(|p| p.is_accessible_by(uid))
            .cloned())
    }
}

#[async_trait]
impl SceneStore for MemoryStore {
    async fn list_for_project(&self, project_id: &str) -> StoreResult<Vec<Scene>> {
        Ok(self
            .scenes
            .lock()
            .unwrap()
            .iter()
            .filter(|s| s.project_id == project_id)
            .cloned()
            .collect())
    }

    async fn mark_scheduled(&self, _project_id: &str, scene_ids: &[String]) -> StoreResult<()> {
        self.marked.lock().unwrap().extend(scene_ids.iter().cloned());
        Ok(())
    }
}

#[async_trait]
impl DayStore for MemoryStore {
    async fn delete_project_schedule(&self, _project_id: &str) -> StoreResult<DeletedCounts> {
        let mut counts = DeletedCounts::default();
        counts.scene_links = self.scene_links.lock().unwrap().drain(..).count();
        counts.cast_links = self.cast_links.lock().unwrap().drain(..).count();
        counts.call_sheets = self.call_sheets.lock().unwrap().drain(..).count();
        counts.days = self.days.lock().unwrap().drain(..).count();
        self.events.lock().unwrap().push("reset".to_string());
        Ok(counts)
    }

    async fn create_day(&self, day: NewShootingDay) -> StoreResult<ShootingDay> {
        if self.failing_days.contains(&day.day_number) {
            return Err(StoreError::backend("commit rejected"));
        }
        // Nothing from the previous schedule may survive once creation starts.
        self.events
            .lock()
            .unwrap()
            .push(format!("create:{}:{}", day.day_number, self.days.lock().unwrap().len()));

        let day = ShootingDay::from_new(day);
        for (i, scene_id) in day.scene_ids.iter().enumerate() {
            self.scene_links.lock().unwrap().push((day.id.clone(), scene_id.clone(), i));
        }
        self.call_sheets.lock().unwrap().push(day.id.clone());
        self.days.lock().unwrap().push(day.clone());
        Ok(day)
    }

    async fn list_days(&self, project_id: &str) -> StoreResult<Vec<ShootingDay>> {
        Ok(self
            .days
            .lock()
            .unwrap()
            .iter()
            .filter(|d| d.project_id == project_id)
            .cloned()
            .collect())
    }
}

#[derive(Default)]
struct MemoryCache {
    entries: Mutex<HashMap<(String, String), CacheEntry>>,
    invalidated: Mutex<Vec<(String, String)>>,
}

#[async_trait]
impl ResponseCache for MemoryCache {
    async fn get(&self, endpoint: &str, key: &str) -> Option<Value> {
        self.entries
            .lock()
            .unwrap()
            .get(&(endpoint.to_string(), key.to_string()))
            .map(|e| e.response.clone())
    }

    async fn set(&self, entry: CacheEntry) {
        self.entries
            .lock()
            .unwrap()
            .insert((entry.endpoint.clone(), entry.cache_key.clone()), entry);
    }

    async fn invalidate_project(&self, endpoint: &str, project_id: &str) {
        self.invalidated
            .lock()
            .unwrap()
            .push((endpoint.to_string(), project_id.to_string()));
    }
}

struct Harness {
    store: Arc<MemoryStore>,
    cache: Arc<MemoryCache>,
    builder: ScheduleBuilder,
}

fn harness(store: MemoryStore, planner: MockSchedulePlanner) -> Harness {
    let store = Arc::new(store);
    let cache = Arc::new(MemoryCache::default());
    let stores = ScheduleStores {
        projects: store.clone(),
        scenes: store.clone(),
        days: store.clone(),
        cache: cache.clone(),
    };
    let config = BuilderConfig::new(&PlannerConfig::default(), 3600);
    Harness {
        store,
        cache,
        builder: ScheduleBuilder::new(stores, Arc::new(planner), config),
    }
}

fn planner_returning(text: &str, times: usize) -> MockSchedulePlanner {
    let text = text.to_string();
    let mut planner = MockSchedulePlanner::new();
    planner
        .expect_plan()
        .times(times)
        .returning(move |_| Ok(text.clone()));
    planner
}

fn request(project_id: &str) -> BuildScheduleRequest {
    BuildScheduleRequest {
        project_id: project_id.to_string(),
        replace_existing: false,
        max_scenes_per_day: 8,
        start_date: NaiveDate::from_ymd_opt(2026, 3, 2),
    }
}

fn date(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 3, day).unwrap()
}

#[tokio::test]
async fn test_unknown_scene_ids_are_dropped_and_counted() {
    let plan = json!({
        "days": [
            {"dateOffset": 0, "generalCall": "07:00", "sceneIds": ["s0", "s1", "s2", "ghost-1"]},
            {"dateOffset": 1, "sceneIds": ["s3", "ghost-2", "s4", "s5"]}
        ],
        "assumptions": ["Diner available both days"]
    });
    let h = harness(
        MemoryStore::with_project("p1", "u1", 10),
        planner_returning(&format!("Here you go:\n{}", plan), 1),
    );

    let result = h.builder.build(request("p1"), "u1").await.unwrap();

    assert_eq!(result.stats.days_created, 2);
    assert_eq!(result.stats.scenes_assigned, 6);
    assert_eq!(result.stats.scenes_unscheduled, 4);
    assert_eq!(result.assumptions, vec!["Diner available both days".to_string()]);

    let linked = h.store.linked_scene_ids();
    assert_eq!(linked.len(), 6);
    assert!(!linked.iter().any(|id| id.starts_with("ghost")));

    let first = &result.shooting_days[0];
    assert_eq!(first.day.day_number, 1);
    assert_eq!(first.day.date, date(2));
    assert_eq!(first.day.general_call.as_deref(), Some("07:00"));
    assert!(!first.run_of_day.items.is_empty());
    assert_eq!(result.shooting_days[1].day.date, date(3));
}

#[tokio::test]
async fn test_replace_existing_clears_previous_schedule_first() {
    let store = MemoryStore::with_project("p1", "u1", 4);
    store.seed_day("p1", 1, &["s0"]);
    store.seed_day("p1", 2, &["s1", "s2"]);
    store.seed_day("p1", 3, &["s3"]);

    let plan = json!({"days": [{"dateOffset": 0, "sceneIds": ["s0", "s1"]}]});
    let h = harness(store, planner_returning(&plan.to_string(), 1));

    let mut req = request("p1");
    req.replace_existing = true;
    let result = h.builder.build(req, "u1").await.unwrap();

    // The reset runs before the first day is created, and that day sees an
    // empty day table.
    assert_eq!(h.store.events(), vec!["reset".to_string(), "create:1:0".to_string()]);
    assert!(h.store.cast_links.lock().unwrap().is_empty());
    assert_eq!(h.store.call_sheets.lock().unwrap().len(), 1);
    assert_eq!(h.store.days.lock().unwrap().len(), 1);
    assert_eq!(h.store.linked_scene_ids(), vec!["s0".to_string(), "s1".to_string()]);
    assert_eq!(result.stats.days_created, 1);
}

#[tokio::test]
async fn test_without_replace_existing_keeps_previous_days() {
    let store = MemoryStore::with_project("p1", "u1", 2);
    store.seed_day("p1", 1, &["s0"]);

    let plan = json!({"days": [{"dateOffset": 0, "sceneIds": ["s1"]}]});
    let h = harness(store, planner_returning(&plan.to_string(), 1));
    h.builder.build(request("p1"), "u1").await.unwrap();

    assert_eq!(h.store.days.lock().unwrap().len(), 2);
    assert!(!h.store.events().contains(&"reset".to_string()));
}

#[tokio::test]
async fn test_missing_project_id_is_rejected_before_any_work() {
    let h = harness(MemoryStore::with_project("p1", "u1", 3), planner_returning("{}", 0));

    let err = h.builder.build(request(""), "u1").await.unwrap_err();
    assert!(matches!(err, BuildError::Validation(ref m) if m == "projectId is required"));
    assert!(h.store.events().is_empty());
}

#[tokio::test]
async fn test_inaccessible_project_is_not_found() {
    let h = harness(MemoryStore::with_project("p1", "owner", 3), planner_returning("{}", 0));

    let err = h.builder.build(request("p1"), "intruder").await.unwrap_err();
    assert!(matches!(err, BuildError::NotFound(_)));

    let err = h.builder.build(request("missing"), "owner").await.unwrap_err();
    assert!(matches!(err, BuildError::NotFound(_)));
}

#[tokio::test]
async fn test_project_without_scenes_is_a_validation_error() {
    let h = harness(MemoryStore::with_project("p1", "u1", 0), planner_returning("{}", 0));

    let mut req = request("p1");
    req.replace_existing = true;
    let err = h.builder.build(req, "u1").await.unwrap_err();

    assert!(matches!(err, BuildError::Validation(_)));
    assert!(h.store.events().is_empty());
}

#[tokio::test]
async fn test_plan_without_days_fails_without_touching_the_schedule() {
    let store = MemoryStore::with_project("p1", "u1", 2);
    store.seed_day("p1", 1, &["s0"]);
    let h = harness(store, planner_returning(r#"{"schedule": []}"#, 1));

    let mut req = request("p1");
    req.replace_existing = true;
    let err = h.builder.build(req, "u1").await.unwrap_err();

    assert!(matches!(err, BuildError::Upstream(ref m) if m.contains("days")));
    assert!(h.store.events().is_empty());
    assert_eq!(h.store.days.lock().unwrap().len(), 1);
    assert!(h.cache.entries.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_planner_failure_is_upstream() {
    let mut planner = MockSchedulePlanner::new();
    planner
        .expect_plan()
        .times(1)
        .returning(|_| Err(PlannerError::Http { status: 503, body: "overloaded".into() }));
    let h = harness(MemoryStore::with_project("p1", "u1", 2), planner);

    let err = h.builder.build(request("p1"), "u1").await.unwrap_err();
    assert_eq!(err.kind(), "upstream");
    assert!(err.to_string().contains("503"));
}

#[tokio::test]
async fn test_truncated_planner_output_is_upstream() {
    let h = harness(
        MemoryStore::with_project("p1", "u1", 2),
        planner_returning(r#"{"days": [{"sceneIds": ["s0""#, 1),
    );

    let err = h.builder.build(request("p1"), "u1").await.unwrap_err();
    assert!(matches!(err, BuildError::Upstream(ref m) if m.contains("truncated")));
}

#[tokio::test]
async fn test_second_identical_build_uses_cached_plan() {
    let plan = json!({"days": [{"dateOffset": 0, "sceneIds": ["s0"]}]});
    let h = harness(
        MemoryStore::with_project("p1", "u1", 2),
        planner_returning(&plan.to_string(), 1),
    );

    h.builder.build(request("p1"), "u1").await.unwrap();
    let second = h.builder.build(request("p1"), "u1").await.unwrap();
    assert_eq!(second.stats.days_created, 1);

    let entries = h.cache.entries.lock().unwrap();
    assert_eq!(entries.len(), 1);
    let entry = entries.values().next().unwrap();
    assert_eq!(entry.endpoint, SCHEDULE_BUILD_ENDPOINT);
    assert_eq!(entry.project_id.as_deref(), Some("p1"));
    assert_eq!(entry.user_id, "u1");
    assert_eq!(entry.response, plan);
}

#[tokio::test]
async fn test_different_start_date_misses_cache() {
    let plan = json!({"days": []});
    let h = harness(
        MemoryStore::with_project("p1", "u1", 1),
        planner_returning(&plan.to_string(), 2),
    );

    h.builder.build(request("p1"), "u1").await.unwrap();
    let mut later = request("p1");
    later.start_date = NaiveDate::from_ymd_opt(2026, 4, 1);
    h.builder.build(later, "u1").await.unwrap();
}

#[tokio::test]
async fn test_failed_day_is_skipped_and_others_persist() {
    let mut store = MemoryStore::with_project("p1", "u1", 4);
    store.failing_days = vec![1];
    let plan = json!({"days": [
        {"dateOffset": 0, "sceneIds": ["s0", "s1"]},
        {"dateOffset": 1, "sceneIds": ["s2"]}
    ]});
    let h = harness(store, planner_returning(&plan.to_string(), 1));

    let result = h.builder.build(request("p1"), "u1").await.unwrap();

    assert_eq!(result.stats.days_created, 1);
    assert_eq!(result.stats.scenes_assigned, 1);
    assert_eq!(result.stats.scenes_unscheduled, 3);
    assert_eq!(result.shooting_days[0].day.day_number, 2);
    assert_eq!(h.store.marked.lock().unwrap().clone(), vec!["s2".to_string()]);
}

#[tokio::test]
async fn test_replace_with_every_day_failing_leaves_project_empty() {
    let mut store = MemoryStore::with_project("p1", "u1", 3);
    store.failing_days = vec![1, 2];
    store.seed_day("p1", 1, &["s0"]);
    store.seed_day("p1", 2, &["s1"]);
    let plan = json!({"days": [
        {"dateOffset": 0, "sceneIds": ["s0", "s1"]},
        {"dateOffset": 1, "sceneIds": ["s2"]}
    ]});
    let h = harness(store, planner_returning(&plan.to_string(), 1));

    let mut req = request("p1");
    req.replace_existing = true;
    let result = h.builder.build(req, "u1").await.unwrap();

    // The reset is not rolled back; the build still succeeds with nothing created.
    assert_eq!(h.store.events(), vec!["reset".to_string()]);
    assert!(h.store.days.lock().unwrap().is_empty());
    assert!(h.store.scene_links.lock().unwrap().is_empty());
    assert!(h.store.marked.lock().unwrap().is_empty());
    assert_eq!(result.stats.days_created, 0);
    assert_eq!(result.stats.scenes_assigned, 0);
    assert_eq!(result.stats.scenes_unscheduled, 3);
    assert!(result.shooting_days.is_empty());
}

#[tokio::test]
async fn test_day_numbers_follow_plan_order_not_date_offset() {
    let plan = json!({"days": [
        {"dateOffset": 3, "sceneIds": ["s0"]},
        {"dateOffset": 0, "sceneIds": ["s1"]}
    ]});
    let h = harness(
        MemoryStore::with_project("p1", "u1", 2),
        planner_returning(&plan.to_string(), 1),
    );

    let result = h.builder.build(request("p1"), "u1").await.unwrap();
    let days: Vec<(u32, NaiveDate)> = result
        .shooting_days
        .iter()
        .map(|d| (d.day.day_number, d.day.date))
        .collect();
    assert_eq!(days, vec![(1, date(5)), (2, date(2))]);
}

#[tokio::test]
async fn test_scene_planned_on_two_days_stays_on_both() {
    // The plan is not de-duplicated across days; the scene is linked twice
    // and counted twice in scenesAssigned.
    let plan = json!({"days": [
        {"dateOffset": 0, "sceneIds": ["s0", "s1"]},
        {"dateOffset": 1, "sceneIds": ["s1"]}
    ]});
    let h = harness(
        MemoryStore::with_project("p1", "u1", 3),
        planner_returning(&plan.to_string(), 1),
    );

    let result = h.builder.build(request("p1"), "u1").await.unwrap();
    assert_eq!(result.stats.scenes_assigned, 3);
    assert_eq!(result.stats.scenes_unscheduled, 1);
    assert_eq!(
        h.store.linked_scene_ids().iter().filter(|id| *id == "s1").count(),
        2
    );
}

#[tokio::test]
async fn test_scene_status_never_regresses() {
    let store = MemoryStore::with_project("p1", "u1", 3);
    store.scenes.lock().unwrap()[1].status = SceneStatus::Shot;
    let plan = json!({"days": [{"dateOffset": 0, "sceneIds": ["s0", "s1", "s2"]}]});
    let h = harness(store, planner_returning(&plan.to_string(), 1));

    h.builder.build(request("p1"), "u1").await.unwrap();

    let mut marked = h.store.marked.lock().unwrap().clone();
    marked.sort();
    assert_eq!(marked, vec!["s0".to_string(), "s2".to_string()]);
}

#[tokio::test]
async fn test_build_invalidates_schedule_view() {
    let h = harness(
        MemoryStore::with_project("p1", "u1", 1),
        planner_returning(r#"{"days": []}"#, 1),
    );

    h.builder.build(request("p1"), "u1").await.unwrap();
    assert_eq!(
        h.cache.invalidated.lock().unwrap().clone(),
        vec![(SCHEDULE_VIEW_ENDPOINT.to_string(), "p1".to_string())]
    );
}

#[tokio::test]
async fn test_planner_receives_manifest_and_limits() {
    let mut planner = MockSchedulePlanner::new();
    planner
        .expect_plan()
        .withf(|req| {
            req.user_prompt.contains("s0 | Scene 1 | Diner")
                && req.user_prompt.contains("at most 3 scenes")
                && req.max_tokens == PlannerConfig::default().max_tokens
        })
        .times(1)
        .returning(|_| Ok(r#"{"days": []}"#.to_string()));
    let h = harness(MemoryStore::with_project("p1", "u1", 1), planner);

    let mut req = request("p1");
    req.max_scenes_per_day = 3;
    h.builder.build(req, "u1").await.unwrap();
}

#[test]
fn test_parse_plan_reports_extraction_and_shape_errors() {
    assert!(matches!(parse_plan("no json here"), Err(PlanParseError::Extract(ExtractError::NoJson))));
    assert!(matches!(parse_plan("[1, 2]"), Err(PlanParseError::Plan(PlanError::NotAnObject))));

    let (value, plan) = parse_plan("```json\n{\"days\": [{\"sceneIds\": [\"a\"]}]}\n```").unwrap();
    assert_eq!(value["days"][0]["sceneIds"][0], "a");
    assert_eq!(plan.days[0].date_offset, 0);
}

#[test]
fn test_validation_message_uses_field_message() {
    let request = BuildScheduleRequest {
        project_id: "p1".into(),
        max_scenes_per_day: 0,
        ..Default::default()
    };
    let errors = request.validate().unwrap_err();
    assert_eq!(validation_message(&errors), "maxScenesPerDay must be between 1 and 50");
}

#[test]
fn test_project_lock_is_shared_while_held() {
    let h = harness(MemoryStore::default(), MockSchedulePlanner::new());
    let first = h.builder.project_lock("p1");
    let again = h.builder.project_lock("p1");
    assert!(Arc::ptr_eq(&first, &again));

    let other = h.builder.project_lock("p2");
    assert!(!Arc::ptr_eq(&first, &other));

    drop((first, again));
    let fresh = h.builder.project_lock("p1");
    assert_eq!(Arc::strong_count(&fresh), 1);
}
