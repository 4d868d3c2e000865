//! In-memory fakes of the service ports shared by the integration tests.
#![allow(dead_code)]

use api_lib::{
    config::Config,
    web::{jobs::JobRegistry, state::AppState},
};
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHasher, SaltString},
    Argon2,
};
use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{header, Request, Response},
};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use humanizer_core::domain::{
    ChangeKind, HumanizeParams, NewProject, Plan, PlanAllowances, Profile, Project, RowChange,
    Table, User, UserCredentials,
};
use humanizer_core::ports::{ChangeFeed, DatabaseService, HumanizerService, PortError, PortResult};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

pub const ALLOWANCES: PlanAllowances = PlanAllowances {
    free: 10,
    pro: 100,
    enterprise: 500,
};

pub fn test_config() -> Config {
    test_config_with(&[])
}

/// The test configuration with some variables overridden.
pub fn test_config_with(overrides: &[(&str, &str)]) -> Config {
    let mut vars: HashMap<&str, &str> = [
        ("DATABASE_URL", "postgres://unused"),
        ("HUMANIZER_API_KEY", "test-key"),
        ("POLL_INTERVAL_SECS", "5"),
        ("POLL_TIMEOUT_SECS", "300"),
    ]
    .into_iter()
    .collect();
    vars.extend(overrides.iter().copied());
    Config::from_lookup(|name| vars.get(name).map(|v| v.to_string())).unwrap()
}

pub fn app_state(
    db: Arc<InMemoryDb>,
    humanizer: Arc<ScriptedHumanizer>,
    feed: Arc<dyn ChangeFeed>,
) -> Arc<AppState> {
    app_state_with_config(db, humanizer, feed, test_config())
}

pub fn app_state_with_config(
    db: Arc<InMemoryDb>,
    humanizer: Arc<ScriptedHumanizer>,
    feed: Arc<dyn ChangeFeed>,
    config: Config,
) -> Arc<AppState> {
    let jobs = Arc::new(JobRegistry::for_poll_timeout(config.poll_timeout));
    Arc::new(AppState {
        db,
        config: Arc::new(config),
        humanizer,
        change_feed: feed,
        jobs,
        shutdown: CancellationToken::new(),
    })
}

pub fn text_of_len(n: usize) -> String {
    "w".repeat(n)
}

pub async fn body_string(response: Response<Body>) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    serde_json::from_str(&body_string(response).await).unwrap()
}

pub fn json_request(method: &str, uri: &str, session: Option<&str>, body: serde_json::Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(session) = session {
        builder = builder.header(header::COOKIE, format!("session={}", session));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

pub fn empty_request(method: &str, uri: &str, session: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(session) = session {
        builder = builder.header(header::COOKIE, format!("session={}", session));
    }
    builder.body(Body::empty()).unwrap()
}

//=========================================================================================
// InMemoryDb
//=========================================================================================

struct StoredUser {
    user: User,
    hashed_password: String,
    confirmation_token: Option<String>,
    confirmed: bool,
}

#[derive(Default)]
struct Tables {
    users: HashMap<Uuid, StoredUser>,
    sessions: HashMap<String, (Uuid, DateTime<Utc>)>,
    profiles: HashMap<Uuid, Profile>,
    projects: Vec<Project>,
}

/// A `DatabaseService` backed by hash maps. Publishes row changes to `feed`
/// the way the database triggers do.
#[derive(Default)]
pub struct InMemoryDb {
    tables: Mutex<Tables>,
    feed: Option<Arc<dyn ChangeFeed>>,
    pub fail_project_inserts: AtomicBool,
}

impl InMemoryDb {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_feed(feed: Arc<dyn ChangeFeed>) -> Self {
        Self {
            feed: Some(feed),
            ..Self::default()
        }
    }

    fn publish(&self, table: Table, kind: ChangeKind, row_id: Uuid, user_id: Uuid) {
        if let Some(feed) = &self.feed {
            feed.publish(&RowChange {
                table,
                kind,
                row_id,
                user_id,
            });
        }
    }

    /// Creates a confirmed user with a profile and a live session.
    pub fn seed_user(&self, email: &str, plan: Plan, credits_used: i32) -> (User, String) {
        let user = User {
            user_id: Uuid::new_v4(),
            email: email.to_string(),
            name: None,
        };
        let profile = Profile {
            plan,
            credits_used,
            ..Profile::new_free(&user, &ALLOWANCES, Utc::now())
        };
        let session_id = Uuid::new_v4().to_string();
        let mut tables = self.tables.lock().unwrap();
        tables.users.insert(
            user.user_id,
            StoredUser {
                user: user.clone(),
                hashed_password: String::new(),
                confirmation_token: None,
                confirmed: true,
            },
        );
        tables.profiles.insert(user.user_id, profile);
        tables.sessions.insert(
            session_id.clone(),
            (user.user_id, Utc::now() + ChronoDuration::days(1)),
        );
        (user, session_id)
    }

    pub fn seed_project(&self, user_id: Uuid, input: &str, output: &str, created_at: DateTime<Utc>) -> Project {
        let project = Project {
            id: Uuid::new_v4(),
            user_id,
            input_text: input.to_string(),
            output_text: output.to_string(),
            is_favorite: false,
            created_at,
        };
        self.tables.lock().unwrap().projects.push(project.clone());
        project
    }

    pub fn projects_for(&self, user_id: Uuid) -> Vec<Project> {
        self.tables
            .lock()
            .unwrap()
            .projects
            .iter()
            .filter(|p| p.user_id == user_id)
            .cloned()
            .collect()
    }

    pub fn profile_for(&self, user_id: Uuid) -> Option<Profile> {
        self.tables.lock().unwrap().profiles.get(&user_id).cloned()
    }

    pub fn confirmation_token_for(&self, email: &str) -> Option<String> {
        self.tables
            .lock()
            .unwrap()
            .users
            .values()
            .find(|u| u.user.email == email)
            .and_then(|u| u.confirmation_token.clone())
    }

    pub fn session_count(&self) -> usize {
        self.tables.lock().unwrap().sessions.len()
    }

    pub fn hash_password(password: &str) -> String {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .unwrap()
            .to_string()
    }
}

#[async_trait]
impl DatabaseService for InMemoryDb {
    async fn create_user_with_email(
        &self,
        email: &str,
        name: Option<&str>,
        hashed_password: &str,
        confirmation_token: &str,
    ) -> PortResult<User> {
        let mut tables = self.tables.lock().unwrap();
        if tables.users.values().any(|u| u.user.email == email) {
            return Err(PortError::Conflict(format!("Email {} is already registered", email)));
        }
        let user = User {
            user_id: Uuid::new_v4(),
            email: email.to_string(),
            name: name.map(str::to_string),
        };
        tables.users.insert(
            user.user_id,
            StoredUser {
                user: user.clone(),
                hashed_password: hashed_password.to_string(),
                confirmation_token: Some(confirmation_token.to_string()),
                confirmed: false,
            },
        );
        Ok(user)
    }

    async fn confirm_email(&self, confirmation_token: &str) -> PortResult<User> {
        let mut tables = self.tables.lock().unwrap();
        let stored = tables
            .users
            .values_mut()
            .find(|u| u.confirmation_token.as_deref() == Some(confirmation_token))
            .ok_or_else(|| PortError::NotFound("Confirmation token not found".into()))?;
        stored.confirmed = true;
        stored.confirmation_token = None;
        Ok(stored.user.clone())
    }

    async fn get_user_by_id(&self, user_id: Uuid) -> PortResult<User> {
        self.tables
            .lock()
            .unwrap()
            .users
            .get(&user_id)
            .map(|u| u.user.clone())
            .ok_or_else(|| PortError::NotFound(format!("User {} not found", user_id)))
    }

    async fn get_user_by_email(&self, email: &str) -> PortResult<UserCredentials> {
        self.tables
            .lock()
            .unwrap()
            .users
            .values()
            .find(|u| u.user.email == email)
            .map(|u| UserCredentials {
                user_id: u.user.user_id,
                email: u.user.email.clone(),
                hashed_password: u.hashed_password.clone(),
                email_confirmed: u.confirmed,
            })
            .ok_or_else(|| PortError::NotFound(format!("User {} not found", email)))
    }

    async fn create_auth_session(
        &self,
        session_id: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()> {
        self.tables
            .lock()
            .unwrap()
            .sessions
            .insert(session_id.to_string(), (user_id, expires_at));
        Ok(())
    }

    async fn validate_auth_session(&self, session_id: &str) -> PortResult<Uuid> {
        match self.tables.lock().unwrap().sessions.get(session_id) {
            Some((user_id, expires_at)) if *expires_at > Utc::now() => Ok(*user_id),
            _ => Err(PortError::Unauthorized),
        }
    }

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()> {
        self.tables.lock().unwrap().sessions.remove(session_id);
        Ok(())
    }

    async fn get_profile(&self, user_id: Uuid) -> PortResult<Profile> {
        self.profile_for(user_id)
            .ok_or_else(|| PortError::NotFound(format!("Profile {} not found", user_id)))
    }

    async fn create_profile(&self, profile: Profile) -> PortResult<Profile> {
        let (stored, inserted) = {
            let mut tables = self.tables.lock().unwrap();
            let inserted = !tables.profiles.contains_key(&profile.id);
            let stored = tables
                .profiles
                .entry(profile.id)
                .or_insert(profile)
                .clone();
            (stored, inserted)
        };
        if inserted {
            self.publish(Table::Profiles, ChangeKind::Insert, stored.id, stored.id);
        }
        Ok(stored)
    }

    async fn increment_credits_used(&self, user_id: Uuid) -> PortResult<Profile> {
        let updated = {
            let mut tables = self.tables.lock().unwrap();
            let profile = tables
                .profiles
                .get_mut(&user_id)
                .ok_or_else(|| PortError::NotFound(format!("Profile {} not found", user_id)))?;
            profile.credits_used += 1;
            profile.clone()
        };
        self.publish(Table::Profiles, ChangeKind::Update, user_id, user_id);
        Ok(updated)
    }

    async fn insert_project(&self, project: NewProject) -> PortResult<Project> {
        if self.fail_project_inserts.load(Ordering::SeqCst) {
            return Err(PortError::Unexpected("insert refused".into()));
        }
        let saved = Project {
            id: Uuid::new_v4(),
            user_id: project.user_id,
            input_text: project.input_text,
            output_text: project.output_text,
            is_favorite: false,
            created_at: project.created_at,
        };
        self.tables.lock().unwrap().projects.push(saved.clone());
        self.publish(Table::Projects, ChangeKind::Insert, saved.id, saved.user_id);
        Ok(saved)
    }

    async fn list_projects(&self, user_id: Uuid) -> PortResult<Vec<Project>> {
        let mut projects = self.projects_for(user_id);
        projects.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(projects)
    }

    async fn get_project(&self, user_id: Uuid, project_id: Uuid) -> PortResult<Project> {
        self.projects_for(user_id)
            .into_iter()
            .find(|p| p.id == project_id)
            .ok_or_else(|| PortError::NotFound(format!("Project {} not found", project_id)))
    }

    async fn delete_project(&self, user_id: Uuid, project_id: Uuid) -> PortResult<()> {
        let removed = {
            let mut tables = self.tables.lock().unwrap();
            let before = tables.projects.len();
            tables
                .projects
                .retain(|p| !(p.id == project_id && p.user_id == user_id));
            tables.projects.len() < before
        };
        if !removed {
            return Err(PortError::NotFound(format!("Project {} not found", project_id)));
        }
        self.publish(Table::Projects, ChangeKind::Delete, project_id, user_id);
        Ok(())
    }

    async fn toggle_favorite(&self, user_id: Uuid, project_id: Uuid) -> PortResult<Project> {
        let updated = {
            let mut tables = self.tables.lock().unwrap();
            let project = tables
                .projects
                .iter_mut()
                .find(|p| p.id == project_id && p.user_id == user_id)
                .ok_or_else(|| PortError::NotFound(format!("Project {} not found", project_id)))?;
            project.is_favorite = !project.is_favorite;
            project.clone()
        };
        self.publish(Table::Projects, ChangeKind::Update, project_id, user_id);
        Ok(updated)
    }
}

//=========================================================================================
// ScriptedHumanizer
//=========================================================================================

pub enum SubmitBehavior {
    Accept(String),
    /// Accepts every submission under a fresh id: `job-1`, `job-2`, ...
    AcceptNumbered,
    PaymentRequired,
    Fail,
}

/// One scripted answer to a status check.
pub enum StatusStep {
    Pending,
    Output(String),
    Error,
    /// Answers with the inner step after sleeping.
    Delayed(Duration, Box<StatusStep>),
}

/// A `HumanizerService` that replays a script. Once the script runs out every
/// status check reports "still pending".
pub struct ScriptedHumanizer {
    submit: SubmitBehavior,
    script: Mutex<VecDeque<StatusStep>>,
    pub submit_calls: AtomicUsize,
    pub status_calls: AtomicUsize,
    pub last_params: Mutex<Option<HumanizeParams>>,
}

impl ScriptedHumanizer {
    pub fn new(submit: SubmitBehavior, script: Vec<StatusStep>) -> Self {
        Self {
            submit,
            script: Mutex::new(script.into()),
            submit_calls: AtomicUsize::new(0),
            status_calls: AtomicUsize::new(0),
            last_params: Mutex::new(None),
        }
    }

    pub fn submits(&self) -> usize {
        self.submit_calls.load(Ordering::SeqCst)
    }

    pub fn status_checks(&self) -> usize {
        self.status_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HumanizerService for ScriptedHumanizer {
    async fn submit(&self, _text: &str, params: &HumanizeParams) -> PortResult<String> {
        let call = self.submit_calls.fetch_add(1, Ordering::SeqCst) + 1;
        *self.last_params.lock().unwrap() = Some(params.clone());
        match &self.submit {
            SubmitBehavior::Accept(id) => Ok(id.clone()),
            SubmitBehavior::AcceptNumbered => Ok(format!("job-{}", call)),
            SubmitBehavior::PaymentRequired => Err(PortError::InsufficientCredits),
            SubmitBehavior::Fail => Err(PortError::Unexpected("HTTP 500".into())),
        }
    }

    async fn status(&self, _job_id: &str) -> PortResult<Option<String>> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        let mut step = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(StatusStep::Pending);
        loop {
            match step {
                StatusStep::Pending => return Ok(None),
                StatusStep::Output(output) => return Ok(Some(output)),
                StatusStep::Error => return Err(PortError::Unexpected("status failed".into())),
                StatusStep::Delayed(delay, inner) => {
                    tokio::time::sleep(delay).await;
                    step = *inner;
                }
            }
        }
    }
}
