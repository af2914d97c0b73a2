use async_trait::async_trait;
use time::macros::{date, datetime};
use tokio::sync::Mutex;

use crate::db::{MemoryStore, Store, TaskEdit};
use crate::models::event::{Event, NewEvent};
use crate::models::member::{Role, User, UserDraft};
use crate::models::semester::{NewSemester, Semester};
use crate::models::task::{Task, TaskDraft, TaskStatus, TaskType};
use crate::models::team::Team;
use crate::models::week::{NewWeek, Week};
use crate::models::{GqlDate, GqlDateTime};
use crate::notify::Notifier;

pub fn mock_task() -> Task {
    Task {
        id: 1,
        event_id: 1,
        title: String::from("Bring the chairs"),
        description: None,
        task_type: TaskType::Setup,
        status: TaskStatus::Pending,
        assigned_to: None,
        assigned_team_id: None,
        completed_by: None,
        cannot_do_reason: None,
        reminder_time: None,
        reminder_sent: false,
        auto_reminder_sent: false,
        created_at: GqlDateTime(datetime!(2024-09-01 12:00 UTC)),
    }
}

pub fn mock_user(id: i64, role: Role, team_id: Option<i64>) -> User {
    User {
        id,
        username: format!("user{id}"),
        display_name: format!("User {id}"),
        discord_id: Some(format!("1000000000000000{id:02}")),
        role,
        team_id,
        created_at: GqlDateTime(datetime!(2024-09-01 12:00 UTC)),
        password_hash: String::from("not-a-real-hash"),
    }
}

/// A store holding one active semester with a single week and event, an
/// admin, a team, and two members (only `member` is on the roster).
pub struct Fixture {
    pub store: MemoryStore,
    pub admin: User,
    pub member: User,
    pub outsider: User,
    pub team: Team,
    pub semester: Semester,
    pub week: Week,
    pub event: Event,
}

impl Fixture {
    pub async fn new() -> Self {
        let store = MemoryStore::new();
        let team = store.insert_team("Media", "#3B82F6").await.unwrap();

        let admin = insert_user(&store, "admin", Role::Admin, None, None).await;
        let member = insert_user(
            &store,
            "aisha",
            Role::Member,
            Some(team.id),
            Some("123456789012345678"),
        )
        .await;
        let outsider = insert_user(&store, "omar", Role::Member, None, Some("223456789012345678")).await;

        let semester = store
            .insert_semester(&NewSemester {
                name: String::from("Fall 2024"),
                start_date: GqlDate(date!(2024 - 09 - 01)),
                end_date: GqlDate(date!(2024 - 12 - 20)),
                is_active: true,
            })
            .await
            .unwrap();
        store.add_to_roster(semester.id, member.id).await.unwrap();

        let week = store
            .insert_week(&NewWeek {
                semester_id: semester.id,
                week_number: 1,
                start_date: GqlDate(date!(2024 - 09 - 02)),
                end_date: GqlDate(date!(2024 - 09 - 08)),
            })
            .await
            .unwrap();
        let event = store
            .insert_event(
                &NewEvent {
                    week_id: week.id,
                    name: String::from("Sweet Sunday"),
                    datetime: GqlDateTime(datetime!(2024-09-06 18:00 UTC)),
                    location: Some(String::from("Student Center")),
                },
                Vec::new(),
            )
            .await
            .unwrap();

        Self {
            store,
            admin,
            member,
            outsider,
            team,
            semester,
            week,
            event,
        }
    }

    pub async fn add_task(&self, title: &str, configure: impl FnOnce(&mut TaskDraft)) -> Task {
        let mut draft = TaskDraft {
            title: title.to_owned(),
            ..Default::default()
        };
        configure(&mut draft);

        self.store.insert_task(self.event.id, draft).await.unwrap()
    }
}

async fn insert_user(
    store: &MemoryStore,
    username: &str,
    role: Role,
    team_id: Option<i64>,
    discord_id: Option<&str>,
) -> User {
    store
        .insert_user(UserDraft {
            username: username.to_owned(),
            display_name: username.to_uppercase(),
            discord_id: discord_id.map(str::to_owned),
            role,
            team_id,
            password_hash: String::from("not-a-real-hash"),
        })
        .await
        .unwrap()
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SentReminder {
    pub recipient_ids: Vec<String>,
    pub task_title: String,
    pub event_name: String,
    pub custom_message: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SentAlert {
    pub user_display_name: String,
    pub task_title: String,
    pub reason: String,
}

/// Keeps every message instead of sending it.
#[derive(Default)]
pub struct RecordingNotifier {
    pub reminders: Mutex<Vec<SentReminder>>,
    pub alerts: Mutex<Vec<SentAlert>>,
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send_reminder(
        &self,
        recipient_ids: &[String],
        task_title: &str,
        event_name: &str,
        custom_message: Option<&str>,
    ) -> bool {
        self.reminders.lock().await.push(SentReminder {
            recipient_ids: recipient_ids.to_vec(),
            task_title: task_title.to_owned(),
            event_name: event_name.to_owned(),
            custom_message: custom_message.map(str::to_owned),
        });
        true
    }

    async fn send_admin_alert(
        &self,
        user_display_name: &str,
        task_title: &str,
        _event_name: &str,
        reason: &str,
    ) -> bool {
        self.alerts.lock().await.push(SentAlert {
            user_display_name: user_display_name.to_owned(),
            task_title: task_title.to_owned(),
            reason: reason.to_owned(),
        });
        true
    }
}

/// Applies `edit` to another task while the first reminder is going out, the
/// way a member acting during a slow webhook call would.
pub struct InterferingNotifier<'a> {
    store: &'a MemoryStore,
    target: i64,
    edit: Mutex<Option<TaskEdit>>,
    pub sent: Mutex<Vec<String>>,
}

impl<'a> InterferingNotifier<'a> {
    pub fn new(store: &'a MemoryStore, target: i64, edit: TaskEdit) -> Self {
        Self {
            store,
            target,
            edit: Mutex::new(Some(edit)),
            sent: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl<'a> Notifier for InterferingNotifier<'a> {
    async fn send_reminder(
        &self,
        _recipient_ids: &[String],
        task_title: &str,
        _event_name: &str,
        _custom_message: Option<&str>,
    ) -> bool {
        let edit = self.edit.lock().await.take();
        if let Some(edit) = edit {
            self.store.modify_task(self.target, edit).await.unwrap();
        }

        self.sent.lock().await.push(task_title.to_owned());
        true
    }

    async fn send_admin_alert(&self, _: &str, _: &str, _: &str, _: &str) -> bool {
        true
    }
}

/// A notifier whose webhook is always down.
pub struct UndeliverableNotifier;

#[async_trait]
impl Notifier for UndeliverableNotifier {
    async fn send_reminder(&self, _: &[String], _: &str, _: &str, _: Option<&str>) -> bool {
        false
    }

    async fn send_admin_alert(&self, _: &str, _: &str, _: &str, _: &str) -> bool {
        false
    }
}
