use std::sync::Arc;

use async_graphql::MaybeUndefined;
use time::macros::{date, datetime};
use time::Duration;

use crate::db::{self, Store};
use crate::error::TrackerError;
use crate::models::audit::{AuditFilter, AuditLog};
use crate::models::comment::TaskComment;
use crate::models::dashboard::Dashboard;
use crate::models::event::NewEvent;
use crate::models::export::ExportData;
use crate::models::member::roster::Roster;
use crate::models::semester::{NewSemester, Semester};
use crate::models::stats::{OverviewStats, UserStats};
use crate::models::task::assignment::TaskAssignment;
use crate::models::task::{Task, TaskDraft, TaskStatus, TaskUpdate};
use crate::models::team::Team;
use crate::models::template::expand::{create_from_template, create_from_week_template};
use crate::models::template::EventTemplateDraft;
use crate::models::week::{NewWeek, Week};
use crate::models::{GqlDate, GqlDateTime};
use crate::notify::reminder::ReminderScan;
use crate::notify::Notifier;

use self::mock::{Fixture, InterferingNotifier, RecordingNotifier, UndeliverableNotifier};

pub mod mock;

#[tokio::test]
async fn members_only_see_tasks_handed_to_them() {
    let fixture = Fixture::new().await;
    let member_id = fixture.member.id;
    let team_id = fixture.team.id;
    let outsider_id = fixture.outsider.id;

    fixture
        .add_task("Direct", |task| task.assigned_to = Some(member_id))
        .await;
    fixture
        .add_task("Team", |task| task.assigned_team_id = Some(team_id))
        .await;
    fixture
        .add_task("Pool", |task| task.pool = vec![outsider_id])
        .await;
    fixture.add_task("Nobody", |_| {}).await;

    let titles = |tasks: Vec<Task>| tasks.into_iter().map(|task| task.title).collect::<Vec<_>>();
    let event_id = fixture.event.id;

    let member_tasks = Task::for_event(event_id, &fixture.member, &fixture.store)
        .await
        .unwrap();
    assert_eq!(titles(member_tasks), vec!["Direct", "Team"]);

    let outsider_tasks = Task::for_event(event_id, &fixture.outsider, &fixture.store)
        .await
        .unwrap();
    assert_eq!(titles(outsider_tasks), vec!["Pool"]);

    let admin_tasks = Task::for_event(event_id, &fixture.admin, &fixture.store)
        .await
        .unwrap();
    assert_eq!(admin_tasks.len(), 4);
}

#[tokio::test]
async fn dashboard_is_empty_off_the_roster() {
    let fixture = Fixture::new().await;
    let member_id = fixture.member.id;
    let outsider_id = fixture.outsider.id;
    fixture
        .add_task("Bring dates", |task| task.assigned_to = Some(member_id))
        .await;
    fixture
        .add_task("Print flyers", |task| task.pool = vec![outsider_id])
        .await;
    let today = date!(2024 - 09 - 04);

    let outsider = Dashboard::for_user(&fixture.outsider, today, &fixture.store)
        .await
        .unwrap();
    assert_eq!(outsider.semester.map(|s| s.id), Some(fixture.semester.id));
    assert!(outsider.weeks.is_empty());

    let member = Dashboard::for_user(&fixture.member, today, &fixture.store)
        .await
        .unwrap();
    assert_eq!(member.weeks.len(), 1);
    assert!(member.weeks[0].is_current);
    assert_eq!(member.weeks[0].events.len(), 1);
    assert_eq!(member.weeks[0].events[0].tasks.len(), 1);
    assert_eq!(member.weeks[0].events[0].tasks[0].title, "Bring dates");
}

#[tokio::test]
async fn dashboard_without_active_semester_is_empty() {
    let fixture = Fixture::new().await;
    let mut semester = fixture.semester.clone();
    semester.is_active = false;
    fixture.store.save_semester(&semester).await.unwrap();

    let dashboard = Dashboard::for_user(&fixture.admin, date!(2024 - 09 - 04), &fixture.store)
        .await
        .unwrap();
    assert!(dashboard.semester.is_none());
    assert!(dashboard.weeks.is_empty());
}

#[tokio::test]
async fn template_with_missing_teams_creates_nothing() {
    let fixture = Fixture::new().await;
    let when = GqlDateTime(datetime!(2024-09-08 19:00 UTC));

    let result = create_from_template(
        "sweet_sunday",
        fixture.week.id,
        when,
        None,
        None,
        &fixture.admin,
        &fixture.store,
    )
    .await;
    match result {
        Err(TrackerError::Validation(message)) => {
            assert_eq!(
                message,
                "Teams not found: Finance, Logistics. Create them before using this template."
            );
        }
        other => panic!("expected a validation error, got {other:?}"),
    }
    assert_eq!(fixture.store.events(fixture.week.id).await.unwrap().len(), 1);

    fixture.store.insert_team("Finance", "#10B981").await.unwrap();
    fixture.store.insert_team("logistics", "#F59E0B").await.unwrap();

    let event = create_from_template(
        "sweet_sunday",
        fixture.week.id,
        when,
        None,
        Some("Library Lawn".to_owned()),
        &fixture.admin,
        &fixture.store,
    )
    .await
    .unwrap();
    assert_eq!(event.name, "Sweet Sunday");
    assert_eq!(event.location.as_deref(), Some("Library Lawn"));

    let tasks = fixture.store.tasks(event.id).await.unwrap();
    assert_eq!(tasks.len(), 5);
    assert!(tasks.iter().all(|task| task.status == TaskStatus::Pending));
    assert!(tasks.iter().all(|task| task.assigned_team_id.is_some()));
}

#[tokio::test]
async fn week_template_schedules_events_from_week_start() {
    let fixture = Fixture::new().await;

    let names = create_from_week_template("jumuah_halaqa", fixture.week.id, &fixture.admin, &fixture.store)
        .await
        .unwrap();
    assert_eq!(names.len(), 2);
    assert!(names.contains(&"Jumuah Prayer".to_owned()));
    assert!(names.contains(&"Weekly Halaqa".to_owned()));

    let events = fixture.store.events(fixture.week.id).await.unwrap();
    let jumuah = events
        .iter()
        .find(|event| event.name == "Jumuah Prayer")
        .unwrap();
    assert_eq!(jumuah.datetime, GqlDateTime(datetime!(2024-09-06 12:30 UTC)));
    assert_eq!(jumuah.location.as_deref(), Some("HBKU Mosque"));
}

#[tokio::test]
async fn one_shot_reminder_fires_once() {
    let fixture = Fixture::new().await;
    let member_id = fixture.member.id;
    let task = fixture
        .add_task("Buy juice", |task| {
            task.assigned_to = Some(member_id);
            task.reminder_time = Some(GqlDateTime(datetime!(2024-09-05 09:00 UTC)));
        })
        .await;
    let notifier = RecordingNotifier::default();
    let now = datetime!(2024-09-05 10:00 UTC);

    let fired = ReminderScan::OneShot
        .run(now, &fixture.store, &notifier)
        .await
        .unwrap();
    assert_eq!(fired, 1);
    let again = ReminderScan::OneShot
        .run(now, &fixture.store, &notifier)
        .await
        .unwrap();
    assert_eq!(again, 0);

    let reminders = notifier.reminders.lock().await;
    assert_eq!(reminders.len(), 1);
    assert_eq!(reminders[0].recipient_ids, vec!["123456789012345678".to_owned()]);
    assert_eq!(reminders[0].event_name, "Sweet Sunday");
    assert!(fixture.store.task(task.id).await.unwrap().unwrap().reminder_sent);
}

#[tokio::test]
async fn one_shot_reminder_without_recipients_is_still_spent() {
    let fixture = Fixture::new().await;
    let task = fixture
        .add_task("Unassigned", |task| {
            task.reminder_time = Some(GqlDateTime(datetime!(2024-09-05 09:00 UTC)));
        })
        .await;
    let notifier = RecordingNotifier::default();

    let fired = ReminderScan::OneShot
        .run(datetime!(2024-09-05 10:00 UTC), &fixture.store, &notifier)
        .await
        .unwrap();

    assert_eq!(fired, 1);
    assert!(notifier.reminders.lock().await.is_empty());
    assert!(fixture.store.task(task.id).await.unwrap().unwrap().reminder_sent);
}

#[tokio::test]
async fn auto_reminder_waits_for_an_assignee() {
    let fixture = Fixture::new().await;
    let task = fixture.add_task("Set up tables", |_| {}).await;
    let notifier = RecordingNotifier::default();
    let now = fixture.event.datetime.0 - Duration::hours(3);

    let fired = ReminderScan::Auto
        .run(now, &fixture.store, &notifier)
        .await
        .unwrap();
    assert_eq!(fired, 0);
    assert!(!fixture.store.task(task.id).await.unwrap().unwrap().auto_reminder_sent);

    let team_id = fixture.team.id;
    fixture
        .store
        .modify_task(
            task.id,
            db::edit(move |task| {
                task.assigned_team_id = Some(team_id);
                Ok(())
            }),
        )
        .await
        .unwrap();

    let fired = ReminderScan::Auto
        .run(now, &fixture.store, &notifier)
        .await
        .unwrap();
    assert_eq!(fired, 1);
    assert!(fixture.store.task(task.id).await.unwrap().unwrap().auto_reminder_sent);
    assert_eq!(notifier.reminders.lock().await.len(), 1);
}

#[tokio::test]
async fn auto_reminder_skips_resolved_and_distant_tasks() {
    let fixture = Fixture::new().await;
    let member_id = fixture.member.id;
    let task = fixture
        .add_task("Done already", |task| task.assigned_to = Some(member_id))
        .await;
    Task::mark_done(task.id, &fixture.member, &fixture.store)
        .await
        .unwrap();
    let notifier = RecordingNotifier::default();

    let close = fixture.event.datetime.0 - Duration::hours(1);
    let fired = ReminderScan::Auto
        .run(close, &fixture.store, &notifier)
        .await
        .unwrap();
    assert_eq!(fired, 0);

    fixture
        .add_task("Pending", |task| task.assigned_to = Some(member_id))
        .await;
    let distant = fixture.event.datetime.0 - Duration::hours(30);
    let fired = ReminderScan::Auto
        .run(distant, &fixture.store, &notifier)
        .await
        .unwrap();
    assert_eq!(fired, 0);
}

#[tokio::test]
async fn only_one_semester_is_ever_active() {
    let fixture = Fixture::new().await;

    let spring = Semester::create(
        NewSemester {
            name: "Spring 2025".to_owned(),
            start_date: GqlDate(date!(2025 - 01 - 10)),
            end_date: GqlDate(date!(2025 - 05 - 10)),
            is_active: true,
        },
        &fixture.admin,
        &fixture.store,
    )
    .await
    .unwrap();
    let active = fixture.store.active_semester().await.unwrap().unwrap();
    assert_eq!(active.id, spring.id);

    Semester::activate(fixture.semester.id, &fixture.admin, &fixture.store)
        .await
        .unwrap();
    let semesters = fixture.store.semesters().await.unwrap();
    let active = semesters
        .iter()
        .filter(|semester| semester.is_active)
        .map(|semester| semester.id)
        .collect::<Vec<_>>();
    assert_eq!(active, vec![fixture.semester.id]);
}

#[tokio::test]
async fn semester_dates_must_run_forwards() {
    let fixture = Fixture::new().await;

    let result = Semester::create(
        NewSemester {
            name: "Backwards".to_owned(),
            start_date: GqlDate(date!(2025 - 05 - 10)),
            end_date: GqlDate(date!(2025 - 01 - 10)),
            is_active: false,
        },
        &fixture.admin,
        &fixture.store,
    )
    .await;
    assert!(matches!(result, Err(TrackerError::Validation(_))));
}

#[tokio::test]
async fn week_numbers_are_unique_per_semester() {
    let fixture = Fixture::new().await;
    let duplicate = NewWeek {
        semester_id: fixture.semester.id,
        week_number: 1,
        start_date: GqlDate(date!(2024 - 09 - 09)),
        end_date: GqlDate(date!(2024 - 09 - 15)),
    };

    let result = Week::create(duplicate.clone(), &fixture.admin, &fixture.store).await;
    assert!(matches!(result, Err(TrackerError::Conflict(_))));

    let second = Week::create(
        NewWeek {
            week_number: 2,
            ..duplicate
        },
        &fixture.admin,
        &fixture.store,
    )
    .await
    .unwrap();
    assert_eq!(second.week_number, 2);
}

#[tokio::test]
async fn weeks_must_sit_inside_their_semester() {
    let fixture = Fixture::new().await;

    let result = Week::create(
        NewWeek {
            semester_id: fixture.semester.id,
            week_number: 20,
            start_date: GqlDate(date!(2024 - 12 - 18)),
            end_date: GqlDate(date!(2024 - 12 - 24)),
        },
        &fixture.admin,
        &fixture.store,
    )
    .await;
    assert!(matches!(result, Err(TrackerError::Validation(_))));
}

#[tokio::test]
async fn roster_additions_skip_existing_and_unknown_users() {
    let fixture = Fixture::new().await;

    let change = Roster::add(
        fixture.semester.id,
        &[fixture.member.id, fixture.outsider.id, 9_999],
        &fixture.admin,
        &fixture.store,
    )
    .await
    .unwrap();
    assert_eq!(change.added, 1);
    assert_eq!(change.skipped, 2);

    let available = Roster::available(fixture.semester.id, &fixture.store)
        .await
        .unwrap();
    assert!(available.is_empty());

    Roster::remove(fixture.semester.id, fixture.outsider.id, &fixture.admin, &fixture.store)
        .await
        .unwrap();
    let missing = Roster::remove(fixture.semester.id, fixture.outsider.id, &fixture.admin, &fixture.store).await;
    assert!(matches!(missing, Err(TrackerError::NotFound(_))));
}

#[tokio::test]
async fn deleting_a_team_unassigns_members_and_tasks() {
    let fixture = Fixture::new().await;
    let team_id = fixture.team.id;
    let task = fixture
        .add_task("Film the talk", |task| task.assigned_team_id = Some(team_id))
        .await;

    Team::delete(team_id, &fixture.admin, &fixture.store)
        .await
        .unwrap();

    let member = fixture.store.user(fixture.member.id).await.unwrap().unwrap();
    assert_eq!(member.team_id, None);
    let task = fixture.store.task(task.id).await.unwrap().unwrap();
    assert_eq!(task.assigned_team_id, None);
}

#[tokio::test]
async fn blocking_a_task_needs_a_reason_and_alerts_admins() {
    let fixture = Fixture::new().await;
    let member_id = fixture.member.id;
    let task = fixture
        .add_task("Book the room", |task| task.assigned_to = Some(member_id))
        .await;
    let recorder = Arc::new(RecordingNotifier::default());
    let notifier: Arc<dyn Notifier> = recorder.clone();

    let blank = Task::mark_cannot_do(task.id, &fixture.member, "   ", &fixture.store, notifier.clone()).await;
    assert!(matches!(blank, Err(TrackerError::Validation(_))));

    let blocked = Task::mark_cannot_do(task.id, &fixture.member, " Sick ", &fixture.store, notifier)
        .await
        .unwrap();
    assert_eq!(blocked.status, TaskStatus::CannotDo);
    assert_eq!(blocked.cannot_do_reason.as_deref(), Some("Sick"));
    assert_eq!(blocked.completed_by, Some(member_id));

    for _ in 0..50 {
        if !recorder.alerts.lock().await.is_empty() {
            break;
        }
        tokio::task::yield_now().await;
    }
    let alerts = recorder.alerts.lock().await;
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].user_display_name, fixture.member.display_name);
    assert_eq!(alerts[0].reason, "Sick");

    let undone = Task::undo(task.id, &fixture.member, &fixture.store)
        .await
        .unwrap();
    assert_eq!(undone.status, TaskStatus::Pending);
    assert_eq!(undone.cannot_do_reason, None);
}

#[tokio::test]
async fn strangers_cannot_resolve_tasks() {
    let fixture = Fixture::new().await;
    let member_id = fixture.member.id;
    let task = fixture
        .add_task("Order pizza", |task| task.assigned_to = Some(member_id))
        .await;

    let result = Task::mark_done(task.id, &fixture.outsider, &fixture.store).await;
    assert!(matches!(result, Err(TrackerError::Forbidden(_))));

    let done = Task::mark_done(task.id, &fixture.admin, &fixture.store)
        .await
        .unwrap();
    assert_eq!(done.completed_by, Some(fixture.admin.id));
}

#[tokio::test]
async fn comments_follow_task_visibility() {
    let fixture = Fixture::new().await;
    let member_id = fixture.member.id;
    let task = fixture
        .add_task("Reserve parking", |task| task.assigned_to = Some(member_id))
        .await;

    let hidden = TaskComment::add(task.id, "Can I help?", &fixture.outsider, &fixture.store).await;
    assert!(matches!(hidden, Err(TrackerError::Forbidden(_))));

    let empty = TaskComment::add(task.id, "  ", &fixture.member, &fixture.store).await;
    assert!(matches!(empty, Err(TrackerError::Validation(_))));

    let comment = TaskComment::add(task.id, " On it ", &fixture.member, &fixture.store)
        .await
        .unwrap();
    assert_eq!(comment.content, "On it");

    let too_long = "a".repeat(2001);
    let long = TaskComment::add(task.id, &too_long, &fixture.member, &fixture.store).await;
    assert!(matches!(long, Err(TrackerError::Validation(_))));

    TaskComment::delete(task.id, comment.id, &fixture.admin, &fixture.store)
        .await
        .unwrap();
    let remaining = TaskComment::for_task(task.id, &fixture.member, &fixture.store)
        .await
        .unwrap();
    assert!(remaining.is_empty());
}

#[tokio::test]
async fn audit_log_pages_newest_first() {
    let fixture = Fixture::new().await;
    let member_id = fixture.member.id;
    let task = fixture
        .add_task("Clean up", |task| task.assigned_to = Some(member_id))
        .await;

    Task::mark_done(task.id, &fixture.member, &fixture.store)
        .await
        .unwrap();
    Task::undo(task.id, &fixture.member, &fixture.store)
        .await
        .unwrap();

    let page = AuditLog::page(AuditFilter::default(), 1, 10, &fixture.store)
        .await
        .unwrap();
    assert_eq!(page.total, 2);
    assert_eq!(page.total_pages, 1);
    assert_eq!(page.items[0].action, "TASK_UNDO");
    assert_eq!(page.items[1].action, "TASK_DONE");

    let filtered = AuditLog::page(
        AuditFilter {
            action: Some("TASK_DONE".to_owned()),
            ..Default::default()
        },
        1,
        10,
        &fixture.store,
    )
    .await
    .unwrap();
    assert_eq!(filtered.total, 1);

    let bad_size = AuditLog::page(AuditFilter::default(), 1, 5, &fixture.store).await;
    assert!(matches!(bad_size, Err(TrackerError::Validation(_))));
}

#[tokio::test]
async fn completion_stats_count_every_channel() {
    let fixture = Fixture::new().await;
    let member_id = fixture.member.id;
    let team_id = fixture.team.id;
    let direct = fixture
        .add_task("Direct", |task| task.assigned_to = Some(member_id))
        .await;
    fixture
        .add_task("Team", |task| task.assigned_team_id = Some(team_id))
        .await;
    Task::mark_done(direct.id, &fixture.member, &fixture.store)
        .await
        .unwrap();

    let overview = OverviewStats::load(None, &fixture.store).await.unwrap();
    assert_eq!(overview.total_tasks, 2);
    assert_eq!(overview.tasks_completed, 1);
    assert_eq!(overview.tasks_pending, 1);
    assert_eq!(overview.completion_rate, 50.0);

    let users = UserStats::load(None, &fixture.store).await.unwrap();
    let member = users
        .iter()
        .find(|stats| stats.user_id == member_id)
        .unwrap();
    assert_eq!(member.tasks_assigned, 2);
    assert_eq!(member.tasks_completed, 1);
}

#[tokio::test]
async fn exported_semesters_import_under_a_new_name() {
    let fixture = Fixture::new().await;
    let member_id = fixture.member.id;
    let team_id = fixture.team.id;
    let task = fixture
        .add_task("Direct", |task| {
            task.assigned_to = Some(member_id);
            task.assigned_team_id = Some(team_id);
        })
        .await;
    Task::mark_done(task.id, &fixture.member, &fixture.store)
        .await
        .unwrap();

    let mut export = ExportData::semester(fixture.semester.id, &fixture.store)
        .await
        .unwrap();
    let skipped = export
        .clone()
        .import(&fixture.admin, &fixture.store)
        .await
        .unwrap();
    assert_eq!(skipped.semesters_created, 0);
    assert_eq!(skipped.errors, vec!["Semester 'Fall 2024' already exists, skipped".to_owned()]);

    export.semesters[0].name = "Fall 2024 (restored)".to_owned();
    let result = export.import(&fixture.admin, &fixture.store).await.unwrap();
    assert_eq!(result.semesters_created, 1);
    assert_eq!(result.weeks_created, 1);
    assert_eq!(result.events_created, 1);
    assert_eq!(result.tasks_created, 1);
    assert!(result.errors.is_empty());

    let restored = fixture
        .store
        .semester_by_name("Fall 2024 (restored)")
        .await
        .unwrap()
        .unwrap();
    assert!(!restored.is_active);
    assert!(fixture.store.on_roster(restored.id, member_id).await.unwrap());

    let week = &fixture.store.weeks(restored.id).await.unwrap()[0];
    let event = &fixture.store.events(week.id).await.unwrap()[0];
    let task = &fixture.store.tasks(event.id).await.unwrap()[0];
    assert_eq!(task.status, TaskStatus::Done);
    assert_eq!(task.assigned_to, Some(member_id));
    assert_eq!(task.assigned_team_id, Some(team_id));
    assert_eq!(task.completed_by, Some(member_id));
}

#[tokio::test]
async fn reminders_skip_tasks_resolved_mid_scan() {
    let fixture = Fixture::new().await;
    let member_id = fixture.member.id;
    let due = Some(GqlDateTime(datetime!(2024-09-05 09:00 UTC)));
    let first = fixture
        .add_task("First", |task| {
            task.assigned_to = Some(member_id);
            task.reminder_time = due;
        })
        .await;
    let second = fixture
        .add_task("Second", |task| {
            task.assigned_to = Some(member_id);
            task.reminder_time = due;
        })
        .await;
    let notifier = InterferingNotifier::new(
        &fixture.store,
        second.id,
        db::edit(move |task| {
            task.complete(member_id);
            Ok(())
        }),
    );

    let fired = ReminderScan::OneShot
        .run(datetime!(2024-09-05 10:00 UTC), &fixture.store, &notifier)
        .await
        .unwrap();

    assert_eq!(fired, 1);
    assert_eq!(*notifier.sent.lock().await, vec!["First"]);
    assert!(fixture.store.task(first.id).await.unwrap().unwrap().reminder_sent);
    let second = fixture.store.task(second.id).await.unwrap().unwrap();
    assert_eq!(second.status, TaskStatus::Done);
    assert!(!second.reminder_sent);
}

#[tokio::test]
async fn reminder_rescheduled_mid_scan_stays_armed() {
    let fixture = Fixture::new().await;
    let member_id = fixture.member.id;
    let due = Some(GqlDateTime(datetime!(2024-09-05 09:00 UTC)));
    let later = Some(GqlDateTime(datetime!(2024-09-05 12:00 UTC)));
    fixture
        .add_task("First", |task| {
            task.assigned_to = Some(member_id);
            task.reminder_time = due;
        })
        .await;
    let second = fixture
        .add_task("Second", |task| {
            task.assigned_to = Some(member_id);
            task.reminder_time = due;
        })
        .await;
    let notifier = InterferingNotifier::new(
        &fixture.store,
        second.id,
        db::edit(move |task| {
            task.reschedule_reminder(later);
            Ok(())
        }),
    );

    let fired = ReminderScan::OneShot
        .run(datetime!(2024-09-05 10:00 UTC), &fixture.store, &notifier)
        .await
        .unwrap();
    assert_eq!(fired, 1);
    let rescheduled = fixture.store.task(second.id).await.unwrap().unwrap();
    assert_eq!(rescheduled.reminder_time, later);
    assert!(!rescheduled.reminder_sent);

    let recorder = RecordingNotifier::default();
    let fired = ReminderScan::OneShot
        .run(datetime!(2024-09-05 12:30 UTC), &fixture.store, &recorder)
        .await
        .unwrap();
    assert_eq!(fired, 1);
    assert_eq!(recorder.reminders.lock().await[0].task_title, "Second");
}

#[tokio::test]
async fn auto_reminders_skip_tasks_resolved_mid_scan() {
    let fixture = Fixture::new().await;
    let member_id = fixture.member.id;
    fixture
        .add_task("First", |task| task.assigned_to = Some(member_id))
        .await;
    let second = fixture
        .add_task("Second", |task| task.assigned_to = Some(member_id))
        .await;
    let notifier = InterferingNotifier::new(
        &fixture.store,
        second.id,
        db::edit(move |task| {
            task.block(member_id, "Travelling".to_owned());
            Ok(())
        }),
    );

    let fired = ReminderScan::Auto
        .run(fixture.event.datetime.0 - Duration::hours(3), &fixture.store, &notifier)
        .await
        .unwrap();

    assert_eq!(fired, 1);
    assert_eq!(*notifier.sent.lock().await, vec!["First"]);
    let second = fixture.store.task(second.id).await.unwrap().unwrap();
    assert_eq!(second.status, TaskStatus::CannotDo);
    assert!(!second.auto_reminder_sent);
}

#[tokio::test]
async fn undelivered_reminders_are_retried() {
    let fixture = Fixture::new().await;
    let member_id = fixture.member.id;
    let task = fixture
        .add_task("Bring dates", |task| {
            task.assigned_to = Some(member_id);
            task.reminder_time = Some(GqlDateTime(datetime!(2024-09-05 09:00 UTC)));
        })
        .await;
    let now = datetime!(2024-09-06 15:00 UTC);

    let fired = ReminderScan::OneShot
        .run(now, &fixture.store, &UndeliverableNotifier)
        .await
        .unwrap();
    assert_eq!(fired, 0);
    let fired = ReminderScan::Auto
        .run(now, &fixture.store, &UndeliverableNotifier)
        .await
        .unwrap();
    assert_eq!(fired, 0);

    let stored = fixture.store.task(task.id).await.unwrap().unwrap();
    assert!(!stored.reminder_sent);
    assert!(!stored.auto_reminder_sent);

    let recorder = RecordingNotifier::default();
    let fired = ReminderScan::OneShot
        .run(now, &fixture.store, &recorder)
        .await
        .unwrap();
    assert_eq!(fired, 1);
}

#[tokio::test]
async fn reassigning_a_resolved_task_reopens_it() {
    let fixture = Fixture::new().await;
    let member_id = fixture.member.id;
    let outsider_id = fixture.outsider.id;
    let task = fixture
        .add_task("Print flyers", |task| task.assigned_to = Some(member_id))
        .await;
    Task::mark_done(task.id, &fixture.member, &fixture.store)
        .await
        .unwrap();

    let same_owner = Task::update(
        task.id,
        TaskUpdate {
            assigned_to: MaybeUndefined::Value(member_id),
            ..Default::default()
        },
        &fixture.admin,
        &fixture.store,
    )
    .await
    .unwrap();
    assert_eq!(same_owner.status, TaskStatus::Done);
    assert_eq!(same_owner.completed_by, Some(member_id));

    let pool_only = Task::update(
        task.id,
        TaskUpdate {
            assigned_user_ids: Some(vec![outsider_id]),
            ..Default::default()
        },
        &fixture.admin,
        &fixture.store,
    )
    .await
    .unwrap();
    assert_eq!(pool_only.status, TaskStatus::Done);
    assert_eq!(
        fixture.store.pool_assignments(&[task.id]).await.unwrap(),
        vec![TaskAssignment {
            task_id: task.id,
            user_id: outsider_id,
        }]
    );

    let reassigned = Task::update(
        task.id,
        TaskUpdate {
            assigned_to: MaybeUndefined::Value(outsider_id),
            ..Default::default()
        },
        &fixture.admin,
        &fixture.store,
    )
    .await
    .unwrap();
    assert_eq!(reassigned.status, TaskStatus::Pending);
    assert_eq!(reassigned.assigned_to, Some(outsider_id));
    assert_eq!(reassigned.completed_by, None);
}

#[tokio::test]
async fn new_reminder_time_rearms_the_reminder() {
    let fixture = Fixture::new().await;
    let member_id = fixture.member.id;
    let task = fixture
        .add_task("Call the imam", |task| {
            task.assigned_to = Some(member_id);
            task.reminder_time = Some(GqlDateTime(datetime!(2024-09-05 09:00 UTC)));
        })
        .await;
    let notifier = RecordingNotifier::default();
    ReminderScan::OneShot
        .run(datetime!(2024-09-05 10:00 UTC), &fixture.store, &notifier)
        .await
        .unwrap();

    let later = GqlDateTime(datetime!(2024-09-05 12:00 UTC));
    let updated = Task::update(
        task.id,
        TaskUpdate {
            reminder_time: MaybeUndefined::Value(later),
            ..Default::default()
        },
        &fixture.admin,
        &fixture.store,
    )
    .await
    .unwrap();
    assert_eq!(updated.reminder_time, Some(later));
    assert!(!updated.reminder_sent);

    let fired = ReminderScan::OneShot
        .run(datetime!(2024-09-05 12:30 UTC), &fixture.store, &notifier)
        .await
        .unwrap();
    assert_eq!(fired, 1);
    assert_eq!(notifier.reminders.lock().await.len(), 2);
}

#[tokio::test]
async fn assignees_can_set_reminders_but_strangers_cannot() {
    let fixture = Fixture::new().await;
    let team_id = fixture.team.id;
    let task = fixture
        .add_task("Collect donations", |task| task.assigned_team_id = Some(team_id))
        .await;
    fixture
        .store
        .modify_task(
            task.id,
            db::edit(|task| {
                task.reminder_sent = true;
                Ok(())
            }),
        )
        .await
        .unwrap();

    let when = Some(GqlDateTime(datetime!(2024-09-06 08:00 UTC)));
    let armed = Task::set_reminder(task.id, when, &fixture.member, &fixture.store)
        .await
        .unwrap();
    assert_eq!(armed.reminder_time, when);
    assert!(!armed.reminder_sent);

    let stranger = Task::set_reminder(task.id, None, &fixture.outsider, &fixture.store).await;
    assert!(matches!(stranger, Err(TrackerError::Forbidden(_))));

    let cleared = Task::set_reminder(task.id, None, &fixture.member, &fixture.store)
        .await
        .unwrap();
    assert_eq!(cleared.reminder_time, None);
}

#[tokio::test]
async fn marking_done_twice_is_audited_twice() {
    let fixture = Fixture::new().await;
    let member_id = fixture.member.id;
    let task = fixture
        .add_task("Stack chairs", |task| task.assigned_to = Some(member_id))
        .await;

    let first = Task::mark_done(task.id, &fixture.member, &fixture.store)
        .await
        .unwrap();
    let second = Task::mark_done(task.id, &fixture.member, &fixture.store)
        .await
        .unwrap();
    assert_eq!(first, second);
    assert_eq!(second.status, TaskStatus::Done);
    assert_eq!(second.completed_by, Some(member_id));

    let done = AuditFilter {
        action: Some("TASK_DONE".to_owned()),
        ..Default::default()
    };
    let page = AuditLog::page(done, 1, 10, &fixture.store).await.unwrap();
    assert_eq!(page.total, 2);
}

#[tokio::test]
async fn failed_task_edit_keeps_the_pool() {
    let fixture = Fixture::new().await;
    let member_id = fixture.member.id;
    let task = fixture
        .add_task("Carry boxes", |task| task.pool = vec![member_id])
        .await;

    let result = fixture
        .store
        .modify_task_with_pool(
            task.id,
            db::edit(|_| Err(TrackerError::validation("Rejected"))),
            Some(vec![fixture.outsider.id]),
        )
        .await;
    assert!(matches!(result, Err(TrackerError::Validation(_))));

    assert_eq!(
        fixture.store.pool_assignments(&[task.id]).await.unwrap(),
        vec![TaskAssignment {
            task_id: task.id,
            user_id: member_id,
        }]
    );
}

#[tokio::test]
async fn event_batches_are_written_together() {
    let fixture = Fixture::new().await;
    let event = |week_id: i64, name: &str| NewEvent {
        week_id,
        name: name.to_owned(),
        datetime: GqlDateTime(datetime!(2024-09-04 18:00 UTC)),
        location: None,
    };
    let task = TaskDraft {
        title: "Set up".to_owned(),
        ..Default::default()
    };

    let result = fixture
        .store
        .insert_events(vec![
            (event(fixture.week.id, "Halaqa"), vec![task.clone()]),
            (event(fixture.week.id + 1000, "Nowhere"), vec![task]),
        ])
        .await;
    assert!(matches!(result, Err(TrackerError::NotFound(_))));
    assert_eq!(fixture.store.events(fixture.week.id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn names_clash_regardless_of_case() {
    let fixture = Fixture::new().await;
    fixture.store.insert_team("Élan", "#6B7280").await.unwrap();

    let found = fixture.store.team_by_name("élan").await.unwrap();
    assert_eq!(found.map(|team| team.name).as_deref(), Some("Élan"));
    let duplicate = fixture.store.insert_team("ÉLAN", "#6B7280").await;
    assert!(matches!(duplicate, Err(TrackerError::Conflict(_))));

    let draft = |name: &str| EventTemplateDraft {
        name: name.to_owned(),
        default_location: None,
        tasks: Vec::new(),
        overrides: None,
    };
    fixture
        .store
        .insert_event_template(&draft("Iftar"))
        .await
        .unwrap();
    let duplicate = fixture.store.insert_event_template(&draft("IFTAR")).await;
    assert!(matches!(duplicate, Err(TrackerError::Conflict(_))));
}
