//! Database-backed tests of the list, queue and reminder models
//!
//! Require PostgreSQL; every test returns early when `DATABASE_URL` is unset.

use chrono::{DateTime, Duration, TimeZone, Utc};
use sqlx::PgPool;
use tasklane_shared::db::migrations::run_migrations;
use tasklane_shared::db::transaction::serializable;
use tasklane_shared::models::{
    membership::{ListRole, Membership},
    queue::{self, ReorderItem},
    reminder::{Reminder, ReminderError, ReminderSpec, ReminderType, TimeUnit},
    task::{CreateTask, Task, TaskPriority},
    task_list::{CreateTaskList, TaskList},
    user::{CreateUser, User},
};
use uuid::Uuid;

async fn test_pool() -> Option<PgPool> {
    let url = std::env::var("DATABASE_URL").ok()?;
    let pool = PgPool::connect(&url).await.expect("connect");
    run_migrations(&pool).await.expect("migrations");
    Some(pool)
}

async fn user(pool: &PgPool, name: &str) -> User {
    User::create(
        pool,
        CreateUser {
            email: format!("{}-{}@Example.com", name, Uuid::new_v4()),
            password_hash: "$argon2id$v=19$m=19456,t=2,p=1$c2FsdA$aGFzaA".to_string(),
            name: name.to_string(),
        },
    )
    .await
    .unwrap()
}

async fn list(pool: &PgPool, owner: &User) -> TaskList {
    TaskList::create(
        pool,
        CreateTaskList {
            name: "Q4".to_string(),
            description: None,
            owner_id: owner.id,
        },
    )
    .await
    .unwrap()
}

async fn task(pool: &PgPool, list: &TaskList, creator: &User, due: Option<DateTime<Utc>>) -> Task {
    Task::create(
        pool,
        CreateTask {
            name: format!("task {}", Uuid::new_v4()),
            description: None,
            priority: TaskPriority::Medium,
            due_date: due,
            estimated_hours: None,
            list_id: list.id,
            project_id: None,
            requester_id: None,
            assigned_to: None,
            created_by: creator.id,
        },
    )
    .await
    .unwrap()
}

fn spec(value: i32, unit: TimeUnit) -> ReminderSpec {
    ReminderSpec {
        reminder_type: ReminderType::Predefined,
        time_value: value,
        time_unit: unit,
    }
}

#[tokio::test]
async fn test_email_is_stored_lowercase() {
    let Some(pool) = test_pool().await else { return };
    let alice = user(&pool, "alice").await;

    assert_eq!(alice.email, alice.email.to_lowercase());
    let found = User::find_by_email(&pool, &alice.email.to_uppercase()).await.unwrap();
    assert_eq!(found.map(|u| u.id), Some(alice.id));
}

#[tokio::test]
async fn test_owner_is_member_with_owner_role() {
    let Some(pool) = test_pool().await else { return };
    let alice = user(&pool, "alice").await;
    let q4 = list(&pool, &alice).await;

    assert_eq!(
        Membership::get_role(&pool, q4.id, alice.id).await.unwrap(),
        Some(ListRole::Owner)
    );
    assert!(TaskList::find_by_invite_code(&pool, &q4.invite_code)
        .await
        .unwrap()
        .is_some());
}

#[tokio::test]
async fn test_queue_stays_dense() {
    let Some(pool) = test_pool().await else { return };
    let alice = user(&pool, "alice").await;
    let q4 = list(&pool, &alice).await;

    let mut tasks = Vec::new();
    for _ in 0..4 {
        let t = task(&pool, &q4, &alice, None).await;
        queue::append(&pool, alice.id, t.id).await.unwrap();
        tasks.push(t.id);
    }

    // Appending twice does not move the task
    let again = queue::append(&pool, alice.id, tasks[0]).await.unwrap();
    assert_eq!(again.position, 1);

    assert!(queue::remove(&pool, alice.id, tasks[1]).await.unwrap());
    let positions = queue::positions(&pool, alice.id, q4.id).await.unwrap();
    assert_eq!(
        positions,
        vec![(tasks[0], 1), (tasks[2], 2), (tasks[3], 3)]
    );

    let order = [tasks[3], tasks[0], tasks[2]];
    let items: Vec<ReorderItem> = order
        .iter()
        .zip(1..)
        .map(|(task_id, position)| ReorderItem { task_id: *task_id, position })
        .collect();
    queue::reorder(&pool, alice.id, q4.id, &items).await.unwrap();
    queue::reorder(&pool, alice.id, q4.id, &items).await.unwrap();

    let positions = queue::positions(&pool, alice.id, q4.id).await.unwrap();
    assert_eq!(
        positions.iter().map(|(id, _)| *id).collect::<Vec<_>>(),
        order.to_vec()
    );
    assert!(queue::is_dense(&positions.iter().map(|(_, p)| *p).collect::<Vec<_>>()));

    // Missing one task is not a permutation
    let err = queue::reorder(&pool, alice.id, q4.id, &items[..2]).await.unwrap_err();
    assert!(matches!(err, queue::QueueError::InvalidReorder(_)));
}

#[tokio::test]
async fn test_concurrent_appends_stay_dense() {
    let Some(pool) = test_pool().await else { return };
    let alice = user(&pool, "alice").await;
    let q4 = list(&pool, &alice).await;

    let mut ids = Vec::new();
    for _ in 0..6 {
        ids.push(task(&pool, &q4, &alice, None).await.id);
    }

    let handles: Vec<_> = ids
        .iter()
        .map(|task_id| {
            let pool = pool.clone();
            let (user_id, task_id) = (alice.id, *task_id);
            tokio::spawn(async move { queue::append(&pool, user_id, task_id).await })
        })
        .collect();
    // A call may give up after its retries; whatever landed must be dense
    let mut landed = 0;
    for handle in handles {
        if handle.await.unwrap().is_ok() {
            landed += 1;
        }
    }
    assert!(landed >= 1);

    let positions: Vec<i32> = queue::positions(&pool, alice.id, q4.id)
        .await
        .unwrap()
        .into_iter()
        .map(|(_, p)| p)
        .collect();
    assert_eq!(positions.len(), landed);
    assert!(queue::is_dense(&positions));
}

#[tokio::test]
async fn test_task_delete_renumbers_every_queue() {
    let Some(pool) = test_pool().await else { return };
    let alice = user(&pool, "alice").await;
    let bob = user(&pool, "bob").await;
    let q4 = list(&pool, &alice).await;
    let mut conn = pool.acquire().await.unwrap();
    Membership::create(&mut *conn, q4.id, bob.id, ListRole::Member).await.unwrap();
    drop(conn);

    let a = task(&pool, &q4, &alice, None).await;
    let b = task(&pool, &q4, &alice, None).await;
    for who in [alice.id, bob.id] {
        queue::append(&pool, who, a.id).await.unwrap();
        queue::append(&pool, who, b.id).await.unwrap();
    }

    let task_id = a.id;
    let deleted = serializable(&pool, |conn| Box::pin(Task::delete_in(conn, task_id)))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(deleted.list_id, q4.id);

    for who in [alice.id, bob.id] {
        assert_eq!(
            queue::positions(&pool, who, q4.id).await.unwrap(),
            vec![(b.id, 1)]
        );
    }
}

#[tokio::test]
async fn test_reminder_offsets_and_duplicates() {
    let Some(pool) = test_pool().await else { return };
    let alice = user(&pool, "alice").await;
    let q4 = list(&pool, &alice).await;
    let due = Utc.with_ymd_and_hms(2030, 1, 1, 10, 0, 0).unwrap();
    let t1 = task(&pool, &q4, &alice, Some(due)).await;

    let created = Reminder::create_batch(
        &pool,
        t1.id,
        alice.id,
        t1.due_date,
        &[spec(30, TimeUnit::Minutes), spec(1, TimeUnit::Weeks)],
    )
    .await
    .unwrap();
    assert_eq!(created[0].reminder_datetime, due - Duration::minutes(30));
    assert_eq!(
        created[1].reminder_datetime,
        Utc.with_ymd_and_hms(2029, 12, 25, 10, 0, 0).unwrap()
    );

    let duplicate = Reminder::create_batch(&pool, t1.id, alice.id, t1.due_date, &[spec(30, TimeUnit::Minutes)])
        .await
        .unwrap_err();
    assert!(matches!(duplicate, ReminderError::Duplicate(_)));

    // A rejected batch writes nothing
    let partial = Reminder::create_batch(
        &pool,
        t1.id,
        alice.id,
        t1.due_date,
        &[spec(2, TimeUnit::Hours), spec(30, TimeUnit::Minutes)],
    )
    .await;
    assert!(partial.is_err());
    assert_eq!(Reminder::list_for_task(&pool, t1.id, alice.id).await.unwrap().len(), 2);

    let no_due = task(&pool, &q4, &alice, None).await;
    let err = Reminder::create_batch(&pool, no_due.id, alice.id, None, &[spec(1, TimeUnit::Days)])
        .await
        .unwrap_err();
    assert!(matches!(err, ReminderError::NoDueDate));
}

#[tokio::test]
async fn test_recalculation_follows_due_date() {
    let Some(pool) = test_pool().await else { return };
    let alice = user(&pool, "alice").await;
    let q4 = list(&pool, &alice).await;
    let due = Utc.with_ymd_and_hms(2030, 1, 1, 10, 0, 0).unwrap();
    let t1 = task(&pool, &q4, &alice, Some(due)).await;

    let created = Reminder::create_batch(&pool, t1.id, alice.id, t1.due_date, &[spec(30, TimeUnit::Minutes)])
        .await
        .unwrap();
    let id = created[0].id;

    let new_due = Utc.with_ymd_and_hms(2030, 1, 2, 10, 0, 0).unwrap();
    let moved = Reminder::recalculate_for_task(&pool, t1.id, Some(new_due), Utc::now())
        .await
        .unwrap();
    assert_eq!(
        moved.rescheduled,
        vec![(id, Utc.with_ymd_and_hms(2030, 1, 2, 9, 30, 0).unwrap())]
    );

    // A due date in the past removes the reminder
    let past = Utc::now() - Duration::days(1);
    let dropped = Reminder::recalculate_for_task(&pool, t1.id, Some(past), Utc::now())
        .await
        .unwrap();
    assert_eq!(dropped.removed, vec![id]);
    assert!(Reminder::find_by_id(&pool, id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_recalculation_moves_siblings_onto_each_others_times() {
    let Some(pool) = test_pool().await else { return };
    let alice = user(&pool, "alice").await;
    let q4 = list(&pool, &alice).await;
    let due = Utc.with_ymd_and_hms(2030, 1, 10, 10, 0, 0).unwrap();
    let t1 = task(&pool, &q4, &alice, Some(due)).await;

    let created = Reminder::create_batch(
        &pool,
        t1.id,
        alice.id,
        t1.due_date,
        &[spec(2, TimeUnit::Days), spec(1, TimeUnit::Days)],
    )
    .await
    .unwrap();

    // One day later: the 2-day reminder lands where the 1-day one was
    let new_due = Utc.with_ymd_and_hms(2030, 1, 11, 10, 0, 0).unwrap();
    let moved = Reminder::recalculate_for_task(&pool, t1.id, Some(new_due), Utc::now())
        .await
        .unwrap();
    assert_eq!(moved.rescheduled.len(), 2);
    assert!(moved.removed.is_empty());

    for (reminder, expected) in created.iter().zip([
        Utc.with_ymd_and_hms(2030, 1, 9, 10, 0, 0).unwrap(),
        Utc.with_ymd_and_hms(2030, 1, 10, 10, 0, 0).unwrap(),
    ]) {
        let stored = Reminder::find_by_id(&pool, reminder.id).await.unwrap().unwrap();
        assert_eq!(stored.reminder_datetime, expected);
    }

    // The constraint still holds for plain inserts
    let duplicate = Reminder::create_batch(&pool, t1.id, alice.id, Some(new_due), &[spec(2, TimeUnit::Days)])
        .await
        .unwrap_err();
    assert!(matches!(duplicate, ReminderError::Duplicate(_)));
}
