use campaign_engine::gateway::repo::SqliteGateway;
use campaign_engine::gateway::StoreGateway;
use campaign_engine::models::status::{CallLogStatus, TaskStatus};
use campaign_engine::models::NewCallLog;
use campaign_engine::tz;
use chrono::{Duration, Utc};
use uuid::Uuid;

mod common;

use common::CampaignOpts;

#[test]
fn claim_due_flips_pending_rows_in_order() {
    let (_db, mut conn) = common::setup_db();
    common::assert_sqlite_pragmas(&mut conn);
    let fx = common::seed_active_campaign(&mut conn, &CampaignOpts::default());

    let phone_a = common::seed_phone(&mut conn, &fx.user_id, "+15550000001");
    let phone_b = common::seed_phone(&mut conn, &fx.user_id, "+15550000002");
    let now = Utc::now();
    // Later instant first, to prove ordering is by scheduled_at.
    let late = common::seed_task(
        &mut conn,
        &fx.user_id,
        &fx.campaign_id,
        &phone_a,
        now - Duration::minutes(1),
    );
    let early = common::seed_task(
        &mut conn,
        &fx.user_id,
        &fx.campaign_id,
        &phone_b,
        now - Duration::minutes(10),
    );

    let repo = SqliteGateway::new();
    let claimed = repo
        .claim_due(&mut conn, 10, Duration::minutes(1))
        .expect("claim");

    assert_eq!(claimed.len(), 2);
    assert_eq!(claimed[0].id, early);
    assert_eq!(claimed[1].id, late);
    for task in &claimed {
        assert_eq!(task.status, TaskStatus::InProgress.as_str());
    }

    // A second sweep finds nothing: the rows are no longer pending.
    let again = repo
        .claim_due(&mut conn, 10, Duration::minutes(1))
        .expect("second claim");
    assert!(again.is_empty());

    common::fk_check_empty(&mut conn);
}

#[test]
fn claim_due_respects_limit_horizon_and_pause() {
    let (_db, mut conn) = common::setup_db();
    let fx = common::seed_active_campaign(&mut conn, &CampaignOpts::default());
    let repo = SqliteGateway::new();

    // Outside the horizon: not claimable yet.
    let phone = common::seed_phone(&mut conn, &fx.user_id, "+15550000010");
    let far_future = common::seed_task(
        &mut conn,
        &fx.user_id,
        &fx.campaign_id,
        &phone,
        Utc::now() + Duration::hours(6),
    );
    assert!(repo
        .claim_due(&mut conn, 10, Duration::minutes(2))
        .unwrap()
        .is_empty());
    assert_eq!(
        common::fetch_task(&mut conn, &far_future).status,
        TaskStatus::Pending.as_str()
    );

    // Inside the horizon look-ahead: claimable a little early.
    let phone = common::seed_phone(&mut conn, &fx.user_id, "+15550000011");
    let soon = common::seed_task(
        &mut conn,
        &fx.user_id,
        &fx.campaign_id,
        &phone,
        Utc::now() + Duration::seconds(30),
    );
    let claimed = repo.claim_due(&mut conn, 10, Duration::minutes(2)).unwrap();
    assert_eq!(claimed.len(), 1);
    assert_eq!(claimed[0].id, soon);

    // Limit bounds the batch.
    for i in 0..3 {
        let phone = common::seed_phone(&mut conn, &fx.user_id, &format!("+1555000002{i}"));
        common::seed_task(
            &mut conn,
            &fx.user_id,
            &fx.campaign_id,
            &phone,
            Utc::now() - Duration::minutes(1),
        );
    }
    assert_eq!(
        repo.claim_due(&mut conn, 2, Duration::minutes(1))
            .unwrap()
            .len(),
        2
    );

    // Paused campaigns are invisible to the claim.
    let paused = common::seed_active_campaign(
        &mut conn,
        &CampaignOpts {
            is_paused: true,
            ..CampaignOpts::default()
        },
    );
    let phone = common::seed_phone(&mut conn, &paused.user_id, "+15550000030");
    common::seed_task(
        &mut conn,
        &paused.user_id,
        &paused.campaign_id,
        &phone,
        Utc::now() - Duration::minutes(5),
    );
    // Only the one remaining unpaused task comes back.
    let claimed = repo.claim_due(&mut conn, 10, Duration::minutes(1)).unwrap();
    assert_eq!(claimed.len(), 1);
    assert_ne!(claimed[0].campaign_id, paused.campaign_id);
}

#[test]
fn load_bundle_returns_coherent_snapshot() {
    let (_db, mut conn) = common::setup_db();
    let fx = common::seed_active_campaign(&mut conn, &CampaignOpts::default());
    let phone = common::seed_phone(&mut conn, &fx.user_id, "+15550000040");
    let task = common::seed_task(
        &mut conn,
        &fx.user_id,
        &fx.campaign_id,
        &phone,
        Utc::now(),
    );

    let repo = SqliteGateway::new();
    let bundle = repo
        .load_bundle(&mut conn, &task)
        .expect("query")
        .expect("bundle");
    assert_eq!(bundle.task.id, task);
    assert_eq!(bundle.campaign.id, fx.campaign_id);
    assert_eq!(bundle.schedule.id, fx.schedule_id);
    assert_eq!(bundle.phone.id, phone);
    assert_eq!(bundle.phone.number, "+15550000040");

    assert!(repo.load_bundle(&mut conn, "missing").expect("query").is_none());
}

fn claim_one(conn: &mut diesel::SqliteConnection) -> String {
    SqliteGateway::new()
        .claim_due(conn, 1, Duration::hours(2))
        .expect("claim")
        .pop()
        .expect("one claimed row")
        .id
}

fn seed_log(conn: &mut diesel::SqliteConnection, fx: &common::Fixture, task_id: &str) -> String {
    let bundle = SqliteGateway::new()
        .load_bundle(conn, task_id)
        .unwrap()
        .unwrap();
    let log_id = Uuid::new_v4().to_string();
    let external = format!("call-{log_id}");
    let ts = common::now_s();
    SqliteGateway::new()
        .create_log(
            conn,
            &NewCallLog {
                id: &log_id,
                user_id: &fx.user_id,
                call_task_id: task_id,
                phone_number_id: &bundle.phone.id,
                dialed_number: &bundle.phone.number,
                external_call_id: &external,
                status: CallLogStatus::Initiated.as_str(),
                started_at: Some(&ts),
                created_at: &ts,
                updated_at: &ts,
            },
        )
        .expect("log");
    log_id
}

#[test]
fn complete_task_commits_log_task_and_counter_once() {
    let (_db, mut conn) = common::setup_db();
    let fx = common::seed_active_campaign(&mut conn, &CampaignOpts::default());
    common::seed_due_task(&mut conn, &fx);
    let task = claim_one(&mut conn);
    let log = seed_log(&mut conn, &fx, &task);

    let repo = SqliteGateway::new();
    assert!(repo.complete_task(&mut conn, &task, &log).expect("complete"));

    let row = common::fetch_task(&mut conn, &task);
    assert_eq!(row.status, TaskStatus::Completed.as_str());
    let campaign = common::fetch_campaign(&mut conn, &fx.campaign_id);
    assert_eq!(campaign.completed_tasks, 1);
    assert_eq!(campaign.total_tasks, 1);

    // Replaying the terminal transition is a no-op (idempotent terminal).
    assert!(!repo.complete_task(&mut conn, &task, &log).expect("replay"));
    assert_eq!(
        common::fetch_campaign(&mut conn, &fx.campaign_id).completed_tasks,
        1
    );
}

#[test]
fn reschedule_keeps_retry_count_and_retry_bumps_it() {
    let (_db, mut conn) = common::setup_db();
    let fx = common::seed_active_campaign(
        &mut conn,
        &CampaignOpts {
            max_retries: 3,
            ..CampaignOpts::default()
        },
    );
    common::seed_due_task(&mut conn, &fx);
    let task = claim_one(&mut conn);
    let repo = SqliteGateway::new();

    // Concurrency-denial path: plain reschedule, no bumps anywhere.
    let later = Utc::now() + Duration::minutes(30);
    assert!(repo.reschedule_task(&mut conn, &task, later).expect("resched"));
    let row = common::fetch_task(&mut conn, &task);
    assert_eq!(row.status, TaskStatus::Pending.as_str());
    assert_eq!(row.retry_count, 0);
    assert_eq!(row.scheduled_at, tz::to_rfc3339_millis(later));
    assert_eq!(
        common::fetch_campaign(&mut conn, &fx.campaign_id).retries_attempted,
        0
    );

    // Place-failure path: retry bumps the task and campaign counters.
    let task2 = claim_one(&mut conn);
    assert_eq!(task2, task);
    let again = Utc::now() + Duration::minutes(45);
    assert!(repo.retry_task(&mut conn, &task, again).expect("retry"));
    let row = common::fetch_task(&mut conn, &task);
    assert_eq!(row.status, TaskStatus::Pending.as_str());
    assert_eq!(row.retry_count, 1);
    assert_eq!(
        common::fetch_campaign(&mut conn, &fx.campaign_id).retries_attempted,
        1
    );

    // Neither applies to a row that is not in-progress.
    assert!(!repo.reschedule_task(&mut conn, &task, later).unwrap());
    assert!(!repo.retry_task(&mut conn, &task, later).unwrap());
    assert_eq!(common::fetch_task(&mut conn, &task).retry_count, 1);
}

#[test]
fn fail_task_is_guarded_and_counted() {
    let (_db, mut conn) = common::setup_db();
    let fx = common::seed_active_campaign(&mut conn, &CampaignOpts::default());
    common::seed_due_task(&mut conn, &fx);
    let task = claim_one(&mut conn);
    let repo = SqliteGateway::new();

    assert!(repo.fail_task(&mut conn, &task).expect("fail"));
    assert_eq!(
        common::fetch_task(&mut conn, &task).status,
        TaskStatus::Failed.as_str()
    );
    assert_eq!(
        common::fetch_campaign(&mut conn, &fx.campaign_id).failed_tasks,
        1
    );

    // Terminal is sticky; replay changes nothing.
    assert!(!repo.fail_task(&mut conn, &task).expect("replay"));
    assert_eq!(
        common::fetch_campaign(&mut conn, &fx.campaign_id).failed_tasks,
        1
    );
}

#[test]
fn finish_log_stamps_ended_at() {
    let (_db, mut conn) = common::setup_db();
    let fx = common::seed_active_campaign(&mut conn, &CampaignOpts::default());
    common::seed_due_task(&mut conn, &fx);
    let task = claim_one(&mut conn);
    let log = seed_log(&mut conn, &fx, &task);
    let repo = SqliteGateway::new();

    repo.update_log_status(&mut conn, &log, CallLogStatus::InProgress)
        .expect("update");
    repo.finish_log(&mut conn, &log, CallLogStatus::Failed)
        .expect("finish");

    use campaign_engine::schema::call_logs::dsl as cl;
    use diesel::prelude::*;
    let (status, started, ended): (String, Option<String>, Option<String>) = cl::call_logs
        .find(&log)
        .select((cl::status, cl::started_at, cl::ended_at))
        .first(&mut conn)
        .expect("log row");
    assert_eq!(status, CallLogStatus::Failed.as_str());
    let started = started.expect("started_at set");
    let ended = ended.expect("ended_at set");
    assert!(ended >= started);

    // A missing log is an error, matching the audit invariant.
    assert!(repo
        .finish_log(&mut conn, "missing", CallLogStatus::Failed)
        .is_err());
}

#[test]
fn reclaim_orphans_resets_stale_claims_only() {
    let (_db, mut conn) = common::setup_db();
    let fx = common::seed_active_campaign(&mut conn, &CampaignOpts::default());
    common::seed_due_task(&mut conn, &fx);
    common::seed_due_task(&mut conn, &fx);
    let repo = SqliteGateway::new();

    let claimed = repo.claim_due(&mut conn, 10, Duration::minutes(1)).unwrap();
    assert_eq!(claimed.len(), 2);
    let stale = &claimed[0].id;
    let fresh = &claimed[1].id;

    // Only the first claim is old enough to count as orphaned.
    common::age_task_claim(&mut conn, stale, 30);
    let reclaimed = repo
        .reclaim_orphans(&mut conn, Duration::minutes(10))
        .expect("reclaim");
    assert_eq!(reclaimed, 1);

    let stale_row = common::fetch_task(&mut conn, stale);
    assert_eq!(stale_row.status, TaskStatus::Pending.as_str());
    // Orphan recovery never consumes an attempt.
    assert_eq!(stale_row.retry_count, 0);
    assert_eq!(
        common::fetch_task(&mut conn, fresh).status,
        TaskStatus::InProgress.as_str()
    );
}

#[test]
fn aggregate_status_counts_by_status() {
    let (_db, mut conn) = common::setup_db();
    let fx = common::seed_active_campaign(&mut conn, &CampaignOpts::default());
    let repo = SqliteGateway::new();

    for _ in 0..3 {
        common::seed_due_task(&mut conn, &fx);
    }
    let claimed = repo.claim_due(&mut conn, 2, Duration::minutes(1)).unwrap();
    repo.fail_task(&mut conn, &claimed[0].id).unwrap();

    let counts = repo
        .aggregate_status(&mut conn, &fx.campaign_id)
        .expect("aggregate");
    assert_eq!(counts.pending, 1);
    assert_eq!(counts.in_progress, 1);
    assert_eq!(counts.failed, 1);
    assert_eq!(counts.completed, 0);
    assert_eq!(counts.total(), 3);
}
