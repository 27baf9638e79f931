#![allow(dead_code)]

use campaign_engine::db::{connection, migrate};
use campaign_engine::gateway::repo::SqliteGateway;
use campaign_engine::gateway::StoreGateway;
use campaign_engine::models::status::TaskStatus;
use campaign_engine::models::{
    CallTask, Campaign, NewCallTask, NewCampaign, NewPhoneNumber, NewSchedule, NewUser,
};
use campaign_engine::schema::{call_tasks, campaigns, phone_numbers, schedules, users};
use campaign_engine::tz;
use chrono::{DateTime, Duration, Utc};
use diesel::prelude::*;
use diesel::sql_query;
use diesel::sql_types::{Integer, Text};
use std::path::PathBuf;
use tempfile::TempDir;
use uuid::Uuid;

#[derive(QueryableByName)]
struct JournalMode {
    #[diesel(sql_type = Text)]
    journal_mode: String,
}
#[derive(QueryableByName)]
struct ForeignKeys {
    #[diesel(sql_type = Integer)]
    foreign_keys: i32,
}

pub struct TestDb {
    _dir: TempDir, // keep alive for the life of the test
    pub path: String,
}

pub fn setup_db() -> (TestDb, SqliteConnection) {
    let dir = TempDir::new().expect("tempdir");
    let mut p = PathBuf::from(dir.path());
    p.push("test.db");
    let path = p.to_string_lossy().to_string();

    migrate::run(&path).expect("migrations");

    let conn = connection::connect_sqlite(&path).expect("connect");
    (TestDb { _dir: dir, path }, conn)
}

pub fn assert_sqlite_pragmas(conn: &mut SqliteConnection) {
    let jm: JournalMode = sql_query("PRAGMA journal_mode;").get_result(conn).unwrap();
    assert_eq!(jm.journal_mode.to_lowercase(), "wal");

    let fk: ForeignKeys = sql_query("PRAGMA foreign_keys;").get_result(conn).unwrap();
    assert_eq!(fk.foreign_keys, 1);
}

pub fn fk_check_empty(conn: &mut SqliteConnection) {
    #[derive(QueryableByName, Debug)]
    struct Row {
        #[diesel(sql_type = Text)]
        table: String,
    }
    let rows: Vec<Row> = sql_query("PRAGMA foreign_key_check;")
        .load(conn)
        .expect("fk_check");

    assert!(rows.is_empty(), "foreign key check not empty: {rows:?}");
}

pub fn now_s() -> String {
    tz::to_rfc3339_millis(Utc::now())
}

/// Rules that are open every day, nearly all day, so `next_valid(now)` is
/// `now` in worker tests.
pub fn open_window_rules() -> String {
    r#"{"days":["monday","tuesday","wednesday","thursday","friday","saturday","sunday"],"start_time":"00:00","end_time":"23:59","exclude_holidays":false}"#
        .to_string()
}

pub fn seed_user(conn: &mut SqliteConnection) -> String {
    let id = Uuid::new_v4().to_string();
    let email = format!("{id}@example.test");
    let ts = now_s();
    diesel::insert_into(users::table)
        .values(NewUser {
            id: &id,
            email: &email,
            created_at: &ts,
            updated_at: &ts,
        })
        .execute(conn)
        .expect("seed user");
    id
}

pub fn seed_schedule(
    conn: &mut SqliteConnection,
    user_id: &str,
    time_zone: &str,
    rules_json: &str,
) -> String {
    let id = Uuid::new_v4().to_string();
    let ts = now_s();
    diesel::insert_into(schedules::table)
        .values(NewSchedule {
            id: &id,
            user_id,
            time_zone,
            schedule_rules: rules_json,
            created_at: &ts,
            updated_at: &ts,
        })
        .execute(conn)
        .expect("seed schedule");
    id
}

pub struct CampaignOpts {
    pub is_paused: bool,
    pub max_concurrent_calls: i32,
    pub max_retries: i32,
    pub retry_delay_seconds: i32,
}

impl Default for CampaignOpts {
    fn default() -> Self {
        Self {
            is_paused: false,
            max_concurrent_calls: 1,
            max_retries: 0,
            retry_delay_seconds: 0,
        }
    }
}

pub fn seed_campaign(
    conn: &mut SqliteConnection,
    user_id: &str,
    schedule_id: &str,
    opts: &CampaignOpts,
) -> String {
    let id = Uuid::new_v4().to_string();
    let ts = now_s();
    diesel::insert_into(campaigns::table)
        .values(NewCampaign {
            id: &id,
            user_id,
            schedule_id,
            is_paused: opts.is_paused,
            max_concurrent_calls: opts.max_concurrent_calls,
            max_retries: opts.max_retries,
            retry_delay_seconds: opts.retry_delay_seconds,
            created_at: &ts,
            updated_at: &ts,
        })
        .execute(conn)
        .expect("seed campaign");
    id
}

pub fn seed_phone(conn: &mut SqliteConnection, user_id: &str, number: &str) -> String {
    let id = Uuid::new_v4().to_string();
    let ts = now_s();
    diesel::insert_into(phone_numbers::table)
        .values(NewPhoneNumber {
            id: &id,
            user_id,
            number,
            status: "valid",
            created_at: &ts,
            updated_at: &ts,
        })
        .execute(conn)
        .expect("seed phone");
    id
}

/// Insert a task through the gateway so `total_tasks` is bumped like the
/// production write path does.
pub fn seed_task(
    conn: &mut SqliteConnection,
    user_id: &str,
    campaign_id: &str,
    phone_number_id: &str,
    scheduled_at: DateTime<Utc>,
) -> String {
    let id = Uuid::new_v4().to_string();
    let ts = now_s();
    let at = tz::to_rfc3339_millis(scheduled_at);
    SqliteGateway::new()
        .insert_task(
            conn,
            &NewCallTask {
                id: &id,
                user_id,
                campaign_id,
                phone_number_id,
                status: TaskStatus::Pending.as_str(),
                scheduled_at: &at,
                created_at: &ts,
                updated_at: &ts,
            },
        )
        .expect("seed task");
    id
}

/// Everything a single-campaign test needs, with one due task per phone.
pub struct Fixture {
    pub user_id: String,
    pub schedule_id: String,
    pub campaign_id: String,
}

/// Seed an unpaused campaign with an always-open schedule.
pub fn seed_active_campaign(conn: &mut SqliteConnection, opts: &CampaignOpts) -> Fixture {
    let user_id = seed_user(conn);
    let rules = open_window_rules();
    let schedule_id = seed_schedule(conn, &user_id, "America/New_York", &rules);
    let campaign_id = seed_campaign(conn, &user_id, &schedule_id, opts);
    Fixture {
        user_id,
        schedule_id,
        campaign_id,
    }
}

/// Seed one due task on a fresh phone number under the fixture's campaign.
pub fn seed_due_task(conn: &mut SqliteConnection, fx: &Fixture) -> String {
    let phone_id = seed_phone(conn, &fx.user_id, &format!("+1555{:07}", rand_suffix()));
    seed_task(
        conn,
        &fx.user_id,
        &fx.campaign_id,
        &phone_id,
        Utc::now() - Duration::minutes(1),
    )
}

fn rand_suffix() -> u32 {
    // Uuid bytes are a convenient entropy source without another dev-dep.
    let b = Uuid::new_v4().into_bytes();
    u32::from_be_bytes([b[0], b[1], b[2], b[3]]) % 10_000_000
}

pub fn fetch_task(conn: &mut SqliteConnection, id: &str) -> CallTask {
    call_tasks::table
        .find(id)
        .select(CallTask::as_select())
        .first(conn)
        .expect("task row")
}

pub fn fetch_campaign(conn: &mut SqliteConnection, id: &str) -> Campaign {
    campaigns::table
        .find(id)
        .select(Campaign::as_select())
        .first(conn)
        .expect("campaign row")
}

/// Backdate a task's claim stamp so it looks orphaned.
pub fn age_task_claim(conn: &mut SqliteConnection, id: &str, minutes: i64) {
    use campaign_engine::schema::call_tasks::dsl as ct;
    let old = tz::to_rfc3339_millis(Utc::now() - Duration::minutes(minutes));
    diesel::update(ct::call_tasks.find(id))
        .set(ct::updated_at.eq(old))
        .execute(conn)
        .expect("age task");
}
