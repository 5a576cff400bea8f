#![allow(dead_code)]

use std::sync::Arc;

use api::auth::{AuthConfig, CurrentUser, UserRole};
use api::schema::{build_schema, AppSchema};
use async_graphql::{Request, Response, Variables};
use sea_orm::{ConnectionTrait, Database, DatabaseBackend, DatabaseConnection, Statement};
use uuid::Uuid;

/// In-memory sqlite mirror of the Postgres schema. Uuids, timestamps,
/// dates and enums are stored as TEXT, booleans as INTEGER.
const BOOTSTRAP_SQL: &[&str] = &[
    "PRAGMA foreign_keys = ON;",
    "CREATE TABLE app_user (
        id TEXT PRIMARY KEY,
        email TEXT NOT NULL UNIQUE,
        display_name TEXT NOT NULL,
        is_active INTEGER NOT NULL DEFAULT 1,
        created_by TEXT NULL,
        modified_by TEXT NULL,
        created_at TEXT NOT NULL,
        modified_at TEXT NOT NULL
    );",
    "CREATE TABLE user_role (
        user_id TEXT NOT NULL REFERENCES app_user(id) ON DELETE CASCADE,
        role TEXT NOT NULL,
        PRIMARY KEY (user_id, role)
    );",
    "CREATE TABLE user_secret (
        user_id TEXT PRIMARY KEY REFERENCES app_user(id) ON DELETE CASCADE,
        password_hash TEXT NOT NULL,
        modified_at TEXT NOT NULL
    );",
    "CREATE TABLE contact (
        id TEXT PRIMARY KEY,
        email TEXT NOT NULL,
        first_name TEXT NULL,
        last_name TEXT NULL,
        phone TEXT NULL,
        company TEXT NULL,
        position TEXT NULL,
        owner_id TEXT NULL REFERENCES app_user(id) ON DELETE SET NULL,
        created_by TEXT NULL,
        modified_by TEXT NULL,
        created_at TEXT NOT NULL,
        modified_at TEXT NOT NULL
    );",
    "CREATE TABLE lead (
        id TEXT PRIMARY KEY,
        name TEXT NOT NULL,
        company TEXT NULL,
        email TEXT NULL,
        phone TEXT NULL,
        source TEXT NULL,
        notes TEXT NULL,
        owner_id TEXT NULL REFERENCES app_user(id) ON DELETE SET NULL,
        created_by TEXT NULL,
        modified_by TEXT NULL,
        created_at TEXT NOT NULL,
        modified_at TEXT NOT NULL
    );",
    "CREATE TABLE meeting (
        id TEXT PRIMARY KEY,
        title TEXT NOT NULL,
        scheduled_at TEXT NOT NULL,
        location TEXT NULL,
        notes TEXT NULL,
        owner_id TEXT NULL REFERENCES app_user(id) ON DELETE SET NULL,
        created_by TEXT NULL,
        modified_by TEXT NULL,
        created_at TEXT NOT NULL,
        modified_at TEXT NOT NULL
    );",
    "CREATE TABLE deal (
        id TEXT PRIMARY KEY,
        title TEXT NOT NULL,
        description TEXT NULL,
        stage TEXT NOT NULL DEFAULT 'DISCUSSIONS',
        amount_cents INTEGER NULL,
        currency TEXT NULL,
        probability INTEGER NULL,
        close_date TEXT NULL,
        lead_id TEXT NULL REFERENCES lead(id) ON DELETE SET NULL,
        meeting_id TEXT NULL REFERENCES meeting(id) ON DELETE SET NULL,
        owner_id TEXT NULL REFERENCES app_user(id) ON DELETE SET NULL,
        need_identified INTEGER NULL,
        need_summary TEXT NULL,
        decision_maker_present INTEGER NULL,
        customer_agreement TEXT NULL,
        nda_signed INTEGER NULL,
        budget_confirmed TEXT NULL,
        portal_access TEXT NULL,
        timeline_start TEXT NULL,
        timeline_end TEXT NULL,
        rfq_value_cents INTEGER NULL,
        rfq_document_url TEXT NULL,
        rfq_scope TEXT NULL,
        proposal_sent_date TEXT NULL,
        negotiation_status TEXT NULL,
        decision_expected_date TEXT NULL,
        win_reason TEXT NULL,
        loss_reason TEXT NULL,
        drop_reason TEXT NULL,
        created_by TEXT NULL,
        modified_by TEXT NULL,
        created_at TEXT NOT NULL,
        modified_at TEXT NOT NULL
    );",
    "CREATE TABLE deal_stage_history (
        id TEXT PRIMARY KEY,
        deal_id TEXT NOT NULL REFERENCES deal(id) ON DELETE CASCADE,
        from_stage TEXT NULL,
        to_stage TEXT NOT NULL,
        changed_at TEXT NOT NULL,
        note TEXT NULL,
        changed_by TEXT NULL
    );",
    "CREATE TABLE activity (
        id TEXT PRIMARY KEY,
        entity_type TEXT NOT NULL,
        entity_id TEXT NOT NULL,
        kind TEXT NOT NULL,
        subject TEXT NULL,
        body_md TEXT NULL,
        meta_json TEXT NOT NULL DEFAULT '{}',
        created_at TEXT NOT NULL,
        created_by TEXT NULL
    );",
];

pub async fn setup() -> (Arc<DatabaseConnection>, AppSchema) {
    let conn = Database::connect("sqlite::memory:")
        .await
        .expect("connect sqlite");
    bootstrap_sqlite(&conn).await;
    let db = Arc::new(conn);
    let auth = Arc::new(AuthConfig {
        jwt_secret: "test-secret".to_string(),
        session_ttl_minutes: 60,
    });
    let schema = build_schema(db.clone(), auth);
    (db, schema)
}

async fn bootstrap_sqlite(db: &DatabaseConnection) {
    for sql in BOOTSTRAP_SQL {
        db.execute(Statement::from_string(
            DatabaseBackend::Sqlite,
            sql.to_string(),
        ))
        .await
        .expect("bootstrap ddl");
    }
}

pub fn admin() -> CurrentUser {
    CurrentUser {
        user_id: Uuid::new_v4(),
        roles: vec![UserRole::Admin],
    }
}

pub fn sales() -> CurrentUser {
    CurrentUser {
        user_id: Uuid::new_v4(),
        roles: vec![UserRole::Sales],
    }
}

pub fn viewer() -> CurrentUser {
    CurrentUser {
        user_id: Uuid::new_v4(),
        roles: vec![UserRole::Viewer],
    }
}

pub fn as_user(user_id: Uuid, role: UserRole) -> CurrentUser {
    CurrentUser {
        user_id,
        roles: vec![role],
    }
}

pub async fn exec_as(
    schema: &AppSchema,
    user: CurrentUser,
    query: &str,
    vars: serde_json::Value,
) -> Response {
    let request = Request::new(query)
        .variables(Variables::from_json(vars))
        .data(user);
    schema.execute(request).await
}

pub async fn exec_anon(schema: &AppSchema, query: &str, vars: serde_json::Value) -> Response {
    let request = Request::new(query).variables(Variables::from_json(vars));
    schema.execute(request).await
}

pub fn data_of(resp: Response) -> serde_json::Value {
    assert!(resp.errors.is_empty(), "unexpected errors: {:?}", resp.errors);
    resp.data.into_json().expect("response data as json")
}

pub fn first_error_code(resp: &Response) -> String {
    let json = serde_json::to_value(resp).expect("serialize response");
    json["errors"][0]["extensions"]["code"]
        .as_str()
        .unwrap_or_default()
        .to_string()
}

pub fn first_error_message(resp: &Response) -> String {
    resp.errors
        .first()
        .map(|err| err.message.clone())
        .unwrap_or_default()
}
