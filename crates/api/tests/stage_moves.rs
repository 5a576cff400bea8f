mod common;

use common::{data_of, exec_as, first_error_code, first_error_message, sales, setup, viewer};
use serde_json::json;

const CREATE_DEAL: &str = r#"
    mutation($input: NewDealInput!) {
        crm { createDeal(input: $input) { id stage completion canAdvance } }
    }
"#;

const UPDATE_DEAL: &str = r#"
    mutation($input: UpdateDealInput!) {
        crm { updateDeal(input: $input) { id completion canAdvance missingRequirements } }
    }
"#;

const MOVE_DEAL: &str = r#"
    mutation($id: ID!, $stage: DealStage!, $note: String, $winReason: String, $lossReason: DealLossReason, $dropReason: String) {
        crm {
            moveDealStage(id: $id, stage: $stage, note: $note, winReason: $winReason, lossReason: $lossReason, dropReason: $dropReason) {
                id stage modifiedAt winReason lossReason dropReason
            }
        }
    }
"#;

const DEAL: &str = r#"
    query($id: ID!) {
        crm { deal(id: $id) { stage modifiedAt completion } }
    }
"#;

const HISTORY: &str = r#"
    query($dealId: ID!) {
        crm { dealStageHistory(dealId: $dealId) { fromStage toStage note changedBy } }
    }
"#;

const DEAL_FEED: &str = r#"
    query($entityId: ID) {
        crm { activityFeed(entityType: DEAL, entityId: $entityId) { kind subject metaJson } }
    }
"#;

async fn create_deal(schema: &api::schema::AppSchema, title: &str) -> String {
    let resp = exec_as(
        schema,
        sales(),
        CREATE_DEAL,
        json!({"input": {"title": title}}),
    )
    .await;
    let data = data_of(resp);
    assert_eq!(data["crm"]["createDeal"]["stage"], "DISCUSSIONS");
    data["crm"]["createDeal"]["id"]
        .as_str()
        .expect("deal id")
        .to_string()
}

async fn complete_discussions(schema: &api::schema::AppSchema, id: &str) {
    let resp = exec_as(
        schema,
        sales(),
        UPDATE_DEAL,
        json!({"input": {
            "id": id,
            "needIdentified": true,
            "needSummary": "Aging drives on line two",
            "decisionMakerPresent": true,
            "customerAgreement": "YES"
        }}),
    )
    .await;
    let data = data_of(resp);
    assert_eq!(data["crm"]["updateDeal"]["completion"], "COMPLETE");
    assert_eq!(data["crm"]["updateDeal"]["canAdvance"], true);
}

#[tokio::test]
async fn move_writes_history_and_activity() {
    let (_db, schema) = setup().await;
    let actor = sales();
    let id = create_deal(&schema, "Conveyor refit").await;
    complete_discussions(&schema, &id).await;

    let resp = exec_as(
        &schema,
        actor.clone(),
        MOVE_DEAL,
        json!({"id": id, "stage": "QUALIFIED", "note": "Kickoff approved"}),
    )
    .await;
    let data = data_of(resp);
    assert_eq!(data["crm"]["moveDealStage"]["stage"], "QUALIFIED");

    let history = data_of(exec_as(&schema, viewer(), HISTORY, json!({"dealId": id})).await);
    let rows = history["crm"]["dealStageHistory"]
        .as_array()
        .expect("history rows");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["fromStage"], "DISCUSSIONS");
    assert_eq!(rows[0]["toStage"], "QUALIFIED");
    assert_eq!(rows[0]["note"], "Kickoff approved");
    assert_eq!(rows[0]["changedBy"], actor.user_id.to_string());

    let feed = data_of(exec_as(&schema, viewer(), DEAL_FEED, json!({"entityId": id})).await);
    let entries = feed["crm"]["activityFeed"].as_array().expect("feed rows");
    assert_eq!(entries.len(), 2);
    let kinds: Vec<&str> = entries
        .iter()
        .filter_map(|e| e["kind"].as_str())
        .collect();
    assert!(kinds.contains(&"created"));
    assert!(kinds.contains(&"stage_change"));
    let stage_change = entries
        .iter()
        .find(|e| e["kind"] == "stage_change")
        .expect("stage change entry");
    let meta: serde_json::Value =
        serde_json::from_str(stage_change["metaJson"].as_str().expect("meta json"))
            .expect("meta parses");
    assert_eq!(meta, json!({"from": "Discussions", "to": "Qualified"}));
}

#[tokio::test]
async fn incomplete_stage_blocks_the_move() {
    let (_db, schema) = setup().await;
    let id = create_deal(&schema, "Bracket program").await;

    let resp = exec_as(
        &schema,
        sales(),
        MOVE_DEAL,
        json!({"id": id, "stage": "QUALIFIED"}),
    )
    .await;
    assert_eq!(first_error_code(&resp), "STAGE_INCOMPLETE");
    assert!(
        first_error_message(&resp).contains("Customer need identified"),
        "message should list missing requirements: {}",
        first_error_message(&resp)
    );

    let deal = data_of(exec_as(&schema, viewer(), DEAL, json!({"id": id})).await);
    assert_eq!(deal["crm"]["deal"]["stage"], "DISCUSSIONS");
    let history = data_of(exec_as(&schema, viewer(), HISTORY, json!({"dealId": id})).await);
    assert_eq!(
        history["crm"]["dealStageHistory"].as_array().map(Vec::len),
        Some(0)
    );
}

#[tokio::test]
async fn winning_bypasses_the_checklist() {
    let (_db, schema) = setup().await;
    let id = create_deal(&schema, "Spindle retrofit").await;

    let resp = exec_as(
        &schema,
        sales(),
        MOVE_DEAL,
        json!({"id": id, "stage": "WON", "winReason": "Fastest delivery of all bidders"}),
    )
    .await;
    let data = data_of(resp);
    assert_eq!(data["crm"]["moveDealStage"]["stage"], "WON");
    assert_eq!(
        data["crm"]["moveDealStage"]["winReason"],
        "Fastest delivery of all bidders"
    );

    let history = data_of(exec_as(&schema, viewer(), HISTORY, json!({"dealId": id})).await);
    let rows = history["crm"]["dealStageHistory"].as_array().expect("rows");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["fromStage"], "DISCUSSIONS");
    assert_eq!(rows[0]["toStage"], "WON");
}

#[tokio::test]
async fn losing_requires_a_reason() {
    let (_db, schema) = setup().await;
    let id = create_deal(&schema, "Rail prototypes").await;

    let resp = exec_as(&schema, sales(), MOVE_DEAL, json!({"id": id, "stage": "LOST"})).await;
    assert_eq!(first_error_code(&resp), "VALIDATION");
    assert!(first_error_message(&resp).contains("lossReason"));

    let resp = exec_as(
        &schema,
        sales(),
        MOVE_DEAL,
        json!({"id": id, "stage": "LOST", "lossReason": "COMPETITOR"}),
    )
    .await;
    let data = data_of(resp);
    assert_eq!(data["crm"]["moveDealStage"]["stage"], "LOST");
    assert_eq!(data["crm"]["moveDealStage"]["lossReason"], "COMPETITOR");
}

#[tokio::test]
async fn a_previously_recorded_loss_reason_satisfies_the_check() {
    let (_db, schema) = setup().await;
    let id = create_deal(&schema, "Enclosure batch").await;

    let resp = exec_as(
        &schema,
        sales(),
        UPDATE_DEAL,
        json!({"input": {"id": id, "lossReason": "PRICE"}}),
    )
    .await;
    data_of(resp);

    let resp = exec_as(&schema, sales(), MOVE_DEAL, json!({"id": id, "stage": "LOST"})).await;
    let data = data_of(resp);
    assert_eq!(data["crm"]["moveDealStage"]["lossReason"], "PRICE");
}

#[tokio::test]
async fn dropping_rejects_a_blank_reason() {
    let (_db, schema) = setup().await;
    let id = create_deal(&schema, "Press upgrade").await;

    let resp = exec_as(
        &schema,
        sales(),
        MOVE_DEAL,
        json!({"id": id, "stage": "DROPPED", "dropReason": "   "}),
    )
    .await;
    assert_eq!(first_error_code(&resp), "VALIDATION");
    assert!(first_error_message(&resp).contains("dropReason"));

    let resp = exec_as(
        &schema,
        sales(),
        MOVE_DEAL,
        json!({"id": id, "stage": "DROPPED", "dropReason": "Customer postponed indefinitely"}),
    )
    .await;
    let data = data_of(resp);
    assert_eq!(data["crm"]["moveDealStage"]["stage"], "DROPPED");
    assert_eq!(
        data["crm"]["moveDealStage"]["dropReason"],
        "Customer postponed indefinitely"
    );
}

#[tokio::test]
async fn moving_to_the_current_stage_changes_nothing() {
    let (_db, schema) = setup().await;
    let id = create_deal(&schema, "Gripper pilot").await;

    let before = data_of(exec_as(&schema, viewer(), DEAL, json!({"id": id})).await);
    let modified_before = before["crm"]["deal"]["modifiedAt"].clone();

    let resp = exec_as(
        &schema,
        sales(),
        MOVE_DEAL,
        json!({"id": id, "stage": "DISCUSSIONS"}),
    )
    .await;
    let data = data_of(resp);
    assert_eq!(data["crm"]["moveDealStage"]["stage"], "DISCUSSIONS");

    let after = data_of(exec_as(&schema, viewer(), DEAL, json!({"id": id})).await);
    assert_eq!(after["crm"]["deal"]["modifiedAt"], modified_before);

    let history = data_of(exec_as(&schema, viewer(), HISTORY, json!({"dealId": id})).await);
    assert_eq!(
        history["crm"]["dealStageHistory"].as_array().map(Vec::len),
        Some(0)
    );
    let feed = data_of(exec_as(&schema, viewer(), DEAL_FEED, json!({"entityId": id})).await);
    assert_eq!(feed["crm"]["activityFeed"].as_array().map(Vec::len), Some(1));
}

#[tokio::test]
async fn closed_deals_can_be_reopened() {
    let (_db, schema) = setup().await;
    let id = create_deal(&schema, "Tooling frame").await;

    data_of(
        exec_as(
            &schema,
            sales(),
            MOVE_DEAL,
            json!({"id": id, "stage": "WON", "winReason": "Existing frame contract"}),
        )
        .await,
    );
    let resp = exec_as(
        &schema,
        sales(),
        MOVE_DEAL,
        json!({"id": id, "stage": "QUALIFIED", "note": "Reopened after scope change"}),
    )
    .await;
    let data = data_of(resp);
    assert_eq!(data["crm"]["moveDealStage"]["stage"], "QUALIFIED");

    let history = data_of(exec_as(&schema, viewer(), HISTORY, json!({"dealId": id})).await);
    let rows = history["crm"]["dealStageHistory"].as_array().expect("rows");
    assert_eq!(rows.len(), 2);
}

#[tokio::test]
async fn unknown_deal_is_not_found() {
    let (_db, schema) = setup().await;
    let resp = exec_as(
        &schema,
        sales(),
        MOVE_DEAL,
        json!({"id": uuid::Uuid::new_v4().to_string(), "stage": "QUALIFIED"}),
    )
    .await;
    assert_eq!(first_error_code(&resp), "NOT_FOUND");
}

#[tokio::test]
async fn viewers_cannot_move_deals() {
    let (_db, schema) = setup().await;
    let id = create_deal(&schema, "Viewer fence").await;
    let resp = exec_as(
        &schema,
        viewer(),
        MOVE_DEAL,
        json!({"id": id, "stage": "QUALIFIED"}),
    )
    .await;
    assert_eq!(first_error_code(&resp), "FORBIDDEN");
}
