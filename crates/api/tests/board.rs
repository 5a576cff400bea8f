mod common;

use api::schema::seed_crm_demo;
use common::{data_of, exec_as, first_error_code, first_error_message, setup, viewer};
use serde_json::json;

const BOARD: &str = r#"
    query($firstPerStage: Int, $stageKeys: [DealStage!], $q: String) {
        crm {
            pipelineBoard(firstPerStage: $firstPerStage, stageKeys: $stageKeys, q: $q) {
                columns {
                    stage { key displayName isTerminal }
                    totalCount
                    totalAmountCents
                    readyCount
                    readyRatio
                    deals { title completion canAdvance }
                }
            }
        }
    }
"#;

const STAGES: &str = r#"
    query {
        crm {
            pipelineStages { key displayName sortOrder isTerminal requirements }
        }
    }
"#;

const DEALS: &str = r#"
    query($filter: DealFilter, $order: DealOrder, $first: Int) {
        crm { deals(filter: $filter, order: $order, first: $first) { title stage amountCents } }
    }
"#;

const HISTORY: &str = r#"
    query($dealId: ID!) {
        crm { dealStageHistory(dealId: $dealId) { fromStage toStage } }
    }
"#;

fn column_titles(column: &serde_json::Value) -> Vec<&str> {
    column["deals"]
        .as_array()
        .expect("cards")
        .iter()
        .filter_map(|card| card["title"].as_str())
        .collect()
}

#[tokio::test]
async fn seeded_board_aggregates_per_column() {
    let (db, schema) = setup().await;
    seed_crm_demo(db.as_ref()).await.expect("seed");

    let data = data_of(exec_as(&schema, viewer(), BOARD, json!(null)).await);
    let columns = data["crm"]["pipelineBoard"]["columns"]
        .as_array()
        .expect("columns");
    assert_eq!(columns.len(), 7);

    let keys: Vec<&str> = columns
        .iter()
        .filter_map(|c| c["stage"]["key"].as_str())
        .collect();
    assert_eq!(
        keys,
        ["DISCUSSIONS", "QUALIFIED", "RFQ", "OFFERED", "WON", "LOST", "DROPPED"]
    );

    let discussions = &columns[0];
    assert_eq!(discussions["totalCount"], 2);
    assert_eq!(discussions["totalAmountCents"], 5_150_000);
    assert_eq!(discussions["readyCount"], 1);
    assert!((discussions["readyRatio"].as_f64().expect("ratio") - 0.5).abs() < 1e-9);
    let mut titles = column_titles(discussions);
    titles.sort_unstable();
    assert_eq!(titles, ["Baltic Forge tooling", "Norse conveyor refit"]);
    let norse = discussions["deals"]
        .as_array()
        .expect("cards")
        .iter()
        .find(|card| card["title"] == "Norse conveyor refit")
        .expect("norse card");
    assert_eq!(norse["completion"], "COMPLETE");
    assert_eq!(norse["canAdvance"], true);
    let baltic = discussions["deals"]
        .as_array()
        .expect("cards")
        .iter()
        .find(|card| card["title"] == "Baltic Forge tooling")
        .expect("baltic card");
    assert_eq!(baltic["completion"], "PARTIAL");
    assert_eq!(baltic["canAdvance"], false);

    let qualified = &columns[1];
    assert_eq!(qualified["totalCount"], 1);
    assert_eq!(qualified["totalAmountCents"], 12_500_000);
    assert_eq!(qualified["readyCount"], 1);

    let rfq = &columns[2];
    assert_eq!(rfq["stage"]["displayName"], "RFQ");
    assert_eq!(rfq["totalCount"], 1);
    assert_eq!(rfq["totalAmountCents"], 1_850_000);
    assert_eq!(rfq["readyCount"], 1);

    let offered = &columns[3];
    assert_eq!(offered["totalCount"], 1);
    assert_eq!(offered["totalAmountCents"], 680_000);
    assert_eq!(offered["readyCount"], 1);

    // Terminal columns advance nowhere, so nothing in them is "ready".
    let won = &columns[4];
    assert_eq!(won["stage"]["isTerminal"], true);
    assert_eq!(won["totalCount"], 1);
    assert_eq!(won["totalAmountCents"], 2_300_000);
    assert_eq!(won["readyCount"], 0);
    assert_eq!(won["readyRatio"].as_f64().expect("ratio"), 0.0);
    let delta = &won["deals"].as_array().expect("cards")[0];
    assert_eq!(delta["completion"], "COMPLETE");
    assert_eq!(delta["canAdvance"], false);

    let dropped = &columns[6];
    assert_eq!(dropped["totalCount"], 1);
    assert_eq!(dropped["totalAmountCents"], 0);
}

#[tokio::test]
async fn board_columns_follow_the_catalog_order() {
    let (db, schema) = setup().await;
    seed_crm_demo(db.as_ref()).await.expect("seed");

    let data = data_of(
        exec_as(
            &schema,
            viewer(),
            BOARD,
            json!({"stageKeys": ["WON", "DISCUSSIONS"]}),
        )
        .await,
    );
    let columns = data["crm"]["pipelineBoard"]["columns"]
        .as_array()
        .expect("columns");
    let keys: Vec<&str> = columns
        .iter()
        .filter_map(|c| c["stage"]["key"].as_str())
        .collect();
    assert_eq!(keys, ["DISCUSSIONS", "WON"]);
}

#[tokio::test]
async fn board_rejects_an_empty_stage_selection() {
    let (_db, schema) = setup().await;
    let resp = exec_as(&schema, viewer(), BOARD, json!({"stageKeys": []})).await;
    assert_eq!(first_error_code(&resp), "VALIDATION");
    assert_eq!(
        first_error_message(&resp),
        "stageKeys must contain at least one value"
    );
}

#[tokio::test]
async fn board_card_fences() {
    let (_db, schema) = setup().await;

    let resp = exec_as(&schema, viewer(), BOARD, json!({"firstPerStage": 101})).await;
    assert_eq!(first_error_code(&resp), "LIMIT_EXCEEDED");

    let resp = exec_as(&schema, viewer(), BOARD, json!({"firstPerStage": -1})).await;
    assert_eq!(first_error_code(&resp), "VALIDATION");
}

#[tokio::test]
async fn zero_cards_still_report_totals() {
    let (db, schema) = setup().await;
    seed_crm_demo(db.as_ref()).await.expect("seed");

    let data = data_of(exec_as(&schema, viewer(), BOARD, json!({"firstPerStage": 0})).await);
    let discussions = &data["crm"]["pipelineBoard"]["columns"].as_array().expect("columns")[0];
    assert_eq!(discussions["totalCount"], 2);
    assert_eq!(discussions["deals"].as_array().map(Vec::len), Some(0));
}

#[tokio::test]
async fn board_search_narrows_every_column() {
    let (db, schema) = setup().await;
    seed_crm_demo(db.as_ref()).await.expect("seed");

    let data = data_of(exec_as(&schema, viewer(), BOARD, json!({"q": "POLAR"})).await);
    let columns = data["crm"]["pipelineBoard"]["columns"]
        .as_array()
        .expect("columns");
    for column in columns {
        let expected = if column["stage"]["key"] == "RFQ" { 1 } else { 0 };
        assert_eq!(column["totalCount"], expected, "column {}", column["stage"]["key"]);
    }
    let rfq = columns.iter().find(|c| c["stage"]["key"] == "RFQ").expect("rfq");
    assert_eq!(rfq["totalAmountCents"], 1_850_000);
    assert_eq!(column_titles(rfq), ["Polar Fab enclosures"]);
}

#[tokio::test]
async fn stage_catalog_lists_requirements() {
    let (_db, schema) = setup().await;

    let data = data_of(exec_as(&schema, viewer(), STAGES, json!(null)).await);
    let stages = data["crm"]["pipelineStages"].as_array().expect("stages");
    assert_eq!(stages.len(), 7);

    assert_eq!(stages[0]["key"], "DISCUSSIONS");
    assert_eq!(stages[0]["sortOrder"], 0);
    assert_eq!(stages[0]["isTerminal"], false);
    let requirements = stages[0]["requirements"].as_array().expect("requirements");
    assert_eq!(requirements.len(), 4);
    assert_eq!(requirements[0], "Customer need identified");

    assert_eq!(stages[2]["displayName"], "RFQ");

    let won = stages.iter().find(|s| s["key"] == "WON").expect("won");
    assert_eq!(won["isTerminal"], true);
    assert_eq!(won["requirements"].as_array().map(Vec::len), Some(0));
}

#[tokio::test]
async fn deals_list_orders_by_amount_with_nulls_last() {
    let (db, schema) = setup().await;
    seed_crm_demo(db.as_ref()).await.expect("seed");

    let data = data_of(
        exec_as(&schema, viewer(), DEALS, json!({"order": "AMOUNT_DESC"})).await,
    );
    let deals = data["crm"]["deals"].as_array().expect("deals");
    assert_eq!(deals.len(), 8);
    assert_eq!(deals[0]["title"], "AeroTek bracket program");
    assert_eq!(deals[0]["amountCents"], 12_500_000);
    assert_eq!(deals[7]["title"], "Legacy press upgrade");
    assert!(deals[7]["amountCents"].is_null());
}

#[tokio::test]
async fn deals_list_filters_by_stage_and_text() {
    let (db, schema) = setup().await;
    seed_crm_demo(db.as_ref()).await.expect("seed");

    let data = data_of(
        exec_as(
            &schema,
            viewer(),
            DEALS,
            json!({"filter": {"stage": "DISCUSSIONS"}}),
        )
        .await,
    );
    assert_eq!(data["crm"]["deals"].as_array().map(Vec::len), Some(2));

    let data = data_of(
        exec_as(&schema, viewer(), DEALS, json!({"filter": {"q": "polar"}})).await,
    );
    let deals = data["crm"]["deals"].as_array().expect("deals");
    assert_eq!(deals.len(), 1);
    assert_eq!(deals[0]["title"], "Polar Fab enclosures");
    assert_eq!(deals[0]["stage"], "RFQ");
}

#[tokio::test]
async fn deals_list_paging_fences() {
    let (_db, schema) = setup().await;

    let resp = exec_as(&schema, viewer(), DEALS, json!({"first": 101})).await;
    assert_eq!(first_error_code(&resp), "LIMIT_EXCEEDED");

    let resp = exec_as(&schema, viewer(), DEALS, json!({"first": 0})).await;
    assert_eq!(first_error_code(&resp), "VALIDATION");
    assert_eq!(first_error_message(&resp), "first must be positive");
}

#[tokio::test]
async fn seeded_closed_deals_carry_history() {
    let (db, schema) = setup().await;
    let seeded = seed_crm_demo(db.as_ref()).await.expect("seed");
    let delta_id = seeded.deals[5].to_string();

    let data = data_of(
        exec_as(&schema, viewer(), HISTORY, json!({"dealId": delta_id})).await,
    );
    let rows = data["crm"]["dealStageHistory"].as_array().expect("history");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["fromStage"], "OFFERED");
    assert_eq!(rows[0]["toStage"], "WON");
}
