mod common;

use common::{data_of, exec_anon, exec_as, first_error_code, first_error_message, sales, setup, viewer};
use serde_json::json;

const CREATE_CONTACT: &str = r#"
    mutation($input: NewContactInput!) {
        crm { createContact(input: $input) { id email firstName lastName company } }
    }
"#;

const UPDATE_CONTACT: &str = r#"
    mutation($input: UpdateContactInput!) {
        crm { updateContact(input: $input) { id company position } }
    }
"#;

const DELETE_CONTACT: &str = r#"
    mutation($id: ID!) { crm { deleteContact(id: $id) } }
"#;

const CONTACTS: &str = r#"
    query($q: String) { crm { contacts(q: $q) { id email company } } }
"#;

const CREATE_LEAD: &str = r#"
    mutation($input: NewLeadInput!) {
        crm { createLead(input: $input) { id name source notes } }
    }
"#;

const CONVERT_LEAD: &str = r#"
    mutation($id: ID!, $title: String) {
        crm { convertLead(id: $id, title: $title) { id title stage leadId description } }
    }
"#;

const LEAD: &str = r#"
    query($id: ID!) { crm { lead(id: $id) { id name } } }
"#;

const CREATE_MEETING: &str = r#"
    mutation($input: NewMeetingInput!) {
        crm { createMeeting(input: $input) { id title scheduledAt location } }
    }
"#;

const CREATE_DEAL: &str = r#"
    mutation($input: NewDealInput!) {
        crm { createDeal(input: $input) { id title stage completion canAdvance leadId probability } }
    }
"#;

const UPDATE_DEAL: &str = r#"
    mutation($input: UpdateDealInput!) {
        crm { updateDeal(input: $input) { id stage completion missingRequirements probability } }
    }
"#;

const DELETE_DEAL: &str = r#"
    mutation($id: ID!) { crm { deleteDeal(id: $id) } }
"#;

const FEED: &str = r#"
    query($entityType: ActivityTarget, $entityId: ID) {
        crm { activityFeed(entityType: $entityType, entityId: $entityId) { kind subject metaJson entityType } }
    }
"#;

#[tokio::test]
async fn contact_crud_round_trip() {
    let (_db, schema) = setup().await;

    let resp = exec_as(
        &schema,
        sales(),
        CREATE_CONTACT,
        json!({"input": {
            "email": "  Mira.Holt@Norse-Industries.test ",
            "firstName": "Mira",
            "lastName": "Holt",
            "company": "Norse Industries"
        }}),
    )
    .await;
    let data = data_of(resp);
    let created = &data["crm"]["createContact"];
    assert_eq!(created["email"], "mira.holt@norse-industries.test");
    let id = created["id"].as_str().expect("contact id").to_string();

    let feed = data_of(
        exec_as(
            &schema,
            viewer(),
            FEED,
            json!({"entityType": "CONTACT", "entityId": id}),
        )
        .await,
    );
    let entries = feed["crm"]["activityFeed"].as_array().expect("feed");
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["kind"], "created");
    assert_eq!(entries[0]["subject"], "Created contact Mira Holt");

    let resp = exec_as(
        &schema,
        sales(),
        UPDATE_CONTACT,
        json!({"input": {"id": id, "position": "Procurement Lead"}}),
    )
    .await;
    let data = data_of(resp);
    assert_eq!(data["crm"]["updateContact"]["position"], "Procurement Lead");
    assert_eq!(data["crm"]["updateContact"]["company"], "Norse Industries");

    let data = data_of(exec_as(&schema, viewer(), CONTACTS, json!({"q": "norse"})).await);
    assert_eq!(data["crm"]["contacts"].as_array().map(Vec::len), Some(1));
    let data = data_of(exec_as(&schema, viewer(), CONTACTS, json!({"q": "zebra"})).await);
    assert_eq!(data["crm"]["contacts"].as_array().map(Vec::len), Some(0));

    let data = data_of(exec_as(&schema, sales(), DELETE_CONTACT, json!({"id": id})).await);
    assert_eq!(data["crm"]["deleteContact"], true);
    let data = data_of(exec_as(&schema, sales(), DELETE_CONTACT, json!({"id": id})).await);
    assert_eq!(data["crm"]["deleteContact"], false);
}

#[tokio::test]
async fn contact_owner_must_exist() {
    let (_db, schema) = setup().await;
    let resp = exec_as(
        &schema,
        sales(),
        CREATE_CONTACT,
        json!({"input": {
            "email": "owner.check@anvil.test",
            "ownerId": uuid::Uuid::new_v4().to_string()
        }}),
    )
    .await;
    assert_eq!(first_error_code(&resp), "NOT_FOUND");
}

#[tokio::test]
async fn converting_a_lead_creates_a_linked_deal() {
    let (_db, schema) = setup().await;

    let resp = exec_as(
        &schema,
        sales(),
        CREATE_LEAD,
        json!({"input": {
            "name": "Delta Machining",
            "source": "tradeshow",
            "notes": "Asked for a spindle retrofit quote"
        }}),
    )
    .await;
    let data = data_of(resp);
    let lead_id = data["crm"]["createLead"]["id"]
        .as_str()
        .expect("lead id")
        .to_string();

    let resp = exec_as(&schema, sales(), CONVERT_LEAD, json!({"id": lead_id})).await;
    let data = data_of(resp);
    let deal = &data["crm"]["convertLead"];
    assert_eq!(deal["stage"], "DISCUSSIONS");
    assert_eq!(deal["title"], "Delta Machining deal");
    assert_eq!(deal["leadId"], lead_id);
    assert_eq!(deal["description"], "Asked for a spindle retrofit quote");
    let deal_id = deal["id"].as_str().expect("deal id").to_string();

    // The lead survives conversion.
    let data = data_of(exec_as(&schema, viewer(), LEAD, json!({"id": lead_id})).await);
    assert_eq!(data["crm"]["lead"]["name"], "Delta Machining");

    let feed = data_of(
        exec_as(
            &schema,
            viewer(),
            FEED,
            json!({"entityType": "LEAD", "entityId": lead_id}),
        )
        .await,
    );
    let entries = feed["crm"]["activityFeed"].as_array().expect("lead feed");
    let kinds: Vec<&str> = entries.iter().filter_map(|e| e["kind"].as_str()).collect();
    assert!(kinds.contains(&"created"));
    assert!(kinds.contains(&"converted"));
    let converted = entries
        .iter()
        .find(|e| e["kind"] == "converted")
        .expect("converted entry");
    let meta: serde_json::Value =
        serde_json::from_str(converted["metaJson"].as_str().expect("meta")).expect("meta parses");
    assert_eq!(meta, json!({"dealId": deal_id}));

    let feed = data_of(
        exec_as(
            &schema,
            viewer(),
            FEED,
            json!({"entityType": "DEAL", "entityId": deal_id}),
        )
        .await,
    );
    let entries = feed["crm"]["activityFeed"].as_array().expect("deal feed");
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["kind"], "created");
}

#[tokio::test]
async fn meetings_carry_their_schedule() {
    let (_db, schema) = setup().await;
    let resp = exec_as(
        &schema,
        sales(),
        CREATE_MEETING,
        json!({"input": {
            "title": "Plant visit",
            "scheduledAt": "2026-09-03T09:30:00Z",
            "location": "Linköping"
        }}),
    )
    .await;
    let data = data_of(resp);
    let created = &data["crm"]["createMeeting"];
    assert_eq!(created["title"], "Plant visit");
    assert!(created["scheduledAt"]
        .as_str()
        .expect("scheduledAt")
        .starts_with("2026-09-03T09:30"));
}

#[tokio::test]
async fn new_deals_start_in_discussions() {
    let (_db, schema) = setup().await;
    let resp = exec_as(
        &schema,
        sales(),
        CREATE_DEAL,
        json!({"input": {"title": "Enclosure batch", "probability": 30}}),
    )
    .await;
    let data = data_of(resp);
    let deal = &data["crm"]["createDeal"];
    assert_eq!(deal["stage"], "DISCUSSIONS");
    assert_eq!(deal["completion"], "INCOMPLETE");
    assert_eq!(deal["canAdvance"], false);
    assert_eq!(deal["probability"], 30);
}

#[tokio::test]
async fn deal_links_are_validated() {
    let (_db, schema) = setup().await;
    let resp = exec_as(
        &schema,
        sales(),
        CREATE_DEAL,
        json!({"input": {
            "title": "Dangling link",
            "leadId": uuid::Uuid::new_v4().to_string()
        }}),
    )
    .await;
    assert_eq!(first_error_code(&resp), "VALIDATION");
    assert!(first_error_message(&resp).contains("leadId"));
}

#[tokio::test]
async fn deal_field_validations() {
    let (_db, schema) = setup().await;

    let resp = exec_as(
        &schema,
        sales(),
        CREATE_DEAL,
        json!({"input": {"title": "Probability fence", "probability": 150}}),
    )
    .await;
    assert_eq!(first_error_code(&resp), "VALIDATION");

    let resp = exec_as(
        &schema,
        sales(),
        CREATE_DEAL,
        json!({"input": {"title": "Currency fence", "currency": "EURO"}}),
    )
    .await;
    assert_eq!(first_error_code(&resp), "VALIDATION");

    let resp = exec_as(
        &schema,
        sales(),
        CREATE_DEAL,
        json!({"input": {"title": "Amount fence", "amountCents": -5}}),
    )
    .await;
    assert_eq!(first_error_code(&resp), "VALIDATION");
}

#[tokio::test]
async fn update_deal_cannot_touch_the_stage() {
    let (_db, schema) = setup().await;
    let resp = exec_as(
        &schema,
        sales(),
        CREATE_DEAL,
        json!({"input": {"title": "Stage fence"}}),
    )
    .await;
    let data = data_of(resp);
    let id = data["crm"]["createDeal"]["id"].as_str().expect("id").to_string();

    // UpdateDealInput has no stage field, so the request fails schema validation.
    let resp = exec_as(
        &schema,
        sales(),
        UPDATE_DEAL,
        json!({"input": {"id": id, "stage": "WON"}}),
    )
    .await;
    assert!(!resp.errors.is_empty());

    let resp = exec_as(
        &schema,
        sales(),
        UPDATE_DEAL,
        json!({"input": {"id": id, "probability": 60}}),
    )
    .await;
    let data = data_of(resp);
    assert_eq!(data["crm"]["updateDeal"]["stage"], "DISCUSSIONS");
    assert_eq!(data["crm"]["updateDeal"]["probability"], 60);
}

#[tokio::test]
async fn deleting_a_deal_leaves_a_tombstone_activity() {
    let (_db, schema) = setup().await;
    let resp = exec_as(
        &schema,
        sales(),
        CREATE_DEAL,
        json!({"input": {"title": "Retired quote"}}),
    )
    .await;
    let data = data_of(resp);
    let id = data["crm"]["createDeal"]["id"].as_str().expect("id").to_string();

    let data = data_of(exec_as(&schema, sales(), DELETE_DEAL, json!({"id": id})).await);
    assert_eq!(data["crm"]["deleteDeal"], true);
    let data = data_of(exec_as(&schema, sales(), DELETE_DEAL, json!({"id": id})).await);
    assert_eq!(data["crm"]["deleteDeal"], false);

    let feed = data_of(
        exec_as(
            &schema,
            viewer(),
            FEED,
            json!({"entityType": "DEAL", "entityId": id}),
        )
        .await,
    );
    let entries = feed["crm"]["activityFeed"].as_array().expect("feed");
    let kinds: Vec<&str> = entries.iter().filter_map(|e| e["kind"].as_str()).collect();
    assert!(kinds.contains(&"created"));
    assert!(kinds.contains(&"deleted"));
    let deleted = entries
        .iter()
        .find(|e| e["kind"] == "deleted")
        .expect("deleted entry");
    assert_eq!(deleted["subject"], "Deleted deal Retired quote");
}

#[tokio::test]
async fn feed_filters_by_target_type() {
    let (_db, schema) = setup().await;
    data_of(
        exec_as(
            &schema,
            sales(),
            CREATE_LEAD,
            json!({"input": {"name": "Polar Fab"}}),
        )
        .await,
    );
    data_of(
        exec_as(
            &schema,
            sales(),
            CREATE_DEAL,
            json!({"input": {"title": "Polar quote"}}),
        )
        .await,
    );

    let feed = data_of(exec_as(&schema, viewer(), FEED, json!({"entityType": "LEAD"})).await);
    let entries = feed["crm"]["activityFeed"].as_array().expect("feed");
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["entityType"], "lead");

    let feed = data_of(exec_as(&schema, viewer(), FEED, json!(null)).await);
    assert_eq!(feed["crm"]["activityFeed"].as_array().map(Vec::len), Some(2));
}

#[tokio::test]
async fn writes_require_the_sales_role() {
    let (_db, schema) = setup().await;
    let resp = exec_as(
        &schema,
        viewer(),
        CREATE_CONTACT,
        json!({"input": {"email": "fence@anvil.test"}}),
    )
    .await;
    assert_eq!(first_error_code(&resp), "FORBIDDEN");
}

#[tokio::test]
async fn reads_require_a_session() {
    let (_db, schema) = setup().await;
    let resp = exec_anon(&schema, CONTACTS, json!(null)).await;
    assert_eq!(first_error_code(&resp), "UNAUTHENTICATED");
}
