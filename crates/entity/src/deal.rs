use sea_orm::entity::prelude::*;

/// A deal row carries one nullable column group per pipeline stage; the
/// group for a stage is what that stage's checklist inspects.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "deal")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    #[sea_orm(indexed)]
    pub stage: Stage,
    pub amount_cents: Option<i64>,
    pub currency: Option<String>,
    pub probability: Option<i16>,
    pub close_date: Option<Date>,
    #[sea_orm(indexed)]
    pub lead_id: Option<Uuid>,
    #[sea_orm(indexed)]
    pub meeting_id: Option<Uuid>,
    #[sea_orm(indexed)]
    pub owner_id: Option<Uuid>,
    // Discussions
    pub need_identified: Option<bool>,
    pub need_summary: Option<String>,
    pub decision_maker_present: Option<bool>,
    pub customer_agreement: Option<CustomerAgreement>,
    // Qualified
    pub nda_signed: Option<bool>,
    pub budget_confirmed: Option<BudgetConfirmed>,
    pub portal_access: Option<PortalAccess>,
    pub timeline_start: Option<Date>,
    pub timeline_end: Option<Date>,
    // RFQ
    pub rfq_value_cents: Option<i64>,
    pub rfq_document_url: Option<String>,
    pub rfq_scope: Option<String>,
    // Offered
    pub proposal_sent_date: Option<Date>,
    pub negotiation_status: Option<NegotiationStatus>,
    pub decision_expected_date: Option<Date>,
    // Terminal outcome
    pub win_reason: Option<String>,
    pub loss_reason: Option<LossReason>,
    pub drop_reason: Option<String>,
    pub created_by: Option<Uuid>,
    pub modified_by: Option<Uuid>,
    pub created_at: DateTimeWithTimeZone,
    pub modified_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::lead::Entity",
        from = "Column::LeadId",
        to = "super::lead::Column::Id",
        on_delete = "SetNull"
    )]
    Lead,
    #[sea_orm(
        belongs_to = "super::meeting::Entity",
        from = "Column::MeetingId",
        to = "super::meeting::Column::Id",
        on_delete = "SetNull"
    )]
    Meeting,
    #[sea_orm(
        belongs_to = "super::app_user::Entity",
        from = "Column::OwnerId",
        to = "super::app_user::Column::Id",
        on_delete = "SetNull"
    )]
    Owner,
}

impl Related<super::lead::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Lead.def()
    }
}

impl Related<super::meeting::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Meeting.def()
    }
}

impl Related<super::app_user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Owner.def()
    }
}

/// Stored as text so the same column works on Postgres and the sqlite
/// test harness; the ordering and terminality of stages live in the
/// pipeline catalog, not here.
#[derive(Copy, Clone, Debug, EnumIter, DeriveActiveEnum, Eq, PartialEq, Hash)]
#[sea_orm(rs_type = "String", db_type = "String(Some(32))")]
pub enum Stage {
    #[sea_orm(string_value = "DISCUSSIONS")]
    Discussions,
    #[sea_orm(string_value = "QUALIFIED")]
    Qualified,
    #[sea_orm(string_value = "RFQ")]
    Rfq,
    #[sea_orm(string_value = "OFFERED")]
    Offered,
    #[sea_orm(string_value = "WON")]
    Won,
    #[sea_orm(string_value = "LOST")]
    Lost,
    #[sea_orm(string_value = "DROPPED")]
    Dropped,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveActiveEnum, Eq, PartialEq)]
#[sea_orm(rs_type = "String", db_type = "String(Some(32))")]
pub enum CustomerAgreement {
    #[sea_orm(string_value = "YES")]
    Yes,
    #[sea_orm(string_value = "NO")]
    No,
    #[sea_orm(string_value = "PARTIAL")]
    Partial,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveActiveEnum, Eq, PartialEq)]
#[sea_orm(rs_type = "String", db_type = "String(Some(32))")]
pub enum BudgetConfirmed {
    #[sea_orm(string_value = "YES")]
    Yes,
    #[sea_orm(string_value = "NO")]
    No,
    #[sea_orm(string_value = "ESTIMATE_ONLY")]
    EstimateOnly,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveActiveEnum, Eq, PartialEq)]
#[sea_orm(rs_type = "String", db_type = "String(Some(32))")]
pub enum PortalAccess {
    #[sea_orm(string_value = "INVITED")]
    Invited,
    #[sea_orm(string_value = "APPROVED")]
    Approved,
    #[sea_orm(string_value = "NOT_INVITED")]
    NotInvited,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveActiveEnum, Eq, PartialEq)]
#[sea_orm(rs_type = "String", db_type = "String(Some(32))")]
pub enum NegotiationStatus {
    #[sea_orm(string_value = "ONGOING")]
    Ongoing,
    #[sea_orm(string_value = "FINALIZED")]
    Finalized,
    #[sea_orm(string_value = "REJECTED")]
    Rejected,
    #[sea_orm(string_value = "ACCEPTED")]
    Accepted,
    #[sea_orm(string_value = "DROPPED")]
    Dropped,
    #[sea_orm(string_value = "NO_RESPONSE")]
    NoResponse,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveActiveEnum, Eq, PartialEq)]
#[sea_orm(rs_type = "String", db_type = "String(Some(32))")]
pub enum LossReason {
    #[sea_orm(string_value = "PRICE")]
    Price,
    #[sea_orm(string_value = "COMPETITOR")]
    Competitor,
    #[sea_orm(string_value = "NO_BUDGET")]
    NoBudget,
    #[sea_orm(string_value = "TIMING")]
    Timing,
    #[sea_orm(string_value = "NO_DECISION")]
    NoDecision,
    #[sea_orm(string_value = "OTHER")]
    Other,
}

impl ActiveModelBehavior for ActiveModel {}
