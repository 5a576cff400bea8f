use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use rand_core::OsRng;
use async_graphql::{
    ComplexObject, Context, EmptySubscription, Enum, Error, ErrorExtensions, InputObject, Object,
    Schema, SimpleObject, ID,
};
use chrono::{DateTime, NaiveDate, Utc};
use entity::{activity, app_user, contact, deal, deal_stage_history, lead, meeting, user_role, user_secret};
use sea_orm::prelude::DateTimeWithTimeZone;
use sea_orm::sea_query::{Expr, Func};
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, Condition, ConnectionTrait, DatabaseConnection,
    DbErr, EntityTrait, Order, QueryFilter, QueryOrder, QuerySelect, TransactionTrait,
};
use serde_json::json;
use tracing::info_span;
use uuid::Uuid;

use crate::auth::{AuthConfig, CurrentUser, UserRole, SESSION_COOKIE};
use crate::pipeline;

pub type AppSchema = Schema<QueryRoot, MutationRoot, EmptySubscription>;

const MAX_DEALS_PAGE: i32 = 100;
const MAX_BOARD_PER_STAGE: i32 = 100;

pub fn build_schema(db: Arc<DatabaseConnection>, auth: Arc<AuthConfig>) -> AppSchema {
    Schema::build(QueryRoot, MutationRoot, EmptySubscription)
        .data(db)
        .data(auth)
        .finish()
}

pub struct QueryRoot;

#[Object]
impl QueryRoot {
    /// CRM namespace for all read operations.
    async fn crm(&self) -> CrmQuery {
        CrmQuery
    }
}

pub struct MutationRoot;

#[Object]
impl MutationRoot {
    /// CRM namespace for all write operations.
    async fn crm(&self) -> CrmMutation {
        CrmMutation
    }
}

pub struct CrmQuery;

#[Object]
impl CrmQuery {
    /// The authenticated user, or an UNAUTHENTICATED error when no session is present.
    async fn me(&self, ctx: &Context<'_>) -> async_graphql::Result<MePayload> {
        let current = require_viewer(ctx)?;
        let db = database(ctx)?;
        let (user, roles) = load_user_with_roles(db.as_ref(), current.user_id).await?;
        Ok(MePayload {
            user: UserNode::from_parts(user, roles),
        })
    }

    async fn users(
        &self,
        ctx: &Context<'_>,
        q: Option<String>,
        first: Option<i32>,
        offset: Option<i32>,
    ) -> async_graphql::Result<Vec<UserNode>> {
        require_role(ctx, UserRole::Admin)?;
        let db = database(ctx)?;

        let mut query = app_user::Entity::find();
        if let Some(q) = sanitize_optional_filter(q)? {
            let pattern = format!("%{}%", q.to_lowercase());
            query = query.filter(
                Condition::any()
                    .add(
                        Expr::expr(Func::lower(Expr::col(app_user::Column::Email)))
                            .like(pattern.clone()),
                    )
                    .add(
                        Expr::expr(Func::lower(Expr::col(app_user::Column::DisplayName)))
                            .like(pattern),
                    ),
            );
        }

        let limit = first.unwrap_or(50).clamp(1, 200) as u64;
        let offset = offset.unwrap_or(0).max(0) as u64;
        let users = query
            .order_by_asc(app_user::Column::Email)
            .limit(limit)
            .offset(offset)
            .all(db.as_ref())
            .await
            .map_err(db_error)?;

        let role_map = load_roles_for_users(db.as_ref(), users.iter().map(|u| u.id)).await?;
        Ok(users
            .into_iter()
            .map(|user| {
                let roles = role_map.get(&user.id).cloned().unwrap_or_default();
                UserNode::from_parts(user, roles)
            })
            .collect())
    }

    async fn user(&self, ctx: &Context<'_>, id: ID) -> async_graphql::Result<Option<UserNode>> {
        require_role(ctx, UserRole::Admin)?;
        let db = database(ctx)?;
        let user_id = parse_uuid(&id)?;
        let Some(user) = app_user::Entity::find_by_id(user_id)
            .one(db.as_ref())
            .await
            .map_err(db_error)?
        else {
            return Ok(None);
        };
        let roles = load_roles(db.as_ref(), user.id).await?;
        Ok(Some(UserNode::from_parts(user, roles)))
    }

    async fn contacts(
        &self,
        ctx: &Context<'_>,
        q: Option<String>,
        first: Option<i32>,
        offset: Option<i32>,
    ) -> async_graphql::Result<Vec<ContactNode>> {
        require_viewer(ctx)?;
        let db = database(ctx)?;

        let mut query = contact::Entity::find();
        if let Some(q) = sanitize_optional_filter(q)? {
            let pattern = format!("%{}%", q.to_lowercase());
            query = query.filter(
                Condition::any()
                    .add(
                        Expr::expr(Func::lower(Expr::col(contact::Column::Email)))
                            .like(pattern.clone()),
                    )
                    .add(
                        Expr::expr(Func::lower(Expr::col(contact::Column::FirstName)))
                            .like(pattern.clone()),
                    )
                    .add(
                        Expr::expr(Func::lower(Expr::col(contact::Column::LastName)))
                            .like(pattern.clone()),
                    )
                    .add(
                        Expr::expr(Func::lower(Expr::col(contact::Column::Company)))
                            .like(pattern),
                    ),
            );
        }

        let limit = first.unwrap_or(50).clamp(1, 200) as u64;
        let offset = offset.unwrap_or(0).max(0) as u64;
        let rows = query
            .order_by_asc(contact::Column::Email)
            .limit(limit)
            .offset(offset)
            .all(db.as_ref())
            .await
            .map_err(db_error)?;
        Ok(rows.into_iter().map(ContactNode::from).collect())
    }

    async fn contact(&self, ctx: &Context<'_>, id: ID) -> async_graphql::Result<Option<ContactNode>> {
        require_viewer(ctx)?;
        let db = database(ctx)?;
        let contact_id = parse_uuid(&id)?;
        let row = contact::Entity::find_by_id(contact_id)
            .one(db.as_ref())
            .await
            .map_err(db_error)?;
        Ok(row.map(ContactNode::from))
    }

    async fn leads(
        &self,
        ctx: &Context<'_>,
        q: Option<String>,
        first: Option<i32>,
        offset: Option<i32>,
    ) -> async_graphql::Result<Vec<LeadNode>> {
        require_viewer(ctx)?;
        let db = database(ctx)?;

        let mut query = lead::Entity::find();
        if let Some(q) = sanitize_optional_filter(q)? {
            let pattern = format!("%{}%", q.to_lowercase());
            query = query.filter(
                Condition::any()
                    .add(
                        Expr::expr(Func::lower(Expr::col(lead::Column::Name)))
                            .like(pattern.clone()),
                    )
                    .add(
                        Expr::expr(Func::lower(Expr::col(lead::Column::Company)))
                            .like(pattern.clone()),
                    )
                    .add(Expr::expr(Func::lower(Expr::col(lead::Column::Email))).like(pattern)),
            );
        }

        let limit = first.unwrap_or(50).clamp(1, 200) as u64;
        let offset = offset.unwrap_or(0).max(0) as u64;
        let rows = query
            .order_by_desc(lead::Column::CreatedAt)
            .limit(limit)
            .offset(offset)
            .all(db.as_ref())
            .await
            .map_err(db_error)?;
        Ok(rows.into_iter().map(LeadNode::from).collect())
    }

    async fn lead(&self, ctx: &Context<'_>, id: ID) -> async_graphql::Result<Option<LeadNode>> {
        require_viewer(ctx)?;
        let db = database(ctx)?;
        let lead_id = parse_uuid(&id)?;
        let row = lead::Entity::find_by_id(lead_id)
            .one(db.as_ref())
            .await
            .map_err(db_error)?;
        Ok(row.map(LeadNode::from))
    }

    async fn meetings(
        &self,
        ctx: &Context<'_>,
        q: Option<String>,
        first: Option<i32>,
        offset: Option<i32>,
    ) -> async_graphql::Result<Vec<MeetingNode>> {
        require_viewer(ctx)?;
        let db = database(ctx)?;

        let mut query = meeting::Entity::find();
        if let Some(q) = sanitize_optional_filter(q)? {
            let pattern = format!("%{}%", q.to_lowercase());
            query = query.filter(
                Condition::any()
                    .add(
                        Expr::expr(Func::lower(Expr::col(meeting::Column::Title)))
                            .like(pattern.clone()),
                    )
                    .add(
                        Expr::expr(Func::lower(Expr::col(meeting::Column::Location)))
                            .like(pattern),
                    ),
            );
        }

        let limit = first.unwrap_or(50).clamp(1, 200) as u64;
        let offset = offset.unwrap_or(0).max(0) as u64;
        let rows = query
            .order_by_desc(meeting::Column::ScheduledAt)
            .limit(limit)
            .offset(offset)
            .all(db.as_ref())
            .await
            .map_err(db_error)?;
        Ok(rows.into_iter().map(MeetingNode::from).collect())
    }

    async fn meeting(&self, ctx: &Context<'_>, id: ID) -> async_graphql::Result<Option<MeetingNode>> {
        require_viewer(ctx)?;
        let db = database(ctx)?;
        let meeting_id = parse_uuid(&id)?;
        let row = meeting::Entity::find_by_id(meeting_id)
            .one(db.as_ref())
            .await
            .map_err(db_error)?;
        Ok(row.map(MeetingNode::from))
    }

    async fn deals(
        &self,
        ctx: &Context<'_>,
        filter: Option<DealFilter>,
        order: Option<DealOrder>,
        first: Option<i32>,
        offset: Option<i32>,
    ) -> async_graphql::Result<Vec<DealNode>> {
        let stage_tag = filter
            .as_ref()
            .and_then(|f| f.stage)
            .map(|s| s.as_str())
            .unwrap_or("");
        let span = info_span!("deals_query", stage = stage_tag);
        let _guard = span.enter();

        require_viewer(ctx)?;
        let db = database(ctx)?;

        let mut query = deal::Entity::find();
        if let Some(filter) = filter {
            if let Some(stage) = filter.stage {
                query = query.filter(deal::Column::Stage.eq(deal::Stage::from(stage)));
            }
            if let Some(lead_id) = parse_optional_id("leadId", &filter.lead_id)? {
                query = query.filter(deal::Column::LeadId.eq(lead_id));
            }
            if let Some(owner_id) = parse_optional_id("ownerId", &filter.owner_id)? {
                query = query.filter(deal::Column::OwnerId.eq(owner_id));
            }
            if let Some(q) = sanitize_optional_filter(filter.q)? {
                let pattern = format!("%{}%", q.to_lowercase());
                query = query.filter(
                    Condition::any()
                        .add(
                            Expr::expr(Func::lower(Expr::col(deal::Column::Title)))
                                .like(pattern.clone()),
                        )
                        .add(
                            Expr::expr(Func::lower(Expr::col(deal::Column::Description)))
                                .like(pattern),
                        ),
                );
            }
        }

        let order = order.unwrap_or_default();
        query = match order {
            DealOrder::ModifiedDesc => query.order_by_desc(deal::Column::ModifiedAt),
            DealOrder::CreatedDesc => query.order_by_desc(deal::Column::CreatedAt),
            DealOrder::CloseDateAsc => query
                .order_by(
                    Expr::cust("CASE WHEN close_date IS NULL THEN 1 ELSE 0 END"),
                    Order::Asc,
                )
                .order_by(deal::Column::CloseDate, Order::Asc),
            DealOrder::AmountDesc => query
                .order_by(
                    Expr::cust("CASE WHEN amount_cents IS NULL THEN 1 ELSE 0 END"),
                    Order::Asc,
                )
                .order_by(deal::Column::AmountCents, Order::Desc),
        };
        query = query.order_by(deal::Column::Id, Order::Asc);

        let limit = enforce_page_limit(first.unwrap_or(50), MAX_DEALS_PAGE, "deals")?;
        let offset = offset.unwrap_or(0).max(0) as u64;
        let rows = query
            .limit(limit)
            .offset(offset)
            .all(db.as_ref())
            .await
            .map_err(db_error)?;
        Ok(rows.into_iter().map(DealNode::from).collect())
    }

    async fn deal(&self, ctx: &Context<'_>, id: ID) -> async_graphql::Result<Option<DealNode>> {
        require_viewer(ctx)?;
        let db = database(ctx)?;
        let deal_id = parse_uuid(&id)?;
        let row = deal::Entity::find_by_id(deal_id)
            .one(db.as_ref())
            .await
            .map_err(db_error)?;
        Ok(row.map(DealNode::from))
    }

    /// The full stage catalog in pipeline order, including per-stage requirement labels.
    async fn pipeline_stages(&self, ctx: &Context<'_>) -> async_graphql::Result<Vec<PipelineStageNode>> {
        require_viewer(ctx)?;
        Ok(pipeline::STAGES
            .iter()
            .copied()
            .map(PipelineStageNode::from)
            .collect())
    }

    /// Kanban-style board: one column per stage with aggregates and a capped card list.
    async fn pipeline_board(
        &self,
        ctx: &Context<'_>,
        first_per_stage: Option<i32>,
        stage_keys: Option<Vec<DealStage>>,
        q: Option<String>,
    ) -> async_graphql::Result<PipelineBoard> {
        let span = info_span!("pipeline_board", stages = stage_keys.as_ref().map(Vec::len).unwrap_or(pipeline::STAGES.len()));
        let _guard = span.enter();

        require_viewer(ctx)?;
        let db = database(ctx)?;

        let requested = first_per_stage.unwrap_or(25);
        if requested < 0 {
            return Err(validation_error("firstPerStage must not be negative"));
        }
        if requested > MAX_BOARD_PER_STAGE {
            return Err(error_with_code(
                "LIMIT_EXCEEDED",
                format!("Cannot request more than {} deals per stage", MAX_BOARD_PER_STAGE),
            ));
        }

        let stages = select_stage_sequence(stage_keys.as_ref())?;
        let query_filter = sanitize_optional_filter(q)?;

        let mut columns = Vec::with_capacity(stages.len());
        for stage in stages {
            let mut query = deal::Entity::find().filter(deal::Column::Stage.eq(stage));
            if let Some(q) = &query_filter {
                let pattern = format!("%{}%", q.to_lowercase());
                query = query.filter(
                    Condition::any()
                        .add(
                            Expr::expr(Func::lower(Expr::col(deal::Column::Title)))
                                .like(pattern.clone()),
                        )
                        .add(
                            Expr::expr(Func::lower(Expr::col(deal::Column::Description)))
                                .like(pattern),
                        ),
                );
            }
            let rows = query
                .order_by_desc(deal::Column::ModifiedAt)
                .order_by(deal::Column::Id, Order::Asc)
                .all(db.as_ref())
                .await
                .map_err(db_error)?;

            let total_count = rows.len() as i32;
            let total_amount_cents: i64 = rows.iter().filter_map(|d| d.amount_cents).sum();
            let next = pipeline::next_after(stage);
            let ready_count = rows
                .iter()
                .filter(|d| pipeline::can_move_to_stage(d, next))
                .count() as i32;
            let ready_ratio = if total_count > 0 {
                f64::from(ready_count) / f64::from(total_count)
            } else {
                0.0
            };
            let deals = rows
                .into_iter()
                .take(requested as usize)
                .map(PipelineCard::from)
                .collect();

            columns.push(PipelineColumn {
                stage: PipelineStageNode::from(stage),
                total_count,
                total_amount_cents,
                ready_count,
                ready_ratio,
                deals,
            });
        }

        Ok(PipelineBoard { columns })
    }

    async fn deal_stage_history(
        &self,
        ctx: &Context<'_>,
        deal_id: ID,
        first: Option<i32>,
        offset: Option<i32>,
    ) -> async_graphql::Result<Vec<StageHistoryNode>> {
        require_viewer(ctx)?;
        let db = database(ctx)?;
        let deal_id = parse_uuid(&deal_id)?;

        let limit = first.unwrap_or(50).clamp(1, 200) as u64;
        let offset = offset.unwrap_or(0).max(0) as u64;
        let rows = deal_stage_history::Entity::find()
            .filter(deal_stage_history::Column::DealId.eq(deal_id))
            .order_by_desc(deal_stage_history::Column::ChangedAt)
            .limit(limit)
            .offset(offset)
            .all(db.as_ref())
            .await
            .map_err(db_error)?;
        Ok(rows.into_iter().map(StageHistoryNode::from).collect())
    }

    async fn activity_feed(
        &self,
        ctx: &Context<'_>,
        entity_type: Option<ActivityTarget>,
        entity_id: Option<ID>,
        first: Option<i32>,
        offset: Option<i32>,
    ) -> async_graphql::Result<Vec<ActivityNode>> {
        require_viewer(ctx)?;
        let db = database(ctx)?;

        let mut query = activity::Entity::find();
        if let Some(target) = entity_type {
            query = query.filter(activity::Column::EntityType.eq(target.as_str()));
        }
        if let Some(entity_id) = parse_optional_id("entityId", &entity_id)? {
            query = query.filter(activity::Column::EntityId.eq(entity_id));
        }

        let limit = first.unwrap_or(50).clamp(1, 200) as u64;
        let offset = offset.unwrap_or(0).max(0) as u64;
        let rows = query
            .order_by_desc(activity::Column::CreatedAt)
            .limit(limit)
            .offset(offset)
            .all(db.as_ref())
            .await
            .map_err(db_error)?;
        Ok(rows.into_iter().map(ActivityNode::from).collect())
    }
}

pub struct CrmMutation;

#[Object]
impl CrmMutation {
    /// Email/password login. Failures are reported in the payload, never as GraphQL errors,
    /// so the client cannot distinguish a missing account from a wrong password.
    async fn login(
        &self,
        ctx: &Context<'_>,
        email: String,
        password: String,
    ) -> async_graphql::Result<AuthPayload> {
        let db = database(ctx)?;
        let auth = auth_config(ctx)?;

        let normalized = match normalize_email(&email) {
            Ok(value) => value,
            Err(_) => return Ok(AuthPayload::failure("Invalid credentials")),
        };

        let Some(user) = app_user::Entity::find()
            .filter(app_user::Column::Email.eq(normalized))
            .one(db.as_ref())
            .await
            .map_err(db_error)?
        else {
            return Ok(AuthPayload::failure("Invalid credentials"));
        };
        if !user.is_active {
            return Ok(AuthPayload::failure("Account is disabled"));
        }

        let Some(secret) = user_secret::Entity::find_by_id(user.id)
            .one(db.as_ref())
            .await
            .map_err(db_error)?
        else {
            return Ok(AuthPayload::failure("Invalid credentials"));
        };
        if !verify_password(&password, &secret.password_hash) {
            return Ok(AuthPayload::failure("Invalid credentials"));
        }

        let roles = load_roles(db.as_ref(), user.id).await?;
        let token = crate::auth::issue_token(user.id, &roles, &auth).map_err(|err| {
            tracing::error!(error = %err, "failed to issue session token");
            error_with_code("INTERNAL", "Could not create session")
        })?;
        append_session_cookie(ctx, &token, auth.session_ttl_minutes);

        Ok(AuthPayload {
            ok: true,
            user: Some(UserNode::from_parts(user, roles)),
            error: None,
        })
    }

    async fn logout(&self, ctx: &Context<'_>) -> async_graphql::Result<bool> {
        append_session_cookie(ctx, "", -1);
        Ok(true)
    }

    async fn create_user(
        &self,
        ctx: &Context<'_>,
        input: NewUserInput,
    ) -> async_graphql::Result<UserNode> {
        let current = require_role(ctx, UserRole::Admin)?;
        let db = database(ctx)?;

        let email = normalize_email(&input.email)?;
        let display_name = validate_display_name(&input.display_name)?;
        let roles = parse_roles(&input.roles)?;
        validate_password(&input.password)?;

        let existing = app_user::Entity::find()
            .filter(app_user::Column::Email.eq(email.clone()))
            .one(db.as_ref())
            .await
            .map_err(db_error)?;
        if existing.is_some() {
            return Err(validation_error("A user with this email already exists"));
        }

        let password_hash = hash_password(&input.password).map_err(db_error)?;
        let now: DateTimeWithTimeZone = Utc::now().into();
        let user_id = Uuid::new_v4();

        let txn = db.begin().await.map_err(db_error)?;
        let user = app_user::ActiveModel {
            id: Set(user_id),
            email: Set(email),
            display_name: Set(display_name),
            is_active: Set(true),
            created_by: Set(Some(current.user_id)),
            modified_by: Set(Some(current.user_id)),
            created_at: Set(now),
            modified_at: Set(now),
        }
        .insert(&txn)
        .await
        .map_err(db_error)?;
        insert_roles(&txn, user.id, &roles).await.map_err(db_error)?;
        user_secret::ActiveModel {
            user_id: Set(user.id),
            password_hash: Set(password_hash),
            modified_at: Set(now),
        }
        .insert(&txn)
        .await
        .map_err(db_error)?;
        txn.commit().await.map_err(db_error)?;

        Ok(UserNode::from_parts(user, roles))
    }

    async fn update_user(
        &self,
        ctx: &Context<'_>,
        input: UpdateUserInput,
    ) -> async_graphql::Result<UserNode> {
        let current = require_role(ctx, UserRole::Admin)?;
        let db = database(ctx)?;
        let user_id = parse_uuid(&input.id)?;

        let Some(user) = app_user::Entity::find_by_id(user_id)
            .one(db.as_ref())
            .await
            .map_err(db_error)?
        else {
            return Err(error_with_code("NOT_FOUND", "User not found"));
        };

        let roles = match &input.roles {
            Some(roles) => Some(parse_roles(roles)?),
            None => None,
        };

        let now: DateTimeWithTimeZone = Utc::now().into();
        let txn = db.begin().await.map_err(db_error)?;

        let mut active: app_user::ActiveModel = user.into();
        if let Some(display_name) = &input.display_name {
            active.display_name = Set(validate_display_name(display_name)?);
        }
        if let Some(is_active) = input.is_active {
            active.is_active = Set(is_active);
        }
        active.modified_by = Set(Some(current.user_id));
        active.modified_at = Set(now);
        let user = active.update(&txn).await.map_err(db_error)?;

        if let Some(roles) = &roles {
            user_role::Entity::delete_many()
                .filter(user_role::Column::UserId.eq(user.id))
                .exec(&txn)
                .await
                .map_err(db_error)?;
            insert_roles(&txn, user.id, roles).await.map_err(db_error)?;
        }

        if let Some(password) = &input.password {
            validate_password(password)?;
            let password_hash = hash_password(password).map_err(db_error)?;
            let existing = user_secret::Entity::find_by_id(user.id)
                .one(&txn)
                .await
                .map_err(db_error)?;
            match existing {
                Some(secret) => {
                    let mut secret: user_secret::ActiveModel = secret.into();
                    secret.password_hash = Set(password_hash);
                    secret.modified_at = Set(now);
                    secret.update(&txn).await.map_err(db_error)?;
                }
                None => {
                    user_secret::ActiveModel {
                        user_id: Set(user.id),
                        password_hash: Set(password_hash),
                        modified_at: Set(now),
                    }
                    .insert(&txn)
                    .await
                    .map_err(db_error)?;
                }
            }
        }

        txn.commit().await.map_err(db_error)?;

        let roles = match roles {
            Some(roles) => roles,
            None => load_roles(db.as_ref(), user.id).await?,
        };
        Ok(UserNode::from_parts(user, roles))
    }

    async fn create_contact(
        &self,
        ctx: &Context<'_>,
        input: NewContactInput,
    ) -> async_graphql::Result<ContactNode> {
        let current = require_role(ctx, UserRole::Sales)?;
        let db = database(ctx)?;

        let email = normalize_email(&input.email)?;
        let first_name = sanitize_optional_text("firstName", input.first_name, 128)?;
        let last_name = sanitize_optional_text("lastName", input.last_name, 128)?;
        let phone = sanitize_optional_text("phone", input.phone, 64)?;
        let company = sanitize_optional_text("company", input.company, 256)?;
        let position = sanitize_optional_text("position", input.position, 256)?;
        let owner_id = resolve_owner(ctx, &input.owner_id).await?;

        let now: DateTimeWithTimeZone = Utc::now().into();
        let txn = db.begin().await.map_err(db_error)?;
        let model = contact::ActiveModel {
            id: Set(Uuid::new_v4()),
            email: Set(email),
            first_name: Set(first_name),
            last_name: Set(last_name),
            phone: Set(phone),
            company: Set(company),
            position: Set(position),
            owner_id: Set(owner_id),
            created_by: Set(Some(current.user_id)),
            modified_by: Set(Some(current.user_id)),
            created_at: Set(now),
            modified_at: Set(now),
        }
        .insert(&txn)
        .await
        .map_err(db_error)?;
        record_activity(
            &txn,
            "contact",
            model.id,
            activity::Kind::Created,
            Some(format!("Created contact {}", contact_display_name(&model))),
            None,
            json!({}),
            Some(current.user_id),
            now,
        )
        .await
        .map_err(db_error)?;
        txn.commit().await.map_err(db_error)?;

        Ok(model.into())
    }

    async fn update_contact(
        &self,
        ctx: &Context<'_>,
        input: UpdateContactInput,
    ) -> async_graphql::Result<ContactNode> {
        let current = require_role(ctx, UserRole::Sales)?;
        let db = database(ctx)?;
        let contact_id = parse_uuid(&input.id)?;

        let Some(model) = contact::Entity::find_by_id(contact_id)
            .one(db.as_ref())
            .await
            .map_err(db_error)?
        else {
            return Err(error_with_code("NOT_FOUND", "Contact not found"));
        };

        let owner_id = resolve_owner(ctx, &input.owner_id).await?;

        let mut active: contact::ActiveModel = model.into();
        if let Some(email) = &input.email {
            active.email = Set(normalize_email(email)?);
        }
        if let Some(value) = input.first_name {
            active.first_name = Set(sanitize_optional_text("firstName", Some(value), 128)?);
        }
        if let Some(value) = input.last_name {
            active.last_name = Set(sanitize_optional_text("lastName", Some(value), 128)?);
        }
        if let Some(value) = input.phone {
            active.phone = Set(sanitize_optional_text("phone", Some(value), 64)?);
        }
        if let Some(value) = input.company {
            active.company = Set(sanitize_optional_text("company", Some(value), 256)?);
        }
        if let Some(value) = input.position {
            active.position = Set(sanitize_optional_text("position", Some(value), 256)?);
        }
        if let Some(owner_id) = owner_id {
            active.owner_id = Set(Some(owner_id));
        }
        active.modified_by = Set(Some(current.user_id));
        active.modified_at = Set(Utc::now().into());

        let updated = active.update(db.as_ref()).await.map_err(db_error)?;
        Ok(updated.into())
    }

    async fn delete_contact(&self, ctx: &Context<'_>, id: ID) -> async_graphql::Result<bool> {
        require_role(ctx, UserRole::Sales)?;
        let db = database(ctx)?;
        let contact_id = parse_uuid(&id)?;
        let result = contact::Entity::delete_by_id(contact_id)
            .exec(db.as_ref())
            .await
            .map_err(db_error)?;
        Ok(result.rows_affected > 0)
    }

    async fn create_lead(
        &self,
        ctx: &Context<'_>,
        input: NewLeadInput,
    ) -> async_graphql::Result<LeadNode> {
        let current = require_role(ctx, UserRole::Sales)?;
        let db = database(ctx)?;

        let name = validate_required_text("name", &input.name, 256)?;
        let company = sanitize_optional_text("company", input.company, 256)?;
        let email = match input.email {
            Some(raw) if !raw.trim().is_empty() => Some(normalize_email(&raw)?),
            _ => None,
        };
        let phone = sanitize_optional_text("phone", input.phone, 64)?;
        let source = sanitize_optional_text("source", input.source, 128)?;
        let notes = sanitize_optional_text("notes", input.notes, 4000)?;
        let owner_id = resolve_owner(ctx, &input.owner_id).await?;

        let now: DateTimeWithTimeZone = Utc::now().into();
        let txn = db.begin().await.map_err(db_error)?;
        let model = lead::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(name),
            company: Set(company),
            email: Set(email),
            phone: Set(phone),
            source: Set(source),
            notes: Set(notes),
            owner_id: Set(owner_id),
            created_by: Set(Some(current.user_id)),
            modified_by: Set(Some(current.user_id)),
            created_at: Set(now),
            modified_at: Set(now),
        }
        .insert(&txn)
        .await
        .map_err(db_error)?;
        record_activity(
            &txn,
            "lead",
            model.id,
            activity::Kind::Created,
            Some(format!("Created lead {}", model.name)),
            None,
            json!({}),
            Some(current.user_id),
            now,
        )
        .await
        .map_err(db_error)?;
        txn.commit().await.map_err(db_error)?;

        Ok(model.into())
    }

    async fn update_lead(
        &self,
        ctx: &Context<'_>,
        input: UpdateLeadInput,
    ) -> async_graphql::Result<LeadNode> {
        let current = require_role(ctx, UserRole::Sales)?;
        let db = database(ctx)?;
        let lead_id = parse_uuid(&input.id)?;

        let Some(model) = lead::Entity::find_by_id(lead_id)
            .one(db.as_ref())
            .await
            .map_err(db_error)?
        else {
            return Err(error_with_code("NOT_FOUND", "Lead not found"));
        };

        let owner_id = resolve_owner(ctx, &input.owner_id).await?;

        let mut active: lead::ActiveModel = model.into();
        if let Some(name) = &input.name {
            active.name = Set(validate_required_text("name", name, 256)?);
        }
        if let Some(value) = input.company {
            active.company = Set(sanitize_optional_text("company", Some(value), 256)?);
        }
        if let Some(value) = input.email {
            active.email = Set(match value.trim() {
                "" => None,
                _ => Some(normalize_email(&value)?),
            });
        }
        if let Some(value) = input.phone {
            active.phone = Set(sanitize_optional_text("phone", Some(value), 64)?);
        }
        if let Some(value) = input.source {
            active.source = Set(sanitize_optional_text("source", Some(value), 128)?);
        }
        if let Some(value) = input.notes {
            active.notes = Set(sanitize_optional_text("notes", Some(value), 4000)?);
        }
        if let Some(owner_id) = owner_id {
            active.owner_id = Set(Some(owner_id));
        }
        active.modified_by = Set(Some(current.user_id));
        active.modified_at = Set(Utc::now().into());

        let updated = active.update(db.as_ref()).await.map_err(db_error)?;
        Ok(updated.into())
    }

    async fn delete_lead(&self, ctx: &Context<'_>, id: ID) -> async_graphql::Result<bool> {
        require_role(ctx, UserRole::Sales)?;
        let db = database(ctx)?;
        let lead_id = parse_uuid(&id)?;
        let result = lead::Entity::delete_by_id(lead_id)
            .exec(db.as_ref())
            .await
            .map_err(db_error)?;
        Ok(result.rows_affected > 0)
    }

    async fn create_meeting(
        &self,
        ctx: &Context<'_>,
        input: NewMeetingInput,
    ) -> async_graphql::Result<MeetingNode> {
        let current = require_role(ctx, UserRole::Sales)?;
        let db = database(ctx)?;

        let title = validate_required_text("title", &input.title, 256)?;
        let location = sanitize_optional_text("location", input.location, 256)?;
        let notes = sanitize_optional_text("notes", input.notes, 4000)?;
        let owner_id = resolve_owner(ctx, &input.owner_id).await?;

        let now: DateTimeWithTimeZone = Utc::now().into();
        let txn = db.begin().await.map_err(db_error)?;
        let model = meeting::ActiveModel {
            id: Set(Uuid::new_v4()),
            title: Set(title),
            scheduled_at: Set(input.scheduled_at.into()),
            location: Set(location),
            notes: Set(notes),
            owner_id: Set(owner_id),
            created_by: Set(Some(current.user_id)),
            modified_by: Set(Some(current.user_id)),
            created_at: Set(now),
            modified_at: Set(now),
        }
        .insert(&txn)
        .await
        .map_err(db_error)?;
        record_activity(
            &txn,
            "meeting",
            model.id,
            activity::Kind::Created,
            Some(format!("Created meeting {}", model.title)),
            None,
            json!({}),
            Some(current.user_id),
            now,
        )
        .await
        .map_err(db_error)?;
        txn.commit().await.map_err(db_error)?;

        Ok(model.into())
    }

    async fn update_meeting(
        &self,
        ctx: &Context<'_>,
        input: UpdateMeetingInput,
    ) -> async_graphql::Result<MeetingNode> {
        let current = require_role(ctx, UserRole::Sales)?;
        let db = database(ctx)?;
        let meeting_id = parse_uuid(&input.id)?;

        let Some(model) = meeting::Entity::find_by_id(meeting_id)
            .one(db.as_ref())
            .await
            .map_err(db_error)?
        else {
            return Err(error_with_code("NOT_FOUND", "Meeting not found"));
        };

        let owner_id = resolve_owner(ctx, &input.owner_id).await?;

        let mut active: meeting::ActiveModel = model.into();
        if let Some(title) = &input.title {
            active.title = Set(validate_required_text("title", title, 256)?);
        }
        if let Some(scheduled_at) = input.scheduled_at {
            active.scheduled_at = Set(scheduled_at.into());
        }
        if let Some(value) = input.location {
            active.location = Set(sanitize_optional_text("location", Some(value), 256)?);
        }
        if let Some(value) = input.notes {
            active.notes = Set(sanitize_optional_text("notes", Some(value), 4000)?);
        }
        if let Some(owner_id) = owner_id {
            active.owner_id = Set(Some(owner_id));
        }
        active.modified_by = Set(Some(current.user_id));
        active.modified_at = Set(Utc::now().into());

        let updated = active.update(db.as_ref()).await.map_err(db_error)?;
        Ok(updated.into())
    }

    async fn delete_meeting(&self, ctx: &Context<'_>, id: ID) -> async_graphql::Result<bool> {
        require_role(ctx, UserRole::Sales)?;
        let db = database(ctx)?;
        let meeting_id = parse_uuid(&id)?;
        let result = meeting::Entity::delete_by_id(meeting_id)
            .exec(db.as_ref())
            .await
            .map_err(db_error)?;
        Ok(result.rows_affected > 0)
    }

    /// Creates a deal in the first pipeline stage. The stage cannot be chosen at creation;
    /// every deal enters at Discussions and advances through moveDealStage.
    async fn create_deal(
        &self,
        ctx: &Context<'_>,
        input: NewDealInput,
    ) -> async_graphql::Result<DealNode> {
        let current = require_role(ctx, UserRole::Sales)?;
        let db = database(ctx)?;

        let title = validate_required_text("title", &input.title, 256)?;
        let description = sanitize_optional_text("description", input.description, 4000)?;
        let currency = validate_currency(input.currency)?;
        let probability = validate_probability(input.probability)?;
        let amount_cents = validate_amount(input.amount_cents)?;

        let lead_id = match parse_optional_id("leadId", &input.lead_id)? {
            Some(id) => {
                ensure_lead_exists(db.as_ref(), id).await?;
                Some(id)
            }
            None => None,
        };
        let meeting_id = match parse_optional_id("meetingId", &input.meeting_id)? {
            Some(id) => {
                ensure_meeting_exists(db.as_ref(), id).await?;
                Some(id)
            }
            None => None,
        };
        let owner_id = resolve_owner(ctx, &input.owner_id).await?;

        let now: DateTimeWithTimeZone = Utc::now().into();
        let txn = db.begin().await.map_err(db_error)?;
        let model = deal::ActiveModel {
            id: Set(Uuid::new_v4()),
            title: Set(title),
            description: Set(description),
            stage: Set(deal::Stage::Discussions),
            amount_cents: Set(amount_cents),
            currency: Set(currency),
            probability: Set(probability),
            close_date: Set(input.close_date),
            lead_id: Set(lead_id),
            meeting_id: Set(meeting_id),
            owner_id: Set(owner_id),
            created_by: Set(Some(current.user_id)),
            modified_by: Set(Some(current.user_id)),
            created_at: Set(now),
            modified_at: Set(now),
            ..Default::default()
        }
        .insert(&txn)
        .await
        .map_err(db_error)?;
        record_activity(
            &txn,
            "deal",
            model.id,
            activity::Kind::Created,
            Some(format!("Created deal {}", model.title)),
            None,
            json!({}),
            Some(current.user_id),
            now,
        )
        .await
        .map_err(db_error)?;
        txn.commit().await.map_err(db_error)?;

        Ok(model.into())
    }

    /// Edits deal fields. Stage is deliberately absent from the input; moveDealStage is
    /// the only way a deal changes stage.
    async fn update_deal(
        &self,
        ctx: &Context<'_>,
        input: UpdateDealInput,
    ) -> async_graphql::Result<DealNode> {
        let current = require_role(ctx, UserRole::Sales)?;
        let db = database(ctx)?;
        let deal_id = parse_uuid(&input.id)?;

        let Some(model) = deal::Entity::find_by_id(deal_id)
            .one(db.as_ref())
            .await
            .map_err(db_error)?
        else {
            return Err(error_with_code("NOT_FOUND", "Deal not found"));
        };

        let owner_id = resolve_owner(ctx, &input.owner_id).await?;

        let mut active: deal::ActiveModel = model.into();
        if let Some(title) = &input.title {
            active.title = Set(validate_required_text("title", title, 256)?);
        }
        if let Some(value) = input.description {
            active.description = Set(sanitize_optional_text("description", Some(value), 4000)?);
        }
        if let Some(value) = input.amount_cents {
            active.amount_cents = Set(validate_amount(Some(value))?);
        }
        if let Some(value) = input.currency {
            active.currency = Set(validate_currency(Some(value))?);
        }
        if let Some(value) = input.probability {
            active.probability = Set(validate_probability(Some(value))?);
        }
        if let Some(value) = input.close_date {
            active.close_date = Set(Some(value));
        }
        if let Some(owner_id) = owner_id {
            active.owner_id = Set(Some(owner_id));
        }

        if let Some(value) = input.need_identified {
            active.need_identified = Set(Some(value));
        }
        if let Some(value) = input.need_summary {
            active.need_summary = Set(sanitize_optional_text("needSummary", Some(value), 4000)?);
        }
        if let Some(value) = input.decision_maker_present {
            active.decision_maker_present = Set(Some(value));
        }
        if let Some(value) = input.customer_agreement {
            active.customer_agreement = Set(Some(value.into()));
        }
        if let Some(value) = input.nda_signed {
            active.nda_signed = Set(Some(value));
        }
        if let Some(value) = input.budget_confirmed {
            active.budget_confirmed = Set(Some(value.into()));
        }
        if let Some(value) = input.portal_access {
            active.portal_access = Set(Some(value.into()));
        }
        if let Some(value) = input.timeline_start {
            active.timeline_start = Set(Some(value));
        }
        if let Some(value) = input.timeline_end {
            active.timeline_end = Set(Some(value));
        }
        if let Some(value) = input.rfq_value_cents {
            active.rfq_value_cents = Set(validate_amount(Some(value))?);
        }
        if let Some(value) = input.rfq_document_url {
            active.rfq_document_url = Set(sanitize_optional_text("rfqDocumentUrl", Some(value), 1024)?);
        }
        if let Some(value) = input.rfq_scope {
            active.rfq_scope = Set(sanitize_optional_text("rfqScope", Some(value), 4000)?);
        }
        if let Some(value) = input.proposal_sent_date {
            active.proposal_sent_date = Set(Some(value));
        }
        if let Some(value) = input.negotiation_status {
            active.negotiation_status = Set(Some(value.into()));
        }
        if let Some(value) = input.decision_expected_date {
            active.decision_expected_date = Set(Some(value));
        }
        if let Some(value) = input.win_reason {
            active.win_reason = Set(sanitize_optional_text("winReason", Some(value), 2000)?);
        }
        if let Some(value) = input.loss_reason {
            active.loss_reason = Set(Some(value.into()));
        }
        if let Some(value) = input.drop_reason {
            active.drop_reason = Set(sanitize_optional_text("dropReason", Some(value), 2000)?);
        }

        active.modified_by = Set(Some(current.user_id));
        active.modified_at = Set(Utc::now().into());

        let updated = active.update(db.as_ref()).await.map_err(db_error)?;
        Ok(updated.into())
    }

    async fn delete_deal(&self, ctx: &Context<'_>, id: ID) -> async_graphql::Result<bool> {
        let current = require_role(ctx, UserRole::Sales)?;
        let db = database(ctx)?;
        let deal_id = parse_uuid(&id)?;

        let Some(existing) = deal::Entity::find_by_id(deal_id)
            .one(db.as_ref())
            .await
            .map_err(db_error)?
        else {
            return Ok(false);
        };

        let now: DateTimeWithTimeZone = Utc::now().into();
        let txn = db.begin().await.map_err(db_error)?;
        let result = deal::Entity::delete_by_id(deal_id)
            .exec(&txn)
            .await
            .map_err(db_error)?;
        if result.rows_affected > 0 {
            record_activity(
                &txn,
                "deal",
                deal_id,
                activity::Kind::Deleted,
                Some(format!("Deleted deal {}", existing.title)),
                None,
                json!({"stage": pipeline::display_name(existing.stage)}),
                Some(current.user_id),
                now,
            )
            .await
            .map_err(db_error)?;
        }
        txn.commit().await.map_err(db_error)?;
        Ok(result.rows_affected > 0)
    }

    /// Moves a deal to another stage. Forward moves are gated on the current stage's
    /// requirements; Won, Lost and Dropped accept the deal from any stage but demand
    /// their closing reason. Moving to the current stage succeeds without writing.
    #[allow(clippy::too_many_arguments)]
    async fn move_deal_stage(
        &self,
        ctx: &Context<'_>,
        id: ID,
        stage: DealStage,
        note: Option<String>,
        win_reason: Option<String>,
        loss_reason: Option<DealLossReason>,
        drop_reason: Option<String>,
    ) -> async_graphql::Result<DealNode> {
        let current = require_role(ctx, UserRole::Sales)?;
        let db = database(ctx)?;
        let deal_id = parse_uuid(&id)?;

        let note = sanitize_optional_text("note", note, 2000)?;
        let win_reason = sanitize_optional_text("winReason", win_reason, 2000)?;
        let drop_reason = sanitize_optional_text("dropReason", drop_reason, 2000)?;

        let moved = move_deal_stage_internal(
            db.as_ref(),
            deal_id,
            stage.into(),
            note,
            win_reason,
            loss_reason.map(Into::into),
            drop_reason,
            Some(current.user_id),
        )
        .await
        .map_err(stage_move_error)?;
        Ok(moved.into())
    }

    /// Converts a lead into a Discussions deal linked back to the lead. The lead row
    /// is kept; the conversion is recorded on both feeds.
    async fn convert_lead(
        &self,
        ctx: &Context<'_>,
        id: ID,
        title: Option<String>,
    ) -> async_graphql::Result<DealNode> {
        let current = require_role(ctx, UserRole::Sales)?;
        let db = database(ctx)?;
        let lead_id = parse_uuid(&id)?;

        let Some(lead) = lead::Entity::find_by_id(lead_id)
            .one(db.as_ref())
            .await
            .map_err(db_error)?
        else {
            return Err(error_with_code("NOT_FOUND", "Lead not found"));
        };

        let title = match title {
            Some(raw) => validate_required_text("title", &raw, 256)?,
            None => format!("{} deal", lead.name),
        };

        let now: DateTimeWithTimeZone = Utc::now().into();
        let txn = db.begin().await.map_err(db_error)?;
        let model = deal::ActiveModel {
            id: Set(Uuid::new_v4()),
            title: Set(title),
            description: Set(lead.notes.clone()),
            stage: Set(deal::Stage::Discussions),
            lead_id: Set(Some(lead.id)),
            owner_id: Set(lead.owner_id),
            created_by: Set(Some(current.user_id)),
            modified_by: Set(Some(current.user_id)),
            created_at: Set(now),
            modified_at: Set(now),
            ..Default::default()
        }
        .insert(&txn)
        .await
        .map_err(db_error)?;
        record_activity(
            &txn,
            "lead",
            lead.id,
            activity::Kind::Converted,
            Some(format!("Converted lead {}", lead.name)),
            None,
            json!({"dealId": model.id.to_string()}),
            Some(current.user_id),
            now,
        )
        .await
        .map_err(db_error)?;
        record_activity(
            &txn,
            "deal",
            model.id,
            activity::Kind::Created,
            Some(format!("Created deal {}", model.title)),
            None,
            json!({"leadId": lead.id.to_string()}),
            Some(current.user_id),
            now,
        )
        .await
        .map_err(db_error)?;
        txn.commit().await.map_err(db_error)?;

        Ok(model.into())
    }
}

// ---------------------------------------------------------------------------
// GraphQL enums mirroring the entity enums
// ---------------------------------------------------------------------------

#[derive(Enum, Copy, Clone, Eq, PartialEq)]
#[graphql(name = "DealStage")]
pub enum DealStage {
    Discussions,
    Qualified,
    Rfq,
    Offered,
    Won,
    Lost,
    Dropped,
}

impl DealStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            DealStage::Discussions => "DISCUSSIONS",
            DealStage::Qualified => "QUALIFIED",
            DealStage::Rfq => "RFQ",
            DealStage::Offered => "OFFERED",
            DealStage::Won => "WON",
            DealStage::Lost => "LOST",
            DealStage::Dropped => "DROPPED",
        }
    }
}

impl From<DealStage> for deal::Stage {
    fn from(value: DealStage) -> Self {
        match value {
            DealStage::Discussions => deal::Stage::Discussions,
            DealStage::Qualified => deal::Stage::Qualified,
            DealStage::Rfq => deal::Stage::Rfq,
            DealStage::Offered => deal::Stage::Offered,
            DealStage::Won => deal::Stage::Won,
            DealStage::Lost => deal::Stage::Lost,
            DealStage::Dropped => deal::Stage::Dropped,
        }
    }
}

impl From<deal::Stage> for DealStage {
    fn from(value: deal::Stage) -> Self {
        match value {
            deal::Stage::Discussions => DealStage::Discussions,
            deal::Stage::Qualified => DealStage::Qualified,
            deal::Stage::Rfq => DealStage::Rfq,
            deal::Stage::Offered => DealStage::Offered,
            deal::Stage::Won => DealStage::Won,
            deal::Stage::Lost => DealStage::Lost,
            deal::Stage::Dropped => DealStage::Dropped,
        }
    }
}

#[derive(Enum, Copy, Clone, Eq, PartialEq)]
#[graphql(name = "CustomerAgreement")]
pub enum CustomerAgreement {
    Yes,
    No,
    Partial,
}

impl From<CustomerAgreement> for deal::CustomerAgreement {
    fn from(value: CustomerAgreement) -> Self {
        match value {
            CustomerAgreement::Yes => deal::CustomerAgreement::Yes,
            CustomerAgreement::No => deal::CustomerAgreement::No,
            CustomerAgreement::Partial => deal::CustomerAgreement::Partial,
        }
    }
}

impl From<deal::CustomerAgreement> for CustomerAgreement {
    fn from(value: deal::CustomerAgreement) -> Self {
        match value {
            deal::CustomerAgreement::Yes => CustomerAgreement::Yes,
            deal::CustomerAgreement::No => CustomerAgreement::No,
            deal::CustomerAgreement::Partial => CustomerAgreement::Partial,
        }
    }
}

#[derive(Enum, Copy, Clone, Eq, PartialEq)]
#[graphql(name = "BudgetConfirmed")]
pub enum BudgetConfirmed {
    Yes,
    No,
    EstimateOnly,
}

impl From<BudgetConfirmed> for deal::BudgetConfirmed {
    fn from(value: BudgetConfirmed) -> Self {
        match value {
            BudgetConfirmed::Yes => deal::BudgetConfirmed::Yes,
            BudgetConfirmed::No => deal::BudgetConfirmed::No,
            BudgetConfirmed::EstimateOnly => deal::BudgetConfirmed::EstimateOnly,
        }
    }
}

impl From<deal::BudgetConfirmed> for BudgetConfirmed {
    fn from(value: deal::BudgetConfirmed) -> Self {
        match value {
            deal::BudgetConfirmed::Yes => BudgetConfirmed::Yes,
            deal::BudgetConfirmed::No => BudgetConfirmed::No,
            deal::BudgetConfirmed::EstimateOnly => BudgetConfirmed::EstimateOnly,
        }
    }
}

#[derive(Enum, Copy, Clone, Eq, PartialEq)]
#[graphql(name = "PortalAccess")]
pub enum PortalAccess {
    Invited,
    Approved,
    NotInvited,
}

impl From<PortalAccess> for deal::PortalAccess {
    fn from(value: PortalAccess) -> Self {
        match value {
            PortalAccess::Invited => deal::PortalAccess::Invited,
            PortalAccess::Approved => deal::PortalAccess::Approved,
            PortalAccess::NotInvited => deal::PortalAccess::NotInvited,
        }
    }
}

impl From<deal::PortalAccess> for PortalAccess {
    fn from(value: deal::PortalAccess) -> Self {
        match value {
            deal::PortalAccess::Invited => PortalAccess::Invited,
            deal::PortalAccess::Approved => PortalAccess::Approved,
            deal::PortalAccess::NotInvited => PortalAccess::NotInvited,
        }
    }
}

#[derive(Enum, Copy, Clone, Eq, PartialEq)]
#[graphql(name = "NegotiationStatus")]
pub enum NegotiationStatus {
    Ongoing,
    Finalized,
    Rejected,
    Accepted,
    Dropped,
    NoResponse,
}

impl From<NegotiationStatus> for deal::NegotiationStatus {
    fn from(value: NegotiationStatus) -> Self {
        match value {
            NegotiationStatus::Ongoing => deal::NegotiationStatus::Ongoing,
            NegotiationStatus::Finalized => deal::NegotiationStatus::Finalized,
            NegotiationStatus::Rejected => deal::NegotiationStatus::Rejected,
            NegotiationStatus::Accepted => deal::NegotiationStatus::Accepted,
            NegotiationStatus::Dropped => deal::NegotiationStatus::Dropped,
            NegotiationStatus::NoResponse => deal::NegotiationStatus::NoResponse,
        }
    }
}

impl From<deal::NegotiationStatus> for NegotiationStatus {
    fn from(value: deal::NegotiationStatus) -> Self {
        match value {
            deal::NegotiationStatus::Ongoing => NegotiationStatus::Ongoing,
            deal::NegotiationStatus::Finalized => NegotiationStatus::Finalized,
            deal::NegotiationStatus::Rejected => NegotiationStatus::Rejected,
            deal::NegotiationStatus::Accepted => NegotiationStatus::Accepted,
            deal::NegotiationStatus::Dropped => NegotiationStatus::Dropped,
            deal::NegotiationStatus::NoResponse => NegotiationStatus::NoResponse,
        }
    }
}

#[derive(Enum, Copy, Clone, Eq, PartialEq)]
#[graphql(name = "DealLossReason")]
pub enum DealLossReason {
    Price,
    Competitor,
    NoBudget,
    Timing,
    NoDecision,
    Other,
}

impl From<DealLossReason> for deal::LossReason {
    fn from(value: DealLossReason) -> Self {
        match value {
            DealLossReason::Price => deal::LossReason::Price,
            DealLossReason::Competitor => deal::LossReason::Competitor,
            DealLossReason::NoBudget => deal::LossReason::NoBudget,
            DealLossReason::Timing => deal::LossReason::Timing,
            DealLossReason::NoDecision => deal::LossReason::NoDecision,
            DealLossReason::Other => deal::LossReason::Other,
        }
    }
}

impl From<deal::LossReason> for DealLossReason {
    fn from(value: deal::LossReason) -> Self {
        match value {
            deal::LossReason::Price => DealLossReason::Price,
            deal::LossReason::Competitor => DealLossReason::Competitor,
            deal::LossReason::NoBudget => DealLossReason::NoBudget,
            deal::LossReason::Timing => DealLossReason::Timing,
            deal::LossReason::NoDecision => DealLossReason::NoDecision,
            deal::LossReason::Other => DealLossReason::Other,
        }
    }
}

#[derive(Enum, Copy, Clone, Eq, PartialEq)]
#[graphql(name = "StageCompletion")]
pub enum StageCompletion {
    Complete,
    Partial,
    Incomplete,
}

impl From<pipeline::Completion> for StageCompletion {
    fn from(value: pipeline::Completion) -> Self {
        match value {
            pipeline::Completion::Complete => StageCompletion::Complete,
            pipeline::Completion::Partial => StageCompletion::Partial,
            pipeline::Completion::Incomplete => StageCompletion::Incomplete,
        }
    }
}

#[derive(Enum, Copy, Clone, Eq, PartialEq)]
#[graphql(name = "ActivityTarget")]
pub enum ActivityTarget {
    Contact,
    Lead,
    Meeting,
    Deal,
}

impl ActivityTarget {
    fn as_str(&self) -> &'static str {
        match self {
            ActivityTarget::Contact => "contact",
            ActivityTarget::Lead => "lead",
            ActivityTarget::Meeting => "meeting",
            ActivityTarget::Deal => "deal",
        }
    }
}

#[derive(Enum, Copy, Clone, Eq, PartialEq)]
#[graphql(name = "DealOrder")]
pub enum DealOrder {
    ModifiedDesc,
    CreatedDesc,
    CloseDateAsc,
    AmountDesc,
}

impl Default for DealOrder {
    fn default() -> Self {
        DealOrder::ModifiedDesc
    }
}

// ---------------------------------------------------------------------------
// Inputs
// ---------------------------------------------------------------------------

#[derive(InputObject)]
#[graphql(name = "DealFilter")]
pub struct DealFilter {
    pub stage: Option<DealStage>,
    #[graphql(name = "leadId")]
    pub lead_id: Option<ID>,
    #[graphql(name = "ownerId")]
    pub owner_id: Option<ID>,
    pub q: Option<String>,
}

#[derive(InputObject)]
#[graphql(name = "NewUserInput")]
pub struct NewUserInput {
    pub email: String,
    #[graphql(name = "displayName")]
    pub display_name: String,
    pub password: String,
    pub roles: Vec<String>,
}

#[derive(InputObject)]
#[graphql(name = "UpdateUserInput")]
pub struct UpdateUserInput {
    pub id: ID,
    #[graphql(name = "displayName")]
    pub display_name: Option<String>,
    #[graphql(name = "isActive")]
    pub is_active: Option<bool>,
    pub password: Option<String>,
    pub roles: Option<Vec<String>>,
}

#[derive(InputObject)]
#[graphql(name = "NewContactInput")]
pub struct NewContactInput {
    pub email: String,
    #[graphql(name = "firstName")]
    pub first_name: Option<String>,
    #[graphql(name = "lastName")]
    pub last_name: Option<String>,
    pub phone: Option<String>,
    pub company: Option<String>,
    pub position: Option<String>,
    #[graphql(name = "ownerId")]
    pub owner_id: Option<ID>,
}

#[derive(InputObject)]
#[graphql(name = "UpdateContactInput")]
pub struct UpdateContactInput {
    pub id: ID,
    pub email: Option<String>,
    #[graphql(name = "firstName")]
    pub first_name: Option<String>,
    #[graphql(name = "lastName")]
    pub last_name: Option<String>,
    pub phone: Option<String>,
    pub company: Option<String>,
    pub position: Option<String>,
    #[graphql(name = "ownerId")]
    pub owner_id: Option<ID>,
}

#[derive(InputObject)]
#[graphql(name = "NewLeadInput")]
pub struct NewLeadInput {
    pub name: String,
    pub company: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub source: Option<String>,
    pub notes: Option<String>,
    #[graphql(name = "ownerId")]
    pub owner_id: Option<ID>,
}

#[derive(InputObject)]
#[graphql(name = "UpdateLeadInput")]
pub struct UpdateLeadInput {
    pub id: ID,
    pub name: Option<String>,
    pub company: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub source: Option<String>,
    pub notes: Option<String>,
    #[graphql(name = "ownerId")]
    pub owner_id: Option<ID>,
}

#[derive(InputObject)]
#[graphql(name = "NewMeetingInput")]
pub struct NewMeetingInput {
    pub title: String,
    #[graphql(name = "scheduledAt")]
    pub scheduled_at: DateTime<Utc>,
    pub location: Option<String>,
    pub notes: Option<String>,
    #[graphql(name = "ownerId")]
    pub owner_id: Option<ID>,
}

#[derive(InputObject)]
#[graphql(name = "UpdateMeetingInput")]
pub struct UpdateMeetingInput {
    pub id: ID,
    pub title: Option<String>,
    #[graphql(name = "scheduledAt")]
    pub scheduled_at: Option<DateTime<Utc>>,
    pub location: Option<String>,
    pub notes: Option<String>,
    #[graphql(name = "ownerId")]
    pub owner_id: Option<ID>,
}

#[derive(InputObject)]
#[graphql(name = "NewDealInput")]
pub struct NewDealInput {
    pub title: String,
    pub description: Option<String>,
    #[graphql(name = "amountCents")]
    pub amount_cents: Option<i64>,
    pub currency: Option<String>,
    pub probability: Option<i32>,
    #[graphql(name = "closeDate")]
    pub close_date: Option<NaiveDate>,
    #[graphql(name = "leadId")]
    pub lead_id: Option<ID>,
    #[graphql(name = "meetingId")]
    pub meeting_id: Option<ID>,
    #[graphql(name = "ownerId")]
    pub owner_id: Option<ID>,
}

#[derive(InputObject)]
#[graphql(name = "UpdateDealInput")]
pub struct UpdateDealInput {
    pub id: ID,
    pub title: Option<String>,
    pub description: Option<String>,
    #[graphql(name = "amountCents")]
    pub amount_cents: Option<i64>,
    pub currency: Option<String>,
    pub probability: Option<i32>,
    #[graphql(name = "closeDate")]
    pub close_date: Option<NaiveDate>,
    #[graphql(name = "ownerId")]
    pub owner_id: Option<ID>,
    #[graphql(name = "needIdentified")]
    pub need_identified: Option<bool>,
    #[graphql(name = "needSummary")]
    pub need_summary: Option<String>,
    #[graphql(name = "decisionMakerPresent")]
    pub decision_maker_present: Option<bool>,
    #[graphql(name = "customerAgreement")]
    pub customer_agreement: Option<CustomerAgreement>,
    #[graphql(name = "ndaSigned")]
    pub nda_signed: Option<bool>,
    #[graphql(name = "budgetConfirmed")]
    pub budget_confirmed: Option<BudgetConfirmed>,
    #[graphql(name = "portalAccess")]
    pub portal_access: Option<PortalAccess>,
    #[graphql(name = "timelineStart")]
    pub timeline_start: Option<NaiveDate>,
    #[graphql(name = "timelineEnd")]
    pub timeline_end: Option<NaiveDate>,
    #[graphql(name = "rfqValueCents")]
    pub rfq_value_cents: Option<i64>,
    #[graphql(name = "rfqDocumentUrl")]
    pub rfq_document_url: Option<String>,
    #[graphql(name = "rfqScope")]
    pub rfq_scope: Option<String>,
    #[graphql(name = "proposalSentDate")]
    pub proposal_sent_date: Option<NaiveDate>,
    #[graphql(name = "negotiationStatus")]
    pub negotiation_status: Option<NegotiationStatus>,
    #[graphql(name = "decisionExpectedDate")]
    pub decision_expected_date: Option<NaiveDate>,
    #[graphql(name = "winReason")]
    pub win_reason: Option<String>,
    #[graphql(name = "lossReason")]
    pub loss_reason: Option<DealLossReason>,
    #[graphql(name = "dropReason")]
    pub drop_reason: Option<String>,
}

// ---------------------------------------------------------------------------
// Nodes
// ---------------------------------------------------------------------------

#[derive(SimpleObject)]
#[graphql(name = "User")]
pub struct UserNode {
    pub id: ID,
    pub email: String,
    #[graphql(name = "displayName")]
    pub display_name: String,
    #[graphql(name = "isActive")]
    pub is_active: bool,
    pub roles: Vec<String>,
    #[graphql(name = "createdAt")]
    pub created_at: DateTimeWithTimeZone,
    #[graphql(name = "modifiedAt")]
    pub modified_at: DateTimeWithTimeZone,
}

impl UserNode {
    fn from_parts(model: app_user::Model, roles: Vec<UserRole>) -> Self {
        Self {
            id: ID::from(model.id.to_string()),
            email: model.email,
            display_name: model.display_name,
            is_active: model.is_active,
            roles: roles.iter().map(|r| r.as_str().to_string()).collect(),
            created_at: model.created_at,
            modified_at: model.modified_at,
        }
    }
}

#[derive(SimpleObject)]
#[graphql(name = "AuthPayload")]
pub struct AuthPayload {
    pub ok: bool,
    pub user: Option<UserNode>,
    pub error: Option<String>,
}

impl AuthPayload {
    fn failure(message: &str) -> Self {
        Self {
            ok: false,
            user: None,
            error: Some(message.to_string()),
        }
    }
}

#[derive(SimpleObject)]
#[graphql(name = "MePayload")]
pub struct MePayload {
    pub user: UserNode,
}

#[derive(SimpleObject)]
#[graphql(name = "Contact")]
pub struct ContactNode {
    pub id: ID,
    pub email: String,
    #[graphql(name = "firstName")]
    pub first_name: Option<String>,
    #[graphql(name = "lastName")]
    pub last_name: Option<String>,
    pub phone: Option<String>,
    pub company: Option<String>,
    pub position: Option<String>,
    #[graphql(name = "ownerId")]
    pub owner_id: Option<ID>,
    #[graphql(name = "createdAt")]
    pub created_at: DateTimeWithTimeZone,
    #[graphql(name = "modifiedAt")]
    pub modified_at: DateTimeWithTimeZone,
}

impl From<contact::Model> for ContactNode {
    fn from(model: contact::Model) -> Self {
        Self {
            id: ID::from(model.id.to_string()),
            email: model.email,
            first_name: model.first_name,
            last_name: model.last_name,
            phone: model.phone,
            company: model.company,
            position: model.position,
            owner_id: model.owner_id.map(|id| ID::from(id.to_string())),
            created_at: model.created_at,
            modified_at: model.modified_at,
        }
    }
}

#[derive(SimpleObject)]
#[graphql(name = "Lead")]
pub struct LeadNode {
    pub id: ID,
    pub name: String,
    pub company: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub source: Option<String>,
    pub notes: Option<String>,
    #[graphql(name = "ownerId")]
    pub owner_id: Option<ID>,
    #[graphql(name = "createdAt")]
    pub created_at: DateTimeWithTimeZone,
    #[graphql(name = "modifiedAt")]
    pub modified_at: DateTimeWithTimeZone,
}

impl From<lead::Model> for LeadNode {
    fn from(model: lead::Model) -> Self {
        Self {
            id: ID::from(model.id.to_string()),
            name: model.name,
            company: model.company,
            email: model.email,
            phone: model.phone,
            source: model.source,
            notes: model.notes,
            owner_id: model.owner_id.map(|id| ID::from(id.to_string())),
            created_at: model.created_at,
            modified_at: model.modified_at,
        }
    }
}

#[derive(SimpleObject)]
#[graphql(name = "Meeting")]
pub struct MeetingNode {
    pub id: ID,
    pub title: String,
    #[graphql(name = "scheduledAt")]
    pub scheduled_at: DateTimeWithTimeZone,
    pub location: Option<String>,
    pub notes: Option<String>,
    #[graphql(name = "ownerId")]
    pub owner_id: Option<ID>,
    #[graphql(name = "createdAt")]
    pub created_at: DateTimeWithTimeZone,
    #[graphql(name = "modifiedAt")]
    pub modified_at: DateTimeWithTimeZone,
}

impl From<meeting::Model> for MeetingNode {
    fn from(model: meeting::Model) -> Self {
        Self {
            id: ID::from(model.id.to_string()),
            title: model.title,
            scheduled_at: model.scheduled_at,
            location: model.location,
            notes: model.notes,
            owner_id: model.owner_id.map(|id| ID::from(id.to_string())),
            created_at: model.created_at,
            modified_at: model.modified_at,
        }
    }
}

#[derive(SimpleObject)]
#[graphql(name = "Deal", complex)]
pub struct DealNode {
    pub id: ID,
    pub title: String,
    pub description: Option<String>,
    pub stage: DealStage,
    #[graphql(name = "stageDisplayName")]
    pub stage_display_name: String,
    #[graphql(name = "amountCents")]
    pub amount_cents: Option<i64>,
    pub currency: Option<String>,
    pub probability: Option<i32>,
    #[graphql(name = "closeDate")]
    pub close_date: Option<NaiveDate>,
    #[graphql(name = "leadId")]
    pub lead_id: Option<ID>,
    #[graphql(name = "meetingId")]
    pub meeting_id: Option<ID>,
    #[graphql(name = "ownerId")]
    pub owner_id: Option<ID>,
    #[graphql(name = "needIdentified")]
    pub need_identified: Option<bool>,
    #[graphql(name = "needSummary")]
    pub need_summary: Option<String>,
    #[graphql(name = "decisionMakerPresent")]
    pub decision_maker_present: Option<bool>,
    #[graphql(name = "customerAgreement")]
    pub customer_agreement: Option<CustomerAgreement>,
    #[graphql(name = "ndaSigned")]
    pub nda_signed: Option<bool>,
    #[graphql(name = "budgetConfirmed")]
    pub budget_confirmed: Option<BudgetConfirmed>,
    #[graphql(name = "portalAccess")]
    pub portal_access: Option<PortalAccess>,
    #[graphql(name = "timelineStart")]
    pub timeline_start: Option<NaiveDate>,
    #[graphql(name = "timelineEnd")]
    pub timeline_end: Option<NaiveDate>,
    #[graphql(name = "rfqValueCents")]
    pub rfq_value_cents: Option<i64>,
    #[graphql(name = "rfqDocumentUrl")]
    pub rfq_document_url: Option<String>,
    #[graphql(name = "rfqScope")]
    pub rfq_scope: Option<String>,
    #[graphql(name = "proposalSentDate")]
    pub proposal_sent_date: Option<NaiveDate>,
    #[graphql(name = "negotiationStatus")]
    pub negotiation_status: Option<NegotiationStatus>,
    #[graphql(name = "decisionExpectedDate")]
    pub decision_expected_date: Option<NaiveDate>,
    #[graphql(name = "winReason")]
    pub win_reason: Option<String>,
    #[graphql(name = "lossReason")]
    pub loss_reason: Option<DealLossReason>,
    #[graphql(name = "dropReason")]
    pub drop_reason: Option<String>,
    pub completion: StageCompletion,
    #[graphql(name = "missingRequirements")]
    pub missing_requirements: Vec<String>,
    #[graphql(name = "canAdvance")]
    pub can_advance: bool,
    #[graphql(name = "isTerminal")]
    pub is_terminal: bool,
    #[graphql(name = "createdAt")]
    pub created_at: DateTimeWithTimeZone,
    #[graphql(name = "modifiedAt")]
    pub modified_at: DateTimeWithTimeZone,
}

impl From<deal::Model> for DealNode {
    fn from(model: deal::Model) -> Self {
        let completion = StageCompletion::from(pipeline::classify(&model));
        let missing_requirements: Vec<String> = pipeline::missing_requirements(&model)
            .into_iter()
            .map(str::to_string)
            .collect();
        let next = pipeline::next_after(model.stage);
        let can_advance = pipeline::can_move_to_stage(&model, next);
        let is_terminal = pipeline::is_terminal(model.stage);
        Self {
            id: ID::from(model.id.to_string()),
            title: model.title,
            description: model.description,
            stage: DealStage::from(model.stage),
            stage_display_name: pipeline::display_name(model.stage).to_string(),
            amount_cents: model.amount_cents,
            currency: model.currency,
            probability: model.probability.map(i32::from),
            close_date: model.close_date,
            lead_id: model.lead_id.map(|id| ID::from(id.to_string())),
            meeting_id: model.meeting_id.map(|id| ID::from(id.to_string())),
            owner_id: model.owner_id.map(|id| ID::from(id.to_string())),
            need_identified: model.need_identified,
            need_summary: model.need_summary,
            decision_maker_present: model.decision_maker_present,
            customer_agreement: model.customer_agreement.map(Into::into),
            nda_signed: model.nda_signed,
            budget_confirmed: model.budget_confirmed.map(Into::into),
            portal_access: model.portal_access.map(Into::into),
            timeline_start: model.timeline_start,
            timeline_end: model.timeline_end,
            rfq_value_cents: model.rfq_value_cents,
            rfq_document_url: model.rfq_document_url,
            rfq_scope: model.rfq_scope,
            proposal_sent_date: model.proposal_sent_date,
            negotiation_status: model.negotiation_status.map(Into::into),
            decision_expected_date: model.decision_expected_date,
            win_reason: model.win_reason,
            loss_reason: model.loss_reason.map(Into::into),
            drop_reason: model.drop_reason,
            completion,
            missing_requirements,
            can_advance,
            is_terminal,
            created_at: model.created_at,
            modified_at: model.modified_at,
        }
    }
}

#[ComplexObject]
impl DealNode {
    async fn lead(&self, ctx: &Context<'_>) -> async_graphql::Result<Option<LeadNode>> {
        let Some(lead_id) = &self.lead_id else {
            return Ok(None);
        };
        let db = database(ctx)?;
        let lead_id = parse_uuid(lead_id)?;
        let row = lead::Entity::find_by_id(lead_id)
            .one(db.as_ref())
            .await
            .map_err(db_error)?;
        if row.is_none() {
            tracing::warn!(deal = %self.id.as_str(), lead = %lead_id, "deal references a missing lead");
        }
        Ok(row.map(LeadNode::from))
    }

    async fn meeting(&self, ctx: &Context<'_>) -> async_graphql::Result<Option<MeetingNode>> {
        let Some(meeting_id) = &self.meeting_id else {
            return Ok(None);
        };
        let db = database(ctx)?;
        let meeting_id = parse_uuid(meeting_id)?;
        let row = meeting::Entity::find_by_id(meeting_id)
            .one(db.as_ref())
            .await
            .map_err(db_error)?;
        if row.is_none() {
            tracing::warn!(deal = %self.id.as_str(), meeting = %meeting_id, "deal references a missing meeting");
        }
        Ok(row.map(MeetingNode::from))
    }
}

#[derive(SimpleObject)]
#[graphql(name = "PipelineStage")]
pub struct PipelineStageNode {
    pub key: DealStage,
    #[graphql(name = "displayName")]
    pub display_name: String,
    #[graphql(name = "sortOrder")]
    pub sort_order: i32,
    #[graphql(name = "isTerminal")]
    pub is_terminal: bool,
    pub requirements: Vec<String>,
}

impl From<deal::Stage> for PipelineStageNode {
    fn from(stage: deal::Stage) -> Self {
        Self {
            key: DealStage::from(stage),
            display_name: pipeline::display_name(stage).to_string(),
            sort_order: pipeline::index_of(stage) as i32,
            is_terminal: pipeline::is_terminal(stage),
            requirements: pipeline::requirements_for(stage)
                .iter()
                .map(|req| req.label.to_string())
                .collect(),
        }
    }
}

#[derive(SimpleObject)]
#[graphql(name = "PipelineCard")]
pub struct PipelineCard {
    pub id: ID,
    pub title: String,
    #[graphql(name = "amountCents")]
    pub amount_cents: Option<i64>,
    pub currency: Option<String>,
    pub probability: Option<i32>,
    #[graphql(name = "closeDate")]
    pub close_date: Option<NaiveDate>,
    #[graphql(name = "ownerId")]
    pub owner_id: Option<ID>,
    pub completion: StageCompletion,
    #[graphql(name = "canAdvance")]
    pub can_advance: bool,
    #[graphql(name = "modifiedAt")]
    pub modified_at: DateTimeWithTimeZone,
}

impl From<deal::Model> for PipelineCard {
    fn from(model: deal::Model) -> Self {
        let completion = StageCompletion::from(pipeline::classify(&model));
        let can_advance = pipeline::can_move_to_stage(&model, pipeline::next_after(model.stage));
        Self {
            id: ID::from(model.id.to_string()),
            title: model.title,
            amount_cents: model.amount_cents,
            currency: model.currency,
            probability: model.probability.map(i32::from),
            close_date: model.close_date,
            owner_id: model.owner_id.map(|id| ID::from(id.to_string())),
            completion,
            can_advance,
            modified_at: model.modified_at,
        }
    }
}

#[derive(SimpleObject)]
#[graphql(name = "PipelineColumn")]
pub struct PipelineColumn {
    pub stage: PipelineStageNode,
    #[graphql(name = "totalCount")]
    pub total_count: i32,
    #[graphql(name = "totalAmountCents")]
    pub total_amount_cents: i64,
    #[graphql(name = "readyCount")]
    pub ready_count: i32,
    #[graphql(name = "readyRatio")]
    pub ready_ratio: f64,
    pub deals: Vec<PipelineCard>,
}

#[derive(SimpleObject)]
#[graphql(name = "PipelineBoard")]
pub struct PipelineBoard {
    pub columns: Vec<PipelineColumn>,
}

#[derive(SimpleObject)]
#[graphql(name = "StageHistoryEntry")]
pub struct StageHistoryNode {
    pub id: ID,
    #[graphql(name = "dealId")]
    pub deal_id: ID,
    #[graphql(name = "fromStage")]
    pub from_stage: Option<DealStage>,
    #[graphql(name = "toStage")]
    pub to_stage: DealStage,
    #[graphql(name = "changedAt")]
    pub changed_at: DateTimeWithTimeZone,
    pub note: Option<String>,
    #[graphql(name = "changedBy")]
    pub changed_by: Option<ID>,
}

impl From<deal_stage_history::Model> for StageHistoryNode {
    fn from(model: deal_stage_history::Model) -> Self {
        Self {
            id: ID::from(model.id.to_string()),
            deal_id: ID::from(model.deal_id.to_string()),
            from_stage: model.from_stage.map(Into::into),
            to_stage: model.to_stage.into(),
            changed_at: model.changed_at,
            note: model.note,
            changed_by: model.changed_by.map(|id| ID::from(id.to_string())),
        }
    }
}

#[derive(SimpleObject)]
#[graphql(name = "Activity")]
pub struct ActivityNode {
    pub id: ID,
    #[graphql(name = "entityType")]
    pub entity_type: String,
    #[graphql(name = "entityId")]
    pub entity_id: ID,
    pub kind: String,
    pub subject: Option<String>,
    #[graphql(name = "bodyMd")]
    pub body_md: Option<String>,
    #[graphql(name = "metaJson")]
    pub meta_json: String,
    #[graphql(name = "createdAt")]
    pub created_at: DateTimeWithTimeZone,
    #[graphql(name = "createdBy")]
    pub created_by: Option<ID>,
}

impl From<activity::Model> for ActivityNode {
    fn from(model: activity::Model) -> Self {
        Self {
            id: ID::from(model.id.to_string()),
            entity_type: model.entity_type,
            entity_id: ID::from(model.entity_id.to_string()),
            kind: activity_kind_str(model.kind).to_string(),
            subject: model.subject,
            body_md: model.body_md,
            meta_json: model.meta_json.to_string(),
            created_at: model.created_at,
            created_by: model.created_by.map(|id| ID::from(id.to_string())),
        }
    }
}

fn activity_kind_str(kind: activity::Kind) -> &'static str {
    match kind {
        activity::Kind::Created => "created",
        activity::Kind::StageChange => "stage_change",
        activity::Kind::Converted => "converted",
        activity::Kind::Deleted => "deleted",
    }
}

// ---------------------------------------------------------------------------
// Stage move internals
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub enum StageMoveError {
    NotFound,
    Incomplete { missing: Vec<&'static str> },
    MissingLossReason,
    MissingDropReason,
    Db(DbErr),
}

impl From<DbErr> for StageMoveError {
    fn from(err: DbErr) -> Self {
        StageMoveError::Db(err)
    }
}

fn stage_move_error(err: StageMoveError) -> Error {
    match err {
        StageMoveError::NotFound => error_with_code("NOT_FOUND", "Deal not found"),
        StageMoveError::Incomplete { missing } => error_with_code(
            "STAGE_INCOMPLETE",
            format!(
                "Current stage requirements are not met: {}",
                missing.join(", ")
            ),
        ),
        StageMoveError::MissingLossReason => {
            validation_error("lossReason is required when moving a deal to Lost")
        }
        StageMoveError::MissingDropReason => {
            validation_error("dropReason is required when moving a deal to Dropped")
        }
        StageMoveError::Db(err) => db_error(err),
    }
}

/// Applies a stage transition inside one transaction: gate check, deal update,
/// history row, activity row. A move to the deal's current stage returns the
/// deal unchanged and writes nothing.
#[allow(clippy::too_many_arguments)]
pub async fn move_deal_stage_internal(
    db: &DatabaseConnection,
    deal_id: Uuid,
    target: deal::Stage,
    note: Option<String>,
    win_reason: Option<String>,
    loss_reason: Option<deal::LossReason>,
    drop_reason: Option<String>,
    actor: Option<Uuid>,
) -> Result<deal::Model, StageMoveError> {
    let Some(existing) = deal::Entity::find_by_id(deal_id).one(db).await? else {
        return Err(StageMoveError::NotFound);
    };

    if existing.stage == target {
        return Ok(existing);
    }
    if !pipeline::can_move_to_stage(&existing, target) {
        return Err(StageMoveError::Incomplete {
            missing: pipeline::missing_requirements(&existing),
        });
    }

    let loss_reason = loss_reason.or(existing.loss_reason);
    let drop_reason = drop_reason.or_else(|| {
        existing
            .drop_reason
            .clone()
            .filter(|r| !r.trim().is_empty())
    });
    match target {
        deal::Stage::Lost if loss_reason.is_none() => {
            return Err(StageMoveError::MissingLossReason);
        }
        deal::Stage::Dropped if drop_reason.is_none() => {
            return Err(StageMoveError::MissingDropReason);
        }
        _ => {}
    }

    let from_stage = existing.stage;
    let now: DateTimeWithTimeZone = Utc::now().into();

    let txn = db.begin().await?;

    let mut active: deal::ActiveModel = existing.into();
    active.stage = Set(target);
    match target {
        deal::Stage::Won => {
            if let Some(win_reason) = win_reason {
                active.win_reason = Set(Some(win_reason));
            }
        }
        deal::Stage::Lost => {
            active.loss_reason = Set(loss_reason);
        }
        deal::Stage::Dropped => {
            active.drop_reason = Set(drop_reason);
        }
        _ => {}
    }
    active.modified_by = Set(actor);
    active.modified_at = Set(now);
    let updated = active.update(&txn).await?;

    let history = deal_stage_history::ActiveModel {
        id: Set(Uuid::new_v4()),
        deal_id: Set(deal_id),
        from_stage: Set(Some(from_stage)),
        to_stage: Set(target),
        changed_at: Set(now),
        note: Set(note),
        changed_by: Set(actor),
    };
    deal_stage_history::Entity::insert(history)
        .exec_without_returning(&txn)
        .await?;

    record_activity(
        &txn,
        "deal",
        deal_id,
        activity::Kind::StageChange,
        Some(format!(
            "Moved deal to {}",
            pipeline::display_name(target)
        )),
        None,
        json!({
            "from": pipeline::display_name(from_stage),
            "to": pipeline::display_name(target),
        }),
        actor,
        now,
    )
    .await?;

    txn.commit().await?;
    Ok(updated)
}

fn select_stage_sequence(
    requested: Option<&Vec<DealStage>>,
) -> async_graphql::Result<Vec<deal::Stage>> {
    let Some(keys) = requested else {
        return Ok(pipeline::STAGES.to_vec());
    };
    if keys.is_empty() {
        return Err(validation_error("stageKeys must contain at least one value"));
    }
    let wanted: HashSet<deal::Stage> = keys.iter().map(|key| deal::Stage::from(*key)).collect();
    Ok(pipeline::STAGES
        .iter()
        .copied()
        .filter(|stage| wanted.contains(stage))
        .collect())
}

#[allow(clippy::too_many_arguments)]
async fn record_activity<C>(
    conn: &C,
    entity_type: &str,
    entity_id: Uuid,
    kind: activity::Kind,
    subject: Option<String>,
    body_md: Option<String>,
    meta: serde_json::Value,
    actor: Option<Uuid>,
    at: DateTimeWithTimeZone,
) -> Result<(), DbErr>
where
    C: ConnectionTrait,
{
    let row = activity::ActiveModel {
        id: Set(Uuid::new_v4()),
        entity_type: Set(entity_type.to_string()),
        entity_id: Set(entity_id),
        kind: Set(kind),
        subject: Set(subject),
        body_md: Set(body_md),
        meta_json: Set(meta),
        created_at: Set(at),
        created_by: Set(actor),
    };
    activity::Entity::insert(row)
        .exec_without_returning(conn)
        .await?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Context and error helpers
// ---------------------------------------------------------------------------

fn database(ctx: &Context<'_>) -> async_graphql::Result<Arc<DatabaseConnection>> {
    ctx.data::<Arc<DatabaseConnection>>()
        .cloned()
        .map_err(|_| error_with_code("INTERNAL", "Database connection missing"))
}

fn auth_config(ctx: &Context<'_>) -> async_graphql::Result<Arc<AuthConfig>> {
    ctx.data::<Arc<AuthConfig>>()
        .cloned()
        .map_err(|_| error_with_code("INTERNAL", "Auth configuration missing"))
}

fn current_user(ctx: &Context<'_>) -> Option<CurrentUser> {
    ctx.data_opt::<CurrentUser>().cloned()
}

fn require_viewer(ctx: &Context<'_>) -> async_graphql::Result<CurrentUser> {
    require_role(ctx, UserRole::Viewer)
}

fn require_role(ctx: &Context<'_>, role: UserRole) -> async_graphql::Result<CurrentUser> {
    let Some(user) = current_user(ctx) else {
        return Err(error_with_code("UNAUTHENTICATED", "Authentication required"));
    };
    if !user.has_role(role) {
        return Err(error_with_code(
            "FORBIDDEN",
            format!("Requires the {} role", role.as_str()),
        ));
    }
    Ok(user)
}

fn error_with_code(code: &'static str, message: impl Into<String>) -> Error {
    Error::new(message.into()).extend_with(|_, e| e.set("code", code))
}

fn validation_error(message: impl Into<String>) -> Error {
    error_with_code("VALIDATION", message)
}

fn db_error(err: DbErr) -> Error {
    tracing::error!(error = %err, "database operation failed");
    error_with_code("INTERNAL", "Database operation failed")
}

fn parse_uuid(id: &ID) -> async_graphql::Result<Uuid> {
    Uuid::parse_str(id.as_str()).map_err(|_| validation_error("Invalid ID"))
}

fn parse_optional_id(field: &str, id: &Option<ID>) -> async_graphql::Result<Option<Uuid>> {
    match id {
        Some(id) => Uuid::parse_str(id.as_str())
            .map(Some)
            .map_err(|_| validation_error(format!("Invalid {}", field))),
        None => Ok(None),
    }
}

fn sanitize_optional_filter(q: Option<String>) -> async_graphql::Result<Option<String>> {
    match q {
        Some(raw) => {
            let trimmed = raw.trim();
            if trimmed.is_empty() {
                return Ok(None);
            }
            if trimmed.len() > 200 {
                return Err(validation_error("Search term is too long"));
            }
            Ok(Some(trimmed.to_string()))
        }
        None => Ok(None),
    }
}

fn sanitize_optional_text(
    field: &str,
    value: Option<String>,
    max: usize,
) -> async_graphql::Result<Option<String>> {
    match value {
        Some(raw) => {
            let trimmed = raw.trim();
            if trimmed.is_empty() {
                return Ok(None);
            }
            validate_length(field, trimmed, max)?;
            Ok(Some(trimmed.to_string()))
        }
        None => Ok(None),
    }
}

fn validate_required_text(field: &str, value: &str, max: usize) -> async_graphql::Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(validation_error(format!("{} must not be empty", field)));
    }
    validate_length(field, trimmed, max)?;
    Ok(trimmed.to_string())
}

fn validate_length(field: &str, value: &str, max: usize) -> async_graphql::Result<()> {
    if value.chars().count() > max {
        return Err(validation_error(format!(
            "{} must be at most {} characters",
            field, max
        )));
    }
    Ok(())
}

fn normalize_email(email: &str) -> async_graphql::Result<String> {
    let trimmed = email.trim().to_lowercase();
    if trimmed.len() < 3 || !trimmed.contains('@') || trimmed.len() > 320 {
        return Err(validation_error("Invalid email address"));
    }
    Ok(trimmed)
}

fn validate_display_name(name: &str) -> async_graphql::Result<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(validation_error("displayName must not be empty"));
    }
    validate_length("displayName", trimmed, 128)?;
    Ok(trimmed.to_string())
}

fn validate_password(password: &str) -> async_graphql::Result<()> {
    if password.len() < 8 {
        return Err(validation_error("password must be at least 8 characters"));
    }
    Ok(())
}

fn validate_probability(value: Option<i32>) -> async_graphql::Result<Option<i16>> {
    match value {
        Some(p) if !(0..=100).contains(&p) => {
            Err(validation_error("probability must be between 0 and 100"))
        }
        Some(p) => Ok(Some(p as i16)),
        None => Ok(None),
    }
}

fn validate_amount(value: Option<i64>) -> async_graphql::Result<Option<i64>> {
    match value {
        Some(v) if v < 0 => Err(validation_error("Amounts must not be negative")),
        other => Ok(other),
    }
}

fn validate_currency(value: Option<String>) -> async_graphql::Result<Option<String>> {
    match value {
        Some(raw) => {
            let trimmed = raw.trim().to_uppercase();
            if trimmed.len() != 3 || !trimmed.chars().all(|c| c.is_ascii_alphabetic()) {
                return Err(validation_error("currency must be a 3-letter code"));
            }
            Ok(Some(trimmed))
        }
        None => Ok(None),
    }
}

fn parse_roles(raw: &[String]) -> async_graphql::Result<Vec<UserRole>> {
    if raw.is_empty() {
        return Err(validation_error("At least one role is required"));
    }
    let mut roles = Vec::with_capacity(raw.len());
    for value in raw {
        let Some(role) = UserRole::from_str(value) else {
            return Err(validation_error(format!("Unknown role: {}", value)));
        };
        if !roles.contains(&role) {
            roles.push(role);
        }
    }
    Ok(roles)
}

async fn load_roles(db: &DatabaseConnection, user_id: Uuid) -> async_graphql::Result<Vec<UserRole>> {
    let rows = user_role::Entity::find()
        .filter(user_role::Column::UserId.eq(user_id))
        .all(db)
        .await
        .map_err(db_error)?;
    Ok(rows.into_iter().map(|row| UserRole::from(row.role)).collect())
}

async fn load_roles_for_users(
    db: &DatabaseConnection,
    user_ids: impl Iterator<Item = Uuid>,
) -> async_graphql::Result<HashMap<Uuid, Vec<UserRole>>> {
    let ids: Vec<Uuid> = user_ids.collect();
    if ids.is_empty() {
        return Ok(HashMap::new());
    }
    let rows = user_role::Entity::find()
        .filter(user_role::Column::UserId.is_in(ids))
        .all(db)
        .await
        .map_err(db_error)?;
    let mut map: HashMap<Uuid, Vec<UserRole>> = HashMap::new();
    for row in rows {
        map.entry(row.user_id)
            .or_default()
            .push(UserRole::from(row.role));
    }
    Ok(map)
}

async fn insert_roles<C>(conn: &C, user_id: Uuid, roles: &[UserRole]) -> Result<(), DbErr>
where
    C: ConnectionTrait,
{
    for role in roles {
        let row = user_role::ActiveModel {
            user_id: Set(user_id),
            role: Set(entity::user_role::Role::from(*role)),
        };
        user_role::Entity::insert(row)
            .exec_without_returning(conn)
            .await?;
    }
    Ok(())
}

async fn load_user_with_roles(
    db: &DatabaseConnection,
    user_id: Uuid,
) -> async_graphql::Result<(app_user::Model, Vec<UserRole>)> {
    let Some(user) = app_user::Entity::find_by_id(user_id)
        .one(db)
        .await
        .map_err(db_error)?
    else {
        return Err(error_with_code("UNAUTHENTICATED", "Session user no longer exists"));
    };
    if !user.is_active {
        return Err(error_with_code("FORBIDDEN", "Account is disabled"));
    }
    let roles = load_roles(db, user.id).await?;
    Ok((user, roles))
}

async fn ensure_active_user(db: &DatabaseConnection, user_id: Uuid) -> async_graphql::Result<Uuid> {
    let Some(user) = app_user::Entity::find_by_id(user_id)
        .one(db)
        .await
        .map_err(db_error)?
    else {
        return Err(error_with_code("NOT_FOUND", "User not found"));
    };
    if !user.is_active {
        return Err(validation_error("User is inactive"));
    }
    Ok(user.id)
}

async fn resolve_owner(
    ctx: &Context<'_>,
    owner_id: &Option<ID>,
) -> async_graphql::Result<Option<Uuid>> {
    let Some(owner_id) = parse_optional_id("ownerId", owner_id)? else {
        return Ok(None);
    };
    let db = database(ctx)?;
    Ok(Some(ensure_active_user(db.as_ref(), owner_id).await?))
}

async fn ensure_lead_exists(db: &DatabaseConnection, lead_id: Uuid) -> async_graphql::Result<()> {
    let found = lead::Entity::find_by_id(lead_id)
        .one(db)
        .await
        .map_err(db_error)?;
    if found.is_none() {
        return Err(validation_error("leadId does not reference an existing lead"));
    }
    Ok(())
}

async fn ensure_meeting_exists(
    db: &DatabaseConnection,
    meeting_id: Uuid,
) -> async_graphql::Result<()> {
    let found = meeting::Entity::find_by_id(meeting_id)
        .one(db)
        .await
        .map_err(db_error)?;
    if found.is_none() {
        return Err(validation_error(
            "meetingId does not reference an existing meeting",
        ));
    }
    Ok(())
}

fn contact_display_name(model: &contact::Model) -> String {
    let full = format!(
        "{} {}",
        model.first_name.clone().unwrap_or_default(),
        model.last_name.clone().unwrap_or_default()
    );
    let trimmed = full.trim();
    if trimmed.is_empty() {
        model.email.clone()
    } else {
        trimmed.to_string()
    }
}

fn enforce_page_limit(limit: i32, max: i32, noun: &str) -> async_graphql::Result<u64> {
    if limit <= 0 {
        return Err(validation_error("first must be positive"));
    }
    if limit > max {
        return Err(error_with_code(
            "LIMIT_EXCEEDED",
            format!("Cannot request more than {} {} at once", max, noun),
        ));
    }
    Ok(limit as u64)
}

fn append_session_cookie(ctx: &Context<'_>, token: &str, ttl_minutes: i64) {
    let cookie = if ttl_minutes < 0 {
        format!(
            "{}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0",
            SESSION_COOKIE
        )
    } else {
        format!(
            "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
            SESSION_COOKIE,
            token,
            ttl_minutes * 60
        )
    };
    ctx.append_http_header("Set-Cookie", cookie);
}

pub fn hash_password(password: &str) -> Result<String, DbErr> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|err| DbErr::Custom(format!("password hashing failed: {err}")))
}

fn verify_password(password: &str, stored_hash: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(stored_hash) else {
        return false;
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

// ---------------------------------------------------------------------------
// Demo seed
// ---------------------------------------------------------------------------

pub struct SeededUsers {
    pub admin: Uuid,
    pub sales: Uuid,
    pub viewer: Uuid,
}

pub struct SeededCrmRecords {
    pub users: SeededUsers,
    pub contacts: Vec<Uuid>,
    pub leads: Vec<Uuid>,
    pub meetings: Vec<Uuid>,
    pub deals: Vec<Uuid>,
}

/// Inserts a small demo dataset: three users (one per role), a handful of CRM
/// records and deals spread across the pipeline, including closed deals with
/// stage history. Intended for local development and the seed CLI command.
pub async fn seed_crm_demo(db: &DatabaseConnection) -> Result<SeededCrmRecords, DbErr> {
    let now: DateTimeWithTimeZone = Utc::now().into();

    let admin_id = insert_seed_user(db, "admin@anvil.test", "Avery Admin", "adminpass", &[UserRole::Admin], now).await?;
    let sales_id = insert_seed_user(db, "sales@anvil.test", "Sana Sales", "salespass", &[UserRole::Sales], now).await?;
    let viewer_id = insert_seed_user(db, "viewer@anvil.test", "Vik Viewer", "viewerpass", &[UserRole::Viewer], now).await?;

    let contact_rows = [
        ("mira.holt@norse-industries.test", Some("Mira"), Some("Holt"), Some("Norse Industries"), Some("Procurement Lead")),
        ("jonas.keller@balticforge.test", Some("Jonas"), Some("Keller"), Some("Baltic Forge"), Some("Plant Manager")),
        ("elin.sparre@aerotek.test", Some("Elin"), Some("Sparre"), Some("AeroTek"), Some("Supply Chain Director")),
    ];
    let mut contacts = Vec::new();
    for (email, first, last, company, position) in contact_rows {
        let model = contact::ActiveModel {
            id: Set(Uuid::new_v4()),
            email: Set(email.to_string()),
            first_name: Set(first.map(str::to_string)),
            last_name: Set(last.map(str::to_string)),
            phone: Set(None),
            company: Set(company.map(str::to_string)),
            position: Set(position.map(str::to_string)),
            owner_id: Set(Some(sales_id)),
            created_by: Set(Some(admin_id)),
            modified_by: Set(Some(admin_id)),
            created_at: Set(now),
            modified_at: Set(now),
        }
        .insert(db)
        .await?;
        contacts.push(model.id);
    }

    let lead_rows = [
        ("Delta Machining", Some("Delta Machining AB"), Some("website")),
        ("Polar Fab", Some("Polar Fab Oy"), Some("referral")),
        ("Quill Robotics", Some("Quill Robotics GmbH"), Some("tradeshow")),
    ];
    let mut leads = Vec::new();
    for (name, company, source) in lead_rows {
        let model = lead::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(name.to_string()),
            company: Set(company.map(str::to_string)),
            email: Set(None),
            phone: Set(None),
            source: Set(source.map(str::to_string)),
            notes: Set(None),
            owner_id: Set(Some(sales_id)),
            created_by: Set(Some(sales_id)),
            modified_by: Set(Some(sales_id)),
            created_at: Set(now),
            modified_at: Set(now),
        }
        .insert(db)
        .await?;
        leads.push(model.id);
    }

    let meeting_rows = [
        ("Norse intro call", Some("Video")),
        ("AeroTek plant visit", Some("Linköping")),
    ];
    let mut meetings = Vec::new();
    for (title, location) in meeting_rows {
        let model = meeting::ActiveModel {
            id: Set(Uuid::new_v4()),
            title: Set(title.to_string()),
            scheduled_at: Set(now),
            location: Set(location.map(str::to_string)),
            notes: Set(None),
            owner_id: Set(Some(sales_id)),
            created_by: Set(Some(sales_id)),
            modified_by: Set(Some(sales_id)),
            created_at: Set(now),
            modified_at: Set(now),
        }
        .insert(db)
        .await?;
        meetings.push(model.id);
    }

    let mut deals = Vec::new();

    // Discussions, all requirements met.
    let norse = deal::ActiveModel {
        id: Set(Uuid::new_v4()),
        title: Set("Norse conveyor refit".to_string()),
        description: Set(Some("Replace the line 2 conveyor drives".to_string())),
        stage: Set(deal::Stage::Discussions),
        amount_cents: Set(Some(4_200_000)),
        currency: Set(Some("EUR".to_string())),
        probability: Set(Some(40)),
        lead_id: Set(Some(leads[0])),
        meeting_id: Set(Some(meetings[0])),
        owner_id: Set(Some(sales_id)),
        need_identified: Set(Some(true)),
        need_summary: Set(Some("Drive units past service life".to_string())),
        decision_maker_present: Set(Some(true)),
        customer_agreement: Set(Some(deal::CustomerAgreement::Yes)),
        created_by: Set(Some(sales_id)),
        modified_by: Set(Some(sales_id)),
        created_at: Set(now),
        modified_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await?;
    deals.push(norse.id);

    // Discussions, only one requirement met.
    let baltic = deal::ActiveModel {
        id: Set(Uuid::new_v4()),
        title: Set("Baltic Forge tooling".to_string()),
        stage: Set(deal::Stage::Discussions),
        amount_cents: Set(Some(950_000)),
        currency: Set(Some("EUR".to_string())),
        need_identified: Set(Some(true)),
        owner_id: Set(Some(sales_id)),
        created_by: Set(Some(sales_id)),
        modified_by: Set(Some(sales_id)),
        created_at: Set(now),
        modified_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await?;
    deals.push(baltic.id);

    // Qualified with the stage fully answered.
    let aerotek = deal::ActiveModel {
        id: Set(Uuid::new_v4()),
        title: Set("AeroTek bracket program".to_string()),
        stage: Set(deal::Stage::Qualified),
        amount_cents: Set(Some(12_500_000)),
        currency: Set(Some("EUR".to_string())),
        probability: Set(Some(55)),
        meeting_id: Set(Some(meetings[1])),
        owner_id: Set(Some(sales_id)),
        need_identified: Set(Some(true)),
        need_summary: Set(Some("Volume brackets for the new airframe".to_string())),
        decision_maker_present: Set(Some(true)),
        customer_agreement: Set(Some(deal::CustomerAgreement::Yes)),
        nda_signed: Set(Some(true)),
        budget_confirmed: Set(Some(deal::BudgetConfirmed::Yes)),
        portal_access: Set(Some(deal::PortalAccess::Approved)),
        timeline_start: Set(chrono::NaiveDate::from_ymd_opt(2026, 9, 1)),
        timeline_end: Set(chrono::NaiveDate::from_ymd_opt(2027, 3, 31)),
        created_by: Set(Some(sales_id)),
        modified_by: Set(Some(sales_id)),
        created_at: Set(now),
        modified_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await?;
    deals.push(aerotek.id);

    // RFQ ready to be offered.
    let polar = deal::ActiveModel {
        id: Set(Uuid::new_v4()),
        title: Set("Polar Fab enclosures".to_string()),
        stage: Set(deal::Stage::Rfq),
        amount_cents: Set(Some(1_850_000)),
        currency: Set(Some("EUR".to_string())),
        lead_id: Set(Some(leads[1])),
        owner_id: Set(Some(sales_id)),
        rfq_value_cents: Set(Some(1_850_000)),
        rfq_document_url: Set(Some("https://files.anvil.test/rfq/polar-fab.pdf".to_string())),
        rfq_scope: Set(Some("60 stainless enclosures, two revisions".to_string())),
        created_by: Set(Some(sales_id)),
        modified_by: Set(Some(sales_id)),
        created_at: Set(now),
        modified_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await?;
    deals.push(polar.id);

    // Offered, negotiation still running.
    let quill = deal::ActiveModel {
        id: Set(Uuid::new_v4()),
        title: Set("Quill gripper pilot".to_string()),
        stage: Set(deal::Stage::Offered),
        amount_cents: Set(Some(680_000)),
        currency: Set(Some("EUR".to_string())),
        lead_id: Set(Some(leads[2])),
        owner_id: Set(Some(sales_id)),
        proposal_sent_date: Set(chrono::NaiveDate::from_ymd_opt(2026, 8, 10)),
        negotiation_status: Set(Some(deal::NegotiationStatus::Ongoing)),
        decision_expected_date: Set(chrono::NaiveDate::from_ymd_opt(2026, 9, 15)),
        created_by: Set(Some(sales_id)),
        modified_by: Set(Some(sales_id)),
        created_at: Set(now),
        modified_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await?;
    deals.push(quill.id);

    // Closed deals with history rows.
    let delta = deal::ActiveModel {
        id: Set(Uuid::new_v4()),
        title: Set("Delta spindle retrofit".to_string()),
        stage: Set(deal::Stage::Won),
        amount_cents: Set(Some(2_300_000)),
        currency: Set(Some("EUR".to_string())),
        owner_id: Set(Some(sales_id)),
        win_reason: Set(Some("Shortest delivery time of all bidders".to_string())),
        created_by: Set(Some(sales_id)),
        modified_by: Set(Some(sales_id)),
        created_at: Set(now),
        modified_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await?;
    deals.push(delta.id);

    let stainless = deal::ActiveModel {
        id: Set(Uuid::new_v4()),
        title: Set("Stainless rail prototypes".to_string()),
        stage: Set(deal::Stage::Lost),
        amount_cents: Set(Some(410_000)),
        currency: Set(Some("EUR".to_string())),
        owner_id: Set(Some(sales_id)),
        loss_reason: Set(Some(deal::LossReason::Competitor)),
        created_by: Set(Some(sales_id)),
        modified_by: Set(Some(sales_id)),
        created_at: Set(now),
        modified_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await?;
    deals.push(stainless.id);

    let legacy = deal::ActiveModel {
        id: Set(Uuid::new_v4()),
        title: Set("Legacy press upgrade".to_string()),
        stage: Set(deal::Stage::Dropped),
        owner_id: Set(Some(sales_id)),
        drop_reason: Set(Some("Customer postponed the project indefinitely".to_string())),
        created_by: Set(Some(sales_id)),
        modified_by: Set(Some(sales_id)),
        created_at: Set(now),
        modified_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await?;
    deals.push(legacy.id);

    let closed_histories = [
        (delta.id, deal::Stage::Offered, deal::Stage::Won),
        (stainless.id, deal::Stage::Rfq, deal::Stage::Lost),
        (legacy.id, deal::Stage::Discussions, deal::Stage::Dropped),
    ];
    for (deal_id, from, to) in closed_histories {
        let history = deal_stage_history::ActiveModel {
            id: Set(Uuid::new_v4()),
            deal_id: Set(deal_id),
            from_stage: Set(Some(from)),
            to_stage: Set(to),
            changed_at: Set(now),
            note: Set(None),
            changed_by: Set(Some(sales_id)),
        };
        deal_stage_history::Entity::insert(history)
            .exec_without_returning(db)
            .await?;
    }

    Ok(SeededCrmRecords {
        users: SeededUsers {
            admin: admin_id,
            sales: sales_id,
            viewer: viewer_id,
        },
        contacts,
        leads,
        meetings,
        deals,
    })
}

async fn insert_seed_user(
    db: &DatabaseConnection,
    email: &str,
    display_name: &str,
    password: &str,
    roles: &[UserRole],
    now: DateTimeWithTimeZone,
) -> Result<Uuid, DbErr> {
    let user = app_user::ActiveModel {
        id: Set(Uuid::new_v4()),
        email: Set(email.to_string()),
        display_name: Set(display_name.to_string()),
        is_active: Set(true),
        created_by: Set(None),
        modified_by: Set(None),
        created_at: Set(now),
        modified_at: Set(now),
    }
    .insert(db)
    .await?;
    for role in roles {
        let row = user_role::ActiveModel {
            user_id: Set(user.id),
            role: Set(entity::user_role::Role::from(*role)),
        };
        user_role::Entity::insert(row)
            .exec_without_returning(db)
            .await?;
    }
    user_secret::ActiveModel {
        user_id: Set(user.id),
        password_hash: Set(hash_password(password)?),
        modified_at: Set(now),
    }
    .insert(db)
    .await?;
    Ok(user.id)
}
