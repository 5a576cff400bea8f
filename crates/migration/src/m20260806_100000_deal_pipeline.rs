use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[derive(DeriveIden)]
enum AppUser {
    Table,
    Id,
}

#[derive(DeriveIden)]
enum Lead {
    Table,
    Id,
}

#[derive(DeriveIden)]
enum Meeting {
    Table,
    Id,
}

#[derive(DeriveIden)]
enum Deal {
    Table,
    Id,
    Title,
    Description,
    Stage,
    AmountCents,
    Currency,
    Probability,
    CloseDate,
    LeadId,
    MeetingId,
    OwnerId,
    NeedIdentified,
    NeedSummary,
    DecisionMakerPresent,
    CustomerAgreement,
    NdaSigned,
    BudgetConfirmed,
    PortalAccess,
    TimelineStart,
    TimelineEnd,
    RfqValueCents,
    RfqDocumentUrl,
    RfqScope,
    ProposalSentDate,
    NegotiationStatus,
    DecisionExpectedDate,
    WinReason,
    LossReason,
    DropReason,
    CreatedBy,
    ModifiedBy,
    CreatedAt,
    ModifiedAt,
}

#[derive(DeriveIden)]
enum DealStageHistory {
    Table,
    Id,
    DealId,
    FromStage,
    ToStage,
    ChangedAt,
    Note,
    ChangedBy,
}

#[derive(DeriveIden)]
enum Activity {
    Table,
    Id,
    EntityType,
    EntityId,
    Kind,
    Subject,
    BodyMd,
    MetaJson,
    CreatedAt,
    CreatedBy,
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Deal::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Deal::Id)
                            .uuid()
                            .not_null()
                            .primary_key()
                            .default(Expr::cust("gen_random_uuid()")),
                    )
                    .col(ColumnDef::new(Deal::Title).string_len(300).not_null())
                    .col(ColumnDef::new(Deal::Description).text())
                    .col(
                        ColumnDef::new(Deal::Stage)
                            .string_len(32)
                            .not_null()
                            .default("DISCUSSIONS"),
                    )
                    .col(ColumnDef::new(Deal::AmountCents).big_integer())
                    .col(ColumnDef::new(Deal::Currency).string_len(3))
                    .col(ColumnDef::new(Deal::Probability).small_integer())
                    .col(ColumnDef::new(Deal::CloseDate).date())
                    .col(ColumnDef::new(Deal::LeadId).uuid())
                    .col(ColumnDef::new(Deal::MeetingId).uuid())
                    .col(ColumnDef::new(Deal::OwnerId).uuid())
                    .col(ColumnDef::new(Deal::NeedIdentified).boolean())
                    .col(ColumnDef::new(Deal::NeedSummary).text())
                    .col(ColumnDef::new(Deal::DecisionMakerPresent).boolean())
                    .col(ColumnDef::new(Deal::CustomerAgreement).string_len(32))
                    .col(ColumnDef::new(Deal::NdaSigned).boolean())
                    .col(ColumnDef::new(Deal::BudgetConfirmed).string_len(32))
                    .col(ColumnDef::new(Deal::PortalAccess).string_len(32))
                    .col(ColumnDef::new(Deal::TimelineStart).date())
                    .col(ColumnDef::new(Deal::TimelineEnd).date())
                    .col(ColumnDef::new(Deal::RfqValueCents).big_integer())
                    .col(ColumnDef::new(Deal::RfqDocumentUrl).string_len(1024))
                    .col(ColumnDef::new(Deal::RfqScope).text())
                    .col(ColumnDef::new(Deal::ProposalSentDate).date())
                    .col(ColumnDef::new(Deal::NegotiationStatus).string_len(32))
                    .col(ColumnDef::new(Deal::DecisionExpectedDate).date())
                    .col(ColumnDef::new(Deal::WinReason).text())
                    .col(ColumnDef::new(Deal::LossReason).string_len(32))
                    .col(ColumnDef::new(Deal::DropReason).text())
                    .col(ColumnDef::new(Deal::CreatedBy).uuid())
                    .col(ColumnDef::new(Deal::ModifiedBy).uuid())
                    .col(
                        ColumnDef::new(Deal::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::cust("now()")),
                    )
                    .col(
                        ColumnDef::new(Deal::ModifiedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::cust("now()")),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_deal_lead")
                            .from(Deal::Table, Deal::LeadId)
                            .to(Lead::Table, Lead::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_deal_meeting")
                            .from(Deal::Table, Deal::MeetingId)
                            .to(Meeting::Table, Meeting::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_deal_owner")
                            .from(Deal::Table, Deal::OwnerId)
                            .to(AppUser::Table, AppUser::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .check(Expr::cust(
                        "(probability IS NULL OR (probability >= 0 AND probability <= 100))",
                    ))
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_deal_stage")
                    .table(Deal::Table)
                    .col(Deal::Stage)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_deal_lead")
                    .table(Deal::Table)
                    .col(Deal::LeadId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_deal_meeting")
                    .table(Deal::Table)
                    .col(Deal::MeetingId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_deal_owner")
                    .table(Deal::Table)
                    .col(Deal::OwnerId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(DealStageHistory::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(DealStageHistory::Id)
                            .uuid()
                            .not_null()
                            .primary_key()
                            .default(Expr::cust("gen_random_uuid()")),
                    )
                    .col(ColumnDef::new(DealStageHistory::DealId).uuid().not_null())
                    .col(ColumnDef::new(DealStageHistory::FromStage).string_len(32))
                    .col(
                        ColumnDef::new(DealStageHistory::ToStage)
                            .string_len(32)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(DealStageHistory::ChangedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::cust("now()")),
                    )
                    .col(ColumnDef::new(DealStageHistory::Note).text())
                    .col(ColumnDef::new(DealStageHistory::ChangedBy).uuid())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_deal_stage_history_deal")
                            .from(DealStageHistory::Table, DealStageHistory::DealId)
                            .to(Deal::Table, Deal::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_deal_stage_history_deal")
                    .table(DealStageHistory::Table)
                    .col(DealStageHistory::DealId)
                    .col(DealStageHistory::ChangedAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Activity::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Activity::Id)
                            .uuid()
                            .not_null()
                            .primary_key()
                            .default(Expr::cust("gen_random_uuid()")),
                    )
                    .col(
                        ColumnDef::new(Activity::EntityType)
                            .string_len(32)
                            .not_null(),
                    )
                    .col(ColumnDef::new(Activity::EntityId).uuid().not_null())
                    .col(ColumnDef::new(Activity::Kind).string_len(32).not_null())
                    .col(ColumnDef::new(Activity::Subject).string_len(512))
                    .col(ColumnDef::new(Activity::BodyMd).text())
                    .col(
                        ColumnDef::new(Activity::MetaJson)
                            .json_binary()
                            .not_null()
                            .default(Expr::cust("'{}'::jsonb")),
                    )
                    .col(
                        ColumnDef::new(Activity::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::cust("now()")),
                    )
                    .col(ColumnDef::new(Activity::CreatedBy).uuid())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_activity_created_by")
                            .from(Activity::Table, Activity::CreatedBy)
                            .to(AppUser::Table, AppUser::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_activity_entity")
                    .table(Activity::Table)
                    .col(Activity::EntityType)
                    .col(Activity::EntityId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_activity_created_at")
                    .table(Activity::Table)
                    .col(Activity::CreatedAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Activity::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(DealStageHistory::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Deal::Table).to_owned())
            .await?;
        Ok(())
    }
}
