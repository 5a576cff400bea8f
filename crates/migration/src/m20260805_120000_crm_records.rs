use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[derive(DeriveIden)]
enum AppUser {
    Table,
    Id,
}

#[derive(DeriveIden)]
enum Contact {
    Table,
    Id,
    Email,
    FirstName,
    LastName,
    Phone,
    Company,
    Position,
    OwnerId,
    CreatedBy,
    ModifiedBy,
    CreatedAt,
    ModifiedAt,
}

#[derive(DeriveIden)]
enum Lead {
    Table,
    Id,
    Name,
    Company,
    Email,
    Phone,
    Source,
    Notes,
    OwnerId,
    CreatedBy,
    ModifiedBy,
    CreatedAt,
    ModifiedAt,
}

#[derive(DeriveIden)]
enum Meeting {
    Table,
    Id,
    Title,
    ScheduledAt,
    Location,
    Notes,
    OwnerId,
    CreatedBy,
    ModifiedBy,
    CreatedAt,
    ModifiedAt,
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Contact::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Contact::Id)
                            .uuid()
                            .not_null()
                            .primary_key()
                            .default(Expr::cust("gen_random_uuid()")),
                    )
                    .col(ColumnDef::new(Contact::Email).string_len(320).not_null())
                    .col(ColumnDef::new(Contact::FirstName).string_len(128))
                    .col(ColumnDef::new(Contact::LastName).string_len(128))
                    .col(ColumnDef::new(Contact::Phone).string_len(64))
                    .col(ColumnDef::new(Contact::Company).string_len(256))
                    .col(ColumnDef::new(Contact::Position).string_len(256))
                    .col(ColumnDef::new(Contact::OwnerId).uuid())
                    .col(ColumnDef::new(Contact::CreatedBy).uuid())
                    .col(ColumnDef::new(Contact::ModifiedBy).uuid())
                    .col(
                        ColumnDef::new(Contact::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::cust("now()")),
                    )
                    .col(
                        ColumnDef::new(Contact::ModifiedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::cust("now()")),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_contact_owner")
                            .from(Contact::Table, Contact::OwnerId)
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
                    .name("idx_contact_email")
                    .table(Contact::Table)
                    .col(Contact::Email)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_contact_owner")
                    .table(Contact::Table)
                    .col(Contact::OwnerId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Lead::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Lead::Id)
                            .uuid()
                            .not_null()
                            .primary_key()
                            .default(Expr::cust("gen_random_uuid()")),
                    )
                    .col(ColumnDef::new(Lead::Name).string_len(256).not_null())
                    .col(ColumnDef::new(Lead::Company).string_len(256))
                    .col(ColumnDef::new(Lead::Email).string_len(320))
                    .col(ColumnDef::new(Lead::Phone).string_len(64))
                    .col(ColumnDef::new(Lead::Source).string_len(128))
                    .col(ColumnDef::new(Lead::Notes).text())
                    .col(ColumnDef::new(Lead::OwnerId).uuid())
                    .col(ColumnDef::new(Lead::CreatedBy).uuid())
                    .col(ColumnDef::new(Lead::ModifiedBy).uuid())
                    .col(
                        ColumnDef::new(Lead::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::cust("now()")),
                    )
                    .col(
                        ColumnDef::new(Lead::ModifiedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::cust("now()")),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_lead_owner")
                            .from(Lead::Table, Lead::OwnerId)
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
                    .name("idx_lead_owner")
                    .table(Lead::Table)
                    .col(Lead::OwnerId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Meeting::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Meeting::Id)
                            .uuid()
                            .not_null()
                            .primary_key()
                            .default(Expr::cust("gen_random_uuid()")),
                    )
                    .col(ColumnDef::new(Meeting::Title).string_len(300).not_null())
                    .col(
                        ColumnDef::new(Meeting::ScheduledAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Meeting::Location).string_len(256))
                    .col(ColumnDef::new(Meeting::Notes).text())
                    .col(ColumnDef::new(Meeting::OwnerId).uuid())
                    .col(ColumnDef::new(Meeting::CreatedBy).uuid())
                    .col(ColumnDef::new(Meeting::ModifiedBy).uuid())
                    .col(
                        ColumnDef::new(Meeting::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::cust("now()")),
                    )
                    .col(
                        ColumnDef::new(Meeting::ModifiedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::cust("now()")),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_meeting_owner")
                            .from(Meeting::Table, Meeting::OwnerId)
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
                    .name("idx_meeting_scheduled_at")
                    .table(Meeting::Table)
                    .col(Meeting::ScheduledAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_meeting_owner")
                    .table(Meeting::Table)
                    .col(Meeting::OwnerId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Meeting::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Lead::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Contact::Table).to_owned())
            .await?;
        Ok(())
    }
}
