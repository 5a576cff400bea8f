pub use sea_orm_migration::prelude::*;

mod m20260805_000001_identity;
mod m20260805_120000_crm_records;
mod m20260806_100000_deal_pipeline;

pub struct Migrator;
#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20260805_000001_identity::Migration),
            Box::new(m20260805_120000_crm_records::Migration),
            Box::new(m20260806_100000_deal_pipeline::Migration),
        ]
    }
}
