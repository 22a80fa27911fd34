use sea_orm_migration::prelude::*;

/// Schema version recorded next to the data and echoed into export files.
pub const SCHEMA_VERSION: i32 = 1;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(VaultMetadata::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(VaultMetadata::Key)
                            .string_len(64)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(VaultMetadata::Value).text().not_null())
                    .to_owned(),
            )
            .await?;

        manager
            .exec_stmt(
                Query::insert()
                    .into_table(VaultMetadata::Table)
                    .columns([VaultMetadata::Key, VaultMetadata::Value])
                    .values_panic(["schema_version".into(), SCHEMA_VERSION.to_string().into()])
                    .on_conflict(
                        OnConflict::column(VaultMetadata::Key)
                            .update_column(VaultMetadata::Value)
                            .to_owned(),
                    )
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(VaultMetadata::Table).if_exists().to_owned())
            .await?;
        Ok(())
    }
}

#[derive(DeriveIden)]
enum VaultMetadata {
    Table,
    Key,
    Value,
}
