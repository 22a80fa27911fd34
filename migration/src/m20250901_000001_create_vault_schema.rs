use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Samples::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Samples::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Samples::Batch).text())
                    .col(ColumnDef::new(Samples::Type).text())
                    .col(ColumnDef::new(Samples::Track).text())
                    .col(ColumnDef::new(Samples::Location).text())
                    .col(ColumnDef::new(Samples::Name).text())
                    .col(ColumnDef::new(Samples::Description).text())
                    .col(ColumnDef::new(Samples::Notes).text())
                    .col(ColumnDef::new(Samples::Properties).json().not_null())
                    .col(ColumnDef::new(Samples::Images).json().not_null())
                    .col(
                        ColumnDef::new(Samples::CreateTime)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Samples::UpdateTime)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        // History rows outlive their sample, so there is no foreign key here
        manager
            .create_table(
                Table::create()
                    .table(History::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(History::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(History::SampleId).integer())
                    .col(ColumnDef::new(History::Action).string_len(16).not_null())
                    .col(ColumnDef::new(History::Editor).text().not_null())
                    .col(
                        ColumnDef::new(History::Time)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(ColumnDef::new(History::Changes).json().not_null())
                    .to_owned(),
            )
            .await?;

        for (name, column) in [
            ("idx_samples_batch", Samples::Batch),
            ("idx_samples_type", Samples::Type),
            ("idx_samples_location", Samples::Location),
            ("idx_samples_create_time", Samples::CreateTime),
        ] {
            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name(name)
                        .table(Samples::Table)
                        .col(column)
                        .to_owned(),
                )
                .await?;
        }

        for (name, column) in [
            ("idx_history_sample_id", History::SampleId),
            ("idx_history_time", History::Time),
            ("idx_history_editor", History::Editor),
        ] {
            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name(name)
                        .table(History::Table)
                        .col(column)
                        .to_owned(),
                )
                .await?;
        }

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(History::Table).if_exists().to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Samples::Table).if_exists().to_owned())
            .await?;
        Ok(())
    }
}

#[derive(DeriveIden)]
enum Samples {
    Table,
    Id,
    Batch,
    Type,
    Track,
    Location,
    Name,
    Description,
    Notes,
    Properties,
    Images,
    CreateTime,
    UpdateTime,
}

#[derive(DeriveIden)]
enum History {
    Table,
    Id,
    SampleId,
    Action,
    Editor,
    Time,
    Changes,
}
