use sea_orm_migration::prelude::*;

/// Delivery services, their versioned key bundles, ACME bookkeeping and the audit log
#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Create deliveryservices table
        manager
            .create_table(
                Table::create()
                    .table(Alias::new("deliveryservices"))
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Alias::new("id"))
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(Alias::new("xml_id"))
                            .string()
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(Alias::new("cdn_name")).string().not_null())
                    .col(
                        ColumnDef::new(Alias::new("ssl_key_version"))
                            .big_integer()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(Alias::new("created_at"))
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(Alias::new("updated_at"))
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_deliveryservices_ssl_key_version")
                    .table(Alias::new("deliveryservices"))
                    .col(Alias::new("ssl_key_version"))
                    .to_owned(),
            )
            .await?;

        // Create deliveryservice_ssl_keys table
        manager
            .create_table(
                Table::create()
                    .table(Alias::new("deliveryservice_ssl_keys"))
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Alias::new("id"))
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Alias::new("xml_id")).string().not_null())
                    .col(ColumnDef::new(Alias::new("version")).big_integer().not_null())
                    .col(ColumnDef::new(Alias::new("document")).text().not_null())
                    .col(
                        ColumnDef::new(Alias::new("created_at"))
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_deliveryservice_ssl_keys_xml_id_version")
                    .table(Alias::new("deliveryservice_ssl_keys"))
                    .col(Alias::new("xml_id"))
                    .col(Alias::new("version"))
                    .unique()
                    .to_owned(),
            )
            .await?;

        // Create dns_challenges table
        manager
            .create_table(
                Table::create()
                    .table(Alias::new("dns_challenges"))
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Alias::new("id"))
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Alias::new("xml_id")).string().not_null())
                    .col(ColumnDef::new(Alias::new("fqdn")).string().not_null())
                    .col(ColumnDef::new(Alias::new("record")).string().not_null())
                    .col(
                        ColumnDef::new(Alias::new("created_at"))
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_dns_challenges_xml_id")
                    .table(Alias::new("dns_challenges"))
                    .col(Alias::new("xml_id"))
                    .to_owned(),
            )
            .await?;

        // Create acme_accounts table
        manager
            .create_table(
                Table::create()
                    .table(Alias::new("acme_accounts"))
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Alias::new("id"))
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Alias::new("email")).string().not_null())
                    .col(
                        ColumnDef::new(Alias::new("directory_url"))
                            .string()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Alias::new("credentials")).text().not_null())
                    .col(
                        ColumnDef::new(Alias::new("created_at"))
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_acme_accounts_email_directory")
                    .table(Alias::new("acme_accounts"))
                    .col(Alias::new("email"))
                    .col(Alias::new("directory_url"))
                    .unique()
                    .to_owned(),
            )
            .await?;

        // Create audit_logs table
        manager
            .create_table(
                Table::create()
                    .table(Alias::new("audit_logs"))
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Alias::new("id"))
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Alias::new("username")).string().not_null())
                    .col(
                        ColumnDef::new(Alias::new("operation_type"))
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Alias::new("audit_date"))
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Alias::new("created_at"))
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(ColumnDef::new(Alias::new("data")).text().not_null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_audit_logs_operation_type")
                    .table(Alias::new("audit_logs"))
                    .col(Alias::new("operation_type"))
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        for table in [
            "audit_logs",
            "acme_accounts",
            "dns_challenges",
            "deliveryservice_ssl_keys",
            "deliveryservices",
        ] {
            manager
                .drop_table(
                    Table::drop()
                        .table(Alias::new(table))
                        .if_exists()
                        .to_owned(),
                )
                .await?;
        }
        Ok(())
    }
}
