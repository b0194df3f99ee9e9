use sea_orm_migration::{
    prelude::*,
    schema::{string, string_len, string_null, timestamp, timestamp_null, uuid},
};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Customer::Table)
                    .if_not_exists()
                    .col(
                        uuid(Customer::Id)
                            .primary_key()
                            .default(Expr::cust("gen_random_uuid()")),
                    )
                    .col(string(Customer::Name))
                    .col(string_null(Customer::Email))
                    .col(timestamp(Customer::CreatedAt).default(Expr::cust("CURRENT_TIMESTAMP")))
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(RentalOrder::Table)
                    .if_not_exists()
                    .col(
                        uuid(RentalOrder::Id)
                            .primary_key()
                            .default(Expr::cust("gen_random_uuid()")),
                    )
                    .col(uuid(RentalOrder::CustomerId))
                    .col(string(RentalOrder::Reference).unique_key())
                    .col(string_len(RentalOrder::Status, 20).default("pending"))
                    .col(timestamp_null(RentalOrder::RentalStart))
                    .col(timestamp_null(RentalOrder::RentalEnd))
                    .col(
                        timestamp(RentalOrder::CreatedAt)
                            .default(Expr::cust("CURRENT_TIMESTAMP")),
                    )
                    .col(
                        timestamp(RentalOrder::UpdatedAt)
                            .default(Expr::cust("CURRENT_TIMESTAMP")),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-rental_order-customer_id")
                            .from(RentalOrder::Table, RentalOrder::CustomerId)
                            .to(Customer::Table, Customer::Id)
                            .on_delete(ForeignKeyAction::Restrict)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Pickup and return scans look orders up by date and status
        manager
            .create_index(
                Index::create()
                    .name("idx-rental_order-status-rental_start")
                    .table(RentalOrder::Table)
                    .col(RentalOrder::Status)
                    .col(RentalOrder::RentalStart)
                    .to_owned(),
            )
            .await?;
        manager
            .create_index(
                Index::create()
                    .name("idx-rental_order-status-rental_end")
                    .table(RentalOrder::Table)
                    .col(RentalOrder::Status)
                    .col(RentalOrder::RentalEnd)
                    .to_owned(),
            )
            .await?;

        manager
            .get_connection()
            .execute_unprepared(
                r"
                CREATE TRIGGER update_rental_order_updated_at
                    BEFORE UPDATE ON rental_order
                    FOR EACH ROW
                    EXECUTE FUNCTION update_updated_at_column();
                ",
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .get_connection()
            .execute_unprepared(
                "DROP TRIGGER IF EXISTS update_rental_order_updated_at ON rental_order;",
            )
            .await?;

        manager
            .drop_table(Table::drop().table(RentalOrder::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Customer::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Customer {
    Table,
    Id,
    Name,
    Email,
    CreatedAt,
}

#[derive(DeriveIden)]
enum RentalOrder {
    Table,
    Id,
    CustomerId,
    Reference,
    Status,
    RentalStart,
    RentalEnd,
    CreatedAt,
    UpdatedAt,
}
