use sea_orm_migration::prelude::*;
use sea_orm_migration::schema::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(User::Table)
                    .if_not_exists()
                    .col(string_len(User::Id, 36).primary_key())
                    .col(string_len(User::Name, 100))
                    .col(string_len(User::Mail, 100).unique_key())
                    .col(big_integer(User::PassNum).default(0))
                    .col(big_integer(User::SubmitNum).default(0))
                    .col(timestamp(User::CreatedAt).default(Expr::current_timestamp()))
                    .col(timestamp(User::UpdatedAt).default(Expr::current_timestamp()))
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Problem::Table)
                    .if_not_exists()
                    .col(string_len(Problem::Id, 36).primary_key())
                    .col(string_len(Problem::Title, 255))
                    .col(text(Problem::Content))
                    .col(big_integer(Problem::MaxRuntimeMs).check(Expr::col(Problem::MaxRuntimeMs).gt(0)))
                    // 0 = unlimited
                    .col(big_integer(Problem::MaxMemoryKb).default(0).check(Expr::col(Problem::MaxMemoryKb).gte(0)))
                    .col(big_integer(Problem::PassNum).default(0))
                    .col(big_integer(Problem::SubmitNum).default(0))
                    .col(timestamp(Problem::CreatedAt).default(Expr::current_timestamp()))
                    .col(timestamp(Problem::UpdatedAt).default(Expr::current_timestamp()))
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(TestCase::Table)
                    .if_not_exists()
                    .col(string_len(TestCase::Id, 36).primary_key())
                    .col(string_len(TestCase::ProblemId, 36))
                    .col(integer(TestCase::Position).default(0))
                    .col(text(TestCase::Input))
                    .col(text(TestCase::Output))
                    .col(timestamp(TestCase::CreatedAt).default(Expr::current_timestamp()))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-test_case-problem_id")
                            .from(TestCase::Table, TestCase::ProblemId)
                            .to(Problem::Table, Problem::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Submission::Table)
                    .if_not_exists()
                    .col(string_len(Submission::Id, 36).primary_key())
                    .col(string_len(Submission::ProblemId, 36))
                    .col(string_len(Submission::UserId, 36))
                    .col(string_len(Submission::Path, 255))
                    // SubmissionStatus is represented in app code.
                    // -1=pending, 1=accepted, 2=wrong_answer, 3=time_limit_exceeded,
                    // 4=memory_limit_exceeded, 5=compile_error, 6=invalid_code
                    .col(
                        small_integer(Submission::Status)
                            .check(Expr::col(Submission::Status).gte(-1))
                            .check(Expr::col(Submission::Status).lte(6)),
                    )
                    .col(text(Submission::Message))
                    .col(big_integer_null(Submission::RuntimeMs))
                    .col(big_integer_null(Submission::MemoryKb))
                    .col(timestamp(Submission::CreatedAt).default(Expr::current_timestamp()))
                    .col(timestamp(Submission::UpdatedAt).default(Expr::current_timestamp()))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-submission-user_id")
                            .from(Submission::Table, Submission::UserId)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-submission-problem_id")
                            .from(Submission::Table, Submission::ProblemId)
                            .to(Problem::Table, Problem::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_test_case_problem_id")
                    .table(TestCase::Table)
                    .col(TestCase::ProblemId)
                    .to_owned(),
            )
            .await?;

        for (name, column) in [
            ("idx_submission_problem_id", Submission::ProblemId),
            ("idx_submission_user_id", Submission::UserId),
            ("idx_submission_status", Submission::Status),
            ("idx_submission_created_at", Submission::CreatedAt),
        ] {
            manager
                .create_index(
                    Index::create()
                        .name(name)
                        .table(Submission::Table)
                        .col(column)
                        .to_owned(),
                )
                .await?;
        }

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Submission::Table).to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(TestCase::Table).to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(Problem::Table).to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(User::Table).to_owned())
            .await?;

        Ok(())
    }
}

#[derive(DeriveIden)]
enum User {
    Table,
    Id,
    Name,
    Mail,
    PassNum,
    SubmitNum,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Problem {
    Table,
    Id,
    Title,
    Content,
    MaxRuntimeMs,
    MaxMemoryKb,
    PassNum,
    SubmitNum,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum TestCase {
    Table,
    Id,
    ProblemId,
    Position,
    Input,
    Output,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Submission {
    Table,
    Id,
    ProblemId,
    UserId,
    Path,
    Status,
    Message,
    RuntimeMs,
    MemoryKb,
    CreatedAt,
    UpdatedAt,
}
