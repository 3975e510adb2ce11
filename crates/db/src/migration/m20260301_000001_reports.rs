//! Reports migration.
//!
//! Creates the reports table holding each requested document and its
//! generation status.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        db.execute_unprepared(REPORTS_SQL).await?;
        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        db.execute_unprepared("DROP TABLE IF EXISTS reports CASCADE;")
            .await?;
        Ok(())
    }
}

const REPORTS_SQL: &str = r"
CREATE TABLE reports (
    id UUID PRIMARY KEY,
    status VARCHAR(20) NOT NULL DEFAULT 'pending',
    title VARCHAR(255) NOT NULL,
    description VARCHAR(1000) NOT NULL DEFAULT '',
    file_key VARCHAR(255),
    parameters JSONB NOT NULL DEFAULT '{}'::jsonb,
    created_by VARCHAR(255) NOT NULL,
    updated_by VARCHAR(255) NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    generated_at TIMESTAMPTZ,
    CONSTRAINT chk_reports_status CHECK (
        status IN ('pending', 'processing', 'completed', 'failed', 'canceled')
    ),
    CONSTRAINT chk_reports_title CHECK (length(trim(title)) > 0)
);

-- Listing by status, newest first
CREATE INDEX idx_reports_status ON reports(status, created_at DESC);

-- Default listing order
CREATE INDEX idx_reports_created_at ON reports(created_at DESC);

-- Reports of one requester
CREATE INDEX idx_reports_created_by ON reports(created_by, created_at DESC);
";
