//! Report repository for PostgreSQL.

use chrono::Utc;
use repgen_core::report::{
    NewReport, Report, ReportChanges, ReportFilter, ReportParameters, ReportRepository,
    ReportSortField, ReportStatus, RepositoryError, SortDirection,
};
use repgen_shared::types::ReportId;
use sea_orm::sea_query::{Expr, Func};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, DbErr, EntityTrait,
    IntoActiveModel, Order, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set,
    UpdateMany,
};
use tracing::debug;

use crate::entities::reports;

/// `SeaORM` implementation of [`ReportRepository`].
#[derive(Debug, Clone)]
pub struct PgReportRepository {
    db: DatabaseConnection,
}

impl PgReportRepository {
    /// Creates a new report repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

fn db_err(err: DbErr) -> RepositoryError {
    RepositoryError::database(err.to_string())
}

/// Converts a stored row into the domain entity.
///
/// # Errors
///
/// Returns `Database` if the row holds an unknown status or non-object
/// parameters.
pub fn to_report(model: reports::Model) -> Result<Report, RepositoryError> {
    let status = ReportStatus::parse(&model.status).ok_or_else(|| {
        RepositoryError::database(format!(
            "report {} has unknown status '{}'",
            model.id, model.status
        ))
    })?;
    let parameters = ReportParameters::try_from(model.parameters)
        .map_err(|e| RepositoryError::database(format!("report {}: {e}", model.id)))?;

    Ok(Report {
        id: ReportId::from_uuid(model.id),
        status,
        title: model.title,
        description: model.description,
        file_key: model.file_key,
        parameters,
        created_by: model.created_by,
        updated_by: model.updated_by,
        created_at: model.created_at.with_timezone(&Utc),
        updated_at: model.updated_at.with_timezone(&Utc),
        generated_at: model.generated_at.map(|t| t.with_timezone(&Utc)),
    })
}

fn sort_column(field: ReportSortField) -> reports::Column {
    match field {
        ReportSortField::CreatedAt => reports::Column::CreatedAt,
        ReportSortField::UpdatedAt => reports::Column::UpdatedAt,
        ReportSortField::Title => reports::Column::Title,
        ReportSortField::Status => reports::Column::Status,
    }
}

impl ReportRepository for PgReportRepository {
    async fn create(&self, input: NewReport) -> Result<Report, RepositoryError> {
        let report = input.into_report(ReportId::new(), Utc::now());

        let model = reports::ActiveModel {
            id: Set(report.id.into_inner()),
            status: Set(report.status.as_str().to_string()),
            title: Set(report.title),
            description: Set(report.description),
            file_key: Set(None),
            parameters: Set(report.parameters.to_value()),
            created_by: Set(report.created_by),
            updated_by: Set(report.updated_by),
            created_at: Set(report.created_at.into()),
            updated_at: Set(report.updated_at.into()),
            generated_at: Set(None),
        };

        let inserted = model.insert(&self.db).await.map_err(db_err)?;
        debug!(report_id = %inserted.id, "report row inserted");
        to_report(inserted)
    }

    async fn get_by_id(&self, id: ReportId) -> Result<Report, RepositoryError> {
        let model = reports::Entity::find_by_id(id.into_inner())
            .one(&self.db)
            .await
            .map_err(db_err)?
            .ok_or(RepositoryError::NotFound(id))?;
        to_report(model)
    }

    async fn list(&self, filter: &ReportFilter) -> Result<(Vec<Report>, u64), RepositoryError> {
        let mut query = reports::Entity::find();

        if let Some(status) = filter.status {
            query = query.filter(reports::Column::Status.eq(status.as_str()));
        }
        if let Some(term) = filter.search.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
            let pattern = format!("%{}%", term.to_lowercase());
            query = query.filter(
                Condition::any()
                    .add(Expr::expr(Func::lower(Expr::col(reports::Column::Title))).like(&pattern))
                    .add(
                        Expr::expr(Func::lower(Expr::col(reports::Column::Description)))
                            .like(&pattern),
                    ),
            );
        }

        let total = query.clone().count(&self.db).await.map_err(db_err)?;

        let order = match filter.sort_dir {
            SortDirection::Asc => Order::Asc,
            SortDirection::Desc => Order::Desc,
        };
        let models = query
            .order_by(sort_column(filter.sort_by), order.clone())
            .order_by(reports::Column::Id, order)
            .offset(filter.offset)
            .limit(filter.limit)
            .all(&self.db)
            .await
            .map_err(db_err)?;

        let reports = models
            .into_iter()
            .map(to_report)
            .collect::<Result<Vec<_>, _>>()?;
        Ok((reports, total))
    }

    async fn update(
        &self,
        id: ReportId,
        changes: &ReportChanges,
    ) -> Result<Report, RepositoryError> {
        let model = reports::Entity::find_by_id(id.into_inner())
            .one(&self.db)
            .await
            .map_err(db_err)?
            .ok_or(RepositoryError::NotFound(id))?;

        let first_completion = model.generated_at.is_none();
        let now = Utc::now();
        let mut active = model.into_active_model();

        if let Some(title) = &changes.title {
            active.title = Set(title.trim().to_string());
        }
        if let Some(description) = &changes.description {
            active.description = Set(description.trim().to_string());
        }
        if let Some(parameters) = &changes.parameters {
            active.parameters = Set(parameters.to_value());
        }
        if let Some(status) = changes.status {
            active.status = Set(status.as_str().to_string());
            if status == ReportStatus::Completed && first_completion {
                active.generated_at = Set(Some(now.into()));
            }
        }
        active.updated_by = Set(changes.updated_by.clone());
        active.updated_at = Set(now.into());

        let updated = active.update(&self.db).await.map_err(db_err)?;
        to_report(updated)
    }

    async fn delete(&self, id: ReportId) -> Result<(), RepositoryError> {
        let result = reports::Entity::delete_by_id(id.into_inner())
            .exec(&self.db)
            .await
            .map_err(db_err)?;
        if result.rows_affected == 0 {
            return Err(RepositoryError::NotFound(id));
        }
        debug!(report_id = %id, "report row deleted");
        Ok(())
    }

    async fn update_status(
        &self,
        id: ReportId,
        status: ReportStatus,
        file_key: Option<&str>,
    ) -> Result<(), RepositoryError> {
        let result = status_update(status, file_key)
            .filter(reports::Column::Id.eq(id.into_inner()))
            .exec(&self.db)
            .await
            .map_err(db_err)?;
        if result.rows_affected == 0 {
            return Err(RepositoryError::NotFound(id));
        }
        Ok(())
    }

    async fn transition_status(
        &self,
        id: ReportId,
        from: ReportStatus,
        to: ReportStatus,
        file_key: Option<&str>,
    ) -> Result<bool, RepositoryError> {
        let result = status_update(to, file_key)
            .filter(reports::Column::Id.eq(id.into_inner()))
            .filter(reports::Column::Status.eq(from.as_str()))
            .exec(&self.db)
            .await
            .map_err(db_err)?;
        if result.rows_affected > 0 {
            return Ok(true);
        }

        let exists = reports::Entity::find_by_id(id.into_inner())
            .count(&self.db)
            .await
            .map_err(db_err)?
            > 0;
        if !exists {
            return Err(RepositoryError::NotFound(id));
        }
        debug!(report_id = %id, from = %from, to = %to, "status transition lost");
        Ok(false)
    }
}

fn status_update(status: ReportStatus, file_key: Option<&str>) -> UpdateMany<reports::Entity> {
    let now = Utc::now();
    let mut update = reports::Entity::update_many()
        .col_expr(reports::Column::Status, Expr::value(status.as_str()))
        .col_expr(reports::Column::UpdatedAt, Expr::value(now));

    if status == ReportStatus::Completed {
        // generated_at keeps its first value.
        update = update.col_expr(
            reports::Column::GeneratedAt,
            Func::coalesce([Expr::col(reports::Column::GeneratedAt).into(), Expr::value(now)])
                .into(),
        );
    }
    if let Some(key) = file_key.filter(|k| !k.is_empty()) {
        update = update.col_expr(reports::Column::FileKey, Expr::value(key));
    }
    update
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use uuid::Uuid;

    fn model(status: &str, parameters: serde_json::Value) -> reports::Model {
        let now = Utc::now().into();
        reports::Model {
            id: Uuid::now_v7(),
            status: status.to_string(),
            title: "Sales".to_string(),
            description: String::new(),
            file_key: None,
            parameters,
            created_by: "alice".to_string(),
            updated_by: "alice".to_string(),
            created_at: now,
            updated_at: now,
            generated_at: None,
        }
    }

    #[test]
    fn test_to_report_maps_columns() {
        let row = model("processing", json!({ "region": "EU" }));
        let id = row.id;

        let report = to_report(row).expect("valid row");
        assert_eq!(report.id, ReportId::from_uuid(id));
        assert_eq!(report.status, ReportStatus::Processing);
        assert_eq!(report.parameters.get_str("region"), Some("EU"));
    }

    #[test]
    fn test_to_report_accepts_null_parameters() {
        let report = to_report(model("pending", serde_json::Value::Null)).expect("valid row");
        assert!(report.parameters.is_empty());
    }

    #[test]
    fn test_to_report_rejects_corrupt_rows() {
        assert!(to_report(model("archived", json!({}))).is_err());
        assert!(to_report(model("pending", json!([1, 2]))).is_err());
    }

    #[test]
    fn test_sort_columns() {
        assert!(matches!(
            sort_column(ReportSortField::Title),
            reports::Column::Title
        ));
        assert!(matches!(
            sort_column(ReportSortField::default()),
            reports::Column::CreatedAt
        ));
    }
}
