//! In-process report repository.

use std::cmp::Ordering;

use chrono::Utc;
use dashmap::DashMap;
use repgen_shared::types::ReportId;

use super::repository::{ReportRepository, RepositoryError};
use super::types::{
    NewReport, Report, ReportChanges, ReportFilter, ReportSortField, ReportStatus, SortDirection,
};

/// Concurrent in-memory [`ReportRepository`] for tests and local runs.
#[derive(Default)]
pub struct InMemoryReportRepository {
    reports: DashMap<ReportId, Report>,
}

impl InMemoryReportRepository {
    /// Creates an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `report` as-is, replacing any report with the same id.
    pub fn insert(&self, report: Report) {
        self.reports.insert(report.id, report);
    }

    /// Number of stored reports.
    #[must_use]
    pub fn len(&self) -> usize {
        self.reports.len()
    }

    /// Returns true if no report is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.reports.is_empty()
    }
}

fn compare(a: &Report, b: &Report, field: ReportSortField) -> Ordering {
    match field {
        ReportSortField::CreatedAt => a.created_at.cmp(&b.created_at),
        ReportSortField::UpdatedAt => a.updated_at.cmp(&b.updated_at),
        ReportSortField::Title => a.title.cmp(&b.title),
        ReportSortField::Status => a.status.as_str().cmp(b.status.as_str()),
    }
}

fn stamp_status(report: &mut Report, status: ReportStatus) {
    let now = Utc::now();
    report.status = status;
    report.updated_at = now;
    if status == ReportStatus::Completed && report.generated_at.is_none() {
        report.generated_at = Some(now);
    }
}

impl ReportRepository for InMemoryReportRepository {
    async fn create(&self, input: NewReport) -> Result<Report, RepositoryError> {
        let report = input.into_report(ReportId::new(), Utc::now());
        self.reports.insert(report.id, report.clone());
        Ok(report)
    }

    async fn get_by_id(&self, id: ReportId) -> Result<Report, RepositoryError> {
        self.reports
            .get(&id)
            .map(|r| r.value().clone())
            .ok_or(RepositoryError::NotFound(id))
    }

    async fn list(&self, filter: &ReportFilter) -> Result<(Vec<Report>, u64), RepositoryError> {
        let mut matches: Vec<Report> = self
            .reports
            .iter()
            .filter(|r| filter.matches(r.value()))
            .map(|r| r.value().clone())
            .collect();

        matches.sort_by(|a, b| {
            let ord = compare(a, b, filter.sort_by).then_with(|| a.id.cmp(&b.id));
            match filter.sort_dir {
                SortDirection::Asc => ord,
                SortDirection::Desc => ord.reverse(),
            }
        });

        let total = matches.len() as u64;
        let offset = usize::try_from(filter.offset).unwrap_or(usize::MAX);
        let limit = usize::try_from(filter.limit).unwrap_or(usize::MAX);
        let page = matches.into_iter().skip(offset).take(limit).collect();
        Ok((page, total))
    }

    async fn update(
        &self,
        id: ReportId,
        changes: &ReportChanges,
    ) -> Result<Report, RepositoryError> {
        let mut entry = self
            .reports
            .get_mut(&id)
            .ok_or(RepositoryError::NotFound(id))?;
        let report = entry.value_mut();

        if let Some(title) = &changes.title {
            report.title = title.trim().to_string();
        }
        if let Some(description) = &changes.description {
            report.description = description.trim().to_string();
        }
        if let Some(parameters) = &changes.parameters {
            report.parameters = parameters.clone();
        }
        report.updated_by.clone_from(&changes.updated_by);
        match changes.status {
            Some(status) => stamp_status(report, status),
            None => report.updated_at = Utc::now(),
        }
        Ok(report.clone())
    }

    async fn delete(&self, id: ReportId) -> Result<(), RepositoryError> {
        self.reports
            .remove(&id)
            .map(|_| ())
            .ok_or(RepositoryError::NotFound(id))
    }

    async fn update_status(
        &self,
        id: ReportId,
        status: ReportStatus,
        file_key: Option<&str>,
    ) -> Result<(), RepositoryError> {
        let mut entry = self
            .reports
            .get_mut(&id)
            .ok_or(RepositoryError::NotFound(id))?;
        let report = entry.value_mut();

        stamp_status(report, status);
        if let Some(key) = file_key.filter(|k| !k.is_empty()) {
            report.file_key = Some(key.to_string());
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
        let mut entry = self
            .reports
            .get_mut(&id)
            .ok_or(RepositoryError::NotFound(id))?;
        let report = entry.value_mut();
        if report.status != from {
            return Ok(false);
        }

        stamp_status(report, to);
        if let Some(key) = file_key.filter(|k| !k.is_empty()) {
            report.file_key = Some(key.to_string());
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(title: &str) -> NewReport {
        NewReport::builder()
            .with_title(title)
            .with_description("quarterly numbers")
            .with_created_by("alice")
            .build()
            .expect("valid input")
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let repo = InMemoryReportRepository::new();
        let created = repo.create(input("Sales")).await.expect("create");
        assert_eq!(created.status, ReportStatus::Pending);

        let loaded = repo.get_by_id(created.id).await.expect("get");
        assert_eq!(loaded, created);
    }

    #[tokio::test]
    async fn test_missing_rows_are_not_found() {
        let repo = InMemoryReportRepository::new();
        let id = ReportId::new();
        assert!(repo.get_by_id(id).await.unwrap_err().is_not_found());
        assert!(repo.delete(id).await.unwrap_err().is_not_found());
        assert!(
            repo.update_status(id, ReportStatus::Failed, None)
                .await
                .unwrap_err()
                .is_not_found()
        );
    }

    #[tokio::test]
    async fn test_update_status_sets_key_and_generated_at_once() {
        let repo = InMemoryReportRepository::new();
        let report = repo.create(input("Sales")).await.expect("create");

        repo.update_status(report.id, ReportStatus::Completed, Some("reports/1/a.json"))
            .await
            .expect("complete");
        let first = repo.get_by_id(report.id).await.expect("get");
        assert_eq!(first.file_key.as_deref(), Some("reports/1/a.json"));
        assert!(first.generated_at.is_some());

        repo.update_status(report.id, ReportStatus::Completed, None)
            .await
            .expect("rewrite");
        let second = repo.get_by_id(report.id).await.expect("get");
        assert_eq!(second.generated_at, first.generated_at);
        assert_eq!(second.file_key, first.file_key);
    }

    #[tokio::test]
    async fn test_transition_status_requires_expected_status() {
        let repo = InMemoryReportRepository::new();
        let report = repo.create(input("Sales")).await.expect("create");
        repo.update_status(report.id, ReportStatus::Canceled, None)
            .await
            .expect("cancel");

        let moved = repo
            .transition_status(
                report.id,
                ReportStatus::Processing,
                ReportStatus::Completed,
                Some("reports/1/a.json"),
            )
            .await
            .expect("transition");
        assert!(!moved);
        let stored = repo.get_by_id(report.id).await.expect("get");
        assert_eq!(stored.status, ReportStatus::Canceled);
        assert!(stored.file_key.is_none());
        assert!(stored.generated_at.is_none());

        let moved = repo
            .transition_status(report.id, ReportStatus::Canceled, ReportStatus::Pending, None)
            .await
            .expect("transition");
        assert!(moved);
        assert_eq!(
            repo.get_by_id(report.id).await.expect("get").status,
            ReportStatus::Pending
        );

        let err = repo
            .transition_status(ReportId::new(), ReportStatus::Pending, ReportStatus::Processing, None)
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_list_filters_sorts_and_pages() {
        let repo = InMemoryReportRepository::new();
        for title in ["Charlie", "Alpha", "Bravo"] {
            repo.create(input(title)).await.expect("create");
        }
        let done = repo.create(input("Delta")).await.expect("create");
        repo.update_status(done.id, ReportStatus::Failed, None)
            .await
            .expect("fail");

        let filter = ReportFilter {
            status: Some(ReportStatus::Pending),
            sort_by: ReportSortField::Title,
            sort_dir: SortDirection::Asc,
            offset: 0,
            limit: 2,
            ..ReportFilter::default()
        };
        let (page, total) = repo.list(&filter).await.expect("list");
        assert_eq!(total, 3);
        let titles: Vec<_> = page.iter().map(|r| r.title.as_str()).collect();
        assert_eq!(titles, vec!["Alpha", "Bravo"]);

        let filter = ReportFilter {
            search: Some("delta".into()),
            limit: 10,
            ..ReportFilter::default()
        };
        let (page, total) = repo.list(&filter).await.expect("list");
        assert_eq!(total, 1);
        assert_eq!(page[0].id, done.id);
    }

    #[tokio::test]
    async fn test_update_writes_fields() {
        let repo = InMemoryReportRepository::new();
        let report = repo.create(input("Sales")).await.expect("create");

        let updated = repo
            .update(
                report.id,
                &ReportChanges::by("bob")
                    .title(" Sales v2 ")
                    .status(ReportStatus::Canceled),
            )
            .await
            .expect("update");
        assert_eq!(updated.title, "Sales v2");
        assert_eq!(updated.status, ReportStatus::Canceled);
        assert_eq!(updated.updated_by, "bob");
        assert_eq!(updated.description, "quarterly numbers");
    }
}
