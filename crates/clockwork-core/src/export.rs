//! Export orchestration
//!
//! A [`ReportFormatter`] turns a payload into bytes; the [`Exporter`] writes
//! them to disk and records the artifact in the history store. Nothing is
//! recorded unless the file was written.

use clockwork_api::{
    ExportFormat, ExportMeta, ExportOutcome, NewExportItem, ReportPayload,
};
use clockwork_store::ExportHistoryStore;
use clockwork_util::{ClockworkError, ClockworkResult};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

/// Renders a report into one export format
pub trait ReportFormatter: Send + Sync {
    fn format(&self) -> ExportFormat;

    fn render(&self, payload: &ReportPayload, meta: &ExportMeta) -> ClockworkResult<Vec<u8>>;
}

/// One line per report row plus a trailing totals line
#[derive(Debug, Default, Clone, Copy)]
pub struct CsvFormatter;

impl ReportFormatter for CsvFormatter {
    fn format(&self) -> ExportFormat {
        ExportFormat::Csv
    }

    fn render(&self, payload: &ReportPayload, _meta: &ExportMeta) -> ClockworkResult<Vec<u8>> {
        let mut wtr = csv::Writer::from_writer(Vec::new());
        let csv_err = |e: csv::Error| ClockworkError::internal(format!("CSV encoding failed: {}", e));

        wtr.write_record([
            "user_id",
            "username",
            "full_name",
            "date",
            "check_in",
            "check_out",
            "hours",
        ])
        .map_err(csv_err)?;

        for row in &payload.rows {
            wtr.write_record(&[
                row.user_id.to_string(),
                row.username.clone(),
                row.full_name.clone(),
                row.date.format("%Y-%m-%d").to_string(),
                row.check_in.map(|t| t.format("%H:%M:%S").to_string()).unwrap_or_default(),
                row.check_out.map(|t| t.format("%H:%M:%S").to_string()).unwrap_or_default(),
                format!("{:.2}", row.hours),
            ])
            .map_err(csv_err)?;
        }

        let totals = &payload.totals;
        wtr.write_record(&[
            "TOTAL".to_string(),
            format!("{} users", totals.users),
            format!("{} records", totals.records),
            String::new(),
            String::new(),
            String::new(),
            format!("{:.2}", totals.hours),
        ])
        .map_err(csv_err)?;

        wtr.into_inner()
            .map_err(|e| ClockworkError::internal(format!("CSV flush failed: {}", e)))
    }
}

pub struct Exporter {
    store: Arc<dyn ExportHistoryStore>,
    formatters: HashMap<ExportFormat, Arc<dyn ReportFormatter>>,
}

impl Exporter {
    /// Exporter with the bundled CSV formatter
    pub fn new(store: Arc<dyn ExportHistoryStore>) -> Self {
        let mut exporter = Self {
            store,
            formatters: HashMap::new(),
        };
        exporter.register(Arc::new(CsvFormatter));
        exporter
    }

    /// Install a formatter, replacing any for the same format
    pub fn register(&mut self, formatter: Arc<dyn ReportFormatter>) {
        self.formatters.insert(formatter.format(), formatter);
    }

    pub fn supports(&self, format: ExportFormat) -> bool {
        self.formatters.contains_key(&format)
    }

    pub fn store(&self) -> &Arc<dyn ExportHistoryStore> {
        &self.store
    }

    /// Render, write to `save_path`, then record in the history.
    pub async fn export(
        &self,
        format: ExportFormat,
        payload: &ReportPayload,
        meta: &ExportMeta,
        save_path: &Path,
    ) -> ClockworkResult<ExportOutcome> {
        let formatter = self.formatters.get(&format).ok_or_else(|| {
            ClockworkError::validation(format!("no formatter installed for {} exports", format))
        })?;
        if save_path.as_os_str().is_empty() {
            return Err(ClockworkError::validation("save path is empty"));
        }
        if meta.from > meta.to {
            return Err(ClockworkError::invalid_range(format!(
                "export range {} is after {}",
                meta.from, meta.to
            )));
        }

        let bytes = formatter.render(payload, meta)?;

        if let Some(parent) = save_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        if let Err(e) = tokio::fs::write(save_path, &bytes).await {
            warn!(path = %save_path.display(), error = %e, "Export write failed");
            return Err(e.into());
        }

        let item = self.store.record(NewExportItem {
            format,
            title: meta.title.clone(),
            from: meta.from,
            to: meta.to,
            rows: payload.rows.len(),
            total_hours: payload.totals.hours,
            file_path: save_path.to_path_buf(),
        })?;

        info!(
            id = %item.id,
            format = %format,
            rows = item.rows,
            bytes = bytes.len(),
            path = %save_path.display(),
            "Export recorded"
        );

        Ok(ExportOutcome {
            item,
            bytes: bytes.len() as u64,
        })
    }
}
