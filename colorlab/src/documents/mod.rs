//! Report document generation.
//!
//! A request names report ids and a document type. [`aggregator::aggregate`] loads the
//! reports with their photos (all or nothing), then the batch is rendered as CSV
//! ([`csv::render_csv`]) or PDF ([`pdf::render_pdf`]).

pub mod aggregator;
pub mod csv;
pub mod pdf;

use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use tracing::{info, instrument};

use crate::{config::DocumentsConfig, errors::Error, types::ReporteId};
use aggregator::ReportSource;
use pdf::PdfOptions;

/// Output selector. `excel` produces a CSV that spreadsheet applications open directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentType {
    Pdf,
    Excel,
}

impl FromStr for DocumentType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pdf" => Ok(DocumentType::Pdf),
            "excel" => Ok(DocumentType::Excel),
            other => Err(Error::UnsupportedDocumentType {
                requested: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for DocumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DocumentType::Pdf => write!(f, "pdf"),
            DocumentType::Excel => write!(f, "excel"),
        }
    }
}

impl DocumentType {
    pub fn content_type(self) -> &'static str {
        match self {
            DocumentType::Pdf => "application/pdf",
            DocumentType::Excel => "text/csv; charset=utf-8",
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            DocumentType::Pdf => "pdf",
            DocumentType::Excel => "csv",
        }
    }

    /// `reportes_{YYYYMMDD_HHMMSS_mmm}.{ext}`, sortable by generation time
    pub fn filename(self, generated_at: DateTime<Utc>) -> String {
        format!("reportes_{}.{}", generated_at.format("%Y%m%d_%H%M%S_%3f"), self.extension())
    }
}

/// A rendered document ready to be sent as an attachment
#[derive(Debug, Clone)]
pub struct GeneratedDocument {
    pub filename: String,
    pub content_type: &'static str,
    pub bytes: Vec<u8>,
}

/// Renders aggregated reports with the configured image directory and branding.
#[derive(Debug, Clone)]
pub struct DocumentRenderer {
    public_base_url: String,
    pdf: PdfOptions,
}

impl DocumentRenderer {
    pub fn new(config: &DocumentsConfig) -> Self {
        Self {
            public_base_url: config.public_base_url.clone(),
            pdf: PdfOptions::from(config),
        }
    }

    /// Aggregate the requested reports and render them. Nothing is rendered if any id is missing.
    #[instrument(skip(self, source, ids), fields(count = ids.len()))]
    pub async fn generate(&self, source: &dyn ReportSource, ids: &[ReporteId], document_type: DocumentType) -> Result<GeneratedDocument, Error> {
        let reports = aggregator::aggregate(source, ids).await?;
        let generated_at = Utc::now();

        let bytes = match document_type {
            DocumentType::Excel => csv::render_csv(&reports, &self.public_base_url),
            DocumentType::Pdf => pdf::render_pdf(reports, self.pdf.clone()).await?,
        };

        let document = GeneratedDocument {
            filename: document_type.filename(generated_at),
            content_type: document_type.content_type(),
            bytes,
        };
        info!(filename = %document.filename, size = document.bytes.len(), "Document generated");
        Ok(document)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{InMemoryReportSource, sample_foto, sample_reporte};
    use chrono::TimeZone;

    #[test]
    fn test_document_type_parsing() {
        assert_eq!("pdf".parse::<DocumentType>().unwrap(), DocumentType::Pdf);
        assert_eq!("excel".parse::<DocumentType>().unwrap(), DocumentType::Excel);

        let err = "docx".parse::<DocumentType>().unwrap_err();
        assert!(matches!(err, Error::UnsupportedDocumentType { ref requested } if requested == "docx"));
        assert!("PDF".parse::<DocumentType>().is_err());
    }

    #[test]
    fn test_filename_embeds_timestamp() {
        let at = Utc.with_ymd_and_hms(2024, 3, 15, 9, 5, 7).unwrap() + chrono::Duration::milliseconds(42);
        assert_eq!(DocumentType::Pdf.filename(at), "reportes_20240315_090507_042.pdf");
        assert_eq!(DocumentType::Excel.filename(at), "reportes_20240315_090507_042.csv");
    }

    #[tokio::test]
    async fn test_generate_csv() {
        let source = InMemoryReportSource::default();
        source.insert(sample_reporte(1), vec![sample_foto(1, 1, "a.jpg")]);
        let renderer = DocumentRenderer::new(&DocumentsConfig::default());

        let document = renderer.generate(&source, &[1], DocumentType::Excel).await.unwrap();
        assert_eq!(document.content_type, "text/csv; charset=utf-8");
        assert!(document.filename.starts_with("reportes_") && document.filename.ends_with(".csv"));
        let text = String::from_utf8_lossy(&document.bytes);
        assert!(text.contains("http://localhost:3001/images/a.jpg"));
    }

    #[tokio::test]
    async fn test_generate_fails_atomically_for_missing_report() {
        let source = InMemoryReportSource::default();
        source.insert(sample_reporte(1), vec![]);
        let renderer = DocumentRenderer::new(&DocumentsConfig::default());

        for document_type in [DocumentType::Pdf, DocumentType::Excel] {
            let err = renderer.generate(&source, &[1, 404], document_type).await.unwrap_err();
            assert!(matches!(err, Error::NotFound { .. }));
        }
    }
}
