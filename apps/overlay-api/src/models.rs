//! Data models for the overlay API

use chrono::{DateTime, Utc};
use overlay_core::{ElementLog, OverlayElement};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::error::ApiError;

/// Processing status of a document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentStatus {
    Uploaded,
    Processing,
    Completed,
    Error,
}

impl std::fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DocumentStatus::Uploaded => write!(f, "uploaded"),
            DocumentStatus::Processing => write!(f, "processing"),
            DocumentStatus::Completed => write!(f, "completed"),
            DocumentStatus::Error => write!(f, "error"),
        }
    }
}

impl DocumentStatus {
    pub fn from_db(value: &str) -> Self {
        match value {
            "processing" => DocumentStatus::Processing,
            "completed" => DocumentStatus::Completed,
            "error" => DocumentStatus::Error,
            _ => DocumentStatus::Uploaded,
        }
    }
}

/// Document row without the PDF blobs
#[derive(Debug, Clone, FromRow)]
pub struct DbDocument {
    pub id: String,
    pub title: String,
    pub filename: String,
    pub document_hash: String,
    pub page_count: i64,
    pub elements_json: String,
    pub status: String,
    pub error_message: Option<String>,
    pub processed_filename: Option<String>,
    pub has_processed_pdf: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DbDocument {
    pub fn element_log(&self) -> Result<ElementLog, ApiError> {
        ElementLog::from_json(&self.elements_json).map_err(|e| ApiError::Internal(e.into()))
    }

    pub fn into_api(self) -> Result<DocumentResponse, ApiError> {
        let elements = self.element_log()?.elements().to_vec();
        Ok(DocumentResponse {
            id: self.id,
            title: self.title,
            filename: self.filename,
            document_hash: self.document_hash,
            page_count: self.page_count as u32,
            status: DocumentStatus::from_db(&self.status),
            elements,
            has_processed_pdf: self.has_processed_pdf,
            processed_filename: self.processed_filename,
            error_message: self.error_message,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// Document response for API
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentResponse {
    pub id: String,
    pub title: String,
    pub filename: String,
    pub document_hash: String,
    pub page_count: u32,
    pub status: DocumentStatus,
    pub elements: Vec<OverlayElement>,
    pub has_processed_pdf: bool,
    pub processed_filename: Option<String>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Request to upload a new document
#[derive(Debug, Clone, Deserialize)]
pub struct CreateDocumentRequest {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub pdf_base64: Option<String>,
}

/// Request to rename a document or replace its source PDF
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateDocumentRequest {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub pdf_base64: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AddTextRequest {
    pub x: f64,
    pub y: f64,
    #[serde(default)]
    pub content: Option<String>,
    /// Older clients send the text under this name
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub page: Option<u32>,
    #[serde(default)]
    pub font: Option<String>,
    #[serde(default)]
    pub font_size: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AddSignatureRequest {
    pub x: f64,
    pub y: f64,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub signature_data: Option<String>,
    #[serde(default)]
    pub font: Option<String>,
    #[serde(default)]
    pub page: Option<u32>,
}

/// Batch append or full replacement of elements
#[derive(Debug, Clone, Deserialize)]
pub struct ElementsRequest {
    #[serde(default)]
    pub elements: Vec<OverlayElement>,
}

/// A newly placed element together with the updated document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElementResponse {
    pub element: OverlayElement,
    pub document: DocumentResponse,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SignaturePreviewRequest {
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub font: Option<String>,
    #[serde(default)]
    pub size: Option<u32>,
    #[serde(default)]
    pub color: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignaturePreviewResponse {
    pub image: String,
}
