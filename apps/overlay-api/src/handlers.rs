//! HTTP handlers for the overlay API

use axum::{
    extract::{Path, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use chrono::Utc;
use overlay_core::elements::DEFAULT_SIGNATURE_FONT;
use overlay_core::{ElementId, ElementLog, OverlayElement, OverlayError, SignaturePreview};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::{error, info};
use uuid::Uuid;

use crate::error::ApiError;
use crate::models::*;
use crate::range::{parse_range, RangeRequest};
use crate::state::AppState;

const DEFAULT_FILENAME: &str = "document.pdf";

/// Health check endpoint
pub async fn health() -> &'static str {
    "OK"
}

async fn fetch_document(state: &AppState, id: &str) -> Result<DbDocument, ApiError> {
    let document: Option<DbDocument> = sqlx::query_as(
        r#"
        SELECT id, title, filename, document_hash, page_count, elements_json, status,
               error_message, processed_filename,
               processed_pdf IS NOT NULL AS has_processed_pdf,
               created_at, updated_at
        FROM documents
        WHERE id = ?
        "#,
    )
    .bind(id)
    .fetch_optional(&state.db)
    .await?;

    document.ok_or_else(|| ApiError::DocumentNotFound(id.to_string()))
}

/// Decode an uploaded PDF and count its pages. Parsing runs on the
/// blocking pool.
async fn decode_pdf(pdf_base64: &str) -> Result<(Vec<u8>, u32), ApiError> {
    let pdf_data = BASE64
        .decode(pdf_base64.trim())
        .map_err(|e| ApiError::InvalidRequest(format!("Invalid PDF base64: {}", e)))?;

    tokio::task::spawn_blocking(move || -> Result<(Vec<u8>, u32), ApiError> {
        let page_count = overlay_core::get_page_count(&pdf_data)?;
        if page_count == 0 {
            return Err(OverlayError::NoPages.into());
        }
        Ok((pdf_data, page_count))
    })
    .await
    .map_err(|e| ApiError::Internal(e.into()))?
}

/// Strip path components and quoting from a client-supplied filename
fn sanitize_filename(name: Option<&str>) -> String {
    let base = name
        .and_then(|n| n.rsplit(['/', '\\']).next())
        .unwrap_or_default();
    let cleaned: String = base
        .chars()
        .filter(|c| !c.is_control() && *c != '"')
        .collect();
    let cleaned = cleaned.trim();
    if cleaned.is_empty() {
        DEFAULT_FILENAME.to_string()
    } else {
        cleaned.to_string()
    }
}

/// List documents, newest first
pub async fn list_documents(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<DocumentResponse>>, ApiError> {
    let documents: Vec<DbDocument> = sqlx::query_as(
        r#"
        SELECT id, title, filename, document_hash, page_count, elements_json, status,
               error_message, processed_filename,
               processed_pdf IS NOT NULL AS has_processed_pdf,
               created_at, updated_at
        FROM documents
        ORDER BY created_at DESC
        "#,
    )
    .fetch_all(&state.db)
    .await?;

    let documents = documents
        .into_iter()
        .map(DbDocument::into_api)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Json(documents))
}

/// Upload a new document
pub async fn create_document(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateDocumentRequest>,
) -> Result<(StatusCode, Json<DocumentResponse>), ApiError> {
    let title = req.title.as_deref().map(str::trim).unwrap_or_default();
    if title.is_empty() {
        return Err(ApiError::Unprocessable("Title can't be blank".to_string()));
    }
    let pdf_base64 = req
        .pdf_base64
        .as_deref()
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| ApiError::Unprocessable("PDF file is required".to_string()))?;

    let (pdf_data, page_count) = decode_pdf(pdf_base64).await?;
    let document_hash = hex::encode(Sha256::digest(&pdf_data));
    let filename = sanitize_filename(req.filename.as_deref());
    let id = Uuid::new_v4().to_string();
    let elements_json = ElementLog::new().to_json()?;
    let now = Utc::now();

    sqlx::query(
        r#"
        INSERT INTO documents (id, title, filename, document_hash, page_count, pdf_data, elements_json, status, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&id)
    .bind(title)
    .bind(&filename)
    .bind(&document_hash)
    .bind(page_count as i64)
    .bind(&pdf_data)
    .bind(&elements_json)
    .bind(DocumentStatus::Uploaded.to_string())
    .bind(now.to_rfc3339())
    .bind(now.to_rfc3339())
    .execute(&state.db)
    .await?;

    info!(document = %id, pages = page_count, "Created document {}", filename);

    let document = fetch_document(&state, &id).await?.into_api()?;
    Ok((StatusCode::CREATED, Json(document)))
}

/// Get document by ID
pub async fn get_document(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<DocumentResponse>, ApiError> {
    Ok(Json(fetch_document(&state, &id).await?.into_api()?))
}

/// Rename a document and/or replace its source PDF.
///
/// A new source invalidates every placed element and the processed output.
pub async fn update_document(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<UpdateDocumentRequest>,
) -> Result<Json<DocumentResponse>, ApiError> {
    let lock = state.document_lock(&id);
    let _guard = lock.lock().await;

    let document = fetch_document(&state, &id).await?;

    // Validate everything before writing so a rejected request changes nothing
    let title = match req.title.as_deref().map(str::trim) {
        Some("") => return Err(ApiError::Unprocessable("Title can't be blank".to_string())),
        other => other,
    };
    let replacement = match req.pdf_base64.as_deref().filter(|s| !s.trim().is_empty()) {
        Some(pdf_base64) => Some(decode_pdf(pdf_base64).await?),
        None => None,
    };

    let now = Utc::now().to_rfc3339();
    let mut tx = state.db.begin().await?;

    if let Some(title) = title {
        sqlx::query("UPDATE documents SET title = ?, updated_at = ? WHERE id = ?")
            .bind(title)
            .bind(&now)
            .bind(&id)
            .execute(&mut *tx)
            .await?;
    }

    if let Some((pdf_data, page_count)) = &replacement {
        let filename = match req.filename.as_deref() {
            Some(name) => sanitize_filename(Some(name)),
            None => document.filename.clone(),
        };

        sqlx::query(
            r#"
            UPDATE documents
            SET pdf_data = ?, document_hash = ?, page_count = ?, filename = ?,
                elements_json = ?, processed_pdf = NULL, processed_filename = NULL,
                status = ?, error_message = NULL, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(pdf_data)
        .bind(hex::encode(Sha256::digest(pdf_data)))
        .bind(*page_count as i64)
        .bind(&filename)
        .bind(ElementLog::new().to_json()?)
        .bind(DocumentStatus::Uploaded.to_string())
        .bind(&now)
        .bind(&id)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;

    if let Some((_, page_count)) = replacement {
        info!(document = %id, pages = page_count, "Replaced source PDF, elements cleared");
    }

    Ok(Json(fetch_document(&state, &id).await?.into_api()?))
}

/// Delete a document
pub async fn delete_document(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let lock = state.document_lock(&id);
    let _guard = lock.lock().await;

    let result = sqlx::query("DELETE FROM documents WHERE id = ?")
        .bind(&id)
        .execute(&state.db)
        .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::DocumentNotFound(id));
    }

    info!(document = %id, "Deleted document");
    Ok(StatusCode::NO_CONTENT)
}

/// Apply `mutate` to the document's element log, persist it and regenerate
/// the processed PDF. Runs under the document's lock.
async fn mutate_elements<T, F>(
    state: &AppState,
    id: &str,
    mutate: F,
) -> Result<(T, DbDocument), ApiError>
where
    F: FnOnce(&mut ElementLog) -> Result<T, ApiError>,
{
    let lock = state.document_lock(id);
    let _guard = lock.lock().await;

    let document = fetch_document(state, id).await?;
    let mut log = document.element_log()?;
    let output = mutate(&mut log)?;

    sqlx::query("UPDATE documents SET elements_json = ?, status = ?, updated_at = ? WHERE id = ?")
        .bind(log.to_json()?)
        .bind(DocumentStatus::Processing.to_string())
        .bind(Utc::now().to_rfc3339())
        .bind(id)
        .execute(&state.db)
        .await?;

    regenerate(state, &document, &log).await?;

    Ok((output, fetch_document(state, id).await?))
}

/// Rebuild the processed PDF from the original upload and every element
async fn regenerate(
    state: &AppState,
    document: &DbDocument,
    log: &ElementLog,
) -> Result<(), ApiError> {
    if log.is_empty() {
        sqlx::query(
            r#"
            UPDATE documents
            SET processed_pdf = NULL, processed_filename = NULL, status = ?,
                error_message = NULL, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(DocumentStatus::Uploaded.to_string())
        .bind(Utc::now().to_rfc3339())
        .bind(&document.id)
        .execute(&state.db)
        .await?;

        info!(document = %document.id, "No elements left, processed PDF cleared");
        return Ok(());
    }

    let source: Vec<u8> = sqlx::query_scalar("SELECT pdf_data FROM documents WHERE id = ?")
        .bind(&document.id)
        .fetch_one(&state.db)
        .await?;

    let elements = log.elements().to_vec();
    let element_count = elements.len();
    let result =
        match tokio::task::spawn_blocking(move || overlay_core::apply_elements(&source, &elements))
            .await
        {
            Ok(rendered) => rendered.map_err(ApiError::from),
            Err(e) => Err(ApiError::Internal(anyhow::anyhow!("Render task failed: {}", e))),
        };

    match result {
        Ok(processed) => {
            let processed_filename = format!(
                "filled_{}_{}_{}",
                document.id,
                Utc::now().timestamp(),
                document.filename
            );

            sqlx::query(
                r#"
                UPDATE documents
                SET processed_pdf = ?, processed_filename = ?, status = ?,
                    error_message = NULL, updated_at = ?
                WHERE id = ?
                "#,
            )
            .bind(&processed)
            .bind(&processed_filename)
            .bind(DocumentStatus::Completed.to_string())
            .bind(Utc::now().to_rfc3339())
            .bind(&document.id)
            .execute(&state.db)
            .await?;

            info!(
                document = %document.id,
                elements = element_count,
                bytes = processed.len(),
                "Regenerated processed PDF"
            );
            Ok(())
        }
        Err(e) => {
            error!(document = %document.id, error = %e, "Failed to regenerate processed PDF");

            sqlx::query(
                "UPDATE documents SET status = ?, error_message = ?, updated_at = ? WHERE id = ?",
            )
            .bind(DocumentStatus::Error.to_string())
            .bind(e.to_string())
            .bind(Utc::now().to_rfc3339())
            .bind(&document.id)
            .execute(&state.db)
            .await?;

            Err(e)
        }
    }
}

/// Add a single element and respond with it and the updated document
async fn add_element(
    state: &AppState,
    id: &str,
    element: OverlayElement,
) -> Result<(StatusCode, Json<ElementResponse>), ApiError> {
    element.validate()?;

    let (element_id, document) = mutate_elements(state, id, |log| Ok(log.add(element))).await?;
    let document = document.into_api()?;
    let element = document
        .elements
        .iter()
        .find(|e| e.id() == element_id)
        .cloned()
        .ok_or(ApiError::ElementNotFound(element_id))?;

    Ok((StatusCode::CREATED, Json(ElementResponse { element, document })))
}

/// Place a text element
pub async fn add_text(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<AddTextRequest>,
) -> Result<(StatusCode, Json<ElementResponse>), ApiError> {
    let element = OverlayElement::Text {
        id: 0,
        x: req.x,
        y: req.y,
        page: req.page.unwrap_or(0),
        content: req.content.or(req.text).unwrap_or_default(),
        font: req.font,
        font_size: req.font_size,
    };

    add_element(&state, &id, element).await
}

/// Place a typed or drawn signature
pub async fn add_signature(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<AddSignatureRequest>,
) -> Result<(StatusCode, Json<ElementResponse>), ApiError> {
    let element = OverlayElement::Signature {
        id: 0,
        x: req.x,
        y: req.y,
        page: req.page.unwrap_or(0),
        content: req.content,
        font: Some(req.font.unwrap_or_else(|| DEFAULT_SIGNATURE_FONT.to_string())),
        signature_data: req.signature_data,
    };

    add_element(&state, &id, element).await
}

/// List the elements of a document in render order
pub async fn list_elements(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Vec<OverlayElement>>, ApiError> {
    let log = fetch_document(&state, &id).await?.element_log()?;
    Ok(Json(log.elements().to_vec()))
}

/// Append a batch of elements
pub async fn add_elements(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<ElementsRequest>,
) -> Result<(StatusCode, Json<DocumentResponse>), ApiError> {
    if req.elements.is_empty() {
        return Err(ApiError::Unprocessable("No elements to add".to_string()));
    }
    for element in &req.elements {
        element.validate()?;
    }

    let count = req.elements.len();
    let (_, document) =
        mutate_elements(&state, &id, |log| Ok(log.extend(req.elements))).await?;

    info!(document = %id, added = count, "Added elements");
    Ok((StatusCode::CREATED, Json(document.into_api()?)))
}

/// Replace the whole element list
pub async fn replace_elements(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<ElementsRequest>,
) -> Result<Json<DocumentResponse>, ApiError> {
    for element in &req.elements {
        element.validate()?;
    }

    let (_, document) =
        mutate_elements(&state, &id, |log| Ok(log.replace(req.elements))).await?;
    Ok(Json(document.into_api()?))
}

/// Remove one element
pub async fn delete_element(
    State(state): State<Arc<AppState>>,
    Path((id, element_id)): Path<(String, ElementId)>,
) -> Result<Json<DocumentResponse>, ApiError> {
    let (_, document) = mutate_elements(&state, &id, |log| {
        if log.remove(element_id) {
            Ok(())
        } else {
            Err(ApiError::ElementNotFound(element_id))
        }
    })
    .await?;

    info!(document = %id, element = element_id, "Removed element");
    Ok(Json(document.into_api()?))
}

/// Processed PDF when present, otherwise the original upload
async fn current_pdf(state: &AppState, id: &str) -> Result<(String, Vec<u8>), ApiError> {
    let document = fetch_document(state, id).await?;

    let (processed, original): (Option<Vec<u8>>, Vec<u8>) =
        sqlx::query_as("SELECT processed_pdf, pdf_data FROM documents WHERE id = ?")
            .bind(id)
            .fetch_one(&state.db)
            .await?;

    match (processed, document.processed_filename) {
        (Some(pdf), Some(filename)) => Ok((filename, pdf)),
        _ => Ok((document.filename, original)),
    }
}

fn pdf_headers(disposition: &str, filename: &str) -> Result<HeaderMap, ApiError> {
    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/pdf"),
    );
    headers.insert(
        header::CONTENT_DISPOSITION,
        HeaderValue::from_str(&format!("{}; filename=\"{}\"", disposition, filename))
            .map_err(|e| ApiError::Internal(e.into()))?,
    );
    Ok(headers)
}

/// Download the processed PDF as an attachment
pub async fn download_document(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let (filename, pdf) = current_pdf(&state, &id).await?;
    let headers = pdf_headers("attachment", &filename)?;
    Ok((StatusCode::OK, headers, pdf).into_response())
}

/// Stream the PDF inline for in-browser viewing, honouring a single byte range
pub async fn stream_document(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    request_headers: HeaderMap,
) -> Result<Response, ApiError> {
    let (filename, pdf) = current_pdf(&state, &id).await?;

    let mut headers = pdf_headers("inline", &filename)?;
    headers.insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static("no-cache, no-store, must-revalidate"),
    );
    headers.insert(header::PRAGMA, HeaderValue::from_static("no-cache"));
    headers.insert(header::EXPIRES, HeaderValue::from_static("0"));
    headers.insert(header::ACCEPT_RANGES, HeaderValue::from_static("bytes"));

    let total = pdf.len() as u64;
    let range = request_headers
        .get(header::RANGE)
        .and_then(|v| v.to_str().ok())
        .map_or(RangeRequest::Full, |v| parse_range(v, total));

    match range {
        RangeRequest::Full => Ok((StatusCode::OK, headers, pdf).into_response()),
        RangeRequest::Partial(range) => {
            headers.insert(
                header::CONTENT_RANGE,
                HeaderValue::from_str(&range.content_range(total))
                    .map_err(|e| ApiError::Internal(e.into()))?,
            );
            let start = range.start as usize;
            let body = pdf[start..start + range.len() as usize].to_vec();
            Ok((StatusCode::PARTIAL_CONTENT, headers, body).into_response())
        }
        RangeRequest::Unsatisfiable => Err(ApiError::RangeNotSatisfiable(total)),
    }
}

/// Render a typed signature preview image
pub async fn preview_signature(
    Json(req): Json<SignaturePreviewRequest>,
) -> Result<Json<SignaturePreviewResponse>, ApiError> {
    let mut preview = SignaturePreview::new(req.content.unwrap_or_default());
    if let Some(font) = req.font {
        preview = preview.font(font);
    }
    if let Some(size) = req.size {
        preview = preview.size(size);
    }
    if let Some(color) = req.color {
        preview = preview.color(color);
    }

    Ok(Json(SignaturePreviewResponse {
        image: preview.render()?,
    }))
}

#[cfg(test)]
mod handler_tests {
    use super::*;

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename(Some("../../etc/passwd")), "passwd");
        assert_eq!(sanitize_filename(Some("C:\\docs\\lease.pdf")), "lease.pdf");
        assert_eq!(sanitize_filename(Some("we\"ird\n.pdf")), "weird.pdf");
        assert_eq!(sanitize_filename(Some("  ")), DEFAULT_FILENAME);
        assert_eq!(sanitize_filename(None), DEFAULT_FILENAME);
    }
}
