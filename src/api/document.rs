use crate::{
    auth::auth::AuthUser,
    error::{AppError, AppResult, ErrorBody},
    model::{
        document::{Document, OwnerType},
        role::Role,
    },
    storage::Storage,
    utils::{
        db_utils::{Filters, fetch_page, find_by_id, row_exists},
        pagination::{PageQuery, page_response},
    },
};
use actix_web::{
    HttpRequest, HttpResponse,
    http::header::{CONTENT_DISPOSITION, CONTENT_TYPE},
    web,
};
use serde::Deserialize;
use sqlx::MySqlPool;
use tracing::{info, warn};
use utoipa::IntoParams;
use uuid::Uuid;

const COLUMNS: &str =
    "id, owner_type, owner_id, file_name, content_type, size_bytes, location, created_at";
const WRITERS: &[Role] = &[Role::Hr, Role::Finance, Role::Store];

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct UploadQuery {
    /// employee, vehicle, client or invoice
    pub owner_type: OwnerType,
    pub owner_id: u64,
    #[param(example = "nid-front.jpg")]
    pub file_name: String,
}

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct DocumentFilter {
    pub owner_type: Option<OwnerType>,
    pub owner_id: Option<u64>,
}

page_response!(DocumentListResponse, Document);

/// Reduces a client supplied file name to a safe single path segment.
pub fn sanitize_file_name(raw: &str) -> String {
    let base = raw.rsplit(['/', '\\']).next().unwrap_or(raw).trim();
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() {
        "file".to_string()
    } else {
        cleaned.chars().take(120).collect()
    }
}

fn object_key(owner_type: OwnerType, owner_id: u64, file_name: &str) -> String {
    format!(
        "documents/{}/{}/{}-{}",
        owner_type.as_ref(),
        owner_id,
        Uuid::new_v4().simple(),
        file_name
    )
}

async fn load(pool: &MySqlPool, id: u64) -> AppResult<Document> {
    find_by_id(pool, "documents", COLUMNS, id)
        .await?
        .ok_or_else(|| AppError::not_found("Document"))
}

/// Upload a document
///
/// The raw request body is the file. Owner and file name travel in the query
/// string; the `Content-Type` header is stored with the document.
#[utoipa::path(
    post,
    path = "/api/documents",
    params(UploadQuery),
    request_body(content = String, content_type = "application/octet-stream"),
    responses(
        (status = 201, description = "Document stored", body = Document),
        (status = 400, description = "Empty body", body = ErrorBody),
        (status = 404, description = "Owner not found", body = ErrorBody),
        (status = 500, description = "Object storage failure", body = ErrorBody)
    ),
    tag = "Document",
    security(("bearer_auth" = []))
)]
pub async fn upload_document(
    auth: AuthUser,
    req: HttpRequest,
    pool: web::Data<MySqlPool>,
    storage: web::Data<Storage>,
    query: web::Query<UploadQuery>,
    body: web::Bytes,
) -> AppResult<HttpResponse> {
    auth.require_roles(WRITERS)?;

    if body.is_empty() {
        return Err(AppError::bad_request("Document body is empty"));
    }
    if !row_exists(pool.get_ref(), query.owner_type.table(), query.owner_id).await? {
        return Err(AppError::NotFound(format!(
            "{} {} not found",
            query.owner_type.as_ref(),
            query.owner_id
        )));
    }

    let file_name = sanitize_file_name(&query.file_name);
    let content_type = req
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("application/octet-stream")
        .to_string();
    let size = body.len() as u64;

    let key = object_key(query.owner_type, query.owner_id, &file_name);
    let location = storage.put(&key, body.to_vec(), &content_type).await?;

    let inserted = sqlx::query(
        r#"
        INSERT INTO documents (owner_type, owner_id, file_name, content_type, size_bytes, location)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(query.owner_type.as_ref())
    .bind(query.owner_id)
    .bind(&file_name)
    .bind(&content_type)
    .bind(size)
    .bind(&location)
    .execute(pool.get_ref())
    .await;

    let id = match inserted {
        Ok(result) => result.last_insert_id(),
        Err(e) => {
            if let Err(cleanup) = storage.delete(&location).await {
                warn!(%location, error = %cleanup, "Orphaned object left after failed insert");
            }
            return Err(e.into());
        }
    };

    info!(
        document_id = id,
        owner_type = query.owner_type.as_ref(),
        owner_id = query.owner_id,
        size,
        backend = storage.backend_name(),
        "Document uploaded"
    );
    Ok(HttpResponse::Created().json(load(pool.get_ref(), id).await?))
}

/// List documents
#[utoipa::path(
    get,
    path = "/api/documents",
    params(PageQuery, DocumentFilter),
    responses((status = 200, description = "Paginated documents", body = DocumentListResponse)),
    tag = "Document",
    security(("bearer_auth" = []))
)]
pub async fn list_documents(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    page: web::Query<PageQuery>,
    filter: web::Query<DocumentFilter>,
) -> AppResult<HttpResponse> {
    auth.require_user()?;

    let mut filters = Filters::new();
    filters
        .eq("owner_type", filter.owner_type.map(|t| t.as_ref().to_string()))
        .eq("owner_id", filter.owner_id);

    let (data, total) = fetch_page(
        pool.get_ref(),
        "documents",
        COLUMNS,
        &filters,
        "created_at DESC, id DESC",
        &page,
    )
    .await?;
    Ok(HttpResponse::Ok().json(DocumentListResponse::new(data, &page, total)))
}

/// Download a document
#[utoipa::path(
    get,
    path = "/api/documents/{id}/download",
    params(("id", Path, description = "Document ID")),
    responses(
        (status = 200, description = "File content", content_type = "application/octet-stream", body = String),
        (status = 404, description = "Document or object not found", body = ErrorBody)
    ),
    tag = "Document",
    security(("bearer_auth" = []))
)]
pub async fn download_document(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    storage: web::Data<Storage>,
    path: web::Path<u64>,
) -> AppResult<HttpResponse> {
    auth.require_user()?;
    let document = load(pool.get_ref(), path.into_inner()).await?;

    let bytes = storage.get(&document.location).await?;
    Ok(HttpResponse::Ok()
        .insert_header((CONTENT_TYPE, document.content_type.as_str()))
        .insert_header((
            CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", document.file_name),
        ))
        .body(bytes))
}

/// Delete a document
///
/// Removes the stored object, then the record.
#[utoipa::path(
    delete,
    path = "/api/documents/{id}",
    params(("id", Path, description = "Document ID")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 404, description = "Document not found", body = ErrorBody)
    ),
    tag = "Document",
    security(("bearer_auth" = []))
)]
pub async fn delete_document(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    storage: web::Data<Storage>,
    path: web::Path<u64>,
) -> AppResult<HttpResponse> {
    auth.require_roles(WRITERS)?;
    let document = load(pool.get_ref(), path.into_inner()).await?;

    storage.delete(&document.location).await?;
    sqlx::query("DELETE FROM documents WHERE id = ?")
        .bind(document.id)
        .execute(pool.get_ref())
        .await?;

    info!(document_id = document.id, location = %document.location, "Document deleted");
    Ok(HttpResponse::NoContent().finish())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_names_are_single_safe_segments() {
        assert_eq!(sanitize_file_name("nid front.jpg"), "nid_front.jpg");
        assert_eq!(sanitize_file_name("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_file_name("C:\\scans\\licence.pdf"), "licence.pdf");
        assert_eq!(sanitize_file_name(".env"), "env");
        assert_eq!(sanitize_file_name("   "), "file");
    }

    #[test]
    fn keys_are_grouped_by_owner() {
        let key = object_key(OwnerType::Vehicle, 12, "fitness.pdf");
        assert!(key.starts_with("documents/vehicle/12/"));
        assert!(key.ends_with("-fitness.pdf"));
        assert!(crate::storage::validate_key(&key).is_ok());
    }
}
