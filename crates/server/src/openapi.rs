use utoipa::OpenApi;
use utoipa::ToSchema;

#[derive(ToSchema)]
pub struct HealthResponse { pub status: String }

#[derive(ToSchema)]
pub struct SiteSubmissionDoc {
    pub name: String,
    pub site_id: String,
    pub description: String,
}

#[derive(ToSchema)]
pub struct SiteEntryDoc {
    pub name: String,
    pub site_id: String,
    pub description: String,
    /// RFC 3339 UTC timestamp assigned by the server.
    pub added_ts: String,
}

#[derive(ToSchema)]
pub struct MessageDoc { pub message: String }

#[derive(ToSchema)]
pub struct ErrorDoc { pub error: String }

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::routes::health,
        crate::routes::sites::submit_site,
        crate::routes::sites::list_sites,
    ),
    components(
        schemas(
            HealthResponse,
            SiteSubmissionDoc,
            SiteEntryDoc,
            MessageDoc,
            ErrorDoc,
        )
    ),
    tags(
        (name = "health"),
        (name = "sites")
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_catalog_paths() {
        let doc = serde_json::to_value(ApiDoc::openapi()).unwrap();
        assert!(doc["paths"]["/api/submit"]["post"].is_object());
        assert!(doc["paths"]["/api/list"]["get"].is_object());
        assert!(doc["components"]["schemas"]["SiteEntryDoc"].is_object());
    }
}
