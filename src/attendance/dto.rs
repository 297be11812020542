use serde::{Deserialize, Serialize};

/// `POST /api/verify` body: `{"image": "data:image/<ext>;base64,<data>"}`.
#[derive(Debug, Deserialize)]
pub struct VerifyRequest {
    #[serde(default)]
    pub image: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct VerifyResponse {
    pub ok: bool,
    pub redirect: String,
}

/// Row shown on the success page.
#[derive(Debug, Serialize)]
pub struct RecordView {
    pub image_url: Option<String>,
    pub created_at: String,
}
