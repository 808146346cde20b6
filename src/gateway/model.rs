use serde::Deserialize;

/// Successful messages-API response body; the generated text lives in
/// `content[0].text`.
#[derive(Deserialize, Debug)]
pub struct MessagesResponse {
    #[serde(default)]
    pub content: Vec<ContentBlock>,
}

#[derive(Deserialize, Debug)]
pub struct ContentBlock {
    #[serde(rename = "type", default)]
    pub typ: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
}

/// Error body shape: `{ "error": { "type": ..., "message": ... } }`.
#[derive(Deserialize, Debug)]
pub struct ApiErrorBody {
    #[serde(default)]
    pub error: Option<ApiErrorDetail>,
}

#[derive(Deserialize, Debug)]
pub struct ApiErrorDetail {
    #[serde(rename = "type", default)]
    pub typ: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}
