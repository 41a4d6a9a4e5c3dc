use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use super::{TempUrlEntry, TempUrlProvider};
use crate::error::MediaError;

/// Temp-URL provider backed by the media service's batch endpoint
/// `POST {base}/api/v1/files/temp-urls`
pub struct HttpTempUrlProvider {
    client: reqwest::Client,
    endpoint: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TempUrlRequest<'a> {
    file_list: &'a [String],
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TempUrlResponse {
    #[serde(default)]
    file_list: Vec<TempUrlEntry>,
}

impl HttpTempUrlProvider {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, MediaError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: format!("{}/api/v1/files/temp-urls", base_url.trim_end_matches('/')),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl TempUrlProvider for HttpTempUrlProvider {
    async fn get_temp_urls(&self, file_ids: &[String]) -> Result<Vec<TempUrlEntry>, MediaError> {
        debug!(count = file_ids.len(), "Requesting temp URLs");

        let response = self
            .client
            .post(&self.endpoint)
            .json(&TempUrlRequest {
                file_list: file_ids,
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(MediaError::Status(status.as_u16()));
        }

        let body: TempUrlResponse = response.json().await?;
        Ok(body.file_list)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_trims_trailing_slash() {
        let provider =
            HttpTempUrlProvider::new("http://media:8090/", Duration::from_secs(5)).unwrap();
        assert_eq!(provider.endpoint(), "http://media:8090/api/v1/files/temp-urls");
    }

    #[test]
    fn test_wire_format() {
        let ids = vec!["cloud://env/a.jpg".to_string()];
        let body = serde_json::to_value(TempUrlRequest { file_list: &ids }).unwrap();
        assert_eq!(body, serde_json::json!({ "fileList": ["cloud://env/a.jpg"] }));

        let resp: TempUrlResponse = serde_json::from_value(serde_json::json!({
            "fileList": [
                { "fileID": "cloud://env/a.jpg", "status": 0, "tempFileURL": "https://cdn/a.jpg" },
                { "fileID": "cloud://env/b.jpg", "status": -1, "errMsg": "STORAGE_FILE_NONEXIST" }
            ]
        }))
        .unwrap();

        assert_eq!(resp.file_list.len(), 2);
        assert_eq!(resp.file_list[0].temp_file_url, "https://cdn/a.jpg");
        assert_eq!(resp.file_list[1].status, -1);
        assert_eq!(
            resp.file_list[1].err_msg.as_deref(),
            Some("STORAGE_FILE_NONEXIST")
        );
    }
}
