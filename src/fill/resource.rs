use std::path::Path;

use async_trait::async_trait;
use tracing::debug;

use crate::error::AutofillError;

/// Where the binary resource to attach lives: an http(s) URL, a `file://`
/// URL, or a plain filesystem path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceReference {
    pub location: String,
    /// Overrides the name derived from the location's last segment.
    pub file_name: Option<String>,
}

impl ResourceReference {
    pub fn new(location: &str) -> Self {
        Self {
            location: location.to_string(),
            file_name: None,
        }
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.file_name = Some(name.to_string());
        self
    }

    pub fn name(&self) -> String {
        if let Some(name) = &self.file_name {
            return name.clone();
        }
        let trimmed = self
            .location
            .split(['?', '#'])
            .next()
            .unwrap_or_default()
            .trim_end_matches('/');
        trimmed
            .rsplit(['/', '\\'])
            .next()
            .filter(|s| !s.is_empty())
            .unwrap_or("document")
            .to_string()
    }

    pub fn mime_type(&self) -> &'static str {
        mime_for(&self.name())
    }

    fn is_remote(&self) -> bool {
        self.location.starts_with("http://") || self.location.starts_with("https://")
    }
}

/// MIME type from a file name's extension.
pub fn mime_for(name: &str) -> &'static str {
    let extension = Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);

    match extension.as_deref() {
        Some("pdf") => "application/pdf",
        Some("docx") => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        Some("doc") => "application/msword",
        _ => "application/octet-stream",
    }
}

#[async_trait]
pub trait ResourceFetcher: Send + Sync {
    async fn fetch(&self, resource: &ResourceReference) -> Result<Vec<u8>, AutofillError>;
}

/// Fetches http(s) resources with reqwest and everything else from disk.
pub struct DefaultFetcher {
    client: reqwest::Client,
}

impl Default for DefaultFetcher {
    fn default() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl DefaultFetcher {
    async fn fetch_remote(&self, resource: &ResourceReference) -> Result<Vec<u8>, AutofillError> {
        let fail = |reason: String| AutofillError::ResourceFetch {
            resource: resource.location.clone(),
            reason,
        };

        let response = self
            .client
            .get(&resource.location)
            .send()
            .await
            .map_err(|e| fail(e.to_string()))?;

        if !response.status().is_success() {
            return Err(fail(format!("status {}", response.status())));
        }

        let bytes = response.bytes().await.map_err(|e| fail(e.to_string()))?;
        Ok(bytes.to_vec())
    }
}

#[async_trait]
impl ResourceFetcher for DefaultFetcher {
    async fn fetch(&self, resource: &ResourceReference) -> Result<Vec<u8>, AutofillError> {
        if resource.is_remote() {
            return self.fetch_remote(resource).await;
        }

        let path = resource
            .location
            .strip_prefix("file://")
            .unwrap_or(&resource.location);
        debug!(path, "reading resource from disk");

        tokio::fs::read(path)
            .await
            .map_err(|e| AutofillError::ResourceFetch {
                resource: resource.location.clone(),
                reason: e.to_string(),
            })
    }
}
