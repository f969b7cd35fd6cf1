/*
 *  image_loader.rs
 *
 *  MirrorBoard - worth the squeeze
 *	(c) 2020-26 Stuart Hunter
 *
 *	Image preloading - confirms a slide source is reachable before it is shown
 *
 *	This program is free software: you can redistribute it and/or modify
 *	it under the terms of the GNU General Public License as published by
 *	the Free Software Foundation, either version 3 of the License, or
 *	(at your option) any later version.
 *
 *	This program is distributed in the hope that it will be useful,
 *	but WITHOUT ANY WARRANTY; without even the implied warranty of
 *	MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 *	GNU General Public License for more details.
 *
 *	See <http://www.gnu.org/licenses/> to get a copy of the GNU General
 *	Public License.
 *
 */
use async_trait::async_trait;
use log::debug;
use reqwest::{Client, header};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use thiserror::Error;

use crate::constants::USER_AGENT;

/// Cross-origin mode for a remote load
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrossOrigin {
    /// send an Origin and insist on an Access-Control-Allow-Origin reply
    Anonymous,
    /// plain request, no origin checks
    None,
}

#[derive(Debug, Error)]
pub enum ImageLoadError {
    #[error("image request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("image request returned status {0}")]
    Status(u16),
    #[error("not an image ({0})")]
    NotAnImage(String),
    #[error("cross-origin load refused for {0}")]
    CrossOriginRefused(String),
    #[error("empty image {0}")]
    Empty(String),
    #[error("image {path} unreadable: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("image {0} is not a file")]
    NotAFile(String),
}

#[async_trait]
pub trait ImageLoader: Send + Sync {
    /// Resolves once `url` is known to be displayable
    async fn load(&self, url: &str, cross_origin: CrossOrigin) -> Result<(), ImageLoadError>;
}

pub fn is_remote(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

/// Append a cache-busting `random` parameter
pub fn cache_busted(url: &str) -> String {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default();
    let sep = if url.contains('?') { '&' } else { '?' };
    format!("{url}{sep}random={millis}")
}

/// Loads http(s) images with reqwest and local wallpaper files from disk
pub struct HttpImageLoader {
    client: Client,
    origin: String,
    base_dir: PathBuf,
}

const DEFAULT_ORIGIN: &str = "http://localhost";

impl HttpImageLoader {
    pub fn new(base_dir: impl Into<PathBuf>) -> Result<Self, ImageLoadError> {
        let mut headers = header::HeaderMap::new();
        headers.insert("User-Agent", header::HeaderValue::from_static(USER_AGENT));
        headers.insert("Accept", header::HeaderValue::from_static("image/avif,image/webp,image/*,*/*;q=0.8"));

        let client = Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .default_headers(headers)
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            origin: DEFAULT_ORIGIN.to_string(),
            base_dir: base_dir.into(),
        })
    }

    pub fn with_origin(mut self, origin: &str) -> Self {
        self.origin = origin.to_string();
        self
    }

    pub fn resolve_local(&self, url: &str) -> PathBuf {
        let path = Path::new(url);
        if path.is_absolute() { path.to_path_buf() } else { self.base_dir.join(path) }
    }

    async fn load_remote(&self, url: &str, cross_origin: CrossOrigin) -> Result<(), ImageLoadError> {
        let mut request = self.client.get(url);
        if cross_origin == CrossOrigin::Anonymous {
            request = request.header(header::ORIGIN, self.origin.as_str());
        }
        let response = request.send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ImageLoadError::Status(status.as_u16()));
        }

        let headers = response.headers();
        if cross_origin == CrossOrigin::Anonymous {
            let allowed = headers
                .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
                .and_then(|v| v.to_str().ok())
                .is_some_and(|v| v == "*" || v == self.origin);
            if !allowed {
                return Err(ImageLoadError::CrossOriginRefused(url.to_string()));
            }
        }

        let content_type = headers
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();
        if !content_type.starts_with("image/") {
            return Err(ImageLoadError::NotAnImage(content_type));
        }

        let body = response.bytes().await?;
        if body.is_empty() {
            return Err(ImageLoadError::Empty(url.to_string()));
        }
        debug!("Loaded {} ({} bytes, {})", url, body.len(), content_type);
        Ok(())
    }

    async fn load_local(&self, url: &str) -> Result<(), ImageLoadError> {
        let path = self.resolve_local(url);
        let meta = tokio::fs::metadata(&path).await.map_err(|source| ImageLoadError::Io {
            path: path.display().to_string(),
            source,
        })?;
        if !meta.is_file() {
            return Err(ImageLoadError::NotAFile(url.to_string()));
        }
        if meta.len() == 0 {
            return Err(ImageLoadError::Empty(url.to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl ImageLoader for HttpImageLoader {
    async fn load(&self, url: &str, cross_origin: CrossOrigin) -> Result<(), ImageLoadError> {
        if is_remote(url) {
            self.load_remote(url, cross_origin).await
        } else {
            self.load_local(url).await
        }
    }
}
