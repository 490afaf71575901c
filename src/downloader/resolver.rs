// Metadata resolution with playlist URL canonicalization

use std::sync::Arc;

use url::Url;

use super::errors::Result;
use super::models::{MediaDescriptor, PlaylistDescriptor};
use super::traits::MediaProvider;

/// Thin layer over the active [`MediaProvider`] that owns URL handling.
#[derive(Clone)]
pub struct MetadataResolver {
    provider: Arc<dyn MediaProvider>,
}

impl MetadataResolver {
    pub fn new(provider: Arc<dyn MediaProvider>) -> Self {
        Self { provider }
    }

    pub async fn resolve_video(&self, url: &str) -> Result<MediaDescriptor> {
        self.provider.fetch_video(url).await
    }

    /// Query the canonical playlist URL first. If that fails, the original
    /// URL gets exactly one more try and its error is the one surfaced.
    pub async fn resolve_playlist(&self, url: &str) -> Result<PlaylistDescriptor> {
        let canonical = match canonical_playlist_url(url) {
            Some(canonical) if canonical != url => canonical,
            _ => return self.provider.fetch_playlist(url).await,
        };

        match self.provider.fetch_playlist(&canonical).await {
            Ok(playlist) => Ok(playlist),
            Err(e) => {
                tracing::debug!(
                    canonical = %canonical,
                    error = %e,
                    "canonical playlist URL failed, retrying original"
                );
                self.provider.fetch_playlist(url).await
            }
        }
    }
}

/// `https://host/watch?v=X&list=ID` becomes `https://host/playlist?list=ID`.
///
/// Returns `None` when the URL does not parse or carries no `list` value.
pub fn canonical_playlist_url(url: &str) -> Option<String> {
    let parsed = Url::parse(url.trim()).ok()?;
    let list_id = parsed
        .query_pairs()
        .find(|(key, value)| key == "list" && !value.is_empty())
        .map(|(_, value)| value.into_owned())?;

    let mut canonical = parsed;
    canonical.set_path("/playlist");
    canonical.set_fragment(None);
    canonical.set_query(None);
    canonical.query_pairs_mut().append_pair("list", &list_id);

    Some(canonical.to_string())
}
