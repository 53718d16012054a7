use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::error::FetchError;

/// Upper bound on a map source download.
const MAX_SOURCE_BYTES: u64 = 64 * 1024 * 1024;
const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Where a source string points.
#[derive(Debug, PartialEq, Eq)]
enum SourceLocation<'a> {
    Http(&'a str),
    File(&'a str),
}

fn locate(source: &str) -> Result<SourceLocation<'_>, FetchError> {
    if source.starts_with("http://") || source.starts_with("https://") {
        Ok(SourceLocation::Http(source))
    } else if let Some(path) = source.strip_prefix("file://") {
        Ok(SourceLocation::File(path))
    } else if source.contains("://") {
        Err(FetchError::UnsupportedScheme(source.to_string()))
    } else {
        Ok(SourceLocation::File(source))
    }
}

/// Fetch the raw bytes of a source. Blocking; call from a worker thread.
pub fn fetch_bytes(source: &str) -> Result<Arc<[u8]>, FetchError> {
    match locate(source)? {
        SourceLocation::Http(url) => {
            // Non-2xx statuses surface as `ureq::Error::StatusCode`
            let agent: ureq::Agent = ureq::Agent::config_builder()
                .timeout_global(Some(FETCH_TIMEOUT))
                .build()
                .into();
            let mut response = agent.get(url).call()?;
            let bytes = response
                .body_mut()
                .with_config()
                .limit(MAX_SOURCE_BYTES)
                .read_to_vec()?;
            log::debug!("Fetched {} bytes from {url}", bytes.len());
            Ok(Arc::from(bytes))
        }
        SourceLocation::File(path) => {
            let bytes = std::fs::read(Path::new(path))?;
            log::debug!("Read {} bytes from {path}", bytes.len());
            Ok(Arc::from(bytes))
        }
    }
}
