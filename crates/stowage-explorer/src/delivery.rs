//! Content delivery
//!
//! Turns file content or a redirect decision into an HTTP response. Direct serving
//! honours single byte ranges, `If-Range` and `If-Modified-Since`.

use std::io::SeekFrom;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use axum::body::Body;
use axum::response::{IntoResponse, Response};
use chrono::{DateTime, Utc};
use http::{header, HeaderMap, HeaderValue, StatusCode};
use httpdate::{fmt_http_date, parse_http_date};
use percent_encoding::utf8_percent_encode;
use stowage_core::AppError;
use stowage_storage::FileContent;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio_util::io::ReaderStream;

use crate::issuer::PATH_SEGMENT;

/// How a piece of content is presented to the client.
#[derive(Debug, Clone, Default)]
pub struct ServeOptions {
    /// Client-visible name, used to guess the content type.
    pub name: String,
    pub last_modified: Option<DateTime<Utc>>,
    /// `Content-Disposition` value, if any.
    pub disposition: Option<String>,
    /// Forbid caching of the response.
    pub no_cache: bool,
    /// Overrides the guessed content type.
    pub content_type: Option<String>,
}

impl ServeOptions {
    pub fn new(name: impl Into<String>, last_modified: Option<DateTime<Utc>>) -> Self {
        Self {
            name: name.into(),
            last_modified,
            ..Self::default()
        }
    }

    pub fn attachment(mut self, file_name: Option<&str>) -> Self {
        self.disposition = Some(attachment_disposition(file_name));
        self
    }

    pub fn no_cache(mut self) -> Self {
        self.no_cache = true;
        self
    }

    pub fn content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }
}

/// `Content-Disposition` forcing a download, optionally naming the file.
pub fn attachment_disposition(file_name: Option<&str>) -> String {
    match file_name {
        Some(name) => format!(
            "attachment; filename=\"{}\"",
            utf8_percent_encode(name, PATH_SEGMENT)
        ),
        None => "attachment;".to_string(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ByteRange {
    Full,
    Partial { start: u64, end: u64 },
    Unsatisfiable,
}

/// Interpret a `Range` header against `size` bytes of content.
///
/// Malformed values and multi-range requests fall back to the full body.
fn parse_range(value: Option<&HeaderValue>, size: u64) -> ByteRange {
    let Some(range) = value
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().strip_prefix("bytes="))
    else {
        return ByteRange::Full;
    };
    if range.contains(',') {
        return ByteRange::Full;
    }
    let Some((start_part, end_part)) = range.split_once('-') else {
        return ByteRange::Full;
    };
    let (start_part, end_part) = (start_part.trim(), end_part.trim());

    let (start, end) = if start_part.is_empty() {
        let Ok(suffix) = end_part.parse::<u64>() else {
            return ByteRange::Full;
        };
        if suffix == 0 || size == 0 {
            return ByteRange::Unsatisfiable;
        }
        (size.saturating_sub(suffix), size - 1)
    } else {
        let Ok(start) = start_part.parse::<u64>() else {
            return ByteRange::Full;
        };
        let end = if end_part.is_empty() {
            size.saturating_sub(1)
        } else {
            match end_part.parse::<u64>() {
                Ok(end) => end.min(size.saturating_sub(1)),
                Err(_) => return ByteRange::Full,
            }
        };
        (start, end)
    };

    if size == 0 || start >= size || start > end {
        return ByteRange::Unsatisfiable;
    }
    ByteRange::Partial { start, end }
}

fn to_system_time(time: DateTime<Utc>) -> SystemTime {
    UNIX_EPOCH + Duration::from_secs(time.timestamp().max(0) as u64)
}

fn header_value(value: &str) -> Result<HeaderValue, AppError> {
    HeaderValue::from_str(value)
        .map_err(|_| AppError::Internal(format!("invalid header value {:?}", value)))
}

/// Serve `content` to a client that sent `request_headers`.
///
/// Ownership of the reader moves into the response body, or it is dropped when the
/// response carries no body.
pub async fn serve_content(
    request_headers: &HeaderMap,
    content: FileContent,
    options: &ServeOptions,
) -> Result<Response, AppError> {
    let FileContent { mut reader, size } = content;
    let modified = options.last_modified.map(to_system_time);

    let mut headers = HeaderMap::new();
    let content_type = match &options.content_type {
        Some(content_type) => content_type.clone(),
        None => mime_guess::from_path(&options.name)
            .first_or_octet_stream()
            .essence_str()
            .to_string(),
    };
    headers.insert(header::CONTENT_TYPE, header_value(&content_type)?);
    headers.insert(header::ACCEPT_RANGES, HeaderValue::from_static("bytes"));
    if let Some(modified) = modified {
        headers.insert(header::LAST_MODIFIED, header_value(&fmt_http_date(modified))?);
    }
    if let Some(disposition) = &options.disposition {
        headers.insert(header::CONTENT_DISPOSITION, header_value(disposition)?);
    }
    if options.no_cache {
        headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    }

    let not_modified = match (
        modified,
        request_headers
            .get(header::IF_MODIFIED_SINCE)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| parse_http_date(value).ok()),
    ) {
        (Some(modified), Some(since)) => modified <= since,
        _ => false,
    };
    if not_modified {
        return Ok((StatusCode::NOT_MODIFIED, headers).into_response());
    }

    let if_range_matches = match request_headers
        .get(header::IF_RANGE)
        .and_then(|value| value.to_str().ok())
    {
        Some(value) => match parse_http_date(value) {
            Ok(date) => modified.map(|ts| ts <= date).unwrap_or(false),
            Err(_) => false,
        },
        None => true,
    };
    let range = if if_range_matches {
        parse_range(request_headers.get(header::RANGE), size)
    } else {
        ByteRange::Full
    };

    match range {
        ByteRange::Unsatisfiable => {
            headers.insert(header::CONTENT_RANGE, header_value(&format!("bytes */{}", size))?);
            Ok((StatusCode::RANGE_NOT_SATISFIABLE, headers).into_response())
        }
        ByteRange::Partial { start, end } => {
            let length = end - start + 1;
            tracing::debug!(name = %options.name, start, end, length, "Range request accepted");
            reader.seek(SeekFrom::Start(start)).await?;
            headers.insert(
                header::CONTENT_RANGE,
                header_value(&format!("bytes {}-{}/{}", start, end, size))?,
            );
            headers.insert(header::CONTENT_LENGTH, HeaderValue::from(length));
            let stream = ReaderStream::new(reader.take(length));
            Ok((StatusCode::PARTIAL_CONTENT, headers, Body::from_stream(stream)).into_response())
        }
        ByteRange::Full => {
            headers.insert(header::CONTENT_LENGTH, HeaderValue::from(size));
            let stream = ReaderStream::new(reader.take(size));
            Ok((StatusCode::OK, headers, Body::from_stream(stream)).into_response())
        }
    }
}

/// Redirect to `url`, letting the client cache the redirect for `max_age` seconds.
pub fn redirect(status: StatusCode, url: &str, max_age: Option<u64>) -> Result<Response, AppError> {
    let mut headers = HeaderMap::new();
    headers.insert(header::LOCATION, header_value(url)?);
    if let Some(max_age) = max_age {
        headers.insert(
            header::CACHE_CONTROL,
            header_value(&format!("max-age={}", max_age))?,
        );
    }
    Ok((status, headers).into_response())
}
