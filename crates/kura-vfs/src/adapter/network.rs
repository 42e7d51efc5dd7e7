//! Network-backed adapter.
//!
//! Each operation becomes exactly one request to `<base_url>/<endpoint>`.
//! Queries go out as GET, mutations as POST, and file content is uploaded
//! as a dedicated body variant. The HTTP client itself lives behind the
//! [`Transport`] trait so the adapter only shapes requests and decodes
//! responses.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::json;
use std::sync::Arc;

use super::Adapter;
use crate::error::{VfsError, VfsResult};
use crate::types::{
    DEFAULT_MIME, Download, FileRecord, ListOptions, Options, RawPayload, Representation,
};

/// Request method.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

/// Request body.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    /// JSON arguments.
    Json(serde_json::Value),
    /// File upload (multipart on the wire).
    Upload {
        path: String,
        data: Vec<u8>,
        options: Options,
    },
}

/// One outbound request.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteRequest {
    pub url: String,
    pub method: Method,
    pub body: RequestBody,
}

/// Structured response handed back by a [`Transport`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemoteResponse {
    pub status: u16,
    /// Header name/value pairs as received.
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl RemoteResponse {
    /// 200 response with a JSON body.
    pub fn json(value: &serde_json::Value) -> Self {
        Self {
            status: 200,
            headers: vec![("content-type".into(), "application/json".into())],
            body: value.to_string().into_bytes(),
        }
    }

    /// 200 response with a binary body.
    pub fn bytes(content_type: impl Into<String>, body: Vec<u8>) -> Self {
        Self {
            status: 200,
            headers: vec![("content-type".into(), content_type.into())],
            body,
        }
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Returns true for 2xx statuses.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Opaque request function used by [`NetworkAdapter`].
///
/// Implementations own connection handling, timeouts and retries.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn request(&self, request: RemoteRequest) -> VfsResult<RemoteResponse>;
}

/// Adapter that forwards every operation to a remote VFS endpoint.
pub struct NetworkAdapter {
    transport: Arc<dyn Transport>,
    base_url: String,
}

impl std::fmt::Debug for NetworkAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NetworkAdapter")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl NetworkAdapter {
    /// Create an adapter talking to `base_url` (e.g. `http://host/vfs`).
    pub fn new(transport: Arc<dyn Transport>, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            transport,
            base_url,
        }
    }

    /// The endpoint base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn call(
        &self,
        endpoint: &str,
        method: Method,
        body: RequestBody,
    ) -> VfsResult<RemoteResponse> {
        let request = RemoteRequest {
            url: format!("{}/{}", self.base_url, endpoint),
            method,
            body,
        };
        tracing::trace!(url = %request.url, ?method, "vfs request");

        let response = self.transport.request(request).await?;
        if !response.is_success() {
            return Err(VfsError::Remote {
                status: response.status,
                message: String::from_utf8_lossy(&response.body).into_owned(),
            });
        }
        Ok(response)
    }

    async fn call_json<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        method: Method,
        args: serde_json::Value,
    ) -> VfsResult<T> {
        let response = self.call(endpoint, method, RequestBody::Json(args)).await?;
        serde_json::from_slice(&response.body)
            .map_err(|e| VfsError::decode(format!("{endpoint}: {e}")))
    }

    async fn call_records(
        &self,
        endpoint: &str,
        args: serde_json::Value,
    ) -> VfsResult<Vec<FileRecord>> {
        let records: Vec<FileRecord> = self.call_json(endpoint, Method::Get, args).await?;
        Ok(records
            .into_iter()
            .map(FileRecord::with_consistent_kind)
            .collect())
    }

    fn readfile_url(&self, query: &str) -> String {
        format!("{}/readfile?{}", self.base_url, query)
    }
}

#[async_trait]
impl Adapter for NetworkAdapter {
    async fn list(&self, path: &str, options: &ListOptions) -> VfsResult<Vec<FileRecord>> {
        self.call_records("readdir", json!({ "path": path, "options": options.extra }))
            .await
    }

    async fn read_bytes(
        &self,
        path: &str,
        _representation: Representation,
        options: &Options,
    ) -> VfsResult<RawPayload> {
        let response = self
            .call(
                "readfile",
                Method::Get,
                RequestBody::Json(json!({ "path": path, "options": options })),
            )
            .await?;
        let mime = response
            .header("content-type")
            .filter(|v| !v.is_empty())
            .unwrap_or(DEFAULT_MIME)
            .to_string();
        Ok(RawPayload::new(mime, response.body))
    }

    async fn write_bytes(&self, path: &str, data: Vec<u8>, options: &Options) -> VfsResult<i64> {
        let body = RequestBody::Upload {
            path: path.to_string(),
            data,
            options: options.clone(),
        };
        let response = self.call("writefile", Method::Post, body).await?;
        serde_json::from_slice(&response.body)
            .map_err(|e| VfsError::decode(format!("writefile: {e}")))
    }

    async fn copy(&self, from: &str, to: &str, options: &Options) -> VfsResult<bool> {
        self.call_json(
            "copy",
            Method::Post,
            json!({ "from": from, "to": to, "options": options }),
        )
        .await
    }

    async fn rename(&self, from: &str, to: &str, options: &Options) -> VfsResult<bool> {
        self.call_json(
            "rename",
            Method::Post,
            json!({ "from": from, "to": to, "options": options }),
        )
        .await
    }

    async fn create_directory(&self, path: &str, options: &Options) -> VfsResult<bool> {
        self.call_json("mkdir", Method::Post, json!({ "path": path, "options": options }))
            .await
    }

    async fn delete(&self, path: &str, options: &Options) -> VfsResult<bool> {
        self.call_json("unlink", Method::Post, json!({ "path": path, "options": options }))
            .await
    }

    async fn exists(&self, path: &str, options: &Options) -> VfsResult<bool> {
        self.call_json("exists", Method::Get, json!({ "path": path, "options": options }))
            .await
    }

    async fn stat(&self, path: &str, options: &Options) -> VfsResult<FileRecord> {
        let record: FileRecord = self
            .call_json("stat", Method::Get, json!({ "path": path, "options": options }))
            .await?;
        Ok(record.with_consistent_kind())
    }

    async fn resolve_url(&self, path: &str, _options: &Options) -> VfsResult<Option<String>> {
        if path.is_empty() {
            return Ok(None);
        }
        Ok(Some(
            self.readfile_url(&format!("path={}", encode_uri_component(path))),
        ))
    }

    async fn search(
        &self,
        root: &str,
        pattern: &str,
        options: &ListOptions,
    ) -> VfsResult<Vec<FileRecord>> {
        self.call_records(
            "search",
            json!({ "root": root, "pattern": pattern, "options": options.extra }),
        )
        .await
    }

    async fn touch(&self, path: &str, options: &Options) -> VfsResult<bool> {
        self.call_json("touch", Method::Post, json!({ "path": path, "options": options }))
            .await
    }

    async fn download(&self, path: &str, _options: &Options) -> VfsResult<Download> {
        let options = json!({ "path": path, "download": true }).to_string();
        Ok(Download::Url(self.readfile_url(&format!(
            "options={}",
            encode_uri_component(&options)
        ))))
    }
}

/// Percent-encode everything except the URI-component unreserved set.
fn encode_uri_component(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for b in s.bytes() {
        match b {
            b'A'..=b'Z'
            | b'a'..=b'z'
            | b'0'..=b'9'
            | b'-'
            | b'_'
            | b'.'
            | b'!'
            | b'~'
            | b'*'
            | b'\''
            | b'('
            | b')' => out.push(b as char),
            _ => out.push_str(&format!("%{b:02X}")),
        }
    }
    out
}
