use super::domain::{AtmosObject, BoundedSet, ContentMetadata, DirectoryEntry, ListOptions, PutOptions, SystemMetadata};
use super::signer::AtmosSigner;
use super::xml;
use crate::core::blob_utils::md5_etag;
use crate::core::http::{map_status_error, FallbackExt, RestClient};
use crate::domain::blob::{ByteRange, GetOptions, DEFAULT_CONTENT_TYPE};
use crate::domain::credentials::Credentials;
use crate::utils::error::{CloudError, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use reqwest::header::{HeaderMap, ACCEPT, CONTENT_LENGTH, CONTENT_TYPE, LOCATION, RANGE};
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use url::Url;

pub const DEFAULT_ENDPOINT: &str = "https://accesspoint.atmosonline.com";

const NAMESPACE: &str = "rest/namespace";
const CONTENT_MD5: &str = "content-md5";
const EMC_LIMIT: &str = "x-emc-limit";
const EMC_TOKEN: &str = "x-emc-token";
const EMC_META: &str = "x-emc-meta";
const EMC_LISTABLE_META: &str = "x-emc-listable-meta";
const EMC_TAGS: &str = "x-emc-tags";
const EMC_LISTABLE_TAGS: &str = "x-emc-listable-tags";
const EMC_GROUPACL: &str = "x-emc-groupacl";
const EMC_USERACL: &str = "x-emc-useracl";

/// Maps `<Error><Code>` bodies onto domain errors before falling back to the status.
pub fn atmos_error(status: StatusCode, method: &Method, url: &Url, body: String) -> CloudError {
    let Some(error) = xml::parse_error(&body) else {
        return map_status_error(status, method, url, body);
    };
    match error.code {
        1003 => CloudError::ResourceNotFound {
            resource: url.path().to_string(),
        },
        1016 => CloudError::AlreadyExists {
            resource: url.path().to_string(),
        },
        1032 | 1033 => CloudError::Unauthorized {
            message: error.message,
        },
        _ => map_status_error(status, method, url, format!("atmos error {}: {}", error.code, error.message)),
    }
}

/// Path-addressed client for the Atmos namespace interface.
#[derive(Clone)]
pub struct AtmosClient {
    rest: RestClient,
    signer: AtmosSigner,
}

impl AtmosClient {
    pub fn new(endpoint: &str, credentials: &Credentials) -> Result<Self> {
        let rest = RestClient::new(endpoint)?.with_error_handler(atmos_error);
        Ok(Self {
            rest,
            signer: AtmosSigner::new(credentials)?,
        })
    }

    pub fn with_signer(mut self, signer: AtmosSigner) -> Self {
        self.signer = signer;
        self
    }

    fn request(&self, method: Method, path: &str) -> Result<RequestBuilder> {
        self.rest
            .request(method, &format!("{}/{}", NAMESPACE, path.trim_start_matches('/')))
    }

    async fn call(&self, builder: RequestBuilder) -> Result<Response> {
        let mut request = builder.build()?;
        self.signer.sign(&mut request)?;
        self.rest.send(request).await
    }

    pub async fn list_directories(&self, options: &ListOptions) -> Result<BoundedSet<DirectoryEntry>> {
        self.list_path("", options).await
    }

    pub async fn list_directory(&self, directory: &str, options: &ListOptions) -> Result<BoundedSet<DirectoryEntry>> {
        self.list_path(&directory_path(directory), options).await
    }

    async fn list_path(&self, path: &str, options: &ListOptions) -> Result<BoundedSet<DirectoryEntry>> {
        let mut builder = self.request(Method::GET, path)?.header(ACCEPT, "text/xml");
        if let Some(limit) = options.limit {
            builder = builder.header(EMC_LIMIT, limit.to_string());
        }
        if let Some(token) = &options.token {
            builder = builder.header(EMC_TOKEN, token.as_str());
        }
        let response = self.call(builder).await?;
        let token = header_string(response.headers(), EMC_TOKEN).filter(|t| !t.is_empty());
        let body = response.text().await?;
        Ok(BoundedSet {
            items: xml::parse_directory_listing(&body)?,
            token,
        })
    }

    /// Returns the new directory's object location, or `None` when it already existed.
    pub async fn create_directory(&self, directory: &str) -> Result<Option<String>> {
        let path = directory_path(directory);
        tracing::debug!(directory = %path, ">> creating directory");
        let builder = self
            .request(Method::POST, &path)?
            .header(ACCEPT, "*/*")
            .header(CONTENT_TYPE, DEFAULT_CONTENT_TYPE)
            .body(Vec::new());
        match self.call(builder).await {
            Ok(response) => {
                let location = header_string(response.headers(), LOCATION.as_str());
                tracing::debug!(directory = %path, ?location, "<< created directory");
                Ok(location)
            }
            Err(CloudError::AlreadyExists { .. }) => {
                tracing::debug!(directory = %path, "<< directory already exists");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    pub async fn create_file(&self, parent: &str, object: &AtmosObject, options: PutOptions) -> Result<Option<String>> {
        self.upload(Method::POST, parent, object, options).await
    }

    pub async fn update_file(&self, parent: &str, object: &AtmosObject, options: PutOptions) -> Result<Option<String>> {
        self.upload(Method::PUT, parent, object, options).await
    }

    async fn upload(&self, method: Method, parent: &str, object: &AtmosObject, options: PutOptions) -> Result<Option<String>> {
        let path = file_path(parent, &object.content_metadata.name);
        let content = &object.content_metadata;
        let digest = content
            .content_md5
            .clone()
            .unwrap_or_else(|| md5_etag(&object.payload).0);

        let mut builder = self
            .request(method.clone(), &path)?
            .header(ACCEPT, "*/*")
            .header(
                CONTENT_TYPE,
                content.content_type.as_deref().unwrap_or(DEFAULT_CONTENT_TYPE),
            )
            .header(CONTENT_MD5, STANDARD.encode(&digest));
        if let Some(meta) = xml::render_meta_header(&object.user_metadata.metadata) {
            builder = builder.header(EMC_META, meta);
        }
        if let Some(meta) = xml::render_meta_header(&object.user_metadata.listable_metadata) {
            builder = builder.header(EMC_LISTABLE_META, meta);
        }
        if !object.user_metadata.tags.is_empty() {
            builder = builder.header(EMC_TAGS, object.user_metadata.tags.join(","));
        }
        if !object.user_metadata.listable_tags.is_empty() {
            builder = builder.header(EMC_LISTABLE_TAGS, object.user_metadata.listable_tags.join(","));
        }
        if options.public_read {
            builder = builder
                .header(EMC_GROUPACL, "other=READ")
                .header(EMC_USERACL, "root=FULL_CONTROL");
        }

        tracing::debug!(%method, path = %path, size = object.payload.len(), ">> uploading file");
        let response = self.call(builder.body(object.payload.clone())).await?;
        tracing::debug!(%method, path = %path, "<< uploaded file");
        Ok(header_string(response.headers(), LOCATION.as_str()))
    }

    pub async fn read_file(&self, path: &str, options: &GetOptions) -> Result<Option<AtmosObject>> {
        let mut builder = self.request(Method::GET, path)?;
        if let Some(range) = ByteRange::header_value(&options.ranges) {
            builder = builder.header(RANGE, range);
        }
        let result = async {
            let response = self.call(builder).await?;
            let headers = response.headers().clone();
            let payload = response.bytes().await?.to_vec();
            Ok::<_, CloudError>(object_from_headers(path, &headers, payload))
        }
        .await;
        result.or_none_on_not_found()
    }

    pub async fn head_file(&self, path: &str) -> Result<Option<AtmosObject>> {
        let builder = self.request(Method::HEAD, path)?;
        self.call(builder)
            .await
            .map(|response| object_from_headers(path, response.headers(), Vec::new()))
            .or_none_on_not_found()
    }

    pub async fn get_system_metadata(&self, path: &str) -> Result<Option<SystemMetadata>> {
        Ok(self.head_file(path).await?.and_then(|o| o.system_metadata))
    }

    pub async fn delete_path(&self, path: &str) -> Result<()> {
        tracing::debug!(path, ">> deleting path");
        let builder = self.request(Method::DELETE, path)?;
        self.call(builder).await.or_void_on_not_found()?;
        tracing::debug!(path, "<< deleted path");
        Ok(())
    }

    pub async fn path_exists(&self, path: &str) -> Result<bool> {
        let builder = self.request(Method::HEAD, path)?;
        self.call(builder).await.or_false_on_not_found()
    }

    /// True when the group ACL grants `other` read access.
    pub async fn is_public(&self, path: &str) -> Result<bool> {
        let builder = self.request(Method::HEAD, path)?;
        let Some(response) = self.call(builder).await.or_none_on_not_found()? else {
            return Ok(false);
        };
        Ok(header_string(response.headers(), EMC_GROUPACL)
            .map(|acl| {
                acl.split(',')
                    .any(|grant| grant.trim().eq_ignore_ascii_case("other=READ"))
            })
            .unwrap_or(false))
    }
}

/// `name/`, the trailing slash marking a directory.
pub fn directory_path(directory: &str) -> String {
    let trimmed = directory.trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("{}/", trimmed)
    }
}

pub fn file_path(parent: &str, name: &str) -> String {
    let parent = parent.trim_matches('/');
    if parent.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", parent, name.trim_start_matches('/'))
    }
}

fn header_string(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim().to_string())
}

fn split_list(value: Option<String>) -> Vec<String> {
    value
        .map(|v| {
            v.split(',')
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty())
                .collect()
        })
        .unwrap_or_default()
}

fn object_from_headers(path: &str, headers: &HeaderMap, payload: Vec<u8>) -> AtmosObject {
    let meta = header_string(headers, EMC_META)
        .map(|m| xml::parse_meta_header(&m))
        .unwrap_or_default();
    let listable = header_string(headers, EMC_LISTABLE_META);
    let mut user_metadata = xml::parse_user_metadata(&meta, listable.as_deref());
    user_metadata.tags = split_list(header_string(headers, EMC_TAGS));
    user_metadata.listable_tags = split_list(header_string(headers, EMC_LISTABLE_TAGS));

    let name = path.trim_end_matches('/').rsplit('/').next().unwrap_or(path).to_string();
    AtmosObject {
        content_metadata: ContentMetadata {
            name,
            content_type: header_string(headers, CONTENT_TYPE.as_str()),
            content_length: header_string(headers, CONTENT_LENGTH.as_str()).and_then(|v| v.parse().ok()),
            content_md5: header_string(headers, CONTENT_MD5).and_then(|v| STANDARD.decode(v).ok()),
        },
        system_metadata: (!meta.is_empty()).then(|| xml::parse_system_metadata(&meta)),
        user_metadata,
        payload,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths() {
        assert_eq!(directory_path("dir"), "dir/");
        assert_eq!(directory_path("/dir/"), "dir/");
        assert_eq!(directory_path(""), "");
        assert_eq!(file_path("dir", "hello"), "dir/hello");
        assert_eq!(file_path("", "hello"), "hello");
    }

    #[test]
    fn test_error_codes() {
        let url = Url::parse("https://accesspoint.atmosonline.com/rest/namespace/dir/").unwrap();
        let body = |code: u32| format!("<Error><Code>{}</Code><Message>m</Message></Error>", code);

        let err = atmos_error(StatusCode::BAD_REQUEST, &Method::POST, &url, body(1016));
        assert!(matches!(err, CloudError::AlreadyExists { .. }));
        let err = atmos_error(StatusCode::BAD_REQUEST, &Method::GET, &url, body(1003));
        assert!(err.is_not_found());
        let err = atmos_error(StatusCode::FORBIDDEN, &Method::GET, &url, body(1032));
        assert!(matches!(err, CloudError::Unauthorized { .. }));
        let err = atmos_error(StatusCode::INTERNAL_SERVER_ERROR, &Method::GET, &url, body(1001));
        assert!(matches!(err, CloudError::HttpResponse { status: 500, .. }));
        let err = atmos_error(StatusCode::NOT_FOUND, &Method::GET, &url, String::new());
        assert!(err.is_not_found());
    }

    #[test]
    fn test_object_from_headers() {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, "text/plain".parse().unwrap());
        headers.insert(CONTENT_LENGTH, "5".parse().unwrap());
        headers.insert(EMC_META, "size=5, type=regular, color=blue".parse().unwrap());
        headers.insert(EMC_TAGS, "a, b".parse().unwrap());

        let object = object_from_headers("dir/hello", &headers, b"hello".to_vec());
        assert_eq!(object.content_metadata.name, "hello");
        assert_eq!(object.content_metadata.content_length, Some(5));
        assert_eq!(object.system_metadata.unwrap().size, Some(5));
        assert_eq!(object.user_metadata.metadata.get("color").map(String::as_str), Some("blue"));
        assert_eq!(object.user_metadata.tags, vec!["a", "b"]);
    }
}
