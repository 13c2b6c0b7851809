use super::domain::{Drive, DriveInfo, ImageConversion, Server, ServerInfo};
use super::wire;
use crate::core::http::{FallbackExt, RestClient};
use crate::domain::credentials::Credentials;
use crate::utils::error::Result;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::{Method, RequestBuilder};

pub const ELASTICHOSTS_LON_P: &str = "https://api-lon-p.elastichosts.com";
pub const CLOUDSIGMA_ZRH: &str = "https://api.zrh.cloudsigma.com";

/// Plain-text API shared by ElasticHosts and CloudSigma.
#[derive(Clone)]
pub struct ElasticStackClient {
    rest: RestClient,
    credentials: Credentials,
}

impl ElasticStackClient {
    pub fn new(endpoint: &str, credentials: Credentials) -> Result<Self> {
        Ok(Self {
            rest: RestClient::new(endpoint)?,
            credentials,
        })
    }

    fn request(&self, method: Method, path: &str) -> Result<RequestBuilder> {
        Ok(self
            .rest
            .request(method, path)?
            .basic_auth(&self.credentials.identity, Some(&self.credentials.credential))
            .header(ACCEPT, "text/plain"))
    }

    async fn text(&self, builder: RequestBuilder) -> Result<String> {
        Ok(self.rest.execute(builder).await?.text().await?)
    }

    async fn post_empty(&self, path: &str) -> Result<()> {
        tracing::debug!(path, ">> posting");
        self.rest.execute(self.request(Method::POST, path)?).await?;
        tracing::debug!(path, "<< posted");
        Ok(())
    }

    async fn post_text(&self, path: &str, body: String) -> Result<String> {
        let builder = self
            .request(Method::POST, path)?
            .header(CONTENT_TYPE, "text/plain")
            .body(body);
        self.text(builder).await
    }

    pub async fn list_servers(&self) -> Result<Vec<String>> {
        Ok(wire::split_lines(&self.text(self.request(Method::GET, "servers/list")?).await?))
    }

    pub async fn list_server_info(&self) -> Result<Vec<ServerInfo>> {
        let body = self.text(self.request(Method::GET, "servers/info")?).await?;
        wire::parse_records(&body).iter().map(wire::server_info_from_map).collect()
    }

    pub async fn get_server_info(&self, uuid: &str) -> Result<Option<ServerInfo>> {
        let path = format!("servers/{}/info", uuid);
        let Some(body) = self.text(self.request(Method::GET, &path)?).await.or_none_on_not_found()? else {
            return Ok(None);
        };
        wire::server_info_from_map(&wire::parse_single(&body, "server info")?).map(Some)
    }

    /// Creates the server without starting it.
    pub async fn create_server(&self, server: &Server) -> Result<ServerInfo> {
        self.post_server("servers/create/stopped", server).await
    }

    pub async fn create_and_start_server(&self, server: &Server) -> Result<ServerInfo> {
        self.post_server("servers/create", server).await
    }

    pub async fn set_server_configuration(&self, uuid: &str, server: &Server) -> Result<ServerInfo> {
        self.post_server(&format!("servers/{}/set", uuid), server).await
    }

    async fn post_server(&self, path: &str, server: &Server) -> Result<ServerInfo> {
        tracing::debug!(path, server = %server.name, ">> sending server");
        let body = self.post_text(path, wire::server_to_plain_text(server)).await?;
        let info = wire::server_info_from_map(&wire::parse_single(&body, "server info")?)?;
        tracing::debug!(path, uuid = %info.uuid, "<< server accepted");
        Ok(info)
    }

    pub async fn destroy_server(&self, uuid: &str) -> Result<()> {
        self.post_empty(&format!("servers/{}/destroy", uuid)).await
    }

    pub async fn start_server(&self, uuid: &str) -> Result<()> {
        self.post_empty(&format!("servers/{}/start", uuid)).await
    }

    pub async fn stop_server(&self, uuid: &str) -> Result<()> {
        self.post_empty(&format!("servers/{}/stop", uuid)).await
    }

    pub async fn shutdown_server(&self, uuid: &str) -> Result<()> {
        self.post_empty(&format!("servers/{}/shutdown", uuid)).await
    }

    pub async fn reset_server(&self, uuid: &str) -> Result<()> {
        self.post_empty(&format!("servers/{}/reset", uuid)).await
    }

    pub async fn list_drives(&self) -> Result<Vec<String>> {
        Ok(wire::split_lines(&self.text(self.request(Method::GET, "drives/list")?).await?))
    }

    pub async fn list_drive_info(&self) -> Result<Vec<DriveInfo>> {
        let body = self.text(self.request(Method::GET, "drives/info")?).await?;
        wire::parse_records(&body).iter().map(wire::drive_info_from_map).collect()
    }

    pub async fn get_drive_info(&self, uuid: &str) -> Result<Option<DriveInfo>> {
        let path = format!("drives/{}/info", uuid);
        let Some(body) = self.text(self.request(Method::GET, &path)?).await.or_none_on_not_found()? else {
            return Ok(None);
        };
        wire::drive_info_from_map(&wire::parse_single(&body, "drive info")?).map(Some)
    }

    pub async fn create_drive(&self, drive: &Drive) -> Result<DriveInfo> {
        tracing::debug!(drive = %drive.name, size = drive.size, ">> creating drive");
        let body = self.post_text("drives/create", wire::drive_to_plain_text(drive)).await?;
        let info = wire::drive_info_from_map(&wire::parse_single(&body, "drive info")?)?;
        tracing::debug!(uuid = %info.uuid, "<< created drive");
        Ok(info)
    }

    pub async fn set_drive_data(&self, uuid: &str, drive: &Drive) -> Result<DriveInfo> {
        let body = self
            .post_text(&format!("drives/{}/set", uuid), wire::drive_to_plain_text(drive))
            .await?;
        wire::drive_info_from_map(&wire::parse_single(&body, "drive info")?)
    }

    pub async fn destroy_drive(&self, uuid: &str) -> Result<()> {
        self.post_empty(&format!("drives/{}/destroy", uuid)).await
    }

    /// Copies `source` onto `destination`; the copy continues in the background.
    pub async fn image_drive(&self, source: &str, destination: &str) -> Result<()> {
        self.image_drive_with_conversion(source, destination, None).await
    }

    pub async fn image_drive_with_conversion(
        &self,
        source: &str,
        destination: &str,
        conversion: Option<ImageConversion>,
    ) -> Result<()> {
        let mut path = format!("drives/{}/image/{}", destination, source);
        if let Some(ImageConversion::Gunzip) = conversion {
            path.push_str("/gunzip");
        }
        self.post_empty(&path).await
    }

    pub async fn read_drive(&self, uuid: &str, offset: u64, size: u64) -> Result<Vec<u8>> {
        let builder = self.request(Method::POST, &format!("drives/{}/read/{}/{}", uuid, offset, size))?;
        Ok(self.rest.execute(builder).await?.bytes().await?.to_vec())
    }

    pub async fn write_drive(&self, uuid: &str, payload: Vec<u8>, offset: Option<u64>) -> Result<()> {
        let path = match offset {
            Some(offset) => format!("drives/{}/write/{}", uuid, offset),
            None => format!("drives/{}/write", uuid),
        };
        let builder = self
            .request(Method::POST, &path)?
            .header(CONTENT_TYPE, "application/octet-stream")
            .body(payload);
        self.rest.execute(builder).await?;
        Ok(())
    }
}
