use crate::domain::credentials::Credentials;
use crate::utils::error::{CloudError, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE, DATE, RANGE};
use reqwest::Request;
use sha1::Sha1;

type HmacSha1 = Hmac<Sha1>;

pub const EMC_DATE: &str = "x-emc-date";
pub const EMC_UID: &str = "x-emc-uid";
pub const EMC_SIGNATURE: &str = "x-emc-signature";

/// Source of the request timestamp.
pub type Clock = fn() -> DateTime<Utc>;

/// Shared-secret request signing: HMAC-SHA1 over the canonical request.
#[derive(Clone)]
pub struct AtmosSigner {
    uid: String,
    key: Vec<u8>,
    clock: Clock,
}

impl std::fmt::Debug for AtmosSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AtmosSigner").field("uid", &self.uid).finish()
    }
}

impl AtmosSigner {
    /// The credential is the base64 shared secret issued with the uid.
    pub fn new(credentials: &Credentials) -> Result<Self> {
        let key = STANDARD
            .decode(credentials.credential.trim())
            .map_err(|e| CloudError::InvalidConfigValueError {
                field: "provider.credential".to_string(),
                value: "<redacted>".to_string(),
                reason: format!("shared secret is not valid base64: {}", e),
            })?;
        Ok(Self {
            uid: credentials.identity.clone(),
            key,
            clock: Utc::now,
        })
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn format_date(date: DateTime<Utc>) -> String {
        date.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
    }

    /// Stamps the date and uid headers, then adds the signature over them.
    pub fn sign(&self, request: &mut Request) -> Result<()> {
        let date = Self::format_date((self.clock)());
        let headers = request.headers_mut();
        headers.insert(DATE, header_value(&date)?);
        headers.insert(HeaderName::from_static(EMC_DATE), header_value(&date)?);
        headers.insert(HeaderName::from_static(EMC_UID), header_value(&self.uid)?);

        let to_sign = string_to_sign(request.method().as_str(), request.url().path(), request.headers());
        let signature = self.signature(&to_sign)?;
        tracing::trace!(string_to_sign = %to_sign, "signed atmos request");
        request
            .headers_mut()
            .insert(HeaderName::from_static(EMC_SIGNATURE), header_value(&signature)?);
        Ok(())
    }

    pub fn signature(&self, to_sign: &str) -> Result<String> {
        let mut mac = HmacSha1::new_from_slice(&self.key)
            .map_err(|e| CloudError::invalid_argument(format!("signing key: {}", e)))?;
        mac.update(to_sign.as_bytes());
        Ok(STANDARD.encode(mac.finalize().into_bytes()))
    }
}

fn header_value(value: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value).map_err(|e| CloudError::invalid_argument(format!("header value {:?}: {}", value, e)))
}

fn header_text(headers: &HeaderMap, name: HeaderName) -> String {
    headers
        .get(name)
        .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned())
        .unwrap_or_default()
}

pub fn string_to_sign(method: &str, path: &str, headers: &HeaderMap) -> String {
    let mut lines = vec![
        method.to_string(),
        header_text(headers, CONTENT_TYPE),
        header_text(headers, RANGE),
        header_text(headers, DATE),
        path.to_lowercase(),
    ];

    let mut emc: Vec<(String, String)> = headers
        .iter()
        .filter(|(name, _)| name.as_str().starts_with("x-emc-") && name.as_str() != EMC_SIGNATURE)
        .map(|(name, value)| {
            let value = String::from_utf8_lossy(value.as_bytes());
            (
                name.as_str().to_lowercase(),
                value.split_whitespace().collect::<Vec<_>>().join(" "),
            )
        })
        .collect();
    emc.sort();
    lines.extend(emc.into_iter().map(|(name, value)| format!("{}:{}", name, value)));
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use reqwest::{Client, Method};

    fn fixed() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2008, 6, 5, 16, 38, 19).unwrap()
    }

    fn signer() -> AtmosSigner {
        AtmosSigner::new(&Credentials::new("identity", "c2VjcmV0"))
            .unwrap()
            .with_clock(fixed)
    }

    #[test]
    fn test_date_format() {
        assert_eq!(AtmosSigner::format_date(fixed()), "Thu, 05 Jun 2008 16:38:19 GMT");
    }

    #[test]
    fn test_string_to_sign_orders_and_collapses_emc_headers() {
        let mut headers = HeaderMap::new();
        headers.insert("x-emc-uid", HeaderValue::from_static("identity"));
        headers.insert("x-emc-meta", HeaderValue::from_static("a=1,   b=2"));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("text/plain"));
        headers.insert(DATE, HeaderValue::from_static("Thu, 05 Jun 2008 16:38:19 GMT"));

        let to_sign = string_to_sign("POST", "/rest/namespace/Dir/File", &headers);
        assert_eq!(
            to_sign,
            "POST\ntext/plain\n\nThu, 05 Jun 2008 16:38:19 GMT\n/rest/namespace/dir/file\n\
             x-emc-meta:a=1, b=2\nx-emc-uid:identity"
        );
    }

    #[test]
    fn test_sign_request_is_deterministic() {
        let mut request = Client::new()
            .request(Method::GET, "http://localhost/rest/namespace")
            .header("x-emc-limit", "2")
            .build()
            .unwrap();
        signer().sign(&mut request).unwrap();

        let headers = request.headers();
        assert_eq!(headers.get(DATE).unwrap(), "Thu, 05 Jun 2008 16:38:19 GMT");
        assert_eq!(headers.get(EMC_DATE).unwrap(), "Thu, 05 Jun 2008 16:38:19 GMT");
        assert_eq!(headers.get(EMC_UID).unwrap(), "identity");
        assert_eq!(headers.get(EMC_SIGNATURE).unwrap(), "m8V+Z3OloZ8NfKiQVhJgD7b36IQ=");
    }

    #[test]
    fn test_rejects_non_base64_secret() {
        let err = AtmosSigner::new(&Credentials::new("identity", "not base64!")).unwrap_err();
        assert!(matches!(err, CloudError::InvalidConfigValueError { .. }));
    }
}
