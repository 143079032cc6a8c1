//! Server catalog: ordered endpoint templates for the transfer engines
//!
//! A template may carry two placeholders, `BYTES` (total payload size in
//! bytes) and `SIZE_MB` (the same size in megabytes). Nothing else in the
//! template is interpreted. Substitution produces a new URL and never touches
//! the stored template.

use crate::error::{AppError, Result};
use serde::{Deserialize, Serialize};

/// Placeholder replaced with the payload size in bytes
pub const BYTES_PLACEHOLDER: &str = "BYTES";
/// Placeholder replaced with the payload size in megabytes
pub const SIZE_MB_PLACEHOLDER: &str = "SIZE_MB";

/// Built-in download endpoints, consulted in order
pub const DOWNLOAD_SERVERS: &[(&str, &str)] = &[
    ("Cloudflare", "https://speed.cloudflare.com/__down?bytes=BYTES"),
    ("Hetzner", "https://fsn1-speed.hetzner.com/SIZE_MBMB.bin"),
    ("OVH", "https://proof.ovh.net/files/SIZE_MBMb.dat"),
    ("Tele2", "http://speedtest.tele2.net/SIZE_MBMB.zip"),
    ("ThinkBroadband", "http://ipv4.download.thinkbroadband.com/SIZE_MBMB.zip"),
];

/// Built-in upload endpoints, consulted in order
pub const UPLOAD_SERVERS: &[(&str, &str)] = &[
    ("Cloudflare", "https://speed.cloudflare.com/__up"),
    ("Tele2", "http://speedtest.tele2.net/upload.php"),
    ("httpbin", "https://httpbin.org/post"),
];

/// Declared protocol of a catalog entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scheme {
    Http,
    Https,
}

impl Scheme {
    pub fn is_encrypted(&self) -> bool {
        matches!(self, Scheme::Https)
    }
}

/// One immutable catalog entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerDescriptor {
    name: String,
    template: String,
    scheme: Scheme,
}

impl ServerDescriptor {
    /// Create a descriptor, deriving the scheme from the template
    pub fn new<N: Into<String>, T: Into<String>>(name: N, template: T) -> Result<Self> {
        let name = name.into();
        let template = template.into();

        if name.trim().is_empty() {
            return Err(AppError::config("Server name cannot be empty"));
        }

        let scheme = if template.starts_with("https://") {
            Scheme::Https
        } else if template.starts_with("http://") {
            Scheme::Http
        } else {
            return Err(AppError::config(format!(
                "Server template must start with http:// or https://: {}",
                template
            )));
        };

        // Placeholders are plain words; substitute dummy values to prove the rest parses
        url::Url::parse(&template.replace(BYTES_PLACEHOLDER, "1").replace(SIZE_MB_PLACEHOLDER, "1"))
            .map_err(|e| AppError::config(format!("Invalid server template '{}': {}", template, e)))?;

        Ok(Self { name, template, scheme })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn template(&self) -> &str {
        &self.template
    }

    pub fn scheme(&self) -> Scheme {
        self.scheme
    }

    /// Concrete URL for a payload of `size_bytes`
    pub fn url_for(&self, size_bytes: u64) -> String {
        let size_mb = size_bytes / crate::defaults::BYTES_PER_MB;
        self.template
            .replace(BYTES_PLACEHOLDER, &size_bytes.to_string())
            .replace(SIZE_MB_PLACEHOLDER, &size_mb.to_string())
    }
}

/// Ordered, immutable list of candidate servers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Catalog {
    servers: Vec<ServerDescriptor>,
    /// Set when a single server was explicitly chosen; failures then do not fall through
    pinned: bool,
}

impl Catalog {
    /// Catalog from an explicit list, consulted in order
    pub fn new(servers: Vec<ServerDescriptor>) -> Result<Self> {
        if servers.is_empty() {
            return Err(AppError::config("Server catalog cannot be empty"));
        }
        Ok(Self { servers, pinned: false })
    }

    /// Catalog holding exactly one externally selected server
    pub fn pinned(server: ServerDescriptor) -> Self {
        Self { servers: vec![server], pinned: true }
    }

    /// Built-in download catalog
    pub fn default_download() -> Self {
        Self::from_table(DOWNLOAD_SERVERS)
    }

    /// Built-in upload catalog
    pub fn default_upload() -> Self {
        Self::from_table(UPLOAD_SERVERS)
    }

    fn from_table(table: &[(&str, &str)]) -> Self {
        let servers = table
            .iter()
            .filter_map(|(name, template)| ServerDescriptor::new(*name, *template).ok())
            .collect();
        Self { servers, pinned: false }
    }

    /// Resolve an optional selection against a built-in table
    ///
    /// `None` keeps the whole table. A selection matching an entry name
    /// (case-insensitive) or a raw `http(s)://` template pins that one server.
    pub fn select(table: &[(&str, &str)], selection: Option<&str>) -> Result<Self> {
        let Some(choice) = selection.map(str::trim).filter(|s| !s.is_empty()) else {
            return Ok(Self::from_table(table));
        };

        if choice.starts_with("http://") || choice.starts_with("https://") {
            return Ok(Self::pinned(ServerDescriptor::new("custom", choice)?));
        }

        table
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(choice))
            .map(|(name, template)| ServerDescriptor::new(*name, *template).map(Self::pinned))
            .unwrap_or_else(|| {
                let known: Vec<&str> = table.iter().map(|(name, _)| *name).collect();
                Err(AppError::config(format!(
                    "Unknown server '{}'. Known servers: {}",
                    choice,
                    known.join(", ")
                )))
            })
    }

    pub fn servers(&self) -> &[ServerDescriptor] {
        &self.servers
    }

    pub fn is_pinned(&self) -> bool {
        self.pinned
    }

    pub fn len(&self) -> usize {
        self.servers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.servers.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ServerDescriptor> {
        self.servers.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_substitutes_both_placeholders() {
        let server = ServerDescriptor::new("mixed", "https://example.com/f/SIZE_MB/x?b=BYTES").unwrap();
        assert_eq!(server.url_for(10 * 1_048_576), "https://example.com/f/10/x?b=10485760");
        // the template is untouched
        assert_eq!(server.template(), "https://example.com/f/SIZE_MB/x?b=BYTES");
    }

    #[test]
    fn test_template_without_placeholders_is_used_verbatim() {
        let server = ServerDescriptor::new("fixed", "http://example.com/100MB.bin").unwrap();
        assert_eq!(server.url_for(5 * 1_048_576), "http://example.com/100MB.bin");
        assert_eq!(server.scheme(), Scheme::Http);
    }

    #[test]
    fn test_rejects_non_http_templates() {
        assert!(ServerDescriptor::new("ftp", "ftp://example.com/BYTES").is_err());
        assert!(ServerDescriptor::new("", "https://example.com").is_err());
    }

    #[test]
    fn test_builtin_catalogs_are_complete() {
        assert_eq!(Catalog::default_download().len(), DOWNLOAD_SERVERS.len());
        assert_eq!(Catalog::default_upload().len(), UPLOAD_SERVERS.len());
        assert!(!Catalog::default_download().is_pinned());
    }

    #[test]
    fn test_select_by_name_pins_one_server() {
        let catalog = Catalog::select(DOWNLOAD_SERVERS, Some("ovh")).unwrap();
        assert!(catalog.is_pinned());
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.servers()[0].name(), "OVH");
    }

    #[test]
    fn test_select_raw_url() {
        let catalog = Catalog::select(DOWNLOAD_SERVERS, Some("http://10.0.0.1/BYTES")).unwrap();
        assert!(catalog.is_pinned());
        assert_eq!(catalog.servers()[0].url_for(2048), "http://10.0.0.1/2048");
    }

    #[test]
    fn test_select_unknown_is_config_error() {
        let error = Catalog::select(DOWNLOAD_SERVERS, Some("nowhere")).unwrap_err();
        assert!(matches!(error, AppError::Config(_)));
    }

    #[test]
    fn test_empty_selection_keeps_table() {
        let catalog = Catalog::select(UPLOAD_SERVERS, Some("  ")).unwrap();
        assert_eq!(catalog.len(), UPLOAD_SERVERS.len());
    }
}
