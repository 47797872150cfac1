/// Image loaders
///
/// A loader performs the actual network or filesystem work for one URL.
/// Production builds only need the bytes to land in the HTTP cache, so they
/// use `HttpFetchLoader`. Development mirrors what an image element does:
/// fetch the bytes and decode them, which `DecodeLoader` does on a blocking
/// thread.
use std::path::PathBuf;

use async_trait::async_trait;
use reqwest::header::HeaderValue;
use reqwest::{Client, Url};
use tokio::task;

use crate::error::{PreloadError, PreloadResult};

/// RFC 9218 priority sent with high-priority fetches
const HIGH_PRIORITY_HEADER: &str = "u=1, i";

/// Request-priority hint passed through to the underlying fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FetchPriority {
    High,
    #[default]
    Auto,
}

/// Loads one image; resolves `Ok` only when the image is usable
#[async_trait]
pub trait ImageLoader: Send + Sync {
    async fn load(&self, url: &str, priority: FetchPriority) -> PreloadResult<()>;
}

/// Resolve a possibly relative image URL against an optional base
fn absolute_url(base: Option<&Url>, url: &str) -> PreloadResult<Url> {
    let parsed = match base {
        Some(base) => base.join(url),
        None => Url::parse(url),
    };
    parsed.map_err(|e| PreloadError::InvalidUrl {
        url: url.to_string(),
        reason: e.to_string(),
    })
}

/// Warms the HTTP cache with a plain GET per image
#[derive(Debug, Clone)]
pub struct HttpFetchLoader {
    client: Client,
    base_url: Option<Url>,
}

impl HttpFetchLoader {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            base_url: None,
        }
    }

    /// Relative URLs such as `/images/a.jpg` are joined onto `base_url`
    pub fn with_base_url(mut self, base_url: &str) -> PreloadResult<Self> {
        self.base_url = Some(absolute_url(None, base_url)?);
        Ok(self)
    }

    pub fn base_url(&self) -> Option<&Url> {
        self.base_url.as_ref()
    }
}

#[async_trait]
impl ImageLoader for HttpFetchLoader {
    async fn load(&self, url: &str, priority: FetchPriority) -> PreloadResult<()> {
        let target = absolute_url(self.base_url.as_ref(), url)?;

        let mut request = self.client.get(target);
        if priority == FetchPriority::High {
            request = request.header("priority", HeaderValue::from_static(HIGH_PRIORITY_HEADER));
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(PreloadError::Status {
                url: url.to_string(),
                status_code: status.as_u16(),
            });
        }

        // Drain the body so the response is complete in any cache on the way
        let body = response.bytes().await?;
        tracing::trace!(url, bytes = body.len(), "fetched image");
        Ok(())
    }
}

/// Fetches and decodes images, like an image element would
#[derive(Debug, Clone)]
pub struct DecodeLoader {
    client: Client,
    asset_root: PathBuf,
    base_url: Option<Url>,
}

impl DecodeLoader {
    /// Site-relative paths are read from `asset_root`
    pub fn new(client: Client, asset_root: impl Into<PathBuf>) -> Self {
        Self {
            client,
            asset_root: asset_root.into(),
            base_url: None,
        }
    }

    /// Fetch site-relative paths from `base_url` instead of the asset root
    pub fn with_base_url(mut self, base_url: &str) -> PreloadResult<Self> {
        self.base_url = Some(absolute_url(None, base_url)?);
        Ok(self)
    }

    /// Filesystem location for a site-relative path
    pub fn local_path(&self, url: &str) -> PathBuf {
        let relative = url.split(['?', '#']).next().unwrap_or(url);
        self.asset_root.join(relative.trim_start_matches('/'))
    }

    async fn fetch_bytes(&self, url: &str) -> PreloadResult<Vec<u8>> {
        let remote = url.starts_with("http://") || url.starts_with("https://");
        if remote || self.base_url.is_some() {
            let target = absolute_url(self.base_url.as_ref(), url)?;
            let response = self.client.get(target).send().await?;
            let status = response.status();
            if !status.is_success() {
                return Err(PreloadError::Status {
                    url: url.to_string(),
                    status_code: status.as_u16(),
                });
            }
            return Ok(response.bytes().await?.to_vec());
        }

        let path = self.local_path(url);
        tokio::fs::read(&path)
            .await
            .map_err(|source| PreloadError::Io { path, source })
    }
}

/// Decode image bytes, returning the pixel dimensions
fn decode_blocking(bytes: &[u8]) -> PreloadResult<(u32, u32)> {
    let img = image::load_from_memory(bytes)?;
    Ok((img.width(), img.height()))
}

#[async_trait]
impl ImageLoader for DecodeLoader {
    async fn load(&self, url: &str, _priority: FetchPriority) -> PreloadResult<()> {
        let bytes = self.fetch_bytes(url).await?;

        // Spawn blocking because decoding is CPU-intensive
        let (width, height) = task::spawn_blocking(move || decode_blocking(&bytes))
            .await
            .map_err(|e| PreloadError::Task(format!("decode task failed: {e}")))??;

        tracing::trace!(url, width, height, "decoded image");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use std::time::Duration;

    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};
    use tokio::task::JoinHandle;

    fn write_png(path: &Path) {
        let img = image::RgbImage::from_pixel(4, 3, image::Rgb([200, 40, 40]));
        img.save(path).unwrap();
    }

    fn client() -> Client {
        Client::builder().no_proxy().build().unwrap()
    }

    /// Read one request head from `socket`
    async fn read_head(socket: &mut TcpStream) -> String {
        let mut head = Vec::new();
        let mut chunk = [0u8; 1024];
        while !head.windows(4).any(|w| w == b"\r\n\r\n") {
            let n = socket.read(&mut chunk).await.unwrap();
            if n == 0 {
                break;
            }
            head.extend_from_slice(&chunk[..n]);
        }
        String::from_utf8_lossy(&head).to_ascii_lowercase()
    }

    /// Answer a single request with `status_line` and `body`.
    /// The handle resolves to the lowercased request head.
    async fn serve_once(status_line: &'static str, body: &'static [u8]) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());

        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let head = read_head(&mut socket).await;
            let response = format!(
                "{status_line}\r\ncontent-length: {}\r\nconnection: close\r\n\r\n",
                body.len()
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.write_all(body).await.unwrap();
            let _ = socket.shutdown().await;
            head
        });
        (base, handle)
    }

    #[tokio::test]
    async fn test_http_loader_maps_error_status() {
        let (base, server) = serve_once("HTTP/1.1 404 Not Found", b"").await;
        let loader = HttpFetchLoader::new(client()).with_base_url(&base).unwrap();
        assert_eq!(loader.base_url().map(|u| u.host_str()), Some(Some("127.0.0.1")));

        let err = loader
            .load("/images/a.jpg", FetchPriority::Auto)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            PreloadError::Status { ref url, status_code: 404 } if url == "/images/a.jpg"
        ));

        let head = server.await.unwrap();
        assert!(head.starts_with("get /images/a.jpg http/1.1"));
        assert!(!head.contains("priority:"));
    }

    #[tokio::test]
    async fn test_http_loader_sends_priority_hint() {
        let (base, server) = serve_once("HTTP/1.1 200 OK", b"not really a jpeg").await;
        let loader = HttpFetchLoader::new(client()).with_base_url(&base).unwrap();

        loader
            .load("/images/hero.jpg", FetchPriority::High)
            .await
            .unwrap();

        let head = server.await.unwrap();
        assert!(head.contains("\r\npriority: u=1, i\r\n"), "{head}");
    }

    #[tokio::test]
    async fn test_dropped_load_closes_the_connection() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());

        // Never answers; resolves once the client hangs up
        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            read_head(&mut socket).await;
            let mut rest = [0u8; 64];
            loop {
                match socket.read(&mut rest).await {
                    Ok(0) | Err(_) => break,
                    Ok(_) => {}
                }
            }
        });

        let loader = HttpFetchLoader::new(client()).with_base_url(&base).unwrap();
        let result = tokio::time::timeout(
            Duration::from_millis(100),
            loader.load("/images/slow.jpg", FetchPriority::Auto),
        )
        .await;
        assert!(result.is_err());
        drop(loader);

        tokio::time::timeout(Duration::from_secs(5), server)
            .await
            .expect("request was not cancelled")
            .unwrap();
    }

    #[test]
    fn test_relative_urls_need_a_base() {
        assert!(absolute_url(None, "/images/a.jpg").is_err());

        let base = Url::parse("https://example.com/site/").unwrap();
        let url = absolute_url(Some(&base), "/images/a.jpg").unwrap();
        assert_eq!(url.as_str(), "https://example.com/images/a.jpg");
    }

    #[test]
    fn test_http_loader_rejects_bad_base() {
        let loader = HttpFetchLoader::new(Client::new()).with_base_url("not a url");
        assert!(matches!(loader, Err(PreloadError::InvalidUrl { .. })));
    }

    #[test]
    fn test_local_path_strips_leading_slash_and_query() {
        let loader = DecodeLoader::new(Client::new(), "/srv/public");
        assert_eq!(
            loader.local_path("/images/a.jpg?v=2"),
            PathBuf::from("/srv/public/images/a.jpg")
        );
    }

    #[tokio::test]
    async fn test_decode_loader_reads_and_decodes_local_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("images")).unwrap();
        write_png(&dir.path().join("images/cover.png"));

        let loader = DecodeLoader::new(Client::new(), dir.path());
        loader
            .load("/images/cover.png", FetchPriority::Auto)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_decode_loader_reports_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let loader = DecodeLoader::new(Client::new(), dir.path());

        let err = loader
            .load("/images/missing.jpg", FetchPriority::High)
            .await
            .unwrap_err();
        assert!(matches!(err, PreloadError::Io { .. }));
    }

    #[tokio::test]
    async fn test_decode_loader_reports_corrupt_image() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("broken.jpg"), b"definitely not a jpeg").unwrap();

        let loader = DecodeLoader::new(Client::new(), dir.path());
        let err = loader
            .load("/broken.jpg", FetchPriority::Auto)
            .await
            .unwrap_err();
        assert!(matches!(err, PreloadError::Decode(_)));
    }

    #[test]
    fn test_decode_reports_dimensions() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("probe.png");
        write_png(&path);
        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(decode_blocking(&bytes).unwrap(), (4, 3));
    }
}
