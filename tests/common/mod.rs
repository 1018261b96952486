//! Shared helpers for integration tests.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use docpress::convert::{
    ConversionQueue, ConvertError, ConverterSettings, ConverterSupervisor, StagingArea,
};
use docpress::fetch::DocumentFetcher;
use docpress::notify::CallbackNotifier;
use docpress::service::ConversionService;

/// Fetcher returning the same canned bytes for any http(s) ref.
pub struct StubFetcher {
    pub bytes: Bytes,
}

impl StubFetcher {
    pub fn new(bytes: &'static [u8]) -> Self {
        Self {
            bytes: Bytes::from_static(bytes),
        }
    }
}

#[async_trait]
impl DocumentFetcher for StubFetcher {
    async fn fetch(&self, input_ref: &str) -> Result<Bytes, ConvertError> {
        if !input_ref.starts_with("http://") && !input_ref.starts_with("https://") {
            return Err(ConvertError::download(format!(
                "unsupported input reference: {input_ref}"
            )));
        }
        Ok(self.bytes.clone())
    }
}

/// Fetcher handing out `doc-1`, `doc-2`, ... in fetch order, so shell
/// converters can tell jobs apart by input content.
#[allow(dead_code)]
#[derive(Default)]
pub struct CountingFetcher {
    counter: AtomicUsize,
}

#[async_trait]
impl DocumentFetcher for CountingFetcher {
    async fn fetch(&self, _input_ref: &str) -> Result<Bytes, ConvertError> {
        let n = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(Bytes::from(format!("doc-{n}")))
    }
}

/// Converter settings invoking `/bin/sh -c <script>`, with `{input}` and
/// `{outdir}` substituted inside the script.
pub fn sh_converter(script: &str) -> ConverterSettings {
    ConverterSettings {
        program: PathBuf::from("/bin/sh"),
        args: vec!["-c".to_string(), script.to_string()],
        output_extension: "pdf".to_string(),
        kill_grace: Duration::from_secs(1),
    }
}

/// Build a full conversion service over a sh-based converter.
pub fn service_with_fetcher(
    staging_root: &Path,
    script: &str,
    cooldown: Duration,
    secret: Option<String>,
    fetcher: Arc<dyn DocumentFetcher>,
) -> ConversionService {
    let staging = StagingArea::new(staging_root).unwrap();
    let supervisor = ConverterSupervisor::new(sh_converter(script));
    let queue = ConversionQueue::new(staging, supervisor, cooldown);
    let notifier = CallbackNotifier::new(secret, Duration::from_secs(2));
    ConversionService::new(
        queue,
        fetcher,
        Arc::new(notifier),
        Duration::from_secs(10),
        Duration::from_secs(30),
    )
}

/// Service whose fetcher always returns `b"stub document"`.
pub fn test_service(
    staging_root: &Path,
    script: &str,
    cooldown: Duration,
    secret: Option<String>,
) -> ConversionService {
    service_with_fetcher(
        staging_root,
        script,
        cooldown,
        secret,
        Arc::new(StubFetcher::new(b"stub document")),
    )
}
