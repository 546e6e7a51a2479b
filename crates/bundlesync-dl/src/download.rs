use std::{
    fs::File,
    io::{Read as _, Write as _},
    path::{Path, PathBuf},
};

use bundlesync_utils::fs::ensure_dir_exists;
use tracing::debug;

use crate::{
    error::{DownloadError, Result},
    http::Http,
    types::Progress,
};

/// Streams a URL to a file on disk.
///
/// The destination is truncated before writing; callers wanting atomic
/// replacement download to a staging path and rename afterwards.
pub struct Download {
    pub url: String,
    pub output: PathBuf,
    pub cache_bust: bool,
    pub on_progress: Option<Box<dyn Fn(Progress) + Send + Sync>>,
}

impl Download {
    /// Creates a new `Download` of `url` into `output`.
    ///
    /// # Examples
    ///
    /// ```
    /// use bundlesync_dl::download::Download;
    ///
    /// let dl = Download::new("https://example.com/agent_current", "/tmp/agent.bundle.part")
    ///     .cache_bust(true);
    /// assert!(dl.cache_bust);
    /// ```
    pub fn new(url: impl Into<String>, output: impl Into<PathBuf>) -> Self {
        Self {
            url: url.into(),
            output: output.into(),
            cache_bust: false,
            on_progress: None,
        }
    }

    /// Append a unique query parameter to the request.
    pub fn cache_bust(mut self, cache_bust: bool) -> Self {
        self.cache_bust = cache_bust;
        self
    }

    /// Registers a progress callback invoked with [`Progress`] events.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use bundlesync_dl::download::Download;
    /// use bundlesync_dl::types::Progress;
    ///
    /// let _dl = Download::new("https://example.com/agent_current", "agent.bundle")
    ///     .progress(|event: Progress| match event {
    ///         Progress::Starting { total } => eprintln!("starting, total={}", total),
    ///         Progress::Chunk { current, total } => eprintln!("{}/{}", current, total),
    ///         Progress::Complete { total } => eprintln!("complete, total={}", total),
    ///     });
    /// ```
    pub fn progress<F>(mut self, on_progress: F) -> Self
    where
        F: Fn(Progress) + Send + Sync + 'static,
    {
        self.on_progress = Some(Box::new(on_progress));
        self
    }

    fn emit(&self, event: Progress) {
        if let Some(ref cb) = self.on_progress {
            cb(event);
        }
    }

    /// Performs the download and returns the number of bytes written.
    ///
    /// The request is made before the output file is touched, so a refused
    /// connection or an error status never creates or truncates it. Errors
    /// while receiving are reported as [`DownloadError::Interrupted`], errors
    /// while writing as [`DownloadError::Write`].
    pub fn execute(&self) -> Result<u64> {
        let mut fetched = Http::open(&self.url, self.cache_bust)?;
        let total = fetched.total;

        let write_err = |path: &Path| {
            let path = path.to_path_buf();
            move |source| DownloadError::Write { path, source }
        };

        if let Some(parent) = self.output.parent() {
            ensure_dir_exists(parent).map_err(|err| {
                DownloadError::Write {
                    path: self.output.clone(),
                    source: std::io::Error::other(err.to_string()),
                }
            })?;
        }

        debug!("downloading {} to {}", self.url, self.output.display());
        self.emit(Progress::Starting { total });

        let mut file = File::create(&self.output).map_err(write_err(&self.output))?;
        let mut buffer = [0u8; 8192];
        let mut downloaded = 0u64;

        loop {
            let n = fetched.reader.read(&mut buffer).map_err(|source| {
                DownloadError::Interrupted {
                    url: self.url.clone(),
                    source,
                }
            })?;
            if n == 0 {
                break;
            }

            file.write_all(&buffer[..n])
                .map_err(write_err(&self.output))?;
            downloaded += n as u64;

            self.emit(Progress::Chunk {
                current: downloaded,
                total,
            });
        }

        file.sync_all().map_err(write_err(&self.output))?;

        if total != 0 && downloaded != total {
            return Err(DownloadError::Interrupted {
                url: self.url.clone(),
                source: std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    format!("received {downloaded} of {total} bytes"),
                ),
            });
        }

        self.emit(Progress::Complete { total: downloaded });

        Ok(downloaded)
    }
}
