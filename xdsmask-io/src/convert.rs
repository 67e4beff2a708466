//! Detector image to raster conversion.
//!
//! The converter is an opaque external program. Conversion can take a few
//! seconds for large multi-frame containers, so [`ConversionTask`] runs it on
//! a worker thread and hands the decoded raster back over a channel.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::mpsc::{channel, Receiver, TryRecvError};
use std::thread::{self, JoinHandle};

use crate::error::{Error, Result};

/// Frame selection inside a multi-frame container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slab {
    /// 1-based frame index.
    pub index: u32,
    /// Number of frames summed into the raster.
    pub count: u32,
}

/// One invocation of the converter.
#[derive(Debug, Clone, PartialEq)]
pub struct ConversionRequest {
    pub image: PathBuf,
    pub output: PathBuf,
    /// Counts above this value are drawn as overloads.
    pub overload: Option<f64>,
    pub slab: Option<Slab>,
}

impl ConversionRequest {
    #[must_use]
    pub fn new(image: impl Into<PathBuf>, output: impl Into<PathBuf>) -> Self {
        Self {
            image: image.into(),
            output: output.into(),
            overload: None,
            slab: None,
        }
    }

    #[must_use]
    pub fn with_overload(mut self, overload: f64) -> Self {
        self.overload = Some(overload);
        self
    }

    #[must_use]
    pub fn with_slab(mut self, slab: Slab) -> Self {
        self.slab = Some(slab);
        self
    }

    /// Converter arguments: `-sa [-overload N] [-slabs S -slab K] <image> <out>`.
    #[must_use]
    pub fn args(&self) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec!["-sa".into()];
        if let Some(overload) = self.overload {
            args.push("-overload".into());
            args.push(format!("{overload}").into());
        }
        if let Some(slab) = self.slab {
            args.push("-slabs".into());
            args.push(slab.count.to_string().into());
            args.push("-slab".into());
            args.push(slab.index.to_string().into());
        }
        args.push(self.image.clone().into_os_string());
        args.push(self.output.clone().into_os_string());
        args
    }
}

/// A decoded raster ready for display.
#[derive(Clone, PartialEq, Eq)]
pub struct RasterHandle {
    pub path: PathBuf,
    pub width: u32,
    pub height: u32,
    /// Row-major RGBA8, origin top-left.
    pub rgba: Vec<u8>,
}

impl std::fmt::Debug for RasterHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RasterHandle")
            .field("path", &self.path)
            .field("width", &self.width)
            .field("height", &self.height)
            .finish_non_exhaustive()
    }
}

/// Decodes a raster file written by the converter.
///
/// # Errors
/// `ConversionFailed` if the file is absent, `Image` if it cannot be decoded.
pub fn read_raster(path: &Path) -> Result<RasterHandle> {
    if !path.is_file() {
        return Err(Error::ConversionFailed(format!(
            "no output written to {}",
            path.display()
        )));
    }
    let rgba = image::open(path)?.to_rgba8();
    Ok(RasterHandle {
        path: path.to_path_buf(),
        width: rgba.width(),
        height: rgba.height(),
        rgba: rgba.into_raw(),
    })
}

/// Runs the converter and decodes its output.
///
/// # Errors
/// `InputMissing` for an absent source image, `ConversionFailed` when the
/// converter cannot start, exits abnormally or writes nothing.
pub fn convert_image(program: &Path, request: &ConversionRequest) -> Result<RasterHandle> {
    if !request.image.exists() {
        return Err(Error::InputMissing(request.image.display().to_string()));
    }
    let args = request.args();
    log::debug!("{} {:?}", program.display(), args);
    let output = Command::new(program).args(&args).output().map_err(|e| {
        Error::ConversionFailed(format!("cannot run {}: {e}", program.display()))
    })?;
    if !output.status.success() {
        return Err(Error::ConversionFailed(format!(
            "{} exited with {}: {}",
            program.display(),
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }
    let raster = read_raster(&request.output)?;
    log::info!(
        "converted {} to {}x{} raster",
        request.image.display(),
        raster.width,
        raster.height
    );
    Ok(raster)
}

/// Conversion running on a background thread.
pub struct ConversionTask {
    rx: Receiver<Result<RasterHandle>>,
    handle: Option<JoinHandle<()>>,
}

impl ConversionTask {
    /// Starts converting on a worker thread.
    #[must_use]
    pub fn spawn(program: PathBuf, request: ConversionRequest) -> Self {
        let (tx, rx) = channel();
        let handle = thread::spawn(move || {
            let result = convert_image(&program, &request);
            if let Err(e) = &result {
                log::warn!("conversion of {} failed: {e}", request.image.display());
            }
            let _ = tx.send(result);
        });
        Self {
            rx,
            handle: Some(handle),
        }
    }

    /// Non-blocking check, `None` while the converter is still running.
    ///
    /// Returns the result exactly once; later calls report a closed task.
    pub fn try_result(&mut self) -> Option<Result<RasterHandle>> {
        match self.rx.try_recv() {
            Ok(result) => {
                self.join();
                Some(result)
            }
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => Some(Err(Error::ConversionFailed(
                "conversion worker exited without a result".to_string(),
            ))),
        }
    }

    /// Blocks until the conversion finishes.
    ///
    /// # Errors
    /// The conversion error, or `ConversionFailed` if the worker vanished.
    pub fn wait(mut self) -> Result<RasterHandle> {
        let result = self.rx.recv().map_err(|_| {
            Error::ConversionFailed("conversion worker exited without a result".to_string())
        });
        self.join();
        result?
    }

    fn join(&mut self) {
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::error!("conversion worker panicked");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_minimal() {
        let request = ConversionRequest::new("/data/img_0001.cbf", "/tmp/out.png");
        let args: Vec<String> = request
            .args()
            .into_iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        assert_eq!(args, vec!["-sa", "/data/img_0001.cbf", "/tmp/out.png"]);
    }

    #[test]
    fn test_args_overload_and_slab() {
        let request = ConversionRequest::new("/data/master.h5", "/tmp/out.png")
            .with_overload(65535.0)
            .with_slab(Slab { index: 3, count: 10 });
        let args: Vec<String> = request
            .args()
            .into_iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            args,
            vec![
                "-sa",
                "-overload",
                "65535",
                "-slabs",
                "10",
                "-slab",
                "3",
                "/data/master.h5",
                "/tmp/out.png"
            ]
        );
    }

    #[test]
    fn test_read_raster_missing() {
        let result = read_raster(Path::new("/nonexistent/out.png"));
        assert!(matches!(result, Err(Error::ConversionFailed(_))));
    }
}
