use std::fs;
use std::path::{Path, PathBuf};

use approx::assert_relative_eq;
use xdsmask_core::{DetectorGeometry, MaskOrigin, MaskRegion, MaskState, Point};
use xdsmask_io::{
    convert_image, load_state, read_raster, save_state, ConversionRequest, ConversionTask, Error,
    ProgressTracker, ProgressUpdate, Stage,
};

fn write_png(path: &Path, width: u32, height: u32) {
    let img = image::RgbaImage::from_pixel(width, height, image::Rgba([10, 20, 30, 255]));
    img.save(path).unwrap();
}

#[test]
fn test_read_raster_dimensions() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("frame.png");
    write_png(&path, 6, 4);
    let raster = read_raster(&path).unwrap();
    assert_eq!((raster.width, raster.height), (6, 4));
    assert_eq!(raster.rgba.len(), 6 * 4 * 4);
    assert_eq!(&raster.rgba[..4], &[10, 20, 30, 255]);
}

#[test]
fn test_state_file_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("session.json");
    let mut state = MaskState::new(DetectorGeometry::default());
    state.masks.insert(
        MaskRegion::rectangle(Point::new(0.0, 1200.0), Point::new(1230.0, 1300.0)),
        MaskOrigin::Preexisting,
    );
    state.masks.add(MaskRegion::ellipse(Point::new(10.0, 10.0), Point::new(30.0, 20.0)));
    state.fitted_beam = Some(Point::new(1200.0, 1250.0));
    save_state(&path, &state).unwrap();
    let loaded = load_state(&path).unwrap();
    assert_eq!(loaded.tokens(), state.tokens());
    assert_eq!(loaded.masks.len(), 2);
}

#[test]
fn test_load_state_missing_and_invalid() {
    let dir = tempfile::tempdir().unwrap();
    let missing = load_state(&dir.path().join("nope.json"));
    assert!(matches!(missing, Err(Error::InputMissing(_))));

    let garbage = dir.path().join("garbage.json");
    fs::write(&garbage, "{ not json").unwrap();
    assert!(matches!(load_state(&garbage), Err(Error::Json(_))));

    let mut state = MaskState::default();
    state.gaps.count_x = 100_000;
    let oversized = dir.path().join("oversized.json");
    save_state(&oversized, &state).unwrap();
    assert!(matches!(load_state(&oversized), Err(Error::Core(_))));
}

#[test]
fn test_conversion_task_missing_image() {
    let task = ConversionTask::spawn(
        PathBuf::from("adxv"),
        ConversionRequest::new("/nonexistent/image.cbf", "/nonexistent/out.png"),
    );
    assert!(matches!(task.wait(), Err(Error::InputMissing(_))));
}

#[test]
fn test_progress_tracker_advances_and_finishes() {
    let dir = tempfile::tempdir().unwrap();
    let mut tracker = ProgressTracker::new(dir.path(), 10);
    assert_eq!(tracker.poll(), ProgressUpdate::Unchanged(None));

    fs::write(dir.path().join("XDS.INP"), "").unwrap();
    assert_eq!(tracker.poll(), ProgressUpdate::Advanced(Stage::Started));
    assert_eq!(tracker.poll(), ProgressUpdate::Unchanged(Some(Stage::Started)));

    fs::write(dir.path().join("INTEGRATE.LP"), "").unwrap();
    assert_eq!(tracker.poll(), ProgressUpdate::Advanced(Stage::Integration));

    fs::write(dir.path().join(Stage::Finished.marker_file()), "").unwrap();
    assert_eq!(tracker.poll(), ProgressUpdate::Finished);
    assert_eq!(tracker.stage(), Some(Stage::Finished));
}

#[test]
fn test_progress_tracker_times_out() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("XDS.INP"), "").unwrap();
    let mut tracker = ProgressTracker::new(dir.path(), 3);
    assert_eq!(tracker.poll(), ProgressUpdate::Advanced(Stage::Started));
    assert_eq!(tracker.poll(), ProgressUpdate::Unchanged(Some(Stage::Started)));
    assert_eq!(tracker.poll(), ProgressUpdate::Unchanged(Some(Stage::Started)));
    assert_eq!(tracker.poll(), ProgressUpdate::TimedOut(Some(Stage::Started)));
}

#[cfg(unix)]
mod scripted {
    use super::*;
    use std::os::unix::fs::PermissionsExt;
    use xdsmask_io::{read_image_header, ToolConfig};

    fn script(dir: &Path, name: &str, body: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[test]
    fn test_read_image_header_from_tool() {
        let dir = tempfile::tempdir().unwrap();
        let image = dir.path().join("img_0001.cbf");
        fs::write(&image, "").unwrap();
        let tool = script(
            dir.path(),
            "imginfo",
            "echo 'distance [mm] = 300.0'\necho 'wavelength [A] = n/a'\necho 'Beam centre in X [pixel] = 1200.5'",
        );
        let config = ToolConfig {
            image_info: tool,
            ..ToolConfig::default()
        };
        let header = read_image_header(&config, &image).unwrap();
        assert_relative_eq!(header.distance_mm.unwrap(), 300.0);
        assert!(header.wavelength_a.is_none());
        assert_eq!(header.missing.len(), 1);

        let geometry = header.to_geometry();
        assert_relative_eq!(geometry.distance_mm, 300.0);
        assert_relative_eq!(geometry.wavelength_a, DetectorGeometry::default().wavelength_a);
        assert_relative_eq!(geometry.beam_centre_px.x, 1200.5);
    }

    #[test]
    fn test_image_info_failure() {
        let dir = tempfile::tempdir().unwrap();
        let image = dir.path().join("img.cbf");
        fs::write(&image, "").unwrap();
        let config = ToolConfig {
            image_info: script(dir.path(), "imginfo", "echo broken >&2\nexit 2"),
            ..ToolConfig::default()
        };
        let Err(Error::ToolFailed { stderr, .. }) = read_image_header(&config, &image) else {
            panic!("expected tool failure");
        };
        assert_eq!(stderr, "broken");
    }

    #[test]
    fn test_converter_writes_raster() {
        let dir = tempfile::tempdir().unwrap();
        let image = dir.path().join("img.cbf");
        fs::write(&image, "").unwrap();
        let prepared = dir.path().join("prepared.png");
        write_png(&prepared, 8, 8);
        // Copy the prepared raster to the last argument.
        let converter = script(
            dir.path(),
            "adxv",
            &format!("for last; do :; done\ncp '{}' \"$last\"", prepared.display()),
        );
        let output = dir.path().join("out.png");
        let task = ConversionTask::spawn(converter, ConversionRequest::new(&image, &output));
        let raster = task.wait().unwrap();
        assert_eq!((raster.width, raster.height), (8, 8));
        assert_eq!(raster.path, output);
    }

    #[test]
    fn test_converter_without_output_fails() {
        let dir = tempfile::tempdir().unwrap();
        let image = dir.path().join("img.cbf");
        fs::write(&image, "").unwrap();
        let converter = script(dir.path(), "adxv", "exit 0");
        let request = ConversionRequest::new(&image, dir.path().join("out.png"));
        assert!(matches!(
            convert_image(&converter, &request),
            Err(Error::ConversionFailed(_))
        ));
    }

    #[test]
    fn test_converter_abnormal_exit() {
        let dir = tempfile::tempdir().unwrap();
        let image = dir.path().join("img.cbf");
        fs::write(&image, "").unwrap();
        let converter = script(dir.path(), "adxv", "exit 1");
        let request = ConversionRequest::new(&image, dir.path().join("out.png"));
        assert!(matches!(
            convert_image(&converter, &request),
            Err(Error::ConversionFailed(_))
        ));
    }
}
