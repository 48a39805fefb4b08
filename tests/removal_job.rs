//! End-to-end file jobs on the threshold backend

mod common;

use closet_bgremove::{
    remove_background_with_confirmation, run_job, BackgroundRemovalProcessor, RemovalJob,
    CONFIRMATION_MESSAGE, LEGACY_INPUT_PATH, LEGACY_OUTPUT_PATH,
};
use common::{threshold_config, write_garment_jpeg, write_grey_garment_png};
use image::GenericImageView;
use std::io::{self, Write};
use std::path::PathBuf;
use tempfile::TempDir;

/// Records whether the output file existed when each line was written
struct WitnessWriter {
    output: PathBuf,
    lines: Vec<(String, bool)>,
    buffer: Vec<u8>,
}

impl WitnessWriter {
    fn new(output: PathBuf) -> Self {
        Self {
            output,
            lines: Vec::new(),
            buffer: Vec::new(),
        }
    }
}

impl Write for WitnessWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer.extend_from_slice(buf);
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            let text = String::from_utf8_lossy(&line[..line.len() - 1]).into_owned();
            self.lines.push((text, self.output.exists()));
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[test]
fn output_keeps_input_dimensions_with_alpha() {
    let temp = TempDir::new().unwrap();
    let input = write_garment_jpeg(temp.path(), "coat.jpeg", 120, 80);
    let output = temp.path().join("coat.png");

    let mut out = Vec::new();
    let report = remove_background_with_confirmation(
        &RemovalJob::new(&input, &output),
        &threshold_config(false),
        &mut out,
    )
    .unwrap();

    assert_eq!(report.dimensions, (120, 80));
    assert_eq!(report.output_path, output);

    let written = image::open(&output).unwrap();
    assert_eq!(written.dimensions(), (120, 80));
    assert!(written.color().has_alpha());

    let rgba = written.to_rgba8();
    assert_eq!(rgba.get_pixel(60, 40)[3], 255);
    assert_eq!(rgba.get_pixel(2, 2).0, [0, 0, 0, 0]);
}

#[test]
fn confirmation_printed_once_after_the_write() {
    let temp = TempDir::new().unwrap();
    let input = write_garment_jpeg(temp.path(), "scarf.jpeg", 64, 64);
    let output = temp.path().join("scarf.png");

    let mut witness = WitnessWriter::new(output.clone());
    remove_background_with_confirmation(
        &RemovalJob::new(&input, &output),
        &threshold_config(false),
        &mut witness,
    )
    .unwrap();

    assert_eq!(witness.lines, vec![(CONFIRMATION_MESSAGE.to_string(), true)]);
}

#[test]
fn missing_input_writes_nothing() {
    let temp = TempDir::new().unwrap();
    let output = temp.path().join("out.png");

    let mut out = Vec::new();
    let err = remove_background_with_confirmation(
        &RemovalJob::new(temp.path().join("absent.jpeg"), &output),
        &threshold_config(false),
        &mut out,
    )
    .unwrap_err();

    assert!(err.is_not_found());
    assert!(out.is_empty());
    assert!(!output.exists());
}

#[test]
fn missing_output_directory_is_an_error() {
    let temp = TempDir::new().unwrap();
    let input = write_garment_jpeg(temp.path(), "sock.jpeg", 32, 32);
    let output = temp.path().join("not-there").join("sock.png");

    let mut out = Vec::new();
    assert!(remove_background_with_confirmation(
        &RemovalJob::new(&input, &output),
        &threshold_config(false),
        &mut out,
    )
    .is_err());
    assert!(out.is_empty());
    assert!(!output.parent().unwrap().exists());
}

#[test]
fn existing_output_is_replaced() {
    let temp = TempDir::new().unwrap();
    let input = write_garment_jpeg(temp.path(), "hat.jpeg", 48, 36);
    let output = temp.path().join("hat.png");
    std::fs::write(&output, b"stale bytes").unwrap();

    let mut out = Vec::new();
    remove_background_with_confirmation(
        &RemovalJob::new(&input, &output),
        &threshold_config(false),
        &mut out,
    )
    .unwrap();

    assert_eq!(image::open(&output).unwrap().dimensions(), (48, 36));
    assert_eq!(out, format!("{CONFIRMATION_MESSAGE}\n").into_bytes());
}

#[test]
fn inverted_threshold_keeps_the_backdrop() {
    let temp = TempDir::new().unwrap();
    let input = write_garment_jpeg(temp.path(), "shirt.jpeg", 80, 80);
    let output = temp.path().join("shirt.png");

    let mut processor = BackgroundRemovalProcessor::new(threshold_config(true)).unwrap();
    let mut out = Vec::new();
    run_job(&mut processor, &RemovalJob::new(&input, &output), &mut out).unwrap();

    let rgba = image::open(&output).unwrap().to_rgba8();
    assert_eq!(rgba.get_pixel(40, 40).0, [0, 0, 0, 0]);
    assert_eq!(rgba.get_pixel(2, 2)[3], 255);
}

/// Alpha at the garment centre and at a backdrop corner
fn centre_and_corner_alpha(width: u32, height: u32, inverted: bool) -> (u8, u8) {
    let temp = TempDir::new().unwrap();
    let input = write_grey_garment_png(temp.path(), "photo.png", width, height);
    let output = temp.path().join("cut.png");

    let mut out = Vec::new();
    remove_background_with_confirmation(
        &RemovalJob::new(&input, &output),
        &threshold_config(inverted),
        &mut out,
    )
    .unwrap();

    let rgba = image::open(&output).unwrap().to_rgba8();
    assert_eq!(rgba.dimensions(), (width, height));
    (
        rgba.get_pixel(width / 2, height / 2)[3],
        rgba.get_pixel(2, 2)[3],
    )
}

#[test]
fn wide_photo_keeps_mid_grey_garment() {
    assert_eq!(centre_and_corner_alpha(400, 100, false), (255, 0));
    assert_eq!(centre_and_corner_alpha(800, 100, false), (255, 0));
}

#[test]
fn tall_photo_keeps_mid_grey_garment() {
    assert_eq!(centre_and_corner_alpha(100, 400, false), (255, 0));
}

#[test]
fn inverted_threshold_on_wide_and_tall_photos() {
    assert_eq!(centre_and_corner_alpha(400, 100, true), (0, 255));
    assert_eq!(centre_and_corner_alpha(100, 400, true), (0, 255));
}

#[test]
fn default_job_uses_fixed_locations() {
    let job = RemovalJob::from_args(None, None);
    assert_eq!(job, RemovalJob::legacy());
    assert_eq!(job.input, PathBuf::from(LEGACY_INPUT_PATH));
    assert_eq!(job.output, PathBuf::from(LEGACY_OUTPUT_PATH));
    assert_eq!(
        job.input.file_name().unwrap(),
        "clr15oo8j005c356d04xhef8b.jpeg"
    );
}
