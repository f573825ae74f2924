//! JSON job files and reports.

use std::{
    fs,
    path::{Path, PathBuf},
};

use bubblescan_detect::{DiagnosticsSink, ProgressSink};
use image::ImageReader;
use log::info;
use serde::{Deserialize, Serialize};

use crate::batch::detect_rectangles;
use crate::detect_region::{ScanError, WorkingPage};
use crate::page::{detect_page, PageJob, RectangleOutcome};
use crate::ScanParams;

#[derive(thiserror::Error, Debug)]
pub enum ScanIoError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error("failed to load image: {0}")]
    Image(#[from] image::ImageError),
    #[error(transparent)]
    Scan(#[from] ScanError),
}

/// A scan job as read from disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanJobConfig {
    pub image_path: String,
    #[serde(default)]
    pub output_path: Option<String>,
    /// Scan boxes on a thread pool instead of one after another.
    #[serde(default)]
    pub parallel: bool,
    #[serde(flatten)]
    pub job: PageJob,
    #[serde(default)]
    pub params: ScanParams,
}

impl ScanJobConfig {
    /// Load a JSON config from disk.
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, ScanIoError> {
        let raw = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Write this config to disk as pretty JSON.
    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), ScanIoError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Resolve the output report path.
    pub fn output_path(&self) -> PathBuf {
        self.output_path
            .as_ref()
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("bubblescan_report.json"))
    }

    /// Decode the page image and resize it to the working width.
    pub fn load_page(&self) -> Result<WorkingPage, ScanIoError> {
        let img = ImageReader::open(&self.image_path)?.decode()?;
        Ok(WorkingPage::from_dynamic(&img, self.params.working_width)?)
    }

    /// Load the page and scan every box.
    pub fn run(
        &self,
        progress: &dyn ProgressSink,
        diagnostics: &dyn DiagnosticsSink,
    ) -> Result<ScanReport, ScanIoError> {
        let page = self.load_page()?;
        let (page_width, page_height) = page.source_dimensions();
        info!(
            "{}: {}x{} page, {} boxes",
            self.image_path,
            page_width,
            page_height,
            self.job.boxes.len()
        );

        let (boxes, circle_size) = if self.parallel {
            let boxes = detect_rectangles(&page, &self.job, &self.params, progress, diagnostics);
            (boxes, self.job.circle_size)
        } else {
            let report = detect_page(&page, &self.job, &self.params, progress, diagnostics);
            (report.boxes, report.circle_size)
        };

        Ok(ScanReport {
            image_path: self.image_path.clone(),
            page_width,
            page_height,
            circle_size,
            boxes,
        })
    }
}

/// Report written by the CLI.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanReport {
    pub image_path: String,
    pub page_width: u32,
    pub page_height: u32,
    pub circle_size: Option<f32>,
    pub boxes: Vec<RectangleOutcome>,
}

impl ScanReport {
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, ScanIoError> {
        let raw = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), ScanIoError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    pub fn circle_count(&self) -> usize {
        self.boxes.iter().map(|b| b.circles.len()).sum()
    }

    pub fn failed_boxes(&self) -> usize {
        self.boxes.iter().filter(|b| !b.is_ok()).count()
    }
}
