//! One complete run over a single uploaded file.

use std::path::{Path, PathBuf};

use log::info;

use crate::best::{select_best, BestReadings};
use crate::config::Config;
use crate::error::Error;
use crate::interpolate::{interpolate, DenseTable};
use crate::media::{self, MediaInput, MediaKind, VideoFileSink};
use crate::pipeline::{FramePipeline, Models, PipelineStats};
use crate::render::{OverlayRenderer, RenderSummary};

/// Where the artifacts of a run are written.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputPaths {
    pub results_report: PathBuf,
    pub interpolated_report: PathBuf,
    pub annotated: PathBuf,
    /// Borders only, written for still images.
    pub processed_frame: PathBuf,
}

impl OutputPaths {
    /// Default file names inside `dir`, the annotated output keeping the
    /// input's extension.
    pub fn in_dir<P: AsRef<Path>>(dir: P, input: &MediaInput) -> Self {
        let dir = dir.as_ref();
        let ext = input
            .path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or(match input.kind {
                MediaKind::Image => "jpg",
                MediaKind::Video => "mp4",
            })
            .to_ascii_lowercase();

        Self {
            results_report: dir.join("results.csv"),
            interpolated_report: dir.join("interpolated.csv"),
            annotated: dir.join(format!("annotated.{}", ext)),
            processed_frame: dir.join(format!("processed_frame.{}", ext)),
        }
    }
}

#[derive(Debug)]
pub struct RunReport {
    pub pipeline: PipelineStats,
    pub table: DenseTable,
    pub best: BestReadings,
    pub render: RenderSummary,
    pub annotated: PathBuf,
    pub processed_frame: Option<PathBuf>,
}

pub struct Session<'a> {
    config: &'a Config,
}

impl<'a> Session<'a> {
    pub fn new(config: &'a Config) -> Self {
        Self { config }
    }

    /// Detection pass, gap filling, best-reading selection, rendering and
    /// finally both reports. No report is written if any step fails.
    pub fn run(
        &self,
        input: &MediaInput,
        models: &mut Models,
        outputs: &OutputPaths,
    ) -> Result<RunReport, Error> {
        info!("processing {:?} as {:?}", input.path, input.kind);
        let mut source = input.open()?;

        let mut pipeline = FramePipeline::new(models, &self.config.pipeline);
        pipeline.run(source.as_mut())?;
        let (store, stats) = pipeline.finish();

        let table = interpolate(&store);

        let best = select_best(table.rows());
        for (track_id, row) in best.iter() {
            if let Some((text, score)) = row.reading() {
                info!(
                    "track {}: {} ({:.2}) on frame {}",
                    track_id, text, score, row.frame_number
                );
            }
        }

        let renderer = OverlayRenderer::new(self.config.render.clone());

        let (render, processed_frame) = match input.kind {
            MediaKind::Video => {
                let mut sink = VideoFileSink::new(&outputs.annotated, source.fps());
                let summary = renderer.render_video(source.as_mut(), &mut sink, &table, &best)?;
                sink.release()?;

                (summary, None)
            }
            MediaKind::Image => {
                source.rewind()?;
                let frame = source
                    .read_frame()?
                    .ok_or_else(|| Error::MediaOpen(input.path.display().to_string()))?;

                let still = renderer.render_still(&frame, &table, &best)?;
                media::write_image(&outputs.processed_frame, &still.processed)?;
                media::write_image(&outputs.annotated, &still.annotated)?;

                (still.summary, Some(outputs.processed_frame.clone()))
            }
        };

        // reports last, a run that fails while rendering leaves none behind
        store.save(&outputs.results_report)?;
        table.save(&outputs.interpolated_report)?;

        Ok(RunReport {
            pipeline: stats,
            table,
            best,
            render,
            annotated: outputs.annotated.clone(),
            processed_frame,
        })
    }
}
