//! Re-renders a video from a saved report.
//!
//! Usage: render_report <video> <report.csv> <out.mp4> [--raw] [--config cfg.json]
//!
//! With `--raw` the report is a results report and gets gap-filled first,
//! otherwise it is read as an interpolated report.

use std::io;
use std::path::Path;

use log::info;
use plate_track::config::Config;
use plate_track::error::Error;
use plate_track::frame::FrameSource;
use plate_track::media::{VideoFileSink, VideoFileSource};
use plate_track::{interpolate, select_best, DenseTable, DetectionStore, OverlayRenderer};

fn usage() -> Error {
    Error::IoError(io::Error::new(
        io::ErrorKind::InvalidInput,
        "usage: render_report <video> <report.csv> <out.mp4> [--raw] [--config cfg.json]",
    ))
}

fn main() -> Result<(), Error> {
    env_logger::init();

    let mut args = std::env::args().skip(1);
    let video = args.next().ok_or_else(usage)?;
    let report = args.next().ok_or_else(usage)?;
    let out = args.next().ok_or_else(usage)?;

    let mut raw = false;
    let mut config = Config::default();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--raw" => raw = true,
            "--config" => config = Config::from_file(args.next().ok_or_else(usage)?)?,
            _ => return Err(usage()),
        }
    }

    let table = if raw {
        interpolate(&DetectionStore::load(&report)?)
    } else {
        DenseTable::load(&report)?
    };
    let best = select_best(table.rows());
    info!("{} rows, {} tracks with a reading", table.len(), best.len());

    let mut source = VideoFileSource::open(Path::new(&video))?;
    let mut sink = VideoFileSink::new(&out, source.fps());

    let renderer = OverlayRenderer::new(config.render);
    let summary = renderer.render_video(&mut source, &mut sink, &table, &best)?;
    sink.release()?;

    for label in &summary.labels {
        println!("frame {:>6}  track {:>4}  {}", label.frame_number, label.track_id, label.text);
    }
    info!(
        "wrote {} frames to {} ({} overlays skipped)",
        summary.frames, out, summary.skipped_overlays
    );

    Ok(())
}
