use std::fs::File;
use std::path::{Path, PathBuf};

use chrono::{Duration, Utc};
use clap::{Parser, Subcommand};
use structures::{Palette, PaletteColor};
use tracker::canvas::PixelBuffer;
use tracker::comparator::Template;
use tracker::constants::{PLACEABLE, UNPLACEABLE};
use tracker::store;
use tracker::{Eta, ProgressTracker, TemplateDesign};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Quantize a template image to palette indices and save it
    Quantize {
        image: String,
        palette: String,
        out_dir: String,
        #[clap(short, long)]
        /// logical width in cells, for upscaled template images
        logical_width: Option<u32>,
        #[clap(long)]
        /// treat the first pixel as image data even when nearly transparent
        keep_scale_marker: bool,
    },
    /// Report a design's progress against a canvas snapshot
    Compare {
        design: String,
        palette: String,
        canvas: String,
        x: i64,
        y: i64,
        #[clap(short, long)]
        /// placemap image; fully transparent pixels are unplaceable
        placemap: Option<String>,
        #[clap(short, long)]
        /// tracking state to resume and update
        state: Option<String>,
    },
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Quantize {
            image,
            palette,
            out_dir,
            logical_width,
            keep_scale_marker,
        } => {
            let palette = load_palette(Path::new(&palette));

            let rgba = image::open(&image)
                .expect("Could not open template image")
                .to_rgba8();
            let (width, height) = rgba.dimensions();

            let design = TemplateDesign::decode(
                rgba.as_raw(),
                width,
                height,
                logical_width,
                !keep_scale_marker,
                &palette,
            )
            .expect("Could not quantize template image");

            let out = PathBuf::from(out_dir).join(design.file_name());
            design.save(&out, &palette).expect("Could not save design");

            println!(
                "{}x{} cells, {} painted",
                design.width(),
                design.height(),
                design.size()
            );
            println!("saved {}", out.display());
        }
        Commands::Compare {
            design,
            palette,
            canvas,
            x,
            y,
            placemap,
            state,
        } => {
            let palette = load_palette(Path::new(&palette));
            let design =
                TemplateDesign::load(Path::new(&design), &palette).expect("Could not load design");
            let canvas = load_canvas(Path::new(&canvas), &palette);
            let placemap = match placemap {
                Some(path) => load_placemap(Path::new(&path)),
                None => PixelBuffer::filled(canvas.width(), canvas.height(), PLACEABLE),
            };

            let now = Utc::now();
            let template = Template::new(std::sync::Arc::new(design), x, y);

            let state_path = state.map(PathBuf::from);
            let record = state_path.as_deref().and_then(store::read_persisted);

            let mut tracker = match &record {
                Some(record) => {
                    ProgressTracker::restore(template, &canvas, &placemap, record, now)
                }
                None => ProgressTracker::new(template, &canvas, &placemap, now),
            };
            tracker.sync(&canvas, None, now);

            report(&mut tracker, &canvas, &palette, now);

            if let Some(path) = &state_path {
                let record = tracker.persisted(&canvas, now);
                store::write_persisted(path, &record).expect("Could not write tracking state");
            }
        }
    }
}

fn load_palette(path: &Path) -> Palette {
    let file = File::open(path).expect("Could not open palette file");
    let colors: Vec<PaletteColor> =
        serde_json::from_reader(file).expect("Could not parse palette file");

    Palette::from_colors(&colors).expect("Invalid palette")
}

/// Quantize a canvas snapshot image; pixels off the palette read as
/// transparent and will count against any template covering them.
fn load_canvas(path: &Path, palette: &Palette) -> PixelBuffer {
    let rgba = image::open(path)
        .expect("Could not open canvas image")
        .to_rgba8();
    let (width, height) = rgba.dimensions();

    let options = tracker::QuantizeOptions {
        scale: 1,
        ignore_scale_marker: false,
    };

    let data = tracker::quantizer::quantize(rgba.as_raw(), width, height, &options, palette)
        .expect("Could not quantize canvas image");

    PixelBuffer::from_raw(width, height, data).expect("Could not build canvas buffer")
}

fn load_placemap(path: &Path) -> PixelBuffer {
    let rgba = image::open(path)
        .expect("Could not open placemap image")
        .to_rgba8();
    let (width, height) = rgba.dimensions();

    let data = rgba
        .pixels()
        .map(|pixel| if pixel[3] == 0 { UNPLACEABLE } else { PLACEABLE })
        .collect();

    PixelBuffer::from_raw(width, height, data).expect("Could not build placemap buffer")
}

fn report(
    tracker: &mut ProgressTracker,
    canvas: &PixelBuffer,
    palette: &Palette,
    now: chrono::DateTime<Utc>,
) {
    let size = tracker.size();
    let progress = tracker.progress(canvas);
    let percent = if size == 0 {
        100.0
    } else {
        progress as f64 / size as f64 * 100.0
    };

    println!("{:.2}% done ({} of {} pixels)", percent, progress, size);

    let unplaceable = size as i64 - tracker.placeable_size() as i64;
    if unplaceable > 0 {
        println!("{} pixels cannot currently be placed", unplaceable);
    }

    let incorrect = tracker.incorrect_pixels(canvas);
    for &(x, y, expected) in incorrect.iter().take(4) {
        let name = palette.name_of(expected).unwrap_or("unknown");
        println!("[{},{}] should be {}", x, y, name);
    }
    if incorrect.len() > 4 {
        println!("...");
    }

    for (label, period) in [
        ("last minute", Duration::minutes(1)),
        ("last hour", Duration::hours(1)),
        ("last day", Duration::days(1)),
    ] {
        let activity = tracker.recent_activity(period, now);
        let net = activity.positive as i64 - activity.negative as i64;
        println!(
            "{}: {:+} net ({} up, {} down)",
            label, net, activity.positive, activity.negative
        );
    }

    match tracker.eta(canvas, now) {
        Eta::Completing(duration) if duration == Duration::zero() => println!("Done"),
        Eta::Completing(duration) => {
            println!("Done in ~{}", human_time(duration.num_milliseconds()))
        }
        Eta::Regressing(duration) => {
            println!("Gone in ~{}", human_time(duration.num_milliseconds()))
        }
        Eta::Unknown => println!("No estimate yet"),
    }
}

fn human_time(ms: i64) -> String {
    let units = [
        ("second", 1000.0, 120.0),
        ("minute", 60.0, 180.0),
        ("hour", 60.0, 48.0),
    ];

    let mut time = ms as f64;
    for (unit, divisor, limit) in units {
        time /= divisor;
        if time < limit {
            return format_unit(time, unit);
        }
    }

    format_unit(time / 24.0, "day")
}

fn format_unit(time: f64, unit: &str) -> String {
    let rounded = time.round() as i64;
    let plural = if rounded == 1 { "" } else { "s" };
    format!("{} {}{}", rounded, unit, plural)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn human_time_picks_the_natural_unit() {
        assert_eq!(human_time(1000), "1 second");
        assert_eq!(human_time(95 * 1000), "95 seconds");
        assert_eq!(human_time(120 * 1000), "2 minutes");
        assert_eq!(human_time(150 * 60 * 1000), "150 minutes");
        assert_eq!(human_time(12 * 60 * 60 * 1000), "12 hours");
        assert_eq!(human_time(72 * 60 * 60 * 1000), "3 days");
    }
}
