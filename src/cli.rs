// ============================================================================
// TextFE command line: headless text recognition and editing
// ============================================================================
//
// Usage examples:
//   TextFE -i shot.png --list
//   TextFE -i shot.png --edit 0="Hello there" --font-size 18 -o edited.png
//   TextFE -i shot.png --move 2:40,0 --delete 3 -o moved.png
//   TextFE -i "shots/*.png" --group 0,1 --output-dir out/
//   TextFE --clipboard --list
//   TextFE --list-fonts
//
// Regions are addressed by their index in recognition order, as printed by
// --list. Indices always refer to the freshly recognized list, so later
// operations are unaffected by earlier deletes or groups.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::Parser;

use crate::canvas::{Bgr, PixelBuffer};
use crate::components::region::RegionId;
use crate::geometry::Point;
use crate::io::{clipboard_image, encode_and_write, load_image_sync};
use crate::ocr::{OcrLevel, TesseractEngine};
use crate::ops::fill::FillMethod;
use crate::ops::text;
use crate::project::{Document, DocumentEvent, TextEdit};
use crate::settings::EngineSettings;

/// Upper bound on a single recognition run.
const RECOGNITION_TIMEOUT: Duration = Duration::from_secs(300);

// ============================================================================
// Arguments
// ============================================================================

/// TextFE headless text editor.
///
/// Recognizes the text in an image, applies edits to the recognized regions
/// and writes the result. No GUI is opened.
#[derive(Parser, Debug)]
#[command(
    name = "TextFE",
    about = "Edit the text inside images from the command line",
    long_about = "Recognize text regions in screenshots and photos, then retype, move,\n\
                  group or delete them while the background is regenerated around\n\
                  the edit.\n\n\
                  Example:\n  \
                  TextFE -i shot.png --list\n  \
                  TextFE -i shot.png --edit 0=\"Hello\" -o edited.png"
)]
pub struct CliArgs {
    /// Images to process; globs such as "shots/*.png" are expanded.
    #[arg(short, long, num_args = 1.., required_unless_present_any = ["clipboard", "list_fonts"])]
    pub input: Vec<String>,

    /// Read the input image from the system clipboard instead of a file.
    #[arg(long)]
    pub clipboard: bool,

    /// Where to write the edited image (single input only).
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Output directory for batch processing (keeps the input file names).
    #[arg(long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Print the installed font families usable with --font and exit.
    #[arg(long)]
    pub list_fonts: bool,

    /// Print the recognized regions.
    #[arg(short, long)]
    pub list: bool,

    /// Replace the text of region N. Repeatable.
    #[arg(long, value_name = "N=TEXT", value_parser = parse_edit)]
    pub edit: Vec<(usize, String)>,

    /// Font size in pixels for --edit.
    #[arg(long, value_name = "PX")]
    pub font_size: Option<u32>,

    /// Font family for --edit.
    #[arg(long, value_name = "FAMILY")]
    pub font: Option<String>,

    /// Letter spacing in pixels for --edit (may be negative).
    #[arg(long, value_name = "PX", allow_hyphen_values = true)]
    pub spacing: Option<i32>,

    /// Font color for --edit.
    #[arg(long, value_name = "R,G,B", value_parser = parse_color)]
    pub color: Option<Bgr>,

    /// Move region N by (DX, DY) pixels. Repeatable.
    #[arg(long = "move", value_name = "N:DX,DY", value_parser = parse_move, allow_hyphen_values = true)]
    pub moves: Vec<(usize, Point)>,

    /// Delete region N. Repeatable.
    #[arg(long, value_name = "N")]
    pub delete: Vec<usize>,

    /// Merge the listed regions into one.
    #[arg(long, value_name = "N,M,..", value_delimiter = ',')]
    pub group: Vec<usize>,

    /// Background regeneration strategy: neighbor or inpaint.
    #[arg(long, value_name = "METHOD")]
    pub fill: Option<String>,

    /// Recognition granularity: block, paragraph, line, word, symbol.
    #[arg(long, value_name = "LEVEL")]
    pub level: Option<String>,

    /// Trained-data identifier (e.g. eng, deu).
    #[arg(long, value_name = "ID")]
    pub lang: Option<String>,

    /// JPEG quality, 1 to 100.
    #[arg(short, long, default_value_t = 90, value_name = "1-100")]
    pub quality: u8,

    /// Print per-file timing and mirror debug logging to stderr.
    #[arg(short, long)]
    pub verbose: bool,
}

impl CliArgs {
    fn has_edits(&self) -> bool {
        !self.edit.is_empty() || !self.moves.is_empty() || !self.delete.is_empty() || !self.group.is_empty()
    }
}

fn parse_edit(s: &str) -> Result<(usize, String), String> {
    let (n, text) = s.split_once('=').ok_or_else(|| format!("expected N=TEXT, got '{}'", s))?;
    let n = n.trim().parse().map_err(|_| format!("bad region index '{}'", n))?;
    Ok((n, text.replace("\\n", "\n")))
}

fn parse_color(s: &str) -> Result<Bgr, String> {
    let parts: Vec<&str> = s.split(',').map(str::trim).collect();
    let [r, g, b] = parts.as_slice() else {
        return Err(format!("expected R,G,B, got '{}'", s));
    };
    let channel = |v: &str| v.parse::<u8>().map_err(|_| format!("bad color channel '{}'", v));
    Ok(Bgr::from_rgb(channel(*r)?, channel(*g)?, channel(*b)?))
}

fn parse_move(s: &str) -> Result<(usize, Point), String> {
    let (n, delta) = s.split_once(':').ok_or_else(|| format!("expected N:DX,DY, got '{}'", s))?;
    let (dx, dy) = delta.split_once(',').ok_or_else(|| format!("expected DX,DY, got '{}'", delta))?;
    let n = n.trim().parse().map_err(|_| format!("bad region index '{}'", n))?;
    let dx = dx.trim().parse().map_err(|_| format!("bad offset '{}'", dx))?;
    let dy = dy.trim().parse().map_err(|_| format!("bad offset '{}'", dy))?;
    Ok((n, Point::new(dx, dy)))
}

// ============================================================================
// Entry
// ============================================================================

/// Process every input; fails if any single input failed.
pub fn run(args: CliArgs) -> ExitCode {
    if args.list_fonts {
        for family in text::enumerate_system_fonts() {
            println!("{}", family);
        }
        return ExitCode::SUCCESS;
    }

    let mut settings = EngineSettings::load();
    if let Some(method) = args.fill.as_deref() {
        match FillMethod::parse(method) {
            Some(m) => settings.fill_method = m,
            None => {
                eprintln!("error: unknown fill method '{}' (expected neighbor or inpaint).", method);
                return ExitCode::FAILURE;
            }
        }
    }
    if let Some(level) = args.level.as_deref() {
        match OcrLevel::parse(level) {
            Some(l) => settings.ocr_level = l,
            None => {
                eprintln!("error: unknown recognition level '{}'.", level);
                return ExitCode::FAILURE;
            }
        }
    }
    if let Some(lang) = &args.lang {
        settings.data_file = lang.clone();
    }
    if TesseractEngine::export_data_dir(&settings.ocr_params()).is_none() {
        log::info!(
            "no trained data at {}, tesseract uses its own install",
            settings.trained_data_path().display()
        );
    }

    if args.clipboard {
        let pixels = match clipboard_image() {
            Ok(p) => p,
            Err(e) => {
                eprintln!("error: {}", e);
                return ExitCode::FAILURE;
            }
        };
        let output = args.output.clone();
        return match run_one(pixels, "clipboard", output.as_deref(), &settings, &args) {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                eprintln!("error: {}", e);
                ExitCode::FAILURE
            }
        };
    }

    let inputs = resolve_inputs(&args.input);
    if inputs.is_empty() {
        eprintln!("error: nothing to process, every input pattern came up empty.");
        return ExitCode::FAILURE;
    }
    if inputs.len() > 1 && args.output.is_some() && args.output_dir.is_none() {
        eprintln!("error: --output names one file but {} inputs matched; use --output-dir instead.", inputs.len());
        return ExitCode::FAILURE;
    }
    if let Some(dir) = &args.output_dir
        && let Err(e) = std::fs::create_dir_all(dir)
    {
        eprintln!("error: cannot create '{}': {}", dir.display(), e);
        return ExitCode::FAILURE;
    }

    let announce = inputs.len() > 1 || args.verbose;
    let failures = inputs
        .iter()
        .enumerate()
        .filter(|(n, path)| {
            if announce {
                println!("({} of {}) {}", n + 1, inputs.len(), path.display());
            }
            let started = Instant::now();
            let target = build_output_path(path, args.output.as_deref(), args.output_dir.as_deref(), args.has_edits());
            let outcome = load_image_sync(path)
                .map_err(|e| format!("cannot load: {}", e))
                .and_then(|pixels| run_one(pixels, &path.display().to_string(), target.as_deref(), &settings, &args));
            match outcome {
                Ok(()) => {
                    if args.verbose {
                        println!("  finished in {} ms", started.elapsed().as_millis());
                    }
                    false
                }
                Err(e) => {
                    eprintln!("  {}: {}", path.display(), e);
                    true
                }
            }
        })
        .count();

    if failures == 0 { ExitCode::SUCCESS } else { ExitCode::FAILURE }
}

// ============================================================================
// Per-image pipeline
// ============================================================================

fn run_one(
    pixels: PixelBuffer,
    label: &str,
    output: Option<&Path>,
    settings: &EngineSettings,
    args: &CliArgs,
) -> Result<(), String> {
    let mut doc = Document::new(pixels, settings.clone(), Arc::new(TesseractEngine));
    doc.name = label.to_string();

    // -- Step 1: Recognize -----------------------------------------------------
    doc.extract().map_err(|e| format!("recognition failed: {}", e))?;
    if !doc.wait_for_recognition(RECOGNITION_TIMEOUT) {
        return Err("recognition timed out".to_string());
    }
    for event in doc.drain_events() {
        if let DocumentEvent::RecognitionFailed(msg) = event {
            return Err(format!("recognition failed: {}", msg));
        }
    }

    if args.list {
        for (i, r) in doc.regions().enumerate() {
            println!(
                "  {:>3}  ({},{})-({},{})  {:?}",
                i, r.top_left.x, r.top_left.y, r.bottom_right.x, r.bottom_right.y, r.text
            );
        }
    }

    // -- Step 2: Edit ----------------------------------------------------------
    apply_edits(&mut doc, args)?;

    // -- Step 3: Save ----------------------------------------------------------
    if let Some(out) = output {
        encode_and_write(doc.pixels(), out, args.quality).map_err(|e| format!("save failed: {}", e))?;
        if args.verbose {
            println!("  wrote {}", out.display());
        }
    } else if args.has_edits() {
        return Err("edits given but no output path".to_string());
    }
    Ok(())
}

fn apply_edits(doc: &mut Document, args: &CliArgs) -> Result<(), String> {
    let ids: Vec<RegionId> = doc.regions().map(|r| r.id).collect();
    let id_of = |n: usize| -> Result<RegionId, String> {
        ids.get(n).copied().ok_or_else(|| format!("no region {} (found {})", n, ids.len()))
    };

    for (n, text) in &args.edit {
        let id = id_of(*n)?;
        doc.select(id).map_err(|e| e.to_string())?;
        let edit = TextEdit {
            text: Some(text.clone()),
            font_size: args.font_size,
            font_family: args.font.clone(),
            letter_spacing: args.spacing,
            color: args.color,
        };
        doc.edit_selection(edit).map_err(|e| format!("edit {}: {}", n, e))?;
    }

    for (n, delta) in &args.moves {
        let id = id_of(*n)?;
        doc.select(id).map_err(|e| e.to_string())?;
        doc.drag_to(*delta, true);
        doc.commit_drag();
    }

    if !args.group.is_empty() {
        doc.deselect_all();
        for &n in &args.group {
            doc.add_to_selection(id_of(n)?).map_err(|e| e.to_string())?;
        }
        doc.group_selections().map_err(|e| format!("group: {}", e))?;
    }

    if !args.delete.is_empty() {
        doc.deselect_all();
        for &n in &args.delete {
            let id = id_of(n)?;
            // Grouped members no longer exist.
            if doc.region(id).is_none() {
                log::warn!("delete: region {} was merged away, skipping", n);
                continue;
            }
            doc.add_to_selection(id).map_err(|e| e.to_string())?;
        }
        doc.delete_selection().map_err(|e| format!("delete: {}", e))?;
    }
    Ok(())
}

// ============================================================================
// Helpers
// ============================================================================

/// Literal paths first, then glob expansion. Duplicates keep their first
/// position.
fn resolve_inputs(patterns: &[String]) -> Vec<PathBuf> {
    fn add(seen: &mut Vec<PathBuf>, p: PathBuf) {
        if !seen.contains(&p) {
            seen.push(p);
        }
    }

    let mut seen = Vec::new();

    for pattern in patterns {
        let literal = PathBuf::from(pattern);
        if literal.exists() {
            add(&mut seen, literal);
            continue;
        }
        let Ok(paths) = glob::glob(pattern) else {
            log::warn!("skipping malformed pattern {:?}", pattern);
            continue;
        };
        let before = seen.len();
        for p in paths.flatten() {
            add(&mut seen, p);
        }
        if seen.len() == before {
            log::warn!("{:?} matched nothing", pattern);
        }
    }
    seen
}

/// Where to write one input's result.
///
/// 1. `--output` (explicit path, single input)
/// 2. `--output-dir` (keeps the input file name)
/// 3. Next to the input as `<stem>_edited.<ext>`, but only when there are
///    edits to write.
fn build_output_path(input: &Path, output: Option<&Path>, output_dir: Option<&Path>, has_edits: bool) -> Option<PathBuf> {
    if let Some(out) = output {
        return Some(out.to_path_buf());
    }
    if let Some(dir) = output_dir {
        return Some(dir.join(input.file_name()?));
    }
    if !has_edits {
        return None;
    }
    let stem = input.file_stem()?.to_string_lossy().into_owned();
    let ext = input.extension().map(|e| e.to_string_lossy().into_owned()).unwrap_or_else(|| "png".to_string());
    let parent = input.parent().unwrap_or(Path::new("."));
    Some(parent.join(format!("{}_edited.{}", stem, ext)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn edit_argument_splits_on_first_equals() {
        assert_eq!(parse_edit("3=a=b").unwrap(), (3, "a=b".to_string()));
        assert_eq!(parse_edit("0=two\\nlines").unwrap().1, "two\nlines");
        assert!(parse_edit("x=1").is_err());
        assert!(parse_edit("nothing").is_err());
    }

    #[test]
    fn color_argument_is_rgb() {
        assert_eq!(parse_color("255, 0,10").unwrap(), Bgr::from_rgb(255, 0, 10));
        assert!(parse_color("1,2").is_err());
        assert!(parse_color("1,2,300").is_err());
    }

    #[test]
    fn move_argument_allows_negative_offsets() {
        assert_eq!(parse_move("2:-5,7").unwrap(), (2, Point::new(-5, 7)));
        assert!(parse_move("2-5,7").is_err());
    }

    #[test]
    fn output_path_priority() {
        let input = Path::new("shots/a.jpg");
        assert_eq!(build_output_path(input, Some(Path::new("o.png")), None, true), Some(PathBuf::from("o.png")));
        assert_eq!(build_output_path(input, None, Some(Path::new("out")), false), Some(PathBuf::from("out/a.jpg")));
        assert_eq!(build_output_path(input, None, None, true), Some(PathBuf::from("shots/a_edited.jpg")));
        assert_eq!(build_output_path(input, None, None, false), None);
    }

    #[test]
    fn args_parse_with_clap() {
        let args = CliArgs::try_parse_from([
            "TextFE", "-i", "a.png", "--edit", "0=hi", "--move", "1:-3,4", "--group", "0,2", "--color", "1,2,3",
        ])
        .unwrap();
        assert_eq!(args.edit, vec![(0, "hi".to_string())]);
        assert_eq!(args.moves, vec![(1, Point::new(-3, 4))]);
        assert_eq!(args.group, vec![0, 2]);
        assert!(args.has_edits());
        assert!(CliArgs::try_parse_from(["TextFE"]).is_err());
        assert!(CliArgs::try_parse_from(["TextFE", "--clipboard"]).is_ok());
        assert!(CliArgs::try_parse_from(["TextFE", "--list-fonts"]).unwrap().list_fonts);
    }
}
