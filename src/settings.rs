use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::ocr::{OcrLevel, OcrParams};
use crate::ops::fill::{FillMethod, FillSettings};
use crate::components::colors::{PALETTE_MAX, PALETTE_MIN};

// ============================================================================
// ENGINE SETTINGS — persisted as key=value lines
// ============================================================================

/// Configuration read when a document is opened. The engine never writes
/// these back; only the CLI and tests call `save*`.
#[derive(Clone, Debug, PartialEq)]
pub struct EngineSettings {
    pub fill_method: FillMethod,
    pub neighbor_border: u32,
    pub inpaint_border: u32,
    pub inpaint_radius: u32,
    pub dilate_kernel: u32,
    pub erode_kernel: u32,
    pub invert_mask_threshold: f64,
    pub palette_limit: usize,
    pub ocr_level: OcrLevel,
    pub ocr_engine_mode: i32,
    pub ocr_page_seg_mode: i32,
    pub ocr_dpi: i32,
    pub data_dir: PathBuf,
    pub data_file: String,
    /// `0` = unlimited.
    pub max_undo_steps: usize,
    pub nudge_step: i32,
    pub zoom_step: f64,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            fill_method: FillMethod::Inpaint,
            neighbor_border: 1,
            inpaint_border: 3,
            inpaint_radius: 3,
            dilate_kernel: 3,
            erode_kernel: 2,
            invert_mask_threshold: 0.75,
            palette_limit: PALETTE_MAX,
            ocr_level: OcrLevel::Word,
            ocr_engine_mode: 3,
            ocr_page_seg_mode: 3,
            ocr_dpi: 150,
            data_dir: config_dir().unwrap_or_default(),
            data_file: "eng".to_string(),
            max_undo_steps: 50,
            nudge_step: 1,
            zoom_step: 0.1,
        }
    }
}

/// Per-user configuration directory.
///
/// On Linux:   ~/.config/textfe  (XDG_CONFIG_HOME respected)
/// On Windows: %APPDATA%\TextFE
/// On macOS:   ~/Library/Application Support/TextFE
pub fn config_dir() -> Option<PathBuf> {
    #[cfg(target_os = "linux")]
    {
        let base = std::env::var("XDG_CONFIG_HOME").map(PathBuf::from).unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "~".to_string());
            PathBuf::from(home).join(".config")
        });
        Some(base.join("textfe"))
    }
    #[cfg(target_os = "windows")]
    {
        let appdata = std::env::var("APPDATA").or_else(|_| std::env::var("USERPROFILE")).ok()?;
        Some(PathBuf::from(appdata).join("TextFE"))
    }
    #[cfg(target_os = "macos")]
    {
        let home = std::env::var("HOME").unwrap_or_else(|_| "~".to_string());
        Some(PathBuf::from(home).join("Library").join("Application Support").join("TextFE"))
    }
    #[cfg(not(any(target_os = "linux", target_os = "windows", target_os = "macos")))]
    {
        std::env::current_exe().ok().and_then(|p| p.parent().map(|d| d.to_path_buf()))
    }
}

impl EngineSettings {
    pub fn settings_path() -> Option<PathBuf> {
        config_dir().map(|d| d.join("textfe_settings.cfg"))
    }

    /// Load from the platform path (defaults if missing or unreadable).
    pub fn load() -> Self {
        match Self::settings_path() {
            Some(path) => Self::load_from(&path),
            None => Self::default(),
        }
    }

    pub fn save(&self) -> Result<()> {
        let Some(path) = Self::settings_path() else { return Ok(()) };
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        self.save_to(&path)
    }

    /// Load from `path`. Unknown keys and malformed values keep their
    /// defaults; a missing file yields all defaults.
    pub fn load_from(path: &Path) -> Self {
        let Ok(content) = std::fs::read_to_string(path) else {
            log::debug!("settings: {} not readable, using defaults", path.display());
            return Self::default();
        };
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Self {
        let mut s = Self::default();
        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((key, val)) = line.split_once('=') else { continue };
            let key = key.trim();
            let val = val.trim();
            match key {
                "fill_method" => {
                    if let Some(m) = FillMethod::parse(val) {
                        s.fill_method = m;
                    }
                }
                "neighbor_border" => {
                    if let Ok(v) = val.parse() {
                        s.neighbor_border = v;
                    }
                }
                "inpaint_border" => {
                    if let Ok(v) = val.parse() {
                        s.inpaint_border = v;
                    }
                }
                "inpaint_radius" => {
                    if let Ok(v) = val.parse::<u32>() {
                        s.inpaint_radius = v.max(1);
                    }
                }
                "dilate_kernel" => {
                    if let Ok(v) = val.parse::<u32>() {
                        s.dilate_kernel = v.max(1);
                    }
                }
                "erode_kernel" => {
                    if let Ok(v) = val.parse::<u32>() {
                        s.erode_kernel = v.max(1);
                    }
                }
                "invert_mask_threshold" => {
                    if let Ok(v) = val.parse::<f64>() {
                        s.invert_mask_threshold = v.clamp(0.0, 1.0);
                    }
                }
                "palette_limit" => {
                    if let Ok(v) = val.parse::<usize>() {
                        s.palette_limit = v.clamp(PALETTE_MIN, PALETTE_MAX);
                    }
                }
                "ocr_level" => {
                    if let Some(l) = OcrLevel::parse(val) {
                        s.ocr_level = l;
                    }
                }
                "ocr_engine_mode" => {
                    if let Ok(v) = val.parse() {
                        s.ocr_engine_mode = v;
                    }
                }
                "ocr_page_seg_mode" => {
                    if let Ok(v) = val.parse() {
                        s.ocr_page_seg_mode = v;
                    }
                }
                "ocr_dpi" => {
                    if let Ok(v) = val.parse() {
                        s.ocr_dpi = v;
                    }
                }
                "data_dir" => {
                    if !val.is_empty() {
                        s.data_dir = PathBuf::from(val);
                    }
                }
                "data_file" => {
                    if !val.is_empty() {
                        s.data_file = val.to_string();
                    }
                }
                "max_undo_steps" => {
                    if let Ok(v) = val.parse() {
                        s.max_undo_steps = v;
                    }
                }
                "nudge_step" => {
                    if let Ok(v) = val.parse::<i32>() {
                        s.nudge_step = v.clamp(1, 10);
                    }
                }
                "zoom_step" => {
                    if let Ok(v) = val.parse::<f64>() {
                        if v > 0.0 {
                            s.zoom_step = v;
                        }
                    }
                }
                _ => log::debug!("settings: ignoring unknown key '{}'", key),
            }
        }
        s
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        let content = format!(
            "fill_method={}\n\
             neighbor_border={}\n\
             inpaint_border={}\n\
             inpaint_radius={}\n\
             dilate_kernel={}\n\
             erode_kernel={}\n\
             invert_mask_threshold={}\n\
             palette_limit={}\n\
             ocr_level={}\n\
             ocr_engine_mode={}\n\
             ocr_page_seg_mode={}\n\
             ocr_dpi={}\n\
             data_dir={}\n\
             data_file={}\n\
             max_undo_steps={}\n\
             nudge_step={}\n\
             zoom_step={}\n",
            self.fill_method.as_str(),
            self.neighbor_border,
            self.inpaint_border,
            self.inpaint_radius,
            self.dilate_kernel,
            self.erode_kernel,
            self.invert_mask_threshold,
            self.palette_limit,
            self.ocr_level.as_str(),
            self.ocr_engine_mode,
            self.ocr_page_seg_mode,
            self.ocr_dpi,
            self.data_dir.display(),
            self.data_file,
            self.max_undo_steps,
            self.nudge_step,
            self.zoom_step,
        );
        std::fs::write(path, content)?;
        Ok(())
    }

    // ---- views consumed by the engine -----------------------------------------

    pub fn fill_settings(&self) -> FillSettings {
        FillSettings {
            method: self.fill_method,
            neighbor_border: self.neighbor_border,
            inpaint_border: self.inpaint_border,
            inpaint_radius: self.inpaint_radius,
            dilate_kernel: self.dilate_kernel,
            erode_kernel: self.erode_kernel,
            invert_mask_threshold: self.invert_mask_threshold,
        }
    }

    pub fn ocr_params(&self) -> OcrParams {
        OcrParams {
            level: self.ocr_level,
            engine_mode: self.ocr_engine_mode,
            page_seg_mode: self.ocr_page_seg_mode,
            dpi: self.ocr_dpi,
            language: self.data_file.clone(),
            data_dir: self.data_dir.clone(),
        }
    }

    /// `<data_dir>/<data_file>.traineddata`. Logs a warning when missing;
    /// the system tesseract install is used as a fallback.
    pub fn trained_data_path(&self) -> PathBuf {
        let path = self.data_dir.join(format!("{}.traineddata", self.data_file));
        if !path.exists() {
            log::warn!(
                "trained data {} not found; relying on the system tesseract data",
                path.display()
            );
        }
        path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("textfe_settings.cfg");
        let mut s = EngineSettings::default();
        s.fill_method = FillMethod::Neighbor;
        s.ocr_level = OcrLevel::Line;
        s.palette_limit = 7;
        s.data_dir = dir.path().to_path_buf();
        s.max_undo_steps = 0;
        s.save_to(&path).unwrap();
        assert_eq!(EngineSettings::load_from(&path), s);
    }

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(EngineSettings::load_from(&dir.path().join("nope.cfg")), EngineSettings::default());
    }

    #[test]
    fn bad_values_are_ignored_and_ranges_clamped() {
        let s = EngineSettings::parse(
            "fill_method=sponge\n\
             palette_limit=99\n\
             nudge_step=0\n\
             ocr_dpi=lots\n\
             mystery=1\n\
             # comment\n\
             inpaint_border=5\n",
        );
        assert_eq!(s.fill_method, FillMethod::Inpaint);
        assert_eq!(s.palette_limit, PALETTE_MAX);
        assert_eq!(s.nudge_step, 1);
        assert_eq!(s.ocr_dpi, 150);
        assert_eq!(s.inpaint_border, 5);
        assert_eq!(s.neighbor_border, 1);
    }

    #[test]
    fn views_carry_values() {
        let s = EngineSettings::parse("neighbor_border=2\ndata_file=deu\n");
        assert_eq!(s.fill_settings().neighbor_border, 2);
        assert_eq!(s.ocr_params().language, "deu");
    }
}
