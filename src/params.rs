use crate::{
    error::{LoopcardError, LoopcardResult},
    palette::{self, PaletteId},
};

pub const MAX_TITLE_CHARS: usize = 48;
pub const MAX_SUBTITLE_CHARS: usize = 70;
pub const MAX_CALLOUT_CHARS: usize = 28;
pub const MIN_DURATION_SECONDS: u32 = 3;
pub const MAX_DURATION_SECONDS: u32 = 12;
pub const ALLOWED_FPS: [u32; 4] = [24, 30, 45, 60];

/// Geometry of the animated overlay drawn over the gradient background.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ShapeStyle {
    Circle,
    Wave,
    Diagonal,
}

impl ShapeStyle {
    pub const ALL: [ShapeStyle; 3] = [ShapeStyle::Circle, ShapeStyle::Wave, ShapeStyle::Diagonal];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Circle => "circle",
            Self::Wave => "wave",
            Self::Diagonal => "diagonal",
        }
    }
}

impl std::str::FromStr for ShapeStyle {
    type Err = LoopcardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|style| style.as_str() == s)
            .ok_or_else(|| {
                LoopcardError::validation(format!(
                    "unknown shape style '{s}' (expected circle, wave or diagonal)"
                ))
            })
    }
}

impl std::fmt::Display for ShapeStyle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One editing session's worth of user-chosen card settings.
///
/// Every field holds a valid value at all times: construction supplies
/// defaults and the setters clamp instead of failing, so a snapshot taken at
/// any point can be rendered or captured as-is.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct ParameterSet {
    pub title: String,
    pub subtitle: String,
    pub callout: String,
    pub duration_seconds: u32,
    pub fps: u32,
    pub accent_hex: String,
    pub palette: PaletteId,
    pub shape: ShapeStyle,
}

impl Default for ParameterSet {
    fn default() -> Self {
        Self {
            title: "Launch day".to_string(),
            subtitle: "Everything ships at noon".to_string(),
            callout: "Save your spot".to_string(),
            duration_seconds: 6,
            fps: 30,
            accent_hex: "#ff5470".to_string(),
            palette: PaletteId::Sunset,
            shape: ShapeStyle::Circle,
        }
    }
}

impl ParameterSet {
    pub fn set_title(&mut self, title: &str) {
        self.title = truncate_chars(title, MAX_TITLE_CHARS);
    }

    pub fn set_subtitle(&mut self, subtitle: &str) {
        self.subtitle = truncate_chars(subtitle, MAX_SUBTITLE_CHARS);
    }

    pub fn set_callout(&mut self, callout: &str) {
        self.callout = truncate_chars(callout, MAX_CALLOUT_CHARS);
    }

    pub fn set_duration_seconds(&mut self, seconds: u32) {
        self.duration_seconds = seconds.clamp(MIN_DURATION_SECONDS, MAX_DURATION_SECONDS);
    }

    /// Snap to the nearest allowed frame rate.
    pub fn set_fps(&mut self, fps: u32) {
        self.fps = ALLOWED_FPS
            .into_iter()
            .min_by_key(|allowed| allowed.abs_diff(fps))
            .unwrap_or(30);
    }

    /// Replace the accent color; invalid hex strings leave the old value.
    pub fn set_accent_hex(&mut self, hex: &str) {
        if palette::parse_hex_rgb(hex).is_ok() {
            self.accent_hex = hex.trim().to_string();
        }
    }

    pub fn accent_rgb(&self) -> LoopcardResult<[u8; 3]> {
        palette::parse_hex_rgb(&self.accent_hex)
    }

    pub fn duration(&self) -> std::time::Duration {
        std::time::Duration::from_secs(u64::from(self.duration_seconds))
    }

    /// Check every invariant at once; deserialized parameter files go
    /// through here before they are trusted.
    pub fn validate(&self) -> LoopcardResult<()> {
        if self.title.chars().count() > MAX_TITLE_CHARS {
            return Err(LoopcardError::validation(format!(
                "title exceeds {MAX_TITLE_CHARS} characters"
            )));
        }
        if self.subtitle.chars().count() > MAX_SUBTITLE_CHARS {
            return Err(LoopcardError::validation(format!(
                "subtitle exceeds {MAX_SUBTITLE_CHARS} characters"
            )));
        }
        if self.callout.chars().count() > MAX_CALLOUT_CHARS {
            return Err(LoopcardError::validation(format!(
                "callout exceeds {MAX_CALLOUT_CHARS} characters"
            )));
        }
        if self.duration_seconds < MIN_DURATION_SECONDS
            || self.duration_seconds > MAX_DURATION_SECONDS
        {
            return Err(LoopcardError::validation(format!(
                "duration must be within [{MIN_DURATION_SECONDS},{MAX_DURATION_SECONDS}] seconds"
            )));
        }
        if !ALLOWED_FPS.contains(&self.fps) {
            return Err(LoopcardError::validation(
                "fps must be one of 24, 30, 45, 60",
            ));
        }
        palette::parse_hex_rgb(&self.accent_hex)?;
        Ok(())
    }
}

fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        ParameterSet::default().validate().unwrap();
    }

    #[test]
    fn setters_clamp_instead_of_failing() {
        let mut p = ParameterSet::default();

        p.set_title(&"x".repeat(200));
        assert_eq!(p.title.chars().count(), MAX_TITLE_CHARS);

        p.set_duration_seconds(1);
        assert_eq!(p.duration_seconds, MIN_DURATION_SECONDS);
        p.set_duration_seconds(99);
        assert_eq!(p.duration_seconds, MAX_DURATION_SECONDS);

        p.set_fps(31);
        assert_eq!(p.fps, 30);
        p.set_fps(50);
        assert_eq!(p.fps, 45);

        p.set_accent_hex("not-a-color");
        assert_eq!(p.accent_hex, "#ff5470");
        p.set_accent_hex("#0a7d9e");
        assert_eq!(p.accent_hex, "#0a7d9e");

        p.validate().unwrap();
    }

    #[test]
    fn json_round_trip_preserves_fields() {
        let mut p = ParameterSet::default();
        p.set_title("Spring sale");
        p.shape = ShapeStyle::Wave;
        p.palette = PaletteId::Ocean;

        let json = serde_json::to_string(&p).unwrap();
        let back: ParameterSet = serde_json::from_str(&json).unwrap();
        assert_eq!(back, p);
        assert!(json.contains("\"wave\""));
        assert!(json.contains("\"ocean\""));
    }

    #[test]
    fn partial_json_fills_defaults() {
        let p: ParameterSet = serde_json::from_str(r#"{"title":"Hi"}"#).unwrap();
        assert_eq!(p.title, "Hi");
        assert_eq!(p.fps, 30);
        p.validate().unwrap();
    }
}
