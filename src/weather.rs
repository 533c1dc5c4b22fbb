use lazy_static::lazy_static;
use regex::Regex;

use crate::units::visibility;

/// At or above this many meters, a report with no broken or overcast layer reads as clear.
const CLEAR_MIN_M: u32 = 9000;
const LOW_MAX_M: u32 = 3000;
const PARTIAL_MAX_M: u32 = 8000;

/// Operational sky/visibility category behind the at-a-glance indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Condition {
    Clear,
    Overcast,
    LowVisibility,
    Partial,
    Variable,
}

/// Colour family a category is drawn in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    Amber,
    Slate,
    Orange,
    Cyan,
}

impl Condition {
    pub fn label(&self) -> &'static str {
        match self {
            Condition::Clear => "Despejado",
            Condition::Overcast => "Overcast",
            Condition::LowVisibility => "Baja",
            Condition::Partial => "Parcial",
            Condition::Variable => "Variable",
        }
    }

    pub fn icon(&self) -> &'static str {
        match self {
            Condition::Clear => "☀",
            Condition::Overcast => "☁",
            Condition::LowVisibility => "≋",
            Condition::Partial | Condition::Variable => "⛅",
        }
    }

    pub fn tone(&self) -> Tone {
        match self {
            Condition::Clear => Tone::Amber,
            Condition::Overcast => Tone::Slate,
            Condition::LowVisibility => Tone::Orange,
            Condition::Partial | Condition::Variable => Tone::Cyan,
        }
    }
}

/// Signals pulled out of the decoded fields before any rule is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Evidence {
    pub cavok: bool,
    pub overcast: bool,
    pub broken: bool,
    pub fog_like: bool,
    pub meters: Option<u32>,
}

impl Evidence {
    pub fn gather<S: AsRef<str>>(
        visibility_main: &str,
        visibility_text: &str,
        weather: &[S],
        clouds: &[S],
    ) -> Self {
        lazy_static! {
            static ref CAVOK: Regex = Regex::new(r"(?i)cavok").unwrap();
            static ref OVERCAST: Regex =
                Regex::new(r"(?i)OVC|completamente cubierto|8 octas").unwrap();
            static ref BROKEN: Regex =
                Regex::new(r"(?i)BKN|parcialmente cubierto|5 a 7 octas").unwrap();
            static ref FOG_LIKE: Regex = Regex::new(
                r"(?i)fog|mist|haze|smoke|calima|bruma|niebla|neblina|humo"
            )
            .unwrap();
        }

        let clouds = join(clouds);
        let obscuration = format!("{} {}", visibility_text, join(weather));

        Evidence {
            cavok: CAVOK.is_match(visibility_main),
            overcast: OVERCAST.is_match(&clouds),
            broken: BROKEN.is_match(&clouds),
            fog_like: FOG_LIKE.is_match(&obscuration),
            meters: visibility::normalize(visibility_main),
        }
    }

    /// First matching rule wins.
    pub fn condition(&self) -> Condition {
        match *self {
            Evidence { cavok: true, .. } => Condition::Clear,
            Evidence {
                meters: Some(m),
                broken: false,
                overcast: false,
                ..
            } if m >= CLEAR_MIN_M => Condition::Clear,
            Evidence { overcast: true, .. } => Condition::Overcast,
            Evidence { fog_like: true, .. } => Condition::LowVisibility,
            Evidence { meters: Some(m), .. } if m < LOW_MAX_M => Condition::LowVisibility,
            Evidence { broken: true, .. } => Condition::Partial,
            Evidence { meters: Some(m), .. } if m < PARTIAL_MAX_M => Condition::Partial,
            _ => Condition::Variable,
        }
    }
}

fn join<S: AsRef<str>>(parts: &[S]) -> String {
    parts.iter().map(AsRef::as_ref).collect::<Vec<_>>().join(" ")
}

pub fn classify<S: AsRef<str>>(
    visibility_main: &str,
    visibility_text: &str,
    weather: &[S],
    clouds: &[S],
) -> Condition {
    let evidence = Evidence::gather(visibility_main, visibility_text, weather, clouds);
    let condition = evidence.condition();
    tracing::debug!(?evidence, ?condition, "classified report");
    condition
}

/// Narrative without its first sentence, which only repeats the report header.
pub fn condense(narrative: &str) -> &str {
    let text = narrative.trim();
    match text.find('.') {
        Some(idx) => text[idx + 1..].trim(),
        None => text,
    }
}
