/// Parameter composition
///
/// Turns a creative intent into a fully specified generation document.
/// Pure with respect to its inputs except for three randomness points
/// (style pick, performer-framing pick, seed), each routed through an
/// injectable [`RandomSource`] so tests can script them.
use std::path::Path;

use anyhow::{Context, Result};
use base64::Engine;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::config::Dimensions;
use crate::params::{GenerationParameters, MotionProfile, StyleAdapter};

/// Visual-style phrase bank. One entry is appended to every prompt;
/// this is the only source of variety across repeated submissions of
/// the same base text.
const STYLE_BANK: &[&str] = &[
    "award-winning cinematic, 3D, vibrant monochromatic, crystallized, 4k",
    "80s VHS scene, analog scanlines, deep contrast, saturated blues, cinematic lighting",
    "digital painting, sharp lines, rich gradients, motion blur, glow highlights",
    "holographic lightscape, metallic, prismatic, surreal composition",
    "retro anime style, cel-shading, 90s vibes, deep shadows",
    "dreamy impressionist brushstrokes, warm colors, fluid texture",
];

/// Performer-framing bank, appended only for [`ModeTag::VocalFocus`].
const FRAMING_BANK: &[&str] = &[
    "close-up on performer's face, clear lighting, detailed facial features",
    "medium shot of performer, waist-up, expressive movement, ambient lighting",
    "wide shot of stage with performer, dynamic composition, atmospheric haze",
    "over-the-shoulder shot from performer, crowd in background, dramatic backlight",
    "side profile of performer, soft rim light, shallow depth of field",
    "low-angle shot looking up at performer, spotlight overhead",
];

/// Performance mode steering prompt framing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModeTag {
    /// Background visuals, no performer emphasis.
    Ambient,
    /// Singer-centric framing; adds a performer shot phrase.
    VocalFocus,
    /// Full-stage atmosphere.
    StagePerformance,
}

impl std::str::FromStr for ModeTag {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "ambient" => Ok(Self::Ambient),
            "vocal" | "vocal_focus" | "vocal-focus" => Ok(Self::VocalFocus),
            "stage" | "stage_performance" | "stage-performance" => Ok(Self::StagePerformance),
            other => Err(format!("unknown mode: {other}")),
        }
    }
}

/// Creative intent for one submission. Constructed per user action,
/// never persisted.
#[derive(Debug, Clone)]
pub struct GenerationIntent {
    pub base_text: String,
    pub mode: ModeTag,
    /// Style reference image as a data URL, if any.
    pub style_reference_image: Option<String>,
    /// Style-transfer strength in `[0, 2]`.
    pub style_strength: f32,
}

impl GenerationIntent {
    pub fn new(base_text: impl Into<String>) -> Self {
        Self {
            base_text: base_text.into(),
            mode: ModeTag::Ambient,
            style_reference_image: None,
            style_strength: crate::params::DEFAULT_STYLE_STRENGTH,
        }
    }

    pub fn with_mode(mut self, mode: ModeTag) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_style_image(mut self, data_url: impl Into<String>, strength: f32) -> Self {
        self.style_reference_image = Some(data_url.into());
        self.style_strength = strength;
        self
    }
}

/// Source for the composer's randomness points. Implementations must
/// be cheap; `pick` is called up to twice per composition.
pub trait RandomSource: Send {
    /// Uniform index into a bank of `len` entries.
    fn pick(&mut self, len: usize) -> usize;

    /// Fresh generation seed. No determinism or replay guarantee.
    fn seed(&mut self) -> u64;
}

/// Default source backed by the thread RNG.
#[derive(Debug, Default)]
pub struct ThreadRngSource;

impl RandomSource for ThreadRngSource {
    fn pick(&mut self, len: usize) -> usize {
        rand::thread_rng().gen_range(0..len)
    }

    fn seed(&mut self) -> u64 {
        rand::thread_rng().gen_range(0..100_000)
    }
}

/// Composer turning intents into parameter documents.
pub struct PromptComposer {
    model_id: String,
    dimensions: Dimensions,
    rng: Box<dyn RandomSource>,
}

impl PromptComposer {
    pub fn new(model_id: impl Into<String>, dimensions: Dimensions) -> Self {
        Self {
            model_id: model_id.into(),
            dimensions,
            rng: Box::new(ThreadRngSource),
        }
    }

    /// Replace the randomness source. Tests use this to make the
    /// style pick, framing pick, and seed deterministic.
    pub fn with_random_source(mut self, rng: Box<dyn RandomSource>) -> Self {
        self.set_random_source(rng);
        self
    }

    pub fn set_random_source(&mut self, rng: Box<dyn RandomSource>) {
        self.rng = rng;
    }

    /// Compose a full parameter document for one intent.
    pub fn compose(
        &mut self,
        intent: &GenerationIntent,
        profile: MotionProfile,
    ) -> GenerationParameters {
        let prompt = self.styled_prompt(&intent.base_text, intent.mode);
        let seed = self.rng.seed();

        let (adapter, image) = match &intent.style_reference_image {
            Some(image) => (
                StyleAdapter::with_strength(intent.style_strength),
                Some(image.clone()),
            ),
            None => (StyleAdapter::disabled(), None),
        };

        GenerationParameters::new(
            self.model_id.clone(),
            prompt,
            self.dimensions,
            seed,
            profile,
            adapter,
            image,
        )
    }

    fn styled_prompt(&mut self, base_text: &str, mode: ModeTag) -> String {
        let enriched = normalize_base_text(base_text);
        let style = STYLE_BANK[self.rng.pick(STYLE_BANK.len())];

        let framing = if mode == ModeTag::VocalFocus {
            format!(", {}", FRAMING_BANK[self.rng.pick(FRAMING_BANK.len())])
        } else {
            String::new()
        };

        format!("a {enriched} scene{framing}, {style}")
    }
}

/// Short mood tags ("fire", "neon") become a grammatical scene
/// description; longer free text passes through untouched.
fn normalize_base_text(base_text: &str) -> String {
    let trimmed = base_text.trim();
    if trimmed.split_whitespace().count() <= 2 {
        format!("performer in {trimmed}")
    } else {
        trimmed.to_string()
    }
}

/// Read a style reference image into a base64 data URL, the form the
/// service accepts inline. The file is read fully into memory; there
/// is no streaming upload path.
pub fn encode_style_image(path: &Path) -> Result<String> {
    let bytes = std::fs::read(path)
        .with_context(|| format!("read style image {}", path.display()))?;

    let mime = match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .as_deref()
    {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("webp") => "image/webp",
        _ => "image/png",
    };

    let encoded = base64::engine::general_purpose::STANDARD.encode(&bytes);
    Ok(format!("data:{mime};base64,{encoded}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Scripted source: `pick` walks a fixed index list, `seed` is
    /// constant.
    pub(crate) struct ScriptedRandom {
        picks: Vec<usize>,
        next: usize,
        seed: u64,
    }

    impl ScriptedRandom {
        pub(crate) fn new(picks: Vec<usize>, seed: u64) -> Self {
            Self { picks, next: 0, seed }
        }
    }

    impl RandomSource for ScriptedRandom {
        fn pick(&mut self, len: usize) -> usize {
            let idx = self.picks.get(self.next).copied().unwrap_or(0);
            self.next += 1;
            idx % len
        }

        fn seed(&mut self) -> u64 {
            self.seed
        }
    }

    fn composer(picks: Vec<usize>, seed: u64) -> PromptComposer {
        PromptComposer::new("stabilityai/sdxl-turbo", Dimensions::default())
            .with_random_source(Box::new(ScriptedRandom::new(picks, seed)))
    }

    #[test]
    fn test_short_text_is_rewritten() {
        let mut composer = composer(vec![0], 1);
        let params = composer.compose(&GenerationIntent::new("  neon  "), MotionProfile::Medium);
        assert!(params.prompt.contains("performer in neon"));
        assert!(params.prompt.starts_with("a performer in neon scene"));
    }

    #[test]
    fn test_long_text_passes_through() {
        let mut composer = composer(vec![2], 1);
        let params = composer.compose(
            &GenerationIntent::new("sunset drive along the coast"),
            MotionProfile::Slow,
        );
        assert!(params.prompt.starts_with("a sunset drive along the coast scene"));
        assert!(!params.prompt.contains("performer in"));
    }

    #[test]
    fn test_style_phrase_is_appended_from_bank() {
        let mut composer = composer(vec![3], 1);
        let params = composer.compose(&GenerationIntent::new("ocean"), MotionProfile::Medium);
        assert!(params.prompt.ends_with(STYLE_BANK[3]));
    }

    #[test]
    fn test_vocal_focus_adds_framing_phrase() {
        // First pick selects the style, second the framing.
        let mut composer = composer(vec![1, 4], 1);
        let params = composer.compose(
            &GenerationIntent::new("fire").with_mode(ModeTag::VocalFocus),
            MotionProfile::Medium,
        );
        assert!(params.prompt.contains(FRAMING_BANK[4]));
        assert!(params.prompt.ends_with(STYLE_BANK[1]));
    }

    #[test]
    fn test_other_modes_skip_framing() {
        for mode in [ModeTag::Ambient, ModeTag::StagePerformance] {
            let mut composer = composer(vec![0, 0], 1);
            let params = composer.compose(
                &GenerationIntent::new("fire").with_mode(mode),
                MotionProfile::Medium,
            );
            for framing in FRAMING_BANK {
                assert!(!params.prompt.contains(framing), "mode {mode:?}");
            }
        }
    }

    #[test]
    fn test_seed_comes_from_random_source() {
        let mut composer = composer(vec![0], 77_777);
        let params = composer.compose(&GenerationIntent::new("neon"), MotionProfile::Fast);
        assert_eq!(params.seed, 77_777);
    }

    #[test]
    fn test_style_adapter_disabled_without_reference() {
        let mut composer = composer(vec![0], 1);
        let params = composer.compose(&GenerationIntent::new("neon"), MotionProfile::Medium);
        assert!(!params.ip_adapter.enabled);
        assert!(params.style_image.is_none());
    }

    #[test]
    fn test_style_adapter_enabled_with_reference() {
        let intent = GenerationIntent::new("neon")
            .with_style_image("data:image/png;base64,AAAA", 0.7);
        let mut composer = composer(vec![0], 1);
        let params = composer.compose(&intent, MotionProfile::Medium);
        assert!(params.ip_adapter.enabled);
        assert_eq!(params.ip_adapter.scale, 0.7);
        assert_eq!(params.style_image.as_deref(), Some("data:image/png;base64,AAAA"));
    }

    #[test]
    fn test_layers_stay_canonical_for_every_mode() {
        for mode in [ModeTag::Ambient, ModeTag::VocalFocus, ModeTag::StagePerformance] {
            let mut composer = composer(vec![5, 5], 1);
            let params = composer.compose(
                &GenerationIntent::new("neon").with_mode(mode),
                MotionProfile::Fast,
            );
            let names: Vec<_> = params.controlnets.iter().map(|l| l.name.as_str()).collect();
            assert_eq!(names, ["pose", "color", "depth"]);
        }
    }

    #[test]
    fn test_style_picks_cover_the_bank() {
        // Distribution sanity: a scripted walk over every index maps to
        // distinct phrases.
        let mut seen = std::collections::HashSet::new();
        for idx in 0..STYLE_BANK.len() {
            let mut composer = composer(vec![idx], 1);
            let params = composer.compose(&GenerationIntent::new("neon"), MotionProfile::Medium);
            seen.insert(params.prompt);
        }
        assert_eq!(seen.len(), STYLE_BANK.len());
    }
}
