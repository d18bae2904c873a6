/// Generation parameter document
///
/// Wire-shaped payload pushed to a live stream session. A document is
/// built once per submission and never mutated afterwards; the remote
/// service gives no transactional guarantee on partial application, so
/// the caller always replaces the whole thing.
use serde::{Deserialize, Serialize};

use crate::config::Dimensions;

/// Named preset bundle controlling sampling step count and temporal
/// smoothness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MotionProfile {
    /// Fewest steps sampled late; smooth, slow-evolving output.
    Slow,
    /// Balanced default.
    Medium,
    /// Densest schedule; tracks fast motion at the cost of flicker risk.
    Fast,
}

impl MotionProfile {
    /// Direct lookup of the sampler preset. A table, not a formula.
    pub fn schedule(self) -> SamplerSchedule {
        match self {
            Self::Slow => SamplerSchedule {
                step_count: 35,
                time_indices: vec![0, 11, 17],
                guidance_scale: 0.8,
                noise_delta: 0.30,
            },
            Self::Medium => SamplerSchedule {
                step_count: 45,
                time_indices: vec![0, 8, 16],
                guidance_scale: 0.9,
                noise_delta: 0.45,
            },
            Self::Fast => SamplerSchedule {
                step_count: 50,
                time_indices: vec![0, 5, 10, 15],
                guidance_scale: 1.1,
                noise_delta: 0.65,
            },
        }
    }

    /// Depth conditioning scale for this profile. Faster motion needs
    /// stronger structure locking to avoid temporal flicker.
    pub fn depth_conditioning_scale(self) -> f32 {
        match self {
            Self::Fast => 0.8,
            _ => 0.5,
        }
    }
}

impl std::fmt::Display for MotionProfile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Slow => write!(f, "slow"),
            Self::Medium => write!(f, "medium"),
            Self::Fast => write!(f, "fast"),
        }
    }
}

impl std::str::FromStr for MotionProfile {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "slow" => Ok(Self::Slow),
            "medium" => Ok(Self::Medium),
            "fast" => Ok(Self::Fast),
            other => Err(format!("unknown motion profile: {other}")),
        }
    }
}

/// Diffusion sampling schedule, flattened into the parameter document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SamplerSchedule {
    /// Total denoising steps.
    #[serde(rename = "num_inference_steps")]
    pub step_count: u32,

    /// Denoising trajectory indices actually sampled. Strictly
    /// increasing, every value below `step_count`.
    #[serde(rename = "t_index_list")]
    pub time_indices: Vec<u32>,

    /// Classifier-free guidance scale.
    pub guidance_scale: f32,

    /// Per-frame noise delta.
    #[serde(rename = "delta")]
    pub noise_delta: f32,
}

impl SamplerSchedule {
    /// Check the trajectory invariant.
    pub fn is_valid(&self) -> bool {
        self.time_indices.windows(2).all(|w| w[0] < w[1])
            && self.time_indices.iter().all(|&t| t < self.step_count)
    }
}

/// Auxiliary structural guidance blended into the model alongside the
/// prompt. The remote composites layers additively in list order, so
/// the canonical ordering (pose, color, depth) must never change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditioningLayer {
    pub name: String,
    pub model_id: String,
    pub preprocessor: String,
    pub conditioning_scale: f32,
    /// Active range over the denoising trajectory, as fractions.
    pub control_guidance_start: f32,
    pub control_guidance_end: f32,
    pub enabled: bool,
}

impl ConditioningLayer {
    fn new(name: &str, model_id: &str, preprocessor: &str, scale: f32) -> Self {
        Self {
            name: name.to_string(),
            model_id: model_id.to_string(),
            preprocessor: preprocessor.to_string(),
            conditioning_scale: scale,
            control_guidance_start: 0.0,
            control_guidance_end: 1.0,
            enabled: true,
        }
    }
}

/// The fixed conditioning catalog in canonical order. Only the depth
/// scale varies with the motion profile.
pub fn conditioning_layers(profile: MotionProfile) -> Vec<ConditioningLayer> {
    vec![
        ConditioningLayer::new(
            "pose",
            "thibaud/controlnet-sd21-openpose-diffusers",
            "pose_tensorrt",
            0.8,
        ),
        ConditioningLayer::new(
            "color",
            "thibaud/controlnet-sd21-color-diffusers",
            "passthrough",
            0.7,
        ),
        ConditioningLayer::new(
            "depth",
            "thibaud/controlnet-sd21-depth-diffusers",
            "depth_tensorrt",
            profile.depth_conditioning_scale(),
        ),
    ]
}

/// Image-conditioned style modifier block. Always present in the
/// document; disabled when no reference image was supplied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StyleAdapter {
    #[serde(rename = "type")]
    pub kind: String,
    pub enabled: bool,
    pub scale: f32,
    pub weight_type: String,
}

/// Default style-transfer strength when none is configured.
pub const DEFAULT_STYLE_STRENGTH: f32 = 1.3;

impl StyleAdapter {
    /// Enabled adapter with the given strength, clamped to `[0, 2]`.
    pub fn with_strength(strength: f32) -> Self {
        Self {
            kind: "regular".to_string(),
            enabled: true,
            scale: strength.clamp(0.0, 2.0),
            weight_type: "linear".to_string(),
        }
    }

    /// Disabled block, still emitted on the wire.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::with_strength(DEFAULT_STYLE_STRENGTH)
        }
    }
}

/// Full parameter document for one submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationParameters {
    pub model_id: String,
    pub prompt: String,
    pub negative_prompt: String,
    pub width: u32,
    pub height: u32,
    pub seed: u64,

    #[serde(flatten)]
    pub schedule: SamplerSchedule,

    pub controlnets: Vec<ConditioningLayer>,

    pub ip_adapter: StyleAdapter,

    /// Style reference image as a data URL; omitted from the payload
    /// when absent.
    #[serde(
        rename = "ip_adapter_style_image_url",
        skip_serializing_if = "Option::is_none"
    )]
    pub style_image: Option<String>,
}

/// Default negative prompt for every document.
pub const NEGATIVE_PROMPT: &str = "blurry, low quality, flat, 2d";

impl GenerationParameters {
    /// Assemble a document from composed prompt text and presets.
    pub fn new(
        model_id: String,
        prompt: String,
        dimensions: Dimensions,
        seed: u64,
        profile: MotionProfile,
        style_adapter: StyleAdapter,
        style_image: Option<String>,
    ) -> Self {
        Self {
            model_id,
            prompt,
            negative_prompt: NEGATIVE_PROMPT.to_string(),
            width: dimensions.width,
            height: dimensions.height,
            seed,
            schedule: profile.schedule(),
            controlnets: conditioning_layers(profile),
            ip_adapter: style_adapter,
            style_image,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schedules_are_valid_for_all_profiles() {
        for profile in [MotionProfile::Slow, MotionProfile::Medium, MotionProfile::Fast] {
            let schedule = profile.schedule();
            assert!(
                schedule.is_valid(),
                "invalid schedule for {profile}: {:?}",
                schedule.time_indices
            );
        }
    }

    #[test]
    fn test_schedule_literal_presets() {
        let slow = MotionProfile::Slow.schedule();
        assert_eq!(slow.step_count, 35);
        assert_eq!(slow.time_indices, vec![0, 11, 17]);
        assert_eq!(slow.guidance_scale, 0.8);
        assert_eq!(slow.noise_delta, 0.30);

        let medium = MotionProfile::Medium.schedule();
        assert_eq!(medium.step_count, 45);
        assert_eq!(medium.time_indices, vec![0, 8, 16]);

        let fast = MotionProfile::Fast.schedule();
        assert_eq!(fast.step_count, 50);
        assert_eq!(fast.time_indices, vec![0, 5, 10, 15]);
        assert_eq!(fast.guidance_scale, 1.1);
        assert_eq!(fast.noise_delta, 0.65);
    }

    #[test]
    fn test_invalid_schedules_are_detected() {
        let out_of_order = SamplerSchedule {
            step_count: 10,
            time_indices: vec![0, 5, 3],
            guidance_scale: 1.0,
            noise_delta: 0.5,
        };
        assert!(!out_of_order.is_valid());

        let out_of_range = SamplerSchedule {
            step_count: 10,
            time_indices: vec![0, 5, 10],
            guidance_scale: 1.0,
            noise_delta: 0.5,
        };
        assert!(!out_of_range.is_valid());
    }

    #[test]
    fn test_conditioning_layers_canonical_order() {
        for profile in [MotionProfile::Slow, MotionProfile::Medium, MotionProfile::Fast] {
            let layers = conditioning_layers(profile);
            let names: Vec<_> = layers.iter().map(|l| l.name.as_str()).collect();
            assert_eq!(names, ["pose", "color", "depth"]);
        }
    }

    #[test]
    fn test_depth_scale_follows_profile() {
        assert_eq!(conditioning_layers(MotionProfile::Slow)[2].conditioning_scale, 0.5);
        assert_eq!(conditioning_layers(MotionProfile::Medium)[2].conditioning_scale, 0.5);
        assert_eq!(conditioning_layers(MotionProfile::Fast)[2].conditioning_scale, 0.8);
    }

    #[test]
    fn test_style_adapter_strength_is_clamped() {
        assert_eq!(StyleAdapter::with_strength(5.0).scale, 2.0);
        assert_eq!(StyleAdapter::with_strength(-1.0).scale, 0.0);
        assert!(!StyleAdapter::disabled().enabled);
    }

    #[test]
    fn test_wire_field_names() {
        let params = GenerationParameters::new(
            "stabilityai/sdxl-turbo".to_string(),
            "a neon scene".to_string(),
            Dimensions::default(),
            42,
            MotionProfile::Fast,
            StyleAdapter::disabled(),
            None,
        );

        let json = serde_json::to_value(&params).unwrap();
        assert_eq!(json["num_inference_steps"], 50);
        assert_eq!(json["t_index_list"][3], 15);
        let delta = json["delta"].as_f64().unwrap();
        assert!((delta - 0.65).abs() < 1e-6);
        assert_eq!(json["ip_adapter"]["type"], "regular");
        assert_eq!(json["ip_adapter"]["weight_type"], "linear");
        assert_eq!(json["controlnets"][0]["preprocessor"], "pose_tensorrt");
        // No image supplied: the URL field must be absent entirely.
        assert!(json.get("ip_adapter_style_image_url").is_none());
    }

    #[test]
    fn test_style_image_is_serialized_when_present() {
        let params = GenerationParameters::new(
            "stabilityai/sdxl-turbo".to_string(),
            "a neon scene".to_string(),
            Dimensions::default(),
            7,
            MotionProfile::Medium,
            StyleAdapter::with_strength(0.9),
            Some("data:image/png;base64,AAAA".to_string()),
        );

        let json = serde_json::to_value(&params).unwrap();
        assert_eq!(json["ip_adapter"]["enabled"], true);
        assert_eq!(
            json["ip_adapter_style_image_url"],
            "data:image/png;base64,AAAA"
        );
    }

    #[test]
    fn test_motion_profile_parsing() {
        assert_eq!("fast".parse::<MotionProfile>().unwrap(), MotionProfile::Fast);
        assert_eq!("Slow".parse::<MotionProfile>().unwrap(), MotionProfile::Slow);
        assert!("warp".parse::<MotionProfile>().is_err());
    }
}
