//! Natural-language prompt for the "after" image.

use makeup_core::preferences::Occasion;
use makeup_core::recommend::Category;
use makeup_core::{FaceAnalysis, MakeupPlan, Preferences};

const QUALITY_SUFFIX: &str = "soft studio lighting, high detail, photorealistic beauty photography";

fn occasion_label(occasion: Occasion) -> &'static str {
    match occasion {
        Occasion::Daily => "everyday wear",
        Occasion::Work => "a professional work setting",
        Occasion::Date => "a romantic date",
        Occasion::Party => "an evening party",
        Occasion::Wedding => "a wedding",
    }
}

/// Describe the subject, the look, and (if a plan exists) the specific
/// products the plan calls for.
pub fn build_prompt(
    analysis: &FaceAnalysis,
    plan: Option<&MakeupPlan>,
    prefs: &Preferences,
) -> String {
    let mut subject = String::from("Professional beauty portrait of a person");
    match (analysis.face_shape(), analysis.skin_tone()) {
        (Some(shape), Some(tone)) => {
            subject.push_str(&format!(" with a {shape} face shape and {tone} skin tone"));
        }
        (Some(shape), None) => subject.push_str(&format!(" with a {shape} face shape")),
        (None, Some(tone)) => subject.push_str(&format!(" with {tone} skin tone")),
        (None, None) => {}
    }

    let mut parts = vec![
        subject,
        format!("wearing {} makeup for {}", prefs.style, occasion_label(prefs.occasion)),
        format!("{} aesthetic", prefs.region.aesthetic()),
    ];

    if let Some(plan) = plan {
        let palette = plan.color_palette();
        for suggestion in plan.suggestions() {
            let phrase = match suggestion.category {
                Category::Foundation => "flawless base makeup".to_string(),
                Category::Eyes => format!("eyeshadow in {}", palette.eyeshadow.join(", ")),
                Category::Lips => format!("{} lipstick", palette.lipstick),
                Category::Cheeks => format!("soft {} blush", palette.blush),
                Category::Brows => "groomed, defined eyebrows".to_string(),
            };
            parts.push(phrase);
        }
    }

    parts.push(QUALITY_SUFFIX.to_string());
    parts.join(", ")
}
