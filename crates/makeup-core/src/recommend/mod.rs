//! Rule-based makeup recommendations.
//!
//! [`generate_plan`] produces exactly one suggestion per [`Category`], in
//! [`Category::ALL`] order, from a face analysis and the user's
//! preferences. Plans are value objects: re-analysis builds a new plan.

pub mod tables;

use crate::preferences::{Preferences, Style};
use crate::types::{FaceAnalysis, FaceShape, SkinTone};
use serde::{Deserialize, Serialize};
use std::fmt;
use tables::{Inputs, PaletteStyleBucket, PaletteToneBucket};

/// Shape assumed when the analysis found no face.
pub const DEFAULT_FACE_SHAPE: FaceShape = FaceShape::Oval;
/// Tone assumed when the analysis found no face.
pub const DEFAULT_SKIN_TONE: SkinTone = SkinTone::Medium;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Foundation,
    Eyes,
    Lips,
    Cheeks,
    Brows,
}

impl Category {
    /// Fixed plan order.
    pub const ALL: [Category; 5] = [
        Category::Foundation,
        Category::Eyes,
        Category::Lips,
        Category::Cheeks,
        Category::Brows,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Foundation => "foundation",
            Category::Eyes => "eyes",
            Category::Lips => "lips",
            Category::Cheeks => "cheeks",
            Category::Brows => "brows",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Beginner,
    Intermediate,
    Advanced,
}

impl Difficulty {
    pub fn score(&self) -> u8 {
        match self {
            Difficulty::Beginner => 1,
            Difficulty::Intermediate => 2,
            Difficulty::Advanced => 3,
        }
    }

    /// Bucket an average score: `≤1.5` beginner, `≤2.5` intermediate, else advanced.
    pub fn from_average(avg: f32) -> Self {
        if avg <= 1.5 {
            Difficulty::Beginner
        } else if avg <= 2.5 {
            Difficulty::Intermediate
        } else {
            Difficulty::Advanced
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    /// Hex color, e.g. `#DC143C`.
    pub shade: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MakeupSuggestion {
    pub id: String,
    pub category: Category,
    pub title: String,
    pub description: String,
    pub products: Vec<Product>,
    /// Ordered application steps; never empty.
    pub steps: Vec<String>,
    pub difficulty: Difficulty,
    /// Human-readable duration, e.g. `"8 minutes"`.
    pub time_estimate: String,
    pub tips: Vec<String>,
}

impl MakeupSuggestion {
    pub fn minutes(&self) -> u32 {
        parse_minutes(&self.time_estimate)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColorPalette {
    pub foundation: String,
    pub eyeshadow: Vec<String>,
    pub lipstick: String,
    pub blush: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverallLook {
    pub style: Style,
    pub description: String,
    /// Trust in the analysis behind the plan, in [0, 1].
    pub suitability: f32,
}

/// A complete plan. `total_time` and `difficulty` are derived from the
/// suggestions at construction and cannot be set independently.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MakeupPlan {
    overall: OverallLook,
    suggestions: Vec<MakeupSuggestion>,
    color_palette: ColorPalette,
    /// Minutes.
    total_time: u32,
    difficulty: Difficulty,
}

impl MakeupPlan {
    pub fn new(
        overall: OverallLook,
        suggestions: Vec<MakeupSuggestion>,
        color_palette: ColorPalette,
    ) -> Self {
        let total_time = suggestions.iter().map(MakeupSuggestion::minutes).sum();
        let difficulty = average_difficulty(&suggestions);
        Self {
            overall,
            suggestions,
            color_palette,
            total_time,
            difficulty,
        }
    }

    pub fn overall(&self) -> &OverallLook {
        &self.overall
    }

    pub fn suggestions(&self) -> &[MakeupSuggestion] {
        &self.suggestions
    }

    pub fn suggestion(&self, category: Category) -> Option<&MakeupSuggestion> {
        self.suggestions.iter().find(|s| s.category == category)
    }

    pub fn color_palette(&self) -> &ColorPalette {
        &self.color_palette
    }

    /// Sum of per-suggestion minutes.
    pub fn total_time(&self) -> u32 {
        self.total_time
    }

    pub fn difficulty(&self) -> Difficulty {
        self.difficulty
    }
}

fn average_difficulty(suggestions: &[MakeupSuggestion]) -> Difficulty {
    if suggestions.is_empty() {
        return Difficulty::Beginner;
    }
    let total: u32 = suggestions.iter().map(|s| s.difficulty.score() as u32).sum();
    Difficulty::from_average(total as f32 / suggestions.len() as f32)
}

/// First run of digits in `estimate`, or 0 if there is none.
pub fn parse_minutes(estimate: &str) -> u32 {
    estimate
        .split(|c: char| !c.is_ascii_digit())
        .find(|s| !s.is_empty())
        .and_then(|s| s.parse().ok())
        .unwrap_or(0)
}

/// Suitability currently measures trust in the analysis, not stylistic fit:
/// 0.8 base, +0.1 for a detected face, +0.1 for confidence above 0.8.
pub fn estimate_suitability(analysis: &FaceAnalysis) -> f32 {
    let mut score: f32 = 0.8;
    if analysis.face_detected() {
        score += 0.1;
    }
    if analysis.confidence() > 0.8 {
        score += 0.1;
    }
    score.min(1.0)
}

/// Build a full plan. Missing attributes fall back to
/// [`DEFAULT_FACE_SHAPE`] and [`DEFAULT_SKIN_TONE`].
pub fn generate_plan(analysis: &FaceAnalysis, prefs: &Preferences) -> MakeupPlan {
    let shape = analysis.face_shape().unwrap_or(DEFAULT_FACE_SHAPE);
    let tone = analysis.skin_tone().unwrap_or(DEFAULT_SKIN_TONE);

    let palette = tables::palette(
        PaletteStyleBucket::from(prefs.style),
        PaletteToneBucket::from(tone),
        prefs.region,
    );

    let inputs = Inputs {
        shape,
        tone,
        style: prefs.style,
        occasion: prefs.occasion,
        region: prefs.region,
        palette: &palette,
    };

    let suggestions: Vec<MakeupSuggestion> = Category::ALL
        .iter()
        .map(|&category| {
            let c = tables::content(category, &inputs);
            MakeupSuggestion {
                id: format!("{category}-{}-{shape}-{tone}", prefs.style),
                category,
                title: c.title,
                description: c.description,
                products: c.products,
                steps: c.steps,
                difficulty: c.difficulty,
                time_estimate: format!("{} minutes", c.minutes),
                tips: c.tips,
            }
        })
        .collect();

    let overall = OverallLook {
        style: prefs.style,
        description: format!(
            "A {} look for {} with a {} touch, tailored to a {shape} face and {tone} skin tone.",
            prefs.style,
            occasion_phrase(prefs),
            prefs.region.aesthetic(),
        ),
        suitability: estimate_suitability(analysis),
    };

    let plan = MakeupPlan::new(overall, suggestions, palette);
    tracing::debug!(
        style = %prefs.style,
        region = %prefs.region,
        %shape,
        %tone,
        total_time = plan.total_time(),
        difficulty = ?plan.difficulty(),
        "generated makeup plan"
    );
    plan
}

fn occasion_phrase(prefs: &Preferences) -> &'static str {
    use crate::preferences::Occasion;
    match prefs.occasion {
        Occasion::Daily => "everyday wear",
        Occasion::Work => "the office",
        Occasion::Date => "a date night",
        Occasion::Party => "a night out",
        Occasion::Wedding => "a wedding",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preferences::{Occasion, Region};
    use crate::types::{
        DetectionMethod, DetectionResult, FaceAttributes, FaceRegion, FacialFeatures,
    };

    fn analysis(shape: FaceShape, tone: SkinTone, confidence: f32) -> FaceAnalysis {
        FaceAnalysis::detected(
            DetectionResult::detected(
                confidence,
                FaceRegion::placeholder(),
                None,
                DetectionMethod::Scrfd,
            ),
            FaceAttributes {
                face_shape: shape,
                skin_tone: tone,
                features: FacialFeatures::unmeasured(),
            },
        )
    }

    fn suggestion(minutes: &str, difficulty: Difficulty) -> MakeupSuggestion {
        MakeupSuggestion {
            id: "x".into(),
            category: Category::Lips,
            title: String::new(),
            description: String::new(),
            products: vec![],
            steps: vec!["step".into()],
            difficulty,
            time_estimate: minutes.into(),
            tips: vec![],
        }
    }

    #[test]
    fn test_always_five_suggestions_in_order() {
        let undetected = FaceAnalysis::undetected(DetectionResult::not_detected());
        for style in [
            Style::Natural,
            Style::Glamour,
            Style::Professional,
            Style::Casual,
            Style::Party,
        ] {
            let prefs = Preferences { style, ..Preferences::default() };
            for a in [&undetected, &analysis(FaceShape::Diamond, SkinTone::Deep, 0.9)] {
                let plan = generate_plan(a, &prefs);
                let cats: Vec<Category> = plan.suggestions().iter().map(|s| s.category).collect();
                assert_eq!(cats, Category::ALL.to_vec());
                assert!(plan.suggestions().iter().all(|s| !s.steps.is_empty()));
            }
        }
    }

    #[test]
    fn test_total_time_is_sum_of_suggestions() {
        let a = analysis(FaceShape::Round, SkinTone::Light, 0.9);
        let plan = generate_plan(&a, &Preferences::default());
        let sum: u32 = plan
            .suggestions()
            .iter()
            .map(|s| parse_minutes(&s.time_estimate))
            .sum();
        assert_eq!(plan.total_time(), sum);
        assert!(sum > 0);
    }

    #[test]
    fn test_difficulty_bucket_boundaries() {
        assert_eq!(Difficulty::from_average(1.0), Difficulty::Beginner);
        assert_eq!(Difficulty::from_average(1.5), Difficulty::Beginner);
        assert_eq!(Difficulty::from_average(1.51), Difficulty::Intermediate);
        assert_eq!(Difficulty::from_average(2.5), Difficulty::Intermediate);
        assert_eq!(Difficulty::from_average(2.51), Difficulty::Advanced);
    }

    #[test]
    fn test_plan_derives_totals_from_suggestions() {
        // Scores 1+2 → 1.5 → beginner.
        let plan = MakeupPlan::new(
            OverallLook { style: Style::Natural, description: String::new(), suitability: 0.8 },
            vec![
                suggestion("4 minutes", Difficulty::Beginner),
                suggestion("6 minutes", Difficulty::Intermediate),
            ],
            tables::palette(PaletteStyleBucket::Natural, PaletteToneBucket::Light, Region::Global),
        );
        assert_eq!(plan.total_time(), 10);
        assert_eq!(plan.difficulty(), Difficulty::Beginner);

        // Scores 2+2+3 → 2.33 → intermediate.
        let plan = MakeupPlan::new(
            plan.overall().clone(),
            vec![
                suggestion("1 minutes", Difficulty::Intermediate),
                suggestion("1 minutes", Difficulty::Intermediate),
                suggestion("1 minutes", Difficulty::Advanced),
            ],
            plan.color_palette().clone(),
        );
        assert_eq!(plan.difficulty(), Difficulty::Intermediate);
    }

    #[test]
    fn test_parse_minutes() {
        assert_eq!(parse_minutes("8 minutes"), 8);
        assert_eq!(parse_minutes("about 12 min"), 12);
        assert_eq!(parse_minutes("quick"), 0);
    }

    #[test]
    fn test_suitability() {
        let undetected = FaceAnalysis::undetected(DetectionResult::not_detected());
        assert!((estimate_suitability(&undetected) - 0.8).abs() < 1e-6);
        let moderate = analysis(FaceShape::Oval, SkinTone::Light, 0.75);
        let confident = analysis(FaceShape::Oval, SkinTone::Light, 0.95);
        assert!((estimate_suitability(&moderate) - 0.9).abs() < 1e-6);
        assert!((estimate_suitability(&confident) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_glamour_japan_light_lipstick() {
        let prefs = Preferences {
            style: Style::Glamour,
            occasion: Occasion::Party,
            region: Region::Japan,
        };
        let plan = generate_plan(&analysis(FaceShape::Oval, SkinTone::Light, 0.9), &prefs);
        assert_eq!(plan.color_palette().lipstick, "#DC143C");
        let lips = plan.suggestion(Category::Lips).unwrap();
        assert!(lips.products.iter().any(|p| p.shade == "#DC143C"));
    }

    #[test]
    fn test_undetected_uses_medium_natural_palette() {
        let undetected = FaceAnalysis::undetected(DetectionResult::not_detected());
        let plan = generate_plan(&undetected, &Preferences::default());
        let expected =
            tables::palette(PaletteStyleBucket::Natural, PaletteToneBucket::Medium, Region::Global);
        assert_eq!(plan.color_palette(), &expected);
    }

    #[test]
    fn test_plan_is_deterministic() {
        let a = analysis(FaceShape::Heart, SkinTone::Dark, 0.85);
        let prefs = Preferences {
            style: Style::Party,
            occasion: Occasion::Wedding,
            region: Region::Korea,
        };
        assert_eq!(generate_plan(&a, &prefs), generate_plan(&a, &prefs));
    }

    #[test]
    fn test_plan_serializes_camel_case() {
        let a = analysis(FaceShape::Oval, SkinTone::Light, 0.9);
        let plan = generate_plan(&a, &Preferences::default());
        let json = serde_json::to_value(&plan).unwrap();
        assert!(json["totalTime"].as_u64().unwrap() > 0);
        assert_eq!(json["suggestions"][0]["category"], "foundation");
        assert!(json["suggestions"][0]["timeEstimate"].is_string());
        assert!(json["colorPalette"]["eyeshadow"].is_array());
    }
}
