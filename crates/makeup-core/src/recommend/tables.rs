//! Rule tables behind the recommendation engine.
//!
//! Every lookup is an exhaustive `match`, so adding a face shape, tone,
//! style or region fails to compile until each table handles it.

use super::{Category, ColorPalette, Difficulty, Product};
use crate::preferences::{Occasion, Region, Style};
use crate::types::{FaceShape, SkinTone};

/// Tone axis of the palette table. Only two buckets exist: dark and deep
/// skin tones share the medium palette.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaletteToneBucket {
    Light,
    Medium,
}

impl From<SkinTone> for PaletteToneBucket {
    fn from(tone: SkinTone) -> Self {
        match tone {
            SkinTone::Light => PaletteToneBucket::Light,
            SkinTone::Medium | SkinTone::Dark | SkinTone::Deep => PaletteToneBucket::Medium,
        }
    }
}

/// Style axis of the palette table. Everything that is not glamour uses
/// the natural palette.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaletteStyleBucket {
    Natural,
    Glamour,
}

impl From<Style> for PaletteStyleBucket {
    fn from(style: Style) -> Self {
        match style {
            Style::Glamour => PaletteStyleBucket::Glamour,
            Style::Natural | Style::Professional | Style::Casual | Style::Party => {
                PaletteStyleBucket::Natural
            }
        }
    }
}

type PaletteRow = (&'static str, [&'static str; 3], &'static str, &'static str);

/// Base palette for a (style, tone) cell, plus a regional accent shade.
pub fn palette(style: PaletteStyleBucket, tone: PaletteToneBucket, region: Region) -> ColorPalette {
    let (foundation, eyeshadow, lipstick, blush): PaletteRow = match (style, tone) {
        (PaletteStyleBucket::Natural, PaletteToneBucket::Light) => {
            ("#F5DEB3", ["#F5E6D3", "#D2B48C", "#A0826D"], "#E8A0A0", "#F4C2C2")
        }
        (PaletteStyleBucket::Natural, PaletteToneBucket::Medium) => {
            ("#D2A679", ["#C8A27C", "#8B6F47", "#5C4033"], "#C08081", "#E8967A")
        }
        (PaletteStyleBucket::Glamour, PaletteToneBucket::Light) => {
            ("#F5DEB3", ["#E6BE8A", "#8B4513", "#2F1B14"], "#DC143C", "#FF91A4")
        }
        (PaletteStyleBucket::Glamour, PaletteToneBucket::Medium) => {
            ("#C68E5E", ["#B8860B", "#800020", "#1C1C1C"], "#8B0000", "#E25822")
        }
    };

    let mut eyeshadow: Vec<String> = eyeshadow.iter().map(|s| s.to_string()).collect();
    if let Some(accent) = regional_accent(region) {
        eyeshadow.push(accent.to_string());
    }

    ColorPalette {
        foundation: foundation.to_string(),
        eyeshadow,
        lipstick: lipstick.to_string(),
        blush: blush.to_string(),
    }
}

fn regional_accent(region: Region) -> Option<&'static str> {
    match region {
        Region::Global => None,
        Region::Japan => Some("#F8C8DC"),
        Region::Korea => Some("#FFB6A3"),
        Region::China => Some("#C41E3A"),
        Region::Usa => Some("#CD7F32"),
        Region::Europe => Some("#B76E79"),
    }
}

/// Table inputs for one suggestion.
#[derive(Debug, Clone, Copy)]
pub struct Inputs<'a> {
    pub shape: FaceShape,
    pub tone: SkinTone,
    pub style: Style,
    pub occasion: Occasion,
    pub region: Region,
    pub palette: &'a ColorPalette,
}

/// Everything a suggestion carries besides its identity.
#[derive(Debug, Clone)]
pub struct Content {
    pub title: String,
    pub description: String,
    pub products: Vec<Product>,
    pub steps: Vec<String>,
    pub difficulty: Difficulty,
    pub minutes: u32,
    pub tips: Vec<String>,
}

pub fn content(category: Category, inputs: &Inputs<'_>) -> Content {
    match category {
        Category::Foundation => foundation(inputs),
        Category::Eyes => eyes(inputs),
        Category::Lips => lips(inputs),
        Category::Cheeks => cheeks(inputs),
        Category::Brows => brows(inputs),
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn product(name: &str, kind: &str, shade: &str) -> Product {
    Product {
        name: name.to_string(),
        kind: kind.to_string(),
        shade: shade.to_string(),
    }
}

fn foundation(i: &Inputs<'_>) -> Content {
    let undertone = match i.tone {
        SkinTone::Light => "a neutral-to-pink undertone one shade warmer than your bare skin",
        SkinTone::Medium => "a warm golden undertone matched along the jawline",
        SkinTone::Dark => "a rich caramel undertone that avoids an ashy cast",
        SkinTone::Deep => "a deep red or espresso undertone with no grey pigment",
    };
    let (finish, difficulty, minutes) = match i.style {
        Style::Natural => ("a light-coverage dewy tint", Difficulty::Beginner, 8),
        Style::Casual => ("a tinted moisturizer", Difficulty::Beginner, 5),
        Style::Professional => ("a medium-coverage satin foundation", Difficulty::Beginner, 10),
        Style::Glamour => ("a full-coverage matte foundation", Difficulty::Intermediate, 15),
        Style::Party => ("a long-wear full-coverage foundation", Difficulty::Intermediate, 12),
    };

    let mut steps = strings(&[
        "Prep skin with moisturizer and a thin layer of primer",
        "Apply foundation from the center of the face outward with a damp sponge",
        "Spot-conceal under the eyes and over blemishes",
        "Set the T-zone lightly with translucent powder",
    ]);
    if matches!(i.style, Style::Glamour | Style::Party) {
        steps.push("Bake the under-eye area for two minutes, then dust off".into());
        steps.push("Lock everything in with setting spray".into());
    }

    let mut tips = vec![match i.region {
        Region::Japan => "Keep the base thin and translucent; a soft glow reads better than matte",
        Region::Korea => "Layer a cushion compact for a dewy glass-skin finish",
        Region::China => "Choose a slightly brightening shade for a luminous, even complexion",
        Region::Usa => "Warm the perimeter with bronzer so the base doesn't look flat",
        Region::Europe => "Use foundation only where needed and let skin show through",
        Region::Global => "Test shades on the jawline in daylight before committing",
    }
    .to_string()];
    tips.push(match i.occasion {
        Occasion::Work => "Carry blotting papers to control shine through the day",
        Occasion::Wedding => "Avoid SPF with high flash-back under photography lights",
        Occasion::Party => "Pick a sweat-resistant formula for long evenings",
        Occasion::Date => "Keep the cheeks luminous; skip powder on the high points",
        Occasion::Daily => "A light base means easy touch-ups with just concealer",
    }
    .to_string());

    Content {
        title: "Foundation & Base".into(),
        description: format!("Use {finish} with {undertone}."),
        products: vec![
            product("Hydrating Primer", "primer", "#FFFFFF"),
            product("Foundation", "foundation", &i.palette.foundation),
            product("Concealer", "concealer", &i.palette.foundation),
            product("Translucent Setting Powder", "powder", "#FFFFFF"),
        ],
        steps,
        difficulty,
        minutes,
        tips,
    }
}

fn eyes(i: &Inputs<'_>) -> Content {
    let technique = match i.shape {
        FaceShape::Oval => "balanced proportions suit most looks, so try a soft winged liner",
        FaceShape::Round => "elongate the eye with outer-corner shading and a lifted wing",
        FaceShape::Square => "soften angular features with rounded, diffused shadow",
        FaceShape::Heart => "emphasize the lower lash line to balance a wider forehead",
        FaceShape::Oblong => "blend shadow horizontally to widen the eye area",
        FaceShape::Diamond => "highlight the inner corners and brow bone to open the eyes",
    };
    let (look, difficulty, minutes) = match i.style {
        Style::Natural => ("a neutral wash of color", Difficulty::Beginner, 5),
        Style::Casual => ("a single swept-on shade", Difficulty::Beginner, 3),
        Style::Professional => {
            ("matte neutrals with tight-lined liner", Difficulty::Intermediate, 8)
        }
        Style::Glamour => ("a smoky cut crease", Difficulty::Advanced, 20),
        Style::Party => ("shimmer on the lid with a graphic liner", Difficulty::Advanced, 15),
    };

    let shades = &i.palette.eyeshadow;
    let shade = |n: usize| shades.get(n).or(shades.last()).cloned().unwrap_or_default();

    let mut steps = vec![
        format!("Sweep the lightest shade ({}) across the lid to the brow bone", shade(0)),
        format!("Blend the mid shade ({}) into the crease with windshield-wiper motions", shade(1)),
        format!("Deepen the outer corner with {}", shade(2)),
        "Curl lashes and apply two coats of mascara".to_string(),
    ];
    if matches!(i.style, Style::Glamour | Style::Party) {
        steps.insert(3, "Line the upper lash line and extend into a wing".into());
        steps.push("Apply false lashes for extra drama".into());
    }

    let mut tips = vec![format!("For a {} face, {technique}.", i.shape)];
    if let Some(accent) = shades.get(3) {
        tips.push(format!("Tap the regional accent shade {accent} on the center of the lid"));
    }

    Content {
        title: "Eye Makeup".into(),
        description: format!("Create {look}; {technique}."),
        products: vec![
            product("Eyeshadow Palette", "eyeshadow", &shade(1)),
            product("Eyeliner", "eyeliner", "#1C1C1C"),
            product("Mascara", "mascara", "#000000"),
        ],
        steps,
        difficulty,
        minutes,
        tips,
    }
}

fn lips(i: &Inputs<'_>) -> Content {
    let (finish, difficulty, minutes) = match i.style {
        Style::Glamour => ("a bold, precisely lined matte lip", Difficulty::Intermediate, 5),
        Style::Party => ("a high-shine or metallic lip", Difficulty::Beginner, 4),
        Style::Professional => ("a polished satin lip", Difficulty::Beginner, 3),
        Style::Natural | Style::Casual => ("a sheer tinted balm", Difficulty::Beginner, 3),
    };
    let shade = &i.palette.lipstick;

    let mut steps = strings(&["Exfoliate and moisturize lips"]);
    if matches!(i.style, Style::Glamour) {
        steps.push("Outline with a matching lip liner, slightly overlining the center".into());
    }
    steps.push(format!("Apply {shade} from the center outward"));
    steps.push("Blot with a tissue and reapply for staying power".into());

    let tip = match i.occasion {
        Occasion::Wedding => "Choose a transfer-proof formula for photos and toasts",
        Occasion::Date => "A gloss on the center of the lower lip adds fullness",
        Occasion::Work => "Stick to a your-lips-but-better shade for meetings",
        Occasion::Party => "Carry the lipstick for a touch-up after eating",
        Occasion::Daily => "A tinted balm doubles as hydration",
    };
    let region_tip = match i.region {
        Region::Korea => Some("Try a gradient lip: color on the inner lips, blurred outward"),
        Region::Japan => Some("Dab color with a fingertip for a soft, stained finish"),
        Region::Usa | Region::Europe | Region::China | Region::Global => None,
    };

    Content {
        title: "Lip Color".into(),
        description: format!("Finish with {finish} in {shade}."),
        products: vec![
            product("Lip Liner", "lip-liner", shade),
            product("Lipstick", "lipstick", shade),
        ],
        steps,
        difficulty,
        minutes,
        tips: std::iter::once(tip).chain(region_tip).map(String::from).collect(),
    }
}

fn cheeks(i: &Inputs<'_>) -> Content {
    let placement = match i.shape {
        FaceShape::Oval => "on the apples of the cheeks, blended toward the temples",
        FaceShape::Round => "just above the apples, angled toward the ears",
        FaceShape::Square => "on the apples in a circular motion to soften the jaw",
        FaceShape::Heart => "just below the cheekbones in a horizontal sweep",
        FaceShape::Oblong => "horizontally across the apples, avoiding vertical strokes",
        FaceShape::Diamond => "on the center of the cheekbones, blended upward",
    };
    let contour = matches!(i.style, Style::Glamour | Style::Party);
    let (difficulty, minutes) = match i.style {
        Style::Glamour => (Difficulty::Intermediate, 7),
        Style::Party => (Difficulty::Intermediate, 5),
        Style::Natural | Style::Casual | Style::Professional => (Difficulty::Beginner, 3),
    };
    let blush = &i.palette.blush;

    let mut steps = vec![format!("Smile and apply blush ({blush}) {placement}")];
    if contour {
        steps.insert(0, "Sculpt under the cheekbones with a cool-toned contour".into());
        steps.push("Add highlighter to the tops of the cheekbones".into());
    }
    steps.push("Blend the edges until no lines remain".into());

    let mut products = vec![product("Blush", "blush", blush)];
    if contour {
        products.push(product("Contour Powder", "contour", "#8B6F47"));
        products.push(product("Highlighter", "highlighter", "#FFF5E1"));
    }

    Content {
        title: "Cheeks".into(),
        description: format!("Place color {placement} to flatter a {} face.", i.shape),
        products,
        steps,
        difficulty,
        minutes,
        tips: strings(&["Build blush in thin layers; it is easier to add than remove"]),
    }
}

fn brows(i: &Inputs<'_>) -> Content {
    let arch = match (i.region, i.shape) {
        (Region::Korea, _) => "a soft, straight brow",
        (_, FaceShape::Oval) => "a softly angled arch",
        (_, FaceShape::Round) => "a high arch that adds length",
        (_, FaceShape::Square) => "a strong, curved arch that softens the jaw",
        (_, FaceShape::Heart) => "a low, rounded arch",
        (_, FaceShape::Oblong) => "a flat, straight brow that shortens the face",
        (_, FaceShape::Diamond) => "a curved brow that balances the cheekbones",
    };
    let (difficulty, minutes) = match i.style {
        Style::Natural | Style::Casual => (Difficulty::Beginner, 5),
        Style::Professional | Style::Party => (Difficulty::Intermediate, 5),
        Style::Glamour => (Difficulty::Intermediate, 8),
    };
    let brow_color = match i.tone {
        SkinTone::Light => "#8B7355",
        SkinTone::Medium => "#5C4033",
        SkinTone::Dark | SkinTone::Deep => "#3B2F2F",
    };

    let mut steps = strings(&[
        "Brush brows upward with a spoolie",
        "Fill sparse areas with light, hair-like strokes",
    ]);
    if matches!(i.style, Style::Glamour) {
        steps.push("Define the lower edge with concealer for a crisp shape".into());
    }
    steps.push("Set with clear or tinted brow gel".into());

    Content {
        title: "Eyebrows".into(),
        description: format!("Shape {arch} to frame your {} face.", i.shape),
        products: vec![
            product("Brow Pencil", "brow-pencil", brow_color),
            product("Brow Gel", "brow-gel", brow_color),
        ],
        steps,
        difficulty,
        minutes,
        tips: strings(&["Start the brow in line with the side of the nostril"]),
    }
}
