//! User preferences that steer the recommendation tables.
//!
//! Labels are parsed leniently: unknown strings resolve to the default
//! variant so a typo in a form field never blocks a recommendation.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Style {
    #[default]
    Natural,
    Glamour,
    Professional,
    Casual,
    Party,
}

impl Style {
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "glamour" | "glam" => Style::Glamour,
            "professional" | "business" => Style::Professional,
            "casual" => Style::Casual,
            "party" => Style::Party,
            _ => Style::Natural,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Style::Natural => "natural",
            Style::Glamour => "glamour",
            Style::Professional => "professional",
            Style::Casual => "casual",
            Style::Party => "party",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Occasion {
    #[default]
    Daily,
    Work,
    Date,
    Party,
    Wedding,
}

impl Occasion {
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "work" | "office" => Occasion::Work,
            "date" => Occasion::Date,
            "party" | "night" => Occasion::Party,
            "wedding" => Occasion::Wedding,
            _ => Occasion::Daily,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Occasion::Daily => "daily",
            Occasion::Work => "work",
            Occasion::Date => "date",
            Occasion::Party => "party",
            Occasion::Wedding => "wedding",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Region {
    #[default]
    Global,
    Japan,
    Korea,
    China,
    Usa,
    Europe,
}

impl Region {
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "japan" | "jp" | "ja" => Region::Japan,
            "korea" | "kr" | "ko" => Region::Korea,
            "china" | "cn" | "zh" => Region::China,
            "usa" | "us" | "america" => Region::Usa,
            "europe" | "eu" => Region::Europe,
            _ => Region::Global,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Region::Global => "global",
            Region::Japan => "japan",
            Region::Korea => "korea",
            Region::China => "china",
            Region::Usa => "usa",
            Region::Europe => "europe",
        }
    }

    /// Short aesthetic descriptor used in plan descriptions and prompts.
    pub fn aesthetic(&self) -> &'static str {
        match self {
            Region::Global => "contemporary",
            Region::Japan => "Japanese-inspired soft and translucent",
            Region::Korea => "K-beauty dewy",
            Region::China => "modern C-beauty",
            Region::Usa => "bold American",
            Region::Europe => "effortless European",
        }
    }
}

macro_rules! impl_display {
    ($($ty:ty),*) => {
        $(impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        })*
    };
}

impl_display!(Style, Occasion, Region);

/// Everything the caller chooses about the desired look.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preferences {
    pub style: Style,
    pub occasion: Occasion,
    pub region: Region,
}
