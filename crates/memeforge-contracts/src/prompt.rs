//! Prompt enrichment shared by every adapter.
//!
//! `augment` is the full rewrite applied before a request enters the
//! orchestrator; `style_suffix` is the lighter per-transmission enrichment
//! each adapter appends. Both are pure.

use crate::request::Style;

/// Phrases replaced with English descriptions, applied in this order.
const EMOTION_PHRASES: &[(&str, &str)] = &[
    ("我太难了", "feeling overwhelmed and stressed, sad face, dramatic"),
    ("老板让我加班", "boss making me work overtime, tired, exhausted, frustrated"),
    ("开心", "happy, joyful, smiling, excited"),
    ("难过", "sad, crying, tearful, depressed"),
    ("生气", "angry, furious, irritated, annoyed"),
    ("惊讶", "surprised, shocked, amazed, astonished"),
    ("无语", "speechless, dumbfounded, exasperated"),
    ("崩溃", "breaking down, overwhelmed, desperate"),
    ("躺平", "lying down, relaxed, lazy, chill"),
    ("内卷", "working hard, competitive, stressed"),
    ("emo", "emotional, sad, melancholic, thoughtful"),
    ("打工人", "tired worker, office worker, exhausted"),
    ("摸鱼", "slacking off, relaxing, taking it easy"),
    ("真香", "eating delicious food, satisfied, happy"),
    ("裂开", "shocked, broken, devastated"),
    ("熊猫", "panda, cute, adorable, black and white"),
    ("猫", "cat, cute, adorable, furry"),
    ("狗", "dog, cute, adorable, loyal"),
];

const COMPOSITION_WORDS: &[&str] = &[
    "single character",
    "centered composition",
    "clean background",
    "meme sticker",
    "leave space for caption",
];

const MEME_MODE_WORDS: &[&str] = &[
    "internet meme",
    "viral",
    "humorous",
    "expressive reaction",
    "caption friendly",
    "bold emotions",
];

const QUALITY_WORDS: &[&str] = &[
    "high resolution",
    "sharp focus",
    "detailed",
    "beautiful",
    "cute",
    "funny meme",
];

fn style_keywords(style: &Style) -> &'static [&'static str] {
    match style {
        Style::HandDrawn => &[
            "hand-drawn",
            "sketch style",
            "rough lines",
            "artistic",
            "pencil drawing",
        ],
        Style::Anime => &[
            "anime style",
            "manga style",
            "Japanese animation",
            "clean lines",
            "cel shaded",
        ],
        Style::Realistic => &[
            "photorealistic",
            "realistic",
            "detailed",
            "high quality",
            "professional",
        ],
        Style::Retro => &["retro style", "pixel art", "8-bit", "vintage", "nostalgic"],
        Style::Minimalist => &[
            "minimalist",
            "simple",
            "clean design",
            "flat design",
            "modern",
        ],
        Style::Cartoon | Style::Custom(_) => &[
            "cartoon style",
            "comic style",
            "funny",
            "exaggerated",
            "vibrant colors",
        ],
    }
}

fn style_template(style: &Style) -> &'static [&'static str] {
    match style {
        Style::HandDrawn => &[
            "hand-drawn illustration",
            "sketchy lines",
            "paper texture",
            "casual doodle",
        ],
        Style::Anime => &[
            "anime illustration",
            "cel shading",
            "clean lineart",
            "expressive eyes",
        ],
        Style::Realistic => &[
            "photorealistic",
            "natural lighting",
            "high detail",
            "sharp focus",
        ],
        Style::Retro => &[
            "retro pixel art",
            "8-bit style",
            "limited color palette",
            "nostalgic vibe",
        ],
        Style::Minimalist => &[
            "minimalist illustration",
            "simple shapes",
            "clean background",
            "limited colors",
        ],
        Style::Cartoon | Style::Custom(_) => &[
            "cartoon character",
            "bold outlines",
            "vibrant flat colors",
            "exaggerated expression",
        ],
    }
}

fn intensity_words(strength: u8) -> &'static [&'static str] {
    match strength.clamp(1, 3) {
        1 => &[],
        2 => &["highly stylized", "strong style"],
        _ => &["extremely stylized", "very strong style", "distinctive look"],
    }
}

pub fn augment(prompt: &str, style: &Style, strength: u8, meme_mode: bool) -> String {
    let mut text = translate_emotions(prompt.trim());

    let style_words = style_keywords(style)
        .iter()
        .chain(style_template(style))
        .chain(intensity_words(strength))
        .chain(COMPOSITION_WORDS)
        .copied()
        .collect::<Vec<&str>>();
    text = format!("{text}, {}", style_words.join(", "));

    if meme_mode {
        text = format!("{text}, {}", MEME_MODE_WORDS.join(", "));
    }
    text = format!("{text}, {}", QUALITY_WORDS.join(", "));

    collapse_whitespace(&text)
}

/// Per-adapter enrichment appended right before transmission.
pub fn style_suffix(prompt: &str, style: &Style) -> String {
    let enhancement = match style {
        Style::Cartoon => "cartoon style, bold outlines",
        Style::HandDrawn => "hand-drawn illustration, sketch",
        Style::Anime => "anime art, manga style",
        Style::Realistic => "photorealistic, realistic",
        Style::Retro => "pixel art, 8-bit style",
        Style::Minimalist => "minimalist design, clean lines",
        Style::Custom(_) => "",
    };
    if enhancement.is_empty() {
        return format!("{prompt}, meme format");
    }
    format!("{prompt}, {enhancement}, meme format")
}

fn translate_emotions(text: &str) -> String {
    let mut result = text.to_string();
    for (phrase, replacement) in EMOTION_PHRASES {
        if result.contains(phrase) {
            result = result.replace(phrase, replacement);
        }
    }
    result
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<&str>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::{augment, style_suffix};
    use crate::request::Style;

    #[test]
    fn augment_translates_emotions_and_appends_style() {
        let text = augment("熊猫 开心", &Style::Anime, 2, false);
        assert!(text.starts_with("panda, cute, adorable, black and white happy, joyful"));
        assert!(text.contains("anime style"));
        assert!(text.contains("highly stylized"));
        assert!(text.ends_with("funny meme"));
        assert!(!text.contains("internet meme"));
    }

    #[test]
    fn augment_strength_one_has_no_intensity_words() {
        let text = augment("dog", &Style::Retro, 1, false);
        assert!(!text.contains("stylized"));
        let strong = augment("dog", &Style::Retro, 7, true);
        assert!(strong.contains("extremely stylized"));
        assert!(strong.contains("internet meme"));
    }

    #[test]
    fn augment_collapses_whitespace() {
        let text = augment("  a   lazy\n cat ", &Style::Minimalist, 2, false);
        assert!(text.starts_with("a lazy cat, minimalist"));
        assert!(!text.contains("  "));
    }

    #[test]
    fn unknown_style_uses_cartoon_keywords() {
        let text = augment("x", &Style::parse("vaporwave"), 2, false);
        assert!(text.contains("cartoon style"));
    }

    #[test]
    fn style_suffix_matches_style() {
        assert_eq!(
            style_suffix("cat", &Style::Retro),
            "cat, pixel art, 8-bit style, meme format"
        );
        assert_eq!(
            style_suffix("cat", &Style::parse("vaporwave")),
            "cat, meme format"
        );
    }
}
