use std::fmt;

use serde::{Deserialize, Serialize};

/// How much of an incoming message the detector looks at.
const DETECT_PREFIX_CHARS: usize = 500;

/// Reply languages the bot tracks. A detected language outside this set maps
/// to `English`; these names are also what the settings document stores and
/// what the language-picker callbacks carry.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Language {
    #[default]
    English,
    Hindi,
    Indonesian,
    Spanish,
    Arabic,
    Thai,
    Portuguese,
}

impl Language {
    pub const ALL: [Language; 7] = [
        Language::English,
        Language::Hindi,
        Language::Indonesian,
        Language::Spanish,
        Language::Arabic,
        Language::Thai,
        Language::Portuguese,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Language::English => "English",
            Language::Hindi => "Hindi",
            Language::Indonesian => "Indonesian",
            Language::Spanish => "Spanish",
            Language::Arabic => "Arabic",
            Language::Thai => "Thai",
            Language::Portuguese => "Portuguese",
        }
    }

    /// Inverse of [`Language::as_str`], used for callback data.
    pub fn from_name(name: &str) -> Option<Self> {
        Language::ALL.into_iter().find(|l| l.as_str() == name)
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Best-effort detection for an incoming chat message.
///
/// Only a prefix is examined; empty or undetectable input yields `None`,
/// which callers must treat as "leave the preference alone". A detected but
/// unsupported language maps to `English`.
pub fn detect(input: &str) -> Option<Language> {
    let prefix: String = input.chars().take(DETECT_PREFIX_CHARS).collect();
    let trimmed = prefix.trim();
    if trimmed.is_empty() {
        return None;
    }
    whatlang::detect_lang(trimmed).map(map_lang)
}

fn map_lang(lang: whatlang::Lang) -> Language {
    use whatlang::Lang;
    match lang {
        Lang::Eng => Language::English,
        Lang::Hin => Language::Hindi,
        Lang::Ind => Language::Indonesian,
        Lang::Spa => Language::Spanish,
        Lang::Ara => Language::Arabic,
        Lang::Tha => Language::Thai,
        Lang::Por => Language::Portuguese,
        _ => Language::English,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn supported_langs_map_to_themselves() {
        use whatlang::Lang;
        assert_eq!(map_lang(Lang::Eng), Language::English);
        assert_eq!(map_lang(Lang::Hin), Language::Hindi);
        assert_eq!(map_lang(Lang::Ind), Language::Indonesian);
        assert_eq!(map_lang(Lang::Spa), Language::Spanish);
        assert_eq!(map_lang(Lang::Ara), Language::Arabic);
        assert_eq!(map_lang(Lang::Tha), Language::Thai);
        assert_eq!(map_lang(Lang::Por), Language::Portuguese);
    }

    #[test]
    fn unsupported_detections_fall_back_to_english() {
        use whatlang::Lang;
        assert_eq!(map_lang(Lang::Jpn), Language::English);
        assert_eq!(map_lang(Lang::Rus), Language::English);
        assert_eq!(map_lang(Lang::Deu), Language::English);
    }

    #[test]
    fn empty_input_detects_nothing() {
        assert_eq!(detect(""), None);
        assert_eq!(detect("   \n\t "), None);
    }

    #[test]
    fn script_distinct_languages_are_detected() {
        // Long samples with common function words keep the detector stable.
        assert_eq!(
            detect("مرحبا، كيف حالك اليوم؟ أريد أن أسألك عن حالة الطقس في المدينة هذا الأسبوع وهل ستكون السماء صافية"),
            Some(Language::Arabic)
        );
        assert_eq!(
            detect("สวัสดีครับ วันนี้อากาศเป็นอย่างไรบ้าง อยากทราบพยากรณ์อากาศ"),
            Some(Language::Thai)
        );
        assert_eq!(
            detect("नमस्ते, आप कैसे हैं? मुझे आज के मौसम के बारे में बताइए कि क्या बारिश होगी या धूप निकलेगी"),
            Some(Language::Hindi)
        );
    }

    #[test]
    fn names_round_trip() {
        for lang in Language::ALL {
            assert_eq!(Language::from_name(lang.as_str()), Some(lang));
        }
        assert_eq!(Language::from_name("Klingon"), None);
    }

    #[test]
    fn serializes_as_full_name() {
        assert_eq!(serde_json::to_string(&Language::Thai).unwrap(), "\"Thai\"");
        let back: Language = serde_json::from_str("\"Indonesian\"").unwrap();
        assert_eq!(back, Language::Indonesian);
    }
}
