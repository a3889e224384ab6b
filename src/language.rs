//! Supported target languages and the user's ordered selection.
//!
//! The form submits language *codes*; [`LanguageSelection::parse`] maps them
//! onto the fixed [`SUPPORTED_LANGUAGES`] table, keeping submission order and
//! dropping duplicates. The first entry is the primary language.

use crate::error::ValidationError;
use serde::Serialize;
use std::fmt;

/// A supported language: BCP-47 style code plus English display name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Language {
    pub code: &'static str,
    pub name: &'static str,
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

const fn lang(code: &'static str, name: &'static str) -> Language {
    Language { code, name }
}

/// Languages offered on the upload form, in display order.
pub const SUPPORTED_LANGUAGES: &[Language] = &[
    lang("en", "English"),
    lang("hi", "Hindi"),
    lang("mr", "Marathi"),
    lang("bn", "Bengali"),
    lang("te", "Telugu"),
    lang("ta", "Tamil"),
    lang("gu", "Gujarati"),
    lang("ur", "Urdu"),
    lang("kn", "Kannada"),
    lang("or", "Odia"),
    lang("ml", "Malayalam"),
    lang("pa", "Punjabi"),
    lang("as", "Assamese"),
    lang("mai", "Maithili"),
    lang("sat", "Santali"),
    lang("kok", "Konkani"),
    lang("ks", "Kashmiri"),
    lang("doi", "Dogri"),
    lang("mni", "Manipuri"),
    lang("brx", "Bodo"),
    lang("sd", "Sindhi"),
    lang("sa", "Sanskrit"),
    lang("fr", "French"),
    lang("es", "Spanish"),
    lang("de", "German"),
    lang("ja", "Japanese"),
    lang("zh", "Chinese"),
];

/// Look up a supported language by code (case-insensitive) or display name.
pub fn find_language(value: &str) -> Option<Language> {
    let value = value.trim();
    SUPPORTED_LANGUAGES
        .iter()
        .find(|l| l.code.eq_ignore_ascii_case(value) || l.name.eq_ignore_ascii_case(value))
        .copied()
}

/// Non-empty, ordered, de-duplicated list of target languages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LanguageSelection {
    languages: Vec<Language>,
}

impl LanguageSelection {
    /// Build a selection from submitted form values.
    ///
    /// Blank values are ignored; an unknown value is an error rather than
    /// silently dropped so the user learns their choice was not honoured.
    pub fn parse<I, S>(values: I) -> Result<Self, ValidationError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut languages: Vec<Language> = Vec::new();
        for value in values {
            let value = value.as_ref().trim();
            if value.is_empty() {
                continue;
            }
            let language = find_language(value).ok_or_else(|| {
                ValidationError::UnsupportedLanguage {
                    code: value.to_string(),
                }
            })?;
            if !languages.contains(&language) {
                languages.push(language);
            }
        }
        if languages.is_empty() {
            return Err(ValidationError::NoLanguageSelected);
        }
        Ok(Self { languages })
    }

    /// The first selected language.
    pub fn primary(&self) -> Language {
        self.languages[0]
    }

    pub fn languages(&self) -> &[Language] {
        &self.languages
    }

    pub fn len(&self) -> usize {
        self.languages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.languages.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Language> {
        self.languages.iter()
    }

    /// Display names joined with ", " (used in titles and prompts).
    pub fn display_names(&self) -> String {
        self.languages
            .iter()
            .map(|l| l.name)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_unique() {
        let mut codes: Vec<_> = SUPPORTED_LANGUAGES.iter().map(|l| l.code).collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), SUPPORTED_LANGUAGES.len());
    }

    #[test]
    fn find_by_code_or_name() {
        assert_eq!(find_language("fr").map(|l| l.name), Some("French"));
        assert_eq!(find_language("HINDI").map(|l| l.code), Some("hi"));
        assert_eq!(find_language("klingon"), None);
    }

    #[test]
    fn primary_is_first_submitted() {
        for values in [vec!["en", "fr"], vec!["fr", "en"], vec!["ta", "hi", "en"]] {
            let sel = LanguageSelection::parse(&values).unwrap();
            assert_eq!(sel.primary().code, values[0]);
            assert_eq!(sel.len(), values.len());
        }
    }

    #[test]
    fn duplicates_keep_first_occurrence() {
        let sel = LanguageSelection::parse(["hi", "en", "hi", "English"]).unwrap();
        let codes: Vec<_> = sel.iter().map(|l| l.code).collect();
        assert_eq!(codes, vec!["hi", "en"]);
    }

    #[test]
    fn empty_selection_rejected() {
        let empty: [&str; 0] = [];
        assert_eq!(
            LanguageSelection::parse(empty),
            Err(ValidationError::NoLanguageSelected)
        );
        assert_eq!(
            LanguageSelection::parse(["", "  "]),
            Err(ValidationError::NoLanguageSelected)
        );
    }

    #[test]
    fn unknown_code_rejected() {
        assert_eq!(
            LanguageSelection::parse(["en", "xx"]),
            Err(ValidationError::UnsupportedLanguage { code: "xx".into() })
        );
    }

    #[test]
    fn display_names_joined() {
        let sel = LanguageSelection::parse(["en", "fr"]).unwrap();
        assert_eq!(sel.display_names(), "English, French");
    }
}
