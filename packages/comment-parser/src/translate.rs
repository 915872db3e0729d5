//! Language detection and translation for harvested comments.

use std::time::Duration;

use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

use crate::error::TranslateError;

/// Detect-and-translate capability. Both operations may fail.
pub trait Translator: Send + Sync {
    /// ISO 639-1 code of the text's language.
    fn detect(&self, text: &str) -> Result<String, TranslateError>;

    /// Translate `text` into `target`.
    fn translate(&self, text: &str, target: &str) -> Result<String, TranslateError>;
}

/// Translate `text` into `target` unless it is already in that language.
///
/// Never fails: any detection or translation error yields the original text.
pub fn translate_or_passthrough(translator: &dyn Translator, text: &str, target: &str) -> String {
    let detected = match translator.detect(text) {
        Ok(lang) => lang,
        Err(e) => {
            warn!(error = %e, "Language detection failed, keeping original text");
            return text.to_string();
        }
    };

    if detected.eq_ignore_ascii_case(target) {
        debug!(lang = %detected, "Comment already in target language");
        return text.to_string();
    }

    match translator.translate(text, target) {
        Ok(translated) => {
            debug!(from = %detected, to = %target, "Comment translated");
            translated
        }
        Err(e) => {
            warn!(from = %detected, to = %target, error = %e, "Translation failed, keeping original text");
            text.to_string()
        }
    }
}

/// Client for a LibreTranslate-compatible service.
///
/// Blocking; call from the harvester thread, not from async code.
pub struct LibreTranslator {
    client: reqwest::blocking::Client,
    base_url: String,
    api_key: Option<String>,
}

#[derive(Deserialize)]
struct Detection {
    language: String,
    #[serde(default)]
    confidence: f64,
}

#[derive(Deserialize)]
struct Translation {
    #[serde(rename = "translatedText")]
    translated_text: String,
}

impl LibreTranslator {
    pub fn new(base_url: impl Into<String>) -> Result<Self, TranslateError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| TranslateError::Http(Box::new(e)))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: None,
        })
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    fn post<T: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        mut body: serde_json::Value,
    ) -> Result<T, TranslateError> {
        if let Some(key) = &self.api_key {
            body["api_key"] = json!(key);
        }
        self.client
            .post(format!("{}{}", self.base_url, path))
            .json(&body)
            .send()
            .and_then(|r| r.error_for_status())
            .and_then(|r| r.json::<T>())
            .map_err(|e| TranslateError::Http(Box::new(e)))
    }
}

impl Translator for LibreTranslator {
    fn detect(&self, text: &str) -> Result<String, TranslateError> {
        let detections: Vec<Detection> = self.post("/detect", json!({ "q": text }))?;
        detections
            .into_iter()
            .max_by(|a, b| a.confidence.total_cmp(&b.confidence))
            .map(|d| d.language)
            .ok_or_else(|| TranslateError::EmptyResult("no language detected".to_string()))
    }

    fn translate(&self, text: &str, target: &str) -> Result<String, TranslateError> {
        let translation: Translation = self.post(
            "/translate",
            json!({ "q": text, "source": "auto", "target": target, "format": "text" }),
        )?;
        if translation.translated_text.is_empty() && !text.is_empty() {
            return Err(TranslateError::EmptyResult("empty translation".to_string()));
        }
        Ok(translation.translated_text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockTranslator;

    #[test]
    fn test_translates_foreign_text() {
        let translator = MockTranslator::new("en").with_translation("hello", "привет");
        assert_eq!(translate_or_passthrough(&translator, "hello", "ru"), "привет");
    }

    #[test]
    fn test_same_language_passes_through() {
        let translator = MockTranslator::new("ru").with_translation("привет", "unused");
        assert_eq!(translate_or_passthrough(&translator, "привет", "ru"), "привет");
        assert_eq!(translator.translate_calls(), 0);
    }

    #[test]
    fn test_detection_failure_passes_through() {
        let translator = MockTranslator::failing_detection();
        assert_eq!(translate_or_passthrough(&translator, "hola", "ru"), "hola");
    }

    #[test]
    fn test_translation_failure_passes_through() {
        let translator = MockTranslator::new("es");
        assert_eq!(translate_or_passthrough(&translator, "hola", "ru"), "hola");
    }
}
