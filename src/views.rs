//! HTML pages of the web front-end, rendered with minijinja.
//!
//! Templates are compiled into the binary; the `.html` suffix turns on
//! minijinja's HTML auto-escaping, so flash messages and file names can be
//! passed in unescaped.

use crate::job::{ConversionResult, JobId};
use crate::language::SUPPORTED_LANGUAGES;
use crate::progress::Flash;
use minijinja::{context, Environment};
use std::time::Duration;

/// Compiled page templates.
#[derive(Debug)]
pub struct Views {
    env: Environment<'static>,
    max_upload_mb: usize,
    retention_minutes: u64,
}

impl Views {
    pub fn new(max_upload_bytes: usize, retention: Duration) -> Result<Self, minijinja::Error> {
        let mut env = Environment::new();
        env.add_template("base.html", include_str!("../templates/base.html"))?;
        env.add_template("index.html", include_str!("../templates/index.html"))?;
        env.add_template("result.html", include_str!("../templates/result.html"))?;
        env.add_template("failure.html", include_str!("../templates/failure.html"))?;
        Ok(Self {
            env,
            max_upload_mb: max_upload_bytes / (1024 * 1024),
            retention_minutes: retention.as_secs() / 60,
        })
    }

    /// Upload form listing every supported language.
    pub fn index(&self, flashes: &[Flash]) -> Result<String, minijinja::Error> {
        self.env.get_template("index.html")?.render(context! {
            flashes => flashes,
            languages => SUPPORTED_LANGUAGES,
            max_upload_mb => self.max_upload_mb,
        })
    }

    /// Links to every document a finished job produced.
    pub fn result(&self, result: &ConversionResult, flashes: &[Flash]) -> Result<String, minijinja::Error> {
        self.env.get_template("result.html")?.render(context! {
            flashes => flashes,
            result => result,
            retention_minutes => self.retention_minutes,
        })
    }

    /// Generic failure page for a job that was started but did not finish.
    pub fn failure(
        &self,
        job_id: Option<JobId>,
        flashes: &[Flash],
    ) -> Result<String, minijinja::Error> {
        self.env.get_template("failure.html")?.render(context! {
            flashes => flashes,
            job_id => job_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::{JobId, LanguageOutput};
    use crate::language::find_language;
    use crate::progress::FlashLevel;
    use std::path::PathBuf;

    fn views() -> Views {
        Views::new(30 * 1024 * 1024, Duration::from_secs(3600)).unwrap()
    }

    #[test]
    fn index_lists_languages_and_escapes_flashes() {
        let html = views()
            .index(&[Flash::new(FlashLevel::Danger, "<b>bad")])
            .unwrap();
        assert!(html.contains("value=\"en\" checked"));
        assert!(html.contains("value=\"zh\""));
        assert!(html.contains("Sanskrit"));
        assert!(html.contains("max 30 MB"));
        assert!(html.contains("class=\"flash danger\""));
        assert!(html.contains("&lt;b&gt;bad"));
    }

    #[test]
    fn failure_page_shows_reference_and_steps() {
        let id = JobId::new();
        let flashes = [
            Flash::new(FlashLevel::Info, "Step 1: Extracting images and generating alt tags..."),
            Flash::new(FlashLevel::Danger, "An error occurred: timeout"),
        ];
        let html = views().failure(Some(id), &flashes).unwrap();
        assert!(html.contains("Conversion failed"));
        assert!(html.contains(&format!("<code>{}</code>", id)));
        assert!(html.contains("Step 1: Extracting images"));
        assert!(html.contains("An error occurred: timeout"));
        assert!(!html.contains("name=\"pdf_file\""));

        let html = views().failure(None, &[]).unwrap();
        assert!(!html.contains("Reference:"));
    }

    #[test]
    fn result_links_every_output() {
        let id = JobId::new();
        let en = find_language("en").unwrap();
        let fr = find_language("fr").unwrap();
        let result = ConversionResult {
            job_id: id,
            primary_language: en,
            outputs: vec![
                LanguageOutput {
                    language: en,
                    file_name: "en.html".into(),
                    path: PathBuf::new(),
                },
                LanguageOutput {
                    language: fr,
                    file_name: "fr.html".into(),
                    path: PathBuf::new(),
                },
            ],
            images: vec![],
            page_count: 2,
            duration_ms: 10,
        };
        let html = views().result(&result, &[]).unwrap();
        assert!(html.contains(&format!("/output/{}/en.html", id)));
        assert!(html.contains(&format!("/download/{}/fr.html", id)));
        assert!(html.contains("primary language: English"));
        assert!(html.contains("kept for 60 minutes"));
    }
}
