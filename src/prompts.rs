//! Prompt builder for the two model calls of a conversion.
//!
//! Every prompt lives here so wording changes never touch retry or
//! sequencing logic, and so tests can inspect prompts without a model.
//!
//! * [`alt_text_prompt`] — one image in, one alt-text line out.
//! * [`html_system_prompt`] + [`html_user_prompt`] — page text, page renders
//!   and image metadata in, one complete HTML document out.

use crate::job::ImageAsset;
use crate::language::Language;
use crate::pipeline::document::PageContent;

/// Request for a whole-document HTML conversion in one language.
#[derive(Debug, Clone, Copy)]
pub struct HtmlRequest<'a> {
    /// Language the document must be written in.
    pub language: Language,
    /// Primary language of the job (alt text is already in it).
    pub primary: Language,
    pub pages: &'a [PageContent],
    pub images: &'a [ImageAsset],
    /// Shared `<head>` the model must include verbatim.
    pub head: &'a str,
}

/// Instruction sent with each extracted image.
pub fn alt_text_prompt(language: Language) -> String {
    format!(
        "Provide a single, concise, and descriptive alt text for this image in {}, \
suitable for an HTML img tag's 'alt' attribute. Output only the alt text string itself, \
with no additional explanations, quotation marks, or markdown formatting. Be factual and brief.",
        language.name
    )
}

/// Serialise image metadata for the HTML prompt.
pub fn image_metadata_json(images: &[ImageAsset]) -> String {
    serde_json::to_string_pretty(images).unwrap_or_else(|_| "[]".to_string())
}

/// System prompt for the whole-document conversion.
pub fn html_system_prompt(request: &HtmlRequest<'_>) -> String {
    let language = request.language;
    let translation_note = if language == request.primary {
        String::new()
    } else {
        format!(
            "\nThe image alt texts below are written in {primary}; translate them into {lang} \
when you write the alt attributes.",
            primary = request.primary.name,
            lang = language.name
        )
    };

    format!(
        r#"You are an expert PDF to HTML converter.
Your goal is to convert the provided PDF content (page images with their extracted text) and the associated image information into a single, well-structured, and valid HTML file.
The HTML should accurately replicate the text content, general layout, tables, lists, and headings from the PDF.
ONLY use content and information present in the original PDF. DO NOT add any new data, opinions, or external information.

**Language Output:**
The entire HTML content, including all text, must be in {name}. Translate faithfully where the PDF uses another language. Set lang="{code}" on the <html> element.{translation_note}

**HTML Formatting Rules:**
1.  Use pure HTML tags ONLY. No Markdown syntax.
2.  Structure: Complete HTML document (`<!DOCTYPE html>`, `<html>`, `<head>`, `<body>`). The `<head>` section MUST include:
{head}
3.  Equations: Use MathJax compatible LaTeX. Inline: `\( ... \)` or `$ ... $`. Display: `\[ ... \]` or `$$ ... $$`.
4.  Tables: Convert PDF tables into HTML `<table>`. Wrap wide tables in `<div class="scrollable-table-wrapper">...</div>`.
5.  Text Preservation: Preserve all text as it appears in the PDF, presented in {name}.
6.  Diagrams (Non-Image): If the PDF contains diagrams made from text, lines, or shapes, replicate their structure using semantic HTML and CSS. If too complex, describe it briefly in text.

**Image Handling - CRITICAL:**
You have been provided with a JSON list of pre-extracted image metadata.
When you identify an image's position in the PDF content:
- You MUST use the provided metadata to insert an `<img>` tag: `<img src="[html_src_path]" alt="[alt_text]" style="max-width:100%; height:auto; display:block; margin:1em auto;">`
- Match images from the PDF context to `pdf_page_num` and `image_index_on_page` from the metadata.

**Image Metadata (use this to insert <img> tags):**
```json
{metadata}
```

Respond ONLY with the complete HTML code. Do not include any explanations before or after the HTML."#,
        name = language.name,
        code = language.code,
        translation_note = translation_note,
        head = request.head,
        metadata = image_metadata_json(request.images),
    )
}

/// User prompt: the task statement followed by the extracted page text.
///
/// Page renders travel as image attachments of the same message, in page
/// order; the text gives the model exact characters to copy.
pub fn html_user_prompt(request: &HtmlRequest<'_>) -> String {
    let mut prompt = format!(
        "Please convert the entire PDF (provided as {} attached page images, in order) into a single HTML file in {}.\n\
Follow all instructions in the system prompt precisely, especially regarding:\n\
- Writing every piece of text in {}.\n\
- Using ONLY pure HTML tags (NO MARKDOWN).\n\
- Directly inserting `<img>` tags using the provided image metadata JSON.\n\
- Including the specified `<head>` content.\n\
- Correctly formatting MathJax equations.\n\
Process all pages of the PDF.\n",
        request.pages.len(),
        request.language.name,
        request.language.name,
    );

    for page in request.pages {
        prompt.push_str(&format!(
            "\n--- Page {} extracted text ---\n{}\n",
            page.page_num,
            page.text.trim()
        ));
    }
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::language::find_language;

    fn lang(code: &str) -> Language {
        find_language(code).unwrap()
    }

    fn asset() -> ImageAsset {
        ImageAsset {
            pdf_page_num: 1,
            image_index_on_page: 1,
            global_index: 1,
            file_name: "page_1_idx_1_gidx_1.png".into(),
            html_src_path: "extracted_images/page_1_idx_1_gidx_1.png".into(),
            alt_text: "Un graphique".into(),
        }
    }

    fn page() -> PageContent {
        PageContent {
            page_num: 1,
            text: "Hello world\n".into(),
            png: vec![],
        }
    }

    #[test]
    fn alt_text_prompt_names_language() {
        assert!(alt_text_prompt(lang("hi")).contains("in Hindi"));
    }

    #[test]
    fn system_prompt_contains_language_head_and_metadata() {
        let pages = [page()];
        let images = [asset()];
        let req = HtmlRequest {
            language: lang("fr"),
            primary: lang("en"),
            pages: &pages,
            images: &images,
            head: "<meta charset=\"UTF-8\">",
        };
        let p = html_system_prompt(&req);
        assert!(p.contains("must be in French"));
        assert!(p.contains("lang=\"fr\""));
        assert!(p.contains("<meta charset=\"UTF-8\">"));
        assert!(p.contains("\"html_src_path\": \"extracted_images/page_1_idx_1_gidx_1.png\""));
        assert!(p.contains("written in English; translate them into French"));
    }

    #[test]
    fn primary_language_needs_no_alt_translation() {
        let req = HtmlRequest {
            language: lang("en"),
            primary: lang("en"),
            pages: &[],
            images: &[],
            head: "",
        };
        assert!(!html_system_prompt(&req).contains("translate them"));
    }

    #[test]
    fn user_prompt_lists_page_text() {
        let pages = [page()];
        let req = HtmlRequest {
            language: lang("en"),
            primary: lang("en"),
            pages: &pages,
            images: &[],
            head: "",
        };
        let p = html_user_prompt(&req);
        assert!(p.contains("1 attached page images"));
        assert!(p.contains("--- Page 1 extracted text ---\nHello world\n"));
    }
}
