// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! PDF course processor: extracts lesson PDF links from the course page and
//! transfers each one, resuming through the shared ledger.

use std::path::PathBuf;

use async_trait::async_trait;
use log::{info, warn};
use url::Url;

use crate::browser::BrowserPage;
use crate::error::ProcessorError;
use crate::processor::{CourseProcessor, SharedResources};
use crate::processors::transfer::{Material, fetch_materials};

/// Keywords distinguishing the PDF variants the platform publishes.
/// Variant 1 is the plain original, 2 the highlighted edition, 3 the
/// condensed edition.
const VARIANT_KEYWORDS: [(u32, &str); 2] = [(2, "grifado"), (3, "simplificado")];

pub struct PdfProcessor {
    dest_dir: PathBuf,
    variant: u32,
    shared: SharedResources,
}

impl PdfProcessor {
    pub fn new(dest_dir: PathBuf, variant: u32, shared: SharedResources) -> Self {
        Self {
            dest_dir,
            variant,
            shared,
        }
    }
}

#[async_trait]
impl CourseProcessor for PdfProcessor {
    async fn process_course(
        &self,
        page: &dyn BrowserPage,
        course_url: &str,
    ) -> Result<bool, ProcessorError> {
        page.goto(course_url).await?;
        let html = page.content().await?;

        let materials = extract_pdf_materials(&html, course_url, self.variant);
        if materials.is_empty() {
            warn!("no PDF materials found on {course_url}");
            return Ok(true);
        }

        info!("{} PDF material(s) on {course_url}", materials.len());
        fetch_materials(&materials, &self.dest_dir, course_url, &self.shared).await?;
        Ok(true)
    }
}

/// Collect PDF links from the page, keeping only the requested variant.
///
/// Links carrying another variant's keyword are dropped; links carrying no
/// variant keyword are always kept. Relative hrefs resolve against the course
/// URL.
pub fn extract_pdf_materials(html: &str, course_url: &str, variant: u32) -> Vec<Material> {
    let base = match Url::parse(course_url) {
        Ok(base) => base,
        Err(_) => return Vec::new(),
    };

    let document = scraper::Html::parse_document(html);
    let selector = scraper::Selector::parse("a[href]").expect("static selector");

    let mut materials = Vec::new();
    for link in document.select(&selector) {
        let Some(href) = link.value().attr("href") else {
            continue;
        };
        let Ok(resolved) = base.join(href) else {
            continue;
        };
        if !resolved.path().to_ascii_lowercase().ends_with(".pdf") {
            continue;
        }

        let haystack = format!(
            "{} {}",
            resolved.path().to_ascii_lowercase(),
            link.text().collect::<String>().to_ascii_lowercase()
        );
        let foreign_variant = VARIANT_KEYWORDS
            .iter()
            .any(|(v, keyword)| *v != variant && haystack.contains(keyword));
        if foreign_variant {
            continue;
        }

        let Some(filename) = filename_from_url(&resolved) else {
            continue;
        };
        let material = Material {
            url: resolved.to_string(),
            filename,
        };
        if !materials.contains(&material) {
            materials.push(material);
        }
    }

    materials
}

pub(crate) fn filename_from_url(url: &Url) -> Option<String> {
    let raw = url.path_segments()?.next_back()?;
    if raw.is_empty() {
        return None;
    }
    Some(sanitize_filename::sanitize(raw))
}

#[cfg(test)]
mod tests {
    use super::*;

    const COURSE: &str = "https://www.estrategiaconcursos.com.br/cursos/curso-x/aulas";

    const PAGE: &str = r##"
        <html><body>
          <a href="/files/aula-01-original.pdf">Aula 01</a>
          <a href="/files/aula-01-grifado.pdf">Aula 01 (grifado)</a>
          <a href="/files/aula-02-simplificado.pdf">Aula 02 simplificado</a>
          <a href="https://cdn.example.com/mapa.png">Mapa</a>
          <a href="/files/cronograma.pdf">Cronograma</a>
        </body></html>
    "##;

    #[test]
    fn keeps_only_requested_variant_and_neutral_links() {
        let materials = extract_pdf_materials(PAGE, COURSE, 2);
        let names: Vec<_> = materials.iter().map(|m| m.filename.as_str()).collect();

        assert_eq!(
            names,
            vec!["aula-01-original.pdf", "aula-01-grifado.pdf", "cronograma.pdf"]
        );
    }

    #[test]
    fn variant_three_drops_highlighted_edition() {
        let materials = extract_pdf_materials(PAGE, COURSE, 3);
        let names: Vec<_> = materials.iter().map(|m| m.filename.as_str()).collect();

        assert_eq!(
            names,
            vec![
                "aula-01-original.pdf",
                "aula-02-simplificado.pdf",
                "cronograma.pdf"
            ]
        );
    }

    #[test]
    fn relative_links_resolve_against_the_course_url() {
        let materials = extract_pdf_materials(PAGE, COURSE, 1);
        assert!(
            materials
                .iter()
                .all(|m| m.url.starts_with("https://www.estrategiaconcursos.com.br/"))
        );
    }

    #[test]
    fn duplicate_links_are_deduplicated() {
        let html = r#"<a href="/a.pdf">x</a><a href="/a.pdf">y</a>"#;
        let materials = extract_pdf_materials(html, COURSE, 1);
        assert_eq!(materials.len(), 1);
    }

    #[test]
    fn unparsable_course_url_yields_nothing() {
        assert!(extract_pdf_materials(PAGE, "not a url", 2).is_empty());
    }
}
