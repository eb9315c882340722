// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Video course processor.
//!
//! Downloads lesson videos at the preferred resolution and, optionally, the
//! supplementary materials (mind maps, summaries, slides). In extras-only
//! mode the video enclosures are skipped entirely; this mode is used for the
//! supplementary pass after a PDF run.

use std::collections::BTreeMap;
use std::path::PathBuf;

use async_trait::async_trait;
use log::{info, warn};
use url::Url;

use crate::browser::BrowserPage;
use crate::error::ProcessorError;
use crate::processor::{CourseProcessor, SharedResources};
use crate::processors::pdf::filename_from_url;
use crate::processors::transfer::{Material, fetch_materials};

/// Link-text markers for supplementary materials
const EXTRA_KEYWORDS: [&str; 3] = ["mapa mental", "resumo", "slide"];

pub struct VideoProcessor {
    dest_dir: PathBuf,
    resolution: String,
    download_extras: bool,
    extras_only: bool,
    shared: SharedResources,
}

impl VideoProcessor {
    pub fn new(
        dest_dir: PathBuf,
        resolution: String,
        download_extras: bool,
        extras_only: bool,
        shared: SharedResources,
    ) -> Self {
        Self {
            dest_dir,
            resolution,
            download_extras,
            extras_only,
            shared,
        }
    }
}

#[async_trait]
impl CourseProcessor for VideoProcessor {
    async fn process_course(
        &self,
        page: &dyn BrowserPage,
        course_url: &str,
    ) -> Result<bool, ProcessorError> {
        page.goto(course_url).await?;
        let html = page.content().await?;

        let mut materials = Vec::new();
        if !self.extras_only {
            materials.extend(extract_video_materials(&html, course_url, &self.resolution));
        }
        if self.download_extras || self.extras_only {
            materials.extend(extract_extra_materials(&html, course_url));
        }

        if materials.is_empty() {
            warn!("no video materials found on {course_url}");
            return Ok(true);
        }

        info!("{} video material(s) on {course_url}", materials.len());
        fetch_materials(&materials, &self.dest_dir, course_url, &self.shared).await?;
        Ok(true)
    }
}

/// Collect video enclosures, one per lesson, preferring the configured
/// resolution when a lesson is published in several.
pub fn extract_video_materials(html: &str, course_url: &str, resolution: &str) -> Vec<Material> {
    let base = match Url::parse(course_url) {
        Ok(base) => base,
        Err(_) => return Vec::new(),
    };

    let document = scraper::Html::parse_document(html);
    let selector = scraper::Selector::parse("a[href]").expect("static selector");

    // Lesson stem -> best candidate so far. BTreeMap keeps page order stable
    // enough (stems sort lexicographically, matching lesson numbering).
    let mut by_stem: BTreeMap<String, Material> = BTreeMap::new();

    for link in document.select(&selector) {
        let Some(href) = link.value().attr("href") else {
            continue;
        };
        let Ok(resolved) = base.join(href) else {
            continue;
        };
        let path = resolved.path().to_ascii_lowercase();
        if !path.ends_with(".mp4") {
            continue;
        }
        let Some(filename) = filename_from_url(&resolved) else {
            continue;
        };

        let stem = lesson_stem(&filename, resolution);
        let preferred = filename.to_ascii_lowercase().contains(&resolution.to_ascii_lowercase());
        let candidate = Material {
            url: resolved.to_string(),
            filename,
        };

        match by_stem.get(&stem) {
            Some(existing)
                if existing
                    .filename
                    .to_ascii_lowercase()
                    .contains(&resolution.to_ascii_lowercase()) =>
            {
                // Already holding the preferred resolution.
            }
            Some(_) if !preferred => {}
            _ => {
                by_stem.insert(stem, candidate);
            }
        }
    }

    by_stem.into_values().collect()
}

/// Collect supplementary material links by their text markers.
pub fn extract_extra_materials(html: &str, course_url: &str) -> Vec<Material> {
    let base = match Url::parse(course_url) {
        Ok(base) => base,
        Err(_) => return Vec::new(),
    };

    let document = scraper::Html::parse_document(html);
    let selector = scraper::Selector::parse("a[href]").expect("static selector");

    let mut materials = Vec::new();
    for link in document.select(&selector) {
        let text = link.text().collect::<String>().to_ascii_lowercase();
        if !EXTRA_KEYWORDS.iter().any(|k| text.contains(k)) {
            continue;
        }
        let Some(href) = link.value().attr("href") else {
            continue;
        };
        let Ok(resolved) = base.join(href) else {
            continue;
        };
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

/// Strip a resolution marker so "aula-01-720p.mp4" and "aula-01-360p.mp4"
/// group under the same lesson.
fn lesson_stem(filename: &str, _resolution: &str) -> String {
    let lower = filename.to_ascii_lowercase();
    let mut stem = lower.trim_end_matches(".mp4").to_string();
    for marker in ["1080p", "720p", "480p", "360p"] {
        if let Some(stripped) = stem.strip_suffix(marker) {
            stem = stripped.trim_end_matches(['-', '_']).to_string();
            break;
        }
    }
    stem
}

#[cfg(test)]
mod tests {
    use super::*;

    const COURSE: &str = "https://www.estrategiaconcursos.com.br/cursos/curso-x/aulas";

    const PAGE: &str = r##"
        <html><body>
          <a href="/v/aula-01-360p.mp4">Aula 01 (360p)</a>
          <a href="/v/aula-01-720p.mp4">Aula 01 (720p)</a>
          <a href="/v/aula-02-360p.mp4">Aula 02 (360p)</a>
          <a href="/files/mapa-mental-aula-01.pdf">Mapa Mental da Aula 01</a>
          <a href="/files/resumo-aula-01.pdf">Resumo da Aula 01</a>
          <a href="/files/edital.pdf">Edital</a>
        </body></html>
    "##;

    #[test]
    fn prefers_configured_resolution_per_lesson() {
        let materials = extract_video_materials(PAGE, COURSE, "720p");
        let names: Vec<_> = materials.iter().map(|m| m.filename.as_str()).collect();

        assert_eq!(names, vec!["aula-01-720p.mp4", "aula-02-360p.mp4"]);
    }

    #[test]
    fn falls_back_when_preferred_resolution_is_absent() {
        let materials = extract_video_materials(PAGE, COURSE, "1080p");
        assert_eq!(materials.len(), 2);
        assert_eq!(materials[0].filename, "aula-01-360p.mp4");
    }

    #[test]
    fn extras_are_selected_by_text_markers() {
        let materials = extract_extra_materials(PAGE, COURSE);
        let names: Vec<_> = materials.iter().map(|m| m.filename.as_str()).collect();

        assert_eq!(
            names,
            vec!["mapa-mental-aula-01.pdf", "resumo-aula-01.pdf"]
        );
    }

    #[test]
    fn lesson_stem_groups_resolution_variants() {
        assert_eq!(lesson_stem("aula-01-720p.mp4", "720p"), "aula-01");
        assert_eq!(lesson_stem("aula-01-360p.mp4", "720p"), "aula-01");
        assert_eq!(lesson_stem("intro.mp4", "720p"), "intro");
    }
}
