// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Ordered, deduplicated store of course targets.
//!
//! Supports the legacy on-disk format (a plain array of URL strings) by
//! migrating entries to `{url, title}` objects at load time and persisting
//! the migrated form immediately.

use std::path::{Path, PathBuf};

use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;

use crate::error::{QueueError, UrlProblem};
use crate::fsio;

/// Host all course URLs must live on
pub const PLATFORM_DOMAIN: &str = "estrategiaconcursos.com.br";
/// Required path segment identifying a course page
pub const COURSES_SEGMENT: &str = "/cursos/";
/// Required path suffix identifying the lessons listing
pub const LESSONS_SUFFIX: &str = "/aulas";

const UNTITLED: &str = "untitled-course";

/// One queued course target
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourseEntry {
    pub url: String,
    pub title: String,
}

/// Outcome of an `add` that did not error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    Added,
    Duplicate,
}

pub struct CourseQueue {
    path: PathBuf,
    entries: Vec<CourseEntry>,
}

impl CourseQueue {
    /// Load the queue, migrating legacy string entries on the fly.
    ///
    /// A missing file starts empty; an unreadable or corrupt file logs and
    /// starts empty rather than failing the process.
    pub fn load(path: &Path) -> Self {
        let mut queue = Self {
            path: path.to_path_buf(),
            entries: Vec::new(),
        };

        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) => {
                if path.exists() {
                    error!("failed to read course queue {}: {e}", path.display());
                }
                return queue;
            }
        };

        let items: Vec<Value> = match serde_json::from_str(&raw) {
            Ok(items) => items,
            Err(e) => {
                error!("corrupt course queue {}: {e}", path.display());
                return queue;
            }
        };

        let mut migrated = false;
        for item in items {
            match item {
                Value::String(url) => {
                    let title = extract_title(&url);
                    queue.entries.push(CourseEntry { url, title });
                    migrated = true;
                }
                Value::Object(_) => match serde_json::from_value::<CourseEntry>(item) {
                    Ok(entry) => queue.entries.push(entry),
                    Err(e) => warn!("skipping malformed course entry: {e}"),
                },
                other => warn!("skipping unexpected course entry: {other}"),
            }
        }

        if migrated {
            info!("migrating course queue to the titled format");
            if let Err(e) = queue.persist() {
                error!("failed to persist migrated course queue: {e}");
            }
        }

        info!("{} course(s) loaded", queue.entries.len());
        queue
    }

    /// Validate, deduplicate, and append a course URL.
    ///
    /// An invalid URL is an error with no partial mutation; an exact-URL
    /// duplicate is reported as `Duplicate` and leaves the queue unchanged.
    pub fn add(&mut self, url: &str) -> Result<AddOutcome, QueueError> {
        let url = url.trim();
        validate_course_url(url).map_err(|problem| QueueError::InvalidUrl {
            url: url.to_string(),
            problem,
        })?;

        if self.entries.iter().any(|c| c.url == url) {
            info!("course already queued: {url}");
            return Ok(AddOutcome::Duplicate);
        }

        let title = extract_title(url);
        self.entries.push(CourseEntry {
            url: url.to_string(),
            title: title.clone(),
        });
        self.persist()?;
        info!("course added: {title}");
        Ok(AddOutcome::Added)
    }

    /// Remove a course by exact URL; returns whether anything was removed.
    pub fn remove(&mut self, url: &str) -> Result<bool, QueueError> {
        let before = self.entries.len();
        self.entries.retain(|c| c.url != url);

        if self.entries.len() < before {
            self.persist()?;
            info!("course removed: {url}");
            Ok(true)
        } else {
            warn!("course not found in queue: {url}");
            Ok(false)
        }
    }

    /// Value copy of the queue; callers cannot mutate internal state through it.
    pub fn get_all(&self) -> Vec<CourseEntry> {
        self.entries.clone()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Remove every course and persist.
    pub fn clear(&mut self) -> Result<(), QueueError> {
        self.entries.clear();
        self.persist()?;
        info!("course queue cleared");
        Ok(())
    }

    fn persist(&self) -> Result<(), QueueError> {
        let json = serde_json::to_string_pretty(&self.entries)?;
        fsio::write_atomic(&self.path, json.as_bytes()).map_err(|e| QueueError::PersistFailed {
            path: self.path.clone(),
            source: e,
        })
    }
}

/// Hard validation gate for course URLs: scheme, platform domain, a courses
/// path segment, and the lessons suffix.
pub fn validate_course_url(raw: &str) -> Result<(), UrlProblem> {
    let url = Url::parse(raw).map_err(|_| UrlProblem::Unparsable)?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(UrlProblem::BadScheme);
    }

    let host = url.host_str().ok_or(UrlProblem::WrongDomain)?;
    if host != PLATFORM_DOMAIN && !host.ends_with(&format!(".{PLATFORM_DOMAIN}")) {
        return Err(UrlProblem::WrongDomain);
    }

    if !url.path().contains(COURSES_SEGMENT) {
        return Err(UrlProblem::MissingCoursesSegment);
    }

    if !url.path().ends_with(LESSONS_SUFFIX) {
        return Err(UrlProblem::MissingLessonsSuffix);
    }

    Ok(())
}

/// Best-effort human title from a course URL.
///
/// Prefers the path segment immediately before the lessons marker, then the
/// last hyphenated segment longer than five characters, then a sentinel.
/// Hyphens become spaces, words are title-cased, and one trailing all-numeric
/// token (a slug ID) is stripped.
pub fn extract_title(url: &str) -> String {
    let segments: Vec<&str> = url.split('/').filter(|s| !s.is_empty()).collect();

    let slug = segments
        .iter()
        .position(|s| *s == "aulas")
        .and_then(|i| if i > 0 { Some(segments[i - 1]) } else { None })
        .or_else(|| {
            segments
                .iter()
                .rev()
                .find(|s| s.contains('-') && s.len() > 5)
                .copied()
        })
        .unwrap_or(UNTITLED);

    let mut words: Vec<String> = slug
        .split('-')
        .filter(|w| !w.is_empty())
        .map(capitalize)
        .collect();

    if words.len() > 1
        && words
            .last()
            .is_some_and(|w| w.chars().all(|c| c.is_ascii_digit()))
    {
        words.pop();
    }

    words.join(" ")
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const VALID_URL: &str =
        "https://www.estrategiaconcursos.com.br/cursos/curso-de-rust-avancado/aulas";

    #[test]
    fn add_valid_url_persists_entry() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("course-urls.json");

        let mut queue = CourseQueue::load(&path);
        assert_eq!(queue.add(VALID_URL).unwrap(), AddOutcome::Added);

        let reloaded = CourseQueue::load(&path);
        assert_eq!(reloaded.len(), 1);
        assert_eq!(reloaded.get_all()[0].url, VALID_URL);
        assert_eq!(reloaded.get_all()[0].title, "Curso De Rust Avancado");
    }

    #[test]
    fn add_trims_surrounding_whitespace() {
        let dir = tempdir().unwrap();
        let mut queue = CourseQueue::load(&dir.path().join("course-urls.json"));

        queue.add(&format!("  {VALID_URL}\n")).unwrap();
        assert_eq!(queue.get_all()[0].url, VALID_URL);
    }

    #[test]
    fn duplicate_url_leaves_queue_unchanged() {
        let dir = tempdir().unwrap();
        let mut queue = CourseQueue::load(&dir.path().join("course-urls.json"));

        queue.add(VALID_URL).unwrap();
        assert_eq!(queue.add(VALID_URL).unwrap(), AddOutcome::Duplicate);
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn invalid_urls_are_rejected_without_mutation() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("course-urls.json");
        let mut queue = CourseQueue::load(&path);

        let cases = [
            ("ftp://www.estrategiaconcursos.com.br/cursos/x/aulas", UrlProblem::BadScheme),
            ("https://example.com/cursos/x/aulas", UrlProblem::WrongDomain),
            ("https://www.estrategiaconcursos.com.br/trilhas/x/aulas", UrlProblem::MissingCoursesSegment),
            ("https://www.estrategiaconcursos.com.br/cursos/x/videos", UrlProblem::MissingLessonsSuffix),
            ("not a url", UrlProblem::Unparsable),
        ];

        for (url, expected) in cases {
            match queue.add(url) {
                Err(QueueError::InvalidUrl { problem, .. }) => assert_eq!(problem, expected),
                other => panic!("expected InvalidUrl for {url}, got {other:?}"),
            }
        }

        assert!(queue.is_empty());
        assert!(!path.exists());
    }

    #[test]
    fn remove_by_exact_url() {
        let dir = tempdir().unwrap();
        let mut queue = CourseQueue::load(&dir.path().join("course-urls.json"));
        queue.add(VALID_URL).unwrap();

        assert!(queue.remove(VALID_URL).unwrap());
        assert!(!queue.remove(VALID_URL).unwrap());
        assert!(queue.is_empty());
    }

    #[test]
    fn get_all_returns_a_value_copy() {
        let dir = tempdir().unwrap();
        let mut queue = CourseQueue::load(&dir.path().join("course-urls.json"));
        queue.add(VALID_URL).unwrap();

        let mut copy = queue.get_all();
        copy.clear();
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn legacy_string_entries_are_migrated_and_persisted() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("course-urls.json");
        std::fs::write(
            &path,
            format!(r#"["{VALID_URL}", {{"url": "https://www.estrategiaconcursos.com.br/cursos/outro-curso-legal/aulas", "title": "Kept Title"}}]"#),
        )
        .unwrap();

        let queue = CourseQueue::load(&path);
        assert_eq!(queue.len(), 2);
        assert_eq!(queue.get_all()[0].title, "Curso De Rust Avancado");
        assert_eq!(queue.get_all()[1].title, "Kept Title");

        // The migrated form was written back: all entries are objects now.
        let written: Vec<Value> =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert!(written.iter().all(Value::is_object));
    }

    #[test]
    fn migrated_file_is_stable_on_second_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("course-urls.json");
        std::fs::write(&path, format!(r#"["{VALID_URL}"]"#)).unwrap();

        let first = CourseQueue::load(&path);
        let after_first = std::fs::read_to_string(&path).unwrap();

        let second = CourseQueue::load(&path);
        let after_second = std::fs::read_to_string(&path).unwrap();

        assert_eq!(first.get_all(), second.get_all());
        assert_eq!(after_first, after_second);
    }

    #[test]
    fn clear_empties_and_persists() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("course-urls.json");
        let mut queue = CourseQueue::load(&path);
        queue.add(VALID_URL).unwrap();

        queue.clear().unwrap();

        assert!(CourseQueue::load(&path).is_empty());
    }

    #[test]
    fn title_prefers_segment_before_lessons_marker() {
        assert_eq!(
            extract_title("https://www.estrategiaconcursos.com.br/cursos/direito-penal-pf-2024/aulas"),
            "Direito Penal Pf"
        );
    }

    #[test]
    fn title_falls_back_to_last_hyphenated_segment() {
        assert_eq!(
            extract_title("https://www.estrategiaconcursos.com.br/cursos/meu-curso-legal"),
            "Meu Curso Legal"
        );
    }

    #[test]
    fn title_strips_one_trailing_numeric_id() {
        assert_eq!(
            extract_title("https://x.estrategiaconcursos.com.br/cursos/curso-python-1234/aulas"),
            "Curso Python"
        );
    }

    #[test]
    fn title_uses_sentinel_when_nothing_matches() {
        assert_eq!(extract_title("https://host/a/b"), "Untitled Course");
    }

    #[test]
    fn corrupt_queue_file_starts_empty() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("course-urls.json");
        std::fs::write(&path, "{oops").unwrap();

        let queue = CourseQueue::load(&path);
        assert!(queue.is_empty());
    }
}
