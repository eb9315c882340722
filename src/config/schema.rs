// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Which media kind a run downloads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DownloadKind {
    #[default]
    Pdf,
    Video,
}

impl std::fmt::Display for DownloadKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DownloadKind::Pdf => f.write_str("pdf"),
            DownloadKind::Video => f.write_str("video"),
        }
    }
}

/// Settings for PDF downloads
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct PdfConfig {
    pub download_dir: PathBuf,
    pub pdf_variant: u32,
    pub download_video_extras_with_pdf: bool,
    /// Destination for extras fetched alongside PDFs. Falls back to
    /// `download_dir` when unset, so all materials for a course land together.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extras_download_dir: Option<PathBuf>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for PdfConfig {
    fn default() -> Self {
        Self {
            download_dir: default_download_dir("Estrategia_PDFs"),
            pdf_variant: 2,
            download_video_extras_with_pdf: false,
            extras_download_dir: None,
            extra: Map::new(),
        }
    }
}

/// Settings for video downloads
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct VideoConfig {
    pub download_dir: PathBuf,
    pub preferred_resolution: String,
    pub download_extras: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            download_dir: default_download_dir("Estrategia_Videos"),
            preferred_resolution: "720p".to_string(),
            download_extras: true,
            extra: Map::new(),
        }
    }
}

/// Top-level configuration schema, validated once at load.
///
/// Unknown keys at any level are preserved through the flattened maps so a
/// round-trip never drops what it does not understand.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    pub email: String,
    pub download_type: DownloadKind,
    pub headless: bool,
    pub pdf_config: PdfConfig,
    pub video_config: VideoConfig,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn default_download_dir(leaf: &str) -> PathBuf {
    dirs::download_dir()
        .or_else(|| dirs::home_dir().map(|h| h.join("Downloads")))
        .unwrap_or_else(|| PathBuf::from("."))
        .join(leaf)
}
