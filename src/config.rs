//! TOML configuration for the harvester.
//!
//! Every section is optional; missing keys fall back to defaults tuned for a
//! capped registry search page.
//!
//! ```toml
//! [target]
//! url = "https://kereso.enkk.hu/"
//! record_type = "Orvos/fogorvos"
//!
//! [explore]
//! alphabet = "abcdefghijklmnopqrstuvwxyz"
//! max_depth = 3
//! split_threshold = 100
//!
//! [artifacts]
//! enabled = true
//! extension = "pdf"
//! ```

use anyhow::{bail, Context, Result};
use regex::Regex;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub target: TargetConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub explore: ExploreConfig,
    #[serde(default)]
    pub unlock: UnlockConfig,
    #[serde(default)]
    pub artifacts: ArtifactConfig,
    #[serde(default)]
    pub vocabulary: VocabularyConfig,
    #[serde(default)]
    pub classifier: ClassifierConfig,
    #[serde(default)]
    pub webdriver: WebDriverConfig,
    #[serde(default)]
    pub page: PageConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TargetConfig {
    #[serde(default = "default_target_url")]
    pub url: String,
    /// Substring of the record-type option to select before searching.
    #[serde(default = "default_record_type")]
    pub record_type: Option<String>,
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            url: default_target_url(),
            record_type: default_record_type(),
        }
    }
}

fn default_target_url() -> String {
    "https://kereso.enkk.hu/".to_string()
}
fn default_record_type() -> Option<String> {
    Some("Orvos/fogorvos".to_string())
}

#[derive(Debug, Deserialize, Clone)]
pub struct OutputConfig {
    #[serde(default = "default_json_path")]
    pub json: PathBuf,
    #[serde(default = "default_csv_path")]
    pub csv: PathBuf,
    #[serde(default = "default_overflow_path")]
    pub overflow_json: PathBuf,
    #[serde(default = "default_artifact_dir")]
    pub artifact_dir: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            json: default_json_path(),
            csv: default_csv_path(),
            overflow_json: default_overflow_path(),
            artifact_dir: default_artifact_dir(),
        }
    }
}

fn default_json_path() -> PathBuf {
    PathBuf::from("data/records.json")
}
fn default_csv_path() -> PathBuf {
    PathBuf::from("data/records.csv")
}
fn default_overflow_path() -> PathBuf {
    PathBuf::from("data/overflow_terms.json")
}
fn default_artifact_dir() -> PathBuf {
    PathBuf::from("data/artifacts")
}

#[derive(Debug, Deserialize, Clone)]
pub struct ExploreConfig {
    #[serde(default = "default_alphabet")]
    pub alphabet: String,
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
    #[serde(default = "default_split_threshold")]
    pub split_threshold: usize,
    #[serde(default = "default_query_delay_ms")]
    pub query_delay_ms: u64,
    #[serde(default = "default_results_wait_ms")]
    pub results_wait_ms: u64,
    #[serde(default = "default_true")]
    pub allow_force_submit: bool,
}

impl Default for ExploreConfig {
    fn default() -> Self {
        Self {
            alphabet: default_alphabet(),
            max_depth: default_max_depth(),
            split_threshold: default_split_threshold(),
            query_delay_ms: default_query_delay_ms(),
            results_wait_ms: default_results_wait_ms(),
            allow_force_submit: true,
        }
    }
}

fn default_alphabet() -> String {
    "aábcdeéfghiíjklmnoóöőpqrstuúüűvwxyz".to_string()
}
fn default_max_depth() -> usize {
    3
}
fn default_split_threshold() -> usize {
    100
}
fn default_query_delay_ms() -> u64 {
    900
}
fn default_results_wait_ms() -> u64 {
    5000
}
fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize, Clone)]
pub struct UnlockConfig {
    #[serde(default = "default_auto_wait_ms")]
    pub auto_wait_ms: u64,
    #[serde(default = "default_true")]
    pub manual_assist: bool,
    #[serde(default = "default_manual_attempts")]
    pub manual_attempts: u32,
    #[serde(default = "default_manual_wait_ms")]
    pub manual_wait_ms: u64,
}

impl Default for UnlockConfig {
    fn default() -> Self {
        Self {
            auto_wait_ms: default_auto_wait_ms(),
            manual_assist: true,
            manual_attempts: default_manual_attempts(),
            manual_wait_ms: default_manual_wait_ms(),
        }
    }
}

fn default_auto_wait_ms() -> u64 {
    350
}
fn default_manual_attempts() -> u32 {
    3
}
fn default_manual_wait_ms() -> u64 {
    3000
}

#[derive(Debug, Deserialize, Clone)]
pub struct ArtifactConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_artifact_timeout_ms")]
    pub timeout_ms: u64,
    /// 0 means no cap.
    #[serde(default)]
    pub max_per_query: usize,
    #[serde(default)]
    pub render_fallback: bool,
    #[serde(default = "default_extension")]
    pub extension: String,
    /// Substring expected in the `Content-Type` of a target document.
    #[serde(default = "default_extension")]
    pub content_type_marker: String,
    /// Substrings that mark a URL or script literal as pointing at a document.
    #[serde(default = "default_link_markers")]
    pub link_markers: Vec<String>,
}

impl Default for ArtifactConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            timeout_ms: default_artifact_timeout_ms(),
            max_per_query: 0,
            render_fallback: false,
            extension: default_extension(),
            content_type_marker: default_extension(),
            link_markers: default_link_markers(),
        }
    }
}

fn default_artifact_timeout_ms() -> u64 {
    15000
}
fn default_extension() -> String {
    "pdf".to_string()
}
fn default_link_markers() -> Vec<String> {
    vec!["adatlap".into(), "pdf".into(), "print".into()]
}

#[derive(Debug, Deserialize, Clone)]
pub struct VocabularyConfig {
    #[serde(default = "default_identifier_markers")]
    pub identifier: Vec<String>,
    #[serde(default = "default_name_markers")]
    pub name: Vec<String>,
}

impl Default for VocabularyConfig {
    fn default() -> Self {
        Self {
            identifier: default_identifier_markers(),
            name: default_name_markers(),
        }
    }
}

fn default_identifier_markers() -> Vec<String> {
    [
        "nyilvantartasi",
        "nyilvántartási",
        "pecsetszam",
        "pecsétszám",
        "azonosito",
        "azonosító",
        "registration",
        "seal",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}
fn default_name_markers() -> Vec<String> {
    vec!["nev".into(), "név".into(), "name".into()]
}

#[derive(Debug, Deserialize, Clone)]
pub struct ClassifierConfig {
    #[serde(default = "default_detail_markers")]
    pub detail_markers: Vec<String>,
    #[serde(default = "default_listing_markers")]
    pub listing_markers: Vec<String>,
    /// CSS selectors whose presence is a weak hint that a view is a detail page.
    #[serde(default = "default_weak_visual_selectors")]
    pub weak_visual_selectors: Vec<String>,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            detail_markers: default_detail_markers(),
            listing_markers: default_listing_markers(),
            weak_visual_selectors: default_weak_visual_selectors(),
        }
    }
}

fn default_detail_markers() -> Vec<String> {
    vec![
        "adatlapja".into(),
        "alapnyilvántartási adatok".into(),
        "egészségügyi tevékenység során használt név".into(),
    ]
}
fn default_listing_markers() -> Vec<String> {
    vec![
        "tisztelt ügyfelünk".into(),
        "zárva, húzza el a csúszkát".into(),
        "név típusa".into(),
    ]
}
fn default_weak_visual_selectors() -> Vec<String> {
    vec!["img[src*='print']".into(), "img[src*='printer']".into()]
}

#[derive(Debug, Deserialize, Clone)]
pub struct WebDriverConfig {
    #[serde(default = "default_webdriver_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_browser")]
    pub browser: String,
    #[serde(default)]
    pub headless: bool,
    #[serde(default = "default_download_dir")]
    pub download_dir: PathBuf,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for WebDriverConfig {
    fn default() -> Self {
        Self {
            endpoint: default_webdriver_endpoint(),
            browser: default_browser(),
            headless: false,
            download_dir: default_download_dir(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

fn default_webdriver_endpoint() -> String {
    "http://localhost:9515".to_string()
}
fn default_browser() -> String {
    "chrome".to_string()
}
fn default_download_dir() -> PathBuf {
    PathBuf::from("data/.downloads")
}
fn default_request_timeout_secs() -> u64 {
    60
}

/// Selectors and text markers describing the search page itself.
#[derive(Debug, Deserialize, Clone)]
pub struct PageConfig {
    #[serde(default = "default_search_input_selectors")]
    pub search_input_selectors: Vec<String>,
    #[serde(default = "default_search_button_selectors")]
    pub search_button_selectors: Vec<String>,
    #[serde(default = "default_slider_selectors")]
    pub slider_selectors: Vec<String>,
    #[serde(default = "default_print_control_selectors")]
    pub print_control_selectors: Vec<String>,
    /// Case-insensitive label fragments of text-only print links and buttons.
    #[serde(default = "default_print_control_texts")]
    pub print_control_texts: Vec<String>,
    /// Markers identifying the detail control inside a listing row.
    #[serde(default = "default_detail_control_markers")]
    pub detail_control_markers: Vec<String>,
    #[serde(default = "default_no_results_markers")]
    pub no_results_markers: Vec<String>,
    /// Regexes with one capture group holding the reported total.
    #[serde(default = "default_total_patterns")]
    pub total_patterns: Vec<String>,
}

impl Default for PageConfig {
    fn default() -> Self {
        Self {
            search_input_selectors: default_search_input_selectors(),
            search_button_selectors: default_search_button_selectors(),
            slider_selectors: default_slider_selectors(),
            print_control_selectors: default_print_control_selectors(),
            print_control_texts: default_print_control_texts(),
            detail_control_markers: default_detail_control_markers(),
            no_results_markers: default_no_results_markers(),
            total_patterns: default_total_patterns(),
        }
    }
}

fn default_search_input_selectors() -> Vec<String> {
    vec![
        "input[name*='nev' i]".into(),
        "input[id*='nev' i]".into(),
        "input[placeholder*='Név' i]".into(),
        "input[type='text']".into(),
    ]
}
fn default_search_button_selectors() -> Vec<String> {
    vec![
        "input[type='submit'][value*='Keres']".into(),
        "input[type='button'][value*='Keres']".into(),
        "button[type='submit']".into(),
    ]
}
fn default_slider_selectors() -> Vec<String> {
    vec![
        ".ui-slider-handle".into(),
        ".slider-handle".into(),
        "[role='slider']".into(),
        ".noUi-handle".into(),
    ]
}
fn default_print_control_selectors() -> Vec<String> {
    vec![
        "a img[src*='print']".into(),
        "a img[src*='printer']".into(),
        "img[src*='print']".into(),
        "img[src*='printer']".into(),
    ]
}
fn default_print_control_texts() -> Vec<String> {
    vec!["nyomtat".into()]
}
fn default_detail_control_markers() -> Vec<String> {
    vec![
        "adatlap".into(),
        "megtekint".into(),
        "pdf".into(),
        "print".into(),
    ]
}
fn default_no_results_markers() -> Vec<String> {
    vec!["nincs talalat".into(), "nincs találat".into()]
}
fn default_total_patterns() -> Vec<String> {
    vec![
        r"(?i)tal[aá]latok\s*sz[aá]ma\s*:?\s*(\d+)".into(),
        r"(?i)(\d+)\s*tal[aá]lat".into(),
    ]
}

impl Config {
    /// All-defaults configuration, used when no file is available.
    pub fn minimal() -> Self {
        Self::default()
    }

    /// De-duplicated alphabet, first occurrence wins.
    pub fn alphabet(&self) -> Vec<char> {
        let mut seen = Vec::new();
        for c in self.explore.alphabet.chars() {
            if !c.is_whitespace() && !seen.contains(&c) {
                seen.push(c);
            }
        }
        seen
    }

    pub fn query_delay(&self) -> Duration {
        Duration::from_millis(self.explore.query_delay_ms)
    }

    pub fn results_wait(&self) -> Duration {
        Duration::from_millis(self.explore.results_wait_ms)
    }

    pub fn artifact_timeout(&self) -> Duration {
        Duration::from_millis(self.artifacts.timeout_ms)
    }

    /// Checks invariants that serde cannot express.
    pub fn validate(&self) -> Result<()> {
        if self.alphabet().is_empty() {
            bail!("explore.alphabet must contain at least one character");
        }
        if self.explore.max_depth < 1 {
            bail!("explore.max_depth must be >= 1");
        }
        if self.explore.split_threshold < 1 {
            bail!("explore.split_threshold must be >= 1");
        }
        if self.artifacts.extension.trim().is_empty() {
            bail!("artifacts.extension must not be empty");
        }
        url::Url::parse(&self.target.url)
            .with_context(|| format!("target.url is not a valid URL: {}", self.target.url))?;
        for pattern in &self.page.total_patterns {
            let re = Regex::new(pattern)
                .with_context(|| format!("page.total_patterns: invalid regex '{}'", pattern))?;
            if re.captures_len() < 2 {
                bail!(
                    "page.total_patterns: '{}' needs a capture group for the count",
                    pattern
                );
            }
        }
        Ok(())
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    config.validate()?;

    Ok(config)
}

/// Writes [`EXAMPLE_CONFIG`] to `path`. Refuses to overwrite.
pub fn scaffold_config(path: &Path) -> Result<()> {
    if path.exists() {
        bail!("Config file already exists: {}", path.display());
    }
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    std::fs::write(path, EXAMPLE_CONFIG)
        .with_context(|| format!("Failed to write config file: {}", path.display()))?;
    Ok(())
}

/// Example configuration written by `harvest init`.
pub const EXAMPLE_CONFIG: &str = r#"# cap-harvest configuration

[target]
url = "https://kereso.enkk.hu/"
record_type = "Orvos/fogorvos"

[output]
json = "data/records.json"
csv = "data/records.csv"
overflow_json = "data/overflow_terms.json"
artifact_dir = "data/artifacts"

[explore]
alphabet = "aábcdeéfghiíjklmnoóöőpqrstuúüűvwxyz"
max_depth = 3
split_threshold = 100
query_delay_ms = 900
results_wait_ms = 5000
allow_force_submit = true

[unlock]
auto_wait_ms = 350
manual_assist = true
manual_attempts = 3
manual_wait_ms = 3000

[artifacts]
enabled = false
timeout_ms = 15000
max_per_query = 0
render_fallback = false
extension = "pdf"

[webdriver]
endpoint = "http://localhost:9515"
browser = "chrome"
headless = false
download_dir = "data/.downloads"

[page]
print_control_texts = ["nyomtat"]
"#;
