//! Recommendation fetch adapter
//!
//! Sends a prediction result to a generative text endpoint and parses the
//! reply into sections. The adapter is supplementary: it never returns an
//! error, only a fallback text, so a failed call cannot invalidate a
//! prediction that is already shown.
//!
//! Prompts, section headers and fallback texts are Indonesian, the language
//! the application talks to its users in.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::config::RecommendationSettings;
use crate::models::{PredictionResult, RiskFactor, TrendResult};

/// Returned when the endpoint answers without any text
pub const EMPTY_RECOMMENDATION: &str = "Tidak ada rekomendasi yang dapat dihasilkan saat ini.";

/// Returned when the request fails for any reason
pub const FAILED_RECOMMENDATION: &str =
    "AI gagal memberikan rekomendasi. Silakan coba lagi nanti.";

/// Section headers the prompts ask the model to use
pub mod headers {
    pub const SUMMARY: &str = "Ringkasan AI:";
    pub const RISK_ANALYSIS: &str = "Faktor Risiko dan Dampaknya:";
    pub const TREND_ANALYSIS: &str = "Analisis Tren:";
    pub const RECOMMENDATIONS: &str = "Rekomendasi Utama:";
    pub const NOTE: &str = "Catatan:";
}

const PROMPT_PREAMBLE: &str =
    "Kamu adalah asisten medis AI untuk aplikasi kesehatan bernama Glucosense.";

/// Something a recommendation can be requested for
pub trait RecommendationPrompt {
    /// Short label for logs
    fn subject(&self) -> &'static str;

    /// Full prompt embedding the structured result
    fn prompt(&self) -> String;
}

fn factor_value(factor: &RiskFactor) -> String {
    match &factor.value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

impl RecommendationPrompt for PredictionResult {
    fn subject(&self) -> &'static str {
        "risk"
    }

    fn prompt(&self) -> String {
        let risk_text = self
            .risk_factors
            .iter()
            .enumerate()
            .map(|(i, f)| format!("{}. {}: {} ({})", i + 1, f.feature, factor_value(f), f.status))
            .collect::<Vec<_>>()
            .join("\n");

        let probability = self
            .probability
            .map(|p| format!("{}%", p))
            .unwrap_or_else(|| "-".to_string());

        format!(
            "{preamble}

Berikut hasil analisis pengguna:
- Hasil prediksi: {result}
- Probabilitas risiko: {probability}
- Faktor risiko utama:
{risk_text}

Tulis rekomendasi personal dan mudah dimengerti dalam format berikut (tanpa markdown atau tanda khusus):

{summary}
(satu paragraf singkat tentang kondisi pengguna)

{analysis}
- (faktor): (nilai dan dampak singkat)
- ...

{recommendations}
1. ...
2. ...
3. ...

{note}
(Tulis catatan seperti: \"Hasil ini bersifat prediksi dan tidak menggantikan diagnosis dokter.\")
",
            preamble = PROMPT_PREAMBLE,
            result = self.result,
            probability = probability,
            risk_text = risk_text,
            summary = headers::SUMMARY,
            analysis = headers::RISK_ANALYSIS,
            recommendations = headers::RECOMMENDATIONS,
            note = headers::NOTE,
        )
    }
}

impl RecommendationPrompt for TrendResult {
    fn subject(&self) -> &'static str {
        "trend"
    }

    fn prompt(&self) -> String {
        let daily = self
            .predictions
            .iter()
            .map(|p| p.to_string())
            .collect::<Vec<_>>()
            .join(", ");

        format!(
            "{preamble}

Berikut hasil prediksi tren kadar glukosa pengguna:
- Rata-rata prediksi 5 hari ke depan: {avg} mg/dL
- Pola tren: {direction}
- Nilai prediksi harian: {daily} mg/dL

Tulis analisis dan rekomendasi gaya hidup yang mudah dipahami, dalam bahasa Indonesia yang sopan, singkat, dan jelas.
Gunakan format berikut (tanpa markdown atau tanda khusus):

{summary}
(1 paragraf yang menjelaskan kondisi tren pengguna dan interpretasinya)

{analysis}
- Rata-rata kadar glukosa: ...
- Pola pergerakan: ...
- Risiko potensial: ...

{recommendations}
1. ...
2. ...
3. ...

{note}
(Tulis peringatan ringan bahwa hasil ini tidak menggantikan diagnosis dokter)
",
            preamble = PROMPT_PREAMBLE,
            avg = self.average_prediction,
            direction = self.direction().label(),
            daily = daily,
            summary = headers::SUMMARY,
            analysis = headers::TREND_ANALYSIS,
            recommendations = headers::RECOMMENDATIONS,
            note = headers::NOTE,
        )
    }
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    contents: [Content<'a>; 1],
}

#[derive(Serialize)]
struct Content<'a> {
    parts: [Part<'a>; 1],
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Default, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

impl GenerateResponse {
    /// `candidates[0].content.parts[0].text`, if non-empty
    fn first_text(self) -> Option<String> {
        self.candidates
            .into_iter()
            .next()?
            .content?
            .parts
            .into_iter()
            .next()?
            .text
            .filter(|t| !t.trim().is_empty())
    }
}

/// Client for the generative text endpoint
#[derive(Debug, Clone)]
pub struct RecommendationClient {
    http: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
}

impl RecommendationClient {
    pub fn new(settings: &RecommendationSettings, timeout: Duration) -> Self {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|e| {
                warn!(error = %e, "Falling back to default HTTP client for recommendations");
                reqwest::Client::new()
            });

        Self {
            http,
            endpoint: settings.endpoint.clone(),
            api_key: settings.api_key.clone(),
        }
    }

    /// Raw recommendation text, or a fallback string on any failure
    pub async fn fetch<P>(&self, subject: &P) -> String
    where
        P: RecommendationPrompt + ?Sized,
    {
        match self.request(&subject.prompt()).await {
            Ok(Some(text)) => {
                info!(subject = subject.subject(), chars = text.len(), "Recommendation received");
                text
            }
            Ok(None) => {
                warn!(subject = subject.subject(), "Recommendation reply had no text");
                EMPTY_RECOMMENDATION.to_string()
            }
            Err(e) => {
                error!(subject = subject.subject(), error = %e, "Recommendation request failed");
                FAILED_RECOMMENDATION.to_string()
            }
        }
    }

    /// Fetch and parse in one step
    pub async fn fetch_sections<P>(&self, subject: &P) -> RecommendationSections
    where
        P: RecommendationPrompt + ?Sized,
    {
        parse_recommendation(&self.fetch(subject).await)
    }

    async fn request(&self, prompt: &str) -> Result<Option<String>, String> {
        let key = self
            .api_key
            .as_deref()
            .ok_or_else(|| "no API key configured".to_string())?;

        let body = GenerateRequest {
            contents: [Content {
                parts: [Part { text: prompt }],
            }],
        };

        debug!(endpoint = %self.endpoint, "Requesting recommendation");

        let response = self
            .http
            .post(&self.endpoint)
            .query(&[("key", key)])
            .json(&body)
            .send()
            .await
            .map_err(|e| e.to_string())?;

        let status = response.status();
        if !status.is_success() {
            return Err(format!("endpoint answered {}", status));
        }

        let reply: GenerateResponse = response.json().await.map_err(|e| e.to_string())?;
        Ok(reply.first_text())
    }
}

/// Recommendation text split into its sections
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecommendationSections {
    pub summary: String,
    pub analysis: Vec<String>,
    pub recommendations: Vec<String>,
    pub note: String,
}

impl RecommendationSections {
    pub fn is_empty(&self) -> bool {
        self.summary.is_empty()
            && self.analysis.is_empty()
            && self.recommendations.is_empty()
            && self.note.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Section {
    Summary,
    Analysis,
    Recommendations,
    Note,
}

const SECTION_HEADERS: [(&str, Section); 5] = [
    (headers::SUMMARY, Section::Summary),
    (headers::RISK_ANALYSIS, Section::Analysis),
    (headers::TREND_ANALYSIS, Section::Analysis),
    (headers::RECOMMENDATIONS, Section::Recommendations),
    (headers::NOTE, Section::Note),
];

/// Strip decoration models like to add around headers (`**`, `#`)
fn undecorate(line: &str) -> &str {
    line.trim()
        .trim_start_matches(|c| c == '#' || c == '*')
        .trim_end_matches('*')
        .trim()
}

/// Match a known header; returns the section and any text after it
fn match_header(line: &str) -> Option<(Section, &str)> {
    let line = undecorate(line);
    SECTION_HEADERS.iter().find_map(|(header, section)| {
        line.strip_prefix(header)
            .map(|rest| (*section, undecorate(rest)))
    })
}

/// Drop a leading `-`, `•`, `*` or `1.` / `1)` list marker
fn strip_list_marker(line: &str) -> &str {
    let line = line.trim();

    for bullet in ["- ", "• ", "* "] {
        if let Some(rest) = line.strip_prefix(bullet) {
            return rest.trim();
        }
    }

    let digits = line.chars().take_while(|c| c.is_ascii_digit()).count();
    if digits > 0 {
        let rest = &line[digits..];
        if let Some(rest) = rest.strip_prefix('.').or_else(|| rest.strip_prefix(')')) {
            return rest.trim();
        }
    }

    line
}

/// Best-effort split of a recommendation reply into sections.
///
/// Lines are assigned to the most recent known header; lines before the
/// first header are ignored and missing sections stay empty. Never fails.
pub fn parse_recommendation(text: &str) -> RecommendationSections {
    let mut sections = RecommendationSections::default();
    let mut summary: Vec<&str> = Vec::new();
    let mut note: Vec<&str> = Vec::new();
    let mut active: Option<Section> = None;

    for raw in text.lines() {
        let (section, content) = match match_header(raw) {
            Some((section, rest)) => {
                active = Some(section);
                (section, rest)
            }
            None => match active {
                Some(section) => (section, raw.trim()),
                None => continue,
            },
        };

        if content.is_empty() {
            continue;
        }

        match section {
            Section::Summary => summary.push(content),
            Section::Note => note.push(content),
            Section::Analysis => sections.analysis.push(strip_list_marker(content).to_string()),
            Section::Recommendations => sections
                .recommendations
                .push(strip_list_marker(content).to_string()),
        }
    }

    sections.summary = summary.join(" ");
    sections.note = note.join(" ");
    sections
}
