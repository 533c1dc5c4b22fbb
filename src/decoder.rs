use std::time::Duration;

use lazy_static::lazy_static;
use regex::Regex;
use reqwest::blocking::{Client as HttpClient, Response};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_API_URL: &str = "http://127.0.0.1:8000";

const GENERIC_FAILURE: &str = "Error al decodificar";

const METAR_MIN_LEN: usize = 8;
const METAR_MAX_LEN: usize = 512;

#[derive(Error, Debug)]
pub enum Error {
    #[error("El METAR está vacío.")]
    Empty,

    #[error("El METAR debe tener entre 8 y 512 caracteres.")]
    InvalidLength,

    #[error("El METAR contiene caracteres no válidos.")]
    InvalidCharacters,

    #[error("No se pudo conectar con el backend en {url}. Verifica que esté activo.")]
    Unreachable {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The service answered but refused the report.
    #[error("{0}")]
    Rejected(String),

    #[error("Respuesta del backend no válida: {0}")]
    Payload(#[source] reqwest::Error),

    #[error("No se pudo crear el cliente HTTP: {0}")]
    Client(#[from] reqwest::Error),
}

pub mod report {
    use super::*;

    #[derive(Deserialize, Debug, Default, Clone)]
    #[serde(default)]
    pub struct Report {
        pub raw: String,
        pub station: Option<String>,
        pub airport_name: Option<String>,
        pub datetime: Option<String>,
        pub auto_report: bool,
        pub wind: Wind,
        pub visibility: Visibility,
        pub weather: Vec<String>,
        pub recent_weather: Vec<String>,
        pub clouds: Vec<String>,
        pub temperature: Temperature,
        pub qnh: Option<String>,
        pub qnh_text: Option<String>,
        pub rvr: Vec<String>,
        pub remarks: Option<String>,
        pub trends: Vec<String>,
        pub unavailable_groups: Vec<String>,
        pub report_text: Option<String>,
    }

    #[derive(Deserialize, Debug, Default, Clone)]
    #[serde(default)]
    pub struct Wind {
        pub direction: Option<String>,
        pub speed: Option<String>,
        pub gusts: Option<String>,
        pub variation: Option<String>,

        #[serde(deserialize_with = "lenient_degrees")]
        pub degrees: Option<f64>,

        pub text: Option<String>,
    }

    #[derive(Deserialize, Debug, Default, Clone)]
    #[serde(default)]
    pub struct Visibility {
        pub main: Option<String>,
        pub minimum: Option<String>,
        pub vertical: Option<String>,
        pub text: Option<String>,
    }

    #[derive(Deserialize, Debug, Default, Clone)]
    #[serde(default)]
    pub struct Temperature {
        pub air: Option<String>,
        pub dewpoint: Option<String>,
        pub text: Option<String>,
    }

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Degrees {
        Number(f64),
        Text(String),
    }

    /// Accepts a number or a string that starts with an integer (`"210"`, `"210°"`).
    fn lenient_degrees<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        lazy_static! {
            static ref LEADING_INT: Regex = Regex::new(r"^\s*([+-]?\d+)").unwrap();
        }

        Ok(match Option::<Degrees>::deserialize(deserializer)? {
            Some(Degrees::Number(n)) => Some(n),
            Some(Degrees::Text(s)) => LEADING_INT
                .captures(&s)
                .and_then(|c| c[1].parse::<f64>().ok()),
            None => None,
        })
    }
}

pub use report::{Report, Temperature, Visibility, Wind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiStatus {
    Checking,
    Online,
    Offline,
}

impl ApiStatus {
    pub fn label(&self) -> &'static str {
        match self {
            ApiStatus::Checking => "checking",
            ApiStatus::Online => "online",
            ApiStatus::Offline => "offline",
        }
    }
}

/// Trimmed report text, if it is something the service could accept.
pub fn validate(metar: &str) -> Result<&str, Error> {
    lazy_static! {
        static ref ALLOWED: Regex = Regex::new(r"^[A-Za-z0-9\s/+=\-.]+$").unwrap();
    }

    let cleaned = metar.trim();
    if cleaned.is_empty() {
        return Err(Error::Empty);
    }
    let len = cleaned.chars().count();
    if !(METAR_MIN_LEN..=METAR_MAX_LEN).contains(&len) {
        return Err(Error::InvalidLength);
    }
    if !ALLOWED.is_match(cleaned) {
        return Err(Error::InvalidCharacters);
    }
    Ok(cleaned)
}

#[derive(Serialize)]
struct DecodeRequest<'a> {
    metar: &'a str,
}

#[derive(Deserialize)]
struct FailureBody {
    detail: Option<serde_json::Value>,
}

impl FailureBody {
    /// `detail` is a plain string for rejected reports and a list of `{msg, ..}` objects for
    /// request validation failures.
    fn message(self) -> Option<String> {
        match self.detail? {
            serde_json::Value::String(s) if !s.trim().is_empty() => Some(s),
            serde_json::Value::Array(items) => items
                .into_iter()
                .find_map(|item| item.get("msg")?.as_str().map(str::to_string)),
            _ => None,
        }
    }
}

pub struct Client {
    base_url: String,
    http: HttpClient,
}

impl Client {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, Error> {
        let http = HttpClient::builder()
            .user_agent("metar-stall")
            .timeout(timeout)
            .build()?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn health(&self) -> ApiStatus {
        let url = format!("{}/health", self.base_url);
        let status = match self.http.get(&url).send() {
            Ok(res) if res.status().is_success() => ApiStatus::Online,
            Ok(res) => {
                tracing::warn!(status = %res.status(), "health probe failed");
                ApiStatus::Offline
            }
            Err(err) => {
                tracing::warn!(error = %err, "health probe unreachable");
                ApiStatus::Offline
            }
        };
        tracing::info!(url = %url, status = status.label(), "checked decoder health");
        status
    }

    pub fn decode(&self, metar: &str) -> Result<Report, Error> {
        let metar = validate(metar)?;
        let url = format!("{}/decode", self.base_url);
        tracing::info!(metar, "decoding report");

        let res = self
            .http
            .post(&url)
            .json(&DecodeRequest { metar })
            .send()
            .map_err(|source| self.unreachable(source))?;

        if !res.status().is_success() {
            let message = failure_message(res);
            tracing::warn!(%message, "decode rejected");
            return Err(Error::Rejected(message));
        }

        res.json().map_err(Error::Payload)
    }

    fn unreachable(&self, source: reqwest::Error) -> Error {
        tracing::warn!(error = %source, "decoder unreachable");
        Error::Unreachable {
            url: self.base_url.clone(),
            source,
        }
    }
}

fn failure_message(res: Response) -> String {
    res.json::<FailureBody>()
        .ok()
        .and_then(FailureBody::message)
        .unwrap_or_else(|| GENERIC_FAILURE.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate() {
        assert_eq!(
            validate("  METAR LEVC 121430Z 12005KT CAVOK 18/12 Q1015=  ").unwrap(),
            "METAR LEVC 121430Z 12005KT CAVOK 18/12 Q1015="
        );
        assert!(matches!(validate("   "), Err(Error::Empty)));
        assert!(matches!(validate("LEVC"), Err(Error::InvalidLength)));
        assert!(matches!(
            validate(&"A".repeat(513)),
            Err(Error::InvalidLength)
        ));
        assert!(matches!(
            validate("METAR LEVC 121430Z 12005KT CAVOK 18/12 Q1015= 💥"),
            Err(Error::InvalidCharacters)
        ));
    }

    #[test]
    fn test_error_messages() {
        assert_eq!(Error::Empty.to_string(), "El METAR está vacío.");
        assert_eq!(
            Error::InvalidLength.to_string(),
            "El METAR debe tener entre 8 y 512 caracteres."
        );
        assert_eq!(Error::Rejected("x".into()).to_string(), "x");
    }

    #[test]
    fn test_report_deserialize() {
        let report: Report = serde_json::from_str(
            r#"{
                "raw": "METAR LEBL 121400Z 02010KT 5000 -RA BR BKN010 10/09 Q1008 NOSIG=",
                "station": "LEBL",
                "airport_name": "Barcelona-El Prat",
                "auto_report": false,
                "wind": {"direction": "20° (norte)", "speed": "10 kt", "degrees": 20},
                "visibility": {"main": "5000 m", "text": "Visibilidad de 5 kilómetros"},
                "weather": ["lluvia ligera", "neblina"],
                "clouds": ["Parcialmente cubierto (5 a 7 octas) a 1000 pies"],
                "temperature": {"air": "10ºC", "dewpoint": "9ºC"},
                "qnh": "1008 hPa",
                "trends": ["Sin cambios significativos (NOSIG)"],
                "report_text": "Informe METAR decodificado para Barcelona-El Prat (LEBL). Viento."
            }"#,
        )
        .unwrap();

        assert_eq!(report.station.as_deref(), Some("LEBL"));
        assert_eq!(report.wind.degrees, Some(20.0));
        assert_eq!(report.visibility.main.as_deref(), Some("5000 m"));
        assert_eq!(report.weather.len(), 2);
        assert!(report.recent_weather.is_empty());
        assert!(report.remarks.is_none());
        assert_eq!(report.temperature.dewpoint.as_deref(), Some("9ºC"));
    }

    #[test]
    fn test_degrees_are_lenient() {
        let wind: Wind = serde_json::from_str(r#"{"degrees": "210°"}"#).unwrap();
        assert_eq!(wind.degrees, Some(210.0));
        let wind: Wind = serde_json::from_str(r#"{"degrees": null}"#).unwrap();
        assert_eq!(wind.degrees, None);
        let wind: Wind = serde_json::from_str(r#"{"degrees": "VRB"}"#).unwrap();
        assert_eq!(wind.degrees, None);
        let wind: Wind = serde_json::from_str(r#"{"direction": "Variable"}"#).unwrap();
        assert_eq!(wind.degrees, None);
    }

    #[test]
    fn test_failure_detail() {
        let body: FailureBody =
            serde_json::from_str(r#"{"detail": "Formato METAR inválido"}"#).unwrap();
        assert_eq!(body.message().as_deref(), Some("Formato METAR inválido"));

        let body: FailureBody = serde_json::from_str(
            r#"{"detail": [{"loc": ["body", "metar"], "msg": "Value error, El METAR contiene caracteres no válidos."}]}"#,
        )
        .unwrap();
        assert_eq!(
            body.message().as_deref(),
            Some("Value error, El METAR contiene caracteres no válidos.")
        );

        let body: FailureBody = serde_json::from_str(r#"{"detail": 42}"#).unwrap();
        assert_eq!(body.message(), None);
        let body: FailureBody = serde_json::from_str("{}").unwrap();
        assert_eq!(body.message(), None);
    }

    #[test]
    fn test_base_url_trimmed() {
        let client = Client::new("http://localhost:8000/", Duration::from_secs(1)).unwrap();
        assert_eq!(client.base_url(), "http://localhost:8000");
    }
}
