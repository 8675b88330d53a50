//! Programmatic access points declared by resources.

use super::identifier::ResourceId;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

static HTTP_URL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^https?://\S+$").expect("http url regex must compile"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum WebServiceKind {
    Soap,
    Rest,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebService {
    pub resource_id: ResourceId,
    pub kind: WebServiceKind,
    pub endpoint: String,
    #[serde(default)]
    pub description: String,
    /// Service description document, expected for SOAP services.
    #[serde(default)]
    pub wsdl: Option<String>,
    #[serde(default)]
    pub documentation: Option<String>,
    #[serde(default)]
    pub organisation: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebServiceValidationError {
    InvalidEndpoint(String),
    MissingWsdl,
    InvalidDocumentUrl(String),
}

impl Display for WebServiceValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidEndpoint(value) => write!(f, "endpoint must be an http(s) URL: {value}"),
            Self::MissingWsdl => write!(f, "SOAP services must declare a WSDL"),
            Self::InvalidDocumentUrl(value) => {
                write!(f, "document link must be an http(s) URL: {value}")
            }
        }
    }
}

impl Error for WebServiceValidationError {}

impl WebService {
    pub fn validate(&self) -> Result<(), WebServiceValidationError> {
        if !HTTP_URL.is_match(self.endpoint.trim()) {
            return Err(WebServiceValidationError::InvalidEndpoint(
                self.endpoint.clone(),
            ));
        }
        match (&self.kind, self.wsdl.as_deref()) {
            (WebServiceKind::Soap, None) => return Err(WebServiceValidationError::MissingWsdl),
            (_, Some(wsdl)) if !HTTP_URL.is_match(wsdl.trim()) => {
                return Err(WebServiceValidationError::InvalidDocumentUrl(
                    wsdl.to_string(),
                ))
            }
            _ => {}
        }
        if let Some(doc) = self.documentation.as_deref() {
            if !HTTP_URL.is_match(doc.trim()) {
                return Err(WebServiceValidationError::InvalidDocumentUrl(
                    doc.to_string(),
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{WebService, WebServiceKind, WebServiceValidationError};

    fn rest() -> WebService {
        WebService {
            resource_id: "MIR:00100001".into(),
            kind: WebServiceKind::Rest,
            endpoint: "https://api.example.org/v1".into(),
            description: String::new(),
            wsdl: None,
            documentation: Some("https://example.org/docs".into()),
            organisation: None,
            location: None,
        }
    }

    #[test]
    fn rest_service_needs_http_endpoint() {
        assert_eq!(rest().validate(), Ok(()));
        let mut service = rest();
        service.endpoint = "ftp://example.org".into();
        assert!(matches!(
            service.validate(),
            Err(WebServiceValidationError::InvalidEndpoint(_))
        ));
    }

    #[test]
    fn soap_service_needs_wsdl() {
        let mut service = rest();
        service.kind = WebServiceKind::Soap;
        assert_eq!(service.validate(), Err(WebServiceValidationError::MissingWsdl));
        service.wsdl = Some("https://api.example.org/v1?wsdl".into());
        assert_eq!(service.validate(), Ok(()));
    }
}
