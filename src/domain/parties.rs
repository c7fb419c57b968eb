use crate::config::Environment;
use crate::error::RutError;
use crate::rut::TaxpayerId;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Identity side of a digital certificate. Keys and signing live elsewhere;
/// the pipeline only needs to know who the holder is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Certificate {
    /// Taxpayer id of the holder, e.g. `11222333-4`.
    pub id: String,
    pub name: String,
}

impl Certificate {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// Authorization the SII grants a taxpayer to issue electronic documents.
/// A taxpayer holds one per environment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssuerAuthorization {
    pub resolution_date: NaiveDate,
    #[serde(default)]
    pub resolution_number: u32,
}

impl IssuerAuthorization {
    /// Certification resolutions are numbered 0; production ones are not.
    pub fn environment(&self) -> Environment {
        if self.resolution_number == 0 {
            Environment::Certification
        } else {
            Environment::Production
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issuer {
    pub rut: TaxpayerId,
    pub business_name: Option<String>,
    pub authorization: Option<IssuerAuthorization>,
}

impl Issuer {
    pub fn new(rut: TaxpayerId) -> Self {
        Self {
            rut,
            business_name: None,
            authorization: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipient {
    pub rut: TaxpayerId,
    pub business_name: Option<String>,
    pub address: Option<String>,
}

impl Recipient {
    /// Builds a recipient from a `{"rut": "...", "razon_social": "...",
    /// "direccion": "..."}` record, validating and splitting the RUT.
    pub fn from_value(data: &Value) -> Result<Self, RutError> {
        let raw_rut = data
            .get("rut")
            .and_then(Value::as_str)
            .ok_or_else(|| RutError::Malformed(String::new()))?;
        let text = |key: &str| data.get(key).and_then(Value::as_str).map(str::to_string);

        Ok(Self {
            rut: TaxpayerId::parse(raw_rut)?,
            business_name: text("razon_social"),
            address: text("direccion"),
        })
    }
}

/// Party authorized to send on behalf of the issuer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mandatary {
    pub rut: TaxpayerId,
    pub email: Option<String>,
}

/// Folio authorization (CAF): a range of sequence numbers the SII granted for
/// one document type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FolioAuthorization {
    pub issuer_id: String,
    pub document_type: u16,
    pub first_folio: u64,
    pub last_folio: u64,
}

impl FolioAuthorization {
    pub fn covers(&self, folio: u64) -> bool {
        (self.first_folio..=self.last_folio).contains(&folio)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn authorization_environment_follows_resolution_number() {
        let date = NaiveDate::from_ymd_opt(2014, 8, 22).unwrap();
        let cert = IssuerAuthorization { resolution_date: date, resolution_number: 0 };
        let prod = IssuerAuthorization { resolution_date: date, resolution_number: 80 };
        assert_eq!(cert.environment(), Environment::Certification);
        assert_eq!(prod.environment(), Environment::Production);
    }

    #[test]
    fn recipient_from_record_splits_rut() {
        let recipient = Recipient::from_value(&json!({
            "rut": "76.192.083-9",
            "razon_social": "Empresa de prueba",
        }))
        .unwrap();
        assert_eq!(recipient.rut.decompose(), ("76192083".to_string(), "9".to_string()));
        assert_eq!(recipient.business_name.as_deref(), Some("Empresa de prueba"));
        assert_eq!(recipient.address, None);
    }

    #[test]
    fn recipient_without_rut_is_rejected() {
        assert!(Recipient::from_value(&json!({ "razon_social": "x" })).is_err());
    }

    #[test]
    fn folio_range_is_inclusive() {
        let caf = FolioAuthorization {
            issuer_id: "76192083-9".to_string(),
            document_type: 33,
            first_folio: 1,
            last_folio: 100,
        };
        assert!(caf.covers(1));
        assert!(caf.covers(100));
        assert!(!caf.covers(101));
    }
}
