use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of dispatch envelope a document travels in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EnvelopeType {
    /// `EnvioDTE`: invoices, notes, dispatch guides, exports.
    Dte,
    /// `EnvioBOLETA`: sales receipts.
    Boleta,
}

impl EnvelopeType {
    /// Root tag of the envelope payload; also the name shown in errors.
    pub fn root_tag(&self) -> &'static str {
        match self {
            EnvelopeType::Dte => "EnvioDTE",
            EnvelopeType::Boleta => "EnvioBOLETA",
        }
    }

    /// Documents allowed per envelope by the SII.
    pub fn default_capacity(&self) -> usize {
        match self {
            EnvelopeType::Dte => 2000,
            EnvelopeType::Boleta => 1000,
        }
    }
}

impl fmt::Display for EnvelopeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.root_tag())
    }
}

/// Tag wrapping the document body inside `<DTE>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum XmlTag {
    Documento,
    Liquidacion,
    Exportaciones,
}

impl XmlTag {
    pub fn name(&self) -> &'static str {
        match self {
            XmlTag::Documento => "Documento",
            XmlTag::Liquidacion => "Liquidacion",
            XmlTag::Exportaciones => "Exportaciones",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentType {
    pub code: u16,
    pub name: String,
    pub alias: Option<String>,
    pub xml_tag: XmlTag,
    pub envelope_type: EnvelopeType,
}

// (code, name, alias)
const CATALOG: &[(u16, &str, &str)] = &[
    (33, "Factura electrónica", "factura_afecta"),
    (34, "Factura no afecta o exenta electrónica", "factura_exenta"),
    (39, "Boleta electrónica", "boleta_afecta"),
    (41, "Boleta no afecta o exenta electrónica", "boleta_exenta"),
    (43, "Liquidación factura electrónica", "liquidacion_factura"),
    (46, "Factura de compra electrónica", "factura_compra"),
    (52, "Guía de despacho electrónica", "guia_despacho"),
    (56, "Nota de débito electrónica", "nota_debito"),
    (61, "Nota de crédito electrónica", "nota_credito"),
    (110, "Factura de exportación electrónica", "factura_exportacion"),
    (111, "Nota de débito de exportación electrónica", "nota_debito_exportacion"),
    (112, "Nota de crédito de exportación electrónica", "nota_credito_exportacion"),
];

impl DocumentType {
    pub fn new(code: u16, name: impl Into<String>, xml_tag: XmlTag, envelope_type: EnvelopeType) -> Self {
        Self {
            code,
            name: name.into(),
            alias: None,
            xml_tag,
            envelope_type,
        }
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    /// Looks up one of the SII's electronic document types.
    pub fn from_code(code: u16) -> Option<Self> {
        let (code, name, alias) = CATALOG.iter().find(|(c, _, _)| *c == code).copied()?;
        let xml_tag = match code {
            43 => XmlTag::Liquidacion,
            110..=112 => XmlTag::Exportaciones,
            _ => XmlTag::Documento,
        };
        let envelope_type = match code {
            39 | 41 => EnvelopeType::Boleta,
            _ => EnvelopeType::Dte,
        };
        Some(Self::new(code, name, xml_tag, envelope_type).with_alias(alias))
    }

    /// Every document type known to the catalog, by code.
    pub fn all() -> Vec<Self> {
        CATALOG.iter().filter_map(|(code, _, _)| Self::from_code(*code)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn receipts_travel_in_boleta_envelopes() {
        assert_eq!(DocumentType::from_code(39).unwrap().envelope_type, EnvelopeType::Boleta);
        assert_eq!(DocumentType::from_code(41).unwrap().envelope_type, EnvelopeType::Boleta);
        assert_eq!(DocumentType::from_code(33).unwrap().envelope_type, EnvelopeType::Dte);
    }

    #[test]
    fn export_and_settlement_tags() {
        assert_eq!(DocumentType::from_code(110).unwrap().xml_tag, XmlTag::Exportaciones);
        assert_eq!(DocumentType::from_code(43).unwrap().xml_tag, XmlTag::Liquidacion);
        assert_eq!(DocumentType::from_code(61).unwrap().xml_tag, XmlTag::Documento);
    }

    #[test]
    fn unknown_codes_are_absent() {
        assert!(DocumentType::from_code(0).is_none());
        assert!(DocumentType::from_code(999).is_none());
        assert_eq!(DocumentType::all().len(), 12);
    }
}
