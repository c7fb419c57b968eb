use chrono::NaiveDate;
use dte_dispatch::domain::{
    Certificate, CoverSheet, DocumentBag, DocumentEnvelope, EnvelopeState, EnvelopeType, Issuer,
    IssuerAuthorization, Recipient, UniformCapacity,
};
use dte_dispatch::error::{EnvelopeError, ErrorKind};
use dte_dispatch::rut::TaxpayerId;
use serde_json::json;
use std::sync::Arc;

fn boleta(folio: u64) -> Arc<DocumentBag> {
    let mut bag = DocumentBag::from_normalized(json!({
        "Encabezado": {
            "IdDoc": { "TipoDTE": 39, "Folio": folio, "FchEmis": "2024-05-02" },
            "Emisor": { "RUTEmisor": "76192083-9", "RznSocEmisor": "Comercial Los Andes" },
            "Receptor": { "RUTRecep": "66666666-6" },
            "Totales": { "MntTotal": 2500 }
        },
        "Detalle": { "NroLinDet": 1, "NmbItem": "Pan amasado", "MontoItem": 2500 }
    }));
    bag.set_stamp(Some(json!({ "TED": { "@attributes": { "version": "1.0" }, "DD": { "F": folio } } })));
    Arc::new(bag)
}

fn issuer() -> Arc<Issuer> {
    let mut issuer = Issuer::new(TaxpayerId::parse("76.192.083-9").unwrap());
    issuer.business_name = Some("Comercial Los Andes".to_string());
    issuer.authorization = Some(IssuerAuthorization {
        resolution_date: NaiveDate::from_ymd_opt(2020, 1, 15).unwrap(),
        resolution_number: 80,
    });
    Arc::new(issuer)
}

#[test]
fn boleta_envelope_renders_full_set() {
    let mut envelope = DocumentEnvelope::new();
    envelope
        .set_issuer(Some(issuer()))
        .unwrap()
        .set_certificate(Some(Arc::new(Certificate::new("11111111-1", "Firmante"))))
        .unwrap()
        .set_recipient(Some(Arc::new(
            Recipient::from_value(&json!({ "rut": "66666666-6" })).unwrap(),
        )))
        .unwrap();
    envelope.add_documents((1..=3).map(boleta)).unwrap();

    assert_eq!(envelope.envelope_type(), Some(EnvelopeType::Boleta));
    assert_eq!(envelope.capacity(), Some(1000));

    let signed_at = NaiveDate::from_ymd_opt(2024, 5, 2).unwrap().and_hms_opt(12, 0, 0).unwrap();
    let cover_sheet = CoverSheet::for_envelope(&envelope, signed_at).unwrap();
    envelope.set_cover_sheet(cover_sheet).unwrap();

    let payload = envelope.build_payload().unwrap();
    let set = &payload["EnvioBOLETA"]["SetDTE"];
    assert_eq!(set["@attributes"]["ID"], json!("LibreDTE_SetDoc"));
    assert_eq!(set["Caratula"]["RutReceptor"], json!("66666666-6"));
    assert_eq!(set["Caratula"]["NroResol"], json!(80));
    assert_eq!(set["Caratula"]["SubTotDTE"], json!([{ "TpoDTE": 39, "NroDTE": 3 }]));
    assert_eq!(set["DTE"].as_array().unwrap().len(), 3);
    assert_eq!(
        set["DTE"][2]["Documento"]["@attributes"]["ID"],
        json!("LibreDTE_76192083-9_T39F3")
    );

    let xml = envelope.to_xml().unwrap();
    assert!(xml.as_str().starts_with("<EnvioBOLETA xmlns=\"http://www.sii.cl/SiiDte\" version=\"1.0\">"));
    assert_eq!(xml.query("//SetDTE/Caratula/SubTotDTE/NroDTE").as_deref(), Some("3"));
    assert_eq!(xml.query("//Documento/TED/DD/F").as_deref(), Some("1"));
    assert!(xml.save_xml().unwrap().starts_with(b"<?xml version=\"1.0\" encoding=\"ISO-8859-1\"?>\n<EnvioBOLETA"));
}

#[test]
fn one_bag_can_travel_in_several_envelopes() {
    let shared = boleta(10);
    let mut first = DocumentEnvelope::new();
    let mut second = DocumentEnvelope::new();
    first.add_document(shared.clone()).unwrap();
    second.add_document(shared.clone()).unwrap();

    assert!(Arc::ptr_eq(&first.documents()[0], &second.documents()[0]));
    assert_eq!(Arc::strong_count(&shared), 3);
}

#[test]
fn capacity_errors_leave_the_envelope_as_it_was() {
    let mut envelope = DocumentEnvelope::with_policy(Arc::new(UniformCapacity(2)));
    envelope.add_documents([boleta(1), boleta(2)]).unwrap();

    let err = envelope.add_documents([boleta(3)]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::EnvelopeConstraint);
    assert_eq!(
        err.to_string(),
        "Cannot add more documents to envelope EnvioBOLETA, the limit is 2 documents per envelope"
    );
    assert_eq!(envelope.state(), EnvelopeState::Accumulating);
    let folios: Vec<u64> = envelope.documents().iter().filter_map(|bag| bag.folio()).collect();
    assert_eq!(folios, vec![1, 2]);
}

#[test]
fn recertified_copy_can_be_sealed_again() {
    let mut envelope = DocumentEnvelope::new();
    envelope.set_issuer(Some(issuer())).unwrap();
    envelope
        .set_certificate(Some(Arc::new(Certificate::new("11111111-1", "Primero"))))
        .unwrap();
    envelope.add_document(boleta(1)).unwrap();

    let signed_at = NaiveDate::from_ymd_opt(2024, 5, 2).unwrap().and_hms_opt(8, 0, 0).unwrap();
    let sheet = CoverSheet::for_envelope(&envelope, signed_at).unwrap();
    envelope.set_cover_sheet(sheet).unwrap();
    assert_eq!(envelope.add_document(boleta(2)).unwrap_err(), EnvelopeError::Sealed);

    let mut copy = envelope.with_certificate(Arc::new(Certificate::new("66666666-6", "Segundo")));
    let sheet = CoverSheet::for_envelope(&copy, signed_at).unwrap();
    assert_eq!(sheet.sender_id, "66666666-6");
    copy.set_cover_sheet(sheet).unwrap();

    let payload = copy.build_payload().unwrap();
    assert_eq!(payload["EnvioBOLETA"]["SetDTE"]["Caratula"]["RutEnvia"], json!("66666666-6"));
    assert_eq!(
        envelope.build_payload().unwrap()["EnvioBOLETA"]["SetDTE"]["Caratula"]["RutEnvia"],
        json!("11111111-1")
    );
}
