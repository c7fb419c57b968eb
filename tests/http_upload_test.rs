use axum::extract::{Multipart, State};
use axum::http::HeaderMap;
use axum::routing::post;
use axum::Router;
use dte_dispatch::app::SubmissionClient;
use dte_dispatch::config::ConnectionConfig;
use dte_dispatch::domain::Certificate;
use dte_dispatch::infra::http_client::ReqwestUploader;
use dte_dispatch::infra::temp_storage::SystemTempStorage;
use dte_dispatch::infra::token::StaticTokenManager;
use dte_dispatch::xml::XmlDocument;
use std::collections::HashMap;
use std::net::{SocketAddr, TcpListener};
use std::sync::Arc;
use tokio::sync::Mutex;

#[derive(Debug, Clone, Default)]
struct Captured {
    headers: HashMap<String, String>,
    fields: HashMap<String, String>,
    file_name: Option<String>,
    content_type: Option<String>,
    file: Vec<u8>,
}

type Shared = Arc<Mutex<Vec<Captured>>>;

async fn upload(State(seen): State<(Shared, Vec<u8>)>, headers: HeaderMap, mut multipart: Multipart) -> Vec<u8> {
    let (captured, reply) = seen;
    let mut request = Captured::default();
    for name in ["cookie", "user-agent", "referer"] {
        if let Some(value) = headers.get(name).and_then(|v| v.to_str().ok()) {
            request.headers.insert(name.to_string(), value.to_string());
        }
    }

    while let Some(field) = multipart.next_field().await.unwrap() {
        let name = field.name().unwrap_or_default().to_string();
        if name == "archivo" {
            request.file_name = field.file_name().map(str::to_string);
            request.content_type = field.content_type().map(str::to_string);
            request.file = field.bytes().await.unwrap().to_vec();
        } else {
            request.fields.insert(name, field.text().await.unwrap());
        }
    }

    captured.lock().await.push(request);
    reply
}

/// Serves `/cgi_dte/UPL/DTEUpload` on an ephemeral port, answering `reply`.
fn spawn_service(reply: Vec<u8>) -> (SocketAddr, Shared) {
    let captured: Shared = Arc::new(Mutex::new(Vec::new()));
    let app = Router::new()
        .route("/cgi_dte/UPL/DTEUpload", post(upload))
        .with_state((captured.clone(), reply));

    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    let server = axum::Server::from_tcp(listener).unwrap().serve(app.into_make_service());
    tokio::spawn(server);
    (addr, captured)
}

fn client(addr: SocketAddr, dir: &std::path::Path) -> SubmissionClient {
    let config = ConnectionConfig {
        base_url: Some(format!("http://{}", addr)),
        timeout_seconds: 5,
        ..ConnectionConfig::default()
    };
    let transport = ReqwestUploader::new(&config).unwrap();
    SubmissionClient::new(
        Arc::new(Certificate::new("11111111-1", "Firmante de prueba")),
        config,
        Arc::new(StaticTokenManager::new("SIITOKEN42")),
        Arc::new(transport),
    )
    .with_storage(Arc::new(SystemTempStorage::in_dir(dir)))
}

fn envelope() -> XmlDocument {
    XmlDocument::parse("<EnvioDTE version=\"1.0\"><SetDTE ID=\"LibreDTE_SetDoc\"><Glosa>Año</Glosa></SetDTE></EnvioDTE>")
        .unwrap()
}

#[tokio::test]
async fn multipart_upload_matches_the_wire_contract() {
    let (addr, captured) = spawn_service(
        b"<RECEPCIONDTE><STATUS>0</STATUS><TRACKID>99887766</TRACKID></RECEPCIONDTE>".to_vec(),
    );
    let dir = tempfile::tempdir().unwrap();

    let track_id = client(addr, dir.path())
        .submit(&envelope(), "76192083-9", false, Some(2))
        .await
        .unwrap();
    assert_eq!(track_id.value(), 99887766);

    let requests = captured.lock().await;
    assert_eq!(requests.len(), 1);
    let request = &requests[0];

    assert_eq!(request.headers["cookie"], "TOKEN=SIITOKEN42");
    assert_eq!(request.headers["user-agent"], "Mozilla/4.0 (compatible; PROG 1.0; LibreDTE)");
    assert_eq!(request.headers["referer"], "https://www.libredte.cl");

    assert_eq!(request.fields["rutSender"], "11111111");
    assert_eq!(request.fields["dvSender"], "1");
    assert_eq!(request.fields["rutCompany"], "76192083");
    assert_eq!(request.fields["dvCompany"], "9");

    let file_name = request.file_name.clone().unwrap();
    assert!(file_name.starts_with("76192083-9_libredte_xml_document_for_upload_to_sii_"));
    assert!(file_name.ends_with(".xml"));
    assert_eq!(request.content_type.as_deref(), Some("application/xml"));

    let mut expected = b"<?xml version=\"1.0\" encoding=\"ISO-8859-1\"?>\n".to_vec();
    expected.extend_from_slice(b"<EnvioDTE version=\"1.0\"><SetDTE ID=\"LibreDTE_SetDoc\"><Glosa>A\xF1o</Glosa></SetDTE></EnvioDTE>");
    assert_eq!(request.file, expected);

    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn gzip_upload_is_labelled_as_gzip() {
    let (addr, captured) = spawn_service(b"<RECEPCIONDTE><STATUS>0</STATUS></RECEPCIONDTE>".to_vec());
    let dir = tempfile::tempdir().unwrap();

    let track_id = client(addr, dir.path())
        .submit(&envelope(), "76192083-9", true, Some(1))
        .await
        .unwrap();
    assert!(track_id.is_absent());

    let requests = captured.lock().await;
    assert_eq!(requests[0].content_type.as_deref(), Some("application/gzip"));
    assert!(requests[0].file_name.as_deref().unwrap().ends_with(".xml.gz"));
    assert_eq!(&requests[0].file[..2], &[0x1f, 0x8b]);
}

#[tokio::test]
async fn latin1_rejection_details_are_decoded() {
    let (addr, _captured) = spawn_service(
        b"<?xml version=\"1.0\" encoding=\"ISO-8859-1\"?>\n<RECEPCIONDTE><STATUS>7</STATUS><DETAIL><ERROR>Elemento 'A\xF1o' no esperado</ERROR></DETAIL></RECEPCIONDTE>".to_vec(),
    );
    let dir = tempfile::tempdir().unwrap();

    let err = client(addr, dir.path())
        .submit(&envelope(), "76192083-9", false, Some(1))
        .await
        .unwrap_err();
    assert_eq!(err.status(), Some(7));
    assert!(err.to_string().ends_with("Elemento 'Año' no esperado"));
}

#[tokio::test]
async fn unreachable_service_is_a_transport_error() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    let dir = tempfile::tempdir().unwrap();

    let err = client(addr, dir.path())
        .submit(&envelope(), "76192083-9", false, Some(1))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), dte_dispatch::error::ErrorKind::Transport);
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}
