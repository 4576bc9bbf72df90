use bytes::Bytes;
use flate2::Compression;
use flate2::write::GzEncoder;
use http::Request;
use http_body_util::Full;
use micro_body::{BodyParser, DefaultMediaType, ParserConfig};
use serde::Deserialize;
use std::io::Write;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Deserialize, Debug)]
pub struct User {
    name: String,
    zip: String,
}

fn request(content_type: &str, content_encoding: &str, body: Vec<u8>) -> Request<Full<Bytes>> {
    Request::post("/users")
        .header(http::header::CONTENT_TYPE, content_type)
        .header(http::header::CONTENT_ENCODING, content_encoding)
        .header(http::header::CONTENT_LENGTH, body.len())
        .body(Full::new(Bytes::from(body)))
        .unwrap()
}

#[tokio::main]
async fn main() {
    let subscriber = FmtSubscriber::builder().with_max_level(Level::DEBUG).finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    let parser = BodyParser::builder()
        .limit("1kb")
        .parser(ParserConfig::for_type("application/json").inflate(true))
        .parser(DefaultMediaType::UrlEncoded)
        .build()
        .unwrap();

    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(br#"{"name":"hello","zip":"world"}"#).unwrap();
    let compressed = encoder.finish().unwrap();

    let requests = vec![
        request("application/json", "gzip", compressed),
        request("application/x-www-form-urlencoded", "identity", b"name=hello&zip=world".to_vec()),
        request("application/json; charset=koi8-r", "identity", b"{}".to_vec()),
        request("application/json", "identity", vec![b' '; 2048]),
    ];

    for request in requests {
        match parser.apply(request).await {
            Ok(request) => match request.body().as_ref().map(|body| body.deserialize::<User>()) {
                Some(Ok(user)) => info!(?user, "receive user"),
                Some(Err(e)) => error!(cause = %e, "unexpected body"),
                None => info!("receive no body"),
            },
            Err(e) => error!(status = %e.status(), kind = e.type_tag(), cause = %e, "reject request"),
        }
    }
}
