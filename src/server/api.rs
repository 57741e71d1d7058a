use crate::cli::Args;
use crate::llm::{ AspectRatio, BotOption, BOTS };
use std::error::Error;
use std::net::SocketAddr;
use axum::{ routing::get, Json, Router };
use serde::Serialize;
use tower_http::cors::{ Any, CorsLayer };
use log::{ info, error };

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

#[derive(Serialize)]
struct AspectRatioEntry {
    value: AspectRatio,
    label: &'static str,
}

pub fn router() -> Router {
    let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);

    Router::new()
        .route("/api/health", get(health_handler))
        .route("/api/bots", get(bots_handler))
        .route("/api/aspect-ratios", get(aspect_ratios_handler))
        .layer(cors)
}

pub async fn start_http_server(
    http_port: u16,
    args: Args
) -> Result<(), Box<dyn Error + Send + Sync>> {
    let addr = format!("0.0.0.0:{}", http_port).parse::<SocketAddr>()?;
    let app = router();

    match (args.tls_enabled(), &args.tls_cert_path, &args.tls_key_path) {
        (true, Some(cert_path), Some(key_path)) => {
            let tls_config = axum_server::tls_rustls::RustlsConfig
                ::from_pem_file(cert_path, key_path).await?;
            info!("Starting HTTPS API server on: https://{}", addr);
            tokio::spawn(async move {
                if
                    let Err(e) = axum_server
                        ::bind_rustls(addr, tls_config)
                        .serve(app.into_make_service()).await
                {
                    error!("HTTPS server error: {}", e);
                }
            });
        }
        _ => {
            let listener = tokio::net::TcpListener::bind(addr).await?;
            info!("Starting HTTP API server on: http://{}", addr);
            tokio::spawn(async move {
                if let Err(e) = axum::serve(listener, app.into_make_service()).await {
                    error!("HTTP server error: {}", e);
                }
            });
        }
    }

    Ok(())
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok", version: env!("CARGO_PKG_VERSION") })
}

async fn bots_handler() -> Json<Vec<BotOption>> {
    Json(BOTS.clone())
}

async fn aspect_ratios_handler() -> Json<Vec<AspectRatioEntry>> {
    Json(
        AspectRatio::ALL.iter()
            .map(|ratio| AspectRatioEntry { value: *ratio, label: ratio.label() })
            .collect()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{ to_bytes, Body };
    use axum::http::{ Request, StatusCode };
    use tower::ServiceExt;

    async fn get_json(uri: &str) -> (StatusCode, serde_json::Value) {
        let response = router()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap()).await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn health_reports_ok() {
        let (status, body) = get_json("/api/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn bots_lists_catalog_in_order() {
        let (status, body) = get_json("/api/bots").await;
        assert_eq!(status, StatusCode::OK);
        let bots = body.as_array().unwrap();
        assert_eq!(bots.len(), 3);
        assert_eq!(bots[0]["id"], "hrilagpt-pro");
        assert_eq!(bots[2]["type"], "image");
    }

    #[tokio::test]
    async fn aspect_ratios_use_wire_values() {
        let (_, body) = get_json("/api/aspect-ratios").await;
        assert_eq!(body[0]["value"], "1:1");
        assert_eq!(body[4]["label"], "Widescreen");
    }
}
