use axum::{
    extract::{Json, Path},
    http::{header, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;

use crate::config::Config;
use crate::gateway::Gateway;
use crate::payment::{build_descriptor, uri::encode_url};
use crate::prices::{convert, ConversionRequest, ConversionResult, RateSource};
use crate::tokens::TokenCode;

#[derive(Deserialize)]
pub struct CreateConversionRequest {
    amount: String,
    token: TokenCode,
}

#[derive(Deserialize)]
pub struct CreatePaymentRequest {
    recipient: String,
    amount: String,
    token: TokenCode,
}

#[derive(Serialize)]
pub struct RateResponse {
    token: TokenCode,
    eur: f64,
}

#[derive(Serialize)]
pub struct PaymentRequestResponse {
    uri: String,
}

pub struct HttpServer {
    config: Arc<Config>,
    rates: Arc<dyn RateSource>,
    gateway: Arc<Gateway>,
}

impl HttpServer {
    pub fn new(config: Arc<Config>, rates: Arc<dyn RateSource>, gateway: Arc<Gateway>) -> Self {
        Self {
            config,
            rates,
            gateway,
        }
    }

    pub fn router(&self) -> Router {
        let rates = self.rates.clone();
        let config = self.config.clone();
        let gateway = self.gateway.clone();

        Router::new()
            .route("/api/v1/rates/:token", get({
                let rates = rates.clone();
                move |Path(token): Path<String>| async move {
                    let token = TokenCode::from_str(&token)
                        .map_err(|_| StatusCode::BAD_REQUEST)?;
                    match rates.eur_rate(token).await {
                        Ok(eur) => Ok(Json(RateResponse { token, eur })),
                        Err(e) => {
                            tracing::error!("Error fetching rate for {}: {}", token, e);
                            Err(StatusCode::SERVICE_UNAVAILABLE)
                        }
                    }
                }
            }))
            .route("/api/v1/conversions", post({
                let rates = rates.clone();
                move |Json(payload): Json<CreateConversionRequest>| async move {
                    let request = ConversionRequest {
                        eur_amount: payload.amount,
                        token: payload.token,
                    };
                    match convert(request, rates.as_ref()).await {
                        Ok(result) => Ok(Json::<ConversionResult>(result)),
                        Err(e) => {
                            tracing::error!("Error converting amount: {}", e);
                            Err(StatusCode::UNPROCESSABLE_ENTITY)
                        }
                    }
                }
            }))
            .route("/api/v1/payment-requests", post(
                move |Json(payload): Json<CreatePaymentRequest>| async move {
                    let descriptor = build_descriptor(
                        &config,
                        &payload.recipient,
                        &payload.amount,
                        payload.token,
                    )
                    .map_err(|e| {
                        tracing::error!("Error building payment request: {}", e);
                        StatusCode::BAD_REQUEST
                    })?;
                    match encode_url(&descriptor) {
                        Ok(url) => Ok(Json(PaymentRequestResponse {
                            uri: url.to_string(),
                        })),
                        Err(e) => {
                            tracing::error!("Error encoding payment URL: {}", e);
                            Err(StatusCode::INTERNAL_SERVER_ERROR)
                        }
                    }
                },
            ))
            .route("/assets/*path", get(
                move |Path(path): Path<String>| async move {
                    let url = gateway.asset_url(&format!("/{}", path));
                    let response = gateway.handle(&url).await;
                    (
                        StatusCode::from_u16(response.status)
                            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
                        [(header::CONTENT_TYPE, response.content_type)],
                        response.body,
                    )
                        .into_response()
                },
            ))
    }
}
