use actix_web::{web, HttpResponse, Result};

use super::AppState;
use crate::models::ApiResponse;

pub async fn health_check(state: web::Data<AppState>) -> Result<HttpResponse> {
    let response = ApiResponse::success("Service is healthy", state.timezone);
    Ok(HttpResponse::Ok().json(response))
}

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health_check));
}
