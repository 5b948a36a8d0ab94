extern crate actix_web;
extern crate bytes;
extern crate chrono;
extern crate dotenv;
extern crate env_logger;
extern crate futures;
extern crate hex;
extern crate jsonwebtoken;
extern crate rand;
extern crate serde;
extern crate serde_json;
extern crate sha2;
extern crate sqlx;
extern crate thiserror;
extern crate tokio;

mod config;
mod context;
mod core;
mod database;
mod error;
mod handlers;
mod impls;
mod middlewares;
pub mod request;
pub mod response;
mod routes;

use actix_web::middleware::Logger;
use actix_web::web::Data;
use actix_web::{App, HttpServer};
use log::{info, warn};
use sqlx::postgres::PgPoolOptions;

use crate::config::{Config, StoreBackend};
use crate::core::ports::repository::Manager;
use crate::database::sqlx::PgSqlxManager;
use crate::error::Error;
use crate::impls::feed::VoteHub;
use crate::impls::memory::MemoryManager;
use crate::impls::qr::PngQr;
use crate::middlewares::jwt::JWTMiddleware;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let config = Config::load()?;
    match config.store_backend {
        StoreBackend::Postgres => {
            let url = config.database_url.clone().ok_or_else(|| Error::ServerError("DATABASE_URL must be set".into()))?;
            let pool = PgPoolOptions::new().max_connections(config.database_max_connections).connect(&url).await?;
            sqlx::migrate!("./migrations").run(&pool).await.map_err(Error::from)?;
            serve(PgSqlxManager::new(pool), config).await
        }
        StoreBackend::Memory => {
            warn!("using the in-memory store, polls are lost on restart");
            serve(MemoryManager::new(), config).await
        }
    }
}

async fn serve<M>(manager: M, config: Config) -> anyhow::Result<()>
where
    M: Manager + Clone + Send + 'static,
{
    let addr = (config.bind_addr.clone(), config.port);
    let secret = config.jwt_secret.clone().into_bytes();
    let hub = VoteHub::new();
    let config = Data::new(config);
    info!("listening on {}:{}", addr.0, addr.1);
    HttpServer::new(move || {
        App::new()
            .wrap(JWTMiddleware::new(secret.clone()))
            .wrap(Logger::default())
            .app_data(Data::new(manager.clone()))
            .app_data(Data::new(hub.clone()))
            .app_data(config.clone())
            .app_data(Data::new(PngQr::default()))
            .configure(routes::config_routes::<M>)
    })
    .bind(addr)?
    .run()
    .await?;
    Ok(())
}
