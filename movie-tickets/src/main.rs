mod booking;
mod catalog;
mod config;
mod database;
mod error;
mod handlers;
mod model;
mod session;
mod ticket_pdf;

use actix_identity::{CookieIdentityPolicy, IdentityService};
use actix_web::{middleware::Logger, web, App, HttpServer};
use config::{Config, Settings};
use log::info;
use std::io;

fn startup_error<E: std::fmt::Display>(err: E) -> io::Error {
    io::Error::new(io::ErrorKind::Other, err.to_string())
}

#[actix_rt::main]
async fn main() -> io::Result<()> {
    dotenvy::dotenv().ok();
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or("movie_tickets=debug,actix_web=info"),
    )
    .init();

    let config = Config::load().map_err(startup_error)?;
    let tera = web::Data::new(handlers::templates().map_err(startup_error)?);
    let db = web::Data::new(sled::open(&config.db_path).map_err(startup_error)?);
    let settings = web::Data::new(Settings::from(&config));
    let cookie_key = config.cookie_key.clone();

    info!("Serving movie tickets on {}", config.bind_addr);
    HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .wrap(IdentityService::new(
                CookieIdentityPolicy::new(&cookie_key)
                    .name("auth-cookie")
                    .secure(false),
            ))
            .app_data(tera.clone())
            .app_data(db.clone())
            .app_data(settings.clone())
            .configure(handlers::configure)
    })
    .bind(&config.bind_addr)?
    .run()
    .await
}
