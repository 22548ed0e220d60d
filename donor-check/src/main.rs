mod config;
mod database;
mod eligibility;
mod error;
mod forest;
mod handlers;
mod model;
mod report_pdf;
mod session;

use actix_identity::{CookieIdentityPolicy, IdentityService};
use actix_web::{middleware::Logger, web, App, HttpServer};
use config::{Config, Settings};
use eligibility::Classifier;
use forest::ForestModel;
use log::info;
use std::io;
use std::sync::Arc;

fn startup_error<E: std::fmt::Display>(err: E) -> io::Error {
    io::Error::new(io::ErrorKind::Other, err.to_string())
}

#[actix_rt::main]
async fn main() -> io::Result<()> {
    dotenvy::dotenv().ok();
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or("donor_check=debug,actix_web=info"),
    )
    .init();

    let config = Config::load().map_err(startup_error)?;
    let forest = ForestModel::load(&config.model_path).map_err(|err| {
        startup_error(format!("{}: {}", config.model_path.display(), err))
    })?;
    info!(
        "Loaded {} trees from {}",
        forest.tree_count(),
        config.model_path.display()
    );
    let model: web::Data<dyn Classifier> = web::Data::from(Arc::new(forest) as Arc<dyn Classifier>);
    let tera = web::Data::new(handlers::templates().map_err(startup_error)?);
    let db = web::Data::new(sled::open(&config.db_path).map_err(startup_error)?);
    let settings = web::Data::new(Settings::from(&config));
    let cookie_key = config.cookie_key.clone();

    info!("Serving donor checks on {}", config.bind_addr);
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
            .app_data(model.clone())
            .configure(handlers::configure)
    })
    .bind(&config.bind_addr)?
    .run()
    .await
}
