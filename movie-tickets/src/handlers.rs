use crate::booking::{self, BookingRequest};
use crate::catalog::{self, MOVIES, SEAT_LAYOUT};
use crate::config::Settings;
use crate::database::UserDb;
use crate::error::AppError;
use crate::model::User;
use crate::session::SessionContext;
use crate::ticket_pdf;
use actix_identity::Identity;
use actix_web::{http::header, web, HttpResponse};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

type Tera = web::Data<tera::Tera>;
type Db = web::Data<sled::Db>;
type Config = web::Data<Settings>;
type Flags = web::Query<HashMap<String, String>>;

const NOTICES: [(&str, &str); 3] = [
    ("wrong_password", "Invalid username or password"),
    ("registered", "Registration successful, please log in"),
    ("logout", "You have been logged out"),
];

pub fn templates() -> Result<tera::Tera, tera::Error> {
    tera::Tera::new(concat!(env!("CARGO_MANIFEST_DIR"), "/templates/**/*"))
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/", web::get().to(login))
        .route("/", web::post().to(login_post))
        .route("/register", web::get().to(register))
        .route("/register", web::post().to(register_post))
        .route("/movies", web::get().to(movies))
        .route("/seats/{movie}", web::get().to(seats))
        .route("/seats/{movie}", web::post().to(seats_post))
        .route("/success", web::get().to(success))
        .route("/download", web::get().to(download))
        .route("/logout", web::get().to(logout));
}

fn redirect(location: &str) -> HttpResponse {
    HttpResponse::Found()
        .insert_header((header::LOCATION, location))
        .finish()
}

fn render(tera: &tera::Tera, template: &str, ctx: &tera::Context) -> Result<HttpResponse, AppError> {
    let body = tera.render(template, ctx)?;
    Ok(HttpResponse::Ok()
        .content_type("text/html; charset=utf-8")
        .body(body))
}

fn notice(flags: &HashMap<String, String>) -> Option<&'static str> {
    NOTICES
        .iter()
        .find(|(flag, _)| flags.contains_key(*flag))
        .map(|(_, message)| *message)
}

async fn hash_password(password: String, cost: u32) -> Result<String, AppError> {
    Ok(web::block(move || bcrypt::hash(password, cost)).await??)
}

async fn verify_password(password: String, hash: String) -> Result<bool, AppError> {
    Ok(web::block(move || bcrypt::verify(password, &hash)).await??)
}

async fn login(flags: Flags, tera: Tera) -> Result<HttpResponse, AppError> {
    let mut ctx = tera::Context::new();
    if let Some(message) = notice(&flags) {
        ctx.insert("notice", message);
    }
    render(&tera, "login.html", &ctx)
}

#[derive(Serialize, Deserialize)]
struct Credentials {
    username: String,
    password: String,
}

impl Credentials {
    /// Usernames are stored and looked up without surrounding whitespace.
    fn username(&self) -> &str {
        self.username.trim()
    }
}

async fn login_post(
    params: web::Form<Credentials>,
    id: Identity,
    db: Db,
) -> Result<HttpResponse, AppError> {
    let username = params.username();
    if let Some(user) = db.get_user(username)? {
        if verify_password(params.password.clone(), user.password_hash).await? {
            SessionContext::begin(&id, &db, &user.username)?;
            info!("{} logged in", user.username);
            return Ok(redirect("/movies"));
        }
    }
    warn!("Failed login for {}", username);
    Ok(redirect("/?wrong_password"))
}

async fn register(tera: Tera) -> Result<HttpResponse, AppError> {
    render(&tera, "register.html", &tera::Context::new())
}

async fn register_post(
    params: web::Form<Credentials>,
    db: Db,
    config: Config,
) -> Result<HttpResponse, AppError> {
    let username = params.username();
    if username.is_empty() || params.password.is_empty() {
        return Err(AppError::BadRequest(
            "Username and password are required".to_owned(),
        ));
    }
    let user = User {
        username: username.to_owned(),
        password_hash: hash_password(params.password.clone(), config.bcrypt_cost).await?,
    };
    if !db.add_user(&user)? {
        warn!("Username already taken: {}", user.username);
        return Err(AppError::Conflict("Username already exists!".to_owned()));
    }
    info!("Registered {}", user.username);
    Ok(redirect("/?registered"))
}

async fn movies(id: Identity, tera: Tera, db: Db) -> Result<HttpResponse, AppError> {
    let session = match SessionContext::resolve(&id, &db)? {
        Some(session) => session,
        None => return Ok(redirect("/")),
    };
    let mut ctx = tera::Context::new();
    ctx.insert("username", &session.username);
    ctx.insert("movies", &MOVIES);
    render(&tera, "movies.html", &ctx)
}

#[derive(Serialize)]
struct SeatView<'a> {
    label: &'a str,
    booked: bool,
}

async fn seats(
    movie: web::Path<String>,
    id: Identity,
    tera: Tera,
    db: Db,
) -> Result<HttpResponse, AppError> {
    let session = match SessionContext::resolve(&id, &db)? {
        Some(session) => session,
        None => return Ok(redirect("/")),
    };
    let movie = catalog::find_movie(&movie)
        .ok_or_else(|| AppError::NotFound(format!("Unknown movie: {}", movie)))?;
    let map = booking::seat_map(&db, movie)?;
    let layout = SEAT_LAYOUT
        .iter()
        .map(|label| SeatView {
            label: *label,
            booked: !map.available.contains(label),
        })
        .collect::<Vec<_>>();

    let mut ctx = tera::Context::new();
    ctx.insert("username", &session.username);
    ctx.insert("movie", movie);
    ctx.insert("layout", &layout);
    ctx.insert("available_seats", &map.available);
    ctx.insert("booked_seats", &map.booked);
    render(&tera, "seats.html", &ctx)
}

fn booking_request(fields: Vec<(String, String)>) -> BookingRequest {
    let mut request = BookingRequest::default();
    for (name, value) in fields {
        match name.as_str() {
            "seat" => request.seats.push(value),
            "show_time" => request.show_time = value,
            "payment" => request.payment = value,
            _ => {}
        }
    }
    request
}

async fn seats_post(
    movie: web::Path<String>,
    form: web::Form<Vec<(String, String)>>,
    id: Identity,
    db: Db,
) -> Result<HttpResponse, AppError> {
    let mut session = match SessionContext::resolve(&id, &db)? {
        Some(session) => session,
        None => return Ok(redirect("/")),
    };
    let request = booking_request(form.into_inner());
    let ticket = booking::book(&db, &movie, &request, &session.username)?;
    session.attach_ticket(&db, ticket)?;
    Ok(redirect("/success"))
}

async fn success(id: Identity, tera: Tera, db: Db, config: Config) -> Result<HttpResponse, AppError> {
    let session = match SessionContext::resolve(&id, &db)? {
        Some(session) => session,
        None => return Ok(redirect("/")),
    };
    let ticket = match session.ticket {
        Some(ticket) => ticket,
        None => return Ok(redirect("/movies")),
    };
    let ticket_dir = config.ticket_dir.clone();
    let written = ticket.clone();
    web::block(move || ticket_pdf::write(&ticket_dir, &written)).await??;

    let mut ctx = tera::Context::new();
    ctx.insert("username", &session.username);
    ctx.insert("ticket", &ticket);
    render(&tera, "success.html", &ctx)
}

async fn download(id: Identity, db: Db, config: Config) -> Result<HttpResponse, AppError> {
    let session = match SessionContext::resolve(&id, &db)? {
        Some(session) => session,
        None => return Ok(redirect("/")),
    };
    let ticket = match session.ticket {
        Some(ticket) => ticket,
        None => return Ok(redirect("/movies")),
    };
    let ticket_dir = config.ticket_dir.clone();
    let booking_id = ticket.booking_id;
    let bytes = web::block(move || ticket_pdf::write(&ticket_dir, &ticket)).await??;
    Ok(HttpResponse::Ok()
        .content_type("application/pdf")
        .insert_header((
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"ticket-{}.pdf\"", booking_id),
        ))
        .body(bytes))
}

async fn logout(id: Identity, db: Db) -> Result<HttpResponse, AppError> {
    SessionContext::end(&id, &db)?;
    Ok(redirect("/?logout"))
}
