use crate::config::Settings;
use crate::database::UserDb;
use crate::eligibility::{self, Classifier, DonorProfile};
use crate::error::AppError;
use crate::model::{Report, User};
use crate::report_pdf;
use crate::session::SessionContext;
use actix_identity::Identity;
use actix_web::{http::header, web, HttpResponse};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

type Tera = web::Data<tera::Tera>;
type Db = web::Data<sled::Db>;
type Config = web::Data<Settings>;
type Model = web::Data<dyn Classifier>;
type Flags = web::Query<HashMap<String, String>>;

const DATE_FORMAT: &str = "%d %b %Y, %I:%M %p";

#[derive(Serialize)]
struct Notice {
    message: &'static str,
    level: &'static str,
}

const NOTICES: [(&str, Notice); 7] = [
    ("invalid_credentials", Notice { message: "Invalid username or password", level: "danger" }),
    ("user_exists", Notice { message: "User already exists", level: "warning" }),
    ("registered", Notice { message: "Registration successful!", level: "success" }),
    ("password_mismatch", Notice { message: "Passwords do not match", level: "danger" }),
    ("user_not_found", Notice { message: "User not found", level: "danger" }),
    ("password_reset", Notice { message: "Password reset successful!", level: "success" }),
    ("logout", Notice { message: "You have been logged out", level: "info" }),
];

pub fn templates() -> Result<tera::Tera, tera::Error> {
    tera::Tera::new(concat!(env!("CARGO_MANIFEST_DIR"), "/templates/**/*"))
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/", web::get().to(login))
        .route("/", web::post().to(login_post))
        .route("/login", web::get().to(login))
        .route("/login", web::post().to(login_post))
        .route("/register", web::get().to(register))
        .route("/register", web::post().to(register_post))
        .route("/forgot-password", web::get().to(forgot_password))
        .route("/forgot-password", web::post().to(forgot_password_post))
        .route("/home", web::get().to(home))
        .route("/prediction", web::get().to(prediction))
        .route("/prediction", web::post().to(prediction_post))
        .route("/report", web::get().to(report))
        .route("/download-report", web::get().to(download_report))
        .route("/about", web::get().to(about))
        .route("/tips", web::get().to(tips))
        .route("/contact", web::get().to(contact))
        .route("/logout", web::get().to(logout));
}

fn redirect(location: &str) -> HttpResponse {
    HttpResponse::Found()
        .insert_header((header::LOCATION, location))
        .finish()
}

fn page_context(flags: &HashMap<String, String>, username: Option<&str>) -> tera::Context {
    let mut ctx = tera::Context::new();
    if let Some((_, notice)) = NOTICES.iter().find(|(flag, _)| flags.contains_key(*flag)) {
        ctx.insert("notice", notice);
    }
    if let Some(username) = username {
        ctx.insert("username", username);
    }
    ctx
}

fn render(tera: &tera::Tera, template: &str, ctx: &tera::Context) -> Result<HttpResponse, AppError> {
    let body = tera.render(template, ctx)?;
    Ok(HttpResponse::Ok()
        .content_type("text/html; charset=utf-8")
        .body(body))
}

async fn login(flags: Flags, tera: Tera) -> Result<HttpResponse, AppError> {
    render(&tera, "login.html", &page_context(&flags, None))
}

async fn hash_password(password: String, cost: u32) -> Result<String, AppError> {
    Ok(web::block(move || bcrypt::hash(password, cost)).await??)
}

async fn verify_password(password: String, hash: String) -> Result<bool, AppError> {
    Ok(web::block(move || bcrypt::verify(password, &hash)).await??)
}

#[derive(Deserialize)]
struct Credentials {
    username: String,
    password: String,
}

impl Credentials {
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
    if let Some((_user_id, user)) = db.get_user_by_username(username)? {
        if verify_password(params.password.clone(), user.password_hash).await? {
            SessionContext::begin(&id, &db, &user.username)?;
            info!("{} logged in", user.username);
            return Ok(redirect("/home"));
        }
    }
    warn!("Failed login for {}", username);
    Ok(redirect("/login?invalid_credentials"))
}

async fn register(flags: Flags, tera: Tera) -> Result<HttpResponse, AppError> {
    render(&tera, "register.html", &page_context(&flags, None))
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
    match db.add_user(&user)? {
        Some(user_id) => {
            info!("Registered {} as user {}", user.username, user_id);
            Ok(redirect("/login?registered"))
        }
        None => {
            warn!("Username already taken: {}", user.username);
            Ok(redirect("/register?user_exists"))
        }
    }
}

async fn forgot_password(flags: Flags, tera: Tera) -> Result<HttpResponse, AppError> {
    render(&tera, "forgot_password.html", &page_context(&flags, None))
}

#[derive(Deserialize)]
struct PasswordReset {
    username: String,
    password: String,
    confirm_password: String,
}

impl PasswordReset {
    fn username(&self) -> &str {
        self.username.trim()
    }
}

async fn forgot_password_post(
    params: web::Form<PasswordReset>,
    db: Db,
    config: Config,
) -> Result<HttpResponse, AppError> {
    if params.password != params.confirm_password {
        return Ok(redirect("/forgot-password?password_mismatch"));
    }
    if params.password.is_empty() {
        return Err(AppError::BadRequest("Password is required".to_owned()));
    }
    let password_hash = hash_password(params.password.clone(), config.bcrypt_cost).await?;
    if !db.update_password(params.username(), password_hash)? {
        return Ok(redirect("/forgot-password?user_not_found"));
    }
    info!("Password reset for {}", params.username());
    Ok(redirect("/login?password_reset"))
}

async fn home(flags: Flags, id: Identity, tera: Tera, db: Db) -> Result<HttpResponse, AppError> {
    let session = match SessionContext::resolve(&id, &db)? {
        Some(session) => session,
        None => return Ok(redirect("/login")),
    };
    render(&tera, "home.html", &page_context(&flags, Some(&session.username)))
}

async fn prediction(
    flags: Flags,
    id: Identity,
    tera: Tera,
    db: Db,
) -> Result<HttpResponse, AppError> {
    let session = match SessionContext::resolve(&id, &db)? {
        Some(session) => session,
        None => return Ok(redirect("/login")),
    };
    render(&tera, "prediction.html", &page_context(&flags, Some(&session.username)))
}

#[derive(Deserialize)]
struct PredictionForm {
    age: u32,
    weight: u32,
    blood_group: String,
    months_since_last_donation: u32,
    total_donations: u32,
    gender: String,
}

impl PredictionForm {
    fn profile(&self) -> Result<DonorProfile, AppError> {
        Ok(DonorProfile {
            age: self.age,
            weight: self.weight,
            blood_group: self.blood_group.parse()?,
            months_since_last_donation: self.months_since_last_donation,
            total_donations: self.total_donations,
            gender: self.gender.parse()?,
        })
    }
}

async fn prediction_post(
    form: web::Form<PredictionForm>,
    id: Identity,
    db: Db,
    model: Model,
) -> Result<HttpResponse, AppError> {
    let mut session = match SessionContext::resolve(&id, &db)? {
        Some(session) => session,
        None => return Ok(redirect("/login")),
    };
    let profile = form.profile()?;
    let assessment = eligibility::assess(&profile, model.get_ref())?;
    info!(
        "{} assessed as {} ({:?})",
        session.username, assessment.eligibility, assessment.decided_by
    );
    let report = Report {
        username: session.username.clone(),
        age: profile.age,
        weight: profile.weight,
        blood_group: profile.blood_group.label().to_owned(),
        gender: profile.gender.label().to_owned(),
        months: profile.months_since_last_donation,
        total: profile.total_donations,
        eligibility: assessment.eligibility,
        headline: assessment.headline().to_owned(),
        date: chrono::Local::now().format(DATE_FORMAT).to_string(),
    };
    session.attach_report(&db, report)?;
    Ok(redirect("/report"))
}

fn with_report(id: &Identity, db: &sled::Db) -> Result<Option<(SessionContext, Report)>, AppError> {
    Ok(match SessionContext::resolve(id, db)? {
        Some(mut session) => session.report.take().map(|report| (session, report)),
        None => None,
    })
}

async fn report(flags: Flags, id: Identity, tera: Tera, db: Db) -> Result<HttpResponse, AppError> {
    // Anonymous visitors have no report either.
    let (session, report) = match with_report(&id, &db)? {
        Some(found) => found,
        None => return Ok(redirect("/prediction")),
    };
    let mut ctx = page_context(&flags, Some(&session.username));
    ctx.insert("report", &report);
    render(&tera, "report.html", &ctx)
}

async fn download_report(id: Identity, db: Db, config: Config) -> Result<HttpResponse, AppError> {
    let (session, report) = match with_report(&id, &db)? {
        Some(found) => found,
        None => return Ok(redirect("/prediction")),
    };
    let report_dir = config.report_dir.clone();
    let user_id = session.user_id;
    let bytes = web::block(move || report_pdf::write(&report_dir, user_id, &report)).await??;
    Ok(HttpResponse::Ok()
        .content_type("application/pdf")
        .insert_header((
            header::CONTENT_DISPOSITION,
            "attachment; filename=\"blood_report.pdf\"",
        ))
        .body(bytes))
}

async fn about(flags: Flags, id: Identity, tera: Tera, db: Db) -> Result<HttpResponse, AppError> {
    static_page(flags, id, tera, db, "about_us.html").await
}

async fn tips(flags: Flags, id: Identity, tera: Tera, db: Db) -> Result<HttpResponse, AppError> {
    static_page(flags, id, tera, db, "tips.html").await
}

async fn contact(flags: Flags, id: Identity, tera: Tera, db: Db) -> Result<HttpResponse, AppError> {
    static_page(flags, id, tera, db, "contact_us.html").await
}

async fn static_page(
    flags: Flags,
    id: Identity,
    tera: Tera,
    db: Db,
    template: &str,
) -> Result<HttpResponse, AppError> {
    let session = SessionContext::resolve(&id, &db)?;
    let username = session.as_ref().map(|session| session.username.as_str());
    render(&tera, template, &page_context(&flags, username))
}

async fn logout(id: Identity, db: Db) -> Result<HttpResponse, AppError> {
    SessionContext::end(&id, &db)?;
    Ok(redirect("/login?logout"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eligibility::tests::ScriptedClassifier;
    use crate::eligibility::Eligibility;
    use actix_identity::{CookieIdentityPolicy, IdentityService};
    use actix_web::cookie::Cookie;
    use actix_web::dev::ServiceResponse;
    use actix_web::http::StatusCode;
    use actix_web::{test, App};
    use std::sync::Arc;

    macro_rules! test_app {
        ($db:expr, $dir:expr, $model:expr) => {
            test::init_service(
                App::new()
                    .wrap(IdentityService::new(
                        CookieIdentityPolicy::new(&[0; 32])
                            .name("auth-cookie")
                            .secure(false),
                    ))
                    .app_data(web::Data::new(templates().unwrap()))
                    .app_data(web::Data::new($db.clone()))
                    .app_data(web::Data::new(Settings {
                        report_dir: $dir.to_path_buf(),
                        bcrypt_cost: 4,
                    }))
                    .app_data(web::Data::from($model.clone() as Arc<dyn Classifier>))
                    .configure(configure),
            )
            .await
        };
    }

    /// The report of the only session that has one.
    fn stored_report(db: &sled::Db) -> Option<Report> {
        let reports = db.open_tree("session_reports").unwrap();
        assert!(reports.len() <= 1);
        reports
            .iter()
            .values()
            .next()
            .map(|row| bincode::deserialize(&row.unwrap()).unwrap())
    }

    fn temporary_db() -> sled::Db {
        sled::Config::new().temporary(true).open().unwrap()
    }

    fn location<B>(resp: &ServiceResponse<B>) -> &str {
        resp.headers()
            .get(header::LOCATION)
            .unwrap()
            .to_str()
            .unwrap()
    }

    fn auth_cookie<B>(resp: &ServiceResponse<B>) -> Cookie<'static> {
        resp.response()
            .cookies()
            .find(|cookie| cookie.name() == "auth-cookie")
            .unwrap()
            .into_owned()
    }

    fn prediction_form(age: u32, weight: u32) -> [(&'static str, String); 6] {
        [
            ("age", age.to_string()),
            ("weight", weight.to_string()),
            ("blood_group", "B+".to_owned()),
            ("months_since_last_donation", "5".to_owned()),
            ("total_donations", "2".to_owned()),
            ("gender", "Male".to_owned()),
        ]
    }

    #[actix_rt::test]
    async fn duplicate_registration_creates_no_second_user() {
        let db = temporary_db();
        let dir = tempfile::tempdir().unwrap();
        let model = Arc::new(ScriptedClassifier::new(&[]));
        let app = test_app!(db, dir.path(), model);
        let form = [("username", "asha"), ("password", "secret1")];

        let req = test::TestRequest::post().uri("/register").set_form(&form).to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(location(&resp), "/login?registered");

        let req = test::TestRequest::post().uri("/register").set_form(&form).to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(location(&resp), "/register?user_exists");
        assert_eq!(db.open_tree("users").unwrap().len(), 1);

        let req = test::TestRequest::get().uri("/register?user_exists").to_request();
        let body = test::call_and_read_body(&app, req).await;
        assert!(String::from_utf8_lossy(&body).contains("User already exists"));
    }

    #[actix_rt::test]
    async fn forgot_password_flow() {
        let db = temporary_db();
        let dir = tempfile::tempdir().unwrap();
        let model = Arc::new(ScriptedClassifier::new(&[]));
        let app = test_app!(db, dir.path(), model);
        let req = test::TestRequest::post()
            .uri("/register")
            .set_form(&[("username", "asha"), ("password", "old-secret")])
            .to_request();
        test::call_service(&app, req).await;

        let req = test::TestRequest::post()
            .uri("/forgot-password")
            .set_form(&[
                ("username", "asha"),
                ("password", "new-secret"),
                ("confirm_password", "typo"),
            ])
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(location(&resp), "/forgot-password?password_mismatch");

        let req = test::TestRequest::post()
            .uri("/forgot-password")
            .set_form(&[
                ("username", "ravi"),
                ("password", "new-secret"),
                ("confirm_password", "new-secret"),
            ])
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(location(&resp), "/forgot-password?user_not_found");

        let req = test::TestRequest::post()
            .uri("/forgot-password")
            .set_form(&[
                ("username", "asha"),
                ("password", "new-secret"),
                ("confirm_password", "new-secret"),
            ])
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(location(&resp), "/login?password_reset");

        let req = test::TestRequest::post()
            .uri("/login")
            .set_form(&[("username", "asha"), ("password", "old-secret")])
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(location(&resp), "/login?invalid_credentials");

        let req = test::TestRequest::post()
            .uri("/login")
            .set_form(&[("username", "asha"), ("password", "new-secret")])
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(location(&resp), "/home");
    }

    #[actix_rt::test]
    async fn prediction_report_and_logout() {
        let db = temporary_db();
        let dir = tempfile::tempdir().unwrap();
        let model = Arc::new(ScriptedClassifier::new(&[0, 1]));
        let app = test_app!(db, dir.path(), model);

        let credentials = [("username", "asha"), ("password", "secret1")];
        let req = test::TestRequest::post().uri("/register").set_form(&credentials).to_request();
        test::call_service(&app, req).await;
        let req = test::TestRequest::post().uri("/").set_form(&credentials).to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(location(&resp), "/home");
        let cookie = auth_cookie(&resp);

        let req = test::TestRequest::get().uri("/report").cookie(cookie.clone()).to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(location(&resp), "/prediction");

        // Under age: decided without the model.
        let req = test::TestRequest::post()
            .uri("/prediction")
            .cookie(cookie.clone())
            .set_form(&prediction_form(17, 70))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(location(&resp), "/report");
        let report = stored_report(&db).unwrap();
        assert_eq!(report.eligibility, Eligibility::NotEligible);
        assert_eq!(model.calls(), 0);

        for expected in [Eligibility::NotEligible, Eligibility::Eligible] {
            let req = test::TestRequest::post()
                .uri("/prediction")
                .cookie(cookie.clone())
                .set_form(&prediction_form(30, 70))
                .to_request();
            test::call_service(&app, req).await;
            assert_eq!(stored_report(&db).unwrap().eligibility, expected);
        }
        assert_eq!(model.calls(), 2);
        assert_eq!(model.seen.lock().unwrap()[0], [30.0, 70.0, 2.0, 5.0, 2.0, 0.0]);

        let req = test::TestRequest::get().uri("/report").cookie(cookie.clone()).to_request();
        let body = test::call_and_read_body(&app, req).await;
        let page = String::from_utf8_lossy(&body);
        assert!(page.contains("Eligible Donor"));
        assert!(page.contains("B+"));

        let req = test::TestRequest::get()
            .uri("/download-report")
            .cookie(cookie.clone())
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert!(test::read_body(resp).await.starts_with(b"%PDF"));

        let req = test::TestRequest::get().uri("/logout").cookie(cookie.clone()).to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(location(&resp), "/login?logout");
        assert!(stored_report(&db).is_none());

        let req = test::TestRequest::get().uri("/report").cookie(cookie.clone()).to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(location(&resp), "/prediction");
        let req = test::TestRequest::get()
            .uri("/download-report")
            .cookie(cookie)
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(location(&resp), "/prediction");
    }

    #[actix_rt::test]
    async fn unknown_blood_group_is_rejected() {
        let db = temporary_db();
        let dir = tempfile::tempdir().unwrap();
        let model = Arc::new(ScriptedClassifier::new(&[1]));
        let app = test_app!(db, dir.path(), model);
        let credentials = [("username", "asha"), ("password", "secret1")];
        let req = test::TestRequest::post().uri("/register").set_form(&credentials).to_request();
        test::call_service(&app, req).await;
        let req = test::TestRequest::post().uri("/login").set_form(&credentials).to_request();
        let cookie = auth_cookie(&test::call_service(&app, req).await);

        let mut form = prediction_form(30, 70);
        form[2].1 = "Z+".to_owned();
        let req = test::TestRequest::post()
            .uri("/prediction")
            .cookie(cookie)
            .set_form(&form)
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(model.calls(), 0);
    }

    #[actix_rt::test]
    async fn pages_are_gated_by_login() {
        let db = temporary_db();
        let dir = tempfile::tempdir().unwrap();
        let model = Arc::new(ScriptedClassifier::new(&[]));
        let app = test_app!(db, dir.path(), model);
        for uri in ["/home", "/prediction"] {
            let req = test::TestRequest::get().uri(uri).to_request();
            let resp = test::call_service(&app, req).await;
            assert_eq!(location(&resp), "/login", "{}", uri);
        }
        for uri in ["/report", "/download-report"] {
            let req = test::TestRequest::get().uri(uri).to_request();
            let resp = test::call_service(&app, req).await;
            assert_eq!(location(&resp), "/prediction", "{}", uri);
        }
        for uri in ["/about", "/tips", "/contact", "/login", "/forgot-password"] {
            let req = test::TestRequest::get().uri(uri).to_request();
            let resp = test::call_service(&app, req).await;
            assert_eq!(resp.status(), StatusCode::OK, "{}", uri);
        }
    }

    macro_rules! sign_in {
        ($app:expr, $username:expr) => {{
            let req = test::TestRequest::post()
                .uri("/login")
                .set_form(&[("username", $username), ("password", "secret1")])
                .to_request();
            auth_cookie(&test::call_service(&$app, req).await)
        }};
    }

    macro_rules! register {
        ($app:expr, $username:expr) => {{
            let req = test::TestRequest::post()
                .uri("/register")
                .set_form(&[("username", $username), ("password", "secret1")])
                .to_request();
            test::call_service(&$app, req).await
        }};
    }

    #[actix_rt::test]
    async fn cookie_for_unknown_user_is_forgotten() {
        let dir = tempfile::tempdir().unwrap();
        let model = Arc::new(ScriptedClassifier::new(&[]));
        let cookie = {
            let db = temporary_db();
            let app = test_app!(db, dir.path(), model);
            register!(app, "asha");
            sign_in!(app, "asha")
        };

        let db = temporary_db();
        let app = test_app!(db, dir.path(), model);
        let req = test::TestRequest::get().uri("/home").cookie(cookie).to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(location(&resp), "/login");
        assert_eq!(auth_cookie(&resp).value(), "");
    }

    #[actix_rt::test]
    async fn usernames_are_trimmed_everywhere() {
        let db = temporary_db();
        let dir = tempfile::tempdir().unwrap();
        let model = Arc::new(ScriptedClassifier::new(&[]));
        let app = test_app!(db, dir.path(), model);
        register!(app, " asha ");
        assert!(db.get_user_by_username("asha").unwrap().is_some());

        let req = test::TestRequest::post()
            .uri("/login")
            .set_form(&[("username", " asha "), ("password", "secret1")])
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(location(&resp), "/home");

        let req = test::TestRequest::post()
            .uri("/forgot-password")
            .set_form(&[
                ("username", "asha "),
                ("password", "secret2"),
                ("confirm_password", "secret2"),
            ])
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(location(&resp), "/login?password_reset");
    }

    #[actix_rt::test]
    async fn reports_belong_to_one_browser_session() {
        let db = temporary_db();
        let dir = tempfile::tempdir().unwrap();
        let model = Arc::new(ScriptedClassifier::new(&[1]));
        let app = test_app!(db, dir.path(), model);
        register!(app, "asha");
        let laptop = sign_in!(app, "asha");
        let phone = sign_in!(app, "asha");

        let req = test::TestRequest::post()
            .uri("/prediction")
            .cookie(laptop.clone())
            .set_form(&prediction_form(30, 70))
            .to_request();
        test::call_service(&app, req).await;

        let req = test::TestRequest::get().uri("/report").cookie(phone.clone()).to_request();
        assert_eq!(location(&test::call_service(&app, req).await), "/prediction");

        let req = test::TestRequest::get().uri("/logout").cookie(phone).to_request();
        test::call_service(&app, req).await;

        let req = test::TestRequest::get().uri("/report").cookie(laptop).to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
    }
}
