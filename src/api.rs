//! HTTP surface: route handlers and cookie handling.
//!
//! Handlers only parse transport input, resolve the session cookie, and
//! delegate to the services; every protected route short-circuits with 401
//! before any store access when the cookie is absent or invalid.

use actix_web::cookie::{time::Duration as CookieDuration, Cookie};
use actix_web::{delete, get, post, put, web, HttpRequest, HttpResponse};
use serde::Deserialize;
use serde_json::json;

use crate::app_state::AppState;
use crate::auth::{Claims, AUTH_COOKIE};
use crate::error::ApiError;
use crate::media::ImagePayload;
use crate::service::account::{
    SignInRequest, SignUpRequest, UpdatePasswordRequest, UpdateProfileRequest,
};
use crate::service::blog::{CreateBlogRequest, UpdateBlogRequest};
use crate::service::engagement::CreateCommentRequest;

#[derive(Debug, Deserialize)]
pub struct AvatarRequest {
    pub image: String,
}

/// Resolve the session cookie to verified claims.
fn authenticate(req: &HttpRequest, state: &AppState) -> Result<Claims, ApiError> {
    let cookie = req.cookie(AUTH_COOKIE).ok_or(ApiError::Unauthorized)?;
    let claims = state.tokens.verify(cookie.value())?;
    log_mdc::insert("user", &claims.id);
    Ok(claims)
}

// --- auth ---

#[post("/auth/sign-up")]
async fn sign_up(
    state: web::Data<AppState>,
    body: web::Json<SignUpRequest>,
) -> Result<HttpResponse, ApiError> {
    let user = state.accounts.sign_up(&body).await?;
    Ok(HttpResponse::Created().json(json!({ "status": "success", "user": user })))
}

#[post("/auth/sign-in")]
async fn sign_in(
    state: web::Data<AppState>,
    body: web::Json<SignInRequest>,
) -> Result<HttpResponse, ApiError> {
    let (user, token) = state.accounts.sign_in(&body).await?;
    let cookie = Cookie::build(AUTH_COOKIE, token.clone())
        .http_only(true)
        .path("/")
        .max_age(CookieDuration::days(state.config.auth.token_ttl_days))
        .finish();
    Ok(HttpResponse::Ok()
        .cookie(cookie)
        .json(json!({ "status": "success", "user": user, "auth": token })))
}

#[get("/auth/me")]
async fn me(req: HttpRequest, state: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let claims = authenticate(&req, &state)?;
    let user = state.accounts.me(&claims).await?;
    Ok(HttpResponse::Ok().json(user))
}

// --- blogs ---

#[get("/blogs")]
async fn list_blogs(req: HttpRequest, state: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    authenticate(&req, &state)?;
    let blogs = state.blogs.list().await?;
    Ok(HttpResponse::Ok().json(json!({ "status": "success", "blogs": blogs })))
}

#[get("/blogs/tags")]
async fn blog_tags(req: HttpRequest, state: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    authenticate(&req, &state)?;
    let tags = state.blogs.tags().await?;
    Ok(HttpResponse::Ok().json(json!({ "status": "success", "tags": tags })))
}

#[get("/blogs/{blog_id}")]
async fn get_blog(
    req: HttpRequest,
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    authenticate(&req, &state)?;
    let blog = state.blogs.get(&path).await?;
    Ok(HttpResponse::Ok().json(json!({ "status": "success", "blog": blog })))
}

#[post("/blogs")]
async fn create_blog(
    req: HttpRequest,
    state: web::Data<AppState>,
    body: web::Json<CreateBlogRequest>,
) -> Result<HttpResponse, ApiError> {
    let claims = authenticate(&req, &state)?;
    let blog = state.blogs.create(&body, &claims).await?;
    Ok(HttpResponse::Created().json(json!({ "status": "success", "blog": blog })))
}

#[put("/blogs/{blog_id}")]
async fn update_blog(
    req: HttpRequest,
    state: web::Data<AppState>,
    path: web::Path<String>,
    body: web::Json<UpdateBlogRequest>,
) -> Result<HttpResponse, ApiError> {
    authenticate(&req, &state)?;
    let blog = state.blogs.update(&path, &body).await?;
    Ok(HttpResponse::Ok().json(json!({ "status": "success", "blog": blog })))
}

#[delete("/blogs/{blog_id}")]
async fn delete_blog(
    req: HttpRequest,
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    authenticate(&req, &state)?;
    let blog = state.blogs.delete(&path).await?;
    Ok(HttpResponse::Ok().json(json!({ "status": "success", "blog": blog })))
}

// --- engagement ---

#[post("/blogs/like/{blog_id}")]
async fn like_blog(
    req: HttpRequest,
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let claims = authenticate(&req, &state)?;
    let like = state.engagement.like(&path, &claims).await?;
    Ok(HttpResponse::Ok().json(json!({ "status": "success", "like": like })))
}

#[post("/blogs/unlike/{blog_id}")]
async fn unlike_blog(
    req: HttpRequest,
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let claims = authenticate(&req, &state)?;
    let like = state.engagement.unlike(&path, &claims).await?;
    Ok(HttpResponse::Ok().json(json!({ "status": "success", "like": like })))
}

#[post("/comments/{blog_id}")]
async fn create_comment(
    req: HttpRequest,
    state: web::Data<AppState>,
    path: web::Path<String>,
    body: web::Json<CreateCommentRequest>,
) -> Result<HttpResponse, ApiError> {
    let claims = authenticate(&req, &state)?;
    let comment = state.engagement.create_comment(&path, &body, &claims).await?;
    Ok(HttpResponse::Created().json(json!({ "status": "success", "comment": comment })))
}

// --- users ---

#[get("/users/{user_id}")]
async fn get_user(
    req: HttpRequest,
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    authenticate(&req, &state)?;
    let user = state.accounts.get_user(&path).await?;
    Ok(HttpResponse::Ok().json(user))
}

#[put("/users/me/update-password")]
async fn update_password(
    req: HttpRequest,
    state: web::Data<AppState>,
    body: web::Json<UpdatePasswordRequest>,
) -> Result<HttpResponse, ApiError> {
    let claims = authenticate(&req, &state)?;
    state.accounts.update_password(&claims, &body).await?;
    Ok(HttpResponse::Ok().json(json!({ "status": "success" })))
}

#[post("/users/me/update-avatar")]
async fn update_avatar(
    req: HttpRequest,
    state: web::Data<AppState>,
    body: web::Json<AvatarRequest>,
) -> Result<HttpResponse, ApiError> {
    let claims = authenticate(&req, &state)?;
    if body.image.trim().is_empty() {
        return Err(ApiError::validation("Missing image"));
    }
    let payload = ImagePayload::from_base64(&body.image)?;
    let (url, user) = state.accounts.update_avatar(&claims, &payload).await?;
    Ok(HttpResponse::Ok().json(json!({ "status": "success", "url": url, "user": user })))
}

#[put("/users/{user_id}")]
async fn update_profile(
    req: HttpRequest,
    state: web::Data<AppState>,
    path: web::Path<String>,
    body: web::Json<UpdateProfileRequest>,
) -> Result<HttpResponse, ApiError> {
    authenticate(&req, &state)?;
    let user = state.accounts.update_profile(&path, &body).await?;
    Ok(HttpResponse::Ok().json(json!({ "status": "success", "user": user })))
}

/// Route table shared by `main` and the integration tests. Fixed-path
/// routes are registered before their parameterized siblings.
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(sign_up)
        .service(sign_in)
        .service(me)
        .service(blog_tags)
        .service(list_blogs)
        .service(create_blog)
        .service(like_blog)
        .service(unlike_blog)
        .service(get_blog)
        .service(update_blog)
        .service(delete_blog)
        .service(create_comment)
        .service(update_password)
        .service(update_avatar)
        .service(get_user)
        .service(update_profile);
}
