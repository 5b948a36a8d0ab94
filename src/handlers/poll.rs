use chrono::Utc;
use uuid::Uuid;

use crate::actix_web::{
    web::{Data, Json, Path, Query},
    HttpRequest, HttpResponse,
};
use crate::context::UserInfo;
use crate::core::models::poll::{Poll, PollCreate, PollPatch};
use crate::core::models::vote::PollRef;
use crate::core::ports::repository::Manager;
use crate::core::services::{self, results::PollView};
use crate::error::Error;
use crate::handlers::viewer;
use crate::request::Pagination;
use crate::response::{List, MessageResponse, PollResponse};

pub async fn create<M>(user_info: UserInfo, Json(body): Json<PollCreate>, manager: Data<M>) -> Result<HttpResponse, Error>
where
    M: Manager + 'static,
{
    let mut db = manager.db().await?;
    let poll = services::poll::create_poll(&mut db, user_info.id, body).await?;
    Ok(HttpResponse::Created().json(PollResponse { poll }))
}

pub async fn list<M>(user_info: UserInfo, Query(page): Query<Pagination>, manager: Data<M>) -> Result<Json<List<Poll>>, Error>
where
    M: Manager + 'static,
{
    let clause = page.to_clause()?;
    let mut db = manager.db().await?;
    let (polls, total) = services::poll::list_polls(&mut db, user_info.id, clause).await?;
    Ok(Json(List::new(polls, total)))
}

async fn view<M>(manager: &M, poll_ref: PollRef, user_info: Option<UserInfo>, req: &HttpRequest) -> Result<Json<PollView>, Error>
where
    M: Manager,
{
    let mut db = manager.db().await?;
    let view = services::results::poll_view(&mut db, &poll_ref, &viewer(user_info, req), Utc::now()).await?;
    Ok(Json(view))
}

pub async fn detail<M>(user_info: Option<UserInfo>, path: Path<(Uuid,)>, req: HttpRequest, manager: Data<M>) -> Result<Json<PollView>, Error>
where
    M: Manager + 'static,
{
    let (id,) = path.into_inner();
    view(manager.get_ref(), PollRef::Id(id), user_info, &req).await
}

pub async fn shared<M>(user_info: Option<UserInfo>, path: Path<(String,)>, req: HttpRequest, manager: Data<M>) -> Result<Json<PollView>, Error>
where
    M: Manager + 'static,
{
    let (token,) = path.into_inner();
    view(manager.get_ref(), PollRef::ShareToken(token), user_info, &req).await
}

pub async fn update<M>(user_info: UserInfo, path: Path<(Uuid,)>, Json(patch): Json<PollPatch>, manager: Data<M>) -> Result<Json<PollResponse<Poll>>, Error>
where
    M: Manager + 'static,
{
    let (id,) = path.into_inner();
    let tx = manager.tx().await?;
    let poll = services::poll::update_poll(tx, user_info.id, id, patch, Utc::now()).await?;
    Ok(Json(PollResponse { poll }))
}

pub async fn delete<M>(user_info: UserInfo, path: Path<(Uuid,)>, manager: Data<M>) -> Result<Json<MessageResponse>, Error>
where
    M: Manager + 'static,
{
    let (id,) = path.into_inner();
    let tx = manager.tx().await?;
    services::poll::delete_poll(tx, user_info.id, id).await?;
    Ok(Json(MessageResponse {
        message: "Poll deleted successfully",
    }))
}

#[cfg(test)]
mod test {
    use crate::actix_web::{http::StatusCode, test, App};
    use crate::handlers::test::{bearer, setup};
    use crate::impls::feed::VoteHub;
    use crate::middlewares::jwt::JWTMiddleware;
    use serde_json::{json, Value};
    use uuid::Uuid;

    fn poll_body() -> Value {
        json!({
            "title": "  Lunch?  ",
            "options": [{"text": "Pizza"}, {"text": "   "}, {"text": "Sushi", "color": "#ff0000"}],
            "settings": {"showResults": "immediately"}
        })
    }

    #[actix_web::test]
    async fn test_create_requires_identity() {
        let app = test::init_service(App::new().wrap(JWTMiddleware::new(b"test-secret".to_vec())).configure(setup(VoteHub::new()))).await;
        let req = test::TestRequest::post().uri("/api/polls").set_json(poll_body()).to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["error"], "Authentication required");
    }

    #[actix_web::test]
    async fn test_create_and_list() {
        let app = test::init_service(App::new().wrap(JWTMiddleware::new(b"test-secret".to_vec())).configure(setup(VoteHub::new()))).await;
        let owner = Uuid::new_v4();
        let req = test::TestRequest::post().uri("/api/polls").insert_header(bearer(owner)).set_json(poll_body()).to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CREATED);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["poll"]["title"], "Lunch?");
        assert_eq!(body["poll"]["options"].as_array().unwrap().len(), 2);
        assert_eq!(body["poll"]["settings"]["showResults"], "immediately");
        assert_eq!(body["poll"]["share_token"].as_str().unwrap().len(), 12);

        let req = test::TestRequest::get().uri("/api/polls?page=1&size=10").insert_header(bearer(owner)).to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["total"], 1);
        assert_eq!(body["list"][0]["title"], "Lunch?");

        let req = test::TestRequest::get().uri("/api/polls").insert_header(bearer(Uuid::new_v4())).to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["total"], 0);
    }

    #[actix_web::test]
    async fn test_create_rejects_single_option() {
        let app = test::init_service(App::new().wrap(JWTMiddleware::new(b"test-secret".to_vec())).configure(setup(VoteHub::new()))).await;
        let req = test::TestRequest::post()
            .uri("/api/polls")
            .insert_header(bearer(Uuid::new_v4()))
            .set_json(json!({"title": "t", "options": [{"text": "only"}]}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn test_malformed_json_is_bad_request() {
        let app = test::init_service(App::new().wrap(JWTMiddleware::new(b"test-secret".to_vec())).configure(setup(VoteHub::new()))).await;
        let req = test::TestRequest::post()
            .uri("/api/polls")
            .insert_header(bearer(Uuid::new_v4()))
            .insert_header(("Content-Type", "application/json"))
            .set_payload("{not json")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: Value = test::read_body_json(resp).await;
        assert!(body["error"].is_string());
    }

    #[actix_web::test]
    async fn test_private_poll_hidden_by_id_but_shared_by_token() {
        let app = test::init_service(App::new().wrap(JWTMiddleware::new(b"test-secret".to_vec())).configure(setup(VoteHub::new()))).await;
        let owner = Uuid::new_v4();
        let req = test::TestRequest::post()
            .uri("/api/polls")
            .insert_header(bearer(owner))
            .set_json(json!({"title": "secret", "options": [{"text": "a"}, {"text": "b"}], "settings": {"isPublic": false}}))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        let id = body["poll"]["id"].as_str().unwrap().to_owned();
        let token = body["poll"]["share_token"].as_str().unwrap().to_owned();

        let req = test::TestRequest::get().uri(&format!("/api/polls/{}", id)).to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);

        let req = test::TestRequest::get().uri(&format!("/api/polls/{}", id)).insert_header(bearer(Uuid::new_v4())).to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);

        let req = test::TestRequest::get().uri(&format!("/api/polls/{}", id)).insert_header(bearer(owner)).to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["results_visible"], true);

        let req = test::TestRequest::get().uri(&format!("/api/p/{}", token)).to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["poll"]["title"], "secret");
        assert_eq!(body["results_visible"], false);
        assert_eq!(body["results"], Value::Null);
    }

    #[actix_web::test]
    async fn test_update_and_delete_are_owner_only() {
        let app = test::init_service(App::new().wrap(JWTMiddleware::new(b"test-secret".to_vec())).configure(setup(VoteHub::new()))).await;
        let owner = Uuid::new_v4();
        let stranger = Uuid::new_v4();
        let req = test::TestRequest::post().uri("/api/polls").insert_header(bearer(owner)).set_json(poll_body()).to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        let uri = format!("/api/polls/{}", body["poll"]["id"].as_str().unwrap());

        let req = test::TestRequest::put().uri(&uri).insert_header(bearer(stranger)).set_json(json!({"title": "mine"})).to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::FORBIDDEN);

        let req = test::TestRequest::put()
            .uri(&uri)
            .insert_header(bearer(owner))
            .set_json(json!({"title": "Dinner?", "expires_at": null}))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["poll"]["title"], "Dinner?");
        assert_eq!(body["poll"]["options"][0]["text"], "Pizza");

        let req = test::TestRequest::delete().uri(&uri).insert_header(bearer(stranger)).to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::FORBIDDEN);

        let req = test::TestRequest::delete().uri(&uri).insert_header(bearer(owner)).to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["message"], "Poll deleted successfully");

        let req = test::TestRequest::get().uri(&uri).insert_header(bearer(owner)).to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);
    }

    #[actix_web::test]
    async fn test_bad_query_and_path_are_json_errors() {
        let app = test::init_service(App::new().wrap(JWTMiddleware::new(b"test-secret".to_vec())).configure(setup(VoteHub::new()))).await;
        let owner = Uuid::new_v4();
        for uri in ["/api/polls?page=abc", "/api/polls?page=9223372036854775807&size=20"] {
            let req = test::TestRequest::get().uri(uri).insert_header(bearer(owner)).to_request();
            let resp = test::call_service(&app, req).await;
            assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
            let body: Value = test::read_body_json(resp).await;
            assert!(body["error"].is_string());
        }

        let req = test::TestRequest::get().uri("/api/polls/not-a-uuid").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["error"], "Poll not found");
    }

    #[actix_web::test]
    async fn test_long_title_is_bad_request() {
        let app = test::init_service(App::new().wrap(JWTMiddleware::new(b"test-secret".to_vec())).configure(setup(VoteHub::new()))).await;
        let req = test::TestRequest::post()
            .uri("/api/polls")
            .insert_header(bearer(Uuid::new_v4()))
            .set_json(json!({"title": "x".repeat(500), "options": [{"text": "a"}, {"text": "b"}]}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn test_invalid_token_rejected() {
        let app = test::init_service(App::new().wrap(JWTMiddleware::new(b"test-secret".to_vec())).configure(setup(VoteHub::new()))).await;
        let req = test::TestRequest::get().uri("/api/polls").insert_header(("Authorization", "Bearer nope")).to_request();
        let err = test::try_call_service(&app, req).await.err().unwrap();
        assert_eq!(err.as_response_error().status_code(), StatusCode::UNAUTHORIZED);
    }
}
