use std::future::{ready, Ready};

use actix_web::{dev::Payload, error, http::StatusCode, FromRequest, HttpRequest, HttpResponse, ResponseError, Result};
use actix_web::web::{self, Data, Json, Path, ServiceConfig};

use crate::model::*;
use crate::operations::{Action, OperationError, PollOperationsT};
use crate::poll::ValidationError;
use crate::token::{ActionToken, TokenError};

pub const POLLS_PATH: &str = "/polls";
pub const POLL_PATH: &str = "/polls/{poll_id}";
pub const SUBMISSIONS_PATH: &str = "/polls/{poll_id}/submissions";
pub const BALLOT_PATH: &str = "/polls/{poll_id}/ballot";
pub const BALLOT_SLOT_PATH: &str = "/polls/{poll_id}/ballot/{rank}";
pub const LOCK_PATH: &str = "/polls/{poll_id}/lock";
pub const END_PATH: &str = "/polls/{poll_id}/end";
pub const RESULTS_PATH: &str = "/polls/{poll_id}/results";
pub const ACTIONS_PATH: &str = "/actions/{token}";

pub const ACTOR_ID: &str = "ACTOR-ID";
pub const ACTOR_NAME: &str = "ACTOR-NAME";

impl FromRequest for Actor {
    type Error = actix_web::Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        let header = |name: &str| -> Result<Option<String>, actix_web::Error> {
            req.headers()
                .get(name)
                .map(|value| value
                    .to_str()
                    .map(str::to_owned)
                    .map_err(|_| error::ErrorBadRequest(format!("Failed to handle header value for {}", name))))
                .transpose()
        };

        let actor = header(ACTOR_ID)
            .and_then(|id| id.ok_or_else(|| error::ErrorBadRequest(format!("Missing header: {}", ACTOR_ID))))
            .and_then(|id| {
                let display_name = header(ACTOR_NAME)?.unwrap_or_else(|| id.clone());
                Ok(Actor { id, display_name })
            });

        ready(actor)
    }
}

impl ResponseError for OperationError {
    fn status_code(&self) -> StatusCode {
        match self {
            OperationError::PollNotFound(_) => StatusCode::NOT_FOUND,
            OperationError::Conflict(_) => StatusCode::CONFLICT,
            OperationError::Invalid(ValidationError::NotCreator) => StatusCode::FORBIDDEN,
            OperationError::Invalid(_) | OperationError::MissingPayload(_) => StatusCode::BAD_REQUEST,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).body(self.to_string())
    }
}

impl ResponseError for TokenError {
    fn status_code(&self) -> StatusCode {
        StatusCode::BAD_REQUEST
    }
}

pub async fn create_poll_handler<A: 'static + PollOperationsT>(
    ops: Data<A>,
    body: Json<CreatePollRequest>,
    actor: Actor) -> Result<Json<PollView>>
{
    let view = ops.create_poll(&actor, &body).await?;
    Ok(Json(view))
}

pub async fn get_poll_handler<A: 'static + PollOperationsT>(
    ops: Data<A>,
    path: Path<String>) -> Result<Json<PollView>>
{
    let view = ops.get_poll(&path).await?;
    Ok(Json(view))
}

pub async fn remove_poll_handler<A: 'static + PollOperationsT>(
    ops: Data<A>,
    path: Path<String>,
    actor: Actor) -> Result<HttpResponse>
{
    ops.remove_poll(&actor, &path).await?;
    Ok(HttpResponse::NoContent().finish())
}

pub async fn post_submission_handler<A: 'static + PollOperationsT>(
    ops: Data<A>,
    path: Path<String>,
    body: Json<SubmissionRequest>,
    actor: Actor) -> Result<Json<PollView>>
{
    let view = ops.add_submission(&actor, &path, &body).await?;
    Ok(Json(view))
}

pub async fn put_ballot_slot_handler<A: 'static + PollOperationsT>(
    ops: Data<A>,
    path: Path<(String, usize)>,
    body: Json<SelectionRequest>,
    actor: Actor) -> Result<Json<BallotView>>
{
    let (poll_id, rank) = path.into_inner();
    let ballot = ops.upsert_vote(&actor, &poll_id, rank, body.candidate).await?;
    Ok(Json(ballot))
}

pub async fn finalize_ballot_handler<A: 'static + PollOperationsT>(
    ops: Data<A>,
    path: Path<String>,
    actor: Actor) -> Result<Json<BallotView>>
{
    let ballot = ops.finalize_vote(&actor, &path).await?;
    Ok(Json(ballot))
}

pub async fn lock_handler<A: 'static + PollOperationsT>(
    ops: Data<A>,
    path: Path<String>,
    actor: Actor) -> Result<Json<PollView>>
{
    let view = ops.lock(&actor, &path).await?;
    Ok(Json(view))
}

pub async fn end_handler<A: 'static + PollOperationsT>(
    ops: Data<A>,
    path: Path<String>,
    actor: Actor) -> Result<Json<PollView>>
{
    let view = ops.end(&actor, &path).await?;
    Ok(Json(view))
}

pub async fn results_handler<A: 'static + PollOperationsT>(
    ops: Data<A>,
    path: Path<String>) -> Result<Json<ResultsView>>
{
    let results = ops.results(&path).await?;
    Ok(Json(results))
}

pub async fn action_handler<A: 'static + PollOperationsT>(
    ops: Data<A>,
    path: Path<String>,
    body: Option<Json<ActionPayload>>,
    actor: Actor) -> Result<Json<ActionOutcome>>
{
    let token: ActionToken = path.parse()?;
    let payload = body.map(Json::into_inner).unwrap_or_default();
    let action = Action::resolve(&token, payload)?;
    let outcome = ops.dispatch(&actor, &token.poll_id, action).await?;
    Ok(Json(outcome))
}

pub fn config<A: 'static + PollOperationsT>(cfg: &mut ServiceConfig) {
    cfg.route(POLLS_PATH, web::post().to(create_poll_handler::<A>))
        .service(web::resource(POLL_PATH)
            .route(web::get().to(get_poll_handler::<A>))
            .route(web::delete().to(remove_poll_handler::<A>)))
        .route(SUBMISSIONS_PATH, web::post().to(post_submission_handler::<A>))
        .route(BALLOT_PATH, web::post().to(finalize_ballot_handler::<A>))
        .route(BALLOT_SLOT_PATH, web::put().to(put_ballot_slot_handler::<A>))
        .route(LOCK_PATH, web::post().to(lock_handler::<A>))
        .route(END_PATH, web::post().to(end_handler::<A>))
        .route(RESULTS_PATH, web::get().to(results_handler::<A>))
        .route(ACTIONS_PATH, web::post().to(action_handler::<A>));
}

#[cfg(test)]
mod tests {
    use actix_web::{test, App};
    use crate::operations::MockPollOperationsT;
    use crate::poll::test_poll::{self, epoch, CREATOR};
    use crate::poll::Phase;
    use super::*;

    fn mock_view() -> PollView {
        PollView::new(&test_poll::voting_poll(&["chess", "go"]), epoch())
    }

    macro_rules! init_app {
        ($mock_ops:expr) => {
            test::init_service(
                App::new()
                    .app_data(Data::new($mock_ops))
                    .configure(config::<MockPollOperationsT>)
            ).await
        };
    }

    #[actix_web::test]
    async fn test_create_poll() {
        let mut mock_ops = MockPollOperationsT::new();
        let mock_response = Ok(mock_view());
        mock_ops.expect_create_poll()
            .withf(|actor, request| actor.id == CREATOR && actor.display_name == "Creator" && request.hours == 24)
            .return_once(move |_, _| mock_response);
        let app = init_app!(mock_ops);

        let request_body = CreatePollRequest {
            group_id: "guild".to_owned(),
            channel_id: "channel".to_owned(),
            hours: 24,
            render_target: None,
        };
        let request = test::TestRequest::post()
            .uri(POLLS_PATH)
            .insert_header((ACTOR_ID, CREATOR))
            .insert_header((ACTOR_NAME, "Creator"))
            .set_json(&request_body)
            .to_request();
        let response = test::call_service(&app, request).await;

        assert_eq!(StatusCode::OK, response.status());
        let response_body: PollView = test::read_body_json(response).await;
        assert_eq!(mock_view(), response_body);
    }

    #[actix_web::test]
    async fn missing_actor() {
        let app = init_app!(MockPollOperationsT::new());

        let request = test::TestRequest::post()
            .uri("/polls/guild-1700000000/lock")
            .to_request();
        let response = test::call_service(&app, request).await;

        assert_eq!(StatusCode::BAD_REQUEST, response.status());
    }

    #[actix_web::test]
    async fn get_poll_not_found() {
        let mut mock_ops = MockPollOperationsT::new();
        mock_ops.expect_get_poll()
            .withf(|poll_id| poll_id == "missing")
            .return_once(|poll_id| Err(OperationError::PollNotFound(poll_id.to_owned())));
        let app = init_app!(mock_ops);

        let request = test::TestRequest::get().uri("/polls/missing").to_request();
        let response = test::call_service(&app, request).await;

        assert_eq!(StatusCode::NOT_FOUND, response.status());
    }

    #[actix_web::test]
    async fn remove_poll() {
        let mut mock_ops = MockPollOperationsT::new();
        mock_ops.expect_remove_poll().return_once(|_, _| Ok(()));
        let app = init_app!(mock_ops);

        let request = test::TestRequest::delete()
            .uri("/polls/guild-1700000000")
            .insert_header((ACTOR_ID, CREATOR))
            .to_request();
        let response = test::call_service(&app, request).await;

        assert_eq!(StatusCode::NO_CONTENT, response.status());
    }

    #[actix_web::test]
    async fn lock_not_creator() {
        let mut mock_ops = MockPollOperationsT::new();
        mock_ops.expect_lock()
            .return_once(|_, _| Err(OperationError::Invalid(ValidationError::NotCreator)));
        let app = init_app!(mock_ops);

        let request = test::TestRequest::post()
            .uri("/polls/guild-1700000000/lock")
            .insert_header((ACTOR_ID, "someone"))
            .to_request();
        let response = test::call_service(&app, request).await;

        assert_eq!(StatusCode::FORBIDDEN, response.status());
    }

    #[actix_web::test]
    async fn create_conflict() {
        let mut mock_ops = MockPollOperationsT::new();
        mock_ops.expect_create_poll()
            .return_once(|_, _| Err(OperationError::Conflict("guild-1700000000".to_owned())));
        let app = init_app!(mock_ops);

        let request = test::TestRequest::post()
            .uri(POLLS_PATH)
            .insert_header((ACTOR_ID, CREATOR))
            .set_json(&CreatePollRequest {
                group_id: "guild".to_owned(),
                channel_id: "channel".to_owned(),
                hours: 1,
                render_target: None,
            })
            .to_request();
        let response = test::call_service(&app, request).await;

        assert_eq!(StatusCode::CONFLICT, response.status());
    }

    #[actix_web::test]
    async fn create_rejects_group_id() {
        let mut mock_ops = MockPollOperationsT::new();
        mock_ops.expect_create_poll()
            .return_once(|_, request| Err(OperationError::Invalid(
                ValidationError::InvalidGroupId(request.group_id.clone()))));
        let app = init_app!(mock_ops);

        let request = test::TestRequest::post()
            .uri(POLLS_PATH)
            .insert_header((ACTOR_ID, CREATOR))
            .set_json(&CreatePollRequest {
                group_id: "my_guild".to_owned(),
                channel_id: "channel".to_owned(),
                hours: 24,
                render_target: None,
            })
            .to_request();
        let response = test::call_service(&app, request).await;

        assert_eq!(StatusCode::BAD_REQUEST, response.status());
    }

    #[actix_web::test]
    async fn submission_rejected() {
        let mut mock_ops = MockPollOperationsT::new();
        mock_ops.expect_add_submission()
            .return_once(|_, _, _| Err(OperationError::Invalid(ValidationError::SubmissionsFull)));
        let app = init_app!(mock_ops);

        let request = test::TestRequest::post()
            .uri("/polls/guild-1700000000/submissions")
            .insert_header((ACTOR_ID, "alice"))
            .set_json(&SubmissionRequest { name: "chess".to_owned(), description: String::new(), link: None })
            .to_request();
        let response = test::call_service(&app, request).await;

        assert_eq!(StatusCode::BAD_REQUEST, response.status());
        let body = test::read_body(response).await;
        assert_eq!(ValidationError::SubmissionsFull.to_string().as_bytes(), &body[..]);
    }

    #[actix_web::test]
    async fn put_ballot_slot() {
        let mut mock_ops = MockPollOperationsT::new();
        let ballot = BallotView {
            poll_id: "guild-1700000000".to_owned(),
            owner_id: "voter".to_owned(),
            rankings: vec![-1, 1],
            voted_at: None,
        };
        let mock_response = Ok(ballot.clone());
        mock_ops.expect_upsert_vote()
            .withf(|actor, poll_id, rank, candidate|
                actor.id == "voter" && poll_id == "guild-1700000000" && *rank == 1 && *candidate == 1)
            .return_once(move |_, _, _, _| mock_response);
        let app = init_app!(mock_ops);

        let request = test::TestRequest::put()
            .uri("/polls/guild-1700000000/ballot/1")
            .insert_header((ACTOR_ID, "voter"))
            .set_json(&SelectionRequest { candidate: 1 })
            .to_request();
        let response = test::call_service(&app, request).await;

        assert_eq!(StatusCode::OK, response.status());
        let response_body: BallotView = test::read_body_json(response).await;
        assert_eq!(ballot, response_body);
    }

    mod actions {
        use super::*;

        #[actix_web::test]
        async fn routes_token() {
            let mut mock_ops = MockPollOperationsT::new();
            let mock_response = Ok(ActionOutcome::Poll(mock_view()));
            mock_ops.expect_dispatch()
                .withf(|actor, poll_id, action|
                    actor.id == "voter"
                        && poll_id == "guild-1700000000"
                        && *action == Action::VoteSelect { rank: 2, candidate: 0 })
                .return_once(move |_, _, _| mock_response);
            let app = init_app!(mock_ops);

            let request = test::TestRequest::post()
                .uri("/actions/vote-select_guild-1700000000_2")
                .insert_header((ACTOR_ID, "voter"))
                .set_json(&ActionPayload { submission: None, selection: Some(0) })
                .to_request();
            let response = test::call_service(&app, request).await;

            assert_eq!(StatusCode::OK, response.status());
            let outcome: ActionOutcome = test::read_body_json(response).await;
            match outcome {
                ActionOutcome::Poll(view) => assert_eq!(Phase::Voting, view.phase),
                _ => panic!("Expected Poll {:?}", outcome),
            }
        }

        #[actix_web::test]
        async fn button_without_body() {
            let mut mock_ops = MockPollOperationsT::new();
            let mock_response = Ok(ActionOutcome::Poll(mock_view()));
            mock_ops.expect_dispatch()
                .withf(|_, _, action| *action == Action::Lock)
                .return_once(move |_, _, _| mock_response);
            let app = init_app!(mock_ops);

            let request = test::TestRequest::post()
                .uri("/actions/lock_guild-1700000000")
                .insert_header((ACTOR_ID, CREATOR))
                .to_request();
            let response = test::call_service(&app, request).await;

            assert_eq!(StatusCode::OK, response.status());
        }

        #[actix_web::test]
        async fn unknown_kind() {
            let app = init_app!(MockPollOperationsT::new());

            let request = test::TestRequest::post()
                .uri("/actions/vote-cast_guild-1700000000_0")
                .insert_header((ACTOR_ID, "voter"))
                .to_request();
            let response = test::call_service(&app, request).await;

            assert_eq!(StatusCode::BAD_REQUEST, response.status());
        }

        #[actix_web::test]
        async fn missing_payload() {
            let app = init_app!(MockPollOperationsT::new());

            let request = test::TestRequest::post()
                .uri("/actions/submit-modal_guild-1700000000")
                .insert_header((ACTOR_ID, "alice"))
                .set_json(&ActionPayload::default())
                .to_request();
            let response = test::call_service(&app, request).await;

            assert_eq!(StatusCode::BAD_REQUEST, response.status());
        }
    }
}
