use chrono::Utc;
use rocket::{http::Status, serde::json::Json, Route, State};

use crate::{
    engine::{elections, results},
    error::Result,
    model::{
        api::{
            auth::Principal,
            election::{AnnouncedResults, ElectionPatch, ElectionSpec, ElectionStats, VisibleElection},
        },
        mongodb::Id,
    },
    store::Store,
};

pub fn routes() -> Vec<Route> {
    routes![
        election_stats,
        create_election,
        update_election,
        delete_election,
        cancel_election,
        announce_results,
    ]
}

#[get("/elections/stats")]
async fn election_stats(principal: Principal, store: &State<Store>) -> Result<Json<ElectionStats>> {
    let stats = elections::election_stats(store.inner().as_ref(), &principal, Utc::now()).await?;
    Ok(Json(stats))
}

#[post("/elections", data = "<spec>", format = "json")]
async fn create_election(
    principal: Principal,
    spec: Json<ElectionSpec>,
    store: &State<Store>,
) -> Result<(Status, Json<VisibleElection>)> {
    let election =
        elections::create_election(store.inner().as_ref(), &principal, spec.0, Utc::now()).await?;
    Ok((Status::Created, Json(election)))
}

#[put("/elections/<election_id>", data = "<patch>", format = "json")]
async fn update_election(
    principal: Principal,
    election_id: Id,
    patch: Json<ElectionPatch>,
    store: &State<Store>,
) -> Result<Json<VisibleElection>> {
    let election = elections::update_election(
        store.inner().as_ref(),
        &principal,
        election_id,
        patch.0,
        Utc::now(),
    )
    .await?;
    Ok(Json(election))
}

#[delete("/elections/<election_id>")]
async fn delete_election(principal: Principal, election_id: Id, store: &State<Store>) -> Result<Status> {
    elections::delete_election(store.inner().as_ref(), &principal, election_id, Utc::now()).await?;
    Ok(Status::NoContent)
}

#[post("/elections/<election_id>/cancel")]
async fn cancel_election(
    principal: Principal,
    election_id: Id,
    store: &State<Store>,
) -> Result<Json<VisibleElection>> {
    let election =
        elections::cancel_election(store.inner().as_ref(), &principal, election_id, Utc::now())
            .await?;
    Ok(Json(election))
}

#[post("/elections/<election_id>/announce")]
async fn announce_results(
    principal: Principal,
    election_id: Id,
    store: &State<Store>,
) -> Result<Json<AnnouncedResults>> {
    let results =
        results::announce_results(store.inner().as_ref(), &principal, election_id, Utc::now())
            .await?;
    Ok(Json(results))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Duration;
    use rocket::{
        http::{ContentType, Status},
        local::asynchronous::Client,
        serde::json::{serde_json, Value},
    };

    use super::*;
    use crate::{
        api::test_util::bearer,
        config::Config,
        model::{api::auth::Rights, db::election::ElectionCore},
        store::{ElectionStore, MemoryElectionStore},
    };

    async fn setup() -> (Client, Arc<MemoryElectionStore>) {
        let store = Arc::new(MemoryElectionStore::new(40));
        let client = Client::tracked(crate::rocket_for_store(store.clone(), Config::example()))
            .await
            .unwrap();
        (client, store)
    }

    #[rocket::async_test]
    async fn create_requires_admin_and_valid_spec() {
        let (client, _) = setup().await;
        let spec = ElectionSpec::example(Utc::now() + Duration::hours(1));

        let response = client
            .post(uri!(create_election))
            .header(ContentType::JSON)
            .header(bearer(Rights::Voter))
            .body(serde_json::to_string(&spec).unwrap())
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Forbidden);

        let response = client
            .post(uri!(create_election))
            .header(ContentType::JSON)
            .body(serde_json::to_string(&spec).unwrap())
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Unauthorized);

        let mut lonely = spec.clone();
        lonely.candidates.truncate(1);
        let response = client
            .post(uri!(create_election))
            .header(ContentType::JSON)
            .header(bearer(Rights::Admin))
            .body(serde_json::to_string(&lonely).unwrap())
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::BadRequest);

        let response = client
            .post(uri!(create_election))
            .header(ContentType::JSON)
            .header(bearer(Rights::Admin))
            .body(serde_json::to_string(&spec).unwrap())
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Created);
        let body: Value = serde_json::from_str(&response.into_string().await.unwrap()).unwrap();
        assert_eq!(body["status"], "upcoming");
        assert_eq!(body["eligible_voter_count"], 40);
        assert_eq!(body["election_type"], "president");
        assert_eq!(body["can_vote"], false);
    }

    #[rocket::async_test]
    async fn active_elections_reject_edits_and_deletion() {
        let (client, store) = setup().await;
        let election = store.insert(ElectionCore::active_example()).await.unwrap();

        let response = client
            .put(uri!(update_election(election.id)))
            .header(ContentType::JSON)
            .header(bearer(Rights::Admin))
            .body(r#"{"title": "A different title"}"#)
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Conflict);
        let body: Value = serde_json::from_str(&response.into_string().await.unwrap()).unwrap();
        assert_eq!(body["error"], "state_conflict");

        let response = client
            .delete(uri!(delete_election(election.id)))
            .header(bearer(Rights::Admin))
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Conflict);
    }

    #[rocket::async_test]
    async fn announce_and_cancel_follow_the_lifecycle() {
        let (client, store) = setup().await;
        let active = store.insert(ElectionCore::active_example()).await.unwrap();
        let completed = store.insert(ElectionCore::completed_example()).await.unwrap();

        let response = client
            .post(uri!(announce_results(active.id)))
            .header(bearer(Rights::Admin))
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Conflict);

        let response = client
            .post(uri!(announce_results(completed.id)))
            .header(bearer(Rights::Admin))
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Ok);
        let results: AnnouncedResults =
            serde_json::from_str(&response.into_string().await.unwrap()).unwrap();
        assert_eq!(results.winner.map(|w| *w.id), Some(completed.candidates[0].id));

        let response = client
            .post(uri!(cancel_election(completed.id)))
            .header(bearer(Rights::Admin))
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Conflict);

        let response = client
            .post(uri!(cancel_election(active.id)))
            .header(bearer(Rights::Admin))
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Ok);
        let body: Value = serde_json::from_str(&response.into_string().await.unwrap()).unwrap();
        assert_eq!(body["status"], "cancelled");

        let response = client
            .delete(uri!(delete_election(active.id)))
            .header(bearer(Rights::Admin))
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::NoContent);
    }

    #[rocket::async_test]
    async fn stats_are_admin_only() {
        let (client, store) = setup().await;
        store.insert(ElectionCore::active_example()).await.unwrap();

        let response = client
            .get(uri!(election_stats))
            .header(bearer(Rights::Voter))
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Forbidden);

        let response = client
            .get(uri!(election_stats))
            .header(bearer(Rights::Admin))
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Ok);
        let stats: ElectionStats =
            serde_json::from_str(&response.into_string().await.unwrap()).unwrap();
        assert_eq!(stats.total_elections, 1);
        assert_eq!(stats.active, 1);
    }
}
