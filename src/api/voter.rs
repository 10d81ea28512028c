use std::net::IpAddr;

use chrono::Utc;
use rocket::{serde::json::Json, Route, State};

use crate::{
    engine::voting,
    error::Result,
    model::{
        api::{
            auth::Principal,
            receipt::{VoteReceipt, VoteRequest, VoteStatus},
        },
        mongodb::Id,
    },
    store::Store,
};

pub fn routes() -> Vec<Route> {
    routes![cast_vote, has_voted]
}

#[post("/elections/<election_id>/vote", data = "<vote>", format = "json")]
async fn cast_vote(
    principal: Principal,
    election_id: Id,
    vote: Json<VoteRequest>,
    client_ip: Option<IpAddr>,
    store: &State<Store>,
) -> Result<Json<VoteReceipt>> {
    let receipt = voting::cast_vote(
        store.inner().as_ref(),
        &principal,
        election_id,
        *vote.candidate_id,
        client_ip.map(|ip| ip.to_string()),
        Utc::now(),
    )
    .await?;
    Ok(Json(receipt))
}

#[get("/elections/<election_id>/vote")]
async fn has_voted(
    principal: Principal,
    election_id: Id,
    store: &State<Store>,
) -> Result<Json<VoteStatus>> {
    let has_voted = voting::has_voted(store.inner().as_ref(), &principal, election_id).await?;
    Ok(Json(VoteStatus { has_voted }))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use rocket::{
        http::{ContentType, Status},
        local::asynchronous::Client,
        serde::json::{json, serde_json, Value},
    };

    use super::*;
    use crate::{
        api::test_util::{bearer, bearer_for},
        config::Config,
        model::{api::auth::Rights, db::election::ElectionCore},
        store::{ElectionStore, MemoryElectionStore},
    };

    #[rocket::async_test]
    async fn vote_then_repeat() {
        let store = Arc::new(MemoryElectionStore::new(0));
        let election = store.insert(ElectionCore::active_example()).await.unwrap();
        let (alice, bob) = (election.candidates[0].id, election.candidates[1].id);
        let client = Client::tracked(crate::rocket_for_store(store.clone(), Config::example()))
            .await
            .unwrap();
        let voter = Id::new();

        let response = client
            .post(uri!(cast_vote(election.id)))
            .header(ContentType::JSON)
            .header(bearer_for(voter, Rights::Voter))
            .body(json!({ "candidate_id": alice.to_hex() }).to_string())
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Ok);
        let receipt: VoteReceipt =
            serde_json::from_str(&response.into_string().await.unwrap()).unwrap();
        assert_eq!(receipt.total_votes, 1);
        assert!(receipt.has_voted);

        let response = client
            .post(uri!(cast_vote(election.id)))
            .header(ContentType::JSON)
            .header(bearer_for(voter, Rights::Voter))
            .body(json!({ "candidate_id": bob.to_hex() }).to_string())
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Conflict);
        let body: Value = serde_json::from_str(&response.into_string().await.unwrap()).unwrap();
        assert_eq!(body["error"], "already_voted");

        let response = client
            .get(uri!(has_voted(election.id)))
            .header(bearer_for(voter, Rights::Voter))
            .dispatch()
            .await;
        let status: VoteStatus = serde_json::from_str(&response.into_string().await.unwrap()).unwrap();
        assert!(status.has_voted);

        let stored = store.get(election.id).await.unwrap().unwrap();
        assert_eq!(stored.metadata.total_votes, 1);
        assert!(stored.tally_is_consistent());
    }

    #[rocket::async_test]
    async fn vote_failures_map_to_statuses() {
        let store = Arc::new(MemoryElectionStore::new(0));
        let active = store.insert(ElectionCore::active_example()).await.unwrap();
        let upcoming = store.insert(ElectionCore::upcoming_example()).await.unwrap();
        let alice = active.candidates[0].id;
        let client = Client::tracked(crate::rocket_for_store(store, Config::example()))
            .await
            .unwrap();
        let body = json!({ "candidate_id": alice.to_hex() }).to_string();

        let cases = [
            (active.id, None, Status::Unauthorized),
            (active.id, Some(Rights::Admin), Status::Forbidden),
            (upcoming.id, Some(Rights::Voter), Status::Conflict),
            (Id::new(), Some(Rights::Voter), Status::NotFound),
        ];
        for (election_id, rights, expected) in cases {
            let mut request = client
                .post(uri!(cast_vote(election_id)))
                .header(ContentType::JSON)
                .body(&body);
            if let Some(rights) = rights {
                request = request.header(bearer(rights));
            }
            assert_eq!(request.dispatch().await.status(), expected);
        }

        let response = client
            .post(uri!(cast_vote(active.id)))
            .header(ContentType::JSON)
            .header(bearer(Rights::Voter))
            .body(json!({ "candidate_id": Id::new().to_hex() }).to_string())
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::BadRequest);

        let response = client
            .post(uri!(cast_vote(active.id)))
            .header(ContentType::JSON)
            .header(rocket::http::Header::new("Authorization", "Bearer not-a-jwt"))
            .body(&body)
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Unauthorized);
    }
}
