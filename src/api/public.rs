use chrono::Utc;
use rocket::{serde::json::Json, Route, State};

use crate::{
    engine::elections,
    error::Result,
    model::{
        api::{
            auth::Principal,
            election::VisibleElection,
            query::{ElectionFilter, Paginated, Pagination},
        },
        mongodb::Id,
    },
    store::Store,
};

pub fn routes() -> Vec<Route> {
    routes![list_elections, get_election]
}

#[get("/elections")]
async fn list_elections(
    principal: Principal,
    filter: Result<ElectionFilter>,
    pagination: Result<Pagination>,
    store: &State<Store>,
) -> Result<Json<Paginated<VisibleElection>>> {
    let page = elections::list_elections(
        store.inner().as_ref(),
        &principal,
        &filter?,
        pagination?,
        Utc::now(),
    )
    .await?;
    Ok(Json(page))
}

#[get("/elections/<election_id>", rank = 2)]
async fn get_election(
    principal: Principal,
    election_id: Id,
    store: &State<Store>,
) -> Result<Json<VisibleElection>> {
    let election =
        elections::get_election(store.inner().as_ref(), &principal, election_id, Utc::now()).await?;
    Ok(Json(election))
}
