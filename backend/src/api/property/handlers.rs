//! Handler functions for the property registry API.
//!
//! Reads are public. Every mutation requires the `buildings` feature and is audited as
//! `<level>.<verb>`.

use axum::extract::State;
use axum::http::StatusCode;
use serde::Deserialize;
use serde_json::json;

use crate::api::extract::{Json, Path};
use crate::api::{required, with_db, with_tx};
use crate::auth::{require_feature, AdminFeature, CurrentUser};
use crate::database::models::{
    Apartment, Building, BuildingTree, Entrance, Floor, ParkingFloor, ParkingSpot,
    ParkingStructure, ParkingTree,
};
use crate::database::queries::property::{self, Level};
use crate::errors::{AppError, AppResult};
use crate::services::audit;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct BuildingBody {
    pub number: String,
    pub title: String,
    #[serde(default)]
    pub address: String,
}

#[derive(Debug, Deserialize)]
pub struct NumberBody {
    pub number: i64,
}

#[derive(Debug, Deserialize)]
pub struct UnitBody {
    pub number: String,
    #[serde(default)]
    pub area: Option<f64>,
    #[serde(default)]
    pub rooms: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct ParkingBody {
    pub title: String,
    #[serde(default)]
    pub address: String,
}

fn staff(user: &CurrentUser) -> AppResult<i64> {
    require_feature(user, AdminFeature::Buildings)?;
    Ok(user.id())
}

fn check_area(area: Option<f64>) -> AppResult<Option<f64>> {
    match area {
        Some(a) if !a.is_finite() || a <= 0.0 => Err(AppError::validation("area must be positive")),
        other => Ok(other),
    }
}

fn check_rooms(rooms: Option<i64>) -> AppResult<Option<i64>> {
    match rooms {
        Some(r) if r <= 0 => Err(AppError::validation("rooms must be positive")),
        other => Ok(other),
    }
}

pub async fn list_buildings(State(state): State<AppState>) -> AppResult<Json<Vec<Building>>> {
    let buildings = with_db(&state, |conn| Ok(property::list_buildings(conn)?)).await?;
    Ok(Json(buildings))
}

pub async fn building_tree(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<Json<BuildingTree>> {
    let tree = with_db(&state, move |conn| Ok(property::building_tree(conn, id)?)).await?;
    Ok(Json(tree))
}

pub async fn parking_trees(State(state): State<AppState>) -> AppResult<Json<Vec<ParkingTree>>> {
    let trees = with_db(&state, |conn| Ok(property::parking_trees(conn)?)).await?;
    Ok(Json(trees))
}

pub async fn create_building(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(body): Json<BuildingBody>,
) -> AppResult<(StatusCode, Json<Building>)> {
    let actor = staff(&user)?;
    let number = required(&body.number, "number")?;
    let title = required(&body.title, "title")?;
    let address = body.address.trim().to_string();

    let building = with_tx(&state, move |conn| {
        let building = property::insert_building(conn, &number, &title, &address)?;
        audit::record(
            conn,
            actor,
            "building.create",
            "building",
            Some(building.id),
            json!({ "number": building.number }),
        )?;
        Ok(building)
    })
    .await?;
    Ok((StatusCode::CREATED, Json(building)))
}

pub async fn update_building(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<i64>,
    Json(body): Json<BuildingBody>,
) -> AppResult<Json<Building>> {
    let actor = staff(&user)?;
    let number = required(&body.number, "number")?;
    let title = required(&body.title, "title")?;
    let address = body.address.trim().to_string();

    let building = with_tx(&state, move |conn| {
        let building = property::update_building(conn, id, &number, &title, &address)?;
        audit::record(
            conn,
            actor,
            "building.update",
            "building",
            Some(id),
            json!({ "number": building.number, "title": building.title }),
        )?;
        Ok(building)
    })
    .await?;
    Ok(Json(building))
}

async fn remove(state: &AppState, user: &CurrentUser, level: Level, id: i64) -> AppResult<StatusCode> {
    let actor = staff(user)?;
    let entity = level.noun().replace(' ', "_");
    with_tx(state, move |conn| {
        property::delete(conn, level, id)?;
        audit::record(conn, actor, &format!("{entity}.delete"), &entity, Some(id), json!({}))?;
        Ok(())
    })
    .await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn renumber(
    state: &AppState,
    user: &CurrentUser,
    level: Level,
    id: i64,
    number: i64,
) -> AppResult<StatusCode> {
    let actor = staff(user)?;
    let entity = level.noun().replace(' ', "_");
    with_tx(state, move |conn| {
        property::renumber(conn, level, id, number)?;
        audit::record(
            conn,
            actor,
            &format!("{entity}.update"),
            &entity,
            Some(id),
            json!({ "number": number }),
        )?;
        Ok(())
    })
    .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn delete_building(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<i64>,
) -> AppResult<StatusCode> {
    remove(&state, &user, Level::Building, id).await
}

pub async fn create_entrance(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(building_id): Path<i64>,
    Json(body): Json<NumberBody>,
) -> AppResult<(StatusCode, Json<Entrance>)> {
    let actor = staff(&user)?;
    let entrance = with_tx(&state, move |conn| {
        let entrance = property::insert_entrance(conn, building_id, body.number)?;
        audit::record(
            conn,
            actor,
            "entrance.create",
            "entrance",
            Some(entrance.id),
            json!({ "building_id": building_id, "number": body.number }),
        )?;
        Ok(entrance)
    })
    .await?;
    Ok((StatusCode::CREATED, Json(entrance)))
}

pub async fn renumber_entrance(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<i64>,
    Json(body): Json<NumberBody>,
) -> AppResult<StatusCode> {
    renumber(&state, &user, Level::Entrance, id, body.number).await
}

pub async fn delete_entrance(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<i64>,
) -> AppResult<StatusCode> {
    remove(&state, &user, Level::Entrance, id).await
}

pub async fn create_floor(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(entrance_id): Path<i64>,
    Json(body): Json<NumberBody>,
) -> AppResult<(StatusCode, Json<Floor>)> {
    let actor = staff(&user)?;
    let floor = with_tx(&state, move |conn| {
        let floor = property::insert_floor(conn, entrance_id, body.number)?;
        audit::record(
            conn,
            actor,
            "floor.create",
            "floor",
            Some(floor.id),
            json!({ "entrance_id": entrance_id, "number": body.number }),
        )?;
        Ok(floor)
    })
    .await?;
    Ok((StatusCode::CREATED, Json(floor)))
}

pub async fn renumber_floor(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<i64>,
    Json(body): Json<NumberBody>,
) -> AppResult<StatusCode> {
    renumber(&state, &user, Level::Floor, id, body.number).await
}

pub async fn delete_floor(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<i64>,
) -> AppResult<StatusCode> {
    remove(&state, &user, Level::Floor, id).await
}

pub async fn create_apartment(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(floor_id): Path<i64>,
    Json(body): Json<UnitBody>,
) -> AppResult<(StatusCode, Json<Apartment>)> {
    let actor = staff(&user)?;
    let number = required(&body.number, "number")?;
    let area = check_area(body.area)?;
    let rooms = check_rooms(body.rooms)?;

    let apartment = with_tx(&state, move |conn| {
        let apartment = property::insert_apartment(conn, floor_id, &number, area, rooms)?;
        audit::record(
            conn,
            actor,
            "apartment.create",
            "apartment",
            Some(apartment.id),
            json!({ "floor_id": floor_id, "number": apartment.number }),
        )?;
        Ok(apartment)
    })
    .await?;
    Ok((StatusCode::CREATED, Json(apartment)))
}

pub async fn update_apartment(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<i64>,
    Json(body): Json<UnitBody>,
) -> AppResult<Json<Apartment>> {
    let actor = staff(&user)?;
    let number = required(&body.number, "number")?;
    let area = check_area(body.area)?;
    let rooms = check_rooms(body.rooms)?;

    let apartment = with_tx(&state, move |conn| {
        let apartment = property::update_apartment(conn, id, &number, area, rooms)?;
        audit::record(
            conn,
            actor,
            "apartment.update",
            "apartment",
            Some(id),
            json!({ "number": apartment.number, "area": area, "rooms": rooms }),
        )?;
        Ok(apartment)
    })
    .await?;
    Ok(Json(apartment))
}

pub async fn delete_apartment(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<i64>,
) -> AppResult<StatusCode> {
    remove(&state, &user, Level::Apartment, id).await
}

pub async fn create_parking(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(body): Json<ParkingBody>,
) -> AppResult<(StatusCode, Json<ParkingStructure>)> {
    let actor = staff(&user)?;
    let title = required(&body.title, "title")?;
    let address = body.address.trim().to_string();

    let structure = with_tx(&state, move |conn| {
        let structure = property::insert_parking_structure(conn, &title, &address)?;
        audit::record(
            conn,
            actor,
            "parking_structure.create",
            "parking_structure",
            Some(structure.id),
            json!({ "title": structure.title }),
        )?;
        Ok(structure)
    })
    .await?;
    Ok((StatusCode::CREATED, Json(structure)))
}

pub async fn update_parking(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<i64>,
    Json(body): Json<ParkingBody>,
) -> AppResult<Json<ParkingStructure>> {
    let actor = staff(&user)?;
    let title = required(&body.title, "title")?;
    let address = body.address.trim().to_string();

    let structure = with_tx(&state, move |conn| {
        let structure = property::update_parking_structure(conn, id, &title, &address)?;
        audit::record(
            conn,
            actor,
            "parking_structure.update",
            "parking_structure",
            Some(id),
            json!({ "title": structure.title }),
        )?;
        Ok(structure)
    })
    .await?;
    Ok(Json(structure))
}

pub async fn delete_parking(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<i64>,
) -> AppResult<StatusCode> {
    remove(&state, &user, Level::ParkingStructure, id).await
}

pub async fn create_parking_floor(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(structure_id): Path<i64>,
    Json(body): Json<NumberBody>,
) -> AppResult<(StatusCode, Json<ParkingFloor>)> {
    let actor = staff(&user)?;
    let floor = with_tx(&state, move |conn| {
        let floor = property::insert_parking_floor(conn, structure_id, body.number)?;
        audit::record(
            conn,
            actor,
            "parking_floor.create",
            "parking_floor",
            Some(floor.id),
            json!({ "structure_id": structure_id, "number": body.number }),
        )?;
        Ok(floor)
    })
    .await?;
    Ok((StatusCode::CREATED, Json(floor)))
}

pub async fn renumber_parking_floor(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<i64>,
    Json(body): Json<NumberBody>,
) -> AppResult<StatusCode> {
    renumber(&state, &user, Level::ParkingFloor, id, body.number).await
}

pub async fn delete_parking_floor(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<i64>,
) -> AppResult<StatusCode> {
    remove(&state, &user, Level::ParkingFloor, id).await
}

pub async fn create_parking_spot(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(floor_id): Path<i64>,
    Json(body): Json<UnitBody>,
) -> AppResult<(StatusCode, Json<ParkingSpot>)> {
    let actor = staff(&user)?;
    let number = required(&body.number, "number")?;
    let area = check_area(body.area)?;

    let spot = with_tx(&state, move |conn| {
        let spot = property::insert_parking_spot(conn, floor_id, &number, area)?;
        audit::record(
            conn,
            actor,
            "parking_spot.create",
            "parking_spot",
            Some(spot.id),
            json!({ "floor_id": floor_id, "number": spot.number }),
        )?;
        Ok(spot)
    })
    .await?;
    Ok((StatusCode::CREATED, Json(spot)))
}

pub async fn update_parking_spot(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<i64>,
    Json(body): Json<UnitBody>,
) -> AppResult<Json<ParkingSpot>> {
    let actor = staff(&user)?;
    let number = required(&body.number, "number")?;
    let area = check_area(body.area)?;

    let spot = with_tx(&state, move |conn| {
        let spot = property::update_parking_spot(conn, id, &number, area)?;
        audit::record(
            conn,
            actor,
            "parking_spot.update",
            "parking_spot",
            Some(id),
            json!({ "number": spot.number, "area": area }),
        )?;
        Ok(spot)
    })
    .await?;
    Ok(Json(spot))
}

pub async fn delete_parking_spot(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<i64>,
) -> AppResult<StatusCode> {
    remove(&state, &user, Level::ParkingSpot, id).await
}
