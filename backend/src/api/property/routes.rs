//! Defines the HTTP routes for the property registry.

use axum::routing::{get, post, put};
use axum::Router;

use super::handlers::*;
use crate::state::AppState;

pub fn property_router() -> Router<AppState> {
    Router::new()
        .route("/buildings", get(list_buildings))
        .route("/buildings/:id", get(building_tree))
        .route("/parking", get(parking_trees))
        .route("/admin/buildings", post(create_building))
        .route("/admin/buildings/:id", put(update_building).delete(delete_building))
        .route("/admin/buildings/:id/entrances", post(create_entrance))
        .route("/admin/entrances/:id", put(renumber_entrance).delete(delete_entrance))
        .route("/admin/entrances/:id/floors", post(create_floor))
        .route("/admin/floors/:id", put(renumber_floor).delete(delete_floor))
        .route("/admin/floors/:id/apartments", post(create_apartment))
        .route("/admin/apartments/:id", put(update_apartment).delete(delete_apartment))
        .route("/admin/parking", post(create_parking))
        .route("/admin/parking/:id", put(update_parking).delete(delete_parking))
        .route("/admin/parking/:id/floors", post(create_parking_floor))
        .route(
            "/admin/parking-floors/:id",
            put(renumber_parking_floor).delete(delete_parking_floor),
        )
        .route("/admin/parking-floors/:id/spots", post(create_parking_spot))
        .route(
            "/admin/parking-spots/:id",
            put(update_parking_spot).delete(delete_parking_spot),
        )
}
