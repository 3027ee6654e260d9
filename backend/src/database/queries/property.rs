//! Buildings with their entrances, floors and apartments, and parking structures with
//! their floors and spots.

use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::database::models::{
    Apartment, Building, BuildingTree, Entrance, EntranceTree, Floor, FloorTree, ParkingFloor,
    ParkingFloorTree, ParkingSpot, ParkingStructure, ParkingTree, PropertyKind,
};
use crate::database::DbError;

/// Tables whose rows are addressed by plain id in the generic helpers below.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Building,
    Entrance,
    Floor,
    Apartment,
    ParkingStructure,
    ParkingFloor,
    ParkingSpot,
}

impl Level {
    fn table(self) -> &'static str {
        match self {
            Level::Building => "buildings",
            Level::Entrance => "entrances",
            Level::Floor => "floors",
            Level::Apartment => "apartments",
            Level::ParkingStructure => "parking_structures",
            Level::ParkingFloor => "parking_floors",
            Level::ParkingSpot => "parking_spots",
        }
    }

    pub fn noun(self) -> &'static str {
        match self {
            Level::Building => "building",
            Level::Entrance => "entrance",
            Level::Floor => "floor",
            Level::Apartment => "apartment",
            Level::ParkingStructure => "parking structure",
            Level::ParkingFloor => "parking floor",
            Level::ParkingSpot => "parking spot",
        }
    }

    fn property_kind(self) -> Option<PropertyKind> {
        match self {
            Level::Apartment => Some(PropertyKind::Apartment),
            Level::ParkingSpot => Some(PropertyKind::ParkingSpot),
            _ => None,
        }
    }
}

pub fn exists(conn: &Connection, level: Level, id: i64) -> Result<bool, DbError> {
    Ok(conn
        .query_row(
            &format!("SELECT 1 FROM {} WHERE id = ?1", level.table()),
            [id],
            |_| Ok(()),
        )
        .optional()?
        .is_some())
}

fn ensure_exists(conn: &Connection, level: Level, id: i64) -> Result<(), DbError> {
    if exists(conn, level, id)? {
        Ok(())
    } else {
        Err(DbError::NotFound(level.noun()))
    }
}

/// Deletes a row. Rows with children fail with a conflict through the foreign keys;
/// units with residents or open claims are refused explicitly.
pub fn delete(conn: &Connection, level: Level, id: i64) -> Result<(), DbError> {
    if let Some(kind) = level.property_kind() {
        let referenced: i64 = conn.query_row(
            "SELECT (SELECT COUNT(*) FROM property_links WHERE property_kind = ?1 AND property_id = ?2)
                  + (SELECT COUNT(*) FROM claims WHERE property_kind = ?1 AND property_id = ?2
                                                   AND status = 'pending')",
            params![kind, id],
            |row| row.get(0),
        )?;
        if referenced > 0 {
            return Err(DbError::Conflict(format!(
                "The {} has residents or pending claims",
                level.noun()
            )));
        }
    }

    let changed = conn.execute(&format!("DELETE FROM {} WHERE id = ?1", level.table()), [id])?;
    if changed == 0 {
        return Err(DbError::NotFound(level.noun()));
    }
    Ok(())
}

/// Renumbers an entrance or floor (of either kind).
pub fn renumber(conn: &Connection, level: Level, id: i64, number: i64) -> Result<(), DbError> {
    debug_assert!(matches!(
        level,
        Level::Entrance | Level::Floor | Level::ParkingFloor
    ));
    let changed = conn.execute(
        &format!("UPDATE {} SET number = ?2 WHERE id = ?1", level.table()),
        params![id, number],
    )?;
    if changed == 0 {
        return Err(DbError::NotFound(level.noun()));
    }
    Ok(())
}

fn map_building(row: &Row<'_>) -> rusqlite::Result<Building> {
    Ok(Building {
        id: row.get(0)?,
        number: row.get(1)?,
        title: row.get(2)?,
        address: row.get(3)?,
    })
}

pub fn list_buildings(conn: &Connection) -> Result<Vec<Building>, DbError> {
    let mut stmt = conn.prepare(
        "SELECT id, number, title, address FROM buildings ORDER BY length(number), number",
    )?;
    let rows = stmt.query_map([], map_building)?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

pub fn get_building(conn: &Connection, id: i64) -> Result<Building, DbError> {
    conn.query_row(
        "SELECT id, number, title, address FROM buildings WHERE id = ?1",
        [id],
        map_building,
    )
    .optional()?
    .ok_or(DbError::NotFound("building"))
}

pub fn insert_building(
    conn: &Connection,
    number: &str,
    title: &str,
    address: &str,
) -> Result<Building, DbError> {
    conn.execute(
        "INSERT INTO buildings (number, title, address) VALUES (?1, ?2, ?3)",
        params![number, title, address],
    )?;
    get_building(conn, conn.last_insert_rowid())
}

pub fn update_building(
    conn: &Connection,
    id: i64,
    number: &str,
    title: &str,
    address: &str,
) -> Result<Building, DbError> {
    let changed = conn.execute(
        "UPDATE buildings SET number = ?2, title = ?3, address = ?4 WHERE id = ?1",
        params![id, number, title, address],
    )?;
    if changed == 0 {
        return Err(DbError::NotFound("building"));
    }
    get_building(conn, id)
}

pub fn insert_entrance(conn: &Connection, building_id: i64, number: i64) -> Result<Entrance, DbError> {
    ensure_exists(conn, Level::Building, building_id)?;
    conn.execute(
        "INSERT INTO entrances (building_id, number) VALUES (?1, ?2)",
        params![building_id, number],
    )?;
    Ok(Entrance {
        id: conn.last_insert_rowid(),
        building_id,
        number,
    })
}

pub fn insert_floor(conn: &Connection, entrance_id: i64, number: i64) -> Result<Floor, DbError> {
    ensure_exists(conn, Level::Entrance, entrance_id)?;
    conn.execute(
        "INSERT INTO floors (entrance_id, number) VALUES (?1, ?2)",
        params![entrance_id, number],
    )?;
    Ok(Floor {
        id: conn.last_insert_rowid(),
        entrance_id,
        number,
    })
}

pub fn insert_apartment(
    conn: &Connection,
    floor_id: i64,
    number: &str,
    area: Option<f64>,
    rooms: Option<i64>,
) -> Result<Apartment, DbError> {
    ensure_exists(conn, Level::Floor, floor_id)?;
    conn.execute(
        "INSERT INTO apartments (floor_id, number, area, rooms) VALUES (?1, ?2, ?3, ?4)",
        params![floor_id, number, area, rooms],
    )?;
    Ok(Apartment {
        id: conn.last_insert_rowid(),
        floor_id,
        number: number.to_string(),
        area,
        rooms,
    })
}

pub fn update_apartment(
    conn: &Connection,
    id: i64,
    number: &str,
    area: Option<f64>,
    rooms: Option<i64>,
) -> Result<Apartment, DbError> {
    let changed = conn.execute(
        "UPDATE apartments SET number = ?2, area = ?3, rooms = ?4 WHERE id = ?1",
        params![id, number, area, rooms],
    )?;
    if changed == 0 {
        return Err(DbError::NotFound("apartment"));
    }
    Ok(conn.query_row(
        "SELECT id, floor_id, number, area, rooms FROM apartments WHERE id = ?1",
        [id],
        map_apartment,
    )?)
}

fn map_apartment(row: &Row<'_>) -> rusqlite::Result<Apartment> {
    Ok(Apartment {
        id: row.get(0)?,
        floor_id: row.get(1)?,
        number: row.get(2)?,
        area: row.get(3)?,
        rooms: row.get(4)?,
    })
}

/// A building with every entrance, floor and apartment, ordered by number.
pub fn building_tree(conn: &Connection, id: i64) -> Result<BuildingTree, DbError> {
    let building = get_building(conn, id)?;

    let mut entrances_stmt = conn.prepare(
        "SELECT id, building_id, number FROM entrances WHERE building_id = ?1 ORDER BY number",
    )?;
    let mut floors_stmt = conn
        .prepare("SELECT id, entrance_id, number FROM floors WHERE entrance_id = ?1 ORDER BY number")?;
    let mut apartments_stmt = conn.prepare(
        "SELECT id, floor_id, number, area, rooms FROM apartments WHERE floor_id = ?1
         ORDER BY length(number), number",
    )?;

    let entrances = entrances_stmt
        .query_map([id], |row| {
            Ok(Entrance {
                id: row.get(0)?,
                building_id: row.get(1)?,
                number: row.get(2)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let mut entrance_trees = Vec::with_capacity(entrances.len());
    for entrance in entrances {
        let floors = floors_stmt
            .query_map([entrance.id], |row| {
                Ok(Floor {
                    id: row.get(0)?,
                    entrance_id: row.get(1)?,
                    number: row.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut floor_trees = Vec::with_capacity(floors.len());
        for floor in floors {
            let apartments = apartments_stmt
                .query_map([floor.id], map_apartment)?
                .collect::<Result<Vec<_>, _>>()?;
            floor_trees.push(FloorTree { floor, apartments });
        }
        entrance_trees.push(EntranceTree {
            entrance,
            floors: floor_trees,
        });
    }

    Ok(BuildingTree {
        building,
        entrances: entrance_trees,
    })
}

pub fn insert_parking_structure(
    conn: &Connection,
    title: &str,
    address: &str,
) -> Result<ParkingStructure, DbError> {
    conn.execute(
        "INSERT INTO parking_structures (title, address) VALUES (?1, ?2)",
        params![title, address],
    )?;
    Ok(ParkingStructure {
        id: conn.last_insert_rowid(),
        title: title.to_string(),
        address: address.to_string(),
    })
}

pub fn insert_parking_floor(
    conn: &Connection,
    structure_id: i64,
    number: i64,
) -> Result<ParkingFloor, DbError> {
    ensure_exists(conn, Level::ParkingStructure, structure_id)?;
    conn.execute(
        "INSERT INTO parking_floors (structure_id, number) VALUES (?1, ?2)",
        params![structure_id, number],
    )?;
    Ok(ParkingFloor {
        id: conn.last_insert_rowid(),
        structure_id,
        number,
    })
}

pub fn insert_parking_spot(
    conn: &Connection,
    floor_id: i64,
    number: &str,
    area: Option<f64>,
) -> Result<ParkingSpot, DbError> {
    ensure_exists(conn, Level::ParkingFloor, floor_id)?;
    conn.execute(
        "INSERT INTO parking_spots (floor_id, number, area) VALUES (?1, ?2, ?3)",
        params![floor_id, number, area],
    )?;
    Ok(ParkingSpot {
        id: conn.last_insert_rowid(),
        floor_id,
        number: number.to_string(),
        area,
    })
}

pub fn update_parking_structure(
    conn: &Connection,
    id: i64,
    title: &str,
    address: &str,
) -> Result<ParkingStructure, DbError> {
    let changed = conn.execute(
        "UPDATE parking_structures SET title = ?2, address = ?3 WHERE id = ?1",
        params![id, title, address],
    )?;
    if changed == 0 {
        return Err(DbError::NotFound("parking structure"));
    }
    Ok(ParkingStructure {
        id,
        title: title.to_string(),
        address: address.to_string(),
    })
}

pub fn update_parking_spot(
    conn: &Connection,
    id: i64,
    number: &str,
    area: Option<f64>,
) -> Result<ParkingSpot, DbError> {
    let changed = conn.execute(
        "UPDATE parking_spots SET number = ?2, area = ?3 WHERE id = ?1",
        params![id, number, area],
    )?;
    if changed == 0 {
        return Err(DbError::NotFound("parking spot"));
    }
    Ok(conn.query_row(
        "SELECT id, floor_id, number, area FROM parking_spots WHERE id = ?1",
        [id],
        |row| {
            Ok(ParkingSpot {
                id: row.get(0)?,
                floor_id: row.get(1)?,
                number: row.get(2)?,
                area: row.get(3)?,
            })
        },
    )?)
}

pub fn parking_trees(conn: &Connection) -> Result<Vec<ParkingTree>, DbError> {
    let mut structures_stmt =
        conn.prepare("SELECT id, title, address FROM parking_structures ORDER BY title")?;
    let mut floors_stmt = conn.prepare(
        "SELECT id, structure_id, number FROM parking_floors WHERE structure_id = ?1 ORDER BY number",
    )?;
    let mut spots_stmt = conn.prepare(
        "SELECT id, floor_id, number, area FROM parking_spots WHERE floor_id = ?1
         ORDER BY length(number), number",
    )?;

    let structures = structures_stmt
        .query_map([], |row| {
            Ok(ParkingStructure {
                id: row.get(0)?,
                title: row.get(1)?,
                address: row.get(2)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let mut trees = Vec::with_capacity(structures.len());
    for structure in structures {
        let floors = floors_stmt
            .query_map([structure.id], |row| {
                Ok(ParkingFloor {
                    id: row.get(0)?,
                    structure_id: row.get(1)?,
                    number: row.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut floor_trees = Vec::with_capacity(floors.len());
        for floor in floors {
            let spots = spots_stmt
                .query_map([floor.id], |row| {
                    Ok(ParkingSpot {
                        id: row.get(0)?,
                        floor_id: row.get(1)?,
                        number: row.get(2)?,
                        area: row.get(3)?,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;
            floor_trees.push(ParkingFloorTree { floor, spots });
        }
        trees.push(ParkingTree {
            structure,
            floors: floor_trees,
        });
    }
    Ok(trees)
}

/// SQL expression yielding the human readable label of the unit identified by the
/// `kind` and `id` column expressions.
pub(crate) fn label_sql(kind: &str, id: &str) -> String {
    format!(
        "CASE {kind}
            WHEN 'apartment' THEN (
                SELECT 'Building ' || b.number || ', apt. ' || a.number
                FROM apartments a
                JOIN floors f ON f.id = a.floor_id
                JOIN entrances e ON e.id = f.entrance_id
                JOIN buildings b ON b.id = e.building_id
                WHERE a.id = {id})
            WHEN 'parking_spot' THEN (
                SELECT p.title || ', spot ' || s.number
                FROM parking_spots s
                JOIN parking_floors pf ON pf.id = s.floor_id
                JOIN parking_structures p ON p.id = pf.structure_id
                WHERE s.id = {id})
         END"
    )
}

pub fn property_label(conn: &Connection, kind: PropertyKind, id: i64) -> Result<Option<String>, DbError> {
    Ok(conn.query_row(
        &format!("SELECT {}", label_sql("?1", "?2")),
        params![kind, id],
        |row| row.get(0),
    )?)
}

pub fn property_exists(conn: &Connection, kind: PropertyKind, id: i64) -> Result<bool, DbError> {
    match kind {
        PropertyKind::Apartment => exists(conn, Level::Apartment, id),
        PropertyKind::ParkingSpot => exists(conn, Level::ParkingSpot, id),
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::test_connection;

    #[test]
    fn builds_tree() {
        let conn = test_connection();
        let apartment = fixtures::apartment(&conn);
        let building = list_buildings(&conn).unwrap().remove(0);
        let tree = building_tree(&conn, building.id).unwrap();
        assert_eq!(tree.entrances.len(), 1);
        assert_eq!(tree.entrances[0].floors[0].floor.number, 5);
        assert_eq!(tree.entrances[0].floors[0].apartments[0].id, apartment);
    }

    #[test]
    fn labels_units() {
        let conn = test_connection();
        let apartment = fixtures::apartment(&conn);
        let spot = fixtures::parking_spot(&conn);
        assert_eq!(
            property_label(&conn, PropertyKind::Apartment, apartment).unwrap().as_deref(),
            Some("Building 2, apt. 41")
        );
        assert_eq!(
            property_label(&conn, PropertyKind::ParkingSpot, spot).unwrap().as_deref(),
            Some("P1, spot 17")
        );
        assert_eq!(property_label(&conn, PropertyKind::Apartment, 999).unwrap(), None);
    }

    #[test]
    fn parent_with_children_cannot_be_deleted() {
        let conn = test_connection();
        fixtures::apartment(&conn);
        let building = list_buildings(&conn).unwrap().remove(0);
        assert!(matches!(
            delete(&conn, Level::Building, building.id),
            Err(DbError::Conflict(_))
        ));
        assert!(matches!(
            delete(&conn, Level::Floor, 999),
            Err(DbError::NotFound("floor"))
        ));
    }

    #[test]
    fn numbers_unique_within_parent() {
        let conn = test_connection();
        let building = insert_building(&conn, "1", "A", "x").unwrap();
        insert_entrance(&conn, building.id, 1).unwrap();
        assert!(matches!(
            insert_entrance(&conn, building.id, 1),
            Err(DbError::Conflict(_))
        ));
        assert!(matches!(
            insert_entrance(&conn, 42, 1),
            Err(DbError::NotFound("building"))
        ));
    }

    #[test]
    fn parking_tree_lists_spots() {
        let conn = test_connection();
        let spot = fixtures::parking_spot(&conn);
        let trees = parking_trees(&conn).unwrap();
        assert_eq!(trees[0].floors[0].spots[0].id, spot);
        assert_eq!(trees[0].floors[0].floor.number, -1);
    }
}
