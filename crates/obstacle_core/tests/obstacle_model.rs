use obstacle_core::{Location, Obstacle, ObstacleDraft, ObstacleValidationError};

#[test]
fn new_obstacle_has_no_photos_or_location() {
    let obstacle = Obstacle::new(4, "Bollard", "Blocks the path");

    assert_eq!(obstacle.id, 4);
    assert!(obstacle.photos.is_empty());
    assert!(obstacle.location.is_none());
    assert!(obstacle.validate().is_ok());
}

#[test]
fn draft_round_trips_text_fields_only() {
    let mut obstacle = Obstacle::new(1, "a", "b");
    obstacle.photos.push("file:///x.jpg".to_string());

    let mut draft = obstacle.to_draft();
    assert_eq!(draft, ObstacleDraft::new("a", "b"));

    draft.title = "c".to_string();
    obstacle.apply_draft(&draft);
    assert_eq!(obstacle.title, "c");
    assert_eq!(obstacle.photos, vec!["file:///x.jpg"]);
}

#[test]
fn serialization_omits_absent_location() {
    let json = serde_json::to_value(Obstacle::new(1, "t", "d")).unwrap();
    assert_eq!(json["id"], 1);
    assert_eq!(json["photos"], serde_json::json!([]));
    assert!(json.get("location").is_none());
}

#[test]
fn older_payload_without_photos_decodes() {
    let decoded: Obstacle =
        serde_json::from_str(r#"{"id":2,"title":"Curb","description":""}"#).unwrap();
    assert_eq!(decoded, Obstacle::new(2, "Curb", ""));
}

#[test]
fn location_is_carried_through_serde() {
    let mut obstacle = Obstacle::new(3, "Gate", "");
    obstacle.location = Some(Location::new(-33.5, 151.25));

    let json = serde_json::to_value(&obstacle).unwrap();
    assert_eq!(
        json["location"],
        serde_json::json!({"latitude": -33.5, "longitude": 151.25})
    );
    let decoded: Obstacle = serde_json::from_value(json).unwrap();
    assert_eq!(decoded, obstacle);
}

#[test]
fn out_of_range_coordinates_fail_validation() {
    let mut obstacle = Obstacle::new(5, "", "");

    obstacle.location = Some(Location::new(91.0, 0.0));
    assert!(matches!(
        obstacle.validate(),
        Err(ObstacleValidationError::LatitudeOutOfRange { id: 5, .. })
    ));

    obstacle.location = Some(Location::new(0.0, -180.5));
    assert!(matches!(
        obstacle.validate(),
        Err(ObstacleValidationError::LongitudeOutOfRange { id: 5, .. })
    ));
}
