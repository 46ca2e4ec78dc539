//! Tests for error classification

use tripmatch::{
    OptionExt, OracleError, RallyingPointRef, TripId, TripMatchError, TripStatus, UserId,
};

#[test]
fn test_oracle_errors_are_resource_unavailable() {
    let errors: Vec<TripMatchError> = vec![
        OracleError::RouteUnavailable {
            origin: "a".into(),
            destination: "b".into(),
            reason: "no road".into(),
        }
        .into(),
        OracleError::SnapFailed {
            reason: "empty".into(),
        }
        .into(),
        OracleError::Timeout {
            operation: "route".into(),
        }
        .into(),
    ];
    for e in &errors {
        assert!(e.is_resource_unavailable(), "{}", e);
        assert!(!e.is_not_found());
    }
}

#[test]
fn test_not_found_family() {
    let errors = vec![
        TripMatchError::RallyingPointNotFound { id: "x".into() },
        TripMatchError::MemberNotFound {
            trip: "t".into(),
            user: "u".into(),
        },
        TripMatchError::TripNotFound { id: "t".into() },
    ];
    for e in &errors {
        assert!(e.is_not_found());
        assert!(!e.is_resource_unavailable());
    }
    assert!(!TripMatchError::Cancelled.is_not_found());
}

#[test]
fn test_option_ext() {
    let missing: Option<u32> = None;
    let err = missing
        .ok_or_rallying_point_not_found(&RallyingPointRef::from("vic"))
        .unwrap_err();
    assert_eq!(err.to_string(), "rallying point 'vic' not found");

    let err = missing
        .ok_or_member_not_found(&TripId::from("t1"), &UserId::from("bob"))
        .unwrap_err();
    assert_eq!(err.to_string(), "user 'bob' is not a member of trip 't1'");

    assert_eq!(Some(3).ok_or_rallying_point_not_found(&"x".into()), Ok(3));
}

#[test]
fn test_trip_not_live_message() {
    let err = TripMatchError::TripNotLive {
        trip: "t1".into(),
        status: TripStatus::Finished,
    };
    assert_eq!(err.to_string(), "trip 't1' is not live (status Finished)");
}
