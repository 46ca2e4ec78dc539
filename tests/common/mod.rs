//! Shared fixtures: Cantal rallying points and a road graph oracle.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::NaiveTime;
use tripmatch::geo_utils::haversine_distance;
use tripmatch::{
    GeoPoint, InMemoryCatalogue, IntentId, OracleError, RallyingPoint, RallyingPointRef,
    RoutingOracle, TravelIntent, UserId, WayPoint,
};

pub const CANTAL: &[(&str, &str, f64, f64)] = &[
    ("aurillac", "Aurillac", 44.9285441, 2.4433101),
    ("arpajon", "Arpajon-sur-Cère", 44.9034428, 2.4570176),
    ("vic", "Vic-sur-Cère", 44.9802528, 2.6244222),
    ("mauriac", "Mauriac", 45.2178285, 2.331882),
    ("reilhac", "Reilhac", 44.9734047, 2.4192191),
    ("naucelles", "Naucelles", 44.9556611, 2.4175947),
    ("saintpaul", "Saint-Paul-des-Landes", 44.9439943, 2.3125999),
    ("ytrac", "Ytrac", 44.9111838, 2.3633014),
    ("laroquebrou", "Laroquebrou", 44.967739, 2.1911658),
    ("sansac", "Sansac-de-Marmiesse", 44.8824607, 2.3485484),
    ("saintsimon", "Saint-Simon", 44.9642272, 2.4898166),
    ("saintcernin", "Saint-Cernin", 45.0591427, 2.4213159),
];

pub const ROADS: &[(&str, &str)] = &[
    ("laroquebrou", "saintpaul"),
    ("saintpaul", "aurillac"),
    ("mauriac", "saintcernin"),
    ("saintcernin", "reilhac"),
    ("reilhac", "naucelles"),
    ("naucelles", "aurillac"),
    ("saintsimon", "aurillac"),
    ("aurillac", "sansac"),
    ("aurillac", "arpajon"),
    ("arpajon", "ytrac"),
    ("arpajon", "vic"),
];

pub fn cantal_points() -> Vec<RallyingPoint> {
    CANTAL
        .iter()
        .map(|&(id, label, lat, lng)| RallyingPoint::new(id, label, GeoPoint::new(lat, lng)))
        .collect()
}

pub fn cantal_catalogue() -> InMemoryCatalogue {
    InMemoryCatalogue::new(cantal_points())
}

pub fn location(id: &str) -> GeoPoint {
    CANTAL
        .iter()
        .find(|(pid, ..)| *pid == id)
        .map(|&(_, _, lat, lng)| GeoPoint::new(lat, lng))
        .unwrap_or_else(|| panic!("unknown Cantal point {}", id))
}

pub fn time(hhmm: &str) -> NaiveTime {
    NaiveTime::parse_from_str(hhmm, "%H:%M").unwrap()
}

pub fn intent(id: &str, user: &str, from: &str, to: &str, departure: &str) -> TravelIntent {
    TravelIntent {
        id: IntentId::from(id),
        user: UserId::from(user),
        from: RallyingPointRef::from(from),
        to: RallyingPointRef::from(to),
        earliest_departure: time(departure),
        latest_return: Some(time("17:00")),
    }
}

/// Waypoints along `ids` with cumulative great-circle distance and a 50 km/h duration.
pub fn waypoints(ids: &[&str]) -> Vec<WayPoint> {
    let mut distance = 0.0;
    ids.iter()
        .enumerate()
        .map(|(order, id)| {
            if order > 0 {
                distance += haversine_distance(&location(ids[order - 1]), &location(id));
            }
            WayPoint::new(RallyingPointRef::from(*id), order, distance / (50.0 / 3.6), distance)
        })
        .collect()
}

/// Routing oracle walking the fixed Cantal road graph (fewest hops).
///
/// Origins listed in `unreachable` fail with `RouteUnavailable`; snapping fails
/// while `snap_down` is set.
pub struct GraphOracle {
    adjacency: HashMap<&'static str, Vec<&'static str>>,
    pub unreachable: HashSet<String>,
    pub snap_down: AtomicBool,
}

impl GraphOracle {
    pub fn new() -> Self {
        let mut adjacency: HashMap<&'static str, Vec<&'static str>> = HashMap::new();
        for &(a, b) in ROADS {
            adjacency.entry(a).or_default().push(b);
            adjacency.entry(b).or_default().push(a);
        }
        Self {
            adjacency,
            unreachable: HashSet::new(),
            snap_down: AtomicBool::new(false),
        }
    }

    pub fn with_unreachable(mut self, origin: &str) -> Self {
        self.unreachable.insert(origin.to_string());
        self
    }

    pub fn path(&self, from: &str, to: &str) -> Option<Vec<&'static str>> {
        let (&start, _) = self.adjacency.get_key_value(from)?;
        let mut previous: HashMap<&'static str, &'static str> = HashMap::new();
        let mut queue = VecDeque::from([start]);
        let mut visited = HashSet::from([start]);

        while let Some(node) = queue.pop_front() {
            if node == to {
                let mut path = vec![node];
                let mut current = node;
                while let Some(&prev) = previous.get(current) {
                    path.push(prev);
                    current = prev;
                }
                path.reverse();
                return Some(path);
            }
            for &next in self.adjacency.get(node).into_iter().flatten() {
                if visited.insert(next) {
                    previous.insert(next, node);
                    queue.push_back(next);
                }
            }
        }
        None
    }
}

impl RoutingOracle for GraphOracle {
    fn expand_path(
        &self,
        origin: &RallyingPoint,
        destination: &RallyingPoint,
    ) -> Result<Vec<WayPoint>, OracleError> {
        let unavailable = |reason: &str| OracleError::RouteUnavailable {
            origin: origin.id.to_string(),
            destination: destination.id.to_string(),
            reason: reason.to_string(),
        };
        if self.unreachable.contains(origin.id.as_str()) {
            return Err(unavailable("road closed"));
        }
        let path = self
            .path(origin.id.as_str(), destination.id.as_str())
            .ok_or_else(|| unavailable("no road"))?;
        Ok(waypoints(&path))
    }

    fn snap_to_nearest_remaining(
        &self,
        coordinate: &GeoPoint,
        candidates: &[WayPoint],
    ) -> Result<usize, OracleError> {
        if self.snap_down.load(Ordering::SeqCst) {
            return Err(OracleError::Timeout {
                operation: "snap".to_string(),
            });
        }
        candidates
            .iter()
            .enumerate()
            .map(|(i, w)| (i, haversine_distance(coordinate, &location(w.rallying_point.as_str()))))
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(i, _)| i)
            .ok_or_else(|| OracleError::SnapFailed {
                reason: "no candidates".to_string(),
            })
    }
}
