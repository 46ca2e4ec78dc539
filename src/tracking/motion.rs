//! Recent ping buffer and motion detection.

use std::collections::VecDeque;

use crate::geo_utils::haversine_distance;

use super::PositionPing;

/// The latest pings of one member, ordered by timestamp.
#[derive(Debug, Clone)]
pub struct PingBuffer {
    pings: VecDeque<PositionPing>,
    capacity: usize,
}

impl PingBuffer {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            pings: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Insert a ping in timestamp order, dropping the oldest when full.
    ///
    /// Returns `false` if the ping is older than everything in a full buffer.
    pub fn push(&mut self, ping: PositionPing) -> bool {
        let full = self.pings.len() >= self.capacity;
        if full && self.pings.front().is_some_and(|oldest| ping.at < oldest.at) {
            return false;
        }

        let pos = self.pings.partition_point(|p| p.at <= ping.at);
        self.pings.insert(pos, ping);
        if self.pings.len() > self.capacity {
            self.pings.pop_front();
        }
        true
    }

    pub fn latest(&self) -> Option<&PositionPing> {
        self.pings.back()
    }

    pub fn len(&self) -> usize {
        self.pings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pings.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PositionPing> {
        self.pings.iter()
    }
}

/// Check if the member is moving.
///
/// A lone ping counts as moving; otherwise the latest ping must report a
/// positive speed or lie more than `threshold` meters from a buffered one.
pub fn is_moving(buffer: &PingBuffer, threshold: f64) -> bool {
    let Some(latest) = buffer.latest() else {
        return false;
    };
    if buffer.len() == 1 || latest.speed.is_some_and(|s| s > 0.0) {
        return true;
    }
    buffer
        .iter()
        .any(|p| haversine_distance(&p.coordinate, &latest.coordinate) > threshold)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::GeoPoint;
    use chrono::{TimeZone, Utc};

    fn ping(secs: i64, lat: f64) -> PositionPing {
        PositionPing::new(
            "u",
            Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap(),
            GeoPoint::new(lat, 2.44),
        )
    }

    #[test]
    fn test_buffer_keeps_latest_in_order() {
        let mut buffer = PingBuffer::new(3);
        for (t, lat) in [(10, 44.0), (30, 44.2), (20, 44.1), (40, 44.3)] {
            buffer.push(ping(t, lat));
        }
        let times: Vec<i64> = buffer.iter().map(|p| p.at.timestamp() - 1_700_000_000).collect();
        assert_eq!(times, vec![20, 30, 40]);
        assert!(!buffer.push(ping(5, 43.0)));
    }

    #[test]
    fn test_stationary_pings_not_moving() {
        let mut buffer = PingBuffer::new(3);
        assert!(!is_moving(&buffer, 1.0));

        buffer.push(ping(0, 44.9));
        assert!(is_moving(&buffer, 1.0));

        buffer.push(ping(10, 44.9));
        buffer.push(ping(20, 44.9));
        assert!(!is_moving(&buffer, 1.0));

        buffer.push(ping(30, 44.91));
        assert!(is_moving(&buffer, 1.0));
    }
}
