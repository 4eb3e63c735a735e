//! Bounded queue of fallback search points.
//!
//! Every point popped counts as one visit.  Once the queue is empty the gate
//! search has failed; there is no implicit retry.

use std::collections::VecDeque;

use rover_types::Odometry;

#[derive(Debug, Clone)]
pub struct SearchQueue {
    points: VecDeque<Odometry>,
    capacity: usize,
    visited: usize,
}

impl SearchQueue {
    /// Queue `points` in order, keeping at most `capacity` of them.
    pub fn new(points: Vec<Odometry>, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let mut points: VecDeque<Odometry> = points.into();
        points.truncate(capacity);
        Self {
            points,
            capacity,
            visited: 0,
        }
    }

    /// Pop the next point to visit.
    pub fn next(&mut self) -> Option<Odometry> {
        let point = self.points.pop_front()?;
        self.visited += 1;
        Some(point)
    }

    /// Put `points` ahead of everything already queued.  Points falling
    /// beyond the capacity are discarded from the back.
    pub fn reseed(&mut self, points: Vec<Odometry>) {
        for point in points.into_iter().rev() {
            self.points.push_front(point);
        }
        self.points.truncate(self.capacity);
    }

    pub fn remaining(&self) -> usize {
        self.points.len()
    }

    pub fn visited(&self) -> usize {
        self.visited
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_exhausted(&self) -> bool {
        self.points.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Odometry> {
        self.points.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pt(n: f64) -> Odometry {
        Odometry::new(n, 0.0, 0.0)
    }

    #[test]
    fn pops_in_order_and_counts_visits() {
        let mut q = SearchQueue::new(vec![pt(1.0), pt(2.0)], 8);
        assert_eq!(q.next().unwrap().latitude_deg, 1.0);
        assert_eq!(q.next().unwrap().latitude_deg, 2.0);
        assert!(q.next().is_none());
        assert_eq!(q.visited(), 2);
        assert!(q.is_exhausted());
    }

    #[test]
    fn construction_respects_capacity() {
        let q = SearchQueue::new((0..10).map(|i| pt(i as f64)).collect(), 4);
        assert_eq!(q.remaining(), 4);
        assert_eq!(q.iter().last().unwrap().latitude_deg, 3.0);
    }

    #[test]
    fn reseed_goes_first_and_truncates_the_back() {
        let mut q = SearchQueue::new(vec![pt(1.0), pt(2.0), pt(3.0)], 4);
        q.reseed(vec![pt(10.0), pt(11.0)]);
        let order: Vec<f64> = q.iter().map(|p| p.latitude_deg).collect();
        assert_eq!(order, vec![10.0, 11.0, 1.0, 2.0]);
    }
}
