//! Random-walk mobility for the reference scenario.
//!
//! Every mobile node moves at constant speed and draws a new uniform heading
//! at a fixed step. Nodes reflect at the borders of the operating rectangle.
//! Positions are advanced lazily when the scenario asks for a snapshot, which
//! is fine because virtual time only moves forward.

use rand::Rng;
use rand_distr::{Distribution, Uniform};
use std::f64::consts::TAU;

use super::types::{NodeId, NodeKind, Position, SimDuration, SimTime};

#[derive(Debug, Clone)]
pub struct MobileNode {
    pub node_id: NodeId,
    pub kind: NodeKind,
    position: Position,
    speed_mps: f64,
    velocity: (f64, f64),
    last_update: SimTime,
    next_turn: SimTime,
}

impl MobileNode {
    pub fn position(&self) -> Position {
        self.position
    }
}

/// All nodes of the scenario and the rectangle they move in.
#[derive(Debug)]
pub struct Fleet {
    nodes: Vec<MobileNode>,
    width: f64,
    height: f64,
    walk_step: SimDuration,
    heading: Uniform<f64>,
}

impl Fleet {
    pub fn new(width: f64, height: f64, walk_step: SimDuration) -> Self {
        Self {
            nodes: Vec::new(),
            width,
            height,
            walk_step,
            heading: Uniform::new(0.0, TAU),
        }
    }

    /// Add a node at a uniformly random position in the rectangle.
    pub fn add_random<R: Rng>(&mut self, node_id: NodeId, kind: NodeKind, speed_mps: f64, rng: &mut R) {
        let x = Uniform::new_inclusive(0.0, self.width).sample(rng);
        let y = Uniform::new_inclusive(0.0, self.height).sample(rng);
        self.add_at(node_id, kind, Position::new(x, y), speed_mps, rng);
    }

    /// Add a node at a given position. A speed of zero makes it static.
    pub fn add_at<R: Rng>(&mut self, node_id: NodeId, kind: NodeKind, position: Position, speed_mps: f64, rng: &mut R) {
        let velocity = self.draw_velocity(speed_mps, rng);
        self.nodes.push(MobileNode {
            node_id,
            kind,
            position,
            speed_mps,
            velocity,
            last_update: SimTime::ZERO,
            next_turn: SimTime::ZERO + self.walk_step,
        });
    }

    fn draw_velocity<R: Rng>(&self, speed_mps: f64, rng: &mut R) -> (f64, f64) {
        if speed_mps <= 0.0 {
            return (0.0, 0.0);
        }
        let theta = self.heading.sample(rng);
        (speed_mps * theta.cos(), speed_mps * theta.sin())
    }

    /// Move every node forward to `now`.
    pub fn advance_to<R: Rng>(&mut self, now: SimTime, rng: &mut R) {
        for i in 0..self.nodes.len() {
            if self.nodes[i].speed_mps <= 0.0 {
                self.nodes[i].last_update = now;
                continue;
            }
            while self.nodes[i].next_turn <= now {
                let turn = self.nodes[i].next_turn;
                self.move_node(i, turn);
                let speed = self.nodes[i].speed_mps;
                self.nodes[i].velocity = self.draw_velocity(speed, rng);
                self.nodes[i].next_turn = turn + self.walk_step;
                if self.walk_step == SimDuration::ZERO {
                    break;
                }
            }
            self.move_node(i, now);
        }
    }

    fn move_node(&mut self, i: usize, to: SimTime) {
        let (width, height) = (self.width, self.height);
        let node = &mut self.nodes[i];
        let dt = to.saturating_since(node.last_update).as_secs_f64();
        let (x, vx) = reflect(node.position.x + node.velocity.0 * dt, node.velocity.0, width);
        let (y, vy) = reflect(node.position.y + node.velocity.1 * dt, node.velocity.1, height);
        node.position = Position::new(x, y);
        node.velocity = (vx, vy);
        node.last_update = to;
    }

    pub fn nodes(&self) -> &[MobileNode] {
        &self.nodes
    }

    pub fn position_of(&self, node_id: NodeId) -> Option<Position> {
        self.nodes.iter().find(|n| n.node_id == node_id).map(|n| n.position)
    }

    /// Snapshot of every node position.
    pub fn snapshot(&self) -> Vec<(NodeId, Position)> {
        self.nodes.iter().map(|n| (n.node_id, n.position)).collect()
    }

    /// Snapshot of the nodes of one kind.
    pub fn snapshot_of(&self, kind: NodeKind) -> Vec<(NodeId, Position)> {
        self.nodes.iter().filter(|n| n.kind == kind).map(|n| (n.node_id, n.position)).collect()
    }
}

/// Fold a coordinate back into `[0, limit]`, flipping the velocity component
/// on every bounce.
fn reflect(mut value: f64, mut velocity: f64, limit: f64) -> (f64, f64) {
    if limit <= 0.0 {
        return (0.0, velocity);
    }
    loop {
        if value < 0.0 {
            value = -value;
            velocity = -velocity;
        } else if value > limit {
            value = 2.0 * limit - value;
            velocity = -velocity;
        } else {
            return (value, velocity);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::geometry::distance;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn reflect_bounces_off_both_walls() {
        assert_eq!(reflect(-3.0, -1.0, 10.0), (3.0, 1.0));
        assert_eq!(reflect(12.0, 1.0, 10.0), (8.0, -1.0));
        assert_eq!(reflect(5.0, 1.0, 10.0), (5.0, 1.0));
    }

    #[test]
    fn nodes_stay_inside_the_area() {
        let mut rng = StdRng::seed_from_u64(11);
        let mut fleet = Fleet::new(500.0, 300.0, SimDuration::from_secs(1));
        for id in 0..20 {
            fleet.add_random(id, NodeKind::Boat, 25.0, &mut rng);
        }
        for t in (10..=600).step_by(10) {
            fleet.advance_to(SimTime::from_secs(t), &mut rng);
            for n in fleet.nodes() {
                let p = n.position();
                assert!((0.0..=500.0).contains(&p.x) && (0.0..=300.0).contains(&p.y), "{:?}", p);
            }
        }
    }

    #[test]
    fn displacement_bounded_by_speed() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut fleet = Fleet::new(25_000.0, 15_000.0, SimDuration::from_secs(1));
        fleet.add_at(0, NodeKind::Boat, Position::new(12_500.0, 7_500.0), 5.0, &mut rng);
        fleet.advance_to(SimTime::from_secs(60), &mut rng);
        let moved = distance(&Position::new(12_500.0, 7_500.0), &fleet.nodes()[0].position());
        assert!(moved <= 5.0 * 60.0 + 1e-6);
        assert!(moved > 0.0);
    }

    #[test]
    fn static_nodes_do_not_move() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut fleet = Fleet::new(1000.0, 1000.0, SimDuration::from_secs(1));
        fleet.add_at(9, NodeKind::Server, Position::new(500.0, 500.0), 0.0, &mut rng);
        fleet.advance_to(SimTime::from_secs(100), &mut rng);
        assert_eq!(fleet.position_of(9), Some(Position::new(500.0, 500.0)));
    }

    #[test]
    fn snapshot_filters_by_kind() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut fleet = Fleet::new(1000.0, 1000.0, SimDuration::from_secs(1));
        fleet.add_random(0, NodeKind::Boat, 5.0, &mut rng);
        fleet.add_random(1, NodeKind::Gateway, 6.0, &mut rng);
        fleet.add_random(2, NodeKind::Boat, 5.0, &mut rng);
        let boats: Vec<NodeId> = fleet.snapshot_of(NodeKind::Boat).iter().map(|(id, _)| *id).collect();
        assert_eq!(boats, vec![0, 2]);
        assert_eq!(fleet.snapshot().len(), 3);
    }
}
