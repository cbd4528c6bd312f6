//! Timed interactions ("do-afters")
//!
//! A do-after runs for a fixed duration while the user keeps working. It
//! breaks if the user or target walks away, the user swaps the active
//! item, or either entity disappears. Completion and cancellation are
//! reported as distinct events; the surgery engine reacts to both.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::body::graph::active_item;
use crate::core::types::{EntityId, Vec2};
use crate::ecs::world::World;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DoAfterId(pub u64);

impl fmt::Display for DoAfterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "do-after {}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DoAfterArgs {
    pub user: EntityId,
    pub target: EntityId,
    /// Seconds
    pub duration: f32,
    pub break_on_move: bool,
    pub break_on_hand_change: bool,
}

impl DoAfterArgs {
    pub fn new(user: EntityId, target: EntityId, duration: f32) -> Self {
        Self {
            user,
            target,
            duration,
            break_on_move: true,
            break_on_hand_change: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CancelReason {
    UserMoved,
    TargetMoved,
    HandChanged,
    EntityRemoved,
    Requested,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DoAfterEvent {
    Completed(DoAfterId),
    Cancelled(DoAfterId, CancelReason),
}

/// Scheduler seam the surgery engine talks to
pub trait DoAfterScheduler {
    fn start(&mut self, world: &World, args: DoAfterArgs) -> DoAfterId;

    /// Returns false if the do-after was not running
    fn cancel(&mut self, id: DoAfterId) -> bool;

    fn is_running(&self, id: DoAfterId) -> bool;
}

#[derive(Debug, Clone)]
struct Running {
    args: DoAfterArgs,
    elapsed: f32,
    user_start: Vec2,
    target_start: Vec2,
    held_start: Option<EntityId>,
}

/// Tick-driven scheduler; ids are handed out in start order
#[derive(Debug, Clone, Default)]
pub struct DoAfterQueue {
    running: BTreeMap<DoAfterId, Running>,
    cancelled: Vec<DoAfterId>,
    next_id: u64,
}

impl DoAfterQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.running.len()
    }

    pub fn is_empty(&self) -> bool {
        self.running.is_empty()
    }

    /// Progress every running do-after by `dt` seconds
    pub fn tick(&mut self, world: &World, tolerance: f32, dt: f32) -> Vec<DoAfterEvent> {
        let mut events: Vec<DoAfterEvent> = self
            .cancelled
            .drain(..)
            .map(|id| DoAfterEvent::Cancelled(id, CancelReason::Requested))
            .collect();

        let mut finished = Vec::new();
        for (id, run) in self.running.iter_mut() {
            if let Some(reason) = broken(world, run, tolerance) {
                tracing::debug!("{} cancelled: {:?}", id, reason);
                events.push(DoAfterEvent::Cancelled(*id, reason));
                finished.push(*id);
                continue;
            }
            run.elapsed += dt;
            if run.elapsed >= run.args.duration {
                events.push(DoAfterEvent::Completed(*id));
                finished.push(*id);
            }
        }
        for id in finished {
            self.running.remove(&id);
        }
        events
    }
}

fn broken(world: &World, run: &Running, tolerance: f32) -> Option<CancelReason> {
    let args = &run.args;
    if !world.hands.contains_key(&args.user) || !world.bodies.contains_key(&args.target) {
        return Some(CancelReason::EntityRemoved);
    }
    if args.break_on_move {
        if world.position(args.user).distance(&run.user_start) > tolerance {
            return Some(CancelReason::UserMoved);
        }
        if world.position(args.target).distance(&run.target_start) > tolerance {
            return Some(CancelReason::TargetMoved);
        }
    }
    if args.break_on_hand_change && active_item(world, args.user) != run.held_start {
        return Some(CancelReason::HandChanged);
    }
    None
}

impl DoAfterScheduler for DoAfterQueue {
    fn start(&mut self, world: &World, args: DoAfterArgs) -> DoAfterId {
        self.next_id += 1;
        let id = DoAfterId(self.next_id);
        let run = Running {
            user_start: world.position(args.user),
            target_start: world.position(args.target),
            held_start: active_item(world, args.user),
            elapsed: 0.0,
            args,
        };
        tracing::debug!("{} started for {}s", id, run.args.duration);
        self.running.insert(id, run);
        id
    }

    fn cancel(&mut self, id: DoAfterId) -> bool {
        if self.running.remove(&id).is_some() {
            self.cancelled.push(id);
            true
        } else {
            false
        }
    }

    fn is_running(&self, id: DoAfterId) -> bool {
        self.running.contains_key(&id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::body::graph::{give, spawn_humanoid, spawn_item};
    use crate::body::item::Item;
    use crate::core::types::Species;

    fn setup() -> (World, EntityId, EntityId) {
        let mut world = World::new();
        let surgeon = spawn_humanoid(&mut world, Species::Human, "surgeon");
        let patient = spawn_humanoid(&mut world, Species::Human, "patient");
        world.positions.insert(patient, Vec2::new(1.0, 0.0));
        (world, surgeon, patient)
    }

    #[test]
    fn test_completes_after_duration() {
        let (world, surgeon, patient) = setup();
        let mut queue = DoAfterQueue::new();
        let id = queue.start(&world, DoAfterArgs::new(surgeon, patient, 1.0));
        assert!(queue.tick(&world, 0.25, 0.5).is_empty());
        assert_eq!(queue.tick(&world, 0.25, 0.5), vec![DoAfterEvent::Completed(id)]);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_breaks_on_move() {
        let (mut world, surgeon, patient) = setup();
        let mut queue = DoAfterQueue::new();
        let id = queue.start(&world, DoAfterArgs::new(surgeon, patient, 1.0));
        world.positions.insert(surgeon, Vec2::new(0.1, 0.0));
        assert!(queue.tick(&world, 0.25, 0.1).is_empty());
        world.positions.insert(surgeon, Vec2::new(3.0, 0.0));
        assert_eq!(
            queue.tick(&world, 0.25, 0.1),
            vec![DoAfterEvent::Cancelled(id, CancelReason::UserMoved)]
        );
    }

    #[test]
    fn test_breaks_on_hand_change() {
        let (mut world, surgeon, patient) = setup();
        let mut queue = DoAfterQueue::new();
        let id = queue.start(&world, DoAfterArgs::new(surgeon, patient, 1.0));
        let scalpel = spawn_item(&mut world, Item::new("scalpel", "scalpel"), Vec2::default());
        give(&mut world, surgeon, scalpel);
        assert_eq!(
            queue.tick(&world, 0.25, 0.1),
            vec![DoAfterEvent::Cancelled(id, CancelReason::HandChanged)]
        );
    }

    #[test]
    fn test_breaks_on_removal() {
        let (mut world, surgeon, patient) = setup();
        let mut queue = DoAfterQueue::new();
        let id = queue.start(&world, DoAfterArgs::new(surgeon, patient, 1.0));
        world.despawn(patient);
        assert_eq!(
            queue.tick(&world, 0.25, 0.1),
            vec![DoAfterEvent::Cancelled(id, CancelReason::EntityRemoved)]
        );
    }

    #[test]
    fn test_explicit_cancel_reported_once() {
        let (world, surgeon, patient) = setup();
        let mut queue = DoAfterQueue::new();
        let id = queue.start(&world, DoAfterArgs::new(surgeon, patient, 1.0));
        assert!(queue.cancel(id));
        assert!(!queue.cancel(id));
        assert!(!queue.is_running(id));
        assert_eq!(
            queue.tick(&world, 0.25, 1.0),
            vec![DoAfterEvent::Cancelled(id, CancelReason::Requested)]
        );
        assert!(queue.tick(&world, 0.25, 1.0).is_empty());
    }
}
