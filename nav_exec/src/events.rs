//! # Navigation Events
//!
//! Events published by the planning and navigation modules for consumption by the supervising
//! executable. Publishing is fire-and-forget: a missing or disconnected consumer never blocks
//! or fails the publisher.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

// External
use log::debug;
use nalgebra::Vector2;
use serde::Serialize;
use std::sync::mpsc::Sender;

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// An event raised by the navigation stack.
#[derive(Debug, Clone, Serialize)]
pub enum NavEvent {
    /// A new coverage plan was computed and published.
    PlanComputed {
        num_cells: usize,
        num_jumps: usize,
        length_m: f64,
    },

    /// A planning request failed. Any previously published plan remains in effect.
    PlanningFailed { reason: String },

    /// A fused obstacle has come within the safety margin of the robot, and reactive avoidance
    /// has taken over heading control. Raised on the transition only, not every tick.
    ObstacleBlockingPath {
        position_m: Vector2<f64>,
        distance_m: f64,
    },
}

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// A handle events are published through.
///
/// Cloneable so each module can hold its own copy. A sink built with [`EventSink::disconnected`]
/// silently discards events, which keeps unit tests free of channel plumbing.
#[derive(Debug, Clone)]
pub struct EventSink {
    sender: Option<Sender<NavEvent>>,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl EventSink {
    /// Create a sink feeding the given channel.
    pub fn new(sender: Sender<NavEvent>) -> Self {
        Self {
            sender: Some(sender),
        }
    }

    /// Create a sink which discards all events.
    pub fn disconnected() -> Self {
        Self { sender: None }
    }

    /// Publish an event.
    ///
    /// If the receiving end has hung up the event is dropped, events are advisory and must
    /// never take the publisher down with a dead consumer.
    pub fn publish(&self, event: NavEvent) {
        debug!("NavEvent: {:?}", event);

        if let Some(ref sender) = self.sender {
            let _ = sender.send(event);
        }
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use std::sync::mpsc::channel;

    #[test]
    fn test_publish_and_receive() {
        let (tx, rx) = channel();
        let sink = EventSink::new(tx);

        sink.publish(NavEvent::PlanningFailed {
            reason: String::from("no coverable cells"),
        });

        match rx.try_recv() {
            Ok(NavEvent::PlanningFailed { reason }) => {
                assert_eq!(reason, "no coverable cells")
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_publish_to_dead_receiver_is_silent() {
        let (tx, rx) = channel();
        drop(rx);

        let sink = EventSink::new(tx);
        sink.publish(NavEvent::PlanComputed {
            num_cells: 1,
            num_jumps: 0,
            length_m: 0.0,
        });
    }

    #[test]
    fn test_disconnected_sink_discards() {
        let sink = EventSink::disconnected();
        sink.publish(NavEvent::PlanComputed {
            num_cells: 1,
            num_jumps: 0,
            length_m: 0.0,
        });
    }
}
