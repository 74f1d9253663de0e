//! The bundle of shared handles every spawned process needs: the scheduler,
//! the node arena, the medium, the logger, the resolved configuration, and
//! the run's single shared RNG stream.
//!
//! Cloning a [`World`] is cheap — every field is an `Rc`, so a clone just
//! hands a fresh set of pointers to a newly spawned process. This replaces
//! the teacher's per-node bidirectional references (Node -> Medium -> Node)
//! with the arena-and-shared-context shape called for in Design Notes §9.

use std::cell::RefCell;
use std::rc::Rc;

use rand::rngs::StdRng;

use crate::config::Config;
use crate::logger::Logger;
use crate::medium::Medium;
use crate::node::Arena;
use crate::scheduler::Scheduler;

#[derive(Clone)]
pub struct World {
    pub scheduler: Scheduler,
    pub arena: Arena,
    pub medium: Rc<RefCell<Medium>>,
    pub logger: Rc<RefCell<Logger>>,
    pub config: Rc<Config>,
    pub rng: Rc<RefCell<StdRng>>,
}
