//! Dashboard session state
//!
//! Everything the browser used to keep in globals (region, day offset,
//! selected graph, availability of tomorrow's prices) lives here and is
//! passed explicitly to the dashboard.

use crate::error::{AgileViewError, Result};
use crate::logging::get_logger;
use crate::series::Region;
use crate::sync::Direction;
use serde::{Deserialize, Serialize};

/// Graph shown by the dashboard
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GraphKind {
    #[default]
    Unit,
    Consumption,
    Cost,
}

/// Serializable view of a session
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionSnapshot {
    pub region: Region,
    pub region_name: &'static str,
    pub offset: i64,
    pub graph: GraphKind,
    pub next_available: bool,
    pub can_step_left: bool,
    pub can_step_right: bool,
}

/// Navigation state of one dashboard session
#[derive(Debug, Clone)]
pub struct SessionContext {
    region: Region,
    offset: i64,
    graph: GraphKind,
    next_available: bool,
    needs_initial: bool,
    logger: crate::logging::StructuredLogger,
}

impl SessionContext {
    pub fn new(region: Region) -> Self {
        Self {
            region,
            offset: 0,
            graph: GraphKind::default(),
            next_available: false,
            needs_initial: true,
            logger: get_logger("session"),
        }
    }

    pub const fn region(&self) -> Region {
        self.region
    }

    pub const fn offset(&self) -> i64 {
        self.offset
    }

    pub const fn graph(&self) -> GraphKind {
        self.graph
    }

    pub const fn next_available(&self) -> bool {
        self.next_available
    }

    pub fn set_next_available(&mut self, available: bool) {
        self.next_available = available;
    }

    /// Switch region; the next load is treated as a first load
    pub fn set_region(&mut self, region: Region) {
        if region != self.region {
            self.logger
                .info(&format!("Region changed {} -> {}", self.region, region));
            self.region = region;
            self.offset = 0;
            self.next_available = false;
            self.needs_initial = true;
        }
    }

    /// Switch graph and return to today
    pub fn set_graph(&mut self, graph: GraphKind) {
        if graph != self.graph {
            self.graph = graph;
            self.offset = 0;
            self.needs_initial = true;
        }
    }

    /// Whether moving one day forward is allowed. Prices may be viewed up to
    /// tomorrow once published; consumption and cost stop at yesterday.
    pub const fn can_step_right(&self) -> bool {
        match self.graph {
            GraphKind::Unit => !(self.offset >= 1 || (self.offset == 0 && !self.next_available)),
            GraphKind::Consumption | GraphKind::Cost => self.offset < 0,
        }
    }

    /// Move one day in `direction`
    pub fn step(&mut self, direction: Direction) -> Result<i64> {
        match direction {
            Direction::Left => self.offset -= 1,
            Direction::Right => {
                if !self.can_step_right() {
                    return Err(AgileViewError::validation(
                        "direction",
                        "Cannot move past the latest available day",
                    ));
                }
                self.offset += 1;
            }
        }
        Ok(self.offset)
    }

    /// True exactly once after creation or a region/graph switch
    pub fn take_initial(&mut self) -> bool {
        std::mem::replace(&mut self.needs_initial, false)
    }

    pub const fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            region: self.region,
            region_name: self.region.name(),
            offset: self.offset,
            graph: self.graph,
            next_available: self.next_available,
            can_step_left: true,
            can_step_right: self.can_step_right(),
        }
    }
}
