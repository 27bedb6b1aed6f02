//! Act map generation.
//!
//! One call per act, consuming only the act's map stream. The grid is
//! 15 rows by 7 lanes; six paths are walked upward from row 0, then room
//! types are distributed over every node that ended up on a path.
//!
//! RULES:
//!   - Edges always go from row y to row y + 1; the top row gets one
//!     synthetic edge to the boss.
//!   - Path walking, the room-list shuffle and the burning-elite pick are
//!     the only map-stream consumers, in that order. The shuffle runs off
//!     the primitive and does not move the stream counter.
//!   - The final act is a fixed corridor and draws nothing.

use crate::{
    config::RoomChances,
    error::{SimError, SimResult},
    rng::StreamRng,
    types::{round_half_up, Act, Ascension, RoomKind},
};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeSet;

pub const MAP_HEIGHT: usize = 15;
pub const MAP_WIDTH: usize = 7;
pub const PATH_DENSITY: usize = 6;
pub const BOSS_LANE: usize = 3;

const MIN_ANCESTOR_GAP: usize = 3;
const MAX_ANCESTOR_DEPTH: usize = 5;
const ELITE_ASCENSION_MULTIPLIER: f32 = 1.6;
const REST_ROW: usize = MAP_HEIGHT - 1;
const TREASURE_ROW: usize = 8;
const FINAL_ACT: Act = 4;

/// Map coordinate as (lane, row).
pub type Coord = (usize, usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapEdge {
    pub src_x:   usize,
    pub src_y:   usize,
    pub dst_x:   usize,
    pub dst_y:   usize,
    pub to_boss: bool,
}

impl MapEdge {
    fn new(src: Coord, dst: Coord) -> Self {
        Self { src_x: src.0, src_y: src.1, dst_x: dst.0, dst_y: dst.1, to_boss: false }
    }

    fn boss(src: Coord, boss_row: usize) -> Self {
        Self { src_x: src.0, src_y: src.1, dst_x: BOSS_LANE, dst_y: boss_row, to_boss: true }
    }

    /// Edges sort by destination lane, then destination row.
    fn order(&self, other: &MapEdge) -> Ordering {
        (self.dst_x, self.dst_y).cmp(&(other.dst_x, other.dst_y))
    }

    pub fn dst(&self) -> Coord {
        (self.dst_x, self.dst_y)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapNode {
    pub x:     usize,
    pub y:     usize,
    pub room:  Option<RoomKind>,
    /// Sorted by `MapEdge::order`, no two with the same destination.
    pub edges: Vec<MapEdge>,
    /// One entry per path step into this node, repeats included.
    pub parents: Vec<Coord>,
    pub burning_elite: bool,
}

impl MapNode {
    fn empty(x: usize, y: usize) -> Self {
        Self { x, y, room: None, edges: Vec::new(), parents: Vec::new(), burning_elite: false }
    }

    pub fn has_edges(&self) -> bool {
        !self.edges.is_empty()
    }

    fn add_edge(&mut self, edge: MapEdge) {
        if self.edges.iter().all(|e| e.order(&edge) != Ordering::Equal) {
            self.edges.push(edge);
        }
        self.edges.sort_by(|a, b| a.order(b));
    }
}

/// Room counts derived from the number of path nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomBudget {
    pub available: usize,
    pub shop:      usize,
    pub rest:      usize,
    pub treasure:  usize,
    pub elite:     usize,
    pub event:     usize,
    pub monster:   usize,
}

pub fn room_budget(available: usize, chances: &RoomChances, ascension: Ascension) -> RoomBudget {
    let n = available as f32;
    let count = |chance: f32| round_half_up(n * chance).max(0) as usize;
    let shop = count(chances.shop);
    let rest = count(chances.rest);
    let treasure = count(chances.treasure);
    let elite = if ascension >= 1 {
        round_half_up(n * chances.elite * ELITE_ASCENSION_MULTIPLIER).max(0) as usize
    } else {
        count(chances.elite)
    };
    let event = count(chances.event);
    let monster = available.saturating_sub(shop + rest + treasure + elite + event);
    RoomBudget { available, shop, rest, treasure, elite, event, monster }
}

/// The branching floor graph of one act.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapGraph {
    pub act:  Act,
    pub rows: Vec<Vec<MapNode>>,
    pub budget: Option<RoomBudget>,
}

impl MapGraph {
    fn blank(act: Act, height: usize) -> Self {
        let rows = (0..height)
            .map(|y| (0..MAP_WIDTH).map(|x| MapNode::empty(x, y)).collect())
            .collect();
        Self { act, rows, budget: None }
    }

    pub fn height(&self) -> usize {
        self.rows.len()
    }

    /// Row index of the synthetic boss target.
    pub fn boss_row(&self) -> usize {
        self.rows.len() + 1
    }

    pub fn node(&self, at: Coord) -> Option<&MapNode> {
        self.rows.get(at.1)?.get(at.0)
    }

    fn node_mut(&mut self, at: Coord) -> &mut MapNode {
        &mut self.rows[at.1][at.0]
    }

    /// Lanes of row 0 a path starts from.
    pub fn start_nodes(&self) -> Vec<Coord> {
        self.rows
            .first()
            .map(|row| row.iter().filter(|n| n.has_edges()).map(|n| (n.x, n.y)).collect())
            .unwrap_or_default()
    }

    /// Non-boss successors of a node, in edge order.
    pub fn children(&self, at: Coord) -> Vec<Coord> {
        self.node(at)
            .map(|n| n.edges.iter().filter(|e| !e.to_boss).map(|e| e.dst()).collect())
            .unwrap_or_default()
    }

    /// Every node on at least one path, in row-major order.
    pub fn path_nodes(&self) -> impl Iterator<Item = &MapNode> {
        self.rows.iter().flatten().filter(|n| n.has_edges())
    }

    pub fn count_rooms(&self, kind: RoomKind) -> usize {
        self.path_nodes().filter(|n| n.room == Some(kind)).count()
    }

    /// True if every path node is reachable from row 0 and every path
    /// reaches the boss.
    pub fn is_fully_connected(&self) -> bool {
        let mut seen: BTreeSet<Coord> = BTreeSet::new();
        let mut frontier = self.start_nodes();
        let mut reaches_boss = true;
        while let Some(at) = frontier.pop() {
            if !seen.insert(at) {
                continue;
            }
            let Some(node) = self.node(at) else { return false };
            if node.edges.is_empty() {
                reaches_boss = false;
            }
            for edge in &node.edges {
                if !edge.to_boss {
                    if edge.dst_y != at.1 + 1 {
                        return false;
                    }
                    frontier.push(edge.dst());
                }
            }
        }
        reaches_boss && self.path_nodes().all(|n| seen.contains(&(n.x, n.y)))
    }

    /// Compact text rendering, top row first.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for row in self.rows.iter().rev() {
            out.push_str(&format!("{:>2} ", row.first().map(|n| n.y).unwrap_or(0)));
            for node in row {
                let c = match (node.has_edges(), node.room) {
                    (false, _)         => ' ',
                    (true, None)       => '*',
                    (true, Some(kind)) => if node.burning_elite { 'K' } else { kind.symbol() },
                };
                out.push(' ');
                out.push(c);
                out.push(' ');
            }
            out.push('\n');
        }
        out
    }

    // ── Path walking ───────────────────────────────────────────────

    fn create_paths(&mut self, rng: &mut StreamRng) {
        let row_end = MAP_WIDTH as i32 - 1;
        let mut first_start = None;
        for i in 0..PATH_DENSITY {
            let mut start = rand_range(rng, 0, row_end);
            if i == 0 {
                first_start = Some(start);
            }
            while i == 1 && Some(start) == first_start {
                start = rand_range(rng, 0, row_end);
            }
            self.walk_path(start as usize, rng);
        }
    }

    fn walk_path(&mut self, start_x: usize, rng: &mut StreamRng) {
        let row_end = MAP_WIDTH - 1;
        let mut cur: Coord = (start_x, 0);
        loop {
            if cur.1 + 1 >= self.height() {
                let boss_row = cur.1 + 2;
                self.node_mut(cur).add_edge(MapEdge::boss(cur, boss_row));
                return;
            }

            let (min, max) = match cur.0 {
                0                 => (0, 1),
                x if x == row_end => (-1, 0),
                _                 => (-1, 1),
            };
            let cx = cur.0 as i32;
            let mut new_x = cx + rand_range(rng, min, max);
            let new_y = cur.1 + 1;
            let mut target_x = new_x;

            let parents = self.rows[new_y][new_x as usize].parents.clone();
            for parent in parents {
                if parent == cur {
                    continue;
                }
                let Some(ancestor) = self.common_ancestor(parent, cur, MAX_ANCESTOR_DEPTH) else {
                    continue;
                };
                if new_y - ancestor.1 >= MIN_ANCESTOR_GAP {
                    continue;
                }
                match target_x.cmp(&cx) {
                    Ordering::Greater => {
                        new_x = cx + rand_range(rng, -1, 0);
                        if new_x < 0 {
                            new_x = cx;
                        }
                    }
                    Ordering::Equal => {
                        new_x = cx + rand_range(rng, -1, 1);
                        if new_x > row_end as i32 {
                            new_x = cx - 1;
                        } else if new_x < 0 {
                            new_x = cx + 1;
                        }
                    }
                    Ordering::Less => {
                        new_x = cx + rand_range(rng, 0, 1);
                        if new_x > row_end as i32 {
                            new_x = cx;
                        }
                    }
                }
                target_x = new_x;
            }

            // Paths never cross the neighbouring lanes' edges.
            if cur.0 != 0 {
                let left = &self.rows[cur.1][cur.0 - 1];
                if let Some(right_most) = left.edges.last() {
                    if right_most.dst_x as i32 > new_x {
                        new_x = right_most.dst_x as i32;
                    }
                }
            }
            if cur.0 < row_end {
                let right = &self.rows[cur.1][cur.0 + 1];
                if let Some(left_most) = right.edges.first() {
                    if (left_most.dst_x as i32) < new_x {
                        new_x = left_most.dst_x as i32;
                    }
                }
            }

            let next: Coord = (new_x as usize, new_y);
            self.node_mut(cur).add_edge(MapEdge::new(cur, next));
            self.node_mut(next).parents.push(cur);
            cur = next;
        }
    }

    /// Nearest shared ancestor of two same-row nodes, following the
    /// right-most parent of the left node and the left-most parent of the
    /// right node. Left/right is decided by comparing the first node's
    /// lane with the second node's row (lane against row, not a typo).
    fn common_ancestor(&self, first: Coord, second: Coord, max_depth: usize) -> Option<Coord> {
        let (mut left, mut right) = if first.0 < second.1 {
            (first, second)
        } else {
            (second, first)
        };
        let start_y = first.1 as i64;
        let mut y = start_y;
        while y >= 0 && y >= start_y - max_depth as i64 {
            let left_parents = &self.node(left)?.parents;
            let right_parents = &self.node(right)?.parents;
            if left_parents.is_empty() || right_parents.is_empty() {
                return None;
            }
            left = max_lane(left_parents);
            right = min_lane(right_parents);
            if left == right {
                return Some(left);
            }
            y -= 1;
        }
        None
    }

    /// Later row-0 nodes drop edges into a node an earlier row-0 node
    /// already reaches.
    fn filter_redundant_first_row_edges(&mut self) {
        let mut seen: Vec<Coord> = Vec::new();
        for node in self.rows[0].iter_mut() {
            let mut kept = Vec::with_capacity(node.edges.len());
            for edge in &node.edges {
                if !seen.contains(&edge.dst()) {
                    kept.push(*edge);
                }
                seen.push(edge.dst());
            }
            node.edges = kept;
        }
    }

    // ── Room assignment ────────────────────────────────────────────

    fn assignable_count(&self) -> usize {
        let skip_row = self.height() - 2;
        self.path_nodes().filter(|n| n.y != skip_row).count()
    }

    fn assign_row(&mut self, y: usize, kind: RoomKind) {
        for node in self.rows[y].iter_mut() {
            if node.room.is_none() {
                node.room = Some(kind);
            }
        }
    }

    fn siblings(&self, parents: &[Coord], at: Coord) -> Vec<Coord> {
        let mut out = Vec::new();
        for parent in parents {
            if let Some(p) = self.node(*parent) {
                for edge in &p.edges {
                    if !edge.to_boss && edge.dst() != at {
                        out.push(edge.dst());
                    }
                }
            }
        }
        out
    }

    fn room_at(&self, at: Coord) -> Option<RoomKind> {
        self.node(at).and_then(|n| n.room)
    }

    /// Index into `rooms` of the first room the placement rules allow here.
    fn next_room_for(&self, at: Coord, rooms: &[RoomKind]) -> Option<usize> {
        let node = self.node(at)?;
        let siblings = self.siblings(&node.parents, at);
        rooms.iter().position(|&room| {
            if !assignable_to_row(at.1, room) {
                return false;
            }
            let parent_clash = PARENT_RESTRICTED.contains(&room)
                && node.parents.iter().any(|p| self.room_at(*p) == Some(room));
            let sibling_clash = SIBLING_RESTRICTED.contains(&room)
                && siblings.iter().any(|s| self.room_at(*s) == Some(room));
            (!parent_clash && !sibling_clash) || at.1 == 0
        })
    }

    fn distribute_rooms(&mut self, mut rooms: Vec<RoomKind>, rng: &mut StreamRng) {
        let open = self.path_nodes().filter(|n| n.room.is_none()).count();
        while rooms.len() < open {
            rooms.push(RoomKind::Monster);
        }
        if rooms.len() > open {
            log::debug!(
                "act={} map: room list ({}) larger than open nodes ({open})",
                self.act,
                rooms.len()
            );
        }
        rng.shuffle_uncounted(&mut rooms);

        for y in 0..self.height() {
            for x in 0..MAP_WIDTH {
                let node = &self.rows[y][x];
                if !node.has_edges() || node.room.is_some() {
                    continue;
                }
                if let Some(i) = self.next_room_for((x, y), &rooms) {
                    let room = rooms.remove(i);
                    self.rows[y][x].room = Some(room);
                }
            }
        }

        for node in self.rows.iter_mut().flatten() {
            if node.has_edges() && node.room.is_none() {
                node.room = Some(RoomKind::Monster);
            }
        }
    }

    fn mark_burning_elite(&mut self, rng: &mut StreamRng) {
        let elites: Vec<Coord> = self
            .rows
            .iter()
            .flatten()
            .filter(|n| n.room == Some(RoomKind::Elite))
            .map(|n| (n.x, n.y))
            .collect();
        if elites.is_empty() {
            log::warn!("act={} map: no elite node for the burning elite", self.act);
            return;
        }
        let pick = rng.random_range(0, elites.len() as i32 - 1) as usize;
        self.node_mut(elites[pick]).burning_elite = true;
    }
}

const PARENT_RESTRICTED: [RoomKind; 4] =
    [RoomKind::Rest, RoomKind::Treasure, RoomKind::Shop, RoomKind::Elite];
const SIBLING_RESTRICTED: [RoomKind; 5] =
    [RoomKind::Rest, RoomKind::Monster, RoomKind::Event, RoomKind::Elite, RoomKind::Shop];

fn assignable_to_row(y: usize, room: RoomKind) -> bool {
    if y <= 4 && matches!(room, RoomKind::Rest | RoomKind::Elite) {
        return false;
    }
    y < 13 || room != RoomKind::Rest
}

fn rand_range(rng: &mut StreamRng, min: i32, max: i32) -> i32 {
    rng.random_int(max - min) + min
}

fn max_lane(nodes: &[Coord]) -> Coord {
    nodes.iter().skip(1).fold(nodes[0], |best, n| if n.0 > best.0 { *n } else { best })
}

fn min_lane(nodes: &[Coord]) -> Coord {
    nodes.iter().skip(1).fold(nodes[0], |best, n| if n.0 < best.0 { *n } else { best })
}

/// Generate the map for `act`. Acts 1-3 draw from `rng`; act 4 is fixed.
pub fn generate(
    act: Act,
    ascension: Ascension,
    chances: &RoomChances,
    final_act: bool,
    rng: &mut StreamRng,
) -> SimResult<MapGraph> {
    match act {
        1..=3 => {}
        FINAL_ACT => return Ok(final_act_map()),
        _ => return Err(SimError::InvalidAct { act }),
    }

    let counter_before = rng.counter();
    let mut map = MapGraph::blank(act, MAP_HEIGHT);
    map.create_paths(rng);
    map.filter_redundant_first_row_edges();

    let budget = room_budget(map.assignable_count(), chances, ascension);
    let mut rooms = Vec::with_capacity(budget.available);
    rooms.extend(std::iter::repeat(RoomKind::Shop).take(budget.shop));
    rooms.extend(std::iter::repeat(RoomKind::Rest).take(budget.rest));
    rooms.extend(std::iter::repeat(RoomKind::Elite).take(budget.elite));
    rooms.extend(std::iter::repeat(RoomKind::Event).take(budget.event));
    rooms.extend(std::iter::repeat(RoomKind::Treasure).take(budget.treasure));
    map.budget = Some(budget);

    map.assign_row(REST_ROW, RoomKind::Rest);
    map.assign_row(0, RoomKind::Monster);
    map.assign_row(TREASURE_ROW, RoomKind::Treasure);
    map.distribute_rooms(rooms, rng);

    if final_act {
        map.mark_burning_elite(rng);
    }

    log::info!(
        "act={act} map: generated {} rooms ({} elites), map draws {} -> {}",
        budget.available,
        map.count_rooms(RoomKind::Elite),
        counter_before,
        rng.counter()
    );
    Ok(map)
}

/// The final act: rest, shop, elite, then the boss, in the middle lane.
fn final_act_map() -> MapGraph {
    let mut map = MapGraph::blank(FINAL_ACT, 3);
    let corridor = [RoomKind::Rest, RoomKind::Shop, RoomKind::Elite];
    for (y, kind) in corridor.iter().enumerate() {
        let at = (BOSS_LANE, y);
        map.node_mut(at).room = Some(*kind);
        if y + 1 < corridor.len() {
            map.node_mut(at).add_edge(MapEdge::new(at, (BOSS_LANE, y + 1)));
            map.node_mut((BOSS_LANE, y + 1)).parents.push(at);
        } else {
            map.node_mut(at).add_edge(MapEdge::boss(at, corridor.len() + 1));
        }
    }
    map
}
