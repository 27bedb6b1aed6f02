//! Encounter, elite and boss queues for one act.
//!
//! RULES:
//!   - Queues are generated once, at act entry, from the monster stream.
//!     Order: weak encounters, first strong encounter, strong encounters,
//!     elites, then the boss shuffle.
//!   - Every weighted roll is exactly one float draw.
//!   - A normal candidate equal to either of the previous two entries is
//!     re-rolled; an elite candidate is re-rolled only on an immediate repeat.
//!   - Consumed entries are never rewritten. An exhausted queue is extended
//!     with a fresh batch from the same pools.

use crate::{
    config::{ActData, MonsterWeight},
    error::{SimError, SimResult},
    rng::StreamRng,
    types::{Act, Ascension},
};
use serde::{Deserialize, Serialize};

const DOUBLE_BOSS_ACT: Act = 3;
const DOUBLE_BOSS_ASCENSION: Ascension = 20;
const FIXED_QUEUE_LEN: usize = 3;

/// A monster pool with weights normalised to sum to one.
#[derive(Debug, Clone, PartialEq)]
pub struct WeightedPool {
    entries: Vec<MonsterWeight>,
}

impl WeightedPool {
    /// Stable ascending sort by weight, then divide by the total.
    pub fn normalised(list: &[MonsterWeight]) -> Self {
        let mut entries = list.to_vec();
        entries.sort_by(|a, b| a.weight.total_cmp(&b.weight));
        let total: f32 = entries.iter().map(|m| m.weight).sum();
        if total > 0.0 {
            for m in entries.iter_mut() {
                m.weight /= total;
            }
        }
        Self { entries }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// First entry whose cumulative weight exceeds `roll`.
    pub fn pick(&self, roll: f32) -> Option<&str> {
        let mut cumulative = 0.0f32;
        for m in &self.entries {
            cumulative += m.weight;
            if roll < cumulative {
                return Some(&m.name);
            }
        }
        self.entries.last().map(|m| m.name.as_str())
    }

    pub fn roll(&self, rng: &mut StreamRng) -> SimResult<String> {
        let roll = rng.random_float();
        self.pick(roll)
            .map(str::to_string)
            .ok_or_else(|| SimError::PoolExhausted { pool: "monster pool".into() })
    }

    fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().filter(|m| m.weight > 0.0).map(|m| m.name.as_str())
    }

    /// True if some entry is not in `blocked`.
    fn has_candidate_outside(&self, blocked: &[&str]) -> bool {
        self.names().any(|n| !blocked.contains(&n))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncounterQueues {
    pub act:    Act,
    pub normal: Vec<String>,
    pub elite:  Vec<String>,
    /// The act's bosses in fight order. Two entries on a double-boss act.
    pub bosses: Vec<String>,
    normal_cursor: usize,
    elite_cursor:  usize,
    boss_cursor:   usize,
}

impl EncounterQueues {
    fn empty(act: Act) -> Self {
        Self {
            act,
            normal: Vec::new(),
            elite: Vec::new(),
            bosses: Vec::new(),
            normal_cursor: 0,
            elite_cursor: 0,
            boss_cursor: 0,
        }
    }

    /// Queues read back from a save. The lists hold only what is left.
    pub fn from_lists(act: Act, normal: Vec<String>, elite: Vec<String>, bosses: Vec<String>) -> Self {
        Self { normal, elite, bosses, ..Self::empty(act) }
    }

    pub fn upcoming_normal(&self) -> &[String] {
        &self.normal[self.normal_cursor.min(self.normal.len())..]
    }

    pub fn upcoming_elite(&self) -> &[String] {
        &self.elite[self.elite_cursor.min(self.elite.len())..]
    }

    pub fn peek_normal(&self) -> Option<&str> {
        self.normal.get(self.normal_cursor).map(String::as_str)
    }

    pub fn peek_elite(&self) -> Option<&str> {
        self.elite.get(self.elite_cursor).map(String::as_str)
    }

    pub fn peek_boss(&self) -> Option<&str> {
        self.bosses.get(self.boss_cursor).map(String::as_str)
    }

    /// True while a second boss of a double-boss act is still ahead.
    pub fn has_next_boss(&self) -> bool {
        self.boss_cursor < self.bosses.len()
    }

    pub fn cursors(&self) -> (usize, usize, usize) {
        (self.normal_cursor, self.elite_cursor, self.boss_cursor)
    }

    pub fn set_cursors(&mut self, cursors: (usize, usize, usize)) {
        self.normal_cursor = cursors.0;
        self.elite_cursor = cursors.1;
        self.boss_cursor = cursors.2;
    }

    /// Dequeue the next normal encounter, extending the queue with a new
    /// strong batch from the monster stream if it has run dry.
    pub fn take_normal(&mut self, act: &ActData, rng: &mut StreamRng) -> SimResult<String> {
        if self.normal_cursor >= self.normal.len() {
            log::debug!("act={} encounters: normal queue exhausted, extending", self.act);
            if act.is_fixed() {
                self.normal.extend(act.fixed_encounters.iter().cloned());
            } else {
                let strong = WeightedPool::normalised(&act.strong);
                populate_normal(&mut self.normal, &strong, act.strong_count, rng)?;
            }
        }
        let next = self.normal.get(self.normal_cursor).cloned().ok_or_else(|| {
            SimError::PoolExhausted { pool: format!("act {} normal encounters", self.act) }
        })?;
        self.normal_cursor += 1;
        Ok(next)
    }

    pub fn take_elite(&mut self, act: &ActData, rng: &mut StreamRng) -> SimResult<String> {
        if self.elite_cursor >= self.elite.len() {
            log::debug!("act={} encounters: elite queue exhausted, extending", self.act);
            if act.is_fixed() {
                self.elite.extend(act.fixed_elites.iter().cloned());
            } else {
                let elites = WeightedPool::normalised(&act.elites);
                populate_elites(&mut self.elite, &elites, act.elite_count, rng)?;
            }
        }
        let next = self.elite.get(self.elite_cursor).cloned().ok_or_else(|| {
            SimError::PoolExhausted { pool: format!("act {} elites", self.act) }
        })?;
        self.elite_cursor += 1;
        Ok(next)
    }

    pub fn take_boss(&mut self) -> SimResult<String> {
        let next = self.bosses.get(self.boss_cursor).cloned().ok_or_else(|| {
            SimError::PoolExhausted { pool: format!("act {} bosses", self.act) }
        })?;
        self.boss_cursor += 1;
        Ok(next)
    }
}

/// Weak rolls then strong rolls into `queue`. Each roll avoids the last
/// two entries unless the pool cannot.
fn populate_normal(
    queue: &mut Vec<String>,
    pool: &WeightedPool,
    count: usize,
    rng: &mut StreamRng,
) -> SimResult<()> {
    let mut added = 0;
    while added < count {
        let recent: Vec<&str> = queue.iter().rev().take(2).map(String::as_str).collect();
        if !pool.has_candidate_outside(&recent) {
            log::warn!("encounters: pool cannot avoid {recent:?}, allowing a repeat");
            queue.push(pool.roll(rng)?);
            added += 1;
            continue;
        }
        let candidate = pool.roll(rng)?;
        if recent.contains(&candidate.as_str()) {
            continue;
        }
        queue.push(candidate);
        added += 1;
    }
    Ok(())
}

fn populate_elites(
    queue: &mut Vec<String>,
    pool: &WeightedPool,
    count: usize,
    rng: &mut StreamRng,
) -> SimResult<()> {
    let mut added = 0;
    while added < count {
        let last: Vec<&str> = queue.last().map(String::as_str).into_iter().collect();
        if !pool.has_candidate_outside(&last) {
            log::warn!("encounters: elite pool cannot avoid {last:?}, allowing a repeat");
            queue.push(pool.roll(rng)?);
            added += 1;
            continue;
        }
        let candidate = pool.roll(rng)?;
        if last.contains(&candidate.as_str()) {
            continue;
        }
        queue.push(candidate);
        added += 1;
    }
    Ok(())
}

/// The first strong encounter may not appear in the exclusion list of the
/// last weak encounter. It ignores the repeat rule.
fn populate_first_strong(
    queue: &mut Vec<String>,
    pool: &WeightedPool,
    exclusions: &[String],
    rng: &mut StreamRng,
) -> SimResult<()> {
    let blocked: Vec<&str> = exclusions.iter().map(String::as_str).collect();
    if !pool.has_candidate_outside(&blocked) {
        log::warn!("encounters: every strong encounter is excluded, ignoring exclusions");
        queue.push(pool.roll(rng)?);
        return Ok(());
    }
    loop {
        let candidate = pool.roll(rng)?;
        if !blocked.contains(&candidate.as_str()) {
            queue.push(candidate);
            return Ok(());
        }
    }
}

/// Build the act's normal, elite and boss queues.
///
/// `already_seen` is the encounter history the new queue continues from.
/// It only feeds the repeat rule; a fresh act passes an empty slice.
pub fn generate_act_encounters(
    act: &ActData,
    ascension: Ascension,
    already_seen: &[String],
    rng: &mut StreamRng,
) -> SimResult<EncounterQueues> {
    let mut queues = EncounterQueues::empty(act.act);

    if act.is_fixed() {
        for _ in 0..FIXED_QUEUE_LEN {
            queues.normal.extend(act.fixed_encounters.iter().cloned());
            queues.elite.extend(act.fixed_elites.iter().cloned());
        }
        queues.bosses = act.bosses.clone();
        log::info!("act={} encounters: fixed queues, boss {:?}", act.act, queues.bosses);
        return Ok(queues);
    }

    let counter_before = rng.counter();
    let weak = WeightedPool::normalised(&act.weak);
    let strong = WeightedPool::normalised(&act.strong);
    let elites = WeightedPool::normalised(&act.elites);

    let mut history: Vec<String> = already_seen.iter().rev().take(2).rev().cloned().collect();
    let seeded = history.len();
    populate_normal(&mut history, &weak, act.weak_count, rng)?;
    let exclusions = history
        .last()
        .and_then(|last| act.exclusions.get(last))
        .cloned()
        .unwrap_or_default();
    populate_first_strong(&mut history, &strong, &exclusions, rng)?;
    populate_normal(&mut history, &strong, act.strong_count, rng)?;
    queues.normal = history.split_off(seeded);

    populate_elites(&mut queues.elite, &elites, act.elite_count, rng)?;

    let mut bosses = act.bosses.clone();
    rng.shuffle_seeded(&mut bosses);
    let boss_count = if act.act == DOUBLE_BOSS_ACT && ascension >= DOUBLE_BOSS_ASCENSION { 2 } else { 1 };
    bosses.truncate(boss_count);
    queues.bosses = bosses;

    log::info!(
        "act={} encounters: {} normal, {} elite, bosses {:?}, monster draws {} -> {}",
        act.act,
        queues.normal.len(),
        queues.elite.len(),
        queues.bosses,
        counter_before,
        rng.counter()
    );
    Ok(queues)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn weights(items: &[(&str, f32)]) -> Vec<MonsterWeight> {
        items.iter().map(|(n, w)| MonsterWeight { name: n.to_string(), weight: *w }).collect()
    }

    #[test]
    fn normalised_pool_is_sorted_and_stable() {
        let pool = WeightedPool::normalised(&weights(&[("a", 2.0), ("b", 1.0), ("c", 2.0), ("d", 1.0)]));
        // Ascending by weight, ties keep table order: b, d, a, c.
        assert_eq!(pool.pick(0.0), Some("b"));
        assert_eq!(pool.pick(0.2), Some("d"));
        assert_eq!(pool.pick(0.4), Some("a"));
        assert_eq!(pool.pick(0.99), Some("c"));
    }

    #[test]
    fn single_entry_pool_falls_back_to_repeats() {
        let pool = WeightedPool::normalised(&weights(&[("only", 1.0)]));
        let mut queue = Vec::new();
        let mut rng = StreamRng::new(3);
        populate_normal(&mut queue, &pool, 4, &mut rng).expect("fallback");
        assert_eq!(queue, vec!["only"; 4]);
        assert_eq!(rng.counter(), 4);
    }
}
