//! The run orchestrator: one run's registry, state and content pools,
//! advanced one player action at a time.
//!
//! PHASES:
//!   neow → map_choice → (combat → rewards | event | shop | rest | treasure)
//!   → ... → boss → rewards → boss_relic → act_transition → map_choice
//!   → ... → run_complete
//!
//! RULES:
//!   - Every stream draw happens inside `step`, in the order each generator
//!     module documents.
//!   - Entering a room bumps the floor and reseeds the per-floor streams
//!     before that room generates anything.
//!   - The card counter snap and the map reseed happen once per act, after
//!     the outgoing act is finished.
//!   - Nothing is generated after RunComplete.
//!   - (config, actions) reproduces the run exactly. See `replay`.

use crate::{
    card_reward::{CardPools, RewardCard},
    combat_reward::{generate_combat_rewards, RewardItem, RewardTables},
    config::{ActData, GameData, RunConfig},
    encounter_generator::{generate_act_encounters, EncounterQueues},
    error::{SimError, SimResult},
    event::{EventLogEntry, GenEvent},
    event_generator::{EventContext, EventPools},
    map_generator::{self, Coord, MapGraph, BOSS_LANE},
    neow::{self, NeowDrawback, NeowOption, NeowReward},
    potion_reward::PotionPool,
    registry::{RngRegistry, StreamCounters, StreamName},
    relic_reward::{PoolEnd, RelicPools, SpawnContext},
    rng::StreamRng,
    run_state::{DeckEdit, Keys, RunState},
    seed::seed_to_string,
    shop::{generate_shop, ShopContext, ShopInventory, ShopItem, ShopStreams},
    store::SimStore,
    treasure::{open_chest, roll_chest, ChestRoll},
    types::{Act, CardRarity, Floor, RelicTier, RoomKind, RunId},
};
use serde::{Deserialize, Serialize};

/// Bumped on any breaking change to `Action`, `Phase` or `Observation`.
pub const ACTION_SCHEMA_VERSION: u32 = 1;

const REGAL_PILLOW_BONUS: i32 = 15;

/// Every decision the player can send.
/// Variants may be added; never removed or reordered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Action {
    // ── Neow and map ──────────────────────────────
    ChooseNeow { index: usize },
    ChooseNode { x: usize },
    EnterBoss,

    // ── Combat (resolved externally) ──────────────
    ResolveCombat { hp_after: i32 },

    // ── Rewards ───────────────────────────────────
    TakeReward { index: usize },
    PickCard { reward: usize, card: usize },
    SkipCards { reward: usize },
    Proceed,

    // ── Shop ──────────────────────────────────────
    BuyCard { index: usize },
    BuyColorless { index: usize },
    BuyRelic { index: usize },
    BuyPotion { index: usize },
    Purge,
    LeaveShop,

    // ── Rest, events, chests ──────────────────────
    Rest,
    Smith,
    Recall,
    LeaveEvent,
    OpenChest,
    TakeSapphireKey,
    ChooseBossRelic { index: usize },
    SkipBossRelic,
}

impl Action {
    pub fn name(&self) -> &'static str {
        match self {
            Self::ChooseNeow { .. }      => "choose_neow",
            Self::ChooseNode { .. }      => "choose_node",
            Self::EnterBoss              => "enter_boss",
            Self::ResolveCombat { .. }   => "resolve_combat",
            Self::TakeReward { .. }      => "take_reward",
            Self::PickCard { .. }        => "pick_card",
            Self::SkipCards { .. }       => "skip_cards",
            Self::Proceed                => "proceed",
            Self::BuyCard { .. }         => "buy_card",
            Self::BuyColorless { .. }    => "buy_colorless",
            Self::BuyRelic { .. }        => "buy_relic",
            Self::BuyPotion { .. }       => "buy_potion",
            Self::Purge                  => "purge",
            Self::LeaveShop              => "leave_shop",
            Self::Rest                   => "rest",
            Self::Smith                  => "smith",
            Self::Recall                 => "recall",
            Self::LeaveEvent             => "leave_event",
            Self::OpenChest              => "open_chest",
            Self::TakeSapphireKey        => "take_sapphire_key",
            Self::ChooseBossRelic { .. } => "choose_boss_relic",
            Self::SkipBossRelic          => "skip_boss_relic",
        }
    }
}

/// Where the run is waiting, with whatever the player is looking at.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum Phase {
    Neow { options: Vec<NeowOption> },
    MapChoice,
    Combat { room: RoomKind, encounter: String },
    /// `room` is `None` for the Neow card screen.
    Rewards { room: Option<RoomKind>, items: Vec<RewardItem> },
    Event { event: String },
    Shop { inventory: ShopInventory, purged: bool },
    Rest,
    Treasure { chest: ChestRoll },
    BossRelic { choices: Vec<String> },
    ActTransition { next_act: Act },
    RunComplete { victory: bool },
}

impl Phase {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Neow { .. }          => "neow",
            Self::MapChoice            => "map_choice",
            Self::Combat { .. }        => "combat",
            Self::Rewards { .. }       => "rewards",
            Self::Event { .. }         => "event",
            Self::Shop { .. }          => "shop",
            Self::Rest                 => "rest",
            Self::Treasure { .. }      => "treasure",
            Self::BossRelic { .. }     => "boss_relic",
            Self::ActTransition { .. } => "act_transition",
            Self::RunComplete { .. }   => "run_complete",
        }
    }
}

/// What an agent sees after every step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub schema_version: u32,
    pub phase:          Phase,
    pub act:            Act,
    pub floor:          Floor,
    pub hp:             i32,
    pub max_hp:         i32,
    pub gold:           i32,
    pub deck:           Vec<String>,
    pub relics:         Vec<String>,
    pub potions:        Vec<String>,
    pub keys:           Keys,
    pub position:       Option<Coord>,
    pub next_nodes:     Vec<Coord>,
    pub boss:           Option<String>,
    pub pending_edits:  Vec<DeckEdit>,
    pub counters:       StreamCounters,
    pub valid_actions:  Vec<Action>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepResult {
    pub observation: Observation,
    /// Events recorded while applying this action.
    pub events:      Vec<GenEvent>,
    pub done:        bool,
}

enum Purchase {
    Card(ShopItem<RewardCard>),
    Relic(ShopItem<String>),
    Potion(ShopItem<String>),
}

fn act_of(data: &GameData, act: Act) -> SimResult<&ActData> {
    data.act(act).ok_or(SimError::InvalidAct { act })
}

#[derive(Clone)]
pub struct RunOrchestrator {
    pub run_id:             RunId,
    pub(crate) config:      RunConfig,
    pub(crate) data:        GameData,
    pub(crate) seed:        i64,
    pub(crate) registry:    RngRegistry,
    pub(crate) neow_rng:    StreamRng,
    pub(crate) state:       RunState,
    pub(crate) card_pools:  CardPools,
    pub(crate) potion_pool: PotionPool,
    pub(crate) relic_pools: RelicPools,
    pub(crate) event_pools: EventPools,
    pub(crate) encounters:  EncounterQueues,
    pub(crate) map:         MapGraph,
    pub(crate) phase:       Phase,
    pub(crate) actions:     Vec<Action>,
    pub(crate) events:      Vec<GenEvent>,
    pub(crate) persisted:   usize,
}

impl RunOrchestrator {
    /// Start a run: streams, starting state, relic pools, act 1 encounters
    /// and map, then the Neow options.
    pub fn new(run_id: RunId, config: RunConfig, data: GameData) -> SimResult<Self> {
        let seed = config.seed.resolve()?;
        let ascension = config.ascension;
        let mut registry = RngRegistry::create_run(seed, ascension);
        let state = RunState::new(&data, &config)?;
        let card_pools = CardPools::for_character(&data, config.character)?;
        let potion_pool = PotionPool::for_character(&data, config.character);
        let relic_pools = RelicPools::initialize(
            &data,
            config.character,
            &state.relics,
            registry.stream_mut(StreamName::Relic),
        );

        let act = act_of(&data, 1)?;
        let encounters =
            generate_act_encounters(act, ascension, &[], registry.stream_mut(StreamName::Monster))?;
        let map = map_generator::generate(
            1,
            ascension,
            &act.room_chances,
            config.final_act,
            registry.stream_mut(StreamName::Map),
        )?;
        let event_pools = EventPools::new(&data.events, act);

        let mut neow_rng = StreamRng::new(seed).with_name("neow");
        let options = neow::generate_options(&mut neow_rng);

        log::info!(
            "run={run_id} orchestrator: seed {} ({seed}), {} A{ascension}",
            seed_to_string(seed),
            config.character
        );

        let mut run = Self {
            run_id,
            seed,
            registry,
            neow_rng,
            state,
            card_pools,
            potion_pool,
            relic_pools,
            event_pools,
            encounters,
            map,
            phase: Phase::Neow { options: options.clone() },
            actions: Vec::new(),
            events: Vec::new(),
            persisted: 0,
            config,
            data,
        };
        run.record(GenEvent::RunStarted {
            floor: 0,
            seed,
            seed_text: seed_to_string(seed),
            character: run.config.character,
            ascension,
        });
        run.record_act_generation();
        run.record(GenEvent::NeowOptionsGenerated { floor: 0, options });
        Ok(run)
    }

    // ── Accessors ──────────────────────────────────────────────────

    pub fn config(&self) -> &RunConfig { &self.config }
    pub fn data(&self) -> &GameData { &self.data }
    pub fn seed(&self) -> i64 { self.seed }
    pub fn registry(&self) -> &RngRegistry { &self.registry }
    pub fn state(&self) -> &RunState { &self.state }
    pub fn phase(&self) -> &Phase { &self.phase }
    pub fn map(&self) -> &MapGraph { &self.map }
    pub fn encounters(&self) -> &EncounterQueues { &self.encounters }
    pub fn relic_pools(&self) -> &RelicPools { &self.relic_pools }
    pub fn card_pools(&self) -> &CardPools { &self.card_pools }
    pub fn actions(&self) -> &[Action] { &self.actions }
    pub fn events(&self) -> &[GenEvent] { &self.events }
    pub fn neow_counter(&self) -> u32 { self.neow_rng.counter() }

    pub fn is_complete(&self) -> bool {
        matches!(self.phase, Phase::RunComplete { .. })
    }

    // ── Action interface ───────────────────────────────────────────

    /// Apply one action. Illegal actions leave the run untouched.
    pub fn step(&mut self, action: Action) -> SimResult<StepResult> {
        if self.is_complete() {
            return Err(SimError::RunComplete);
        }
        let first_new = self.events.len();
        self.apply(&action)?;
        self.actions.push(action);
        Ok(StepResult {
            observation: self.observe(),
            events:      self.events[first_new..].to_vec(),
            done:        self.is_complete(),
        })
    }

    pub fn observe(&self) -> Observation {
        Observation {
            schema_version: ACTION_SCHEMA_VERSION,
            phase:          self.phase.clone(),
            act:            self.state.act,
            floor:          self.state.floor,
            hp:             self.state.hp,
            max_hp:         self.state.max_hp,
            gold:           self.state.gold,
            deck:           self.state.deck_ids(),
            relics:         self.state.relics.clone(),
            potions:        self.state.potions.clone(),
            keys:           self.state.keys,
            position:       self.state.position,
            next_nodes:     self.next_nodes(),
            boss:           self.encounters.peek_boss().map(str::to_string),
            pending_edits:  self.state.pending_edits.clone(),
            counters:       self.registry.counters(),
            valid_actions:  self.valid_actions(),
        }
    }

    /// Every action `step` accepts right now. Combat is listed once, as a
    /// fight that costs no HP.
    pub fn valid_actions(&self) -> Vec<Action> {
        let state = &self.state;
        match &self.phase {
            Phase::Neow { options } => {
                (0..options.len()).map(|index| Action::ChooseNeow { index }).collect()
            }
            Phase::MapChoice => {
                if self.at_boss_edge() {
                    vec![Action::EnterBoss]
                } else {
                    self.next_nodes().into_iter().map(|(x, _)| Action::ChooseNode { x }).collect()
                }
            }
            Phase::Combat { .. } => vec![Action::ResolveCombat { hp_after: state.hp }],
            Phase::Rewards { items, .. } => {
                let mut out = Vec::new();
                for (i, item) in items.iter().enumerate() {
                    match item {
                        RewardItem::Cards { cards } => {
                            out.extend((0..cards.len()).map(|card| Action::PickCard { reward: i, card }));
                            out.push(Action::SkipCards { reward: i });
                        }
                        RewardItem::Potion { .. } if !state.has_potion_slot() => {}
                        _ => out.push(Action::TakeReward { index: i }),
                    }
                }
                out.push(Action::Proceed);
                out
            }
            Phase::Event { .. } => vec![Action::LeaveEvent],
            Phase::Shop { inventory, purged } => {
                let affordable = |price: i32| price <= state.gold;
                let mut out = Vec::new();
                for (index, c) in inventory.cards.iter().enumerate() {
                    if affordable(c.price) {
                        out.push(Action::BuyCard { index });
                    }
                }
                for (index, c) in inventory.colorless.iter().enumerate() {
                    if affordable(c.price) {
                        out.push(Action::BuyColorless { index });
                    }
                }
                for (index, r) in inventory.relics.iter().enumerate() {
                    if affordable(r.price) {
                        out.push(Action::BuyRelic { index });
                    }
                }
                if state.has_potion_slot() {
                    for (index, p) in inventory.potions.iter().enumerate() {
                        if affordable(p.price) {
                            out.push(Action::BuyPotion { index });
                        }
                    }
                }
                if !purged && affordable(inventory.purge_cost) {
                    out.push(Action::Purge);
                }
                out.push(Action::LeaveShop);
                out
            }
            Phase::Rest => {
                let mut out = Vec::new();
                if !state.has_relic("Coffee Dripper") {
                    out.push(Action::Rest);
                }
                if !state.has_relic("Fusion Hammer") {
                    out.push(Action::Smith);
                }
                if state.final_act && !state.keys.ruby {
                    out.push(Action::Recall);
                }
                if out.is_empty() {
                    // Both options blocked: the site is passed through.
                    out.push(Action::Proceed);
                }
                out
            }
            Phase::Treasure { .. } => {
                let mut out = vec![Action::OpenChest];
                if state.final_act && !state.keys.sapphire {
                    out.push(Action::TakeSapphireKey);
                }
                out
            }
            Phase::BossRelic { choices } => {
                let mut out: Vec<Action> =
                    (0..choices.len()).map(|index| Action::ChooseBossRelic { index }).collect();
                out.push(Action::SkipBossRelic);
                out
            }
            Phase::ActTransition { .. } => vec![Action::Proceed],
            Phase::RunComplete { .. } => Vec::new(),
        }
    }

    fn illegal(&self, action: &Action) -> SimError {
        SimError::IllegalAction {
            phase:  self.phase.name().to_string(),
            action: action.name().to_string(),
        }
    }

    fn apply(&mut self, action: &Action) -> SimResult<()> {
        match (&self.phase, action) {
            (Phase::Neow { options }, Action::ChooseNeow { index }) if *index < options.len() => {
                let option = options[*index];
                self.choose_neow(option)
            }
            (Phase::MapChoice, Action::ChooseNode { x }) if !self.at_boss_edge() => {
                let target = self
                    .next_nodes()
                    .into_iter()
                    .find(|at| at.0 == *x)
                    .ok_or_else(|| self.illegal(action))?;
                self.enter_node(target)
            }
            (Phase::MapChoice, Action::EnterBoss) if self.at_boss_edge() => self.enter_boss(),
            (Phase::Combat { .. }, Action::ResolveCombat { hp_after }) => self.resolve_combat(*hp_after),
            (Phase::Rewards { .. }, Action::TakeReward { index }) => self.take_reward(*index, action),
            (Phase::Rewards { .. }, Action::PickCard { reward, card }) => {
                self.pick_card(*reward, Some(*card), action)
            }
            (Phase::Rewards { .. }, Action::SkipCards { reward }) => self.pick_card(*reward, None, action),
            (Phase::Rewards { room, .. }, Action::Proceed) => {
                let room = *room;
                self.leave_rewards(room)
            }
            (Phase::Event { .. }, Action::LeaveEvent) | (Phase::Shop { .. }, Action::LeaveShop) => {
                self.phase = Phase::MapChoice;
                Ok(())
            }
            (
                Phase::Shop { .. },
                Action::BuyCard { .. }
                | Action::BuyColorless { .. }
                | Action::BuyRelic { .. }
                | Action::BuyPotion { .. },
            ) => self.buy(action),
            (Phase::Shop { .. }, Action::Purge) => self.purge(action),
            (Phase::Rest, Action::Rest | Action::Smith | Action::Recall | Action::Proceed)
                if self.valid_actions().contains(action) =>
            {
                self.rest_site(action)
            }
            (Phase::Treasure { chest }, Action::OpenChest) => {
                let chest = *chest;
                self.open_treasure(chest, false)
            }
            (Phase::Treasure { chest }, Action::TakeSapphireKey)
                if self.state.final_act && !self.state.keys.sapphire =>
            {
                let chest = *chest;
                self.open_treasure(chest, true)
            }
            (Phase::BossRelic { choices }, Action::ChooseBossRelic { index }) if *index < choices.len() => {
                let relic = choices[*index].clone();
                self.take_boss_relic(Some(relic))
            }
            (Phase::BossRelic { .. }, Action::SkipBossRelic) => self.take_boss_relic(None),
            (Phase::ActTransition { next_act }, Action::Proceed) => {
                let next_act = *next_act;
                self.enter_act(next_act)
            }
            _ => Err(self.illegal(action)),
        }
    }

    // ── Event log ──────────────────────────────────────────────────

    fn record(&mut self, event: GenEvent) {
        log::debug!("floor={} {}: {}", event.floor(), event.source(), event_type_name(&event));
        self.events.push(event);
    }

    fn record_act_generation(&mut self) {
        let floor = self.state.floor;
        let event = GenEvent::EncountersGenerated {
            floor,
            act:    self.encounters.act,
            normal: self.encounters.normal.clone(),
            elite:  self.encounters.elite.clone(),
            bosses: self.encounters.bosses.clone(),
        };
        self.record(event);
        let event = GenEvent::MapGenerated {
            floor,
            act:         self.map.act,
            rooms:       self.map.path_nodes().count(),
            elites:      self.map.count_rooms(RoomKind::Elite),
            map_counter: self.registry.counter(StreamName::Map),
        };
        self.record(event);
    }

    /// Write every event not yet persisted. A snapshot is saved alongside
    /// whenever a new act was entered.
    pub fn persist(&mut self, store: &SimStore) -> SimResult<usize> {
        let pending = &self.events[self.persisted..];
        let mut act_entered = false;
        for event in pending {
            act_entered |= matches!(event, GenEvent::ActEntered { .. });
            let entry = EventLogEntry {
                id:         None,
                run_id:     self.run_id.clone(),
                floor:      event.floor(),
                source:     event.source().to_string(),
                event_type: event_type_name(event).to_string(),
                payload:    serde_json::to_string(event)?,
            };
            store.append_event(&entry)?;
        }
        let written = pending.len();
        self.persisted = self.events.len();
        if act_entered {
            let json = serde_json::to_string(&self.snapshot())?;
            store.save_snapshot(&self.run_id, self.state.floor, &json)?;
            log::debug!("floor={} orchestrator: snapshot saved", self.state.floor);
        }
        Ok(written)
    }

    // ── Neow ───────────────────────────────────────────────────────

    fn grant_pool_relic(&mut self, tier: RelicTier) -> SimResult<String> {
        let ctx = SpawnContext { act: self.state.act, floor: self.state.floor, owned: &self.state.relics };
        let relic = self.relic_pools.take(tier, PoolEnd::Front, &ctx, &self.data.fallback)?;
        self.state.add_relic(&relic);
        Ok(relic)
    }

    /// Drawback first, then the reward.
    fn choose_neow(&mut self, option: NeowOption) -> SimResult<()> {
        let floor = self.state.floor;
        self.record(GenEvent::NeowChosen { floor, option });
        let hp_bonus = neow::hp_bonus(self.state.max_hp);

        match option.drawback {
            NeowDrawback::None => {}
            NeowDrawback::TenPercentHpLoss => self.state.lose_max_hp(hp_bonus),
            NeowDrawback::NoGold => self.state.gold = 0,
            NeowDrawback::Curse => {
                let curse = self.card_pools.draw_curse(&mut self.neow_rng)?;
                self.state.add_curse(&curse);
            }
            NeowDrawback::PercentDamage => self.state.hp -= self.state.hp / 10 * 3,
        }

        let mut items = Vec::new();
        let queue = |edit: DeckEdit, state: &mut RunState| state.pending_edits.push(edit);
        match option.reward {
            NeowReward::ThreeCards => {
                let cards = neow::blessing_cards(&self.card_pools, false, &mut self.neow_rng)?;
                items.push(RewardItem::Cards { cards });
            }
            NeowReward::ThreeRareCards => {
                let cards = neow::blessing_cards(&self.card_pools, true, &mut self.neow_rng)?;
                items.push(RewardItem::Cards { cards });
            }
            NeowReward::RandomColorless => {
                let cards = neow::blessing_colorless(&self.card_pools, false, &mut self.neow_rng)?;
                items.push(RewardItem::Cards { cards });
            }
            NeowReward::RandomColorless2 => {
                let cards = neow::blessing_colorless(&self.card_pools, true, &mut self.neow_rng)?;
                items.push(RewardItem::Cards { cards });
            }
            NeowReward::OneRandomRareCard => {
                let card = self.card_pools.draw(CardRarity::Rare, &mut self.neow_rng)?;
                self.state.add_card(&card);
            }
            NeowReward::RemoveCard => queue(DeckEdit::Remove { count: 1 }, &mut self.state),
            NeowReward::RemoveTwo => queue(DeckEdit::Remove { count: 2 }, &mut self.state),
            NeowReward::UpgradeCard => queue(DeckEdit::Upgrade { count: 1 }, &mut self.state),
            NeowReward::TransformCard => queue(DeckEdit::Transform { count: 1 }, &mut self.state),
            NeowReward::TransformTwoCards => queue(DeckEdit::Transform { count: 2 }, &mut self.state),
            NeowReward::ThreeSmallPotions => {
                let potion_rng = self.registry.stream_mut(StreamName::Potion);
                for _ in 0..3 {
                    let id = self.potion_pool.draw_any(potion_rng)?;
                    items.push(RewardItem::Potion { id });
                }
            }
            NeowReward::RandomCommonRelic => {
                self.grant_pool_relic(RelicTier::Common)?;
            }
            NeowReward::OneRareRelic => {
                self.grant_pool_relic(RelicTier::Rare)?;
            }
            NeowReward::BossRelic => {
                let starter = self.data.character(self.state.character)?.starter_relic.clone();
                self.state.remove_relic(&starter);
                self.grant_pool_relic(RelicTier::Boss)?;
            }
            NeowReward::TenPercentHpBonus => self.state.gain_max_hp(hp_bonus),
            NeowReward::TwentyPercentHpBonus => self.state.gain_max_hp(hp_bonus * 2),
            NeowReward::ThreeEnemyKill => self.state.add_relic("NeowsBlessing"),
            NeowReward::HundredGold => self.state.gain_gold(100),
            NeowReward::TwoFiftyGold => self.state.gain_gold(250),
        }

        if items.is_empty() {
            self.phase = Phase::MapChoice;
        } else {
            self.record(GenEvent::RewardsGenerated { floor, items: items.clone() });
            self.phase = Phase::Rewards { room: None, items };
        }
        Ok(())
    }

    // ── Map ────────────────────────────────────────────────────────

    /// Nodes the player may move to next, by lane.
    pub fn next_nodes(&self) -> Vec<Coord> {
        let mut next = match self.state.position {
            None     => self.map.start_nodes(),
            Some(at) => self.map.children(at),
        };
        next.sort_unstable();
        next.dedup();
        next
    }

    fn at_boss_edge(&self) -> bool {
        self.state
            .position
            .and_then(|at| self.map.node(at))
            .is_some_and(|n| n.edges.iter().any(|e| e.to_boss))
    }

    fn advance_floor(&mut self) {
        self.state.floor += 1;
        self.registry.enter_floor(self.state.floor);
    }

    fn enter_node(&mut self, at: Coord) -> SimResult<()> {
        let tagged = self.map.node(at).and_then(|n| n.room).unwrap_or(RoomKind::Monster);
        self.state.position = Some(at);
        self.advance_floor();
        let floor = self.state.floor;
        self.record(GenEvent::FloorEntered { floor, x: at.0, y: at.1, room: tagged });

        let room = if tagged == RoomKind::Event {
            let resolved = self
                .state
                .unknown_odds
                .resolve(&self.state.relics, self.registry.stream_mut(StreamName::Event));
            self.record(GenEvent::UnknownRoomResolved { floor, room: resolved });
            resolved
        } else {
            tagged
        };
        self.enter_room(room)
    }

    fn enter_room(&mut self, room: RoomKind) -> SimResult<()> {
        let floor = self.state.floor;
        match room {
            RoomKind::Monster => {
                let act = act_of(&self.data, self.state.act)?;
                let encounter = self.encounters.take_normal(act, self.registry.stream_mut(StreamName::Monster))?;
                self.start_combat(room, encounter);
            }
            RoomKind::Elite => {
                let act = act_of(&self.data, self.state.act)?;
                let encounter = self.encounters.take_elite(act, self.registry.stream_mut(StreamName::Monster))?;
                self.start_combat(room, encounter);
            }
            RoomKind::Boss => {
                let encounter = self.encounters.take_boss()?;
                self.start_combat(room, encounter);
            }
            RoomKind::Event => {
                let ctx = EventContext {
                    floor,
                    act:       self.state.act,
                    gold:      self.state.gold,
                    hp:        self.state.hp,
                    max_hp:    self.state.max_hp,
                    relics:    &self.state.relics,
                    has_curse: self.state.has_removable_curse(&self.data.curses),
                    map_row:   self.state.position.map(|at| at.1),
                    map_rows:  self.map.height(),
                };
                let event = self.event_pools.pick_event(
                    &self.data.events,
                    &ctx,
                    self.registry.stream_mut(StreamName::Event),
                )?;
                self.record(GenEvent::EventSelected { floor, event: event.clone() });
                self.phase = Phase::Event { event };
            }
            RoomKind::Shop => self.open_shop()?,
            RoomKind::Rest => self.phase = Phase::Rest,
            RoomKind::Treasure => {
                let chest = roll_chest(self.registry.stream_mut(StreamName::Treasure));
                self.phase = Phase::Treasure { chest };
            }
            RoomKind::BossTreasure => self.offer_boss_relics()?,
        }
        Ok(())
    }

    fn enter_boss(&mut self) -> SimResult<()> {
        self.advance_floor();
        let at = (BOSS_LANE, self.map.boss_row());
        self.record(GenEvent::FloorEntered { floor: self.state.floor, x: at.0, y: at.1, room: RoomKind::Boss });
        self.enter_room(RoomKind::Boss)
    }

    // ── Combat ─────────────────────────────────────────────────────

    fn start_combat(&mut self, room: RoomKind, encounter: String) {
        let floor = self.state.floor;
        log::debug!("floor={floor} orchestrator: {room:?} fight against {encounter}");
        self.record(GenEvent::CombatStarted { floor, room, encounter: encounter.clone() });
        self.phase = Phase::Combat { room, encounter };
    }

    fn run_ends_after_boss(&self) -> bool {
        if self.encounters.has_next_boss() {
            return false;
        }
        match self.state.act {
            1 | 2 => false,
            3 => !(self.state.final_act && self.state.keys.all()),
            _ => true,
        }
    }

    fn resolve_combat(&mut self, hp_after: i32) -> SimResult<()> {
        let Phase::Combat { room, encounter } = &self.phase else {
            return Err(self.illegal(&Action::ResolveCombat { hp_after }));
        };
        let (room, encounter) = (*room, encounter.clone());
        let floor = self.state.floor;
        self.record(GenEvent::CombatResolved { floor, encounter: encounter.clone(), hp_after });
        self.state.encounters.push(encounter);

        if hp_after <= 0 {
            self.state.hp = 0;
            self.finish(false);
            return Ok(());
        }
        self.state.hp = hp_after.min(self.state.max_hp);
        if room == RoomKind::Boss && self.run_ends_after_boss() {
            self.finish(true);
            return Ok(());
        }

        let act = act_of(&self.data, self.state.act)?;
        let upgrade_chance = act.upgrade_chance_for(self.state.ascension);
        let burning_elite = room == RoomKind::Elite
            && self.state.position.and_then(|at| self.map.node(at)).is_some_and(|n| n.burning_elite);
        let tables = RewardTables {
            cards:   &self.card_pools,
            potions: &self.potion_pool,
            policy:  &self.data.fallback,
        };
        let items = generate_combat_rewards(
            room,
            upgrade_chance,
            burning_elite,
            &mut self.state,
            &mut self.relic_pools,
            tables,
            &mut self.registry,
        )?;
        self.record(GenEvent::RewardsGenerated { floor, items: items.clone() });
        self.phase = Phase::Rewards { room: Some(room), items };
        Ok(())
    }

    fn finish(&mut self, victory: bool) {
        let floor = self.state.floor;
        log::info!("floor={floor} orchestrator: run {}", if victory { "won" } else { "lost" });
        self.record(GenEvent::RunEnded { floor, victory, counters: self.registry.counters() });
        self.phase = Phase::RunComplete { victory };
    }

    // ── Rewards ────────────────────────────────────────────────────

    fn reward_item(&self, index: usize) -> Option<&RewardItem> {
        match &self.phase {
            Phase::Rewards { items, .. } => items.get(index),
            _ => None,
        }
    }

    fn remove_reward(&mut self, index: usize) {
        if let Phase::Rewards { items, .. } = &mut self.phase {
            items.remove(index);
        }
    }

    fn take_reward(&mut self, index: usize, action: &Action) -> SimResult<()> {
        let item = self.reward_item(index).cloned().ok_or_else(|| self.illegal(action))?;
        match &item {
            RewardItem::Gold { amount } => self.state.gain_gold(*amount),
            RewardItem::Relic { id } => self.state.add_relic(id),
            RewardItem::Potion { id } => {
                if !self.state.add_potion(id) {
                    return Err(self.illegal(action));
                }
            }
            RewardItem::EmeraldKey => self.state.keys.emerald = true,
            RewardItem::Cards { .. } => return Err(self.illegal(action)),
        }
        self.remove_reward(index);
        self.record(GenEvent::RewardTaken { floor: self.state.floor, item });
        Ok(())
    }

    /// Pick `card` from a card reward, or skip it with `None`.
    fn pick_card(&mut self, reward: usize, card: Option<usize>, action: &Action) -> SimResult<()> {
        let Some(RewardItem::Cards { cards }) = self.reward_item(reward) else {
            return Err(self.illegal(action));
        };
        let floor = self.state.floor;
        match card {
            Some(i) => {
                let picked = cards.get(i).cloned().ok_or_else(|| self.illegal(action))?;
                self.state.add_card(&picked);
                self.record(GenEvent::CardPicked { floor, card: picked });
            }
            None => self.record(GenEvent::CardsSkipped { floor }),
        }
        self.remove_reward(reward);
        Ok(())
    }

    fn leave_rewards(&mut self, room: Option<RoomKind>) -> SimResult<()> {
        if room != Some(RoomKind::Boss) {
            self.phase = Phase::MapChoice;
            return Ok(());
        }
        if self.encounters.has_next_boss() {
            return self.enter_boss();
        }
        if self.state.act >= 3 {
            self.phase = Phase::ActTransition { next_act: self.state.act + 1 };
            return Ok(());
        }
        self.advance_floor();
        let at = (BOSS_LANE, self.map.boss_row() + 1);
        self.record(GenEvent::FloorEntered {
            floor: self.state.floor,
            x: at.0,
            y: at.1,
            room: RoomKind::BossTreasure,
        });
        self.enter_room(RoomKind::BossTreasure)
    }

    fn offer_boss_relics(&mut self) -> SimResult<()> {
        let ctx = SpawnContext { act: self.state.act, floor: self.state.floor, owned: &self.state.relics };
        let choices = self.relic_pools.boss_choices(&ctx, &self.data.fallback)?;
        self.record(GenEvent::BossRelicsOffered { floor: self.state.floor, relics: choices.clone() });
        self.phase = Phase::BossRelic { choices };
        Ok(())
    }

    /// Boss relics that upgrade a starter replace it.
    fn take_boss_relic(&mut self, relic: Option<String>) -> SimResult<()> {
        if let Some(id) = &relic {
            let replaces = self
                .data
                .relics
                .iter()
                .find(|r| &r.id == id)
                .and_then(|r| r.requires.clone());
            if let Some(old) = replaces {
                self.state.remove_relic(&old);
            }
            self.state.add_relic(id);
        }
        self.record(GenEvent::BossRelicChosen { floor: self.state.floor, relic });
        self.phase = Phase::ActTransition { next_act: self.state.act + 1 };
        Ok(())
    }

    // ── Shop ───────────────────────────────────────────────────────

    fn open_shop(&mut self) -> SimResult<()> {
        let ctx = ShopContext {
            ascension:   self.state.ascension,
            blizzard:    self.state.card_blizzard,
            purge_count: self.state.purge_count,
            spawn:       SpawnContext { act: self.state.act, floor: self.state.floor, owned: &self.state.relics },
        };
        let [card, merchant, potion] =
            self.registry.streams_mut([StreamName::Card, StreamName::Merchant, StreamName::Potion])?;
        let inventory = generate_shop(
            &self.card_pools,
            &self.potion_pool,
            &mut self.relic_pools,
            &ctx,
            &self.data.fallback,
            ShopStreams { card, merchant, potion },
        )?;
        self.record(GenEvent::ShopGenerated { floor: self.state.floor, inventory: inventory.clone() });
        self.phase = Phase::Shop { inventory, purged: false };
        Ok(())
    }

    fn buy(&mut self, action: &Action) -> SimResult<()> {
        let illegal = self.illegal(action);
        let gold = self.state.gold;
        let potion_slot = self.state.has_potion_slot();
        let Phase::Shop { inventory, .. } = &mut self.phase else {
            return Err(illegal);
        };

        fn take<T>(items: &mut Vec<ShopItem<T>>, index: usize, gold: i32) -> Option<ShopItem<T>> {
            (items.get(index)?.price <= gold).then(|| items.remove(index))
        }
        let purchase = match *action {
            Action::BuyCard { index }      => take(&mut inventory.cards, index, gold).map(Purchase::Card),
            Action::BuyColorless { index } => take(&mut inventory.colorless, index, gold).map(Purchase::Card),
            Action::BuyRelic { index }     => take(&mut inventory.relics, index, gold).map(Purchase::Relic),
            Action::BuyPotion { index } if potion_slot => {
                take(&mut inventory.potions, index, gold).map(Purchase::Potion)
            }
            _ => None,
        }
        .ok_or(illegal)?;

        let (item, price) = match purchase {
            Purchase::Card(entry) => {
                self.state.add_card(&entry.item);
                (entry.item.id, entry.price)
            }
            Purchase::Relic(entry) => {
                self.state.add_relic(&entry.item);
                (entry.item, entry.price)
            }
            Purchase::Potion(entry) => {
                self.state.add_potion(&entry.item);
                (entry.item, entry.price)
            }
        };
        let paid = self.state.spend_gold(price);
        debug_assert!(paid, "price is checked before the item leaves the shop");
        self.record(GenEvent::ItemPurchased { floor: self.state.floor, item, price });
        Ok(())
    }

    fn purge(&mut self, action: &Action) -> SimResult<()> {
        let illegal = self.illegal(action);
        let price = match &self.phase {
            Phase::Shop { inventory, purged: false } => inventory.purge_cost,
            _ => return Err(illegal),
        };
        if !self.state.spend_gold(price) {
            return Err(illegal);
        }
        if let Phase::Shop { purged, .. } = &mut self.phase {
            *purged = true;
        }
        self.state.purge_count += 1;
        self.state.pending_edits.push(DeckEdit::Remove { count: 1 });
        self.record(GenEvent::CardPurged { floor: self.state.floor, price });
        Ok(())
    }

    // ── Rest sites and chests ──────────────────────────────────────

    fn rest_site(&mut self, action: &Action) -> SimResult<()> {
        let floor = self.state.floor;
        match action {
            Action::Rest => {
                let mut amount = self.state.rest_heal_amount();
                if self.state.has_relic("Regal Pillow") {
                    amount += REGAL_PILLOW_BONUS;
                }
                let before = self.state.hp;
                self.state.heal(amount);
                self.record(GenEvent::Rested { floor, healed: self.state.hp - before });
            }
            Action::Smith => {
                self.state.pending_edits.push(DeckEdit::Upgrade { count: 1 });
                self.record(GenEvent::Smithed { floor });
            }
            Action::Recall => {
                self.state.keys.ruby = true;
                self.record(GenEvent::KeyObtained { floor, key: "ruby".into() });
            }
            _ => {}
        }
        self.phase = Phase::MapChoice;
        Ok(())
    }

    fn open_treasure(&mut self, chest: ChestRoll, sapphire: bool) -> SimResult<()> {
        let floor = self.state.floor;
        let ctx = SpawnContext { act: self.state.act, floor, owned: &self.state.relics };
        let reward = open_chest(
            chest,
            &mut self.relic_pools,
            &ctx,
            &self.data.fallback,
            self.registry.stream_mut(StreamName::Treasure),
        )?;
        if let Some(gold) = reward.gold {
            self.state.gain_gold(gold);
        }
        if sapphire {
            self.state.keys.sapphire = true;
            self.record(GenEvent::KeyObtained { floor, key: "sapphire".into() });
        } else {
            self.state.add_relic(&reward.relic);
        }
        self.record(GenEvent::TreasureOpened { floor, reward });
        self.phase = Phase::MapChoice;
        Ok(())
    }

    // ── Act transitions ────────────────────────────────────────────

    /// Snap and reseed, heal, reset the `?` odds, then generate the new
    /// act's encounters and map.
    fn enter_act(&mut self, next_act: Act) -> SimResult<()> {
        let act = act_of(&self.data, next_act)?;
        let (before, after) = self.registry.transition_to_act(next_act)?;
        self.state.act = next_act;
        self.state.position = None;
        self.state.act_transition_heal();
        self.state.unknown_odds.reset();
        self.event_pools.enter_act(&self.data.events, act);

        let ascension = self.state.ascension;
        // Repeat rules never look across an act boundary.
        self.encounters = generate_act_encounters(
            act,
            ascension,
            &[],
            self.registry.stream_mut(StreamName::Monster),
        )?;
        self.map = map_generator::generate(
            next_act,
            ascension,
            &act.room_chances,
            self.state.final_act,
            self.registry.stream_mut(StreamName::Map),
        )?;

        log::info!("floor={} orchestrator: entered act {next_act} ({})", self.state.floor, act.name);
        self.record(GenEvent::ActEntered {
            floor: self.state.floor,
            act: next_act,
            card_counter_before: before,
            card_counter_after: after,
        });
        self.record_act_generation();
        self.phase = Phase::MapChoice;
        Ok(())
    }
}

/// Rebuild a run from its action log.
pub fn replay(
    run_id: RunId,
    config: RunConfig,
    data: GameData,
    actions: &[Action],
) -> SimResult<RunOrchestrator> {
    let mut run = RunOrchestrator::new(run_id, config, data)?;
    for action in actions {
        run.step(action.clone())?;
    }
    Ok(run)
}

/// Replay until the run first stands on `floor`.
pub fn replay_to_floor(
    run_id: RunId,
    config: RunConfig,
    data: GameData,
    actions: &[Action],
    floor: Floor,
) -> SimResult<RunOrchestrator> {
    let mut run = RunOrchestrator::new(run_id, config, data)?;
    for action in actions {
        if run.state.floor >= floor {
            break;
        }
        run.step(action.clone())?;
    }
    Ok(run)
}

/// Extract a stable string name from a GenEvent variant.
/// Used for the event_type column in event_log.
pub fn event_type_name(event: &GenEvent) -> &'static str {
    match event {
        GenEvent::RunStarted { .. }           => "run_started",
        GenEvent::RunEnded { .. }             => "run_ended",
        GenEvent::NeowOptionsGenerated { .. } => "neow_options_generated",
        GenEvent::NeowChosen { .. }           => "neow_chosen",
        GenEvent::ActEntered { .. }           => "act_entered",
        GenEvent::MapGenerated { .. }         => "map_generated",
        GenEvent::EncountersGenerated { .. }  => "encounters_generated",
        GenEvent::FloorEntered { .. }         => "floor_entered",
        GenEvent::UnknownRoomResolved { .. }  => "unknown_room_resolved",
        GenEvent::CombatStarted { .. }        => "combat_started",
        GenEvent::CombatResolved { .. }       => "combat_resolved",
        GenEvent::EventSelected { .. }        => "event_selected",
        GenEvent::RewardsGenerated { .. }     => "rewards_generated",
        GenEvent::RewardTaken { .. }          => "reward_taken",
        GenEvent::CardPicked { .. }           => "card_picked",
        GenEvent::CardsSkipped { .. }         => "cards_skipped",
        GenEvent::ShopGenerated { .. }        => "shop_generated",
        GenEvent::ItemPurchased { .. }        => "item_purchased",
        GenEvent::CardPurged { .. }           => "card_purged",
        GenEvent::TreasureOpened { .. }       => "treasure_opened",
        GenEvent::BossRelicsOffered { .. }    => "boss_relics_offered",
        GenEvent::BossRelicChosen { .. }      => "boss_relic_chosen",
        GenEvent::Rested { .. }               => "rested",
        GenEvent::Smithed { .. }              => "smithed",
        GenEvent::KeyObtained { .. }          => "key_obtained",
    }
}
