use crate::domain::card::{Card, CardId, CardView, Lane, Registrar};
use crate::domain::ordering::{self, Direction};
use crate::error::{BoardError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::str::FromStr;

/// Complete board state: cards, per-lane ordering and registrar lists.
///
/// The snapshot is the unit of persistence. Every mutation keeps these
/// invariants:
/// - each card id is listed in exactly one lane ordering, the one matching
///   `card.lane`, exactly once;
/// - orderings only reference existing cards;
/// - registrar lists only exist for existing cards and hold each user id once.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BoardSnapshot {
    cards: Vec<Card>,
    lanes: BTreeMap<Lane, Vec<CardId>>,
    registrars: BTreeMap<CardId, Vec<Registrar>>,
}

/// What [`BoardSnapshot::normalize`] had to repair
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NormalizeReport {
    pub duplicate_cards: usize,
    pub dropped_order_entries: usize,
    pub appended_cards: usize,
    pub dropped_registrar_sets: usize,
    pub dropped_registrars: usize,
}

impl NormalizeReport {
    pub fn is_clean(&self) -> bool {
        *self == Self::default()
    }
}

/// Loosely-typed persisted board, covering the legacy shapes seen on disk
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum RawSnapshot {
    /// Oldest format: a bare list of cards
    Cards(Vec<Card>),
    Board {
        #[serde(default)]
        cards: Vec<Card>,
        #[serde(default, alias = "order", alias = "columnOrder")]
        lanes: BTreeMap<String, Vec<String>>,
        #[serde(default)]
        registrars: BTreeMap<String, Vec<RawRegistrar>>,
    },
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum RawRegistrar {
    Entry(Registrar),
    /// Older boards stored display names only
    Name(String),
}

impl From<RawRegistrar> for Registrar {
    fn from(raw: RawRegistrar) -> Self {
        match raw {
            RawRegistrar::Entry(registrar) => registrar,
            RawRegistrar::Name(name) => Registrar::new(name.clone(), name),
        }
    }
}

impl Default for BoardSnapshot {
    fn default() -> Self {
        Self {
            cards: Vec::new(),
            lanes: Lane::ALL.into_iter().map(|lane| (lane, Vec::new())).collect(),
            registrars: BTreeMap::new(),
        }
    }
}

impl BoardSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a persisted board in any known shape and repairs it
    pub fn from_json(json: &str) -> Result<(Self, NormalizeReport)> {
        let raw: RawSnapshot = serde_json::from_str(json)?;
        Ok(Self::normalize(raw))
    }

    /// Serializes with a deterministic layout, so `save(load())` is stable
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Derives a consistent snapshot from untrusted or legacy data.
    ///
    /// Cards keep their first occurrence. Ordering entries that are unknown,
    /// duplicated, or listed under the wrong lane are dropped; cards missing
    /// from their lane are appended at the bottom. Registrar lists for unknown
    /// cards are dropped and each list keeps one entry per user id.
    pub fn normalize(raw: RawSnapshot) -> (Self, NormalizeReport) {
        let (raw_cards, raw_lanes, raw_registrars) = match raw {
            RawSnapshot::Cards(cards) => (cards, BTreeMap::new(), BTreeMap::new()),
            RawSnapshot::Board {
                cards,
                lanes,
                registrars,
            } => (cards, lanes, registrars),
        };

        let mut report = NormalizeReport::default();

        let mut seen = HashSet::new();
        let mut cards = Vec::with_capacity(raw_cards.len());
        for card in raw_cards {
            if seen.insert(card.id.clone()) {
                cards.push(card);
            } else {
                report.duplicate_cards += 1;
            }
        }
        let lane_of: HashMap<CardId, Lane> =
            cards.iter().map(|card| (card.id.clone(), card.lane)).collect();

        let mut parsed_lanes: BTreeMap<Lane, Vec<CardId>> = BTreeMap::new();
        for (name, entries) in raw_lanes {
            let Ok(lane) = Lane::from_str(&name) else {
                report.dropped_order_entries += entries.len();
                continue;
            };
            let ids = parsed_lanes.entry(lane).or_default();
            for entry in entries {
                match CardId::from_str(&entry) {
                    Ok(id) => ids.push(id),
                    Err(_) => report.dropped_order_entries += 1,
                }
            }
        }

        let mut lanes = BTreeMap::new();
        for lane in Lane::ALL {
            let mut order = parsed_lanes.remove(&lane).unwrap_or_default();
            report.dropped_order_entries +=
                ordering::retain_unique(&mut order, |id| lane_of.get(id) == Some(&lane));
            lanes.insert(lane, order);
        }

        for card in &cards {
            if let Some(order) = lanes.get_mut(&card.lane) {
                if !order.contains(&card.id) {
                    order.push(card.id.clone());
                    report.appended_cards += 1;
                }
            }
        }

        let mut registrars = BTreeMap::new();
        for (key, entries) in raw_registrars {
            let id = match CardId::from_str(&key) {
                Ok(id) if lane_of.contains_key(&id) => id,
                _ => {
                    report.dropped_registrar_sets += 1;
                    continue;
                }
            };
            let mut seen_users = HashSet::new();
            let mut list = Vec::new();
            for registrar in entries.into_iter().map(Registrar::from) {
                if seen_users.insert(registrar.id.clone()) {
                    list.push(registrar);
                } else {
                    report.dropped_registrars += 1;
                }
            }
            registrars.insert(id, list);
        }
        for card in &cards {
            registrars.entry(card.id.clone()).or_default();
        }

        (
            Self {
                cards,
                lanes,
                registrars,
            },
            report,
        )
    }

    pub fn cards(&self) -> &[Card] {
        &self.cards
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    pub fn contains(&self, id: &CardId) -> bool {
        self.cards.iter().any(|card| &card.id == id)
    }

    pub fn card(&self, id: &CardId) -> Result<&Card> {
        self.cards
            .iter()
            .find(|card| &card.id == id)
            .ok_or_else(|| BoardError::NotFound(id.to_string()))
    }

    fn card_mut(&mut self, id: &CardId) -> Result<&mut Card> {
        self.cards
            .iter_mut()
            .find(|card| &card.id == id)
            .ok_or_else(|| BoardError::NotFound(id.to_string()))
    }

    /// Top-to-bottom ids of one lane
    pub fn lane_order(&self, lane: Lane) -> &[CardId] {
        self.lanes.get(&lane).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn registrars(&self, id: &CardId) -> &[Registrar] {
        self.registrars
            .get(id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Generates an id not used by any card on this board
    pub fn next_card_id(&self) -> CardId {
        loop {
            let id = CardId::generate();
            if !self.contains(&id) {
                return id;
            }
        }
    }

    /// Adds a card at the top of its lane with no registrars
    pub fn insert_card(&mut self, card: Card) -> Result<()> {
        if self.contains(&card.id) {
            return Err(BoardError::invalid(format!(
                "card id already in use: {}",
                card.id
            )));
        }
        ordering::insert_top(self.lanes.entry(card.lane).or_default(), &card.id);
        self.registrars.insert(card.id.clone(), Vec::new());
        self.cards.push(card);
        Ok(())
    }

    /// Moves a card to the top of `lane`, even when it is already there
    pub fn move_to_lane(&mut self, id: &CardId, lane: Lane) -> Result<&Card> {
        let current = self.card(id)?.lane;
        if let Some(order) = self.lanes.get_mut(&current) {
            ordering::remove(order, id);
        }
        ordering::insert_top(self.lanes.entry(lane).or_default(), id);
        let card = self.card_mut(id)?;
        card.set_lane(lane);
        Ok(card)
    }

    /// Swaps a card with its neighbour; returns whether it moved
    pub fn shift(&mut self, id: &CardId, direction: Direction) -> Result<bool> {
        let lane = self.card(id)?.lane;
        let order = self.lanes.entry(lane).or_default();
        let moved = match ordering::shift(order, id, direction) {
            Some(moved) => moved,
            None => {
                // Unreachable for normalized boards; repair rather than fail.
                tracing::warn!(card = %id, lane = %lane, "card missing from its lane ordering");
                order.push(id.clone());
                false
            }
        };
        if moved {
            self.card_mut(id)?.touch();
        }
        Ok(moved)
    }

    pub fn set_title(&mut self, id: &CardId, title: String) -> Result<&Card> {
        let card = self.card_mut(id)?;
        card.set_title(title);
        Ok(card)
    }

    pub fn set_body(&mut self, id: &CardId, body: String) -> Result<&Card> {
        let card = self.card_mut(id)?;
        card.set_body(body);
        Ok(card)
    }

    pub fn set_expanded(&mut self, id: &CardId, expanded: bool) -> Result<&Card> {
        let card = self.card_mut(id)?;
        card.set_expanded(expanded);
        Ok(card)
    }

    /// Deletes a card together with its ordering entry and registrars
    pub fn remove_card(&mut self, id: &CardId) -> Result<Card> {
        let index = self
            .cards
            .iter()
            .position(|card| &card.id == id)
            .ok_or_else(|| BoardError::NotFound(id.to_string()))?;
        let card = self.cards.remove(index);
        for order in self.lanes.values_mut() {
            ordering::remove(order, id);
        }
        self.registrars.remove(id);
        Ok(card)
    }

    /// Replaces any entries matching `keys` with `registrar`, appended last
    pub fn register(&mut self, id: &CardId, registrar: Registrar, keys: &[&str]) -> Result<()> {
        self.card(id)?;
        let list = self.registrars.entry(id.clone()).or_default();
        list.retain(|existing| existing.id != registrar.id && !existing.matches_any(keys));
        list.push(registrar);
        Ok(())
    }

    /// Removes all entries whose id or display name matches one of `keys`
    pub fn unregister(&mut self, id: &CardId, keys: &[&str]) -> Result<()> {
        self.card(id)?;
        let list = self.registrars.entry(id.clone()).or_default();
        list.retain(|existing| !existing.matches_any(keys));
        Ok(())
    }

    pub fn view(&self, id: &CardId) -> Result<CardView> {
        let card = self.card(id)?.clone();
        Ok(CardView::new(card, self.registrars(id)))
    }

    /// Cards lane by lane, each lane top to bottom.
    ///
    /// Cards absent from every ordering are appended sorted by id. That only
    /// happens for a snapshot that skipped normalization and is logged.
    pub fn ordered_cards(&self) -> Vec<&Card> {
        let by_id: HashMap<&CardId, &Card> =
            self.cards.iter().map(|card| (&card.id, card)).collect();
        let mut listed = HashSet::new();
        let mut out = Vec::with_capacity(self.cards.len());

        for lane in Lane::ALL {
            for id in self.lane_order(lane) {
                if let Some(card) = by_id.get(id) {
                    if listed.insert(id) {
                        out.push(*card);
                    }
                }
            }
        }

        if out.len() < self.cards.len() {
            let mut orphans: Vec<&Card> = self
                .cards
                .iter()
                .filter(|card| !listed.contains(&card.id))
                .collect();
            orphans.sort_by(|a, b| a.id.cmp(&b.id));
            tracing::warn!(
                count = orphans.len(),
                "cards missing from every lane ordering; appending by id"
            );
            out.extend(orphans);
        }
        out
    }

    pub fn ordered_views(&self) -> Vec<CardView> {
        self.ordered_cards()
            .into_iter()
            .map(|card| CardView::new(card.clone(), self.registrars(&card.id)))
            .collect()
    }

    /// Describes every broken invariant; empty for a healthy board
    pub fn consistency_issues(&self) -> Vec<String> {
        let mut issues = Vec::new();
        let mut listed: HashMap<&CardId, Vec<Lane>> = HashMap::new();
        for (lane, order) in &self.lanes {
            for id in order {
                listed.entry(id).or_default().push(*lane);
            }
        }

        for card in &self.cards {
            match listed.get(&card.id).map(Vec::as_slice) {
                None | Some([]) => issues.push(format!("{} is not in any lane ordering", card.id)),
                Some([lane]) if *lane == card.lane => {}
                Some([lane]) => issues.push(format!(
                    "{} belongs to {} but is listed in {}",
                    card.id, card.lane, lane
                )),
                Some(lanes) => issues.push(format!(
                    "{} is listed {} times in lane orderings",
                    card.id,
                    lanes.len()
                )),
            }
        }
        for id in listed.keys() {
            if !self.contains(id) {
                issues.push(format!("ordering references unknown card {}", id));
            }
        }
        for (id, list) in &self.registrars {
            if !self.contains(id) {
                issues.push(format!("registrars kept for unknown card {}", id));
            }
            let unique: HashSet<&str> = list.iter().map(|r| r.id.as_str()).collect();
            if unique.len() != list.len() {
                issues.push(format!("duplicate registrars on {}", id));
            }
        }
        issues
    }
}
