// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
use std::collections::{BTreeMap, BTreeSet, HashMap};

use parking_lot::RwLock;
use tracing::{debug, warn};

use super::attribute::{Attribute, AttributeValue};
use super::element::ElementId;
use super::modulator::Modulator;

/// The soundfont model the voice engine reads from. Implementations are shared between the
/// editor and the synthesizer, so every method takes `&self`.
pub trait SoundfontStore: Send + Sync {
    /// Gets an attribute that has been explicitly set on the element.
    fn get(&self, id: ElementId, attribute: Attribute) -> Option<AttributeValue>;

    /// Gets every attribute explicitly set on the element.
    fn get_all_attributes(&self, id: ElementId) -> Vec<(Attribute, AttributeValue)>;

    /// Sets an attribute on the element.
    fn set(&self, id: ElementId, attribute: Attribute, value: AttributeValue);

    /// Removes an attribute from the element.
    fn reset(&self, id: ElementId, attribute: Attribute);

    /// Lists the zones of an instrument or a preset.
    fn children(&self, id: ElementId) -> Vec<ElementId>;

    /// Lists the modulators attached to a zone or a global zone.
    fn modulators(&self, id: ElementId) -> Vec<Modulator>;

    /// Opens an edit group. Changes until `end_edit` are undone together.
    fn begin_edit(&self, tag: &str);

    /// Closes the current edit group.
    fn end_edit(&self);
}

#[derive(Default)]
struct Inner {
    elements: BTreeSet<ElementId>,
    attributes: HashMap<ElementId, BTreeMap<Attribute, AttributeValue>>,
    modulators: HashMap<ElementId, Vec<Modulator>>,
    open_edit: Option<(String, usize)>,
    edits: Vec<(String, usize)>,
}

/// An in-memory soundfont store.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> MemoryStore {
        MemoryStore::default()
    }

    /// Registers an element without attributes.
    pub fn add_element(&self, id: ElementId) {
        self.inner.write().elements.insert(id);
    }

    /// Attaches a modulator to an element.
    pub fn add_modulator(&self, id: ElementId, modulator: Modulator) {
        let mut inner = self.inner.write();
        inner.elements.insert(id);
        inner.modulators.entry(id).or_default().push(modulator);
    }

    /// Returns the closed edit groups as (tag, number of changes), oldest first.
    pub fn edit_history(&self) -> Vec<(String, usize)> {
        self.inner.read().edits.clone()
    }

    fn record_change(inner: &mut Inner) {
        if let Some((_, changes)) = inner.open_edit.as_mut() {
            *changes += 1;
        }
    }
}

impl SoundfontStore for MemoryStore {
    fn get(&self, id: ElementId, attribute: Attribute) -> Option<AttributeValue> {
        self.inner
            .read()
            .attributes
            .get(&id)
            .and_then(|attributes| attributes.get(&attribute).copied())
    }

    fn get_all_attributes(&self, id: ElementId) -> Vec<(Attribute, AttributeValue)> {
        self.inner
            .read()
            .attributes
            .get(&id)
            .map(|attributes| attributes.iter().map(|(a, v)| (*a, *v)).collect())
            .unwrap_or_default()
    }

    fn set(&self, id: ElementId, attribute: Attribute, value: AttributeValue) {
        let mut inner = self.inner.write();
        inner.elements.insert(id);
        inner
            .attributes
            .entry(id)
            .or_default()
            .insert(attribute, value);
        Self::record_change(&mut inner);
    }

    fn reset(&self, id: ElementId, attribute: Attribute) {
        let mut inner = self.inner.write();
        let removed = inner
            .attributes
            .get_mut(&id)
            .and_then(|attributes| attributes.remove(&attribute))
            .is_some();
        if removed {
            Self::record_change(&mut inner);
        }
    }

    fn children(&self, id: ElementId) -> Vec<ElementId> {
        self.inner
            .read()
            .elements
            .iter()
            .filter(|element| id.owns(element))
            .copied()
            .collect()
    }

    fn modulators(&self, id: ElementId) -> Vec<Modulator> {
        self.inner
            .read()
            .modulators
            .get(&id)
            .cloned()
            .unwrap_or_default()
    }

    fn begin_edit(&self, tag: &str) {
        let mut inner = self.inner.write();
        if let Some((previous, changes)) = inner.open_edit.take() {
            warn!(
                previous,
                tag, "Edit group opened while another was open, closing the previous one."
            );
            inner.edits.push((previous, changes));
        }
        debug!(tag, "Opening edit group.");
        inner.open_edit = Some((tag.to_string(), 0));
    }

    fn end_edit(&self) {
        let mut inner = self.inner.write();
        match inner.open_edit.take() {
            Some(edit) => inner.edits.push(edit),
            None => debug!("No edit group to close."),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::soundfont::Generator;

    #[test]
    fn test_attributes() {
        let store = MemoryStore::new();
        let zone = ElementId::InstrumentZone {
            sf2: 0,
            instrument: 0,
            zone: 1,
        };

        assert_eq!(None, store.get(zone, Generator::Pan.into()));
        store.set(zone, Generator::Pan.into(), AttributeValue::from_short(-120));
        store.set(zone, Attribute::KeyRange, AttributeValue::from_range(0, 60));
        assert_eq!(
            Some(-120),
            store.get(zone, Generator::Pan.into()).map(|v| v.short())
        );
        assert_eq!(2, store.get_all_attributes(zone).len());

        store.reset(zone, Generator::Pan.into());
        assert_eq!(None, store.get(zone, Generator::Pan.into()));
        assert_eq!(
            vec![(Attribute::KeyRange, AttributeValue::from_range(0, 60))],
            store.get_all_attributes(zone)
        );
    }

    #[test]
    fn test_children() {
        let store = MemoryStore::new();
        let instrument = ElementId::Instrument {
            sf2: 0,
            instrument: 3,
        };
        store.add_element(instrument);
        for zone in [2, 0, 1] {
            store.add_element(ElementId::InstrumentZone {
                sf2: 0,
                instrument: 3,
                zone,
            });
        }
        store.add_element(ElementId::InstrumentZone {
            sf2: 0,
            instrument: 4,
            zone: 0,
        });

        let children = store.children(instrument);
        assert_eq!(3, children.len());
        assert_eq!(
            ElementId::InstrumentZone {
                sf2: 0,
                instrument: 3,
                zone: 0
            },
            children[0]
        );
    }

    #[test]
    fn test_edit_groups() {
        let store = MemoryStore::new();
        let sample = ElementId::Sample { sf2: 0, sample: 0 };

        store.begin_edit("loop points");
        store.set(sample, Attribute::LoopStart, AttributeValue::from_dword(10));
        store.set(sample, Attribute::LoopEnd, AttributeValue::from_dword(20));
        store.end_edit();

        store.begin_edit("reset loop");
        store.reset(sample, Attribute::LoopStart);
        store.reset(sample, Attribute::OriginalPitch);
        store.end_edit();
        store.end_edit();

        assert_eq!(
            vec![
                ("loop points".to_string(), 2),
                ("reset loop".to_string(), 1)
            ],
            store.edit_history()
        );
    }
}
