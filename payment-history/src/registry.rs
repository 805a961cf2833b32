//! Parent → children index over a flat event list
//!
//! Events live in an arena (the borrowed input slice) and are referred to by
//! position. The registry never checks referential integrity: an event whose
//! parent is missing simply never shows up as anyone's child.

use crate::{
    types::{EventGuid, PaymentEvent},
    Error, Result,
};
use std::collections::HashMap;

/// Position of an event in the arena
pub type EventIndex = usize;

/// Adjacency index for one ledger computation
#[derive(Debug)]
pub struct EventRegistry<'a> {
    events: &'a [PaymentEvent],
    children: HashMap<&'a EventGuid, Vec<EventIndex>>,
    roots: Vec<EventIndex>,
}

impl<'a> EventRegistry<'a> {
    /// Index `events` by parent guid
    ///
    /// Children keep the order they have in `events`. Duplicate guids make
    /// parent lookups ambiguous and are rejected.
    pub fn index(events: &'a [PaymentEvent]) -> Result<Self> {
        let mut seen: HashMap<&'a EventGuid, EventIndex> = HashMap::with_capacity(events.len());
        let mut children: HashMap<&'a EventGuid, Vec<EventIndex>> = HashMap::new();
        let mut roots = Vec::new();

        for (index, event) in events.iter().enumerate() {
            if let Some(previous) = seen.insert(&event.guid, index) {
                return Err(Error::InvalidLedger(format!(
                    "duplicate event guid {} at positions {} and {}",
                    event.guid, previous, index
                )));
            }

            match &event.parent_guid {
                Some(parent) => children.entry(parent).or_default().push(index),
                None => roots.push(index),
            }
        }

        tracing::debug!(
            events = events.len(),
            roots = roots.len(),
            parents = children.len(),
            "indexed payment events"
        );

        Ok(Self {
            events,
            children,
            roots,
        })
    }

    /// Event at `index`
    pub fn event(&self, index: EventIndex) -> &'a PaymentEvent {
        &self.events[index]
    }

    /// Number of events in the arena
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Arena is empty
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Events without a parent, in input order
    pub fn roots(&self) -> &[EventIndex] {
        &self.roots
    }

    /// Whether any event names `event` as its parent
    pub fn has_children(&self, event: &PaymentEvent) -> bool {
        self.children.contains_key(&event.guid)
    }

    /// Children of `event`, in input order
    pub fn children_of(&self, event: &PaymentEvent) -> impl Iterator<Item = &'a PaymentEvent> + '_ {
        self.child_indices(event).iter().map(|&i| &self.events[i])
    }

    /// Arena positions of the children of `event`
    pub fn child_indices(&self, event: &PaymentEvent) -> &[EventIndex] {
        self.children
            .get(&event.guid)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        money::Money,
        types::{Currency, InstrumentGuid, TransactionType},
    };
    use rust_decimal::Decimal;

    fn event(guid: &str, kind: TransactionType, parent: Option<&str>) -> PaymentEvent {
        let event = PaymentEvent::new(
            guid,
            kind,
            Money::new(Decimal::from(10), Currency::USD),
            &InstrumentGuid::new("card"),
        );
        match parent {
            Some(parent) => event.with_parent_guid(parent),
            None => event,
        }
    }

    #[test]
    fn test_children_in_input_order() {
        let events = vec![
            event("c2", TransactionType::Charge, Some("r1")),
            event("r1", TransactionType::Reserve, None),
            event("c1", TransactionType::Charge, Some("r1")),
        ];
        let registry = EventRegistry::index(&events).unwrap();

        assert_eq!(registry.roots(), &[1]);
        assert!(registry.has_children(&events[1]));
        assert!(!registry.has_children(&events[0]));

        let children: Vec<&str> = registry
            .children_of(&events[1])
            .map(|e| e.guid.as_str())
            .collect();
        assert_eq!(children, vec!["c2", "c1"]);
    }

    #[test]
    fn test_dangling_parent_is_not_an_error() {
        let events = vec![
            event("r1", TransactionType::Reserve, None),
            event("c1", TransactionType::Charge, Some("missing")),
        ];
        let registry = EventRegistry::index(&events).unwrap();

        assert_eq!(registry.roots(), &[0]);
        assert!(!registry.has_children(&events[0]));
        assert_eq!(registry.child_indices(&events[0]), &[] as &[EventIndex]);
    }

    #[test]
    fn test_duplicate_guid_rejected() {
        let events = vec![
            event("r1", TransactionType::Reserve, None),
            event("r1", TransactionType::Charge, Some("r1")),
        ];
        let err = EventRegistry::index(&events).unwrap_err();
        assert!(matches!(err, Error::InvalidLedger(_)));
    }
}
